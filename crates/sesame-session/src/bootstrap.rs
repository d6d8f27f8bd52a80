//! The session bootstrap state machine.
//!
//! One attempt walks the page through
//! `Start → PageReady → Injected → Authenticating → (QR loop) → ReInjecting
//! → ValidityCheck → Ready`. Recoverable failures end an attempt with
//! [`BootstrapOutcome::RestartWithConfig`]; [`SessionBootstrapper::launch`]
//! runs attempts in a bounded loop, carrying the adjusted configuration.

use crate::auth::{self, AuthenticationResult, ObserverOptions};
use crate::collaborators::{Collaborators, InjectionStage, License, Patch, Prefetch};
use crate::credentials::{FileCredentialStore, SessionCredentials};
use crate::debug_info::{AccountType, DebugInfo};
use crate::error::BootstrapError;
use crate::qr::{QrManager, QrOutcome};
use crate::race::Race;
use crate::screenshot::Screenshots;
use crate::scripts;
use crate::session::{self, Session};
use log::{debug, error, info, warn};
use serde_json::Value;
use sesame_core::{EventBus, LaunchConfig, Namespace, SessionConfig, SessionEvent};
use sesame_interfaces::{
    ConsoleLogLevel, LaunchRequest, Page, PageError, PageEvent, PageLauncher, WaitOptions,
    is_truthy,
};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const PAGE_READY_POLLING: Duration = Duration::from_millis(100);
const INVARIANT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Why an attempt asked to be restarted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartReason {
    /// The host account logged the session out (NUKE); credentials were cleared.
    SessionDataInvalid,
    /// A multi-device challenge showed up; multi-device is now forced on.
    MultiDeviceDetected,
    /// The client API never got live data behind it.
    InvalidSession,
}

impl fmt::Display for RestartReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            RestartReason::SessionDataInvalid => "session data invalidated",
            RestartReason::MultiDeviceDetected => "multi-device detected",
            RestartReason::InvalidSession => "session validity check failed",
        };
        f.write_str(reason)
    }
}

/// Sessions relaunched after page crashes, ending with the error that
/// stopped relaunching, if any.
pub type Relaunches = mpsc::UnboundedReceiver<Result<Session, BootstrapError>>;

/// How one bootstrap attempt ended.
#[derive(Debug)]
pub enum BootstrapOutcome {
    Ready(Session),
    RestartWithConfig(SessionConfig, RestartReason),
    FatalError(BootstrapError),
}

/// Drives pages through authentication until a session is ready.
#[derive(Debug, Clone)]
pub struct SessionBootstrapper {
    launcher: Arc<dyn PageLauncher>,
    bus: Arc<dyn EventBus>,
    collaborators: Collaborators,
    launch: LaunchConfig,
}

impl SessionBootstrapper {
    pub fn new(
        launcher: Arc<dyn PageLauncher>,
        bus: Arc<dyn EventBus>,
        collaborators: Collaborators,
        launch: LaunchConfig,
    ) -> Self {
        Self {
            launcher,
            bus,
            collaborators,
            launch,
        }
    }

    /// Bootstraps a session, restarting at most `restart.max_attempts - 1` times.
    pub async fn launch(&self, config: SessionConfig) -> Result<Session, BootstrapError> {
        let max_attempts = config.restart.max_attempts.max(1);
        let mut config = self.detect_multi_device(config).await;
        let mut previous: Option<RestartReason> = None;

        for attempt in 1..=max_attempts {
            info!("[{}] Bootstrap attempt {}/{}", config.id, attempt, max_attempts);
            match self.run_attempt(&config, previous).await {
                BootstrapOutcome::Ready(session) => return Ok(session),
                BootstrapOutcome::FatalError(err) => return Err(err),
                BootstrapOutcome::RestartWithConfig(next, reason) => {
                    warn!("[{}] Restarting bootstrap: {}", config.id, reason);
                    previous = Some(reason);
                    config = next;
                }
            }
        }

        let last_reason = previous.unwrap_or(RestartReason::InvalidSession);
        error!("[{}] Giving up after {} attempts", config.id, max_attempts);
        Err(BootstrapError::RetriesExhausted {
            attempts: max_attempts,
            last_reason,
        })
    }

    async fn detect_multi_device(&self, mut config: SessionConfig) -> SessionConfig {
        if config.auto_multi_device && !config.multi_device {
            let dir = config.multi_device_dir(&self.launch);
            if tokio::fs::try_exists(&dir).await.unwrap_or(false) {
                info!("Multi-Device directory detected. multi_device set to true.");
                config.multi_device = true;
            }
        }
        config
    }

    /// Relaunches `session` whenever its page crashes.
    ///
    /// Returns `None` unless the session was bootstrapped with
    /// `restart_on_crash`. Every relaunched session is sent to the returned
    /// channel and watched in turn; a failed relaunch is sent as well and
    /// ends the watch.
    pub fn restart_on_crash(&self, session: &mut Session) -> Option<Relaunches> {
        let mut crashed = session.take_crash_signal()?;
        let mut page = session.page().clone();
        let mut config = session.config().clone();
        let bootstrapper = self.clone();
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            // The signal is dropped without firing when the session goes away
            while let Ok(reason) = crashed.await {
                error!("[{}] Page Crashed! Restarting... {}", config.id, reason);
                if let Err(e) = bootstrapper
                    .bus
                    .publish(SessionEvent::status(&config.id, "Page crashed, restarting"))
                {
                    warn!("[{}] Failed to publish event: {}", config.id, e);
                }
                if let Err(e) = page.close().await {
                    debug!("Ignoring error while closing crashed page: {}", e);
                }

                let mut next = match bootstrapper.launch(config.clone()).await {
                    Ok(next) => next,
                    Err(e) => {
                        let _ = tx.send(Err(e));
                        return;
                    }
                };
                let Some(signal) = next.take_crash_signal() else {
                    let _ = tx.send(Ok(next));
                    return;
                };
                crashed = signal;
                page = next.page().clone();
                config = next.config().clone();
                if tx.send(Ok(next)).is_err() {
                    return;
                }
            }
        });
        Some(rx)
    }

    /// Runs a single attempt; errors become [`BootstrapOutcome::FatalError`]
    /// after the failure policy ran.
    pub async fn run_attempt(
        &self,
        config: &SessionConfig,
        previous: Option<RestartReason>,
    ) -> BootstrapOutcome {
        let mut attempt = Attempt::new(self, config);
        match attempt.run(previous).await {
            Ok(outcome) => outcome,
            Err(err) => BootstrapOutcome::FatalError(attempt.fail(err).await),
        }
    }
}

/// State owned by one attempt. Never outlives it.
struct Attempt<'a> {
    bootstrapper: &'a SessionBootstrapper,
    config: &'a SessionConfig,
    page: Option<Arc<dyn Page>>,
    screenshots: Screenshots,
    store: FileCredentialStore,
    started: Instant,
    init_errors: Option<JoinHandle<()>>,
}

impl Drop for Attempt<'_> {
    fn drop(&mut self) {
        if let Some(watch) = self.init_errors.take() {
            watch.abort();
        }
    }
}

impl<'a> Attempt<'a> {
    fn new(bootstrapper: &'a SessionBootstrapper, config: &'a SessionConfig) -> Self {
        Self {
            bootstrapper,
            config,
            page: None,
            screenshots: Screenshots::for_session(config),
            store: FileCredentialStore::for_session(config),
            started: Instant::now(),
            init_errors: None,
        }
    }

    fn collaborators(&self) -> &Collaborators {
        &self.bootstrapper.collaborators
    }

    fn publish(&self, event: SessionEvent) {
        if let Err(e) = self.bootstrapper.bus.publish(event) {
            warn!("[{}] Failed to publish event: {}", self.config.id, e);
        }
    }

    fn status(&self, text: impl Into<String>) {
        let text = text.into();
        info!("[{}] {}", self.config.id, text);
        self.publish(SessionEvent::status(&self.config.id, text));
    }

    async fn close_page(&self) {
        if let Some(page) = &self.page {
            if let Err(e) = page.close().await {
                debug!("Ignoring error while closing page: {}", e);
            }
        }
    }

    async fn run(&mut self, previous: Option<RestartReason>) -> Result<BootstrapOutcome, BootstrapError> {
        let config = self.config;
        self.status("Starting");

        // Start → PageReady
        let session_data = match &config.session_data {
            Some(data) => Some(data.clone()),
            None => self.store.load().await.unwrap_or_else(|e| {
                warn!("Ignoring unreadable session data file {}: {}", self.store.path().display(), e);
                None
            }),
        };
        let request = LaunchRequest {
            session_id: config.id.clone(),
            multi_device: config.multi_device,
            session_data,
            user_data_dir: config.user_data_dir(&self.bootstrapper.launch),
            headless: self.bootstrapper.launch.headless,
            args: self.bootstrapper.launch.args.clone(),
        };
        let page = self
            .bootstrapper
            .launcher
            .open(&request)
            .await
            .map_err(BootstrapError::PageLaunch)?;
        self.page = Some(page.clone());
        self.status("Page loaded");
        if config.screenshot_on_init_error {
            self.init_errors = watch_init_errors(page.clone(), self.screenshots.clone()).await;
        }
        let launched = Instant::now();

        // PageReady → Injected
        page.wait_for_function(
            scripts::PAGE_READY,
            WaitOptions::bounded(PAGE_READY_POLLING, config.timeouts.page_ready),
        )
        .await?;
        let mut debug_info = collect_debug_info(page.as_ref()).await?;
        info!("Debug info: {}", serde_json::to_string(&debug_info)?);

        let patch_prefetch = (!config.skip_patches).then(|| {
            let patches = self.collaborators().patches.clone();
            let cfg = config.clone();
            Prefetch::spawn(async move { patches.fetch_patch(&cfg).await })
        });

        let can_inject_early = self.collaborators().injector.can_inject_early(page.as_ref()).await?;
        let attempting_reauth = is_truthy(&page.evaluate_script(scripts::ATTEMPTING_REAUTH).await?);

        let mut qr = QrManager::new(
            config,
            self.bootstrapper.bus.clone(),
            self.collaborators().relay.clone(),
            self.screenshots.clone(),
        );
        if config.qr.emit_first_early && !attempting_reauth {
            qr.wait_first_qr(page.as_ref()).await?;
        }

        let probes = Instant::now();
        avoid_invariant_violations(&page).await;
        info!("Invariant Violation Avoidance: {} ms", probes.elapsed().as_millis());

        if can_inject_early {
            if attempting_reauth {
                page.evaluate_script(scripts::REAUTH_STORE_PLACEHOLDER).await?;
            }
            self.status("Injecting api");
            self.collaborators()
                .injector
                .inject(page.as_ref(), InjectionStage::Early)
                .await?;
            self.status("WAPI injected");
        } else if config.throw_error_on_tos_block {
            return Err(BootstrapError::TosBlocked);
        } else {
            warn!("[{}] Early injection unavailable, continuing without it", config.id);
        }
        info!("Time to injection: {} ms", launched.elapsed().as_millis());

        // Injected → Authenticating
        self.status("Authenticating");
        let mut authenticated =
            auth::observe(&page, ObserverOptions::from(config), config.auth_timeout()).await?;

        if authenticated == AuthenticationResult::CredentialsInvalid {
            if config.ignore_nuke {
                warn!("[{}] Session data looks invalidated, continuing because ignore_nuke is set", config.id);
                authenticated = AuthenticationResult::Authenticated;
            } else {
                self.status("Session data most likely expired due to manual host account logout. Please re-authenticate this session.");
                if config.delete_session_data_on_logout {
                    if let Err(e) = self.store.delete().await {
                        warn!("Could not delete session data: {}", e);
                    }
                }
                if config.throw_on_expired_session_data
                    || previous == Some(RestartReason::SessionDataInvalid)
                {
                    // The failure policy screenshots and closes the page
                    return Err(BootstrapError::SessionExpired);
                }
                self.close_page().await;
                let next = SessionConfig {
                    session_data: None,
                    ..config.clone()
                };
                return Ok(BootstrapOutcome::RestartWithConfig(next, RestartReason::SessionDataInvalid));
            }
        }

        let early_account_id = page
            .evaluate_script(scripts::EARLY_ACCOUNT_ID)
            .await?
            .as_str()
            .unwrap_or_default()
            .to_string();
        let license_prefetch = {
            let licenses = self.collaborators().licenses.clone();
            let cfg = config.clone();
            let account = early_account_id.clone();
            Prefetch::spawn(async move { licenses.fetch_license(&cfg, &account).await })
        };

        match authenticated {
            AuthenticationResult::TimedOut => {
                return Err(self.auth_timed_out(page.as_ref()).await);
            }
            AuthenticationResult::NeedsQr => {
                self.status("Authenticate to continue");
                let bounded = match config.qr_timeout() {
                    Some(limit) => tokio::time::timeout(limit, qr.smart_qr(&page)).await.ok(),
                    None => Some(qr.smart_qr(&page).await),
                };
                match bounded {
                    None => {
                        self.status("qrTimeout");
                        error!("QR scan took too long. Session Timed Out. Consider increasing session.timeouts.qr_secs");
                        return Err(BootstrapError::QrTimeout);
                    }
                    Some(Err(e)) => return Err(e),
                    Some(Ok(QrOutcome::LimitReached)) => return Err(BootstrapError::QrLimitReached),
                    Some(Ok(QrOutcome::MultiDeviceDetected)) => {
                        self.close_page().await;
                        let next = SessionConfig {
                            multi_device: true,
                            ..config.clone()
                        };
                        return Ok(BootstrapOutcome::RestartWithConfig(next, RestartReason::MultiDeviceDetected));
                    }
                    Some(Ok(QrOutcome::Authenticated)) => self.status("successfulScan"),
                }
            }
            AuthenticationResult::Authenticated | AuthenticationResult::CredentialsInvalid => {
                self.status("Authenticated")
            }
        }

        // Authenticated → ReInjecting
        if config.log_internal_events {
            page.evaluate_script(scripts::DEBUG_EVENTS).await?;
        }
        page.evaluate_script(scripts::CRITICAL_LISTENERS).await?;
        let hooks = Instant::now();
        self.collaborators().injector.install_event_hooks(page.as_ref()).await?;
        info!("Injected internal event handler: {} ms", hooks.elapsed().as_millis());

        if attempting_reauth {
            page.evaluate_script(scripts::CLEAR_STORE).await?;
            if config.wait_for_ripe_session {
                self.status("Waiting for ripe session...");
                if auth::wait_for_ripe_session(page.as_ref(), config.timeouts.ripe_session).await {
                    self.status("Session ready for injection");
                } else {
                    warn!("[{}] Session did not ripen. You may experience issues in headless mode. Continuing...", config.id);
                }
            }
        }
        let pre = if can_inject_early { "Rei" } else { "I" };
        self.status(format!("{}njecting api", pre));
        self.collaborators()
            .injector
            .inject(page.as_ref(), InjectionStage::Late)
            .await?;
        self.status(format!("WAPI {}njected", pre));

        // ReInjecting → ValidityCheck
        if can_inject_early {
            self.status("Checking if session is valid");
            if config.safe_mode {
                tokio::time::sleep(config.timeouts.safe_mode_pause).await;
            }
        }
        let valid = page
            .wait_for_function(
                scripts::VALID_SESSION,
                WaitOptions::bounded(config.timeouts.validity_polling, config.timeouts.validity),
            )
            .await;
        if let Err(e) = valid {
            if e.is_protocol_lost() {
                return Err(e.into());
            }
            error!("Valid session check failed: {}", e);
            let store_keys = page
                .evaluate_script(scripts::STORE_KEYS)
                .await
                .unwrap_or(Value::Null);
            info!("Store keys: {}", store_keys);
            self.status("The session is invalid. Retrying");
            self.close_page().await;
            return Ok(BootstrapOutcome::RestartWithConfig(
                config.clone(),
                RestartReason::InvalidSession,
            ));
        }

        // ValidityCheck → Ready
        self.status("Client is ready");
        let credentials = self.extract_credentials(page.as_ref()).await?;
        let page_logging = session::forward_page_logs(page.as_ref(), config).await;

        if let Some(prefetch) = patch_prefetch {
            self.apply_patch(page.as_ref(), prefetch).await;
        }

        let account_id = page
            .evaluate_script(scripts::ACCOUNT_ID)
            .await?
            .as_str()
            .unwrap_or_default()
            .to_string();
        debug_info.record_account(account_id.trim_end_matches("@c.us"));

        if !config.skip_broken_methods_check {
            match self.collaborators().patches.integrity_check(page.as_ref()).await {
                Ok(true) => debug!("Integrity check passed"),
                Ok(false) => warn!("[{}] Some client methods failed the integrity check", config.id),
                Err(e) => warn!("[{}] Integrity check could not run: {}", config.id, e),
            }
        }

        debug_info.acc_type = launch_metrics(page.as_ref(), config.multi_device).await;
        debug_info.launch_time_ms = Some(self.started.elapsed().as_millis() as u64);
        self.publish(SessionEvent::new(
            &config.id,
            Namespace::DebugInfo,
            serde_json::to_value(&debug_info)?,
        ));

        self.provision_license(page.as_ref(), &account_id, &early_account_id, license_prefetch)
            .await;

        self.status("SUCCESS");
        info!(
            "[{}] Ready for account: {}",
            config.id,
            debug_info.num.as_deref().unwrap_or("unknown")
        );
        Ok(BootstrapOutcome::Ready(Session::new(
            page,
            config.clone(),
            debug_info,
            credentials,
            page_logging,
        )))
    }

    /// Decides between `AppOffline` and `AuthTimeout` after the auth race timed out.
    async fn auth_timed_out(&self, page: &dyn Page) -> BootstrapError {
        let probe = auth::phone_is_out_of_reach(page, WaitOptions::DEFAULT_POLLING);
        let out_of_reach = match self.config.out_of_reach_timeout() {
            Some(limit) => tokio::time::timeout(limit, probe).await.unwrap_or(false),
            None => probe.await,
        };
        if out_of_reach {
            self.status("appOffline");
            error!("Authentication timed out. Please open the app on the phone. Shutting down");
            BootstrapError::AppOffline
        } else {
            self.status("authTimeout");
            error!("Authentication timed out. Shutting down. Consider increasing session.timeouts.auth_secs");
            BootstrapError::AuthTimeout
        }
    }

    /// Reads, publishes and persists the session credentials.
    async fn extract_credentials(&self, page: &dyn Page) -> Result<SessionCredentials, BootstrapError> {
        let config = self.config;
        let storage = match page.evaluate_script(scripts::LOCAL_STORAGE).await? {
            Value::String(json) => serde_json::from_str(&json)?,
            other => other,
        };
        let credentials = SessionCredentials::from_local_storage(&storage, config.multi_device);
        let encoded = credentials.to_base64()?;

        self.publish(SessionEvent::new(&config.id, Namespace::SessionData, credentials.to_json()?));
        self.publish(SessionEvent::new(&config.id, Namespace::SessionDataBase64, encoded.as_str()));

        if !config.skip_session_save {
            if let Err(e) = self.store.save(&encoded).await {
                error!("Could not save session data to {}: {}", self.store.path().display(), e);
            }
        }

        if let (Some(bucket_auth), Some(backup)) =
            (&config.session_data_bucket_auth, &self.collaborators().backup)
        {
            self.status("Uploading new session data to cloud storage..");
            match backup.upload(&config.id, bucket_auth, &encoded).await {
                Ok(()) => self.status("Successfully uploaded session data file to cloud storage!"),
                Err(e) => {
                    warn!("Session data backup failed: {}", e);
                    self.status("Something went wrong while uploading new session data to cloud storage bucket. Continuing...");
                }
            }
        }

        Ok(credentials)
    }

    async fn apply_patch(&self, page: &dyn Page, prefetch: Prefetch<Patch>) {
        let patches = &self.collaborators().patches;
        match prefetch.join().await {
            Ok(patch) => {
                let version = patch.version.clone();
                match patches.apply_patch(page, patch).await {
                    Ok(()) => info!("Patches applied ({})", version.as_deref().unwrap_or("latest")),
                    Err(e) => warn!("[{}] Could not apply patches: {}", self.config.id, e),
                }
            }
            Err(e) => warn!("[{}] Could not fetch patches: {}", self.config.id, e),
        }
    }

    /// Applies the license prefetched for the early account id, or fetches a
    /// new one if the session turned out to belong to another account.
    async fn provision_license(
        &self,
        page: &dyn Page,
        account_id: &str,
        early_account_id: &str,
        prefetch: Prefetch<Option<License>>,
    ) {
        let config = self.config;
        let identity_changed = account_id != early_account_id;
        if config.license_key.is_none() && !identity_changed {
            return;
        }
        let licenses = &self.collaborators().licenses;
        let license = if identity_changed {
            debug!("Account changed from '{}' to '{}', fetching license again", early_account_id, account_id);
            drop(prefetch);
            licenses.fetch_license(config, account_id).await
        } else {
            prefetch.join().await
        };
        let result = match license {
            Ok(license) => licenses.apply_license(page, config, account_id, license).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!("[{}] License provisioning failed: {}", config.id, e);
        }
    }

    /// Applies the failure policy and returns the error to surface.
    async fn fail(&mut self, err: BootstrapError) -> BootstrapError {
        let config = self.config;
        self.publish(SessionEvent::status(&config.id, err.to_string()));
        error!("[{}] Bootstrap failed: {}", config.id, err);

        if let Some(page) = self.page.take() {
            self.screenshots.capture(page.as_ref()).await;
            if let Err(e) = page.close().await {
                debug!("Ignoring error while closing page: {}", e);
            }
        }

        let process = &self.collaborators().process;
        if let BootstrapError::ProtocolLost(reason) = &err {
            process.exit(reason);
            return BootstrapError::ProcessTerminated(err.to_string());
        }
        if err.is_timeout() && config.multi_device {
            let dir = config
                .user_data_dir(&self.bootstrapper.launch)
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "browser profile".to_string());
            error!("Please delete the {} folder and any related data.json files and try again.", dir);
        }
        if err.is_timeout() && config.kill_process_on_timeout {
            process.exit(&err.to_string());
            return BootstrapError::ProcessTerminated(err.to_string());
        }
        err
    }
}

async fn collect_debug_info(page: &dyn Page) -> Result<DebugInfo, PageError> {
    let wa_version = page.evaluate_script(scripts::CLIENT_VERSION).await?;
    let user_agent = page.evaluate_script(scripts::USER_AGENT).await?;
    let browser_version = page.browser_version().await?;
    Ok(DebugInfo::new(
        value_to_string(wa_version),
        value_to_string(user_agent),
        browser_version,
    ))
}

fn value_to_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Gives the web client a moment to settle before injecting into it.
///
/// Ends as soon as any probe holds, or after 10s; never fails.
async fn avoid_invariant_violations(page: &Arc<dyn Page>) {
    let mut probes = Race::new();
    for probe in [
        scripts::MODULES_LOADED,
        scripts::QR_CONTAINER_LOADED,
        scripts::QR_SPINNER_PRESENT,
    ] {
        let page = page.clone();
        probes.spawn(async move {
            page.wait_for_function(probe, WaitOptions::forever(PAGE_READY_POLLING))
                .await
                .map(|_| probe)
        });
    }
    match tokio::time::timeout(INVARIANT_PROBE_TIMEOUT, probes.winner()).await {
        Ok(Ok(probe)) => debug!("Invariant probe settled: {}", probe),
        Ok(Err(e)) => debug!("Invariant probes failed: {}", e),
        Err(_) => debug!("Invariant probes timed out"),
    }
}

/// Screenshots `page` whenever it logs a console error, until aborted.
async fn watch_init_errors(page: Arc<dyn Page>, screenshots: Screenshots) -> Option<JoinHandle<()>> {
    let mut events = match page.subscribe_events().await {
        Ok(rx) => rx,
        Err(e) => {
            debug!("Cannot watch the page console during initialization: {}", e);
            return None;
        }
    };
    Some(tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if let PageEvent::Console(msg) = event {
                if msg.level == ConsoleLogLevel::Error && !is_telemetry_noise(&msg.text) {
                    screenshots.capture(page.as_ref()).await;
                }
            }
        }
    }))
}

// Errors from the client's own telemetry endpoints
fn is_telemetry_noise(text: &str) -> bool {
    text.contains("apify") || text.contains("crashlogs")
}

/// Whether the account runs multi-device while the session does not.
fn multi_device_mismatch(metrics: &Value, multi_device: bool) -> bool {
    !multi_device && metrics.get("isMd").is_some_and(is_truthy)
}

async fn launch_metrics(page: &dyn Page, multi_device: bool) -> Option<AccountType> {
    match page.evaluate_script(scripts::LAUNCH_METRICS).await {
        Ok(metrics) => {
            if multi_device_mismatch(&metrics, multi_device) {
                warn!("!!!Please set session.multi_device to true in your config!!!");
            }
            let is_biz = metrics.get("isBiz").map(is_truthy)?;
            let account = if is_biz {
                AccountType::Business
            } else {
                AccountType::Personal
            };
            info!(
                "Client loaded for {} account {}with {} contacts, {} chats & {} messages",
                if is_biz { "business" } else { "normal" },
                if metrics.get("isMd").is_some_and(is_truthy) { "[MD] " } else { "" },
                metrics.get("contacts").cloned().unwrap_or(Value::Null),
                metrics.get("chats").cloned().unwrap_or(Value::Null),
                metrics.get("messages").cloned().unwrap_or(Value::Null),
            );
            Some(account)
        }
        Err(e) => {
            warn!("Could not read launch metrics: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn multi_device_accounts_need_multi_device_sessions() {
        let metrics = json!({ "isBiz": false, "isMd": true });
        assert!(multi_device_mismatch(&metrics, false));
        assert!(!multi_device_mismatch(&metrics, true));
        assert!(!multi_device_mismatch(&json!({ "isBiz": true }), false));
    }

    #[test]
    fn telemetry_errors_are_not_screenshotted() {
        assert!(is_telemetry_noise("POST https://crashlogs.whatsapp.net/ failed"));
        assert!(is_telemetry_noise("apify proxy refused"));
        assert!(!is_telemetry_noise("Uncaught TypeError: x is undefined"));
    }
}
