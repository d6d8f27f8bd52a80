//! QR challenge/response loop.
//!
//! The page posts every new challenge into an exposed binding, which arrives
//! here as a channel. One sequential consumer classifies and emits them, so
//! challenge numbers are assigned and published in arrival order.

use crate::auth::{self, AuthenticationResult, ObserverOptions};
use crate::collaborators::QrRelay;
use crate::error::BootstrapError;
use crate::screenshot::Screenshots;
use crate::{scripts, terminal};
use log::{debug, error, info, warn};
use serde_json::{Value, json};
use sesame_core::{EventBus, Namespace, SessionConfig, SessionEvent};
use sesame_interfaces::{Page, PageError, WaitOptions};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Payloads longer than this signal a multi-device challenge.
pub const MULTI_DEVICE_PAYLOAD_LEN: usize = 200;

const RENDERER_POLLING: Duration = Duration::from_millis(100);
const FIRST_QR_POLLING: Duration = Duration::from_millis(500);
const FIRST_QR_TIMEOUT: Duration = Duration::from_secs(10);
const MISSING_STATE_PAUSE: Duration = Duration::from_secs(2);

/// How the QR loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QrOutcome {
    /// A challenge was scanned and the chat UI is up.
    Authenticated,
    /// A multi-device challenge arrived while multi-device is off.
    MultiDeviceDetected,
    /// The challenge limit was exceeded; the page has been closed.
    LimitReached,
}

/// Result of handling one challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrabOutcome {
    /// Published as challenge number `n`.
    Emitted(u32),
    LimitReached,
    /// The rendered challenge is a multi-device one; nothing was published.
    MultiDeviceDetected,
}

/// Hash the relay stores the current image under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayHash {
    /// Nothing confirmed by the relay yet; the next success publishes a share URL.
    Start,
    Confirmed(String),
}

impl RelayHash {
    pub fn as_str(&self) -> &str {
        match self {
            RelayHash::Start => "START",
            RelayHash::Confirmed(hash) => hash,
        }
    }
}

/// What to do with a payload posted by the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    MultiDeviceDetected,
    /// Success sentinel; the scan went through.
    Scanned,
    /// Same payload as the previous challenge.
    Duplicate,
    /// Arrived after the loop already resolved.
    Ignored,
    Challenge,
}

/// Classifies payloads posted by the page. Holds the resolution latch and
/// the last challenge seen.
#[derive(Debug, Clone, Default)]
pub struct QrClassifier {
    multi_device: bool,
    resolved: bool,
    last: Option<String>,
}

impl QrClassifier {
    pub fn new(multi_device: bool) -> Self {
        Self {
            multi_device,
            ..Default::default()
        }
    }

    /// Whether `payload` is a multi-device challenge while multi-device is off.
    pub fn is_multi_device(&self, payload: &str) -> bool {
        payload.len() > MULTI_DEVICE_PAYLOAD_LEN && !self.multi_device
    }

    pub fn classify(&mut self, payload: &str) -> Classification {
        if self.is_multi_device(payload) {
            return Classification::MultiDeviceDetected;
        }
        if self.resolved {
            return Classification::Ignored;
        }
        if payload == scripts::QR_SUCCESS || payload == scripts::MULTI_DEVICE_DETECTED {
            self.resolved = true;
            return Classification::Scanned;
        }
        if self.last.as_deref() == Some(payload) {
            return Classification::Duplicate;
        }
        self.last = Some(payload.to_string());
        Classification::Challenge
    }

    /// Records a challenge emitted outside the channel.
    pub fn observe(&mut self, payload: &str) {
        self.last = Some(payload.to_string());
    }
}

/// Per-attempt QR state. Built fresh for every bootstrap attempt.
#[derive(Debug)]
pub struct QrManager {
    session_id: String,
    multi_device: bool,
    throw_on_tos_block: bool,
    max: Option<u32>,
    log_skip: bool,
    observer: ObserverOptions,
    bus: Arc<dyn EventBus>,
    relay: Option<Arc<dyn QrRelay>>,
    screenshots: Screenshots,
    classifier: QrClassifier,
    qr_num: u32,
    hash: RelayHash,
    first_emitted: bool,
    renderer_loaded: bool,
    created_at: Instant,
}

impl QrManager {
    pub fn new(
        config: &SessionConfig,
        bus: Arc<dyn EventBus>,
        relay: Option<Arc<dyn QrRelay>>,
        screenshots: Screenshots,
    ) -> Self {
        Self {
            session_id: config.id.clone(),
            multi_device: config.multi_device,
            throw_on_tos_block: config.throw_error_on_tos_block,
            max: config.qr.max.filter(|max| *max > 0),
            log_skip: config.qr.log_skip,
            observer: ObserverOptions::from(config),
            bus,
            relay: relay.filter(|_| config.qr.relay),
            screenshots,
            classifier: QrClassifier::new(config.multi_device),
            qr_num: 0,
            hash: RelayHash::Start,
            first_emitted: false,
            renderer_loaded: false,
            created_at: Instant::now(),
        }
    }

    /// Number of challenges handled so far.
    pub fn challenges(&self) -> u32 {
        self.qr_num
    }

    pub fn relay_hash(&self) -> &RelayHash {
        &self.hash
    }

    fn publish(&self, event: SessionEvent) {
        if let Err(e) = self.bus.publish(event) {
            warn!("[{}] Failed to publish QR event: {}", self.session_id, e);
        }
    }

    fn report_multi_device(&self) {
        error!("Multi-Device detected, please set session.multi_device to true in your config");
        self.publish(SessionEvent::new(&self.session_id, Namespace::Startup, json!(true)).with_tag("MD_DETECT"));
    }

    /// Numbers, publishes and renders one challenge.
    pub async fn grab_and_emit(
        &mut self,
        page: &dyn Page,
        payload: &str,
    ) -> Result<GrabOutcome, PageError> {
        self.qr_num += 1;
        if let Some(max) = self.max {
            if self.qr_num > max {
                info!("[{}] QR Code limit reached, exiting...", self.session_id);
                self.publish(SessionEvent::status(&self.session_id, "QR_LIMIT_REACHED"));
                self.screenshots.capture(page).await;
                if let Err(e) = page.close().await {
                    debug!("Closing page after QR limit failed: {}", e);
                }
                return Ok(GrabOutcome::LimitReached);
            }
        }
        if self.qr_num == 1 {
            info!("[{}] First QR: {} ms", self.session_id, self.created_at.elapsed().as_millis());
        }

        self.publish(SessionEvent::new(&self.session_id, Namespace::Qr, payload).with_tag("qrData"));
        if self.log_skip {
            info!("New QR Code generated. Not printing in console because qr.log_skip is set");
        } else {
            terminal::print_qr(&self.session_id, payload);
        }

        if !self.renderer_loaded {
            info!("Waiting for internal QR renderer to load");
            let started = Instant::now();
            page.wait_for_function(scripts::QR_RENDERER_READY, WaitOptions::forever(RENDERER_POLLING))
                .await?;
            info!("Internal QR renderer loaded in {} ms", started.elapsed().as_millis());
            self.renderer_loaded = true;
        }

        match page.evaluate_script(scripts::QR_PNG).await {
            Ok(Value::String(image)) if !image.is_empty() => {
                self.publish(SessionEvent::new(&self.session_id, Namespace::Qr, image.as_str()));
                self.relay_upload(&image).await;
            }
            Ok(_) => info!(
                "Something went wrong while retrieving the new QR code but it should not affect the session launch procedure."
            ),
            Err(e) => {
                let launch_result = page.evaluate_script(scripts::LAUNCH_RESULT).await.unwrap_or(Value::Null);
                info!(
                    "Something went wrong while retrieving the new QR code but it should not affect the session launch procedure: {} (launch result: {})",
                    e, launch_result
                );
            }
        }

        debug!("[{}] Emitted QR #{}", self.session_id, self.qr_num);
        Ok(GrabOutcome::Emitted(self.qr_num))
    }

    async fn relay_upload(&mut self, image: &str) {
        let Some(relay) = self.relay.clone() else {
            return;
        };
        match relay.upload(image, self.hash.as_str()).await {
            Ok(new_hash) => {
                if self.hash == RelayHash::Start {
                    let url = relay.share_url(&new_hash);
                    info!("Scan the qr code at {}", url);
                    self.publish(SessionEvent::new(&self.session_id, Namespace::Qr, url).with_tag("qrUrl"));
                }
                self.hash = RelayHash::Confirmed(new_hash);
            }
            Err(e) => {
                warn!("QR relay upload failed: {}", e);
                self.hash = RelayHash::Start;
            }
        }
    }

    /// Emits the challenge already rendered in the page, once per manager.
    ///
    /// A multi-device challenge is never emitted and does not use up the
    /// single emission; the caller decides what to do about it.
    pub async fn emit_first(&mut self, page: &dyn Page) -> Result<Option<GrabOutcome>, PageError> {
        if self.first_emitted {
            return Ok(None);
        }
        match page.evaluate_script(scripts::FIRST_QR).await? {
            Value::String(first) if !first.is_empty() => {
                if self.classifier.is_multi_device(&first) {
                    debug!("[{}] Rendered challenge is a multi-device one, not emitting it", self.session_id);
                    return Ok(Some(GrabOutcome::MultiDeviceDetected));
                }
                self.first_emitted = true;
                self.classifier.observe(&first);
                self.grab_and_emit(page, &first).await.map(Some)
            }
            _ => {
                self.first_emitted = true;
                debug!("[{}] No QR challenge rendered yet", self.session_id);
                Ok(None)
            }
        }
    }

    /// Gives the page 10s to render a challenge and emits it if one shows up.
    ///
    /// No challenge within the bound means the session is authenticated or
    /// blocked; that is not an error.
    pub async fn wait_first_qr(&mut self, page: &dyn Page) -> Result<Option<GrabOutcome>, PageError> {
        let present = format!("!!({})", scripts::FIRST_QR);
        match page
            .wait_for_function(&present, WaitOptions::bounded(FIRST_QR_POLLING, FIRST_QR_TIMEOUT))
            .await
        {
            Ok(_) => self.emit_first(page).await,
            Err(e) => {
                debug!("[{}] No early QR challenge: {}", self.session_id, e);
                Ok(None)
            }
        }
    }

    /// Runs the challenge loop until a scan succeeds, a multi-device
    /// challenge shows up, or the challenge limit is exceeded.
    ///
    /// Never times out on its own; callers bound it.
    pub async fn smart_qr(&mut self, page: &Arc<dyn Page>) -> Result<QrOutcome, BootstrapError> {
        if page.evaluate_script(scripts::STORE_STATE).await? == Value::Bool(false) {
            warn!("Seems as though you have been TOS_BLOCKed, unable to refresh QR Code. You will most likely not get a QR Code");
            if self.throw_on_tos_block {
                return Err(BootstrapError::TosBlocked);
            }
        }

        if auth::is_authenticated(page, self.observer).await? == AuthenticationResult::Authenticated {
            return Ok(QrOutcome::Authenticated);
        }

        let has_default_state = page.evaluate_script(scripts::DEFAULT_STATE).await?;
        if has_default_state != Value::Bool(true) {
            debug!("Client state not populated yet, pausing before wiring the QR binding");
            tokio::time::sleep(MISSING_STATE_PAUSE).await;
        }

        let challenges = match page.expose_function(scripts::QR_BINDING).await {
            Ok(rx) => {
                page.evaluate_script(scripts::ROUTE_CHALLENGES).await?;
                Some(rx)
            }
            Err(e) => {
                error!("qr -> could not expose {}: {}", scripts::QR_BINDING, e);
                self.screenshots.capture(page.as_ref()).await;
                None
            }
        };

        match self.emit_first(page.as_ref()).await? {
            Some(GrabOutcome::LimitReached) => return Ok(QrOutcome::LimitReached),
            Some(GrabOutcome::MultiDeviceDetected) => {
                self.report_multi_device();
                return Ok(QrOutcome::MultiDeviceDetected);
            }
            Some(GrabOutcome::Emitted(_)) | None => {}
        }

        let Some(mut challenges) = challenges else {
            // Without the binding only the caller's timeout can end the loop
            return std::future::pending().await;
        };

        while let Some(posted) = challenges.recv().await {
            let payload = match posted {
                Value::String(s) => s,
                other => other.to_string(),
            };
            match self.classifier.classify(&payload) {
                Classification::MultiDeviceDetected => {
                    self.report_multi_device();
                    return Ok(QrOutcome::MultiDeviceDetected);
                }
                Classification::Scanned => {
                    info!("QR code scanned. Loading session...");
                    auth::wait_inside_chat(page.as_ref(), self.observer.polling).await?;
                    return Ok(QrOutcome::Authenticated);
                }
                Classification::Duplicate => debug!("Ignoring repeated QR challenge"),
                Classification::Ignored => debug!("Ignoring QR payload after resolution"),
                Classification::Challenge => {
                    if self.grab_and_emit(page.as_ref(), &payload).await? == GrabOutcome::LimitReached {
                        return Ok(QrOutcome::LimitReached);
                    }
                }
            }
        }

        // The binding only goes away with the page
        Err(BootstrapError::from(PageError::TargetClosed))
    }
}
