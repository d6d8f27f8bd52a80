//! External services the bootstrapper calls at fixed points.
//!
//! None of these are implemented here beyond trivial defaults: the client
//! API bundle, patch and license services, QR relay and backup storage are
//! supplied by the embedding application.

use crate::error::CollaboratorError;
use crate::scripts;
use log::{debug, error};
use sesame_core::SessionConfig;
use sesame_interfaces::{Page, PageError, is_truthy};
use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// A correctness patch for the injected client API.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Patch {
    pub version: Option<String>,
    /// Script evaluated in the page when the patch is applied.
    pub source: String,
}

/// A license token for an account.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct License {
    pub account_id: String,
    /// Script evaluated in the page when the license is applied.
    pub source: String,
}

/// Which client API injection is being performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectionStage {
    /// Before authentication, on a page that allows it.
    Early,
    /// After authentication; supersedes the early injection.
    Late,
}

/// Fetches and applies live patches to the injected client API.
#[async_trait::async_trait]
pub trait PatchManager: Send + Sync + Debug {
    /// Downloads the current patch. Called early and awaited late.
    async fn fetch_patch(&self, config: &SessionConfig) -> Result<Patch, CollaboratorError>;

    /// Applies a fetched patch to the page.
    async fn apply_patch(&self, page: &dyn Page, patch: Patch) -> Result<(), CollaboratorError> {
        if patch.source.is_empty() {
            return Ok(());
        }
        page.evaluate_script(&patch.source).await?;
        Ok(())
    }

    /// Checks that the client API methods behave.
    ///
    /// # Returns
    /// - `Ok(true)` if every checked method works.
    /// - `Ok(false)` if some are broken.
    async fn integrity_check(&self, _page: &dyn Page) -> Result<bool, CollaboratorError> {
        Ok(true)
    }
}

/// Fetches and applies license tokens.
#[async_trait::async_trait]
pub trait LicenseManager: Send + Sync + Debug {
    /// Looks up the license for `account_id`, if there is one.
    async fn fetch_license(
        &self,
        config: &SessionConfig,
        account_id: &str,
    ) -> Result<Option<License>, CollaboratorError>;

    /// Applies a license to the page.
    async fn apply_license(
        &self,
        page: &dyn Page,
        _config: &SessionConfig,
        _account_id: &str,
        license: Option<License>,
    ) -> Result<(), CollaboratorError> {
        if let Some(license) = license.filter(|l| !l.source.is_empty()) {
            page.evaluate_script(&license.source).await?;
        }
        Ok(())
    }
}

/// Injects the client API bundle into the page.
#[async_trait::async_trait]
pub trait ApiInjector: Send + Sync + Debug {
    /// Whether the page already allows the early injection.
    async fn can_inject_early(&self, page: &dyn Page) -> Result<bool, PageError> {
        Ok(is_truthy(&page.evaluate_script(scripts::EARLY_INJECTION_CHECK).await?))
    }

    async fn inject(&self, page: &dyn Page, stage: InjectionStage) -> Result<(), CollaboratorError>;

    /// Installs the page-side handlers that forward internal client events.
    async fn install_event_hooks(&self, _page: &dyn Page) -> Result<(), CollaboratorError> {
        Ok(())
    }
}

/// Hosts rendered QR images behind a shareable URL.
#[async_trait::async_trait]
pub trait QrRelay: Send + Sync + Debug {
    /// Uploads `image`, replacing the image stored under `hash`.
    ///
    /// # Returns
    /// The hash the image is now stored under.
    async fn upload(&self, image: &str, hash: &str) -> Result<String, CollaboratorError>;

    fn share_url(&self, hash: &str) -> String;
}

/// Backs up session data to external storage.
#[async_trait::async_trait]
pub trait SessionBackup: Send + Sync + Debug {
    /// Uploads `session_data` (base64) using the base64 JSON `bucket_auth`.
    async fn upload(
        &self,
        session_id: &str,
        bucket_auth: &str,
        session_data: &str,
    ) -> Result<(), CollaboratorError>;
}

/// Terminates the hosting process.
pub trait ProcessControl: Send + Sync + Debug {
    fn exit(&self, reason: &str);
}

/// Exits the process with status 1.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessExit;

impl ProcessControl for ProcessExit {
    fn exit(&self, reason: &str) {
        error!("Shutting down: {}", reason);
        std::process::exit(1);
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoPatches;

#[async_trait::async_trait]
impl PatchManager for NoPatches {
    async fn fetch_patch(&self, _config: &SessionConfig) -> Result<Patch, CollaboratorError> {
        Ok(Patch::default())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoLicense;

#[async_trait::async_trait]
impl LicenseManager for NoLicense {
    async fn fetch_license(
        &self,
        _config: &SessionConfig,
        _account_id: &str,
    ) -> Result<Option<License>, CollaboratorError> {
        Ok(None)
    }
}

/// Evaluates a pre-built client API bundle in the page.
#[derive(Debug, Clone, Default)]
pub struct ScriptInjector {
    pub early: String,
    pub late: String,
    pub event_hooks: Option<String>,
}

#[async_trait::async_trait]
impl ApiInjector for ScriptInjector {
    async fn inject(&self, page: &dyn Page, stage: InjectionStage) -> Result<(), CollaboratorError> {
        let source = match stage {
            InjectionStage::Early => &self.early,
            InjectionStage::Late => &self.late,
        };
        if !source.is_empty() {
            page.evaluate_script(source).await?;
        }
        Ok(())
    }

    async fn install_event_hooks(&self, page: &dyn Page) -> Result<(), CollaboratorError> {
        if let Some(hooks) = &self.event_hooks {
            page.evaluate_script(hooks).await?;
        }
        Ok(())
    }
}

/// The full set of collaborators handed to the bootstrapper.
#[derive(Debug, Clone)]
pub struct Collaborators {
    pub injector: Arc<dyn ApiInjector>,
    pub patches: Arc<dyn PatchManager>,
    pub licenses: Arc<dyn LicenseManager>,
    pub relay: Option<Arc<dyn QrRelay>>,
    pub backup: Option<Arc<dyn SessionBackup>>,
    pub process: Arc<dyn ProcessControl>,
}

impl Collaborators {
    /// Collaborators with no patches, no license, no relay and no backup.
    pub fn new(injector: Arc<dyn ApiInjector>) -> Self {
        Self {
            injector,
            patches: Arc::new(NoPatches),
            licenses: Arc::new(NoLicense),
            relay: None,
            backup: None,
            process: Arc::new(ProcessExit),
        }
    }

    pub fn with_patches(mut self, patches: Arc<dyn PatchManager>) -> Self {
        self.patches = patches;
        self
    }

    pub fn with_licenses(mut self, licenses: Arc<dyn LicenseManager>) -> Self {
        self.licenses = licenses;
        self
    }

    pub fn with_relay(mut self, relay: Arc<dyn QrRelay>) -> Self {
        self.relay = Some(relay);
        self
    }

    pub fn with_backup(mut self, backup: Arc<dyn SessionBackup>) -> Self {
        self.backup = Some(backup);
        self
    }

    pub fn with_process(mut self, process: Arc<dyn ProcessControl>) -> Self {
        self.process = process;
        self
    }
}

/// A collaborator call started ahead of the point its result is needed.
///
/// Dropping an unjoined prefetch aborts it.
#[derive(Debug)]
pub struct Prefetch<T> {
    handle: Option<JoinHandle<Result<T, CollaboratorError>>>,
}

impl<T: Send + 'static> Prefetch<T> {
    pub fn spawn<F>(fetch: F) -> Self
    where
        F: Future<Output = Result<T, CollaboratorError>> + Send + 'static,
    {
        Self {
            handle: Some(tokio::spawn(fetch)),
        }
    }

    pub async fn join(mut self) -> Result<T, CollaboratorError> {
        match self.handle.take() {
            Some(handle) => handle
                .await
                .map_err(|e| CollaboratorError::Task(e.to_string()))?,
            None => Err(CollaboratorError::Task("prefetch already joined".into())),
        }
    }
}

impl<T> Drop for Prefetch<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            debug!("Discarding unused prefetch");
            handle.abort();
        }
    }
}
