use crate::error::PageError;
use crate::page::Page;
use std::fmt::Debug;
use std::path::PathBuf;
use std::sync::Arc;

/// Everything a launcher needs to open the web client for one session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LaunchRequest {
    pub session_id: String,
    pub multi_device: bool,
    /// Base64 credentials to seed the page's local storage with, if any.
    pub session_data: Option<String>,
    pub user_data_dir: Option<PathBuf>,
    pub headless: bool,
    pub args: Vec<String>,
}

/// Opens pages for the session bootstrapper.
///
/// Launching a browser, navigating to the web client and seeding local
/// storage all happen behind this trait; the bootstrapper only ever sees the
/// resulting `Page`.
#[async_trait::async_trait]
pub trait PageLauncher: Send + Sync + Debug {
    /// Opens a fresh page for the session described by `request`.
    ///
    /// # Returns
    /// - `Ok(Arc<dyn Page>)` once the web client has started loading.
    /// - `Err(PageError)` if the browser or page could not be started.
    async fn open(&self, request: &LaunchRequest) -> Result<Arc<dyn Page>, PageError>;
}
