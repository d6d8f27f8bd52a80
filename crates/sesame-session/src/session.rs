use crate::credentials::SessionCredentials;
use crate::debug_info::DebugInfo;
use log::{Level, debug, log};
use sesame_core::SessionConfig;
use sesame_interfaces::{ConsoleLogLevel, Page, PageError, PageEvent};
use std::fmt;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// A live, authenticated session handed back by the bootstrapper.
pub struct Session {
    page: Arc<dyn Page>,
    config: SessionConfig,
    debug_info: DebugInfo,
    credentials: SessionCredentials,
    page_logging: Option<JoinHandle<()>>,
    crashed: Option<oneshot::Receiver<String>>,
}

impl Session {
    pub(crate) fn new(
        page: Arc<dyn Page>,
        config: SessionConfig,
        debug_info: DebugInfo,
        credentials: SessionCredentials,
        page_logging: Option<PageLogging>,
    ) -> Self {
        let (page_logging, crashed) = match page_logging {
            Some(logging) => (Some(logging.task), logging.crashed),
            None => (None, None),
        };
        Self {
            page,
            config,
            debug_info,
            credentials,
            page_logging,
            crashed,
        }
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn page(&self) -> &Arc<dyn Page> {
        &self.page
    }

    /// The configuration the successful attempt ran with.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn debug_info(&self) -> &DebugInfo {
        &self.debug_info
    }

    pub fn credentials(&self) -> &SessionCredentials {
        &self.credentials
    }

    /// Resolves with the page error once the page crashes. Only present when
    /// `restart_on_crash` is set, and only handed out once.
    pub fn take_crash_signal(&mut self) -> Option<oneshot::Receiver<String>> {
        self.crashed.take()
    }

    /// Closes the page and stops forwarding its console.
    pub async fn close(mut self) -> Result<(), PageError> {
        if let Some(handle) = self.page_logging.take() {
            handle.abort();
        }
        self.page.close().await
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.config.id)
            .field("page", &self.page.id())
            .field("multi_device", &self.config.multi_device)
            .finish()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(handle) = self.page_logging.take() {
            handle.abort();
        }
    }
}

/// Console forwarding task of a ready page.
pub(crate) struct PageLogging {
    task: JoinHandle<()>,
    crashed: Option<oneshot::Receiver<String>>,
}

/// Level a page event is forwarded at.
pub(crate) fn forwarded_level(event: &PageEvent, config: &SessionConfig) -> Level {
    let is_error = match event {
        PageEvent::Console(msg) => msg.level == ConsoleLogLevel::Error,
        PageEvent::Error(_) => true,
    };
    match (is_error, config.log_console_errors, config.log_console) {
        (true, true, _) => Level::Error,
        (false, _, true) => Level::Info,
        _ => Level::Debug,
    }
}

/// Forwards page console output and errors to the log until the page goes away.
///
/// With `restart_on_crash`, the first page error also fires the crash signal.
pub(crate) async fn forward_page_logs(page: &dyn Page, config: &SessionConfig) -> Option<PageLogging> {
    let mut events = match page.subscribe_events().await {
        Ok(rx) => rx,
        Err(e) => {
            debug!("Page console forwarding unavailable: {}", e);
            return None;
        }
    };
    let (mut crash_tx, crashed) = if config.restart_on_crash {
        let (tx, rx) = oneshot::channel();
        (Some(tx), Some(rx))
    } else {
        (None, None)
    };
    let config = config.clone();
    let task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let level = forwarded_level(&event, &config);
            match event {
                PageEvent::Console(msg) => log!(level, "[{}] Page Console: {}", config.id, msg.text),
                PageEvent::Error(text) => {
                    log!(level, "[{}] Page Console Error: {}", config.id, text);
                    if let Some(tx) = crash_tx.take() {
                        // Nobody is watching once the session is gone
                        let _ = tx.send(text);
                    }
                }
            }
        }
    });
    Some(PageLogging { task, crashed })
}
