//! Diagnostic screenshots.

use log::{info, warn};
use sesame_core::SessionConfig;
use sesame_interfaces::{Page, ScreenshotFormat, ScreenshotOptions};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Writes screenshots to `<screenshot_dir>/<session id>/<attempt start>/<ts>.jpg`.
///
/// Capturing is best-effort: failures are logged and otherwise ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screenshots {
    dir: PathBuf,
}

impl Screenshots {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn for_session(config: &SessionConfig) -> Self {
        Self::new(
            config
                .screenshot_dir
                .join(&config.id)
                .join(now_millis().to_string()),
        )
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Captures `page`, returning where the image was written.
    pub async fn capture(&self, page: &dyn Page) -> Option<PathBuf> {
        if page.is_closed() {
            return None;
        }
        let format = ScreenshotFormat::Jpeg;
        let image = match page.take_screenshot(format, ScreenshotOptions::default()).await {
            Ok(image) => image,
            Err(e) => {
                warn!("Could not take a diagnostic screenshot: {}", e);
                return None;
            }
        };

        let path = self
            .dir
            .join(format!("{}.{}", now_millis(), format.extension()));
        let written = async {
            tokio::fs::create_dir_all(&self.dir).await?;
            tokio::fs::write(&path, image).await
        }
        .await;

        match written {
            Ok(()) => {
                info!("Screenshot taken. path: {}", path.display());
                Some(path)
            }
            Err(e) => {
                warn!("Could not write screenshot to {}: {}", path.display(), e);
                None
            }
        }
    }
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}
