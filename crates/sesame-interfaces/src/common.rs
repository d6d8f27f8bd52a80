use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Represents a message logged to the page's console.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConsoleMessage {
    pub level: ConsoleLogLevel,
    pub text: String,
}

/// Severity level of a console message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ConsoleLogLevel {
    Log,
    Debug,
    Info,
    Warning,
    Error,
}

/// Events a page reports back to its host after `subscribe_events`.
#[derive(Debug, Clone, PartialEq)]
pub enum PageEvent {
    Console(ConsoleMessage),
    /// An uncaught error thrown inside the page, or the page crashing.
    Error(String),
}

/// Available formats for taking screenshots.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ScreenshotFormat {
    Png,
    Jpeg,
}

impl ScreenshotFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ScreenshotFormat::Png => "png",
            ScreenshotFormat::Jpeg => "jpg",
        }
    }
}

/// Options for taking a screenshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ScreenshotOptions {
    /// Capture the full scrollable page rather than the viewport.
    pub full_page: Option<bool>,
    /// Specify a specific area to capture.
    pub clip: Option<Clip>,
    /// Quality of the image (0-100). Only applicable to Jpeg.
    pub quality: Option<u8>,
}

/// Specifies a rectangular area.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Clip {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Polling settings for `Page::wait_for_function`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    /// Delay between two evaluations of the predicate.
    pub polling: Duration,
    /// Upper bound for the whole wait. `None` waits forever.
    pub timeout: Option<Duration>,
}

impl WaitOptions {
    pub const DEFAULT_POLLING: Duration = Duration::from_millis(1000);

    /// Poll every `polling` without an upper bound.
    pub fn forever(polling: Duration) -> Self {
        Self {
            polling,
            timeout: None,
        }
    }

    /// Poll every `polling` for at most `timeout`.
    pub fn bounded(polling: Duration, timeout: Duration) -> Self {
        Self {
            polling,
            timeout: Some(timeout),
        }
    }
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self::forever(Self::DEFAULT_POLLING)
    }
}

/// JavaScript truthiness of a value returned from the page.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
