use crate::common::*;
use crate::error::PageError;
use serde_json::Value;
use std::fmt::Debug;
use tokio::sync::mpsc::UnboundedReceiver;

/// Represents a single remote, script-capable document session.
///
/// This trait provides a high-level, protocol-agnostic API for observing and
/// driving the content of the page the web client runs in. Implementations
/// must tolerate several concurrent callers (e.g. racing watchers) sharing
/// one handle.
#[async_trait::async_trait]
pub trait Page: Send + Sync + Debug {
    /// Returns the unique identifier for this page within its browser session.
    fn id(&self) -> String;

    /// Evaluates a JavaScript expression in the context of the page.
    ///
    /// # Arguments
    /// * `script` - The JavaScript expression to evaluate. Promises are awaited.
    ///
    /// # Returns
    /// - `Ok(serde_json::Value)` representing the result of the expression.
    /// - `Err(PageError)` if evaluation fails (e.g., script error, closed page).
    async fn evaluate_script(&self, script: &str) -> Result<Value, PageError>;

    /// Waits until a JavaScript predicate evaluates to a truthy value.
    ///
    /// The default implementation re-evaluates the predicate every
    /// `options.polling` through `evaluate_script`.
    ///
    /// # Arguments
    /// * `predicate` - The JavaScript expression to poll.
    /// * `options` - Polling interval and optional upper bound.
    ///
    /// # Returns
    /// - `Ok(Value)` holding the first truthy result.
    /// - `Err(PageError::Timeout)` if the bound elapses first.
    /// - `Err(PageError)` if an evaluation fails.
    async fn wait_for_function(
        &self,
        predicate: &str,
        options: WaitOptions,
    ) -> Result<Value, PageError> {
        let poll = async {
            loop {
                let value = self.evaluate_script(predicate).await?;
                if is_truthy(&value) {
                    return Ok::<Value, PageError>(value);
                }
                tokio::time::sleep(options.polling).await;
            }
        };
        match options.timeout {
            Some(limit) => tokio::time::timeout(limit, poll).await.map_err(|_| {
                log::debug!("Predicate on page {} still falsy after {:?}", self.id(), limit);
                PageError::Timeout
            })?,
            None => poll.await,
        }
    }

    /// Exposes a function named `name` on the page's `window`.
    ///
    /// Every invocation from page code delivers its first argument to the
    /// returned channel, in call order.
    ///
    /// # Returns
    /// - `Ok(UnboundedReceiver<Value>)` receiving the invocation payloads.
    /// - `Err(PageError)` if the binding cannot be installed.
    async fn expose_function(&self, name: &str) -> Result<UnboundedReceiver<Value>, PageError>;

    /// Gets version information about the browser hosting the page.
    async fn browser_version(&self) -> Result<String, PageError>;

    /// Takes a screenshot of the current page.
    ///
    /// # Arguments
    /// * `format` - The desired image format (Png, Jpeg).
    /// * `options` - Additional options for the screenshot (quality, clip, etc.).
    ///
    /// # Returns
    /// - `Ok(Vec<u8>)` containing the raw image bytes in the specified format.
    /// - `Err(PageError)` if taking the screenshot fails.
    async fn take_screenshot(
        &self,
        _format: ScreenshotFormat,
        _options: ScreenshotOptions,
    ) -> Result<Vec<u8>, PageError> {
        Err(PageError::NotSupported("take_screenshot".into()))
    }

    /// Subscribes to console messages and uncaught errors of the page.
    async fn subscribe_events(&self) -> Result<UnboundedReceiver<PageEvent>, PageError> {
        Err(PageError::NotSupported("subscribe_events".into()))
    }

    /// Closes this page. Pending operations on the page fail afterwards.
    ///
    /// # Returns
    /// - `Ok(())` on successful closure.
    /// - `Err(PageError)` if closing fails.
    async fn close(&self) -> Result<(), PageError>;

    /// Whether `close` has been called or the page has gone away.
    fn is_closed(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Debug, Default)]
    struct CountingPage {
        calls: Mutex<u32>,
        truthy_after: u32,
    }

    #[async_trait::async_trait]
    impl Page for CountingPage {
        fn id(&self) -> String {
            "counting".into()
        }

        async fn evaluate_script(&self, _script: &str) -> Result<Value, PageError> {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            if *calls > self.truthy_after {
                Ok(json!(*calls))
            } else {
                Ok(json!(false))
            }
        }

        async fn expose_function(&self, _name: &str) -> Result<UnboundedReceiver<Value>, PageError> {
            Err(PageError::NotSupported("expose_function".into()))
        }

        async fn browser_version(&self) -> Result<String, PageError> {
            Ok("Test/1.0".into())
        }

        async fn close(&self) -> Result<(), PageError> {
            Ok(())
        }

        fn is_closed(&self) -> bool {
            false
        }
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_function_returns_first_truthy_value() {
        let page = CountingPage {
            truthy_after: 3,
            ..Default::default()
        };
        let value = page
            .wait_for_function("x", WaitOptions::forever(Duration::from_millis(100)))
            .await
            .unwrap();
        assert_eq!(value, json!(4));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_function_times_out() {
        let page = CountingPage {
            truthy_after: u32::MAX,
            ..Default::default()
        };
        let err = page
            .wait_for_function(
                "x",
                WaitOptions::bounded(Duration::from_millis(200), Duration::from_secs(1)),
            )
            .await
            .unwrap_err();
        assert_eq!(err, PageError::Timeout);
    }
}
