//! Authentication state observers.
//!
//! Nothing here holds state: every function is a pure observation of the
//! page it is given.

use crate::race::Race;
use crate::scripts;
use log::{debug, info};
use sesame_core::SessionConfig;
use sesame_interfaces::{Page, PageError, WaitOptions};
use std::sync::Arc;
use std::time::Duration;

/// Outcome of the authentication race.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthenticationResult {
    /// The authenticated chat UI is present.
    Authenticated,
    /// A QR challenge has to be scanned.
    NeedsQr,
    /// Local credentials were invalidated by a logout on the host account (NUKE).
    CredentialsInvalid,
    /// The caller's bound elapsed first.
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObserverOptions {
    pub polling: Duration,
    /// Not reaching the landing page within this bound counts as needing a scan.
    pub landing_timeout: Option<Duration>,
}

impl Default for ObserverOptions {
    fn default() -> Self {
        Self {
            polling: WaitOptions::DEFAULT_POLLING,
            landing_timeout: None,
        }
    }
}

impl From<&SessionConfig> for ObserverOptions {
    fn from(config: &SessionConfig) -> Self {
        Self {
            landing_timeout: config.timeouts.landing,
            ..Default::default()
        }
    }
}

/// Races the needs-scan, inside-chat and credentials-invalid watchers.
///
/// Watchers wait forever; bound the call with [`observe`] when needed.
pub async fn is_authenticated(
    page: &Arc<dyn Page>,
    options: ObserverOptions,
) -> Result<AuthenticationResult, PageError> {
    let mut race = Race::new();

    race.spawn(needs_to_scan(page.clone(), options));

    let inside = page.clone();
    race.spawn(async move {
        inside
            .wait_for_function(scripts::INSIDE_CHAT, WaitOptions::forever(options.polling))
            .await
            .map(|_| AuthenticationResult::Authenticated)
    });

    let nuke = page.clone();
    race.spawn(async move {
        nuke.wait_for_function(
            scripts::SESSION_DATA_INVALID,
            WaitOptions::forever(options.polling),
        )
        .await
        .map(|_| AuthenticationResult::CredentialsInvalid)
    });

    let result = race.winner().await?;
    debug!("Authentication race on page {} settled: {:?}", page.id(), result);
    Ok(result)
}

/// [`is_authenticated`] bounded by `bound`; `None` waits forever.
pub async fn observe(
    page: &Arc<dyn Page>,
    options: ObserverOptions,
    bound: Option<Duration>,
) -> Result<AuthenticationResult, PageError> {
    match bound {
        Some(limit) => match tokio::time::timeout(limit, is_authenticated(page, options)).await {
            Ok(result) => result,
            Err(_) => {
                info!("Authentication did not settle within {:?}", limit);
                Ok(AuthenticationResult::TimedOut)
            }
        },
        None => is_authenticated(page, options).await,
    }
}

async fn needs_to_scan(
    page: Arc<dyn Page>,
    options: ObserverOptions,
) -> Result<AuthenticationResult, PageError> {
    let mut signals = Race::new();

    let refresh = page.clone();
    signals.spawn(async move {
        refresh
            .wait_for_function(scripts::QR_REFRESH, WaitOptions::forever(options.polling))
            .await
            .map(|_| ())
    });

    let canvas = page.clone();
    signals.spawn(async move {
        canvas
            .wait_for_function(scripts::QR_CANVAS, WaitOptions::forever(options.polling))
            .await
            .map(|_| ())
    });

    if let Some(bound) = options.landing_timeout {
        signals.spawn(async move {
            match page
                .wait_for_function(
                    scripts::LANDING_REACHED,
                    WaitOptions::bounded(options.polling, bound),
                )
                .await
            {
                Err(PageError::Timeout) => Ok(()),
                // Reaching the landing page says nothing either way
                Ok(_) => std::future::pending().await,
                Err(e) => Err(e),
            }
        });
    }

    signals.winner().await.map(|_| AuthenticationResult::NeedsQr)
}

/// Waits for the authenticated chat UI.
pub async fn wait_inside_chat(page: &dyn Page, polling: Duration) -> Result<(), PageError> {
    page.wait_for_function(scripts::INSIDE_CHAT, WaitOptions::forever(polling))
        .await
        .map(|_| ())
}

/// Whether the page reports it is trying to reach the phone.
///
/// Waits until it does; page errors count as "not out of reach".
pub async fn phone_is_out_of_reach(page: &dyn Page, polling: Duration) -> bool {
    page.wait_for_function(scripts::PHONE_OUT_OF_REACH, WaitOptions::forever(polling))
        .await
        .is_ok()
}

/// Waits up to `bound` for a resumed session to be ready for injection.
pub async fn wait_for_ripe_session(page: &dyn Page, bound: Duration) -> bool {
    page.wait_for_function(
        scripts::RIPE_SESSION,
        WaitOptions::bounded(WaitOptions::DEFAULT_POLLING, bound),
    )
    .await
    .is_ok()
}
