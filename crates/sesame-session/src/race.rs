//! First-result-wins racing of page watchers.
//!
//! Every contender runs as its own task and reports one result into a shared
//! completion channel. The first `Ok` wins; the shared cancellation token is
//! then fired and the remaining tasks are aborted, so a losing watcher can
//! never act after the race is decided. Dropping a `Race` (e.g. because an
//! outer timeout fired) cancels it the same way.

use log::debug;
use sesame_interfaces::PageError;
use std::future::Future;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

pub struct Race<T> {
    tx: mpsc::UnboundedSender<Result<T, PageError>>,
    rx: mpsc::UnboundedReceiver<Result<T, PageError>>,
    cancel: CancellationToken,
    tasks: JoinSet<()>,
    pending: usize,
}

impl<T: Send + 'static> Race<T> {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx,
            cancel: CancellationToken::new(),
            tasks: JoinSet::new(),
            pending: 0,
        }
    }

    /// Token fired once the race is decided or dropped.
    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Adds a contender.
    pub fn spawn<F>(&mut self, contender: F)
    where
        F: Future<Output = Result<T, PageError>> + Send + 'static,
    {
        let tx = self.tx.clone();
        let cancel = self.cancel.clone();
        self.tasks.spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                result = contender => {
                    // The receiver is gone once the race is decided
                    let _ = tx.send(result);
                }
            }
        });
        self.pending += 1;
    }

    /// Waits for the first contender to succeed.
    ///
    /// A failing contender only drops out of the race. If every contender
    /// fails, the last failure is returned.
    pub async fn winner(mut self) -> Result<T, PageError> {
        let mut last_error = None;
        while self.pending > 0 {
            match self.rx.recv().await {
                Some(Ok(value)) => {
                    self.cancel.cancel();
                    return Ok(value);
                }
                Some(Err(e)) => {
                    debug!("Race contender dropped out: {}", e);
                    self.pending -= 1;
                    last_error = Some(e);
                }
                None => break,
            }
        }
        Err(last_error.unwrap_or_else(|| PageError::InternalError("race had no contenders".into())))
    }
}

impl<T: Send + 'static> Default for Race<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for Race<T> {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.tasks.abort_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn first_success_wins_and_losers_are_silenced() {
        let loser_finished = Arc::new(AtomicBool::new(false));
        let mut race = Race::new();
        race.spawn(async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok("fast")
        });
        let flag = loser_finished.clone();
        race.spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            flag.store(true, Ordering::SeqCst);
            Ok("slow")
        });

        assert_eq!(race.winner().await.unwrap(), "fast");
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(!loser_finished.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn failures_only_drop_out() {
        let mut race = Race::new();
        race.spawn(async { Err(PageError::ScriptError("checkQrRefresh is not defined".into())) });
        race.spawn(async {
            tokio::time::sleep(Duration::from_secs(2)).await;
            Ok(7)
        });
        assert_eq!(race.winner().await.unwrap(), 7);
    }

    #[tokio::test]
    async fn all_failures_surface_the_last_error() {
        let mut race: Race<()> = Race::new();
        race.spawn(async { Err(PageError::TargetClosed) });
        assert_eq!(race.winner().await.unwrap_err(), PageError::TargetClosed);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_race_cancels_contenders() {
        let finished = Arc::new(AtomicBool::new(false));
        let mut race: Race<()> = Race::new();
        let token = race.token();
        let flag = finished.clone();
        race.spawn(async move {
            tokio::time::sleep(Duration::from_secs(60)).await;
            flag.store(true, Ordering::SeqCst);
            Ok(())
        });

        let bounded = tokio::time::timeout(Duration::from_secs(1), race.winner()).await;
        assert!(bounded.is_err());
        assert!(token.is_cancelled());
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(!finished.load(Ordering::SeqCst));
    }
}
