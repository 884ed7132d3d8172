//! Idle timer that ends an authenticated session.

use std::{sync::Arc, time::Duration};

use tokio::{sync::Notify, task::JoinHandle, time::Instant};
use tracing::{debug, trace};

/// User input that counts as activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum ActivitySignal {
    PointerMove,
    KeyPress,
    Click,
    Scroll,
    TouchStart,
}

/// Armed inactivity timer.
///
/// At most one deadline is pending. Each [`touch`](Self::touch) pushes it back to the
/// full limit. When the deadline passes the callback runs once and the timer stops.
/// Dropping the watch cancels the timer and stops accepting activity.
#[derive(Debug)]
pub struct InactivityWatch {
    activity: Arc<Notify>,
    task: JoinHandle<()>,
    limit: Duration,
}

impl InactivityWatch {
    /// Arm a timer on the current tokio runtime.
    pub fn start<F>(limit: Duration, on_expire: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let activity = Arc::new(Notify::new());
        let signal = Arc::clone(&activity);
        let task = tokio::spawn(async move {
            let deadline = tokio::time::sleep(limit);
            tokio::pin!(deadline);
            loop {
                tokio::select! {
                    _ = &mut deadline => {
                        debug!(limit_secs = limit.as_secs(), "inactivity limit reached");
                        on_expire();
                        break;
                    }
                    _ = signal.notified() => {
                        deadline.as_mut().reset(Instant::now() + limit);
                    }
                }
            }
        });
        Self {
            activity,
            task,
            limit,
        }
    }

    /// Restart the countdown.
    pub fn touch(&self, signal: ActivitySignal) {
        trace!(?signal, "activity");
        self.activity.notify_one();
    }

    /// Configured idle limit.
    pub fn limit(&self) -> Duration {
        self.limit
    }

    /// `true` once the timer has fired or been cancelled.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for InactivityWatch {
    fn drop(&mut self) {
        self.task.abort();
    }
}
