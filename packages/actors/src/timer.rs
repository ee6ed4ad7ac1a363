//! Periodic message delivery to an actor.

use std::time::Duration;

use ractor::{ActorRef, Message};
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};

/// Sends a message to an actor every `period`, starting one period from now.
///
/// The timer task ends when the handle is stopped or dropped, or when the
/// actor is gone.
#[derive(Debug)]
pub struct TimerHandle {
    task: JoinHandle<()>,
    period: Duration,
}

impl TimerHandle {
    pub fn start<M, F>(actor: ActorRef<M>, period: Duration, make_message: F) -> Self
    where
        M: Message,
        F: Fn() -> M + Send + 'static,
    {
        let task = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            loop {
                interval.tick().await;
                if actor.send_message(make_message()).is_err() {
                    break;
                }
            }
        });
        Self { task, period }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Cancel the timer. Messages already delivered to the mailbox stay
    /// there; receivers tag them to tell stale ones apart.
    pub fn stop(self) {
        self.task.abort();
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
