//! Debounced search input.
//!
//! Keystrokes go in through [`DebouncedSearch::input`]; the settled query
//! comes out of the receiver once the input has been quiet for the
//! debounce interval.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

enum Input {
    Typed(String),
    Cleared,
}

pub struct DebouncedSearch {
    input: mpsc::UnboundedSender<Input>,
    task: JoinHandle<()>,
}

impl DebouncedSearch {
    pub fn new() -> (Self, watch::Receiver<String>) {
        Self::with_interval(DEFAULT_DEBOUNCE)
    }

    pub fn with_interval(interval: Duration) -> (Self, watch::Receiver<String>) {
        let (input, rx) = mpsc::unbounded_channel();
        let (emit, emitted) = watch::channel(String::new());
        let task = tokio::spawn(run(rx, emit, interval));
        (Self { input, task }, emitted)
    }

    /// Replaces the pending query and restarts the quiet period.
    pub fn input(&self, query: impl Into<String>) {
        let _ = self.input.send(Input::Typed(query.into()));
    }

    /// Drops any pending query and emits an empty one right away.
    pub fn clear(&self) {
        let _ = self.input.send(Input::Cleared);
    }
}

impl Drop for DebouncedSearch {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(
    mut rx: mpsc::UnboundedReceiver<Input>,
    emit: watch::Sender<String>,
    interval: Duration,
) {
    let mut pending: Option<(String, Instant)> = None;
    loop {
        let deadline = pending.as_ref().map(|(_, at)| *at);
        tokio::select! {
            message = rx.recv() => match message {
                Some(Input::Typed(query)) => {
                    pending = Some((query, Instant::now() + interval));
                }
                Some(Input::Cleared) => {
                    pending = None;
                    emit.send_replace(String::new());
                }
                None => break,
            },
            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                if let Some((query, _)) = pending.take() {
                    emit.send_replace(query.trim().to_string());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn emits_once_with_the_final_query() {
        let (search, mut emitted) = DebouncedSearch::new();
        for query in ["a", "av", "ave", "ave m", "ave maria"] {
            search.input(query);
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(!emitted.has_changed().unwrap());

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(emitted.has_changed().unwrap());
        assert_eq!(*emitted.borrow_and_update(), "ave maria");

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!emitted.has_changed().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn clear_emits_immediately_and_cancels_pending() {
        let (search, mut emitted) = DebouncedSearch::new();
        search.input("salve");
        tokio::time::sleep(Duration::from_millis(50)).await;
        search.clear();
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(emitted.has_changed().unwrap());
        assert_eq!(*emitted.borrow_and_update(), "");

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!emitted.has_changed().unwrap());
    }
}
