//! Debounce controller for free-text search input.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, warn};

/// Coalesces bursts of values and delivers the last one after a quiet period.
///
/// Each push restarts the timer. A superseded value is never delivered; the
/// latest value is delivered exactly once, including when the debouncer is
/// dropped while it is still pending.
pub struct Debouncer<T> {
    tx: mpsc::UnboundedSender<T>,
    task: JoinHandle<()>,
}

impl<T: Send + 'static> Debouncer<T> {
    pub fn spawn<F>(quiet: Duration, sink: F) -> Self
    where
        F: FnMut(T) + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(rx, quiet, sink));
        Self { tx, task }
    }

    pub fn push(&self, value: T) {
        if self.tx.send(value).is_err() {
            warn!("Debounce task stopped; value discarded");
        }
    }

    /// Close the input and wait until a pending value has been delivered.
    pub async fn finish(self) {
        let Self { tx, task } = self;
        drop(tx);
        if let Err(err) = task.await {
            warn!(error = %err, "Debounce task ended abnormally");
        }
    }
}

async fn run<T, F>(mut rx: mpsc::UnboundedReceiver<T>, quiet: Duration, mut sink: F)
where
    F: FnMut(T),
{
    let mut pending: Option<(T, Instant)> = None;
    loop {
        match pending.take() {
            None => match rx.recv().await {
                Some(value) => pending = Some((value, Instant::now() + quiet)),
                None => break,
            },
            Some((value, deadline)) => {
                tokio::select! {
                    next = rx.recv() => match next {
                        Some(newer) => {
                            debug!("Debounced value superseded");
                            pending = Some((newer, Instant::now() + quiet));
                        }
                        None => {
                            sleep_until(deadline).await;
                            sink(value);
                            break;
                        }
                    },
                    () = sleep_until(deadline) => sink(value),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collector() -> (
        impl FnMut(String) + Send + 'static,
        mpsc::UnboundedReceiver<String>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            move |value: String| {
                let _ = tx.send(value);
            },
            rx,
        )
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<String> {
        let mut values = Vec::new();
        while let Ok(value) = rx.try_recv() {
            values.push(value);
        }
        values
    }

    #[tokio::test(start_paused = true)]
    async fn typed_then_cleared_within_window_delivers_only_empty() {
        let (sink, mut rx) = collector();
        let debouncer = Debouncer::spawn(Duration::from_millis(300), sink);

        for text in ["w", "wa", "wat", "wate", "water", ""] {
            debouncer.push(text.to_string());
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        tokio::time::sleep(Duration::from_millis(400)).await;

        assert_eq!(drain(&mut rx), vec![String::new()]);
        debouncer.finish().await;
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn values_separated_by_quiet_period_are_each_delivered() {
        let (sink, mut rx) = collector();
        let debouncer = Debouncer::spawn(Duration::from_millis(300), sink);

        debouncer.push("gym".to_string());
        tokio::time::sleep(Duration::from_millis(350)).await;
        debouncer.push("dentist".to_string());
        tokio::time::sleep(Duration::from_millis(350)).await;

        assert_eq!(drain(&mut rx), vec!["gym".to_string(), "dentist".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_is_delivered_before_the_quiet_period() {
        let (sink, mut rx) = collector();
        let debouncer = Debouncer::spawn(Duration::from_millis(300), sink);

        debouncer.push("water".to_string());
        tokio::time::sleep(Duration::from_millis(299)).await;
        assert!(drain(&mut rx).is_empty());

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(drain(&mut rx), vec!["water".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn pending_value_survives_drop() {
        let (sink, mut rx) = collector();
        let debouncer = Debouncer::spawn(Duration::from_millis(300), sink);

        debouncer.push("stretch".to_string());
        drop(debouncer);
        tokio::time::sleep(Duration::from_millis(400)).await;

        assert_eq!(drain(&mut rx), vec!["stretch".to_string()]);
    }
}
