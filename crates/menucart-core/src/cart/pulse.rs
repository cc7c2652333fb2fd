use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use super::store::CartEvent;

/// How long the cart badge stays highlighted after the last pulse.
pub const PULSE_DURATION: Duration = Duration::from_millis(500);

/// One-shot highlight flag for the cart badge.
///
/// Turns on with every `CartEvent::Pulse` and off once `duration` has passed
/// since the most recent one. Pulses arriving while it is on just push the
/// deadline out; they never queue.
pub struct BadgePulse {
    active: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl BadgePulse {
    pub fn spawn(events: broadcast::Receiver<CartEvent>) -> Self {
        Self::with_duration(events, PULSE_DURATION)
    }

    pub fn with_duration(mut events: broadcast::Receiver<CartEvent>, duration: Duration) -> Self {
        let active = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&active);

        let task = tokio::spawn(async move {
            let mut deadline: Option<Instant> = None;

            loop {
                let expiry = async move {
                    match deadline {
                        Some(at) => tokio::time::sleep_until(at).await,
                        None => std::future::pending().await,
                    }
                };

                tokio::select! {
                    event = events.recv() => match event {
                        Ok(CartEvent::Pulse) => {
                            flag.store(true, Ordering::SeqCst);
                            deadline = Some(Instant::now() + duration);
                        }
                        Ok(CartEvent::Changed { .. }) => {}
                        Err(RecvError::Lagged(skipped)) => {
                            // Missed events may have been pulses
                            debug!(skipped = skipped, "Badge pulse lagged behind cart events");
                            flag.store(true, Ordering::SeqCst);
                            deadline = Some(Instant::now() + duration);
                        }
                        Err(RecvError::Closed) => {
                            if let Some(at) = deadline {
                                tokio::time::sleep_until(at).await;
                            }
                            flag.store(false, Ordering::SeqCst);
                            break;
                        }
                    },
                    () = expiry => {
                        flag.store(false, Ordering::SeqCst);
                        deadline = None;
                    }
                }
            }
        });

        Self { active, task }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

impl Drop for BadgePulse {
    fn drop(&mut self) {
        self.task.abort();
    }
}
