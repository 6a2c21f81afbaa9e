use crate::api::{StatusSnapshot, WorkflowClient};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;

/// Event delivered from the polling thread to the controller's event loop.
#[derive(Debug, Clone)]
pub enum PollEvent {
    Snapshot(StatusSnapshot),
    TransportError {
        conversation_id: String,
        message: String,
    },
}

/// Owned handle to one polling cycle. Cancellation stops scheduling
/// synchronously; a fetch already in flight is left to finish and its late
/// event is discarded by the session's staleness check.
#[derive(Debug)]
pub struct PollingHandle {
    stop: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl PollingHandle {
    /// Stops scheduling further fetches. Idempotent; cancelling an already
    /// cancelled handle is a no-op.
    pub fn cancel(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    /// Cancels and waits for the polling thread to exit.
    pub fn shutdown(mut self) {
        self.cancel();
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for PollingHandle {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

fn sleep_with_stop(stop: &AtomicBool, total: Duration) -> bool {
    let mut remaining = total;
    while remaining > Duration::from_millis(0) {
        if stop.load(Ordering::Relaxed) {
            return false;
        }
        let step = remaining.min(Duration::from_millis(200));
        thread::sleep(step);
        remaining = remaining.saturating_sub(step);
    }
    !stop.load(Ordering::Relaxed)
}

/// Starts a polling cycle for one conversation: an immediate status fetch,
/// then one per interval. The cycle self-cancels after delivering a terminal
/// snapshot, after any transport error, or when the receiving side goes away.
pub fn start_polling(
    client: WorkflowClient,
    conversation_id: String,
    interval: Duration,
    events: Sender<PollEvent>,
) -> PollingHandle {
    let stop = Arc::new(AtomicBool::new(false));
    let stop_for_thread = Arc::clone(&stop);

    let thread = thread::spawn(move || loop {
        if stop_for_thread.load(Ordering::Relaxed) {
            break;
        }
        match client.status(&conversation_id) {
            Ok(snapshot) => {
                let terminal = snapshot.status.is_terminal();
                if events.send(PollEvent::Snapshot(snapshot)).is_err() {
                    break;
                }
                if terminal {
                    stop_for_thread.store(true, Ordering::Relaxed);
                    break;
                }
            }
            Err(err) => {
                let _ = events.send(PollEvent::TransportError {
                    conversation_id: conversation_id.clone(),
                    message: err.to_string(),
                });
                stop_for_thread.store(true, Ordering::Relaxed);
                break;
            }
        }
        if !sleep_with_stop(&stop_for_thread, interval) {
            break;
        }
    });

    PollingHandle {
        stop,
        thread: Some(thread),
    }
}
