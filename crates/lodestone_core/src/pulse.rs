//! Fixed-rate tick source.
//!
//! A pulse runs on its own task and emits the current instant on a channel of
//! capacity one, then sleeps for whatever is left of the rate. A tick is never
//! queued behind one the consumer has not taken yet: a due tick that finds the
//! channel full is skipped, and the next one comes a full period after the
//! consumer catches up. Stopping the pulse closes the channel.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, trace};

/// Receiving end of a pulse. Yields `None` once the pulse has stopped.
pub type Ticks = mpsc::Receiver<Instant>;

/// Controls a running pulse.
#[derive(Debug)]
pub struct PulseHandle {
    stop: Arc<Notify>,
    task: JoinHandle<()>,
}

impl PulseHandle {
    /// Asks the pulse to stop. The tick channel closes once the loop exits.
    pub fn stop(&self) {
        self.stop.notify_one();
    }

    /// Stops the pulse and waits for its task to finish.
    pub async fn shutdown(self) {
        self.stop();
        if let Err(e) = self.task.await {
            debug!("Pulse task ended abnormally: {}", e);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Starts a pulse emitting roughly every `rate`.
///
/// Must be called from within a tokio runtime.
pub fn start(rate: Duration) -> (PulseHandle, Ticks) {
    let (tx, rx) = mpsc::channel(1);
    let stop = Arc::new(Notify::new());
    let task = tokio::spawn(run(rate, tx, stop.clone()));
    info!("💓 Pulse started at {:?} per tick", rate);
    (PulseHandle { stop, task }, rx)
}

async fn run(rate: Duration, tx: mpsc::Sender<Instant>, stop: Arc<Notify>) {
    let mut emitted: u64 = 0;
    let mut due = Instant::now();
    loop {
        tokio::select! {
            biased;
            _ = stop.notified() => break,
            _ = sleep_until(due) => {}
        }

        match tx.try_reserve() {
            Ok(permit) => {
                let emitted_at = Instant::now();
                permit.send(emitted_at);
                emitted += 1;
                due = emitted_at + rate;
            }
            Err(TrySendError::Full(())) => {
                // The last tick is still queued. Skip this one and restart the
                // period once the consumer has taken it.
                trace!("Tick skipped, consumer behind");
                tokio::select! {
                    biased;
                    _ = stop.notified() => break,
                    permit = tx.reserve() => match permit {
                        Ok(permit) => drop(permit),
                        Err(_) => {
                            debug!("Tick receiver dropped");
                            break;
                        }
                    }
                }
                due = Instant::now() + rate;
            }
            Err(TrySendError::Closed(())) => {
                debug!("Tick receiver dropped");
                break;
            }
        }
    }
    info!("💤 Pulse stopped after {} ticks", emitted);
}
