//! Per-job control channel.
//!
//! The manager keeps a [`JobControl`] in its registry; the worker owns the
//! matching [`ControlHandle`]. Cancellation is a [`CancellationToken`] derived
//! from the engine's shutdown token, so a shutdown reaches every worker
//! through the same path as a user cancel. Pause is a level-triggered `watch`
//! flag the worker polls at checkpoints.

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Why a worker stopped before finishing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Stop {
    /// A user cancelled the job.
    Cancelled,
    /// The engine is shutting down.
    Interrupted,
}

/// Manager side of a job's control channel.
#[derive(Debug)]
pub(crate) struct JobControl {
    cancel: CancellationToken,
    pause: watch::Sender<bool>,
}

/// Worker side of a job's control channel.
#[derive(Debug)]
pub(crate) struct ControlHandle {
    cancel: CancellationToken,
    shutdown: CancellationToken,
    pause: watch::Receiver<bool>,
}

/// Creates a control channel whose cancel side also fires on `shutdown`.
pub(crate) fn channel(shutdown: &CancellationToken) -> (JobControl, ControlHandle) {
    let cancel = shutdown.child_token();
    let (pause_tx, pause_rx) = watch::channel(false);
    (
        JobControl {
            cancel: cancel.clone(),
            pause: pause_tx,
        },
        ControlHandle {
            cancel,
            shutdown: shutdown.clone(),
            pause: pause_rx,
        },
    )
}

impl JobControl {
    pub(crate) fn pause(&self) {
        self.pause.send_replace(true);
    }

    pub(crate) fn resume(&self) {
        self.pause.send_replace(false);
    }

    pub(crate) fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl ControlHandle {
    /// Returns the stop reason once cancellation has been requested.
    pub(crate) fn stopped(&self) -> Option<Stop> {
        if !self.cancel.is_cancelled() {
            None
        } else if self.shutdown.is_cancelled() {
            Some(Stop::Interrupted)
        } else {
            Some(Stop::Cancelled)
        }
    }

    pub(crate) fn pause_requested(&self) -> bool {
        *self.pause.borrow()
    }

    /// Blocks while the pause flag is set.
    ///
    /// Returns `None` once resumed, or the stop reason if the job is cancelled
    /// (or the manager goes away) in the meantime.
    pub(crate) async fn paused(&mut self) -> Option<Stop> {
        loop {
            if let Some(stop) = self.stopped() {
                return Some(stop);
            }
            if !*self.pause.borrow_and_update() {
                return None;
            }
            tokio::select! {
                () = self.cancel.cancelled() => {}
                changed = self.pause.changed() => {
                    if changed.is_err() {
                        return Some(Stop::Interrupted);
                    }
                }
            }
        }
    }
}
