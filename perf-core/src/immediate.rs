//! ``src/immediate.rs``
//! ============================================================================
//! # Deferred task queue of the host's execution context
//!
//! Work scheduled from a context that must not call back into the host
//! (collector hooks run mid-allocation) is handed off through a channel and
//! run later, in FIFO order, on the host's own context.
//!
//! Each task carries a [`CallbackFlags`] hint. An unreferenced task never
//! keeps the host loop alive on its own: [`ImmediateQueue::has_ref`] only
//! counts referenced tasks.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use crossbeam::channel::{Receiver, Sender, unbounded};
use tokio::{runtime::Handle, sync::Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Whether a scheduled task should keep the host loop alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackFlags {
    Refed,
    Unrefed,
}

type Task = Box<dyn FnOnce() + Send>;

struct Immediate {
    task: Task,
    flags: CallbackFlags,
}

pub struct ImmediateQueue {
    tx: Sender<Immediate>,
    rx: Receiver<Immediate>,
    refed: AtomicUsize,
    notify: Notify,
}

impl ImmediateQueue {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self {
            tx,
            rx,
            refed: AtomicUsize::new(0),
            notify: Notify::new(),
        }
    }

    /// Queue `task`; never runs it inline. Safe to call from any thread.
    pub fn set_immediate<F>(&self, task: F, flags: CallbackFlags)
    where
        F: FnOnce() + Send + 'static,
    {
        if flags == CallbackFlags::Refed {
            self.refed.fetch_add(1, Ordering::Relaxed);
        }

        // The receiver lives in `self`, so the channel cannot be disconnected.
        let _ = self.tx.send(Immediate {
            task: Box::new(task),
            flags,
        });
        self.notify.notify_one();
    }

    /// Run every task queued so far, oldest first. Returns how many ran.
    ///
    /// Tasks scheduled while draining run in this same pass.
    pub fn run_immediates(&self) -> usize {
        let mut ran = 0;
        while let Ok(immediate) = self.rx.try_recv() {
            if immediate.flags == CallbackFlags::Refed {
                self.refed.fetch_sub(1, Ordering::Relaxed);
            }
            (immediate.task)();
            ran += 1;
        }
        if ran > 0 {
            trace!(ran, "drained immediate queue");
        }
        ran
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// True while a referenced task is pending.
    pub fn has_ref(&self) -> bool {
        self.refed.load(Ordering::Relaxed) > 0
    }

    /// Drain the queue on a tokio runtime whenever tasks arrive.
    ///
    /// The returned token stops the pump; tasks still pending are left for
    /// the next manual [`Self::run_immediates`].
    pub fn spawn_pump(self: &Arc<Self>, runtime: &Handle) -> CancellationToken {
        let token = CancellationToken::new();
        let child = token.clone();
        let queue = Arc::clone(self);

        runtime.spawn(async move {
            loop {
                tokio::select! {
                    _ = child.cancelled() => break,
                    _ = queue.notify.notified() => {
                        queue.run_immediates();
                    }
                }
            }
            debug!("immediate queue pump stopped");
        });

        token
    }
}

impl Default for ImmediateQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ImmediateQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImmediateQueue")
            .field("pending", &self.len())
            .field("refed", &self.refed.load(Ordering::Relaxed))
            .finish()
    }
}
