//! Cancelable one-shot retry timer.
//!
//! Firing is delivered as a [`RetryTick`] on the owner's input queue rather
//! than as a callback, so the owner handles it on its own task. Each schedule
//! gets a fresh generation; ticks from a canceled or replaced timer are
//! rejected by [`RetryTimer::fire`] even if they were already queued.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryTick {
    generation: u64,
}

#[derive(Debug, Default)]
pub struct RetryTimer {
    generation: u64,
    pending: Option<JoinHandle<()>>,
}

impl RetryTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Arm the timer, replacing any pending one.
    pub fn schedule<T>(&mut self, delay: Duration, inputs: mpsc::UnboundedSender<T>)
    where
        T: From<RetryTick> + Send + 'static,
    {
        self.cancel();
        let tick = RetryTick {
            generation: self.generation,
        };
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = inputs.send(T::from(tick));
        }));
    }

    /// Disarm. Returns whether a timer was pending.
    pub fn cancel(&mut self) -> bool {
        self.generation += 1;
        match self.pending.take() {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Accept a tick if it belongs to the currently armed timer.
    pub fn fire(&mut self, tick: RetryTick) -> bool {
        if self.pending.is_none() || tick.generation != self.generation {
            return false;
        }
        self.pending = None;
        self.generation += 1;
        true
    }
}

impl Drop for RetryTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
