/*
 * Reentrancy and affinity primitives shared by both engines.
 *
 * "Concurrency" in this subsystem means reentrancy from callbacks, never
 * parallelism: a component notified mid-transition may call straight back
 * into the engine on the same stack. Each guarded region holds a
 * `ReentryToken` for its duration; a refused acquisition tells the caller
 * to treat the call as an expected no-op rather than an error.
 */

use std::cell::Cell;
use std::thread::ThreadId;

use crate::error::{AxError, Result as AxResult};

/*
 * Non-reentrant execution token. Mirrors the RAII scroll-suppression guard
 * the windowing layer uses: acquisition marks the region, drop releases it.
 */
#[derive(Debug, Default)]
pub(crate) struct ReentryGate {
    held: Cell<bool>,
}

impl ReentryGate {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Acquire the gate, or `None` if the region is already executing on
    /// this stack. [ODU-ReentryGateV1]
    pub(crate) fn try_enter(&self) -> Option<ReentryToken<'_>> {
        if self.held.get() {
            return None;
        }
        self.held.set(true);
        Some(ReentryToken { gate: self })
    }

    pub(crate) fn is_held(&self) -> bool {
        self.held.get()
    }
}

#[derive(Debug)]
pub(crate) struct ReentryToken<'a> {
    gate: &'a ReentryGate,
}

impl Drop for ReentryToken<'_> {
    fn drop(&mut self) {
        self.gate.held.set(false);
    }
}

/*
 * Captures the thread that created an engine and rejects use from any
 * other. The whole subsystem carries single-threaded-apartment affinity;
 * crossing threads is a fatal error, not a recoverable one.
 */
#[derive(Debug)]
pub(crate) struct SingleThreadAffinity {
    origin: ThreadId,
}

impl SingleThreadAffinity {
    pub(crate) fn capture() -> Self {
        Self {
            origin: std::thread::current().id(),
        }
    }

    pub(crate) fn ensure(&self) -> AxResult<()> {
        if std::thread::current().id() == self.origin {
            Ok(())
        } else {
            log::error!("Affinity: engine entered from a foreign thread");
            Err(AxError::WrongThread)
        }
    }
}

/*
 * Reference-counted freeze/thaw bookkeeping for event delivery. Nested
 * freezes must balance; a thaw past zero is an invariant violation.
 * [ODU-FreezeBalanceV1]
 */
#[derive(Debug, Default)]
pub(crate) struct FreezeCounter {
    count: Cell<u32>,
}

impl FreezeCounter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn freeze(&self) -> u32 {
        let next = self.count.get() + 1;
        self.count.set(next);
        next
    }

    pub(crate) fn thaw(&self) -> AxResult<u32> {
        let current = self.count.get();
        if current == 0 {
            return Err(AxError::Invariant(
                "event thaw without matching freeze".into(),
            ));
        }
        self.count.set(current - 1);
        Ok(current - 1)
    }

    pub(crate) fn frozen(&self) -> bool {
        self.count.get() > 0
    }
}
