//! One-at-a-time gate for chooser dialogs.
//!
//! Each chooser instance owns a [`ChooserGate`] with a single permit. A
//! request that finds the permit taken is answered with "no selection"
//! immediately; requests are never queued. Gates are independent, so two
//! different choosers may be open at once.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

#[derive(Debug)]
pub struct ChooserGate {
    name: String,
    open: AtomicBool,
}

/// RAII permit for an open chooser. Dropping it closes the chooser.
#[derive(Debug)]
pub struct ChooserPermit<'a> {
    gate: &'a ChooserGate,
}

impl ChooserGate {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            open: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether a chooser behind this gate is currently open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Take the permit without waiting.
    #[must_use]
    pub fn try_acquire(&self) -> Option<ChooserPermit<'_>> {
        self.open
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ChooserPermit { gate: self })
    }

    /// Run `choose` while holding the permit.
    ///
    /// Returns `None` without calling `choose` when the chooser is already
    /// open, and otherwise whatever `choose` selected.
    pub fn try_choose<T>(&self, choose: impl FnOnce() -> Option<T>) -> Option<T> {
        let Some(_permit) = self.try_acquire() else {
            debug!(chooser = %self.name, "chooser already open; no selection");
            return None;
        };
        choose()
    }
}

impl ChooserPermit<'_> {
    /// Close the chooser. Also happens on drop.
    pub fn release(self) {}
}

impl Drop for ChooserPermit<'_> {
    fn drop(&mut self) {
        self.gate.open.store(false, Ordering::Release);
    }
}
