//! One-shot vsync wait flag shared between a waiting thread and the
//! end-of-frame interrupt.

use core::sync::atomic::{AtomicBool, Ordering};

/// The waiter arms the flag and sleeps on an event; the frame interrupt
/// clears it and raises the event. A spurious wakeup leaves the flag set,
/// so the waiter loops until it observes the clear.
pub struct VsyncFlag {
    waiting: AtomicBool,
}

impl VsyncFlag {
    pub const fn new() -> Self {
        Self {
            waiting: AtomicBool::new(false),
        }
    }

    pub fn arm(&self) {
        self.waiting.store(true, Ordering::Release);
    }

    pub fn is_waiting(&self) -> bool {
        self.waiting.load(Ordering::Acquire)
    }

    /// Called from the frame interrupt. Returns whether anyone was armed.
    pub fn complete(&self) -> bool {
        self.waiting.swap(false, Ordering::AcqRel)
    }
}

impl Default for VsyncFlag {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arm_then_complete() {
        let flag = VsyncFlag::new();
        assert!(!flag.is_waiting());
        flag.arm();
        assert!(flag.is_waiting());
        assert!(flag.complete());
        assert!(!flag.is_waiting());
        // A frame with no waiter reports nothing to wake.
        assert!(!flag.complete());
    }
}
