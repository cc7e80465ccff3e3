//! Resize notification shared between the event handler and the frame loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cheap, clonable flag raised by the window event handler and consumed by
/// the frame loop once per iteration.
///
/// Both sides hold a clone; no back-pointer from the window to the renderer
/// is needed.
#[derive(Clone, Debug, Default)]
pub struct ResizeSignal {
    pending: Arc<AtomicBool>,
}

impl ResizeSignal {
    /// Creates a signal with no pending notification.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that the framebuffer size changed.
    #[inline]
    pub fn notify(&self) {
        self.pending.store(true, Ordering::Release);
    }

    /// Returns whether a notification is pending and clears it.
    #[inline]
    pub fn take(&self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }

    /// Returns whether a notification is pending without clearing it.
    #[inline]
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_clears_pending() {
        let signal = ResizeSignal::new();
        assert!(!signal.take());

        signal.notify();
        assert!(signal.is_pending());
        assert!(signal.take());
        assert!(!signal.take());
    }

    #[test]
    fn test_clones_share_state() {
        let window_side = ResizeSignal::new();
        let renderer_side = window_side.clone();

        window_side.notify();
        window_side.notify();
        assert!(renderer_side.take());
        assert!(!window_side.is_pending());
    }

    #[test]
    fn test_resize_signal_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ResizeSignal>();
    }
}
