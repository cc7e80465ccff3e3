//! Frame pacing across the frames in flight.
//!
//! [`FrameScheduler`] owns the slot rotation and the pending-recreation flag
//! and drives one iteration of the render loop through a [`FrameBackend`].
//! The backend does the Vulkan work; the scheduler decides the order, when
//! the swapchain must be rebuilt and when the slot index moves on.
//!
//! One iteration:
//!
//! 1. Retry a recreation deferred by an earlier iteration (zero-area window).
//! 2. Wait for the slot's fence.
//! 3. Acquire an image. Out of date: rebuild and return without advancing.
//! 4. Record, submit (the fence is reset right before the submit) and present.
//! 5. Rebuild once if present was not optimal, the acquire was suboptimal or
//!    the window was resized.
//! 6. Advance to the next slot.

use tracing::{debug, warn};
use vkframe_rhi::RhiResult;
use vkframe_rhi::swapchain::{AcquireOutcome, PresentOutcome};

/// The operations one frame needs, indexed by frame slot.
pub trait FrameBackend {
    /// Blocks until the slot's previous submission has finished.
    fn wait_for_slot(&mut self, slot: usize) -> RhiResult<()>;

    /// Acquires the next swapchain image, signaling the slot's
    /// image-available semaphore.
    fn acquire(&mut self, slot: usize) -> RhiResult<AcquireOutcome>;

    /// Re-records the slot's command buffer for `image_index`.
    fn record(&mut self, slot: usize, image_index: u32) -> RhiResult<()>;

    /// Resets the slot fence and submits the slot's command buffer.
    fn submit(&mut self, slot: usize) -> RhiResult<()>;

    /// Queues `image_index` for presentation after the slot's render work.
    fn present(&mut self, slot: usize, image_index: u32) -> RhiResult<PresentOutcome>;

    /// Rebuilds the swapchain and everything that depends on it.
    ///
    /// Returns `false` when the rebuild had to be deferred because the
    /// framebuffer currently has no area.
    fn recreate_swapchain(&mut self) -> RhiResult<bool>;
}

/// What an iteration of [`FrameScheduler::draw_frame`] ended with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameStatus {
    /// A frame was presented with a current swapchain.
    Presented,
    /// The swapchain was rebuilt during this iteration.
    SwapchainRecreated,
    /// Nothing was drawn; the swapchain is waiting for a non-zero extent.
    Deferred,
}

/// Slot rotation and recreation bookkeeping.
#[derive(Debug)]
pub struct FrameScheduler {
    frames_in_flight: usize,
    current_frame: usize,
    recreate_pending: bool,
    recreations: u64,
}

impl FrameScheduler {
    /// Creates a scheduler rotating over `frames_in_flight` slots.
    pub fn new(frames_in_flight: usize) -> Self {
        debug_assert!(frames_in_flight > 0);
        Self {
            frames_in_flight: frames_in_flight.max(1),
            current_frame: 0,
            recreate_pending: false,
            recreations: 0,
        }
    }

    /// Slot the next iteration will use.
    #[inline]
    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    /// Whether a deferred recreation is waiting for a usable extent.
    #[inline]
    pub fn recreate_pending(&self) -> bool {
        self.recreate_pending
    }

    /// Number of completed swapchain recreations.
    #[inline]
    pub fn recreations(&self) -> u64 {
        self.recreations
    }

    /// Runs one iteration of the render loop.
    ///
    /// `resized` reports a window resize since the previous iteration.
    ///
    /// # Errors
    ///
    /// Only errors the backend reports are returned; out-of-date and
    /// suboptimal swapchains are handled here.
    pub fn draw_frame<B: FrameBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        resized: bool,
    ) -> RhiResult<FrameStatus> {
        let mut resized = resized;
        if self.recreate_pending {
            if !self.recreate(backend)? {
                return Ok(FrameStatus::Deferred);
            }
            // The rebuilt swapchain already has the latest extent.
            resized = false;
        }

        let slot = self.current_frame;
        backend.wait_for_slot(slot)?;

        let (image_index, acquire_suboptimal) = match backend.acquire(slot)? {
            AcquireOutcome::Ready {
                image_index,
                suboptimal,
            } => (image_index, suboptimal),
            AcquireOutcome::OutOfDate => {
                debug!("Swapchain out of date at acquire (slot {})", slot);
                return Ok(if self.recreate(backend)? {
                    FrameStatus::SwapchainRecreated
                } else {
                    FrameStatus::Deferred
                });
            }
        };

        backend.record(slot, image_index)?;
        backend.submit(slot)?;
        let presented = backend.present(slot, image_index)?;

        self.current_frame = (self.current_frame + 1) % self.frames_in_flight;

        if presented.needs_recreate() || acquire_suboptimal || resized {
            debug!(
                "Recreating swapchain after present ({:?}, acquire suboptimal: {}, resized: {})",
                presented, acquire_suboptimal, resized
            );
            return Ok(if self.recreate(backend)? {
                FrameStatus::SwapchainRecreated
            } else {
                FrameStatus::Deferred
            });
        }

        Ok(FrameStatus::Presented)
    }

    fn recreate<B: FrameBackend + ?Sized>(&mut self, backend: &mut B) -> RhiResult<bool> {
        let rebuilt = backend.recreate_swapchain()?;
        if rebuilt {
            self.recreate_pending = false;
            self.recreations += 1;
        } else {
            if !self.recreate_pending {
                warn!("Framebuffer has zero area, deferring swapchain recreation");
            }
            self.recreate_pending = true;
        }
        Ok(rebuilt)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;
    use vkframe_rhi::RhiError;

    #[derive(Clone, Debug, PartialEq, Eq)]
    enum Call {
        Wait(usize),
        Acquire(usize),
        Record(usize, u32),
        Submit(usize),
        Present(usize, u32),
        Recreate,
    }

    /// Scripted backend that models fence state per slot.
    struct MockBackend {
        calls: Vec<Call>,
        acquires: VecDeque<AcquireOutcome>,
        presents: VecDeque<PresentOutcome>,
        recreate_results: VecDeque<bool>,
        next_image: u32,
        image_count: u32,
        fence_signaled: Vec<bool>,
    }

    impl MockBackend {
        fn new(slots: usize) -> Self {
            Self {
                calls: Vec::new(),
                acquires: VecDeque::new(),
                presents: VecDeque::new(),
                recreate_results: VecDeque::new(),
                next_image: 0,
                image_count: 3,
                fence_signaled: vec![true; slots],
            }
        }

        fn recreations(&self) -> usize {
            self.calls.iter().filter(|c| **c == Call::Recreate).count()
        }

        fn recorded_slots(&self) -> Vec<usize> {
            self.calls
                .iter()
                .filter_map(|c| match c {
                    Call::Record(slot, _) => Some(*slot),
                    _ => None,
                })
                .collect()
        }
    }

    impl FrameBackend for MockBackend {
        fn wait_for_slot(&mut self, slot: usize) -> RhiResult<()> {
            self.calls.push(Call::Wait(slot));
            // The GPU finishes whatever the slot had in flight.
            self.fence_signaled[slot] = true;
            Ok(())
        }

        fn acquire(&mut self, slot: usize) -> RhiResult<AcquireOutcome> {
            self.calls.push(Call::Acquire(slot));
            Ok(self.acquires.pop_front().unwrap_or_else(|| {
                let image_index = self.next_image;
                self.next_image = (self.next_image + 1) % self.image_count;
                AcquireOutcome::Ready {
                    image_index,
                    suboptimal: false,
                }
            }))
        }

        fn record(&mut self, slot: usize, image_index: u32) -> RhiResult<()> {
            assert!(
                self.fence_signaled[slot],
                "slot {} recorded while its fence is unsignaled",
                slot
            );
            self.calls.push(Call::Record(slot, image_index));
            Ok(())
        }

        fn submit(&mut self, slot: usize) -> RhiResult<()> {
            self.fence_signaled[slot] = false;
            self.calls.push(Call::Submit(slot));
            Ok(())
        }

        fn present(&mut self, slot: usize, image_index: u32) -> RhiResult<PresentOutcome> {
            self.calls.push(Call::Present(slot, image_index));
            Ok(self.presents.pop_front().unwrap_or(PresentOutcome::Optimal))
        }

        fn recreate_swapchain(&mut self) -> RhiResult<bool> {
            self.calls.push(Call::Recreate);
            Ok(self.recreate_results.pop_front().unwrap_or(true))
        }
    }

    #[test]
    fn test_steady_state_call_order() {
        let mut backend = MockBackend::new(2);
        let mut scheduler = FrameScheduler::new(2);

        let status = scheduler.draw_frame(&mut backend, false).unwrap();
        assert_eq!(status, FrameStatus::Presented);
        assert_eq!(
            backend.calls,
            vec![
                Call::Wait(0),
                Call::Acquire(0),
                Call::Record(0, 0),
                Call::Submit(0),
                Call::Present(0, 0),
            ]
        );
        assert_eq!(scheduler.current_frame(), 1);
    }

    #[test]
    fn test_slots_rotate() {
        let mut backend = MockBackend::new(2);
        let mut scheduler = FrameScheduler::new(2);

        for _ in 0..5 {
            scheduler.draw_frame(&mut backend, false).unwrap();
        }
        assert_eq!(backend.recorded_slots(), vec![0, 1, 0, 1, 0]);
        assert_eq!(backend.recreations(), 0);
    }

    #[test]
    fn test_fence_waited_before_every_record() {
        let mut backend = MockBackend::new(2);
        let mut scheduler = FrameScheduler::new(2);

        // MockBackend::record panics if the slot's fence is still unsignaled.
        for _ in 0..6 {
            scheduler.draw_frame(&mut backend, false).unwrap();
        }
        assert!(!backend.fence_signaled.iter().all(|&s| s));
    }

    #[test]
    fn test_out_of_date_acquire_does_not_advance() {
        let mut backend = MockBackend::new(2);
        backend.acquires.push_back(AcquireOutcome::OutOfDate);
        let mut scheduler = FrameScheduler::new(2);

        let status = scheduler.draw_frame(&mut backend, false).unwrap();
        assert_eq!(status, FrameStatus::SwapchainRecreated);
        assert_eq!(scheduler.current_frame(), 0);
        assert_eq!(
            backend.calls,
            vec![Call::Wait(0), Call::Acquire(0), Call::Recreate]
        );

        scheduler.draw_frame(&mut backend, false).unwrap();
        assert_eq!(backend.recorded_slots(), vec![0]);
        assert_eq!(scheduler.current_frame(), 1);
    }

    #[test]
    fn test_resize_recreates_exactly_once() {
        let mut backend = MockBackend::new(2);
        let mut scheduler = FrameScheduler::new(2);

        let status = scheduler.draw_frame(&mut backend, true).unwrap();
        assert_eq!(status, FrameStatus::SwapchainRecreated);
        assert_eq!(backend.recreations(), 1);
        assert_eq!(backend.calls.last(), Some(&Call::Recreate));

        scheduler.draw_frame(&mut backend, false).unwrap();
        assert_eq!(backend.recreations(), 1);
        assert_eq!(scheduler.recreations(), 1);
    }

    #[test]
    fn test_resize_and_suboptimal_present_recreate_once() {
        let mut backend = MockBackend::new(2);
        backend.acquires.push_back(AcquireOutcome::Ready {
            image_index: 2,
            suboptimal: true,
        });
        backend.presents.push_back(PresentOutcome::OutOfDate);
        let mut scheduler = FrameScheduler::new(2);

        scheduler.draw_frame(&mut backend, true).unwrap();
        assert_eq!(backend.recreations(), 1);
        assert_eq!(scheduler.current_frame(), 1);
    }

    #[test]
    fn test_suboptimal_present_recreates() {
        let mut backend = MockBackend::new(2);
        backend.presents.push_back(PresentOutcome::Suboptimal);
        let mut scheduler = FrameScheduler::new(2);

        let status = scheduler.draw_frame(&mut backend, false).unwrap();
        assert_eq!(status, FrameStatus::SwapchainRecreated);
        assert_eq!(backend.recreations(), 1);
    }

    #[test]
    fn test_zero_extent_defers_until_restored() {
        let mut backend = MockBackend::new(2);
        backend.recreate_results.extend([false, false, true]);
        let mut scheduler = FrameScheduler::new(2);

        // Resize to zero area: the rebuild after present is deferred.
        let status = scheduler.draw_frame(&mut backend, true).unwrap();
        assert_eq!(status, FrameStatus::Deferred);
        assert!(scheduler.recreate_pending());
        assert_eq!(scheduler.current_frame(), 1);

        // Still minimized: nothing is waited on or drawn.
        let calls_before = backend.calls.len();
        let status = scheduler.draw_frame(&mut backend, false).unwrap();
        assert_eq!(status, FrameStatus::Deferred);
        assert_eq!(&backend.calls[calls_before..], &[Call::Recreate]);
        assert_eq!(scheduler.current_frame(), 1);

        // Restored: rebuild first, then draw slot 1 without a second rebuild.
        let status = scheduler.draw_frame(&mut backend, true).unwrap();
        assert_eq!(status, FrameStatus::Presented);
        assert!(!scheduler.recreate_pending());
        assert_eq!(backend.recreations(), 3);
        assert_eq!(scheduler.recreations(), 1);
        assert_eq!(backend.recorded_slots(), vec![0, 1]);
    }

    #[test]
    fn test_backend_error_propagates() {
        struct LostSurface;
        impl FrameBackend for LostSurface {
            fn wait_for_slot(&mut self, _: usize) -> RhiResult<()> {
                Ok(())
            }
            fn acquire(&mut self, _: usize) -> RhiResult<AcquireOutcome> {
                Err(RhiError::SurfaceLost)
            }
            fn record(&mut self, _: usize, _: u32) -> RhiResult<()> {
                unreachable!()
            }
            fn submit(&mut self, _: usize) -> RhiResult<()> {
                unreachable!()
            }
            fn present(&mut self, _: usize, _: u32) -> RhiResult<PresentOutcome> {
                unreachable!()
            }
            fn recreate_swapchain(&mut self) -> RhiResult<bool> {
                unreachable!()
            }
        }

        let mut scheduler = FrameScheduler::new(2);
        let err = scheduler.draw_frame(&mut LostSurface, false).unwrap_err();
        assert!(matches!(err, RhiError::SurfaceLost));
        assert_eq!(scheduler.current_frame(), 0);
    }
}
