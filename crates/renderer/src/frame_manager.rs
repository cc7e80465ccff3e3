//! Per-slot synchronization objects and command buffers.
//!
//! Each [`FrameSlot`] holds what one frame in flight needs:
//!
//! - an image-available semaphore signaled by acquire
//! - a render-finished semaphore waited on by present
//! - an in-flight fence signaled when the slot's submission completes,
//!   created signaled so the first wait returns immediately
//! - a primary command buffer re-recorded every time the slot comes round
//!
//! A slot only waits on its fence while a submission is outstanding. A
//! failed submit leaves the fence reset with nothing queued to signal it, so
//! the slot is marked idle instead.
//!
//! [`FrameSlots`] owns all slots and the command pool their buffers come
//! from.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use ash::vk;
use tracing::{debug, info, warn};

use vkframe_rhi::command::{CommandBuffer, CommandPool};
use vkframe_rhi::device::Device;
use vkframe_rhi::sync::{Fence, Semaphore};
use vkframe_rhi::{RhiError, RhiResult};

/// Synchronization objects and command buffer of one frame in flight.
pub struct FrameSlot {
    image_available: Semaphore,
    render_finished: Semaphore,
    in_flight: Fence,
    command_buffer: CommandBuffer,
    submitted: AtomicBool,
}

impl FrameSlot {
    fn new(device: &Arc<Device>, command_buffer: CommandBuffer) -> RhiResult<Self> {
        Ok(Self {
            image_available: Semaphore::new(device.clone())?,
            render_finished: Semaphore::new(device.clone())?,
            in_flight: Fence::new(device.clone(), true)?,
            command_buffer,
            submitted: AtomicBool::new(false),
        })
    }

    #[inline]
    pub fn image_available(&self) -> &Semaphore {
        &self.image_available
    }

    #[inline]
    pub fn render_finished(&self) -> &Semaphore {
        &self.render_finished
    }

    #[inline]
    pub fn in_flight(&self) -> &Fence {
        &self.in_flight
    }

    #[inline]
    pub fn command_buffer(&self) -> &CommandBuffer {
        &self.command_buffer
    }

    /// Whether the last submission succeeded, so the fence will be signaled
    /// by the GPU.
    #[inline]
    pub fn is_submitted(&self) -> bool {
        self.submitted.load(Ordering::Acquire)
    }

    /// Blocks until the slot's outstanding submission, if any, completes.
    ///
    /// # Errors
    ///
    /// Returns an error if the wait fails.
    pub fn wait(&self) -> RhiResult<()> {
        if self.is_submitted() {
            self.in_flight.wait(u64::MAX)?;
        }
        Ok(())
    }

    /// Resets the command buffer and begins a new recording.
    ///
    /// The slot's fence must already have been waited on.
    ///
    /// # Errors
    ///
    /// Returns an error if the reset or begin fails.
    pub fn begin_recording(&self) -> RhiResult<&CommandBuffer> {
        debug_assert!(
            !self.is_submitted() || self.in_flight.is_signaled(),
            "command buffer reset while the slot is still in flight"
        );
        self.command_buffer.reset()?;
        self.command_buffer.begin()?;
        Ok(&self.command_buffer)
    }

    /// Resets the fence and submits the recorded command buffer.
    ///
    /// Waits on image-available at COLOR_ATTACHMENT_OUTPUT and signals
    /// render-finished and the fence.
    ///
    /// # Errors
    ///
    /// Returns an error if the reset or the submission fails.
    pub fn submit(&self, device: &Device) -> RhiResult<()> {
        let wait_semaphores = [self.image_available.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [self.command_buffer.handle()];
        let signal_semaphores = [self.render_finished.handle()];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        // Reset immediately before the submit that signals it again.
        self.in_flight.reset()?;
        let result = unsafe { device.submit_graphics(&[submit_info], self.in_flight.handle()) };
        self.settle_submission(result)
    }

    /// Records whether the fence now has a submission that will signal it.
    fn settle_submission(&self, result: RhiResult<()>) -> RhiResult<()> {
        self.submitted.store(result.is_ok(), Ordering::Release);
        if let Err(e) = &result {
            warn!("Frame submission failed, slot fence left idle: {}", e);
        }
        result
    }
}

/// All frame slots plus the command pool backing their buffers.
pub struct FrameSlots {
    device: Arc<Device>,
    // Declared before the pool so slots drop first.
    slots: Vec<FrameSlot>,
    _command_pool: CommandPool,
}

impl FrameSlots {
    /// Creates `count` slots with command buffers on the graphics family.
    ///
    /// # Errors
    ///
    /// Returns an error if any object creation fails.
    pub fn new(device: Arc<Device>, count: usize) -> RhiResult<Self> {
        let family = device
            .queue_families()
            .graphics_family
            .ok_or(RhiError::NoSuitableDevice)?;
        let command_pool = CommandPool::new(device.clone(), family)?;

        let slots = command_pool
            .allocate(count as u32)?
            .into_iter()
            .map(|cmd| FrameSlot::new(&device, cmd))
            .collect::<RhiResult<Vec<_>>>()?;

        info!("Created {} frame slot(s)", slots.len());

        Ok(Self {
            device,
            slots,
            _command_pool: command_pool,
        })
    }

    /// Number of slots.
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns slot `index`.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::InvalidResource`] if `index` is out of range.
    pub fn get(&self, index: usize) -> RhiResult<&FrameSlot> {
        self.slots.get(index).ok_or_else(|| {
            RhiError::InvalidResource(format!(
                "frame slot {} out of range ({} slots)",
                index,
                self.slots.len()
            ))
        })
    }

    /// Blocks until slot `index` has no work in flight.
    ///
    /// # Errors
    ///
    /// Returns an error if the index is invalid or the wait fails.
    pub fn wait(&self, index: usize) -> RhiResult<()> {
        self.get(index)?.wait()
    }

    /// Waits for the fence of every slot with an outstanding submission.
    ///
    /// # Errors
    ///
    /// Returns an error if the wait fails.
    pub fn drain(&self) -> RhiResult<()> {
        let pending = self
            .slots
            .iter()
            .filter(|slot| slot.is_submitted())
            .map(FrameSlot::in_flight);
        Fence::wait_all(&self.device, pending, u64::MAX)?;
        debug!("All {} frame slot(s) drained", self.slots.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::headless_device;

    #[test]
    fn test_frame_slot_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<FrameSlot>();
        assert_send::<FrameSlots>();
    }

    #[test]
    fn test_new_slots_are_signaled() {
        let Some(device) = headless_device() else {
            return;
        };
        let slots = FrameSlots::new(device, crate::MAX_FRAMES_IN_FLIGHT).unwrap();
        assert_eq!(slots.len(), crate::MAX_FRAMES_IN_FLIGHT);

        for index in 0..slots.len() {
            assert!(slots.get(index).unwrap().in_flight().is_signaled());
            slots.wait(index).unwrap();
        }
        slots.drain().unwrap();
        assert!(matches!(
            slots.get(slots.len()),
            Err(RhiError::InvalidResource(_))
        ));
    }

    #[test]
    fn test_failed_submit_does_not_block_drain() {
        let Some(device) = headless_device() else {
            return;
        };
        let slots = FrameSlots::new(device, 2).unwrap();
        let slot = slots.get(1).unwrap();

        // A successful submit leaves the slot pending on its fence.
        slot.settle_submission(Ok(())).unwrap();
        assert!(slot.is_submitted());

        // A failing submit after the reset: nothing will signal the fence.
        slot.in_flight().reset().unwrap();
        let err = slot
            .settle_submission(Err(RhiError::VulkanError(
                vk::Result::ERROR_OUT_OF_DEVICE_MEMORY,
            )))
            .unwrap_err();
        assert!(matches!(err, RhiError::VulkanError(_)));
        assert!(!slot.is_submitted());
        assert!(!slot.in_flight().is_signaled());

        slots.wait(1).unwrap();
        slots.drain().unwrap();
    }

    #[test]
    fn test_begin_recording_on_idle_slot() {
        let Some(device) = headless_device() else {
            return;
        };
        let slots = FrameSlots::new(device, 1).unwrap();
        let slot = slots.get(0).unwrap();
        let cmd = slot.begin_recording().unwrap();
        cmd.end().unwrap();
    }
}
