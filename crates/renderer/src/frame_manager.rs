//! Per-slot frame resources.
//!
//! Each frame in flight owns a command buffer and its own synchronization
//! set, so the CPU can record slot N+1 while the GPU still works on slot N:
//!
//! ```text
//! 1. Wait on in_flight (previous use of this slot is done)
//! 2. Acquire an image (signals image_available)
//! 3. Reset in_flight, re-record command_buffer
//! 4. Submit: wait image_available, signal render_finished + in_flight
//! 5. Present: wait render_finished
//! ```

use std::sync::Arc;

use tracing::{debug, info};

use trigon_rhi::RhiResult;
use trigon_rhi::command::{CommandBuffer, CommandPool};
use trigon_rhi::device::Device;
use trigon_rhi::sync::FrameSync;

/// Resources of one frame slot.
pub struct FrameSlot {
    /// Re-recorded every time the slot is used.
    pub command_buffer: CommandBuffer,
    /// Semaphores and fence for the slot. The fence starts signaled.
    pub sync: FrameSync,
}

impl FrameSlot {
    fn new(device: Arc<Device>, command_pool: &CommandPool) -> RhiResult<Self> {
        Ok(Self {
            command_buffer: CommandBuffer::new(device.clone(), command_pool)?,
            sync: FrameSync::new(device)?,
        })
    }
}

/// Owns every frame slot.
///
/// Slots reference the command pool they were allocated from; drop the
/// manager before the pool.
pub struct FrameManager {
    slots: Vec<FrameSlot>,
}

impl FrameManager {
    /// Creates `count` slots.
    pub fn new(device: Arc<Device>, command_pool: &CommandPool, count: usize) -> RhiResult<Self> {
        let slots = (0..count)
            .map(|i| {
                debug!("Creating frame slot {}", i);
                FrameSlot::new(device.clone(), command_pool)
            })
            .collect::<RhiResult<Vec<_>>>()?;

        info!("Frame manager created with {} frames in flight", count);

        Ok(Self { slots })
    }

    #[inline]
    pub fn slot(&self, index: usize) -> Option<&FrameSlot> {
        self.slots.get(index)
    }

    #[inline]
    pub fn slot_mut(&mut self, index: usize) -> Option<&mut FrameSlot> {
        self.slots.get_mut(index)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_manager_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<FrameManager>();
        assert_send::<FrameSlot>();
    }
}
