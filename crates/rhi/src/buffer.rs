//! Host-visible GPU buffers.
//!
//! [`Buffer`] pairs a VkBuffer with a gpu-allocator allocation. Only the
//! triangle's vertex data goes through here, so buffers are created in
//! CPU-to-GPU memory and written through the persistent mapping.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use trigon_rhi::buffer::Buffer;
//! use trigon_rhi::device::Device;
//! use trigon_rhi::vertex::TRIANGLE_VERTICES;
//! use trigon_rhi::vk;
//!
//! # fn example(device: Arc<Device>) -> trigon_rhi::RhiResult<()> {
//! let vertex_buffer = Buffer::with_data(
//!     device,
//!     vk::BufferUsageFlags::VERTEX_BUFFER,
//!     bytemuck::cast_slice(&TRIANGLE_VERTICES),
//!     "triangle vertices",
//! )?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use tracing::{debug, error};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// GPU buffer wrapper with allocator-managed memory.
pub struct Buffer {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan buffer handle.
    buffer: vk::Buffer,
    /// GPU memory allocation, taken on drop.
    allocation: Option<Allocation>,
    /// Buffer size in bytes.
    size: vk::DeviceSize,
    /// Debug name, also used for the allocation.
    name: String,
}

impl Buffer {
    /// Creates an uninitialized buffer of `size` bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if `size` is zero, the allocator lock is poisoned, or
    /// buffer creation, allocation or binding fails. A partially created
    /// buffer is released before returning.
    pub fn new(
        device: Arc<Device>,
        usage: vk::BufferUsageFlags,
        location: MemoryLocation,
        size: vk::DeviceSize,
        name: &str,
    ) -> RhiResult<Self> {
        if size == 0 {
            return Err(RhiError::InvalidHandle(
                "Buffer size must be greater than 0".to_string(),
            ));
        }

        let buffer_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { device.handle().create_buffer(&buffer_info, None)? };

        // From here on the struct owns the handle, so early returns clean up.
        let mut this = Self {
            device,
            buffer,
            allocation: None,
            size,
            name: name.to_string(),
        };

        let requirements = unsafe { this.device.handle().get_buffer_memory_requirements(buffer) };

        let allocation = this.device.lock_allocator()?.allocate(&AllocationCreateDesc {
            name,
            requirements,
            location,
            linear: true,
            allocation_scheme: AllocationScheme::GpuAllocatorManaged,
        })?;

        let (memory, offset) = unsafe { (allocation.memory(), allocation.offset()) };
        this.allocation = Some(allocation);

        unsafe {
            this.device
                .handle()
                .bind_buffer_memory(buffer, memory, offset)?;
        }

        debug!("Created buffer '{}': {} bytes", name, size);

        Ok(this)
    }

    /// Creates a CPU-to-GPU buffer sized for `data` and copies it in.
    pub fn with_data(
        device: Arc<Device>,
        usage: vk::BufferUsageFlags,
        data: &[u8],
        name: &str,
    ) -> RhiResult<Self> {
        let buffer = Self::new(
            device,
            usage,
            MemoryLocation::CpuToGpu,
            data.len() as vk::DeviceSize,
            name,
        )?;
        buffer.write(0, data)?;
        Ok(buffer)
    }

    /// Copies `data` into the mapped buffer memory at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::InvalidHandle`] if the write is out of range or the
    /// memory is not host-visible.
    pub fn write(&self, offset: vk::DeviceSize, data: &[u8]) -> RhiResult<()> {
        if data.is_empty() {
            return Ok(());
        }

        check_write_range(self.size, offset, data.len())?;

        let mapped_ptr = self
            .allocation
            .as_ref()
            .and_then(|allocation| allocation.mapped_ptr())
            .ok_or_else(|| RhiError::InvalidHandle("Buffer memory is not mapped".to_string()))?;

        unsafe {
            let dst = mapped_ptr.as_ptr().cast::<u8>().add(offset as usize);
            std::ptr::copy_nonoverlapping(data.as_ptr(), dst, data.len());
        }

        Ok(())
    }

    /// Returns the Vulkan buffer handle.
    #[inline]
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Returns the buffer size in bytes.
    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }
}

fn check_write_range(size: vk::DeviceSize, offset: vk::DeviceSize, len: usize) -> RhiResult<()> {
    let end = offset.checked_add(len as vk::DeviceSize);
    match end {
        Some(end) if end <= size => Ok(()),
        _ => Err(RhiError::InvalidHandle(format!(
            "Write exceeds buffer size: offset {} + data {} > buffer {}",
            offset, len, size
        ))),
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        if let Some(allocation) = self.allocation.take() {
            if let Err(e) = self.device.lock_allocator_for_drop().free(allocation) {
                error!("Failed to free allocation for buffer '{}': {:?}", self.name, e);
            }
        }

        unsafe {
            self.device.handle().destroy_buffer(self.buffer, None);
        }

        debug!("Destroyed buffer '{}'", self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_range_fits() {
        assert!(check_write_range(60, 0, 60).is_ok());
        assert!(check_write_range(60, 40, 20).is_ok());
    }

    #[test]
    fn test_write_range_overflows() {
        assert!(matches!(
            check_write_range(60, 41, 20),
            Err(RhiError::InvalidHandle(_))
        ));
        assert!(check_write_range(60, u64::MAX, 1).is_err());
    }
}
