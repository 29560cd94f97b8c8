//! Frame synchronization primitives
//!
//! One bundle of sync objects per frame slot: a semaphore signaled when
//! the swapchain image is available, a semaphore signaled when rendering
//! finishes, and a fence the CPU waits on before reusing the slot.

use crate::vulkan::context::{VulkanError, VulkanResult};
use ash::{vk, Device};

/// Binary semaphore with RAII cleanup.
pub struct Semaphore {
    device: Device,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    pub fn new(device: Device) -> VulkanResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::builder();
        let semaphore = unsafe {
            device
                .create_semaphore(&create_info, None)
                .map_err(VulkanError::Api)?
        };
        Ok(Self { device, semaphore })
    }

    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_semaphore(self.semaphore, None);
        }
    }
}

/// Fence with RAII cleanup.
///
/// Slot fences start signaled so the first pass through each slot does
/// not deadlock waiting for work that was never submitted.
pub struct Fence {
    device: Device,
    fence: vk::Fence,
}

impl Fence {
    pub fn new(device: Device, signaled: bool) -> VulkanResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let create_info = vk::FenceCreateInfo::builder().flags(flags);
        let fence = unsafe {
            device
                .create_fence(&create_info, None)
                .map_err(VulkanError::Api)?
        };
        Ok(Self { device, fence })
    }

    /// Block until the fence is signaled.
    pub fn wait(&self) -> VulkanResult<()> {
        unsafe {
            self.device
                .wait_for_fences(&[self.fence], true, u64::MAX)
                .map_err(VulkanError::Api)
        }
    }

    /// Return the fence to the unsignaled state.
    ///
    /// Only reset once new work signaling it is guaranteed to be
    /// submitted; resetting earlier can deadlock the next wait.
    pub fn reset(&self) -> VulkanResult<()> {
        unsafe { self.device.reset_fences(&[self.fence]).map_err(VulkanError::Api) }
    }

    pub fn handle(&self) -> vk::Fence {
        self.fence
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_fence(self.fence, None);
        }
    }
}

/// Sync objects for one frame slot.
pub struct FrameSyncSlot {
    pub image_available: Semaphore,
    pub render_finished: Semaphore,
    pub in_flight: Fence,
}

/// All per-slot synchronization objects for the frames in flight.
pub struct FrameSync {
    slots: Vec<FrameSyncSlot>,
}

impl FrameSync {
    pub fn new(device: &Device, frames_in_flight: usize) -> VulkanResult<Self> {
        let mut slots = Vec::with_capacity(frames_in_flight);
        for _ in 0..frames_in_flight {
            slots.push(FrameSyncSlot {
                image_available: Semaphore::new(device.clone())?,
                render_finished: Semaphore::new(device.clone())?,
                in_flight: Fence::new(device.clone(), true)?,
            });
        }
        Ok(Self { slots })
    }

    pub fn slot(&self, index: usize) -> &FrameSyncSlot {
        &self.slots[index]
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
