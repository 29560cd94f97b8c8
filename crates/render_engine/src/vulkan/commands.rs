//! Command pool and command buffer management
//!
//! One resettable pool on the graphics family, with one reusable
//! primary command buffer per frame slot. Setup work (buffer uploads,
//! image layout transitions) goes through one-shot recordings that are
//! submitted and waited on immediately.

use crate::vulkan::context::{VulkanError, VulkanResult};
use ash::{vk, Device};

pub struct CommandManager {
    device: Device,
    pool: vk::CommandPool,
    buffers: Vec<vk::CommandBuffer>,
}

impl CommandManager {
    pub fn new(device: Device, queue_family: u32, frames_in_flight: usize) -> VulkanResult<Self> {
        let pool_info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(queue_family);

        let pool = unsafe {
            device
                .create_command_pool(&pool_info, None)
                .map_err(VulkanError::Api)?
        };

        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(frames_in_flight as u32);

        let buffers = unsafe {
            device
                .allocate_command_buffers(&alloc_info)
                .map_err(|e| {
                    device.destroy_command_pool(pool, None);
                    VulkanError::Api(e)
                })?
        };

        Ok(Self { device, pool, buffers })
    }

    /// The reusable primary command buffer for a frame slot.
    ///
    /// Valid to re-record only after the slot's fence has signaled.
    pub fn buffer(&self, slot: usize) -> vk::CommandBuffer {
        self.buffers[slot]
    }

    /// Reset and begin recording the slot's command buffer.
    pub fn begin(&self, slot: usize) -> VulkanResult<vk::CommandBuffer> {
        let buffer = self.buffers[slot];
        unsafe {
            self.device
                .reset_command_buffer(buffer, vk::CommandBufferResetFlags::empty())
                .map_err(VulkanError::Api)?;

            let begin_info = vk::CommandBufferBeginInfo::builder();
            self.device
                .begin_command_buffer(buffer, &begin_info)
                .map_err(VulkanError::Api)?;
        }
        Ok(buffer)
    }

    pub fn end(&self, slot: usize) -> VulkanResult<()> {
        unsafe {
            self.device
                .end_command_buffer(self.buffers[slot])
                .map_err(VulkanError::Api)
        }
    }

    /// Record and run a one-shot command buffer, blocking until it retires.
    ///
    /// Used for setup transfers only; it serializes against the queue and
    /// must never appear on the per-frame path.
    pub fn execute_one_time<F>(&self, queue: vk::Queue, record: F) -> VulkanResult<()>
    where
        F: FnOnce(&Device, vk::CommandBuffer),
    {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        let buffer = unsafe {
            self.device
                .allocate_command_buffers(&alloc_info)
                .map_err(VulkanError::Api)?[0]
        };

        let result = (|| {
            let begin_info =
                vk::CommandBufferBeginInfo::builder().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

            unsafe {
                self.device
                    .begin_command_buffer(buffer, &begin_info)
                    .map_err(VulkanError::Api)?;
            }

            record(&self.device, buffer);

            unsafe {
                self.device.end_command_buffer(buffer).map_err(VulkanError::Api)?;

                let buffers = [buffer];
                let submit_info = vk::SubmitInfo::builder().command_buffers(&buffers);
                self.device
                    .queue_submit(queue, &[submit_info.build()], vk::Fence::null())
                    .map_err(VulkanError::Api)?;
                self.device.queue_wait_idle(queue).map_err(VulkanError::Api)?;
            }
            Ok(())
        })();

        unsafe {
            self.device.free_command_buffers(self.pool, &[buffer]);
        }

        result
    }
}

impl Drop for CommandManager {
    fn drop(&mut self) {
        unsafe {
            // Destroying the pool frees its buffers.
            self.device.destroy_command_pool(self.pool, None);
        }
    }
}
