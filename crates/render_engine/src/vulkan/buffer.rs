//! GPU buffer wrappers
//!
//! A raw `Buffer` owns the handle and its memory; the typed wrappers
//! layer upload and mapping policy on top. Geometry lives in
//! device-local memory and is filled through a staging copy; uniforms
//! stay host-visible and persistently mapped.

use crate::mesh::Vertex;
use crate::vulkan::commands::CommandManager;
use crate::vulkan::context::{VulkanContext, VulkanError, VulkanResult};
use ash::{vk, Device};
use bytemuck::Pod;
use std::marker::PhantomData;

/// Raw Vulkan buffer plus its backing allocation.
pub struct Buffer {
    device: Device,
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    size: vk::DeviceSize,
}

impl Buffer {
    pub fn new(
        context: &VulkanContext,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> VulkanResult<Self> {
        let device = context.raw_device();

        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe {
            device
                .create_buffer(&buffer_info, None)
                .map_err(VulkanError::Api)?
        };

        let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };
        let memory_type = match context.find_memory_type(requirements.memory_type_bits, properties) {
            Ok(index) => index,
            Err(e) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type);

        let memory = unsafe {
            match device.allocate_memory(&alloc_info, None) {
                Ok(memory) => memory,
                Err(e) => {
                    device.destroy_buffer(buffer, None);
                    return Err(VulkanError::Api(e));
                }
            }
        };

        unsafe {
            if let Err(e) = device.bind_buffer_memory(buffer, memory, 0) {
                device.free_memory(memory, None);
                device.destroy_buffer(buffer, None);
                return Err(VulkanError::Api(e));
            }
        }

        Ok(Self {
            device,
            buffer,
            memory,
            size,
        })
    }

    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_buffer(self.buffer, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

/// Host-visible buffer used as the source of a one-shot transfer.
pub struct StagingBuffer {
    buffer: Buffer,
}

impl StagingBuffer {
    pub fn with_data(context: &VulkanContext, data: &[u8]) -> VulkanResult<Self> {
        let buffer = Buffer::new(
            context,
            data.len() as vk::DeviceSize,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;

        unsafe {
            let mapped = buffer
                .device
                .map_memory(buffer.memory, 0, buffer.size, vk::MemoryMapFlags::empty())
                .map_err(VulkanError::Api)?;
            std::ptr::copy_nonoverlapping(data.as_ptr(), mapped.cast::<u8>(), data.len());
            buffer.device.unmap_memory(buffer.memory);
        }

        Ok(Self { buffer })
    }

    pub fn handle(&self) -> vk::Buffer {
        self.buffer.handle()
    }

    pub fn size(&self) -> vk::DeviceSize {
        self.buffer.size()
    }
}

fn upload_via_staging(
    context: &VulkanContext,
    commands: &CommandManager,
    data: &[u8],
    usage: vk::BufferUsageFlags,
) -> VulkanResult<Buffer> {
    let staging = StagingBuffer::with_data(context, data)?;

    let buffer = Buffer::new(
        context,
        data.len() as vk::DeviceSize,
        vk::BufferUsageFlags::TRANSFER_DST | usage,
        vk::MemoryPropertyFlags::DEVICE_LOCAL,
    )?;

    commands.execute_one_time(context.graphics_queue(), |device, cmd| {
        let region = vk::BufferCopy {
            src_offset: 0,
            dst_offset: 0,
            size: staging.size(),
        };
        unsafe {
            device.cmd_copy_buffer(cmd, staging.handle(), buffer.handle(), &[region]);
        }
    })?;

    Ok(buffer)
}

/// Device-local vertex buffer.
pub struct VertexBuffer {
    buffer: Buffer,
    vertex_count: u32,
}

impl VertexBuffer {
    pub fn new(context: &VulkanContext, commands: &CommandManager, vertices: &[Vertex]) -> VulkanResult<Self> {
        if vertices.is_empty() {
            return Err(VulkanError::InvalidOperation {
                reason: "Vertex buffer requires at least one vertex".to_string(),
            });
        }
        let buffer = upload_via_staging(
            context,
            commands,
            bytemuck::cast_slice(vertices),
            vk::BufferUsageFlags::VERTEX_BUFFER,
        )?;
        Ok(Self {
            buffer,
            vertex_count: vertices.len() as u32,
        })
    }

    pub fn handle(&self) -> vk::Buffer {
        self.buffer.handle()
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }
}

/// Device-local 32-bit index buffer.
pub struct IndexBuffer {
    buffer: Buffer,
    index_count: u32,
}

impl IndexBuffer {
    pub fn new(context: &VulkanContext, commands: &CommandManager, indices: &[u32]) -> VulkanResult<Self> {
        if indices.is_empty() {
            return Err(VulkanError::InvalidOperation {
                reason: "Index buffer requires at least one index".to_string(),
            });
        }
        let buffer = upload_via_staging(
            context,
            commands,
            bytemuck::cast_slice(indices),
            vk::BufferUsageFlags::INDEX_BUFFER,
        )?;
        Ok(Self {
            buffer,
            index_count: indices.len() as u32,
        })
    }

    pub fn handle(&self) -> vk::Buffer {
        self.buffer.handle()
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }
}

/// Persistently mapped host-visible uniform buffer.
///
/// One per frame slot, so the CPU only writes a slot whose fence has
/// signaled and never races the GPU reading a previous frame's data.
pub struct MappedUniformBuffer<T: Pod> {
    buffer: Buffer,
    mapped: *mut T,
    _marker: PhantomData<T>,
}

impl<T: Pod> MappedUniformBuffer<T> {
    pub fn new(context: &VulkanContext) -> VulkanResult<Self> {
        let size = std::mem::size_of::<T>() as vk::DeviceSize;
        let buffer = Buffer::new(
            context,
            size,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;

        let mapped = unsafe {
            buffer
                .device
                .map_memory(buffer.memory, 0, size, vk::MemoryMapFlags::empty())
                .map_err(VulkanError::Api)?
                .cast::<T>()
        };

        Ok(Self {
            buffer,
            mapped,
            _marker: PhantomData,
        })
    }

    /// Write the whole uniform block. Coherent memory, no flush needed.
    pub fn write(&mut self, value: &T) {
        unsafe {
            self.mapped.write_unaligned(*value);
        }
    }

    pub fn handle(&self) -> vk::Buffer {
        self.buffer.handle()
    }

    pub fn size(&self) -> vk::DeviceSize {
        self.buffer.size()
    }
}

// The mapping stays valid for the buffer's lifetime; unmapped by
// freeing the memory in Buffer's Drop.
unsafe impl<T: Pod> Send for MappedUniformBuffer<T> {}
