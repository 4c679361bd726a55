use std::{
    ffi::c_void,
    mem::size_of,
    ops::Deref,
    ptr::{copy_nonoverlapping, NonNull},
    sync::Arc,
};

use ash::vk::{self, BufferCreateInfo, MappedMemoryRange};
use bytemuck::{cast_slice, Pod};
use gpu_allocator::{
    vulkan::{Allocation, AllocationCreateDesc},
    MemoryLocation,
};

use crate::{Device, Error};

pub struct Buffer {
    pub(super) handle: vk::Buffer,
    allocation: Option<Allocation>,
    size: u64,
    device: Arc<Device>,
}

impl Buffer {
    pub fn new(
        device: Arc<Device>,
        create_info: &BufferCreateInfo,
        location: MemoryLocation,
        name: &str,
    ) -> Result<Self, Error> {
        let handle = unsafe { device.inner.create_buffer(create_info, None) }?;
        let requirements = unsafe { device.inner.get_buffer_memory_requirements(handle) };
        let allocation = device
            .allocator
            .lock()
            .map_err(|_| Error::ApiResult(vk::Result::ERROR_DEVICE_LOST))?
            .allocate(&AllocationCreateDesc {
                name,
                requirements,
                location,
                linear: true,
            })?;
        unsafe {
            device
                .inner
                .bind_buffer_memory(handle, allocation.memory(), allocation.offset())
        }?;
        Ok(Self {
            handle,
            allocation: Some(allocation),
            size: create_info.size,
            device,
        })
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    fn sub_range(&self, offset: u64, length: u64) -> MappedMemoryRange {
        let allocation = self.allocation();
        let start = self.prev_coherent_multiple(allocation.offset() + offset);
        let end = self
            .next_coherent_multiple(allocation.offset() + offset + length)
            .min(allocation.offset() + allocation.size());
        MappedMemoryRange::builder()
            .memory(unsafe { allocation.memory() })
            .offset(start)
            .size(end - start)
            .build()
    }

    pub fn mapped_ptr(&self) -> Option<NonNull<c_void>> {
        self.allocation().mapped_ptr()
    }

    /// Copies `values` to the start of a host visible buffer and flushes the written range.
    pub fn write<T: Pod>(&self, values: &[T]) -> Result<(), Error> {
        let bytes: &[u8] = cast_slice(values);
        let len = bytes.len() as u64;
        if len > self.size {
            return Err(Error::BufferOverflow {
                capacity: self.size,
                len,
            });
        }
        let ptr = self.mapped_ptr().ok_or(Error::NotHostVisible)?;
        unsafe { copy_nonoverlapping(bytes.as_ptr(), ptr.cast::<u8>().as_ptr(), bytes.len()) };
        self.device
            .flush_mapped_memory_ranges(&[self.sub_range(0, len)])?;
        Ok(())
    }

    /// Invalidates and reads the first `len` values of a host visible buffer.
    pub fn read<T: Pod>(&self, len: usize) -> Result<Vec<T>, Error> {
        let bytes = (len * size_of::<T>()) as u64;
        if bytes > self.size {
            return Err(Error::BufferOverflow {
                capacity: self.size,
                len: bytes,
            });
        }
        let ptr = self.mapped_ptr().ok_or(Error::NotHostVisible)?;
        self.device
            .invalidate_mapped_memory_ranges(&[self.sub_range(0, bytes)])?;
        let mut values = vec![T::zeroed(); len];
        unsafe {
            copy_nonoverlapping(
                ptr.cast::<u8>().as_ptr(),
                values.as_mut_ptr() as *mut u8,
                bytes as usize,
            )
        };
        Ok(values)
    }

    fn next_coherent_multiple(&self, n: u64) -> u64 {
        let m = self.device.non_coherent_atom_size;
        ((n + m - 1) / m) * m
    }

    fn prev_coherent_multiple(&self, n: u64) -> u64 {
        let m = self.device.non_coherent_atom_size;
        n - (n % m)
    }

    fn allocation(&self) -> &Allocation {
        self.allocation
            .as_ref()
            .expect("allocation is only taken on drop")
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        if let (Some(allocation), Ok(mut allocator)) =
            (self.allocation.take(), self.device.allocator.lock())
        {
            let _ = allocator.free(allocation);
        }
        unsafe { self.device.inner.destroy_buffer(self.handle, None) };
    }
}

impl Deref for Buffer {
    type Target = vk::Buffer;

    fn deref(&self) -> &Self::Target {
        &self.handle
    }
}
