use cull_gpu::MESH_DISPATCH_CAPACITY;
use tracing::trace;

use crate::{BufferUsage, CullDevice, KernelBindings};

/// One `u32` flag per instance of a culling level.
pub struct VisibilityBuffer<D: CullDevice> {
    buffer: D::Buffer,
    len: usize,
}

impl<D: CullDevice> VisibilityBuffer<D> {
    pub fn new(device: &mut D, len: usize, name: &str) -> eyre::Result<Self> {
        let buffer = device.create_buffer::<u32>(BufferUsage::Storage, len.max(1), name)?;
        Ok(Self { buffer, len })
    }

    /// Number of instances, independent of how many are visible.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn buffer(&self) -> &D::Buffer {
        &self.buffer
    }
}

/// Splits `count` instances into consecutive `(first, count)` dispatch ranges.
pub fn dispatch_ranges(count: u32, capacity: u32) -> impl Iterator<Item = (u32, u32)> {
    (0..count)
        .step_by(capacity as usize)
        .map(move |first| (first, (count - first).min(capacity)))
}

/// Object level of the culling pipeline.
pub struct MeshContext<D: CullDevice> {
    pub visibility: VisibilityBuffer<D>,
}

impl<D: CullDevice> MeshContext<D> {
    pub fn new(device: &mut D, object_count: usize) -> eyre::Result<Self> {
        Ok(Self {
            visibility: VisibilityBuffer::new(device, object_count, "object visibility")?,
        })
    }

    pub fn record(&self, device: &mut D, bindings: &KernelBindings<'_, D>) {
        for (first, count) in dispatch_ranges(self.visibility.len() as u32, MESH_DISPATCH_CAPACITY)
        {
            trace!(
                variant = bindings.variant.name(),
                first,
                count,
                "mesh cull"
            );
            device.dispatch_mesh_cull(bindings, first, count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_cover_every_instance_once() {
        let ranges: Vec<_> = dispatch_ranges(10, 4).collect();
        assert_eq!(ranges, vec![(0, 4), (4, 4), (8, 2)]);
        assert_eq!(dispatch_ranges(0, 4).count(), 0);
        assert_eq!(dispatch_ranges(8, 4).last(), Some((4, 4)));
    }
}
