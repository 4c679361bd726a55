use cull_gpu::{DispatchCommand, DrawCommand, MAX_BATCH_ITERATIONS, MESHLET_DISPATCH_CAPACITY};
use tracing::trace;

use crate::{
    dispatch_ranges, Barrier, BindingGroup, BufferUsage, CullDevice, CullVariant, KernelBindings,
    PerFrame, VisibilityBuffer,
};

/// Densely packed draw commands of the instances that survived a cull.
pub struct CompactBuffer<D: CullDevice> {
    buffer: D::Buffer,
    capacity: usize,
}

impl<D: CullDevice> CompactBuffer<D> {
    fn new(device: &mut D, capacity: usize, name: &str) -> eyre::Result<Self> {
        let buffer =
            device.create_buffer::<DrawCommand>(BufferUsage::Commands, capacity.max(1), name)?;
        Ok(Self { buffer, capacity })
    }

    /// Total instance count of the level, the most commands a cull can compact.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn buffer(&self) -> &D::Buffer {
        &self.buffer
    }
}

/// Counter, read back copy and batch dispatch arguments of one pass in one frame slot.
pub struct PassFrame<D: CullDevice> {
    pub counter: D::Buffer,
    pub staging: D::Buffer,
    pub dispatch: D::Buffer,
    pub bindings: D::Bindings,
}

/// Compaction output of the cull or the reocclusion pass.
pub struct MeshletPass<D: CullDevice> {
    pub commands: CompactBuffer<D>,
    /// Command flags, only written by the reocclusion variant.
    pub flags: D::Buffer,
    pub frames: PerFrame<PassFrame<D>>,
}

impl<D: CullDevice> MeshletPass<D> {
    fn new(device: &mut D, meshlet_count: usize, name: &str) -> eyre::Result<Self> {
        let commands = CompactBuffer::new(device, meshlet_count, &format!("{} commands", name))?;
        let flags = device.create_buffer::<u32>(
            BufferUsage::Storage,
            meshlet_count.max(1),
            &format!("{} command flags", name),
        )?;
        let frames = PerFrame::new(|i| {
            let counter = device.create_buffer::<u32>(
                BufferUsage::Counter,
                1,
                &format!("{} counter {}", name, i),
            )?;
            let staging = device.create_buffer::<u32>(
                BufferUsage::ReadBack,
                1,
                &format!("{} read back {}", name, i),
            )?;
            let dispatch = device.create_buffer::<DispatchCommand>(
                BufferUsage::Commands,
                MAX_BATCH_ITERATIONS as usize,
                &format!("{} dispatch {}", name, i),
            )?;
            let bindings = device.create_bindings(BindingGroup::Pass {
                commands: commands.buffer(),
                counter: &counter,
                flags: &flags,
                dispatch: &dispatch,
            })?;
            Ok::<_, eyre::Report>(PassFrame {
                counter,
                staging,
                dispatch,
                bindings,
            })
        })?;
        Ok(Self {
            commands,
            flags,
            frames,
        })
    }
}

/// Meshlet level of the culling pipeline.
pub struct MeshletContext<D: CullDevice> {
    pub visibility: VisibilityBuffer<D>,
    cull: MeshletPass<D>,
    reocclusion: MeshletPass<D>,
}

impl<D: CullDevice> MeshletContext<D> {
    pub fn new(device: &mut D, meshlet_count: usize) -> eyre::Result<Self> {
        Ok(Self {
            visibility: VisibilityBuffer::new(device, meshlet_count, "meshlet visibility")?,
            cull: MeshletPass::new(device, meshlet_count, "cull")?,
            reocclusion: MeshletPass::new(device, meshlet_count, "reocclusion")?,
        })
    }

    /// The reocclusion variant compacts into its own buffers, the others share the cull pass.
    pub fn pass(&self, variant: CullVariant) -> &MeshletPass<D> {
        match variant {
            CullVariant::Reocclusion => &self.reocclusion,
            CullVariant::Cull | CullVariant::Single => &self.cull,
        }
    }

    /// Clears the counters of both passes in the slot of `frame`.
    pub fn reset(&self, device: &mut D, frame: usize) {
        device.fill_buffer(&self.cull.frames[frame].counter, 0);
        device.fill_buffer(&self.reocclusion.frames[frame].counter, 0);
        device.barrier(Barrier::TransferToCompute);
    }

    pub fn record(&self, device: &mut D, bindings: &KernelBindings<'_, D>) {
        for (first, count) in
            dispatch_ranges(self.visibility.len() as u32, MESHLET_DISPATCH_CAPACITY)
        {
            trace!(
                variant = bindings.variant.name(),
                first,
                count,
                "meshlet cull"
            );
            device.dispatch_meshlet_cull(bindings, first, count);
        }
    }
}
