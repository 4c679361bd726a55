use cull_gpu::{iteration_count, DrawCommand, MAX_BATCH_ITERATIONS, MAX_INDICES};
use tracing::trace;

use crate::{
    Barrier, BindingGroup, BufferUsage, CullDevice, KernelBindings, LoadOp, PassFrame,
    VisibilityBuffer,
};

pub const BATCH_RING_SIZE: usize = 2;

/// Position of the triangle loop within the batches of one cull phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IterationState {
    count: u32,
    iteration: u32,
    iterations: u32,
}

impl IterationState {
    pub fn new(count: u32) -> Self {
        let iterations = iteration_count(count);
        assert!(
            iterations <= MAX_BATCH_ITERATIONS,
            "{} compacted meshlets need {} batches, at most {} fit",
            count,
            iterations,
            MAX_BATCH_ITERATIONS
        );
        Self {
            count,
            iteration: 0,
            iterations,
        }
    }

    /// Compacted meshlet count the state was derived from.
    pub fn compacted(&self) -> u32 {
        self.count
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }
}

impl Iterator for IterationState {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        if self.iteration < self.iterations {
            self.iteration += 1;
            Some(self.iteration - 1)
        } else {
            None
        }
    }
}

/// Resources of one ring slot of the triangle loop.
pub struct Batch<D: CullDevice> {
    pub indices: D::Buffer,
    pub triangles: D::Buffer,
    pub draw: D::Buffer,
    pub event: D::Event,
    pub bindings: D::Bindings,
}

impl<D: CullDevice> Batch<D> {
    fn new(device: &mut D, slot: usize) -> eyre::Result<Self> {
        let indices = device.create_buffer::<u32>(
            BufferUsage::Indices,
            MAX_INDICES as usize,
            &format!("batch indices {}", slot),
        )?;
        let triangles = device.create_buffer::<u32>(
            BufferUsage::Counter,
            1,
            &format!("batch triangles {}", slot),
        )?;
        let draw = device.create_buffer::<DrawCommand>(
            BufferUsage::Commands,
            1,
            &format!("batch draw {}", slot),
        )?;
        let event = device.create_event()?;
        let bindings = device.create_bindings(BindingGroup::Batch {
            indices: &indices,
            triangles: &triangles,
            draw: &draw,
        })?;
        Ok(Self {
            indices,
            triangles,
            draw,
            event,
            bindings,
        })
    }
}

/// Render target of the frame being recorded, cleared by its first draw.
pub struct FrameTarget<'a, D: CullDevice> {
    pub target: &'a D::Target,
    clear_color: [f32; 4],
    cleared: bool,
}

impl<'a, D: CullDevice> FrameTarget<'a, D> {
    pub fn new(target: &'a D::Target, clear_color: [f32; 4]) -> Self {
        Self {
            target,
            clear_color,
            cleared: false,
        }
    }

    /// Load operation of the next draw.
    pub fn next_draw(&mut self) -> LoadOp {
        if self.cleared {
            LoadOp::Load
        } else {
            self.cleared = true;
            LoadOp::Clear(self.clear_color)
        }
    }

    pub fn ensure_cleared(&mut self, device: &mut D) {
        if !self.cleared {
            device.clear_target(self.target, self.clear_color);
            self.cleared = true;
        }
    }
}

/// Triangle level of the culling pipeline.
pub struct TriangleContext<D: CullDevice> {
    pub visibility: VisibilityBuffer<D>,
    batches: Vec<Batch<D>>,
}

impl<D: CullDevice> TriangleContext<D> {
    pub fn new(device: &mut D, triangle_count: usize) -> eyre::Result<Self> {
        let visibility = VisibilityBuffer::new(device, triangle_count, "triangle visibility")?;
        let batches = (0..BATCH_RING_SIZE)
            .map(|slot| Batch::new(device, slot))
            .collect::<eyre::Result<_>>()?;
        Ok(Self {
            visibility,
            batches,
        })
    }

    pub fn batch(&self, iteration: u32) -> &Batch<D> {
        &self.batches[iteration as usize % BATCH_RING_SIZE]
    }

    /// Prepares the batch dispatches of `pass` and reads back its compacted meshlet count.
    pub fn prepare(&self, device: &mut D, pass: &PassFrame<D>) -> eyre::Result<IterationState> {
        device.dispatch_prepare_dispatch(&pass.bindings);
        device.barrier(Barrier::ComputeToIndirect);
        // TODO: dispatch a fixed worst case of batches with empty draws to drop this stall.
        let count = device.read_back(&pass.counter, &pass.staging)?;
        trace!(count, "read back compacted meshlet count");
        Ok(IterationState::new(count))
    }

    /// Culls and draws every batch of `state`, returning the number of batch draws.
    pub fn record(
        &self,
        device: &mut D,
        bindings: &KernelBindings<'_, D>,
        state: IterationState,
        target: &mut FrameTarget<'_, D>,
    ) -> u32 {
        if state.iterations() == 0 {
            target.ensure_cleared(device);
            return 0;
        }
        let mut draws = 0;
        for iteration in state {
            assert!(iteration < MAX_BATCH_ITERATIONS);
            let batch = self.batch(iteration);
            device.wait_event(&batch.event);
            device.reset_event(&batch.event);
            device.fill_buffer(&batch.triangles, 0);
            device.barrier(Barrier::TransferToCompute);
            trace!(
                variant = bindings.variant.name(),
                iteration,
                "triangle cull"
            );
            device.dispatch_triangle_cull(bindings, &batch.bindings, iteration);
            device.barrier(Barrier::ComputeToCompute);
            device.dispatch_prepare_draw(&batch.bindings);
            device.barrier(Barrier::ComputeToDraw);
            let load = target.next_draw();
            device.draw_batch(
                target.target,
                load,
                bindings.scene,
                &batch.indices,
                &batch.draw,
            );
            device.signal_event(&batch.event);
            draws += 1;
        }
        draws
    }
}

#[cfg(test)]
mod tests {
    use cull_gpu::BATCH_COMMAND_CAPACITY;

    use super::*;

    #[test]
    fn iterations_follow_count() {
        assert_eq!(IterationState::new(0).iterations(), 0);
        assert_eq!(IterationState::new(0).compacted(), 0);
        let state = IterationState::new(2 * BATCH_COMMAND_CAPACITY + 1);
        assert_eq!(state.iterations(), 3);
        assert_eq!(state.compacted(), 2 * BATCH_COMMAND_CAPACITY + 1);
        assert_eq!(state.collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    #[should_panic]
    fn iterations_are_bounded() {
        IterationState::new(MAX_BATCH_ITERATIONS * BATCH_COMMAND_CAPACITY + 1);
    }
}
