use vulkan::Pod;

use crate::CullVariant;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn pyramid_levels(self) -> u32 {
        cull_gpu::pyramid_levels(self.width, self.height)
    }
}

/// How a buffer is accessed, which decides its memory location and usage flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferUsage {
    /// Uniform data rewritten by the host every frame.
    Constants,
    /// Storage data uploaded once per scene.
    Scene,
    /// Storage data only touched by the device.
    Storage,
    /// Compacted draw or dispatch commands, consumed by indirect commands.
    Commands,
    /// Atomic counters, cleared by fills and read by indirect count draws.
    Counter,
    /// Encoded vertex indices used as an index buffer.
    Indices,
    /// Host readable copy target.
    ReadBack,
}

/// Execution and memory dependency between two recorded commands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Barrier {
    /// Fills before the kernels that accumulate into the filled buffers.
    TransferToCompute,
    /// Storage writes of one kernel before storage reads of the next.
    ComputeToCompute,
    /// Storage writes before indirect dispatch or draw arguments are read.
    ComputeToIndirect,
    /// Storage writes before index and vertex fetches of a draw.
    ComputeToDraw,
    /// Depth writes of a draw before the pyramid build reads them.
    DrawToCompute,
    /// Pyramid writes before the culling kernels sample it.
    PyramidToCompute,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LoadOp {
    /// Clear color to the given value and depth to the far plane before drawing.
    Clear([f32; 4]),
    /// Draw on top of the current contents.
    Load,
}

/// Buffers bound together while a kernel or draw runs.
pub enum BindingGroup<'a, D: CullDevice + ?Sized> {
    /// Scene data and visibility of one frame slot.
    Scene {
        constants: &'a D::Buffer,
        objects: &'a D::Buffer,
        meshlets: &'a D::Buffer,
        vertices: &'a D::Buffer,
        triangles: &'a D::Buffer,
        object_visibility: &'a D::Buffer,
        meshlet_visibility: &'a D::Buffer,
        triangle_visibility: &'a D::Buffer,
    },
    /// Compaction output of one pass in one frame slot.
    Pass {
        commands: &'a D::Buffer,
        counter: &'a D::Buffer,
        flags: &'a D::Buffer,
        dispatch: &'a D::Buffer,
    },
    /// Resources of one triangle batch ring slot.
    Batch {
        indices: &'a D::Buffer,
        triangles: &'a D::Buffer,
        draw: &'a D::Buffer,
    },
}

/// Everything a dispatch of a culling kernel needs.
pub struct KernelBindings<'a, D: CullDevice + ?Sized> {
    pub variant: CullVariant,
    pub scene: &'a D::Bindings,
    pub pass: &'a D::Bindings,
    pub pyramid: &'a D::Pyramid,
}

/// Command recording surface the culling passes are written against.
///
/// Recording is sequential. Commands execute in recording order, subject only
/// to the barriers and events recorded between them.
pub trait CullDevice {
    type Buffer: 'static;
    /// Color and depth attachments of a frame.
    type Target: Clone + 'static;
    /// Depth pyramid built from the depth of the target it was created for.
    type Pyramid: Clone + 'static;
    type Event: 'static;
    type Bindings: 'static;

    /// Creates a zeroed buffer of `len` elements of `T`.
    fn create_buffer<T: Pod>(
        &mut self,
        usage: BufferUsage,
        len: usize,
        name: &str,
    ) -> eyre::Result<Self::Buffer>;

    /// Uploads `data` to the start of `buffer`.
    fn write_buffer<T: Pod>(&mut self, buffer: &Self::Buffer, data: &[T]) -> eyre::Result<()>;

    fn create_target(&mut self, extent: Extent) -> eyre::Result<Self::Target>;

    /// Creates a pyramid for `target`, cleared to the far plane so it hides nothing.
    fn create_pyramid(&mut self, target: &Self::Target) -> eyre::Result<Self::Pyramid>;

    /// Creates a split barrier event in the signaled state.
    fn create_event(&mut self) -> eyre::Result<Self::Event>;

    fn create_bindings(&mut self, group: BindingGroup<'_, Self>) -> eyre::Result<Self::Bindings>;

    fn begin_frame(&mut self, frame: usize) -> eyre::Result<()>;

    fn end_frame(&mut self) -> eyre::Result<()>;

    fn fill_buffer(&mut self, buffer: &Self::Buffer, value: u32);

    fn barrier(&mut self, barrier: Barrier);

    /// Mesh kernel for the objects `first..first + count`.
    fn dispatch_mesh_cull(&mut self, bindings: &KernelBindings<'_, Self>, first: u32, count: u32);

    /// Meshlet kernel for the meshlet instances `first..first + count`.
    fn dispatch_meshlet_cull(
        &mut self,
        bindings: &KernelBindings<'_, Self>,
        first: u32,
        count: u32,
    );

    /// Writes the dispatch arguments of every possible triangle batch of `pass`.
    fn dispatch_prepare_dispatch(&mut self, pass: &Self::Bindings);

    /// Waits for everything recorded so far and returns the first value of `counter`.
    fn read_back(&mut self, counter: &Self::Buffer, staging: &Self::Buffer) -> eyre::Result<u32>;

    /// Triangle kernel of batch `iteration`, sized by the prepared dispatch arguments.
    fn dispatch_triangle_cull(
        &mut self,
        bindings: &KernelBindings<'_, Self>,
        batch: &Self::Bindings,
        iteration: u32,
    );

    fn dispatch_prepare_draw(&mut self, batch: &Self::Bindings);

    fn wait_event(&mut self, event: &Self::Event);

    fn reset_event(&mut self, event: &Self::Event);

    fn signal_event(&mut self, event: &Self::Event);

    /// Indexed indirect draw of one batch.
    fn draw_batch(
        &mut self,
        target: &Self::Target,
        load: LoadOp,
        scene: &Self::Bindings,
        indices: &Self::Buffer,
        draw: &Self::Buffer,
    );

    /// Indirect count draw of compacted whole meshlets from the global index buffer.
    #[allow(clippy::too_many_arguments)]
    fn draw_meshlets(
        &mut self,
        target: &Self::Target,
        load: LoadOp,
        scene: &Self::Bindings,
        indices: &Self::Buffer,
        commands: &Self::Buffer,
        counter: &Self::Buffer,
        max_draws: u32,
    );

    fn clear_target(&mut self, target: &Self::Target, color: [f32; 4]);

    /// Rebuilds every level of `pyramid` from the depth of `target`.
    fn build_pyramid(&mut self, target: &Self::Target, pyramid: &Self::Pyramid);
}
