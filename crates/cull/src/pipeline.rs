use cull_gpu::{Constants, Meshlet, Object, Vertex};
use tracing::debug;

use crate::{
    Barrier, BindingGroup, Blackboard, BufferUsage, Camera, CullConfiguration, CullDevice,
    CullVariant, Extent, FrameTarget, HiZ, IterationState, KernelBindings, MeshContext,
    MeshletContext, Mode, PerFrame, PyramidKind, SceneCounts, SceneData, TriangleContext,
};

pub const DRAW_PASS: &str = "draw";
pub const HIZ_PASS: &str = "hiz";
pub const STATISTICS_PASS: &str = "statistics";

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameInput {
    pub camera: Camera,
    pub extent: Extent,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStatistics {
    pub frame: usize,
    /// Meshlet commands compacted by the first cull, as read back by the host.
    pub compacted: u32,
    pub iterations: u32,
    pub reocclusion_iterations: u32,
    /// Indexed indirect draws of triangle batches, over both phases.
    pub batch_draws: u32,
    /// Indirect count draws of whole meshlets. A two-phase frame records one even
    /// when no meshlet survives the reocclusion, the device then draws nothing.
    pub meshlet_draws: u32,
}

/// Handles of what a frame rendered, valid until its slot is recorded again.
pub struct CullOutput<D: CullDevice> {
    pub target: D::Target,
    pub hiz: D::Pyramid,
    pub statistics: FrameStatistics,
}

impl<D: CullDevice> Clone for CullOutput<D> {
    fn clone(&self) -> Self {
        Self {
            target: self.target.clone(),
            hiz: self.hiz.clone(),
            statistics: self.statistics,
        }
    }
}

struct SceneBuffers<D: CullDevice> {
    objects: D::Buffer,
    meshlets: D::Buffer,
    vertices: D::Buffer,
    triangles: D::Buffer,
    indices: D::Buffer,
}

impl<D: CullDevice> SceneBuffers<D> {
    fn new(device: &mut D, scene: &SceneData) -> eyre::Result<Self> {
        let objects = upload::<D, Object>(device, BufferUsage::Scene, &scene.objects, "objects")?;
        let meshlets =
            upload::<D, Meshlet>(device, BufferUsage::Scene, &scene.meshlets, "meshlets")?;
        let vertices =
            upload::<D, Vertex>(device, BufferUsage::Scene, &scene.vertices, "vertices")?;
        let triangles =
            upload::<D, u32>(device, BufferUsage::Scene, &scene.triangles, "triangles")?;
        let indices = upload::<D, u32>(device, BufferUsage::Indices, &scene.indices, "indices")?;
        Ok(Self {
            objects,
            meshlets,
            vertices,
            triangles,
            indices,
        })
    }
}

fn upload<D: CullDevice, T: vulkan::Pod>(
    device: &mut D,
    usage: BufferUsage,
    data: &[T],
    name: &str,
) -> eyre::Result<D::Buffer> {
    let buffer = device.create_buffer::<T>(usage, data.len().max(1), name)?;
    device.write_buffer(&buffer, data)?;
    Ok(buffer)
}

/// Three level occlusion culling of one static scene.
pub struct CullPipeline<D: CullDevice> {
    configuration: CullConfiguration,
    counts: SceneCounts,
    scene: SceneBuffers<D>,
    constants: PerFrame<D::Buffer>,
    scene_bindings: PerFrame<D::Bindings>,
    mesh: MeshContext<D>,
    meshlet: MeshletContext<D>,
    triangle: TriangleContext<D>,
    hiz: HiZ<D>,
    frame: usize,
    blackboard: Blackboard,
}

impl<D: CullDevice> CullPipeline<D> {
    pub fn new(
        device: &mut D,
        scene: &SceneData,
        configuration: CullConfiguration,
    ) -> eyre::Result<Self> {
        let counts = scene.counts();
        let buffers = SceneBuffers::new(device, scene)?;
        let mesh = MeshContext::new(device, scene.objects.len())?;
        let meshlet = MeshletContext::new(device, scene.meshlets.len())?;
        let triangle = TriangleContext::new(device, scene.triangle_count() as usize)?;
        let constants = PerFrame::new(|i| {
            device.create_buffer::<Constants>(
                BufferUsage::Constants,
                1,
                &format!("constants {}", i),
            )
        })?;
        let scene_bindings = PerFrame::new(|i| {
            device.create_bindings(BindingGroup::Scene {
                constants: &constants[i],
                objects: &buffers.objects,
                meshlets: &buffers.meshlets,
                vertices: &buffers.vertices,
                triangles: &buffers.triangles,
                object_visibility: mesh.visibility.buffer(),
                meshlet_visibility: meshlet.visibility.buffer(),
                triangle_visibility: triangle.visibility.buffer(),
            })
        })?;
        debug!(
            objects = counts.objects,
            meshlets = counts.meshlets,
            triangles = scene.triangle_count(),
            mode = ?configuration.mode,
            "created cull pipeline"
        );
        Ok(Self {
            configuration,
            counts,
            scene: buffers,
            constants,
            scene_bindings,
            mesh,
            meshlet,
            triangle,
            hiz: HiZ::new(),
            frame: 0,
            blackboard: Blackboard::new(),
        })
    }

    /// Records and submits one frame, then advances to the next frame slot.
    pub fn render(&mut self, device: &mut D, input: &FrameInput) -> eyre::Result<CullOutput<D>> {
        let frame = self.frame;
        self.hiz.prepare(device, input.extent)?;
        device.begin_frame(frame)?;
        let constants =
            input
                .camera
                .constants(input.extent, self.counts, self.configuration.occlusion);
        device.write_buffer(&self.constants[frame], &[constants])?;
        self.meshlet.reset(device, frame);
        let statistics = match self.configuration.mode {
            Mode::Single => self.record_single(device, frame)?,
            Mode::TwoPhase => self.record_two_phase(device, frame)?,
        };
        device.end_frame()?;
        debug!(
            frame,
            compacted = statistics.compacted,
            iterations = statistics.iterations,
            reocclusion_iterations = statistics.reocclusion_iterations,
            batch_draws = statistics.batch_draws,
            meshlet_draws = statistics.meshlet_draws,
            "rendered frame"
        );
        let output = CullOutput::<D> {
            target: self.hiz.surfaces(frame).target.clone(),
            hiz: self.hiz.resource(frame).clone(),
            statistics,
        };
        self.blackboard.publish(DRAW_PASS, output.target.clone());
        self.blackboard.publish(HIZ_PASS, output.hiz.clone());
        self.blackboard.publish(STATISTICS_PASS, statistics);
        self.frame += 1;
        Ok(output)
    }

    fn record_single(&self, device: &mut D, frame: usize) -> eyre::Result<FrameStatistics> {
        let surfaces = self.hiz.surfaces(frame);
        let pass = &self.meshlet.pass(CullVariant::Single).frames[frame];
        let bindings = KernelBindings {
            variant: CullVariant::Single,
            scene: &self.scene_bindings[frame],
            pass: &pass.bindings,
            pyramid: self.hiz.previous(frame),
        };
        self.mesh.record(device, &bindings);
        device.barrier(Barrier::ComputeToCompute);
        self.meshlet.record(device, &bindings);
        device.barrier(Barrier::ComputeToCompute);
        let state = self.triangle.prepare(device, pass)?;
        let mut target = FrameTarget::new(&surfaces.target, self.configuration.clear_color);
        let batch_draws = self.triangle.record(device, &bindings, state, &mut target);
        self.hiz.rebuild(device, frame, PyramidKind::Reocclusion);
        Ok(FrameStatistics {
            frame,
            compacted: state.compacted(),
            iterations: state.iterations(),
            reocclusion_iterations: 0,
            batch_draws,
            meshlet_draws: 0,
        })
    }

    fn record_two_phase(&self, device: &mut D, frame: usize) -> eyre::Result<FrameStatistics> {
        let surfaces = self.hiz.surfaces(frame);
        let scene = &self.scene_bindings[frame];
        let cull_pass = &self.meshlet.pass(CullVariant::Cull).frames[frame];
        let cull = KernelBindings {
            variant: CullVariant::Cull,
            scene,
            pass: &cull_pass.bindings,
            pyramid: self.hiz.previous(frame),
        };
        self.mesh.record(device, &cull);
        device.barrier(Barrier::ComputeToCompute);
        self.meshlet.record(device, &cull);
        device.barrier(Barrier::ComputeToCompute);
        let state = self.triangle.prepare(device, cull_pass)?;
        let mut target = FrameTarget::new(&surfaces.target, self.configuration.clear_color);
        let mut batch_draws = self.triangle.record(device, &cull, state, &mut target);
        self.hiz.rebuild(device, frame, PyramidKind::Main);

        // Triangles of the compacted meshlets are retested against the fresh depth.
        let triangle_reocclusion = KernelBindings {
            variant: CullVariant::Reocclusion,
            scene,
            pass: &cull_pass.bindings,
            pyramid: &surfaces.main,
        };
        let reocclusion_state = IterationState::new(state.compacted());
        batch_draws +=
            self.triangle
                .record(device, &triangle_reocclusion, reocclusion_state, &mut target);
        self.hiz.rebuild(device, frame, PyramidKind::Reocclusion);

        let reocclusion = self.meshlet.pass(CullVariant::Reocclusion);
        let reocclusion_pass = &reocclusion.frames[frame];
        let bindings = KernelBindings {
            variant: CullVariant::Reocclusion,
            scene,
            pass: &reocclusion_pass.bindings,
            pyramid: &surfaces.reocclusion,
        };
        self.mesh.record(device, &bindings);
        device.barrier(Barrier::ComputeToCompute);
        self.meshlet.record(device, &bindings);
        device.barrier(Barrier::ComputeToIndirect);
        let load = target.next_draw();
        device.draw_meshlets(
            &surfaces.target,
            load,
            scene,
            &self.scene.indices,
            reocclusion.commands.buffer(),
            &reocclusion_pass.counter,
            reocclusion.commands.capacity() as u32,
        );
        Ok(FrameStatistics {
            frame,
            compacted: state.compacted(),
            iterations: state.iterations(),
            reocclusion_iterations: reocclusion_state.iterations(),
            batch_draws,
            meshlet_draws: 1,
        })
    }

    /// Number of frames rendered so far.
    pub fn frame(&self) -> usize {
        self.frame
    }

    pub fn configuration(&self) -> &CullConfiguration {
        &self.configuration
    }

    pub fn counts(&self) -> SceneCounts {
        self.counts
    }

    pub fn blackboard(&self) -> &Blackboard {
        &self.blackboard
    }

    pub fn mesh(&self) -> &MeshContext<D> {
        &self.mesh
    }

    pub fn meshlet(&self) -> &MeshletContext<D> {
        &self.meshlet
    }

    pub fn triangle(&self) -> &TriangleContext<D> {
        &self.triangle
    }

    pub fn hiz(&self) -> &HiZ<D> {
        &self.hiz
    }
}
