//! Host execution of the culling kernels, used to test the passes without a GPU.
//!
//! Every kernel runs the same functions from `cull-gpu` as the shaders, one
//! invocation after another. Draws go through a small depth rasterizer. The
//! device also keeps a log of what was recorded so tests can check the
//! ordering of the passes.

mod buffer;
mod surface;

use std::{cell::Cell, collections::HashMap};

use cull_gpu::{
    batch_dispatch, batch_draw, decode_vertex, encode_vertex, glam::Vec4, meshlet_command,
    mesh_cull, meshlet_cull, triangle_cull, unpack_triangle, vertex_clip, Constants,
    DispatchCommand, DrawCommand, Meshlet, Object, Vertex, BATCH_COMMAND_CAPACITY,
    MAX_BATCH_ITERATIONS, MAX_INDICES,
};
use tracing::trace;
use vulkan::Pod;

pub use buffer::*;
pub use surface::*;

use crate::{
    Barrier, BindingGroup, BufferUsage, CullDevice, CullVariant, Extent, KernelBindings, LoadOp,
};

/// What was recorded, in recording order.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    BeginFrame(usize),
    EndFrame,
    Fill { buffer: String, value: u32 },
    Barrier(Barrier),
    MeshCull {
        variant: CullVariant,
        first: u32,
        count: u32,
    },
    MeshletCull {
        variant: CullVariant,
        first: u32,
        count: u32,
    },
    PrepareDispatch { count: u32 },
    ReadBack { count: u32 },
    TriangleCull {
        variant: CullVariant,
        iteration: u32,
        meshlets: u32,
    },
    PrepareDraw { triangles: u32 },
    WaitEvent(usize),
    ResetEvent(usize),
    SignalEvent(usize),
    DrawBatch { load: LoadOp, index_count: u32 },
    DrawMeshlets { load: LoadOp, draws: u32 },
    ClearTarget,
    BuildPyramid,
}

pub struct Event {
    id: usize,
    signaled: Cell<bool>,
}

impl Event {
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn is_signaled(&self) -> bool {
        self.signaled.get()
    }
}

#[derive(Default)]
pub struct ReferenceDevice {
    commands: Vec<Command>,
    events: usize,
    frame: Option<usize>,
    drawn_triangles: HashMap<u32, u64>,
}

impl ReferenceDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }

    /// Triangles of `object` submitted to the rasterizer since the last reset.
    pub fn drawn_triangles(&self, object: u32) -> u64 {
        self.drawn_triangles.get(&object).copied().unwrap_or(0)
    }

    pub fn reset_statistics(&mut self) {
        self.drawn_triangles.clear();
    }

    pub fn read_buffer<T: Pod>(&self, buffer: &Buffer) -> Vec<T> {
        buffer.to_vec()
    }

    fn load(&mut self, target: &Target, load: LoadOp) {
        if let LoadOp::Clear(color) = load {
            target.0.borrow_mut().clear(color);
        }
    }

    /// Rasterizes the triangles of `indices` in `first_index..first_index + index_count`.
    fn draw_indexed(
        &mut self,
        target: &Target,
        scene: &SceneBindings,
        indices: &[u32],
        command: &DrawCommand,
    ) {
        if command.instance_count == 0 {
            return;
        }
        let constants = scene.constants.read::<Constants>()[0];
        let objects = scene.objects.read::<Object>();
        let meshlets = scene.meshlets.read::<Meshlet>();
        let vertices = scene.vertices.read::<Vertex>();
        let mut surface = target.0.borrow_mut();
        let first = command.first_index as usize;
        let last = first + command.index_count as usize;
        for triangle in indices[first..last].chunks_exact(3) {
            let mut clip = [Vec4::ZERO; 3];
            let mut normal = Vec4::ZERO;
            let mut object_index = 0;
            for (corner, encoded) in clip.iter_mut().zip(triangle.iter()) {
                let (meshlet_index, local) = decode_vertex(*encoded);
                let meshlet = &meshlets[meshlet_index as usize];
                let object = &objects[meshlet.object as usize];
                let vertex = &vertices[(meshlet.vertex_offset + local) as usize];
                *corner = vertex_clip(vertex, object, &constants);
                normal += object.transform * vertex.normal.truncate().extend(0.0);
                object_index = meshlet.object;
            }
            *self.drawn_triangles.entry(object_index).or_default() += 1;
            let normal = normal.truncate().normalize_or_zero() * 0.5 + 0.5;
            surface.rasterize(clip, [normal.x, normal.y, normal.z, 1.0]);
        }
    }
}

impl CullDevice for ReferenceDevice {
    type Buffer = Buffer;
    type Target = Target;
    type Pyramid = Pyramid;
    type Event = Event;
    type Bindings = Bindings;

    fn create_buffer<T: Pod>(
        &mut self,
        usage: BufferUsage,
        len: usize,
        name: &str,
    ) -> eyre::Result<Buffer> {
        Ok(Buffer::new::<T>(usage, len, name))
    }

    fn write_buffer<T: Pod>(&mut self, buffer: &Buffer, data: &[T]) -> eyre::Result<()> {
        let mut contents = buffer.write::<T>();
        if data.len() > contents.len() {
            eyre::bail!(
                "{} elements do not fit into buffer {} of {}",
                data.len(),
                buffer.name(),
                contents.len()
            );
        }
        contents[..data.len()].copy_from_slice(data);
        Ok(())
    }

    fn create_target(&mut self, extent: Extent) -> eyre::Result<Target> {
        Ok(Target::new(extent))
    }

    fn create_pyramid(&mut self, target: &Target) -> eyre::Result<Pyramid> {
        Ok(Pyramid::new(target.extent()))
    }

    fn create_event(&mut self) -> eyre::Result<Event> {
        self.events += 1;
        Ok(Event {
            id: self.events - 1,
            signaled: Cell::new(true),
        })
    }

    fn create_bindings(&mut self, group: BindingGroup<'_, Self>) -> eyre::Result<Bindings> {
        Ok(match group {
            BindingGroup::Scene {
                constants,
                objects,
                meshlets,
                vertices,
                triangles,
                object_visibility,
                meshlet_visibility,
                triangle_visibility,
            } => Bindings::Scene(SceneBindings {
                constants: constants.clone(),
                objects: objects.clone(),
                meshlets: meshlets.clone(),
                vertices: vertices.clone(),
                triangles: triangles.clone(),
                object_visibility: object_visibility.clone(),
                meshlet_visibility: meshlet_visibility.clone(),
                triangle_visibility: triangle_visibility.clone(),
            }),
            BindingGroup::Pass {
                commands,
                counter,
                flags,
                dispatch,
            } => Bindings::Pass(PassBindings {
                commands: commands.clone(),
                counter: counter.clone(),
                flags: flags.clone(),
                dispatch: dispatch.clone(),
            }),
            BindingGroup::Batch {
                indices,
                triangles,
                draw,
            } => Bindings::Batch(BatchBindings {
                indices: indices.clone(),
                triangles: triangles.clone(),
                draw: draw.clone(),
            }),
        })
    }

    fn begin_frame(&mut self, frame: usize) -> eyre::Result<()> {
        if let Some(current) = self.frame {
            eyre::bail!("frame {} begun while frame {} is recorded", frame, current);
        }
        self.frame = Some(frame);
        self.commands.push(Command::BeginFrame(frame));
        Ok(())
    }

    fn end_frame(&mut self) -> eyre::Result<()> {
        if self.frame.take().is_none() {
            eyre::bail!("no frame is recorded");
        }
        self.commands.push(Command::EndFrame);
        Ok(())
    }

    fn fill_buffer(&mut self, buffer: &Buffer, value: u32) {
        buffer.write::<u32>().iter_mut().for_each(|x| *x = value);
        self.commands.push(Command::Fill {
            buffer: buffer.name().to_owned(),
            value,
        });
    }

    fn barrier(&mut self, barrier: Barrier) {
        self.commands.push(Command::Barrier(barrier));
    }

    fn dispatch_mesh_cull(&mut self, bindings: &KernelBindings<'_, Self>, first: u32, count: u32) {
        let scene = bindings.scene.scene();
        let constants = scene.constants.read::<Constants>()[0];
        let objects = scene.objects.read::<Object>();
        let pyramid = bindings.pyramid.0.borrow();
        let mut visibility = scene.object_visibility.write::<u32>();
        for index in first..first + count {
            let index = index as usize;
            visibility[index] = mesh_cull(
                bindings.variant.id(),
                visibility[index],
                &objects[index],
                &constants,
                &*pyramid,
            );
        }
        self.commands.push(Command::MeshCull {
            variant: bindings.variant,
            first,
            count,
        });
    }

    fn dispatch_meshlet_cull(
        &mut self,
        bindings: &KernelBindings<'_, Self>,
        first: u32,
        count: u32,
    ) {
        let scene = bindings.scene.scene();
        let pass = bindings.pass.pass();
        let constants = scene.constants.read::<Constants>()[0];
        let objects = scene.objects.read::<Object>();
        let meshlets = scene.meshlets.read::<Meshlet>();
        let object_visibility = scene.object_visibility.read::<u32>();
        let pyramid = bindings.pyramid.0.borrow();
        let mut visibility = scene.meshlet_visibility.write::<u32>();
        let mut counter = pass.counter.write::<u32>();
        let mut commands = pass.commands.write::<DrawCommand>();
        let mut flags = pass.flags.write::<u32>();
        for index in first..first + count {
            let meshlet = &meshlets[index as usize];
            let decision = meshlet_cull(
                bindings.variant.id(),
                object_visibility[meshlet.object as usize],
                visibility[index as usize],
                meshlet,
                &objects[meshlet.object as usize],
                &constants,
                &*pyramid,
            );
            visibility[index as usize] = decision.visible as u32;
            if decision.emit {
                commands[counter[0] as usize] = meshlet_command(index, meshlet);
                counter[0] += 1;
            }
            if bindings.variant == CullVariant::Reocclusion {
                flags[index as usize] = decision.flag;
            }
        }
        self.commands.push(Command::MeshletCull {
            variant: bindings.variant,
            first,
            count,
        });
    }

    fn dispatch_prepare_dispatch(&mut self, pass: &Bindings) {
        let pass = pass.pass();
        let count = pass.counter.read::<u32>()[0];
        let mut dispatch = pass.dispatch.write::<DispatchCommand>();
        for iteration in 0..MAX_BATCH_ITERATIONS {
            dispatch[iteration as usize] = batch_dispatch(count, iteration);
        }
        self.commands.push(Command::PrepareDispatch { count });
    }

    fn read_back(&mut self, counter: &Buffer, staging: &Buffer) -> eyre::Result<u32> {
        let count = counter.read::<u32>()[0];
        staging.write::<u32>()[0] = count;
        self.commands.push(Command::ReadBack { count });
        Ok(count)
    }

    fn dispatch_triangle_cull(
        &mut self,
        bindings: &KernelBindings<'_, Self>,
        batch: &Bindings,
        iteration: u32,
    ) {
        let scene = bindings.scene.scene();
        let pass = bindings.pass.pass();
        let batch = batch.batch();
        let constants = scene.constants.read::<Constants>()[0];
        let objects = scene.objects.read::<Object>();
        let meshlets = scene.meshlets.read::<Meshlet>();
        let vertices = scene.vertices.read::<Vertex>();
        let packed = scene.triangles.read::<u32>();
        let commands = pass.commands.read::<DrawCommand>();
        let groups = pass.dispatch.read::<DispatchCommand>()[iteration as usize].x;
        let pyramid = bindings.pyramid.0.borrow();
        let mut visibility = scene.triangle_visibility.write::<u32>();
        let mut counter = batch.triangles.write::<u32>();
        let mut indices = batch.indices.write::<u32>();
        for group in 0..groups {
            let command = &commands[(iteration * BATCH_COMMAND_CAPACITY + group) as usize];
            let meshlet_index = command.first_instance;
            let meshlet = &meshlets[meshlet_index as usize];
            let object = &objects[meshlet.object as usize];
            for triangle in 0..meshlet.triangle_count {
                let packed = packed[(meshlet.triangle_offset + triangle) as usize];
                let corners = unpack_triangle(packed);
                let mut clip = [Vec4::ZERO; 3];
                for (position, local) in clip.iter_mut().zip(corners.iter()) {
                    let vertex = &vertices[(meshlet.vertex_offset + local) as usize];
                    *position = vertex_clip(vertex, object, &constants);
                }
                let global = (meshlet.instance_offset + triangle) as usize;
                let decision = triangle_cull(
                    bindings.variant.id(),
                    visibility[global],
                    clip,
                    &constants,
                    &*pyramid,
                );
                if decision.write_visibility {
                    visibility[global] = decision.emit as u32;
                }
                if decision.emit {
                    let first = counter[0] as usize * 3;
                    assert!(first + 3 <= MAX_INDICES as usize);
                    for (index, local) in indices[first..first + 3].iter_mut().zip(corners.iter()) {
                        *index = encode_vertex(meshlet_index, *local);
                    }
                    counter[0] += 1;
                }
            }
        }
        trace!(iteration, triangles = counter[0], "reference triangle cull");
        self.commands.push(Command::TriangleCull {
            variant: bindings.variant,
            iteration,
            meshlets: groups,
        });
    }

    fn dispatch_prepare_draw(&mut self, batch: &Bindings) {
        let batch = batch.batch();
        let triangles = batch.triangles.read::<u32>()[0];
        batch.draw.write::<DrawCommand>()[0] = batch_draw(triangles);
        self.commands.push(Command::PrepareDraw { triangles });
    }

    fn wait_event(&mut self, event: &Event) {
        assert!(
            event.signaled.get(),
            "waiting on event {} that is never signaled",
            event.id
        );
        self.commands.push(Command::WaitEvent(event.id));
    }

    fn reset_event(&mut self, event: &Event) {
        event.signaled.set(false);
        self.commands.push(Command::ResetEvent(event.id));
    }

    fn signal_event(&mut self, event: &Event) {
        event.signaled.set(true);
        self.commands.push(Command::SignalEvent(event.id));
    }

    fn draw_batch(
        &mut self,
        target: &Target,
        load: LoadOp,
        scene: &Bindings,
        indices: &Buffer,
        draw: &Buffer,
    ) {
        self.load(target, load);
        let command = draw.read::<DrawCommand>()[0];
        self.draw_indexed(target, scene.scene(), &indices.read::<u32>(), &command);
        self.commands.push(Command::DrawBatch {
            load,
            index_count: command.index_count * command.instance_count,
        });
    }

    fn draw_meshlets(
        &mut self,
        target: &Target,
        load: LoadOp,
        scene: &Bindings,
        indices: &Buffer,
        commands: &Buffer,
        counter: &Buffer,
        max_draws: u32,
    ) {
        self.load(target, load);
        let draws = counter.read::<u32>()[0].min(max_draws);
        let commands = commands.read::<DrawCommand>();
        let indices = indices.read::<u32>();
        for command in &commands[..draws as usize] {
            self.draw_indexed(target, scene.scene(), &indices, command);
        }
        self.commands.push(Command::DrawMeshlets { load, draws });
    }

    fn clear_target(&mut self, target: &Target, color: [f32; 4]) {
        target.0.borrow_mut().clear(color);
        self.commands.push(Command::ClearTarget);
    }

    fn build_pyramid(&mut self, target: &Target, pyramid: &Pyramid) {
        pyramid.0.borrow_mut().build(&target.0.borrow());
        self.commands.push(Command::BuildPyramid);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_start_signaled() {
        let mut device = ReferenceDevice::new();
        let event = device.create_event().unwrap();
        device.wait_event(&event);
        device.reset_event(&event);
        assert!(!event.is_signaled());
        device.signal_event(&event);
        device.wait_event(&event);
    }

    #[test]
    #[should_panic]
    fn waiting_on_a_reset_event_aborts() {
        let mut device = ReferenceDevice::new();
        let event = device.create_event().unwrap();
        device.reset_event(&event);
        device.wait_event(&event);
    }

    #[test]
    fn prepare_dispatch_covers_count() {
        let mut device = ReferenceDevice::new();
        let commands = device
            .create_buffer::<DrawCommand>(BufferUsage::Commands, 1, "commands")
            .unwrap();
        let counter = device
            .create_buffer::<u32>(BufferUsage::Counter, 1, "counter")
            .unwrap();
        let flags = device
            .create_buffer::<u32>(BufferUsage::Storage, 1, "flags")
            .unwrap();
        let dispatch = device
            .create_buffer::<DispatchCommand>(
                BufferUsage::Commands,
                MAX_BATCH_ITERATIONS as usize,
                "dispatch",
            )
            .unwrap();
        let bindings = device
            .create_bindings(BindingGroup::Pass {
                commands: &commands,
                counter: &counter,
                flags: &flags,
                dispatch: &dispatch,
            })
            .unwrap();
        device.write_buffer(&counter, &[BATCH_COMMAND_CAPACITY + 3]).unwrap();
        device.dispatch_prepare_dispatch(&bindings);
        let dispatch = device.read_buffer::<DispatchCommand>(&dispatch);
        assert_eq!(dispatch[0].x, BATCH_COMMAND_CAPACITY);
        assert_eq!(dispatch[1].x, 3);
        assert_eq!(dispatch[2].x, 0);
    }

    #[test]
    fn oversized_writes_fail() {
        let mut device = ReferenceDevice::new();
        let buffer = device
            .create_buffer::<u32>(BufferUsage::Scene, 2, "scene")
            .unwrap();
        assert!(device.write_buffer(&buffer, &[1u32, 2, 3]).is_err());
        device.write_buffer(&buffer, &[7u32]).unwrap();
        assert_eq!(device.read_buffer::<u32>(&buffer), vec![7, 0]);
    }

    #[test]
    fn frames_do_not_nest() {
        let mut device = ReferenceDevice::new();
        device.begin_frame(0).unwrap();
        assert!(device.begin_frame(1).is_err());
        device.end_frame().unwrap();
        assert!(device.end_frame().is_err());
    }
}
