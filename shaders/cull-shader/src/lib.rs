#![cfg_attr(target_arch = "spirv", no_std)]

use cull_gpu::{
    batch_dispatch, batch_draw, decode_vertex, encode_vertex,
    glam::{ivec2, IVec2, UVec2, UVec3, Vec4, Vec4Swizzles},
    meshlet_command, reduction_footprint, unpack_triangle, vertex_clip, Constants, DepthPyramid,
    DispatchCommand, DrawCommand, Meshlet, Object, PushConstants, Vertex,
    BATCH_COMMAND_CAPACITY, MAX_BATCH_ITERATIONS, VARIANT_REOCCLUSION,
};
use spirv_std::{
    arch::atomic_i_increment,
    image::{sample_with, Image2d},
    memory::{Scope, Semantics},
    spirv, Image,
};

type StorageImage = Image!(2D, format = r32f, sampled = false);

/// Texel fetches from the mip chain of a sampled pyramid image.
struct Fetched<'a>(&'a Image2d);

impl<'a> DepthPyramid for Fetched<'a> {
    fn load(&self, level: u32, x: u32, y: u32) -> f32 {
        let texel: Vec4 = self
            .0
            .fetch_with(ivec2(x as i32, y as i32), sample_with::lod(level as i32));
        texel.x
    }
}

fn increment(counter: &mut u32) -> u32 {
    unsafe {
        atomic_i_increment::<u32, { Scope::Device as u32 }, { Semantics::NONE.bits() }>(counter)
    }
}

// Workgroup sizes match MESH_GROUP_SIZE, MESHLET_GROUP_SIZE, PREPARE_GROUP_SIZE,
// TRIANGLE_GROUP_SIZE and PYRAMID_GROUP_SIZE.

#[allow(clippy::too_many_arguments)]
#[spirv(compute(threads(64)))]
pub fn mesh_cull(
    #[spirv(uniform, descriptor_set = 0, binding = 0)] constants: &Constants,
    #[spirv(storage_buffer, descriptor_set = 0, binding = 1)] objects: &[Object],
    #[spirv(storage_buffer, descriptor_set = 0, binding = 5)] object_visibility: &mut [u32],
    #[spirv(descriptor_set = 3, binding = 0)] pyramid: &Image2d,
    #[spirv(push_constant)] push: &PushConstants,
    #[spirv(spec_constant(id = 0))] variant: u32,
    #[spirv(global_invocation_id)] global_invocation_id: UVec3,
) {
    if global_invocation_id.x >= push.count {
        return;
    }
    let index = (push.first + global_invocation_id.x) as usize;
    object_visibility[index] = cull_gpu::mesh_cull(
        variant,
        object_visibility[index],
        &objects[index],
        constants,
        &Fetched(pyramid),
    );
}

#[allow(clippy::too_many_arguments)]
#[spirv(compute(threads(64)))]
pub fn meshlet_cull(
    #[spirv(uniform, descriptor_set = 0, binding = 0)] constants: &Constants,
    #[spirv(storage_buffer, descriptor_set = 0, binding = 1)] objects: &[Object],
    #[spirv(storage_buffer, descriptor_set = 0, binding = 2)] meshlets: &[Meshlet],
    #[spirv(storage_buffer, descriptor_set = 0, binding = 5)] object_visibility: &[u32],
    #[spirv(storage_buffer, descriptor_set = 0, binding = 6)] meshlet_visibility: &mut [u32],
    #[spirv(storage_buffer, descriptor_set = 1, binding = 0)] commands: &mut [DrawCommand],
    #[spirv(storage_buffer, descriptor_set = 1, binding = 1)] counter: &mut [u32],
    #[spirv(storage_buffer, descriptor_set = 1, binding = 2)] flags: &mut [u32],
    #[spirv(descriptor_set = 3, binding = 0)] pyramid: &Image2d,
    #[spirv(push_constant)] push: &PushConstants,
    #[spirv(spec_constant(id = 0))] variant: u32,
    #[spirv(global_invocation_id)] global_invocation_id: UVec3,
) {
    if global_invocation_id.x >= push.count {
        return;
    }
    let index = push.first + global_invocation_id.x;
    let meshlet = &meshlets[index as usize];
    let object = meshlet.object as usize;
    let decision = cull_gpu::meshlet_cull(
        variant,
        object_visibility[object],
        meshlet_visibility[index as usize],
        meshlet,
        &objects[object],
        constants,
        &Fetched(pyramid),
    );
    meshlet_visibility[index as usize] = decision.visible as u32;
    if decision.emit {
        let slot = increment(&mut counter[0]);
        commands[slot as usize] = meshlet_command(index, meshlet);
    }
    if variant == VARIANT_REOCCLUSION {
        flags[index as usize] = decision.flag;
    }
}

#[spirv(compute(threads(64)))]
pub fn prepare_dispatch(
    #[spirv(storage_buffer, descriptor_set = 1, binding = 1)] counter: &[u32],
    #[spirv(storage_buffer, descriptor_set = 1, binding = 3)] dispatch: &mut [DispatchCommand],
    #[spirv(global_invocation_id)] global_invocation_id: UVec3,
) {
    let iteration = global_invocation_id.x;
    if iteration >= MAX_BATCH_ITERATIONS {
        return;
    }
    dispatch[iteration as usize] = batch_dispatch(counter[0], iteration);
}

/// One workgroup per compacted meshlet command of the batch, one invocation per triangle.
#[allow(clippy::too_many_arguments)]
#[spirv(compute(threads(128)))]
pub fn triangle_cull(
    #[spirv(uniform, descriptor_set = 0, binding = 0)] constants: &Constants,
    #[spirv(storage_buffer, descriptor_set = 0, binding = 1)] objects: &[Object],
    #[spirv(storage_buffer, descriptor_set = 0, binding = 2)] meshlets: &[Meshlet],
    #[spirv(storage_buffer, descriptor_set = 0, binding = 3)] vertices: &[Vertex],
    #[spirv(storage_buffer, descriptor_set = 0, binding = 4)] triangles: &[u32],
    #[spirv(storage_buffer, descriptor_set = 0, binding = 7)] triangle_visibility: &mut [u32],
    #[spirv(storage_buffer, descriptor_set = 1, binding = 0)] commands: &[DrawCommand],
    #[spirv(storage_buffer, descriptor_set = 2, binding = 0)] indices: &mut [u32],
    #[spirv(storage_buffer, descriptor_set = 2, binding = 1)] triangle_count: &mut [u32],
    #[spirv(descriptor_set = 3, binding = 0)] pyramid: &Image2d,
    #[spirv(push_constant)] push: &PushConstants,
    #[spirv(spec_constant(id = 0))] variant: u32,
    #[spirv(workgroup_id)] workgroup_id: UVec3,
    #[spirv(local_invocation_index)] triangle: u32,
) {
    let command = &commands[(push.iteration * BATCH_COMMAND_CAPACITY + workgroup_id.x) as usize];
    let meshlet_index = command.first_instance;
    let meshlet = &meshlets[meshlet_index as usize];
    if triangle >= meshlet.triangle_count {
        return;
    }
    let object = &objects[meshlet.object as usize];
    let corners = unpack_triangle(triangles[(meshlet.triangle_offset + triangle) as usize]);
    let clip = [
        vertex_clip(
            &vertices[(meshlet.vertex_offset + corners[0]) as usize],
            object,
            constants,
        ),
        vertex_clip(
            &vertices[(meshlet.vertex_offset + corners[1]) as usize],
            object,
            constants,
        ),
        vertex_clip(
            &vertices[(meshlet.vertex_offset + corners[2]) as usize],
            object,
            constants,
        ),
    ];
    let global = (meshlet.instance_offset + triangle) as usize;
    let decision = cull_gpu::triangle_cull(
        variant,
        triangle_visibility[global],
        clip,
        constants,
        &Fetched(pyramid),
    );
    if decision.write_visibility {
        triangle_visibility[global] = decision.emit as u32;
    }
    if decision.emit {
        let first = (increment(&mut triangle_count[0]) * 3) as usize;
        indices[first] = encode_vertex(meshlet_index, corners[0]);
        indices[first + 1] = encode_vertex(meshlet_index, corners[1]);
        indices[first + 2] = encode_vertex(meshlet_index, corners[2]);
    }
}

#[spirv(compute(threads(1)))]
pub fn prepare_draw(
    #[spirv(storage_buffer, descriptor_set = 2, binding = 1)] triangle_count: &[u32],
    #[spirv(storage_buffer, descriptor_set = 2, binding = 2)] draw: &mut [DrawCommand],
) {
    draw[0] = batch_draw(triangle_count[0]);
}

/// Level 0 copies the depth attachment, every further level min-reduces the one above.
#[spirv(compute(threads(16, 16)))]
pub fn depth_pyramid(
    #[spirv(descriptor_set = 0, binding = 0)] source: &Image2d,
    #[spirv(descriptor_set = 0, binding = 1)] destination: &StorageImage,
    #[spirv(push_constant)] push: &PushConstants,
    #[spirv(global_invocation_id)] global_invocation_id: UVec3,
) {
    let size: UVec2 = destination.query_size();
    let position = global_invocation_id.xy();
    if position.x >= size.x || position.y >= size.y {
        return;
    }
    let depth = if push.level == 0 {
        let texel: Vec4 = source.fetch(IVec2::new(position.x as i32, position.y as i32));
        texel.x
    } else {
        let source_size: UVec2 = source.query_size_lod(0);
        let (x0, y0, x1, y1) = reduction_footprint(
            position.x,
            position.y,
            (source_size.x, source_size.y),
            (size.x, size.y),
        );
        let pyramid = Fetched(source);
        let mut depth = 1.0f32;
        let mut y = y0;
        while y <= y1 {
            let mut x = x0;
            while x <= x1 {
                depth = depth.min(pyramid.load(0, x, y));
                x += 1;
            }
            y += 1;
        }
        depth
    };
    unsafe {
        destination.write(
            IVec2::new(position.x as i32, position.y as i32),
            Vec4::splat(depth),
        );
    }
}

/// Fetches the vertex of an encoded `(meshlet, local vertex)` index.
#[spirv(vertex)]
pub fn cull_vertex(
    #[spirv(uniform, descriptor_set = 0, binding = 0)] constants: &Constants,
    #[spirv(storage_buffer, descriptor_set = 0, binding = 1)] objects: &[Object],
    #[spirv(storage_buffer, descriptor_set = 0, binding = 2)] meshlets: &[Meshlet],
    #[spirv(storage_buffer, descriptor_set = 0, binding = 3)] vertices: &[Vertex],
    #[spirv(vertex_index)] vertex_index: i32,
    #[spirv(position)] out_position: &mut Vec4,
    out_color: &mut Vec4,
) {
    let (meshlet_index, local) = decode_vertex(vertex_index as u32);
    let meshlet = &meshlets[meshlet_index as usize];
    let object = &objects[meshlet.object as usize];
    let vertex = &vertices[(meshlet.vertex_offset + local) as usize];
    *out_position = vertex_clip(vertex, object, constants);
    let normal = (object.transform * vertex.normal.xyz().extend(0.0))
        .xyz()
        .normalize_or_zero();
    *out_color = (normal * 0.5 + 0.5).extend(1.0);
}

#[spirv(fragment)]
pub fn cull_fragment(in_color: Vec4, output: &mut Vec4) {
    *output = in_color;
}
