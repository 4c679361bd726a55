#![cfg_attr(target_arch = "spirv", no_std)]

//! Data layouts and visibility math shared by the host and the culling shaders.
//!
//! Every type here is `repr(C)` and mirrors a buffer the shaders read or write.
//! Depth is reversed: 1 at the near plane, 0 at the far plane, so the depth pyramid
//! stores the *minimum* of its footprint, the farthest occluder.

mod kernel;
mod pyramid;
mod visibility;

pub use glam;
pub use kernel::*;
pub use pyramid::*;
pub use visibility::*;

use glam::{Mat4, Vec4};

pub type Bool32 = u32;
pub const TRUE: Bool32 = 1;
pub const FALSE: Bool32 = 0;

pub const MAX_MESHLET_VERTICES: u32 = 64;
pub const MAX_MESHLET_TRIANGLES: u32 = 124;
pub const MESHLET_VERTEX_BITS: u32 = 6;

/// Compacted meshlet commands consumed by one triangle batch.
pub const BATCH_COMMAND_CAPACITY: u32 = 128;
pub const MAX_BATCH_TRIANGLES: u32 = BATCH_COMMAND_CAPACITY * MAX_MESHLET_TRIANGLES;
pub const MAX_INDICES: u32 = MAX_BATCH_TRIANGLES * 3;
pub const MAX_BATCH_ITERATIONS: u32 = 2048;
pub const MAX_COMPACTED_MESHLETS: u32 = MAX_BATCH_ITERATIONS * BATCH_COMMAND_CAPACITY;

pub const MESH_GROUP_SIZE: u32 = 64;
pub const MESHLET_GROUP_SIZE: u32 = 64;
pub const TRIANGLE_GROUP_SIZE: u32 = 128;
pub const PREPARE_GROUP_SIZE: u32 = 64;
pub const PYRAMID_GROUP_SIZE: u32 = 16;
pub const MAX_DISPATCH_GROUPS: u32 = 65535;
pub const MESH_DISPATCH_CAPACITY: u32 = MAX_DISPATCH_GROUPS * MESH_GROUP_SIZE;
pub const MESHLET_DISPATCH_CAPACITY: u32 = MAX_DISPATCH_GROUPS * MESHLET_GROUP_SIZE;
pub const MAX_PYRAMID_LEVELS: u32 = 16;

pub const VARIANT_CULL: u32 = 0;
pub const VARIANT_REOCCLUSION: u32 = 1;
pub const VARIANT_SINGLE: u32 = 2;

pub const COMMAND_CULLED: u32 = 0;
pub const COMMAND_HANDLED: u32 = 1;
pub const COMMAND_EMITTED: u32 = 2;

#[derive(Clone, Copy, Default, Debug, PartialEq)]
#[cfg_attr(
    not(target_arch = "spirv"),
    derive(bytemuck::Pod, bytemuck::Zeroable)
)]
#[repr(C)]
pub struct Constants {
    pub view: Mat4,
    pub view_projection: Mat4,
    pub camera_position: Vec4,
    /// Normalized side plane factors `(1/√(1+w²), w/√(1+w²), 1/√(1+h²), h/√(1+h²))`
    /// for the half extents `w` and `h` of the view frustum at unit depth.
    pub frustum: Vec4,
    /// `(width, height, 1 / width, 1 / height)` of the render target.
    pub viewport: Vec4,
    pub p00: f32,
    pub p11: f32,
    pub znear: f32,
    pub zfar: f32,
    pub pyramid_width: u32,
    pub pyramid_height: u32,
    pub pyramid_levels: u32,
    pub object_count: u32,
    pub meshlet_count: u32,
    pub occlusion: Bool32,
    pub pad: [u32; 2],
}

#[derive(Clone, Copy, Default, Debug, PartialEq)]
#[cfg_attr(
    not(target_arch = "spirv"),
    derive(bytemuck::Pod, bytemuck::Zeroable)
)]
#[repr(C)]
pub struct Object {
    pub transform: Mat4,
    /// Model space bounding sphere, radius in `w`.
    pub bounds: Vec4,
    pub first_meshlet: u32,
    pub meshlet_count: u32,
    /// Largest axis scale of `transform`.
    pub scale: f32,
    pub pad: u32,
}

#[derive(Clone, Copy, Default, Debug, PartialEq)]
#[cfg_attr(
    not(target_arch = "spirv"),
    derive(bytemuck::Pod, bytemuck::Zeroable)
)]
#[repr(C)]
pub struct Meshlet {
    /// Model space bounding sphere, radius in `w`.
    pub bounds: Vec4,
    /// Model space normal cone axis in `xyz`, cutoff in `w`.
    pub cone: Vec4,
    pub object: u32,
    pub vertex_offset: u32,
    pub vertex_count: u32,
    /// Offset into the packed meshlet local triangle list.
    pub triangle_offset: u32,
    pub triangle_count: u32,
    /// First triangle of this meshlet instance in scene wide triangle numbering.
    pub instance_offset: u32,
    pub pad: [u32; 2],
}

#[derive(Clone, Copy, Default, Debug, PartialEq)]
#[cfg_attr(
    not(target_arch = "spirv"),
    derive(bytemuck::Pod, bytemuck::Zeroable)
)]
#[repr(C)]
pub struct Vertex {
    pub position: Vec4,
    pub normal: Vec4,
}

/// Layout of `VkDrawIndexedIndirectCommand`.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(
    not(target_arch = "spirv"),
    derive(bytemuck::Pod, bytemuck::Zeroable)
)]
#[repr(C)]
pub struct DrawCommand {
    pub index_count: u32,
    pub instance_count: u32,
    pub first_index: u32,
    pub vertex_offset: i32,
    pub first_instance: u32,
}

/// Layout of `VkDispatchIndirectCommand`.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(
    not(target_arch = "spirv"),
    derive(bytemuck::Pod, bytemuck::Zeroable)
)]
#[repr(C)]
pub struct DispatchCommand {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(
    not(target_arch = "spirv"),
    derive(bytemuck::Pod, bytemuck::Zeroable)
)]
#[repr(C)]
pub struct PushConstants {
    /// First instance covered by a split dispatch.
    pub first: u32,
    pub iteration: u32,
    pub level: u32,
    pub count: u32,
}
