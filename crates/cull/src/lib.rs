mod blackboard;
mod cache;
mod camera;
mod configuration;
mod device;
mod frame;
mod hiz;
mod mesh;
mod meshlet;
mod pipeline;
mod scene;
mod triangle;
mod variant;

pub mod gpu;
pub mod reference;

pub use blackboard::*;
pub use cache::*;
pub use camera::*;
pub use configuration::*;
pub use device::*;
pub use frame::*;
pub use hiz::*;
pub use mesh::*;
pub use meshlet::*;
pub use pipeline::*;
pub use scene::*;
pub use triangle::*;
pub use variant::*;

pub use cull_gpu::glam;
