/// SPIR-V module holding every entry point of the culling pipeline.
pub const CODE: &[u8] = include_bytes!(env!("cull_shader.spv"));
