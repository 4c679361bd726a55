use std::{ffi::CString, mem::size_of, sync::Arc};

use cull_gpu::PushConstants;
use vulkan::{
    bytes_of, AccessFlags, AttachmentDescription, AttachmentLoadOp, AttachmentReference,
    AttachmentStoreOp, ColorComponentFlags, CompareOp, ComputePipelineCreateInfo, CullModeFlags,
    DescriptorSetLayout, DescriptorSetLayoutBinding, DescriptorSetLayoutCreateFlags,
    DescriptorType, Device, DynamicState, FrontFace, GraphicsPipelineCreateInfo, ImageLayout,
    Pipeline, PipelineBindPoint, PipelineCache, PipelineCacheCreateFlags,
    PipelineColorBlendAttachmentState, PipelineColorBlendStateCreateInfo,
    PipelineDepthStencilStateCreateInfo, PipelineDynamicStateCreateInfo,
    PipelineInputAssemblyStateCreateInfo, PipelineLayout, PipelineLayoutCreateFlags,
    PipelineMultisampleStateCreateInfo, PipelineRasterizationStateCreateInfo,
    PipelineShaderStageCreateInfo, PipelineStageFlags, PipelineVertexInputStateCreateInfo,
    PipelineViewportStateCreateInfo, PolygonMode, PrimitiveTopology, PushConstantRange,
    RenderPass, RenderPassCreateInfo, SampleCountFlags, ShaderModule, ShaderModuleCreateFlags,
    ShaderStageFlags, SpecializationInfo, SpecializationMapEntry, SubpassDependency,
    SubpassDescription, SUBPASS_EXTERNAL,
};

use crate::{CullVariant, VariantTable};

use super::{BindingKind, COLOR_FORMAT, DEPTH_FORMAT};

/// Pipelines, layouts and render passes created once from the shader module.
pub struct ShaderCache {
    pub mesh: VariantTable<Pipeline>,
    pub meshlet: VariantTable<Pipeline>,
    pub triangle: VariantTable<Pipeline>,
    pub prepare_dispatch: Pipeline,
    pub prepare_draw: Pipeline,
    pub depth_pyramid: Pipeline,
    pub draw: Pipeline,
    pub cull_layout: PipelineLayout,
    pub pyramid_build_layout: PipelineLayout,
    pub draw_layout: PipelineLayout,
    pub clear_pass: RenderPass,
    pub load_pass: RenderPass,
    pub scene_layout: DescriptorSetLayout,
    pub pass_layout: DescriptorSetLayout,
    pub batch_layout: DescriptorSetLayout,
    pub pyramid_layout: DescriptorSetLayout,
    pub build_layout: DescriptorSetLayout,
    pub pipeline_cache: PipelineCache,
    pub shader_module: ShaderModule,
}

impl ShaderCache {
    pub fn new(device: &Arc<Device>, code: &[u32]) -> eyre::Result<Self> {
        let shader_module = device.create_shader_module(ShaderModuleCreateFlags::empty(), code)?;
        let pipeline_cache =
            device.create_pipeline_cache(PipelineCacheCreateFlags::empty(), None)?;
        let scene_layout = create_set_layout(
            device,
            &[DescriptorType::UNIFORM_BUFFER]
                .iter()
                .chain([DescriptorType::STORAGE_BUFFER; 7].iter())
                .copied()
                .collect::<Vec<_>>(),
            ShaderStageFlags::COMPUTE | ShaderStageFlags::VERTEX,
        )?;
        let pass_layout = create_set_layout(
            device,
            &[DescriptorType::STORAGE_BUFFER; 4],
            ShaderStageFlags::COMPUTE,
        )?;
        let batch_layout = create_set_layout(
            device,
            &[DescriptorType::STORAGE_BUFFER; 3],
            ShaderStageFlags::COMPUTE,
        )?;
        let pyramid_layout = create_set_layout(
            device,
            &[DescriptorType::SAMPLED_IMAGE],
            ShaderStageFlags::COMPUTE,
        )?;
        let build_layout = create_set_layout(
            device,
            &[DescriptorType::SAMPLED_IMAGE, DescriptorType::STORAGE_IMAGE],
            ShaderStageFlags::COMPUTE,
        )?;
        let push_constant_ranges = [PushConstantRange::builder()
            .stage_flags(ShaderStageFlags::COMPUTE)
            .offset(0)
            .size(size_of::<PushConstants>() as u32)
            .build()];
        let cull_layout = device.create_pipeline_layout(
            PipelineLayoutCreateFlags::empty(),
            &[&scene_layout, &pass_layout, &batch_layout, &pyramid_layout],
            &push_constant_ranges,
        )?;
        let pyramid_build_layout = device.create_pipeline_layout(
            PipelineLayoutCreateFlags::empty(),
            &[&build_layout],
            &push_constant_ranges,
        )?;
        let draw_layout = device.create_pipeline_layout(
            PipelineLayoutCreateFlags::empty(),
            &[&scene_layout],
            &[],
        )?;
        let compute = |name: &str, layout: &PipelineLayout, variant: Option<CullVariant>| {
            create_compute(&pipeline_cache, &shader_module, layout, name, variant)
        };
        let mesh = VariantTable::new(|variant| compute("mesh_cull", &cull_layout, Some(variant)))?;
        let meshlet =
            VariantTable::new(|variant| compute("meshlet_cull", &cull_layout, Some(variant)))?;
        let triangle =
            VariantTable::new(|variant| compute("triangle_cull", &cull_layout, Some(variant)))?;
        let prepare_dispatch = compute("prepare_dispatch", &cull_layout, None)?;
        let prepare_draw = compute("prepare_draw", &cull_layout, None)?;
        let depth_pyramid = compute("depth_pyramid", &pyramid_build_layout, None)?;
        let clear_pass = create_render_pass(device, AttachmentLoadOp::CLEAR)?;
        let load_pass = create_render_pass(device, AttachmentLoadOp::LOAD)?;
        let draw = create_draw(&pipeline_cache, &shader_module, &draw_layout, &clear_pass)?;
        Ok(Self {
            mesh,
            meshlet,
            triangle,
            prepare_dispatch,
            prepare_draw,
            depth_pyramid,
            draw,
            cull_layout,
            pyramid_build_layout,
            draw_layout,
            clear_pass,
            load_pass,
            scene_layout,
            pass_layout,
            batch_layout,
            pyramid_layout,
            build_layout,
            pipeline_cache,
            shader_module,
        })
    }

    pub fn set_layout(&self, kind: BindingKind) -> &DescriptorSetLayout {
        match kind {
            BindingKind::Scene => &self.scene_layout,
            BindingKind::Pass => &self.pass_layout,
            BindingKind::Batch => &self.batch_layout,
        }
    }
}

fn create_set_layout(
    device: &Arc<Device>,
    types: &[DescriptorType],
    stage_flags: ShaderStageFlags,
) -> eyre::Result<DescriptorSetLayout> {
    let bindings: Vec<_> = types
        .iter()
        .enumerate()
        .map(|(binding, descriptor_type)| {
            DescriptorSetLayoutBinding::builder()
                .binding(binding as u32)
                .descriptor_count(1)
                .descriptor_type(*descriptor_type)
                .stage_flags(stage_flags)
                .build()
        })
        .collect();
    Ok(device.create_descriptor_set_layout(DescriptorSetLayoutCreateFlags::empty(), &bindings)?)
}

/// Compute pipeline of entry point `name`, with the variant bound to specialization constant 0.
fn create_compute(
    pipeline_cache: &PipelineCache,
    shader_module: &ShaderModule,
    layout: &PipelineLayout,
    name: &str,
    variant: Option<CullVariant>,
) -> eyre::Result<Pipeline> {
    let main_name = CString::new(name)?;
    let map_entries = [SpecializationMapEntry {
        constant_id: 0,
        offset: 0,
        size: size_of::<u32>(),
    }];
    let id = variant.map_or(0, CullVariant::id);
    let specialization_info = SpecializationInfo::builder()
        .map_entries(&map_entries)
        .data(bytes_of(&id));
    let stage = PipelineShaderStageCreateInfo::builder()
        .stage(ShaderStageFlags::COMPUTE)
        .module(**shader_module)
        .name(&main_name);
    let stage = if variant.is_some() {
        stage.specialization_info(&specialization_info)
    } else {
        stage
    }
    .build();
    let create_infos = [ComputePipelineCreateInfo::builder()
        .stage(stage)
        .layout(**layout)
        .build()];
    let mut pipelines = pipeline_cache.create_compute(&create_infos)?;
    Ok(pipelines.remove(0))
}

/// Render pass over a color and a depth attachment, both kept in the general layout
/// so the depth can be read by the pyramid build between passes.
fn create_render_pass(device: &Arc<Device>, load_op: AttachmentLoadOp) -> eyre::Result<RenderPass> {
    let initial_layout = if load_op == AttachmentLoadOp::CLEAR {
        ImageLayout::UNDEFINED
    } else {
        ImageLayout::GENERAL
    };
    let attachments = [
        AttachmentDescription::builder()
            .format(COLOR_FORMAT)
            .samples(SampleCountFlags::TYPE_1)
            .load_op(load_op)
            .store_op(AttachmentStoreOp::STORE)
            .stencil_load_op(AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(AttachmentStoreOp::DONT_CARE)
            .initial_layout(initial_layout)
            .final_layout(ImageLayout::GENERAL)
            .build(),
        AttachmentDescription::builder()
            .format(DEPTH_FORMAT)
            .samples(SampleCountFlags::TYPE_1)
            .load_op(load_op)
            .store_op(AttachmentStoreOp::STORE)
            .stencil_load_op(AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(AttachmentStoreOp::DONT_CARE)
            .initial_layout(initial_layout)
            .final_layout(ImageLayout::GENERAL)
            .build(),
    ];
    let color_attachments = [AttachmentReference::builder()
        .attachment(0)
        .layout(ImageLayout::GENERAL)
        .build()];
    let depth_attachment = AttachmentReference::builder()
        .attachment(1)
        .layout(ImageLayout::GENERAL)
        .build();
    let subpasses = [SubpassDescription::builder()
        .pipeline_bind_point(PipelineBindPoint::GRAPHICS)
        .color_attachments(&color_attachments)
        .depth_stencil_attachment(&depth_attachment)
        .build()];
    let fragment_stages = PipelineStageFlags::EARLY_FRAGMENT_TESTS
        | PipelineStageFlags::LATE_FRAGMENT_TESTS
        | PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT;
    let dependencies = [SubpassDependency::builder()
        .src_subpass(SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(fragment_stages | PipelineStageFlags::COMPUTE_SHADER)
        .dst_stage_mask(fragment_stages)
        .src_access_mask(
            AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE | AccessFlags::COLOR_ATTACHMENT_WRITE,
        )
        .dst_access_mask(
            AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ
                | AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE
                | AccessFlags::COLOR_ATTACHMENT_WRITE,
        )
        .build()];
    let create_info = RenderPassCreateInfo::builder()
        .attachments(&attachments)
        .subpasses(&subpasses)
        .dependencies(&dependencies);
    Ok(device.create_render_pass(&create_info)?)
}

/// Draws encoded meshlet vertices with a greater depth test and back faces culled.
fn create_draw(
    pipeline_cache: &PipelineCache,
    shader_module: &ShaderModule,
    layout: &PipelineLayout,
    render_pass: &RenderPass,
) -> eyre::Result<Pipeline> {
    let vertex_name = CString::new("cull_vertex")?;
    let fragment_name = CString::new("cull_fragment")?;
    let stages = [
        PipelineShaderStageCreateInfo::builder()
            .stage(ShaderStageFlags::VERTEX)
            .module(**shader_module)
            .name(&vertex_name)
            .build(),
        PipelineShaderStageCreateInfo::builder()
            .stage(ShaderStageFlags::FRAGMENT)
            .module(**shader_module)
            .name(&fragment_name)
            .build(),
    ];
    let vertex_input_state = PipelineVertexInputStateCreateInfo::builder();
    let input_assembly_state = PipelineInputAssemblyStateCreateInfo::builder()
        .topology(PrimitiveTopology::TRIANGLE_LIST)
        .primitive_restart_enable(false);
    let viewport_state = PipelineViewportStateCreateInfo::builder()
        .viewport_count(1)
        .scissor_count(1);
    let rasterization_state = PipelineRasterizationStateCreateInfo::builder()
        .polygon_mode(PolygonMode::FILL)
        .cull_mode(CullModeFlags::BACK)
        .front_face(FrontFace::COUNTER_CLOCKWISE)
        .line_width(1.0);
    let multisample_state =
        PipelineMultisampleStateCreateInfo::builder().rasterization_samples(SampleCountFlags::TYPE_1);
    let depth_stencil_state = PipelineDepthStencilStateCreateInfo::builder()
        .depth_test_enable(true)
        .depth_write_enable(true)
        .depth_compare_op(CompareOp::GREATER);
    let attachments = [PipelineColorBlendAttachmentState::builder()
        .color_write_mask(ColorComponentFlags::all())
        .blend_enable(false)
        .build()];
    let color_blend_state = PipelineColorBlendStateCreateInfo::builder().attachments(&attachments);
    let dynamic_states = [DynamicState::VIEWPORT, DynamicState::SCISSOR];
    let dynamic_state = PipelineDynamicStateCreateInfo::builder().dynamic_states(&dynamic_states);
    let create_infos = [GraphicsPipelineCreateInfo::builder()
        .stages(&stages)
        .vertex_input_state(&vertex_input_state)
        .input_assembly_state(&input_assembly_state)
        .viewport_state(&viewport_state)
        .rasterization_state(&rasterization_state)
        .multisample_state(&multisample_state)
        .depth_stencil_state(&depth_stencil_state)
        .color_blend_state(&color_blend_state)
        .dynamic_state(&dynamic_state)
        .layout(**layout)
        .render_pass(**render_pass)
        .subpass(0)
        .build()];
    let mut pipelines = pipeline_cache.create_graphics(&create_infos)?;
    Ok(pipelines.remove(0))
}
