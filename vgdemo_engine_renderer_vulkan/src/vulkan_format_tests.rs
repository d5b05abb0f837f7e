//! Unit tests for Vulkan conversion functions
//!
//! Pure mappings between device-model types and Vulkan enums, no GPU needed.

use super::*;

// ============================================================================
// IMAGE FORMATS AND USAGE
// ============================================================================

#[test]
fn test_image_format_to_vk() {
    assert_eq!(
        image_format_to_vk(ImageFormat::RGBA8Unorm, vk::Format::S8_UINT),
        vk::Format::R8G8B8A8_UNORM
    );
    assert_eq!(
        image_format_to_vk(ImageFormat::R8Unorm, vk::Format::S8_UINT),
        vk::Format::R8_UNORM
    );
}

#[test]
fn test_stencil_format_follows_the_selected_fallback() {
    assert_eq!(image_format_to_vk(ImageFormat::S8, vk::Format::S8_UINT), vk::Format::S8_UINT);
    assert_eq!(
        image_format_to_vk(ImageFormat::S8, vk::Format::D24_UNORM_S8_UINT),
        vk::Format::D24_UNORM_S8_UINT
    );
    assert_eq!(STENCIL_FORMAT_CANDIDATES[0], vk::Format::S8_UINT);
    assert!(STENCIL_FORMAT_CANDIDATES.iter().all(|&format| has_stencil(format)));
}

#[test]
fn test_aspect_mask() {
    assert_eq!(aspect_mask(vk::Format::R8G8B8A8_UNORM), vk::ImageAspectFlags::COLOR);
    assert_eq!(aspect_mask(vk::Format::S8_UINT), vk::ImageAspectFlags::STENCIL);
    assert_eq!(
        aspect_mask(vk::Format::D24_UNORM_S8_UINT),
        vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
    );
    assert!(!has_depth(vk::Format::S8_UINT));
    assert!(has_depth(vk::Format::D32_SFLOAT_S8_UINT));
}

#[test]
fn test_image_usage_for_framebuffers() {
    let usage = image_usage_to_vk(
        ImageFlags::USAGE_RENDER | ImageFlags::USAGE_PRESENT | ImageFlags::HW_COMPRESSION,
        ImageFormat::RGBA8Unorm,
    );

    assert!(usage.contains(vk::ImageUsageFlags::COLOR_ATTACHMENT));
    assert!(usage.contains(vk::ImageUsageFlags::TRANSFER_SRC));
    assert!(usage.contains(vk::ImageUsageFlags::SAMPLED));
}

#[test]
fn test_image_usage_for_textures_and_stencil() {
    let texture = image_usage_to_vk(ImageFlags::empty(), ImageFormat::R8Unorm);
    assert_eq!(texture, vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_DST);

    let stencil = image_usage_to_vk(ImageFlags::USAGE_RENDER, ImageFormat::S8);
    assert_eq!(stencil, vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT);
}

// ============================================================================
// MEMORY
// ============================================================================

#[test]
fn test_memory_location() {
    assert_eq!(
        memory_location(MemBlockFlags::GPU_CACHED | MemBlockFlags::IMAGE),
        MemoryLocation::GpuOnly
    );
    assert_eq!(
        memory_location(MemBlockFlags::CPU_UNCACHED | MemBlockFlags::GPU_CACHED),
        MemoryLocation::CpuToGpu
    );
    assert_eq!(
        memory_location(MemBlockFlags::CPU_UNCACHED | MemBlockFlags::GPU_CACHED | MemBlockFlags::CODE),
        MemoryLocation::CpuToGpu
    );
    assert_eq!(memory_location(MemBlockFlags::CPU_CACHED), MemoryLocation::GpuToCpu);
    assert_eq!(memory_location(MemBlockFlags::GPU_CACHED), MemoryLocation::GpuOnly);
}

#[test]
fn test_block_buffer_usage_covers_vertex_uniform_and_copies() {
    let usage = block_buffer_usage();
    assert!(usage.contains(vk::BufferUsageFlags::VERTEX_BUFFER));
    assert!(usage.contains(vk::BufferUsageFlags::UNIFORM_BUFFER));
    assert!(usage.contains(vk::BufferUsageFlags::TRANSFER_SRC));
}

// ============================================================================
// RASTERIZER, DEPTH-STENCIL AND BLEND STATE
// ============================================================================

#[test]
fn test_faces() {
    assert_eq!(cull_mode_to_vk(Face::None), vk::CullModeFlags::NONE);
    assert_eq!(cull_mode_to_vk(Face::Back), vk::CullModeFlags::BACK);
    assert_eq!(front_face_to_vk(FrontFace::CounterClockwise), vk::FrontFace::COUNTER_CLOCKWISE);
    assert_eq!(stencil_face_to_vk(Face::FrontAndBack), vk::StencilFaceFlags::FRONT_AND_BACK);
    assert!(stencil_face_to_vk(Face::None).is_empty());
}

#[test]
fn test_stencil_ops() {
    assert_eq!(stencil_op_to_vk(StencilOp::IncrementAndWrap), vk::StencilOp::INCREMENT_AND_WRAP);
    assert_eq!(stencil_op_to_vk(StencilOp::DecrementAndWrap), vk::StencilOp::DECREMENT_AND_WRAP);
    assert_eq!(stencil_op_to_vk(StencilOp::Zero), vk::StencilOp::ZERO);
    assert_eq!(compare_op_to_vk(CompareOp::NotEqual), vk::CompareOp::NOT_EQUAL);
}

#[test]
fn test_stencil_face_state_leaves_masks_to_dynamic_state() {
    let state = StencilFaceState::new(
        CompareOp::Equal,
        StencilOp::Keep,
        StencilOp::Keep,
        StencilOp::IncrementAndClamp,
    );

    let vk_state = stencil_face_state_to_vk(&state);

    assert_eq!(vk_state.compare_op, vk::CompareOp::EQUAL);
    assert_eq!(vk_state.pass_op, vk::StencilOp::INCREMENT_AND_CLAMP);
    assert_eq!(vk_state.fail_op, vk::StencilOp::KEEP);
    assert_eq!(vk_state.write_mask, 0xFF);
}

#[test]
fn test_blend_mappings() {
    assert_eq!(blend_factor_to_vk(BlendFactor::OneMinusSrcAlpha), vk::BlendFactor::ONE_MINUS_SRC_ALPHA);
    assert_eq!(blend_factor_to_vk(BlendFactor::SrcAlphaSaturate), vk::BlendFactor::SRC_ALPHA_SATURATE);
    assert_eq!(blend_op_to_vk(BlendOp::ReverseSubtract), vk::BlendOp::REVERSE_SUBTRACT);
}

#[test]
fn test_color_mask() {
    assert_eq!(
        color_mask_to_vk(ColorMask::RGBA),
        vk::ColorComponentFlags::R | vk::ColorComponentFlags::G | vk::ColorComponentFlags::B | vk::ColorComponentFlags::A
    );
    assert!(color_mask_to_vk(ColorMask::empty()).is_empty());
    assert_eq!(
        color_mask_to_vk(ColorMask::R | ColorMask::A),
        vk::ColorComponentFlags::R | vk::ColorComponentFlags::A
    );
}

// ============================================================================
// VERTEX INPUT, VIEWPORT AND SAMPLERS
// ============================================================================

#[test]
fn test_primitives_and_vertex_formats() {
    assert_eq!(primitive_to_vk(Primitive::Triangles), vk::PrimitiveTopology::TRIANGLE_LIST);
    assert_eq!(primitive_to_vk(Primitive::TriangleFan), vk::PrimitiveTopology::TRIANGLE_FAN);
    assert_eq!(vtx_format_to_vk(VtxAttribFormat::Float32x2), vk::Format::R32G32_SFLOAT);
    assert_eq!(shader_stage_to_vk(ShaderStage::Fragment), vk::ShaderStageFlags::FRAGMENT);
}

#[test]
fn test_viewport_is_flipped() {
    let viewport = Viewport { x: 0.0, y: 0.0, width: 1280.0, height: 720.0, near: 0.0, far: 1.0 };

    let vk_viewport = viewport_to_vk(&viewport);

    assert_eq!(vk_viewport.y, 720.0);
    assert_eq!(vk_viewport.height, -720.0);
    assert_eq!(vk_viewport.width, 1280.0);
    assert_eq!(vk_viewport.max_depth, 1.0);
}

#[test]
fn test_scissor_to_vk() {
    let rect = scissor_to_vk(&Scissor { x: 4, y: 8, width: 100, height: 50 });
    assert_eq!(rect.offset.x, 4);
    assert_eq!(rect.offset.y, 8);
    assert_eq!(rect.extent.width, 100);
}

#[test]
fn test_sampler_params() {
    let default = sampler_params(SamplerFlags::empty());
    assert_eq!(default.filter, vk::Filter::LINEAR);
    assert_eq!(default.mipmap_mode, vk::SamplerMipmapMode::NEAREST);
    assert_eq!(default.address_u, vk::SamplerAddressMode::CLAMP_TO_EDGE);

    let params = sampler_params(SamplerFlags::NEAREST | SamplerFlags::REPEAT_Y | SamplerFlags::MIP_FILTER);
    assert_eq!(params.filter, vk::Filter::NEAREST);
    assert_eq!(params.mipmap_mode, vk::SamplerMipmapMode::LINEAR);
    assert_eq!(params.address_u, vk::SamplerAddressMode::CLAMP_TO_EDGE);
    assert_eq!(params.address_v, vk::SamplerAddressMode::REPEAT);
}
