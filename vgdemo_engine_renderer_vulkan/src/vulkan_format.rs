/// Conversions from device-model types to Vulkan enums and flags
///
/// Everything here is a pure mapping so it can be tested without a GPU.

use ash::vk;
use gpu_allocator::MemoryLocation;
use vgdemo_engine::device::{
    BlendFactor, BlendOp, ColorMask, CompareOp, Face, FrontFace, ImageFlags, ImageFormat,
    MemBlockFlags, Primitive, SamplerFlags, Scissor, ShaderStage, StencilFaceState, StencilOp,
    Viewport, VtxAttribFormat,
};

/// Formats tried, in order, for stencil-only images
pub(crate) const STENCIL_FORMAT_CANDIDATES: [vk::Format; 3] = [
    vk::Format::S8_UINT,
    vk::Format::D24_UNORM_S8_UINT,
    vk::Format::D32_SFLOAT_S8_UINT,
];

/// Vulkan format of an image format; `stencil_format` is the format picked
/// for `S8` on this GPU
pub(crate) fn image_format_to_vk(format: ImageFormat, stencil_format: vk::Format) -> vk::Format {
    match format {
        ImageFormat::S8 => stencil_format,
        ImageFormat::RGBA8Unorm => vk::Format::R8G8B8A8_UNORM,
        ImageFormat::R8Unorm => vk::Format::R8_UNORM,
    }
}

/// Whether a Vulkan format has a depth aspect
pub(crate) fn has_depth(format: vk::Format) -> bool {
    matches!(
        format,
        vk::Format::D16_UNORM
            | vk::Format::D32_SFLOAT
            | vk::Format::D16_UNORM_S8_UINT
            | vk::Format::D24_UNORM_S8_UINT
            | vk::Format::D32_SFLOAT_S8_UINT
    )
}

/// Whether a Vulkan format has a stencil aspect
pub(crate) fn has_stencil(format: vk::Format) -> bool {
    matches!(
        format,
        vk::Format::S8_UINT
            | vk::Format::D16_UNORM_S8_UINT
            | vk::Format::D24_UNORM_S8_UINT
            | vk::Format::D32_SFLOAT_S8_UINT
    )
}

/// Aspects covered by a view of the whole image
pub(crate) fn aspect_mask(format: vk::Format) -> vk::ImageAspectFlags {
    let mut aspect = vk::ImageAspectFlags::empty();
    if has_depth(format) {
        aspect |= vk::ImageAspectFlags::DEPTH;
    }
    if has_stencil(format) {
        aspect |= vk::ImageAspectFlags::STENCIL;
    }
    if aspect.is_empty() {
        vk::ImageAspectFlags::COLOR
    } else {
        aspect
    }
}

/// Usage flags of an image
///
/// Color images can always be sampled and copied into; stencil images are
/// only ever render targets. `HW_COMPRESSION` has no Vulkan counterpart
/// (drivers compress on their own).
pub(crate) fn image_usage_to_vk(flags: ImageFlags, format: ImageFormat) -> vk::ImageUsageFlags {
    if format.is_stencil() {
        return vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT;
    }
    let mut usage = vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_DST;
    if flags.contains(ImageFlags::USAGE_RENDER) {
        usage |= vk::ImageUsageFlags::COLOR_ATTACHMENT;
    }
    if flags.contains(ImageFlags::USAGE_PRESENT) {
        usage |= vk::ImageUsageFlags::TRANSFER_SRC;
    }
    usage
}

/// Where gpu-allocator places a memory block
pub(crate) fn memory_location(flags: MemBlockFlags) -> MemoryLocation {
    if flags.contains(MemBlockFlags::IMAGE) {
        MemoryLocation::GpuOnly
    } else if flags.contains(MemBlockFlags::CPU_CACHED) {
        MemoryLocation::GpuToCpu
    } else if flags.contains(MemBlockFlags::CPU_UNCACHED) {
        MemoryLocation::CpuToGpu
    } else {
        MemoryLocation::GpuOnly
    }
}

/// Usage of the whole-block buffer created for data and code blocks
pub(crate) fn block_buffer_usage() -> vk::BufferUsageFlags {
    vk::BufferUsageFlags::VERTEX_BUFFER
        | vk::BufferUsageFlags::UNIFORM_BUFFER
        | vk::BufferUsageFlags::TRANSFER_SRC
        | vk::BufferUsageFlags::TRANSFER_DST
}

pub(crate) fn cull_mode_to_vk(face: Face) -> vk::CullModeFlags {
    match face {
        Face::None => vk::CullModeFlags::NONE,
        Face::Front => vk::CullModeFlags::FRONT,
        Face::Back => vk::CullModeFlags::BACK,
        Face::FrontAndBack => vk::CullModeFlags::FRONT_AND_BACK,
    }
}

pub(crate) fn front_face_to_vk(face: FrontFace) -> vk::FrontFace {
    match face {
        FrontFace::CounterClockwise => vk::FrontFace::COUNTER_CLOCKWISE,
        FrontFace::Clockwise => vk::FrontFace::CLOCKWISE,
    }
}

/// Faces a dynamic stencil update applies to
pub(crate) fn stencil_face_to_vk(face: Face) -> vk::StencilFaceFlags {
    match face {
        Face::None => vk::StencilFaceFlags::empty(),
        Face::Front => vk::StencilFaceFlags::FRONT,
        Face::Back => vk::StencilFaceFlags::BACK,
        Face::FrontAndBack => vk::StencilFaceFlags::FRONT_AND_BACK,
    }
}

pub(crate) fn compare_op_to_vk(op: CompareOp) -> vk::CompareOp {
    match op {
        CompareOp::Never => vk::CompareOp::NEVER,
        CompareOp::Less => vk::CompareOp::LESS,
        CompareOp::Equal => vk::CompareOp::EQUAL,
        CompareOp::LessOrEqual => vk::CompareOp::LESS_OR_EQUAL,
        CompareOp::Greater => vk::CompareOp::GREATER,
        CompareOp::NotEqual => vk::CompareOp::NOT_EQUAL,
        CompareOp::GreaterOrEqual => vk::CompareOp::GREATER_OR_EQUAL,
        CompareOp::Always => vk::CompareOp::ALWAYS,
    }
}

pub(crate) fn stencil_op_to_vk(op: StencilOp) -> vk::StencilOp {
    match op {
        StencilOp::Keep => vk::StencilOp::KEEP,
        StencilOp::Zero => vk::StencilOp::ZERO,
        StencilOp::Replace => vk::StencilOp::REPLACE,
        StencilOp::IncrementAndClamp => vk::StencilOp::INCREMENT_AND_CLAMP,
        StencilOp::DecrementAndClamp => vk::StencilOp::DECREMENT_AND_CLAMP,
        StencilOp::Invert => vk::StencilOp::INVERT,
        StencilOp::IncrementAndWrap => vk::StencilOp::INCREMENT_AND_WRAP,
        StencilOp::DecrementAndWrap => vk::StencilOp::DECREMENT_AND_WRAP,
    }
}

/// Stencil ops of one face; masks and reference are dynamic state
pub(crate) fn stencil_face_state_to_vk(state: &StencilFaceState) -> vk::StencilOpState {
    vk::StencilOpState {
        fail_op: stencil_op_to_vk(state.fail_op),
        pass_op: stencil_op_to_vk(state.pass_op),
        depth_fail_op: stencil_op_to_vk(state.depth_fail_op),
        compare_op: compare_op_to_vk(state.compare_op),
        compare_mask: 0xFF,
        write_mask: 0xFF,
        reference: 0,
    }
}

pub(crate) fn blend_factor_to_vk(factor: BlendFactor) -> vk::BlendFactor {
    match factor {
        BlendFactor::Zero => vk::BlendFactor::ZERO,
        BlendFactor::One => vk::BlendFactor::ONE,
        BlendFactor::SrcColor => vk::BlendFactor::SRC_COLOR,
        BlendFactor::OneMinusSrcColor => vk::BlendFactor::ONE_MINUS_SRC_COLOR,
        BlendFactor::DstColor => vk::BlendFactor::DST_COLOR,
        BlendFactor::OneMinusDstColor => vk::BlendFactor::ONE_MINUS_DST_COLOR,
        BlendFactor::SrcAlpha => vk::BlendFactor::SRC_ALPHA,
        BlendFactor::OneMinusSrcAlpha => vk::BlendFactor::ONE_MINUS_SRC_ALPHA,
        BlendFactor::DstAlpha => vk::BlendFactor::DST_ALPHA,
        BlendFactor::OneMinusDstAlpha => vk::BlendFactor::ONE_MINUS_DST_ALPHA,
        BlendFactor::SrcAlphaSaturate => vk::BlendFactor::SRC_ALPHA_SATURATE,
    }
}

pub(crate) fn blend_op_to_vk(op: BlendOp) -> vk::BlendOp {
    match op {
        BlendOp::Add => vk::BlendOp::ADD,
        BlendOp::Subtract => vk::BlendOp::SUBTRACT,
        BlendOp::ReverseSubtract => vk::BlendOp::REVERSE_SUBTRACT,
        BlendOp::Min => vk::BlendOp::MIN,
        BlendOp::Max => vk::BlendOp::MAX,
    }
}

pub(crate) fn color_mask_to_vk(mask: ColorMask) -> vk::ColorComponentFlags {
    let mut flags = vk::ColorComponentFlags::empty();
    if mask.contains(ColorMask::R) {
        flags |= vk::ColorComponentFlags::R;
    }
    if mask.contains(ColorMask::G) {
        flags |= vk::ColorComponentFlags::G;
    }
    if mask.contains(ColorMask::B) {
        flags |= vk::ColorComponentFlags::B;
    }
    if mask.contains(ColorMask::A) {
        flags |= vk::ColorComponentFlags::A;
    }
    flags
}

pub(crate) fn primitive_to_vk(primitive: Primitive) -> vk::PrimitiveTopology {
    match primitive {
        Primitive::Triangles => vk::PrimitiveTopology::TRIANGLE_LIST,
        Primitive::TriangleStrip => vk::PrimitiveTopology::TRIANGLE_STRIP,
        Primitive::TriangleFan => vk::PrimitiveTopology::TRIANGLE_FAN,
    }
}

pub(crate) fn vtx_format_to_vk(format: VtxAttribFormat) -> vk::Format {
    match format {
        VtxAttribFormat::Float32x2 => vk::Format::R32G32_SFLOAT,
        VtxAttribFormat::Float32x3 => vk::Format::R32G32B32_SFLOAT,
        VtxAttribFormat::Float32x4 => vk::Format::R32G32B32A32_SFLOAT,
    }
}

pub(crate) fn shader_stage_to_vk(stage: ShaderStage) -> vk::ShaderStageFlags {
    match stage {
        ShaderStage::Vertex => vk::ShaderStageFlags::VERTEX,
        ShaderStage::Fragment => vk::ShaderStageFlags::FRAGMENT,
    }
}

/// Viewport with a negative height, so clip-space +Y points up and
/// counter-clockwise winding keeps its meaning
pub(crate) fn viewport_to_vk(viewport: &Viewport) -> vk::Viewport {
    vk::Viewport {
        x: viewport.x,
        y: viewport.y + viewport.height,
        width: viewport.width,
        height: -viewport.height,
        min_depth: viewport.near,
        max_depth: viewport.far,
    }
}

pub(crate) fn scissor_to_vk(scissor: &Scissor) -> vk::Rect2D {
    vk::Rect2D {
        offset: vk::Offset2D {
            x: scissor.x as i32,
            y: scissor.y as i32,
        },
        extent: vk::Extent2D {
            width: scissor.width,
            height: scissor.height,
        },
    }
}

/// Filtering and addressing of one sampler preset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SamplerParams {
    pub filter: vk::Filter,
    pub mipmap_mode: vk::SamplerMipmapMode,
    pub address_u: vk::SamplerAddressMode,
    pub address_v: vk::SamplerAddressMode,
}

pub(crate) fn sampler_params(flags: SamplerFlags) -> SamplerParams {
    let address = |repeat: bool| {
        if repeat {
            vk::SamplerAddressMode::REPEAT
        } else {
            vk::SamplerAddressMode::CLAMP_TO_EDGE
        }
    };
    SamplerParams {
        filter: if flags.contains(SamplerFlags::NEAREST) {
            vk::Filter::NEAREST
        } else {
            vk::Filter::LINEAR
        },
        mipmap_mode: if flags.contains(SamplerFlags::MIP_FILTER) {
            vk::SamplerMipmapMode::LINEAR
        } else {
            vk::SamplerMipmapMode::NEAREST
        },
        address_u: address(flags.contains(SamplerFlags::REPEAT_X)),
        address_v: address(flags.contains(SamplerFlags::REPEAT_Y)),
    }
}

#[cfg(test)]
#[path = "vulkan_format_tests.rs"]
mod tests;
