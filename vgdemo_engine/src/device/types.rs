/// Handles, flags and layout descriptions shared by the device model and its backends

use bitflags::bitflags;
use slotmap::new_key_type;

new_key_type! {
    /// Backend memory block handle
    pub struct MemBlockKey;
    /// Backend image handle
    pub struct ImageKey;
    /// Backend shader handle
    pub struct ShaderKey;
    /// Backend swapchain handle
    pub struct SwapchainKey;
}

/// Granularity of backend memory blocks (block sizes are rounded up to it)
pub const MEMBLOCK_ALIGNMENT: u64 = 0x1000;

/// Required alignment of uniform buffer bindings
pub const UNIFORM_BUF_ALIGNMENT: u64 = 0x100;

/// Required alignment of shader code inside code memory
pub const SHADER_CODE_ALIGNMENT: u64 = 0x100;

/// Required alignment of linear staging data copied into images
pub const IMAGE_LINEAR_STRIDE_ALIGNMENT: u64 = 0x20;

/// Required alignment of command memory
pub const CMDMEM_ALIGNMENT: u64 = 4;

bitflags! {
    /// Usage profile of a memory block
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MemBlockFlags: u32 {
        /// CPU-visible, write-combined
        const CPU_UNCACHED = 1 << 0;
        /// CPU-visible, cached
        const CPU_CACHED = 1 << 1;
        /// GPU-cached
        const GPU_CACHED = 1 << 2;
        /// Holds shader code
        const CODE = 1 << 3;
        /// Holds image data (not CPU-visible)
        const IMAGE = 1 << 4;
    }
}

impl MemBlockFlags {
    /// Whether the CPU can write into blocks with these flags
    pub fn is_cpu_visible(self) -> bool {
        self.intersects(MemBlockFlags::CPU_UNCACHED | MemBlockFlags::CPU_CACHED)
    }
}

bitflags! {
    /// Image usage flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ImageFlags: u32 {
        /// Usable as a render target (color or depth/stencil)
        const USAGE_RENDER = 1 << 0;
        /// Usable as a presentation source
        const USAGE_PRESENT = 1 << 1;
        /// Hardware compression allowed
        const HW_COMPRESSION = 1 << 2;
    }
}

/// Image pixel formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    /// Stencil-only, 8 bits
    S8,
    /// RGBA, 8 bits per channel, unsigned normalized
    RGBA8Unorm,
    /// Single channel, 8 bits, unsigned normalized
    R8Unorm,
}

impl ImageFormat {
    /// Bytes per pixel in linear (staging) layout
    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            ImageFormat::S8 | ImageFormat::R8Unorm => 1,
            ImageFormat::RGBA8Unorm => 4,
        }
    }

    /// Whether the format carries a stencil aspect
    pub fn is_stencil(self) -> bool {
        matches!(self, ImageFormat::S8)
    }
}

/// Description an image layout is computed from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageLayoutDesc {
    pub flags: ImageFlags,
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
}

/// Backend-computed image layout: description plus memory size and alignment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageLayout {
    desc: ImageLayoutDesc,
    size: u64,
    alignment: u64,
}

impl ImageLayout {
    pub fn new(desc: ImageLayoutDesc, size: u64, alignment: u64) -> Self {
        Self { desc, size, alignment }
    }

    pub fn desc(&self) -> &ImageLayoutDesc {
        &self.desc
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn alignment(&self) -> u64 {
        self.alignment
    }

    pub fn width(&self) -> u32 {
        self.desc.width
    }

    pub fn height(&self) -> u32 {
        self.desc.height
    }

    pub fn format(&self) -> ImageFormat {
        self.desc.format
    }
}

/// Shader pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

/// GPU address: a byte offset inside a memory block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GpuAddr {
    pub block: MemBlockKey,
    pub offset: u64,
}

/// Region of an image targeted by a copy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CopyRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Round `value` up to a multiple of `alignment` (a power of two)
pub fn align_up(value: u64, alignment: u64) -> u64 {
    debug_assert!(alignment.is_power_of_two());
    (value + alignment - 1) & !(alignment - 1)
}
