/// Texture store of the renderer adapter

use rustc_hash::FxHashMap;

use crate::device::{Image, SamplerFlags};
use crate::vg::{ImageFlags, ImageId, TextureInfo};

/// A GPU image plus what the frontend knows about it
pub(crate) struct Texture {
    image: Image,
    info: TextureInfo,
}

impl Texture {
    pub fn new(image: Image, info: TextureInfo) -> Self {
        Self { image, info }
    }

    pub fn image(&self) -> &Image {
        &self.image
    }

    pub fn info(&self) -> TextureInfo {
        self.info
    }

    /// Sampler preset matching the image flags
    pub fn sampler(&self) -> SamplerFlags {
        sampler_for(self.info.flags)
    }
}

pub(crate) fn sampler_for(flags: ImageFlags) -> SamplerFlags {
    let mut sampler = SamplerFlags::empty();
    if flags.contains(ImageFlags::GENERATE_MIPMAPS) {
        sampler |= SamplerFlags::MIP_FILTER;
    }
    if flags.contains(ImageFlags::NEAREST) {
        sampler |= SamplerFlags::NEAREST;
    }
    if flags.contains(ImageFlags::REPEAT_X) {
        sampler |= SamplerFlags::REPEAT_X;
    }
    if flags.contains(ImageFlags::REPEAT_Y) {
        sampler |= SamplerFlags::REPEAT_Y;
    }
    sampler
}

/// Live textures by id; ids start at 1 and are never reused
#[derive(Default)]
pub(crate) struct TextureStore {
    textures: FxHashMap<ImageId, Texture>,
    last_id: u32,
}

impl TextureStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, texture: Texture) -> ImageId {
        self.last_id += 1;
        let id = ImageId(self.last_id);
        self.textures.insert(id, texture);
        id
    }

    pub fn get(&self, id: ImageId) -> Option<&Texture> {
        self.textures.get(&id)
    }

    pub fn remove(&mut self, id: ImageId) -> Option<Texture> {
        self.textures.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }
}
