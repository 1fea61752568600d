//! Decoded texture data awaiting upload to the backend
//!
//! Textures are decoded on the control thread; the upload itself is deferred
//! to the render thread through the resource cache's pending list because
//! the backend context is only valid there.

use std::path::Path;

use crate::assets::{AssetError, ResourceId};

/// RGBA8 texture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Texture {
    id: ResourceId,
    name: String,
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    has_alpha: bool,
}

impl Texture {
    /// Wrap raw RGBA8 pixels
    pub fn from_rgba8(name: &str, width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, AssetError> {
        let expected = width as usize * height as usize * 4;
        if width == 0 || height == 0 || pixels.len() != expected {
            return Err(AssetError::LoadFailed(format!(
                "texture '{name}': {} bytes for {width}x{height} RGBA",
                pixels.len()
            )));
        }

        let has_alpha = pixels.chunks_exact(4).any(|px| px[3] < u8::MAX);
        Ok(Self {
            id: ResourceId::from_name(name),
            name: name.to_string(),
            width,
            height,
            pixels,
            has_alpha,
        })
    }

    /// Decode an image file (any format the `image` crate was built with)
    pub fn from_file(name: &str, path: impl AsRef<Path>) -> Result<Self, AssetError> {
        let path = path.as_ref();
        log::debug!("Loading texture '{}' from {:?}", name, path);

        let img = image::open(path)
            .map_err(|e| AssetError::LoadFailed(format!("Failed to load image {}: {e}", path.display())))?;
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        Self::from_rgba8(name, width, height, rgba.into_raw())
    }

    /// Decode an in-memory encoded image
    pub fn from_bytes(name: &str, bytes: &[u8]) -> Result<Self, AssetError> {
        let img = image::load_from_memory(bytes)
            .map_err(|e| AssetError::LoadFailed(format!("Failed to decode image '{name}': {e}")))?;
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        Self::from_rgba8(name, width, height, rgba.into_raw())
    }

    /// Identifier derived from the logical name
    pub const fn id(&self) -> ResourceId {
        self.id
    }

    /// Logical name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Width in pixels
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// RGBA8 pixel data, row major
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Whether any pixel is not fully opaque
    pub const fn has_alpha(&self) -> bool {
        self.has_alpha
    }
}
