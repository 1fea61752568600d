//! Resource providers
//!
//! The scene graph asks a provider for decoded meshes and textures by
//! logical name. [`MemoryProvider`] serves data registered up front, which is
//! what tests and procedurally generated scenes use.

use std::collections::HashMap;
use std::path::Path;

use parking_lot::RwLock;

use crate::assets::{AssetError, Mesh, ResourceId, Texture};

/// Source of decoded meshes and textures
pub trait ResourceProvider: Send + Sync {
    /// Produce the mesh registered under `name`
    fn load_mesh(&self, id: ResourceId, name: &str) -> Result<Mesh, AssetError>;

    /// Produce the texture registered under `name`
    fn load_texture(&self, id: ResourceId, name: &str) -> Result<Texture, AssetError>;
}

/// Provider backed by in-memory tables
#[derive(Default)]
pub struct MemoryProvider {
    meshes: RwLock<HashMap<String, Mesh>>,
    textures: RwLock<HashMap<String, Texture>>,
}

impl MemoryProvider {
    /// Create an empty provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a mesh
    pub fn register_mesh(&self, name: &str, mesh: Mesh) {
        self.meshes.write().insert(name.to_string(), mesh);
    }

    /// Register (or replace) a texture from raw RGBA8 pixels
    pub fn register_texture(&self, name: &str, width: u32, height: u32, pixels: Vec<u8>) -> Result<(), AssetError> {
        let texture = Texture::from_rgba8(name, width, height, pixels)?;
        self.textures.write().insert(name.to_string(), texture);
        Ok(())
    }

    /// Decode an image file and register it as a texture
    pub fn register_texture_file(&self, name: &str, path: impl AsRef<Path>) -> Result<(), AssetError> {
        let texture = Texture::from_file(name, path)?;
        self.textures.write().insert(name.to_string(), texture);
        Ok(())
    }
}

impl ResourceProvider for MemoryProvider {
    fn load_mesh(&self, _id: ResourceId, name: &str) -> Result<Mesh, AssetError> {
        self.meshes
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| AssetError::NotFound(name.to_string()))
    }

    fn load_texture(&self, _id: ResourceId, name: &str) -> Result<Texture, AssetError> {
        self.textures
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| AssetError::NotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_provider_lookup() {
        let provider = MemoryProvider::new();
        provider.register_mesh("cube", Mesh::cube(1.0));

        let id = ResourceId::from_name("cube");
        assert!(provider.load_mesh(id, "cube").is_ok());
        assert_eq!(
            provider.load_mesh(ResourceId::from_name("sphere"), "sphere"),
            Err(AssetError::NotFound("sphere".to_string()))
        );
    }

    #[test]
    fn test_missing_texture_file_fails() {
        let provider = MemoryProvider::new();
        let result = provider.register_texture_file("missing", "/nonexistent/texture.png");
        assert!(matches!(result, Err(AssetError::LoadFailed(_))));
    }
}
