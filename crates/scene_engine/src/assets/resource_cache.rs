//! Resource cache - CPU-side mesh/texture tracking
//!
//! Loads through the configured provider on first request and hands out
//! shared `Arc`s afterwards. Newly decoded textures are queued for upload;
//! the render thread drains that queue once per frame because the backend
//! context is only valid there.

use std::collections::HashMap;
use std::sync::Arc;

use crate::assets::{AssetError, Mesh, ResourceId, ResourceProvider, Texture};

/// Mesh and texture cache keyed by [`ResourceId`]
pub struct ResourceCache {
    provider: Box<dyn ResourceProvider>,
    meshes: HashMap<ResourceId, Arc<Mesh>>,
    textures: HashMap<ResourceId, Arc<Texture>>,
    pending_uploads: Vec<Arc<Texture>>,
}

impl ResourceCache {
    /// Create a cache drawing from `provider`
    pub fn new(provider: Box<dyn ResourceProvider>) -> Self {
        Self {
            provider,
            meshes: HashMap::new(),
            textures: HashMap::new(),
            pending_uploads: Vec::new(),
        }
    }

    /// Fetch a mesh, loading it on first use
    pub fn mesh(&mut self, name: &str) -> Result<Arc<Mesh>, AssetError> {
        let id = ResourceId::from_name(name);
        if let Some(mesh) = self.meshes.get(&id) {
            return Ok(Arc::clone(mesh));
        }

        let mesh = Arc::new(self.provider.load_mesh(id, name)?);
        log::debug!("Cached mesh '{}' ({}), {} vertices", name, id, mesh.vertices().len());
        self.meshes.insert(id, Arc::clone(&mesh));
        Ok(mesh)
    }

    /// Fetch a texture, loading and queueing it for upload on first use
    pub fn texture(&mut self, name: &str) -> Result<Arc<Texture>, AssetError> {
        let id = ResourceId::from_name(name);
        if let Some(texture) = self.textures.get(&id) {
            return Ok(Arc::clone(texture));
        }

        let texture = Arc::new(self.provider.load_texture(id, name)?);
        log::debug!("Cached texture '{}' ({}), {}x{}", name, id, texture.width(), texture.height());
        self.textures.insert(id, Arc::clone(&texture));
        self.pending_uploads.push(Arc::clone(&texture));
        Ok(texture)
    }

    /// Take every texture still waiting for backend upload
    pub fn take_pending_uploads(&mut self) -> Vec<Arc<Texture>> {
        std::mem::take(&mut self.pending_uploads)
    }

    /// Number of textures waiting for upload
    pub fn pending_upload_count(&self) -> usize {
        self.pending_uploads.len()
    }

    /// Number of cached meshes
    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    /// Number of cached textures
    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::MemoryProvider;

    fn cache_with_assets() -> ResourceCache {
        let provider = MemoryProvider::new();
        provider.register_mesh("cube", Mesh::cube(1.0));
        provider
            .register_texture("checker", 1, 1, vec![255, 255, 255, 255])
            .expect("texture");
        ResourceCache::new(Box::new(provider))
    }

    #[test]
    fn test_mesh_is_loaded_once() {
        let mut cache = cache_with_assets();
        let first = cache.mesh("cube").expect("mesh");
        let second = cache.mesh("cube").expect("mesh");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.mesh_count(), 1);
    }

    #[test]
    fn test_texture_queued_for_upload_once() {
        let mut cache = cache_with_assets();
        cache.texture("checker").expect("texture");
        cache.texture("checker").expect("texture");
        assert_eq!(cache.pending_upload_count(), 1);

        let pending = cache.take_pending_uploads();
        assert_eq!(pending.len(), 1);
        assert_eq!(cache.pending_upload_count(), 0);
    }

    #[test]
    fn test_failed_load_is_not_cached() {
        let mut cache = cache_with_assets();
        assert!(cache.mesh("teapot").is_err());
        assert_eq!(cache.mesh_count(), 0);
    }
}
