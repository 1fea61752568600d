//! Asset management
//!
//! Meshes and textures are loaded on the control thread through a
//! [`ResourceProvider`] and cached by [`ResourceCache`] under identifiers
//! derived from their logical names. Decoding file formats is the provider's
//! business; the scene graph only sees the decoded data.

mod mesh;
mod texture;
mod provider;
mod resource_cache;

pub use mesh::{centroid_of, Mesh};
pub use texture::Texture;
pub use provider::{MemoryProvider, ResourceProvider};
pub use resource_cache::ResourceCache;

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use thiserror::Error;

/// Asset loading errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AssetError {
    /// No resource is known under this name
    #[error("Asset not found: {0}")]
    NotFound(String),

    /// Resource exists but could not be decoded or failed validation
    #[error("Failed to load asset: {0}")]
    LoadFailed(String),

    /// Provider cannot produce this kind of resource
    #[error("Unsupported asset: {0}")]
    Unsupported(String),
}

/// Deterministic identifier of a mesh or texture
///
/// Derived from the logical resource name so the same name always maps to the
/// same cache slot and backend texture id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub u64);

impl ResourceId {
    /// Hash a logical resource name into an identifier
    pub fn from_name(name: &str) -> Self {
        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        Self(hasher.finish())
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}
