//! Scene graph error types

use thiserror::Error;

use crate::assets::AssetError;

/// Result type for scene graph operations
pub type SceneResult<T> = Result<T, SceneError>;

/// Errors surfaced by registration, hierarchy and view operations
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SceneError {
    /// No world exists under the given id
    #[error("World not found")]
    WorldNotFound,

    /// Entity is not registered with the universe
    #[error("Entity '{0}' is not registered")]
    EntityNotFound(String),

    /// Material is not registered with the universe
    #[error("Material '{0}' is not registered")]
    MaterialNotFound(String),

    /// Parent assembly is not registered with the universe
    #[error("Parent '{0}' is not registered")]
    ParentNotFound(String),

    /// Entity already present in the target world
    #[error("'{entity}' is already registered in world '{world}'")]
    DuplicateRegistration {
        /// Entity name
        entity: String,
        /// World name
        world: String,
    },

    /// Only assemblies may own children
    #[error("'{0}' is not an assembly and cannot own children")]
    NotAnAssembly(String),

    /// Hierarchy would grow deeper than the configured maximum
    #[error("Nesting depth {depth} exceeds maximum {max}")]
    DepthExceeded {
        /// Depth the deepest node would reach
        depth: usize,
        /// Configured maximum
        max: usize,
    },

    /// Re-parenting would make a node its own ancestor
    #[error("Re-parenting '{0}' would create a cycle")]
    CyclicParent(String),

    /// Viewport size outside configured bounds
    #[error("Viewport {width}x{height} is outside the configured bounds")]
    InvalidViewport {
        /// Requested width
        width: u32,
        /// Requested height
        height: u32,
    },

    /// Projection parameters rejected
    #[error("Invalid projection: {0}")]
    InvalidProjection(String),

    /// An entity cannot follow its own transform
    #[error("'{0}' cannot be attached to itself")]
    AttachToSelf(String),

    /// Figure geometry rejected
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Scene configuration rejected
    #[error("Configuration error: {0}")]
    Config(String),

    /// Mesh or texture could not be resolved
    #[error("Resource error: {0}")]
    Resource(#[from] AssetError),
}
