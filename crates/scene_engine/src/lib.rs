//! # Scene Engine
//!
//! A retained-mode 3D scene graph shared by a control thread and a render
//! thread.
//!
//! ## Features
//!
//! - **Double buffering**: mutations never block drawing; each frame promotes
//!   pending changes in one synchronize step
//! - **Hierarchies**: assemblies compose transforms and propagate color and
//!   visibility to their children, with a bounded nesting depth
//! - **Multiple worlds**: one entity can be referenced by several Worlds, each
//!   with its own camera, projection and viewport
//! - **Deferred deletion**: removed entities outlive the frame that may still
//!   be drawing them
//! - **Backend-agnostic rendering**: Worlds drive a [`render::RenderBackend`];
//!   [`render::RecordingBackend`] captures the calls for headless runs
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scene_engine::prelude::*;
//!
//! fn main() -> Result<(), SceneError> {
//!     let provider = MemoryProvider::new();
//!     provider.register_mesh("cube", Mesh::cube(1.0));
//!
//!     let universe = Universe::new(SceneConfig::default(), Box::new(provider))?;
//!     let world = universe.create_world("main", ViewportRect::new(0, 0, 800, 600))?;
//!     let ship = universe.add_assembly(world, None, "ship")?;
//!     let hull = universe.add_part(world, Some(&ship), "hull", "cube", None)?;
//!     ship.set_coordinates(Vec3::new(1.0, 0.0, 0.0));
//!     hull.set_color(Color::rgb(0.8, 0.2, 0.2));
//!
//!     let mut backend = RecordingBackend::new();
//!     universe.render_frame(&mut backend);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

// Shared bounds and settings
pub mod core;

pub mod foundation;
pub mod config;
pub mod assets;
pub mod render;
pub mod scene;

/// Common imports for scene users
pub mod prelude {
    pub use crate::{
        assets::{MemoryProvider, Mesh, ResourceProvider, Texture},
        config::Config,
        core::config::SceneConfig,
        foundation::math::{Color, Mat4, Vec2, Vec3},
        render::{RecordingBackend, RenderBackend},
        scene::{
            CameraState, EntityRef, Figure, FigureGeometry, Label, LabelDesc, Lamp, LampParams, Material,
            MaterialChannels, MaterialDesc, Part, Projection, SceneError, SceneResult, Universe, ViewportRect, World,
        },
    };
}
