//! Retained-mode scene graph
//!
//! Two threads share the graph. The control thread creates, mutates and
//! removes entities through the [`Universe`]; the render thread calls
//! [`Universe::render_frame`], which promotes every pending change and then
//! draws each [`World`] from a stable snapshot.
//!
//! ## Architecture
//!
//! ```text
//! Universe (owns entities, materials, resources)
//!      ↓ register / refer
//! World (camera, projection, viewport, per-kind registries)
//!      ↓ render
//! RenderBackend
//! ```
//!
//! Every mutable attribute lives in a [`DualBuffer`]: control-thread writes
//! land in the raw copy, and the render thread copies raw into pure at the
//! start of a frame. Registries work the same way for membership, and the
//! Universe's registries defer destruction of removed entities by one frame.

mod camera;
mod dual_buffer;
mod element_registry;
mod entity;
mod error;
mod figure;
mod label;
mod lamp;
mod material;
mod part;
mod render_queue;
mod universe;
mod world;

#[cfg(test)]
mod tests;

pub use camera::{CameraFrame, CameraState, OrthoBounds, Plane, Projection, ProjectionKind, ViewportRect};
pub use dual_buffer::{DualBuffer, RawGuard};
pub use element_registry::{ElementRegistry, RemovalPolicy};
pub use entity::{AttachRef, DrawContext, Drawable, EntityCore, EntityRef, UpdateFlags};
pub use error::{SceneError, SceneResult};
pub use figure::{Figure, FigureAttributes, FigureGeometry};
pub use label::{Label, LabelDesc};
pub use lamp::{Attenuation, Lamp, LampKind, LampParams};
pub use material::{Material, MaterialChannels, MaterialDesc};
pub use part::{Part, PartAttributes, PartKind};
pub use render_queue::{DepthSorted, RenderQueue};
pub use universe::Universe;
pub use world::{FrameStats, RenderPhase, ViewState, World};
