//! Rendering backend boundary
//!
//! The scene graph never talks to a graphics API directly. Each frame the
//! World drives a [`RenderBackend`] with immediate-mode calls (viewport,
//! projection, lamps, material state, `draw_elements`). The
//! [`RecordingBackend`] implementation captures those calls as
//! [`DrawCommand`]s for headless runs and tests.

mod backend;
mod recording;

pub use backend::{BackendError, BackendResult, PrimitiveKind, RenderBackend};
pub use recording::{DrawCommand, RecordingBackend};
