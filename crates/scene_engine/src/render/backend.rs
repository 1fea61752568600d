//! Backend abstraction traits for the rendering system
//!
//! This module defines the calls a drawing backend must provide. All of them
//! are issued from the render thread between a World's synchronize step and
//! the end of its draw pass.

use thiserror::Error;

use crate::assets::{ResourceId, Texture};
use crate::foundation::math::{Color, Mat4, Vec2, Vec3};
use crate::scene::{CameraState, LampParams, MaterialChannels, OrthoBounds, Projection, ViewportRect};

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Backend failures surfaced to the scene graph
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Texture could not be uploaded
    #[error("Texture upload failed for {0}: {1}")]
    UploadFailed(ResourceId, String),
}

/// Primitive assembly mode for `draw_elements`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveKind {
    /// Independent points
    Points,
    /// Independent line segments
    Lines,
    /// Connected line segments
    LineStrip,
    /// Closed connected line segments
    LineLoop,
    /// Independent triangles
    #[default]
    Triangles,
    /// Triangle strip
    TriangleStrip,
    /// Triangle fan
    TriangleFan,
}

/// Immediate-mode drawing backend
pub trait RenderBackend {
    /// Restrict drawing to a viewport rectangle
    fn set_viewport(&mut self, viewport: &ViewportRect);

    /// Clear color and depth
    fn clear(&mut self, color: Color);

    /// Load a perspective projection and the camera view
    fn set_perspective(&mut self, projection: &Projection, aspect: f32, camera: &CameraState);

    /// Load an orthographic projection; `None` camera means a screen-space overlay
    fn set_ortho(&mut self, bounds: &OrthoBounds, camera: Option<&CameraState>);

    /// Set the model matrix for subsequent draws
    fn set_model_matrix(&mut self, model: &Mat4);

    /// Issue one primitive batch
    fn draw_elements(
        &mut self,
        kind: PrimitiveKind,
        indices: &[u32],
        vertices: &[Vec3],
        normals: Option<&[Vec3]>,
        tex_coords: Option<&[Vec2]>,
    );

    /// Draw a text run at a screen position (overlay only)
    fn draw_text(&mut self, position: Vec2, text: &str);

    /// Set the current flat color
    fn set_color(&mut self, color: Color);

    /// Set line width in pixels
    fn set_line_width(&mut self, width: f32);

    /// Set point size in pixels
    fn set_point_size(&mut self, size: f32);

    /// Enable or disable fixed-function lighting
    fn activate_lamps(&mut self, enabled: bool);

    /// Enable or disable depth testing
    fn activate_depth_test(&mut self, enabled: bool);

    /// Bind a previously uploaded texture, or unbind with `None`
    fn bind_texture(&mut self, texture: Option<ResourceId>);

    /// Load material reflectance channels
    fn set_material_channels(&mut self, channels: &MaterialChannels);

    /// Configure light unit `unit` from lamp parameters (already in world space)
    fn apply_lamp(&mut self, unit: usize, params: &LampParams);

    /// Upload decoded texture data; called on the render thread only
    fn upload_texture(&mut self, texture: &Texture) -> BackendResult<()>;

    /// Annotate the command stream with the entity about to draw
    fn debug_marker(&mut self, _name: &str) {}
}
