//! Recording backend
//!
//! Captures every backend call as a [`DrawCommand`]. Used for headless runs
//! of the demo and for asserting draw order in tests.

use std::collections::HashSet;

use crate::assets::{ResourceId, Texture};
use crate::foundation::math::{Color, Mat4, Vec2, Vec3};
use crate::render::{BackendError, BackendResult, PrimitiveKind, RenderBackend};
use crate::scene::{CameraState, LampParams, MaterialChannels, OrthoBounds, Projection, ViewportRect};

/// One recorded backend call
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    /// `set_viewport`
    Viewport(ViewportRect),
    /// `clear`
    Clear(Color),
    /// `set_perspective`
    Perspective {
        /// Projection parameters
        projection: Projection,
        /// Viewport aspect ratio
        aspect: f32,
        /// Camera placement
        camera: CameraState,
    },
    /// `set_ortho`
    Ortho {
        /// Frustum bounds
        bounds: OrthoBounds,
        /// Whether a camera view was applied (false for overlays)
        with_camera: bool,
    },
    /// `set_model_matrix`
    Model(Mat4),
    /// `draw_elements`
    DrawElements {
        /// Primitive kind
        kind: PrimitiveKind,
        /// Number of indices
        index_count: usize,
        /// Number of vertices
        vertex_count: usize,
        /// Whether normals were supplied
        has_normals: bool,
        /// Whether texture coordinates were supplied
        has_tex_coords: bool,
    },
    /// `draw_text`
    Text {
        /// Screen position
        position: Vec2,
        /// Text content
        text: String,
    },
    /// `set_color`
    Color(Color),
    /// `set_line_width`
    LineWidth(f32),
    /// `set_point_size`
    PointSize(f32),
    /// `activate_lamps`
    Lamps(bool),
    /// `activate_depth_test`
    DepthTest(bool),
    /// `bind_texture`
    BindTexture(Option<ResourceId>),
    /// `set_material_channels`
    Material(MaterialChannels),
    /// `apply_lamp`
    Lamp {
        /// Light unit index
        unit: usize,
        /// Parameters applied
        params: LampParams,
    },
    /// `upload_texture`
    Upload(ResourceId),
    /// `debug_marker`
    Marker(String),
}

/// Backend that records calls instead of drawing
#[derive(Debug, Default)]
pub struct RecordingBackend {
    commands: Vec<DrawCommand>,
    uploaded: HashSet<ResourceId>,
    reject_uploads: bool,
}

impl RecordingBackend {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent upload fail, for exercising error paths
    pub fn reject_uploads(&mut self, reject: bool) {
        self.reject_uploads = reject;
    }

    /// All commands recorded so far
    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// Drain the recorded commands
    pub fn take_commands(&mut self) -> Vec<DrawCommand> {
        std::mem::take(&mut self.commands)
    }

    /// Number of `draw_elements` calls recorded
    pub fn draw_call_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|cmd| matches!(cmd, DrawCommand::DrawElements { .. }))
            .count()
    }

    /// Entity names in the order they announced themselves
    pub fn draw_order(&self) -> Vec<String> {
        self.commands
            .iter()
            .filter_map(|cmd| match cmd {
                DrawCommand::Marker(name) => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    /// Whether a texture has been uploaded successfully
    pub fn is_uploaded(&self, id: ResourceId) -> bool {
        self.uploaded.contains(&id)
    }
}

impl RenderBackend for RecordingBackend {
    fn set_viewport(&mut self, viewport: &ViewportRect) {
        self.commands.push(DrawCommand::Viewport(*viewport));
    }

    fn clear(&mut self, color: Color) {
        self.commands.push(DrawCommand::Clear(color));
    }

    fn set_perspective(&mut self, projection: &Projection, aspect: f32, camera: &CameraState) {
        self.commands.push(DrawCommand::Perspective {
            projection: *projection,
            aspect,
            camera: camera.clone(),
        });
    }

    fn set_ortho(&mut self, bounds: &OrthoBounds, camera: Option<&CameraState>) {
        self.commands.push(DrawCommand::Ortho { bounds: *bounds, with_camera: camera.is_some() });
    }

    fn set_model_matrix(&mut self, model: &Mat4) {
        self.commands.push(DrawCommand::Model(*model));
    }

    fn draw_elements(
        &mut self,
        kind: PrimitiveKind,
        indices: &[u32],
        vertices: &[Vec3],
        normals: Option<&[Vec3]>,
        tex_coords: Option<&[Vec2]>,
    ) {
        self.commands.push(DrawCommand::DrawElements {
            kind,
            index_count: indices.len(),
            vertex_count: vertices.len(),
            has_normals: normals.is_some(),
            has_tex_coords: tex_coords.is_some(),
        });
    }

    fn draw_text(&mut self, position: Vec2, text: &str) {
        self.commands.push(DrawCommand::Text { position, text: text.to_string() });
    }

    fn set_color(&mut self, color: Color) {
        self.commands.push(DrawCommand::Color(color));
    }

    fn set_line_width(&mut self, width: f32) {
        self.commands.push(DrawCommand::LineWidth(width));
    }

    fn set_point_size(&mut self, size: f32) {
        self.commands.push(DrawCommand::PointSize(size));
    }

    fn activate_lamps(&mut self, enabled: bool) {
        self.commands.push(DrawCommand::Lamps(enabled));
    }

    fn activate_depth_test(&mut self, enabled: bool) {
        self.commands.push(DrawCommand::DepthTest(enabled));
    }

    fn bind_texture(&mut self, texture: Option<ResourceId>) {
        self.commands.push(DrawCommand::BindTexture(texture));
    }

    fn set_material_channels(&mut self, channels: &MaterialChannels) {
        self.commands.push(DrawCommand::Material(channels.clone()));
    }

    fn apply_lamp(&mut self, unit: usize, params: &LampParams) {
        self.commands.push(DrawCommand::Lamp { unit, params: params.clone() });
    }

    fn upload_texture(&mut self, texture: &Texture) -> BackendResult<()> {
        if self.reject_uploads {
            return Err(BackendError::UploadFailed(texture.id(), "uploads rejected".to_string()));
        }
        self.uploaded.insert(texture.id());
        self.commands.push(DrawCommand::Upload(texture.id()));
        Ok(())
    }

    fn debug_marker(&mut self, name: &str) {
        self.commands.push(DrawCommand::Marker(name.to_string()));
    }
}
