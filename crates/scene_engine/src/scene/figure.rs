//! Free-form primitive figures
//!
//! Figures carry their own vertex data (lines, point clouds, polygons) instead
//! of a shared mesh. They are unlit unless asked otherwise and draw before
//! parts in the opaque pass.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::assets::centroid_of;
use crate::foundation::collections::EntityId;
use crate::foundation::math::{transform_point, Color, LocalTransform, Mat4, Vec3};
use crate::render::PrimitiveKind;
use crate::scene::entity::attached_matrix;
use crate::scene::part::{replace_attachment, scrub};
use crate::scene::{
    AttachRef, DepthSorted, DrawContext, Drawable, DualBuffer, EntityCore, Part, Plane, SceneError,
    SceneResult, UpdateFlags,
};

/// Vertex data of a figure
#[derive(Debug, Clone, PartialEq)]
pub struct FigureGeometry {
    kind: PrimitiveKind,
    vertices: Vec<Vec3>,
    normals: Option<Vec<Vec3>>,
    indices: Vec<u32>,
}

impl FigureGeometry {
    /// Indexed geometry; indices must reference existing vertices
    pub fn new(kind: PrimitiveKind, vertices: Vec<Vec3>, indices: Vec<u32>) -> SceneResult<Self> {
        if let Some(bad) = indices.iter().find(|&&index| index as usize >= vertices.len()) {
            return Err(SceneError::InvalidGeometry(format!(
                "index {bad} out of range for {} vertices",
                vertices.len()
            )));
        }
        Ok(Self { kind, vertices, normals: None, indices })
    }

    /// Connected line through `points` in order
    pub fn polyline(points: Vec<Vec3>) -> Self {
        Self::sequential(PrimitiveKind::LineStrip, points)
    }

    /// Closed outline through `points`
    pub fn line_loop(points: Vec<Vec3>) -> Self {
        Self::sequential(PrimitiveKind::LineLoop, points)
    }

    /// Unconnected points
    pub fn points(points: Vec<Vec3>) -> Self {
        Self::sequential(PrimitiveKind::Points, points)
    }

    fn sequential(kind: PrimitiveKind, vertices: Vec<Vec3>) -> Self {
        let indices = (0..vertices.len() as u32).collect();
        Self { kind, vertices, normals: None, indices }
    }

    /// Add per-vertex normals, needed when the figure is lit
    pub fn with_normals(mut self, normals: Vec<Vec3>) -> SceneResult<Self> {
        if normals.len() != self.vertices.len() {
            return Err(SceneError::InvalidGeometry(format!(
                "{} normals for {} vertices",
                normals.len(),
                self.vertices.len()
            )));
        }
        self.normals = Some(normals);
        Ok(self)
    }

    /// Primitive kind
    pub const fn kind(&self) -> PrimitiveKind {
        self.kind
    }

    /// Vertex positions
    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    /// Element indices
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }
}

/// Double-buffered attributes of a figure
#[derive(Debug, Clone)]
pub struct FigureAttributes {
    /// Vertex data
    pub geometry: Arc<FigureGeometry>,
    /// Mean vertex, cached for depth sorting
    pub centroid: Vec3,
    /// Own translation, rotation and scale
    pub local: LocalTransform,
    /// Matrix of `local`
    pub composed: Mat4,
    /// Flat color; alpha below one makes the figure transparent
    pub color: Color,
    /// Line width in pixels
    pub line_width: f32,
    /// Point size in pixels
    pub point_size: f32,
    /// Whether the World's lamps affect this figure
    pub lit: bool,
    /// Part whose composed transform is overlaid on this one
    pub attached: Option<AttachRef>,
}

/// A free-form primitive figure
pub struct Figure {
    core: EntityCore,
    attrs: DualBuffer<FigureAttributes>,
}

impl Figure {
    /// Create a shared figure
    pub fn new(name: impl Into<String>, geometry: FigureGeometry) -> Arc<Self> {
        let centroid = centroid_of(geometry.vertices());
        Arc::new(Self {
            core: EntityCore::new(name),
            attrs: DualBuffer::new(FigureAttributes {
                geometry: Arc::new(geometry),
                centroid,
                local: LocalTransform::identity(),
                composed: Mat4::identity(),
                color: Color::WHITE,
                line_width: 1.0,
                point_size: 1.0,
                lit: false,
                attached: None,
            }),
        })
    }

    /// Stable identifier
    pub fn id(&self) -> EntityId {
        self.core.id()
    }

    /// Figure name
    pub fn name(&self) -> &str {
        self.core.name()
    }

    /// Clone of the raw attributes
    pub fn attributes(&self) -> FigureAttributes {
        self.attrs.raw()
    }

    /// Raw color
    pub fn color(&self) -> Color {
        self.attrs.with_raw(|attrs| attrs.color)
    }

    /// Raw attach link
    pub fn attached(&self) -> Option<AttachRef> {
        self.attrs.with_raw(|attrs| attrs.attached.clone())
    }

    /// Replace the vertex data; identical geometry is a no-op
    pub fn set_geometry(&self, geometry: FigureGeometry) -> bool {
        let centroid = centroid_of(geometry.vertices());
        self.change(UpdateFlags::GEOMETRY, |attrs| {
            if *attrs.geometry == geometry {
                return false;
            }
            attrs.geometry = Arc::new(geometry);
            attrs.centroid = centroid;
            true
        })
    }

    /// Set the flat color
    pub fn set_color(&self, color: Color) -> bool {
        self.change(UpdateFlags::COLOR, |attrs| update_field(&mut attrs.color, color))
    }

    /// Set line width in pixels
    pub fn set_line_width(&self, width: f32) -> bool {
        self.change(UpdateFlags::GEOMETRY, |attrs| update_field(&mut attrs.line_width, width))
    }

    /// Set point size in pixels
    pub fn set_point_size(&self, size: f32) -> bool {
        self.change(UpdateFlags::GEOMETRY, |attrs| update_field(&mut attrs.point_size, size))
    }

    /// Opt in or out of lighting
    pub fn set_lit(&self, lit: bool) -> bool {
        self.change(UpdateFlags::LIGHTING, |attrs| update_field(&mut attrs.lit, lit))
    }

    /// Set local translation
    pub fn set_coordinates(&self, translation: Vec3) -> bool {
        self.change_local(|local| local.set_translation(translation))
    }

    /// Set local rotation in degrees
    pub fn set_angles(&self, angles: Vec3) -> bool {
        self.change_local(|local| local.set_angles(angles))
    }

    /// Set local scale
    pub fn set_scale(&self, scale: Vec3) -> bool {
        self.change_local(|local| local.set_scale(scale))
    }

    fn change_local(&self, apply: impl FnOnce(&mut LocalTransform) -> bool) -> bool {
        self.change(UpdateFlags::TRANSFORM, |attrs| {
            if !apply(&mut attrs.local) {
                return false;
            }
            attrs.composed = attrs.local.to_matrix();
            true
        })
    }

    /// Overlay `target`'s composed transform on this figure
    pub fn attach(&self, target: &Arc<Part>) -> bool {
        let link = AttachRef::new(target);
        self.change(UpdateFlags::ATTACHMENT, |attrs| replace_attachment(&mut attrs.attached, Some(link)))
    }

    /// Drop any attach overlay
    pub fn detach(&self) -> bool {
        self.change(UpdateFlags::ATTACHMENT, |attrs| replace_attachment(&mut attrs.attached, None))
    }

    /// Drop the attach overlay if it points at one of `removed`
    pub fn scrub_attachment(&self, removed: &HashSet<EntityId>) -> bool {
        self.change(UpdateFlags::ATTACHMENT, |attrs| scrub(&mut attrs.attached, removed))
    }

    fn change(&self, flags: UpdateFlags, apply: impl FnOnce(&mut FigureAttributes) -> bool) -> bool {
        let changed = self.attrs.modify(apply);
        if changed {
            self.core.mark(flags);
        }
        changed
    }
}

fn update_field<T: PartialEq>(field: &mut T, value: T) -> bool {
    if *field == value {
        return false;
    }
    *field = value;
    true
}

impl Drawable for Figure {
    fn core(&self) -> &EntityCore {
        &self.core
    }

    fn synchronize_self(&self) -> bool {
        let flags = self.core.synchronize();
        self.attrs.update() || !flags.is_empty()
    }

    fn draw(&self, ctx: &mut DrawContext<'_>) {
        let attrs = self.attrs.pure();
        let geometry = &attrs.geometry;
        let model = attached_matrix(attrs.attached.as_ref()) * attrs.composed;

        ctx.backend.debug_marker(self.name());
        ctx.backend.set_model_matrix(&model);
        ctx.backend.activate_lamps(ctx.lighting && attrs.lit);
        ctx.backend.bind_texture(None);
        ctx.backend.set_color(attrs.color);
        ctx.backend.set_line_width(attrs.line_width);
        ctx.backend.set_point_size(attrs.point_size);
        ctx.backend.draw_elements(
            geometry.kind,
            &geometry.indices,
            &geometry.vertices,
            geometry.normals.as_deref(),
            None,
        );
    }

    fn is_visible(&self) -> bool {
        !self.core.is_hidden_pure()
    }
}

impl DepthSorted for Figure {
    fn is_transparent(&self) -> bool {
        self.attrs.pure().color.is_translucent()
    }

    fn distance_to_plane(&self, plane: &Plane) -> f32 {
        let attrs = self.attrs.pure();
        let model = attached_matrix(attrs.attached.as_ref()) * attrs.composed;
        plane.distance_to_point(&transform_point(&model, &attrs.centroid))
    }
}

impl fmt::Debug for Figure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Figure")
            .field("id", &self.core.id())
            .field("name", &self.core.name())
            .finish()
    }
}
