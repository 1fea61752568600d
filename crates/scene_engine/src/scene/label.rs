//! Screen-facing labels (billboards)
//!
//! A label is anchored at a world-space point but drawn as a pixel-sized quad
//! in the overlay pass, after everything else and without depth testing.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::assets::Texture;
use crate::foundation::collections::EntityId;
use crate::foundation::math::{transform_point, Color, Mat4, Vec2, Vec3};
use crate::render::PrimitiveKind;
use crate::scene::entity::attached_matrix;
use crate::scene::part::{replace_attachment, scrub};
use crate::scene::{AttachRef, CameraFrame, DrawContext, Drawable, DualBuffer, EntityCore, Part, UpdateFlags};

const QUAD_INDICES: [u32; 6] = [0, 1, 2, 0, 2, 3];

fn quad_tex_coords() -> [Vec2; 4] {
    [Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(1.0, 1.0), Vec2::new(0.0, 1.0)]
}

/// Everything needed to register a label with the universe
#[derive(Debug, Clone, PartialEq)]
pub struct LabelDesc {
    /// Label name
    pub name: String,
    /// Text drawn at the anchor
    pub text: String,
    /// World-space anchor point
    pub anchor: Vec3,
    /// Pixel offset from the projected anchor
    pub offset: Vec2,
    /// Quad size in pixels
    pub size: Vec2,
    /// Quad and text color
    pub color: Color,
    /// Logical name of a background texture
    pub texture: Option<String>,
}

impl LabelDesc {
    /// Text label at `anchor` with a 64x16 pixel quad
    pub fn new(name: impl Into<String>, text: impl Into<String>, anchor: Vec3) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
            anchor,
            offset: Vec2::zeros(),
            size: Vec2::new(64.0, 16.0),
            color: Color::WHITE,
            texture: None,
        }
    }
}

#[derive(Debug, Clone)]
struct LabelAttributes {
    text: String,
    anchor: Vec3,
    offset: Vec2,
    size: Vec2,
    color: Color,
    attached: Option<AttachRef>,
}

/// A screen-space label
pub struct Label {
    core: EntityCore,
    texture: Option<Arc<Texture>>,
    attrs: DualBuffer<LabelAttributes>,
}

impl Label {
    /// Create a shared label; `desc.texture` is ignored in favour of the resolved `texture`
    pub fn new(desc: LabelDesc, texture: Option<Arc<Texture>>) -> Arc<Self> {
        let LabelDesc { name, text, anchor, offset, size, color, .. } = desc;
        Arc::new(Self {
            core: EntityCore::new(name),
            texture,
            attrs: DualBuffer::new(LabelAttributes { text, anchor, offset, size, color, attached: None }),
        })
    }

    /// Stable identifier
    pub fn id(&self) -> EntityId {
        self.core.id()
    }

    /// Label name
    pub fn name(&self) -> &str {
        self.core.name()
    }

    /// Raw text
    pub fn text(&self) -> String {
        self.attrs.with_raw(|attrs| attrs.text.clone())
    }

    /// Raw attach link
    pub fn attached(&self) -> Option<AttachRef> {
        self.attrs.with_raw(|attrs| attrs.attached.clone())
    }

    /// Replace the text
    pub fn set_text(&self, text: impl Into<String>) -> bool {
        let text = text.into();
        self.change(UpdateFlags::TEXT, |attrs| {
            if attrs.text == text {
                return false;
            }
            attrs.text = text;
            true
        })
    }

    /// Move the world-space anchor
    pub fn set_anchor(&self, anchor: Vec3) -> bool {
        self.change(UpdateFlags::TRANSFORM, |attrs| {
            if attrs.anchor == anchor {
                return false;
            }
            attrs.anchor = anchor;
            true
        })
    }

    /// Set the pixel offset and quad size
    pub fn set_layout(&self, offset: Vec2, size: Vec2) -> bool {
        self.change(UpdateFlags::TEXT, |attrs| {
            if attrs.offset == offset && attrs.size == size {
                return false;
            }
            attrs.offset = offset;
            attrs.size = size;
            true
        })
    }

    /// Set quad and text color
    pub fn set_color(&self, color: Color) -> bool {
        self.change(UpdateFlags::COLOR, |attrs| {
            if attrs.color == color {
                return false;
            }
            attrs.color = color;
            true
        })
    }

    /// Anchor the label to `target`'s composed transform
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

    fn change(&self, flags: UpdateFlags, apply: impl FnOnce(&mut LabelAttributes) -> bool) -> bool {
        let changed = self.attrs.modify(apply);
        if changed {
            self.core.mark(flags);
        }
        changed
    }

    /// Pixel position of the quad centre for this frame, if the anchor is in view
    pub fn screen_position(&self, frame: &CameraFrame) -> Option<Vec2> {
        let attrs = self.attrs.pure();
        let anchor = transform_point(&attached_matrix(attrs.attached.as_ref()), &attrs.anchor);
        frame
            .project_to_screen(&anchor)
            .map(|position| position + attrs.offset)
    }
}

impl Drawable for Label {
    fn core(&self) -> &EntityCore {
        &self.core
    }

    fn synchronize_self(&self) -> bool {
        let flags = self.core.synchronize();
        self.attrs.update() || !flags.is_empty()
    }

    fn draw(&self, ctx: &mut DrawContext<'_>) {
        let Some(centre) = self.screen_position(ctx.frame) else {
            return;
        };
        let attrs = self.attrs.pure();
        let half = attrs.size * 0.5;
        let corners = [
            Vec3::new(centre.x - half.x, centre.y - half.y, 0.0),
            Vec3::new(centre.x + half.x, centre.y - half.y, 0.0),
            Vec3::new(centre.x + half.x, centre.y + half.y, 0.0),
            Vec3::new(centre.x - half.x, centre.y + half.y, 0.0),
        ];
        let tex_coords = quad_tex_coords();

        ctx.backend.debug_marker(self.name());
        ctx.backend.set_model_matrix(&Mat4::identity());
        ctx.backend.set_color(attrs.color);
        ctx.backend.bind_texture(self.texture.as_ref().map(|texture| texture.id()));
        ctx.backend.draw_elements(
            PrimitiveKind::Triangles,
            &QUAD_INDICES,
            &corners,
            None,
            self.texture.as_ref().map(|_| &tex_coords[..]),
        );
        if !attrs.text.is_empty() {
            ctx.backend.draw_text(centre, &attrs.text);
        }
    }

    fn is_visible(&self) -> bool {
        !self.core.is_hidden_pure()
    }
}

impl fmt::Debug for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Label")
            .field("id", &self.core.id())
            .field("name", &self.core.name())
            .field("textured", &self.texture.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{DrawCommand, RecordingBackend};
    use crate::scene::{CameraState, OrthoBounds, Projection, ViewportRect};
    use approx::assert_relative_eq;

    fn frame() -> CameraFrame {
        CameraFrame::new(
            &CameraState::default(),
            &Projection::default(),
            &ViewportRect::new(0, 0, 200, 100),
            &OrthoBounds::default(),
        )
    }

    #[test]
    fn test_screen_position_applies_offset() {
        let mut desc = LabelDesc::new("tag", "origin", Vec3::zeros());
        desc.offset = Vec2::new(5.0, -5.0);
        let label = Label::new(desc, None);
        let position = label.screen_position(&frame()).expect("in view");
        assert_relative_eq!(position, Vec2::new(105.0, 45.0), epsilon = 1e-3);
    }

    #[test]
    fn test_label_behind_camera_is_skipped() {
        let label = Label::new(LabelDesc::new("tag", "behind", Vec3::new(0.0, 0.0, 50.0)), None);
        let frame = frame();
        let mut backend = RecordingBackend::new();
        let mut ctx = DrawContext { backend: &mut backend, frame: &frame, lighting: false, light_unit: 0 };
        label.draw(&mut ctx);
        assert!(backend.commands().is_empty());
    }

    #[test]
    fn test_draw_emits_quad_and_text() {
        let label = Label::new(LabelDesc::new("tag", "hello", Vec3::zeros()), None);
        let frame = frame();
        let mut backend = RecordingBackend::new();
        let mut ctx = DrawContext { backend: &mut backend, frame: &frame, lighting: false, light_unit: 0 };
        label.draw(&mut ctx);

        assert_eq!(backend.draw_call_count(), 1);
        assert!(backend
            .commands()
            .iter()
            .any(|cmd| matches!(cmd, DrawCommand::Text { text, .. } if text == "hello")));
    }
}
