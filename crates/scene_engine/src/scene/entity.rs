//! Shared entity state and the drawing contract
//!
//! Every drawable kind embeds an [`EntityCore`]: a stable identity, a
//! double-buffered hidden flag and a bitmask of what changed since the last
//! synchronize. The World drives entities through the [`Drawable`] trait.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};

use bitflags::bitflags;

use crate::foundation::collections::EntityId;
use crate::foundation::math::Mat4;
use crate::render::RenderBackend;
use crate::scene::{CameraFrame, DualBuffer, Figure, Label, Lamp, Part};

bitflags! {
    /// Categories of raw-side changes awaiting synchronize
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct UpdateFlags: u32 {
        /// Hidden flag or effective visibility
        const VISIBILITY = 1 << 0;
        /// Local, base or composed transform
        const TRANSFORM  = 1 << 1;
        /// Color or tint
        const COLOR      = 1 << 2;
        /// Material assignment or channels
        const MATERIAL   = 1 << 3;
        /// Mesh or figure geometry
        const GEOMETRY   = 1 << 4;
        /// Attach target
        const ATTACHMENT = 1 << 5;
        /// Lamp parameters
        const LIGHTING   = 1 << 6;
        /// Label text or layout
        const TEXT       = 1 << 7;
        /// Parent or children
        const HIERARCHY  = 1 << 8;
    }
}

/// Identity and common flags of a scene entity
pub struct EntityCore {
    id: EntityId,
    name: String,
    hidden: DualBuffer<bool>,
    updates: AtomicU32,
}

impl EntityCore {
    /// Create a visible entity core with a fresh id
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: EntityId::next(),
            name: name.into(),
            hidden: DualBuffer::new(false),
            updates: AtomicU32::new(0),
        }
    }

    /// Stable identifier
    pub const fn id(&self) -> EntityId {
        self.id
    }

    /// Human-readable name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Hide or show the entity; returns whether the flag changed
    pub fn set_hidden(&self, hidden: bool) -> bool {
        let changed = self.hidden.set(hidden);
        if changed {
            self.mark(UpdateFlags::VISIBILITY);
        }
        changed
    }

    /// Hidden flag as last set by the control thread
    pub fn is_hidden(&self) -> bool {
        self.hidden.raw()
    }

    /// Hidden flag as seen by the render thread
    pub fn is_hidden_pure(&self) -> bool {
        *self.hidden.pure()
    }

    /// Record a pending change category
    pub fn mark(&self, flags: UpdateFlags) {
        self.updates.fetch_or(flags.bits(), Ordering::AcqRel);
    }

    /// Changes recorded since the last synchronize
    pub fn pending_updates(&self) -> UpdateFlags {
        UpdateFlags::from_bits_truncate(self.updates.load(Ordering::Acquire))
    }

    /// Promote the hidden flag and drain the update mask
    pub fn synchronize(&self) -> UpdateFlags {
        self.hidden.update();
        UpdateFlags::from_bits_truncate(self.updates.swap(0, Ordering::AcqRel))
    }
}

impl fmt::Debug for EntityCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityCore")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("hidden", &self.is_hidden())
            .finish()
    }
}

/// Render-thread state handed to each entity while a World draws
pub struct DrawContext<'a> {
    /// Target backend
    pub backend: &'a mut dyn RenderBackend,
    /// Camera matrices of the current frame
    pub frame: &'a CameraFrame,
    /// Whether the World has lighting switched on
    pub lighting: bool,
    /// Light unit assigned to the lamp being drawn
    pub light_unit: usize,
}

/// Something a World can synchronize and draw
pub trait Drawable: Send + Sync {
    /// Shared identity and flags
    fn core(&self) -> &EntityCore;

    /// Promote every raw attribute to its pure copy (render thread only)
    ///
    /// Returns whether anything was copied.
    fn synchronize_self(&self) -> bool;

    /// Issue backend calls from pure state
    fn draw(&self, ctx: &mut DrawContext<'_>);

    /// Whether the pure state says this entity should be drawn
    fn is_visible(&self) -> bool;
}

/// Non-owning link to the part whose composed transform an entity follows
///
/// The target is held weakly; a removed target simply stops contributing.
#[derive(Clone)]
pub struct AttachRef {
    id: EntityId,
    target: Weak<Part>,
}

impl AttachRef {
    /// Link to `target`
    pub fn new(target: &Arc<Part>) -> Self {
        Self { id: target.id(), target: Arc::downgrade(target) }
    }

    /// Identifier of the target part
    pub const fn target_id(&self) -> EntityId {
        self.id
    }

    /// Target part, if it is still alive
    pub fn target(&self) -> Option<Arc<Part>> {
        self.target.upgrade()
    }

    /// Target's pure composed transform, identity if it is gone
    pub fn pure_matrix(&self) -> Mat4 {
        self.target().map_or_else(Mat4::identity, |part| part.pure_composed())
    }

    /// Target's raw composed transform, identity if it is gone
    pub fn raw_matrix(&self) -> Mat4 {
        self.target().map_or_else(Mat4::identity, |part| part.composed_transform())
    }
}

impl PartialEq for AttachRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl fmt::Debug for AttachRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttachRef")
            .field("target", &self.id)
            .field("alive", &(self.target.strong_count() > 0))
            .finish()
    }
}

/// Pure matrix of an optional attach link
pub(crate) fn attached_matrix(attached: Option<&AttachRef>) -> Mat4 {
    attached.map_or_else(Mat4::identity, AttachRef::pure_matrix)
}

/// Handle to any entity a World can hold
#[derive(Debug, Clone)]
pub enum EntityRef {
    /// Part or assembly
    Part(Arc<Part>),
    /// Primitive figure
    Figure(Arc<Figure>),
    /// Light source
    Lamp(Arc<Lamp>),
    /// Screen-space label
    Label(Arc<Label>),
}

impl EntityRef {
    /// Shared core of the referenced entity
    pub fn core(&self) -> &EntityCore {
        match self {
            Self::Part(part) => part.core(),
            Self::Figure(figure) => figure.core(),
            Self::Lamp(lamp) => lamp.core(),
            Self::Label(label) => label.core(),
        }
    }

    /// Identifier of the referenced entity
    pub fn id(&self) -> EntityId {
        self.core().id()
    }

    /// Name of the referenced entity
    pub fn name(&self) -> &str {
        self.core().name()
    }
}

impl From<Arc<Part>> for EntityRef {
    fn from(part: Arc<Part>) -> Self {
        Self::Part(part)
    }
}

impl From<Arc<Figure>> for EntityRef {
    fn from(figure: Arc<Figure>) -> Self {
        Self::Figure(figure)
    }
}

impl From<Arc<Lamp>> for EntityRef {
    fn from(lamp: Arc<Lamp>) -> Self {
        Self::Lamp(lamp)
    }
}

impl From<Arc<Label>> for EntityRef {
    fn from(label: Arc<Label>) -> Self {
        Self::Label(label)
    }
}
