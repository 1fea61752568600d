//! Parts and assemblies
//!
//! A [`Part`] is a node of the transform hierarchy. Assemblies own children
//! and draw nothing; plain parts carry a mesh and optionally a material.
//!
//! ```text
//!   Assembly (depth 0)
//!   ├── Part (depth 1)        composed = base * local
//!   └── Assembly (depth 1)    base     = parent.composed
//!       └── Part (depth 2)
//! ```
//!
//! Parents own children through `Arc`, children point back through `Weak`.
//! Every mutator locks at most one node at a time: it updates its own raw
//! attributes, releases the lock, then pushes the result to each child.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::assets::Mesh;
use crate::foundation::collections::EntityId;
use crate::foundation::math::{transform_point, Color, LocalTransform, Mat4, Vec3};
use crate::scene::entity::attached_matrix;
use crate::scene::{
    AttachRef, DepthSorted, DrawContext, Drawable, DualBuffer, EntityCore, Material, Plane,
    SceneError, SceneResult, UpdateFlags,
};

/// Node flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartKind {
    /// Composite node: owns children, has no mesh
    Assembly,
    /// Leaf node bound to a mesh
    Part,
}

/// Double-buffered attributes of a part
#[derive(Debug, Clone)]
pub struct PartAttributes {
    /// Transform received from the parent
    pub base: Mat4,
    /// Own translation, rotation and scale
    pub local: LocalTransform,
    /// `base * local`
    pub composed: Mat4,
    /// Visibility requested for this node
    pub own_visible: bool,
    /// `own_visible` and every ancestor's effective visibility
    pub effective_visible: bool,
    /// Tint color
    pub color: Color,
    /// Whether `color` was set explicitly and must be re-broadcast on re-parenting
    pub tinted: bool,
    /// Bound material
    pub material: Option<Arc<Material>>,
    /// Part whose composed transform is overlaid on this one
    pub attached: Option<AttachRef>,
}

impl Default for PartAttributes {
    fn default() -> Self {
        Self {
            base: Mat4::identity(),
            local: LocalTransform::identity(),
            composed: Mat4::identity(),
            own_visible: true,
            effective_visible: true,
            color: Color::WHITE,
            tinted: false,
            material: None,
            attached: None,
        }
    }
}

impl PartAttributes {
    fn recompose(&mut self) -> Mat4 {
        self.composed = self.base * self.local.to_matrix();
        self.composed
    }

    fn is_transparent(&self) -> bool {
        self.color.is_translucent()
            || self.material.as_ref().is_some_and(|material| material.is_transparent_pure())
    }
}

#[derive(Default)]
struct Hierarchy {
    parent: Weak<Part>,
    children: Vec<Arc<Part>>,
    depth: usize,
}

/// Node of the assembly tree
pub struct Part {
    core: EntityCore,
    kind: PartKind,
    mesh: Option<Arc<Mesh>>,
    hierarchy: Mutex<Hierarchy>,
    attrs: DualBuffer<PartAttributes>,
}

impl Part {
    /// Create a root assembly
    pub fn assembly(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self::with_kind(name, PartKind::Assembly, None, None))
    }

    /// Create a root part bound to a mesh
    pub fn new(name: impl Into<String>, mesh: Arc<Mesh>, material: Option<Arc<Material>>) -> Arc<Self> {
        Arc::new(Self::with_kind(name, PartKind::Part, Some(mesh), material))
    }

    fn with_kind(
        name: impl Into<String>,
        kind: PartKind,
        mesh: Option<Arc<Mesh>>,
        material: Option<Arc<Material>>,
    ) -> Self {
        Self {
            core: EntityCore::new(name),
            kind,
            mesh,
            hierarchy: Mutex::new(Hierarchy::default()),
            attrs: DualBuffer::new(PartAttributes { material, ..PartAttributes::default() }),
        }
    }

    /// Stable identifier
    pub fn id(&self) -> EntityId {
        self.core.id()
    }

    /// Part name
    pub fn name(&self) -> &str {
        self.core.name()
    }

    /// Node flavour
    pub const fn kind(&self) -> PartKind {
        self.kind
    }

    /// Whether this node may own children
    pub fn is_assembly(&self) -> bool {
        self.kind == PartKind::Assembly
    }

    /// Bound mesh (parts only)
    pub fn mesh(&self) -> Option<&Arc<Mesh>> {
        self.mesh.as_ref()
    }

    // ---- hierarchy queries -------------------------------------------------

    /// Nesting depth; a root has depth 0
    pub fn depth(&self) -> usize {
        self.hierarchy.lock().depth
    }

    /// Parent assembly, if any
    pub fn parent(&self) -> Option<Arc<Part>> {
        self.hierarchy.lock().parent.upgrade()
    }

    /// Direct children in insertion order
    pub fn children(&self) -> Vec<Arc<Part>> {
        self.hierarchy.lock().children.clone()
    }

    /// This node and all descendants, pre-order
    pub fn subtree(self: &Arc<Self>) -> Vec<Arc<Part>> {
        let mut nodes = vec![Arc::clone(self)];
        let mut index = 0;
        while index < nodes.len() {
            let children = nodes[index].children();
            // keep pre-order: splice children right after their parent's position
            let insert_at = index + 1;
            nodes.splice(insert_at..insert_at, children);
            index += 1;
        }
        nodes
    }

    /// Levels below this node (0 for a leaf)
    pub fn subtree_height(&self) -> usize {
        self.children()
            .iter()
            .map(|child| 1 + child.subtree_height())
            .max()
            .unwrap_or(0)
    }

    /// Whether `self` appears on `other`'s parent chain
    pub fn is_ancestor_of(&self, other: &Part) -> bool {
        let mut cursor = other.parent();
        while let Some(node) = cursor {
            if std::ptr::eq(&*node, self) {
                return true;
            }
            cursor = node.parent();
        }
        false
    }

    // ---- attribute queries (control view) -----------------------------------

    /// Clone of the raw attributes
    pub fn attributes(&self) -> PartAttributes {
        self.attrs.raw()
    }

    /// Raw composed transform
    pub fn composed_transform(&self) -> Mat4 {
        self.attrs.with_raw(|attrs| attrs.composed)
    }

    /// Raw base transform
    pub fn base_transform(&self) -> Mat4 {
        self.attrs.with_raw(|attrs| attrs.base)
    }

    /// Raw local transform
    pub fn local_transform(&self) -> LocalTransform {
        self.attrs.with_raw(|attrs| attrs.local.clone())
    }

    /// Raw own visibility
    pub fn is_own_visible(&self) -> bool {
        self.attrs.with_raw(|attrs| attrs.own_visible)
    }

    /// Raw effective visibility
    pub fn is_effectively_visible(&self) -> bool {
        self.attrs.with_raw(|attrs| attrs.effective_visible)
    }

    /// Raw tint color
    pub fn color(&self) -> Color {
        self.attrs.with_raw(|attrs| attrs.color)
    }

    /// Raw material binding
    pub fn material(&self) -> Option<Arc<Material>> {
        self.attrs.with_raw(|attrs| attrs.material.clone())
    }

    /// Raw attach link
    pub fn attached(&self) -> Option<AttachRef> {
        self.attrs.with_raw(|attrs| attrs.attached.clone())
    }

    /// Pure composed transform, as drawn this frame
    pub fn pure_composed(&self) -> Mat4 {
        self.attrs.pure().composed
    }

    /// Pure transform including any attach overlay
    pub fn pure_world_matrix(&self) -> Mat4 {
        let attrs = self.attrs.pure();
        attached_matrix(attrs.attached.as_ref()) * attrs.composed
    }

    /// Whether the pure state needs blending
    pub fn is_transparent_pure(&self) -> bool {
        self.attrs.pure().is_transparent()
    }

    // ---- transform ----------------------------------------------------------

    /// Set local translation and propagate to the subtree
    pub fn set_coordinates(&self, translation: Vec3) -> bool {
        self.update_local(|local| local.set_translation(translation))
    }

    /// Set local rotation (degrees, per axis) and propagate to the subtree
    pub fn set_angles(&self, angles: Vec3) -> bool {
        self.update_local(|local| local.set_angles(angles))
    }

    /// Set local scale and propagate to the subtree
    pub fn set_scale(&self, scale: Vec3) -> bool {
        self.update_local(|local| local.set_scale(scale))
    }

    fn update_local(&self, apply: impl FnOnce(&mut LocalTransform) -> bool) -> bool {
        let composed = {
            let mut raw = self.attrs.lock_raw();
            let mut local = raw.local.clone();
            if !apply(&mut local) {
                return false;
            }
            let attrs = raw.commit();
            attrs.local = local;
            attrs.recompose()
        };
        self.core.mark(UpdateFlags::TRANSFORM);
        self.push_to_children(composed);
        true
    }

    fn set_base_transform(&self, base: Mat4) {
        let composed = {
            let mut raw = self.attrs.lock_raw();
            if raw.base == base {
                return;
            }
            let attrs = raw.commit();
            attrs.base = base;
            attrs.recompose()
        };
        self.core.mark(UpdateFlags::TRANSFORM);
        self.push_to_children(composed);
    }

    fn push_to_children(&self, composed: Mat4) {
        for child in self.children() {
            child.set_base_transform(composed);
        }
    }

    // ---- appearance ---------------------------------------------------------

    /// Tint this node and every descendant
    ///
    /// Parts with a material also push the color into its ambient and diffuse
    /// channels.
    pub fn set_color(&self, color: Color) {
        let material = {
            let mut raw = self.attrs.lock_raw();
            let attrs = raw.commit();
            attrs.color = color;
            attrs.tinted = true;
            attrs.material.clone()
        };
        self.core.mark(UpdateFlags::COLOR);

        if self.kind == PartKind::Part {
            if let Some(material) = material {
                material.set_color(color);
            }
        }
        for child in self.children() {
            child.set_color(color);
        }
    }

    /// Bind or unbind a material
    pub fn set_material(&self, material: Option<Arc<Material>>) -> bool {
        let changed = self.attrs.modify(|attrs| {
            let same = match (&attrs.material, &material) {
                (Some(current), Some(next)) => Arc::ptr_eq(current, next),
                (None, None) => true,
                _ => false,
            };
            if same {
                return false;
            }
            attrs.material = material;
            true
        });
        if changed {
            self.core.mark(UpdateFlags::MATERIAL);
        }
        changed
    }

    /// Show or hide this node; descendants keep their own flag but inherit the effect
    pub fn set_visible(&self, visible: bool) -> bool {
        let parent_visible = self.parent().map_or(true, |parent| parent.is_effectively_visible());
        let effective = {
            let mut raw = self.attrs.lock_raw();
            let effective = parent_visible && visible;
            if raw.own_visible == visible && raw.effective_visible == effective {
                return false;
            }
            let attrs = raw.commit();
            attrs.own_visible = visible;
            attrs.effective_visible = effective;
            effective
        };
        self.core.mark(UpdateFlags::VISIBILITY);
        for child in self.children() {
            child.inherit_visibility(effective);
        }
        true
    }

    fn inherit_visibility(&self, parent_visible: bool) {
        let effective = {
            let mut raw = self.attrs.lock_raw();
            let effective = parent_visible && raw.own_visible;
            if raw.effective_visible == effective {
                // descendants were derived from the same value
                return;
            }
            raw.commit().effective_visible = effective;
            effective
        };
        self.core.mark(UpdateFlags::VISIBILITY);
        for child in self.children() {
            child.inherit_visibility(effective);
        }
    }

    // ---- re-parenting -------------------------------------------------------

    /// Append `child` (and its subtree) under this assembly
    ///
    /// Fails if this node is not an assembly, if the move would create a
    /// cycle, or if the deepest node of the moved subtree would exceed
    /// `max_depth`. On failure the hierarchy is unchanged.
    pub fn add_child(self: &Arc<Self>, child: &Arc<Part>, max_depth: usize) -> SceneResult<()> {
        if !self.is_assembly() {
            return Err(SceneError::NotAnAssembly(self.name().to_string()));
        }
        if Arc::ptr_eq(self, child) || child.is_ancestor_of(self) {
            return Err(SceneError::CyclicParent(child.name().to_string()));
        }
        let depth = self.depth() + 1;
        let deepest = depth + child.subtree_height();
        if deepest > max_depth {
            return Err(SceneError::DepthExceeded { depth: deepest, max: max_depth });
        }

        child.unlink_from_parent();
        child.hierarchy.lock().parent = Arc::downgrade(self);
        self.hierarchy.lock().children.push(Arc::clone(child));
        child.assign_depth(depth);

        let (composed, visible, tint) = self
            .attrs
            .with_raw(|attrs| (attrs.composed, attrs.effective_visible, attrs.tinted.then_some(attrs.color)));
        child.set_base_transform(composed);
        child.inherit_visibility(visible);
        if let Some(color) = tint {
            child.set_color(color);
        }
        child.core.mark(UpdateFlags::HIERARCHY);
        self.core.mark(UpdateFlags::HIERARCHY);

        log::trace!("Part '{}' now child of '{}' at depth {}", child.name(), self.name(), depth);
        Ok(())
    }

    /// Move this node under `new_parent`, or make it a root with `None`
    ///
    /// Becoming a root resets the base transform to identity.
    pub fn change_parent(self: &Arc<Self>, new_parent: Option<&Arc<Part>>, max_depth: usize) -> SceneResult<()> {
        match new_parent {
            Some(parent) => parent.add_child(self, max_depth),
            None => {
                self.unlink_from_parent();
                self.assign_depth(0);
                self.set_base_transform(Mat4::identity());
                self.inherit_visibility(true);
                self.core.mark(UpdateFlags::HIERARCHY);
                Ok(())
            }
        }
    }

    /// Remove this node from its parent's children; returns whether it had a parent
    pub(crate) fn unlink_from_parent(&self) -> bool {
        let parent = {
            let mut hierarchy = self.hierarchy.lock();
            let parent = hierarchy.parent.upgrade();
            hierarchy.parent = Weak::new();
            parent
        };
        let Some(parent) = parent else {
            return false;
        };
        parent
            .hierarchy
            .lock()
            .children
            .retain(|child| !std::ptr::eq(&**child, self));
        parent.core.mark(UpdateFlags::HIERARCHY);
        true
    }

    fn assign_depth(&self, depth: usize) {
        let children = {
            let mut hierarchy = self.hierarchy.lock();
            hierarchy.depth = depth;
            hierarchy.children.clone()
        };
        for child in children {
            child.assign_depth(depth + 1);
        }
    }

    // ---- attach -------------------------------------------------------------

    /// Overlay `target`'s composed transform on this part
    pub fn attach(&self, target: &Arc<Part>) -> SceneResult<()> {
        if std::ptr::eq(&**target, self) {
            return Err(SceneError::AttachToSelf(self.name().to_string()));
        }
        let link = AttachRef::new(target);
        if self.attrs.modify(|attrs| replace_attachment(&mut attrs.attached, Some(link))) {
            self.core.mark(UpdateFlags::ATTACHMENT);
        }
        Ok(())
    }

    /// Drop any attach overlay
    pub fn detach(&self) -> bool {
        let changed = self.attrs.modify(|attrs| replace_attachment(&mut attrs.attached, None));
        if changed {
            self.core.mark(UpdateFlags::ATTACHMENT);
        }
        changed
    }

    /// Drop the attach overlay if it points at one of `removed`
    pub fn scrub_attachment(&self, removed: &HashSet<EntityId>) -> bool {
        let changed = self.attrs.modify(|attrs| scrub(&mut attrs.attached, removed));
        if changed {
            self.core.mark(UpdateFlags::ATTACHMENT);
        }
        changed
    }
}

/// Swap an attach slot, reporting whether the target changed
pub(crate) fn replace_attachment(slot: &mut Option<AttachRef>, next: Option<AttachRef>) -> bool {
    if *slot == next {
        return false;
    }
    *slot = next;
    true
}

/// Clear an attach slot pointing at a removed entity
pub(crate) fn scrub(slot: &mut Option<AttachRef>, removed: &HashSet<EntityId>) -> bool {
    if slot.as_ref().is_some_and(|link| removed.contains(&link.target_id())) {
        *slot = None;
        return true;
    }
    false
}

impl Drawable for Part {
    fn core(&self) -> &EntityCore {
        &self.core
    }

    fn synchronize_self(&self) -> bool {
        let flags = self.core.synchronize();
        let copied = self.attrs.update();
        let material = self.attrs.pure().material.clone();
        let material_copied = material.is_some_and(|material| material.synchronize_self());
        copied || material_copied || !flags.is_empty()
    }

    fn draw(&self, ctx: &mut DrawContext<'_>) {
        let Some(mesh) = &self.mesh else {
            return;
        };
        let attrs = self.attrs.pure();
        let model = attached_matrix(attrs.attached.as_ref()) * attrs.composed;

        ctx.backend.debug_marker(self.name());
        ctx.backend.set_model_matrix(&model);
        match &attrs.material {
            Some(material) => material.activate(ctx.backend),
            None => ctx.backend.bind_texture(None),
        }
        ctx.backend.set_color(attrs.color);

        let textured = attrs.material.as_ref().is_some_and(|material| material.texture().is_some());
        ctx.backend.draw_elements(
            mesh.kind(),
            mesh.indices(),
            mesh.vertices(),
            mesh.normals(),
            if textured { mesh.tex_coords() } else { None },
        );
    }

    fn is_visible(&self) -> bool {
        self.attrs.pure().effective_visible && !self.core.is_hidden_pure()
    }
}

impl DepthSorted for Part {
    fn is_transparent(&self) -> bool {
        self.is_transparent_pure()
    }

    fn distance_to_plane(&self, plane: &Plane) -> f32 {
        let centroid = self.mesh.as_ref().map_or_else(Vec3::zeros, |mesh| mesh.centroid());
        plane.distance_to_point(&transform_point(&self.pure_world_matrix(), &centroid))
    }
}

impl fmt::Debug for Part {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Part")
            .field("id", &self.core.id())
            .field("name", &self.core.name())
            .field("kind", &self.kind)
            .field("depth", &self.depth())
            .finish()
    }
}
