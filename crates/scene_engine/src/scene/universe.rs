//! Universe - top-level owner of Worlds, entities and shared resources
//!
//! The Universe is an explicitly constructed context object. It owns every
//! part, figure, lamp, label and material through deferred-deletion
//! registries, so an entity removed on the control thread survives until the
//! render thread's next synchronize has discarded the last pure snapshot
//! that could reference it.
//!
//! Registry-level operations are serialized by one control mutex; drawing
//! never takes it.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::assets::{ResourceCache, ResourceProvider};
use crate::core::config::SceneConfig;
use crate::foundation::collections::{EntityId, SlotMap, WorldId};
use crate::render::RenderBackend;
use crate::scene::{
    Drawable, ElementRegistry, EntityRef, Figure, FigureGeometry, FrameStats, Label, LabelDesc, Lamp, LampParams,
    Material, MaterialDesc, Part, SceneError, SceneResult, ViewportRect, World,
};

/// Owner of all Worlds, entities and resources
pub struct Universe {
    config: Arc<SceneConfig>,
    control: Mutex<()>,
    worlds: RwLock<SlotMap<WorldId, Arc<World>>>,
    world_order: RwLock<Vec<WorldId>>,
    parts: ElementRegistry<Part>,
    figures: ElementRegistry<Figure>,
    lamps: ElementRegistry<Lamp>,
    labels: ElementRegistry<Label>,
    materials: ElementRegistry<Material>,
    resources: Mutex<ResourceCache>,
}

impl Universe {
    /// Create a universe with validated bounds and a resource provider
    pub fn new(config: SceneConfig, provider: Box<dyn ResourceProvider>) -> SceneResult<Self> {
        config.validate().map_err(|err| SceneError::Config(err.to_string()))?;
        log::info!(
            "Universe created (max depth {}, max lamps {}, transparency sort {})",
            config.max_depth,
            config.max_lamps,
            config.sort_transparent
        );
        Ok(Self {
            config: Arc::new(config),
            control: Mutex::new(()),
            worlds: RwLock::new(SlotMap::with_key()),
            world_order: RwLock::new(Vec::new()),
            parts: ElementRegistry::deferred(),
            figures: ElementRegistry::deferred(),
            lamps: ElementRegistry::deferred(),
            labels: ElementRegistry::deferred(),
            materials: ElementRegistry::deferred(),
            resources: Mutex::new(ResourceCache::new(provider)),
        })
    }

    /// Bounds shared with every World
    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    // ---- worlds -----------------------------------------------------------

    /// Create a World drawing into `viewport`
    pub fn create_world(&self, name: &str, viewport: ViewportRect) -> SceneResult<WorldId> {
        let _control = self.control.lock();
        let id = self
            .worlds
            .write()
            .try_insert_with_key(|id| {
                World::with_id(id, name, viewport, Arc::clone(&self.config)).map(Arc::new)
            })
            .map_err(|err| {
                log::warn!("World '{}' rejected: {}", name, err);
                err
            })?;
        self.world_order.write().push(id);
        log::info!("World '{}' created with viewport {}x{}", name, viewport.width, viewport.height);
        Ok(id)
    }

    /// Drop a World; its entities stay owned by the Universe
    pub fn remove_world(&self, id: WorldId) -> SceneResult<()> {
        let _control = self.control.lock();
        let world = self.worlds.write().remove(id).ok_or(SceneError::WorldNotFound)?;
        self.world_order.write().retain(|candidate| *candidate != id);
        log::info!("World '{}' removed", world.name());
        Ok(())
    }

    /// Look up a World
    pub fn world(&self, id: WorldId) -> Option<Arc<World>> {
        self.worlds.read().get(id).cloned()
    }

    /// World ids in creation order
    pub fn world_ids(&self) -> Vec<WorldId> {
        self.world_order.read().clone()
    }

    /// Number of Worlds
    pub fn world_count(&self) -> usize {
        self.worlds.read().len()
    }

    fn lookup_world(&self, id: WorldId) -> SceneResult<Arc<World>> {
        self.world(id).ok_or(SceneError::WorldNotFound)
    }

    fn all_worlds(&self) -> Vec<Arc<World>> {
        let worlds = self.worlds.read();
        self.world_order
            .read()
            .iter()
            .filter_map(|id| worlds.get(*id).cloned())
            .collect()
    }

    // ---- registration -----------------------------------------------------

    /// Register a material, resolving its texture through the resource cache
    pub fn add_material(&self, desc: MaterialDesc) -> SceneResult<Arc<Material>> {
        let _control = self.control.lock();
        let texture = match &desc.texture {
            Some(name) => Some(self.resources.lock().texture(name)?),
            None => None,
        };
        let material = Material::new(desc.name, desc.channels, texture);
        self.materials.add(Arc::clone(&material), true);
        log::debug!("Material '{}' registered", material.name());
        Ok(material)
    }

    /// First registered material with this name
    pub fn find_material(&self, name: &str) -> Option<Arc<Material>> {
        self.materials.find_in_raw_by(|material| material.name() == name)
    }

    /// Add an assembly to a World, optionally under `parent`
    pub fn add_assembly(&self, world: WorldId, parent: Option<&Arc<Part>>, name: &str) -> SceneResult<Arc<Part>> {
        let _control = self.control.lock();
        let world = self.lookup_world(world)?;
        self.check_parent(parent)?;
        self.install_part(&world, parent, Part::assembly(name))
    }

    /// Add a mesh-bound part to a World, optionally under `parent`
    pub fn add_part(
        &self,
        world: WorldId,
        parent: Option<&Arc<Part>>,
        name: &str,
        mesh: &str,
        material: Option<&Arc<Material>>,
    ) -> SceneResult<Arc<Part>> {
        let _control = self.control.lock();
        let world = self.lookup_world(world)?;
        self.check_parent(parent)?;
        self.check_material(material)?;
        let mesh = self.resources.lock().mesh(mesh)?;
        self.install_part(&world, parent, Part::new(name, mesh, material.cloned()))
    }

    fn check_parent(&self, parent: Option<&Arc<Part>>) -> SceneResult<()> {
        let Some(parent) = parent else {
            return Ok(());
        };
        if !self.parts.find_in_raw(parent) {
            return Err(SceneError::ParentNotFound(parent.name().to_string()));
        }
        if !parent.is_assembly() {
            return Err(SceneError::NotAnAssembly(parent.name().to_string()));
        }
        let depth = parent.depth() + 1;
        if depth > self.config.max_depth {
            return Err(SceneError::DepthExceeded { depth, max: self.config.max_depth });
        }
        Ok(())
    }

    fn check_material(&self, material: Option<&Arc<Material>>) -> SceneResult<()> {
        match material {
            Some(material) if !self.materials.find_in_raw(material) => {
                Err(SceneError::MaterialNotFound(material.name().to_string()))
            }
            _ => Ok(()),
        }
    }

    fn install_part(&self, world: &World, parent: Option<&Arc<Part>>, part: Arc<Part>) -> SceneResult<Arc<Part>> {
        if let Some(parent) = parent {
            parent.add_child(&part, self.config.max_depth)?;
        }
        self.parts.add(Arc::clone(&part), true);
        world.register(&EntityRef::Part(Arc::clone(&part)));
        log::debug!(
            "{:?} '{}' added to world '{}' at depth {}",
            part.kind(),
            part.name(),
            world.name(),
            part.depth()
        );
        Ok(part)
    }

    /// Add a free-form figure to a World
    pub fn add_figure(&self, world: WorldId, name: &str, geometry: FigureGeometry) -> SceneResult<Arc<Figure>> {
        let _control = self.control.lock();
        let world = self.lookup_world(world)?;
        let figure = Figure::new(name, geometry);
        self.figures.add(Arc::clone(&figure), true);
        world.register(&EntityRef::Figure(Arc::clone(&figure)));
        log::debug!("Figure '{}' added to world '{}'", name, world.name());
        Ok(figure)
    }

    /// Add a lamp to a World
    pub fn add_lamp(&self, world: WorldId, name: &str, params: LampParams) -> SceneResult<Arc<Lamp>> {
        let _control = self.control.lock();
        let world = self.lookup_world(world)?;
        let lamp = Lamp::new(name, params);
        self.lamps.add(Arc::clone(&lamp), true);
        world.register(&EntityRef::Lamp(Arc::clone(&lamp)));
        log::debug!("Lamp '{}' added to world '{}'", name, world.name());
        Ok(lamp)
    }

    /// Add a label to a World, resolving its texture through the resource cache
    pub fn add_label(&self, world: WorldId, desc: LabelDesc) -> SceneResult<Arc<Label>> {
        let _control = self.control.lock();
        let world = self.lookup_world(world)?;
        let texture = match &desc.texture {
            Some(name) => Some(self.resources.lock().texture(name)?),
            None => None,
        };
        let label = Label::new(desc, texture);
        self.labels.add(Arc::clone(&label), true);
        world.register(&EntityRef::Label(Arc::clone(&label)));
        log::debug!("Label '{}' added to world '{}'", label.name(), world.name());
        Ok(label)
    }

    /// Whether the Universe owns this entity
    pub fn contains(&self, entity: &EntityRef) -> bool {
        match entity {
            EntityRef::Part(part) => self.parts.find_in_raw(part),
            EntityRef::Figure(figure) => self.figures.find_in_raw(figure),
            EntityRef::Lamp(lamp) => self.lamps.find_in_raw(lamp),
            EntityRef::Label(label) => self.labels.find_in_raw(label),
        }
    }

    fn require(&self, entity: &EntityRef) -> SceneResult<()> {
        if self.contains(entity) {
            Ok(())
        } else {
            Err(SceneError::EntityNotFound(entity.name().to_string()))
        }
    }

    /// Show an already-owned entity in another World as well
    ///
    /// The World gets a reference, not a copy; mutations show up in every
    /// World that references the entity.
    pub fn refer_to_world(&self, entity: &EntityRef, world: WorldId) -> SceneResult<()> {
        let _control = self.control.lock();
        self.require(entity)?;
        let world = self.lookup_world(world)?;
        if !world.register(entity) {
            return Err(SceneError::DuplicateRegistration {
                entity: entity.name().to_string(),
                world: world.name().to_string(),
            });
        }
        log::debug!("'{}' now also referenced by world '{}'", entity.name(), world.name());
        Ok(())
    }

    /// Stop showing an entity in one World without removing it
    pub fn withdraw_from_world(&self, entity: &EntityRef, world: WorldId) -> SceneResult<()> {
        let _control = self.control.lock();
        self.require(entity)?;
        let world = self.lookup_world(world)?;
        if world.unregister(entity) {
            Ok(())
        } else {
            Err(SceneError::EntityNotFound(entity.name().to_string()))
        }
    }

    // ---- hierarchy and attach ----------------------------------------------

    /// Bind or unbind a registered material on a registered part
    pub fn set_material(&self, part: &Arc<Part>, material: Option<&Arc<Material>>) -> SceneResult<bool> {
        let _control = self.control.lock();
        self.require(&EntityRef::Part(Arc::clone(part)))?;
        self.check_material(material)?;
        Ok(part.set_material(material.cloned()))
    }

    /// Move a part under another registered assembly, or to the root with `None`
    pub fn change_parent(&self, part: &Arc<Part>, new_parent: Option<&Arc<Part>>) -> SceneResult<()> {
        let _control = self.control.lock();
        self.require(&EntityRef::Part(Arc::clone(part)))?;
        if let Some(parent) = new_parent {
            if !self.parts.find_in_raw(parent) {
                return Err(SceneError::ParentNotFound(parent.name().to_string()));
            }
        }
        part.change_parent(new_parent, self.config.max_depth)
    }

    /// Make `entity` follow the composed transform of `target`
    pub fn attach(&self, entity: &EntityRef, target: &Arc<Part>) -> SceneResult<()> {
        let _control = self.control.lock();
        self.require(entity)?;
        self.require(&EntityRef::Part(Arc::clone(target)))?;
        match entity {
            EntityRef::Part(part) => part.attach(target)?,
            EntityRef::Figure(figure) => {
                figure.attach(target);
            }
            EntityRef::Lamp(lamp) => {
                lamp.attach(target);
            }
            EntityRef::Label(label) => {
                label.attach(target);
            }
        }
        Ok(())
    }

    /// Drop an entity's attach overlay
    pub fn detach(&self, entity: &EntityRef) -> SceneResult<bool> {
        let _control = self.control.lock();
        self.require(entity)?;
        Ok(match entity {
            EntityRef::Part(part) => part.detach(),
            EntityRef::Figure(figure) => figure.detach(),
            EntityRef::Lamp(lamp) => lamp.detach(),
            EntityRef::Label(label) => label.detach(),
        })
    }

    // ---- removal ----------------------------------------------------------

    /// Remove any entity; parts take their whole subtree with them
    ///
    /// Returns the number of entities removed.
    pub fn remove(&self, entity: &EntityRef) -> SceneResult<usize> {
        match entity {
            EntityRef::Part(part) => self.remove_part(part),
            EntityRef::Figure(figure) => {
                self.remove_leaf(entity, |universe| universe.figures.remove(figure))
            }
            EntityRef::Lamp(lamp) => self.remove_leaf(entity, |universe| universe.lamps.remove(lamp)),
            EntityRef::Label(label) => self.remove_leaf(entity, |universe| universe.labels.remove(label)),
        }
    }

    /// Remove a figure from the Universe and every World
    pub fn remove_figure(&self, figure: &Arc<Figure>) -> SceneResult<usize> {
        self.remove(&EntityRef::Figure(Arc::clone(figure)))
    }

    /// Remove a lamp from the Universe and every World
    pub fn remove_lamp(&self, lamp: &Arc<Lamp>) -> SceneResult<usize> {
        self.remove(&EntityRef::Lamp(Arc::clone(lamp)))
    }

    /// Remove a label from the Universe and every World
    pub fn remove_label(&self, label: &Arc<Label>) -> SceneResult<usize> {
        self.remove(&EntityRef::Label(Arc::clone(label)))
    }

    fn remove_leaf(&self, entity: &EntityRef, remove_global: impl FnOnce(&Self) -> bool) -> SceneResult<usize> {
        let _control = self.control.lock();
        if !remove_global(self) {
            return Err(SceneError::EntityNotFound(entity.name().to_string()));
        }
        for world in self.all_worlds() {
            world.unregister(entity);
        }
        log::debug!("'{}' removed", entity.name());
        Ok(1)
    }

    /// Remove a part or assembly together with all its descendants
    ///
    /// a. Collect the subtree into one batch.
    /// b. Batch-remove it from the global registry; destruction waits for the
    ///    next synchronize.
    /// c. Remove materials no surviving part references.
    /// d. Drop the batch from every World, unlink it from its parents and
    ///    scrub attach links that pointed into it.
    pub fn remove_part(&self, part: &Arc<Part>) -> SceneResult<usize> {
        let _control = self.control.lock();
        if !self.parts.find_in_raw(part) {
            return Err(SceneError::EntityNotFound(part.name().to_string()));
        }

        // a
        let doomed = part.subtree();

        // b
        let removed = self.parts.remove_many(&doomed);

        // c
        let orphans = self.orphaned_materials(&doomed);
        let materials_removed = self.materials.remove_many(&orphans);

        // d
        for world in self.all_worlds() {
            world.parts().remove_many(&doomed);
        }
        for node in doomed.iter().rev() {
            node.unlink_from_parent();
        }
        let ids: HashSet<EntityId> = doomed.iter().map(|node| node.id()).collect();
        let scrubbed = self.scrub_attachments(&ids);

        log::debug!(
            "Removed '{}' with {} node(s), {} orphaned material(s), {} attach link(s) scrubbed",
            part.name(),
            removed,
            materials_removed,
            scrubbed
        );
        Ok(removed)
    }

    fn orphaned_materials(&self, doomed: &[Arc<Part>]) -> Vec<Arc<Material>> {
        let mut candidates: Vec<Arc<Material>> = Vec::new();
        for material in doomed.iter().filter_map(|node| node.material()) {
            if !candidates.iter().any(|seen| Arc::ptr_eq(seen, &material)) {
                candidates.push(material);
            }
        }
        if candidates.is_empty() {
            return candidates;
        }

        let survivors = self.parts.raw_snapshot();
        candidates.retain(|material| {
            !survivors
                .iter()
                .any(|survivor| survivor.material().is_some_and(|bound| Arc::ptr_eq(&bound, material)))
        });
        candidates
    }

    /// Clear every surviving attach link that targets one of `removed`
    ///
    /// Returns the number of links cleared.
    pub fn scrub_attachments(&self, removed: &HashSet<EntityId>) -> usize {
        let parts = self.parts.raw_snapshot().iter().filter(|p| p.scrub_attachment(removed)).count();
        let figures = self.figures.raw_snapshot().iter().filter(|f| f.scrub_attachment(removed)).count();
        let lamps = self.lamps.raw_snapshot().iter().filter(|l| l.scrub_attachment(removed)).count();
        let labels = self.labels.raw_snapshot().iter().filter(|l| l.scrub_attachment(removed)).count();
        parts + figures + lamps + labels
    }

    // ---- render thread ----------------------------------------------------

    /// Promote global registries, material channels and part state (render thread only)
    ///
    /// Deferred removals are released here. Worlds synchronize the same parts
    /// again during `render`, which is a no-op once promoted.
    pub fn synchronize(&self) -> bool {
        let mut changed = self.parts.synchronize();
        changed |= self.figures.synchronize();
        changed |= self.lamps.synchronize();
        changed |= self.labels.synchronize();
        changed |= self.materials.synchronize();
        for material in self.materials.pure_snapshot() {
            changed |= material.synchronize_self();
        }
        // attach targets may be referenced by no World
        for part in self.parts.pure_snapshot() {
            changed |= part.synchronize_self();
        }
        changed
    }

    /// Upload pending textures, synchronize and draw every World in creation order
    pub fn render_frame(&self, backend: &mut dyn RenderBackend) -> Vec<FrameStats> {
        let uploads = self.resources.lock().take_pending_uploads();
        for texture in uploads {
            if let Err(err) = backend.upload_texture(&texture) {
                log::warn!("Texture '{}' not uploaded: {}", texture.name(), err);
            }
        }

        self.synchronize();
        self.all_worlds().iter().map(|world| world.render(backend)).collect()
    }

    // ---- counts -----------------------------------------------------------

    /// Registered parts and assemblies
    pub fn part_count(&self) -> usize {
        self.parts.raw_len()
    }

    /// Registered figures
    pub fn figure_count(&self) -> usize {
        self.figures.raw_len()
    }

    /// Registered lamps
    pub fn lamp_count(&self) -> usize {
        self.lamps.raw_len()
    }

    /// Registered labels
    pub fn label_count(&self) -> usize {
        self.labels.raw_len()
    }

    /// Registered materials
    pub fn material_count(&self) -> usize {
        self.materials.raw_len()
    }

    /// Removed entities and materials awaiting release
    pub fn pending_deletions(&self) -> usize {
        self.parts.pending_len()
            + self.figures.pending_len()
            + self.lamps.pending_len()
            + self.labels.pending_len()
            + self.materials.pending_len()
    }

    /// Textures decoded but not yet uploaded
    pub fn pending_uploads(&self) -> usize {
        self.resources.lock().pending_upload_count()
    }

    /// Whether a material is still registered
    pub fn has_material(&self, material: &Arc<Material>) -> bool {
        self.materials.find_in_raw(material)
    }
}

impl Drop for Universe {
    fn drop(&mut self) {
        // Worlds go first so no frame can reach entities being torn down
        let worlds = std::mem::take(&mut *self.worlds.write());
        self.world_order.write().clear();
        log::info!(
            "Universe shutting down: {} world(s), {} part(s), {} material(s)",
            worlds.len(),
            self.parts.raw_len(),
            self.materials.raw_len()
        );
        drop(worlds);
    }
}
