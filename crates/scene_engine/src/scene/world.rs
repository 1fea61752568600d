//! World - one camera/viewport-scoped render target
//!
//! A World references (never copies) lamps, parts, figures and labels owned by
//! the Universe, and drives the per-frame cycle on the render thread:
//!
//! ```text
//!  Idle ──► Synchronizing ──► Drawing ──► Idle
//!            registries        lamps
//!            view state        opaque figures, opaque parts
//!            entities          transparent parts, transparent figures
//!            light units       labels (overlay, no depth test)
//! ```

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::config::SceneConfig;
use crate::foundation::collections::WorldId;
use crate::foundation::math::{Color, Mat4, Vec2, Vec3};
use crate::render::RenderBackend;
use crate::scene::{
    CameraFrame, CameraState, DrawContext, Drawable, DualBuffer, ElementRegistry, EntityRef, Figure,
    Label, Lamp, OrthoBounds, Part, Projection, ProjectionKind, RenderQueue, SceneError,
    SceneResult, ViewportRect,
};

/// Double-buffered view description of a World
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    /// Camera placement
    pub camera: CameraState,
    /// Projection parameters
    pub projection: Projection,
    /// Target pixel rectangle
    pub viewport: ViewportRect,
    /// Whether lamps light the scene
    pub lighting: bool,
    /// Clear color
    pub background: Color,
    /// Orthographic box derived from the perspective angle and camera distance
    pub ortho: OrthoBounds,
}

impl ViewState {
    fn new(viewport: ViewportRect, projection: Projection) -> Self {
        let mut view = Self {
            camera: CameraState::default(),
            projection,
            viewport,
            lighting: true,
            background: Color::BLACK,
            ortho: OrthoBounds::default(),
        };
        view.refresh_ortho();
        view
    }

    fn refresh_ortho(&mut self) {
        self.ortho = OrthoBounds::from_perspective(
            self.projection.angle,
            self.viewport.aspect(),
            self.camera.distance(),
            self.projection.near,
            self.projection.far,
        );
    }
}

/// Stage of the render cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderPhase {
    /// Between frames
    #[default]
    Idle,
    /// Promoting raw state to pure state
    Synchronizing,
    /// Issuing backend calls from pure state
    Drawing,
}

/// What one `render` call drew
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Whether any registry swapped its pure list this frame
    pub registries_changed: bool,
    /// Lamps applied to light units
    pub lamps: usize,
    /// Opaque figures drawn
    pub opaque_figures: usize,
    /// Opaque parts drawn
    pub opaque_parts: usize,
    /// Transparent parts drawn
    pub transparent_parts: usize,
    /// Transparent figures drawn
    pub transparent_figures: usize,
    /// Labels drawn
    pub labels: usize,
}

impl FrameStats {
    /// Total entities drawn, lamps excluded
    pub const fn drawn(&self) -> usize {
        self.opaque_figures + self.opaque_parts + self.transparent_parts + self.transparent_figures + self.labels
    }
}

/// A camera, a viewport and the entities visible through them
pub struct World {
    id: WorldId,
    name: String,
    config: Arc<SceneConfig>,
    view: DualBuffer<ViewState>,
    lamps: ElementRegistry<Lamp>,
    parts: ElementRegistry<Part>,
    figures: ElementRegistry<Figure>,
    labels: ElementRegistry<Label>,
    light_units: Mutex<Vec<(Arc<Lamp>, usize)>>,
    phase: Mutex<RenderPhase>,
}

impl World {
    /// Create a standalone World
    ///
    /// Worlds created through [`Universe::create_world`](crate::scene::Universe::create_world)
    /// receive a real id; this one carries the null id.
    pub fn new(name: impl Into<String>, viewport: ViewportRect, config: Arc<SceneConfig>) -> SceneResult<Self> {
        Self::with_id(WorldId::default(), name, viewport, config)
    }

    pub(crate) fn with_id(
        id: WorldId,
        name: impl Into<String>,
        viewport: ViewportRect,
        config: Arc<SceneConfig>,
    ) -> SceneResult<Self> {
        if !config.accepts_viewport(viewport.width, viewport.height) {
            return Err(SceneError::InvalidViewport { width: viewport.width, height: viewport.height });
        }
        let projection = Projection::perspective(config.default_angle, config.default_near, config.default_far);
        projection.validate()?;

        Ok(Self {
            id,
            name: name.into(),
            view: DualBuffer::new(ViewState::new(viewport, projection)),
            config,
            lamps: ElementRegistry::new(),
            parts: ElementRegistry::new(),
            figures: ElementRegistry::new(),
            labels: ElementRegistry::new(),
            light_units: Mutex::new(Vec::new()),
            phase: Mutex::new(RenderPhase::Idle),
        })
    }

    /// Handle in the owning Universe
    pub const fn id(&self) -> WorldId {
        self.id
    }

    /// World name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current stage of the render cycle
    pub fn phase(&self) -> RenderPhase {
        *self.phase.lock()
    }

    fn set_phase(&self, phase: RenderPhase) {
        *self.phase.lock() = phase;
    }

    // ---- view state -------------------------------------------------------

    /// Place the camera; recomputes the orthographic box
    pub fn set_camera(&self, position: Vec3, target: Vec3, roll: f32) -> bool {
        let camera = CameraState::new(position, target, roll);
        self.view.modify(|view| {
            if view.camera == camera {
                return false;
            }
            view.camera = camera;
            view.refresh_ortho();
            true
        })
    }

    /// Replace projection parameters
    pub fn set_projection(&self, projection: Projection) -> SceneResult<bool> {
        projection.validate()?;
        Ok(self.view.modify(|view| {
            if view.projection == projection {
                return false;
            }
            view.projection = projection;
            view.refresh_ortho();
            true
        }))
    }

    /// Resize or move the viewport
    pub fn set_viewport(&self, viewport: ViewportRect) -> SceneResult<bool> {
        if !self.config.accepts_viewport(viewport.width, viewport.height) {
            return Err(SceneError::InvalidViewport { width: viewport.width, height: viewport.height });
        }
        Ok(self.view.modify(|view| {
            if view.viewport == viewport {
                return false;
            }
            view.viewport = viewport;
            view.refresh_ortho();
            true
        }))
    }

    /// Switch lamps on or off for this World
    pub fn set_lighting(&self, enabled: bool) -> bool {
        self.view.modify(|view| {
            if view.lighting == enabled {
                return false;
            }
            view.lighting = enabled;
            true
        })
    }

    /// Set the clear color
    pub fn set_background(&self, color: Color) -> bool {
        self.view.modify(|view| {
            if view.background == color {
                return false;
            }
            view.background = color;
            true
        })
    }

    /// Raw view state
    pub fn view_state(&self) -> ViewState {
        self.view.raw()
    }

    /// Raw camera
    pub fn camera(&self) -> CameraState {
        self.view.with_raw(|view| view.camera.clone())
    }

    /// Raw projection
    pub fn projection(&self) -> Projection {
        self.view.with_raw(|view| view.projection)
    }

    /// Raw viewport
    pub fn viewport(&self) -> ViewportRect {
        self.view.with_raw(|view| view.viewport)
    }

    /// Raw orthographic box
    pub fn ortho_bounds(&self) -> OrthoBounds {
        self.view.with_raw(|view| view.ortho)
    }

    /// Raw world-to-view matrix
    pub fn view_matrix(&self) -> Mat4 {
        self.view.with_raw(|view| view.camera.view_matrix())
    }

    /// Raw projection matrix
    pub fn projection_matrix(&self) -> Mat4 {
        self.view.with_raw(|view| view.projection.matrix(view.viewport.aspect(), &view.ortho))
    }

    /// Pixel position of a world-space point under the raw view, if it is in front of the camera
    pub fn project_to_screen(&self, point: &Vec3) -> Option<Vec2> {
        self.view.with_raw(|view| {
            CameraFrame::new(&view.camera, &view.projection, &view.viewport, &view.ortho).project_to_screen(point)
        })
    }

    // ---- membership -------------------------------------------------------

    /// Lamps referenced by this World
    pub const fn lamps(&self) -> &ElementRegistry<Lamp> {
        &self.lamps
    }

    /// Parts and assemblies referenced by this World
    pub const fn parts(&self) -> &ElementRegistry<Part> {
        &self.parts
    }

    /// Figures referenced by this World
    pub const fn figures(&self) -> &ElementRegistry<Figure> {
        &self.figures
    }

    /// Labels referenced by this World
    pub const fn labels(&self) -> &ElementRegistry<Label> {
        &self.labels
    }

    /// Whether the entity is in this World's raw lists
    pub fn contains(&self, entity: &EntityRef) -> bool {
        match entity {
            EntityRef::Part(part) => self.parts.find_in_raw(part),
            EntityRef::Figure(figure) => self.figures.find_in_raw(figure),
            EntityRef::Lamp(lamp) => self.lamps.find_in_raw(lamp),
            EntityRef::Label(label) => self.labels.find_in_raw(label),
        }
    }

    /// Reference an entity from this World; fails on duplicates
    pub(crate) fn register(&self, entity: &EntityRef) -> bool {
        match entity {
            EntityRef::Part(part) => self.parts.add(Arc::clone(part), true),
            EntityRef::Figure(figure) => self.figures.add(Arc::clone(figure), true),
            EntityRef::Lamp(lamp) => self.lamps.add(Arc::clone(lamp), true),
            EntityRef::Label(label) => self.labels.add(Arc::clone(label), true),
        }
    }

    /// Drop this World's reference to an entity
    pub(crate) fn unregister(&self, entity: &EntityRef) -> bool {
        match entity {
            EntityRef::Part(part) => self.parts.remove(part),
            EntityRef::Figure(figure) => self.figures.remove(figure),
            EntityRef::Lamp(lamp) => self.lamps.remove(lamp),
            EntityRef::Label(label) => self.labels.remove(label),
        }
    }

    /// Light unit currently assigned to a lamp
    pub fn light_unit_of(&self, lamp: &Arc<Lamp>) -> Option<usize> {
        self.light_units
            .lock()
            .iter()
            .find(|(candidate, _)| Arc::ptr_eq(candidate, lamp))
            .map(|(_, unit)| *unit)
    }

    fn assign_light_units(&self, lamps: &[Arc<Lamp>]) {
        if lamps.len() > self.config.max_lamps {
            log::warn!(
                "World '{}' has {} lamps; only the first {} get light units",
                self.name,
                lamps.len(),
                self.config.max_lamps
            );
        }
        let units = lamps
            .iter()
            .take(self.config.max_lamps)
            .enumerate()
            .map(|(unit, lamp)| (Arc::clone(lamp), unit))
            .collect();
        *self.light_units.lock() = units;
    }

    // ---- render cycle -----------------------------------------------------

    /// Synchronize and draw one frame (render thread only)
    ///
    /// 1. Promote registries, view state and every referenced entity
    /// 2. Re-issue light units if lamp membership changed
    /// 3. Apply lamps when lighting is on
    /// 4. Opaque figures, then opaque parts, in registry order
    /// 5. Transparent parts, then transparent figures, farthest first
    /// 6. Labels under a pixel-space overlay with depth testing off
    pub fn render(&self, backend: &mut dyn RenderBackend) -> FrameStats {
        // Step 1: synchronize
        self.set_phase(RenderPhase::Synchronizing);
        let lamps_changed = self.lamps.synchronize();
        let mut changed = lamps_changed;
        changed |= self.parts.synchronize();
        changed |= self.figures.synchronize();
        changed |= self.labels.synchronize();
        self.view.update();

        let lamps = self.lamps.pure_snapshot();
        let parts = self.parts.pure_snapshot();
        let figures = self.figures.pure_snapshot();
        let labels = self.labels.pure_snapshot();
        synchronize_all(&lamps);
        synchronize_all(&parts);
        synchronize_all(&figures);
        synchronize_all(&labels);

        // Step 2: light units follow declaration order
        if lamps_changed {
            self.assign_light_units(&lamps);
        }

        let view = self.view.pure().clone();
        let frame = CameraFrame::new(&view.camera, &view.projection, &view.viewport, &view.ortho);
        let sort = self.config.sort_transparent;
        let drawable_parts: Vec<Arc<Part>> = parts.into_iter().filter(|part| part.mesh().is_some()).collect();
        let part_queue = RenderQueue::build(&drawable_parts, &frame.plane, sort);
        let figure_queue = RenderQueue::build(&figures, &frame.plane, sort);

        self.set_phase(RenderPhase::Drawing);
        backend.set_viewport(&view.viewport);
        backend.clear(view.background);
        match view.projection.kind {
            ProjectionKind::Perspective => {
                backend.set_perspective(&view.projection, view.viewport.aspect(), &view.camera);
            }
            ProjectionKind::Orthographic => backend.set_ortho(&view.ortho, Some(&view.camera)),
        }
        backend.activate_depth_test(true);

        let mut stats = FrameStats { registries_changed: changed, ..FrameStats::default() };
        let units = self.light_units.lock().clone();
        let lit = view.lighting && !units.is_empty();
        let mut ctx = DrawContext { backend, frame: &frame, lighting: lit, light_unit: 0 };

        // Step 3: lamps
        ctx.backend.activate_lamps(lit);
        if lit {
            for (lamp, unit) in &units {
                if lamp.is_visible() {
                    ctx.light_unit = *unit;
                    lamp.draw(&mut ctx);
                    stats.lamps += 1;
                }
            }
        }

        // Step 4: opaque figures, then opaque parts
        stats.opaque_figures = draw_all(&mut ctx, figure_queue.opaque());
        ctx.backend.activate_lamps(lit);
        stats.opaque_parts = draw_all(&mut ctx, part_queue.opaque());

        // Step 5: transparent parts, then transparent figures
        stats.transparent_parts = draw_all(&mut ctx, part_queue.transparent());
        stats.transparent_figures = draw_all(&mut ctx, figure_queue.transparent());

        // Step 6: labels
        let visible_labels: Vec<Arc<Label>> = labels.into_iter().filter(|label| label.is_visible()).collect();
        if !visible_labels.is_empty() {
            ctx.backend.activate_depth_test(false);
            ctx.backend.activate_lamps(false);
            ctx.backend.set_ortho(&OrthoBounds::overlay(&view.viewport), None);
            stats.labels = draw_all(&mut ctx, &visible_labels);
            ctx.backend.activate_depth_test(true);
        }

        self.set_phase(RenderPhase::Idle);
        log::trace!("World '{}' frame: {:?}", self.name, stats);
        stats
    }
}

fn synchronize_all<T: Drawable>(items: &[Arc<T>]) {
    for item in items {
        item.synchronize_self();
    }
}

fn draw_all<T: Drawable>(ctx: &mut DrawContext<'_>, items: &[Arc<T>]) -> usize {
    for item in items {
        item.draw(ctx);
    }
    items.len()
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("parts", &self.parts.raw_len())
            .field("figures", &self.figures.raw_len())
            .field("lamps", &self.lamps.raw_len())
            .field("labels", &self.labels.raw_len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::Mesh;
    use crate::render::{DrawCommand, RecordingBackend};
    use crate::scene::{FigureGeometry, LabelDesc, LampParams};

    fn world() -> World {
        World::new("main", ViewportRect::new(0, 0, 640, 480), Arc::new(SceneConfig::default())).expect("world")
    }

    fn panel(name: &str, z: f32, alpha: f32) -> Arc<Part> {
        let part = Part::new(name, Arc::new(Mesh::quad(1.0)), None);
        part.set_coordinates(Vec3::new(0.0, 0.0, z));
        part.set_color(Color::WHITE.with_alpha(alpha));
        part
    }

    #[test]
    fn test_light_units_capped_at_max_lamps() {
        let config = Arc::new(SceneConfig { max_lamps: 1, ..SceneConfig::default() });
        let world = World::new("dim", ViewportRect::new(0, 0, 640, 480), config).expect("world");
        let first = Lamp::new("first", LampParams::directional(-Vec3::y(), Color::WHITE));
        let second = Lamp::new("second", LampParams::point(Vec3::new(0.0, 3.0, 0.0), Color::WHITE));
        world.register(&EntityRef::Lamp(Arc::clone(&first)));
        world.register(&EntityRef::Lamp(Arc::clone(&second)));

        let mut backend = RecordingBackend::new();
        let stats = world.render(&mut backend);
        assert_eq!(world.light_unit_of(&first), Some(0));
        assert_eq!(world.light_unit_of(&second), None);
        assert_eq!(stats.lamps, 1);
        assert_eq!(backend.draw_order(), vec!["first"]);
    }

    #[test]
    fn test_invalid_viewport_is_rejected() {
        let config = Arc::new(SceneConfig::default());
        assert!(matches!(
            World::new("tiny", ViewportRect::new(0, 0, 0, 10), Arc::clone(&config)),
            Err(SceneError::InvalidViewport { .. })
        ));
        let world = world();
        assert!(world.set_viewport(ViewportRect::new(0, 0, 0, 0)).is_err());
        assert_eq!(world.viewport(), ViewportRect::new(0, 0, 640, 480));
    }

    #[test]
    fn test_target_projects_to_viewport_centre() {
        let world = world();
        let centre = world.project_to_screen(&Vec3::zeros()).expect("in view");
        assert!((centre.x - 320.0).abs() < 1e-3 && (centre.y - 240.0).abs() < 1e-3);
        assert!(world.project_to_screen(&Vec3::new(0.0, 0.0, 20.0)).is_none());
    }

    #[test]
    fn test_camera_change_recomputes_ortho_bounds() {
        let world = world();
        let before = world.ortho_bounds();
        world.set_camera(Vec3::new(0.0, 0.0, 40.0), Vec3::zeros(), 0.0);
        let after = world.ortho_bounds();
        assert!(after.top > before.top);
    }

    #[test]
    fn test_view_changes_wait_for_render() {
        let world = world();
        world.set_background(Color::rgb(0.1, 0.2, 0.3));

        let mut backend = RecordingBackend::new();
        world.render(&mut backend);
        assert!(backend.commands().contains(&DrawCommand::Clear(Color::rgb(0.1, 0.2, 0.3))));
        assert_eq!(world.phase(), RenderPhase::Idle);
    }

    #[test]
    fn test_transparent_parts_draw_back_to_front_after_opaque() {
        let world = world();
        // camera at z = 10 looking down -z: distance = 10 - z
        for part in [panel("opaque", 0.0, 1.0), panel("mid", 5.0, 0.5), panel("far", -10.0, 0.3)] {
            world.register(&EntityRef::Part(part));
        }

        let mut backend = RecordingBackend::new();
        let stats = world.render(&mut backend);
        assert_eq!(backend.draw_order(), vec!["opaque", "far", "mid"]);
        assert_eq!(stats.opaque_parts, 1);
        assert_eq!(stats.transparent_parts, 2);
    }

    #[test]
    fn test_pass_order_and_label_overlay_state() {
        let world = world();
        let lamp = Lamp::new("sun", LampParams::directional(-Vec3::y(), Color::WHITE));
        let glass_line = Figure::new("glass_line", FigureGeometry::polyline(vec![Vec3::zeros(), Vec3::x()]));
        glass_line.set_color(Color::WHITE.with_alpha(0.5));
        let axis = Figure::new("axis", FigureGeometry::polyline(vec![Vec3::zeros(), Vec3::y()]));
        let label = Label::new(LabelDesc::new("tag", "hello", Vec3::zeros()), None);

        world.register(&EntityRef::Label(label));
        world.register(&EntityRef::Figure(glass_line));
        world.register(&EntityRef::Part(panel("glass", 0.0, 0.5)));
        world.register(&EntityRef::Part(panel("solid", 0.0, 1.0)));
        world.register(&EntityRef::Figure(axis));
        world.register(&EntityRef::Lamp(lamp));

        let mut backend = RecordingBackend::new();
        world.render(&mut backend);
        assert_eq!(backend.draw_order(), vec!["sun", "axis", "solid", "glass", "glass_line", "tag"]);

        let commands = backend.commands();
        let tag_at = commands
            .iter()
            .position(|cmd| *cmd == DrawCommand::Marker("tag".to_string()))
            .expect("label drawn");
        let overlay = &commands[..tag_at];
        assert!(overlay.contains(&DrawCommand::DepthTest(false)));
        assert!(overlay.contains(&DrawCommand::Ortho {
            bounds: OrthoBounds::overlay(&world.viewport()),
            with_camera: false,
        }));
    }

    #[test]
    fn test_light_units_follow_membership() {
        let world = world();
        let first = Lamp::new("first", LampParams::point(Vec3::zeros(), Color::WHITE));
        let second = Lamp::new("second", LampParams::point(Vec3::x(), Color::WHITE));
        world.register(&EntityRef::Lamp(Arc::clone(&first)));
        world.register(&EntityRef::Lamp(Arc::clone(&second)));

        let mut backend = RecordingBackend::new();
        world.render(&mut backend);
        assert_eq!(world.light_unit_of(&second), Some(1));

        world.unregister(&EntityRef::Lamp(Arc::clone(&first)));
        world.render(&mut backend);
        assert_eq!(world.light_unit_of(&second), Some(0));
        assert_eq!(world.light_unit_of(&first), None);
    }

    #[test]
    fn test_lighting_off_skips_lamps() {
        let world = world();
        world.register(&EntityRef::Lamp(Lamp::new("sun", LampParams::directional(-Vec3::y(), Color::WHITE))));
        world.set_lighting(false);

        let mut backend = RecordingBackend::new();
        let stats = world.render(&mut backend);
        assert_eq!(stats.lamps, 0);
        assert!(backend.draw_order().is_empty());
    }

    #[test]
    fn test_hidden_part_is_not_drawn() {
        let world = world();
        let part = panel("ghost", 0.0, 1.0);
        world.register(&EntityRef::Part(Arc::clone(&part)));
        part.core().set_hidden(true);

        let mut backend = RecordingBackend::new();
        assert_eq!(world.render(&mut backend).drawn(), 0);
    }
}
