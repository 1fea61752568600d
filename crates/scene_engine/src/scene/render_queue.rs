//! Render queue for one entity kind
//!
//! Splits a pure snapshot into opaque and transparent entries. Opaque entries
//! keep registry order; transparent entries are sorted back-to-front against
//! the camera's forward plane so alpha blending composes correctly.

use std::sync::Arc;

use crate::scene::{Drawable, Plane};

/// Entities that take part in the transparency sort
pub trait DepthSorted: Drawable {
    /// Whether drawing needs blending (pure state)
    fn is_transparent(&self) -> bool;

    /// Signed distance from `plane` to the entity's reference point (pure state)
    ///
    /// Larger values are farther from the camera.
    fn distance_to_plane(&self, plane: &Plane) -> f32;
}

/// Opaque and transparent draw lists for one frame
#[derive(Debug)]
pub struct RenderQueue<T> {
    /// Opaque entities in registry order
    opaque: Vec<Arc<T>>,

    /// Transparent entities, farthest first when sorting is enabled
    transparent: Vec<Arc<T>>,
}

impl<T: DepthSorted> RenderQueue<T> {
    /// Build a queue from visible entries of `items`
    ///
    /// With `sort_transparent` off, transparent entries stay in registry order.
    pub fn build(items: &[Arc<T>], plane: &Plane, sort_transparent: bool) -> Self {
        let (transparent, opaque): (Vec<Arc<T>>, Vec<Arc<T>>) = items
            .iter()
            .filter(|item| item.is_visible())
            .cloned()
            .partition(|item| item.is_transparent());

        let transparent = if sort_transparent {
            let mut keyed: Vec<(f32, Arc<T>)> = transparent
                .into_iter()
                .map(|item| (item.distance_to_plane(plane), item))
                .collect();
            // stable: equal distances keep registry order
            keyed.sort_by(|a, b| b.0.total_cmp(&a.0));
            keyed.into_iter().map(|(_, item)| item).collect()
        } else {
            transparent
        };

        Self { opaque, transparent }
    }

    /// Opaque entries in registry order
    pub fn opaque(&self) -> &[Arc<T>] {
        &self.opaque
    }

    /// Transparent entries in draw order
    pub fn transparent(&self) -> &[Arc<T>] {
        &self.transparent
    }

    /// Total number of entries
    pub fn len(&self) -> usize {
        self.opaque.len() + self.transparent.len()
    }

    /// Whether nothing is queued
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use crate::scene::{DrawContext, EntityCore};

    struct Probe {
        core: EntityCore,
        alpha: f32,
        distance: f32,
        visible: bool,
    }

    fn probe(name: &str, alpha: f32, distance: f32) -> Arc<Probe> {
        Arc::new(Probe { core: EntityCore::new(name), alpha, distance, visible: true })
    }

    impl Drawable for Probe {
        fn core(&self) -> &EntityCore {
            &self.core
        }

        fn synchronize_self(&self) -> bool {
            false
        }

        fn draw(&self, _ctx: &mut DrawContext<'_>) {}

        fn is_visible(&self) -> bool {
            self.visible
        }
    }

    impl DepthSorted for Probe {
        fn is_transparent(&self) -> bool {
            self.alpha < 1.0
        }

        fn distance_to_plane(&self, _plane: &Plane) -> f32 {
            self.distance
        }
    }

    fn names(items: &[Arc<Probe>]) -> Vec<&str> {
        items.iter().map(|item| item.core.name()).collect()
    }

    fn plane() -> Plane {
        Plane::new(Vec3::z(), 0.0)
    }

    #[test]
    fn test_transparent_entries_sorted_far_to_near() {
        let items = vec![probe("a", 1.0, 10.0), probe("b", 0.5, 5.0), probe("c", 0.3, 20.0)];
        let queue = RenderQueue::build(&items, &plane(), true);
        assert_eq!(names(queue.opaque()), vec!["a"]);
        assert_eq!(names(queue.transparent()), vec!["c", "b"]);
    }

    #[test]
    fn test_sorting_disabled_keeps_registry_order() {
        let items = vec![probe("near", 0.5, 1.0), probe("far", 0.5, 50.0)];
        let queue = RenderQueue::build(&items, &plane(), false);
        assert_eq!(names(queue.transparent()), vec!["near", "far"]);
    }

    #[test]
    fn test_equal_distances_keep_registry_order() {
        let items = vec![probe("first", 0.5, 3.0), probe("second", 0.5, 3.0), probe("third", 0.5, 3.0)];
        let queue = RenderQueue::build(&items, &plane(), true);
        assert_eq!(names(queue.transparent()), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_invisible_entries_are_skipped() {
        let hidden = Arc::new(Probe { core: EntityCore::new("hidden"), alpha: 1.0, distance: 0.0, visible: false });
        let items = vec![hidden, probe("shown", 1.0, 0.0)];
        let queue = RenderQueue::build(&items, &plane(), true);
        assert_eq!(queue.len(), 1);
        assert_eq!(names(queue.opaque()), vec!["shown"]);
    }
}
