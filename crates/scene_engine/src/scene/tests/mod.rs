//! Universe-level scenarios
//!
//! Each file drives a Universe the way an application would: mutations on
//! the control side, `render_frame` on the render side, assertions on the
//! recorded backend calls and on entity state.

mod hierarchy_scenarios;
mod removal_scenarios;

use crate::assets::{MemoryProvider, Mesh};
use crate::core::config::SceneConfig;
use crate::scene::{Universe, ViewportRect};

pub(super) fn provider() -> MemoryProvider {
    let provider = MemoryProvider::new();
    provider.register_mesh("cube", Mesh::cube(1.0));
    provider.register_mesh("quad", Mesh::quad(1.0));
    provider
        .register_texture("checker", 2, 2, vec![255; 16])
        .expect("checker texture");
    provider
}

pub(super) fn universe_with(config: SceneConfig) -> Universe {
    Universe::new(config, Box::new(provider())).expect("universe")
}

pub(super) fn universe() -> Universe {
    universe_with(SceneConfig::default())
}

pub(super) fn viewport() -> ViewportRect {
    ViewportRect::new(0, 0, 640, 480)
}
