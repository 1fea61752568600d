//! Orbit demo application
//!
//! Builds a small solar system in two Worlds (a perspective overview and a
//! close-up sharing the same planets), then runs a control thread that moves
//! things around while a render thread records frames headlessly.
//!
//! Usage: `scene_demo [config.toml|config.ron]`

use std::f32::consts::TAU;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use rand::Rng;
use scene_engine::config::ConfigError;
use scene_engine::foundation::collections::WorldId;
use scene_engine::foundation::logging;
use scene_engine::prelude::*;
use scene_engine::scene::FrameStats;
use thiserror::Error;

const CONTROL_STEPS: u32 = 240;
const STEP_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Error)]
enum DemoError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("scene error: {0}")]
    Scene(#[from] SceneError),
}

struct Orbit {
    pivot: Arc<Part>,
    speed: f32,
}

struct SolarSystem {
    overview: WorldId,
    closeup: WorldId,
    orbits: Vec<Orbit>,
    comet_tail: Arc<Figure>,
    status: Arc<Label>,
}

fn load_config() -> Result<SceneConfig, DemoError> {
    match std::env::args().nth(1) {
        Some(path) => {
            log::info!("Loading scene configuration from {}", path);
            Ok(SceneConfig::load_from_file(path)?)
        }
        None => Ok(SceneConfig::default()),
    }
}

fn build(universe: &Universe) -> Result<SolarSystem, DemoError> {
    let overview = universe.create_world("overview", ViewportRect::new(0, 0, 800, 600))?;
    let closeup = universe.create_world("closeup", ViewportRect::new(600, 450, 200, 150))?;
    if let Some(world) = universe.world(overview) {
        world.set_camera(Vec3::new(0.0, 12.0, 30.0), Vec3::zeros(), 0.0);
    }
    if let Some(world) = universe.world(closeup) {
        world.set_camera(Vec3::new(0.0, 2.0, 8.0), Vec3::zeros(), 0.0);
        world.set_background(Color::rgb(0.05, 0.05, 0.1));
    }

    universe.add_lamp(overview, "sun_light", LampParams::point(Vec3::zeros(), Color::WHITE))?;
    let system = universe.add_assembly(overview, None, "system")?;

    let sun_paint = universe.add_material(
        MaterialDesc::new("sun").with_channels(MaterialChannels::from_color(Color::rgb(1.0, 0.8, 0.2))),
    )?;
    universe.add_part(overview, Some(&system), "sun", "sphere", Some(&sun_paint))?;

    let mut rng = rand::thread_rng();
    let mut orbits = Vec::new();
    for index in 0..4 {
        let pivot = universe.add_assembly(overview, Some(&system), &format!("orbit{index}"))?;
        let planet = universe.add_part(overview, Some(&pivot), &format!("planet{index}"), "sphere", None)?;
        planet.set_coordinates(Vec3::new(3.0 + 2.5 * index as f32, 0.0, 0.0));
        planet.set_color(Color::rgb(rng.gen(), rng.gen(), rng.gen()));
        orbits.push(Orbit { pivot, speed: rng.gen_range(0.2..1.5) });
    }

    let ring = universe.add_part(overview, Some(&orbits[1].pivot), "ring", "ring", None)?;
    ring.set_color(Color::rgb(0.8, 0.8, 0.9).with_alpha(0.4));

    // the close-up shows the same second orbit, not a copy of it
    universe.refer_to_world(&EntityRef::from(Arc::clone(&orbits[1].pivot)), closeup)?;
    for node in orbits[1].pivot.subtree().into_iter().skip(1) {
        universe.refer_to_world(&EntityRef::from(node), closeup)?;
    }

    let comet_tail = universe.add_figure(
        overview,
        "comet_tail",
        FigureGeometry::polyline(vec![Vec3::new(-12.0, 4.0, 0.0), Vec3::new(-9.0, 3.0, 0.0)]),
    )?;
    comet_tail.set_color(Color::rgb(0.6, 0.9, 1.0).with_alpha(0.6));

    let status = universe.add_label(overview, LabelDesc::new("status", "t = 0", Vec3::new(0.0, 6.0, 0.0)))?;

    Ok(SolarSystem { overview, closeup, orbits, comet_tail, status })
}

fn provider() -> MemoryProvider {
    let provider = MemoryProvider::new();
    provider.register_mesh("sphere", Mesh::cube(1.0));
    provider.register_mesh("ring", Mesh::quad(3.0));
    provider
}

fn control_loop(universe: &Universe, system: &SolarSystem, done: &AtomicBool) {
    let mut rng = rand::thread_rng();
    let mut debris: Vec<Arc<Part>> = Vec::new();

    for step in 0..CONTROL_STEPS {
        let t = step as f32 * 0.05;
        for orbit in &system.orbits {
            orbit.pivot.set_angles(Vec3::new(0.0, (t * orbit.speed * 360.0 / TAU) % 360.0, 0.0));
        }
        let head = Vec3::new(-12.0 + t, 4.0 - 0.1 * t, 0.0);
        system.comet_tail.set_geometry(FigureGeometry::polyline(vec![head, head + Vec3::new(3.0, -1.0, 0.0)]));
        system.status.set_text(format!("t = {t:.2}"));

        if step % 30 == 0 {
            match universe.add_part(system.overview, None, "debris", "sphere", None) {
                Ok(part) => {
                    part.set_coordinates(Vec3::new(rng.gen_range(-10.0..10.0), rng.gen_range(-5.0..5.0), 0.0));
                    part.set_scale(Vec3::repeat(0.2));
                    debris.push(part);
                }
                Err(err) => log::warn!("Debris not spawned: {}", err),
            }
        }
        if debris.len() > 3 {
            let oldest = debris.remove(0);
            if let Err(err) = universe.remove_part(&oldest) {
                log::warn!("Debris not removed: {}", err);
            }
        }

        thread::sleep(STEP_INTERVAL);
    }
    done.store(true, Ordering::Release);
}

fn render_loop(universe: &Universe, done: &AtomicBool) -> (u64, FrameStats) {
    let mut backend = RecordingBackend::new();
    let mut frames = 0_u64;
    let mut window_frames = 0_u32;
    let mut window_start = Instant::now();
    let mut last = FrameStats::default();
    while !done.load(Ordering::Acquire) {
        let stats = universe.render_frame(&mut backend);
        if let Some(first) = stats.first() {
            last = *first;
        }
        frames += 1;
        window_frames += 1;
        if window_start.elapsed() >= Duration::from_secs(1) {
            log::info!(
                "{} frames/s, {} draws in overview, {} commands in last frame",
                window_frames,
                last.drawn(),
                backend.commands().len()
            );
            window_frames = 0;
            window_start = Instant::now();
        }
        backend.take_commands();
    }
    (frames, last)
}

fn run() -> Result<(), DemoError> {
    let config = load_config()?;
    let universe = Universe::new(config, Box::new(provider()))?;
    let system = build(&universe)?;
    let done = AtomicBool::new(false);
    let started = Instant::now();

    let (frames, last) = thread::scope(|scope| {
        scope.spawn(|| control_loop(&universe, &system, &done));
        let renderer = scope.spawn(|| render_loop(&universe, &done));
        renderer.join().unwrap_or_default()
    });

    let elapsed = started.elapsed().as_secs_f32();
    log::info!(
        "Rendered {} frames in {:.2}s ({:.1} fps), last overview frame drew {} entities",
        frames,
        elapsed,
        frames as f32 / elapsed.max(f32::EPSILON),
        last.drawn()
    );
    log::info!(
        "Universe holds {} parts, {} materials across {} worlds (close-up {:?})",
        universe.part_count(),
        universe.material_count(),
        universe.world_count(),
        system.closeup
    );
    Ok(())
}

fn main() {
    logging::init();
    log::info!("Starting orbit demo");
    if let Err(err) = run() {
        log::error!("Demo failed: {}", err);
        std::process::exit(1);
    }
}
