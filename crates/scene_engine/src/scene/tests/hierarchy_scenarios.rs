//! Assembly nesting, transform composition and propagated attributes

use approx::assert_relative_eq;

use super::{universe, universe_with, viewport};
use crate::core::config::SceneConfig;
use crate::foundation::math::{transform_point, Color, Vec3};
use crate::render::{DrawCommand, RecordingBackend};
use crate::scene::{EntityRef, MaterialDesc, Part, SceneError};

#[test]
fn test_child_follows_assembly_translation_after_frame() {
    let universe = universe();
    let world = universe.create_world("main", viewport()).expect("world");
    let assembly = universe.add_assembly(world, None, "A").expect("assembly");
    let part = universe.add_part(world, Some(&assembly), "P", "cube", None).expect("part");

    assembly.set_coordinates(Vec3::new(1.0, 0.0, 0.0));

    // raw side sees the change at once, pure side only after a frame
    assert_relative_eq!(part.composed_transform()[(0, 3)], 1.0);
    assert_relative_eq!(part.pure_composed()[(0, 3)], 0.0);

    let mut backend = RecordingBackend::new();
    universe.render_frame(&mut backend);

    let origin = transform_point(&part.pure_composed(), &Vec3::zeros());
    assert_relative_eq!(origin, Vec3::new(1.0, 0.0, 0.0), epsilon = 1e-6);
    assert!(backend
        .commands()
        .iter()
        .any(|cmd| matches!(cmd, DrawCommand::Model(model) if (model[(0, 3)] - 1.0).abs() < 1e-6)));
}

#[test]
fn test_nested_rotation_composes_with_parent_translation() {
    let universe = universe();
    let world = universe.create_world("main", viewport()).expect("world");
    let root = universe.add_assembly(world, None, "root").expect("root");
    let arm = universe.add_assembly(world, Some(&root), "arm").expect("arm");
    let tip = universe.add_part(world, Some(&arm), "tip", "cube", None).expect("tip");

    root.set_coordinates(Vec3::new(0.0, 2.0, 0.0));
    arm.set_angles(Vec3::new(0.0, 0.0, 90.0));
    tip.set_coordinates(Vec3::new(1.0, 0.0, 0.0));

    let point = transform_point(&tip.composed_transform(), &Vec3::zeros());
    assert_relative_eq!(point, Vec3::new(0.0, 3.0, 0.0), epsilon = 1e-5);
    assert_eq!(tip.depth(), 2);
}

#[test]
fn test_depth_bound_rejects_deeper_nesting() {
    let config = SceneConfig { max_depth: 2, ..SceneConfig::default() };
    let universe = universe_with(config);
    let world = universe.create_world("main", viewport()).expect("world");

    let level0 = universe.add_assembly(world, None, "level0").expect("level0");
    let level1 = universe.add_assembly(world, Some(&level0), "level1").expect("level1");
    let level2 = universe.add_assembly(world, Some(&level1), "level2").expect("level2");
    let result = universe.add_part(world, Some(&level2), "too_deep", "cube", None);

    assert_eq!(result.err(), Some(SceneError::DepthExceeded { depth: 3, max: 2 }));
    assert_eq!(universe.part_count(), 3);
    assert!(level2.children().is_empty());
}

#[test]
fn test_parent_must_be_registered_assembly() {
    let universe = universe();
    let world = universe.create_world("main", viewport()).expect("world");
    let leaf = universe.add_part(world, None, "leaf", "cube", None).expect("leaf");
    let stray = Part::assembly("stray");

    assert!(matches!(
        universe.add_part(world, Some(&leaf), "child", "cube", None),
        Err(SceneError::NotAnAssembly(_))
    ));
    assert!(matches!(
        universe.add_assembly(world, Some(&stray), "child"),
        Err(SceneError::ParentNotFound(_))
    ));
    assert_eq!(universe.part_count(), 1);
}

#[test]
fn test_hidden_assembly_hides_subtree_but_keeps_own_flags() {
    let universe = universe();
    let world = universe.create_world("main", viewport()).expect("world");
    let assembly = universe.add_assembly(world, None, "A").expect("assembly");
    let shown = universe.add_part(world, Some(&assembly), "shown", "cube", None).expect("shown");
    let hidden = universe.add_part(world, Some(&assembly), "hidden", "cube", None).expect("hidden");
    hidden.set_visible(false);

    assembly.set_visible(false);
    let mut backend = RecordingBackend::new();
    universe.render_frame(&mut backend);
    assert_eq!(backend.draw_call_count(), 0);

    assembly.set_visible(true);
    let mut backend = RecordingBackend::new();
    universe.render_frame(&mut backend);
    assert_eq!(backend.draw_order(), vec!["shown"]);
    assert!(shown.is_own_visible());
    assert!(!hidden.is_effectively_visible());
}

#[test]
fn test_assembly_color_reaches_children_and_materials() {
    let universe = universe();
    let world = universe.create_world("main", viewport()).expect("world");
    let material = universe
        .add_material(MaterialDesc::new("paint"))
        .expect("material");
    let assembly = universe.add_assembly(world, None, "A").expect("assembly");
    let part = universe
        .add_part(world, Some(&assembly), "P", "cube", Some(&material))
        .expect("part");

    let red = Color::rgb(1.0, 0.0, 0.0);
    assembly.set_color(red);
    assert_eq!(part.color(), red);
    assert_eq!(material.channels().diffuse, red);

    // late children pick up the tint on insertion
    let late = universe.add_part(world, Some(&assembly), "late", "cube", None).expect("late");
    assert_eq!(late.color(), red);
}

#[test]
fn test_change_parent_moves_subtree_under_new_assembly() {
    let universe = universe();
    let world = universe.create_world("main", viewport()).expect("world");
    let left = universe.add_assembly(world, None, "left").expect("left");
    let right = universe.add_assembly(world, None, "right").expect("right");
    let part = universe.add_part(world, Some(&left), "P", "cube", None).expect("part");
    left.set_coordinates(Vec3::new(-5.0, 0.0, 0.0));
    right.set_coordinates(Vec3::new(5.0, 0.0, 0.0));

    universe.change_parent(&part, Some(&right)).expect("reparent");
    assert!(left.children().is_empty());
    assert_eq!(right.children().len(), 1);
    assert_relative_eq!(part.composed_transform()[(0, 3)], 5.0);

    universe.change_parent(&part, None).expect("to root");
    assert!(part.parent().is_none());
    assert_eq!(part.depth(), 0);
    assert_relative_eq!(part.composed_transform()[(0, 3)], 0.0);

    assert!(matches!(
        universe.change_parent(&left, Some(&left)),
        Err(SceneError::CyclicParent(_))
    ));
}

#[test]
fn test_attached_part_overlays_target_transform() {
    let universe = universe();
    let world = universe.create_world("main", viewport()).expect("world");
    let carrier = universe.add_part(world, None, "carrier", "cube", None).expect("carrier");
    let rider = universe.add_part(world, None, "rider", "cube", None).expect("rider");
    carrier.set_coordinates(Vec3::new(0.0, 0.0, -3.0));
    rider.set_coordinates(Vec3::new(1.0, 0.0, 0.0));

    universe.attach(&EntityRef::from(rider.clone()), &carrier).expect("attach");
    let mut backend = RecordingBackend::new();
    universe.render_frame(&mut backend);

    let origin = transform_point(&rider.pure_world_matrix(), &Vec3::zeros());
    assert_relative_eq!(origin, Vec3::new(1.0, 0.0, -3.0), epsilon = 1e-6);
    assert!(matches!(
        universe.attach(&EntityRef::from(rider.clone()), &rider),
        Err(SceneError::AttachToSelf(_))
    ));
}

#[test]
fn test_attach_target_outside_every_world_still_moves_rider() {
    let universe = universe();
    let world = universe.create_world("main", viewport()).expect("world");
    let anchor = universe.add_part(world, None, "anchor", "cube", None).expect("anchor");
    let rider = universe.add_part(world, None, "rider", "cube", None).expect("rider");
    universe.attach(&EntityRef::from(rider.clone()), &anchor).expect("attach");

    let mut backend = RecordingBackend::new();
    universe.render_frame(&mut backend);
    universe
        .withdraw_from_world(&EntityRef::from(anchor.clone()), world)
        .expect("withdraw");
    anchor.set_coordinates(Vec3::new(5.0, 0.0, 0.0));

    universe.render_frame(&mut backend);
    universe.render_frame(&mut backend);
    let origin = transform_point(&rider.pure_world_matrix(), &Vec3::zeros());
    assert_relative_eq!(origin, Vec3::new(5.0, 0.0, 0.0), epsilon = 1e-6);
}

#[test]
fn test_attach_target_survives_removal_of_its_world() {
    let universe = universe();
    let doomed = universe.create_world("doomed", viewport()).expect("doomed");
    let kept = universe.create_world("kept", viewport()).expect("kept");
    let anchor = universe.add_part(doomed, None, "anchor", "cube", None).expect("anchor");
    let rider = universe.add_part(kept, None, "rider", "cube", None).expect("rider");
    universe.attach(&EntityRef::from(rider.clone()), &anchor).expect("attach");

    universe.remove_world(doomed).expect("remove world");
    anchor.set_coordinates(Vec3::new(0.0, -2.0, 0.0));
    let mut backend = RecordingBackend::new();
    universe.render_frame(&mut backend);

    let origin = transform_point(&rider.pure_world_matrix(), &Vec3::zeros());
    assert_relative_eq!(origin, Vec3::new(0.0, -2.0, 0.0), epsilon = 1e-6);
}
