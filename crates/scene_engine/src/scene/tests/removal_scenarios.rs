//! Composite removal: subtrees, orphaned materials, attach scrub, deferred release

use std::sync::Arc;

use super::{universe, viewport};
use crate::foundation::math::{Color, Vec3};
use crate::render::RecordingBackend;
use crate::scene::{EntityRef, FigureGeometry, LabelDesc, LampParams, MaterialDesc, SceneError};

#[test]
fn test_removing_assembly_takes_whole_subtree() {
    let universe = universe();
    let world_id = universe.create_world("main", viewport()).expect("world");
    let assembly = universe.add_assembly(world_id, None, "A").expect("assembly");
    let inner = universe.add_assembly(world_id, Some(&assembly), "inner").expect("inner");
    universe.add_part(world_id, Some(&assembly), "p1", "cube", None).expect("p1");
    universe.add_part(world_id, Some(&inner), "p2", "cube", None).expect("p2");
    let survivor = universe.add_part(world_id, None, "survivor", "cube", None).expect("survivor");

    assert_eq!(universe.remove_part(&assembly), Ok(4));
    assert_eq!(universe.part_count(), 1);
    assert!(assembly.children().is_empty());
    assert!(inner.parent().is_none());

    let world = universe.world(world_id).expect("world");
    assert_eq!(world.parts().raw_len(), 1);
    assert!(world.contains(&EntityRef::Part(survivor)));
}

#[test]
fn test_removing_child_unlinks_it_from_surviving_parent() {
    let universe = universe();
    let world = universe.create_world("main", viewport()).expect("world");
    let assembly = universe.add_assembly(world, None, "A").expect("assembly");
    let doomed = universe.add_part(world, Some(&assembly), "doomed", "cube", None).expect("doomed");
    let kept = universe.add_part(world, Some(&assembly), "kept", "cube", None).expect("kept");

    assert_eq!(universe.remove_part(&doomed), Ok(1));
    let children = assembly.children();
    assert_eq!(children.len(), 1);
    assert!(Arc::ptr_eq(&children[0], &kept));
}

#[test]
fn test_material_removed_with_its_last_part() {
    let universe = universe();
    let world = universe.create_world("main", viewport()).expect("world");
    let material = universe.add_material(MaterialDesc::new("paint")).expect("material");
    let part = universe.add_part(world, None, "only", "cube", Some(&material)).expect("part");

    universe.remove_part(&part).expect("remove");
    assert_eq!(universe.material_count(), 0);
    assert!(!universe.has_material(&material));
}

#[test]
fn test_shared_material_survives_while_still_referenced() {
    let universe = universe();
    let world = universe.create_world("main", viewport()).expect("world");
    let material = universe.add_material(MaterialDesc::new("paint")).expect("material");
    let first = universe.add_part(world, None, "first", "cube", Some(&material)).expect("first");
    let second = universe.add_part(world, None, "second", "cube", Some(&material)).expect("second");

    universe.remove_part(&first).expect("remove first");
    assert_eq!(universe.material_count(), 1);

    universe.remove_part(&second).expect("remove second");
    assert_eq!(universe.material_count(), 0);
}

#[test]
fn test_unused_material_is_not_collected() {
    let universe = universe();
    let world = universe.create_world("main", viewport()).expect("world");
    universe.add_material(MaterialDesc::new("spare")).expect("material");
    let part = universe.add_part(world, None, "bare", "cube", None).expect("part");

    universe.remove_part(&part).expect("remove");
    assert!(universe.find_material("spare").is_some());
}

#[test]
fn test_removed_part_lives_until_next_frame() {
    let universe = universe();
    let world = universe.create_world("main", viewport()).expect("world");
    let part = universe.add_part(world, None, "ghost", "cube", None).expect("part");
    let mut backend = RecordingBackend::new();
    universe.render_frame(&mut backend);

    let weak = Arc::downgrade(&part);
    universe.remove_part(&part).expect("remove");
    drop(part);
    assert!(weak.upgrade().is_some());
    assert_eq!(universe.pending_deletions(), 1);

    universe.render_frame(&mut backend);
    assert!(weak.upgrade().is_none());
    assert_eq!(universe.pending_deletions(), 0);
}

#[test]
fn test_removed_part_disappears_next_frame() {
    let universe = universe();
    let world = universe.create_world("main", viewport()).expect("world");
    let part = universe.add_part(world, None, "ghost", "cube", None).expect("part");
    let mut backend = RecordingBackend::new();
    universe.render_frame(&mut backend);
    assert_eq!(backend.draw_call_count(), 1);

    universe.remove_part(&part).expect("remove");
    let mut backend = RecordingBackend::new();
    universe.render_frame(&mut backend);
    assert_eq!(backend.draw_call_count(), 0);
}

#[test]
fn test_attach_links_into_removed_subtree_are_scrubbed() {
    let universe = universe();
    let world = universe.create_world("main", viewport()).expect("world");
    let ship = universe.add_assembly(world, None, "ship").expect("ship");
    let hull = universe.add_part(world, Some(&ship), "hull", "cube", None).expect("hull");
    let escort = universe.add_part(world, None, "escort", "cube", None).expect("escort");
    let trail = universe
        .add_figure(world, "trail", FigureGeometry::polyline(vec![Vec3::zeros(), Vec3::x()]))
        .expect("trail");
    let beacon = universe
        .add_lamp(world, "beacon", LampParams::point(Vec3::zeros(), Color::WHITE))
        .expect("beacon");
    let tag = universe
        .add_label(world, LabelDesc::new("tag", "ship", Vec3::zeros()))
        .expect("tag");

    universe.attach(&EntityRef::from(Arc::clone(&escort)), &hull).expect("escort");
    universe.attach(&EntityRef::from(Arc::clone(&trail)), &hull).expect("trail");
    universe.attach(&EntityRef::from(Arc::clone(&beacon)), &ship).expect("beacon");
    universe.attach(&EntityRef::from(Arc::clone(&tag)), &escort).expect("tag");

    universe.remove_part(&ship).expect("remove");
    assert!(escort.attached().is_none());
    assert!(trail.attached().is_none());
    assert!(beacon.attached().is_none());
    // target survived
    assert!(tag.attached().is_some());
}

#[test]
fn test_leaf_entities_leave_every_world() {
    let universe = universe();
    let first = universe.create_world("first", viewport()).expect("first");
    let second = universe.create_world("second", viewport()).expect("second");
    let lamp = universe
        .add_lamp(first, "sun", LampParams::directional(-Vec3::y(), Color::WHITE))
        .expect("lamp");
    let entity = EntityRef::from(lamp);
    universe.refer_to_world(&entity, second).expect("refer");

    assert_eq!(universe.remove(&entity), Ok(1));
    assert_eq!(universe.lamp_count(), 0);
    for id in [first, second] {
        assert!(!universe.world(id).expect("world").contains(&entity));
    }
    assert!(matches!(universe.remove(&entity), Err(SceneError::EntityNotFound(_))));
}

#[test]
fn test_removing_unknown_part_fails() {
    let universe = universe();
    let stray = crate::scene::Part::assembly("stray");
    assert!(matches!(universe.remove_part(&stray), Err(SceneError::EntityNotFound(_))));
}
