//! End-to-end lifecycle tests for the resource cache over real asset types.

use engine_core::assets::{Material, Mesh, Texture};
use engine_core::cache::CacheState;
use engine_core::config::ReclaimPolicy;
use engine_core::event::CacheEvent;
use engine_core::handle::Handle;
use engine_core::loader::LoadError;
use engine_core::resource::ResourceState;
use engine_tests::{cache_path, init_tracing, loader_with, running_cache, scene_loader, texture};

#[test]
fn second_create_reuses_entity_and_queues_nothing() {
    init_tracing();
    let loader = loader_with(&[("stone.btx", texture(8, 4))]);
    let cache = running_cache(&loader, ReclaimPolicy::SameTick);

    let h1: Handle<Texture> = cache.create("stone.btx");
    assert_eq!(cache.stats().pending_requests, 1);
    let h2: Handle<Texture> = cache.create("stone.btx");
    assert_eq!(cache.stats().pending_requests, 1);

    assert!(Handle::ptr_eq(&h1, &h2));
    assert_eq!(h1.serial(), h2.serial());
    assert_eq!(h2.ref_count(), 2);
}

#[test]
fn two_creates_two_drops_one_update() {
    init_tracing();
    let loader = loader_with(&[("x.btx", texture(4, 1))]);
    let cache = running_cache(&loader, ReclaimPolicy::SameTick);

    let h1: Handle<Texture> = cache.create("x.btx");
    let h2: Handle<Texture> = cache.create("x.btx");
    drop(h1);
    drop(h2);
    cache.update();

    assert!(loader.attempts(&cache_path("x.btx")) <= 1);
    assert!(cache.find_by_name("x.btx").is_none());
}

#[test]
fn held_entities_survive_every_flush() {
    init_tracing();
    let loader = loader_with(&[("a.btx", texture(4, 1)), ("b.btx", texture(4, 1))]);
    let cache = running_cache(&loader, ReclaimPolicy::SameTick);

    let a: Handle<Texture> = cache.create("a.btx");
    let b: Handle<Texture> = cache.create("b.btx");
    drop(b);
    for _ in 0..5 {
        cache.update();
        assert!(cache.find_by_id(a.id()).is_some());
    }
    assert!(cache.find_by_name("b.btx").is_none());
    assert!(a.is_ready());
}

#[test]
fn dropped_entity_is_reclaimed_by_the_next_update() {
    init_tracing();
    let loader = loader_with(&[("x.btx", texture(4, 1))]);
    let cache = running_cache(&loader, ReclaimPolicy::SameTick);

    let h: Handle<Texture> = cache.create("x.btx");
    cache.update();
    let id = h.id();
    drop(h);

    cache.update();
    assert!(cache.find_by_id(id).is_none());
    let destroyed: Vec<_> = cache
        .drain_events()
        .into_iter()
        .filter(|e| matches!(e, CacheEvent::Destroyed { .. }))
        .collect();
    assert_eq!(destroyed, vec![CacheEvent::Destroyed { id, kind: "texture" }]);
}

#[test]
fn rescue_returns_the_same_instance() {
    init_tracing();
    let loader = loader_with(&[("x.btx", texture(4, 1))]);
    let cache = running_cache(&loader, ReclaimPolicy::SameTick);

    let first: Handle<Texture> = cache.create("x.btx");
    cache.update();
    let serial = first.serial();
    drop(first);

    let again: Handle<Texture> = cache.create("x.btx");
    assert_eq!(again.serial(), serial);
    cache.update();

    assert!(again.is_ready());
    assert_eq!(cache.stats().destroyed, 0);
    assert_eq!(loader.attempts(&cache_path("x.btx")), 1);
}

#[test]
fn round_trip_constructs_a_new_instance() {
    init_tracing();
    let loader = loader_with(&[("x.btx", texture(4, 1))]);
    let cache = running_cache(&loader, ReclaimPolicy::SameTick);

    let first: Handle<Texture> = cache.create("x.btx");
    cache.update();
    let serial = first.serial();
    drop(first);
    cache.update();

    let second: Handle<Texture> = cache.create("x.btx");
    assert_ne!(second.serial(), serial);
    assert!(second.is_pending());
    cache.update();
    assert!(second.is_ready());
}

#[test]
fn scene_loads_in_one_flush_and_shares_textures() {
    init_tracing();
    let loader = scene_loader();
    let cache = running_cache(&loader, ReclaimPolicy::SameTick);

    let level: Handle<Mesh> = cache.create("level.bmh");
    cache.update();

    let mesh = level.get().expect("mesh loaded");
    assert_eq!(mesh.sub_meshes.len(), 2);
    for sub in &mesh.sub_meshes {
        let material = sub.material.get().expect("material loaded");
        assert!(material.textures_ready());
    }

    // level, two materials, three textures; detail.btx loaded once.
    assert_eq!(cache.len(), 6);
    assert_eq!(loader.attempts(&cache_path("detail.btx")), 1);
    assert_eq!(cache.find_by_name("detail.btx").unwrap().ref_count, 2);
}

#[test]
fn releasing_a_scene_unwinds_one_level_per_flush() {
    init_tracing();
    let loader = scene_loader();
    let cache = running_cache(&loader, ReclaimPolicy::SameTick);

    let level: Handle<Mesh> = cache.create("level.bmh");
    cache.update();
    drop(level);

    cache.update();
    assert!(cache.find_by_name("level.bmh").is_none());
    assert!(cache.find_by_name("rock.bmt").is_some());

    cache.update();
    assert!(cache.find_by_name("rock.bmt").is_none());
    assert!(cache.find_by_name("detail.btx").is_some());

    cache.update();
    assert!(cache.is_empty());
    assert_eq!(cache.allocation_stats().live_allocations, 0);
    assert_eq!(cache.allocation_stats().live_bytes, 0);
}

#[test]
fn independently_held_dependency_outlives_its_parent() {
    init_tracing();
    let loader = scene_loader();
    let cache = running_cache(&loader, ReclaimPolicy::SameTick);

    let rock: Handle<Material> = cache.create("rock.bmt");
    cache.update();
    let detail: Handle<Texture> = cache.create("detail.btx");
    assert!(detail.is_ready());
    drop(rock);

    for _ in 0..3 {
        cache.update();
    }
    assert!(cache.find_by_name("rock.bmt").is_none());
    assert!(cache.find_by_name("rock.btx").is_none());
    assert_eq!(cache.find_by_id(detail.id()).unwrap().ref_count, 1);
}

#[test]
fn missing_texture_does_not_fail_its_material() {
    init_tracing();
    let loader = loader_with(&[
        ("broken.bmt", engine_tests::material(&["present.btx", "absent.btx"])),
        ("present.btx", texture(4, 1)),
    ]);
    let cache = running_cache(&loader, ReclaimPolicy::SameTick);

    let material: Handle<Material> = cache.create("broken.bmt");
    cache.update();

    assert!(material.is_ready());
    let m = material.get().unwrap();
    assert!(m.texture(0).unwrap().is_ready());
    assert_eq!(m.texture(1).unwrap().state(), ResourceState::Invalid);
    assert!(!m.textures_ready());

    let failures: Vec<_> = cache
        .drain_events()
        .into_iter()
        .filter_map(|e| match e {
            CacheEvent::Failed { error, .. } => Some(error),
            _ => None,
        })
        .collect();
    assert_eq!(
        failures,
        vec![LoadError::NotFound(cache_path("absent.btx"))]
    );
}

#[test]
fn corrupt_payload_is_invalid_and_never_retried() {
    init_tracing();
    let mut data = texture(8, 4).to_vec();
    data.truncate(20);
    let loader = loader_with(&[("bad.btx", bytes::Bytes::from(data))]);
    let cache = running_cache(&loader, ReclaimPolicy::SameTick);

    let bad: Handle<Texture> = cache.create("bad.btx");
    cache.update();
    assert_eq!(bad.state(), ResourceState::Invalid);
    assert!(bad.get().is_none());

    cache.update();
    cache.update();
    assert_eq!(loader.attempts(&cache_path("bad.btx")), 1);
    assert_eq!(cache.stats().loads_failed, 1);
}

#[test]
fn next_tick_policy_rescues_across_one_tick() {
    init_tracing();
    let loader = loader_with(&[("x.btx", texture(4, 1))]);
    let cache = running_cache(&loader, ReclaimPolicy::NextTick);

    let h: Handle<Texture> = cache.create("x.btx");
    cache.update();
    let serial = h.serial();
    drop(h);

    // Found at zero, not yet destroyed.
    cache.update();
    assert!(cache.find_by_name("x.btx").is_some());

    let rescued: Handle<Texture> = cache.create("x.btx");
    cache.update();
    cache.update();
    assert_eq!(rescued.serial(), serial);
    assert!(rescued.is_ready());
    assert_eq!(cache.stats().destroyed, 0);
}

#[test]
fn same_tick_policy_has_no_cross_tick_grace() {
    init_tracing();
    let loader = loader_with(&[("x.btx", texture(4, 1))]);
    let cache = running_cache(&loader, ReclaimPolicy::SameTick);

    let h: Handle<Texture> = cache.create("x.btx");
    cache.update();
    let serial = h.serial();
    drop(h);
    cache.update();

    let fresh: Handle<Texture> = cache.create("x.btx");
    assert_ne!(fresh.serial(), serial);
}

#[test]
fn shutdown_is_clean_once_everything_is_released() {
    init_tracing();
    let loader = scene_loader();
    let mut cache = running_cache(&loader, ReclaimPolicy::SameTick);

    let level: Handle<Mesh> = cache.create("level.bmh");
    cache.update();
    drop(level);

    let report = cache.shutdown();
    assert!(report.is_clean());
    assert_eq!(cache.state(), CacheState::ShutDown);
    assert_eq!(cache.allocation_stats().live_allocations, 0);
}

#[test]
fn shutdown_reports_what_is_still_held() {
    init_tracing();
    let loader = scene_loader();
    let mut cache = running_cache(&loader, ReclaimPolicy::NextTick);

    let rock: Handle<Material> = cache.create("rock.bmt");
    let report = cache.shutdown();

    let mut leaked: Vec<_> = report.leaked.iter().map(|l| l.label()).collect();
    leaked.sort();
    assert_eq!(leaked, vec!["detail.btx", "rock.bmt", "rock.btx"]);
    assert!(rock.is_ready());
}

#[test]
fn dependency_named_as_the_wrong_kind_only_fails_its_own_load() {
    init_tracing();
    // The material names the mesh that references it as one of its textures.
    let loader = loader_with(&[
        ("level.bmh", engine_tests::mesh(&["rock.bmt"])),
        ("rock.bmt", engine_tests::material(&["level.bmh"])),
        ("stone.btx", texture(4, 1)),
    ]);
    let cache = running_cache(&loader, ReclaimPolicy::SameTick);

    let stone: Handle<Texture> = cache.create("stone.btx");
    let level: Handle<Mesh> = cache.create("level.bmh");
    cache.update();

    assert!(level.is_ready());
    let rock = &level.get().unwrap().sub_meshes[0].material;
    assert_eq!(rock.state(), ResourceState::Invalid);
    assert!(stone.is_ready());
    assert!(!cache.has_pending_requests());

    let failures: Vec<_> = cache
        .drain_events()
        .into_iter()
        .filter_map(|e| match e {
            CacheEvent::Failed { error, .. } => Some(error),
            _ => None,
        })
        .collect();
    assert!(matches!(
        failures.as_slice(),
        [LoadError::Malformed(reason)] if reason.contains("cached as a mesh")
    ));
}
