//! Integration tests for the shipped guard behaviors

use statecraft::behavior::Behavior;
use statecraft::behaviors::guard::{LOOKOUT_LANE, MOVEMENT_LANE};
use statecraft::behaviors::{Investigate, Lookout, Patrol, GUARD, NOISE};
use statecraft::core::{EntityId, SchedulerConfig};
use statecraft::message::Message;
use statecraft::router::RouterStats;
use statecraft::simulation::Simulation;

fn spawn_patrol(sim: &mut Simulation, walk_time: f64, glance_time: f64) -> EntityId {
    let id = sim.spawn(GUARD, "guard");
    sim.world.manager_mut(id).unwrap().request_push(
        MOVEMENT_LANE,
        Behavior::new(Patrol::new(walk_time, glance_time)),
        true,
    );
    id
}

fn movement(sim: &Simulation, id: EntityId) -> (&'static str, u32, Option<u32>) {
    let top = sim.world.manager(id).unwrap().top(MOVEMENT_LANE).unwrap();
    (top.name(), top.state(), top.substate())
}

#[test]
fn test_patrol_walks_then_looks_both_ways() {
    let mut sim = Simulation::new(SchedulerConfig::default());
    let guard = spawn_patrol(&mut sim, 1.0, 0.5);

    sim.run_frame();
    assert_eq!(movement(&sim, guard), ("Patrol", Patrol::WALK, None));

    sim.step(1.0);
    assert_eq!(movement(&sim, guard), ("Patrol", Patrol::LOOK, Some(Patrol::LEFT)));

    sim.step(0.5);
    assert_eq!(movement(&sim, guard), ("Patrol", Patrol::LOOK, Some(Patrol::RIGHT)));

    sim.step(0.5);
    assert_eq!(movement(&sim, guard), ("Patrol", Patrol::WALK, None));
}

#[test]
fn test_noise_interrupts_patrol_until_search_is_done() {
    let mut sim = Simulation::new(SchedulerConfig::default());
    let guard = spawn_patrol(&mut sim, 10.0, 0.5);
    let sentry = sim.spawn(GUARD, "sentry");
    sim.run_frame();

    sim.broadcast(Message::new(NOISE, sentry, sentry), Some(GUARD));
    sim.step(0.25);
    assert_eq!(movement(&sim, guard), ("Investigate", Investigate::APPROACH, None));
    assert_eq!(sim.world.manager(guard).unwrap().depth(MOVEMENT_LANE), 3);

    // Patrol's walk timer went with the push
    sim.run_frames(4, 0.25);
    assert_eq!(movement(&sim, guard), ("Investigate", Investigate::SEARCH, None));

    // A second noise while searching is swallowed
    sim.broadcast(Message::new(NOISE, sentry, sentry), Some(GUARD));
    assert!(!sim.world.manager(guard).unwrap().has_pending_change(MOVEMENT_LANE));

    // Three scans a quarter second apart, then back to patrolling
    sim.run_frames(3, 0.25);
    assert_eq!(movement(&sim, guard), ("Patrol", Patrol::WALK, None));
    assert_eq!(sim.world.manager(guard).unwrap().depth(MOVEMENT_LANE), 2);
    assert!(sim.router.pending().iter().all(|msg| msg.name() != statecraft::behaviors::SCAN));
}

#[test]
fn test_lookout_lane_leaves_patrol_running() {
    let mut sim = Simulation::new(SchedulerConfig::default());
    let guard = spawn_patrol(&mut sim, 1.0, 0.5);
    sim.run_frame();
    sim.world.manager_mut(guard).unwrap().request_push(
        LOOKOUT_LANE,
        Behavior::new(Lookout::new(3, 0.0, 0.5)),
        true,
    );

    sim.step(0.5);
    assert_eq!(movement(&sim, guard), ("Patrol", Patrol::WALK, None));
    sim.step(0.5);
    assert_eq!(movement(&sim, guard), ("Patrol", Patrol::LOOK, Some(Patrol::LEFT)));
}

fn run_squad(seed: u64) -> RouterStats {
    let mut sim = Simulation::new(SchedulerConfig::default());
    for i in 0..6u64 {
        let id = spawn_patrol(&mut sim, 2.0, 0.4);
        sim.world.manager_mut(id).unwrap().request_push(
            LOOKOUT_LANE,
            Behavior::new(Lookout::new(seed.wrapping_add(i), 0.3, 0.5)),
            true,
        );
    }
    sim.run_frames(240, 1.0 / 30.0);
    sim.router.stats()
}

#[test]
fn test_seeded_squad_is_deterministic() {
    let first = run_squad(42);
    let second = run_squad(42);

    assert_eq!(first, second);
    assert!(first.slices_delivered > 0);
    assert!(first.delivered > 0);
}

#[test]
fn test_removed_guard_stops_being_scheduled() {
    let mut sim = Simulation::new(SchedulerConfig::default());
    let guard = spawn_patrol(&mut sim, 1.0, 0.5);
    sim.world.manager_mut(guard).unwrap().request_push(
        LOOKOUT_LANE,
        Behavior::new(Lookout::new(1, 0.0, 0.5)),
        true,
    );
    sim.run_frame();
    assert!(sim.router.slices().is_enabled(guard));
    assert!(!sim.router.pending().is_empty());

    sim.world.mark_for_deletion(guard);
    let report = sim.step(0.5);

    assert_eq!(report.entities_removed, 1);
    assert!(sim.router.slices().is_empty());
    assert!(sim.router.pending().is_empty());
}
