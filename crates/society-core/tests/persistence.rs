//! Checkpoint save/load through the filesystem

use std::fs;

use bevy_ecs::prelude::*;
use society_core::persistence::Checkpoint;
use society_core::{Agent, CheckpointError, ComponentStore, Relationship, SimConfig, SimError, Simulation};

fn config() -> SimConfig {
    let mut config = SimConfig::default();
    config.world.seed = 11;
    config.population.size = 12;
    config.population.farm_count = 3;
    config.population.workplace_count = 2;
    config
}

fn agent_count(sim: &mut Simulation) -> usize {
    sim.world_mut().entities_with::<With<Agent>>().len()
}

#[test]
fn test_checkpoint_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("round_trip.json");
    let mut sim = Simulation::new(config()).unwrap();
    sim.run(30).unwrap();
    sim.save_checkpoint(&path).unwrap();
    let agents = agent_count(&mut sim);
    let snapshot = sim.snapshot();

    let mut restored = Simulation::new(config()).unwrap();
    restored.load_checkpoint(&path).unwrap();
    assert_eq!(restored.tick(), 30);
    assert_eq!(agent_count(&mut restored), agents);
    assert_eq!(restored.snapshot().entities.len(), snapshot.entities.len());

    // A restored world keeps running
    restored.run(10).unwrap();
    assert_eq!(restored.tick(), 40);
}

#[test]
fn test_failed_load_leaves_world_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dangling.json");
    let mut sim = Simulation::new(config()).unwrap();
    sim.run(5).unwrap();
    sim.save_checkpoint(&path).unwrap();

    let mut checkpoint: Checkpoint = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    let agent = checkpoint
        .entities
        .iter_mut()
        .find_map(|e| e.agent.as_mut())
        .unwrap();
    agent.social.relationships.push((u64::MAX, Relationship::default()));
    fs::write(&path, serde_json::to_string(&checkpoint).unwrap()).unwrap();

    sim.run(5).unwrap();
    let before = sim.snapshot();
    let err = sim.load_checkpoint(&path).unwrap_err();
    assert!(matches!(
        err,
        SimError::Checkpoint(CheckpointError::DanglingReference { missing: u64::MAX, .. })
    ));
    assert_eq!(sim.tick(), 10);
    assert_eq!(sim.snapshot(), before);
}

#[test]
fn test_missing_file_is_io_error() {
    let mut sim = Simulation::new(config()).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let err = sim.load_checkpoint(dir.path().join("does_not_exist.json")).unwrap_err();
    assert!(matches!(err, SimError::Checkpoint(CheckpointError::Io { .. })));
    assert_eq!(sim.tick(), 0);
}
