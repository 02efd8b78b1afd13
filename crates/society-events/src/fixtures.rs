//! Sample data fixtures for testing.
//!
//! Ready-made records for other crates' tests. Enable the `test-fixtures`
//! feature to access these helpers.

use crate::{
    EntityKind, EntityView, InteractionEvent, InteractionEventKind, MetricsSample,
    PopulationMetrics, RenderSnapshot,
};

/// A short, plausible event stream: a birth, a trade, a theft and a death.
pub fn sample_events() -> Vec<InteractionEvent> {
    let mut events = vec![
        InteractionEvent::new(1, InteractionEventKind::Birth).with_actor(3).with_detail("generation 1"),
        InteractionEvent::new(4, InteractionEventKind::Trade)
            .with_actor(3)
            .with_target(5)
            .with_amount(12.0),
        InteractionEvent::new(9, InteractionEventKind::Theft)
            .with_actor(5)
            .with_target(3)
            .with_amount(10.0),
        InteractionEvent::new(20, InteractionEventKind::Death).with_actor(5).with_detail("starvation"),
    ];
    for (i, event) in events.iter_mut().enumerate() {
        event.event_id = crate::generate_event_id(i as u64 + 1);
    }
    events
}

/// A three-entity snapshot: one agent, one farm, one workplace.
pub fn sample_snapshot() -> RenderSnapshot {
    RenderSnapshot {
        tick: 10,
        width: 640.0,
        height: 480.0,
        entities: vec![
            EntityView {
                id: 1,
                kind: EntityKind::Agent,
                x: 100.0,
                y: 100.0,
                state: "working".into(),
                asset_key: "person_female".into(),
                alive: true,
            },
            EntityView {
                id: 2,
                kind: EntityKind::Farm,
                x: 200.0,
                y: 150.0,
                state: "sewed".into(),
                asset_key: "farm_sewed".into(),
                alive: true,
            },
            EntityView {
                id: 3,
                kind: EntityKind::Workplace,
                x: 300.0,
                y: 50.0,
                state: "operational".into(),
                asset_key: "work_operational".into(),
                alive: true,
            },
        ],
    }
}

/// A metrics sample for a small living population.
pub fn sample_metrics() -> MetricsSample {
    MetricsSample {
        tick: 10,
        population: PopulationMetrics {
            alive: 2,
            males: 1,
            females: 1,
            ..Default::default()
        },
        ..Default::default()
    }
}
