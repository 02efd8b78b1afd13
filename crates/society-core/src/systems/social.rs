//! Social System
//!
//! Actions report what happened between agents as `SocialEvent`s; once per
//! tick the queue is drained and turned into trust/affinity changes on both
//! sides, memories, victim effects and gossip. The same module owns
//! relationship decay, status drift and grudge-driven revenge.

use bevy_ecs::prelude::*;
use rand::Rng;
use society_events::{InteractionEvent, InteractionEventKind, InteractionKind};

use crate::actions::{is_alive, now, position, remember};
use crate::brain::{Brain, MemoryEntry, MemoryKind};
use crate::components::{HistoryEntry, Relationship, Social, Tag, Vitals, Workplace};
use crate::events::logger::{entity_id, record_event};
use crate::spatial::query_by_tag;
use crate::store::ComponentStore;

pub mod social_system_constants {
    /// Idle time after which a relationship starts to fade
    pub const DECAY_AFTER: f32 = 100.0;
    pub const DECAY_FACTOR: f32 = 0.99;
    pub const PRUNE_BELOW: f32 = 0.05;
    pub const PRUNE_MAX_INTERACTIONS: u32 = 3;
    pub const STATUS_UPDATE_CHANCE: f64 = 0.01;
    pub const GOSSIP_RADIUS: f32 = 100.0;
    pub const GOSSIP_FACTOR: f32 = 0.4;
    pub const GRUDGE_THRESHOLD: f32 = -0.7;
    pub const REVENGE_PROBABILITY: f64 = 0.4;
    pub const REVENGE_RADIUS: f32 = 50.0;
    pub const BASE_IMPORTANCE: f32 = 0.5;
    pub const NEGATIVE_IMPORTANCE_BOOST: f32 = 0.3;
    pub const SUCCESS_IMPORTANCE: f32 = 0.2;
    pub const FAILURE_IMPORTANCE: f32 = -0.1;
    pub const MATE_IMPORTANCE: f32 = 0.3;
    pub const GIFT_IMPORTANCE: f32 = 0.2;
    pub const WITNESS_IMPORTANCE: f32 = 0.4;
    pub const VICTIM_MEMORY: f32 = 0.7;
    pub const ATTACK_MEMORY: f32 = 0.8;
    pub const CROP_THEFT_MEMORY: f32 = 0.8;
    pub const THEFT_MOOD_PER_UNIT: f32 = 0.05;
    pub const MAX_THEFT_MOOD: f32 = 0.3;
    pub const SCAM_MOOD_PER_SEVERITY: f32 = 0.8;
    pub const MAX_SCAM_MOOD: f32 = 0.4;
    pub const VIOLENCE_ENERGY_PER_SEVERITY: f32 = 20.0;
    pub const MAX_VIOLENCE_MOOD: f32 = 0.5;
    pub const MIN_ENERGY_AFTER_ATTACK: f32 = 1.0;
}

use social_system_constants::*;

/// Something that happened between agents, waiting to be applied
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SocialEvent {
    Interaction {
        actor: Entity,
        target: Entity,
        kind: InteractionKind,
        successful: bool,
    },
    Theft {
        thief: Entity,
        victim: Entity,
        amount: f32,
    },
    CropTheft {
        thief: Entity,
        owner: Entity,
        farm: Entity,
    },
    /// `victim` handed over goods worth `promised` and received `actual`
    Scam {
        scammer: Entity,
        victim: Entity,
        promised: f32,
        actual: f32,
    },
    Violence {
        attacker: Entity,
        victim: Entity,
        severity: f32,
    },
    /// `theft` is false for sabotage
    Misconduct {
        employee: Entity,
        workplace: Entity,
        theft: bool,
        damage: f32,
    },
}

/// Resource: events reported during the current tick
#[derive(Resource, Debug, Default)]
pub struct SocialEvents {
    events: Vec<SocialEvent>,
}

impl SocialEvents {
    pub fn push(&mut self, event: SocialEvent) {
        self.events.push(event);
    }

    pub fn drain(&mut self) -> Vec<SocialEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Queues an event for the next `process_social_events` pass.
pub fn report(world: &mut World, event: SocialEvent) {
    if let Some(mut events) = world.get_resource_mut::<SocialEvents>() {
        events.push(event);
    }
}

fn traits(world: &World, agent: Entity) -> (f32, f32) {
    world
        .get::<Social>(agent)
        .map_or((0.5, 0.5), |s| (s.reciprocity, s.agreeableness))
}

fn file_memory(world: &mut World, agent: Entity, about: Entity, kind: InteractionKind, successful: bool, importance: f32) {
    let importance = importance.clamp(0.0, 1.0);
    let entry = MemoryEntry::new(MemoryKind::Social(kind), importance, now(world)).about(about);
    if let Some(mut brain) = world.get_mut::<Brain>(agent) {
        brain.record_social(about, kind, successful, importance);
        brain.remember(entry);
    }
}

/// Applies a cooperative interaction to both parties. Each side's trust
/// change scales with its own reciprocity, affinity with its agreeableness.
pub fn register_interaction(world: &mut World, actor: Entity, target: Entity, kind: InteractionKind, successful: bool) {
    if actor == target {
        return;
    }
    let (trust_mod, affinity_mod) = kind.modifiers();
    let sign = if successful { 1.0 } else { -1.0 };
    let time = now(world);
    let mut importance = BASE_IMPORTANCE
        + if successful {
            SUCCESS_IMPORTANCE
        } else {
            FAILURE_IMPORTANCE
        };
    importance += match kind {
        InteractionKind::Mate => MATE_IMPORTANCE,
        InteractionKind::Gift => GIFT_IMPORTANCE,
        _ => 0.0,
    };

    for (me, other) in [(actor, target), (target, actor)] {
        let (reciprocity, agreeableness) = traits(world, me);
        let entry = HistoryEntry {
            kind,
            witnessed: false,
            successful,
            time,
        };
        if let Some(mut social) = world.get_mut::<Social>(me) {
            social.record_interaction(
                other,
                entry,
                trust_mod * sign * (0.5 + reciprocity),
                affinity_mod * sign * (0.5 + agreeableness),
            );
        }
        file_memory(world, me, other, kind, successful, importance);
    }
}

/// Applies a wrong done by `wrongdoer` to `victim`: the victim loses trust
/// in proportion to its agreeableness, and every agent within gossip range
/// of the victim picks up a weaker negative impression.
pub fn register_negative_interaction(
    world: &mut World,
    wrongdoer: Entity,
    victim: Entity,
    kind: InteractionKind,
    severity: f32,
) {
    if wrongdoer == victim {
        return;
    }
    let (trust_mod, affinity_mod) = kind.modifiers();
    let scale = 0.5 + 0.5 * severity.clamp(0.0, 1.0);
    let time = now(world);

    let (_, agreeableness) = traits(world, victim);
    let sensitivity = 1.0 + agreeableness;
    if let Some(mut social) = world.get_mut::<Social>(victim) {
        social.record_interaction(
            wrongdoer,
            HistoryEntry {
                kind,
                witnessed: false,
                successful: false,
                time,
            },
            -trust_mod * scale * sensitivity,
            -affinity_mod * scale * sensitivity,
        );
    }
    file_memory(
        world,
        victim,
        wrongdoer,
        kind,
        false,
        BASE_IMPORTANCE + NEGATIVE_IMPORTANCE_BOOST,
    );

    if let Some(mut social) = world.get_mut::<Social>(wrongdoer) {
        social.record_interaction(
            victim,
            HistoryEntry {
                kind,
                witnessed: false,
                successful: true,
                time,
            },
            0.0,
            0.0,
        );
    }

    spread_gossip(world, wrongdoer, victim, kind, scale);
}

fn spread_gossip(world: &mut World, wrongdoer: Entity, victim: Entity, kind: InteractionKind, scale: f32) {
    let Some((x, y)) = position(world, victim) else {
        return;
    };
    let (trust_mod, affinity_mod) = kind.modifiers();
    let time = now(world);
    let witnesses: Vec<Entity> = query_by_tag(world, x, y, GOSSIP_RADIUS, Tag::Agent)
        .into_iter()
        .map(|(e, _)| e)
        .filter(|e| *e != wrongdoer && *e != victim && is_alive(world, *e))
        .collect();

    for witness in witnesses {
        if let Some(mut social) = world.get_mut::<Social>(witness) {
            social.record_interaction(
                wrongdoer,
                HistoryEntry {
                    kind,
                    witnessed: true,
                    successful: false,
                    time,
                },
                -trust_mod * scale * GOSSIP_FACTOR,
                -affinity_mod * scale * GOSSIP_FACTOR,
            );
        }
        remember(
            world,
            witness,
            MemoryEntry::new(MemoryKind::Witnessed(kind), WITNESS_IMPORTANCE, time).about(wrongdoer),
        );
    }
}

fn hurt_mood(world: &mut World, victim: Entity, amount: f32) {
    if let Some(mut vitals) = world.get_mut::<Vitals>(victim) {
        vitals.shift_mood(-amount);
    }
}

fn victim_memory(world: &mut World, victim: Entity, culprit: Entity, kind: MemoryKind, importance: f32) {
    let entry = MemoryEntry::new(kind, importance, now(world)).about(culprit);
    remember(world, victim, entry);
}

fn log(world: &mut World, kind: InteractionEventKind, actor: Entity, target: Entity, amount: f32) {
    record_event(world, |tick| {
        InteractionEvent::new(tick, kind)
            .with_actor(entity_id(actor))
            .with_target(entity_id(target))
            .with_amount(amount)
    });
}

/// Drains the event queue and applies every event. Returns how many were
/// processed.
pub fn process_social_events(world: &mut World) -> usize {
    let events = match world.get_resource_mut::<SocialEvents>() {
        Some(mut queue) => queue.drain(),
        None => return 0,
    };
    let count = events.len();

    for event in events {
        match event {
            SocialEvent::Interaction {
                actor,
                target,
                kind,
                successful,
            } => {
                if kind.is_antisocial() {
                    register_negative_interaction(world, actor, target, kind, 1.0);
                } else {
                    register_interaction(world, actor, target, kind, successful);
                }
            }
            SocialEvent::Theft { thief, victim, amount } => {
                register_negative_interaction(world, thief, victim, InteractionKind::Theft, 1.0);
                hurt_mood(world, victim, (amount * THEFT_MOOD_PER_UNIT).min(MAX_THEFT_MOOD));
                victim_memory(world, victim, thief, MemoryKind::WasStolenFrom, VICTIM_MEMORY);
                log(world, InteractionEventKind::Theft, thief, victim, amount);
            }
            SocialEvent::CropTheft { thief, owner, farm } => {
                register_negative_interaction(world, thief, owner, InteractionKind::Theft, 1.0);
                let mut entry = MemoryEntry::new(MemoryKind::WasStolenFrom, CROP_THEFT_MEMORY, now(world)).about(thief);
                if let Some((x, y)) = position(world, farm) {
                    entry = entry.at(x, y);
                }
                remember(world, owner, entry);
                log(world, InteractionEventKind::CropTheft, thief, owner, 0.0);
            }
            SocialEvent::Scam {
                scammer,
                victim,
                promised,
                actual,
            } => {
                let severity = if promised > 0.0 {
                    ((promised - actual) / promised).clamp(0.0, 1.0)
                } else {
                    1.0
                };
                register_negative_interaction(world, scammer, victim, InteractionKind::ScamTrade, severity);
                hurt_mood(world, victim, (severity * SCAM_MOOD_PER_SEVERITY).min(MAX_SCAM_MOOD));
                victim_memory(world, victim, scammer, MemoryKind::WasScammed, VICTIM_MEMORY);
                log(world, InteractionEventKind::Scam, scammer, victim, promised - actual);
            }
            SocialEvent::Violence {
                attacker,
                victim,
                severity,
            } => {
                register_negative_interaction(world, attacker, victim, InteractionKind::Violence, severity);
                if let Some(mut vitals) = world.get_mut::<Vitals>(victim) {
                    vitals.energy = (vitals.energy - VIOLENCE_ENERGY_PER_SEVERITY * severity)
                        .max(MIN_ENERGY_AFTER_ATTACK);
                    vitals.shift_mood(-severity.min(MAX_VIOLENCE_MOOD));
                }
                victim_memory(world, victim, attacker, MemoryKind::WasAttacked, ATTACK_MEMORY);
                log(world, InteractionEventKind::Violence, attacker, victim, severity);
            }
            SocialEvent::Misconduct {
                employee,
                workplace,
                theft,
                damage,
            } => apply_misconduct(world, employee, workplace, theft, damage),
        }
    }
    count
}

/// Co-workers always count the employee's misconduct as sabotage; investors
/// see theft from the till as fraud.
fn apply_misconduct(world: &mut World, employee: Entity, workplace: Entity, theft: bool, damage: f32) {
    let Some(place) = world.get::<Workplace>(workplace) else {
        return;
    };
    let coworkers: Vec<Entity> = place.workers.iter().copied().filter(|w| *w != employee).collect();
    let investors: Vec<Entity> = place
        .investors
        .iter()
        .map(|s| s.investor)
        .filter(|i| *i != employee)
        .collect();
    let severity = (damage / 20.0).clamp(0.0, 1.0);

    for coworker in coworkers {
        register_negative_interaction(world, employee, coworker, InteractionKind::WorkSabotage, severity);
    }
    let investor_kind = if theft {
        InteractionKind::InvestmentFraud
    } else {
        InteractionKind::WorkSabotage
    };
    for investor in investors {
        register_negative_interaction(world, employee, investor, investor_kind, severity);
    }
    record_event(world, |tick| {
        InteractionEvent::new(tick, InteractionEventKind::Misconduct)
            .with_actor(entity_id(employee))
            .with_target(entity_id(workplace))
            .with_amount(damage)
            .with_detail(if theft { "theft" } else { "sabotage" })
    });
}

/// Fades relationships nobody has touched for a while and prunes the ones
/// that have faded to nothing. Returns the number pruned.
pub fn decay_relationships(world: &mut World) -> usize {
    let time = now(world);
    let mut pruned = 0;
    for agent in world.entities_with::<With<Social>>() {
        let Some(mut social) = world.get_mut::<Social>(agent) else {
            continue;
        };
        let before = social.relationships.len();
        social.relationships.retain(|_, rel| {
            if time - rel.last_interaction_time <= DECAY_AFTER {
                return true;
            }
            rel.trust *= DECAY_FACTOR;
            rel.affinity *= DECAY_FACTOR;
            rel.trust.abs() >= PRUNE_BELOW
                || rel.affinity.abs() >= PRUNE_BELOW
                || rel.interaction_count >= PRUNE_MAX_INTERACTIONS
        });
        pruned += before - social.relationships.len();
    }
    pruned
}

/// Occasionally moves each agent's status toward the quality and breadth
/// of its relationships.
pub fn update_social_status<R: Rng>(world: &mut World, rng: &mut R) {
    for agent in world.entities_with::<With<Social>>() {
        if !rng.gen_bool(STATUS_UPDATE_CHANCE) {
            continue;
        }
        if let Some(mut social) = world.get_mut::<Social>(agent) {
            if let Some(change) = social.status_change() {
                social.update_status(change);
            }
        }
    }
}

/// Revenge mirrors the most recent wrong suffered first-hand. Without one
/// on record the avenger picks theft or violence at random.
pub fn select_revenge_action<R: Rng>(relationship: &Relationship, rng: &mut R) -> InteractionKind {
    match relationship.last_wrong() {
        Some(InteractionKind::Violence) => InteractionKind::Violence,
        Some(InteractionKind::ScamTrade) => InteractionKind::ScamTrade,
        Some(_) => InteractionKind::Theft,
        None if rng.gen_bool(0.5) => InteractionKind::Theft,
        None => InteractionKind::Violence,
    }
}

/// Looks for a nearby agent this agent holds a grudge against. Each such
/// agent is one opportunity, taken with a fixed probability.
pub fn check_for_revenge<R: Rng>(world: &World, agent: Entity, rng: &mut R) -> Option<(Entity, InteractionKind)> {
    let social = world.get::<Social>(agent)?;
    if social.relationships.values().all(|r| r.trust >= GRUDGE_THRESHOLD) {
        return None;
    }
    for (target, _) in crate::actions::nearby(world, agent, REVENGE_RADIUS, Tag::Agent) {
        let Some(rel) = social.relationship(target) else {
            continue;
        };
        if rel.trust < GRUDGE_THRESHOLD && rng.gen_bool(REVENGE_PROBABILITY) {
            return Some((target, select_revenge_action(rel, rng)));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::test_support::*;
    use crate::components::SimClock;
    use crate::genetics::Gender;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn trust(world: &World, from: Entity, to: Entity) -> f32 {
        world
            .get::<Social>(from)
            .and_then(|s| s.relationship(to))
            .map_or(0.0, |r| r.trust)
    }

    #[test]
    fn test_gift_raises_trust_both_ways() {
        let mut world = world();
        let a = agent(&mut world, (100.0, 100.0), Gender::Male);
        let b = agent(&mut world, (110.0, 100.0), Gender::Female);
        register_interaction(&mut world, a, b, InteractionKind::Gift, true);

        // 0.2 * (0.5 + 0.5), within the per-call cap
        assert!((trust(&world, a, b) - 0.2).abs() < 1e-6);
        assert!((trust(&world, b, a) - 0.2).abs() < 1e-6);
        let brain = world.get::<Brain>(b).unwrap();
        assert_eq!(brain.social.about(a).len(), 1);
        assert!(brain.episodic.has(MemoryKind::Social(InteractionKind::Gift), 0.8));
    }

    #[test]
    fn test_theft_hurts_victim_and_spreads_gossip() {
        let mut world = world();
        let thief = agent(&mut world, (100.0, 100.0), Gender::Male);
        let victim = agent(&mut world, (110.0, 100.0), Gender::Female);
        let witness = agent(&mut world, (150.0, 120.0), Gender::Male);
        let far = agent(&mut world, (900.0, 600.0), Gender::Female);

        report(
            &mut world,
            SocialEvent::Theft {
                thief,
                victim,
                amount: 10.0,
            },
        );
        assert_eq!(process_social_events(&mut world), 1);
        assert!(world.resource::<SocialEvents>().is_empty());

        assert!(trust(&world, victim, thief) < 0.0);
        assert!(trust(&world, witness, thief) < 0.0);
        assert!(trust(&world, witness, thief) > trust(&world, victim, thief));
        assert_eq!(trust(&world, far, thief), 0.0);
        assert!((world.get::<Vitals>(victim).unwrap().mood + 0.3).abs() < 1e-6);

        let rel = world.get::<Social>(victim).unwrap().relationship(thief).cloned().unwrap();
        assert_eq!(rel.last_wrong(), Some(InteractionKind::Theft));
        let witnessed = world.get::<Social>(witness).unwrap().relationship(thief).cloned().unwrap();
        assert_eq!(witnessed.last_wrong(), None);
        assert!(world
            .get::<Brain>(victim)
            .unwrap()
            .episodic
            .has(MemoryKind::WasStolenFrom, 0.5));
    }

    #[test]
    fn test_violence_floors_victim_energy() {
        let mut world = world();
        let attacker = agent(&mut world, (100.0, 100.0), Gender::Male);
        let victim = agent(&mut world, (110.0, 100.0), Gender::Female);
        set_energy(&mut world, victim, 5.0);
        report(
            &mut world,
            SocialEvent::Violence {
                attacker,
                victim,
                severity: 1.0,
            },
        );
        process_social_events(&mut world);
        let vitals = world.get::<Vitals>(victim).unwrap();
        assert_eq!(vitals.energy, 1.0);
        assert!((vitals.mood + 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_scam_severity_follows_shortfall() {
        let mut world = world();
        let scammer = agent(&mut world, (100.0, 100.0), Gender::Male);
        let victim = agent(&mut world, (110.0, 100.0), Gender::Female);
        report(
            &mut world,
            SocialEvent::Scam {
                scammer,
                victim,
                promised: 20.0,
                actual: 15.0,
            },
        );
        process_social_events(&mut world);
        // severity 0.25
        assert!((world.get::<Vitals>(victim).unwrap().mood + 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_decay_and_prune() {
        let mut world = world();
        let a = agent(&mut world, (100.0, 100.0), Gender::Male);
        let b = agent(&mut world, (110.0, 100.0), Gender::Female);
        let c = agent(&mut world, (120.0, 100.0), Gender::Female);
        {
            let mut social = world.get_mut::<Social>(a).unwrap();
            let rel = social.relationship_mut(b);
            rel.trust = 0.5;
            rel.affinity = 0.5;
            let weak = social.relationship_mut(c);
            weak.trust = 0.04;
            weak.affinity = 0.01;
            weak.interaction_count = 1;
        }
        world.resource_mut::<SimClock>().time = 150.0;

        assert_eq!(decay_relationships(&mut world), 1);
        let social = world.get::<Social>(a).unwrap();
        assert!((social.relationship(b).unwrap().trust - 0.495).abs() < 1e-6);
        assert!(social.relationship(c).is_none());
    }

    #[test]
    fn test_recent_relationships_do_not_decay() {
        let mut world = world();
        let a = agent(&mut world, (100.0, 100.0), Gender::Male);
        let b = agent(&mut world, (110.0, 100.0), Gender::Female);
        world.get_mut::<Social>(a).unwrap().relationship_mut(b).trust = 0.01;
        world.resource_mut::<SimClock>().time = 50.0;
        assert_eq!(decay_relationships(&mut world), 0);
        assert_eq!(trust(&world, a, b), 0.01);
    }

    #[test]
    fn test_revenge_mirrors_last_wrong() {
        let mut rng = SmallRng::seed_from_u64(3);
        let mut rel = Relationship::default();
        rel.record(HistoryEntry {
            kind: InteractionKind::ScamTrade,
            witnessed: false,
            successful: false,
            time: 1.0,
        });
        assert_eq!(select_revenge_action(&rel, &mut rng), InteractionKind::ScamTrade);

        let fresh = Relationship::default();
        for _ in 0..20 {
            let kind = select_revenge_action(&fresh, &mut rng);
            assert!(matches!(kind, InteractionKind::Theft | InteractionKind::Violence));
        }
    }

    #[test]
    fn test_check_for_revenge_needs_nearby_grudge() {
        let mut rng = SmallRng::seed_from_u64(4);
        let mut world = world();
        let a = agent(&mut world, (100.0, 100.0), Gender::Male);
        let b = agent(&mut world, (120.0, 100.0), Gender::Female);
        assert!(check_for_revenge(&world, a, &mut rng).is_none());

        {
            let mut social = world.get_mut::<Social>(a).unwrap();
            let rel = social.relationship_mut(b);
            rel.trust = -0.9;
            rel.record(HistoryEntry {
                kind: InteractionKind::Violence,
                witnessed: false,
                successful: false,
                time: 0.0,
            });
        }
        let hits: Vec<_> = (0..50)
            .filter_map(|_| check_for_revenge(&world, a, &mut rng))
            .collect();
        assert!(!hits.is_empty() && hits.len() < 50);
        assert!(hits.iter().all(|h| *h == (b, InteractionKind::Violence)));
    }

    #[test]
    fn test_misconduct_reaches_coworkers_and_investors() {
        let mut world = world();
        let employee = agent(&mut world, (100.0, 100.0), Gender::Male);
        let coworker = agent(&mut world, (500.0, 100.0), Gender::Female);
        let investor = agent(&mut world, (900.0, 100.0), Gender::Female);
        let place = crate::setup::spawn_workplace(&mut world, (100.0, 120.0));
        {
            let mut wp = world.get_mut::<Workplace>(place).unwrap();
            wp.hire(employee);
            wp.hire(coworker);
            wp.add_stake(investor, 20.0, 0.1);
        }
        report(
            &mut world,
            SocialEvent::Misconduct {
                employee,
                workplace: place,
                theft: true,
                damage: 10.0,
            },
        );
        process_social_events(&mut world);
        let kind_of = |world: &World, who: Entity| {
            world.get::<Social>(who).unwrap().relationship(employee).unwrap().last_kind
        };
        assert_eq!(kind_of(&world, coworker), Some(InteractionKind::WorkSabotage));
        assert_eq!(kind_of(&world, investor), Some(InteractionKind::InvestmentFraud));
    }
}
