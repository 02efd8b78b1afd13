//! Checkpoints
//!
//! A checkpoint is a self-contained JSON document: configuration, clock,
//! epoch bookkeeping and every entity with its components. Entity
//! references are written as checkpoint ids and remapped on load. Loading
//! builds a brand new `World`, so a corrupt checkpoint never touches the
//! world the caller is running.

use bevy_ecs::prelude::*;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use society_events::ActionKind;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fs;
use std::path::Path;

use crate::brain::{Brain, EpisodicMemory, MemoryEntry, MemoryKind, NeuralNetwork, ReplayBuffer, SocialMemory, SocialRecord};
use crate::components::{
    Agent, BehaviorState, FarmPlot, FarmState, FoodItem, Holding, Investor, LastAction, Lineage, PopulationStats,
    Relationship, Reserves, SimClock, Social, Stake, Tag, Transform, Vitals, Wallet, Workplace, WorldBounds,
};
use crate::config::SimConfig;
use crate::error::CheckpointError;
use crate::events::logger::entity_id;
use crate::genetics::{ArchivedAgent, Genome};
use crate::setup::insert_resources;
use crate::spatial::SpatialGrid;
use crate::store::ComponentStore;
use crate::systems::lifecycle::Graveyard;
use crate::SimRng;

pub const CHECKPOINT_VERSION: u32 = 1;

/// Whole-world checkpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub version: u32,
    pub checkpoint_id: String,
    pub config: SimConfig,
    pub bounds: WorldBounds,
    pub clock: SimClock,
    pub population: PopulationStats,
    pub graveyard: Vec<ArchivedAgent>,
    pub entities: Vec<EntityRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityRecord {
    pub id: u64,
    pub tag: Tag,
    pub transform: Transform,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<AgentRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub farm: Option<FarmRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workplace: Option<WorkplaceRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub food: Option<FoodItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRecord {
    pub genome: Genome,
    pub vitals: Vitals,
    pub wallet: Wallet,
    pub reserves: Reserves,
    pub lineage: Lineage,
    pub behavior: BehaviorRecord,
    pub last_action: Option<ActionKind>,
    pub last_reward: f32,
    pub social: SocialRecordSet,
    pub holdings: Vec<HoldingRecord>,
    pub total_returns: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brain: Option<BrainRecord>,
}

/// `BehaviorState` with its target written as a checkpoint id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorRecord {
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<(f32, f32)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialRecordSet {
    pub status: f32,
    pub extraversion: f32,
    pub agreeableness: f32,
    pub reciprocity: f32,
    pub relationships: Vec<(u64, Relationship)>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HoldingRecord {
    pub workplace: u64,
    pub amount: f32,
    pub return_rate: f32,
}

/// One investor's share in a workplace
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StakeRecord {
    pub investor: u64,
    pub amount: f32,
    pub return_rate: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrainRecord {
    pub network: NeuralNetwork,
    pub target_network: NeuralNetwork,
    pub replay: ReplayBuffer,
    pub episodic_capacity: usize,
    pub episodic: Vec<MemoryRecord>,
    pub social: Vec<(u64, Vec<SocialRecord>)>,
    pub learn_steps: u64,
    pub batch_size: usize,
    pub target_update_frequency: u64,
    pub gamma: f32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub kind: MemoryKind,
    pub importance: f32,
    pub time: f32,
    pub position: Option<(f32, f32)>,
    pub subject: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FarmRecord {
    pub state: FarmState,
    pub growth: f32,
    pub growth_time: f32,
    pub growth_speed: f32,
    pub fertility: f32,
    pub max_yield: f32,
    pub planted_by: Option<u64>,
    pub last_yield: f32,
    pub harvest_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkplaceRecord {
    pub workers: Vec<u64>,
    pub max_workers: usize,
    pub base_wage: f32,
    pub wages: Vec<(u64, f32)>,
    pub inventory: f32,
    pub max_inventory: f32,
    pub capital: f32,
    pub min_operating_capital: f32,
    pub price: f32,
    pub operating_costs: f32,
    pub productivity: f32,
    pub revenue: f32,
    pub expenses: f32,
    pub profit: f32,
    pub customer_queue: Vec<u64>,
    pub investors: Vec<StakeRecord>,
}

// Capture

fn behavior_record(state: &BehaviorState) -> BehaviorRecord {
    BehaviorRecord {
        state: state.label().to_string(),
        target: state.target().map(entity_id),
        destination: match state {
            BehaviorState::Moving { destination } => Some(*destination),
            _ => None,
        },
    }
}

fn brain_record(brain: &Brain) -> BrainRecord {
    BrainRecord {
        network: brain.network.clone(),
        target_network: brain.target_network.clone(),
        replay: brain.replay.clone(),
        episodic_capacity: brain.episodic.capacity(),
        episodic: brain
            .episodic
            .entries()
            .iter()
            .map(|e| MemoryRecord {
                kind: e.kind,
                importance: e.importance,
                time: e.time,
                position: e.position,
                subject: e.subject.map(entity_id),
            })
            .collect(),
        social: brain
            .social
            .targets()
            .map(|(target, records)| (entity_id(*target), records.clone()))
            .collect(),
        learn_steps: brain.learn_steps,
        batch_size: brain.batch_size,
        target_update_frequency: brain.target_update_frequency,
        gamma: brain.gamma,
    }
}

fn agent_record(world: &World, entity: Entity) -> Option<AgentRecord> {
    world.get::<Agent>(entity)?;
    let social = world.get::<Social>(entity).cloned().unwrap_or_default();
    let investor = world.get::<Investor>(entity).cloned().unwrap_or_default();
    let last = world.get::<LastAction>(entity).cloned().unwrap_or_default();
    Some(AgentRecord {
        genome: world.get::<Genome>(entity)?.clone(),
        vitals: world.get::<Vitals>(entity)?.clone(),
        wallet: world.get::<Wallet>(entity).copied().unwrap_or_default(),
        reserves: world.get::<Reserves>(entity).copied().unwrap_or_default(),
        lineage: world.get::<Lineage>(entity).cloned().unwrap_or_default(),
        behavior: behavior_record(&world.get::<BehaviorState>(entity).copied().unwrap_or_default()),
        last_action: last.current,
        last_reward: last.reward,
        social: SocialRecordSet {
            status: social.status,
            extraversion: social.extraversion,
            agreeableness: social.agreeableness,
            reciprocity: social.reciprocity,
            relationships: social
                .relationships
                .iter()
                .map(|(target, rel)| (entity_id(*target), rel.clone()))
                .collect(),
        },
        holdings: investor
            .holdings
            .iter()
            .map(|h| HoldingRecord {
                workplace: entity_id(h.workplace),
                amount: h.amount,
                return_rate: h.return_rate,
            })
            .collect(),
        total_returns: investor.total_returns,
        brain: world.get::<Brain>(entity).map(brain_record),
    })
}

fn farm_record(farm: &FarmPlot) -> FarmRecord {
    FarmRecord {
        state: farm.state,
        growth: farm.growth,
        growth_time: farm.growth_time,
        growth_speed: farm.growth_speed,
        fertility: farm.fertility,
        max_yield: farm.max_yield,
        planted_by: farm.planted_by.map(entity_id),
        last_yield: farm.last_yield,
        harvest_count: farm.harvest_count,
    }
}

fn workplace_record(place: &Workplace) -> WorkplaceRecord {
    WorkplaceRecord {
        workers: place.workers.iter().copied().map(entity_id).collect(),
        max_workers: place.max_workers,
        base_wage: place.base_wage,
        wages: place.wages.iter().map(|(w, amount)| (entity_id(*w), *amount)).collect(),
        inventory: place.inventory,
        max_inventory: place.max_inventory,
        capital: place.capital,
        min_operating_capital: place.min_operating_capital,
        price: place.price,
        operating_costs: place.operating_costs,
        productivity: place.productivity,
        revenue: place.revenue,
        expenses: place.expenses,
        profit: place.profit,
        customer_queue: place.customer_queue.iter().copied().map(entity_id).collect(),
        investors: place
            .investors
            .iter()
            .map(|s| StakeRecord {
                investor: entity_id(s.investor),
                amount: s.amount,
                return_rate: s.return_rate,
            })
            .collect(),
    }
}

impl Checkpoint {
    /// Captures the whole world.
    pub fn capture(world: &mut World) -> Self {
        let entities = world
            .entities_with::<With<Tag>>()
            .into_iter()
            .filter_map(|entity| {
                let tag = *world.get::<Tag>(entity)?;
                let transform = *world.get::<Transform>(entity)?;
                Some(EntityRecord {
                    id: entity_id(entity),
                    tag,
                    transform,
                    agent: agent_record(world, entity),
                    farm: world.get::<FarmPlot>(entity).map(farm_record),
                    workplace: world.get::<Workplace>(entity).map(workplace_record),
                    food: world.get::<FoodItem>(entity).copied(),
                })
            })
            .collect();
        let config = world.get_resource::<SimConfig>().cloned().unwrap_or_default();
        Self {
            version: CHECKPOINT_VERSION,
            checkpoint_id: uuid::Uuid::new_v4().to_string(),
            bounds: world
                .get_resource::<WorldBounds>()
                .copied()
                .unwrap_or(WorldBounds::new(config.world.width, config.world.height)),
            clock: world.get_resource::<SimClock>().cloned().unwrap_or_default(),
            population: world.get_resource::<PopulationStats>().cloned().unwrap_or_default(),
            graveyard: world
                .get_resource::<Graveyard>()
                .map(|g| g.archived.clone())
                .unwrap_or_default(),
            config,
            entities,
        }
    }

    /// Builds a new world from the checkpoint. Either every entity and
    /// reference is restored or an error is returned and nothing is kept.
    pub fn restore(&self) -> Result<World, CheckpointError> {
        if self.version != CHECKPOINT_VERSION {
            return Err(CheckpointError::Version {
                found: self.version,
                expected: CHECKPOINT_VERSION,
            });
        }
        self.config
            .validate()
            .map_err(|e| CheckpointError::Inconsistent(e.to_string()))?;

        let mut world = World::new();
        insert_resources(&mut world, &self.config);
        world.insert_resource(self.bounds);
        world.insert_resource(SpatialGrid::new(
            self.bounds.width,
            self.bounds.height,
            self.config.world.cell_size,
        ));
        world.insert_resource(self.clock.clone());
        world.insert_resource(self.population.clone());
        world.insert_resource(Graveyard {
            archived: self.graveyard.clone(),
        });
        world.insert_resource(SimRng(SmallRng::seed_from_u64(self.config.world.seed ^ self.clock.tick)));

        // Spawn everything before resolving references
        let mut ids = BTreeMap::new();
        for record in &self.entities {
            let entity = spawn_record(&mut world, record)?;
            if ids.insert(record.id, entity).is_some() {
                return Err(CheckpointError::DuplicateId(record.id));
            }
        }
        let remap = Remap { ids: &ids };
        for record in &self.entities {
            let entity = remap.resolve(record.id, record.id, "id")?;
            attach_references(&mut world, entity, record, &remap)?;
        }
        Ok(world)
    }
}

fn spawn_record(world: &mut World, record: &EntityRecord) -> Result<Entity, CheckpointError> {
    let mut entity = world.spawn((record.tag, record.transform));
    match record.tag {
        Tag::Agent => {
            let agent = record.agent.as_ref().ok_or_else(|| {
                CheckpointError::Inconsistent(format!("agent {} has no agent data", record.id))
            })?;
            if !agent.genome.q_table.is_well_formed() {
                return Err(CheckpointError::Inconsistent(format!("agent {} has a malformed Q-table", record.id)));
            }
            entity.insert((
                Agent,
                agent.genome.clone(),
                agent.vitals.clone(),
                agent.wallet,
                agent.reserves,
                agent.lineage.clone(),
                LastAction {
                    current: agent.last_action,
                    previous: None,
                    reward: agent.last_reward,
                },
            ));
        }
        Tag::Farm => {
            let farm = record
                .farm
                .as_ref()
                .ok_or_else(|| CheckpointError::Inconsistent(format!("farm {} has no farm data", record.id)))?;
            entity.insert(FarmPlot {
                state: farm.state,
                growth: farm.growth,
                growth_time: farm.growth_time,
                growth_speed: farm.growth_speed,
                fertility: farm.fertility,
                max_yield: farm.max_yield,
                planted_by: None,
                last_yield: farm.last_yield,
                harvest_count: farm.harvest_count,
            });
        }
        Tag::Workplace => {
            if record.workplace.is_none() {
                return Err(CheckpointError::Inconsistent(format!(
                    "workplace {} has no workplace data",
                    record.id
                )));
            }
        }
        Tag::Food => {
            let food = record
                .food
                .ok_or_else(|| CheckpointError::Inconsistent(format!("food {} has no nutrition", record.id)))?;
            entity.insert(food);
        }
    }
    let id = entity.id();
    let (x, y) = record.transform.position();
    world.resource_mut::<SpatialGrid>().insert(id, x, y);
    Ok(id)
}

struct Remap<'a> {
    ids: &'a BTreeMap<u64, Entity>,
}

impl Remap<'_> {
    fn resolve(&self, owner: u64, id: u64, field: &'static str) -> Result<Entity, CheckpointError> {
        self.ids.get(&id).copied().ok_or(CheckpointError::DanglingReference {
            owner,
            missing: id,
            field,
        })
    }

    fn resolve_opt(&self, owner: u64, id: Option<u64>, field: &'static str) -> Result<Option<Entity>, CheckpointError> {
        id.map(|id| self.resolve(owner, id, field)).transpose()
    }
}

fn restore_behavior(owner: u64, record: &BehaviorRecord, remap: &Remap) -> Result<BehaviorState, CheckpointError> {
    let target = || {
        let id = record.target.ok_or_else(|| {
            CheckpointError::Inconsistent(format!("behavior `{}` of {owner} has no target", record.state))
        })?;
        remap.resolve(owner, id, "behavior")
    };
    Ok(match record.state.as_str() {
        "idle" => BehaviorState::Idle,
        "eating" => BehaviorState::Eating,
        "resting" => BehaviorState::Resting,
        "searching" => BehaviorState::Searching,
        "dead" => BehaviorState::Dead,
        "moving" => BehaviorState::Moving {
            destination: record.destination.unwrap_or_default(),
        },
        "working" => BehaviorState::Working { workplace: target()? },
        "investing" => BehaviorState::Investing { workplace: target()? },
        "shopping" => BehaviorState::Shopping { workplace: target()? },
        "selling" => BehaviorState::Selling { workplace: target()? },
        "planting" => BehaviorState::Planting { farm: target()? },
        "harvesting" => BehaviorState::Harvesting { farm: target()? },
        "mating" => BehaviorState::Mating { partner: target()? },
        "gifting" => BehaviorState::Gifting { target: target()? },
        "trading" => BehaviorState::Trading { partner: target()? },
        "stealing" => BehaviorState::Stealing { victim: target()? },
        "fighting" => BehaviorState::Fighting { victim: target()? },
        other => {
            return Err(CheckpointError::Inconsistent(format!(
                "unknown behavior `{other}` on {owner}"
            )))
        }
    })
}

fn restore_brain(owner: u64, record: &BrainRecord, remap: &Remap) -> Result<Brain, CheckpointError> {
    if !record.network.is_well_formed() || !record.target_network.is_well_formed() {
        return Err(CheckpointError::Inconsistent(format!("agent {owner} has a malformed network")));
    }
    let mut episodic = EpisodicMemory::new(record.episodic_capacity);
    for memory in &record.episodic {
        let mut entry = MemoryEntry::new(memory.kind, memory.importance, memory.time);
        entry.position = memory.position;
        entry.subject = remap.resolve_opt(owner, memory.subject, "episodic memory")?;
        episodic.add(entry);
    }
    let mut social = SocialMemory::default();
    for (target, records) in &record.social {
        let target = remap.resolve(owner, *target, "social memory")?;
        for entry in records {
            social.record(target, *entry);
        }
    }
    Ok(Brain {
        network: record.network.clone(),
        target_network: record.target_network.clone(),
        replay: record.replay.clone(),
        episodic,
        social,
        learn_steps: record.learn_steps,
        batch_size: record.batch_size,
        target_update_frequency: record.target_update_frequency.max(1),
        gamma: record.gamma,
    })
}

fn attach_references(world: &mut World, entity: Entity, record: &EntityRecord, remap: &Remap) -> Result<(), CheckpointError> {
    let owner = record.id;
    if let Some(agent) = &record.agent {
        let behavior = restore_behavior(owner, &agent.behavior, remap)?;
        let mut social = Social {
            relationships: BTreeMap::new(),
            status: agent.social.status,
            extraversion: agent.social.extraversion,
            agreeableness: agent.social.agreeableness,
            reciprocity: agent.social.reciprocity,
        };
        for (target, rel) in &agent.social.relationships {
            let target = remap.resolve(owner, *target, "relationship")?;
            social.relationships.insert(target, rel.clone());
        }
        let mut investor = Investor {
            holdings: Vec::with_capacity(agent.holdings.len()),
            total_returns: agent.total_returns,
        };
        for holding in &agent.holdings {
            investor.holdings.push(Holding {
                workplace: remap.resolve(owner, holding.workplace, "holding")?,
                amount: holding.amount,
                return_rate: holding.return_rate,
            });
        }
        let brain = agent
            .brain
            .as_ref()
            .map(|b| restore_brain(owner, b, remap))
            .transpose()?;

        let mut entity = world.entity_mut(entity);
        entity.insert((behavior, social, investor));
        if let Some(brain) = brain {
            entity.insert(brain);
        }
    }

    if let Some(farm) = &record.farm {
        let planted_by = remap.resolve_opt(owner, farm.planted_by, "planted_by")?;
        if let Some(mut plot) = world.get_mut::<FarmPlot>(entity) {
            plot.planted_by = planted_by;
        }
    }

    if let Some(place) = &record.workplace {
        let resolve_all = |ids: &[u64], field| -> Result<Vec<Entity>, CheckpointError> {
            ids.iter().map(|id| remap.resolve(owner, *id, field)).collect()
        };
        let mut wages = BTreeMap::new();
        for (worker, amount) in &place.wages {
            wages.insert(remap.resolve(owner, *worker, "wages")?, *amount);
        }
        let mut investors = Vec::with_capacity(place.investors.len());
        for stake in &place.investors {
            investors.push(Stake {
                investor: remap.resolve(owner, stake.investor, "investors")?,
                amount: stake.amount,
                return_rate: stake.return_rate,
            });
        }
        let mut workplace = Workplace {
            workers: resolve_all(&place.workers, "workers")?,
            max_workers: place.max_workers,
            base_wage: place.base_wage,
            wages,
            inventory: place.inventory,
            max_inventory: place.max_inventory,
            capital: place.capital,
            min_operating_capital: place.min_operating_capital,
            price: place.price,
            operating_costs: place.operating_costs,
            productivity: place.productivity,
            revenue: place.revenue,
            expenses: place.expenses,
            profit: place.profit,
            customer_queue: resolve_all(&place.customer_queue, "customer_queue")?
                .into_iter()
                .collect::<VecDeque<_>>(),
            investors,
            ..Workplace::default()
        };
        workplace.refresh_flags();
        workplace.is_profitable = workplace.profit > 0.0;
        world.entity_mut(entity).insert(workplace);
    }
    Ok(())
}

/// Writes a checkpoint of `world` to `path`. The JSON goes to a sibling
/// temp file first and is renamed over the target, so an interrupted save
/// leaves any previous checkpoint intact.
pub fn save_checkpoint(world: &mut World, path: &Path) -> Result<Checkpoint, CheckpointError> {
    let checkpoint = Checkpoint::capture(world);
    let json = serde_json::to_string(&checkpoint)?;
    let io_err = |source| CheckpointError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, json).map_err(io_err)?;
    fs::rename(&tmp, path).map_err(io_err)?;
    tracing::info!(
        path = %path.display(),
        tick = checkpoint.clock.tick,
        entities = checkpoint.entities.len(),
        "checkpoint written"
    );
    Ok(checkpoint)
}

/// Reads a checkpoint and builds a new world from it.
pub fn load_checkpoint(path: &Path) -> Result<World, CheckpointError> {
    let json = fs::read_to_string(path).map_err(|source| CheckpointError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let checkpoint: Checkpoint = serde_json::from_str(&json)?;
    let world = checkpoint.restore()?;
    tracing::info!(
        path = %path.display(),
        tick = checkpoint.clock.tick,
        entities = checkpoint.entities.len(),
        "checkpoint loaded"
    );
    Ok(world)
}

/// Ids referenced by a checkpoint that no entity carries, for diagnostics
pub fn dangling_ids(checkpoint: &Checkpoint) -> BTreeSet<u64> {
    let known: BTreeSet<u64> = checkpoint.entities.iter().map(|e| e.id).collect();
    let mut referenced = Vec::new();
    for record in &checkpoint.entities {
        if let Some(agent) = &record.agent {
            referenced.extend(agent.behavior.target);
            referenced.extend(agent.social.relationships.iter().map(|(id, _)| *id));
            referenced.extend(agent.holdings.iter().map(|h| h.workplace));
        }
        if let Some(farm) = &record.farm {
            referenced.extend(farm.planted_by);
        }
        if let Some(place) = &record.workplace {
            referenced.extend(place.workers.iter().copied());
            referenced.extend(place.customer_queue.iter().copied());
            referenced.extend(place.investors.iter().map(|s| s.investor));
        }
    }
    referenced.into_iter().filter(|id| !known.contains(id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::test_support::*;
    use crate::genetics::Gender;
    use crate::setup::{spawn_farm, spawn_workplace};

    fn sample_world() -> (World, Entity, Entity, Entity) {
        let mut world = world();
        let a = agent(&mut world, (100.0, 100.0), Gender::Male);
        let b = agent(&mut world, (300.0, 200.0), Gender::Female);
        world.get_mut::<Social>(a).unwrap().relationship_mut(b).trust = 0.4;
        let place = spawn_workplace(&mut world, (500.0, 500.0));
        {
            let mut wp = world.get_mut::<Workplace>(place).unwrap();
            wp.hire(a);
            wp.add_stake(b, 20.0, 0.1);
        }
        world.get_mut::<Investor>(b).unwrap().record(place, 20.0, 0.1);
        let farm = spawn_farm(&mut world, (700.0, 300.0));
        world.get_mut::<FarmPlot>(farm).unwrap().plant(a);
        *world.get_mut::<BehaviorState>(a).unwrap() = BehaviorState::Working { workplace: place };
        (world, a, b, place)
    }

    #[test]
    fn test_capture_restore_preserves_world() {
        let (mut world, a, b, _) = sample_world();
        let checkpoint = Checkpoint::capture(&mut world);
        assert_eq!(checkpoint.entities.len(), 4);
        assert!(dangling_ids(&checkpoint).is_empty());

        let mut restored = checkpoint.restore().unwrap();
        let agents = restored.entities_with::<With<Agent>>();
        assert_eq!(agents.len(), 2);
        // entities are respawned in id order, so relative order survives
        let (ra, rb) = (agents[0], agents[1]);
        assert_eq!(restored.get::<Transform>(ra).unwrap().position(), (100.0, 100.0));
        assert_eq!(
            restored.get::<Genome>(rb).unwrap().q_table,
            world.get::<Genome>(b).unwrap().q_table
        );
        let rel = restored.get::<Social>(ra).unwrap().relationship(rb).unwrap();
        assert_eq!(rel.trust, 0.4);

        let rplace = restored.entities_with::<With<Workplace>>()[0];
        let wp = restored.get::<Workplace>(rplace).unwrap();
        assert!(wp.employs(ra));
        assert_eq!(wp.investors[0].investor, rb);
        assert_eq!(
            *restored.get::<BehaviorState>(ra).unwrap(),
            BehaviorState::Working { workplace: rplace }
        );
        assert_eq!(restored.resource::<SpatialGrid>().len(), 4);
        assert!(restored.resource::<SpatialGrid>().contains(ra));
        assert_eq!(
            restored.get::<Brain>(ra).unwrap().network,
            world.get::<Brain>(a).unwrap().network
        );
    }

    #[test]
    fn test_dangling_reference_fails_whole_load() {
        let (mut world, _, _, _) = sample_world();
        let mut checkpoint = Checkpoint::capture(&mut world);
        let agent = checkpoint
            .entities
            .iter_mut()
            .find_map(|e| e.agent.as_mut())
            .unwrap();
        agent.social.relationships.push((999_999, Relationship::default()));
        assert_eq!(dangling_ids(&checkpoint).into_iter().collect::<Vec<_>>(), vec![999_999]);
        assert!(matches!(
            checkpoint.restore(),
            Err(CheckpointError::DanglingReference { missing: 999_999, .. })
        ));
    }

    #[test]
    fn test_stakes_record_the_investor() {
        let (mut world, _, b, _) = sample_world();
        let mut checkpoint = Checkpoint::capture(&mut world);
        let place = checkpoint
            .entities
            .iter_mut()
            .find_map(|e| e.workplace.as_mut())
            .unwrap();
        assert_eq!(place.investors.len(), 1);
        assert_eq!(place.investors[0].investor, entity_id(b));
        assert_eq!(place.investors[0].amount, 20.0);

        place.investors[0].investor = 424_242;
        assert!(matches!(
            checkpoint.restore(),
            Err(CheckpointError::DanglingReference {
                missing: 424_242,
                field: "investors",
                ..
            })
        ));
    }

    #[test]
    fn test_version_and_duplicates_rejected() {
        let (mut world, _, _, _) = sample_world();
        let mut checkpoint = Checkpoint::capture(&mut world);
        checkpoint.version = 99;
        assert!(matches!(checkpoint.restore(), Err(CheckpointError::Version { found: 99, .. })));

        let mut checkpoint = Checkpoint::capture(&mut world);
        let copy = checkpoint.entities[0].clone();
        checkpoint.entities.push(copy);
        assert!(matches!(checkpoint.restore(), Err(CheckpointError::DuplicateId(_))));
    }

    #[test]
    fn test_missing_component_data_is_inconsistent() {
        let (mut world, _, _, _) = sample_world();
        let mut checkpoint = Checkpoint::capture(&mut world);
        checkpoint.entities[0].agent = None;
        assert!(matches!(checkpoint.restore(), Err(CheckpointError::Inconsistent(_))));
    }
}
