//! Decision Engine
//!
//! Each agent picks an action from a blend of its inherited Q-table and a
//! small value network, then learns from the outcome. Agents without a
//! `Brain` component fall back to the Q-table alone with the same
//! adjustments.
//!
//! Hybrid values are computed into a scratch array; only `add_experience`
//! and `learn` ever write to the Q-table.

pub mod memory;
pub mod network;
pub mod qtable;
pub mod state;

use bevy_ecs::prelude::*;
use rand::Rng;
use society_events::{ActionKind, InteractionKind, ACTION_COUNT, PRIMARY_ACTION_COUNT};

use crate::config::BrainConfig;

pub use memory::{
    EpisodicMemory, Experience, MemoryEntry, MemoryKind, ReplayBuffer, SocialMemory, SocialRecord,
};
pub use network::NeuralNetwork;
pub use qtable::{argmax, ActionValues, QTable};
pub use state::{encode_features, Features, Level, MemoryFlags, MoodLevel, StateKey, FEATURE_COUNT, STATE_COUNT};

/// Weights and nudges applied when choosing actions
pub mod decision_constants {
    pub const Q_WEIGHT: f32 = 0.8;
    pub const NN_WEIGHT: f32 = 0.2;
    pub const BAD_REPUTATION_STATUS: f32 = -0.3;
    pub const MANY_ENEMIES: usize = 3;
    pub const GIFT_BOOST: f32 = 0.4;
    pub const ENEMY_WORK_BOOST: f32 = 0.3;
    pub const ENEMY_HARVEST_PENALTY: f32 = 0.2;
    pub const HIGH_CORRUPTION_STEAL_BOOST: f32 = 0.4;
    pub const HIGH_CORRUPTION_SCAM_BOOST: f32 = 0.3;
    pub const MEDIUM_CORRUPTION_STEAL_BOOST: f32 = 0.2;
    pub const MEDIUM_CORRUPTION_GIFT_PENALTY: f32 = 0.1;
    pub const YIELD_FARM_HARVEST_BOOST: f32 = 0.5;
    pub const FARM_PLANT_BOOST: f32 = 0.3;
    /// Minimum importance for a memory to count as knowledge
    pub const FARM_MEMORY_IMPORTANCE: f32 = 0.4;
    pub const YIELD_FARM_MEMORY_IMPORTANCE: f32 = 0.6;
    pub const WORKPLACE_MEMORY_IMPORTANCE: f32 = 0.4;
    pub const TRADING_MEMORY_IMPORTANCE: f32 = 0.5;
    /// Share of the neural and tabular next-state maxima in the TD target
    pub const NEXT_MAX_BLEND: f32 = 0.5;
}

/// Everything the engine needs to rank actions for one agent this tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecisionContext {
    pub state: StateKey,
    pub features: Features,
    pub flags: MemoryFlags,
    pub reputation_bad: bool,
    pub enemy_count: usize,
}

impl DecisionContext {
    pub fn new(state: StateKey, flags: MemoryFlags, status: f32, enemy_count: usize) -> Self {
        Self {
            state,
            features: encode_features(&state, flags),
            flags,
            reputation_bad: status < decision_constants::BAD_REPUTATION_STATUS,
            enemy_count,
        }
    }
}

/// Social, corruption and farm-memory nudges shared by both decision paths.
/// Honest agents never consider the pseudo-actions.
pub fn apply_adjustments(values: &mut ActionValues, ctx: &DecisionContext) {
    use decision_constants::*;
    let mut bump = |action: ActionKind, delta: f32| values[action.index()] += delta;

    if ctx.reputation_bad {
        bump(ActionKind::GiftFood, GIFT_BOOST);
        bump(ActionKind::GiftMoney, GIFT_BOOST);
    }
    if ctx.enemy_count > MANY_ENEMIES {
        bump(ActionKind::Work, ENEMY_WORK_BOOST);
        bump(ActionKind::HarvestFood, -ENEMY_HARVEST_PENALTY);
    }
    match ctx.state.corruption {
        Level::High => {
            bump(ActionKind::StealCrops, HIGH_CORRUPTION_STEAL_BOOST);
            bump(ActionKind::ScamTrade, HIGH_CORRUPTION_SCAM_BOOST);
        }
        Level::Medium => {
            bump(ActionKind::StealCrops, MEDIUM_CORRUPTION_STEAL_BOOST);
            bump(ActionKind::GiftFood, -MEDIUM_CORRUPTION_GIFT_PENALTY);
        }
        Level::Low => {
            values[ActionKind::StealCrops.index()] = f32::NEG_INFINITY;
            values[ActionKind::ScamTrade.index()] = f32::NEG_INFINITY;
        }
    }
    if ctx.state.food == Level::Low {
        if ctx.flags.knows_yield_farm {
            values[ActionKind::HarvestFood.index()] += YIELD_FARM_HARVEST_BOOST;
        } else if ctx.flags.knows_farm {
            values[ActionKind::PlantFood.index()] += FARM_PLANT_BOOST;
        }
    }
}

/// `base / (1 + age / decay_age)`
pub fn exploration_rate(age: u32, base: f32, decay_age: f32) -> f32 {
    base / (1.0 + age as f32 / decay_age.max(f32::EPSILON))
}

/// Uniform random action. Pseudo-actions are only explored once the agent
/// is at least moderately corrupt.
pub fn random_action<R: Rng>(ctx: &DecisionContext, rng: &mut R) -> ActionKind {
    let upper = if ctx.state.corruption == Level::Low {
        PRIMARY_ACTION_COUNT
    } else {
        ACTION_COUNT
    };
    ActionKind::from_index(rng.gen_range(0..upper)).unwrap_or(ActionKind::Rest)
}

/// Q-table values plus adjustments, without neural blending.
pub fn tabular_values(qtable: &QTable, ctx: &DecisionContext) -> ActionValues {
    let mut values = qtable.row(ctx.state.index());
    apply_adjustments(&mut values, ctx);
    values
}

/// Epsilon-greedy choice over the Q-table alone.
pub fn select_tabular_action<R: Rng>(
    qtable: &QTable,
    ctx: &DecisionContext,
    exploration: f32,
    rng: &mut R,
) -> ActionKind {
    if rng.gen::<f32>() < exploration {
        random_action(ctx, rng)
    } else {
        argmax(&tabular_values(qtable, ctx))
    }
}

/// Per-agent learned state: networks and memories
#[derive(Component, Debug, Clone)]
pub struct Brain {
    pub network: NeuralNetwork,
    pub target_network: NeuralNetwork,
    pub replay: ReplayBuffer,
    pub episodic: EpisodicMemory,
    pub social: SocialMemory,
    pub learn_steps: u64,
    pub batch_size: usize,
    pub target_update_frequency: u64,
    pub gamma: f32,
}

impl Brain {
    pub fn new<R: Rng>(config: &BrainConfig, rng: &mut R) -> Self {
        let network = NeuralNetwork::new_random(rng);
        Self {
            target_network: network.clone(),
            network,
            replay: ReplayBuffer::new(config.replay_capacity),
            episodic: EpisodicMemory::new(config.episodic_capacity),
            social: SocialMemory::default(),
            learn_steps: 0,
            batch_size: config.batch_size,
            target_update_frequency: config.target_update_frequency.max(1),
            gamma: config.gamma,
        }
    }

    /// Knowledge flags derived from episodic memory
    pub fn memory_flags(&self) -> MemoryFlags {
        use decision_constants::*;
        MemoryFlags {
            knows_farm: self.episodic.has(MemoryKind::FoundFarm, FARM_MEMORY_IMPORTANCE),
            knows_yield_farm: self
                .episodic
                .has(MemoryKind::FoundYieldFarm, YIELD_FARM_MEMORY_IMPORTANCE),
            knows_workplace: self
                .episodic
                .has(MemoryKind::FoundWorkplace, WORKPLACE_MEMORY_IMPORTANCE),
            has_trading_partners: self
                .episodic
                .has(MemoryKind::TradingPartner, TRADING_MEMORY_IMPORTANCE),
        }
    }

    /// `0.8 * Q + 0.2 * network` for every action, then adjustments.
    pub fn hybrid_values(&self, qtable: &QTable, ctx: &DecisionContext) -> ActionValues {
        use decision_constants::*;
        let row = qtable.row(ctx.state.index());
        let nn = self.network.forward(&ctx.features);
        let mut values = [0.0; ACTION_COUNT];
        for (i, v) in values.iter_mut().enumerate() {
            *v = Q_WEIGHT * row[i] + NN_WEIGHT * nn[i];
        }
        apply_adjustments(&mut values, ctx);
        values
    }

    pub fn select_action<R: Rng>(
        &self,
        qtable: &QTable,
        ctx: &DecisionContext,
        exploration: f32,
        rng: &mut R,
    ) -> ActionKind {
        if rng.gen::<f32>() < exploration {
            random_action(ctx, rng)
        } else {
            argmax(&self.hybrid_values(qtable, ctx))
        }
    }

    pub fn remember(&mut self, entry: MemoryEntry) {
        self.episodic.add(entry);
    }

    pub fn record_social(&mut self, target: Entity, kind: InteractionKind, successful: bool, importance: f32) {
        self.social.record(
            target,
            SocialRecord {
                kind,
                successful,
                importance,
            },
        );
    }

    /// Stores the experience, files significant outcomes as episodic
    /// memories and applies the immediate Q update.
    pub fn add_experience(&mut self, qtable: &mut QTable, experience: Experience, time: f32) {
        use memory::memory_constants::*;
        self.replay.push(experience);
        let magnitude = experience.reward.abs();
        if magnitude > SIGNIFICANT_REWARD {
            let kind = if experience.reward > 0.0 {
                MemoryKind::PositiveExperience
            } else {
                MemoryKind::NegativeExperience
            };
            let importance = (magnitude / 5.0).min(MAX_EXPERIENCE_IMPORTANCE);
            self.episodic.add(MemoryEntry::new(kind, importance, time));
        }
        qtable.update_immediate(experience.state, experience.action, experience.reward);
    }

    /// One replay pass: trains the network on a sampled batch and moves the
    /// Q-table toward `r + gamma * blended_next_max` at rate `alpha`.
    /// Returns the batch size used.
    pub fn learn<R: Rng>(&mut self, qtable: &mut QTable, alpha: f32, rng: &mut R) -> usize {
        use decision_constants::NEXT_MAX_BLEND;
        self.learn_steps += 1;
        let batch = self.replay.sample(self.batch_size, rng);

        for exp in &batch {
            let not_done = if exp.done { 0.0 } else { 1.0 };

            let mut target = self.network.forward(&exp.features);
            let next_target = self.target_network.forward(&exp.next_features);
            let next_best = next_target.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            target[exp.action.index()] = exp.reward + self.gamma * next_best * not_done;
            self.network.train(&exp.features, &target);

            let nn_next_max = self
                .network
                .forward(&exp.next_features)
                .iter()
                .copied()
                .fold(f32::NEG_INFINITY, f32::max);
            let q_next_max = if qtable.is_visited(exp.next_state) {
                qtable.max_value(exp.next_state)
            } else {
                0.0
            };
            let blended = NEXT_MAX_BLEND * nn_next_max + (1.0 - NEXT_MAX_BLEND) * q_next_max;
            let td_target = exp.reward + self.gamma * blended * not_done;
            qtable.blend_toward(exp.state, exp.action, td_target, alpha);
        }

        if self.learn_steps % self.target_update_frequency == 0 {
            self.target_network.copy_from(&self.network);
        }
        batch.len()
    }

    /// Drops memories pointing at a removed agent.
    pub fn forget(&mut self, subject: Entity) {
        self.social.forget(subject);
        self.episodic.forget_subject(subject);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn context(corruption: f32, food_fraction: f32) -> DecisionContext {
        let state = StateKey::from_vitals(50.0, 40.0, 0.0, corruption, food_fraction);
        DecisionContext::new(state, MemoryFlags::default(), 0.0, 0)
    }

    fn experience(ctx: &DecisionContext, action: ActionKind, reward: f32) -> Experience {
        Experience {
            state: ctx.state.index(),
            features: ctx.features,
            action,
            reward,
            next_state: ctx.state.index(),
            next_features: ctx.features,
            done: false,
        }
    }

    #[test]
    fn test_exploration_decays_with_age() {
        assert!((exploration_rate(0, 0.1, 100.0) - 0.1).abs() < 1e-6);
        assert!((exploration_rate(100, 0.1, 100.0) - 0.05).abs() < 1e-6);
        assert!(exploration_rate(200, 0.1, 100.0) < exploration_rate(150, 0.1, 100.0));
    }

    #[test]
    fn test_hybrid_values_leave_qtable_untouched() {
        let mut rng = SmallRng::seed_from_u64(1);
        let brain = Brain::new(&BrainConfig::default(), &mut rng);
        let mut q = QTable::new();
        let ctx = context(0.8, 0.1);
        q.set(ctx.state.index(), ActionKind::Work, 1.0);
        let before = q.clone();

        let values = brain.hybrid_values(&q, &ctx);
        let _ = brain.select_action(&q, &ctx, 0.0, &mut rng);
        assert_eq!(q, before);

        let nn = brain.network.forward(&ctx.features);
        let expected = 0.8 * 1.0 + 0.2 * nn[ActionKind::Work.index()];
        assert!((values[ActionKind::Work.index()] - expected).abs() < 1e-6);
        let steal = 0.2 * nn[ActionKind::StealCrops.index()] + 0.4;
        assert!((values[ActionKind::StealCrops.index()] - steal).abs() < 1e-6);
    }

    #[test]
    fn test_adjustments() {
        let mut values = [0.0; ACTION_COUNT];
        let state = StateKey::from_vitals(50.0, 40.0, 0.0, 0.5, 0.1);
        let ctx = DecisionContext::new(
            state,
            MemoryFlags {
                knows_farm: true,
                ..MemoryFlags::default()
            },
            -0.5,
            4,
        );
        apply_adjustments(&mut values, &ctx);
        assert!((values[ActionKind::GiftFood.index()] - 0.3).abs() < 1e-6);
        assert!((values[ActionKind::GiftMoney.index()] - 0.4).abs() < 1e-6);
        assert!((values[ActionKind::Work.index()] - 0.3).abs() < 1e-6);
        assert!((values[ActionKind::HarvestFood.index()] + 0.2).abs() < 1e-6);
        assert!((values[ActionKind::StealCrops.index()] - 0.2).abs() < 1e-6);
        assert!((values[ActionKind::PlantFood.index()] - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_honest_agents_never_pick_pseudo_actions() {
        let mut rng = SmallRng::seed_from_u64(5);
        let mut q = QTable::new();
        let ctx = context(0.0, 0.5);
        for action in ActionKind::all().iter().take(PRIMARY_ACTION_COUNT) {
            q.set(ctx.state.index(), *action, -5.0);
        }
        assert!(!select_tabular_action(&q, &ctx, 0.0, &mut rng).is_pseudo());
        for _ in 0..200 {
            assert!(!select_tabular_action(&q, &ctx, 1.0, &mut rng).is_pseudo());
        }
    }

    #[test]
    fn test_add_experience_files_significant_memories() {
        let mut rng = SmallRng::seed_from_u64(2);
        let mut brain = Brain::new(&BrainConfig::default(), &mut rng);
        let mut q = QTable::new();
        let ctx = context(0.0, 0.5);

        brain.add_experience(&mut q, experience(&ctx, ActionKind::Eat, 0.5), 1.0);
        assert!(brain.episodic.is_empty());
        brain.add_experience(&mut q, experience(&ctx, ActionKind::Mate, 5.0), 2.0);
        brain.add_experience(&mut q, experience(&ctx, ActionKind::Search, -2.0), 3.0);

        assert_eq!(brain.replay.len(), 3);
        let positive = brain.episodic.get(MemoryKind::PositiveExperience, 0.0);
        assert_eq!(positive.len(), 1);
        assert!((positive[0].importance - 0.9).abs() < 1e-6);
        let negative = brain.episodic.get(MemoryKind::NegativeExperience, 0.0);
        assert!((negative[0].importance - 0.4).abs() < 1e-6);
        assert!((q.get(ctx.state.index(), ActionKind::Mate) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_learn_syncs_target_network() {
        let mut rng = SmallRng::seed_from_u64(3);
        let config = BrainConfig {
            target_update_frequency: 2,
            ..BrainConfig::default()
        };
        let mut brain = Brain::new(&config, &mut rng);
        let mut q = QTable::new();
        let ctx = context(0.0, 0.5);
        assert_eq!(brain.learn(&mut q, 0.5, &mut rng), 0);

        for _ in 0..40 {
            brain.add_experience(&mut q, experience(&ctx, ActionKind::Work, 1.0), 0.0);
        }
        assert_eq!(brain.learn(&mut q, 0.5, &mut rng), 32);
        assert_eq!(brain.learn_steps, 2);
        assert_eq!(brain.network, brain.target_network);
        assert!(q.get(ctx.state.index(), ActionKind::Work) > 0.0);
    }
}
