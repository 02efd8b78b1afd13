//! Behavior System
//!
//! The per-tick agent pass. Each living agent, in id order, first checks
//! for a grudge it can act on; otherwise it encodes its state, asks its
//! brain (or bare Q-table) for an action, executes it and learns from the
//! reward.

use bevy_ecs::prelude::*;
use rand::Rng;
use society_events::ActionKind;

use crate::actions::{execute_action, now, social::execute_revenge, ActionOutcome};
use crate::brain::{
    exploration_rate, select_tabular_action, Brain, DecisionContext, Experience, MemoryFlags, StateKey,
};
use crate::components::{Agent, LastAction, Reserves, Social, Vitals, Wallet};
use crate::config::SimConfig;
use crate::genetics::Genome;
use crate::output::metrics::ActionTally;
use crate::store::ComponentStore;

use super::social::check_for_revenge;

/// Discretized state of an agent as it stands right now
pub fn current_state(world: &World, agent: Entity) -> Option<StateKey> {
    let vitals = world.get::<Vitals>(agent)?;
    let money = world.get::<Wallet>(agent).map_or(0.0, |w| w.money);
    let food_fraction = world.get::<Reserves>(agent).map_or(0.0, |r| r.fraction());
    Some(StateKey::from_vitals(
        vitals.energy,
        money,
        vitals.mood,
        vitals.corruption,
        food_fraction,
    ))
}

/// Everything the decision engine needs about one agent this tick
pub fn decision_context(world: &World, agent: Entity) -> Option<DecisionContext> {
    let state = current_state(world, agent)?;
    let flags = world
        .get::<Brain>(agent)
        .map_or(MemoryFlags::default(), |b| b.memory_flags());
    let (status, enemies) = world
        .get::<Social>(agent)
        .map_or((0.0, 0), |s| (s.status, s.distrusted_agents().len()));
    Some(DecisionContext::new(state, flags, status, enemies))
}

fn choose_action<R: Rng>(world: &World, agent: Entity, ctx: &DecisionContext, rng: &mut R) -> Option<ActionKind> {
    let genome = world.get::<Genome>(agent)?;
    let config = world
        .get_resource::<SimConfig>()
        .map(|c| c.brain.clone())
        .unwrap_or_default();
    let age = world.get::<Vitals>(agent).map_or(0, |v| v.age);
    let exploration = exploration_rate(age, config.base_exploration, config.exploration_decay_age);
    Some(match world.get::<Brain>(agent) {
        Some(brain) => brain.select_action(&genome.q_table, ctx, exploration, rng),
        None => select_tabular_action(&genome.q_table, ctx, exploration, rng),
    })
}

fn apply_outcome(world: &mut World, agent: Entity, outcome: ActionOutcome) {
    if let Some(mut vitals) = world.get_mut::<Vitals>(agent) {
        vitals.apply_reward(outcome.reward);
        vitals.update_corruption(outcome.unethical);
    }
}

/// Runs one decision for every living agent. Returns the number of agents
/// that acted.
pub fn run_agent_decisions<R: Rng>(world: &mut World, rng: &mut R) -> usize {
    let (learn_probability, gamma) = world
        .get_resource::<SimConfig>()
        .map_or((0.1, 0.99), |c| (c.brain.learn_probability, c.brain.gamma));
    let mut learners = world.query::<(&mut Genome, Option<&mut Brain>)>();
    let mut acted = 0;

    for agent in world.entities_with::<With<Agent>>() {
        if !crate::actions::is_alive(world, agent) {
            continue;
        }
        acted += 1;

        if let Some((target, kind)) = check_for_revenge(world, agent, rng) {
            let outcome = execute_revenge(world, agent, target, kind);
            apply_outcome(world, agent, outcome);
            continue;
        }

        let Some(ctx) = decision_context(world, agent) else {
            continue;
        };
        let Some(action) = choose_action(world, agent, &ctx, rng) else {
            continue;
        };
        let outcome = execute_action(world, agent, action, rng);
        apply_outcome(world, agent, outcome);
        if let Some(mut last) = world.get_mut::<LastAction>(agent) {
            last.record(action, outcome.reward);
        }
        if let Some(mut tally) = world.get_resource_mut::<ActionTally>() {
            tally.record(action);
        }

        let Some(next) = decision_context(world, agent) else {
            continue;
        };
        let done = world.get::<Vitals>(agent).map_or(true, |v| v.energy <= 0.0);
        let experience = Experience {
            state: ctx.state.index(),
            features: ctx.features,
            action,
            reward: outcome.reward,
            next_state: next.state.index(),
            next_features: next.features,
            done,
        };
        let time = now(world);
        let learn = rng.gen::<f32>() < learn_probability;
        let Ok((mut genome, brain)) = learners.get_mut(world, agent) else {
            continue;
        };
        let alpha = genome.learning_capacity;
        match brain {
            Some(mut brain) => {
                brain.add_experience(&mut genome.q_table, experience, time);
                if learn {
                    brain.learn(&mut genome.q_table, alpha, rng);
                }
            }
            None => {
                let table = &mut genome.q_table;
                table.update_immediate(experience.state, action, experience.reward);
                if learn {
                    table.td_update(
                        experience.state,
                        action,
                        experience.reward,
                        experience.next_state,
                        done,
                        alpha,
                        gamma,
                    );
                }
            }
        }
    }
    acted
}
