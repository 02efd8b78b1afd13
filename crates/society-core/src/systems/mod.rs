//! ECS Systems
//!
//! Per-tick simulation passes for agent decisions, social bookkeeping, the
//! workplace economy, farm growth and the life cycle.

pub mod agriculture;
pub mod behavior;
pub mod economy;
pub mod lifecycle;
pub mod social;

// Re-export commonly used systems
pub use agriculture::{grow_farms, harvest};
pub use behavior::{current_state, decision_context, run_agent_decisions};
pub use economy::{misconduct_chance, update_workplaces, EconomyUpdate};
pub use lifecycle::{age_agents, living_count, reap_dead, restart_epoch_if_extinct, Graveyard};
pub use social::{
    check_for_revenge, decay_relationships, process_social_events, register_interaction,
    register_negative_interaction, report, select_revenge_action, update_social_status, SocialEvent,
    SocialEvents,
};
