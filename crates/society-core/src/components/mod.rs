//! ECS Components
//!
//! All entity components and shared resources: agents, world geometry,
//! farms, workplaces and social relationships.

pub mod agent;
pub mod economy;
pub mod farm;
pub mod social;
pub mod world;

pub use agent::*;
pub use economy::*;
pub use farm::*;
pub use social::*;
pub use world::*;
