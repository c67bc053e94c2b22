//! Simulation module
//!
//! All swarm logic lives here. Nothing in this module renders, reads raw
//! devices or installs a logger:
//! - Fixed timestep only
//! - Seeded RNG owned by `SimulationState`
//! - Index references are revalidated every tick

pub mod compact;
pub mod grid;
pub mod master;
pub mod probe;
pub mod resource;
pub mod select;
pub mod state;
pub mod stepper;
pub mod tick;
pub mod torus;

pub use grid::SpatialGrid;
pub use master::{MasterPhase, MasterState, StructureMode, WarpStructure};
pub use probe::{Genes, Probe, ProbeMode};
pub use resource::{Cluster, HarvestOutcome, Resource, ResourceKind, ResourcePool};
pub use select::{Candidate, select_k_closest};
pub use state::{SimEvent, SimStats, SimulationState};
pub use stepper::FixedStepper;
pub use tick::{TickInput, tick};
pub use torus::{World, wrap, wrapped_delta};
