//! Shared test fixtures for strider crates.
//!
//! Mock collaborators with shared probes, analytic walking trajectories and
//! deterministic RNG setup.

pub mod mocks;
pub mod plans;
pub mod rng;

// ---------------------------------------------------------------------------
// Re-exports for convenience
// ---------------------------------------------------------------------------

pub use mocks::{PassthroughKinematics, RecordingIk, ScriptedPlanner, SimulatedRobot};
pub use plans::{standing, straight_walk, WalkParams};
pub use rng::{planar_offsets, seeded_rng};
