//! Online step adaptation.
//!
//! Recomputes the next footstep from live feedback so that the adapted
//! step stays consistent with where the DCM actually is:
//!
//! 1. [`AdaptationGate`] decides per tick whether a foot is in its trigger
//!    phase and derives the nominal request from the footstep plan.
//! 2. [`StepAdaptationEngine`] solves the 3-variable QP
//!    `[zmp, sigma, dcm_offset]` on a persistent [`strider_qp::QpWorkspace`].
//! 3. [`adapted_step`] turns the solution into an impact time and landing ZMP.

pub mod engine;
pub mod gate;
pub mod request;

pub use engine::{AdaptationTolerances, CostWeights, StepAdaptationEngine};
pub use gate::{adapted_step, AdaptationGate, GateDecision, GateInputs, SkipReason};
pub use request::{AdaptedStep, StepAdaptationRequest, StepAdaptationResult};
