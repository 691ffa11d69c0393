// strider-core: Data model, collaborator traits, config, clock and errors for the walking core.

pub mod config;
pub mod error;
pub mod time;
pub mod traits;
pub mod types;

pub use config::WalkingConfig;
pub use error::{CycleError, PipelineStage, StriderError};
pub use types::{Foot, LocomotionPhase, StepPhase};
