//! Walking layer: trajectory buffer, merge-point replanning and the
//! locomotion supervisor with its control thread.
//!
//! [`Supervisor`] owns the components of the stabilization cascade and the
//! step-adaptation engine and drives them once per tick from the reference
//! samples in its [`TrajectoryBuffer`]. [`ControlLoop`] runs it on a periodic
//! thread; [`CommandHandle`] is the command surface other threads use.

pub mod buffer;
pub mod replan;
pub mod runner;
pub mod supervisor;

pub use buffer::TrajectoryBuffer;
pub use replan::{ReplanAction, ReplanScheduler};
pub use runner::{CommandHandle, ControlLoop, LoopControl};
pub use supervisor::{Collaborators, CycleCommand, CycleStatus, Supervisor};
