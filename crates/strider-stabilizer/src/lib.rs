//! DCM/ZMP stabilization cascade.
//!
//! Per tick the outer [`DcmLaw`] turns measured and desired DCM into a
//! desired ZMP; the inner [`ZmpComController`] turns the ZMP/CoM errors into
//! a CoM command for inverse kinematics. Around them:
//!
//! - [`ZmpEstimator`] computes the measured ZMP from the foot wrenches.
//! - [`StableDcmModel`] integrates the CoM reference from the desired DCM.
//! - [`SupportPolygon`] bounds the predictive law's ZMP sequence.

pub mod dcm;
pub mod filter;
pub mod lipm;
pub mod predictive;
pub mod support;
pub mod zmp;
pub mod zmp_com;

pub use dcm::{DcmController, DcmLaw, PreviewWindow, ReactiveDcmController};
pub use filter::LowPassFilter;
pub use lipm::StableDcmModel;
pub use predictive::PredictiveDcmController;
pub use support::{convex_hull, Footprint, HalfPlane, SupportPolygon, SupportState};
pub use zmp::ZmpEstimator;
pub use zmp_com::{ComCommand, ZmpComController, ZmpComGains};
