//! Outer DCM loop: desired ZMP from measured and desired DCM.

use nalgebra::Vector2;
use strider_core::config::{DcmControllerConfig, DcmControllerKind};
use strider_core::error::QpError;
use strider_core::types::ReferenceTrajectorySample;

use crate::predictive::PredictiveDcmController;

/// Buffer offsets a preview-based law wants sampled: `0, stride, ..., nodes·stride`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreviewWindow {
    pub nodes: usize,
    pub stride: usize,
}

impl PreviewWindow {
    pub fn offsets(&self) -> impl Iterator<Item = usize> {
        let stride = self.stride;
        (0..=self.nodes).map(move |k| k * stride)
    }
}

/// Contract shared by the DCM laws.
pub trait DcmController {
    fn set_feedback(&mut self, dcm: Vector2<f64>);

    fn set_reference(&mut self, position: Vector2<f64>, velocity: Vector2<f64>);

    /// Reference samples at [`DcmController::preview_window`] offsets.
    fn set_preview(&mut self, _preview: &[ReferenceTrajectorySample]) {}

    fn preview_window(&self) -> Option<PreviewWindow> {
        None
    }

    fn evaluate(&mut self) -> Result<Vector2<f64>, QpError>;

    fn reset(&mut self) {}
}

/// `zmp = ξ − (ξ̇_des + k (ξ_des − ξ)) / ω`
#[derive(Debug, Clone)]
pub struct ReactiveDcmController {
    gain: f64,
    omega: f64,
    dcm: Vector2<f64>,
    desired_position: Vector2<f64>,
    desired_velocity: Vector2<f64>,
}

impl ReactiveDcmController {
    pub fn new(gain: f64, omega: f64) -> Self {
        Self {
            gain,
            omega,
            dcm: Vector2::zeros(),
            desired_position: Vector2::zeros(),
            desired_velocity: Vector2::zeros(),
        }
    }
}

impl DcmController for ReactiveDcmController {
    fn set_feedback(&mut self, dcm: Vector2<f64>) {
        self.dcm = dcm;
    }

    fn set_reference(&mut self, position: Vector2<f64>, velocity: Vector2<f64>) {
        self.desired_position = position;
        self.desired_velocity = velocity;
    }

    fn evaluate(&mut self) -> Result<Vector2<f64>, QpError> {
        let feedback = self.desired_velocity + self.gain * (self.desired_position - self.dcm);
        Ok(self.dcm - feedback / self.omega)
    }
}

/// The configured DCM law.
#[derive(Debug, Clone)]
pub enum DcmLaw {
    Reactive(ReactiveDcmController),
    Predictive(Box<PredictiveDcmController>),
}

impl DcmLaw {
    pub fn from_config(config: &DcmControllerConfig, omega: f64, dt: f64) -> Self {
        match config.kind {
            DcmControllerKind::Reactive => {
                Self::Reactive(ReactiveDcmController::new(config.gain, omega))
            }
            DcmControllerKind::Predictive => Self::Predictive(Box::new(
                PredictiveDcmController::new(&config.predictive, omega, dt),
            )),
        }
    }

    pub const fn kind(&self) -> DcmControllerKind {
        match self {
            Self::Reactive(_) => DcmControllerKind::Reactive,
            Self::Predictive(_) => DcmControllerKind::Predictive,
        }
    }

    fn inner(&mut self) -> &mut dyn DcmController {
        match self {
            Self::Reactive(c) => c,
            Self::Predictive(c) => c.as_mut(),
        }
    }
}

impl DcmController for DcmLaw {
    fn set_feedback(&mut self, dcm: Vector2<f64>) {
        self.inner().set_feedback(dcm);
    }

    fn set_reference(&mut self, position: Vector2<f64>, velocity: Vector2<f64>) {
        self.inner().set_reference(position, velocity);
    }

    fn set_preview(&mut self, preview: &[ReferenceTrajectorySample]) {
        self.inner().set_preview(preview);
    }

    fn preview_window(&self) -> Option<PreviewWindow> {
        match self {
            Self::Reactive(c) => c.preview_window(),
            Self::Predictive(c) => c.preview_window(),
        }
    }

    fn evaluate(&mut self) -> Result<Vector2<f64>, QpError> {
        self.inner().evaluate()
    }

    fn reset(&mut self) {
        self.inner().reset();
    }
}
