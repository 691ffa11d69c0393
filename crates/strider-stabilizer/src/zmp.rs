//! Measured ZMP from the two foot wrenches.

use nalgebra::{Isometry3, Point3, Vector2};
use strider_core::config::ZmpEstimationConfig;
use strider_core::error::NumericalError;
use strider_core::types::Wrench;

use crate::filter::LowPassFilter;

/// ZMP of a single foot in its sole frame, weighted by its vertical force.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FootZmp {
    pub local: Vector2<f64>,
    /// Vertical force used for weighting; zero when the foot does not count.
    pub normal_force: f64,
}

/// Single-foot ZMP with a hard contact cut: undefined below `threshold`.
pub fn foot_zmp(wrench: &Wrench, threshold: f64) -> FootZmp {
    let fz = wrench.force.z;
    if fz < threshold {
        return FootZmp {
            local: Vector2::zeros(),
            normal_force: 0.0,
        };
    }
    FootZmp {
        local: Vector2::new(-wrench.torque.y / fz, wrench.torque.x / fz),
        normal_force: fz,
    }
}

/// Single-foot ZMP regularized by `epsilon`, with forces below `threshold`
/// zeroed.
pub fn saturated_foot_zmp(wrench: &Wrench, threshold: f64, epsilon: f64) -> FootZmp {
    let fz = if wrench.force.z < threshold {
        0.0
    } else {
        wrench.force.z
    };
    let denominator = fz * fz + epsilon;
    FootZmp {
        local: Vector2::new(
            -wrench.torque.y * fz / denominator,
            wrench.torque.x * fz / denominator,
        ),
        normal_force: fz,
    }
}

/// Force-weighted world ZMP. Fails when the total vertical force is below
/// `min_total_force`.
pub fn combine(
    feet: [(FootZmp, &Isometry3<f64>); 2],
    min_total_force: f64,
) -> Result<Vector2<f64>, NumericalError> {
    let total: f64 = feet.iter().map(|(foot, _)| foot.normal_force).sum();
    if total < min_total_force {
        return Err(NumericalError::InsufficientContactForce {
            total,
            floor: min_total_force,
        });
    }
    let zmp = feet
        .iter()
        .fold(Vector2::zeros(), |acc, &(foot, transform)| {
            let world = transform * Point3::new(foot.local.x, foot.local.y, 0.0);
            acc + (foot.normal_force / total) * world.coords.xy()
        });
    Ok(zmp)
}

/// Measured ZMP estimator with optional saturation and low-pass filtering.
#[derive(Debug, Clone)]
pub struct ZmpEstimator {
    config: ZmpEstimationConfig,
    filter: Option<LowPassFilter>,
}

impl ZmpEstimator {
    pub fn new(config: &ZmpEstimationConfig, dt: f64) -> Self {
        Self {
            config: config.clone(),
            filter: config
                .use_filter
                .then(|| LowPassFilter::new(config.cutoff_frequency, dt)),
        }
    }

    /// Unfiltered world-frame ZMP.
    pub fn raw(
        &self,
        left: &Wrench,
        right: &Wrench,
        left_foot: &Isometry3<f64>,
        right_foot: &Isometry3<f64>,
    ) -> Result<Vector2<f64>, NumericalError> {
        let finite = |w: &Wrench| w.force.iter().chain(w.torque.iter()).all(|v| v.is_finite());
        if !finite(left) || !finite(right) {
            return Err(NumericalError::NonFinite("foot wrench"));
        }
        let cfg = &self.config;
        let per_foot = |w: &Wrench| {
            if cfg.use_saturation {
                saturated_foot_zmp(w, cfg.saturation_threshold, cfg.saturation_epsilon)
            } else {
                foot_zmp(w, cfg.contact_force_threshold)
            }
        };
        combine(
            [(per_foot(left), left_foot), (per_foot(right), right_foot)],
            cfg.min_total_force,
        )
    }

    /// World-frame ZMP, filtered when the filter is enabled.
    pub fn estimate(
        &mut self,
        left: &Wrench,
        right: &Wrench,
        left_foot: &Isometry3<f64>,
        right_foot: &Isometry3<f64>,
    ) -> Result<Vector2<f64>, NumericalError> {
        let raw = self.raw(left, right, left_foot, right_foot)?;
        Ok(match &mut self.filter {
            Some(filter) => filter.filter(raw),
            None => raw,
        })
    }

    /// Forget the filter state; the next estimate passes through unfiltered.
    pub fn clear_filter(&mut self) {
        if let Some(filter) = &mut self.filter {
            filter.reset();
        }
    }

    pub const fn is_filtered(&self) -> bool {
        self.filter.is_some()
    }
}
