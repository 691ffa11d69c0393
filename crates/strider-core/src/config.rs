use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::StepPhase;

// ---------------------------------------------------------------------------
// Serde default functions
// ---------------------------------------------------------------------------

const fn default_sampling_time() -> f64 {
    0.016
}
const fn default_gravity() -> f64 {
    9.81
}
const fn default_com_height() -> f64 {
    0.53
}
const fn default_buffer_capacity() -> usize {
    600
}
const fn default_dcm_gain() -> f64 {
    10.0
}
const fn default_horizon() -> usize {
    10
}
const fn default_preview_stride() -> usize {
    5
}
const fn default_dcm_tracking_weight() -> f64 {
    100.0
}
const fn default_one() -> f64 {
    1.0
}
const fn default_foot_length() -> f64 {
    0.2
}
const fn default_foot_width() -> f64 {
    0.1
}
const fn default_zmp_gain_walking() -> f64 {
    1.0
}
const fn default_com_gain_walking() -> f64 {
    4.0
}
const fn default_zmp_gain_stance() -> f64 {
    0.5
}
const fn default_com_gain_stance() -> f64 {
    2.0
}
const fn default_gain_transition_time() -> f64 {
    0.5
}
const fn default_stance_velocity_threshold() -> f64 {
    0.001
}
const fn default_true() -> bool {
    true
}
const fn default_trigger_phase() -> StepPhase {
    StepPhase::SwitchOut
}
const fn default_sigma_weight() -> f64 {
    0.1
}
const fn default_merge_point_weight() -> f64 {
    0.1
}
const fn default_zmp_tolerance() -> f64 {
    0.2
}
const fn default_duration_tolerance() -> f64 {
    0.1
}
const fn default_max_iterations() -> u32 {
    100
}
const fn default_solver_tolerance() -> f64 {
    1e-9
}
const fn default_saturation_threshold() -> f64 {
    10.0
}
const fn default_saturation_epsilon() -> f64 {
    1e-3
}
const fn default_contact_force_threshold() -> f64 {
    0.001
}
const fn default_min_total_force() -> f64 {
    0.1
}
const fn default_cutoff_frequency() -> f64 {
    20.0
}
const fn default_request_lead_ticks() -> usize {
    20
}
const fn default_commit_lead_ticks() -> usize {
    2
}

fn require_positive(field: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("{value} (must be > 0)")))
    }
}

fn require_non_negative(field: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("{value} (must be >= 0)")))
    }
}

// ---------------------------------------------------------------------------
// WalkingConfig
// ---------------------------------------------------------------------------

/// Root configuration of the walking core, one section per component.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WalkingConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub dcm_controller: DcmControllerConfig,
    #[serde(default)]
    pub zmp_com_controller: ZmpComControllerConfig,
    #[serde(default)]
    pub step_adaptation: StepAdaptationConfig,
    #[serde(default)]
    pub zmp_estimation: ZmpEstimationConfig,
    #[serde(default)]
    pub replanning: ReplanningConfig,
}

impl WalkingConfig {
    /// Validate every section and the cross-section constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.general.validate()?;
        self.dcm_controller.validate()?;
        self.zmp_com_controller.validate()?;
        self.step_adaptation.validate()?;
        self.zmp_estimation.validate()?;
        self.replanning.validate()?;
        if self.replanning.request_lead_ticks >= self.general.buffer_capacity {
            return Err(ConfigError::Incompatible(format!(
                "replanning.request_lead_ticks ({}) must be smaller than general.buffer_capacity ({})",
                self.replanning.request_lead_ticks, self.general.buffer_capacity
            )));
        }
        Ok(())
    }

    /// Load from TOML file.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// GeneralConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Control period in seconds (default: 0.016).
    #[serde(default = "default_sampling_time")]
    pub sampling_time: f64,

    /// Gravity magnitude in m/s^2.
    #[serde(default = "default_gravity")]
    pub gravity: f64,

    /// Nominal CoM height used for the LIPM natural frequency.
    #[serde(default = "default_com_height")]
    pub nominal_com_height: f64,

    /// Number of ticks held in the trajectory buffer.
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            sampling_time: default_sampling_time(),
            gravity: default_gravity(),
            nominal_com_height: default_com_height(),
            buffer_capacity: default_buffer_capacity(),
        }
    }
}

impl GeneralConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("general.sampling_time", self.sampling_time)?;
        require_positive("general.gravity", self.gravity)?;
        require_positive("general.nominal_com_height", self.nominal_com_height)?;
        if self.buffer_capacity == 0 {
            return Err(ConfigError::invalid("general.buffer_capacity", "must be > 0"));
        }
        Ok(())
    }

    /// LIPM natural frequency `sqrt(g / h)`.
    pub fn omega(&self) -> f64 {
        (self.gravity / self.nominal_com_height).sqrt()
    }
}

// ---------------------------------------------------------------------------
// DcmControllerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DcmControllerKind {
    #[default]
    Reactive,
    Predictive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DcmControllerConfig {
    #[serde(default)]
    pub kind: DcmControllerKind,

    /// Proportional gain of the reactive law.
    #[serde(default = "default_dcm_gain")]
    pub gain: f64,

    #[serde(default)]
    pub predictive: PredictiveConfig,
}

impl Default for DcmControllerConfig {
    fn default() -> Self {
        Self {
            kind: DcmControllerKind::default(),
            gain: default_dcm_gain(),
            predictive: PredictiveConfig::default(),
        }
    }
}

impl DcmControllerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("dcm_controller.gain", self.gain)?;
        self.predictive.validate()
    }
}

/// Predictive DCM law parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictiveConfig {
    /// Number of MPC nodes.
    #[serde(default = "default_horizon")]
    pub horizon: usize,

    /// Buffer ticks between consecutive MPC nodes.
    #[serde(default = "default_preview_stride")]
    pub preview_stride: usize,

    #[serde(default = "default_dcm_tracking_weight")]
    pub dcm_tracking_weight: f64,

    #[serde(default = "default_one")]
    pub zmp_tracking_weight: f64,

    /// Sole rectangle used for the support polygon.
    #[serde(default = "default_foot_length")]
    pub foot_length: f64,

    #[serde(default = "default_foot_width")]
    pub foot_width: f64,

    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
}

impl Default for PredictiveConfig {
    fn default() -> Self {
        Self {
            horizon: default_horizon(),
            preview_stride: default_preview_stride(),
            dcm_tracking_weight: default_dcm_tracking_weight(),
            zmp_tracking_weight: default_one(),
            foot_length: default_foot_length(),
            foot_width: default_foot_width(),
            max_iterations: default_max_iterations(),
        }
    }
}

impl PredictiveConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.horizon == 0 {
            return Err(ConfigError::invalid("dcm_controller.predictive.horizon", "must be > 0"));
        }
        if self.preview_stride == 0 {
            return Err(ConfigError::invalid(
                "dcm_controller.predictive.preview_stride",
                "must be > 0",
            ));
        }
        require_positive(
            "dcm_controller.predictive.dcm_tracking_weight",
            self.dcm_tracking_weight,
        )?;
        require_positive(
            "dcm_controller.predictive.zmp_tracking_weight",
            self.zmp_tracking_weight,
        )?;
        require_positive("dcm_controller.predictive.foot_length", self.foot_length)?;
        require_positive("dcm_controller.predictive.foot_width", self.foot_width)
    }
}

// ---------------------------------------------------------------------------
// ZmpComControllerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZmpComControllerConfig {
    #[serde(default = "default_zmp_gain_walking")]
    pub zmp_gain_walking: f64,

    #[serde(default = "default_com_gain_walking")]
    pub com_gain_walking: f64,

    #[serde(default = "default_zmp_gain_stance")]
    pub zmp_gain_stance: f64,

    #[serde(default = "default_com_gain_stance")]
    pub com_gain_stance: f64,

    /// Seconds over which gains blend after the stance flag toggles.
    #[serde(default = "default_gain_transition_time")]
    pub gain_transition_time: f64,

    /// Desired DCM speed below which the robot is considered standing.
    #[serde(default = "default_stance_velocity_threshold")]
    pub stance_velocity_threshold: f64,
}

impl Default for ZmpComControllerConfig {
    fn default() -> Self {
        Self {
            zmp_gain_walking: default_zmp_gain_walking(),
            com_gain_walking: default_com_gain_walking(),
            zmp_gain_stance: default_zmp_gain_stance(),
            com_gain_stance: default_com_gain_stance(),
            gain_transition_time: default_gain_transition_time(),
            stance_velocity_threshold: default_stance_velocity_threshold(),
        }
    }
}

impl ZmpComControllerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_non_negative("zmp_com_controller.zmp_gain_walking", self.zmp_gain_walking)?;
        require_positive("zmp_com_controller.com_gain_walking", self.com_gain_walking)?;
        require_non_negative("zmp_com_controller.zmp_gain_stance", self.zmp_gain_stance)?;
        require_positive("zmp_com_controller.com_gain_stance", self.com_gain_stance)?;
        require_non_negative(
            "zmp_com_controller.gain_transition_time",
            self.gain_transition_time,
        )?;
        require_positive(
            "zmp_com_controller.stance_velocity_threshold",
            self.stance_velocity_threshold,
        )
    }
}

// ---------------------------------------------------------------------------
// StepAdaptationConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepAdaptationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_true")]
    pub adapt_left_foot: bool,

    #[serde(default = "default_true")]
    pub adapt_right_foot: bool,

    /// Phase of the swinging foot in which adaptation runs.
    #[serde(default = "default_trigger_phase")]
    pub trigger_phase: StepPhase,

    #[serde(default = "default_one")]
    pub zmp_position_weight: f64,

    #[serde(default = "default_sigma_weight")]
    pub sigma_weight: f64,

    #[serde(default = "default_one")]
    pub dcm_offset_weight: f64,

    /// Weight tying `zmp + offset` to the desired DCM at the next merge point.
    #[serde(default = "default_merge_point_weight")]
    pub dcm_at_merge_point_weight: f64,

    #[serde(default = "default_zmp_tolerance")]
    pub zmp_tolerance_low: f64,

    #[serde(default = "default_zmp_tolerance")]
    pub zmp_tolerance_high: f64,

    /// Allowed deviation of the step duration in seconds.
    #[serde(default = "default_duration_tolerance")]
    pub step_duration_tolerance: f64,

    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    #[serde(default = "default_solver_tolerance")]
    pub tolerance: f64,
}

impl Default for StepAdaptationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            adapt_left_foot: true,
            adapt_right_foot: true,
            trigger_phase: default_trigger_phase(),
            zmp_position_weight: default_one(),
            sigma_weight: default_sigma_weight(),
            dcm_offset_weight: default_one(),
            dcm_at_merge_point_weight: default_merge_point_weight(),
            zmp_tolerance_low: default_zmp_tolerance(),
            zmp_tolerance_high: default_zmp_tolerance(),
            step_duration_tolerance: default_duration_tolerance(),
            max_iterations: default_max_iterations(),
            tolerance: default_solver_tolerance(),
        }
    }
}

impl StepAdaptationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("step_adaptation.zmp_position_weight", self.zmp_position_weight)?;
        require_positive("step_adaptation.sigma_weight", self.sigma_weight)?;
        require_positive("step_adaptation.dcm_offset_weight", self.dcm_offset_weight)?;
        require_non_negative(
            "step_adaptation.dcm_at_merge_point_weight",
            self.dcm_at_merge_point_weight,
        )?;
        require_non_negative("step_adaptation.zmp_tolerance_low", self.zmp_tolerance_low)?;
        require_non_negative("step_adaptation.zmp_tolerance_high", self.zmp_tolerance_high)?;
        require_positive(
            "step_adaptation.step_duration_tolerance",
            self.step_duration_tolerance,
        )?;
        require_positive("step_adaptation.tolerance", self.tolerance)?;
        if self.max_iterations == 0 {
            return Err(ConfigError::invalid("step_adaptation.max_iterations", "must be > 0"));
        }
        if self.trigger_phase == StepPhase::Stance {
            return Err(ConfigError::invalid(
                "step_adaptation.trigger_phase",
                "stance is not a phase of the adapting foot",
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ZmpEstimationConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZmpEstimationConfig {
    /// Blend foot contributions smoothly instead of a hard contact cut.
    #[serde(default)]
    pub use_saturation: bool,

    /// Vertical force below which a foot is ignored in saturated mode.
    #[serde(default = "default_saturation_threshold")]
    pub saturation_threshold: f64,

    #[serde(default = "default_saturation_epsilon")]
    pub saturation_epsilon: f64,

    /// Vertical force below which a foot ZMP is undefined.
    #[serde(default = "default_contact_force_threshold")]
    pub contact_force_threshold: f64,

    /// Total vertical force floor for a defined ZMP.
    #[serde(default = "default_min_total_force")]
    pub min_total_force: f64,

    #[serde(default)]
    pub use_filter: bool,

    /// Low-pass cutoff in Hz.
    #[serde(default = "default_cutoff_frequency")]
    pub cutoff_frequency: f64,
}

impl Default for ZmpEstimationConfig {
    fn default() -> Self {
        Self {
            use_saturation: false,
            saturation_threshold: default_saturation_threshold(),
            saturation_epsilon: default_saturation_epsilon(),
            contact_force_threshold: default_contact_force_threshold(),
            min_total_force: default_min_total_force(),
            use_filter: false,
            cutoff_frequency: default_cutoff_frequency(),
        }
    }
}

impl ZmpEstimationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_non_negative("zmp_estimation.saturation_threshold", self.saturation_threshold)?;
        require_positive("zmp_estimation.saturation_epsilon", self.saturation_epsilon)?;
        require_non_negative(
            "zmp_estimation.contact_force_threshold",
            self.contact_force_threshold,
        )?;
        require_positive("zmp_estimation.min_total_force", self.min_total_force)?;
        require_positive("zmp_estimation.cutoff_frequency", self.cutoff_frequency)
    }
}

// ---------------------------------------------------------------------------
// ReplanningConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplanningConfig {
    /// Ticks before the merge point at which the planner is asked.
    #[serde(default = "default_request_lead_ticks")]
    pub request_lead_ticks: usize,

    /// Ticks before the merge point at which the new segment is spliced.
    #[serde(default = "default_commit_lead_ticks")]
    pub commit_lead_ticks: usize,

    /// Re-issue the last goal at every merge point.
    #[serde(default = "default_true")]
    pub continuous_replanning: bool,
}

impl Default for ReplanningConfig {
    fn default() -> Self {
        Self {
            request_lead_ticks: default_request_lead_ticks(),
            commit_lead_ticks: default_commit_lead_ticks(),
            continuous_replanning: true,
        }
    }
}

impl ReplanningConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.commit_lead_ticks == 0 {
            return Err(ConfigError::invalid("replanning.commit_lead_ticks", "must be > 0"));
        }
        if self.commit_lead_ticks >= self.request_lead_ticks {
            return Err(ConfigError::Incompatible(format!(
                "replanning.commit_lead_ticks ({}) must be smaller than request_lead_ticks ({})",
                self.commit_lead_ticks, self.request_lead_ticks
            )));
        }
        Ok(())
    }
}
