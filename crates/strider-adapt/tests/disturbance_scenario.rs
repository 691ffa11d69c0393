//! A 0.5 m / 0.5 s gait sampled at 100 Hz for 1000 ticks. The nominal step
//! moves forward 0.5 m every 100 ticks; a +0.12 m DCM measurement offset is
//! injected at tick 122 and removed at tick 165.

use strider_adapt::{StepAdaptationEngine, StepAdaptationRequest};
use strider_core::config::StepAdaptationConfig;

const TICKS: usize = 1000;
const OFFSET_ON: usize = 122;
const OFFSET_OFF: usize = 165;
const STEP_LENGTH: f64 = 0.5;
const STEP_DURATION: f64 = 0.5;

fn omega() -> f64 {
    (9.81_f64 / 0.6).sqrt()
}

/// Adapted minus nominal next-step ZMP, per tick.
fn run_scenario() -> Vec<f64> {
    let mut engine = StepAdaptationEngine::new(&StepAdaptationConfig::default()).unwrap();
    let sigma = (omega() * STEP_DURATION).exp();
    let nominal_offset = STEP_LENGTH / (sigma - 1.0);

    let mut current_zmp = 0.0;
    let mut next_step = STEP_LENGTH;
    let mut disturbance = 0.0;
    let mut deviations = Vec::with_capacity(TICKS);

    for tick in 0..TICKS {
        if tick == OFFSET_ON {
            disturbance = 0.12;
        }
        if tick == OFFSET_OFF {
            disturbance = 0.0;
        }
        if tick > 0 && tick % 100 == 0 {
            current_zmp += STEP_LENGTH;
            next_step += STEP_LENGTH;
        }

        let dcm_at_merge = next_step + nominal_offset;
        let request = StepAdaptationRequest {
            nominal_zmp_position: next_step,
            nominal_sigma: sigma,
            nominal_dcm_offset: nominal_offset,
            desired_dcm_at_merge_point: dcm_at_merge,
            omega: omega(),
            measured_zmp: current_zmp,
            measured_dcm: current_zmp + (dcm_at_merge - current_zmp) / sigma + disturbance,
        };
        let result = engine.solve(&request).unwrap();
        deviations.push(result.zmp_position - next_step);
    }
    deviations
}

#[test]
fn nominal_plan_sigma_and_offset() {
    let sigma = (omega() * STEP_DURATION).exp();
    assert!((omega() - 4.0435).abs() < 1e-3);
    assert!((sigma - 7.55).abs() < 0.01);
    assert!((STEP_LENGTH / (sigma - 1.0) - 0.0763).abs() < 1e-3);
}

#[test]
fn disturbance_window_adapts_then_reconverges() {
    let deviations = run_scenario();

    for (tick, dev) in deviations.iter().enumerate() {
        if (OFFSET_ON..OFFSET_OFF).contains(&tick) {
            assert!(
                *dev > 0.1,
                "tick {tick}: expected a forward adapted step, deviation {dev}"
            );
        } else {
            assert!(
                dev.abs() < 1e-6,
                "tick {tick}: expected nominal step, deviation {dev}"
            );
        }
    }
}
