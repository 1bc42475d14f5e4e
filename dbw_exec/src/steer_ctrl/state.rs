//! Implementations for the SteerCtrl state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, trace, warn};
use serde::Serialize;

// Internal
use super::{Params, SteerCtrlError, SteeringPid};
use crate::cst::{STEERING_PHYSICAL_MAX_V, STEERING_PHYSICAL_MIN_V};
use util::{module::State, params, session::Session};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Steering control module state
#[derive(Debug, Clone)]
pub struct SteerCtrl {
    pub(crate) params: Params,

    pid: SteeringPid,
}

/// Input data to steering control.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputData {
    /// Commanded road wheel angle, left positive.
    ///
    /// Units: radians
    pub target_angle_rad: f64,

    /// Road wheel angle from the latest telemetry snapshot.
    ///
    /// Units: radians
    pub current_angle_rad: f64,
}

/// Voltage for the power steering input.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct OutputData {
    /// Units: volts
    pub voltage: f64,
}

/// Status report for SteerCtrl processing.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StatusReport {
    /// The controller output was clamped to the control limits.
    pub output_limited: bool,

    /// Controller output before clamping.
    ///
    /// Units: volts
    pub raw_output_v: f64,

    pub integral: f64,
}

/// Errors in the steering parameters.
#[derive(Debug, thiserror::Error)]
pub enum SteerCtrlInitError {
    #[error("Couldn't load parameters: {0}")]
    ParamLoadError(#[from] params::LoadError),

    #[error(
        "Steering output limits [{0}, {1}] V must lie within the physical limits [0.5, 4.5] V"
    )]
    OutputLimitsOutsidePhysical(f64, f64),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SteerCtrl {
    /// Create a controller from already loaded parameters.
    pub fn new(params: Params) -> Result<Self, SteerCtrlInitError> {
        check_limits(&params)?;

        Ok(Self {
            pid: SteeringPid::from_params(&params),
            params,
        })
    }

    pub fn pid(&self) -> &SteeringPid {
        &self.pid
    }
}

impl Default for SteerCtrl {
    fn default() -> Self {
        let params = Params::default();
        Self {
            pid: SteeringPid::from_params(&params),
            params,
        }
    }
}

impl State for SteerCtrl {
    type InitData = &'static str;
    type InitError = SteerCtrlInitError;

    type InputData = InputData;
    type OutputData = OutputData;
    type StatusReport = StatusReport;
    type ProcError = SteerCtrlError;

    /// Initialise the SteerCtrl module.
    ///
    /// Expected init data is the path to the parameter file
    fn init(&mut self, init_data: Self::InitData, _session: &Session) -> Result<(), Self::InitError> {
        let params: Params = params::load(init_data)?;

        *self = Self::new(params)?;

        debug!(
            "SteerCtrl gains P {} I {} D {}, limits [{}, {}] V",
            self.params.k_p,
            self.params.k_i,
            self.params.k_d,
            self.params.min_output_v,
            self.params.max_output_v
        );

        Ok(())
    }

    /// Perform cyclic processing of steering control.
    fn proc(&mut self, input_data: &Self::InputData) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        let target = input_data.target_angle_rad;
        let current = input_data.current_angle_rad;

        if !target.is_finite() || !current.is_finite() {
            return Err(SteerCtrlError::NonFiniteInput { target, current });
        }

        let raw = super::run_steering_cycle(target, current, &mut self.pid);

        let voltage = util::maths::clamp(&raw, &self.params.min_output_v, &self.params.max_output_v);
        let output_limited = voltage != raw;

        if output_limited {
            warn!("Steering output {:.3} V limited to {:.3} V", raw, voltage);
        }

        trace!(
            "SteerCtrl target {:.4} rad, current {:.4} rad -> {:.3} V",
            target,
            current,
            voltage
        );

        Ok((
            OutputData { voltage },
            StatusReport {
                output_limited,
                raw_output_v: raw,
                integral: self.pid.integral(),
            },
        ))
    }

    /// Clear the PID integral and previous error.
    fn make_safe(&mut self) {
        self.pid.reset();
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn check_limits(params: &Params) -> Result<(), SteerCtrlInitError> {
    let physical = STEERING_PHYSICAL_MIN_V..=STEERING_PHYSICAL_MAX_V;
    if !physical.contains(&params.min_output_v)
        || !physical.contains(&params.max_output_v)
        || params.min_output_v > params.max_output_v
    {
        return Err(SteerCtrlInitError::OutputLimitsOutsidePhysical(
            params.min_output_v,
            params.max_output_v,
        ));
    }

    Ok(())
}
