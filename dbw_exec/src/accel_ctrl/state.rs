//! Implementations for the AccelCtrl state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, trace, warn};
use serde::Serialize;

// Internal
use super::*;
use crate::fuzzy::FuzzyController;
use crate::lss::{MAX_POSITION_MM, MIN_POSITION_MM};
use util::{
    maths::{clamp, clamp_sym, discrete_derivative, discrete_integrate},
    module::State,
    params,
    session::Session,
    time::seconds_to_millis,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Acceleration control module state
#[derive(Debug, Clone)]
pub struct AccelCtrl {
    pub(crate) params: Params,

    fuzzy: FuzzyController,

    timestamps: SlidingWindow<WINDOW>,
    raw_speed: SlidingWindow<WINDOW>,
    filtered_speed: SlidingWindow<WINDOW>,
    speed_err: SlidingWindow<WINDOW>,

    gas_pedal_pct: f64,
    brake_position_mm: f64,
}

/// Input data to acceleration control.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputData {
    /// Units: meters/second
    pub speed_mps: f64,

    /// Units: meters/second
    pub cmd_speed_mps: f64,

    /// Engaged gear, 0 for neutral.
    pub gear: u8,

    /// Time the speed was sampled.
    ///
    /// Units: seconds
    pub timestamp_s: f64,

    /// The brake servo is homed and reports no error.
    pub brake_ready: bool,

    /// The safety ECU asks for the car to be stopped.
    pub stop_requested: bool,
}

/// Pedal and brake demands.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct OutputData {
    /// Units: percent
    pub gas_pedal_pct: f64,

    /// Units: millimeters
    pub brake_position_mm: f64,
}

/// Status report for AccelCtrl processing.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StatusReport {
    /// Units: meters/second
    pub filtered_speed_mps: f64,

    /// Units: meters/second
    pub speed_err_mps: f64,

    /// Units: meters/second^2
    pub acc_mss: f64,

    /// The speed history spans too long to differentiate, acceleration was
    /// taken as 0.
    pub stale_history: bool,

    /// The last two samples are too far apart to integrate over, demands
    /// were held.
    pub stale_integration: bool,

    /// The brake loop updated the brake demand this cycle.
    pub brake_active: bool,

    /// The brake demand was held because the car is already decelerating
    /// harder than allowed.
    pub brake_held_at_min_acc: bool,

    pub brake_not_ready: bool,
    pub brake_undefined: bool,

    /// The gas loop was skipped because the gear is not one it drives in.
    pub gear_uncontrolled: bool,
    pub gas_undefined: bool,

    /// Acceleration is above the car's allowed maximum.
    pub above_max_acc: bool,

    pub stop_requested: bool,
}

/// Errors in the acceleration parameters.
#[derive(Debug, thiserror::Error)]
pub enum AccelCtrlInitError {
    #[error("Couldn't load parameters: {0}")]
    ParamLoadError(#[from] params::LoadError),

    #[error(
        "Brake range [{offset}, {offset} + {range}] mm must lie within the servo stroke [0, 75] mm"
    )]
    BrakeRangeOutsideStroke { offset: f64, range: f64 },
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl InputData {
    /// Read the controller inputs from a telemetry snapshot.
    pub fn from_telemetry(telemetry: &Telemetry, cmd_speed_mps: f64, timestamp_s: f64) -> Self {
        Self {
            speed_mps: telemetry.vehicle.motion.speed_mps,
            cmd_speed_mps,
            gear: telemetry.vehicle.engine.actual_gear,
            timestamp_s,
            brake_ready: telemetry.lss.ready_to_serve(),
            stop_requested: telemetry.safety_ecu.stop_requested(),
        }
    }
}

impl AccelCtrl {
    /// Create a controller from already loaded parameters.
    pub fn new(params: Params) -> Result<Self, AccelCtrlInitError> {
        let offset = params.brake_accurate_offset_mm;
        let range = params.brake_accurate_range_mm;

        if !(offset >= MIN_POSITION_MM && range >= 0.0 && offset + range <= MAX_POSITION_MM) {
            return Err(AccelCtrlInitError::BrakeRangeOutsideStroke { offset, range });
        }

        Ok(Self {
            fuzzy: FuzzyController::default(),
            timestamps: SlidingWindow::new(),
            raw_speed: SlidingWindow::new(),
            filtered_speed: SlidingWindow::new(),
            speed_err: SlidingWindow::new(),
            gas_pedal_pct: 0.0,
            brake_position_mm: offset,
            params,
        })
    }

    pub fn set_gas_ctrl_enabled(&mut self, enabled: bool) {
        if enabled != self.params.enable_gas_ctrl {
            debug!("Gas control {}", if enabled { "enabled" } else { "disabled" });
        }
        self.params.enable_gas_ctrl = enabled;
    }

    pub fn set_brake_ctrl_enabled(&mut self, enabled: bool) {
        if enabled != self.params.enable_brake_ctrl {
            debug!("Brake control {}", if enabled { "enabled" } else { "disabled" });
        }
        self.params.enable_brake_ctrl = enabled;
    }

    pub fn gas_pedal_pct(&self) -> f64 {
        self.gas_pedal_pct
    }

    pub fn brake_position_mm(&self) -> f64 {
        self.brake_position_mm
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Recent speed errors, oldest first.
    pub fn speed_err_history(&self) -> &SlidingWindow<WINDOW> {
        &self.speed_err
    }

    /// Run the fuzzy controller, flagging an undefined output.
    fn infer(&self, x1: f64, x2: f64, undefined: &mut bool) -> f64 {
        match self.fuzzy.infer(x1, x2) {
            Some(out) => out,
            None => {
                *undefined = true;
                0.0
            }
        }
    }

    fn brake_cycle(&mut self, input: &InputData, acc: f64, delay_int_ms: f64, report: &mut StatusReport) {
        let offset = self.params.brake_accurate_offset_mm;
        let range = self.params.brake_accurate_range_mm;

        if !self.params.enable_brake_ctrl {
            self.brake_position_mm = offset;
            return;
        }

        if !input.brake_ready {
            report.brake_not_ready = true;
            return;
        }

        // The brake only acts once the gas is released
        if self.gas_pedal_pct > 0.0 {
            return;
        }

        let delta = range * self.infer(-acc, -report.speed_err_mps, &mut report.brake_undefined);

        if acc > self.params.car_min_acc_mss || delta < 0.0 {
            let brake = discrete_integrate(self.brake_position_mm, delta, delay_int_ms);
            self.brake_position_mm = clamp(&brake, &offset, &(offset + range));
            report.brake_active = true;
        } else {
            report.brake_held_at_min_acc = true;
        }
    }

    fn gas_cycle(&mut self, input: &InputData, acc: f64, delay_int_ms: f64, report: &mut StatusReport) {
        if !self.params.enable_gas_ctrl {
            self.gas_pedal_pct = 0.0;
            return;
        }

        if input.stop_requested {
            self.gas_pedal_pct = 0.0;
            return;
        }

        if !(1..=MAX_CONTROLLED_GEAR).contains(&input.gear) {
            report.gear_uncontrolled = true;
            self.gas_pedal_pct = 0.0;
            return;
        }

        let predicted = MEASURED_ACC_GAIN * acc
            + PREDICTED_ACC_GAIN * predict_acceleration(self.gas_pedal_pct / GAS_MAX, input.gear);

        let delta = GAS_MAX * self.infer(predicted, report.speed_err_mps, &mut report.gas_undefined);
        let delta = clamp_sym(delta, GAS_MAX_DELTA);

        let gas = discrete_integrate(self.gas_pedal_pct, delta, delay_int_ms);
        self.gas_pedal_pct = clamp(&gas, &0.0, &GAS_MAX);
    }
}

impl State for AccelCtrl {
    type InitData = &'static str;
    type InitError = AccelCtrlInitError;

    type InputData = InputData;
    type OutputData = OutputData;
    type StatusReport = StatusReport;
    type ProcError = AccelCtrlError;

    /// Initialise the AccelCtrl module.
    ///
    /// Expected init data is the path to the parameter file
    fn init(&mut self, init_data: Self::InitData, _session: &Session) -> Result<(), Self::InitError> {
        let params: Params = params::load(init_data)?;

        *self = Self::new(params)?;

        debug!(
            "AccelCtrl gas {}, brake {} over [{}, {}] mm",
            self.params.enable_gas_ctrl,
            self.params.enable_brake_ctrl,
            self.params.brake_accurate_offset_mm,
            self.params.brake_accurate_offset_mm + self.params.brake_accurate_range_mm
        );

        Ok(())
    }

    /// Perform cyclic processing of acceleration control.
    fn proc(&mut self, input_data: &Self::InputData) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        let speed = input_data.speed_mps;
        let cmd = input_data.cmd_speed_mps;

        if !speed.is_finite() || !cmd.is_finite() {
            return Err(AccelCtrlError::NonFiniteSpeed { speed, cmd });
        }
        if !input_data.timestamp_s.is_finite() {
            return Err(AccelCtrlError::NonFiniteTimestamp(input_data.timestamp_s));
        }

        let mut report = StatusReport {
            stop_requested: input_data.stop_requested,
            ..Default::default()
        };

        // ---- HISTORY ----

        self.timestamps.push(input_data.timestamp_s);
        self.raw_speed.push(speed);

        let r = self.raw_speed.as_slice();
        self.filtered_speed.push((r[0] + 2.0 * r[1] + r[2]) / 4.0);

        report.filtered_speed_mps = self.filtered_speed.newest();
        report.speed_err_mps = cmd - report.filtered_speed_mps;
        self.speed_err.push(report.speed_err_mps);

        // ---- ACCELERATION ----

        let mut delay_acc_ms = seconds_to_millis(self.timestamps.newest() - self.timestamps.oldest());
        if delay_acc_ms > STALE_DELAY_MS {
            report.stale_history = true;
            delay_acc_ms = 0.0;
        }

        let mut delay_int_ms = seconds_to_millis(self.timestamps.newest() - self.timestamps.previous());
        if delay_int_ms > STALE_DELAY_MS {
            report.stale_integration = true;
            delay_int_ms = 0.0;
        }

        let acc = discrete_derivative(
            self.filtered_speed.newest() - self.filtered_speed.oldest(),
            delay_acc_ms,
        );
        report.acc_mss = acc;
        report.above_max_acc = acc > self.params.car_max_acc_mss;

        trace!(
            "AccelCtrl speed {:.3} m/s, err {:.3} m/s, acc {:.3} m/s^2, dt {} ms",
            report.filtered_speed_mps,
            report.speed_err_mps,
            acc,
            delay_int_ms
        );

        // ---- DEMANDS ----

        self.brake_cycle(input_data, acc, delay_int_ms, &mut report);
        self.gas_cycle(input_data, acc, delay_int_ms, &mut report);

        if report.stale_history || report.stale_integration {
            warn!("Speed samples more than {} ms apart, demands held", STALE_DELAY_MS);
        }

        Ok((
            OutputData {
                gas_pedal_pct: self.gas_pedal_pct,
                brake_position_mm: self.brake_position_mm,
            },
            report,
        ))
    }

    /// Release the gas, return the brake to its offset and forget the speed
    /// history.
    fn make_safe(&mut self) {
        self.timestamps.clear();
        self.raw_speed.clear();
        self.filtered_speed.clear();
        self.speed_err.clear();

        self.gas_pedal_pct = 0.0;
        self.brake_position_mm = self.params.brake_accurate_offset_mm;
    }
}

impl Default for AccelCtrl {
    fn default() -> Self {
        let params = Params::default();
        Self {
            fuzzy: FuzzyController::default(),
            timestamps: SlidingWindow::new(),
            raw_speed: SlidingWindow::new(),
            filtered_speed: SlidingWindow::new(),
            speed_err: SlidingWindow::new(),
            gas_pedal_pct: 0.0,
            brake_position_mm: params.brake_accurate_offset_mm,
            params,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn input(speed_mps: f64, cmd_speed_mps: f64, gear: u8, timestamp_s: f64) -> InputData {
        InputData {
            speed_mps,
            cmd_speed_mps,
            gear,
            timestamp_s,
            brake_ready: false,
            stop_requested: false,
        }
    }

    #[test]
    fn test_gas_saturates_at_max() {
        let mut ctrl = AccelCtrl::default();
        let mut gas = Vec::new();

        for i in 1..=200 {
            let (out, report) = ctrl.proc(&input(0.0, 20.0, 1, i as f64 * 0.1)).unwrap();
            assert!(!report.gas_undefined);
            gas.push(out.gas_pedal_pct);
        }

        assert!(gas.windows(2).all(|w| w[1] >= w[0]));
        assert_eq!(*gas.last().unwrap(), GAS_MAX);
    }

    #[test]
    fn test_filter_and_error() {
        let mut ctrl = AccelCtrl::default();

        ctrl.proc(&input(4.0, 10.0, 1, 0.1)).unwrap();
        ctrl.proc(&input(8.0, 10.0, 1, 0.2)).unwrap();
        let (_, report) = ctrl.proc(&input(12.0, 10.0, 1, 0.3)).unwrap();

        // (4 + 2 * 8 + 12) / 4
        assert_eq!(report.filtered_speed_mps, 8.0);
        assert_eq!(report.speed_err_mps, 2.0);
        assert_eq!(ctrl.speed_err_history().newest(), 2.0);

        // Filtered speeds 1, 4, 8 over 0.2 s
        assert!((report.acc_mss - 35.0).abs() < 1e-9);
    }

    #[test]
    fn test_uncontrolled_gear_releases_gas() {
        let mut ctrl = AccelCtrl::default();

        for i in 1..=10 {
            ctrl.proc(&input(0.0, 20.0, 2, i as f64 * 0.1)).unwrap();
        }
        assert!(ctrl.gas_pedal_pct() > 0.0);

        let (out, report) = ctrl.proc(&input(0.0, 20.0, 0, 1.1)).unwrap();
        assert!(report.gear_uncontrolled);
        assert_eq!(out.gas_pedal_pct, 0.0);
    }

    #[test]
    fn test_stale_samples_hold_demands() {
        let mut ctrl = AccelCtrl::default();

        for i in 1..=5 {
            ctrl.proc(&input(0.0, 20.0, 1, i as f64 * 0.1)).unwrap();
        }
        let before = ctrl.gas_pedal_pct();

        let (out, report) = ctrl.proc(&input(0.0, 20.0, 1, 5.0)).unwrap();
        assert!(report.stale_history);
        assert!(report.stale_integration);
        assert_eq!(out.gas_pedal_pct, before);
    }

    #[test]
    fn test_brake_disabled_holds_offset() {
        let mut ctrl = AccelCtrl::default();
        ctrl.set_brake_ctrl_enabled(false);

        let (out, _) = ctrl.proc(&input(10.0, 0.0, 1, 0.1)).unwrap();
        assert_eq!(out.brake_position_mm, ctrl.params().brake_accurate_offset_mm);
    }

    #[test]
    fn test_brake_applies_when_too_fast() {
        let mut ctrl = AccelCtrl::default();
        ctrl.set_gas_ctrl_enabled(false);

        let offset = ctrl.params().brake_accurate_offset_mm;
        let range = ctrl.params().brake_accurate_range_mm;

        let mut brake = Vec::new();
        for i in 1..=100 {
            let mut inp = input(10.0, 0.0, 3, i as f64 * 0.1);
            inp.brake_ready = true;
            let (out, _) = ctrl.proc(&inp).unwrap();
            brake.push(out.brake_position_mm);
        }

        assert!(brake.iter().all(|&b| b >= offset && b <= offset + range));
        assert!(*brake.last().unwrap() > offset);
    }

    #[test]
    fn test_brake_integrates_fuzzy_output() {
        let mut ctrl = AccelCtrl::default();
        ctrl.set_gas_ctrl_enabled(false);

        let fuzzy = FuzzyController::default();
        let offset = ctrl.params().brake_accurate_offset_mm;
        let range = ctrl.params().brake_accurate_range_mm;

        for i in 1..=30 {
            let before = ctrl.brake_position_mm();

            let mut inp = input(10.0, 0.0, 3, i as f64 * 0.1);
            inp.brake_ready = true;
            let (out, report) = ctrl.proc(&inp).unwrap();

            if i < 4 {
                continue;
            }

            let rate = range * fuzzy.infer(-report.acc_mss, -report.speed_err_mps).unwrap();
            let dt_ms = (i as f64 * 0.1 - (i - 1) as f64 * 0.1) * 1000.0;
            let expected = clamp(&(before + rate * dt_ms / 1000.0), &offset, &(offset + range));

            assert!(report.brake_active);
            assert!((out.brake_position_mm - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn test_brake_waits_for_ready() {
        let mut ctrl = AccelCtrl::default();
        ctrl.set_gas_ctrl_enabled(false);

        let (out, report) = ctrl.proc(&input(10.0, 0.0, 3, 0.1)).unwrap();
        assert!(report.brake_not_ready);
        assert_eq!(out.brake_position_mm, ctrl.params().brake_accurate_offset_mm);
    }

    #[test]
    fn test_stop_request_releases_gas() {
        let mut ctrl = AccelCtrl::default();

        for i in 1..=10 {
            ctrl.proc(&input(0.0, 20.0, 1, i as f64 * 0.1)).unwrap();
        }

        let mut inp = input(0.0, 20.0, 1, 1.1);
        inp.stop_requested = true;
        let (out, report) = ctrl.proc(&inp).unwrap();

        assert!(report.stop_requested);
        assert_eq!(out.gas_pedal_pct, 0.0);
    }

    #[test]
    fn test_invalid_brake_range() {
        let params = Params {
            brake_accurate_offset_mm: 60.0,
            brake_accurate_range_mm: 30.0,
            ..Default::default()
        };

        assert!(matches!(
            AccelCtrl::new(params),
            Err(AccelCtrlInitError::BrakeRangeOutsideStroke { .. })
        ));
    }

    #[test]
    fn test_non_finite_speed() {
        let mut ctrl = AccelCtrl::default();
        assert!(ctrl.proc(&input(f64::NAN, 1.0, 1, 0.1)).is_err());
    }
}
