//! # Data Store

use log::{info, warn};
use serde::Serialize;

use crate::{accel_ctrl, steer_ctrl, veh_state::Telemetry};
use util::module::State;

// ---------------------------------------------------------------------------
// ENUMS
// ---------------------------------------------------------------------------

/// Gives the reason the vehicle has been put into safe mode
#[derive(Debug, Eq, PartialEq, Copy, Clone, Serialize)]
pub enum SafeModeCause {
    /// The safety ECU asked for a stop or a pause.
    SafetyEcuStopRequest,

    /// Too many consecutive frames could not be sent to the actuators.
    ActuatorTransportFault,
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Global data store for the executable.
#[derive(Default)]
pub struct DataStore {
    // Cycle management
    /// Number of cycles already executed
    pub num_cycles: u64,

    /// True if this cycle falls on a 1Hz boundary
    pub is_1_hz_cycle: bool,

    /// Time since the telemetry epoch at the start of the cycle
    pub time_s: f64,

    // Safe mode variables
    /// Determines if the vehicle is in safe mode.
    pub safe: bool,

    /// Gives the reason for the vehicle being in safe mode.
    pub safe_cause: Option<SafeModeCause>,

    // Telemetry
    /// Snapshot taken at the start of the cycle, the only telemetry read
    /// during the cycle.
    pub telemetry: Telemetry,

    // SteerCtrl
    pub steer_ctrl: steer_ctrl::SteerCtrl,
    pub steer_ctrl_input: steer_ctrl::InputData,
    pub steer_ctrl_output: steer_ctrl::OutputData,
    pub steer_ctrl_status_rpt: steer_ctrl::StatusReport,

    // AccelCtrl
    pub accel_ctrl: accel_ctrl::AccelCtrl,
    pub accel_ctrl_output: accel_ctrl::OutputData,
    pub accel_ctrl_status_rpt: accel_ctrl::StatusReport,

    // Monitoring Counters
    /// Number of consecutive cycle overruns
    pub num_consec_cycle_overruns: u64,

    /// Number of consecutive cycles with an actuator send failure
    pub num_consec_transport_errors: u64,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl DataStore {
    /// Puts the vehicle into safe mode with the given cause.
    pub fn make_safe(&mut self, cause: SafeModeCause) {
        if !self.safe {
            warn!("Make safe requested, cause: {:?}", cause);
            self.safe = true;
            self.safe_cause = Some(cause);

            self.steer_ctrl.make_safe();
            self.accel_ctrl.make_safe();
        }
    }

    /// Attempts to disable the safe mode by clearing the given cause.
    ///
    /// Returns `Ok(())` if this cause was cleared and safe mode was disabled, or `Err(())`
    /// otherwise. To remove safe mode the provided cause must match the initial reason for safe
    /// mode being enabled.
    ///
    /// If safe mode was not enabled `Ok(())` is returned
    pub fn make_unsafe(&mut self, cause: SafeModeCause) -> Result<(), ()> {
        if !self.safe {
            return Ok(());
        }

        match self.safe_cause {
            Some(root_cause) if root_cause == cause => {
                self.safe = false;
                self.safe_cause = None;
                info!("Make unsafe requested, root cause match, safe mode disabled");
                Ok(())
            }
            Some(_) => Err(()),
            None => Ok(()),
        }
    }

    /// Perform actions required at the start of a cycle.
    ///
    /// Stores the telemetry snapshot and time, clears the previous cycle's
    /// outputs and sets the 1Hz cycle flag.
    pub fn cycle_start(&mut self, cycle_frequency_hz: f64, telemetry: Telemetry, time_s: f64) {
        let cycles_per_second = (cycle_frequency_hz.round() as u64).max(1);
        self.is_1_hz_cycle = self.num_cycles % cycles_per_second == 0;

        self.telemetry = telemetry;
        self.time_s = time_s;

        self.steer_ctrl_input = steer_ctrl::InputData::default();
        self.steer_ctrl_output = steer_ctrl::OutputData::default();
        self.steer_ctrl_status_rpt = steer_ctrl::StatusReport::default();

        self.accel_ctrl_output = accel_ctrl::OutputData::default();
        self.accel_ctrl_status_rpt = accel_ctrl::StatusReport::default();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_safe_mode_cause_must_match() {
        let mut ds = DataStore::default();

        ds.make_safe(SafeModeCause::SafetyEcuStopRequest);
        ds.make_safe(SafeModeCause::ActuatorTransportFault);
        assert_eq!(ds.safe_cause, Some(SafeModeCause::SafetyEcuStopRequest));

        assert!(ds.make_unsafe(SafeModeCause::ActuatorTransportFault).is_err());
        assert!(ds.safe);

        assert!(ds.make_unsafe(SafeModeCause::SafetyEcuStopRequest).is_ok());
        assert!(!ds.safe);
        assert!(ds.make_unsafe(SafeModeCause::SafetyEcuStopRequest).is_ok());
    }

    #[test]
    fn test_make_safe_resets_controllers() {
        let mut ds = DataStore::default();

        for i in 1..=5 {
            ds.accel_ctrl
                .proc(&accel_ctrl::InputData {
                    cmd_speed_mps: 10.0,
                    gear: 1,
                    timestamp_s: i as f64 * 0.1,
                    ..Default::default()
                })
                .unwrap();
        }
        assert!(ds.accel_ctrl.gas_pedal_pct() > 0.0);

        ds.make_safe(SafeModeCause::ActuatorTransportFault);
        assert_eq!(ds.accel_ctrl.gas_pedal_pct(), 0.0);
        assert_eq!(ds.steer_ctrl.pid().integral(), 0.0);
    }

    #[test]
    fn test_cycle_start() {
        let mut ds = DataStore::default();
        ds.accel_ctrl_output.gas_pedal_pct = 20.0;

        ds.cycle_start(10.0, Telemetry::default(), 0.0);
        assert!(ds.is_1_hz_cycle);
        assert_eq!(ds.accel_ctrl_output.gas_pedal_pct, 0.0);

        ds.num_cycles = 3;
        ds.cycle_start(10.0, Telemetry::default(), 0.3);
        assert!(!ds.is_1_hz_cycle);
        assert_eq!(ds.time_s, 0.3);
    }
}
