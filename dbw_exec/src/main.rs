//! Main drive-by-wire executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise all modules and configure the actuators
//!     - Main loop:
//!         - Telemetry snapshot
//!         - Safety ECU monitoring
//!         - Steering control processing
//!         - Acceleration control processing
//!         - Actuator demands
//!         - Actuator transport monitoring
//!
//! No CAN adapter is driven by this executable: the actuator bus is the
//! in-memory simulated transport and the vehicle is the simulated plant, so
//! the whole control chain can be exercised on a development machine.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{eyre::WrapErr, Report};
use log::{error, info, warn};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

// Internal
use comms_if::can::{sim::SimTransport, BusId, Dispatcher};
use dbw_lib::{
    accel_ctrl,
    cst::{self, Cst},
    data_store::{DataStore, SafeModeCause},
    lss::Lss,
    params::DbwExecParams,
    sim_plant::{self, SimPlant},
    steer_ctrl,
    veh_state::TelemetryStore,
};
use util::{
    logger::{logger_init, LevelFilter},
    module::State,
    session::Session,
};

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("dbw_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Trace, &session).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Drive-by-wire Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let exec_params: DbwExecParams =
        util::params::load("dbw_exec.toml").wrap_err("Could not load exec params")?;
    let cst_params: cst::Params =
        util::params::load("cst.toml").wrap_err("Could not load CST params")?;
    let plant_params: sim_plant::Params =
        util::params::load("sim_plant.toml").wrap_err("Could not load simulated vehicle params")?;

    info!("Exec parameters loaded");

    if let Err(e) = session.save_toml("dbw_exec.toml", &exec_params) {
        warn!("Exec parameters not recorded in the session: {}", e);
    }

    // ---- INITIALISE TELEMETRY ----

    // Every received frame, whichever bus it arrives on, goes to the store.
    let store = TelemetryStore::new();
    let mut dispatcher = Dispatcher::new();
    dispatcher.register(BusId::Vehicle, store.handler());
    dispatcher.register(BusId::Actuator, store.handler());

    let mut tx = SimTransport::with_dispatcher(Arc::new(dispatcher));
    let mut plant = SimPlant::new(plant_params);

    // ---- INITIALISE DATASTORE ----

    info!("Initialising modules...");

    let mut ds = DataStore::default();

    // ---- INITIALISE MODULES ----

    ds.steer_ctrl
        .init("steer_ctrl.toml", &session)
        .wrap_err("Failed to initialise SteerCtrl")?;
    info!("SteerCtrl init complete");

    ds.accel_ctrl
        .init("accel_ctrl.toml", &session)
        .wrap_err("Failed to initialise AccelCtrl")?;
    info!("AccelCtrl init complete");

    info!("Module initialisation complete\n");

    // ---- INITIALISE ACTUATORS ----

    info!("Initialising actuators");

    let cst = Cst::new(cst_params);
    cst.init(&mut tx).wrap_err("Failed to initialise the CST")?;
    info!("CST initialised");

    let lss = Lss::new();
    lss.init(&mut tx).wrap_err("Failed to initialise the LSS")?;
    lss.save_position_limits(
        &mut tx,
        exec_params.brake_min_limit_mm,
        exec_params.brake_max_limit_mm,
    )
    .wrap_err("Failed to set the LSS position limits")?;
    lss.set_max_drive_current(
        &mut tx,
        exec_params.brake_max_current_moving,
        exec_params.brake_max_current_holding,
    )
    .wrap_err("Failed to set the LSS drive current")?;

    if exec_params.home_brake_on_start {
        lss.exec_max_homing(&mut tx).wrap_err("Failed to home the LSS")?;
    }
    if exec_params.release_brake_on_start {
        lss.set_brake_release(&mut tx)
            .wrap_err("Failed to release the LSS motor brake")?;
    }
    info!("LSS initialised");

    plant.absorb(&tx.take_sent());

    info!("Actuator initialisation complete");

    // ---- MAIN LOOP ----

    let cycle_period = Duration::from_secs_f64(exec_params.cycle_period_s);
    let cycle_frequency_hz = 1.0 / exec_params.cycle_period_s;

    info!(
        "Begining main loop, commanded speed {} m/s, steering angle {} rad\n",
        exec_params.cmd_speed_mps, exec_params.cmd_steer_angle_rad
    );

    loop {
        // Get cycle start time
        let cycle_start_instant = Instant::now();

        // ---- DATA INPUT ----

        plant.step(exec_params.cycle_period_s);
        for (bus, frame) in plant
            .telemetry_frames()
            .wrap_err("Failed to build simulated telemetry")?
        {
            tx.inject(bus, &frame);
        }

        ds.cycle_start(cycle_frequency_hz, store.snapshot(), store.elapsed_s());

        // ---- SAFETY ----

        if ds.telemetry.safety_ecu.stop_requested() {
            ds.make_safe(SafeModeCause::SafetyEcuStopRequest);
        } else {
            ds.make_unsafe(SafeModeCause::SafetyEcuStopRequest).ok();
        }

        let mut transport_ok = true;

        // ---- STEERING CONTROL ----

        ds.steer_ctrl_input = steer_ctrl::InputData {
            target_angle_rad: exec_params.cmd_steer_angle_rad,
            current_angle_rad: ds.telemetry.vehicle.motion.steering_angle_rad,
        };

        match ds.steer_ctrl.proc(&ds.steer_ctrl_input) {
            Ok((o, r)) => {
                ds.steer_ctrl_output = o;
                ds.steer_ctrl_status_rpt = r;

                if let Err(e) = cst.set_steering_voltage(&mut tx, o.voltage) {
                    warn!("Could not write the steering voltage: {}", e);
                    transport_ok &= !e.is_transport();
                }
            }
            Err(e) => warn!("Error during SteerCtrl processing: {}", e),
        }

        if exec_params.send_fake_speed {
            if let Err(e) = cst.send_speed_msg(&mut tx) {
                warn!("{}", e);
                transport_ok = false;
            }
        }

        // ---- ACCELERATION CONTROL ----

        // In safe mode the gas is released and the brake loop brings the car
        // to rest.
        let cmd_speed_mps = if ds.safe { 0.0 } else { exec_params.cmd_speed_mps };
        let mut accel_input =
            accel_ctrl::InputData::from_telemetry(&ds.telemetry, cmd_speed_mps, ds.time_s);
        accel_input.stop_requested |= ds.safe;

        match ds.accel_ctrl.proc(&accel_input) {
            Ok((o, r)) => {
                ds.accel_ctrl_output = o;
                ds.accel_ctrl_status_rpt = r;

                if let Err(e) = cst.set_pedal_value(&mut tx, o.gas_pedal_pct) {
                    warn!("Could not write the gas pedal: {}", e);
                    transport_ok &= !e.is_transport();
                }

                if let Err(e) = lss.set_target_position(&mut tx, o.brake_position_mm) {
                    warn!("Could not write the brake position: {}", e);
                    transport_ok &= !e.is_transport();
                }
            }
            Err(e) => warn!("Error during AccelCtrl processing: {}", e),
        }

        if ds.num_cycles % exec_params.lss_poll_cycles.max(1) == 0 {
            if let Err(e) = lss.get_actual_position(&mut tx) {
                warn!("Could not poll the brake position: {}", e);
                transport_ok &= !e.is_transport();
            }
        }

        // ---- TRANSPORT MONITORING ----

        if transport_ok {
            ds.num_consec_transport_errors = 0;
            ds.make_unsafe(SafeModeCause::ActuatorTransportFault).ok();
        } else {
            ds.num_consec_transport_errors += 1;

            if ds.num_consec_transport_errors > exec_params.max_transport_errors {
                if !ds.safe {
                    error!(
                        "Maximum number of consecutive actuator transport errors ({}) exceeded",
                        exec_params.max_transport_errors
                    );
                }
                ds.make_safe(SafeModeCause::ActuatorTransportFault);
            }
        }

        // Deliver this cycle's demands to the simulated vehicle
        plant.absorb(&tx.take_sent());

        if ds.is_1_hz_cycle {
            info!(
                "Speed {:.2} m/s (cmd {:.2}), gas {:.1} %, brake {:.1} mm, steer {:.4} rad -> {:.3} V{}",
                ds.accel_ctrl_status_rpt.filtered_speed_mps,
                cmd_speed_mps,
                ds.accel_ctrl_output.gas_pedal_pct,
                ds.accel_ctrl_output.brake_position_mm,
                ds.telemetry.vehicle.motion.steering_angle_rad,
                ds.steer_ctrl_output.voltage,
                if ds.safe { " [SAFE]" } else { "" }
            );
        }

        // ---- CYCLE MANAGEMENT ----

        let cycle_dur = Instant::now() - cycle_start_instant;

        // Get sleep duration
        match cycle_period.checked_sub(cycle_dur) {
            Some(d) => {
                ds.num_consec_cycle_overruns = 0;
                thread::sleep(d);
            }
            None => {
                warn!(
                    "Cycle overran by {:.06} s",
                    cycle_dur.as_secs_f64() - cycle_period.as_secs_f64()
                );
                ds.num_consec_cycle_overruns += 1;
            }
        }

        // Increment cycle counter
        ds.num_cycles += 1;

        if exec_params.num_cycles > 0 && ds.num_cycles >= exec_params.num_cycles {
            info!("Completed {} cycles, stopping", ds.num_cycles);
            break;
        }
    }

    // ---- SHUTDOWN ----

    if let Err(e) = cst.set_pedal_value(&mut tx, 0.0) {
        warn!("Could not release the gas pedal on shutdown: {}", e);
    }

    info!("End of execution");

    Ok(())
}
