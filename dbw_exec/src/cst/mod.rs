//! # CST analog output unit
//!
//! The CST turns frames on the actuator bus into voltages on its analog
//! outputs. One output drives the electronic gas pedal, the other the power
//! steering unit. Before use the unit is synchronised and configured by a
//! fixed handshake, see [`Cst::init`].

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use comms_if::can::{BusId, Frame, FrameError, Transport, TransportError};
use log::{debug, info, trace, warn};
use std::thread;
use std::time::Duration;

// Internal
pub use params::Params;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Identifier of synchronisation and configuration frames.
pub const CONFIG_ID: u32 = 0x7e5;

/// Identifier the unit reads the global control variable from.
pub const CONTROL_ID: u32 = 0x10;

/// Identifier the unit writes its status on.
pub const STATUS_ID: u32 = 0x11;

/// Identifier of the write-all-channels variable.
pub const ALL_CHANNELS_ID: u32 = 0x33;

/// Identifier of the pedal voltage channel.
pub const PEDAL_ID: u32 = 0x35;

/// Identifier of the steering voltage channel.
pub const STEERING_ID: u32 = 0x36;

/// Identifier of the fake vehicle speed frame.
pub const FAKE_SPEED_ID: u32 = 0x090;

/// Default number of synchronisation frames.
pub const SYNC_FRAME_COUNT: usize = 500;

const SYNC_PAYLOAD: [u8; 8] = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
const CONFIG_MODE: [u8; 2] = [0x04, 0x01];
const OPERATION_MODE: [u8; 2] = [0x04, 0x00];
const PROBE_PRESENCE: u8 = 0x82;
const PROBE_MANUFACTURER: u8 = 0x24;
const PROBE_PRODUCT: u8 = 0x25;
const PROBE_SERIAL: u8 = 0x26;

/// Speed frame the power steering unit normally receives from the ABS, with
/// the speed bytes set to 2.75 km/h.
pub const FAKE_SPEED_PAYLOAD: [u8; 8] = [0x00, 0x81, 0x75, 0x76, 0x00, 0x2c, 0x00, 0x00];

/// Full scale of the analog outputs.
///
/// Units: volts
pub const V_MAX: f64 = 10.0;

/// Number of codes over the full scale.
pub const CODE_FULL_SCALE: f64 = 4096.0;

/// Physical limits of the power steering input. Exceeding these can damage
/// the power steering unit.
///
/// Units: volts
pub const STEERING_PHYSICAL_MIN_V: f64 = 0.5;
pub const STEERING_PHYSICAL_MAX_V: f64 = 4.5;

/// Pedal scale after converting percent to pedal counts.
pub const PEDAL_COUNTS_PER_PCT: f64 = 2.5;
pub const PEDAL_MAX_COUNTS: f64 = 250.0;

/// Linear fit from pedal counts to pedal sensor voltage.
const PEDAL_V_PER_COUNT: f64 = 0.0182;
const PEDAL_V_OFFSET: f64 = 0.5325;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Driver for the analog output unit.
#[derive(Debug, Default, Clone)]
pub struct Cst {
    params: Params,
}

/// One step of the configuration handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeStep {
    pub kind: StepKind,
    pub frame: Frame,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Sync,
    ConfigMode,
    Probe,
    AssignVariable,
    OperationMode,
}

/// Analog output channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Pedal,
    Steering,
}

#[derive(Debug, thiserror::Error)]
pub enum CstError {
    #[error("Voltage {voltage} V gives code {code}, outside the 12 bit range")]
    VoltageCodeOutOfRange { voltage: f64, code: i64 },

    #[error("Steering voltage {0} V is outside the physical limits [0.5, 4.5] V")]
    SteeringVoltageOutOfLimits(f64),

    #[error("Pedal value {0} % is outside [0, 100] %")]
    PedalOutOfRange(f64),

    #[error("Could not send {0:?} frame: {1}")]
    Transport(StepKind, TransportError),

    #[error("Could not send to the {0:?} channel: {1}")]
    ChannelTransport(Channel, TransportError),

    #[error("Could not send the fake speed frame: {0}")]
    FakeSpeedTransport(TransportError),

    #[error("Could not build frame: {0}")]
    FrameError(#[from] FrameError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Channel {
    pub fn id(&self) -> u32 {
        match self {
            Channel::Pedal => PEDAL_ID,
            Channel::Steering => STEERING_ID,
        }
    }
}

impl CstError {
    /// True if the request was valid but a frame could not be sent.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            CstError::Transport(..) | CstError::ChannelTransport(..) | CstError::FakeSpeedTransport(_)
        )
    }
}

impl Cst {
    pub fn new(params: Params) -> Self {
        Self { params }
    }

    /// Synchronise and configure the unit.
    ///
    /// Synchronisation frames and probes are best effort, their failures are
    /// logged and the handshake continues. Mode switches and variable
    /// assignments must all reach the unit in order, the first failure aborts
    /// the handshake.
    pub fn init<T>(&self, tx: &mut T) -> Result<(), CstError>
    where
        T: Transport + ?Sized,
    {
        info!(
            "CST initialisation, sending {} sync frames",
            self.params.sync_frame_count
        );

        let sync_interval = Duration::from_micros(self.params.sync_interval_us);
        let probe_interval = Duration::from_micros(self.params.probe_interval_us);
        let mut num_sync_failures = 0;

        for step in handshake_plan(self.params.sync_frame_count)? {
            match (step.kind, tx.send(BusId::Actuator, &step.frame)) {
                (_, Ok(())) => (),
                (StepKind::Sync, Err(_)) => num_sync_failures += 1,
                (StepKind::Probe, Err(e)) => {
                    warn!("CST probe {:#04x} not sent: {}", step.frame.data()[0], e)
                }
                (kind, Err(e)) => return Err(CstError::Transport(kind, e)),
            }

            match step.kind {
                StepKind::Sync => pause(sync_interval),
                StepKind::Probe => pause(probe_interval),
                _ => (),
            }
        }

        if num_sync_failures > 0 {
            warn!("{} CST sync frames could not be sent", num_sync_failures);
        }

        info!("CST configuration finished");

        Ok(())
    }

    /// Write a voltage to a channel.
    pub fn set_voltage<T>(&self, tx: &mut T, channel: Channel, voltage: f64) -> Result<(), CstError>
    where
        T: Transport + ?Sized,
    {
        let code = match voltage_to_code(voltage) {
            Ok(c) => c,
            Err(e) => {
                warn!("{}", e);
                return Err(e);
            }
        };

        let frame = Frame::new(channel.id(), &code.to_le_bytes())?;

        trace!("CST {:?} <- {:.4} V (code {})", channel, voltage, code);

        tx.send(BusId::Actuator, &frame)
            .map_err(|e| CstError::ChannelTransport(channel, e))
    }

    /// Drive the power steering input. Voltages outside the physical limits
    /// are always refused.
    pub fn set_steering_voltage<T>(&self, tx: &mut T, voltage: f64) -> Result<(), CstError>
    where
        T: Transport + ?Sized,
    {
        if !(STEERING_PHYSICAL_MIN_V..=STEERING_PHYSICAL_MAX_V).contains(&voltage) {
            warn!("Steering voltage {} V outside physical limits", voltage);
            return Err(CstError::SteeringVoltageOutOfLimits(voltage));
        }

        self.set_voltage(tx, Channel::Steering, voltage)
    }

    /// Set the gas pedal, in percent.
    pub fn set_pedal_value<T>(&self, tx: &mut T, pedal_pct: f64) -> Result<(), CstError>
    where
        T: Transport + ?Sized,
    {
        let voltage = match pedal_to_voltage(pedal_pct) {
            Some(v) => v,
            None => {
                warn!("Pedal value {} % out of range", pedal_pct);
                return Err(CstError::PedalOutOfRange(pedal_pct));
            }
        };

        debug!("Pedal {:.2} % -> {:.4} V", pedal_pct, voltage);

        self.set_voltage(tx, Channel::Pedal, voltage)
    }

    /// Send the power steering unit a vehicle speed of 2.75 km/h, keeping
    /// its assistance at the maximum whatever the real speed.
    pub fn send_speed_msg<T>(&self, tx: &mut T) -> Result<(), CstError>
    where
        T: Transport + ?Sized,
    {
        tx.send(BusId::Actuator, &fake_speed_frame())
            .map_err(CstError::FakeSpeedTransport)
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// The ordered handshake frames.
pub fn handshake_plan(sync_frame_count: usize) -> Result<Vec<HandshakeStep>, FrameError> {
    let step = |kind, payload: &[u8]| -> Result<HandshakeStep, FrameError> {
        Ok(HandshakeStep {
            kind,
            frame: Frame::new(CONFIG_ID, payload)?,
        })
    };

    let mut plan = Vec::with_capacity(sync_frame_count + 14);

    let sync = step(StepKind::Sync, &SYNC_PAYLOAD)?;
    plan.extend(std::iter::repeat(sync).take(sync_frame_count));

    plan.push(step(StepKind::ConfigMode, &CONFIG_MODE)?);
    for probe in [PROBE_PRESENCE, PROBE_MANUFACTURER, PROBE_PRODUCT, PROBE_SERIAL].iter() {
        plan.push(step(StepKind::Probe, &[*probe])?);
    }
    plan.push(step(StepKind::OperationMode, &OPERATION_MODE)?);

    plan.push(step(StepKind::ConfigMode, &CONFIG_MODE)?);
    for (direction, variable, id) in VARIABLE_ASSIGNMENTS.iter() {
        plan.push(step(
            StepKind::AssignVariable,
            &[0x80, *direction, *variable, *id as u8, 0x00],
        )?);
    }
    plan.push(step(StepKind::OperationMode, &OPERATION_MODE)?);

    Ok(plan)
}

/// Convert a voltage into the 12 bit output code.
pub fn voltage_to_code(voltage: f64) -> Result<u16, CstError> {
    let code = (voltage / V_MAX * CODE_FULL_SCALE).round();

    if !(0.0..CODE_FULL_SCALE).contains(&code) {
        return Err(CstError::VoltageCodeOutOfRange {
            voltage,
            code: code as i64,
        });
    }

    Ok(code as u16)
}

/// Pedal sensor voltage for a pedal percentage, or `None` if outside
/// [0, 100] %.
pub fn pedal_to_voltage(pedal_pct: f64) -> Option<f64> {
    let counts = pedal_pct * PEDAL_COUNTS_PER_PCT;

    if !(0.0..=PEDAL_MAX_COUNTS).contains(&counts) {
        return None;
    }

    Some(PEDAL_V_PER_COUNT * counts + PEDAL_V_OFFSET)
}

/// Voltage written for a 12 bit output code.
pub fn code_to_voltage(code: u16) -> f64 {
    code as f64 / CODE_FULL_SCALE * V_MAX
}

/// Pedal percentage read back from a pedal sensor voltage.
pub fn voltage_to_pedal(voltage: f64) -> f64 {
    (voltage - PEDAL_V_OFFSET) / PEDAL_V_PER_COUNT / PEDAL_COUNTS_PER_PCT
}

pub fn fake_speed_frame() -> Frame {
    Frame::from_array(FAKE_SPEED_ID, FAKE_SPEED_PAYLOAD)
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// (direction, variable, identifier) of each variable assignment. Direction 0
/// is written by the software, 1 read by it.
const VARIABLE_ASSIGNMENTS: [(u8, u8, u32); 5] = [
    (0x00, 0x00, CONTROL_ID),
    (0x01, 0x00, STATUS_ID),
    (0x00, 0x01, ALL_CHANNELS_ID),
    (0x00, 0x02, PEDAL_ID),
    (0x00, 0x03, STEERING_ID),
];

fn pause(d: Duration) {
    if d > Duration::from_secs(0) {
        thread::sleep(d);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use comms_if::can::sim::SimTransport;

    fn test_cst(sync_frame_count: usize) -> Cst {
        Cst::new(Params {
            sync_frame_count,
            sync_interval_us: 0,
            probe_interval_us: 0,
        })
    }

    #[test]
    fn test_voltage_to_code() {
        assert_eq!(voltage_to_code(0.0).unwrap(), 0);
        assert_eq!(voltage_to_code(2.5).unwrap(), 1024);
        assert_eq!(voltage_to_code(9.99).unwrap(), 4092);
        assert!(matches!(
            voltage_to_code(10.0),
            Err(CstError::VoltageCodeOutOfRange { code: 4096, .. })
        ));
        assert!(voltage_to_code(-0.1).is_err());
    }

    #[test]
    fn test_readback() {
        assert_eq!(code_to_voltage(1024), 2.5);

        let v = pedal_to_voltage(40.0).unwrap();
        assert!((voltage_to_pedal(v) - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_set_voltage_frames() {
        let cst = test_cst(0);
        let mut tx = SimTransport::new();

        cst.set_voltage(&mut tx, Channel::Pedal, 2.5).unwrap();
        assert!(cst.set_voltage(&mut tx, Channel::Pedal, 10.0).is_err());

        assert_eq!(tx.sent().len(), 1);
        let frame = tx.sent()[0].1;
        assert_eq!(frame.id(), PEDAL_ID);
        assert_eq!(frame.data(), &[0x00, 0x04]);
    }

    #[test]
    fn test_steering_limits() {
        let cst = test_cst(0);
        let mut tx = SimTransport::new();

        assert!(matches!(
            cst.set_steering_voltage(&mut tx, 4.6),
            Err(CstError::SteeringVoltageOutOfLimits(_))
        ));
        assert!(matches!(
            cst.set_steering_voltage(&mut tx, 0.49),
            Err(CstError::SteeringVoltageOutOfLimits(_))
        ));
        assert!(tx.sent().is_empty());

        cst.set_steering_voltage(&mut tx, 0.5).unwrap();
        cst.set_steering_voltage(&mut tx, 4.5).unwrap();
        assert_eq!(tx.sent_with_id(STEERING_ID).len(), 2);
    }

    #[test]
    fn test_pedal() {
        assert_eq!(pedal_to_voltage(0.0), Some(0.5325));
        assert!((pedal_to_voltage(100.0).unwrap() - 5.0825).abs() < 1e-9);
        assert_eq!(pedal_to_voltage(100.1), None);
        assert_eq!(pedal_to_voltage(-1.0), None);

        let cst = test_cst(0);
        let mut tx = SimTransport::new();
        cst.set_pedal_value(&mut tx, 50.0).unwrap();
        assert!(matches!(
            cst.set_pedal_value(&mut tx, 120.0),
            Err(CstError::PedalOutOfRange(_))
        ));

        // 0.0182 * 125 + 0.5325 = 2.8075 V -> code 1150
        let frames = tx.sent_with_id(PEDAL_ID);
        assert_eq!(frames.len(), 1);
        assert_eq!(u16::from_le_bytes([frames[0].data()[0], frames[0].data()[1]]), 1150);
    }

    #[test]
    fn test_handshake_order() {
        let plan = handshake_plan(3).unwrap();
        let kinds: Vec<StepKind> = plan.iter().map(|s| s.kind).collect();

        use StepKind::*;
        assert_eq!(
            kinds,
            vec![
                Sync, Sync, Sync,
                ConfigMode, Probe, Probe, Probe, Probe, OperationMode,
                ConfigMode,
                AssignVariable, AssignVariable, AssignVariable, AssignVariable, AssignVariable,
                OperationMode,
            ]
        );
        assert!(plan.iter().all(|s| s.frame.id() == CONFIG_ID));

        assert_eq!(plan[0].frame.data(), &SYNC_PAYLOAD);
        assert_eq!(plan[3].frame.data(), &[0x04, 0x01]);
        assert_eq!(plan[4].frame.data(), &[0x82]);
        assert_eq!(plan[8].frame.data(), &[0x04, 0x00]);
        assert_eq!(plan[13].frame.data(), &[0x80, 0x00, 0x02, 0x35, 0x00]);
        assert_eq!(plan[14].frame.data(), &[0x80, 0x00, 0x03, 0x36, 0x00]);

        assert_eq!(handshake_plan(SYNC_FRAME_COUNT).unwrap().len(), SYNC_FRAME_COUNT + 13);
    }

    #[test]
    fn test_init_tolerates_probe_failures() {
        let cst = test_cst(2);
        let mut tx = SimTransport::new();

        // First sync frame and the presence probe fail
        tx.fail_attempt(0);
        tx.fail_attempt(3);

        cst.init(&mut tx).unwrap();
        assert_eq!(tx.sent().len(), 2 + 13 - 2);
    }

    #[test]
    fn test_init_aborts_on_assignment_failure() {
        let cst = test_cst(1);
        let mut tx = SimTransport::new();

        // Third variable assignment
        tx.fail_attempt(1 + 6 + 1 + 2);

        assert!(matches!(
            cst.init(&mut tx),
            Err(CstError::Transport(StepKind::AssignVariable, _))
        ));

        // Nothing after the failed step was sent
        let last = tx.sent().last().unwrap().1;
        assert_eq!(last.data(), &[0x80, 0x01, 0x00, 0x11, 0x00]);
    }

    #[test]
    fn test_fake_speed_frame() {
        let cst = test_cst(0);
        let mut tx = SimTransport::new();

        cst.send_speed_msg(&mut tx).unwrap();

        let (bus, frame) = tx.sent()[0];
        assert_eq!(bus, BusId::Actuator);
        assert_eq!(frame.id(), 0x90);
        assert_eq!(frame.data(), &[0x00, 0x81, 0x75, 0x76, 0x00, 0x2c, 0x00, 0x00]);

        // Decodes as 2.75 km/h
        match crate::veh_state::decode(&frame) {
            Some(crate::veh_state::StateUpdate::Speed(s)) => {
                assert!((s.speed_mps * 3.6 - 2.75).abs() < 1e-9)
            }
            u => panic!("Unexpected update {:?}", u),
        }
    }
}
