//! # Communications interface crate.
//!
//! Provides the bus-level interfaces shared by the drive-by-wire software: the
//! CAN frame type, the transport and frame handler seams, and a simulated
//! transport for running without hardware.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// CAN frames, transports and receive dispatch
pub mod can;
