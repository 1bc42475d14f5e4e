//! Cyclic module interface
//!
//! Controllers run by `dbw_exec` share one lifecycle: configured once from
//! their parameter file, processed once per control cycle, and returned to a
//! known state whenever the executable enters safe mode.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal imports
use crate::session::Session;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A controller processed once per cycle.
pub trait State {
    /// Initialisation argument, the parameter file name for every controller
    /// in `dbw_exec`.
    type InitData;
    type InitError;

    type InputData;
    type OutputData;

    /// Diagnostics of one cycle, stored alongside the output.
    type StatusReport;
    type ProcError;

    /// Configure the module, replacing any previous state.
    fn init(&mut self, init_data: Self::InitData, session: &Session)
        -> Result<(), Self::InitError>;

    /// Run one cycle.
    ///
    /// An error leaves the previous output in force, the caller decides
    /// whether to keep driving with it.
    fn proc(&mut self, input_data: &Self::InputData)
        -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError>;

    /// Drop accumulated history and return the outputs to their rest values.
    /// Parameters are kept.
    fn make_safe(&mut self);
}
