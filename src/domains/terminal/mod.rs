pub mod command_builder;
pub mod driver;
pub mod id;
pub mod manager;
pub mod readiness;

#[cfg(test)]
pub mod testing;

pub use driver::{DriveOutcome, DriverState, SessionDriverParams, drive_session};
pub use id::{RUNNER_TERMINAL_ID, terminal_id_for_poller, terminal_id_for_session};
pub use manager::{
    CreateTerminalRequest, OutputVisibility, TerminalBackend, TerminalManager, TerminalOutput,
};
