pub mod args;
pub mod state;

pub use args::{Cli, CliCommand, RunCliArgs, StateCliArgs, StateCommand};
pub use state::handle_state_command;
