//! Entry point for the `vigild` daemon.

use std::process::ExitCode;

fn main() -> ExitCode {
    match vigild::run_daemon() {
        Ok(()) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}
