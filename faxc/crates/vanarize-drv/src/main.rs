use std::path::PathBuf;
use std::process::ExitCode;

use vanarize_drv::{compile_and_run, DriverError};

const EXIT_OK: u8 = 0;
const EXIT_USAGE: u8 = 64;
const EXIT_COMPILE: u8 = 65;
const EXIT_IO: u8 = 74;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("VANARIZE_LOG", "warn")).init();

    let mut args = std::env::args_os().skip(1);
    let path = match args.next() {
        Some(p) => PathBuf::from(p),
        None => {
            eprintln!("usage: vanarize <path>");
            return ExitCode::from(EXIT_USAGE);
        }
    };
    if args.next().is_some() {
        eprintln!("usage: vanarize <path>");
        return ExitCode::from(EXIT_USAGE);
    }

    match compile_and_run(&path) {
        Ok(_) => ExitCode::from(EXIT_OK),
        Err(e @ DriverError::Io { .. }) => {
            eprintln!("error: {e}");
            ExitCode::from(EXIT_IO)
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(EXIT_COMPILE)
        }
    }
}
