//! Entry point for the command-line interface.
#![forbid(unsafe_code)]

fn main() {
    env_logger::init();
    if let Err(err) = vicinity_cli::run() {
        eprintln!("vicinity: {err}");
        std::process::exit(1);
    }
}
