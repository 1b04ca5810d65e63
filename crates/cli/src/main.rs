use std::process::ExitCode;

fn main() -> ExitCode {
    chief_cli::run()
}
