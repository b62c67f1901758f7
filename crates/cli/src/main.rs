use std::process::ExitCode;

fn main() -> ExitCode {
    tradehub_cli::run()
}
