use std::process::ExitCode;

fn main() -> ExitCode {
    paperquote_cli::run()
}
