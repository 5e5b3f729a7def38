use std::process::ExitCode;

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    concierge_cli::run()
}
