use clap::Parser;

mod commands;
mod logging;
mod settings;

use settings::Settings;

fn main() -> std::process::ExitCode {
    let settings = Settings::parse();
    logging::setup_logging();

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to start async runtime: {}", e);
            return std::process::ExitCode::FAILURE;
        }
    };

    match rt.block_on(commands::run(settings)) {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            std::process::ExitCode::FAILURE
        }
    }
}
