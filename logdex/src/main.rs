//! Entry point for the `logdex` binary: a single-node log indexing and search engine.

mod bootstrap;
mod index;

use std::process::ExitCode;

fn main() -> ExitCode {
    let config = config::Config::load();
    config.logging_config.init();

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("failed to start the async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(bootstrap::run(config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            observability_deps::tracing::error!(error = %e, "logdex exited with an error");
            ExitCode::FAILURE
        }
    }
}
