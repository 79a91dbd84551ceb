use arbcore::app::App;
use arbcore::cli::{Cli, Commands};
use arbcore::config::Config;
use clap::Parser;
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let mut config = match Config::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("failed to load config {}: {e}", cli.config.display());
            std::process::exit(1);
        }
    };

    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    config.init_logging();

    match cli.command {
        Commands::Check => {
            info!("configuration OK");
        }
        Commands::Run => {
            info!("arbcore starting");
            let app = match App::new(config) {
                Ok(app) => app,
                Err(e) => {
                    error!(error = %e, "failed to construct application");
                    std::process::exit(1);
                }
            };

            if let Err(e) = app.run(async {
                let _ = signal::ctrl_c().await;
            }).await {
                error!(error = %e, "fatal error");
                std::process::exit(1);
            }

            info!("arbcore stopped");
        }
    }
}
