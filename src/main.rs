use clap::{Parser, Subcommand};
use integration_link::{Config, Server, integrations::ProviderRegistry};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "integration-link")]
#[command(about = "OAuth2 account linking for third-party CRM integrations")]
struct Cli {
    #[arg(short, long, help = "Path to configuration file")]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and validate configuration, then list the resolved providers
    CheckConfig,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match cli.config.as_deref() {
        Some(path) => Config::load_from_file(path),
        None => Config::load(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&config.logging.level))
        .init();

    if let Some(Commands::CheckConfig) = cli.command {
        match ProviderRegistry::from_config(&config.providers, &config.base_url) {
            Ok(registry) => {
                for provider in registry.iter() {
                    println!(
                        "{}\t{}\tredirect_uri={}\tpkce={}\tcredentials={}",
                        provider.name,
                        provider.display_name,
                        provider.redirect_uri,
                        provider.use_pkce,
                        if provider.is_configured() { "set" } else { "missing" }
                    );
                }
            }
            Err(e) => {
                error!("Invalid provider configuration: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    info!("Starting integration-link");

    let server = match Server::new(config).await {
        Ok(server) => server,
        Err(e) => {
            error!("Failed to initialize server: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run().await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}
