use anyhow::{Context, Result};
use chainforge_tools::config::{Config, ConfigLoader};
use chainforge_tools::{logging, DeploymentSession, EnvSecrets};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "chainforge")]
#[command(about = "Deployment configuration tools for smart-contract build and migration runs")]
struct Cli {
    /// Configuration file (TOML, or JSON with a .json extension). Defaults to the embedded configuration
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and validate the configuration, then print it
    Config {
        /// Print as JSON (API keys masked)
        #[arg(long)]
        json: bool,
    },
    /// List declared networks
    Networks,
    /// Build the signing provider for a network from keys in the environment
    Provider {
        /// Network to bind the provider to
        #[arg(short, long)]
        network: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.log_level, cli.log_json)?;

    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Config { json } => {
            if json {
                println!("{}", config.to_json()?);
            } else {
                config.print_summary();
            }
        }
        Commands::Networks => {
            for network in &config.networks {
                println!(
                    "{:<18} {:<50} network id {}",
                    network.name,
                    network.rpc_url(),
                    network.network_id
                );
            }
        }
        Commands::Provider { network } => {
            let session = DeploymentSession::new(&config, &network)?;
            let secrets = EnvSecrets::with_dotenv()?;
            let provider = session
                .provider(&secrets)
                .with_context(|| format!("Cannot build signing provider for '{}'", network))?;
            println!("Signing provider ready for {}", provider.network());
            println!("  RPC URL:     {}", provider.rpc_url());
            println!("  Network ID:  {}", provider.network_id());
            println!("  Accounts:    {}", provider.account_count());
        }
    }

    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    let loader = match path {
        Some(path) => ConfigLoader::from_path(path),
        None => ConfigLoader::new(),
    };
    loader.load().with_context(|| match path {
        Some(path) => format!("Invalid configuration in {}", path.display()),
        None => "Invalid embedded configuration".to_string(),
    })
}
