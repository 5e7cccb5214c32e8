use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use banter::{config, gateway, secrets};

#[derive(Parser)]
#[command(name = "banter")]
#[command(about = "A simulated group chat where configured AI personas respond to human messages")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway server
    Gateway {
        /// Port to bind to (overrides config)
        #[arg(short, long)]
        port: Option<u16>,

        /// Bind address (overrides config)
        #[arg(short, long)]
        bind: Option<String>,

        /// Auth token (required for non-loopback)
        #[arg(long, env = "BANTER_TOKEN")]
        token: Option<String>,
    },

    /// Store a provider API key in the local credential store
    Login {
        /// Provider to store a key for (gemini or openai)
        #[arg(default_value = "gemini")]
        provider: String,
    },

    /// Show configuration status
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Gateway { port, bind, token } => {
            let mut config = config::load()?;
            if let Some(port) = port {
                config.gateway.port = port;
            }
            if let Some(bind) = bind {
                config.gateway.bind = bind;
            }
            gateway::run(config, token).await
        }
        Commands::Login { provider } => {
            let api_key = rpassword::prompt_password(format!("Enter {provider} API key: "))?;
            let path = secrets::CredentialStore::open().store(&provider, &api_key)?;
            println!("Key stored at {}", path.display());
            Ok(())
        }
        Commands::Status => {
            let config = config::load()?;
            println!("banter v{}", env!("CARGO_PKG_VERSION"));
            println!("state dir: {}", config::state_dir().display());
            println!("provider: {}", config.provider.kind);
            println!(
                "api key: {}",
                if config.provider.api_key.is_some() {
                    "configured"
                } else {
                    "not configured (agents will use fallback lines)"
                }
            );
            println!("rooms: {}", config.rooms.len());
            println!("personas: {}", config.personas.len());
            Ok(())
        }
    }
}
