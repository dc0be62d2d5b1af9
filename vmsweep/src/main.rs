use clap::Parser;
use std::path::PathBuf;

use vmsweep::logging::init_logging;
use vmsweep::{Config, ConfigBuilder, SweepResult, Sweeper};

#[derive(Parser)]
#[command(name = "vmsweep", version)]
#[command(about = "Power off and destroy virtual machines by name", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Inventory service address
    #[arg(short = 'a', long = "addr")]
    address: Option<String>,

    /// Inventory service port [default: 443]
    #[arg(short = 'o', long)]
    port: Option<u16>,

    /// User name for the connection
    #[arg(short = 'u', long)]
    user: Option<String>,

    /// Password for the connection
    #[arg(short = 'p', long)]
    password: Option<String>,

    /// Only look for VMs directly inside this folder
    #[arg(short = 'f', long)]
    folder: Option<String>,

    /// Report the session and every task request on stdout
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Inventory backend type
    #[arg(long)]
    backend: Option<String>,

    /// YAML inventory file for the simulated backend
    #[arg(long)]
    inventory: Option<PathBuf>,

    /// Names of the VMs to power off and destroy
    #[arg(required = true, num_args = 1..)]
    vms: Vec<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        match e.fault_message() {
            Some(message) => eprintln!("Caught inventory fault: {}", message),
            None => eprintln!("Error: {}", e),
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> SweepResult<()> {
    let config = load_config(&cli)?;
    init_logging(&config.logging, cli.verbose)?;

    Sweeper::new(config)
        .verbose(cli.verbose)
        .run(cli.folder.as_deref(), &cli.vms)
        .await?;
    Ok(())
}

/// Defaults, then the config file or environment, then command-line flags
fn load_config(cli: &Cli) -> SweepResult<Config> {
    let base = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env(),
    };

    let mut builder = ConfigBuilder::from_config(base);
    if let Some(address) = &cli.address {
        builder = builder.address(address);
    }
    if let Some(port) = cli.port {
        builder = builder.port(port);
    }
    if let Some(user) = &cli.user {
        builder = builder.user(user);
    }
    if let Some(password) = &cli.password {
        builder = builder.password(password);
    }
    if let Some(backend) = &cli.backend {
        builder = builder.backend(backend);
    }
    if let Some(inventory) = &cli.inventory {
        builder = builder.inventory_path(inventory);
    }
    builder.build()
}
