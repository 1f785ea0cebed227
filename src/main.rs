use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use secrecy::SecretString;

use illdata::config::{ClientConfig, paths};
use illdata::{ConnectionSettings, ProposalDataClient};

/// Environment variable consulted when the config file has no password
const PASSWORD_ENV: &str = "ILLDATA_PASSWORD";

#[derive(Debug, Parser)]
#[command(name = "illdata", version, about = "Browse and transfer ILL proposal data")]
struct Cli {
    /// Config file (defaults to the per-user config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Server hostname
    #[arg(long)]
    host: Option<String>,

    /// Login name
    #[arg(short, long)]
    user: Option<String>,

    /// SSH port
    #[arg(short, long)]
    port: Option<u16>,

    /// known_hosts file used to verify the server key
    #[arg(long, value_name = "FILE")]
    known_hosts: Option<String>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List proposals available to the user
    Proposals,
    /// List a directory of a proposal
    Ls {
        proposal: String,
        #[arg(default_value = ".")]
        path: String,
        /// Show permissions, size and modification time
        #[arg(short, long)]
        long: bool,
    },
    /// Download a file from a proposal
    Get {
        proposal: String,
        remote: String,
        local: PathBuf,
    },
    /// Upload a file into a proposal
    Put {
        proposal: String,
        local: PathBuf,
        remote: String,
    },
}

impl Cli {
    fn settings(&self) -> anyhow::Result<ConnectionSettings> {
        let config = match &self.config {
            Some(path) => ClientConfig::load(path)?,
            None => ClientConfig::load_default()?,
        };

        let mut server = config.server;
        if let Some(host) = &self.host {
            server.hostname = Some(host.clone());
        }
        if let Some(user) = &self.user {
            server.username = Some(user.clone());
        }
        if let Some(port) = self.port {
            server.port = port;
        }
        if let Some(known_hosts) = &self.known_hosts {
            server.known_hosts = Some(known_hosts.clone());
        }
        if server.password.is_none() {
            server.password = std::env::var(PASSWORD_ENV).ok().map(SecretString::from);
        }

        Ok(server.into_connection_settings()?)
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_dir = paths::ensure_log_dir().ok();
    let _guard = illdata::logging::init_logging(
        illdata::logging::level_for_verbosity(cli.verbose),
        log_dir,
    );

    let settings = cli.settings().context("Invalid connection settings")?;

    let runtime = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;
    runtime.block_on(run(settings, cli.command))
}

async fn run(settings: ConnectionSettings, command: Command) -> anyhow::Result<()> {
    let mut client = ProposalDataClient::new(settings);

    client
        .with_session(async move |client| match command {
            Command::Proposals => {
                for id in client.list_proposals().await? {
                    println!("{id}");
                }
                Ok(())
            }
            Command::Ls {
                proposal,
                path,
                long,
            } => {
                client.open_proposal(&proposal).await?;
                if long {
                    for entry in client.list_dir_attr(&path).await? {
                        println!(
                            "{} {:>12} {} {}",
                            entry.mode_string(),
                            entry.size,
                            entry.formatted_modified(),
                            entry.name
                        );
                    }
                } else {
                    for name in client.list_dir(&path).await? {
                        println!("{name}");
                    }
                }
                Ok(())
            }
            Command::Get {
                proposal,
                remote,
                local,
            } => {
                client.open_proposal(&proposal).await?;
                let bytes = client.download(&remote, &local).await?;
                println!("{} -> {} ({} bytes)", remote, local.display(), bytes);
                Ok(())
            }
            Command::Put {
                proposal,
                local,
                remote,
            } => {
                client.open_proposal(&proposal).await?;
                let bytes = client.upload(&local, &remote).await?;
                println!("{} -> {} ({} bytes)", local.display(), remote, bytes);
                Ok(())
            }
        })
        .await?;

    Ok(())
}
