use clap::{Parser, Subcommand};
use log::LevelFilter;
use mini_share::core::config::{DEFAULT_PEER_PORT, DEFAULT_REGISTRY_PORT};
use mini_share::utils::setup_logging;
use mini_share::{Config, Node, RegistryConfig, RegistryServer, Result};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(name = "mini-share")]
#[command(about = "Share files between peers found through a rendezvous registry")]
#[command(version)]
struct Cli {
    /// Log level when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: LevelFilter,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the peer registry
    Registry {
        /// Port to listen on
        #[arg(short, long, default_value_t = DEFAULT_REGISTRY_PORT)]
        port: u16,
        /// Interface to bind
        #[arg(long, default_value = "0.0.0.0")]
        bind: String,
    },
    /// Start a peer node with an interactive prompt
    Peer {
        /// Port to listen on
        #[arg(short, long, default_value_t = DEFAULT_PEER_PORT)]
        port: u16,
        /// Directory to share files from and download into
        #[arg(short, long, default_value = "./files")]
        dir: PathBuf,
        /// Registry address (host:port)
        #[arg(short, long, default_value = "127.0.0.1:8000")]
        registry: String,
        /// Address other peers use to reach this one
        #[arg(short, long, default_value = "127.0.0.1")]
        advertise: String,
        /// Per-operation network timeout in seconds
        #[arg(long, default_value_t = 10)]
        timeout: u64,
    },
    /// Print the peers known to the registry
    Peers {
        /// Registry address (host:port)
        #[arg(short, long, default_value = "127.0.0.1:8000")]
        registry: String,
    },
    /// Download one file and exit
    Fetch {
        /// Name of the file to download
        #[arg(short, long)]
        file: String,
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
        /// Registry address (host:port)
        #[arg(short, long, default_value = "127.0.0.1:8000")]
        registry: String,
    },
}

const HELP: &str = "\
Available commands:
  share <filename>   - Share a file (it must already be in the shared directory)
  list-peers         - List peers known to the registry
  get <filename>     - Download a file from peers
  files              - List files this peer shares
  status             - Show download status
  help               - Show this text
  exit               - Exit";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.log_level);

    match cli.command {
        Commands::Registry { port, bind } => {
            let config = RegistryConfig {
                bind_address: bind,
                port,
                ..RegistryConfig::default()
            };
            let server = RegistryServer::bind(&config).await?;
            server
                .run_until(async {
                    let _ = tokio::signal::ctrl_c().await;
                    log::info!("Ctrl+C received, shutting down");
                })
                .await;
        }
        Commands::Peer {
            port,
            dir,
            registry,
            advertise,
            timeout,
        } => {
            let config = Config {
                port,
                shared_dir: dir,
                registry_addr: registry,
                advertise_address: advertise,
                io_timeout_secs: timeout,
                ..Config::default()
            };
            let node = Node::new(config).await?;
            let addr = node.start_server().await?;
            if let Err(e) = node.register(addr.port()).await {
                log::error!("Error registering with the registry: {}", e);
            }
            run_prompt(&node).await?;
            node.shutdown();
        }
        Commands::Peers { registry } => {
            let node = Node::new(one_shot_config(registry)).await?;
            for peer in node.peers().await? {
                println!("{}", peer);
            }
        }
        Commands::Fetch {
            file,
            output,
            registry,
        } => {
            let node = Node::new(one_shot_config(registry)).await?;
            let outcome = node.fetch(&file, &output).await?;
            println!("Download completed: {:?} ({} bytes)", outcome.output, outcome.bytes);
        }
    }

    Ok(())
}

fn one_shot_config(registry_addr: String) -> Config {
    Config {
        port: 0,
        shared_dir: std::env::temp_dir().join("mini-share"),
        registry_addr,
        ..Config::default()
    }
}

async fn run_prompt(node: &Node) -> Result<()> {
    println!("{}", HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            println!("Exiting.");
            return Ok(());
        };

        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts.as_slice() {
            [] => continue,
            ["share", filename] => match node.publish(filename).await {
                Ok(summary) => println!(
                    "File '{}' is now shared with peers ({} chunks).",
                    filename, summary.num_chunks
                ),
                Err(e) => println!("Could not share '{}': {}", filename, e),
            },
            ["list-peers"] => match node.peers().await {
                Ok(peers) => {
                    println!("Active peers:");
                    for peer in peers {
                        println!("  {}", peer);
                    }
                }
                Err(e) => println!("Error getting peer list: {}", e),
            },
            ["get", filename] => {
                let output = match node.download_path(filename) {
                    Ok(output) => output,
                    Err(e) => {
                        println!("Cannot download '{}': {}", filename, e);
                        continue;
                    }
                };
                match node.fetch(filename, &output).await {
                    Ok(outcome) => println!(
                        "File '{}' downloaded successfully ({} bytes).",
                        filename, outcome.bytes
                    ),
                    Err(e) => println!("Download of '{}' failed: {}", filename, e),
                }
            }
            ["files"] => {
                for (name, chunks) in node.shared_files().await {
                    println!("  {} ({} chunks)", name, chunks);
                }
            }
            ["status"] => {
                let transfers = node.transfers().await;
                if transfers.is_empty() {
                    println!("No transfers.");
                }
                for status in transfers {
                    println!("  {}", status);
                }
            }
            ["help"] => println!("{}", HELP),
            ["exit"] => {
                println!("Exiting.");
                return Ok(());
            }
            ["share" | "get", ..] => println!("Usage: {} <filename>", parts[0]),
            _ => println!("Unknown command. Type 'help' for the list."),
        }
    }
}
