use anyhow::Result;
use clap::{Parser, Subcommand};
use futures::StreamExt;
use rezehor::ai::AiClient;
use rezehor::config::DEFAULT_CONFIG_PATH;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "rezehor")]
#[command(about = "Personal assistant shell for Claude")]
struct CliArgs {
    /// Path to the YAML settings file.
    #[arg(
        long,
        global = true,
        value_name = "PATH",
        env = "REZEHOR_CONFIG",
        default_value = DEFAULT_CONFIG_PATH
    )]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Send a message and print the reply.
    Ask {
        message: String,

        /// Image to attach ahead of the message (sent as PNG).
        #[arg(long, value_name = "PATH", conflicts_with = "stream")]
        image: Option<PathBuf>,

        /// Replace the configured system prompt for this call.
        #[arg(long, value_name = "PROMPT")]
        system: Option<String>,

        /// Print the reply as it is generated.
        #[arg(long)]
        stream: bool,
    },
    /// Print the effective configuration with the API key redacted.
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    let config = rezehor::config::shared(&args.config).await?;
    config.bootstrap_dirs()?;
    let _log_guard = rezehor::logging::init(&config)?;

    info!("Starting rezehor");

    match args.command {
        Command::Config => {
            println!("{:#?}", config);
        }
        Command::Ask {
            message,
            image,
            system,
            stream,
        } => {
            let client = AiClient::new(config)?;
            if stream {
                stream_reply(&client, &message, system.as_deref()).await?;
            } else {
                ask(&client, &message, system.as_deref(), image.as_deref()).await?;
            }
        }
    }

    Ok(())
}

async fn ask(
    client: &AiClient,
    message: &str,
    system: Option<&str>,
    image: Option<&Path>,
) -> Result<()> {
    let reply = client.send_message(message, system, image).await?;
    println!("{}", reply);
    Ok(())
}

/// Print fragments as they arrive. Ctrl-C drops the stream, which closes
/// the connection.
async fn stream_reply(client: &AiClient, message: &str, system: Option<&str>) -> Result<()> {
    let mut fragments = client.stream_message(message, system)?;
    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);

    let mut stdout = std::io::stdout();
    loop {
        tokio::select! {
            _ = &mut interrupt => {
                warn!("Interrupted, closing stream");
                break;
            }
            next = fragments.next() => match next {
                Some(fragment) => {
                    write!(stdout, "{}", fragment?)?;
                    stdout.flush()?;
                }
                None => break,
            },
        }
    }
    writeln!(stdout)?;

    Ok(())
}
