//! CLI for the vport guest-agent port channel.

#![allow(
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::missing_docs_in_private_items
)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use tokio::sync::Notify;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use vport::{Capability, FileSpooler, NullPrinter, PortSession};

#[derive(Parser)]
#[command(name = "vport", version, about = "Guest-agent port channel client")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Connect to a guest agent and service the port channel.
    Connect {
        /// Unix socket path of the agent channel.
        #[arg(long)]
        socket: PathBuf,

        /// Directory print jobs are spooled into.
        #[arg(long, default_value = "spool")]
        spool_dir: PathBuf,

        /// Printers to share once the agent has connected.
        #[arg(long = "share", value_name = "PRINTER")]
        share: Vec<String>,
    },

    /// Print the agent's negotiated capabilities and exit.
    Caps {
        /// Unix socket path of the agent channel.
        #[arg(long)]
        socket: PathBuf,
    },

    /// Generate shell completion scripts.
    #[command(hide = true)]
    Completion {
        /// Target shell.
        shell: Shell,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Connect {
            socket,
            spool_dir,
            share,
        } => connect(socket, spool_dir, share).await,
        Command::Caps { socket } => caps(socket).await,
        Command::Completion { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "vport", &mut std::io::stdout());
            Ok(())
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "vport={level},vport_proto={level},vport_cli={level}"
        ))
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Registers an observer that pings `Notify` on capability negotiation.
fn notify_on_agent(session: &PortSession) -> Arc<Notify> {
    let negotiated = Arc::new(Notify::new());
    let notify = Arc::clone(&negotiated);
    session.on_agent_connected(move || notify.notify_one());
    negotiated
}

async fn connect(socket: PathBuf, spool_dir: PathBuf, share: Vec<String>) -> Result<()> {
    let spooler = Arc::new(
        FileSpooler::new(&spool_dir)
            .with_context(|| format!("cannot open spool directory {}", spool_dir.display()))?,
    );
    let session = PortSession::new(spooler);
    let negotiated = notify_on_agent(&session);

    let stream = vport::connect_unix(&socket)
        .await
        .with_context(|| format!("cannot connect to {}", socket.display()))?;
    let driver = tokio::spawn(vport::run(session.clone(), stream));

    if !share.is_empty() {
        negotiated.notified().await;
        if session.agent_supports(Capability::Printing) {
            for printer in &share {
                if let Err(e) = session.share_printer(printer, &[]) {
                    warn!("cannot share printer {printer}: {e}");
                }
            }
        } else {
            warn!("guest agent does not support printing; nothing shared");
        }
    }

    driver.await?.context("channel error")
}

async fn caps(socket: PathBuf) -> Result<()> {
    let session = PortSession::new(Arc::new(NullPrinter));
    let negotiated = notify_on_agent(&session);

    let stream = vport::connect_unix(&socket)
        .await
        .with_context(|| format!("cannot connect to {}", socket.display()))?;
    let mut driver = tokio::spawn(vport::run(session.clone(), stream));

    tokio::select! {
        _ = negotiated.notified() => {}
        result = &mut driver => {
            result?.context("channel error")?;
            bail!("channel closed before capability negotiation");
        }
        _ = tokio::time::sleep(Duration::from_secs(10)) => {
            bail!("timed out waiting for capability negotiation");
        }
    }

    let Some(caps) = session.agent_capabilities() else {
        bail!("agent disconnected during negotiation");
    };
    let words = caps.words();
    println!(
        "agent capabilities: {:08x} {:08x} {:08x} {:08x}",
        words[3], words[2], words[1], words[0]
    );
    println!(
        "printing: {}",
        if caps.supports(Capability::Printing) {
            "yes"
        } else {
            "no"
        }
    );

    session.channel_down();
    driver.abort();
    Ok(())
}
