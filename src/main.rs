use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info, info_span, Instrument};
use tracing_subscriber::{fmt, EnvFilter};
use uuid::Uuid;

use deadline_probe::config::{Config, ScheduleConfig};
use deadline_probe::transfer::progress_bar;
use deadline_probe::{
    reference_digest, verify, ReceiveSession, Scheduler, SendSession, TransferError,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file (TOML format)
    #[arg(short, long, default_value = "deadline-probe.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Accept one connection and compare what arrives with a reference file
    Receive {
        /// File to compare with received
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Connect and stream a file under randomized deadlines
    Send {
        /// File to send
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut config = Config::load_or_default(&cli.config)?;
    config.validate()?;

    let session_id = Uuid::new_v4();
    match cli.command {
        Commands::Receive { file } => {
            if let Some(file) = file {
                config.receiver.file = file;
            }
            let span = info_span!("receive", %session_id);
            run_receiver(config).instrument(span).await?
        }
        Commands::Send { file } => {
            if let Some(file) = file {
                config.sender.file = file;
            }
            let span = info_span!("send", %session_id);
            run_sender(config).instrument(span).await?
        }
    }

    Ok(())
}

fn scheduler(config: &ScheduleConfig) -> Scheduler {
    match config.seed {
        Some(seed) => {
            info!("Using fixed schedule seed {}", seed);
            Scheduler::seeded(config.bounds(), seed)
        }
        None => Scheduler::from_time(config.bounds()),
    }
}

async fn run_receiver(config: Config) -> Result<(), TransferError> {
    let (expected, file_size) = reference_digest(&config.receiver.file).await?;
    info!("expected hash {}", expected);

    let addr = config.endpoint.socket_addr();
    // held open until the run ends; later connection attempts are never accepted
    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);
    let mut stream = accept_one(&listener).await?;

    let mut session = ReceiveSession::new();
    if config.receiver.progress_bar {
        session = session.with_progress(progress_bar(file_size));
    }
    let summary = session.run(&mut stream, scheduler(&config.schedule)).await?;

    info!("expected {}, got {}", expected, summary.digest);
    verify(&expected, &summary.digest).map_err(|e| {
        if e.is_corruption() {
            error!("data corrupted");
        }
        e
    })
}

async fn accept_one(listener: &TcpListener) -> Result<TcpStream, TransferError> {
    let (stream, peer_addr) = listener.accept().await?;
    info!("Accepted connection from: {}", peer_addr);
    Ok(stream)
}

async fn run_sender(config: Config) -> Result<(), TransferError> {
    let path = &config.sender.file;
    if !path.exists() {
        return Err(TransferError::FileNotFound(path.clone()));
    }
    let file = tokio::fs::File::open(path).await?;
    let file_size = file.metadata().await?.len();
    info!("Starting transfer of file: {} ({} bytes)", path.display(), file_size);

    let addr = config.endpoint.socket_addr();
    let mut stream = TcpStream::connect(&addr).await?;
    info!("Connected to {}", addr);

    let mut session = SendSession::new(file);
    if config.sender.progress_bar {
        session = session.with_progress(progress_bar(file_size));
    }
    let summary = session.run(&mut stream, scheduler(&config.schedule)).await?;

    info!("expected hash {}", summary.digest);
    Ok(())
}
