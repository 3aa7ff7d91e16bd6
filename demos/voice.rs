use anyhow::{Context, Result};
use clap::Parser;
use sonic_realtime::device::native::{NativeSink, NativeSource};
use sonic_realtime::device::StreamSpec;
use sonic_realtime::types::Role;
use sonic_realtime::{Config, SessionEvent, Streamer};
use sonic_realtime_utils as utils;
use tokio::io::AsyncBufReadExt;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long)]
    debug: bool,

    /// Print the available audio devices and exit
    #[arg(long)]
    list_devices: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let default_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_timer(ChronoLocal::rfc_3339())
        .init();

    if args.list_devices {
        println!("Available inputs:\n{}", utils::device::get_available_inputs()?);
        println!("Available outputs:\n{}", utils::device::get_available_outputs()?);
        return Ok(());
    }

    let config = Config::from_env().context("Failed to load configuration")?;
    let input = StreamSpec::input(&config);
    let output = StreamSpec::output(&config);

    let client = sonic_realtime::connect(config).await.context("Failed to start session")?;
    tracing::info!("session {} started", client.ids().prompt_name);

    let devices = NativeSource::open(input).and_then(|source| Ok((source, NativeSink::open(output)?)));
    let (source, sink) = match devices {
        Ok(devices) => devices,
        Err(e) => {
            client.close().await;
            return Err(e).context("Failed to open audio devices");
        }
    };

    let mut events = client.events();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(SessionEvent::Transcript { role, text }) => match role {
                    Role::User => println!("User: {}", text),
                    _ => println!("Assistant: {}", text),
                },
                Ok(SessionEvent::Raw(raw)) => tracing::debug!("raw event: {}", raw),
                Ok(SessionEvent::Terminated(reason)) => println!("Session ended: {}", reason),
                Ok(_) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("event printer lagged, skipped {} events", skipped);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    println!("Streaming. Speak into the microphone, press Enter to stop.");
    let mut streamer = Streamer::new(client.clone(), source, sink);
    let stop = async {
        let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
        tokio::select! {
            _ = lines.next_line() => {}
            _ = tokio::signal::ctrl_c() => println!("Received Ctrl-C, shutting down..."),
        }
    };
    let result = streamer.start_streaming(stop).await;

    streamer.stop_streaming().await;
    client.close().await;
    printer.abort();

    let stats = client.stats();
    tracing::info!(
        "sent {} events ({} audio chunks), received {} audio bytes, {} barge-ins",
        stats.events_sent(),
        stats.audio_chunks_sent(),
        stats.audio_bytes_received(),
        stats.interruptions()
    );
    result.context("Streaming failed")
}
