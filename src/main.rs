use arduino_bridge::config::BridgeConfig;
use arduino_bridge::consumers::{ButtonConsumer, ButtonEvent, JoystickConsumer, JoystickEvent};
use arduino_bridge::router::{InputRouter, PumpHandle, ReaderLineSource};
use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Reads `<pin>#<value>` lines and turns them into button and joystick events
#[derive(Parser, Debug)]
#[command(name = "arduino-bridge", version)]
struct Args {
    /// Config file, defaults to the user config directory
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Read lines from this file or device instead of stdin
    #[arg(short, long)]
    input: Option<PathBuf>,
}

const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

fn main() -> Result<()> {
    let args = Args::parse();
    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(run(args));
    // A pending stdin read sits on a blocking thread and never returns on its own
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    result
}

async fn run(args: Args) -> Result<()> {
    let (path, config, created) = setup_config(args.config.as_deref()).await?;
    let filter = config.log_filter(std::env::var("RUST_LOG").ok().as_deref())?;
    setup(filter)?;
    if created {
        info!("Wrote default config to {}", path.display());
    }
    info!("Loaded config from {}", path.display());
    debug!("Config: {:?}", config);
    info!("Starting arduino-bridge");

    let router = InputRouter::new();

    let (button_tx, mut button_rx) = mpsc::channel::<ButtonEvent>(config.event_channel_capacity);
    let (joystick_tx, mut joystick_rx) =
        mpsc::channel::<JoystickEvent>(config.event_channel_capacity);

    let buttons: Vec<Arc<ButtonConsumer>> = config
        .buttons
        .iter()
        .map(|binding| {
            Arc::new(ButtonConsumer::new(
                binding.name.clone(),
                binding.pin,
                config.button_settings(),
                button_tx.clone(),
            ))
        })
        .collect();
    for button in &buttons {
        router.register(button);
    }

    let joystick = config.joystick.as_ref().map(|binding| {
        Arc::new(JoystickConsumer::new(
            binding.name.clone(),
            binding.pins,
            config.press_threshold,
            joystick_tx.clone(),
        ))
    });
    if let Some(joystick) = &joystick {
        router.register(joystick);
    }

    // Only the consumers keep senders alive, so the loggers end once they are gone
    drop(button_tx);
    drop(joystick_tx);

    let button_logger = tokio::spawn(async move {
        while let Some(event) = button_rx.recv().await {
            info!(
                "{} ({}): {:?} at {}",
                event.name,
                event.pin,
                event.kind,
                event.timestamp.format("%H:%M:%S.%3f")
            );
        }
    });
    let joystick_logger = tokio::spawn(async move {
        while let Some(event) = joystick_rx.recv().await {
            info!(
                "{}: ({}, {}) {:?}",
                event.name, event.x, event.y, event.direction
            );
        }
    });

    let cancel = CancellationToken::new();
    let pump = match &args.input {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .map_err(|e| eyre!("Failed to open input {}: {}", path.display(), e))?;
            info!("Reading lines from {}", path.display());
            PumpHandle::spawn(
                router.dispatcher(),
                Some(ReaderLineSource::new(BufReader::new(file))),
                cancel.clone(),
                config.stats_interval(),
            )
        }
        None => {
            info!("Reading lines from stdin");
            PumpHandle::spawn(
                router.dispatcher(),
                Some(ReaderLineSource::new(BufReader::new(tokio::io::stdin()))),
                cancel.clone(),
                config.stats_interval(),
            )
        }
    }
    .map_err(|e| eyre!("Failed to start line pump: {}", e))?;

    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, shutting down");
            ctrl_c.cancel();
        }
    });

    let stats = pump
        .join()
        .await
        .map_err(|e| eyre!("Line pump failed: {}", e))?;
    info!(
        "Processed {} lines, {} broadcast, {} skipped",
        stats.lines,
        stats.broadcast,
        stats.skipped()
    );

    for button in &buttons {
        router.unregister(button);
    }
    if let Some(joystick) = &joystick {
        router.unregister(joystick);
    }
    drop(buttons);
    drop(joystick);

    let _ = button_logger.await;
    let _ = joystick_logger.await;
    debug!("Event loggers finished");
    Ok(())
}

fn setup(filter: EnvFilter) -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    setup_logging_env(filter);
    Ok(())
}

fn setup_logging_env(filter: EnvFilter) {
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}

/// Runs before logging is up, so the caller reports what happened here.
async fn setup_config(path: Option<&Path>) -> Result<(PathBuf, BridgeConfig, bool)> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => BridgeConfig::default_path()?,
    };

    // Make sure there is something to load on first start
    let created = BridgeConfig::ensure_default_config(&path).await?;
    let config = BridgeConfig::load(&path).await?;
    Ok((path, config, created))
}
