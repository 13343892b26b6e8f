//! Beatlight - drive lights from the beat of an audio stream
//!
//! Reads a WAV file in real time, detects beats and tempo, and sends light
//! updates through the fast (UDP) and low (HTTP) transports according to the
//! light map.

mod config;
mod logging_setup;
mod pipeline;
mod sinks;

use anyhow::{Context, Result};
use beatlight_control::{
    BeatPulseEffect, ControlType, EffectRouter, EnergyEffect, FastEffectController, LightEffect,
    LowEffectController,
};
use clap::Parser;
use config::{AppConfig, EffectKind};
use pipeline::Pipeline;
use sinks::{LoggingFastSink, LoggingLowSink};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "Drive lights from the beat of an audio stream", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Light map JSON, overrides the config file
    #[arg(long)]
    light_map: Option<PathBuf>,

    /// 16-bit PCM WAV file to play
    #[arg(long, required_unless_present = "print_config")]
    wav: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Effect to run, overrides the config file
    #[arg(long, value_enum)]
    effect: Option<EffectKind>,

    /// Log light updates instead of sending them
    #[arg(long)]
    dry_run: bool,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,
}

impl Cli {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(path) = &self.light_map {
            config.light_map = path.clone();
        }
        if let Some(level) = &self.log_level {
            config.log.level = level.clone();
        }
        if let Some(effect) = self.effect {
            config.effect = effect;
        }
    }
}

/// Sinks attached to the router, kept for shutdown and reporting
#[derive(Default)]
struct Transports {
    fast: Option<Arc<FastEffectController>>,
    low: Option<Arc<LowEffectController>>,
    dry_run: Option<(Arc<LoggingFastSink>, Arc<LoggingLowSink>)>,
}

impl Transports {
    /// Start the transports the light map needs and attach them to `router`.
    fn attach(router: &mut EffectRouter, config: &AppConfig, dry_run: bool) -> Result<Self> {
        if dry_run {
            let fast = Arc::new(LoggingFastSink::default());
            let low = Arc::new(LoggingLowSink::default());
            router.set_fast_sink(fast.clone());
            router.set_low_sink(low.clone());
            info!("Dry run: light updates are logged, not sent");
            return Ok(Self {
                dry_run: Some((fast, low)),
                ..Self::default()
            });
        }

        let mut transports = Self::default();

        if router.uses(ControlType::FastUdp) {
            let fast = Arc::new(
                FastEffectController::new(config.fast.clone())
                    .context("Invalid fast transport configuration")?,
            );
            fast.start_session().context("Failed to start UDP session")?;
            router.set_fast_sink(fast.clone());
            transports.fast = Some(fast);
        }

        if router.uses(ControlType::LowHttp) {
            let low = Arc::new(
                LowEffectController::new(config.low.clone())
                    .context("Invalid low transport configuration")?,
            );
            low.start().context("Failed to start HTTP controller")?;
            router.set_low_sink(low.clone());
            transports.low = Some(low);
        }

        Ok(transports)
    }

    async fn shutdown(self) {
        if let Some(fast) = self.fast {
            fast.stop_session();
            info!("UDP packet loss: {:.2}%", fast.packet_loss_pct());
        }
        if let Some(low) = self.low {
            low.stop().await;
        }
        if let Some((fast, low)) = self.dry_run {
            info!(
                "Dry run: {} fast frames, {} low updates",
                fast.frames(),
                low.updates()
            );
        }
    }
}

fn build_router(config: &AppConfig) -> EffectRouter {
    let mut router = EffectRouter::new();
    if config.light_map.as_os_str().is_empty() {
        warn!("No light map configured, no light will be driven");
        return router;
    }
    if let Err(e) = router.load_light_map(&config.light_map) {
        warn!("Failed to load light map: {}. Continuing with an empty map", e);
    }
    router
}

async fn run(wav: PathBuf, dry_run: bool, config: AppConfig) -> Result<()> {
    let mut router = build_router(&config);
    let transports = Transports::attach(&mut router, &config, dry_run)?;

    let effect: Box<dyn LightEffect> = match config.effect {
        EffectKind::Pulse => Box::new(BeatPulseEffect::default()),
        EffectKind::Energy => Box::new(EnergyEffect::default()),
    };
    let mut pipeline = Pipeline::new(&config.audio, effect, router)?;
    info!(
        "Driving {} lights with the {:?} effect",
        pipeline.lights().len(),
        config.effect
    );

    let stop = Arc::new(AtomicBool::new(false));
    let (frames, reader) = pipeline::spawn_reader(&wav, stop.clone(), true)?;

    let loop_stop = stop.clone();
    let mut analysis = tokio::task::spawn_blocking(move || pipeline.run(&frames, &loop_stop));

    let stats = tokio::select! {
        res = &mut analysis => res.context("Analysis loop panicked")?,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
            stop.store(true, Ordering::Relaxed);
            analysis.await.context("Analysis loop panicked")?
        }
    };
    stop.store(true, Ordering::Relaxed);

    match tokio::task::spawn_blocking(move || reader.join()).await {
        Ok(Ok(_)) => {}
        _ => warn!("Reader thread did not exit cleanly"),
    }

    transports.shutdown().await;
    info!(
        "Done: {} frames, {} beats, {} light updates",
        stats.frames, stats.beats, stats.updates
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    cli.apply(&mut config);

    if cli.print_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }
    let Some(wav) = cli.wav else {
        anyhow::bail!("--wav is required");
    };

    let _log_guard = logging_setup::init(&config.log)?;
    info!("Beatlight {} starting", env!("CARGO_PKG_VERSION"));

    run(wav, cli.dry_run, config).await
}
