mod audio;
mod cli;
mod config;
mod driver;
mod opc;
mod playback;
mod render;

use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use audio::sampler::EnvelopeSampler;
use cli::Cli;
use config::Config;
use driver::{DriverState, TickDriver};
use opc::client::OpcClient;
use opc::codec::BROADCAST_CHANNEL;
use playback::ffplay::Player;

/// How long a finished run waits for the player to report its exit code.
const PLAYER_EXIT_GRACE: Duration = Duration::from_secs(3);

fn main() -> Result<ExitCode> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    let config_path = cli.config.clone().or_else(config::find_config);
    let mut config = match config_path {
        Some(ref path) => {
            let cfg = config::load_config(path)?;
            log::info!("Loaded config from {}", path.display());
            cfg
        }
        None => Config::default(),
    };
    cli.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    log::info!("ledpulse - audio reactive LED strip");
    log::info!("Input: {}", config.audio_file.display());
    log::info!(
        "Controller: {}:{} channel {} ({} LEDs)",
        config.controller_host,
        config.controller_port,
        config.channel,
        config.led_count
    );
    if config.channel == BROADCAST_CHANNEL {
        log::info!("Channel {} broadcasts to every strip on the controller", BROADCAST_CHANNEL);
    }

    let stop = Arc::new(AtomicBool::new(false));
    let stop_handler = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        log::info!("Shutdown signal received");
        stop_handler.store(true, Ordering::SeqCst);
    })
    .context("Error setting Ctrl-C handler")?;

    // 1. Decode audio
    log::info!("Decoding file {}", config.audio_file.display());
    let audio_data = audio::decode::decode_audio(&config.audio_file)
        .with_context(|| format!("Failed to decode {}", config.audio_file.display()))?;

    // 2. Connect to the controller
    let client = OpcClient::connect(
        &config.controller_host,
        config.controller_port,
        config.connect_timeout(),
        config.write_timeout(),
    )?;

    let sampler = EnvelopeSampler::new(
        &audio_data.samples,
        audio_data.sample_rate,
        config.tick_interval(),
        config.envelope_params(),
    );
    let mut driver = TickDriver::new(
        sampler,
        config.led_count,
        config.render_params(),
        client,
        config.channel,
        config.tick_interval(),
    );
    driver
        .send_initial_frame()
        .context("Failed to send initial frame")?;

    // 3. Start audible playback
    let player = if config.player.enabled {
        match Player::spawn(&config.audio_file, &config.player_options()) {
            Ok(player) => Some(player),
            Err(err) => {
                log::warn!("Playback unavailable, continuing without audio: {:#}", err);
                None
            }
        }
    } else {
        None
    };

    // 4. Sample, render, stream
    match driver.run(&stop) {
        DriverState::Finished => {
            log::info!(
                "Done after {} ticks, {} frames dropped",
                driver.ticks(),
                driver.dropped_frames()
            );
            if let Some(player) = player {
                player.wait_timeout(PLAYER_EXIT_GRACE);
            }
            Ok(ExitCode::SUCCESS)
        }
        DriverState::Cancelled => Ok(ExitCode::from(130)),
        state => anyhow::bail!(
            "Sampling ended in state {:?} after {} ticks: LED controller connection lost",
            state,
            driver.ticks()
        ),
    }
}
