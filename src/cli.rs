use clap::Parser;
use std::path::PathBuf;

use crate::config::Config;

#[derive(Parser, Debug)]
#[command(name = "ledpulse", about = "Pulse an Open Pixel Control LED strip to an audio track")]
pub struct Cli {
    /// Audio file to play and visualize (MP3, FLAC, OGG, WAV, AAC)
    pub input: Option<PathBuf>,

    /// Config file (defaults to ./ledpulse.toml or the user config dir)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// LED controller host
    #[arg(long)]
    pub host: Option<String>,

    /// LED controller port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Number of LEDs on the strip
    #[arg(long)]
    pub leds: Option<usize>,

    /// OPC channel to address (0 broadcasts to every channel)
    #[arg(long)]
    pub channel: Option<u8>,

    /// Do not start the audio player
    #[arg(long)]
    pub no_player: bool,
}

impl Cli {
    /// Command line values win over the config file.
    pub fn apply(&self, config: &mut Config) {
        if let Some(ref input) = self.input {
            config.audio_file = input.clone();
        }
        if let Some(ref host) = self.host {
            config.controller_host = host.clone();
        }
        if let Some(port) = self.port {
            config.controller_port = port;
        }
        if let Some(leds) = self.leds {
            config.led_count = leds;
        }
        if let Some(channel) = self.channel {
            config.channel = channel;
        }
        if self.no_player {
            config.player.enabled = false;
        }
    }
}
