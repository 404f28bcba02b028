use anyhow::{Context, Result};
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Decoded PCM of the first channel of a track.
pub struct AudioData {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    /// Channel count of the source, before the first channel was extracted.
    pub channels: usize,
}

impl AudioData {
    pub fn duration(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

pub fn decode_audio(path: &Path) -> Result<AudioData> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open audio file: {}", path.display()))?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .context("Failed to probe audio format")?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .context("No audio tracks found")?;

    let track_id = track.id;
    let channels = track.codec_params.channels.map_or(1, |c| c.count()).max(1);
    let sample_rate = track.codec_params.sample_rate.context("Unknown sample rate")?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .context("Failed to create audio decoder")?;

    let mut samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(e).context("Failed to read audio packet"),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(symphonia::core::errors::Error::DecodeError(err)) => {
                log::debug!("Skipping undecodable packet: {}", err);
                continue;
            }
            Err(e) => return Err(e).context("Failed to decode audio packet"),
        };

        let spec = *decoded.spec();
        let num_frames = decoded.frames();
        let stride = spec.channels.count().max(1);

        let mut sample_buf = SampleBuffer::<f32>::new(num_frames as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);

        // Interleaved frames; only channel 0 drives the strip.
        samples.extend(sample_buf.samples().iter().step_by(stride).copied());
    }

    let audio = AudioData {
        samples,
        sample_rate,
        channels,
    };

    log::info!(
        "Decoded audio: {} channels | {} samples | {}Hz | {:.1}s",
        audio.channels,
        audio.samples.len(),
        audio.sample_rate,
        audio.duration()
    );

    Ok(audio)
}
