use crate::audio::history::HistoryBuffer;

use super::color::{colorwheel, pack_rgb, unpack_rgb};

/// Parameters of the history → color mapping.
#[derive(Clone, Copy, Debug)]
pub struct RenderParams {
    pub boost_max: u8,
    /// Amplitudes at or below this render dark before boost blending.
    pub dead_zone: f32,
}

impl Default for RenderParams {
    fn default() -> Self {
        Self {
            boost_max: 75,
            dead_zone: 0.1,
        }
    }
}

/// One packed `0xRRGGBB` value per LED, in strip order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pixels: Vec<u32>,
}

impl Frame {
    pub fn from_packed(pixels: Vec<u32>) -> Self {
        Self { pixels }
    }

    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    #[cfg(test)]
    pub fn packed(&self) -> &[u32] {
        &self.pixels
    }

    pub fn rgb(&self) -> impl Iterator<Item = [u8; 3]> + '_ {
        self.pixels.iter().map(|&p| unpack_rgb(p))
    }
}

/// Renders the history into a frame. Pure: same inputs, same frame.
pub fn render_frame(history: &HistoryBuffer, boost: u8, params: &RenderParams) -> Frame {
    let mut pixels = Vec::with_capacity(history.len());
    for amplitude in history.iter() {
        let [r, g, b] = if amplitude > params.dead_zone {
            colorwheel((amplitude * 255.0).clamp(0.0, 255.0))
        } else {
            [0.0; 3]
        };

        pixels.push(pack_rgb(
            blend(r, params.boost_max, boost),
            blend(g, params.boost_max, boost),
            blend(b, params.boost_max, boost),
        ));
    }

    Frame::from_packed(pixels)
}

/// `clamp(channel - max, 0, max) + boost`, truncated to an integer.
fn blend(channel: f32, boost_max: u8, boost: u8) -> u8 {
    let max = boost_max as f32;
    let base = (channel - max).clamp(0.0, max);
    (base + boost as f32) as u8
}
