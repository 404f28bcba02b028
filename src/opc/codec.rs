//! Open Pixel Control message encoding.
//!
//! Every message is `channel (u8) | command (u8) | length (u16, big-endian) | data`.
//! For "set pixel colors" the data is three bytes per pixel in R, G, B order.

use crate::render::frame::Frame;

use super::client::TransportError;

/// Channel 0 addresses every strip on the controller.
pub const BROADCAST_CHANNEL: u8 = 0;
pub const CMD_SET_PIXEL_COLORS: u8 = 0;
pub const HEADER_LEN: usize = 4;
/// Largest pixel count whose payload length fits the 16-bit length field.
pub const MAX_PIXELS: usize = u16::MAX as usize / 3;

pub fn encode_set_pixel_colors(channel: u8, frame: &Frame) -> Result<Vec<u8>, TransportError> {
    if frame.len() > MAX_PIXELS {
        return Err(TransportError::FrameTooLarge(frame.len()));
    }

    let data_len = frame.len() * 3;
    let mut message = Vec::with_capacity(HEADER_LEN + data_len);
    message.push(channel);
    message.push(CMD_SET_PIXEL_COLORS);
    message.extend_from_slice(&(data_len as u16).to_be_bytes());
    for [r, g, b] in frame.rgb() {
        message.extend_from_slice(&[r, g, b]);
    }
    Ok(message)
}
