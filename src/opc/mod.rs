pub mod client;
pub mod codec;

use crate::render::frame::Frame;
use client::TransportError;

/// Destination for rendered frames.
pub trait FrameSink {
    fn is_open(&self) -> bool;
    fn send_frame(&mut self, channel: u8, frame: &Frame) -> Result<(), TransportError>;
    /// Tears the session down. Calling it again is a no-op.
    fn close(&mut self);
}
