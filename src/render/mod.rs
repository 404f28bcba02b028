pub mod color;
pub mod frame;
