pub mod decode;
pub mod history;
pub mod sampler;
