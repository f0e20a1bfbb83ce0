pub mod memory_buffer;
pub mod proxy;
pub mod sampler;
