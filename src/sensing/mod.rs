pub mod focus;
pub mod sampler;

pub use focus::SystemFocusSampler;
pub use sampler::{sample_with_timeout, ActivitySampler};
