//! GPU presentation using wgpu
//!
//! Only blits finished frames; every pass runs on the CPU.

pub mod context;
pub mod present;

pub use context::{GpuContext, GpuError};
pub use present::PresentPipeline;
