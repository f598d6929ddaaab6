//! Interactive front-ends for watching the pipeline run in real time

mod viewer;
pub mod gpu_viewer;

pub use viewer::{InteractiveViewer, ViewerConfig, ViewerError};
pub use gpu_viewer::{run_gpu_viewer, GpuViewerConfig, GpuViewerError};
