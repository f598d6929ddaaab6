//! Screen-space passes.
//!
//! Every pass implements [`Pass`]: it declares which buffers it reads and
//! writes, and the pipeline derives execution order from those declarations.

pub mod bloom;
pub mod cel_shade;
pub mod composite;
pub mod edge;
pub mod spiral;

pub use bloom::{BlurPass, BrightExtractPass};
pub use cel_shade::CelShadePass;
pub use composite::CompositePass;
pub use edge::EdgeDetectPass;
pub use spiral::SpiralWarpPass;

use rayon::prelude::*;

use crate::buffer::{BufferData, BufferId, BufferPool, FrameBuffer};
use crate::error::{PassError, PassResult};
use crate::params::PipelineParameters;
use crate::scene::{Scene, ViewState};

/// Read-only view of the current frame handed to a pass
pub struct PassContext<'a> {
    /// Buffers written earlier in this frame. The pass's own outputs are
    /// checked out of the pool while it runs.
    pub pool: &'a BufferPool,
    pub params: &'a PipelineParameters,
    pub view: &'a ViewState,
    pub scene: &'a Scene,
}

/// A unit of work: consume input buffers and parameters, fill output buffers.
pub trait Pass: Send {
    fn label(&self) -> &'static str;

    /// Inputs that must have been written this frame for the pass to run
    fn reads(&self) -> &'static [BufferId];

    /// Inputs the pass can do without; missing ones contribute nothing
    fn optional_reads(&self) -> &'static [BufferId] {
        &[]
    }

    /// Outputs, handed to `execute` in this order
    fn writes(&self) -> &'static [BufferId];

    /// Buffer copied unmodified into `writes()[0]` when the pass is disabled
    /// or cannot run this frame
    fn passthrough(&self) -> Option<BufferId> {
        None
    }

    fn enabled(&self, _params: &PipelineParameters) -> bool {
        true
    }

    /// Called whenever the render target is (re)created
    fn resize(&mut self, _width: u32, _height: u32) {}

    fn execute(&mut self, ctx: &PassContext<'_>, outputs: &mut [BufferData]) -> PassResult<()>;
}

/// Normalized coordinates of a pixel center
#[inline]
pub fn pixel_uv(x: u32, y: u32, width: u32, height: u32) -> (f32, f32) {
    ((x as f32 + 0.5) / width as f32, (y as f32 + 0.5) / height as f32)
}

/// Fill `target` row by row on the rayon pool. `shade` receives the pixel
/// coordinates and returns the new value.
pub fn par_fill<T, F>(target: &mut FrameBuffer<T>, shade: F)
where
    T: Copy + Send,
    F: Fn(u32, u32) -> T + Sync,
{
    let width = target.width() as usize;
    target
        .pixels_mut()
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, px) in row.iter_mut().enumerate() {
                *px = shade(x as u32, y as u32);
            }
        });
}

/// Destructure a pass's output slice into exactly `N` buffers
pub fn expect_outputs<'a, const N: usize>(
    label: &'static str,
    outputs: &'a mut [BufferData],
) -> PassResult<&'a mut [BufferData; N]> {
    let found = outputs.len();
    outputs.try_into().map_err(|_| PassError::OutputLayout { pass: label, expected: N, found })
}
