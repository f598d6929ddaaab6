//! Pass scheduling and per-frame execution.
//!
//! The execution order is derived once, at build time, from each pass's
//! declared reads and writes. Every frame the pipeline clamps the incoming
//! parameters, walks that order, and degrades gracefully when a pass cannot
//! run: the pass is skipped and its passthrough source (if any) is copied
//! into its output so downstream passes still see a sensible image.

use smallvec::SmallVec;
use std::collections::VecDeque;
use std::time::Instant;

use crate::buffer::{BufferData, BufferId, BufferPool, ColorBuffer};
use crate::error::{ConfigError, ConfigResult};
use crate::params::{PipelineConfig, PipelineParameters, Preset, validate_size};
use crate::passes::{
    BlurPass, BrightExtractPass, CelShadePass, CompositePass, EdgeDetectPass, Pass, PassContext,
    SpiralWarpPass,
};
use crate::scene::{Scene, ViewState};

/// Everything the provider hands over for one frame
#[derive(Debug, Clone, Copy)]
pub struct FrameInput<'a> {
    pub params: PipelineParameters,
    pub view: ViewState,
    pub scene: &'a Scene,
}

/// What happened to a pass during the last frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassStatus {
    Ran,
    /// Turned off by its toggle
    Disabled,
    /// A required input or output buffer was unavailable
    Skipped,
    /// `execute` returned an error
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameReport {
    pub entries: Vec<(&'static str, PassStatus)>,
}

impl FrameReport {
    pub fn status(&self, label: &str) -> Option<PassStatus> {
        self.entries.iter().find(|(l, _)| *l == label).map(|&(_, s)| s)
    }
}

pub struct PipelineBuilder {
    width: u32,
    height: u32,
    passes: Vec<Box<dyn Pass>>,
}

impl PipelineBuilder {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height, passes: Vec::new() }
    }

    pub fn with_pass(mut self, pass: impl Pass + 'static) -> Self {
        self.passes.push(Box::new(pass));
        self
    }

    pub fn build(self) -> ConfigResult<Pipeline> {
        validate_size(self.width, self.height)?;
        let order = schedule(&self.passes)?;

        let mut passes: Vec<Option<Box<dyn Pass>>> = self.passes.into_iter().map(Some).collect();
        let passes: Vec<Box<dyn Pass>> = order.iter().filter_map(|&i| passes[i].take()).collect();

        let mut allocated: Vec<BufferId> = passes.iter().flat_map(|p| p.writes().iter().copied()).collect();
        allocated.sort_by_key(|id| id.index());
        allocated.dedup();

        let mut pipeline = Pipeline {
            passes,
            pool: BufferPool::new(self.width, self.height),
            allocated,
            report: FrameReport::default(),
        };
        pipeline.allocate(self.width, self.height);
        log::debug!("pipeline order: {:?}", pipeline.order_labels());
        Ok(pipeline)
    }
}

/// Stable topological sort over the buffer dependencies (Kahn's algorithm).
/// Ties keep insertion order. Returns indices into `passes`.
fn schedule(passes: &[Box<dyn Pass>]) -> ConfigResult<Vec<usize>> {
    let mut producer: [Option<usize>; BufferId::COUNT] = [None; BufferId::COUNT];
    for (i, pass) in passes.iter().enumerate() {
        for &id in pass.writes() {
            if let Some(first) = producer[id.index()] {
                return Err(ConfigError::DuplicateWriter {
                    buffer: id,
                    first: passes[first].label(),
                    second: pass.label(),
                });
            }
            producer[id.index()] = Some(i);
        }
    }

    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); passes.len()];
    let mut in_degree = vec![0usize; passes.len()];
    for (i, pass) in passes.iter().enumerate() {
        let required = pass.reads().iter().map(|&id| (id, true));
        let optional = pass.optional_reads().iter().map(|&id| (id, false));
        for (id, is_required) in required.chain(optional) {
            match producer[id.index()] {
                Some(p) if p == i => return Err(ConfigError::Cycle(pass.label())),
                Some(p) => {
                    if !dependents[p].contains(&i) {
                        dependents[p].push(i);
                        in_degree[i] += 1;
                    }
                }
                None if is_required => {
                    return Err(ConfigError::MissingProducer { pass: pass.label(), buffer: id });
                }
                None => {}
            }
        }
    }

    let mut ready: VecDeque<usize> = (0..passes.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(passes.len());
    while let Some(i) = ready.pop_front() {
        order.push(i);
        for &d in &dependents[i] {
            in_degree[d] -= 1;
            if in_degree[d] == 0 {
                // Keep the queue sorted so ties resolve in insertion order
                let at = ready.iter().position(|&r| r > d).unwrap_or(ready.len());
                ready.insert(at, d);
            }
        }
    }

    if order.len() < passes.len() {
        let stuck = (0..passes.len()).find(|i| !order.contains(i)).map_or("unknown", |i| passes[i].label());
        return Err(ConfigError::Cycle(stuck));
    }
    Ok(order)
}

/// Owns the passes and the buffers they route between
pub struct Pipeline {
    passes: Vec<Box<dyn Pass>>,
    pool: BufferPool,
    allocated: Vec<BufferId>,
    report: FrameReport,
}

impl Pipeline {
    /// Standard pipeline for a preset. The base parameters are validated up
    /// front, so a non-positive gamma fails here instead of on every frame.
    pub fn from_preset(preset: &Preset) -> ConfigResult<Self> {
        preset.params.validate()?;
        Self::standard(&preset.config)
    }

    /// Cel shading, outlines, bloom, spiral warp and composite
    pub fn standard(config: &PipelineConfig) -> ConfigResult<Self> {
        config.validate()?;
        PipelineBuilder::new(config.width, config.height)
            .with_pass(CelShadePass::new(config.cel)?)
            .with_pass(EdgeDetectPass)
            .with_pass(BrightExtractPass)
            .with_pass(BlurPass::horizontal())
            .with_pass(BlurPass::vertical())
            .with_pass(SpiralWarpPass)
            .with_pass(CompositePass)
            .build()
    }

    fn allocate(&mut self, width: u32, height: u32) {
        self.pool.reallocate(&self.allocated, width, height);
        for pass in &mut self.passes {
            pass.resize(width, height);
        }
    }

    /// Recreate every buffer at a new resolution
    pub fn resize(&mut self, width: u32, height: u32) -> ConfigResult<()> {
        validate_size(width, height)?;
        if self.pool.dimensions() == (width, height) {
            return Ok(());
        }
        self.allocate(width, height);
        log::debug!("pipeline resized to {}x{} (epoch {})", width, height, self.pool.epoch());
        Ok(())
    }

    /// Run every pass once. Returns the final image, or `None` when nothing
    /// could be written to it this frame.
    pub fn execute(&mut self, frame: &FrameInput<'_>) -> Option<&ColorBuffer> {
        let params = frame.params.clamped();
        self.pool.begin_frame();
        self.report.entries.clear();

        for pass in &mut self.passes {
            let label = pass.label();
            let status = run_pass(pass.as_mut(), &mut self.pool, &params, &frame.view, frame.scene);
            self.report.entries.push((label, status));
        }
        self.output()
    }

    /// Final image of the last frame, if it was written
    pub fn output(&self) -> Option<&ColorBuffer> {
        self.buffer(BufferId::Final)
    }

    /// Any color buffer written during the last frame
    pub fn buffer(&self, id: BufferId) -> Option<&ColorBuffer> {
        self.pool.color(id).ok()
    }

    /// Every buffer, including the depth and normal targets
    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    /// Drop a buffer until the next resize, as a backend would after losing it
    pub fn evict(&mut self, id: BufferId) {
        self.pool.evict(id);
    }

    pub fn last_report(&self) -> &FrameReport {
        &self.report
    }

    pub fn order_labels(&self) -> Vec<&'static str> {
        self.passes.iter().map(|p| p.label()).collect()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pool.dimensions()
    }

    pub fn epoch(&self) -> u64 {
        self.pool.epoch()
    }
}

fn pass_through(pass: &dyn Pass, pool: &mut BufferPool) {
    if let Some(src) = pass.passthrough() {
        if !pool.copy(src, pass.writes()[0]) {
            log::warn!("{}: passthrough from {:?} unavailable", pass.label(), src);
        }
    }
}

fn run_pass(
    pass: &mut dyn Pass,
    pool: &mut BufferPool,
    params: &PipelineParameters,
    view: &ViewState,
    scene: &Scene,
) -> PassStatus {
    let label = pass.label();

    if !pass.enabled(params) {
        pass_through(pass, pool);
        return PassStatus::Disabled;
    }

    if let Some(&missing) = pass.reads().iter().find(|&&id| !pool.is_available(id)) {
        log::warn!("{}: input {:?} unavailable, skipping", label, missing);
        pass_through(pass, pool);
        return PassStatus::Skipped;
    }

    let writes = pass.writes();
    let mut outputs: SmallVec<[BufferData; 3]> = SmallVec::new();
    for &id in writes {
        match pool.take(id) {
            Some(data) => outputs.push(data),
            None => {
                for (&taken, data) in writes.iter().zip(outputs.drain(..)) {
                    pool.restore(taken, data);
                }
                log::warn!("{}: output {:?} unavailable, skipping", label, id);
                return PassStatus::Skipped;
            }
        }
    }

    let start = Instant::now();
    let result = {
        let ctx = PassContext { pool, params, view, scene };
        pass.execute(&ctx, &mut outputs)
    };
    for (&id, data) in writes.iter().zip(outputs.drain(..)) {
        pool.restore(id, data);
    }

    match result {
        Ok(()) => {
            for &id in writes {
                pool.mark_written(id);
            }
            log::debug!("{}: {:.2?}", label, start.elapsed());
            PassStatus::Ran
        }
        Err(e) => {
            log::error!("{}: {}", label, e);
            pass_through(pass, pool);
            PassStatus::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PassResult;

    /// Minimal pass with configurable routing
    struct Stub {
        label: &'static str,
        reads: &'static [BufferId],
        writes: &'static [BufferId],
    }

    impl Pass for Stub {
        fn label(&self) -> &'static str {
            self.label
        }

        fn reads(&self) -> &'static [BufferId] {
            self.reads
        }

        fn writes(&self) -> &'static [BufferId] {
            self.writes
        }

        fn execute(&mut self, _ctx: &PassContext<'_>, _outputs: &mut [BufferData]) -> PassResult<()> {
            Ok(())
        }
    }

    fn stub(label: &'static str, reads: &'static [BufferId], writes: &'static [BufferId]) -> Stub {
        Stub { label, reads, writes }
    }

    #[test]
    fn test_order_follows_dependencies_not_insertion() {
        let pipeline = PipelineBuilder::new(4, 4)
            .with_pass(stub("c", &[BufferId::Bright], &[BufferId::Final]))
            .with_pass(stub("b", &[BufferId::SceneColor], &[BufferId::Bright]))
            .with_pass(stub("a", &[], &[BufferId::SceneColor]))
            .build()
            .unwrap();
        assert_eq!(pipeline.order_labels(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_standard_order() {
        let pipeline = Pipeline::standard(&PipelineConfig { width: 8, height: 8, ..Default::default() }).unwrap();
        assert_eq!(
            pipeline.order_labels(),
            vec!["cel_shade", "edge_detect", "bright_extract", "blur_h", "blur_v", "spiral_warp", "composite"]
        );
    }

    #[test]
    fn test_duplicate_writer_rejected() {
        let err = PipelineBuilder::new(4, 4)
            .with_pass(stub("a", &[], &[BufferId::SceneColor]))
            .with_pass(stub("b", &[], &[BufferId::SceneColor]))
            .build()
            .err();
        assert_eq!(
            err,
            Some(ConfigError::DuplicateWriter { buffer: BufferId::SceneColor, first: "a", second: "b" })
        );
    }

    #[test]
    fn test_missing_producer_rejected() {
        let err = PipelineBuilder::new(4, 4)
            .with_pass(stub("a", &[BufferId::Depth], &[BufferId::Final]))
            .build()
            .err();
        assert_eq!(err, Some(ConfigError::MissingProducer { pass: "a", buffer: BufferId::Depth }));
    }

    #[test]
    fn test_cycles_rejected() {
        let err = PipelineBuilder::new(4, 4)
            .with_pass(stub("a", &[BufferId::Bloom], &[BufferId::Bright]))
            .with_pass(stub("b", &[BufferId::Bright], &[BufferId::Bloom]))
            .build()
            .err();
        assert!(matches!(err, Some(ConfigError::Cycle(_))));

        let err = PipelineBuilder::new(4, 4)
            .with_pass(stub("self", &[BufferId::Bright], &[BufferId::Bright]))
            .build()
            .err();
        assert_eq!(err, Some(ConfigError::Cycle("self")));
    }

    #[test]
    fn test_zero_size_rejected() {
        let err = PipelineBuilder::new(0, 4).build().err();
        assert_eq!(err, Some(ConfigError::ZeroSizeTarget { width: 0, height: 4 }));

        let mut pipeline = Pipeline::standard(&PipelineConfig { width: 4, height: 4, ..Default::default() }).unwrap();
        assert!(pipeline.resize(4, 0).is_err());
        assert_eq!(pipeline.dimensions(), (4, 4));
    }

    #[test]
    fn test_skipped_producer_cascades_to_dependents() {
        let mut pipeline = PipelineBuilder::new(4, 4)
            .with_pass(stub("a", &[], &[BufferId::SceneColor]))
            .with_pass(stub("b", &[BufferId::SceneColor], &[BufferId::Bright]))
            .with_pass(stub("c", &[BufferId::Bright], &[BufferId::Final]))
            .build()
            .unwrap();
        pipeline.evict(BufferId::SceneColor);

        let scene = Scene::new();
        let frame = FrameInput { params: PipelineParameters::default(), view: ViewState::demo(1.0), scene: &scene };
        assert!(pipeline.execute(&frame).is_none());

        let report = pipeline.last_report();
        assert_eq!(report.status("a"), Some(PassStatus::Skipped));
        assert_eq!(report.status("b"), Some(PassStatus::Skipped));
        assert_eq!(report.status("c"), Some(PassStatus::Skipped));

        // Resize brings the buffer back
        pipeline.resize(8, 8).unwrap();
        assert!(pipeline.execute(&frame).is_some());
        assert_eq!(pipeline.last_report().status("a"), Some(PassStatus::Ran));
    }

    #[test]
    fn test_disabled_passes_pass_through() {
        let mut pipeline = Pipeline::standard(&PipelineConfig { width: 16, height: 9, ..Default::default() }).unwrap();
        let scene = Scene::demo();
        let params = PipelineParameters {
            bloom_enabled: false,
            outlines_enabled: false,
            spiral_enabled: false,
            ..Default::default()
        };
        let frame = FrameInput { params, view: ViewState::demo(16.0 / 9.0), scene: &scene };
        assert!(pipeline.execute(&frame).is_some());

        let report = pipeline.last_report();
        assert_eq!(report.status("bright_extract"), Some(PassStatus::Disabled));
        assert_eq!(report.status("blur_v"), Some(PassStatus::Disabled));
        assert_eq!(report.status("edge_detect"), Some(PassStatus::Disabled));
        assert_eq!(report.status("spiral_warp"), Some(PassStatus::Disabled));
        assert_eq!(report.status("composite"), Some(PassStatus::Ran));

        assert_eq!(pipeline.buffer(BufferId::Warped), pipeline.buffer(BufferId::SceneColor));
        assert!(pipeline.buffer(BufferId::Bloom).is_none());
    }
}
