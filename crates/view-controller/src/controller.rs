//! The per-view controller and its display tick.
//!
//! ```text
//! tick()
//!   1. no dataset or zero canvas ──► return
//!   2. canvas size changed       ──► refit viewport to canvas aspect
//!   3. unproject viewport        ──► logic box
//!   4. box changed or forced     ──► abort, wait_idle, push new job
//!   5. pop_result(last_only)     ──► discard stale / apply / report failure
//!   6. linked                    ──► hand offset + box to the group
//! ```
//!
//! Playback (step 7) spans several views and lives in [`crate::ViewGroup`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use projection::{physic_box, transform_from_physic_box, CoordinateMapper};
use query_engine::{
    view_dependent_budget, AccessHandle, CancellationToken, Dataset, DatasetMetadata,
    EngineConfig, PartialResult, ProgressiveQueryJob, QueryBudget, QueryOutcome, QueryScheduler,
    SliceImage,
};
use slice_common::{AffineAxis, Direction, LogicalBox, OffsetRange, PhysicalBox};

use crate::config::ViewConfig;
use crate::error::{Result, ViewError};
use crate::palette::{PaletteRange, PaletteRangeMode};
use crate::status::{self, OffsetReport};

/// Data handed to the presentation layer each time a result is applied.
#[derive(Debug, Clone)]
pub struct RenderUpdate {
    pub view_id: Uuid,
    pub job_id: u64,
    pub image: SliceImage,
    pub logic_box: LogicalBox,
    /// Where the image goes, in physical space.
    pub physic_box: PhysicalBox,
    pub palette_range: (f64, f64),
    pub level: u32,
    pub max_level: u32,
    pub running: bool,
    pub sequence: usize,
    pub elapsed: Duration,
    pub render_id: u64,
}

/// Callback invoked with every applied result.
pub type RenderCallback = Box<dyn FnMut(&RenderUpdate) + Send>;

/// Slice position a linked view shares with its siblings.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkUpdate {
    pub offset: f64,
    pub logic_box: LogicalBox,
}

/// What happened during one tick.
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    /// Id of the job pushed this tick.
    pub pushed_job: Option<u64>,
    /// Id of the job whose result was applied this tick.
    pub applied_job: Option<u64>,
    /// A result of an older job was dropped.
    pub discarded: bool,
    /// The current job reported a failure.
    pub failed: bool,
    pub link: Option<LinkUpdate>,
}

/// Dataset-dependent state, present once a dataset is bound.
struct Binding {
    dataset: Arc<dyn Dataset>,
    access: AccessHandle,
    dims: Vec<u64>,
    max_level: u32,
    metadata: DatasetMetadata,
}

/// One view: turns viewport and parameter changes into jobs and applies the
/// results the scheduler publishes.
pub struct ViewController {
    id: Uuid,
    name: String,
    engine: EngineConfig,
    config: ViewConfig,
    binding: Option<Binding>,
    mapper: CoordinateMapper,
    offset_range: OffsetRange,

    /// Viewport as last requested by the user.
    requested_viewport: PhysicalBox,
    /// Requested viewport fitted to the canvas aspect ratio.
    viewport: PhysicalBox,
    canvas: (u32, u32),
    last_canvas: (u32, u32),

    scheduler: QueryScheduler,
    token: CancellationToken,
    last_query_box: Option<LogicalBox>,
    last_job_id: Option<u64>,
    new_job: bool,
    /// The pending change came from a linked sibling, so the next push is
    /// not re-broadcast.
    following: bool,

    timestep: i64,
    timesteps: Vec<i64>,
    timestep_delta: i64,
    field: String,
    resolution: u32,
    view_dependent: bool,
    num_refinements: usize,
    linked: bool,

    palette: PaletteRange,
    request_status: String,
    response_status: String,
    offset_status: String,
    render_id: u64,
    last_update: Option<RenderUpdate>,
    callbacks: Vec<RenderCallback>,
}

impl ViewController {
    /// Create a view with no dataset. Call [`set_dataset`](Self::set_dataset)
    /// and [`start`](Self::start) before ticking.
    pub fn new(name: impl Into<String>, engine: &EngineConfig, config: ViewConfig) -> Self {
        let name = name.into();
        let unit = PhysicalBox::new([0.0, 0.0], [1.0, 1.0]);
        Self {
            id: Uuid::new_v4(),
            scheduler: QueryScheduler::new(name.clone(), engine),
            name,
            engine: engine.clone(),
            binding: None,
            mapper: CoordinateMapper::default(),
            offset_range: OffsetRange::flat(),
            requested_viewport: unit,
            viewport: unit,
            canvas: (0, 0),
            last_canvas: (0, 0),
            token: CancellationToken::new(),
            last_query_box: None,
            last_job_id: None,
            new_job: true,
            following: false,
            timestep: 0,
            timesteps: vec![0],
            timestep_delta: config.timestep_delta,
            field: String::new(),
            resolution: 0,
            view_dependent: config.view_dependent,
            num_refinements: config.num_refinements,
            linked: config.linked,
            palette: PaletteRange::new(config.palette_range_mode, (0.0, 1.0)),
            request_status: String::new(),
            response_status: String::new(),
            offset_status: String::new(),
            render_id: 0,
            last_update: None,
            callbacks: Vec::new(),
            config,
        }
    }

    fn binding(&self) -> Result<&Binding> {
        self.binding.as_ref().ok_or(ViewError::NoDataset)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Start the view's scheduler. Idempotent; needs a tokio runtime.
    pub fn start(&self) {
        self.scheduler.start();
        info!(view = %self.id, name = %self.name, "View started");
    }

    /// Abort the running job and stop the scheduler. Idempotent.
    pub async fn stop(&mut self) {
        self.token.set_true();
        self.scheduler.stop().await;
        info!(view = %self.id, name = %self.name, "View stopped");
    }

    /// Register a callback receiving every applied result.
    pub fn on_partial_result(&mut self, callback: RenderCallback) {
        self.callbacks.push(callback);
    }

    // =========================================================================
    // Dataset binding
    // =========================================================================

    /// Bind a dataset and reset every dataset-dependent setting.
    ///
    /// The transform comes from the metadata's physical box, the slicing
    /// direction from the configuration, and the offset is guessed.
    pub fn set_dataset(&mut self, dataset: Arc<dyn Dataset>) -> Result<()> {
        let dims = dataset.logic_size();
        let pdim = dims.len();
        let max_level = dataset.max_resolution();
        let metadata = dataset.metadata().clone();

        let transform = if metadata.physic_box.len() == pdim {
            transform_from_physic_box(&dims, &metadata.physic_box)?
        } else {
            vec![AffineAxis::identity(); pdim]
        };
        let direction = if pdim == 3 {
            Direction::new(self.config.direction)?
        } else {
            Direction::Z
        };
        self.mapper = CoordinateMapper::new(transform, direction, 0.0)?;

        // anything running belongs to the previous dataset
        self.token.set_true();

        let field = metadata.default_field().cloned();
        self.field = field.as_ref().map(|f| f.name.clone()).unwrap_or_default();
        self.palette = PaletteRange::new(
            self.config.palette_range_mode,
            field.map(|f| f.dtype_range).unwrap_or((0.0, 1.0)),
        );
        self.timesteps = if metadata.timesteps.is_empty() {
            vec![0]
        } else {
            metadata.timesteps.clone()
        };
        self.timestep = self.timesteps[0];
        self.resolution = self.config.initial_resolution(max_level);
        self.last_query_box = None;
        self.last_job_id = None;

        info!(
            view = %self.id,
            dims = ?dims,
            max_level,
            field = %self.field,
            "Dataset bound"
        );

        self.binding = Some(Binding {
            access: dataset.create_access(),
            dataset,
            dims,
            max_level,
            metadata,
        });

        self.apply_direction(direction)
    }

    pub fn has_dataset(&self) -> bool {
        self.binding.is_some()
    }

    /// Replace the access handle used for queries.
    pub fn set_access(&mut self, access: AccessHandle) -> Result<()> {
        let binding = self.binding.as_mut().ok_or(ViewError::NoDataset)?;
        binding.access = access;
        self.refresh();
        Ok(())
    }

    pub fn logic_size(&self) -> Option<&[u64]> {
        self.binding.as_ref().map(|b| b.dims.as_slice())
    }

    pub fn point_dim(&self) -> usize {
        self.mapper.point_dim()
    }

    pub fn max_resolution(&self) -> Option<u32> {
        self.binding.as_ref().map(|b| b.max_level)
    }

    pub fn metadata(&self) -> Option<&DatasetMetadata> {
        self.binding.as_ref().map(|b| &b.metadata)
    }

    // =========================================================================
    // Geometry
    // =========================================================================

    /// Per-axis transform from logical to physical space.
    pub fn logic_to_physic(&self) -> &[AffineAxis] {
        self.mapper.transform()
    }

    /// Replace the transform and re-guess the offset for the current direction.
    pub fn set_logic_to_physic(&mut self, transform: Vec<AffineAxis>) -> Result<()> {
        self.binding()?;
        self.mapper.set_transform(transform)?;
        self.apply_direction(self.mapper.direction())
    }

    /// Physical extent `(A, B)` of every logical axis.
    pub fn physic_box(&self) -> Result<Vec<(f64, f64)>> {
        let dims = &self.binding()?.dims;
        Ok(physic_box(dims, self.mapper.transform())?)
    }

    /// Derive the transform that stretches the dataset over `physic`.
    pub fn set_physic_box(&mut self, physic: &[(f64, f64)]) -> Result<()> {
        let transform = transform_from_physic_box(&self.binding()?.dims, physic)?;
        self.set_logic_to_physic(transform)
    }

    pub fn direction(&self) -> Direction {
        self.mapper.direction()
    }

    /// Change the slicing axis. Re-guesses offset and range, shows the whole
    /// dataset and invalidates the running job. 2D data always uses axis 2.
    pub fn set_direction(&mut self, axis: usize) -> Result<()> {
        let pdim = self.binding()?.dims.len();
        let direction = if pdim == 3 {
            Direction::new(axis)?
        } else {
            Direction::Z
        };
        debug!(view = %self.id, axis = direction.axis(), "Direction changed");
        self.apply_direction(direction)
    }

    /// Change the slicing axis by its dataset axis name (e.g. `"X"`).
    pub fn set_direction_by_name(&mut self, name: &str) -> Result<()> {
        let axis = self
            .binding()?
            .metadata
            .directions()
            .into_iter()
            .find(|(axis_name, _)| axis_name == name)
            .map(|(_, axis)| axis)
            .ok_or_else(|| ViewError::UnknownDirection(name.to_string()))?;
        self.set_direction(axis)
    }

    fn apply_direction(&mut self, direction: Direction) -> Result<()> {
        let dims = self.binding()?.dims.clone();
        self.mapper.set_direction(direction);
        let (offset, range) = self.mapper.guess_offset(&dims)?;
        self.offset_range = range;
        self.set_offset(offset);
        self.set_query_logic_box(&LogicalBox::full(&dims))
    }

    pub fn offset(&self) -> f64 {
        self.mapper.offset()
    }

    pub fn offset_range(&self) -> OffsetRange {
        self.offset_range
    }

    pub fn set_offset_range(&mut self, range: OffsetRange) {
        self.offset_range = range;
    }

    fn snap_offset(&self, value: f64) -> f64 {
        if self.offset_range.is_discrete() {
            value.trunc()
        } else {
            value
        }
    }

    /// Move the slice plane. Snapped to an integer when the range is discrete.
    pub fn set_offset(&mut self, value: f64) {
        let value = self.snap_offset(value);
        debug!(view = %self.id, old = self.mapper.offset(), new = value, "Offset changed");
        self.mapper.set_offset(value);
        self.refresh();
    }

    pub fn canvas_size(&self) -> (u32, u32) {
        self.canvas
    }

    /// Report the measured pixel size of the display surface.
    pub fn set_canvas_size(&mut self, width: u32, height: u32) {
        self.canvas = (width, height);
    }

    pub fn get_viewport(&self) -> PhysicalBox {
        self.viewport
    }

    /// Request a new visible region. Picked up by the next tick.
    pub fn set_viewport(&mut self, viewport: PhysicalBox) {
        self.following = false;
        self.request_viewport(viewport);
    }

    fn request_viewport(&mut self, viewport: PhysicalBox) {
        self.requested_viewport = viewport;
        self.viewport = viewport.fit_aspect(self.canvas.0, self.canvas.1);
    }

    /// Logical box currently visible.
    pub fn query_logic_box(&self) -> Result<LogicalBox> {
        Ok(self.mapper.unproject_box(&self.viewport)?)
    }

    /// Show `logic_box`. Coordinates along the slicing axis are ignored.
    pub fn set_query_logic_box(&mut self, logic_box: &LogicalBox) -> Result<()> {
        let viewport = self.mapper.project_box(logic_box)?;
        self.set_viewport(viewport);
        self.refresh();
        Ok(())
    }

    pub fn logic_center(&self) -> Result<Vec<f64>> {
        Ok(self.query_logic_box()?.center())
    }

    pub fn logic_extent(&self) -> Result<Vec<f64>> {
        Ok(self.query_logic_box()?.extent())
    }

    // =========================================================================
    // Query parameters
    // =========================================================================

    /// Abort the running job and force a new one on the next tick.
    pub fn refresh(&mut self) {
        self.following = false;
        self.token.set_true();
        self.new_job = true;
    }

    pub fn timestep(&self) -> i64 {
        self.timestep
    }

    pub fn timesteps(&self) -> &[i64] {
        &self.timesteps
    }

    pub fn set_timestep(&mut self, timestep: i64) {
        self.timestep = timestep;
        self.refresh();
    }

    pub fn timestep_delta(&self) -> i64 {
        self.timestep_delta
    }

    pub fn set_timestep_delta(&mut self, delta: i64) {
        self.timestep_delta = delta;
    }

    pub fn play_delay(&self) -> Duration {
        self.config.play_delay()
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    /// Switch field. The field's value-type range seeds the palette.
    pub fn set_field(&mut self, name: &str) -> Result<()> {
        let info = self
            .binding()?
            .metadata
            .field(name)
            .cloned()
            .ok_or_else(|| ViewError::UnknownField(name.to_string()))?;
        self.field = info.name;
        self.palette.set_metadata_range(info.dtype_range);
        self.palette.reset_accumulator();
        self.refresh();
        Ok(())
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    /// Set the resolution level, clamped to `[0, max_resolution]`.
    pub fn set_resolution(&mut self, level: u32) {
        let max = self.max_resolution().unwrap_or(level);
        self.resolution = level.min(max);
        self.refresh();
    }

    pub fn is_view_dependent(&self) -> bool {
        self.view_dependent
    }

    pub fn set_view_dependent(&mut self, value: bool) {
        self.view_dependent = value;
        self.refresh();
    }

    pub fn num_refinements(&self) -> usize {
        self.num_refinements
    }

    pub fn set_num_refinements(&mut self, value: usize) {
        self.num_refinements = value;
        self.refresh();
    }

    pub fn is_linked(&self) -> bool {
        self.linked
    }

    pub fn set_linked(&mut self, value: bool) {
        self.linked = value;
    }

    // =========================================================================
    // Palette
    // =========================================================================

    pub fn palette_range_mode(&self) -> PaletteRangeMode {
        self.palette.mode()
    }

    pub fn set_palette_range_mode(&mut self, mode: PaletteRangeMode) {
        self.palette.set_mode(mode);
        self.refresh();
    }

    /// Current color-mapper range.
    pub fn palette_range(&self) -> (f64, f64) {
        self.palette.current()
    }

    /// Set the range used in `user` mode.
    pub fn set_palette_range(&mut self, range: (f64, f64)) {
        self.palette.set_user_range(range);
        self.refresh();
    }

    // =========================================================================
    // Status
    // =========================================================================

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scheduler(&self) -> &QueryScheduler {
        &self.scheduler
    }

    pub fn request_status(&self) -> &str {
        &self.request_status
    }

    pub fn response_status(&self) -> &str {
        &self.response_status
    }

    pub fn offset_status(&self) -> &str {
        &self.offset_status
    }

    /// Number of results applied so far.
    pub fn render_id(&self) -> u64 {
        self.render_id
    }

    pub fn last_job_id(&self) -> Option<u64> {
        self.last_job_id
    }

    pub fn last_update(&self) -> Option<&RenderUpdate> {
        self.last_update.as_ref()
    }

    // =========================================================================
    // Tick
    // =========================================================================

    /// Run one display tick.
    pub async fn tick(&mut self) -> Result<TickReport> {
        let mut report = TickReport::default();
        let (width, height) = self.canvas;
        if self.binding.is_none() || width == 0 || height == 0 {
            return Ok(report);
        }

        if self.canvas != self.last_canvas {
            debug!(view = %self.id, width, height, "Canvas resized, refitting viewport");
            self.viewport = self.requested_viewport.fit_aspect(width, height);
            self.last_canvas = self.canvas;
        }

        let logic_box = self.mapper.unproject_box(&self.viewport)?;
        if self.new_job || self.last_query_box.as_ref() != Some(&logic_box) {
            let job_id = self.push_job(logic_box.clone()).await?;
            report.pushed_job = Some(job_id);
            let following = std::mem::take(&mut self.following);
            if self.linked && !following {
                report.link = Some(LinkUpdate {
                    offset: self.mapper.offset(),
                    logic_box,
                });
            }
        }

        if let Some(outcome) = self.scheduler.pop_result(true) {
            let job_id = outcome.job_id();
            if Some(job_id) != self.last_job_id {
                debug!(
                    view = %self.id,
                    job_id,
                    current = ?self.last_job_id,
                    "Discarding stale result"
                );
                metrics::counter!("view_results_discarded").increment(1);
                report.discarded = true;
            } else {
                match outcome {
                    QueryOutcome::Partial(result) => {
                        self.apply_result(result)?;
                        report.applied_job = Some(job_id);
                    }
                    QueryOutcome::Failed { message, .. } => {
                        self.response_status = status::failure_status(&message);
                        report.failed = true;
                    }
                }
            }
        }

        Ok(report)
    }

    async fn push_job(&mut self, logic_box: LogicalBox) -> Result<u64> {
        let binding = self.binding()?;
        let dataset = binding.dataset.clone();
        let access = binding.access.clone();
        let max_level = binding.max_level;
        let pdim = binding.dims.len();

        self.token.set_true();
        self.scheduler.wait_idle().await;
        self.token = CancellationToken::new();

        let (width, height) = self.canvas;
        let budget = if self.view_dependent {
            QueryBudget::MaxPixels(view_dependent_budget(
                width,
                height,
                self.resolution,
                max_level,
                self.engine.quality_base,
            ))
        } else {
            QueryBudget::Resolution(self.resolution)
        };
        let num_refinements = self.engine.effective_refinements(self.num_refinements, pdim);

        let job = ProgressiveQueryJob::new(dataset, access, logic_box.clone())
            .at_timestep(self.timestep)
            .with_field(self.field.clone())
            .along(self.mapper.direction())
            .with_budget(budget)
            .with_refinements(num_refinements)
            .with_token(self.token.clone());

        self.request_status = status::request_status(self.timestep, &logic_box, width, height);
        self.response_status = status::RESPONSE_RUNNING.to_string();

        let job_id = self.scheduler.push_job(job)?;
        debug!(
            view = %self.id,
            job_id,
            logic_box = %logic_box.compact(),
            budget = ?budget,
            num_refinements,
            "Pushed new job"
        );

        self.last_query_box = Some(logic_box);
        self.last_job_id = Some(job_id);
        self.new_job = false;
        Ok(job_id)
    }

    fn apply_result(&mut self, result: PartialResult) -> Result<()> {
        let max_level = self.binding()?.max_level;
        let physic_box = self.mapper.project_box(&result.logic_box)?;
        let palette_range = self.palette.update(result.image.value_range());

        self.offset_status = self
            .offset_report(&result.logic_box, result.level, max_level)?
            .to_status();
        self.response_status = status::response_status(&result, max_level);
        self.render_id += 1;

        debug!(
            view = %self.id,
            job_id = result.job_id,
            level = result.level,
            running = result.running,
            width = result.image.width,
            height = result.image.height,
            palette = ?palette_range,
            "Applying result"
        );

        let update = RenderUpdate {
            view_id: self.id,
            job_id: result.job_id,
            image: result.image,
            logic_box: result.logic_box,
            physic_box,
            palette_range,
            level: result.level,
            max_level,
            running: result.running,
            sequence: result.sequence,
            elapsed: result.elapsed,
            render_id: self.render_id,
        };
        for callback in &mut self.callbacks {
            callback(&update);
        }
        self.last_update = Some(update);
        Ok(())
    }

    fn offset_report(
        &self,
        rendered: &LogicalBox,
        level: u32,
        max_level: u32,
    ) -> Result<OffsetReport> {
        let requested_physic = self.mapper.offset();
        if self.mapper.point_dim() != 3 {
            return Ok(OffsetReport {
                requested_physic,
                rendered_physic: 0.0,
                requested_logic: 0.0,
                rendered_logic: 0.0,
                level,
                max_level,
            });
        }

        let dir = self.mapper.direction().axis();
        let rendered_logic = rendered.p1.get(dir).copied().unwrap_or(0.0);
        Ok(OffsetReport {
            requested_physic,
            rendered_physic: self.mapper.physic_offset_of(rendered_logic),
            requested_logic: self.mapper.logic_offset()?,
            rendered_logic,
            level,
            max_level,
        })
    }

    /// Follow a linked sibling: offset first, then box.
    ///
    /// A box is accepted when it differs from both the requested and the
    /// fitted viewport, so a view never re-follows the box it sent itself.
    /// The resulting push carries no link of its own. Any in-flight job is
    /// aborted by that push, not here.
    pub fn apply_link(&mut self, link: &LinkUpdate) -> Result<()> {
        if self.binding.is_none() || link.logic_box.dim() != self.point_dim() {
            return Ok(());
        }

        let offset = self.snap_offset(link.offset);
        let viewport = self.mapper.project_box(&link.logic_box)?;
        let offset_changed = offset != self.mapper.offset();
        let box_changed = viewport != self.requested_viewport && viewport != self.viewport;
        if !offset_changed && !box_changed {
            return Ok(());
        }

        if offset_changed {
            debug!(
                view = %self.id,
                old = self.mapper.offset(),
                new = offset,
                "Following linked offset"
            );
            self.mapper.set_offset(offset);
            self.new_job = true;
        }
        if box_changed {
            debug!(view = %self.id, viewport = ?viewport, "Following linked box");
            self.request_viewport(viewport);
        }
        self.following = true;
        Ok(())
    }
}

impl fmt::Debug for ViewController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewController")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("mapper", &self.mapper)
            .field("viewport", &self.viewport)
            .field("canvas", &self.canvas)
            .field("last_job_id", &self.last_job_id)
            .field("render_id", &self.render_id)
            .finish()
    }
}
