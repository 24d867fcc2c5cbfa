use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::{
    composition::{
        branding::branding_overlays,
        captions::{caption_overlays, CaptionCue},
        result::{
            clip_short_name, BrandedShort, ClipShorts, CompilationResult, DroppedClip, IncludedClip, RunMode,
            TransitionRecord,
        },
        workspace::RunWorkspace,
    },
    config::Config,
    error::{AssemblyError, CompositorError, Result, SelectionError, ValidationError},
    selection::{pack, select, PackParams, PlannedSegment, SelectionParams, SelectionPlan},
    transitions::{snap_down_to_frames, StitchedTimeline, TimelineSegment, TransitionPlanner, TransitionSpec},
    validation::prepare_clip,
    video::{
        filters::{TextOverlay, TextPlacement},
        types::format_handle,
        CardJob, ClipPool, ClipValidity, FitPolicy, MediaBackend, OutputParams, SegmentJob, TimelineJob,
    },
};

/// Title card font size as a fraction of output height
const TITLE_FONT_RATIO: f64 = 0.0365;

/// Single-source Shorts stay a second under the platform limit
const STANDALONE_SHORT_MAX: f64 = 59.0;

/// Per-run inputs besides the clip pool
#[derive(Debug, Clone, Default)]
pub struct AssemblyOptions {
    /// Shown on the title card when titles are enabled
    pub title: Option<String>,

    /// Timed captions burned into the output
    pub captions: Vec<CaptionCue>,
}

/// A normalized intermediate ready for stitching
#[derive(Debug, Clone)]
struct RenderedPiece {
    label: String,
    path: PathBuf,
    length: f64,
    /// The planned window, for clip pieces
    segment: Option<PlannedSegment>,
}

/// Title card, intro and outro around the clip block
#[derive(Debug, Default)]
struct Bookends {
    head: Vec<RenderedPiece>,
    tail: Vec<RenderedPiece>,
}

impl Bookends {
    fn duration(&self) -> f64 {
        self.head.iter().chain(&self.tail).map(|p| p.length).sum()
    }
}

/// What the encode step hands back
struct Encoded {
    timeline: StitchedTimeline,
    clips: Vec<RenderedPiece>,
    transitions: Vec<Option<TransitionSpec>>,
}

/// Main composition engine that turns a clip pool into a finished video
///
/// The engine follows a clear pipeline:
/// 1. Validation - probe every clip, repair or drop the broken ones
/// 2. Bookends - render title card, intro and outro, reserving their time
/// 3. Planning & Rendering - select (or pack) segments and render each one,
///    re-planning when a clip fails mid-assembly
/// 4. Stitching & Encoding - join segments with transitions, burn captions,
///    encode (retried once with the surviving clips)
/// 5. Result - measure the output and write the metadata record
pub struct CompositionEngine<B: MediaBackend> {
    config: Config,
    backend: B,
    cancel: Option<watch::Receiver<bool>>,
}

impl<B: MediaBackend> CompositionEngine<B> {
    /// Create a new engine; the configuration is validated once here
    pub fn new(config: Config, backend: B) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            backend,
            cancel: None,
        })
    }

    /// Abort between clip-processing steps once `cancel` turns true
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Assemble a long-form compilation within `compilation.target_duration`
    pub async fn compile<P: AsRef<Path>>(
        &self,
        pool: ClipPool,
        output_path: P,
        options: &AssemblyOptions,
    ) -> Result<CompilationResult> {
        self.run(RunMode::Compilation, pool, output_path.as_ref(), options).await
    }

    /// Pack a multi-clip Short under the hard cap
    pub async fn shorts<P: AsRef<Path>>(
        &self,
        pool: ClipPool,
        output_path: P,
        options: &AssemblyOptions,
    ) -> Result<CompilationResult> {
        self.run(RunMode::Shorts, pool, output_path.as_ref(), options).await
    }

    async fn run(
        &self,
        mode: RunMode,
        mut pool: ClipPool,
        output_path: &Path,
        options: &AssemblyOptions,
    ) -> Result<CompilationResult> {
        info!("🎬 Starting Reel-Compositor {:?} run", mode);
        info!("   Clips: {}", pool.len());
        info!("   Output: {:?}", output_path);
        info!("   Transitions: {}", self.config.transitions.transition_type);

        let workspace = RunWorkspace::create(&self.config.runtime.temp_dir)?;
        let planner = TransitionPlanner::from_config(&self.config.transitions);
        let mut dropped = Vec::new();

        // Pipeline Step 1: Validation
        self.validate_pool(&mut pool, &workspace, &mut dropped).await?;

        // Pipeline Step 2: Title card, intro and outro
        let bookends = self.render_bookends(mode, options, &workspace).await?;

        // Pipeline Step 3: Planning and segment rendering
        let clips = self
            .plan_and_render(mode, &mut pool, bookends.duration(), &planner, &workspace, &mut dropped)
            .await?;

        // Pipeline Step 4: Stitching and final encode
        if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let encoded = self
            .encode(mode, clips, &bookends, &planner, options, output_path, &mut dropped)
            .await?;

        // Pipeline Step 5: Result
        let result = self
            .build_result(mode, encoded, &bookends, &planner, output_path, dropped)
            .await;
        let metadata = result.write_json()?;

        info!("🎉 Done! Output saved to: {:?}", output_path);
        info!("   Metadata: {:?}", metadata);
        Ok(result)
    }

    // ==========================================
    // PIPELINE STEP 1: VALIDATION
    // ==========================================

    async fn validate_pool(
        &self,
        pool: &mut ClipPool,
        workspace: &RunWorkspace,
        dropped: &mut Vec<DroppedClip>,
    ) -> Result<()> {
        info!("🔍 Step 1: Validating clips...");

        let repairs = workspace.repairs_dir()?;
        let unchecked: Vec<_> = pool
            .iter()
            .filter(|c| c.validity == ClipValidity::Unchecked)
            .cloned()
            .collect();

        for clip in unchecked {
            self.check_cancelled()?;

            match prepare_clip(&self.backend, &clip, self.config.runtime.auto_repair, Some(repairs.as_path())).await {
                Ok(ready) => pool.replace(ready),
                Err(e) if e.is_recoverable() => {
                    warn!("   Dropping {}: {}", clip.id, e);
                    pool.mark_invalid(&clip.id)?;
                    dropped.push(DroppedClip {
                        id: clip.id.clone(),
                        path: clip.path.clone(),
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        info!("   ✅ {} of {} clips usable", pool.usable_count(), pool.len());
        Ok(())
    }

    // ==========================================
    // PIPELINE STEP 2: BOOKENDS
    // ==========================================

    async fn render_bookends(
        &self,
        mode: RunMode,
        options: &AssemblyOptions,
        workspace: &RunWorkspace,
    ) -> Result<Bookends> {
        let assets = &self.config.assets;
        let mut bookends = Bookends::default();

        if let Some(intro) = assets.intro() {
            bookends.head.push(self.render_asset("intro", intro, workspace).await?);
        }

        let title = options.title.as_deref().map(str::trim).filter(|t| !t.is_empty());
        if let (true, Some(title)) = (assets.include_titles, title) {
            let duration = assets.title_card_duration(self.budget(mode));
            if duration > 0.0 {
                self.check_cancelled()?;
                let output = workspace.asset_path("title_card");
                let job = CardJob {
                    duration,
                    text: Some(TextOverlay::new(
                        title,
                        self.config.output.height,
                        TITLE_FONT_RATIO,
                        TextPlacement::Center,
                    )),
                    output: output.clone(),
                    params: self.config.output.clone(),
                    font_file: assets.font_file.clone(),
                };
                self.backend.render_card(&job).await?;
                debug!("Title card '{}' ({:.2}s)", title, duration);

                bookends.head.push(RenderedPiece {
                    label: "title_card".to_string(),
                    path: output,
                    length: duration,
                    segment: None,
                });
            }
        }

        if let Some(outro) = assets.outro() {
            bookends.tail.push(self.render_asset("outro", outro, workspace).await?);
        }

        if !bookends.head.is_empty() || !bookends.tail.is_empty() {
            info!("🎞️  Step 2: Reserved {:.2}s for title card and intro/outro", bookends.duration());
        }

        Ok(bookends)
    }

    async fn render_asset(&self, label: &str, path: &Path, workspace: &RunWorkspace) -> Result<RenderedPiece> {
        self.check_cancelled()?;

        if !path.exists() {
            return Err(AssemblyError::MissingAsset {
                path: path.display().to_string(),
            }
            .into());
        }

        let probe = self.backend.probe(path).await?;
        let length = probe.duration.ok_or_else(|| AssemblyError::MissingAsset {
            path: format!("{} (no duration)", path.display()),
        })?;

        let output = workspace.asset_path(label);
        let job = SegmentJob {
            source: path.to_path_buf(),
            start: 0.0,
            length,
            has_audio: probe.has_audio,
            overlays: Vec::new(),
            output: output.clone(),
            params: self.config.output.clone(),
            font_file: None,
        };
        self.backend.render_segment(&job).await?;

        Ok(RenderedPiece {
            label: label.to_string(),
            path: output,
            length,
            segment: None,
        })
    }

    // ==========================================
    // PIPELINE STEP 3: PLANNING & RENDERING
    // ==========================================

    /// Seconds the run may fill: target duration or the clamped Shorts cap
    fn budget(&self, mode: RunMode) -> f64 {
        match mode {
            RunMode::Compilation => self.config.compilation.target_duration,
            RunMode::Shorts => self.config.shorts.effective_cap(),
        }
    }

    fn plan(&self, mode: RunMode, pool: &ClipPool, reserved: f64, overlap: f64) -> Result<SelectionPlan> {
        match mode {
            RunMode::Compilation => {
                let mut params = SelectionParams::from_config(&self.config.compilation, overlap, self.config.output.fps);
                params.target_duration -= reserved;
                select(pool, &params)
            }
            RunMode::Shorts => {
                let params = PackParams::from_config(&self.config.shorts, overlap, reserved, self.config.output.fps);
                pack(pool, &params)
            }
        }
    }

    async fn plan_and_render(
        &self,
        mode: RunMode,
        pool: &mut ClipPool,
        reserved: f64,
        planner: &TransitionPlanner,
        workspace: &RunWorkspace,
        dropped: &mut Vec<DroppedClip>,
    ) -> Result<Vec<RenderedPiece>> {
        let overlap = planner.overlap(self.config.output.fps);
        let mut cache: HashMap<String, RenderedPiece> = HashMap::new();
        let mut replans = 0;

        loop {
            self.check_cancelled()?;
            info!("📋 Step 3: Planning segments (pass {})...", replans + 1);

            let plan = match self.plan(mode, pool, reserved, overlap) {
                Ok(plan) => plan,
                Err(CompositorError::Selection(SelectionError::InsufficientContent { available, required }))
                    if replans > 0 =>
                {
                    return Err(AssemblyError::InsufficientContent {
                        available,
                        required,
                        attempted: dropped.iter().map(|d| d.id.clone()).collect(),
                    }
                    .into());
                }
                Err(e) => return Err(e),
            };

            let mut pieces = Vec::with_capacity(plan.len());
            let mut failure = None;

            for (index, segment) in plan.segments.iter().enumerate() {
                self.check_cancelled()?;

                let reusable = cache
                    .get(&segment.clip_id)
                    .filter(|p| p.segment.as_ref() == Some(segment))
                    .cloned();
                if let Some(piece) = reusable {
                    pieces.push(piece);
                    continue;
                }

                match self.render_clip(index, segment, workspace).await {
                    Ok(piece) => {
                        cache.insert(segment.clip_id.clone(), piece.clone());
                        pieces.push(piece);
                    }
                    Err(e) if e.is_recoverable() => {
                        failure = Some((segment.clone(), e));
                        break;
                    }
                    Err(e) => return Err(e),
                }
            }

            let Some((segment, error)) = failure else {
                info!(
                    "   ✅ Rendered {} segments ({:.1}s planned)",
                    pieces.len(),
                    plan.planned_duration()
                );
                return Ok(pieces);
            };

            warn!("   Clip {} failed mid-assembly, re-planning: {}", segment.clip_id, error);
            pool.mark_invalid(&segment.clip_id)?;
            dropped.push(DroppedClip {
                id: segment.clip_id.clone(),
                path: segment.path.clone(),
                reason: error.to_string(),
            });

            replans += 1;
            if replans > self.config.runtime.max_replans {
                return Err(AssemblyError::InsufficientContent {
                    available: pool.usable_count(),
                    required: self.min_clips(mode),
                    attempted: dropped.iter().map(|d| d.id.clone()).collect(),
                }
                .into());
            }
        }
    }

    /// Re-check the source and render one trimmed, normalized segment
    async fn render_clip(
        &self,
        index: usize,
        segment: &PlannedSegment,
        workspace: &RunWorkspace,
    ) -> Result<RenderedPiece> {
        let probe = self.backend.probe(&segment.path).await?;

        let overlays = if self.config.assets.include_titles {
            segment
                .author
                .as_deref()
                .and_then(format_handle)
                .map(|handle| {
                    TextOverlay::new(
                        handle,
                        self.config.output.height,
                        self.config.assets.attribution_font_ratio,
                        TextPlacement::Top,
                    )
                })
                .into_iter()
                .collect()
        } else {
            Vec::new()
        };

        let output = workspace.segment_path(index, &segment.clip_id);
        let job = SegmentJob {
            source: segment.path.clone(),
            start: segment.start,
            length: segment.length,
            has_audio: probe.has_audio,
            overlays,
            output: output.clone(),
            params: self.config.output.clone(),
            font_file: self.config.assets.font_file.clone(),
        };

        self.backend
            .render_segment(&job)
            .await
            .map_err(|e| AssemblyError::SegmentFailed {
                clip_id: segment.clip_id.clone(),
                reason: e.to_string(),
            })?;

        debug!(
            "Rendered {} [{:.2}s +{:.2}s] -> {}",
            segment.clip_id,
            segment.start,
            segment.length,
            output.display()
        );

        Ok(RenderedPiece {
            label: segment.clip_id.clone(),
            path: output,
            length: segment.length,
            segment: Some(segment.clone()),
        })
    }

    fn min_clips(&self, mode: RunMode) -> usize {
        match mode {
            RunMode::Compilation => self.config.compilation.min_clips,
            RunMode::Shorts => self.config.shorts.min_clips.max(1),
        }
    }

    // ==========================================
    // PIPELINE STEP 4: STITCHING & ENCODING
    // ==========================================

    #[allow(clippy::too_many_arguments)]
    async fn encode(
        &self,
        mode: RunMode,
        clips: Vec<RenderedPiece>,
        bookends: &Bookends,
        planner: &TransitionPlanner,
        options: &AssemblyOptions,
        output_path: &Path,
        dropped: &mut Vec<DroppedClip>,
    ) -> Result<Encoded> {
        info!("🎬 Step 4: Stitching {} segments and encoding...", clips.len());
        self.check_cancelled()?;

        let (timeline, transitions, job) = self.timeline_job(&clips, bookends, planner, options, output_path)?;
        let first_error = match self.backend.render_timeline(&job).await {
            Ok(()) => {
                return Ok(Encoded {
                    timeline,
                    clips,
                    transitions,
                })
            }
            Err(e) => e,
        };

        warn!("   Encode failed, retrying with surviving segments: {}", first_error);
        self.check_cancelled()?;

        let mut survivors = Vec::with_capacity(clips.len());
        for piece in clips {
            if self.backend.probe(&piece.path).await.is_ok() {
                survivors.push(piece);
            } else {
                warn!("   Segment for {} no longer probes, dropping it", piece.label);
                dropped.push(DroppedClip {
                    id: piece.label.clone(),
                    path: piece
                        .segment
                        .as_ref()
                        .map(|s| s.path.clone())
                        .unwrap_or_else(|| piece.path.clone()),
                    reason: "intermediate unreadable after failed encode".to_string(),
                });
            }
        }

        let attempted: Vec<String> = survivors.iter().map(|p| p.label.clone()).collect();
        let required = self.min_clips(mode);
        if survivors.len() < required {
            return Err(AssemblyError::InsufficientContent {
                available: survivors.len(),
                required,
                attempted,
            }
            .into());
        }

        let (timeline, transitions, job) = self.timeline_job(&survivors, bookends, planner, options, output_path)?;
        match self.backend.render_timeline(&job).await {
            Ok(()) => Ok(Encoded {
                timeline,
                clips: survivors,
                transitions,
            }),
            Err(e) => Err(AssemblyError::EncodeFailed {
                reason: e.to_string(),
                attempted,
            }
            .into()),
        }
    }

    fn timeline_job(
        &self,
        clips: &[RenderedPiece],
        bookends: &Bookends,
        planner: &TransitionPlanner,
        options: &AssemblyOptions,
        output_path: &Path,
    ) -> Result<(StitchedTimeline, Vec<Option<TransitionSpec>>, TimelineJob)> {
        let fps = self.config.output.fps;
        let transitions = planner.plan(clips.len().saturating_sub(1), fps);

        let mut timeline = StitchedTimeline::new();
        let mut inputs = Vec::new();

        for piece in &bookends.head {
            timeline.push(TimelineSegment::new(&piece.label, piece.length), None)?;
            inputs.push(piece.path.clone());
        }

        for (index, piece) in clips.iter().enumerate() {
            let join = index.checked_sub(1).and_then(|i| transitions[i]);
            timeline.push(TimelineSegment::new(&piece.label, piece.length), join)?;
            inputs.push(piece.path.clone());
        }

        for piece in &bookends.tail {
            timeline.push(TimelineSegment::new(&piece.label, piece.length), None)?;
            inputs.push(piece.path.clone());
        }

        let font_file = self.config.assets.font_file.as_deref();
        let captions: Vec<String> = caption_overlays(
            &options.captions,
            timeline.total_duration(),
            self.config.output.height,
            self.config.assets.caption_font_ratio,
        )
        .iter()
        .map(|overlay| overlay.to_filter(font_file))
        .collect();

        let job = TimelineJob {
            inputs,
            filter_graph: timeline.filter_graph(fps, &captions),
            output: output_path.to_path_buf(),
            params: self.config.output.clone(),
            threads: self.config.runtime.encode_threads,
        };

        Ok((timeline, transitions, job))
    }

    // ==========================================
    // PIPELINE STEP 5: RESULT
    // ==========================================

    async fn build_result(
        &self,
        mode: RunMode,
        encoded: Encoded,
        bookends: &Bookends,
        planner: &TransitionPlanner,
        output_path: &Path,
        dropped: Vec<DroppedClip>,
    ) -> CompilationResult {
        let Encoded {
            timeline,
            clips,
            transitions,
        } = encoded;

        let offset = bookends.head.len();
        let included: Vec<IncludedClip> = clips
            .iter()
            .enumerate()
            .filter_map(|(i, piece)| {
                let segment = piece.segment.as_ref()?;
                Some(IncludedClip {
                    id: segment.clip_id.clone(),
                    author: segment.author.clone(),
                    title: segment.title.clone(),
                    source_start: segment.start,
                    length: segment.length,
                    timeline_start: timeline.starts().get(offset + i).copied().unwrap_or_default(),
                })
            })
            .collect();

        let records: Vec<TransitionRecord> = clips
            .iter()
            .zip(transitions.iter().copied())
            .map(|(piece, spec)| TransitionRecord {
                after: piece.label.clone(),
                kind: spec.map(|s| s.kind),
                duration: spec.map(|s| s.duration).unwrap_or(0.0),
            })
            .collect();

        let encoded_duration = self
            .backend
            .probe(output_path)
            .await
            .ok()
            .and_then(|probe| probe.duration);

        let budget = self.budget(mode);
        let total = timeline.total_duration();
        let shortfall = measure_shortfall(
            budget,
            total,
            planner.overlap(self.config.output.fps),
            included.len(),
            self.config.runtime.shortfall_tolerance,
        );

        info!("   ✅ Output assembled:");
        info!("      Clips: {}", included.len());
        info!("      Duration: {:.2}s of {:.2}s budget", total, budget);
        if let Some(encoded) = encoded_duration {
            debug!("      Encoded duration: {:.2}s", encoded);
        }
        if let Some(missing) = shortfall {
            warn!("   Output is {:.2}s short of its budget", missing);
        }
        if !dropped.is_empty() {
            info!("      Dropped clips: {}", dropped.len());
        }

        CompilationResult {
            mode,
            output_path: output_path.to_path_buf(),
            total_duration: total,
            encoded_duration,
            budget,
            shortfall,
            clips: included,
            transitions: records,
            transition_seed: planner.seed(),
            dropped,
            created_at: Utc::now(),
        }
    }

    // ==========================================
    // STANDALONE SHORTS
    // ==========================================

    /// Cut the opening of a finished video into a branded vertical Short
    pub async fn short_from_video<P, Q>(&self, source: P, output_path: Q, title: Option<&str>) -> Result<BrandedShort>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        let (source, output_path) = (source.as_ref(), output_path.as_ref());
        info!("✂️  Cutting a Short from {:?}", source);
        self.check_cancelled()?;

        if !source.exists() {
            return Err(ValidationError::MissingFile {
                path: source.display().to_string(),
            }
            .into());
        }

        let probe = self.backend.probe(source).await?;
        let duration = probe
            .duration
            .filter(|d| d.is_finite() && *d > 0.0)
            .ok_or_else(|| ValidationError::ProbeFailed {
                path: source.display().to_string(),
                reason: "stream reports no duration".to_string(),
            })?;

        let length = self.standalone_length(duration);
        if length < duration {
            warn!("   Truncating {:.1}s to {:.1}s for Shorts", duration, length);
        }

        if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let overlays = branding_overlays(Some(&self.config.shorts.channel_name), &self.config);
        let job = self.standalone_job(source, length, probe.has_audio, overlays, output_path);
        self.backend.render_segment(&job).await?;

        let short = BrandedShort {
            clip_id: None,
            source: source.to_path_buf(),
            output_path: output_path.to_path_buf(),
            author: None,
            title: title.map(str::trim).filter(|t| !t.is_empty()).map(str::to_string),
            length,
            source_duration: duration,
            overlays: job.overlays.iter().map(|o| o.text.clone()).collect(),
            created_at: Utc::now(),
        };
        let metadata = short.write_json()?;

        info!("🎉 Short saved to: {:?}", output_path);
        info!("   Metadata: {:?}", metadata);
        Ok(short)
    }

    /// One branded Short per usable clip, each cut to the cap.
    ///
    /// Clips that fail validation or rendering are skipped and reported in
    /// `dropped`; the call fails only when no Short could be made.
    pub async fn shorts_per_clip<P: AsRef<Path>>(&self, mut pool: ClipPool, output_dir: P) -> Result<ClipShorts> {
        let output_dir = output_dir.as_ref();
        info!("🎬 Cutting one Short per clip");
        info!("   Clips: {}", pool.len());
        info!("   Output directory: {:?}", output_dir);

        let workspace = RunWorkspace::create(&self.config.runtime.temp_dir)?;
        let mut dropped = Vec::new();
        self.validate_pool(&mut pool, &workspace, &mut dropped).await?;

        tokio::fs::create_dir_all(output_dir).await?;

        let mut shorts = Vec::new();
        for clip in pool.iter().filter(|c| c.is_usable()) {
            self.check_cancelled()?;

            let duration = clip.usable_duration();
            let length = self.standalone_length(duration);
            let output = output_dir.join(clip_short_name(&clip.id));
            let overlays = branding_overlays(clip.author.as_deref(), &self.config);
            let job = self.standalone_job(&clip.path, length, clip.has_audio, overlays, &output);

            if let Err(e) = self.backend.render_segment(&job).await {
                warn!("   Skipping {}: {}", clip.id, e);
                dropped.push(DroppedClip {
                    id: clip.id.clone(),
                    path: clip.path.clone(),
                    reason: e.to_string(),
                });
                continue;
            }

            let short = BrandedShort {
                clip_id: Some(clip.id.clone()),
                source: clip.path.clone(),
                output_path: output,
                author: clip.author.clone(),
                title: clip.title.clone(),
                length,
                source_duration: duration,
                overlays: job.overlays.iter().map(|o| o.text.clone()).collect(),
                created_at: Utc::now(),
            };
            short.write_json()?;
            debug!("Short for {} ({:.2}s) -> {}", clip.id, length, short.output_path.display());
            shorts.push(short);
        }

        if shorts.is_empty() {
            return Err(AssemblyError::InsufficientContent {
                available: 0,
                required: 1,
                attempted: dropped.iter().map(|d| d.id.clone()).collect(),
            }
            .into());
        }

        info!("   ✅ {} Shorts written, {} clips skipped", shorts.len(), dropped.len());
        Ok(ClipShorts { shorts, dropped })
    }

    /// Whole frames of `duration` that fit a single-source Short
    fn standalone_length(&self, duration: f64) -> f64 {
        let cap = self.config.shorts.effective_cap().min(STANDALONE_SHORT_MAX);
        snap_down_to_frames(duration.min(cap), self.config.output.fps)
    }

    /// The opening `length` seconds of `source`, cropped to fill the frame
    fn standalone_job(
        &self,
        source: &Path,
        length: f64,
        has_audio: bool,
        overlays: Vec<TextOverlay>,
        output: &Path,
    ) -> SegmentJob {
        SegmentJob {
            source: source.to_path_buf(),
            start: 0.0,
            length,
            has_audio,
            overlays,
            output: output.to_path_buf(),
            params: OutputParams {
                fit: FitPolicy::Crop,
                ..self.config.output.clone()
            },
            font_file: self.config.assets.font_file.clone(),
        }
    }

    fn check_cancelled(&self) -> Result<()> {
        if let Some(cancel) = &self.cancel {
            if *cancel.borrow() {
                warn!("Run cancelled");
                return Err(CompositorError::Cancelled);
            }
        }
        Ok(())
    }
}

/// Seconds missing from a fully used budget, when beyond `tolerance`.
///
/// The budget holds each join's overlap on top of the segment lengths, and
/// the stitched output then loses that overlap again, so a fully used budget
/// yields `budget - 2 * joins * overlap`.
pub fn measure_shortfall(budget: f64, total: f64, overlap: f64, clips: usize, tolerance: f64) -> Option<f64> {
    let joins = clips.saturating_sub(1) as f64;
    let attainable = budget - 2.0 * joins * overlap;
    let missing = attainable - total;
    (missing > tolerance).then_some(missing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composition::CaptionCue;
    use crate::transitions::TransitionPolicy;
    use crate::video::backend::testing::{probe_info, FakeBackend, FakeMedia};
    use crate::video::SourceClip;
    use tempfile::{tempdir, TempDir};

    struct Fixture {
        dir: TempDir,
        pool: ClipPool,
        backend: FakeBackend,
    }

    fn fixture(durations: &[f64]) -> Fixture {
        let dir = tempdir().unwrap();
        let backend = FakeBackend::new();
        let mut clips = Vec::new();

        for (i, duration) in durations.iter().enumerate() {
            let path = dir.path().join(format!("clip_{i}.mp4"));
            std::fs::write(&path, b"x").unwrap();
            backend.add(&path, FakeMedia::good(*duration));
            clips.push(SourceClip::new(&path, i as u32 + 1).with_author(format!("creator{i}")));
        }

        Fixture {
            dir,
            pool: ClipPool::from_clips(clips),
            backend,
        }
    }

    fn config(dir: &Path) -> Config {
        let mut config = Config::default();
        config.runtime.temp_dir = dir.join("temp");
        config.compilation.target_duration = 60.0;
        config.transitions.seed = Some(7);
        config
    }

    #[tokio::test]
    async fn test_compile_happy_path() {
        let fx = fixture(&[20.0, 20.0, 20.0, 20.0]);
        let output = fx.dir.path().join("out").join("compilation.mp4");
        let engine = CompositionEngine::new(config(fx.dir.path()), fx.backend).unwrap();

        let result = engine.compile(fx.pool, &output, &AssemblyOptions::default()).await.unwrap();

        assert_eq!(result.clips.len(), 4);
        assert_eq!(result.transitions.len(), 3);
        assert_eq!(result.transition_seed, 7);
        assert!(CompilationResult::metadata_path(&output).exists());

        let lengths: f64 = result.clips.iter().map(|c| c.length).sum();
        let overlaps: f64 = result.transitions.iter().map(|t| t.duration).sum();
        assert!((result.total_duration - (lengths - overlaps)).abs() < 1.0 / 30.0);

        // attribution is burned into each segment
        let jobs = engine.backend().segment_jobs.lock().unwrap();
        assert!(jobs.iter().all(|j| j.overlays.len() == 1));
    }

    #[tokio::test]
    async fn test_one_corrupt_clip_is_dropped() {
        let fx = fixture(&[15.0, 15.0, 15.0, 15.0]);
        let corrupt = fx.dir.path().join("corrupt.mp4");
        std::fs::write(&corrupt, b"x").unwrap();
        fx.backend.add(&corrupt, FakeMedia::unreadable());

        let mut pool = fx.pool.clone();
        pool.push(SourceClip::new(&corrupt, 99));

        let engine = CompositionEngine::new(config(fx.dir.path()), fx.backend).unwrap();
        let result = engine
            .compile(pool, fx.dir.path().join("out.mp4"), &AssemblyOptions::default())
            .await
            .unwrap();

        assert_eq!(result.clips.len(), 4);
        assert_eq!(result.dropped.len(), 1);
        assert_eq!(result.dropped[0].id, "corrupt");
    }

    #[tokio::test]
    async fn test_same_stem_repairs_stay_distinct() {
        let dir = tempdir().unwrap();
        let backend = FakeBackend::new();
        let mut clips = Vec::new();

        for (i, (folder, duration, fps)) in [("a", 10.0, None), ("b", 20.0, None), ("c", 15.0, Some(30.0))]
            .into_iter()
            .enumerate()
        {
            let path = dir.path().join(folder).join("clip.mp4");
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, b"x").unwrap();
            backend.add(
                &path,
                FakeMedia {
                    probe: Some(probe_info(Some(duration), fps)),
                    decodes: true,
                    render_fails: false,
                },
            );
            clips.push(SourceClip::new(&path, i as u32 + 1).with_author(format!("creator{i}")));
        }

        let engine = CompositionEngine::new(config(dir.path()), backend).unwrap();
        let result = engine
            .compile(
                ClipPool::from_clips(clips),
                dir.path().join("out.mp4"),
                &AssemblyOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(result.clip_ids(), vec!["clip", "clip_2", "clip_3"]);

        let jobs = engine.backend().segment_jobs.lock().unwrap();
        let sources: std::collections::HashSet<_> = jobs.iter().map(|j| j.source.clone()).collect();
        assert_eq!(sources.len(), 3, "each clip renders from its own file");
        // the 10 s clip cannot supply more than its own footage
        assert!(result.clips[0].length <= 10.0);
    }

    #[tokio::test]
    async fn test_render_failure_triggers_replan() {
        let fx = fixture(&[15.0, 15.0, 15.0, 15.0]);
        fx.backend.break_on_render(fx.dir.path().join("clip_1.mp4"));

        let engine = CompositionEngine::new(config(fx.dir.path()), fx.backend).unwrap();
        let result = engine
            .compile(fx.pool, fx.dir.path().join("out.mp4"), &AssemblyOptions::default())
            .await
            .unwrap();

        assert_eq!(result.clip_ids(), vec!["clip_0", "clip_2", "clip_3"]);
        assert_eq!(result.dropped[0].id, "clip_1");
    }

    #[tokio::test]
    async fn test_replan_below_minimum_fails() {
        let fx = fixture(&[15.0, 15.0, 15.0]);
        fx.backend.break_on_render(fx.dir.path().join("clip_2.mp4"));

        let engine = CompositionEngine::new(config(fx.dir.path()), fx.backend).unwrap();
        let result = engine
            .compile(fx.pool, fx.dir.path().join("out.mp4"), &AssemblyOptions::default())
            .await;

        match result {
            Err(CompositorError::Assembly(AssemblyError::InsufficientContent { attempted, .. })) => {
                assert_eq!(attempted, vec!["clip_2".to_string()]);
            }
            other => panic!("expected InsufficientContent, got {:?}", other.map(|r| r.clip_ids().len())),
        }
    }

    #[tokio::test]
    async fn test_encode_is_retried_once() {
        let fx = fixture(&[15.0, 15.0, 15.0]);
        fx.backend.fail_encodes(1);

        let engine = CompositionEngine::new(config(fx.dir.path()), fx.backend).unwrap();
        let result = engine
            .compile(fx.pool, fx.dir.path().join("out.mp4"), &AssemblyOptions::default())
            .await
            .unwrap();

        assert_eq!(result.clips.len(), 3);
        assert_eq!(engine.backend().timeline_jobs.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_second_encode_failure_surfaces() {
        let fx = fixture(&[15.0, 15.0, 15.0]);
        fx.backend.fail_encodes(2);

        let engine = CompositionEngine::new(config(fx.dir.path()), fx.backend).unwrap();
        let result = engine
            .compile(fx.pool, fx.dir.path().join("out.mp4"), &AssemblyOptions::default())
            .await;

        match result {
            Err(CompositorError::Assembly(AssemblyError::EncodeFailed { attempted, .. })) => {
                assert_eq!(attempted.len(), 3);
            }
            other => panic!("expected EncodeFailed, got {:?}", other.map(|r| r.clip_ids().len())),
        }
    }

    #[tokio::test]
    async fn test_shorts_respect_cap_and_title_card() {
        let fx = fixture(&[20.0; 8]);
        let mut config = config(fx.dir.path());
        config.shorts.min_segment_length = 5.0;
        config.transitions.transition_type = TransitionPolicy::Random;

        let engine = CompositionEngine::new(config, fx.backend).unwrap();
        let options = AssemblyOptions {
            title: Some("Best of the week".to_string()),
            captions: vec![CaptionCue::new("watch this", 3.0, 6.0)],
        };
        let result = engine
            .shorts(fx.pool, fx.dir.path().join("short.mp4"), &options)
            .await
            .unwrap();

        assert!(result.total_duration <= 59.0);
        assert_eq!(result.budget, 59.0);
        assert_eq!(result.clips.len(), 8);
        // the title card comes first, so clips start after it
        assert!((result.clips[0].timeline_start - 2.0).abs() < 1e-9);

        let cards = engine.backend().card_jobs.lock().unwrap();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].duration, 2.0);

        let timeline = engine.backend().timeline_jobs.lock().unwrap();
        assert!(timeline[0].filter_graph.contains("text='watch this'"));
    }

    #[tokio::test]
    async fn test_same_seed_same_output_plan() {
        let first = fixture(&[12.0, 18.0, 9.0, 25.0]);
        let second = fixture(&[12.0, 18.0, 9.0, 25.0]);

        let a = CompositionEngine::new(config(first.dir.path()), first.backend)
            .unwrap()
            .compile(first.pool, first.dir.path().join("a.mp4"), &AssemblyOptions::default())
            .await
            .unwrap();
        let b = CompositionEngine::new(config(second.dir.path()), second.backend)
            .unwrap()
            .compile(second.pool, second.dir.path().join("b.mp4"), &AssemblyOptions::default())
            .await
            .unwrap();

        assert_eq!(a.transitions, b.transitions);
        assert_eq!(a.clips, b.clips);
    }

    #[tokio::test]
    async fn test_cancellation() {
        let fx = fixture(&[15.0, 15.0, 15.0]);
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();

        let engine = CompositionEngine::new(config(fx.dir.path()), fx.backend)
            .unwrap()
            .with_cancellation(rx);
        let result = engine
            .compile(fx.pool, fx.dir.path().join("out.mp4"), &AssemblyOptions::default())
            .await;

        assert!(matches!(result, Err(CompositorError::Cancelled)));
    }

    #[tokio::test]
    async fn test_cancellation_between_segments() {
        let fx = fixture(&[15.0, 15.0, 15.0, 15.0]);
        let (tx, rx) = watch::channel(false);
        fx.backend.cancel_after_renders(2, tx);

        let temp_root = fx.dir.path().join("temp");
        let engine = CompositionEngine::new(config(fx.dir.path()), fx.backend)
            .unwrap()
            .with_cancellation(rx);
        let result = engine
            .compile(fx.pool, fx.dir.path().join("out.mp4"), &AssemblyOptions::default())
            .await;

        assert!(matches!(result, Err(CompositorError::Cancelled)));
        assert_eq!(engine.backend().segment_jobs.lock().unwrap().len(), 2);
        assert!(engine.backend().timeline_jobs.lock().unwrap().is_empty());
        assert!(!fx.dir.path().join("out.mp4").exists());

        // the run workspace is gone, only its root stays behind
        let leftovers: Vec<_> = std::fs::read_dir(&temp_root).unwrap().collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_short_from_video_is_cut_cropped_and_branded() {
        let dir = tempdir().unwrap();
        let backend = FakeBackend::new();
        let long = dir.path().join("compilation.mp4");
        let brief = dir.path().join("recap.mp4");
        for (path, duration) in [(&long, 300.0), (&brief, 42.5)] {
            std::fs::write(path, b"x").unwrap();
            backend.add(path, FakeMedia::good(duration));
        }

        let mut config = config(dir.path());
        config.output.fit = FitPolicy::Letterbox;
        let engine = CompositionEngine::new(config, backend).unwrap();

        let output = dir.path().join("shorts").join("short_weekly.mp4");
        let short = engine.short_from_video(&long, &output, Some("Weekly")).await.unwrap();

        assert_eq!(short.length, 59.0);
        assert!(short.was_trimmed());
        assert_eq!(short.title.as_deref(), Some("Weekly"));
        assert_eq!(short.overlays, vec!["@Weekly Top Clips", "WATCH FULL VIDEO ON YOUTUBE"]);
        assert!(output.exists());
        assert!(CompilationResult::metadata_path(&output).exists());

        let kept = engine
            .short_from_video(&brief, dir.path().join("short_recap.mp4"), None)
            .await
            .unwrap();
        assert_eq!(kept.length, 42.5);
        assert!(!kept.was_trimmed());

        let jobs = engine.backend().segment_jobs.lock().unwrap();
        assert_eq!(jobs.len(), 2);
        assert!(jobs.iter().all(|j| j.start == 0.0 && j.params.fit == FitPolicy::Crop));
        assert_eq!(jobs[0].overlays[1].placement, TextPlacement::Banner);
    }

    #[tokio::test]
    async fn test_short_from_missing_video() {
        let dir = tempdir().unwrap();
        let engine = CompositionEngine::new(config(dir.path()), FakeBackend::new()).unwrap();

        let result = engine
            .short_from_video(dir.path().join("gone.mp4"), dir.path().join("short.mp4"), None)
            .await;
        assert!(matches!(
            result,
            Err(CompositorError::Validation(ValidationError::MissingFile { .. }))
        ));
    }

    #[tokio::test]
    async fn test_one_short_per_clip() {
        let fx = fixture(&[75.0, 20.0, 30.0]);
        let corrupt = fx.dir.path().join("corrupt.mp4");
        std::fs::write(&corrupt, b"x").unwrap();
        fx.backend.add(&corrupt, FakeMedia::unreadable());
        fx.backend.break_on_render(fx.dir.path().join("clip_2.mp4"));

        let mut pool = fx.pool.clone();
        pool.push(SourceClip::new(&corrupt, 99));

        let out_dir = fx.dir.path().join("shorts");
        let engine = CompositionEngine::new(config(fx.dir.path()), fx.backend).unwrap();
        let outcome = engine.shorts_per_clip(pool, &out_dir).await.unwrap();

        let ids: Vec<_> = outcome.shorts.iter().filter_map(|s| s.clip_id.as_deref()).collect();
        assert_eq!(ids, vec!["clip_0", "clip_1"]);
        assert_eq!(outcome.shorts[0].length, 59.0);
        assert_eq!(outcome.shorts[1].length, 20.0);
        assert_eq!(outcome.shorts[0].overlays[0], "@creator0");
        assert_eq!(outcome.shorts[0].output_path, out_dir.join("short_clip_0.mp4"));
        assert!(outcome.shorts.iter().all(|s| s.output_path.exists()));

        // one dropped at validation, one when its render failed
        let dropped: Vec<_> = outcome.dropped.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(dropped, vec!["corrupt", "clip_2"]);
    }

    #[tokio::test]
    async fn test_per_clip_shorts_need_one_success() {
        let fx = fixture(&[20.0]);
        fx.backend.break_on_render(fx.dir.path().join("clip_0.mp4"));

        let mut config = config(fx.dir.path());
        config.shorts.branding = false;
        let engine = CompositionEngine::new(config, fx.backend).unwrap();
        let result = engine.shorts_per_clip(fx.pool, fx.dir.path().join("shorts")).await;

        match result {
            Err(CompositorError::Assembly(AssemblyError::InsufficientContent { attempted, .. })) => {
                assert_eq!(attempted, vec!["clip_0".to_string()]);
            }
            other => panic!("expected InsufficientContent, got {:?}", other.map(|o| o.shorts.len())),
        }
        let jobs = engine.backend().segment_jobs.lock().unwrap();
        assert!(jobs[0].overlays.is_empty());
    }

    #[test]
    fn test_shortfall_measurement() {
        // 6 clips in a 59 s cap with 0.5 s overlaps: 59 - 5 = 54 attainable
        assert_eq!(measure_shortfall(59.0, 54.0, 0.5, 6, 1.0), None);
        assert_eq!(measure_shortfall(59.0, 50.0, 0.5, 6, 1.0), Some(4.0));
    }
}
