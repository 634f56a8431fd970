use anyhow::{Context, Result, anyhow};
use futures_util::StreamExt;
use futures_util::stream;
use image::DynamicImage;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::detect::{DEFAULT_GROUP_THRESHOLD, Detector, group_blocks, merge_group};
use crate::inpaint::Inpainter;
use crate::layout::{LayoutEngine, LayoutError, TextMetrics};
use crate::region::{Region, TextBlock};
use crate::render::{Compositor, Placement, save_image};
use crate::text::{normalize_translation, preview};
use crate::translate::Translator;

/// Per-page counters, printed as JSON with `--report`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PageReport {
    pub input: String,
    pub output: String,
    pub regions: usize,
    pub groups: usize,
    pub translated: usize,
    pub rendered: usize,
    pub skipped: usize,
    pub overflowed: usize,
}

#[derive(Debug)]
pub struct PageOutcome {
    pub input: PathBuf,
    pub result: Result<PageReport>,
}

pub struct Pipeline<D, T, I> {
    detector: Arc<D>,
    translator: Arc<T>,
    inpainter: Arc<I>,
    layout: Arc<LayoutEngine<Arc<dyn TextMetrics>>>,
    compositor: Arc<Compositor>,
    group_threshold: u32,
}

impl<D, T, I> Pipeline<D, T, I>
where
    D: Detector + 'static,
    T: Translator + 'static,
    I: Inpainter + 'static,
{
    pub fn new(
        detector: D,
        translator: T,
        inpainter: I,
        layout: LayoutEngine<Arc<dyn TextMetrics>>,
        compositor: Compositor,
    ) -> Self {
        Self {
            detector: Arc::new(detector),
            translator: Arc::new(translator),
            inpainter: Arc::new(inpainter),
            layout: Arc::new(layout),
            compositor: Arc::new(compositor),
            group_threshold: DEFAULT_GROUP_THRESHOLD,
        }
    }

    pub fn with_group_threshold(mut self, threshold: u32) -> Self {
        self.group_threshold = threshold;
        self
    }

    pub async fn process_page(&self, input: &Path, output: &Path) -> Result<PageReport> {
        let mut report = PageReport {
            input: input.display().to_string(),
            output: output.display().to_string(),
            ..PageReport::default()
        };

        let path = input.to_path_buf();
        let image = tokio::task::spawn_blocking(move || image::open(&path))
            .await?
            .with_context(|| format!("failed to open image: {}", input.display()))?;
        let image = Arc::new(image);

        let detector = Arc::clone(&self.detector);
        let page = Arc::clone(&image);
        let blocks = tokio::task::spawn_blocking(move || detector.detect(&page))
            .await?
            .with_context(|| format!("text detection failed: {}", input.display()))?;
        report.regions = blocks.len();
        if blocks.is_empty() {
            info!("no text found in {}, keeping original", input.display());
            self.save(image, output).await?;
            return Ok(report);
        }

        let mut units: Vec<TextBlock> = group_blocks(&blocks, self.group_threshold)
            .iter()
            .filter_map(|group| merge_group(group))
            .collect();
        report.groups = units.len();
        debug!(
            "{}: {} regions in {} groups",
            input.display(),
            report.regions,
            report.groups
        );

        for unit in &mut units {
            match self.translator.translate(&unit.source_text).await {
                Ok(text) => {
                    let text = normalize_translation(&text);
                    if text.is_empty() {
                        warn!(
                            "empty translation for '{}', skipping",
                            preview(&unit.source_text, 24)
                        );
                        report.skipped += 1;
                        continue;
                    }
                    unit.set_translation(text);
                    report.translated += 1;
                }
                Err(err) => {
                    warn!(
                        "translation failed for '{}': {:#}",
                        preview(&unit.source_text, 24),
                        err
                    );
                    report.skipped += 1;
                }
            }
        }
        if report.translated == 0 {
            info!("nothing translated in {}, keeping original", input.display());
            self.save(image, output).await?;
            return Ok(report);
        }

        let regions: Vec<Region> = blocks.iter().map(|block| block.region).collect();
        let inpainter = Arc::clone(&self.inpainter);
        let page = Arc::clone(&image);
        let cleaned = tokio::task::spawn_blocking(move || inpainter.inpaint(&page, &regions))
            .await?
            .with_context(|| format!("inpainting failed: {}", input.display()))?;

        let mut placements = Vec::new();
        for unit in units.iter().filter(|unit| unit.is_translated()) {
            match self.layout.layout(unit) {
                Ok(layout) => {
                    if layout.overflow {
                        report.overflowed += 1;
                    }
                    placements.push(Placement {
                        region: unit.region,
                        layout,
                    });
                }
                Err(err @ (LayoutError::EmptyText | LayoutError::InvalidRegion { .. })) => {
                    warn!("skipping block at {:?}: {}", unit.region, err);
                    report.skipped += 1;
                }
                Err(err) => return Err(anyhow!(err)),
            }
        }
        report.rendered = placements.len();

        let compositor = Arc::clone(&self.compositor);
        let composed = tokio::task::spawn_blocking(move || compositor.compose(&cleaned, &placements))
            .await?
            .with_context(|| format!("compositing failed: {}", input.display()))?;
        self.save(Arc::new(composed), output).await?;
        Ok(report)
    }

    /// Processes `inputs` with at most `jobs` pages in flight. Outcomes keep the
    /// order of `inputs`.
    pub async fn process_batch(
        &self,
        inputs: &[PathBuf],
        output_dir: &Path,
        jobs: usize,
    ) -> Result<Vec<PageOutcome>> {
        std::fs::create_dir_all(output_dir).with_context(|| {
            format!("failed to create output directory: {}", output_dir.display())
        })?;

        let mut outcomes: Vec<(usize, PageOutcome)> =
            stream::iter(inputs.iter().cloned().enumerate())
                .map(|(idx, input)| async move {
                    let output = output_path_for(&input, output_dir);
                    let result = self.process_page(&input, &output).await;
                    match &result {
                        Ok(report) => info!(
                            "{} -> {} ({} rendered, {} skipped)",
                            report.input, report.output, report.rendered, report.skipped
                        ),
                        Err(err) => error!("{}: {:#}", input.display(), err),
                    }
                    (idx, PageOutcome { input, result })
                })
                .buffer_unordered(jobs.max(1))
                .collect()
                .await;
        outcomes.sort_by_key(|(idx, _)| *idx);
        Ok(outcomes.into_iter().map(|(_, outcome)| outcome).collect())
    }

    async fn save(&self, image: Arc<DynamicImage>, output: &Path) -> Result<()> {
        let path = output.to_path_buf();
        tokio::task::spawn_blocking(move || save_image(&image, &path)).await?
    }
}

/// `<dir>/<stem>_translated.<ext>`; inputs without an extension get `.png`.
pub fn output_path_for(input: &Path, output_dir: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "page".to_string());
    let ext = input
        .extension()
        .map(|ext| ext.to_string_lossy().into_owned())
        .unwrap_or_else(|| "png".to_string());
    output_dir.join(format!("{}_translated.{}", stem, ext))
}
