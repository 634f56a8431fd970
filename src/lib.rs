use anyhow::{Context, Result, anyhow};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

pub mod detect;
pub mod font;
pub mod inpaint;
pub mod layout;
pub mod logging;
pub mod pipeline;
pub mod region;
pub mod render;
pub mod settings;
pub mod text;
#[cfg(test)]
mod test_util;
pub mod translate;

pub use detect::{Detector, TesseractDetector};
pub use inpaint::{CommandInpainter, FillInpainter, Inpainter};
pub use layout::{LayoutConfig, LayoutEngine, LayoutError, LayoutResult, TextMetrics, layout_text};
pub use pipeline::{PageOutcome, PageReport, Pipeline};
pub use region::{Orientation, Region, TextBlock};
pub use render::{Compositor, RenderStyle};
pub use translate::{OpenAiTranslator, PassthroughTranslator, Translator};

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub inputs: Vec<PathBuf>,
    pub output_dir: PathBuf,
    pub settings_path: Option<String>,
    pub model: Option<String>,
    pub key: Option<String>,
    pub lang: Option<String>,
    pub source_lang: Option<String>,
    pub ocr_languages: Option<String>,
    pub inpaint_command: Option<String>,
    pub font: Option<PathBuf>,
    pub jobs: Option<usize>,
    pub dry_run: bool,
    pub report: bool,
    pub show_ocr_languages: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RunOutput {
    /// Text for stdout (JSON reports or the OCR language list); may be empty.
    pub text: String,
    pub processed: usize,
    pub failed: usize,
}

pub async fn run(config: Config) -> Result<RunOutput> {
    if config.show_ocr_languages {
        let languages = detect::list_tesseract_languages()?;
        return Ok(RunOutput {
            text: languages.join("\n"),
            ..RunOutput::default()
        });
    }
    if config.inputs.is_empty() {
        return Err(anyhow!("no input images given"));
    }

    let settings_path = config.settings_path.as_deref().map(Path::new);
    let mut settings = settings::load_settings(settings_path)?;
    apply_overrides(&mut settings, &config);

    let (metrics, compositor) = build_typesetting(&settings)?;
    let engine = LayoutEngine::new(settings.layout, metrics)
        .with_context(|| "invalid layout settings")?;
    let detector = TesseractDetector::new(settings.ocr_languages.clone())
        .with_psm(settings.ocr_psm)
        .with_min_confidence(settings.ocr_min_confidence);
    let translator = build_translator(&settings, &config)?;
    let inpainter = build_inpainter(&settings)?;

    let pipeline = Pipeline::new(detector, translator, inpainter, engine, compositor)
        .with_group_threshold(settings.group_threshold);
    let jobs = config.jobs.filter(|jobs| *jobs > 0).unwrap_or_else(num_cpus::get);
    info!(
        "processing {} images with {} jobs into {}",
        config.inputs.len(),
        jobs,
        config.output_dir.display()
    );
    let outcomes = pipeline
        .process_batch(&config.inputs, &config.output_dir, jobs)
        .await?;

    let failed = outcomes.iter().filter(|outcome| outcome.result.is_err()).count();
    let reports: Vec<&PageReport> = outcomes
        .iter()
        .filter_map(|outcome| outcome.result.as_ref().ok())
        .collect();
    let text = if config.report {
        serde_json::to_string_pretty(&reports).with_context(|| "failed to serialize reports")?
    } else {
        String::new()
    };
    Ok(RunOutput {
        text,
        processed: reports.len(),
        failed,
    })
}

fn apply_overrides(settings: &mut settings::Settings, config: &Config) {
    let pick = |value: &Option<String>| value.clone().filter(|value| !value.trim().is_empty());
    if let Some(model) = pick(&config.model) {
        settings.model = Some(model);
    }
    if let Some(lang) = pick(&config.lang) {
        settings.target_lang = lang;
    }
    if let Some(lang) = pick(&config.source_lang) {
        settings.source_lang = lang;
    }
    if let Some(languages) = pick(&config.ocr_languages) {
        settings.ocr_languages = languages;
    }
    if let Some(command) = pick(&config.inpaint_command) {
        settings.inpaint_command = Some(command);
    }
    if let Some(font) = &config.font {
        settings.font_path = Some(font.display().to_string());
    }
}

fn build_typesetting(settings: &settings::Settings) -> Result<(Arc<dyn TextMetrics>, Compositor)> {
    let mut style = settings.render.clone();
    let font_path = settings.font_path.as_deref().map(Path::new);
    match font::resolve_font(
        font_path,
        style.font_family.as_deref(),
        font::fallback_families(),
    ) {
        Ok(resolved) => {
            info!("typesetting with font family {}", resolved.family);
            style.font_family = Some(resolved.family.clone());
            let compositor = Compositor::new(style, Some(resolved.metrics.data()));
            let metrics: Arc<dyn TextMetrics> = Arc::new(resolved.metrics);
            Ok((metrics, compositor))
        }
        Err(err) if font_path.is_some() => Err(err),
        Err(err) => {
            warn!("{:#}; falling back to estimated glyph widths", err);
            let metrics: Arc<dyn TextMetrics> = Arc::new(layout::EstimatedMetrics);
            Ok((metrics, Compositor::new(style, None)))
        }
    }
}

fn build_translator(settings: &settings::Settings, config: &Config) -> Result<Box<dyn Translator>> {
    if config.dry_run {
        return Ok(Box::new(PassthroughTranslator));
    }
    let mut translator = OpenAiTranslator::from_env(config.key.as_deref())?
        .with_languages(settings.source_lang.clone(), settings.target_lang.clone());
    if let Some(model) = settings.model.as_deref() {
        translator = translator.with_model(model);
    }
    if let Some(base_url) = settings.base_url.as_deref() {
        translator = translator.with_base_url(base_url);
    }
    Ok(Box::new(translator))
}

fn build_inpainter(settings: &settings::Settings) -> Result<Box<dyn Inpainter>> {
    match settings.inpaint_command.as_deref() {
        Some(command) => Ok(Box::new(CommandInpainter::from_command_line(
            command,
            settings.inpaint_padding,
        )?)),
        None => Ok(Box::new(FillInpainter::new(settings.inpaint_padding))),
    }
}
