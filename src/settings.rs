use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::layout::LayoutConfig;
use crate::render::RenderStyle;

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub layout: LayoutConfig,
    pub render: RenderStyle,
    pub font_path: Option<String>,
    pub ocr_languages: String,
    pub ocr_psm: u32,
    pub ocr_min_confidence: f32,
    pub group_threshold: u32,
    pub inpaint_padding: u32,
    pub inpaint_command: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub source_lang: String,
    pub target_lang: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            layout: LayoutConfig::default(),
            render: RenderStyle::default(),
            font_path: None,
            ocr_languages: "jpn+jpn_vert".to_string(),
            ocr_psm: 11,
            ocr_min_confidence: 30.0,
            group_threshold: 50,
            inpaint_padding: 10,
            inpaint_command: None,
            model: None,
            base_url: None,
            source_lang: "ja".to_string(),
            target_lang: "en".to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    layout: Option<LayoutSettings>,
    render: Option<RenderSettings>,
    detect: Option<DetectSettings>,
    inpaint: Option<InpaintSettings>,
    translate: Option<TranslateSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct LayoutSettings {
    max_font_size: Option<f32>,
    min_font_size: Option<f32>,
    line_spacing_factor: Option<f32>,
    padding: Option<f32>,
    font_step: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
struct RenderSettings {
    text_color: Option<String>,
    outline_color: Option<String>,
    outline_width: Option<f32>,
    font_path: Option<String>,
    font_family: Option<String>,
    clip_overflow: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct DetectSettings {
    languages: Option<String>,
    psm: Option<u32>,
    min_confidence: Option<f32>,
    group_threshold: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct InpaintSettings {
    padding: Option<u32>,
    command: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TranslateSettings {
    model: Option<String>,
    base_url: Option<String>,
    source_lang: Option<String>,
    target_lang: Option<String>,
}

/// Loads settings from the embedded defaults, then `settings.toml` and
/// `settings.local.toml` in the working directory, then the same pair under
/// `~/.manga-typesetter-rust/`, then `extra_path`. Later files win.
pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    let defaults: SettingsFile =
        toml::from_str(DEFAULT_SETTINGS_TOML).with_context(|| "failed to parse default settings")?;
    settings.merge(defaults);
    ensure_home_settings_file()?;

    let mut ordered_paths = vec![
        PathBuf::from("settings.toml"),
        PathBuf::from("settings.local.toml"),
    ];
    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }
    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            settings.merge_file(&path)?;
        }
    }

    settings
        .layout
        .validate()
        .with_context(|| "layout settings are inconsistent")?;
    Ok(settings)
}

impl Settings {
    fn merge_file(&mut self, path: &Path) -> Result<()> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings: {}", path.display()))?;
        let parsed: SettingsFile = toml::from_str(&content)
            .with_context(|| format!("failed to parse settings: {}", path.display()))?;
        self.merge(parsed);
        Ok(())
    }

    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(layout) = incoming.layout {
            merge_positive(&mut self.layout.max_font_size, layout.max_font_size);
            merge_positive(&mut self.layout.min_font_size, layout.min_font_size);
            merge_positive(&mut self.layout.line_spacing_factor, layout.line_spacing_factor);
            merge_positive(&mut self.layout.font_step, layout.font_step);
            if let Some(padding) = layout.padding.filter(|value| *value >= 0.0) {
                self.layout.padding = padding;
            }
        }
        if let Some(render) = incoming.render {
            merge_text(&mut self.render.text_color, render.text_color);
            merge_text(&mut self.render.outline_color, render.outline_color);
            if let Some(width) = render.outline_width.filter(|value| *value >= 0.0) {
                self.render.outline_width = width;
            }
            merge_optional_text(&mut self.render.font_family, render.font_family);
            merge_optional_text(&mut self.font_path, render.font_path);
            if let Some(clip) = render.clip_overflow {
                self.render.clip_overflow = clip;
            }
        }
        if let Some(detect) = incoming.detect {
            merge_text(&mut self.ocr_languages, detect.languages);
            if let Some(psm) = detect.psm {
                self.ocr_psm = psm;
            }
            if let Some(conf) = detect.min_confidence.filter(|value| *value >= 0.0) {
                self.ocr_min_confidence = conf;
            }
            if let Some(threshold) = detect.group_threshold {
                self.group_threshold = threshold;
            }
        }
        if let Some(inpaint) = incoming.inpaint {
            if let Some(padding) = inpaint.padding {
                self.inpaint_padding = padding;
            }
            merge_optional_text(&mut self.inpaint_command, inpaint.command);
        }
        if let Some(translate) = incoming.translate {
            merge_optional_text(&mut self.model, translate.model);
            merge_optional_text(&mut self.base_url, translate.base_url);
            merge_text(&mut self.source_lang, translate.source_lang);
            merge_text(&mut self.target_lang, translate.target_lang);
        }
    }
}

fn merge_positive(slot: &mut f32, value: Option<f32>) {
    if let Some(value) = value.filter(|value| value.is_finite() && *value > 0.0) {
        *slot = value;
    }
}

fn merge_text(slot: &mut String, value: Option<String>) {
    if let Some(value) = value.filter(|value| !value.trim().is_empty()) {
        *slot = value;
    }
}

fn merge_optional_text(slot: &mut Option<String>, value: Option<String>) {
    if let Some(value) = value.filter(|value| !value.trim().is_empty()) {
        *slot = Some(value);
    }
}

fn ensure_home_settings_file() -> Result<()> {
    let Some(home) = home_dir() else {
        return Ok(());
    };
    fs::create_dir_all(&home)
        .with_context(|| format!("failed to create settings directory: {}", home.display()))?;
    let path = home.join("settings.toml");
    if !path.exists() {
        fs::write(&path, DEFAULT_SETTINGS_TOML)
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(".manga-typesetter-rust"))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::with_temp_home;

    #[test]
    fn defaults_come_from_embedded_file() {
        with_temp_home(|home| {
            let settings = load_settings(None).expect("settings");
            assert_eq!(settings.layout.max_font_size, 50.0);
            assert_eq!(settings.layout.min_font_size, 10.0);
            assert_eq!(settings.ocr_languages, "jpn+jpn_vert");
            assert_eq!(settings.model.as_deref(), Some("gpt-4o-mini"));
            assert!(home
                .join(".manga-typesetter-rust")
                .join("settings.toml")
                .exists());
        });
    }

    #[test]
    fn extra_file_overrides_and_ignores_blank_values() {
        with_temp_home(|home| {
            let extra = home.join("extra.toml");
            fs::write(
                &extra,
                r##"
[layout]
max_font_size = 24
min_font_size = 8
padding = -3

[render]
text_color = " "
outline_color = "#101010"

[inpaint]
command = "iopaint run"
"##,
            )
            .expect("write extra");
            let settings = load_settings(Some(&extra)).expect("settings");
            assert_eq!(settings.layout.max_font_size, 24.0);
            assert_eq!(settings.layout.min_font_size, 8.0);
            assert_eq!(settings.layout.padding, 5.0);
            assert_eq!(settings.render.text_color, "#000000");
            assert_eq!(settings.render.outline_color, "#101010");
            assert_eq!(settings.inpaint_command.as_deref(), Some("iopaint run"));
        });
    }

    #[test]
    fn home_local_file_is_layered() {
        with_temp_home(|home| {
            let dir = home.join(".manga-typesetter-rust");
            fs::create_dir_all(&dir).expect("mkdir");
            fs::write(dir.join("settings.local.toml"), "[translate]\ntarget_lang = \"fr\"\n")
                .expect("write local");
            let settings = load_settings(None).expect("settings");
            assert_eq!(settings.target_lang, "fr");
            assert_eq!(settings.source_lang, "ja");
        });
    }

    #[test]
    fn missing_extra_file_is_an_error() {
        with_temp_home(|home| {
            let err = load_settings(Some(&home.join("nope.toml"))).unwrap_err();
            assert!(err.to_string().contains("settings file not found"));
        });
    }

    #[test]
    fn inconsistent_font_bounds_are_rejected() {
        with_temp_home(|home| {
            let extra = home.join("bad.toml");
            fs::write(&extra, "[layout]\nmax_font_size = 4\n").expect("write");
            assert!(load_settings(Some(&extra)).is_err());
        });
    }

    #[test]
    fn font_step_below_float_resolution_is_rejected() {
        with_temp_home(|home| {
            let extra = home.join("tiny.toml");
            fs::write(&extra, "[layout]\nfont_step = 0.0000001\n").expect("write");
            let err = load_settings(Some(&extra)).unwrap_err();
            assert!(format!("{:#}", err).contains("font_step"));
        });
    }
}
