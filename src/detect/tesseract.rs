use anyhow::{Context, Result, anyhow};
use std::path::Path;
use std::process::{Command, Output};
use tracing::warn;

const TESSERACT: &str = "tesseract";

/// Installed tesseract traineddata names, in the order tesseract reports them.
pub fn list_tesseract_languages() -> Result<Vec<String>> {
    let output = Command::new(TESSERACT)
        .arg("--list-langs")
        .output()
        .with_context(|| format!("failed to run {} --list-langs", TESSERACT))?;
    let stdout = checked_stdout(output, "--list-langs")?;
    Ok(parse_language_list(&stdout))
}

fn checked_stdout(output: Output, what: &str) -> Result<String> {
    if output.status.success() {
        return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
    }
    Err(anyhow!(
        "{} {} exited with {}: {}",
        TESSERACT,
        what,
        output.status,
        String::from_utf8_lossy(&output.stderr).trim()
    ))
}

// First line is a "List of available languages" header.
fn parse_language_list(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .skip(1)
        .filter_map(|line| {
            let line = line.trim();
            (!line.is_empty()).then(|| line.to_string())
        })
        .collect()
}

/// Narrows a `jpn+jpn_vert` style request to installed languages. When the
/// install cannot be queried the request is passed through untouched.
pub(super) fn resolve_ocr_languages(requested: &str) -> Result<String> {
    let requested = requested.trim();
    if requested.is_empty() {
        return Err(anyhow!("no OCR languages configured"));
    }
    match list_tesseract_languages() {
        Ok(installed) => select_languages(requested, &installed),
        Err(_) => Ok(requested.to_string()),
    }
}

fn select_languages(requested: &str, installed: &[String]) -> Result<String> {
    let (usable, unknown): (Vec<&str>, Vec<&str>) = requested
        .split(['+', ',', ' '])
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .partition(|code| installed.iter().any(|name| name == code));

    if usable.is_empty() {
        return Err(anyhow!(
            "none of the OCR languages [{}] are installed; tesseract has [{}]",
            unknown.join(", "),
            installed.join(", ")
        ));
    }
    if !unknown.is_empty() {
        warn!("ignoring OCR languages that are not installed: {}", unknown.join(", "));
    }
    Ok(usable.join("+"))
}

/// Runs one recognition pass and returns tesseract's TSV report.
pub(super) fn run_tesseract_tsv(image: &Path, languages: &str, psm: u32) -> Result<String> {
    let psm = psm.to_string();
    let output = Command::new(TESSERACT)
        .arg(image)
        .arg("stdout")
        .args(["-l", languages])
        .args(["--oem", "1"])
        .args(["--psm", psm.as_str()])
        .args(["--dpi", "300"])
        .arg("tsv")
        .output()
        .with_context(|| format!("failed to run {} (is it installed?)", TESSERACT))?;
    checked_stdout(output, "tsv")
}
