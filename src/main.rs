use std::path::PathBuf;

use anyhow::{Result, anyhow};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "manga-typesetter-rust",
    version,
    about = "Translate and re-letter manga pages"
)]
struct Cli {
    /// Page images to process
    #[arg(value_name = "INPUT", required_unless_present = "show_ocr_languages")]
    inputs: Vec<PathBuf>,

    /// Directory for translated pages
    #[arg(short = 'o', long = "output-dir", default_value = "output")]
    output_dir: PathBuf,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<String>,

    /// Model name for the chat completions endpoint
    #[arg(short = 'm', long = "model")]
    model: Option<String>,

    /// API key (overrides OPENAI_API_KEY)
    #[arg(short = 'k', long = "key")]
    key: Option<String>,

    /// Target language (default: en)
    #[arg(short = 'l', long = "lang")]
    lang: Option<String>,

    /// Source language (default: ja)
    #[arg(short = 'L', long = "source-lang")]
    source_lang: Option<String>,

    /// Tesseract languages, joined with '+' (default: jpn+jpn_vert)
    #[arg(long = "ocr-languages")]
    ocr_languages: Option<String>,

    /// External inpainting command; supports {image}, {mask}, {output} and *_dir placeholders
    #[arg(long = "inpaint-command")]
    inpaint_command: Option<String>,

    /// Font file used for typesetting
    #[arg(long = "font")]
    font: Option<PathBuf>,

    /// Pages processed concurrently (default: CPU count)
    #[arg(long = "jobs")]
    jobs: Option<usize>,

    /// Skip translation and typeset the recognized text as-is
    #[arg(long = "dry-run")]
    dry_run: bool,

    /// Print per-page JSON reports
    #[arg(long = "report")]
    report: bool,

    /// Show installed tesseract languages and exit
    #[arg(long = "show-ocr-languages")]
    show_ocr_languages: bool,

    #[arg(long = "verbose")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    manga_typesetter_rust::logging::init(cli.verbose)?;

    let output = manga_typesetter_rust::run(manga_typesetter_rust::Config {
        inputs: cli.inputs,
        output_dir: cli.output_dir,
        settings_path: cli.read_settings,
        model: cli.model,
        key: cli.key,
        lang: cli.lang,
        source_lang: cli.source_lang,
        ocr_languages: cli.ocr_languages,
        inpaint_command: cli.inpaint_command,
        font: cli.font,
        jobs: cli.jobs,
        dry_run: cli.dry_run,
        report: cli.report,
        show_ocr_languages: cli.show_ocr_languages,
    })
    .await?;

    if !output.text.is_empty() {
        println!("{}", output.text);
    }
    if output.failed > 0 {
        return Err(anyhow!(
            "{} of {} pages failed",
            output.failed,
            output.failed + output.processed
        ));
    }
    Ok(())
}
