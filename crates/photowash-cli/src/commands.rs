//! Subcommand implementations.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use photowash_core::decode::{load_image, thumbnail_size, MAX_PREVIEW_SIZE};
use photowash_core::encode::{encode_image, DEFAULT_JPEG_QUALITY};
use photowash_core::job::create_output_dir;
use photowash_core::{
    finalize, render_preview, AppConfig, BatchEvent, BatchRunner, FinalizeSettings, JobOptions, JobReport,
    MetadataAction, OutputFormat, TransformHistory,
};
use serde::Serialize;
use tracing::{debug, warn};

use crate::args::{PreviewArgs, RunArgs};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tif", "tiff", "webp", "gif"];

/// One progress line in `--json` mode.
#[derive(Serialize)]
struct Progress<'a> {
    completed: usize,
    total: usize,
    source: &'a Path,
    output: Option<&'a Path>,
    error: Option<&'a str>,
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

/// Expand directories into their image files. Plain files are kept as given.
fn collect_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut sources = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut found: Vec<PathBuf> = fs::read_dir(input)
                .with_context(|| format!("reading {}", input.display()))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && is_image(p))
                .collect();
            found.sort();
            debug!(dir = %input.display(), count = found.len(), "inputs collected");
            sources.extend(found);
        } else {
            sources.push(input.clone());
        }
    }
    Ok(sources)
}

fn load_config(path: Option<&Path>) -> Result<(PathBuf, AppConfig)> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(AppConfig::default_path);
    let config = AppConfig::load(&path).with_context(|| format!("loading settings from {}", path.display()))?;
    Ok((path, config))
}

fn preview_size_of(path: &Path) -> Result<(u32, u32)> {
    let image = load_image(path).with_context(|| format!("reading corner reference size from {}", path.display()))?;
    Ok(thumbnail_size(image.width, image.height, MAX_PREVIEW_SIZE))
}

fn print_report(report: &JobReport, json: bool) -> Result<()> {
    if json {
        let line = Progress {
            completed: report.completed,
            total: report.total,
            source: &report.source,
            output: report.result.as_ref().ok().map(|o| o.path.as_path()),
            error: report.result.as_ref().err().map(String::as_str),
        };
        println!("{}", serde_json::to_string(&line)?);
        return Ok(());
    }

    match &report.result {
        Ok(output) => println!(
            "[{}/{}] {} -> {}",
            report.completed,
            report.total,
            report.source.display(),
            output.path.display()
        ),
        Err(e) => println!("[{}/{}] {} failed: {e}", report.completed, report.total, report.source.display()),
    }
    Ok(())
}

/// Process every input. Returns whether all jobs succeeded.
pub fn run(args: &RunArgs) -> Result<bool> {
    let (config_path, mut config) = load_config(args.config.as_deref())?;

    let sources = collect_inputs(&args.inputs)?;
    if sources.is_empty() {
        bail!("no images found in the given inputs");
    }

    let preview_size = match sources.first() {
        Some(first) if args.edits.needs_preview_size() => preview_size_of(first)?,
        _ => (MAX_PREVIEW_SIZE, MAX_PREVIEW_SIZE),
    };
    let options = args.edits.apply(&config.defaults, preview_size);
    let job_options = if args.random {
        JobOptions::Randomized(args.ranges.apply(&config.ranges))
    } else {
        JobOptions::Fixed(options.clone())
    };

    let out_dir = create_output_dir(&args.output, &options, args.random)
        .with_context(|| format!("creating output folder in {}", args.output.display()))?;

    let mut settings = config.output_settings(&out_dir);
    if let Some(format) = args.save.format {
        settings.format = format;
    }
    if let Some(quality) = args.save.quality {
        settings.jpeg_quality = quality;
    }

    let runner = BatchRunner::new(args.workers.or(config.workers)).context("starting worker pool")?;
    debug!(workers = runner.workers(), jobs = sources.len(), "batch starting");

    let history_path = args.history.clone().unwrap_or_else(TransformHistory::default_path);
    let mut history = TransformHistory::load(&history_path).unwrap_or_else(|e| {
        warn!(error = %e, "starting a fresh history");
        TransformHistory::default()
    });

    let first_input = args.inputs.first().cloned();
    let mut print_error = None;
    let summary = runner.run_jobs(sources, &job_options, &settings, |event| match event {
        BatchEvent::Finished(report) => {
            if let Ok(output) = &report.result {
                history.record_output(output);
            }
            if let Err(e) = print_report(&report, args.json) {
                print_error.get_or_insert(e);
            }
        }
        BatchEvent::AllDone(summary) => {
            debug!(?summary, "batch done");
        }
    });
    if let Some(e) = print_error {
        warn!(error = %e, "progress output failed");
    }

    if let Err(e) = history.save(&history_path) {
        warn!(error = %e, "history not saved");
    }

    config.last_input_dir = first_input.map(|p| {
        if p.is_dir() {
            p
        } else {
            p.parent().map(Path::to_path_buf).unwrap_or(p)
        }
    });
    config.last_output_dir = Some(args.output.clone());
    if let Err(e) = config.save(&config_path) {
        warn!(error = %e, "settings not saved");
    }

    if !args.json {
        println!(
            "{} done, {} failed, {} skipped -> {}",
            summary.succeeded,
            summary.failed,
            summary.skipped,
            out_dir.display()
        );
    }
    Ok(summary.failed == 0)
}

/// Render a preview PNG of one image.
pub fn preview(args: &PreviewArgs) -> Result<()> {
    let (_, config) = load_config(args.config.as_deref())?;

    let image = load_image(&args.input).with_context(|| format!("loading {}", args.input.display()))?;
    let preview_size = thumbnail_size(image.width, image.height, args.max_size);
    let options = args.edits.apply(&config.defaults, preview_size);

    let mut staged = render_preview(&image, &options, args.max_size).context("building preview")?;
    if !args.full_size {
        staged.deferred.restore_size = None;
    }

    let settings = FinalizeSettings {
        autocrop: config.autocrop,
        ..FinalizeSettings::for_format(OutputFormat::Png)
    };
    let finished = finalize(staged, &settings, &mut rand::rng());
    let bytes = encode_image(&finished, OutputFormat::Png, DEFAULT_JPEG_QUALITY, &MetadataAction::Strip)?;

    fs::write(&args.output, bytes).with_context(|| format!("writing {}", args.output.display()))?;
    println!("{} ({}x{})", args.output.display(), finished.width, finished.height);
    Ok(())
}
