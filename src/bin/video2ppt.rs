use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use video2ppt::{
    DeckBuilder, DurationEstimator, EventCallback, ExtractOptions, ExtractSettings,
    ExtractionEvent, ExtractionPhase, FfmpegLogLevel, FfmpegSource, MediaSource, SamplingPlan,
    SlideExtractor, Video2PptError, read_deck_images, suggested_file_name,
};

const CLI_AFTER_HELP: &str = "Examples:\n  video2ppt convert lecture.mp4 --out decks --progress\n  video2ppt convert talk.webm --interval 5 --threshold 20 --out talk.pptx\n  video2ppt probe lecture.mp4 --json\n  video2ppt inspect Video2PPT_2024-03-09_1405.pptx\n  video2ppt completions zsh > _video2ppt";

#[derive(Debug, Parser)]
#[command(
    name = "video2ppt",
    version,
    about = "Turn lecture and screen-share videos into slide decks",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// Show additional logging output.
    #[arg(long)]
    verbose: bool,

    /// Allow overwriting existing output files.
    #[arg(long)]
    overwrite: bool,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[arg(long)]
    log_level: Option<String>,

    /// Trace every seek, retry and score of the extraction session.
    #[arg(long)]
    debug_log: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Extract slides from a video and write a .pptx deck.
    #[command(
        about = "Convert a video into a slide deck",
        after_help = "Examples:\n  video2ppt convert lecture.mp4\n  video2ppt convert lecture.mp4 --out decks --interval 2 --max-slides 100 --progress"
    )]
    Convert {
        /// Input video path.
        input: PathBuf,
        /// Output directory, or a path ending in .pptx.
        #[arg(long)]
        out: Option<PathBuf>,
        /// Seconds between sampled frames.
        #[arg(long)]
        interval: Option<f64>,
        /// Stop after this many slides (1 to 256).
        #[arg(long)]
        max_slides: Option<usize>,
        /// Fixed change threshold; skips calibration.
        #[arg(long)]
        threshold: Option<f64>,
        /// JSON settings file.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Show a progress bar.
        #[arg(long)]
        progress: bool,
        /// Print a machine-readable summary.
        #[arg(long)]
        json: bool,
    },

    /// Estimate a video's duration and print the sampling plan.
    #[command(
        about = "Probe a video's duration",
        after_help = "Examples:\n  video2ppt probe lecture.mp4\n  video2ppt probe talk.webm --json"
    )]
    Probe {
        /// Input video path.
        input: PathBuf,
        /// Output as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Count the slides in an existing deck.
    #[command(about = "Inspect a deck written by video2ppt")]
    Inspect {
        /// Path to a .pptx file.
        deck: PathBuf,
        /// Output as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    #[command(
        about = "Generate shell completions",
        after_help = "Examples:\n  video2ppt completions bash > video2ppt.bash\n  video2ppt completions zsh > _video2ppt"
    )]
    Completions {
        /// Target shell.
        shell: Shell,
    },
}

fn parse_log_level(value: &str) -> Option<FfmpegLogLevel> {
    match value.to_ascii_lowercase().as_str() {
        "quiet" => Some(FfmpegLogLevel::Quiet),
        "panic" => Some(FfmpegLogLevel::Panic),
        "fatal" => Some(FfmpegLogLevel::Fatal),
        "error" => Some(FfmpegLogLevel::Error),
        "warning" | "warn" => Some(FfmpegLogLevel::Warning),
        "info" => Some(FfmpegLogLevel::Info),
        "verbose" => Some(FfmpegLogLevel::Verbose),
        "debug" => Some(FfmpegLogLevel::Debug),
        "trace" => Some(FfmpegLogLevel::Trace),
        _ => None,
    }
}

fn phase_label(phase: ExtractionPhase) -> &'static str {
    match phase {
        ExtractionPhase::Idle => "idle",
        ExtractionPhase::EstimatingDuration => "estimating duration",
        ExtractionPhase::CalibratingThreshold => "calibrating threshold",
        ExtractionPhase::Sampling => "sampling",
        ExtractionPhase::Complete => "complete",
        ExtractionPhase::Failed => "failed",
    }
}

/// Where the deck goes: an explicit `.pptx` path, or a directory that gets
/// the timestamped default name.
fn resolve_output_path(out: Option<&Path>, default_name: &str) -> PathBuf {
    match out {
        Some(path)
            if path
                .extension()
                .is_some_and(|extension| extension.eq_ignore_ascii_case("pptx")) =>
        {
            path.to_path_buf()
        }
        Some(directory) => directory.join(default_name),
        None => PathBuf::from(default_name),
    }
}

fn ensure_writable_path(path: &Path, overwrite: bool) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() {
        if overwrite {
            eprintln!(
                "{} {}",
                "warning:".yellow().bold(),
                format!("overwriting {}", path.display()).yellow()
            );
        } else {
            return Err(format!(
                "output already exists: {} (use --overwrite to replace)",
                path.display()
            )
            .into());
        }
    }
    Ok(())
}

fn apply_global_options(global: &GlobalOptions) -> Result<(), Box<dyn std::error::Error>> {
    let filter = if global.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(filter)
        .parse_default_env()
        .init();

    let ffmpeg_level = match &global.log_level {
        Some(level) => {
            parse_log_level(level).ok_or(format!("unsupported --log-level: {level}"))?
        }
        None if global.verbose => FfmpegLogLevel::Warning,
        None => FfmpegLogLevel::Error,
    };
    video2ppt::set_ffmpeg_log_level(ffmpeg_level);

    Ok(())
}

fn warn(message: &str) {
    eprintln!("{} {}", "warning:".yellow().bold(), message.yellow());
}

/// Drives an indicatif bar from extraction events.
struct TerminalProgress {
    bar: ProgressBar,
}

impl TerminalProgress {
    fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let bar = ProgressBar::new(100);
        let style =
            ProgressStyle::with_template("{spinner:.green} {bar:40.cyan/blue} {pos:>3}% {msg}")?;
        bar.set_style(style.progress_chars("##-"));
        bar.enable_steady_tick(Duration::from_millis(120));
        Ok(Self { bar })
    }
}

impl EventCallback for TerminalProgress {
    fn on_event(&self, event: &ExtractionEvent) {
        match event {
            ExtractionEvent::PhaseChanged(phase) => {
                self.bar.set_position(0);
                self.bar.set_message(phase_label(*phase));
            }
            ExtractionEvent::Progress { percent, .. } => {
                self.bar.set_position(percent.round() as u64);
            }
            ExtractionEvent::SlideAccepted(slide) => {
                self.bar
                    .set_message(format!("sampling, {} slides", slide.index() + 1));
            }
            ExtractionEvent::Completed(slides) => {
                self.bar
                    .finish_with_message(format!("{} slides", slides.len()));
            }
            ExtractionEvent::Failed(reason) => {
                self.bar.abandon_with_message(reason.clone());
            }
            _ => {}
        }
    }
}

fn runtime() -> Result<tokio::runtime::Runtime, Box<dyn std::error::Error>> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?)
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    apply_global_options(&cli.global)?;

    match cli.command {
        Commands::Convert {
            input,
            out,
            interval,
            max_slides,
            threshold,
            config,
            progress,
            json,
        } => {
            let mut settings = match &config {
                Some(path) => ExtractSettings::from_json_file(path)?,
                None => ExtractSettings::default(),
            };
            if let Some(interval) = interval {
                settings.capture_interval = interval;
            }
            if let Some(max_slides) = max_slides {
                settings.max_slides = max_slides;
            }
            if threshold.is_some() {
                settings.threshold = threshold;
            }
            settings.debug_logging |= cli.global.debug_log;
            settings.validate()?;

            let created = chrono::Local::now();
            let output_path = resolve_output_path(out.as_deref(), &suggested_file_name(&created));
            ensure_writable_path(&output_path, cli.global.overwrite)?;

            let mut options = ExtractOptions::from_settings(settings);
            if progress && !json {
                options = options.with_events(Arc::new(TerminalProgress::new()?));
            }

            let report = runtime()?.block_on(async {
                let mut source = FfmpegSource::open(&input).await?;
                SlideExtractor::new(options).extract_with_report(&mut source).await
            })?;

            for message in &report.estimate.warnings {
                warn(message);
            }
            if report.counters.skipped > 0 && cli.global.verbose {
                warn(&format!(
                    "{} of {} samples were skipped",
                    report.counters.skipped, report.counters.attempted
                ));
            }

            let title = input
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_else(|| "Video2PPT".to_string());
            let deck = DeckBuilder::new()
                .with_title(title)
                .with_created(created)
                .build(&report.slides)?;

            if let Some(parent) = output_path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            deck.save(&output_path)?;

            if json {
                let payload = json!({
                    "input": input.display().to_string(),
                    "output": output_path.display().to_string(),
                    "slides": deck.slide_count(),
                    "threshold": report.threshold,
                    "duration": report.estimate,
                    "calibration": report.calibration,
                    "samples": {
                        "attempted": report.counters.attempted,
                        "captured": report.counters.captured,
                        "skipped": report.counters.skipped,
                    },
                    "timestamps": report
                        .slides
                        .iter()
                        .map(|slide| slide.timestamp().as_secs_f64())
                        .collect::<Vec<_>>(),
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!(
                    "{} {} slides -> {}",
                    "wrote".green().bold(),
                    deck.slide_count(),
                    output_path.display()
                );
            }
        }
        Commands::Probe { input, json } => {
            let (format, declared, estimate) = runtime()?.block_on(async {
                let mut source = FfmpegSource::open(&input).await?;
                let estimate = DurationEstimator::new().estimate(&mut source).await;
                Ok::<_, Video2PptError>((source.format(), source.declared_duration(), estimate))
            })?;
            let plan = SamplingPlan::recommend(format, &estimate);

            if json {
                let payload = json!({
                    "input": input.display().to_string(),
                    "format": format,
                    "declared_duration": declared,
                    "estimate": estimate,
                    "plan": plan,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("Format: {format}");
                match declared {
                    Some(seconds) => println!("Declared duration: {seconds:.2}s"),
                    None => println!("Declared duration: none"),
                }
                if estimate.is_failed() {
                    println!("Estimated duration: unknown");
                } else {
                    println!(
                        "Estimated duration: {:.2}s ({:?}, confidence {:.2})",
                        estimate.seconds, estimate.method, estimate.confidence
                    );
                }
                println!(
                    "Plan: {:?}, interval {:.0}s, {} calibration samples",
                    plan.strategy, plan.recommended_interval, plan.max_samples
                );
                for message in estimate.warnings.iter().chain(plan.notes.iter()) {
                    warn(message);
                }
            }
        }
        Commands::Inspect { deck, json } => {
            let bytes = fs::read(&deck)?;
            let images = read_deck_images(&bytes)?;
            if json {
                let payload = json!({
                    "deck": deck.display().to_string(),
                    "slides": images.len(),
                    "image_bytes": images.iter().map(Vec::len).collect::<Vec<_>>(),
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("{}: {} slides", deck.display(), images.len());
                if cli.global.verbose {
                    for (index, image) in images.iter().enumerate() {
                        println!("  slide {:>3}: {} bytes", index + 1, image.len());
                    }
                }
            }
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "video2ppt", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use super::{parse_log_level, resolve_output_path};

    #[test]
    fn parse_log_level_aliases() {
        assert!(parse_log_level("quiet").is_some());
        assert!(parse_log_level("WARN").is_some());
        assert!(parse_log_level("warning").is_some());
        assert!(parse_log_level("loud").is_none());
    }

    #[test]
    fn output_paths() {
        let name = "Video2PPT_2024-03-09_1405.pptx";
        assert_eq!(resolve_output_path(None, name), PathBuf::from(name));
        assert_eq!(
            resolve_output_path(Some(Path::new("decks")), name),
            Path::new("decks").join(name)
        );
        assert_eq!(
            resolve_output_path(Some(Path::new("out/talk.PPTX")), name),
            PathBuf::from("out/talk.PPTX")
        );
    }
}
