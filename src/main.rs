//! HRV Autopilot CLI
//!
//! Replays the MindWare HRV analysis workflow over a folder of acquisition files.

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use hrv_autopilot::{
    config::{Config, ConfigError, Variant},
    desktop::{check_support, PlatformDesktop},
    report::{create_shared_log_with_persistence, log::PersistedStats},
    vision::{best_match, check_text, Tesseract, TextRecognizer, YellowDetector},
    workflow::{
        file_label, print_params, prompt_params, Automator, ConsoleOperator, Element, RunOptions,
        Session, TemplateLibrary,
    },
    SAFETY_NOTICE, VERSION,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hrv-autopilot")]
#[command(version = VERSION)]
#[command(about = "Automates MindWare HRV analysis over a folder of acquisitions", long_about = None)]
struct Cli {
    /// Configuration file (defaults to the per-user config location)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process every acquisition file in the input folder
    Run {
        /// Application build to drive (main or demo)
        #[arg(long)]
        variant: Option<Variant>,

        /// Folder containing the acquisition files
        #[arg(long)]
        input: Option<PathBuf>,

        /// Folder MindWare writes results to
        #[arg(long)]
        output: Option<PathBuf>,

        /// Process only this file name
        #[arg(long)]
        file: Option<String>,

        /// Use the configured analysis settings without asking
        #[arg(long)]
        no_prompt: bool,

        /// Assume MindWare is already open at the file dialog
        #[arg(long)]
        skip_launch: bool,
    },

    /// Check a saved ECG screenshot for yellow R-peaks
    Yellow {
        image: PathBuf,

        /// Flagging ratio (defaults to the configured one)
        #[arg(long)]
        threshold: Option<f64>,
    },

    /// Run OCR on a saved screenshot and check the channel map
    Ocr { image: PathBuf },

    /// Find a template on a saved screenshot
    Locate {
        template: PathBuf,
        screenshot: PathBuf,

        /// Minimum score (defaults to the configured one)
        #[arg(long)]
        confidence: Option<f32>,
    },

    /// Show platform support and cumulative statistics
    Status,

    /// Show configuration
    Config {
        /// Write the default configuration file
        #[arg(long)]
        init: bool,
    },

    /// Display the notice shown before a run
    Notice,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_path = cli.config;

    let result = match cli.command {
        Commands::Run {
            variant,
            input,
            output,
            file,
            no_prompt,
            skip_launch,
        } => cmd_run(
            config_path.as_deref(),
            variant,
            input,
            output,
            file,
            no_prompt,
            skip_launch,
        ),
        Commands::Yellow { image, threshold } => {
            cmd_yellow(config_path.as_deref(), &image, threshold)
        }
        Commands::Ocr { image } => cmd_ocr(config_path.as_deref(), &image),
        Commands::Locate {
            template,
            screenshot,
            confidence,
        } => cmd_locate(config_path.as_deref(), &template, &screenshot, confidence),
        Commands::Status => {
            cmd_status(config_path.as_deref());
            Ok(())
        }
        Commands::Config { init } => cmd_config(config_path.as_deref(), init),
        Commands::Notice => {
            cmd_notice();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

fn cmd_run(
    config_path: Option<&Path>,
    variant: Option<Variant>,
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    file: Option<String>,
    no_prompt: bool,
    skip_launch: bool,
) -> anyhow::Result<()> {
    println!("HRV Autopilot v{VERSION}");
    println!();

    let mut config = load_config(config_path).context("loading configuration")?;
    if let Some(variant) = variant {
        config.set_variant(variant);
    }
    if let Some(input) = input {
        config.input_folder = input;
    }
    if let Some(output) = output {
        config.output_folder = output;
    }

    if !check_support() {
        return Err(anyhow!(
            "screen automation is not available on this platform (Windows desktop required)"
        ));
    }

    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Could not create directories: {e}");
    }

    println!("{SAFETY_NOTICE}");

    let mut operator = ConsoleOperator::new();
    if !no_prompt {
        config.analysis = prompt_params(&mut operator, config.analysis);
    }

    println!();
    println!("Settings chosen:");
    println!("  Variant: {}", config.variant);
    println!("  MindWare path: {}", config.app.executable.display());
    println!("  Acquisition folder: {}", config.input_folder.display());
    println!("  Output folder: {}", config.output_folder.display());
    print_params(&config.analysis);
    println!();

    let missing = TemplateLibrary::new(&config.templates_dir).missing(&Element::ALL);
    if !missing.is_empty() {
        eprintln!(
            "Warning: {} reference image(s) missing from {}:",
            missing.len(),
            config.templates_dir.display()
        );
        for element in &missing {
            eprintln!("  {} ({element})", element.file_name());
        }
    }

    let run_log = create_shared_log_with_persistence(config.stats_path());

    // Set up Ctrl+C handler
    let stop = Arc::new(AtomicBool::new(false));
    ctrlc_handler(stop.clone());
    println!("Press Ctrl+C to stop before the next file or segment");
    println!();

    let recognizer = Tesseract::new(config.ocr.command.clone(), config.ocr.language.clone());
    let automator = Automator::new(
        config.clone(),
        PlatformDesktop::new(),
        operator,
        recognizer,
        run_log.clone(),
    );
    let mut session = Session::new(automator, stop);

    let options = RunOptions {
        launch: !skip_launch,
        only_file: file,
    };
    let result = session.run(&options);

    if let Err(e) = run_log.save() {
        eprintln!("Warning: Could not save run statistics: {e}");
    }
    let report = result.context("automation run failed")?;

    match report.write_to(&config.reports_path()) {
        Ok(path) => println!("Run report written to {}", path.display()),
        Err(e) => eprintln!("Warning: Could not write run report: {e}"),
    }

    println!();
    println!(
        "Exported {} of {} file(s).",
        report.exported_count(),
        report.files.len()
    );
    println!("{}", run_log.summary());
    Ok(())
}

fn cmd_yellow(
    config_path: Option<&Path>,
    image: &Path,
    threshold: Option<f64>,
) -> anyhow::Result<()> {
    let config = load_config(config_path).context("loading configuration")?;
    let detector = YellowDetector::new(
        config.yellow.rule,
        threshold.unwrap_or(config.yellow.threshold),
    );

    let screenshot = image::open(image)
        .with_context(|| format!("reading {}", image.display()))?
        .to_rgba8();
    let report = detector.inspect(&screenshot);

    println!("Image: {} ({}x{})", image.display(), screenshot.width(), screenshot.height());
    println!("Yellow pixels: {} of {}", report.yellow_pixels, report.total_pixels);
    println!("Yellow pixel ratio: {:.6}", report.ratio);
    println!("Threshold: {}", detector.threshold);
    if report.flagged {
        println!("Verdict: yellow peaks detected, segment needs editing");
    } else {
        println!("Verdict: segment is clean");
    }
    Ok(())
}

fn cmd_ocr(config_path: Option<&Path>, image: &Path) -> anyhow::Result<()> {
    let config = load_config(config_path).context("loading configuration")?;
    let recognizer = Tesseract::new(config.ocr.command.clone(), config.ocr.language.clone());

    let text = recognizer
        .recognize(image)
        .with_context(|| format!("recognizing {}", image.display()))?;
    println!("Extracted text:");
    println!("{text}");

    let check = check_text(&text, &config.channel_map);
    for failure in &check.failures {
        println!(
            "ERROR: {} does not match expected value '{}'",
            failure.label, failure.expected
        );
    }
    if check.passed() {
        println!("Channel Map verified successfully.");
    } else {
        println!("Channel Map verification failed.");
    }
    Ok(())
}

fn cmd_locate(
    config_path: Option<&Path>,
    template: &Path,
    screenshot: &Path,
    confidence: Option<f32>,
) -> anyhow::Result<()> {
    let config = load_config(config_path).context("loading configuration")?;
    let confidence = confidence.unwrap_or(config.matching.confidence);

    let template_image = image::open(template)
        .with_context(|| format!("reading {}", template.display()))?
        .to_luma8();
    let screen = image::open(screenshot)
        .with_context(|| format!("reading {}", screenshot.display()))?
        .to_luma8();

    let best = best_match(&screen, &template_image, config.matching.downscale)
        .with_context(|| format!("matching {}", template.display()))?;

    match best {
        Some(hit) => {
            println!(
                "Best match for {}: top-left {}, center {}, score {:.3}",
                file_label(template),
                hit.top_left,
                hit.center,
                hit.score
            );
            if hit.score >= confidence {
                println!("Found (confidence {confidence})");
            } else {
                println!("Not found: score below confidence {confidence}");
            }
        }
        None => println!("Template is larger than the screenshot; it can never match."),
    }
    Ok(())
}

fn cmd_status(config_path: Option<&Path>) {
    let config = load_config(config_path).unwrap_or_default();

    println!("HRV Autopilot Status");
    println!("====================");
    println!();

    println!(
        "Screen automation: {}",
        if check_support() {
            "Available ✓"
        } else {
            "Not available ✗"
        }
    );
    let recognizer_found =
        Tesseract::new(config.ocr.command.clone(), config.ocr.language.clone()).is_installed();
    println!(
        "OCR engine ({}): {}",
        config.ocr.command.display(),
        if recognizer_found {
            "Found ✓"
        } else {
            "Not found ✗"
        }
    );
    let missing = TemplateLibrary::new(&config.templates_dir).missing(&Element::ALL);
    println!(
        "Reference images: {} of {} present in {}",
        Element::ALL.len() - missing.len(),
        Element::ALL.len(),
        config.templates_dir.display()
    );
    println!();

    println!("Configuration:");
    println!("  Variant: {}", config.variant);
    println!("  Input folder: {}", config.input_folder.display());
    println!("  Output folder: {}", config.output_folder.display());
    println!();

    let stats_path = config.stats_path();
    match std::fs::read_to_string(&stats_path)
        .ok()
        .and_then(|content| serde_json::from_str::<PersistedStats>(&content).ok())
    {
        Some(stats) => {
            println!("Cumulative Statistics:");
            println!("  Files found: {}", stats.files_found);
            println!("  Files exported: {}", stats.files_exported);
            println!("  Files skipped: {}", stats.files_skipped);
            println!("  Segments checked: {}", stats.segments_checked);
            println!("  Segments with yellow R-peaks: {}", stats.segments_flagged);
            println!("  Manual interventions: {}", stats.manual_interventions);
            println!("  UI elements not found: {}", stats.elements_missed);
            println!(
                "  Last updated: {}",
                stats.last_updated.format("%Y-%m-%d %H:%M:%S UTC")
            );
        }
        None => println!("No previous run data found."),
    }
}

fn cmd_config(config_path: Option<&Path>, init: bool) -> anyhow::Result<()> {
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(Config::config_path);

    if init {
        if path.exists() {
            return Err(anyhow!(
                "{} already exists; remove it first to reset",
                path.display()
            ));
        }
        Config::default()
            .save_to(&path)
            .with_context(|| format!("writing {}", path.display()))?;
        println!("Default configuration written to {}", path.display());
        return Ok(());
    }

    let config = load_config(Some(&path)).context("loading configuration")?;

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {}", path.display());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).unwrap_or_else(|_| "Error".to_string())
    );
    Ok(())
}

fn cmd_notice() {
    println!("{SAFETY_NOTICE}");
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(stop: Arc<AtomicBool>) {
    ctrlc::set_handler(move || {
        stop.store(true, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl+C handler");
}
