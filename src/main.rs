// src/main.rs

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use collision_factors::analyzer::Analyzer;
use collision_factors::config::Config;
use collision_factors::lane_detection::HoughLineExtractor;
use collision_factors::object_detection::{SharedDetector, YoloDetector};
use collision_factors::types::{AccidentType, RoadContext};
use collision_factors::video_processor::find_video_files;
use collision_factors::AnalysisResult;
use parking_lot::Mutex;
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "collision-factors")]
#[command(about = "Derive fault-relevant violation factors from dashcam collision video", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// YAML configuration file (defaults are used for anything it omits)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze one video
    Analyze {
        #[arg(long)]
        video: PathBuf,

        /// vehicle-vehicle | vehicle-pedestrian
        #[arg(long)]
        accident_type: String,

        /// intersection, highway, general-road, alley, night, ...
        #[arg(long)]
        road_context: String,
    },

    /// Analyze every video under a directory with one shared model
    Batch {
        #[arg(long)]
        input_dir: PathBuf,

        #[arg(long)]
        accident_type: String,

        #[arg(long)]
        road_context: String,

        /// Concurrent analyses sharing the model instance
        #[arg(long, default_value = "1")]
        jobs: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    let default_filter = format!("collision_factors={},ort=warn", config.logging.level);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("🚗 Collision factor analysis starting");

    match cli.command {
        Commands::Analyze {
            video,
            accident_type,
            road_context,
        } => {
            let accident: AccidentType = accident_type.parse()?;
            let road = RoadContext::from_tag(&road_context);

            let mut analyzer = Analyzer::from_config(config).context("failed to load model")?;
            let result = analyzer
                .analyze(&video, accident, &road)
                .with_context(|| format!("analysis of {} failed", video.display()))?;

            print_json(&report(&video, &result), cli.pretty)?;
        }
        Commands::Batch {
            input_dir,
            accident_type,
            road_context,
            jobs,
        } => {
            let accident: AccidentType = accident_type.parse()?;
            let road = RoadContext::from_tag(&road_context);
            run_batch(config, &input_dir, accident, &road, jobs.max(1), cli.pretty)?;
        }
    }

    Ok(())
}

fn report(video: &Path, result: &AnalysisResult) -> serde_json::Value {
    json!({
        "video": video.display().to_string(),
        "factors": result,
        "undeterminable": result.undeterminable_factors(),
    })
}

fn print_json(value: &serde_json::Value, pretty: bool) -> Result<()> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", text);
    Ok(())
}

fn run_batch(
    config: Config,
    input_dir: &Path,
    accident: AccidentType,
    road: &RoadContext,
    jobs: usize,
    pretty: bool,
) -> Result<()> {
    let videos = find_video_files(input_dir);
    if videos.is_empty() {
        warn!("No video files found in {}", input_dir.display());
        return Ok(());
    }

    config.validate()?;
    let shared = SharedDetector::new(YoloDetector::new(&config.model).context("failed to load model")?);
    let queue = Mutex::new(videos.into_iter().enumerate());
    let total = queue.lock().len();
    let failures = Mutex::new(0usize);

    std::thread::scope(|scope| {
        for worker in 0..jobs {
            let detector = shared.clone();
            let config = config.clone();
            let queue = &queue;
            let failures = &failures;
            scope.spawn(move || {
                let mut analyzer = match Analyzer::with_parts(config, detector, HoughLineExtractor) {
                    Ok(a) => a,
                    Err(e) => {
                        error!("Worker {} could not start: {}", worker, e);
                        return;
                    }
                };

                loop {
                    let next = queue.lock().next();
                    let Some((idx, video)) = next else {
                        break;
                    };
                    info!("[{}/{}] {}", idx + 1, total, video.display());

                    match analyzer.analyze(&video, accident, road) {
                        Ok(result) => {
                            if let Err(e) = print_json(&report(&video, &result), pretty) {
                                error!("Failed to print result for {}: {}", video.display(), e);
                            }
                        }
                        Err(e) => {
                            error!("Failed to analyze {}: {}", video.display(), e);
                            *failures.lock() += 1;
                        }
                    }
                }
            });
        }
    });

    let failures = failures.into_inner();
    info!(
        "✓ Batch done: {} analyzed, {} failed",
        total - failures,
        failures
    );
    Ok(())
}
