//! `reel` command-line entry point.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

use reel_media::{FfmpegTool, MediaTool};
use reel_models::{PaddingPolicy, Resolution, RunReport, TransitionKind};
use reel_pipeline::workspace::RunWorkspace;
use reel_pipeline::{
    init_tracing, Collaborators, CommandNarrator, Narrator, ParagraphSegmenter, PipelineConfig,
    PrerecordedNarrator, StoryPipeline, TimelapseOptions, TimelapsePipeline,
};

#[derive(Parser)]
#[command(
    name = "reel",
    version,
    about = "Assemble short vertical videos from text, images and narration"
)]
struct Cli {
    /// Output frame size (WIDTHxHEIGHT)
    #[arg(long, global = true)]
    resolution: Option<Resolution>,
    /// Padding policy for stills (blur | black)
    #[arg(long, global = true)]
    padding: Option<PaddingPolicy>,
    /// Maximum concurrent segment renders
    #[arg(long, global = true)]
    max_parallel_renders: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a narrated story video in an existing run directory
    Story {
        /// Run directory whose images/ is already populated
        #[arg(long)]
        run_dir: PathBuf,
        /// Text file holding the story
        #[arg(long)]
        story: PathBuf,
        /// Narration command template with {text} and {output} placeholders
        #[arg(long)]
        tts_command: Option<String>,
    },
    /// Build a smooth time-lapse from the frames in timelapse_images/
    Timelapse {
        #[arg(long)]
        run_dir: PathBuf,
        /// Read real frames from this directory instead
        #[arg(long)]
        images: Option<PathBuf>,
        /// In-between frames per pair of real frames
        #[arg(long)]
        inter_frames: Option<usize>,
        /// Crossfade effect (fade, dissolve, wipeleft, ...)
        #[arg(long, default_value_t = TransitionKind::Dissolve)]
        transition: TransitionKind,
        /// Crossfade length in seconds
        #[arg(long, default_value_t = 1.0)]
        transition_duration: f64,
        /// Background music muxed onto the result
        #[arg(long)]
        music: Option<PathBuf>,
        /// Do not burn frame names into real frames
        #[arg(long)]
        no_labels: bool,
    },
    /// Print the playable duration of a media file
    Probe { file: PathBuf },
    /// Create an empty run workspace and print its path
    NewRun {
        /// Base directory (defaults to REEL_WORK_DIR)
        #[arg(long)]
        work_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    let mut config = PipelineConfig::from_env();
    if let Some(resolution) = cli.resolution {
        config.resolution = resolution;
    }
    if let Some(padding) = cli.padding {
        config.padding = padding;
    }
    if let Some(n) = cli.max_parallel_renders {
        config.max_parallel_renders = n.max(1);
    }

    // Constructed once, shared by every component of the run
    let ffmpeg = FfmpegTool::new(config.timeouts.probe_secs);
    let tool: Arc<dyn MediaTool> = Arc::new(ffmpeg.clone());

    match cli.command {
        Commands::Story {
            run_dir,
            story,
            tts_command,
        } => {
            ffmpeg.check_available().context("FFmpeg is required for story runs")?;
            let workspace = RunWorkspace::open(&run_dir).await?;
            let story_text = tokio::fs::read_to_string(&story)
                .await
                .with_context(|| format!("reading story file {}", story.display()))?;

            let narrator: Arc<dyn Narrator> = match tts_command.or_else(|| config.tts_command.clone()) {
                Some(template) => Arc::new(CommandNarrator::new(
                    &template,
                    workspace.paragraph_audio_dir(),
                    config.timeouts.merge_secs,
                )?),
                None => Arc::new(PrerecordedNarrator::discover(&workspace).await?),
            };
            let collaborators = Collaborators {
                segmenter: Arc::new(
                    ParagraphSegmenter::new().with_sentence_mapping(workspace.sentence_mapping_path()),
                ),
                narrator,
            };

            let (cancel_tx, cancel_rx) = watch::channel(false);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Received interrupt, abandoning run after in-flight renders");
                    let _ = cancel_tx.send(true);
                }
            });

            let report = StoryPipeline::new(config, tool, collaborators)
                .with_cancel(cancel_rx)
                .run(&workspace, &story_text)
                .await;
            finish(&report)
        }
        Commands::Timelapse {
            run_dir,
            images,
            inter_frames,
            transition,
            transition_duration,
            music,
            no_labels,
        } => {
            ffmpeg.check_available().context("FFmpeg is required for time-lapse runs")?;
            let workspace = RunWorkspace::open(&run_dir).await?;
            let mut options = TimelapseOptions {
                transition,
                transition_duration,
                label_frames: !no_labels,
                images_dir: images,
                music,
                ..Default::default()
            };
            if let Some(k) = inter_frames {
                options.timing.inter_frames = k;
            }

            let report = TimelapsePipeline::new(config, tool, options).run(&workspace).await;
            finish(&report)
        }
        Commands::Probe { file } => {
            let duration = tool.probe_duration(&file).await?;
            println!(
                "{}",
                serde_json::json!({ "path": file, "duration_seconds": duration })
            );
            Ok(())
        }
        Commands::NewRun { work_dir } => {
            let base = work_dir.unwrap_or(config.work_dir);
            let workspace = RunWorkspace::create(&base).await?;
            println!(
                "{}",
                serde_json::json!({
                    "run_id": workspace.run_id(),
                    "path": workspace.root(),
                })
            );
            Ok(())
        }
    }
}

/// Print the report and turn a failed run into a non-zero exit.
fn finish(report: &RunReport) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    if !report.success {
        std::process::exit(1);
    }
    Ok(())
}
