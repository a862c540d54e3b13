use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use fillet_core::{
    read_wav_mono, AppConfig, Beatmap, ConductorEvent, Game, GameEvent, ManualClock,
    ScriptedInput,
};
use tracing_subscriber::EnvFilter;

const PREVIEW_NOTES: usize = 10;

fn main() -> fillet_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };

    match cli.command {
        Commands::Play {
            beatmap,
            inputs,
            fps,
            json,
        } => run_play(&config, &beatmap, &inputs, fps, json),
        Commands::Generate {
            audio,
            output,
            zones,
            sensitivity,
            min_gap,
        } => {
            let mut generator = config.generator.clone();
            if let Some(zones) = zones {
                generator.zone_count = zones;
            }
            if let Some(sensitivity) = sensitivity {
                generator.sensitivity = sensitivity;
            }
            if let Some(min_gap) = min_gap {
                generator.min_gap_ms = min_gap;
            }
            let config = AppConfig {
                generator,
                ..config
            };
            config.validate()?;
            run_generate(&config, &audio, output)
        }
        Commands::Inspect { beatmap } => run_inspect(&beatmap),
    }
}

fn run_play(
    config: &AppConfig,
    beatmap: &Path,
    inputs: &Path,
    fps: u32,
    json: bool,
) -> fillet_core::Result<()> {
    if fps == 0 {
        return Err(fillet_core::FilletError::InvalidInput("fps must be positive"));
    }
    tracing::info!(?beatmap, ?inputs, fps, "starting replay");

    let script = ScriptedInput::load(inputs)?;
    let mut game = Game::new(ManualClock::new(), config.input.keys.clone());
    game.start_from_path(beatmap)?;
    game.attach_input(script);

    game.subscribe(|event| match event {
        GameEvent::Conductor(ConductorEvent::NoteHit {
            index,
            zone,
            offset_ms,
        }) => println!("HIT   #{index:<4} zone {} {offset_ms:+.0}ms", zone + 1),
        GameEvent::Conductor(ConductorEvent::NoteMissed { index, zone }) => {
            println!("MISS  #{index:<4} zone {}", zone + 1)
        }
        _ => {}
    });

    let frame_ms = 1000.0 / f64::from(fps);
    game.clock_mut().play();
    while !game.is_finished() {
        game.clock_mut().advance(frame_ms);
        game.tick();
    }

    let summary = game.summary();
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }
    println!("SCORE: {} / {}", summary.score, summary.total_notes);
    println!("MISSES: {}", summary.misses);
    println!("ACCURACY: {}%", summary.accuracy_percent);
    Ok(())
}

fn run_generate(
    config: &AppConfig,
    audio: &Path,
    output: Option<PathBuf>,
) -> fillet_core::Result<()> {
    tracing::info!(?audio, "generating beatmap");

    let decoded = read_wav_mono(audio)?;
    let beatmap = fillet_core::generate_beatmap(&decoded, config.audio.block_size, &config.generator)?;

    let output = output.unwrap_or_else(|| default_output_path(audio));
    beatmap.save(&output)?;

    println!("Generated {} notes", beatmap.len());
    println!("Saved to: {}", output.display());
    for note in beatmap.notes().iter().take(PREVIEW_NOTES) {
        println!("  {}ms -> zone {}", note.time_ms, note.zone + 1);
    }
    if beatmap.len() > PREVIEW_NOTES {
        println!("  ... and {} more", beatmap.len() - PREVIEW_NOTES);
    }
    Ok(())
}

fn run_inspect(path: &Path) -> fillet_core::Result<()> {
    let beatmap = Beatmap::load(path)?;

    println!("Notes: {}", beatmap.len());
    println!("Duration: {:.1}s", beatmap.duration_ms() / 1000.0);
    for (zone, count) in beatmap.zone_histogram().iter().enumerate() {
        println!("  zone {}: {count}", zone + 1);
    }
    Ok(())
}

/// `track.wav` becomes `track_beatmap.json` next to it.
fn default_output_path(audio: &Path) -> PathBuf {
    let stem = audio
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "track".to_string());
    audio.with_file_name(format!("{stem}_beatmap.json"))
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Five Finger Fillet rhythm game tools", long_about = None)]
struct Cli {
    /// Optional JSON config file (key bindings, analysis and generator settings).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a recorded input script against a beatmap and print the result.
    Play {
        /// Beatmap JSON file.
        beatmap: PathBuf,
        /// Input script: JSON array of `{"at_ms": .., "key": ..}`.
        #[arg(short, long)]
        inputs: PathBuf,
        /// Simulated frame rate; notes expire on frame boundaries.
        #[arg(long, default_value_t = 60)]
        fps: u32,
        /// Print the result summary as JSON instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Detect onsets in a WAV file and write a beatmap.
    Generate {
        /// Path to the audio file that should be analysed.
        audio: PathBuf,
        /// Output path, defaults to `<audio stem>_beatmap.json`.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Number of zones to spread notes over.
        #[arg(short, long)]
        zones: Option<usize>,
        /// 0.0 (every onset) to 1.0 (only strong hits).
        #[arg(short, long)]
        sensitivity: Option<f32>,
        /// Minimum gap between notes in milliseconds.
        #[arg(short = 'g', long)]
        min_gap: Option<f64>,
    },
    /// Validate a beatmap and print a short summary.
    Inspect {
        /// Beatmap JSON file.
        beatmap: PathBuf,
    },
}
