use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use hummer::{store, telemetry, IdSequence, MelodyStore, Outcome, Pipeline, RunFlags};
use hummerconf::HummerConfig;
use std::path::PathBuf;

/// Transcribe hummed melodies to MIDI
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Config file used instead of ./hummer.toml
    #[arg(short, long, global = true, env = "HUMMER_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Transcribe feature files into stored melodies
    Transcribe {
        /// Frame feature JSON files, one per recording
        #[arg(required = true)]
        features: Vec<PathBuf>,

        /// Identifier for the melody (single input only)
        #[arg(long)]
        id: Option<u64>,

        /// Replace an existing melody stored under --id
        #[arg(long, requires = "id")]
        force: bool,

        /// Keep the transcribed notes as heard
        #[arg(long)]
        no_fix: bool,

        /// Write MIDI only, skip resynthesis
        #[arg(long)]
        no_audio: bool,
    },

    /// Fit a stored melody to its best key and re-render it
    Fix {
        melody: PathBuf,

        #[arg(long)]
        no_audio: bool,
    },

    /// Re-render a stored melody's artifacts
    Render {
        melody: PathBuf,

        #[arg(long)]
        no_audio: bool,
    },

    /// List stored melodies
    List,

    /// Print the effective configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, sources) = HummerConfig::load_with_sources_from(cli.config.as_deref())
        .context("Failed to load configuration")?;
    telemetry::init(&config.telemetry.log_level)?;
    tracing::debug!(files = ?sources.files, env = ?sources.env_overrides, "configuration loaded");

    match cli.command {
        Command::Transcribe {
            features,
            id,
            force,
            no_fix,
            no_audio,
        } => transcribe(&config, features, id, force, RunFlags { no_fix, no_audio }),
        Command::Fix { melody, no_audio } => fix(&config, melody, no_audio),
        Command::Render { melody, no_audio } => render(&config, melody, no_audio),
        Command::List => list(&config),
        Command::Config => {
            for file in &sources.files {
                println!("# loaded: {}", file.display());
            }
            for var in &sources.env_overrides {
                println!("# env: {var}");
            }
            print!("{}", config.to_toml());
            Ok(())
        }
    }
}

fn transcribe(
    config: &HummerConfig,
    features: Vec<PathBuf>,
    id: Option<u64>,
    force: bool,
    flags: RunFlags,
) -> Result<()> {
    if id.is_some() && features.len() > 1 {
        bail!("--id can only be used with a single feature file");
    }

    let pipeline = Pipeline::from_config(config, flags)?;
    let ids = IdSequence::seeded_from(pipeline.store())?;
    if let Some(id) = id {
        if !force {
            pipeline.store().ensure_vacant(id)?;
        }
        ids.reserve(id);
    }

    for path in features {
        let feature_set = hummer::load_features(&path)?;
        let id = id.unwrap_or_else(|| ids.next_id());

        match pipeline.run(&feature_set, id)? {
            Outcome::Stored(stored) => {
                print!(
                    "melody {id}: {} notes ({} pitched)",
                    stored.melody.len(),
                    stored.melody.pitched_count()
                );
                if let Some(scale) = stored.key_fit.as_ref().and_then(|fit| fit.scale) {
                    print!(", {scale}");
                }
                println!(" -> {}", stored.record_path.display());
            }
            Outcome::Empty { segments } => {
                println!(
                    "{}: no melody detected in {segments} segments",
                    path.display()
                );
            }
        }
    }
    Ok(())
}

fn fix(config: &HummerConfig, path: PathBuf, no_audio: bool) -> Result<()> {
    let mut melody = store::load_record(&path)?;
    let flags = RunFlags {
        no_fix: false,
        no_audio,
    };
    let pipeline = stored_pipeline(config, &path, flags)?;

    let fit = pipeline.fit(&mut melody);
    if fit.is_noop() {
        println!("melody already in key, nothing changed");
        return Ok(());
    }
    let stored = pipeline.publish(melody, Some(fit))?;
    if let Some(fit) = &stored.key_fit {
        for (from, to) in &fit.substitutions {
            println!("{from} -> {to}");
        }
    }
    println!("updated {}", stored.record_path.display());
    Ok(())
}

fn render(config: &HummerConfig, path: PathBuf, no_audio: bool) -> Result<()> {
    let melody = store::load_record(&path)?;
    let flags = RunFlags {
        no_fix: true,
        no_audio,
    };
    let pipeline = stored_pipeline(config, &path, flags)?;

    let stored = pipeline.publish(melody, None)?;
    println!("{}", stored.render.midi_path.display());
    if let Some(audio) = &stored.render.audio_path {
        println!("{}", audio.display());
    }
    Ok(())
}

/// Pipeline whose store is the directory holding `record`.
fn stored_pipeline(config: &HummerConfig, record: &std::path::Path, flags: RunFlags) -> Result<Pipeline> {
    let mut config = config.clone();
    if let Some(dir) = record.parent().filter(|d| !d.as_os_str().is_empty()) {
        config.paths.output_dir = dir.to_path_buf();
    } else {
        config.paths.output_dir = PathBuf::from(".");
    }
    Pipeline::from_config(&config, flags)
}

fn list(config: &HummerConfig) -> Result<()> {
    let store = MelodyStore::new(&config.paths.output_dir);
    let records = store.list()?;
    if records.is_empty() {
        println!("no melodies in {}", store.dir().display());
    }
    for (id, path) in records {
        match store::load_record(&path) {
            Ok(melody) => println!(
                "{id:>5}  {:>3} notes  {:>6.1} bpm  {}",
                melody.len(),
                melody.bpm,
                melody.source_audio
            ),
            Err(e) => println!("{id:>5}  unreadable: {e:#}"),
        }
    }
    Ok(())
}
