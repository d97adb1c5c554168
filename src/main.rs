//! read-aloud: read text aloud with synchronized sentence highlighting.

use clap::{Parser, Subcommand};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::info;
use tracing_subscriber::EnvFilter;

use read_aloud::audio::{default_output_factory, AudioSource};
use read_aloud::clock::{AudioClock, SystemClock};
use read_aloud::config::Config;
use read_aloud::settings::{SettingsPatch, Speed, Subject, Tone, VoiceSettings, VoiceType};
use read_aloud::store::Store;
use read_aloud::sync::{format_time, Command, SessionHandle, SyncCoordinator, SyncSession, TransportState};
use read_aloud::synthesis::EspeakEngine;
use read_aloud::SyncError;

#[derive(Parser, Debug)]
#[command(name = "read-aloud", about = "Read text aloud with synchronized highlighting")]
struct Args {
    /// Path to config.yaml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Action,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Read a text aloud, highlighting the sentence being spoken
    Play(PlayArgs),

    /// Manage the custom voice library
    Voices {
        #[command(subcommand)]
        action: VoicesAction,
    },

    /// List subjects and the voice each one selects
    Subjects,
}

#[derive(clap::Args, Debug)]
struct PlayArgs {
    /// Text file to read
    file: Option<PathBuf>,

    /// Text to read instead of a file
    #[arg(long, conflicts_with = "file")]
    text: Option<String>,

    /// Voice type: male, female, child or custom
    #[arg(long)]
    voice: Option<VoiceType>,

    /// Speed: slow, normal or fast
    #[arg(long)]
    speed: Option<Speed>,

    /// Tone: calm, lively or composed
    #[arg(long)]
    tone: Option<Tone>,

    /// Subject whose voice profile to apply (see `read-aloud subjects`)
    #[arg(long)]
    subject: Option<String>,

    /// Custom voice recording to play instead of synthesis
    #[arg(long)]
    voice_file: Option<PathBuf>,

    /// Registered custom voice, by id or name
    #[arg(long, conflicts_with = "voice_file")]
    custom_voice: Option<String>,

    /// Do not track or print the sentence being spoken
    #[arg(long)]
    no_sync: bool,

    /// Remember the resulting voice settings
    #[arg(long)]
    save: bool,

    /// Keep accepting commands after playback ends
    #[arg(long)]
    hold: bool,
}

#[derive(Subcommand, Debug)]
enum VoicesAction {
    /// List registered voices
    List,

    /// Register a recording as a custom voice
    Add {
        file: PathBuf,

        #[arg(long)]
        name: Option<String>,
    },

    /// Remove a registered voice
    Remove { id: String },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Logs go to stderr; stdout carries the highlighted text
    let filter = if args.verbose {
        EnvFilter::new("debug,symphonia=info")
    } else {
        EnvFilter::new("warn,read_aloud=info,symphonia=warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load(args.config.as_deref())?;
    let store = Store::from_config(&config.store)?;

    match args.command {
        Action::Play(play_args) => play(config, store, play_args).await,
        Action::Voices { action } => voices(&store, action).await,
        Action::Subjects => {
            subjects();
            Ok(())
        }
    }
}

async fn play(config: Config, store: Store, args: PlayArgs) -> Result<(), Box<dyn std::error::Error>> {
    let text = match (&args.file, &args.text) {
        (Some(path), _) => tokio::fs::read_to_string(path).await?,
        (None, Some(text)) => text.clone(),
        (None, None) => return Err("nothing to read: pass a text file or --text".into()),
    };

    let settings = resolve_settings(&config, &store, &args)?;
    info!(
        "Voice: {} / {:?} / {:?}{}",
        settings.voice_type.label(),
        settings.speed,
        settings.tone,
        settings
            .custom_source()
            .map(|s| format!(" ({})", s.describe()))
            .unwrap_or_default()
    );
    if args.save {
        store.save_settings(&settings)?;
        info!("Settings saved to {}", store.dir().display());
    }

    let clock: Arc<dyn AudioClock> = Arc::new(SystemClock::new());
    let engine = EspeakEngine::new(&config.synthesis)?;
    let coordinator = SyncCoordinator::new(
        settings.clone(),
        config.playback.clone(),
        clock,
        Box::new(engine),
        default_output_factory(),
    );
    let tick = Duration::from_millis(config.playback.tick_interval_ms.max(1));
    let (session, handle) = SyncSession::new(coordinator, tick);
    let (error_tx, error_rx) = mpsc::unbounded_channel();
    let session = session.with_error_sink(error_tx);

    tokio::spawn(print_progress(handle.subscribe(), handle.subscribe_segments()));
    tokio::spawn(report_errors(handle.clone(), error_rx, args.hold));
    tokio::spawn(read_commands(handle.clone(), stdin_lines()));
    if !args.hold {
        tokio::spawn(shutdown_when_finished(handle.clone()));
    }

    handle.send(Command::SetText(text)).await?;
    handle.send(Command::Play).await?;
    eprintln!(
        "Commands: pause | resume | stop | seek <seconds> | replay | subject <name> | text <text> | quit"
    );

    session.run().await;
    Ok(())
}

/// Config defaults, then saved settings, then the command line.
fn resolve_settings(config: &Config, store: &Store, args: &PlayArgs) -> Result<VoiceSettings, SyncError> {
    let mut settings = store.load_settings().unwrap_or_else(|| config.voice.clone());

    if let Some(subject) = &args.subject {
        subject.parse::<Subject>()?;
        settings = settings.apply_subject(subject);
    }
    settings = settings.apply(&SettingsPatch {
        voice_type: args.voice,
        tone: args.tone,
        speed: args.speed,
    });

    if let Some(path) = &args.voice_file {
        settings.voice_type = VoiceType::Custom;
        settings.custom_voice_source = Some(AudioSource::File(path.clone()));
        settings.custom_voice_name = path.file_stem().map(|s| s.to_string_lossy().to_string());
    } else if let Some(id) = &args.custom_voice {
        let voice = store
            .find_custom_voice(id)
            .ok_or_else(|| SyncError::Config(format!("no registered voice named {id}")))?;
        settings.voice_type = VoiceType::Custom;
        settings.custom_voice_source = Some(voice.source());
        settings.custom_voice_name = Some(voice.name);
    }

    if args.no_sync {
        settings.sync_with_text = false;
    }
    Ok(settings)
}

/// Print each segment as it starts, plus pause/resume/finish markers.
async fn print_progress(
    mut state: watch::Receiver<TransportState>,
    segments: watch::Receiver<Vec<String>>,
) {
    let mut last = *state.borrow();
    while state.changed().await.is_ok() {
        let now = *state.borrow_and_update();

        if now.current_segment_index != last.current_segment_index {
            let segments = segments.borrow();
            if let Some(text) = usize::try_from(now.current_segment_index)
                .ok()
                .and_then(|i| segments.get(i))
            {
                println!(
                    "[{}] ({}/{}) {}",
                    now.progress_label(),
                    now.current_segment_index + 1,
                    segments.len(),
                    text.trim()
                );
            }
        }
        if now.is_paused && !last.is_paused {
            println!("-- paused at {}", format_time(now.current_time));
        } else if now.is_playing && last.is_paused {
            println!("-- resumed");
        } else if now.is_idle() && !last.is_idle() {
            println!("-- stopped at {}", now.progress_label());
        }
        last = now;
    }
}

async fn report_errors(handle: SessionHandle, mut errors: mpsc::UnboundedReceiver<SyncError>, hold: bool) {
    while let Some(error) = errors.recv().await {
        eprintln!("error: {error}");
        let fatal = matches!(
            error,
            SyncError::Decode(_) | SyncError::Synthesis(_) | SyncError::ResourceUnavailable(_)
        );
        if fatal && !hold {
            let _ = handle.send(Command::Shutdown).await;
            return;
        }
    }
}

/// Lines from stdin, read on a plain thread so a pending read never holds up
/// runtime shutdown.
fn stdin_lines() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

async fn read_commands(handle: SessionHandle, mut lines: mpsc::UnboundedReceiver<String>) {
    while let Some(line) = lines.recv().await {
        if line.trim().is_empty() {
            continue;
        }
        match line.parse::<Command>() {
            Ok(command) => {
                if handle.send(command).await.is_err() {
                    return;
                }
            }
            Err(e) => eprintln!("{e}"),
        }
    }
}

/// End the session once a run plays to its end. Stops, replays and new text
/// do not count.
async fn shutdown_when_finished(handle: SessionHandle) {
    let mut finished = handle.subscribe_finished();
    if finished.changed().await.is_ok() {
        let _ = handle.send(Command::Shutdown).await;
    }
}

async fn voices(store: &Store, action: VoicesAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        VoicesAction::List => {
            let voices = store.load_custom_voices();
            if voices.is_empty() {
                println!("No custom voices registered.");
            }
            for voice in voices {
                println!(
                    "{}  {}  {}  {:.1} KB  {}",
                    voice.id,
                    voice.name,
                    format_time(voice.duration),
                    voice.file_size as f64 / 1024.0,
                    voice.path.display()
                );
            }
        }
        VoicesAction::Add { file, name } => {
            let voice = store.register_custom_voice(&file, name.as_deref()).await?;
            println!("Registered {} as {} ({})", voice.name, voice.id, format_time(voice.duration));
        }
        VoicesAction::Remove { id } => {
            if store.delete_custom_voice(&id)? {
                println!("Removed {id}");
            } else {
                println!("No voice with id {id}");
            }
        }
    }
    Ok(())
}

fn subjects() {
    for subject in Subject::ALL {
        let profile = subject.profile();
        println!(
            "{:<17} {} / {:?} / {:?}  {}",
            subject.as_str(),
            profile.voice_type.label(),
            profile.tone,
            profile.speed,
            profile.description
        );
    }
}
