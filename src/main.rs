// Soundboard command line
// Device listing, catalogue maintenance, and playback until done or Ctrl+C

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use parking_lot::RwLock;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use soundboard::audio::{default_output_device, list_output_devices};
use soundboard::{
    AudioDevice, Catalogue, CpalStreamFactory, Hotkey, HotkeyDispatcher, PlayReport,
    PlaybackEngine, SettingsProvider, SharedSettings, Sound, SoundboardSettings, SystemMicMute,
};

/// Command-line arguments for soundboard
#[derive(Parser, Debug)]
#[command(name = "soundboard")]
#[command(about = "Play clips on several output devices at once")]
#[command(version)]
struct Args {
    /// Directory holding settings.json and sounds.json
    #[arg(long, default_value = ".soundboard", env = "SOUNDBOARD_DIR")]
    app_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List output devices
    Devices,
    /// List catalogued sounds
    List,
    /// Add a clip to the catalogue
    Add {
        file: PathBuf,
        #[arg(long)]
        nickname: Option<String>,
        #[arg(long, default_value_t = 0)]
        start_ms: u64,
        /// e.g. "Ctrl + F1"
        #[arg(long)]
        hotkey: Option<Hotkey>,
    },
    /// Add every clip in a directory to the catalogue
    Import { directory: PathBuf },
    /// Play a clip and wait for it to finish
    Play {
        file: PathBuf,
        /// Output device name; repeat for several devices
        #[arg(long = "device")]
        devices: Vec<String>,
        /// Overrides the clip's stored start offset
        #[arg(long)]
        start_ms: Option<u64>,
        #[arg(long)]
        volume: Option<f32>,
    },
    /// Play the sound bound to a hotkey
    Trigger { hotkey: Hotkey },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "soundboard=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    match args.command {
        Command::Devices => {
            let default = default_output_device();
            for device in list_output_devices().context("Failed to list output devices")? {
                let marker = if Some(&device) == default.as_ref() { "*" } else { " " };
                println!("{} {}", marker, device.name);
            }
        }
        Command::List => {
            let catalogue = Catalogue::load(&args.app_dir)?;
            for sound in catalogue.sounds() {
                println!(
                    "{:<24} {:>8}ms  {:<16} {}",
                    sound.display_name(),
                    sound.start_time.as_millis(),
                    sound.hotkey.to_string(),
                    sound.path().display()
                );
            }
        }
        Command::Add {
            file,
            nickname,
            start_ms,
            hotkey,
        } => {
            let mut catalogue = Catalogue::load(&args.app_dir)?;
            let mut sound = Sound::new(file.canonicalize().context("Clip not found")?);
            sound.nickname = nickname.unwrap_or_default();
            sound.start_time = Duration::from_millis(start_ms);
            sound.hotkey = hotkey.unwrap_or_default();

            info!("Adding '{}'", sound.display_name());
            catalogue.add(sound)?;
            catalogue.save(&args.app_dir)?;
        }
        Command::Import { directory } => {
            let mut catalogue = Catalogue::load(&args.app_dir)?;
            let added = catalogue.import_directory(&directory)?;
            catalogue.save(&args.app_dir)?;
            println!("Added {} sound(s)", added);
        }
        Command::Play {
            file,
            devices,
            start_ms,
            volume,
        } => {
            let engine = build_engine(&args.app_dir, &devices)?;
            if let Some(volume) = volume {
                engine.set_volume(volume);
            }

            let catalogue = Catalogue::load(&args.app_dir)?;
            let path = file.canonicalize().unwrap_or(file);
            let sound = catalogue
                .get(&path)
                .cloned()
                .unwrap_or_else(|| Sound::new(path));

            let report = engine.play(&sound, start_ms.map(Duration::from_millis));
            check_report(&report)?;
            wait_until_done(&engine).await;
        }
        Command::Trigger { hotkey } => {
            let engine = Arc::new(build_engine(&args.app_dir, &[])?);
            let catalogue = Arc::new(RwLock::new(Catalogue::load(&args.app_dir)?));
            let dispatcher = HotkeyDispatcher::new(Arc::clone(&engine), catalogue);

            let Some(report) = dispatcher.dispatch(&hotkey) else {
                bail!("No sound is bound to {}", hotkey);
            };
            check_report(&report)?;
            wait_until_done(&engine).await;
        }
    }

    Ok(())
}

fn build_engine(app_dir: &Path, device_names: &[String]) -> Result<PlaybackEngine> {
    let settings = SharedSettings::new(
        SoundboardSettings::load(app_dir).context("Failed to load settings")?,
    );
    let engine = PlaybackEngine::new(
        Arc::new(settings.clone()),
        Arc::new(CpalStreamFactory::new()),
        Arc::new(SystemMicMute::new()?),
    );

    if !device_names.is_empty() {
        engine.set_playback_devices(resolve_devices(device_names)?);
    } else if settings.selected_playback_devices().is_empty() {
        // Nothing configured yet: fall back to whatever the host plays through
        engine.set_playback_device(default_output_device());
    }
    Ok(engine)
}

fn resolve_devices(names: &[String]) -> Result<Vec<AudioDevice>> {
    let available = list_output_devices()?;
    names
        .iter()
        .map(|name| {
            available
                .iter()
                .find(|d| d.name.eq_ignore_ascii_case(name) || d.id == *name)
                .cloned()
                .with_context(|| format!("No output device named '{}'", name))
        })
        .collect()
}

fn check_report(report: &PlayReport) -> Result<()> {
    for failure in &report.failed {
        warn!("{}: {}", failure.device, failure.error);
    }
    if report.is_empty() {
        bail!("No playback device available");
    }
    if report.all_failed() {
        bail!("Playback failed on every device");
    }
    Ok(())
}

async fn wait_until_done(engine: &PlaybackEngine) {
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut poll = tokio::time::interval(Duration::from_millis(50));

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Interrupted, stopping playback");
                break;
            }
            _ = poll.tick() => {
                if !engine.is_playing() {
                    break;
                }
            }
        }
    }

    engine.stop_all_sounds();
}
