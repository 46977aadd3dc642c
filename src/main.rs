use anyhow::Context;
use clap::{Parser, Subcommand};
use guessviz::app::{self, RunOptions};
use guessviz::config::ModePreference;
use guessviz::logging;
use guessviz::prefs::{FilePreferenceStore, MemoryPreferenceStore, PreferenceStore};
use guessviz::settings::Settings;
use guessviz::terminal::Terminal;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "guessviz")]
#[command(author = "Terminal Art Generator")]
#[command(version)]
#[command(about = "Audio visualizer client for a multiplayer song-guessing room", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Join a room and visualize what is playing
    Play {
        /// Room websocket url (overrides the config file)
        #[arg(short = 'S', long)]
        server: Option<String>,

        /// Visualizer for this run: random, circle or bar
        #[arg(short, long)]
        mode: Option<ModePreference>,

        /// Random seed for reproducibility
        #[arg(short, long)]
        seed: Option<u64>,

        /// Round length of the offline room, in seconds
        #[arg(short, long, default_value = "30")]
        time: u32,

        /// Write debug logs even when disabled in the config
        #[arg(short, long)]
        debug: bool,

        /// Emblem image for the circle visualizer
        #[arg(short, long)]
        emblem: Option<PathBuf>,

        /// Blinking frame of the emblem
        #[arg(long)]
        emblem_blink: Option<PathBuf>,
    },

    /// Offline room with synthetic audio
    Demo {
        /// Visualizer for this run: random, circle or bar
        #[arg(short, long)]
        mode: Option<ModePreference>,

        /// Random seed for reproducibility
        #[arg(short, long)]
        seed: Option<u64>,

        /// Round length, in seconds
        #[arg(short, long, default_value = "30")]
        time: u32,

        /// Write debug logs even when disabled in the config
        #[arg(short, long)]
        debug: bool,
    },

    /// Show or set the stored visualizer preference
    Mode {
        /// random, circle or bar
        value: Option<ModePreference>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut settings = Settings::load();

    match cli.command {
        Commands::Play {
            server,
            mode,
            seed,
            time,
            debug,
            emblem,
            emblem_blink,
        } => {
            if emblem.is_some() {
                settings.visualizer.emblem = emblem;
                settings.visualizer.emblem_blink = emblem_blink;
            }
            let options = RunOptions {
                demo: false,
                server: server.or_else(|| settings.server.url.clone()),
                mode,
                seed,
                round_time: time,
            };
            let mut store = FilePreferenceStore::open(FilePreferenceStore::default_path());
            run_interactive(&settings, &mut store, &options, debug)?;
        }
        Commands::Demo { mode, seed, time, debug } => {
            let options = RunOptions {
                demo: true,
                server: None,
                mode,
                seed,
                round_time: time,
            };
            let mut store = MemoryPreferenceStore::default();
            run_interactive(&settings, &mut store, &options, debug)?;
        }
        Commands::Mode { value } => {
            let path = FilePreferenceStore::default_path();
            let mut store = FilePreferenceStore::open(path.clone());
            let mode = app::run_mode(&mut store, value)
                .with_context(|| format!("updating preferences at {}", path.display()))?;
            println!("{mode}");
        }
    }

    Ok(())
}

fn run_interactive(
    settings: &Settings,
    store: &mut dyn PreferenceStore,
    options: &RunOptions,
    debug: bool,
) -> anyhow::Result<()> {
    if let Some(path) = logging::init(&settings.logging, debug).context("opening log file")? {
        eprintln!("logging to {}", path.display());
    }
    let mut term = Terminal::new(true).context("initializing terminal")?;
    app::run(&mut term, settings, store, options).context("visualizer exited with an error")
}
