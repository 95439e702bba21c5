//! Storybox firmware — main entry point.
//!
//! Hexagonal architecture with a single cooperative control loop:
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                   Adapters (outer ring)                   │
//! │                                                           │
//! │  SimBoard          SimAudio        JsonCatalog            │
//! │  (Input+Led)       (AudioPort)     (CatalogPort+cache)    │
//! │  SystemClock       LogEventSink                           │
//! │                                                           │
//! │  ─────────────── Port Trait Boundary ──────────────────   │
//! │                                                           │
//! │  ┌─────────────────────────────────────────────────────┐  │
//! │  │           StoryboxService (pure logic)              │  │
//! │  │  FSM · GestureButton · LedPatternScheduler          │  │
//! │  └─────────────────────────────────────────────────────┘  │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! Each loop iteration ticks the service at the configured cadence and
//! sleeps the remainder. The loop exits once the FSM reaches its terminal
//! state, after letting the farewell LED pattern finish.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use storybox::adapters::log_sink::LogEventSink;
use storybox::adapters::sim::{SimAudio, SimBoard};
use storybox::adapters::time::SystemClock;
use storybox::app::ports::LedPort;
use storybox::app::service::StoryboxService;
use storybox::catalog::JsonCatalog;
use storybox::config::BoxConfig;
use storybox::drivers::led_patterns::LedPatternScheduler;
use storybox::error::Error;
use storybox::fsm::StateId;

#[derive(Parser, Debug)]
#[command(author, version, about = "Storyteller box control loop (simulated hardware)")]
struct Cli {
    /// Directory containing card JSON files and narration audio.
    #[arg(short, long, default_value = "stories")]
    stories: PathBuf,

    /// Simulated narration length in seconds.
    #[arg(long, default_value_t = 8)]
    narration_secs: u64,

    /// Auto-shutdown after this many idle seconds (0 disables).
    #[arg(long)]
    idle_timeout: Option<u64>,

    /// Render a named LED pattern for a few seconds, then exit.
    #[arg(long)]
    led_test: Option<String>,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    if let Some(name) = cli.led_test.as_deref() {
        run_led_test(name);
        return Ok(());
    }

    let mut config = BoxConfig {
        stories_dir: cli.stories,
        ..BoxConfig::default()
    };
    if let Some(t) = cli.idle_timeout {
        config.idle_timeout_secs = t;
    }

    if !config.stories_dir.is_dir() {
        return Err(Error::Init("stories directory not found").into());
    }

    tracing::info!(
        "storybox v{} starting (stories: {})",
        env!("CARGO_PKG_VERSION"),
        config.stories_dir.display()
    );

    let catalog = JsonCatalog::new(&config.stories_dir);
    catalog.verify();
    catalog.warm();

    let mut board = SimBoard::interactive(config.long_press_ms);
    let mut audio = SimAudio::new(cli.narration_secs);
    let clock = SystemClock::new();
    let mut sink = LogEventSink::new();

    let tick = Duration::from_millis(config.tick_interval_ms);
    let mut service = StoryboxService::new(config);
    service.start(Instant::now(), &mut board, &mut audio, &mut sink);

    tracing::info!("ready — commands: card <uid> | remove | tap | double | hold | volume <v> | battery <v>");

    loop {
        let started = Instant::now();
        let state = service.tick(started, &mut board, &mut audio, &catalog, &clock, &mut sink);
        if state == StateId::ShuttingDown {
            break;
        }
        let elapsed = started.elapsed();
        if elapsed < tick {
            std::thread::sleep(tick - elapsed);
        }
    }

    // Let the farewell pattern play out before dropping the LED.
    let farewell_until = Instant::now() + Duration::from_millis(2200);
    while Instant::now() < farewell_until {
        let now = Instant::now();
        service.tick(now, &mut board, &mut audio, &catalog, &clock, &mut sink);
        std::thread::sleep(tick);
    }

    tracing::info!("storybox stopped");
    Ok(())
}

/// Developer utility: drive a single named pattern against the simulated
/// LED so its timing can be eyeballed in the log.
fn run_led_test(name: &str) {
    tracing::info!("LED test: '{name}' for 3 s (unknown names render Off)");
    let mut board = SimBoard::new(1500);
    let mut sched = LedPatternScheduler::new();
    sched.set_named(name);

    let until = Instant::now() + Duration::from_secs(3);
    while Instant::now() < until {
        sched.tick(Instant::now(), &mut board);
        std::thread::sleep(Duration::from_millis(20));
    }
    board.set_led(false);
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}
