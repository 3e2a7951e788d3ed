//! Kick Counter CLI
//!
//! Count fetal movements from the terminal.

use chrono::Utc;
use clap::{Parser, Subcommand};
use kick_counter::{
    activity::{ActivityLog, SharedActivityLog},
    config::Config,
    core::{format_elapsed, PersistedSession, StopOutcome},
    credentials::{CredentialSource, TokenFile},
    store::HttpSessionStore,
    SessionTracker, SystemClock, MEDICAL_NOTICE, VERSION,
};
use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "kick-counter")]
#[command(version = VERSION)]
#[command(about = "Count your baby's movements and keep your care team informed", long_about = None)]
struct Cli {
    /// Override the configured API base URL
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a kick-count session
    Track,

    /// Show today's sessions and total
    Today,

    /// Show the 7-day trend
    Trend,

    /// Store the access token used for the care API
    Login {
        /// Bearer token issued by the care API
        #[arg(long)]
        token: String,
    },

    /// Remove the stored access token
    Logout,

    /// Show configuration and activity statistics
    Status,

    /// Show configuration
    Config,

    /// Display the health notice
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

    let mut config = Config::load().unwrap_or_else(|e| {
        eprintln!("Warning: Could not load config ({e}), using defaults");
        Config::default()
    });
    if let Some(url) = cli.api_url {
        config.api_base_url = url;
    }

    match cli.command {
        Commands::Track => {
            cmd_track(&config);
        }
        Commands::Today => {
            cmd_today(&config);
        }
        Commands::Trend => {
            cmd_trend(&config);
        }
        Commands::Login { token } => {
            cmd_login(&config, &token);
        }
        Commands::Logout => {
            cmd_logout(&config);
        }
        Commands::Status => {
            cmd_status(&config);
        }
        Commands::Config => {
            cmd_config(&config);
        }
        Commands::Notice => {
            cmd_notice();
        }
    }
}

/// Build a runtime and a tracker talking to the configured API.
fn build_tracker(
    config: &Config,
) -> Result<(tokio::runtime::Runtime, SessionTracker), Box<dyn std::error::Error>> {
    let settings = config.tracker_settings()?;

    // Multi-threaded so the tick task keeps running while the main thread
    // waits for input.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()?;

    let clock = Arc::new(SystemClock::new(runtime.handle().clone()));
    let credentials = Arc::new(TokenFile::new(config.token_path()));
    let store = HttpSessionStore::new(config.api_config(), credentials)?;

    let tracker = SessionTracker::new(clock, Arc::new(store), settings);
    Ok((runtime, tracker))
}

fn require_login(config: &Config) {
    if TokenFile::new(config.token_path()).bearer_token().is_none() {
        eprintln!("Error: Not signed in.");
        eprintln!();
        eprintln!("Run 'kick-counter login --token <TOKEN>' with the token from the care app.");
        std::process::exit(1);
    }
}

fn cmd_track(config: &Config) {
    println!("Kick Counter v{VERSION}");
    println!();

    require_login(config);

    let (runtime, tracker) = match build_tracker(config) {
        Ok(built) => built,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };
    let activity = open_activity_log(config);
    let tracker = tracker.with_activity_log(activity.clone());
    let settings = tracker.settings().clone();

    match runtime.block_on(tracker.fetch_today_sessions()) {
        Ok(sessions) => println!(
            "Today so far: {} kicks in {} session(s)",
            tracker.today_total(),
            sessions.len()
        ),
        Err(e) => eprintln!("Warning: Could not load today's sessions: {e}"),
    }

    if let Err(e) = tracker.start() {
        eprintln!("Error starting session: {e}");
        std::process::exit(1);
    }

    println!("Session started. Goal: {} kicks.", settings.goal_kicks);
    println!("  Enter      record a kick");
    println!("  s / q      stop and save");
    println!("  Ctrl+C     stop and save");
    println!();

    // Set up Ctrl+C handler
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc_handler(r);

    // Read stdin on its own thread so the loop can notice Ctrl+C.
    let (sender, receiver) = crossbeam_channel::unbounded::<String>();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if sender.send(line).is_err() {
                break;
            }
        }
    });

    let mut last_minute = 0;

    while running.load(Ordering::SeqCst) {
        match receiver.recv_timeout(Duration::from_millis(200)) {
            Ok(line) => match line.trim() {
                "" | "k" => {
                    let notice = tracker.record_kick();
                    println!(
                        "[{}] Kick {} recorded",
                        format_elapsed(tracker.elapsed_secs()),
                        tracker.kick_count()
                    );
                    if let Some(notice) = notice {
                        println!();
                        println!("*** {notice} ***");
                        println!("You can keep counting or stop now.");
                        println!();
                    }
                }
                "s" | "q" => break,
                other => println!("Unknown input '{other}'. Press Enter for a kick, 's' to stop."),
            },
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                let minute = tracker.elapsed_secs() / 60;
                if minute > last_minute {
                    last_minute = minute;
                    println!(
                        "[{}] {} kicks so far",
                        format_elapsed(tracker.elapsed_secs()),
                        tracker.kick_count()
                    );
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
        }
    }

    println!();
    println!("Stopping session...");

    match runtime.block_on(tracker.stop()) {
        Ok(StopOutcome::Discarded { elapsed_secs }) => {
            println!(
                "No kicks recorded in {}; session not saved.",
                format_elapsed(elapsed_secs)
            );
        }
        Ok(StopOutcome::Saved { session, advisory }) => {
            println!(
                "Saved: {} kicks in {}",
                session.kicks,
                format_elapsed(session.duration_secs.unwrap_or_default())
            );
            if let Some(advisory) = advisory {
                println!();
                println!("!!! {advisory}");
            }
        }
        Err(e) => {
            eprintln!("Error: Session could not be saved: {e}");
            eprintln!("The kicks from this session were not stored.");
        }
    }

    println!("Today's total: {} kicks", tracker.today_total());

    if let Err(e) = activity.save() {
        eprintln!("Warning: Could not save activity stats: {e}");
    }
}

fn cmd_today(config: &Config) {
    require_login(config);

    let (runtime, tracker) = match build_tracker(config) {
        Ok(built) => built,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(tracker.fetch_today_sessions()) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }

    let aggregate = tracker.daily_aggregate();
    let tz = tracker.settings().timezone;
    let mut sessions: Vec<PersistedSession> = tracker
        .today_sessions()
        .into_iter()
        .filter(|s| s.local_date(tz) == aggregate.date)
        .collect();
    sessions.sort_by_key(|s| s.timestamp);

    println!("Kick counts for {}", aggregate.date.format("%A, %d %B %Y"));
    println!("================================");
    println!();

    if sessions.is_empty() {
        println!("No sessions recorded today.");
        println!("Run 'kick-counter track' to start one.");
        return;
    }

    for session in &sessions {
        let duration = session
            .duration_secs
            .map(format_elapsed)
            .unwrap_or_else(|| "--:--:--".to_string());
        println!(
            "  {}  {:>3} kicks  {}",
            session.timestamp.with_timezone(&tz).format("%H:%M"),
            session.kicks,
            duration
        );
    }
    println!();
    println!(
        "Total: {} kicks in {} session(s)",
        aggregate.total(),
        aggregate.sessions
    );
}

fn cmd_trend(config: &Config) {
    require_login(config);

    let (runtime, tracker) = match build_tracker(config) {
        Ok(built) => built,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let chart = match runtime.block_on(tracker.fetch_weekly_trend()) {
        Ok(chart) => chart,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    println!("Kicks over the last 7 days");
    println!("==========================");
    println!();

    let Some(summary) = chart.summary() else {
        println!("No chart data available yet.");
        return;
    };

    let scale = if summary.max > 0.0 { 40.0 / summary.max } else { 0.0 };
    for (label, value) in chart.points() {
        let bar = "█".repeat((value * scale).round() as usize);
        println!("  {label:>5} {value:>6.0} {bar}");
    }

    println!();
    println!(
        "Average: {:.1} kicks/day (min {:.0}, max {:.0}, std dev {:.1})",
        summary.mean, summary.min, summary.max, summary.std_dev
    );
}

fn cmd_login(config: &Config, token: &str) {
    if token.trim().is_empty() {
        eprintln!("Error: Token must not be empty");
        std::process::exit(1);
    }

    let token_file = TokenFile::new(config.token_path());
    if let Err(e) = token_file.save(token) {
        eprintln!("Error saving token: {e}");
        std::process::exit(1);
    }
    println!("Token saved to {:?}", token_file.path());
}

fn cmd_logout(config: &Config) {
    match TokenFile::new(config.token_path()).clear() {
        Ok(true) => println!("Signed out."),
        Ok(false) => println!("Not signed in."),
        Err(e) => {
            eprintln!("Error removing token: {e}");
            std::process::exit(1);
        }
    }
}

fn cmd_status(config: &Config) {
    println!("Kick Counter Status");
    println!("===================");
    println!();

    let signed_in = TokenFile::new(config.token_path()).bearer_token().is_some();
    println!(
        "Signed in: {}",
        if signed_in { "yes ✓" } else { "no ✗" }
    );
    println!();

    println!("Configuration:");
    println!("  API: {}", config.api_config().url());
    println!("  Time zone: {}", config.timezone);
    println!("  Goal: {} kicks", config.goal_kicks);
    println!(
        "  Low-kick advisory: fewer than {} kicks after {}",
        config.low_kick_threshold,
        format_elapsed(config.low_kick_window.as_secs())
    );
    println!("  Request timeout: {}s", config.request_timeout.as_secs());
    if let Err(e) = config.validate() {
        println!("  Warning: {e}");
    }
    println!();

    if config.activity_path().exists() {
        match ActivityLog::open(config.activity_path()) {
            Ok(activity) => println!("{}", activity.summary()),
            Err(e) => println!("Could not read activity stats: {e}"),
        }
    } else {
        println!("No previous session data found.");
    }

    println!();
    println!(
        "Local time: {}",
        Utc::now()
            .with_timezone(&config.tz().unwrap_or(chrono_tz::UTC))
            .format("%Y-%m-%d %H:%M")
    );
}

fn cmd_config(config: &Config) {
    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(config).unwrap_or_else(|_| "Error".to_string())
    );
}

fn cmd_notice() {
    println!("{MEDICAL_NOTICE}");
}

/// Load the activity log, starting over if the file is unreadable.
fn open_activity_log(config: &Config) -> SharedActivityLog {
    let path = config.activity_path();
    let log = ActivityLog::open(&path).unwrap_or_else(|e| {
        eprintln!("Warning: Could not load activity stats ({e}), starting fresh");
        ActivityLog::at(path.clone())
    });
    Arc::new(log)
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) {
    if let Err(e) = ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    }) {
        eprintln!("Warning: Could not set Ctrl+C handler: {e}");
    }
}
