//! Kick Counter - fetal movement session tracking.
//!
//! This library turns a stream of taps ("I felt a kick") into timed sessions
//! that are persisted by a remote care API, and derives the notices a parent
//! needs: when the kick goal is reached, and when a long session had
//! worryingly few kicks.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Kick Counter                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │    Clock    │──▶│   Session   │──▶│   Session   │──▶ API │
//! │  │ (1s ticks)  │   │   Tracker   │   │    Store    │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! │                          │                  ▲               │
//! │                          ▼                  │               │
//! │                   ┌─────────────┐   ┌─────────────┐        │
//! │                   │  Activity   │   │ Credentials │        │
//! │                   │    Log      │   │   (token)   │        │
//! │                   └─────────────┘   └─────────────┘        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use kick_counter::{
//!     credentials::TokenFile, store::HttpSessionStore, Config, SessionTracker, SystemClock,
//! };
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load()?;
//! let clock = Arc::new(SystemClock::current().expect("inside a tokio runtime"));
//! let store = HttpSessionStore::new(
//!     config.api_config(),
//!     Arc::new(TokenFile::new(config.token_path())),
//! )?;
//! let tracker = SessionTracker::new(clock, Arc::new(store), config.tracker_settings()?);
//!
//! tracker.start()?;
//! if let Some(notice) = tracker.record_kick() {
//!     println!("{notice}");
//! }
//! let outcome = tracker.stop().await?;
//! # let _ = outcome;
//! # Ok(())
//! # }
//! ```

pub mod activity;
pub mod clock;
pub mod config;
pub mod core;
pub mod credentials;
pub mod store;

// Re-export key types at crate root for convenience
pub use activity::{Activity, ActivityLog, ActivityStats, SharedActivityLog};
pub use clock::{Clock, ManualClock, SystemClock, TickHandle};
pub use config::{Config, ConfigError};
pub use crate::core::{
    DailyAggregate, Notice, PersistedSession, SessionSnapshot, SessionTracker, StopOutcome,
    TrackerError, TrackerSettings, TrackerStatus, WeeklyChart,
};
pub use credentials::{CredentialSource, StaticToken, TokenFile};
pub use store::{
    ApiConfig, HttpSessionStore, InMemorySessionStore, SessionStore, StoreError,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Notice shown to users before they rely on the counter.
pub const MEDICAL_NOTICE: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║               KICK COUNTER - IMPORTANT HEALTH NOTICE             ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  This tool helps you count your baby's movements. It does not    ║
║  diagnose anything and is not a substitute for medical care.     ║
║                                                                  ║
║  ✓ HOW IT WORKS:                                                 ║
║    • Start a session when your baby is usually active            ║
║    • Press Enter each time you feel a movement                   ║
║    • Most babies reach 10 movements well within 2 hours          ║
║                                                                  ║
║  ✗ DO NOT WAIT FOR THE APP IF:                                   ║
║    • You notice fewer movements than usual                       ║
║    • Your baby's pattern of movements changes                    ║
║    • You feel no movement at all                                 ║
║                                                                  ║
║  Contact your midwife, doctor or maternity unit straight away.   ║
║                                                                  ║
║  Sessions with no kicks are not saved. If a save fails, the      ║
║  session is not kept; check your history with:                   ║
║    kick-counter today                                            ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;
