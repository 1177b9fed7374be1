//! Apple Music companion: playback control and taste-driven weekly playlists.
//!
//! Core modules:
//! - [`player`] - Control channel to the Music application (osascript)
//! - [`library`] - Typed track/playlist operations over the channel
//! - [`db`] - Preference store (songs, artists, genres)
//! - [`scan`] - Weekly playlist scanning and classification
//! - [`daemon`] - Periodic status polling
//!
//! ### Supporting Modules
//!
//! - [`config`] - Configuration and data directory management
//! - [`cli`] - Command-line interface definitions with clap integration
//! - [`completion`] - Shell completion generation
//!
//! ## Quick Start Example
//!
//! ```no_run
//! use musicbar::{config, db, player, scan};
//!
//! let cfg = config::Config::load()?;
//! let conn = db::open(&cfg.resolved_db_path()?)?;
//! let channel = player::Osascript::new(cfg.player_app.clone());
//!
//! // Curate this week's new tracks from the main library playlist.
//! let today = chrono::Local::now().date_naive();
//! let summary = scan::scan_week(&conn, &channel, "Library", scan::WeekYear::of(today))?;
//! println!("{summary}");
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Preference Hierarchy
//!
//! Likes and dislikes are recorded per song, artist and genre as a single
//! tri-state value. During a scan a track is excluded when the song is
//! disliked, the artist is disliked, or the genre is disliked without the
//! artist being explicitly liked. See [`scan::classify`].
//!
//! ## Error Handling
//!
//! Public functions return `anyhow::Result`. The one deliberate exception
//! to fail-fast: a scan whose destination playlist cannot be created
//! reports that inside its summary string instead of erroring, so the
//! caller can always display the result verbatim.

pub mod cli;
pub mod completion;
pub mod config;
pub mod daemon;
pub mod db;
pub mod library;
pub mod player;
pub mod scan;
