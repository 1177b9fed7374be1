//! # Musicbar - Apple Music Companion
//!
//! Musicbar drives the Music application from the command line: playback
//! control, a personal like/dislike store for songs, artists and genres, and
//! a weekly scan that curates newly added tracks into a "New songs" playlist
//! based on that taste.
//!
//! ## Architecture
//!
//! - `cli`: Command-line interface definitions
//! - `player`: osascript control channel to the Music application
//! - `library`: Typed track and playlist operations
//! - `db`: SQLite preference store
//! - `scan`: Weekly playlist scanning and classification
//! - `daemon`: 1-second status poll daemon
//! - `config`: Configuration and data directory management
//!
//! ## Usage
//!
//! ```bash
//! # Playback
//! musicbar play-pause
//! musicbar next
//!
//! # Taste
//! musicbar like song
//! musicbar dislike artist
//!
//! # Curate this week's new tracks
//! musicbar scan Library
//! ```

use anyhow::Result;
use chrono::Local;
use clap::{CommandFactory, Parser};
use log::info;
use musicbar::db::Preference;
use musicbar::library::Track;
use musicbar::player::{ControlChannel, Osascript};
use musicbar::{cli, completion, config, daemon, db, library, player, scan};
use rusqlite::Connection;

/// Main entry point.
///
/// Initializes logging, parses command-line arguments, and routes commands
/// to the appropriate module functions.
///
/// # Logging
///
/// Controlled via `RUST_LOG`:
/// - `RUST_LOG=debug musicbar status` - Enable debug logging
/// - `RUST_LOG=musicbar::scan=debug musicbar scan Library` - Module-specific
fn main() -> Result<()> {
    env_logger::init();

    let args = cli::Args::parse();
    let cfg = config::Config::load()?;
    let channel = Osascript::new(cfg.player_app.clone());

    match args.command {
        cli::Command::PlayPause => library::play_pause(&channel)?,
        cli::Command::Next => library::next_track(&channel)?,
        cli::Command::Previous => library::previous_track(&channel)?,
        cli::Command::Stop => library::stop(&channel)?,
        cli::Command::Quit => {
            library::stop(&channel)?;
            library::quit(&channel)?;
        }
        cli::Command::Status => show_status(&channel)?,
        cli::Command::Like { target } => {
            let conn = open_store(&cfg)?;
            apply_preference(&conn, &channel, target, Preference::Liked)?;
        }
        cli::Command::Dislike { target } => {
            let conn = open_store(&cfg)?;
            apply_preference(&conn, &channel, target, Preference::Disliked)?;
        }
        cli::Command::Playlists => {
            for name in library::user_playlists(&channel)? {
                println!("{name}");
            }
        }
        cli::Command::Playlist { name } => library::start_playlist(&channel, &name)?,
        cli::Command::PlayTrack { id } => library::play_track_by_id(&channel, id)?,
        cli::Command::Scan { source, week, year } => {
            let conn = open_store(&cfg)?;
            let key = resolve_week(week, year)?;
            info!("Scanning \"{source}\" for week {key}");
            let summary = scan::scan_week(&conn, &channel, &source, key)?;
            println!("{summary}");
        }
        cli::Command::Daemon { action } => match action {
            cli::DaemonAction::Start => {
                if daemon::is_daemon_running()? {
                    eprintln!("Status daemon is already running");
                    return Ok(());
                }

                // Fork and run the poll loop in the child, as a detached
                // background process.
                match unsafe { libc::fork() } {
                    0 => {
                        let mut status_daemon = daemon::StatusDaemon::new()?;
                        status_daemon.run(channel)?;
                        std::process::exit(0);
                    }
                    pid if pid > 0 => {
                        println!("Starting status daemon...");
                        std::thread::sleep(std::time::Duration::from_millis(500));

                        if daemon::is_daemon_running()? {
                            println!("Status daemon started");
                        } else {
                            eprintln!("Failed to start status daemon");
                        }
                    }
                    _ => {
                        eprintln!("Failed to fork process");
                    }
                }
            }
            cli::DaemonAction::Stop => {
                daemon::stop_daemon()?;
                println!("Status daemon stopped");
            }
            cli::DaemonAction::Status => {
                if daemon::is_daemon_running()? {
                    println!("Status daemon is running");
                } else {
                    println!("Status daemon is not running");
                }
            }
        },
        cli::Command::Completion { shell } => {
            let mut cmd = cli::Args::command();
            completion::generate_completions(
                completion::shell_to_completion_shell(&shell),
                &mut cmd,
            );
        }
        cli::Command::CompletePlaylists => {
            completion::print_playlist_completions(&channel)?;
        }
    }

    Ok(())
}

fn open_store(cfg: &config::Config) -> Result<Connection> {
    db::open(&cfg.resolved_db_path()?)
}

/// Target week for a scan. Defaults to the ISO week containing today; an
/// explicit week without a year is taken from the current ISO year.
fn resolve_week(week: Option<u32>, year: Option<i32>) -> Result<scan::WeekYear> {
    let current = scan::WeekYear::of(Local::now().date_naive());
    match (week, year) {
        (None, None) => Ok(current),
        (Some(week), None) => Ok(scan::WeekYear::new(current.year(), week)),
        (Some(week), Some(year)) => Ok(scan::WeekYear::new(year, week)),
        (None, Some(_)) => anyhow::bail!("--year requires --week"),
    }
}

fn show_status(channel: &dyn ControlChannel) -> Result<()> {
    if !library::is_playing(channel)? {
        println!("Player is stopped");
        return Ok(());
    }

    let position = library::player_position(channel)?
        .map(player::format_position)
        .unwrap_or_else(|| "--:--".to_string());

    match library::current_track(channel)? {
        Some(track) => {
            let artist = track.artist.as_deref().unwrap_or("Unknown artist");
            println!("♫ {} - {} [{}]", artist, track.name, position);
        }
        None => println!("♫ [{position}]"),
    }
    Ok(())
}

/// Record a like/dislike for the current track, its artist, or its genre,
/// then mirror the song-level decision onto the live player.
fn apply_preference(
    conn: &Connection,
    channel: &dyn ControlChannel,
    target: cli::Target,
    preference: Preference,
) -> Result<()> {
    let Some(track) = library::current_track(channel)? else {
        anyhow::bail!("No track is currently playing");
    };

    let artist = track
        .artist
        .as_deref()
        .map(|name| db::get_or_create_artist(conn, name))
        .transpose()?;
    let genre = track
        .genre
        .as_deref()
        .map(|name| db::get_or_create_genre(conn, name))
        .transpose()?;

    let verb = if preference.is_liked() {
        "Liked"
    } else {
        "Disliked"
    };

    match target {
        cli::Target::Song => {
            let song = db::get_or_create_song(
                conn,
                &track,
                artist.as_ref().map(|a| a.id),
                genre.as_ref().map(|g| g.id),
            )?;
            db::set_song_preference(conn, song.id, preference)?;
            mirror_to_player(channel, &track, preference)?;
            println!("{verb} song: {}", track.name);
        }
        cli::Target::Artist => {
            let Some(artist) = artist else {
                anyhow::bail!("Current track has no artist tag");
            };
            db::set_artist_preference(conn, artist.id, preference)?;
            println!("{verb} artist: {}", artist.name);
        }
        cli::Target::Genre => {
            let Some(genre) = genre else {
                anyhow::bail!("Current track has no genre tag");
            };
            db::set_genre_preference(conn, genre.id, preference)?;
            println!("{verb} genre: {}", genre.name);
        }
    }

    Ok(())
}

/// Push a song-level decision to the player: liked sets the loved flag,
/// disliked sets the disliked flag and advances to the next track.
fn mirror_to_player(
    channel: &dyn ControlChannel,
    track: &Track,
    preference: Preference,
) -> Result<()> {
    match preference {
        Preference::Liked => library::set_current_loved(channel, true)?,
        Preference::Disliked => {
            library::set_current_disliked(channel, true)?;
            info!("Skipping disliked track: {}", track.name);
            library::next_track(channel)?;
        }
        Preference::Neutral => {}
    }
    Ok(())
}
