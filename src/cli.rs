//! # Command-Line Interface Module
//!
//! Clap derive definitions for the Musicbar CLI. Every subcommand maps 1:1
//! to either a player action, a preference-store update, or the weekly
//! playlist scan.
//!
//! ## Examples
//!
//! ```bash
//! musicbar play-pause
//! musicbar dislike song
//! musicbar scan Library
//! musicbar daemon start
//! ```

use clap::{Parser, Subcommand, ValueEnum};

/// Shell types supported for completion generation
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    /// Bash shell
    Bash,
    /// Zsh shell
    Zsh,
    /// Fish shell
    Fish,
    /// PowerShell
    PowerShell,
    /// Elvish shell
    Elvish,
}

/// What a like/dislike applies to.
#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum Target {
    /// The currently playing song
    Song,
    /// The artist of the currently playing song
    Artist,
    /// The genre of the currently playing song
    Genre,
}

/// Main application arguments structure.
#[derive(Parser)]
#[command(name = "musicbar")]
#[command(about = "Musicbar: Apple Music companion - playback control & taste-driven weekly playlists")]
#[command(version)]
pub struct Args {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Enumeration of all available subcommands.
#[derive(Subcommand)]
pub enum Command {
    /// Toggle between playing and paused
    PlayPause,

    /// Advance to the next track
    Next,

    /// Return to the previous track
    Previous,

    /// Stop playback
    Stop,

    /// Stop playback and quit the player application
    Quit,

    /// Show the player state, current track and position
    Status,

    /// Record a like for the current song, its artist, or its genre
    ///
    /// Liking a song also sets the loved flag on the live player. A like
    /// replaces any earlier dislike of the same thing.
    Like {
        /// What the like applies to
        #[arg(value_enum)]
        target: Target,
    },

    /// Record a dislike for the current song, its artist, or its genre
    ///
    /// Disliking a song also sets the disliked flag on the live player and
    /// advances to the next track. A dislike replaces any earlier like of
    /// the same thing.
    Dislike {
        /// What the dislike applies to
        #[arg(value_enum)]
        target: Target,
    },

    /// List all non-system playlists known to the player
    Playlists,

    /// Start playing a playlist by name
    Playlist {
        /// Name of the playlist to start
        name: String,
    },

    /// Play a single track by its library id
    PlayTrack {
        /// Library-assigned track id
        id: i64,
    },

    /// Scan a playlist for this week's new tracks and curate them into the
    /// weekly playlist
    ///
    /// Tracks added to the library during the target ISO week are copied
    /// into a playlist named "New songs {week} - {year}" unless the song,
    /// its artist, or its genre is disliked (an explicitly liked artist
    /// overrides a genre dislike). Tracks already in the destination are
    /// never copied twice.
    Scan {
        /// Source playlist to scan
        source: String,

        /// ISO week number to treat as "new" (defaults to the current week)
        #[arg(long)]
        week: Option<u32>,

        /// ISO year the week belongs to (defaults to the current year)
        #[arg(long)]
        year: Option<i32>,
    },

    /// Manage the status poll daemon
    ///
    /// The daemon polls the player once per second and prints a now-playing
    /// position line, standing in for the menu-bar title refresh.
    Daemon {
        #[command(subcommand)]
        action: DaemonAction,
    },

    /// Generate shell completions
    ///
    /// Usage: musicbar completion bash > ~/.local/share/bash-completion/completions/musicbar
    Completion {
        /// Shell to generate completions for
        shell: Shell,
    },

    /// List playlist names for completion (hidden command)
    #[command(hide = true)]
    CompletePlaylists,
}

/// Daemon management actions
#[derive(Subcommand, Debug)]
pub enum DaemonAction {
    /// Start the status poll daemon
    Start,

    /// Stop the running daemon
    Stop,

    /// Check daemon status
    Status,
}
