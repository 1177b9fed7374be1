//! # Control Channel to the Music Application
//!
//! This module owns the inter-process bridge to the native player. Every
//! interaction with Apple Music is one of a fixed set of AppleScript command
//! templates, rendered with positional arguments, wrapped in a
//! `tell application "Music" ... end tell` block and executed through the
//! `osascript` binary. Responses are plain trimmed text; the player's null is
//! the literal string `missing value`.
//!
//! ## Design Decision: osascript vs ScriptingBridge
//!
//! Shelling out to `osascript` keeps the integration to a single external
//! binary that ships with macOS:
//! - No Objective-C bridging or framework linkage
//! - Clear error messages on stderr when a command is rejected
//! - Every command is observable in debug logs as the exact script sent
//!
//! ## Testability
//!
//! Everything above this module talks to the player through the
//! [`ControlChannel`] trait (command + arguments in, text out), so the
//! library view, the scanner and the daemon can all run against a scripted
//! in-memory player in tests. [`Osascript`] is the only implementation that
//! touches a live process.

use anyhow::{Context, Result};
use log::debug;
use std::process::Command;

/// The player's textual null, returned for fields that currently have no
/// value (e.g. `player position` while stopped).
pub const MISSING_VALUE: &str = "missing value";

/// Fixed command templates understood by the Music application's scripting
/// interface. Positional `{}` placeholders are substituted in order before
/// execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayerCommand {
    /// Toggle between playing and paused.
    PlayPause,
    /// Advance to the next track.
    NextTrack,
    /// Return to the previous track.
    PreviousTrack,
    /// Stop playback entirely.
    Stop,
    /// Whether the player state is `playing` (`true`/`false`).
    IsPlaying,
    /// Elapsed position of the current track in seconds, or `missing value`.
    PlayerPosition,
    /// Tab-separated descriptor line for the current track.
    CurrentTrack,
    /// Set the loved flag of the current track. Argument: `true`/`false`.
    SetTrackLoved,
    /// Set the disliked flag of the current track. Argument: `true`/`false`.
    SetTrackDisliked,
    /// Start playing a playlist by name. Argument: playlist name.
    StartPlaylist,
    /// Play a single track by its library id. Argument: id.
    PlayTrackById,
    /// Names of all user playlists (excludes system-generated ones).
    UserPlaylists,
    /// Create a new, empty user playlist. Argument: name.
    MakePlaylist,
    /// One tab-separated descriptor line per track of a playlist.
    /// Argument: playlist name.
    PlaylistTracks,
    /// Copy a track into a playlist. Arguments: track id, playlist name.
    DuplicateTrackToPlaylist,
    /// Quit the player application.
    Quit,
}

impl PlayerCommand {
    /// The AppleScript body for this command. Multi-line bodies are complete
    /// statements; single-line bodies are bare expressions whose value
    /// osascript prints.
    ///
    /// Track descriptor lines share one field order everywhere:
    /// `database ID`, `name`, `artist`, `genre`, `date added` (YYYY-MM-DD),
    /// `loved`, `disliked`, separated by tabs.
    fn template(self) -> &'static str {
        match self {
            Self::PlayPause => "playpause",
            Self::NextTrack => "play next track",
            Self::PreviousTrack => "play previous track",
            Self::Stop => "stop",
            Self::IsPlaying => "get player state is playing",
            Self::PlayerPosition => "player position",
            Self::CurrentTrack => {
                "set t to current track\n\
                 set d to date added of t\n\
                 set m to text -2 thru -1 of (\"0\" & ((month of d) as integer))\n\
                 set dy to text -2 thru -1 of (\"0\" & (day of d))\n\
                 ((database ID of t) as string) & tab & (name of t) & tab & (artist of t) \
                 & tab & (genre of t) & tab & ((year of d) as string) & \"-\" & m & \"-\" & dy \
                 & tab & ((loved of t) as string) & tab & ((disliked of t) as string)"
            }
            Self::SetTrackLoved => "set loved of current track to {}",
            Self::SetTrackDisliked => "set disliked of current track to {}",
            Self::StartPlaylist => "play playlist \"{}\"",
            Self::PlayTrackById => "play (some track whose database ID is {})",
            Self::UserPlaylists => "get name of every user playlist whose special kind is none",
            Self::MakePlaylist => "make new user playlist with properties {{name:\"{}\"}}",
            Self::PlaylistTracks => {
                "set out to \"\"\n\
                 repeat with t in (every track of playlist \"{}\")\n\
                 set d to date added of t\n\
                 set m to text -2 thru -1 of (\"0\" & ((month of d) as integer))\n\
                 set dy to text -2 thru -1 of (\"0\" & (day of d))\n\
                 set out to out & ((database ID of t) as string) & tab & (name of t) & tab \
                 & (artist of t) & tab & (genre of t) & tab & ((year of d) as string) & \"-\" \
                 & m & \"-\" & dy & tab & ((loved of t) as string) & tab \
                 & ((disliked of t) as string) & linefeed\n\
                 end repeat\n\
                 out"
            }
            Self::DuplicateTrackToPlaylist => {
                "duplicate (some track whose database ID is {}) to playlist \"{}\""
            }
            Self::Quit => "quit",
        }
    }
}

/// Substitute positional `{}` placeholders in order. `{{` and `}}` escape
/// literal braces, mirroring the template syntax of the scripting table.
fn render(template: &str, args: &[&str]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    let mut next_arg = 0;
    while let Some(pos) = rest.find('{') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        if rest.starts_with("{{") {
            out.push('{');
            rest = &rest[2..];
        } else if rest.starts_with("{}") {
            out.push_str(args.get(next_arg).copied().unwrap_or(""));
            next_arg += 1;
            rest = &rest[2..];
        } else {
            out.push('{');
            rest = &rest[1..];
        }
    }
    out.push_str(&rest.replace("}}", "}"));
    out
}

/// Capability interface to the native player: one command with positional
/// arguments in, one trimmed text response out.
///
/// Implementations are free to be a live process bridge ([`Osascript`]) or a
/// scripted fake; callers must not assume anything beyond the textual
/// contract.
pub trait ControlChannel {
    /// Execute one command and return the player's trimmed text response.
    ///
    /// # Errors
    ///
    /// Returns an error if the command could not be delivered or the player
    /// rejected it.
    fn run(&self, command: PlayerCommand, args: &[&str]) -> Result<String>;
}

/// Live control channel backed by the `osascript` binary.
#[derive(Debug, Clone)]
pub struct Osascript {
    /// Name of the application to script, normally "Music".
    app: String,
}

impl Osascript {
    #[must_use]
    pub fn new(app: impl Into<String>) -> Self {
        Self { app: app.into() }
    }
}

impl ControlChannel for Osascript {
    fn run(&self, command: PlayerCommand, args: &[&str]) -> Result<String> {
        let script = format!(
            "tell application \"{}\"\n{}\nend tell",
            self.app,
            render(command.template(), args)
        );
        debug!("Running player command {command:?}: {script}");

        let output = Command::new("osascript")
            .arg("-e")
            .arg(&script)
            .output()
            .context("Failed to execute osascript. Musicbar requires a macOS host")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "Player rejected command {:?}: {}",
                command,
                stderr.trim()
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// Map the player's textual null (and empty responses) to `None`.
#[must_use]
pub fn non_missing(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed == MISSING_VALUE {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Parse the player's boolean rendering. Anything other than `true` counts
/// as false, matching how the scripting interface prints flags.
#[must_use]
pub fn parse_flag(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

/// Format a position in seconds as `MM:SS` for status display.
#[must_use]
pub fn format_position(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}
