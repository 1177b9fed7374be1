//! Typed operations over the player control channel.
//!
//! The channel speaks plain text; this module turns that text into tracks,
//! playlist listings and playback state, and turns user intents back into
//! commands. Malformed rows are logged and skipped rather than failing the
//! whole operation.

use crate::player::{self, ControlChannel, PlayerCommand};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use log::{debug, info, warn};

/// One track as reported by the player.
///
/// `artist` and `genre` are `None` for untagged tracks; they never collapse
/// into a sentinel empty-name category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    /// Library-assigned numeric id.
    pub library_id: i64,
    pub name: String,
    pub artist: Option<String>,
    pub genre: Option<String>,
    /// When the track entered the library, player-local date.
    pub date_added: NaiveDate,
    /// Loved flag as currently set in the player.
    pub loved: bool,
    /// Disliked flag as currently set in the player.
    pub disliked: bool,
}

impl Track {
    /// Identity used for duplicate detection across playlists.
    #[must_use]
    pub fn identity(&self) -> (String, Option<String>) {
        (self.name.clone(), self.artist.clone())
    }
}

/// Parse one tab-separated track descriptor line as emitted by the
/// [`PlayerCommand::PlaylistTracks`] and [`PlayerCommand::CurrentTrack`]
/// scripts: id, name, artist, genre, date added, loved, disliked.
fn parse_track_line(line: &str) -> Result<Track> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() != 7 {
        anyhow::bail!(
            "Malformed track line (expected 7 fields, got {}): {line:?}",
            fields.len()
        );
    }

    let library_id: i64 = fields[0]
        .trim()
        .parse()
        .with_context(|| format!("Invalid track id in line: {line:?}"))?;
    let date_added = NaiveDate::parse_from_str(fields[4].trim(), "%Y-%m-%d")
        .with_context(|| format!("Invalid date added in line: {line:?}"))?;

    Ok(Track {
        library_id,
        name: fields[1].trim().to_string(),
        artist: player::non_missing(fields[2]),
        genre: player::non_missing(fields[3]),
        date_added,
        loved: player::parse_flag(fields[5]),
        disliked: player::parse_flag(fields[6]),
    })
}

/// Whether the player is currently playing.
pub fn is_playing(channel: &dyn ControlChannel) -> Result<bool> {
    let state = channel.run(PlayerCommand::IsPlaying, &[])?;
    Ok(player::parse_flag(&state))
}

/// Elapsed position of the current track in seconds, `None` when nothing is
/// playing (the player answers `missing value`).
pub fn player_position(channel: &dyn ControlChannel) -> Result<Option<f64>> {
    let raw = channel.run(PlayerCommand::PlayerPosition, &[])?;
    match player::non_missing(&raw) {
        Some(text) => {
            let seconds: f64 = text
                .parse()
                .with_context(|| format!("Unparseable player position: {text:?}"))?;
            Ok(Some(seconds))
        }
        None => Ok(None),
    }
}

/// The current track, or `None` when the player is stopped.
///
/// The stopped check comes first: asking a stopped player for its current
/// track is a scripting error, not a `missing value`.
pub fn current_track(channel: &dyn ControlChannel) -> Result<Option<Track>> {
    if !is_playing(channel)? {
        return Ok(None);
    }

    let line = channel.run(PlayerCommand::CurrentTrack, &[])?;
    if line.is_empty() {
        return Ok(None);
    }
    parse_track_line(&line).map(Some)
}

pub fn play_pause(channel: &dyn ControlChannel) -> Result<()> {
    channel.run(PlayerCommand::PlayPause, &[]).map(|_| ())
}

pub fn next_track(channel: &dyn ControlChannel) -> Result<()> {
    channel.run(PlayerCommand::NextTrack, &[]).map(|_| ())
}

pub fn previous_track(channel: &dyn ControlChannel) -> Result<()> {
    channel.run(PlayerCommand::PreviousTrack, &[]).map(|_| ())
}

pub fn stop(channel: &dyn ControlChannel) -> Result<()> {
    channel.run(PlayerCommand::Stop, &[]).map(|_| ())
}

/// Start playing a playlist by name.
pub fn start_playlist(channel: &dyn ControlChannel, name: &str) -> Result<()> {
    info!("Starting playlist: {name}");
    channel.run(PlayerCommand::StartPlaylist, &[name]).map(|_| ())
}

/// Play a single track by its library id.
pub fn play_track_by_id(channel: &dyn ControlChannel, library_id: i64) -> Result<()> {
    info!("Playing track {library_id}");
    channel
        .run(PlayerCommand::PlayTrackById, &[&library_id.to_string()])
        .map(|_| ())
}

/// Quit the player application.
pub fn quit(channel: &dyn ControlChannel) -> Result<()> {
    channel.run(PlayerCommand::Quit, &[]).map(|_| ())
}

/// Mirror a loved/unloved decision onto the live player.
pub fn set_current_loved(channel: &dyn ControlChannel, loved: bool) -> Result<()> {
    let flag = if loved { "true" } else { "false" };
    channel.run(PlayerCommand::SetTrackLoved, &[flag]).map(|_| ())
}

/// Mirror a disliked/undisliked decision onto the live player.
pub fn set_current_disliked(channel: &dyn ControlChannel, disliked: bool) -> Result<()> {
    let flag = if disliked { "true" } else { "false" };
    channel
        .run(PlayerCommand::SetTrackDisliked, &[flag])
        .map(|_| ())
}

/// Names of all non-system playlists.
///
/// The scripting interface renders name lists as `", "`-joined text; names
/// containing that exact sequence cannot be told apart. Track enumeration is
/// immune, it uses one line per track.
pub fn user_playlists(channel: &dyn ControlChannel) -> Result<Vec<String>> {
    let raw = channel.run(PlayerCommand::UserPlaylists, &[])?;
    if raw.is_empty() || raw == player::MISSING_VALUE {
        return Ok(Vec::new());
    }
    Ok(raw.split(", ").map(str::to_string).collect())
}

/// Create a new empty user playlist.
pub fn create_playlist(channel: &dyn ControlChannel, name: &str) -> Result<()> {
    info!("Creating playlist: {name}");
    channel.run(PlayerCommand::MakePlaylist, &[name]).map(|_| ())
}

/// All tracks of a playlist. Rows the player mangles (it happens with
/// characters the scripting bridge refuses to coerce) are skipped with a
/// warning instead of failing the enumeration.
pub fn playlist_tracks(channel: &dyn ControlChannel, name: &str) -> Result<Vec<Track>> {
    let raw = channel.run(PlayerCommand::PlaylistTracks, &[name])?;

    let mut tracks = Vec::new();
    for line in raw.lines().filter(|l| !l.trim().is_empty()) {
        match parse_track_line(line) {
            Ok(track) => tracks.push(track),
            Err(e) => warn!("Skipping unreadable track row in \"{name}\": {e}"),
        }
    }

    debug!("Playlist \"{name}\" holds {} readable tracks", tracks.len());
    Ok(tracks)
}

/// Copy a track into a playlist by its library id.
pub fn duplicate_into_playlist(
    channel: &dyn ControlChannel,
    library_id: i64,
    playlist: &str,
) -> Result<()> {
    debug!("Duplicating track {library_id} into \"{playlist}\"");
    channel
        .run(
            PlayerCommand::DuplicateTrackToPlaylist,
            &[&library_id.to_string(), playlist],
        )
        .map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::collections::HashMap;

    /// Channel fake answering from a canned command table.
    struct Scripted {
        responses: HashMap<PlayerCommand, String>,
    }

    impl Scripted {
        fn new(entries: &[(PlayerCommand, &str)]) -> Self {
            Self {
                responses: entries
                    .iter()
                    .map(|(c, r)| (*c, (*r).to_string()))
                    .collect(),
            }
        }
    }

    impl ControlChannel for Scripted {
        fn run(&self, command: PlayerCommand, _args: &[&str]) -> Result<String> {
            self.responses
                .get(&command)
                .cloned()
                .ok_or_else(|| anyhow!("Unscripted command: {command:?}"))
        }
    }

    #[test]
    fn test_parse_track_line_full() {
        let track =
            parse_track_line("4711\tPaint It Black\tThe Rolling Stones\tRock\t2024-01-15\ttrue\tfalse")
                .unwrap();
        assert_eq!(track.library_id, 4711);
        assert_eq!(track.name, "Paint It Black");
        assert_eq!(track.artist.as_deref(), Some("The Rolling Stones"));
        assert_eq!(track.genre.as_deref(), Some("Rock"));
        assert_eq!(
            track.date_added,
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
        );
        assert!(track.loved);
        assert!(!track.disliked);
    }

    #[test]
    fn test_parse_track_line_untagged() {
        let track =
            parse_track_line("7\tfield recording\tmissing value\tmissing value\t2023-11-02\tfalse\tfalse")
                .unwrap();
        assert_eq!(track.artist, None);
        assert_eq!(track.genre, None);
    }

    #[test]
    fn test_parse_track_line_rejects_short_rows() {
        assert!(parse_track_line("1\tonly\tthree").is_err());
        assert!(parse_track_line("").is_err());
    }

    #[test]
    fn test_parse_track_line_rejects_bad_date() {
        let result = parse_track_line("1\tA\tB\tC\tJanuary 15\tfalse\tfalse");
        assert!(result.is_err());
    }

    #[test]
    fn test_playlist_tracks_skips_mangled_rows() {
        let channel = Scripted::new(&[(
            PlayerCommand::PlaylistTracks,
            "1\tGood\tArtist\tRock\t2024-01-15\tfalse\tfalse\n\
             garbage row\n\
             2\tAlso Good\tArtist\tRock\t2024-01-16\ttrue\tfalse",
        )]);

        let tracks = playlist_tracks(&channel, "Library").unwrap();
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].name, "Good");
        assert_eq!(tracks[1].name, "Also Good");
    }

    #[test]
    fn test_user_playlists_splits_names() {
        let channel = Scripted::new(&[(
            PlayerCommand::UserPlaylists,
            "Library, Favourites, New songs 3 - 2024",
        )]);
        let playlists = user_playlists(&channel).unwrap();
        assert_eq!(
            playlists,
            vec!["Library", "Favourites", "New songs 3 - 2024"]
        );
    }

    #[test]
    fn test_user_playlists_empty_answer() {
        let channel = Scripted::new(&[(PlayerCommand::UserPlaylists, "")]);
        assert!(user_playlists(&channel).unwrap().is_empty());

        let channel = Scripted::new(&[(PlayerCommand::UserPlaylists, "missing value")]);
        assert!(user_playlists(&channel).unwrap().is_empty());
    }

    #[test]
    fn test_player_position_missing_value() {
        let channel = Scripted::new(&[(PlayerCommand::PlayerPosition, "missing value")]);
        assert_eq!(player_position(&channel).unwrap(), None);

        let channel = Scripted::new(&[(PlayerCommand::PlayerPosition, "83.512")]);
        assert_eq!(player_position(&channel).unwrap(), Some(83.512));
    }

    #[test]
    fn test_current_track_when_stopped() {
        let channel = Scripted::new(&[(PlayerCommand::IsPlaying, "false")]);
        assert_eq!(current_track(&channel).unwrap(), None);
    }

    #[test]
    fn test_current_track_when_playing() {
        let channel = Scripted::new(&[
            (PlayerCommand::IsPlaying, "true"),
            (
                PlayerCommand::CurrentTrack,
                "99\tKids\tMGMT\tIndie\t2024-06-03\tfalse\tfalse",
            ),
        ]);
        let track = current_track(&channel).unwrap().unwrap();
        assert_eq!(track.library_id, 99);
        assert_eq!(track.artist.as_deref(), Some("MGMT"));
    }
}
