//! # Weekly Playlist Scanner
//!
//! The one piece of real logic in Musicbar: walk a source playlist, record
//! every track in the preference store, and copy the week's new arrivals
//! into a destination playlist unless the user's taste excludes them.
//!
//! ## Classification
//!
//! Preferences form a hierarchy: song over artist over genre. A track is
//! excluded when the song itself is disliked, when its artist is disliked,
//! or when its genre is disliked and the artist is not explicitly liked.
//! An artist-level like overrides a genre-level dislike; nothing overrides a
//! disliked song or artist.
//!
//! ## Result shape
//!
//! The scan's entire user-visible result is one summary string. A missing
//! destination that also fails to create is reported inside that string,
//! never as an error; genuine channel or store failures still propagate.

use crate::db::{self, Preference};
use crate::library::{self, Track};
use crate::player::ControlChannel;
use anyhow::Result;
use chrono::{Datelike, NaiveDate};
use log::{debug, info};
use rusqlite::Connection;
use std::collections::HashSet;
use std::fmt;

/// ISO-week grouping key: ISO year x 100 + ISO week number. The Monday of
/// ISO week 3 of 2024 maps to 202403; the Sunday before it to 202402.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WeekYear(i32);

impl WeekYear {
    #[must_use]
    pub const fn new(year: i32, week: u32) -> Self {
        Self(year * 100 + week as i32)
    }

    /// Key of the ISO week containing `date`. Note the ISO year, not the
    /// calendar year: early January can belong to the previous ISO year.
    #[must_use]
    pub fn of(date: NaiveDate) -> Self {
        let iso = date.iso_week();
        Self::new(iso.year(), iso.week())
    }

    #[must_use]
    pub const fn year(self) -> i32 {
        self.0 / 100
    }

    #[must_use]
    pub const fn week(self) -> u32 {
        (self.0 % 100) as u32
    }

    /// Destination name for this week's generated playlist.
    #[must_use]
    pub fn playlist_name(self) -> String {
        format!("New songs {} - {}", self.week(), self.year())
    }
}

impl fmt::Display for WeekYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of classifying one track against the preference hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Include,
    SongDisliked,
    ArtistDisliked,
    GenreDisliked,
}

impl Verdict {
    #[must_use]
    pub fn is_excluded(self) -> bool {
        self != Self::Include
    }
}

/// Exclusion policy, evaluated in precedence order: song dislike, then
/// artist dislike, then genre dislike unless the artist is explicitly liked.
#[must_use]
pub fn classify(song: Preference, artist: Preference, genre: Preference) -> Verdict {
    if song.is_disliked() {
        Verdict::SongDisliked
    } else if artist.is_disliked() {
        Verdict::ArtistDisliked
    } else if genre.is_disliked() && !artist.is_liked() {
        Verdict::GenreDisliked
    } else {
        Verdict::Include
    }
}

/// Counters for one scan run. Invariant:
/// `processed == added + excluded + already_present`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanReport {
    /// Tracks whose recorded date-added fell in the target week.
    pub processed: u32,
    /// New tracks copied into the destination.
    pub added: u32,
    /// New tracks the preference hierarchy kept out.
    pub excluded: u32,
    /// New tracks the destination already contained.
    pub already_present: u32,
}

impl fmt::Display for ScanReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "processed {} new tracks: {} added, {} excluded, {} already present",
            self.processed, self.added, self.excluded, self.already_present
        )
    }
}

/// Structured result of a scan, rendered to the user as a single line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    Completed {
        destination: String,
        report: ScanReport,
    },
    /// The destination neither existed nor could be created. Carries the
    /// user-facing explanation; deliberately not an error.
    DestinationUnavailable {
        destination: String,
        reason: String,
    },
}

impl fmt::Display for ScanOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed {
                destination,
                report,
            } => write!(f, "Playlist \"{destination}\": {report}"),
            Self::DestinationUnavailable {
                destination,
                reason,
            } => write!(
                f,
                "Playlist \"{destination}\" was not found and could not be created: {reason}"
            ),
        }
    }
}

/// Scan `source` for tracks added in `week` and copy the keepers into the
/// week's generated playlist (`New songs {week} - {year}`).
pub fn scan_week(
    conn: &Connection,
    channel: &dyn ControlChannel,
    source: &str,
    week: WeekYear,
) -> Result<String> {
    scan_into_playlist(conn, channel, source, &week.playlist_name(), week)
}

/// Scan `source` into an explicit destination. Returns the summary string;
/// see [`scan`] for the structured form.
pub fn scan_into_playlist(
    conn: &Connection,
    channel: &dyn ControlChannel,
    source: &str,
    destination: &str,
    week: WeekYear,
) -> Result<String> {
    Ok(scan(conn, channel, source, destination, week)?.to_string())
}

/// Structured scan entry point.
pub fn scan(
    conn: &Connection,
    channel: &dyn ControlChannel,
    source: &str,
    destination: &str,
    week: WeekYear,
) -> Result<ScanOutcome> {
    info!("Scanning \"{source}\" into \"{destination}\" for week {week}");

    let playlists = library::user_playlists(channel)?;
    let existed = playlists.iter().any(|name| name == destination);

    if !existed {
        if let Err(e) = library::create_playlist(channel, destination) {
            info!("Destination \"{destination}\" unavailable: {e:#}");
            return Ok(ScanOutcome::DestinationUnavailable {
                destination: destination.to_string(),
                reason: format!("{e:#}"),
            });
        }
    }

    // Preload the destination's current contents so re-scans never copy a
    // track twice. A freshly created destination is empty by definition.
    let mut present: HashSet<(String, Option<String>)> = if existed {
        library::playlist_tracks(channel, destination)?
            .iter()
            .map(Track::identity)
            .collect()
    } else {
        HashSet::new()
    };

    let mut report = ScanReport::default();
    for track in library::playlist_tracks(channel, source)? {
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
        let song = db::get_or_create_song(
            conn,
            &track,
            artist.as_ref().map(|a| a.id),
            genre.as_ref().map(|g| g.id),
        )?;

        // "New" is decided by the stored record, not the live listing.
        if WeekYear::of(song.date_added) != week {
            continue;
        }
        report.processed += 1;

        let verdict = classify(
            song.preference,
            artist.as_ref().map(|a| a.preference).unwrap_or_default(),
            genre.as_ref().map(|g| g.preference).unwrap_or_default(),
        );
        if verdict.is_excluded() {
            debug!("Excluding {:?}: {verdict:?}", track.name);
            report.excluded += 1;
            continue;
        }

        let identity = track.identity();
        if present.contains(&identity) {
            report.already_present += 1;
            continue;
        }

        library::duplicate_into_playlist(channel, track.library_id, destination)?;
        present.insert(identity);
        report.added += 1;
    }

    info!("Scan of \"{source}\" finished: {report}");
    Ok(ScanOutcome::Completed {
        destination: destination.to_string(),
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::PlayerCommand;
    use anyhow::bail;
    use std::cell::RefCell;
    use std::collections::BTreeMap;

    /// In-memory player speaking the channel's text protocol.
    struct FakePlayer {
        playlists: RefCell<BTreeMap<String, Vec<Track>>>,
        fail_create: bool,
    }

    impl FakePlayer {
        fn new() -> Self {
            Self {
                playlists: RefCell::new(BTreeMap::new()),
                fail_create: false,
            }
        }

        fn refusing_creation() -> Self {
            Self {
                fail_create: true,
                ..Self::new()
            }
        }

        fn with_playlist(self, name: &str, tracks: Vec<Track>) -> Self {
            self.playlists.borrow_mut().insert(name.to_string(), tracks);
            self
        }

        fn tracks_of(&self, name: &str) -> Vec<Track> {
            self.playlists
                .borrow()
                .get(name)
                .cloned()
                .unwrap_or_default()
        }

        fn line(track: &Track) -> String {
            format!(
                "{}\t{}\t{}\t{}\t{}\t{}\t{}",
                track.library_id,
                track.name,
                track.artist.as_deref().unwrap_or("missing value"),
                track.genre.as_deref().unwrap_or("missing value"),
                track.date_added.format("%Y-%m-%d"),
                track.loved,
                track.disliked,
            )
        }
    }

    impl ControlChannel for FakePlayer {
        fn run(&self, command: PlayerCommand, args: &[&str]) -> Result<String> {
            match command {
                PlayerCommand::UserPlaylists => {
                    Ok(self
                        .playlists
                        .borrow()
                        .keys()
                        .cloned()
                        .collect::<Vec<_>>()
                        .join(", "))
                }
                PlayerCommand::MakePlaylist => {
                    if self.fail_create {
                        bail!("the player refused to create a playlist");
                    }
                    self.playlists
                        .borrow_mut()
                        .insert(args[0].to_string(), Vec::new());
                    Ok(String::new())
                }
                PlayerCommand::PlaylistTracks => {
                    let playlists = self.playlists.borrow();
                    let Some(tracks) = playlists.get(args[0]) else {
                        bail!("no playlist named {:?}", args[0]);
                    };
                    Ok(tracks.iter().map(Self::line).collect::<Vec<_>>().join("\n"))
                }
                PlayerCommand::DuplicateTrackToPlaylist => {
                    let id: i64 = args[0].parse().unwrap();
                    let mut playlists = self.playlists.borrow_mut();
                    let found = playlists
                        .values()
                        .flatten()
                        .find(|t| t.library_id == id)
                        .cloned();
                    let Some(track) = found else {
                        bail!("no track with id {id}");
                    };
                    let Some(dest) = playlists.get_mut(args[1]) else {
                        bail!("no playlist named {:?}", args[1]);
                    };
                    dest.push(track);
                    Ok(String::new())
                }
                other => bail!("unexpected command in scan: {other:?}"),
            }
        }
    }

    fn track(id: i64, name: &str, artist: &str, genre: &str, date: (i32, u32, u32)) -> Track {
        Track {
            library_id: id,
            name: name.to_string(),
            artist: Some(artist.to_string()),
            genre: Some(genre.to_string()),
            date_added: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            loved: false,
            disliked: false,
        }
    }

    const WEEK: WeekYear = WeekYear(202403);

    #[test]
    fn test_week_year_keys_follow_iso_weeks() {
        // Monday of ISO week 3 of 2024.
        let monday = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        assert_eq!(WeekYear::of(monday), WeekYear::new(2024, 3));
        assert_eq!(WeekYear::of(monday), WEEK);

        // The Sunday before still belongs to week 2.
        let sunday = NaiveDate::from_ymd_opt(2024, 1, 14).unwrap();
        assert_eq!(WeekYear::of(sunday), WeekYear::new(2024, 2));
    }

    #[test]
    fn test_week_year_iso_year_differs_from_calendar_year() {
        // 2023-01-01 is a Sunday inside ISO week 52 of 2022.
        let new_year = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        assert_eq!(WeekYear::of(new_year), WeekYear::new(2022, 52));
    }

    #[test]
    fn test_playlist_name_pattern() {
        assert_eq!(WeekYear::new(2024, 3).playlist_name(), "New songs 3 - 2024");
        assert_eq!(
            WeekYear::new(2025, 31).playlist_name(),
            "New songs 31 - 2025"
        );
    }

    #[test]
    fn test_classification_precedence() {
        use Preference::{Disliked, Liked, Neutral};

        assert!(classify(Neutral, Disliked, Neutral).is_excluded());
        assert!(!classify(Neutral, Liked, Disliked).is_excluded());
        assert!(!classify(Neutral, Neutral, Neutral).is_excluded());

        assert_eq!(classify(Disliked, Liked, Liked), Verdict::SongDisliked);
        assert_eq!(classify(Neutral, Disliked, Liked), Verdict::ArtistDisliked);
        assert_eq!(classify(Neutral, Neutral, Disliked), Verdict::GenreDisliked);
        assert_eq!(classify(Liked, Neutral, Disliked), Verdict::GenreDisliked);
        assert_eq!(classify(Liked, Neutral, Neutral), Verdict::Include);
    }

    #[test]
    fn test_scan_copies_new_tracks() {
        let conn = db::open_in_memory().unwrap();
        let player = FakePlayer::new().with_playlist(
            "Library",
            vec![
                track(1, "In Week", "A", "Rock", (2024, 1, 16)),
                track(2, "Out Of Week", "A", "Rock", (2024, 1, 10)),
            ],
        );

        let outcome = scan(&conn, &player, "Library", "Weekly", WEEK).unwrap();
        let ScanOutcome::Completed { report, .. } = outcome else {
            panic!("expected completed scan");
        };

        assert_eq!(report.processed, 1);
        assert_eq!(report.added, 1);
        assert_eq!(report.excluded, 0);
        assert_eq!(report.already_present, 0);

        let copied = player.tracks_of("Weekly");
        assert_eq!(copied.len(), 1);
        assert_eq!(copied[0].name, "In Week");
    }

    #[test]
    fn test_scan_applies_exclusion_precedence() {
        let conn = db::open_in_memory().unwrap();
        let bad_artist = db::get_or_create_artist(&conn, "Nickelback").unwrap();
        db::set_artist_preference(&conn, bad_artist.id, Preference::Disliked).unwrap();
        let bad_genre = db::get_or_create_genre(&conn, "Polka").unwrap();
        db::set_genre_preference(&conn, bad_genre.id, Preference::Disliked).unwrap();
        let saved_artist = db::get_or_create_artist(&conn, "Weird Al").unwrap();
        db::set_artist_preference(&conn, saved_artist.id, Preference::Liked).unwrap();

        let player = FakePlayer::new().with_playlist(
            "Library",
            vec![
                // Artist disliked: out.
                track(1, "Photograph", "Nickelback", "Rock", (2024, 1, 16)),
                // Genre disliked but artist liked: in.
                track(2, "Polka Face", "Weird Al", "Polka", (2024, 1, 16)),
                // Genre disliked, artist neutral: out.
                track(3, "Oompah", "Some Band", "Polka", (2024, 1, 16)),
                // Nothing marked: in.
                track(4, "Fine", "Some Band", "Rock", (2024, 1, 16)),
            ],
        );

        let outcome = scan(&conn, &player, "Library", "Weekly", WEEK).unwrap();
        let ScanOutcome::Completed { report, .. } = outcome else {
            panic!("expected completed scan");
        };

        assert_eq!(report.processed, 4);
        assert_eq!(report.added, 2);
        assert_eq!(report.excluded, 2);

        let names: Vec<String> = player
            .tracks_of("Weekly")
            .iter()
            .map(|t| t.name.clone())
            .collect();
        assert_eq!(names, vec!["Polka Face", "Fine"]);
    }

    #[test]
    fn test_scan_excludes_disliked_song() {
        let conn = db::open_in_memory().unwrap();
        let player = FakePlayer::new().with_playlist(
            "Library",
            vec![Track {
                disliked: true,
                ..track(1, "Hated", "A", "Rock", (2024, 1, 16))
            }],
        );

        let outcome = scan(&conn, &player, "Library", "Weekly", WEEK).unwrap();
        let ScanOutcome::Completed { report, .. } = outcome else {
            panic!("expected completed scan");
        };
        assert_eq!(report.excluded, 1);
        assert!(player.tracks_of("Weekly").is_empty());
    }

    #[test]
    fn test_rescan_adds_nothing() {
        let conn = db::open_in_memory().unwrap();
        let player = FakePlayer::new().with_playlist(
            "Library",
            vec![
                track(1, "One", "A", "Rock", (2024, 1, 16)),
                track(2, "Two", "B", "Rock", (2024, 1, 17)),
            ],
        );

        let first = scan(&conn, &player, "Library", "Weekly", WEEK).unwrap();
        let ScanOutcome::Completed { report, .. } = first else {
            panic!("expected completed scan");
        };
        assert_eq!(report.added, 2);

        let second = scan(&conn, &player, "Library", "Weekly", WEEK).unwrap();
        let ScanOutcome::Completed { report, .. } = second else {
            panic!("expected completed scan");
        };
        assert_eq!(report.added, 0);
        assert_eq!(report.already_present, 2);
        assert_eq!(player.tracks_of("Weekly").len(), 2);
    }

    #[test]
    fn test_counter_invariant_holds() {
        let conn = db::open_in_memory().unwrap();
        let bad_artist = db::get_or_create_artist(&conn, "Bad").unwrap();
        db::set_artist_preference(&conn, bad_artist.id, Preference::Disliked).unwrap();

        let existing = track(10, "Old Favourite", "Keep", "Rock", (2024, 1, 15));
        let player = FakePlayer::new()
            .with_playlist("Weekly", vec![existing.clone()])
            .with_playlist(
                "Library",
                vec![
                    existing,
                    track(11, "Fresh", "Keep", "Rock", (2024, 1, 16)),
                    track(12, "Dropped", "Bad", "Rock", (2024, 1, 17)),
                    track(13, "Stale", "Keep", "Rock", (2023, 12, 1)),
                ],
            );

        let outcome = scan(&conn, &player, "Library", "Weekly", WEEK).unwrap();
        let ScanOutcome::Completed { report, .. } = outcome else {
            panic!("expected completed scan");
        };

        assert_eq!(report.processed, 3);
        assert_eq!(report.added, 1);
        assert_eq!(report.excluded, 1);
        assert_eq!(report.already_present, 1);
        assert_eq!(
            report.processed,
            report.added + report.excluded + report.already_present
        );
    }

    #[test]
    fn test_untagged_tracks_classify_as_neutral() {
        let conn = db::open_in_memory().unwrap();
        let player = FakePlayer::new().with_playlist(
            "Library",
            vec![Track {
                artist: None,
                genre: None,
                ..track(1, "Untitled Demo", "", "", (2024, 1, 16))
            }],
        );

        let outcome = scan(&conn, &player, "Library", "Weekly", WEEK).unwrap();
        let ScanOutcome::Completed { report, .. } = outcome else {
            panic!("expected completed scan");
        };
        assert_eq!(report.added, 1);

        // No sentinel artist/genre rows were fabricated.
        let artists: i64 = conn
            .query_row("SELECT COUNT(*) FROM artists", [], |r| r.get(0))
            .unwrap();
        let genres: i64 = conn
            .query_row("SELECT COUNT(*) FROM genres", [], |r| r.get(0))
            .unwrap();
        assert_eq!(artists, 0);
        assert_eq!(genres, 0);
    }

    #[test]
    fn test_unavailable_destination_is_a_string_not_an_error() {
        let conn = db::open_in_memory().unwrap();
        let player = FakePlayer::refusing_creation()
            .with_playlist("Library", vec![track(1, "One", "A", "Rock", (2024, 1, 16))]);

        let outcome = scan(&conn, &player, "Library", "Weekly", WEEK).unwrap();
        assert!(matches!(
            outcome,
            ScanOutcome::DestinationUnavailable { .. }
        ));

        let summary = scan_into_playlist(&conn, &player, "Library", "Weekly", WEEK).unwrap();
        assert!(summary.contains("could not be created"));
        assert!(summary.contains("Weekly"));
    }

    #[test]
    fn test_missing_source_propagates_as_error() {
        let conn = db::open_in_memory().unwrap();
        let player = FakePlayer::new();
        // Destination gets created, then the source lookup fails.
        assert!(scan(&conn, &player, "Nope", "Weekly", WEEK).is_err());
    }

    #[test]
    fn test_scan_week_uses_generated_destination_name() {
        let conn = db::open_in_memory().unwrap();
        let player = FakePlayer::new().with_playlist(
            "Library",
            vec![track(1, "One", "A", "Rock", (2024, 1, 16))],
        );

        let summary = scan_week(&conn, &player, "Library", WEEK).unwrap();
        assert!(summary.contains("New songs 3 - 2024"));
        assert_eq!(player.tracks_of("New songs 3 - 2024").len(), 1);
    }

    #[test]
    fn test_report_display() {
        let report = ScanReport {
            processed: 5,
            added: 3,
            excluded: 1,
            already_present: 1,
        };
        assert_eq!(
            report.to_string(),
            "processed 5 new tracks: 3 added, 1 excluded, 1 already present"
        );
    }
}
