//! # Preference Store
//!
//! SQLite-backed store for the user's taste: one row per observed genre,
//! artist and song, each carrying a single tri-state [`Preference`]. Rows are
//! created lazily on first observation (get-or-create) and updated in place;
//! nothing is ever deleted.
//!
//! The connection is opened by the caller and passed into every operation.
//! There is no global store handle.

use crate::library::Track;
use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use log::debug;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// Tri-state taste marker. One value per row makes the liked-and-disliked
/// combination unrepresentable, and every write replaces the whole state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Preference {
    #[default]
    Neutral,
    Liked,
    Disliked,
}

impl Preference {
    #[must_use]
    pub fn is_liked(self) -> bool {
        self == Self::Liked
    }

    #[must_use]
    pub fn is_disliked(self) -> bool {
        self == Self::Disliked
    }

    /// Seed a preference from the player's loved/disliked flags on first
    /// sight of a track. Disliked wins when both are set, matching the
    /// exclusion precedence everywhere else.
    #[must_use]
    pub fn from_flags(loved: bool, disliked: bool) -> Self {
        if disliked {
            Self::Disliked
        } else if loved {
            Self::Liked
        } else {
            Self::Neutral
        }
    }

    fn to_sql(self) -> i64 {
        match self {
            Self::Neutral => 0,
            Self::Liked => 1,
            Self::Disliked => 2,
        }
    }

    fn from_sql(value: i64) -> Self {
        match value {
            1 => Self::Liked,
            2 => Self::Disliked,
            _ => Self::Neutral,
        }
    }
}

/// A named category row (genres and artists share this shape).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub preference: Preference,
}

/// A song row. `artist_id`/`genre_id` stay `NULL` for untagged tracks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Song {
    pub id: i64,
    /// Library-assigned id in the player, used to address the track over the
    /// control channel.
    pub library_id: i64,
    pub name: String,
    pub artist_id: Option<i64>,
    pub genre_id: Option<i64>,
    pub date_added: NaiveDate,
    pub date_last_played: Option<NaiveDate>,
    pub preference: Preference,
}

/// Open the store at `path`, creating the schema if absent.
pub fn open(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open preference store at {}", path.display()))?;
    init_schema(&conn)?;
    Ok(conn)
}

/// In-memory store, used by tests.
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory().context("Failed to open in-memory store")?;
    init_schema(&conn)?;
    Ok(conn)
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS genres (
            id         INTEGER PRIMARY KEY,
            name       TEXT NOT NULL UNIQUE,
            preference INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS artists (
            id         INTEGER PRIMARY KEY,
            name       TEXT NOT NULL UNIQUE,
            preference INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS songs (
            id               INTEGER PRIMARY KEY,
            library_id       INTEGER NOT NULL,
            name             TEXT NOT NULL,
            artist_id        INTEGER REFERENCES artists(id),
            genre_id         INTEGER REFERENCES genres(id),
            date_added       TEXT NOT NULL,
            date_last_played TEXT,
            preference       INTEGER NOT NULL DEFAULT 0,
            updated_at       TEXT NOT NULL,
            UNIQUE(name, artist_id)
        );
        CREATE INDEX IF NOT EXISTS idx_songs_library_id ON songs(library_id);",
    )
    .context("Failed to create preference store schema")?;
    Ok(())
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

fn get_or_create_category(conn: &Connection, table: &str, name: &str) -> Result<Category> {
    let existing = conn
        .query_row(
            &format!("SELECT id, name, preference FROM {table} WHERE name = ?1"),
            [name],
            |row| {
                Ok(Category {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    preference: Preference::from_sql(row.get(2)?),
                })
            },
        )
        .optional()
        .with_context(|| format!("Failed to look up {table} row for {name:?}"))?;

    if let Some(category) = existing {
        return Ok(category);
    }

    conn.execute(
        &format!("INSERT INTO {table} (name, preference, updated_at) VALUES (?1, 0, ?2)"),
        params![name, now()],
    )
    .with_context(|| format!("Failed to create {table} row for {name:?}"))?;

    debug!("Created {table} row for {name:?}");
    Ok(Category {
        id: conn.last_insert_rowid(),
        name: name.to_string(),
        preference: Preference::Neutral,
    })
}

/// Look up a genre by name, creating a neutral row on miss. Idempotent.
pub fn get_or_create_genre(conn: &Connection, name: &str) -> Result<Category> {
    get_or_create_category(conn, "genres", name)
}

/// Look up an artist by name, creating a neutral row on miss. Idempotent.
pub fn get_or_create_artist(conn: &Connection, name: &str) -> Result<Category> {
    get_or_create_category(conn, "artists", name)
}

/// Look up a song by (name, artist) identity, creating it on miss.
///
/// On creation the preference is seeded from the live loved/disliked flags
/// the player reported, and `date_added` is taken from the player's record.
/// Idempotent: a second call with the same identity returns the stored row
/// unchanged, whatever the live flags say by then.
pub fn get_or_create_song(
    conn: &Connection,
    track: &Track,
    artist_id: Option<i64>,
    genre_id: Option<i64>,
) -> Result<Song> {
    let existing = conn
        .query_row(
            "SELECT id, library_id, name, artist_id, genre_id, date_added,
                    date_last_played, preference
             FROM songs WHERE name = ?1 AND artist_id IS ?2",
            params![track.name, artist_id],
            song_from_row,
        )
        .optional()
        .with_context(|| format!("Failed to look up song row for {:?}", track.name))?;

    if let Some(song) = existing {
        return Ok(song);
    }

    let preference = Preference::from_flags(track.loved, track.disliked);
    conn.execute(
        "INSERT INTO songs (library_id, name, artist_id, genre_id, date_added,
                            date_last_played, preference, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, NULL, ?6, ?7)",
        params![
            track.library_id,
            track.name,
            artist_id,
            genre_id,
            track.date_added.format("%Y-%m-%d").to_string(),
            preference.to_sql(),
            now(),
        ],
    )
    .with_context(|| format!("Failed to create song row for {:?}", track.name))?;

    debug!("Created song row for {:?}", track.name);
    Ok(Song {
        id: conn.last_insert_rowid(),
        library_id: track.library_id,
        name: track.name.clone(),
        artist_id,
        genre_id,
        date_added: track.date_added,
        date_last_played: None,
        preference,
    })
}

fn song_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Song> {
    let date_added: String = row.get(5)?;
    let date_last_played: Option<String> = row.get(6)?;
    Ok(Song {
        id: row.get(0)?,
        library_id: row.get(1)?,
        name: row.get(2)?,
        artist_id: row.get(3)?,
        genre_id: row.get(4)?,
        date_added: NaiveDate::parse_from_str(&date_added, "%Y-%m-%d").map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?,
        date_last_played: date_last_played
            .map(|d| {
                NaiveDate::parse_from_str(&d, "%Y-%m-%d").map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        6,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })
            })
            .transpose()?,
        preference: Preference::from_sql(row.get(7)?),
    })
}

fn set_category_preference(
    conn: &Connection,
    table: &str,
    id: i64,
    preference: Preference,
) -> Result<()> {
    let changed = conn
        .execute(
            &format!("UPDATE {table} SET preference = ?1, updated_at = ?2 WHERE id = ?3"),
            params![preference.to_sql(), now(), id],
        )
        .with_context(|| format!("Failed to update {table} preference for row {id}"))?;
    if changed == 0 {
        anyhow::bail!("No {table} row with id {id}");
    }
    Ok(())
}

pub fn set_genre_preference(conn: &Connection, id: i64, preference: Preference) -> Result<()> {
    set_category_preference(conn, "genres", id, preference)
}

pub fn set_artist_preference(conn: &Connection, id: i64, preference: Preference) -> Result<()> {
    set_category_preference(conn, "artists", id, preference)
}

pub fn set_song_preference(conn: &Connection, id: i64, preference: Preference) -> Result<()> {
    let changed = conn
        .execute(
            "UPDATE songs SET preference = ?1, updated_at = ?2 WHERE id = ?3",
            params![preference.to_sql(), now(), id],
        )
        .with_context(|| format!("Failed to update song preference for row {id}"))?;
    if changed == 0 {
        anyhow::bail!("No song row with id {id}");
    }
    Ok(())
}
