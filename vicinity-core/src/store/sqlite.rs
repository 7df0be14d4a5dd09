//! SQLite-backed POI store.
//!
//! POIs live in a `pois(id, lat, lng, category)` table with a composite index
//! on `(lat, lng)`. Queries hit the database on every call, so an outage
//! surfaces as a [`PoiStoreError`] rather than stale data.

use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Mutex,
};

use geo::Rect;
use rusqlite::{Connection, OpenFlags, params};
use thiserror::Error;

use crate::PointOfInterest;

use super::{PoiStore, PoiStoreError};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS pois (
        id INTEGER PRIMARY KEY,
        lat REAL NOT NULL,
        lng REAL NOT NULL,
        category TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS pois_lat_lng ON pois (lat, lng);
";

const BBOX_QUERY: &str = "SELECT id, lat, lng, category FROM pois \
     WHERE lat BETWEEN ?1 AND ?2 AND lng BETWEEN ?3 AND ?4 ORDER BY id";

/// Error raised when opening or writing a POI database.
#[derive(Debug, Error)]
pub enum SqlitePoiStoreError {
    /// Opening the SQLite database failed.
    #[error("failed to open SQLite database at {path}: {source}")]
    OpenDatabase {
        /// Location of the SQLite database on disk.
        path: PathBuf,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// The database exists but has no `pois` table.
    #[error("database at {path} has no `pois` table")]
    MissingTable {
        /// Location of the SQLite database on disk.
        path: PathBuf,
    },
    /// Generic SQLite error.
    #[error(transparent)]
    Database(#[from] rusqlite::Error),
}

/// Read-only POI store querying SQLite on demand.
pub struct SqlitePoiStore {
    path: PathBuf,
    connection: Mutex<Connection>,
}

impl fmt::Debug for SqlitePoiStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlitePoiStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SqlitePoiStore {
    /// Open an existing POI database read-only.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SqlitePoiStoreError> {
        let path = path.as_ref();
        let connection = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(|source| SqlitePoiStoreError::OpenDatabase {
                path: path.to_path_buf(),
                source,
            })?;
        let has_table: bool = connection.query_row(
            "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'pois')",
            [],
            |row| row.get(0),
        )?;
        if !has_table {
            return Err(SqlitePoiStoreError::MissingTable {
                path: path.to_path_buf(),
            });
        }
        Ok(Self {
            path: path.to_path_buf(),
            connection: Mutex::new(connection),
        })
    }

    /// Location of the backing database.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PoiStore for SqlitePoiStore {
    fn get_pois_in_bbox(&self, bbox: &Rect<f64>) -> Result<Vec<PointOfInterest>, PoiStoreError> {
        let connection = self
            .connection
            .lock()
            .map_err(|_| PoiStoreError::Unavailable {
                message: String::from("SQLite connection mutex poisoned"),
            })?;
        query_bbox(&connection, bbox).map_err(|source| PoiStoreError::Backend {
            source: Box::new(source),
        })
    }
}

fn query_bbox(
    connection: &Connection,
    bbox: &Rect<f64>,
) -> Result<Vec<PointOfInterest>, rusqlite::Error> {
    let mut statement = connection.prepare_cached(BBOX_QUERY)?;
    let rows = statement.query_map(
        params![bbox.min().y, bbox.max().y, bbox.min().x, bbox.max().x],
        |row| {
            Ok(PointOfInterest {
                id: row.get(0)?,
                lat: row.get(1)?,
                lng: row.get(2)?,
                category: row.get(3)?,
            })
        },
    )?;
    rows.collect()
}

/// Create or extend a POI database. Rows with an existing id are replaced.
pub fn write_poi_database<P: AsRef<Path>>(
    path: P,
    pois: &[PointOfInterest],
) -> Result<usize, SqlitePoiStoreError> {
    let path = path.as_ref();
    let mut connection =
        Connection::open(path).map_err(|source| SqlitePoiStoreError::OpenDatabase {
            path: path.to_path_buf(),
            source,
        })?;
    connection.execute_batch(SCHEMA)?;
    let tx = connection.transaction()?;
    {
        let mut insert = tx.prepare(
            "INSERT OR REPLACE INTO pois (id, lat, lng, category) VALUES (?1, ?2, ?3, ?4)",
        )?;
        for poi in pois {
            insert.execute(params![poi.id, poi.lat, poi.lng, poi.category])?;
        }
    }
    tx.commit()?;
    log::debug!("wrote {} POIs to {}", pois.len(), path.display());
    Ok(pois.len())
}
