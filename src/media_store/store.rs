//! SQLite-backed image metadata store.
//!
//! All writes go through a single connection behind a mutex; reads round-robin
//! over a small pool of read-only WAL connections so listing queries never
//! block behind ingestion writes.

use super::models::*;
use super::schema::MEDIA_VERSIONED_SCHEMAS;
use super::shard::thumbnail_rel_path;
use crate::sqlite_persistence::BASE_DB_VERSION;
use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::info;

/// How many times `upsert` re-reads after losing an insert race before it
/// gives up. One retry is enough in practice, the cap only guards against a
/// path being created and deleted in a tight loop by someone else.
pub const UPSERT_CONFLICT_RETRIES: usize = 3;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Another writer claimed this path between our lookup and insert.
    /// Resolved by re-reading the existing record and updating it instead.
    #[error("path already registered: {path}")]
    Conflict { path: String },
    #[error("no image record with id {0}")]
    NotFound(i64),
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

/// Persistent store for image records and their tags.
///
/// The interface is deliberately narrow: primitive record operations plus the
/// tag and aggregate queries the rest of the system needs. The
/// insert-or-update algorithm is written once on top of the primitives (see
/// [`MetadataStore::upsert`]) so every implementation shares its semantics.
pub trait MetadataStore: Send + Sync {
    // ====== Image records ======

    /// Look up a record by its unique path.
    fn find_by_path(&self, full_path: &str) -> Result<Option<ImageRecord>, StoreError>;

    /// Insert a fresh record and return its store-assigned id. Fails with
    /// [`StoreError::Conflict`] when the path is already registered.
    fn insert_record(&self, info: &FileInfo, exif_time: Option<i64>) -> Result<i64, StoreError>;

    /// Overwrite the mutable fields of an existing record. The id must
    /// already exist.
    fn update_record(&self, record: &ImageRecord) -> Result<(), StoreError>;

    /// Point lookup by id.
    fn get_item(&self, id: i64) -> Result<Option<ImageRecord>, StoreError>;

    /// One page of records ordered by image time (ties broken by id in the
    /// same direction). When `filter.tag_name` is set, only records carrying
    /// that tag are considered; filtering is always by a single tag.
    fn list_page(&self, filter: &ListFilter) -> Result<Vec<ImageRecord>, StoreError>;

    /// Total number of registered images.
    fn count_images(&self) -> Result<i64, StoreError>;

    // ====== Tags ======

    /// Id of the named tag, creating it first if it does not exist yet.
    fn ensure_tag(&self, tag_name: &str) -> Result<i64, StoreError>;

    /// Associate an image with a tag. Adding an existing association is a
    /// no-op, never a duplicate.
    fn add_image_tag(&self, image_id: i64, tag_id: i64) -> Result<(), StoreError>;

    /// Every tag with the number of images carrying it.
    fn get_tags(&self) -> Result<Vec<TagCount>, StoreError>;

    // ====== Aggregates ======

    /// Content hashes shared by two or more registered paths. Duplicates are
    /// reported, never merged or deleted.
    fn duplicate_groups(&self) -> Result<Vec<DuplicateGroup>, StoreError>;

    // ====== Derived ======

    /// Cache-relative thumbnail location for an id. Pure arithmetic, no I/O
    /// and no store access.
    fn get_thumbnail_path(&self, id: i64) -> PathBuf {
        thumbnail_rel_path(id)
    }

    /// Register a scanned file: create a record on first sighting, update the
    /// existing one in place afterwards. Returns the record's stable id
    /// either way. `mtime` is always refreshed; `exif_time` only overwrites
    /// when a value was resolved, so a record never loses a known capture
    /// time to a flaky later parse. Losing an insert race to a concurrent
    /// writer is benign and resolved by re-reading.
    fn upsert(&self, info: &FileInfo, exif_time: Option<i64>) -> Result<i64, StoreError> {
        for _ in 0..UPSERT_CONFLICT_RETRIES {
            if let Some(existing) = self.find_by_path(&info.full_path)? {
                let updated = ImageRecord {
                    mtime: info.mtime,
                    exif_time: exif_time.or(existing.exif_time),
                    ..existing
                };
                self.update_record(&updated)?;
                return Ok(updated.image_id);
            }
            match self.insert_record(info, exif_time) {
                Ok(id) => return Ok(id),
                Err(StoreError::Conflict { .. }) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(StoreError::Conflict {
            path: info.full_path.clone(),
        })
    }
}

/// SQLite-backed [`MetadataStore`].
#[derive(Clone)]
pub struct SqliteMetadataStore {
    read_pool: Vec<Arc<Mutex<Connection>>>,
    write_conn: Arc<Mutex<Connection>>,
    read_index: Arc<AtomicUsize>,
}

fn migrate_if_needed(conn: &mut Connection) -> Result<()> {
    let db_version: i64 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;

    let latest_version = MEDIA_VERSIONED_SCHEMAS.len() - 1;
    let latest_schema = &MEDIA_VERSIONED_SCHEMAS[latest_version];

    let table_count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
            [],
            |r| r.get(0),
        )
        .unwrap_or(0);

    if table_count == 0 {
        info!("Creating media db schema at version {}", latest_version);
        latest_schema.create(conn)?;
        return Ok(());
    }

    let mut current_version = if db_version < BASE_DB_VERSION as i64 {
        0
    } else {
        (db_version - BASE_DB_VERSION as i64) as usize
    };

    if current_version >= latest_version {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for schema in MEDIA_VERSIONED_SCHEMAS.iter().skip(current_version + 1) {
        if let Some(migration_fn) = schema.migration {
            info!(
                "Migrating media db from version {} to {}",
                current_version, schema.version
            );
            migration_fn(&tx)?;
            current_version = schema.version;
        }
    }
    tx.pragma_update(None, "user_version", BASE_DB_VERSION + current_version)?;

    tx.commit()?;
    let _ = conn.query_row(
        "PRAGMA wal_checkpoint(TRUNCATE)",
        [],
        |_: &rusqlite::Row| Ok(()),
    );
    Ok(())
}

impl SqliteMetadataStore {
    /// Open (creating or migrating if needed) the metadata database.
    ///
    /// # Arguments
    /// * `db_path` - Path to the SQLite database file
    /// * `read_pool_size` - Number of connections for concurrent read operations
    pub fn new<P: AsRef<Path>>(db_path: P, read_pool_size: usize) -> Result<Self> {
        let db_path_ref = db_path.as_ref();

        let mut write_conn = Connection::open_with_flags(
            db_path_ref,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI
                | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open media database")?;

        migrate_if_needed(&mut write_conn)?;

        write_conn.pragma_update(None, "journal_mode", "WAL")?;

        let image_count: i64 = write_conn
            .query_row("SELECT COUNT(*) FROM images", [], |r| r.get(0))
            .unwrap_or(0);
        let tag_count: i64 = write_conn
            .query_row("SELECT COUNT(*) FROM tags", [], |r| r.get(0))
            .unwrap_or(0);

        info!(
            "Opened media store: {} images, {} tags",
            image_count, tag_count
        );

        let mut read_pool = Vec::with_capacity(read_pool_size);
        for _ in 0..read_pool_size {
            let read_conn = Connection::open_with_flags(
                db_path_ref,
                rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY
                    | rusqlite::OpenFlags::SQLITE_OPEN_URI
                    | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?;
            read_conn.pragma_update(None, "journal_mode", "WAL")?;
            read_pool.push(Arc::new(Mutex::new(read_conn)));
        }

        Ok(SqliteMetadataStore {
            write_conn: Arc::new(Mutex::new(write_conn)),
            read_pool,
            read_index: Arc::new(AtomicUsize::new(0)),
        })
    }

    fn get_read_conn(&self) -> Arc<Mutex<Connection>> {
        let index = self.read_index.fetch_add(1, Ordering::SeqCst) % self.read_pool.len();
        self.read_pool[index].clone()
    }

    fn parse_image_row(row: &rusqlite::Row) -> rusqlite::Result<ImageRecord> {
        Ok(ImageRecord {
            image_id: row.get(0)?,
            full_path: row.get(1)?,
            mtime: row.get(2)?,
            exif_time: row.get(3)?,
            hash: row.get(4)?,
        })
    }
}

impl MetadataStore for SqliteMetadataStore {
    fn find_by_path(&self, full_path: &str) -> Result<Option<ImageRecord>, StoreError> {
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT image_id, full_path, mtime, exif_time, hash FROM images WHERE full_path = ?1",
        )?;
        match stmt.query_row(params![full_path], Self::parse_image_row) {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn insert_record(&self, info: &FileInfo, exif_time: Option<i64>) -> Result<i64, StoreError> {
        let conn = self.write_conn.lock().unwrap();
        let result = conn.execute(
            "INSERT INTO images (full_path, mtime, exif_time) VALUES (?1, ?2, ?3)",
            params![&info.full_path, info.mtime, exif_time],
        );
        match result {
            Ok(_) => Ok(conn.last_insert_rowid()),
            Err(e) if is_unique_violation(&e) => Err(StoreError::Conflict {
                path: info.full_path.clone(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn update_record(&self, record: &ImageRecord) -> Result<(), StoreError> {
        let conn = self.write_conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE images SET full_path = ?1, mtime = ?2, exif_time = ?3, hash = ?4
             WHERE image_id = ?5",
            params![
                &record.full_path,
                record.mtime,
                record.exif_time,
                &record.hash,
                record.image_id
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(record.image_id));
        }
        Ok(())
    }

    fn get_item(&self, id: i64) -> Result<Option<ImageRecord>, StoreError> {
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT image_id, full_path, mtime, exif_time, hash FROM images WHERE image_id = ?1",
        )?;
        match stmt.query_row(params![id], Self::parse_image_row) {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn list_page(&self, filter: &ListFilter) -> Result<Vec<ImageRecord>, StoreError> {
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();
        let records = match &filter.tag_name {
            Some(tag_name) => {
                let sql = format!(
                    "SELECT i.image_id, i.full_path, i.mtime, i.exif_time, i.hash
                     FROM images i
                     JOIN image_tags it ON it.image_id = i.image_id
                     JOIN tags t ON t.tag_id = it.tag_id
                     WHERE t.tag_name = ?1
                     ORDER BY COALESCE(i.exif_time, i.mtime) {dir}, i.image_id {dir}
                     LIMIT ?2 OFFSET ?3",
                    dir = filter.order.to_sql()
                );
                let mut stmt = conn.prepare_cached(&sql)?;
                let records = stmt
                    .query_map(
                        params![tag_name, filter.limit as i64, filter.offset as i64],
                        Self::parse_image_row,
                    )?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                records
            }
            None => {
                let sql = format!(
                    "SELECT image_id, full_path, mtime, exif_time, hash FROM images
                     ORDER BY COALESCE(exif_time, mtime) {dir}, image_id {dir}
                     LIMIT ?1 OFFSET ?2",
                    dir = filter.order.to_sql()
                );
                let mut stmt = conn.prepare_cached(&sql)?;
                let records = stmt
                    .query_map(
                        params![filter.limit as i64, filter.offset as i64],
                        Self::parse_image_row,
                    )?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                records
            }
        };
        Ok(records)
    }

    fn count_images(&self) -> Result<i64, StoreError> {
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();
        let count = conn.query_row("SELECT COUNT(*) FROM images", [], |r| r.get(0))?;
        Ok(count)
    }

    fn ensure_tag(&self, tag_name: &str) -> Result<i64, StoreError> {
        let conn = self.write_conn.lock().unwrap();
        conn.execute("BEGIN IMMEDIATE", [])?;

        let result = (|| -> Result<i64, StoreError> {
            conn.execute(
                "INSERT OR IGNORE INTO tags (tag_name) VALUES (?1)",
                params![tag_name],
            )?;
            let tag_id = conn.query_row(
                "SELECT tag_id FROM tags WHERE tag_name = ?1",
                params![tag_name],
                |r| r.get(0),
            )?;
            Ok(tag_id)
        })();

        match result {
            Ok(tag_id) => {
                conn.execute("COMMIT", [])?;
                Ok(tag_id)
            }
            Err(e) => {
                let _ = conn.execute("ROLLBACK", []);
                Err(e)
            }
        }
    }

    fn add_image_tag(&self, image_id: i64, tag_id: i64) -> Result<(), StoreError> {
        let conn = self.write_conn.lock().unwrap();
        conn.execute(
            "INSERT OR IGNORE INTO image_tags (image_id, tag_id) VALUES (?1, ?2)",
            params![image_id, tag_id],
        )?;
        Ok(())
    }

    fn get_tags(&self) -> Result<Vec<TagCount>, StoreError> {
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT t.tag_name, COUNT(it.image_id) FROM tags t
             LEFT JOIN image_tags it ON it.tag_id = t.tag_id
             GROUP BY t.tag_id ORDER BY t.tag_name",
        )?;
        let tags = stmt
            .query_map([], |row| {
                Ok(TagCount {
                    tag_name: row.get(0)?,
                    number_of_images: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(tags)
    }

    fn duplicate_groups(&self) -> Result<Vec<DuplicateGroup>, StoreError> {
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT hash, full_path FROM images
             WHERE hash IN (
                 SELECT hash FROM images WHERE hash IS NOT NULL
                 GROUP BY hash HAVING COUNT(*) > 1
             )
             ORDER BY hash, full_path",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut groups: Vec<DuplicateGroup> = Vec::new();
        for (hash, full_path) in rows {
            match groups.last_mut() {
                Some(group) if group.hash == hash => group.full_paths.push(full_path),
                _ => groups.push(DuplicateGroup {
                    hash,
                    full_paths: vec![full_path],
                }),
            }
        }
        Ok(groups)
    }
}
