use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::CatalogError;
use crate::model::{GroupId, PageAttributes, PageId, SessionId, SizeInfo};

type Result<T> = std::result::Result<T, CatalogError>;

const PAGE_COLUMNS: &str = "id, image_path, page_index, is_text, width, height, aspect_ratio, \
                            thumbnail_data, group_id, session_id";

/// The Catalog stores sessions, groups and pages in SQLite.
///
/// It is the persistent side of the object graph: `ObjectContext` turns
/// rows into live `Page` entities and writes their changes back here.
pub struct Catalog {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl Catalog {
    /// Open (or create) the catalog at `path` and initialize the schema
    pub fn open(path: &Path) -> Result<Self> {
        // Ensure the parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| CatalogError::Location {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open(path)?;
        log::info!("📁 Catalog opened at: {}", path.display());

        Self::with_connection(conn, Some(path.to_path_buf()))
    }

    /// A throwaway catalog that lives only as long as this value
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?, None)
    }

    fn with_connection(conn: Connection, db_path: Option<PathBuf>) -> Result<Self> {
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Location of the database file (`None` for in-memory catalogs)
    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    pub fn create_session(&self) -> Result<SessionId> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO sessions (created_at) VALUES (?1)",
            params![Utc::now().timestamp()],
        )?;
        Ok(SessionId(conn.last_insert_rowid()))
    }

    /// Delete a session with its groups and pages
    pub fn delete_session(&self, session: SessionId) -> Result<()> {
        let deleted = self
            .conn()
            .execute("DELETE FROM sessions WHERE id = ?1", params![session.0])?;
        if deleted == 0 {
            return Err(CatalogError::SessionNotFound(session));
        }
        Ok(())
    }

    pub fn insert_group(&self, path: &str, session: Option<SessionId>) -> Result<GroupId> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO groups (path, session_id) VALUES (?1, ?2)",
            params![path, session.map(|s| s.0)],
        )?;
        Ok(GroupId(conn.last_insert_rowid()))
    }

    /// Every group of a session with its stored path, in insertion order
    pub fn groups_for_session(&self, session: SessionId) -> Result<Vec<(GroupId, String)>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT id, path FROM groups WHERE session_id = ?1 ORDER BY id")?;
        let groups = stmt
            .query_map(params![session.0], |row| Ok((GroupId(row.get(0)?), row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(groups)
    }

    /// Insert a new page row and return its id
    pub fn insert_page(&self, attrs: &PageAttributes) -> Result<PageId> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO pages (image_path, page_index, is_text, width, height, aspect_ratio,
                                thumbnail_data, group_id, session_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                attrs.image_path,
                attrs.index,
                attrs.is_text,
                attrs.size.map(|s| s.width),
                attrs.size.map(|s| s.height),
                attrs.size.map(|s| s.aspect_ratio),
                attrs.thumbnail_data,
                attrs.group.map(|g| g.0),
                attrs.session.map(|s| s.0),
            ],
        )?;
        Ok(PageId(conn.last_insert_rowid()))
    }

    /// Write every attribute of an existing page
    pub fn update_page(&self, id: PageId, attrs: &PageAttributes) -> Result<()> {
        let updated = self.conn().execute(
            "UPDATE pages SET image_path = ?1, page_index = ?2, is_text = ?3, width = ?4,
                              height = ?5, aspect_ratio = ?6, thumbnail_data = ?7,
                              group_id = ?8, session_id = ?9
             WHERE id = ?10",
            params![
                attrs.image_path,
                attrs.index,
                attrs.is_text,
                attrs.size.map(|s| s.width),
                attrs.size.map(|s| s.height),
                attrs.size.map(|s| s.aspect_ratio),
                attrs.thumbnail_data,
                attrs.group.map(|g| g.0),
                attrs.session.map(|s| s.0),
                id.0,
            ],
        )?;
        if updated == 0 {
            return Err(CatalogError::PageNotFound(id));
        }
        Ok(())
    }

    pub fn fetch_page(&self, id: PageId) -> Result<PageAttributes> {
        let conn = self.conn();
        let row = conn
            .query_row(
                &format!("SELECT {PAGE_COLUMNS} FROM pages WHERE id = ?1"),
                params![id.0],
                page_from_row,
            )
            .optional()?;

        row.map(|(_, attrs)| attrs).ok_or(CatalogError::PageNotFound(id))
    }

    /// Pages of a session: group pages by group and index, then loose files
    pub fn pages_for_session(&self, session: SessionId) -> Result<Vec<(PageId, PageAttributes)>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {PAGE_COLUMNS} FROM pages WHERE session_id = ?1
             ORDER BY group_id IS NULL, group_id, page_index, id"
        ))?;
        let pages = stmt
            .query_map(params![session.0], page_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(pages)
    }

    pub fn page_count(&self) -> Result<i64> {
        let count = self
            .conn()
            .query_row("SELECT COUNT(*) FROM pages", [], |row| row.get(0))?;
        Ok(count)
    }
}

/// Create all tables and indexes if they don't exist
fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    // Needed for the cascading deletes below
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS sessions (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            created_at      INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS groups (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            path            TEXT NOT NULL,
            session_id      INTEGER,
            FOREIGN KEY(session_id) REFERENCES sessions(id) ON DELETE CASCADE
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS pages (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            image_path      TEXT,
            page_index      INTEGER,
            is_text         INTEGER NOT NULL DEFAULT 0,
            width           REAL,
            height          REAL,
            aspect_ratio    REAL,
            thumbnail_data  BLOB,
            group_id        INTEGER,
            session_id      INTEGER,
            FOREIGN KEY(group_id) REFERENCES groups(id) ON DELETE CASCADE,
            FOREIGN KEY(session_id) REFERENCES sessions(id) ON DELETE CASCADE
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_pages_session ON pages(session_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_pages_group_index ON pages(group_id, page_index)",
        [],
    )?;

    log::debug!("catalog schema initialized");
    Ok(())
}

fn page_from_row(row: &Row<'_>) -> rusqlite::Result<(PageId, PageAttributes)> {
    let attrs = PageAttributes {
        image_path: row.get(1)?,
        index: row.get(2)?,
        is_text: row.get(3)?,
        size: SizeInfo::from_columns(row.get(4)?, row.get(5)?, row.get(6)?),
        thumbnail_data: row.get(7)?,
        group: row.get::<_, Option<i64>>(8)?.map(GroupId),
        session: row.get::<_, Option<i64>>(9)?.map(SessionId),
    };
    Ok((PageId(row.get(0)?), attrs))
}

// Implement Debug for better error messages
impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog")
            .field("db_path", &self.db_path)
            .finish()
    }
}
