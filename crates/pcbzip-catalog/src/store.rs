//! SQLite-backed parts catalog
//!
//! The catalog is published as whole generations. A refresh writes a fresh
//! database next to the live one (`parts.db.tmp`) and renames it into place
//! only once every row has been inserted, so readers either see the previous
//! generation or the complete new one.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use atomicwrites::{AtomicFile, OverwriteBehavior};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OpenFlags, OptionalExtension, ToSql};

use crate::error::{CatalogError, Result};
use crate::model::{CatalogField, CatalogRow, LibraryType};

const CREATE_SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS parts (
        lcsc            TEXT PRIMARY KEY NOT NULL,
        first_category  TEXT NOT NULL DEFAULT '',
        second_category TEXT NOT NULL DEFAULT '',
        mfr_part        TEXT NOT NULL DEFAULT '',
        package         TEXT NOT NULL DEFAULT '',
        solder_joint    TEXT NOT NULL DEFAULT '',
        manufacturer    TEXT NOT NULL DEFAULT '',
        library_type    TEXT NOT NULL DEFAULT '',
        description     TEXT NOT NULL DEFAULT '',
        datasheet       TEXT NOT NULL DEFAULT '',
        price           TEXT NOT NULL DEFAULT '',
        stock           INTEGER NOT NULL DEFAULT 0
    );
"#;

// Built after the bulk insert, it is much faster than maintaining them per row
const CREATE_INDEXES: &str = r#"
    CREATE INDEX IF NOT EXISTS parts_first_category ON parts(first_category);
    CREATE INDEX IF NOT EXISTS parts_library_type ON parts(library_type);
    CREATE INDEX IF NOT EXISTS parts_stock ON parts(stock);
"#;

const INSERT_PART: &str = r#"
    INSERT OR IGNORE INTO parts (
        lcsc, first_category, second_category, mfr_part, package, solder_joint,
        manufacturer, library_type, description, datasheet, price, stock
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
"#;

/// Conjunctive row filter; `None`/`false` members match every row
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogFilter {
    pub category: Option<String>,
    pub mfr_part: Option<String>,
    pub description: Option<String>,
    pub package: Option<String>,
    pub lcsc: Option<String>,
    pub library_type: Option<String>,
    pub in_stock: bool,
    pub one_off_pricing: bool,
}

/// Sort order; the field name is resolved when the query runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub descending: bool,
}

impl OrderBy {
    /// Parse `Stock` (ascending) or `-Stock` (descending); empty input clears ordering
    pub fn parse(s: &str) -> Result<Option<Self>> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(None);
        }
        let (name, descending) = match s.strip_prefix('-') {
            Some(rest) => (rest.trim(), true),
            None => (s, false),
        };
        // Validate eagerly so callers can reject the edit
        name.parse::<CatalogField>()?;
        Ok(Some(Self {
            field: name.to_string(),
            descending,
        }))
    }
}

#[derive(Debug, Clone, Default)]
pub struct CatalogQuery {
    pub filter: CatalogFilter,
    /// Projection by field name, in display order; empty means every field
    pub fields: Vec<String>,
    pub order_by: Option<OrderBy>,
    /// `None` or `Some(0)` returns every matching row
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    pub fields: Vec<CatalogField>,
    pub rows: Vec<CatalogRow>,
}

impl QueryResult {
    /// Projected values of each row, in field order
    pub fn records(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|row| self.fields.iter().map(|f| row.value(*f)).collect())
            .collect()
    }
}

/// Summary of the published generation
#[derive(Debug, Clone)]
pub struct CatalogStatus {
    pub path: PathBuf,
    pub published: bool,
    pub rows: i64,
    pub published_at: Option<DateTime<Utc>>,
}

pub struct CatalogStore {
    conn: Connection,
    path: PathBuf,
    published: bool,
}

impl CatalogStore {
    /// Open the published catalog at `path`.
    /// A catalog that was never ingested opens as an empty store.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No catalog at {}, using an empty store", path.display());
            let conn = Connection::open_in_memory()?;
            conn.execute_batch(CREATE_SCHEMA)?;
            return Ok(Self {
                conn,
                path: path.to_path_buf(),
                published: false,
            });
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.execute_batch(
            "PRAGMA cache_size = -65536;  -- 64MB page cache
             PRAGMA query_only = ON;",
        )?;

        Ok(Self {
            conn,
            path: path.to_path_buf(),
            published: true,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_published(&self) -> bool {
        self.published
    }

    pub fn count(&self) -> Result<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM parts", [], |row| row.get(0))?)
    }

    pub fn status(&self) -> Result<CatalogStatus> {
        Ok(CatalogStatus {
            path: self.path.clone(),
            published: self.published,
            rows: self.count()?,
            published_at: load_published_at(&self.path),
        })
    }

    /// Distinct non-empty categories of either level, sorted. The category
    /// filter is a substring match over both levels, so a broad first-level
    /// name also matches rows filed under it.
    pub fn categories(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT first_category AS category FROM parts WHERE first_category != ''
             UNION
             SELECT second_category FROM parts WHERE second_category != ''
             ORDER BY category COLLATE NOCASE",
        )?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        rows.collect::<Result<Vec<String>, _>>().map_err(Into::into)
    }

    /// Look up a single part by supplier identifier
    pub fn get(&self, lcsc: &str) -> Result<Option<CatalogRow>> {
        let sql = format!("SELECT {} FROM parts WHERE lcsc = ?1", select_columns());
        Ok(self
            .conn
            .query_row(&sql, [lcsc.trim()], map_row)
            .optional()?)
    }

    pub fn query(&self, query: &CatalogQuery) -> Result<QueryResult> {
        let fields = if query.fields.is_empty() {
            CatalogField::ALL.to_vec()
        } else {
            query
                .fields
                .iter()
                .map(|name| name.parse())
                .collect::<Result<Vec<CatalogField>>>()?
        };
        let order = match &query.order_by {
            Some(order) => Some((order.field.parse::<CatalogField>()?, order.descending)),
            None => None,
        };

        let mut clauses: Vec<String> = Vec::new();
        let mut params: Vec<Box<dyn ToSql>> = Vec::new();
        let filter = &query.filter;

        let mut contains = |columns: &[&str], needle: &Option<String>| {
            let Some(needle) = needle.as_deref().map(str::trim).filter(|n| !n.is_empty()) else {
                return;
            };
            params.push(Box::new(needle.to_string()));
            let idx = params.len();
            let any = columns
                .iter()
                .map(|c| format!("instr(lower({c}), lower(?{idx})) > 0"))
                .collect::<Vec<_>>()
                .join(" OR ");
            clauses.push(format!("({any})"));
        };
        contains(&["first_category", "second_category"], &filter.category);
        contains(&["mfr_part"], &filter.mfr_part);
        contains(&["description"], &filter.description);
        contains(&["package"], &filter.package);
        contains(&["lcsc"], &filter.lcsc);

        if let Some(kind) = filter
            .library_type
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
        {
            params.push(Box::new(LibraryType::parse(kind).as_str().to_string()));
            clauses.push(format!("library_type = ?{} COLLATE NOCASE", params.len()));
        }
        if filter.in_stock {
            clauses.push("stock > 0".to_string());
        }
        if filter.one_off_pricing {
            clauses.push("(ltrim(price) LIKE '1-%' OR ltrim(price) LIKE '1:%')".to_string());
        }

        let mut sql = format!("SELECT {} FROM parts", select_columns());
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        match order {
            Some((field, descending)) => {
                let dir = if descending { "DESC" } else { "ASC" };
                let collate = if field == CatalogField::Stock {
                    ""
                } else {
                    " COLLATE NOCASE"
                };
                sql.push_str(&format!(" ORDER BY {}{collate} {dir}, rowid", field.column()));
            }
            None => sql.push_str(" ORDER BY rowid"),
        }
        if let Some(limit) = query.limit.filter(|l| *l > 0) {
            params.push(Box::new(limit as i64));
            sql.push_str(&format!(" LIMIT ?{}", params.len()));
        }

        log::debug!("Catalog query: {sql}");
        let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(param_refs.as_slice(), map_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(QueryResult { fields, rows })
    }
}

fn select_columns() -> String {
    CatalogField::ALL
        .iter()
        .map(|f| f.column())
        .collect::<Vec<_>>()
        .join(", ")
}

fn map_row(row: &rusqlite::Row) -> rusqlite::Result<CatalogRow> {
    let library_type: String = row.get(7)?;
    Ok(CatalogRow {
        lcsc: row.get(0)?,
        first_category: row.get(1)?,
        second_category: row.get(2)?,
        mfr_part: row.get(3)?,
        package: row.get(4)?,
        solder_joint: row.get(5)?,
        manufacturer: row.get(6)?,
        library_type: LibraryType::parse(&library_type),
        description: row.get(8)?,
        datasheet: row.get(9)?,
        price: row.get(10)?,
        stock: row.get(11)?,
    })
}

fn temp_path(db_path: &Path) -> PathBuf {
    db_path.with_extension("db.tmp")
}

fn version_file_path(db_path: &Path) -> PathBuf {
    db_path.with_extension("db.version")
}

/// When the published generation was built, if recorded
pub fn load_published_at(db_path: &Path) -> Option<DateTime<Utc>> {
    let text = fs::read_to_string(version_file_path(db_path)).ok()?;
    DateTime::parse_from_rfc3339(text.trim())
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

fn save_published_at(db_path: &Path, at: DateTime<Utc>) -> Result<()> {
    let stamp = at.to_rfc3339();
    AtomicFile::new(version_file_path(db_path), OverwriteBehavior::AllowOverwrite)
        .write(|f| {
            f.write_all(stamp.as_bytes())?;
            f.flush()
        })
        .map_err(|err| {
            CatalogError::Io(std::io::Error::other(format!(
                "Failed to record catalog timestamp: {err}"
            )))
        })?;
    Ok(())
}

/// A catalog generation under construction.
///
/// Rows go to `<db>.tmp`; [`GenerationWriter::publish`] renames it over the
/// live database. Dropping an unpublished writer deletes the temp file.
pub struct GenerationWriter {
    conn: Option<Connection>,
    temp_path: PathBuf,
    dest_path: PathBuf,
}

impl GenerationWriter {
    pub fn create(dest_path: &Path) -> Result<Self> {
        if let Some(parent) = dest_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let temp_path = temp_path(dest_path);
        if temp_path.exists() {
            log::debug!("Removing stale {}", temp_path.display());
            fs::remove_file(&temp_path)?;
        }

        let conn = Connection::open(&temp_path)?;
        // The temp file is thrown away on failure, durability is only needed at publish
        conn.execute_batch(
            "PRAGMA journal_mode = OFF;
             PRAGMA synchronous = OFF;",
        )?;
        conn.execute_batch(CREATE_SCHEMA)?;
        conn.execute_batch("BEGIN")?;

        Ok(Self {
            conn: Some(conn),
            temp_path,
            dest_path: dest_path.to_path_buf(),
        })
    }

    /// Insert one row; returns `false` if the identifier was already present
    pub fn insert(&mut self, row: &CatalogRow) -> Result<bool> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(INSERT_PART)?;
        let changed = stmt.execute(rusqlite::params![
            row.lcsc,
            row.first_category,
            row.second_category,
            row.mfr_part,
            row.package,
            row.solder_joint,
            row.manufacturer,
            row.library_type.as_str(),
            row.description,
            row.datasheet,
            row.price,
            row.stock,
        ])?;
        Ok(changed == 1)
    }

    /// Commit, index, and atomically replace the live database
    pub fn publish(mut self) -> Result<PathBuf> {
        let conn = self.conn.take().ok_or_else(|| CatalogError::IngestIncomplete {
            reason: "generation already closed".to_string(),
        })?;
        conn.execute_batch("COMMIT")?;
        conn.execute_batch(CREATE_INDEXES)?;
        conn.close().map_err(|(_, err)| err)?;

        fs::rename(&self.temp_path, &self.dest_path)?;
        // The new generation is live from here on; a missing stamp only
        // makes the freshness unknown
        if let Err(e) = save_published_at(&self.dest_path, Utc::now()) {
            log::warn!(
                "Published {} without a freshness timestamp: {e}",
                self.dest_path.display()
            );
            let _ = fs::remove_file(version_file_path(&self.dest_path));
        }
        Ok(self.dest_path.clone())
    }

    fn conn(&self) -> Result<&Connection> {
        self.conn.as_ref().ok_or_else(|| CatalogError::IngestIncomplete {
            reason: "generation already closed".to_string(),
        })
    }
}

impl Drop for GenerationWriter {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            drop(conn);
            if let Err(e) = fs::remove_file(&self.temp_path) {
                log::debug!("Failed to remove {}: {e}", self.temp_path.display());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(lcsc: &str, mfr: &str, kind: LibraryType, stock: i64, price: &str) -> CatalogRow {
        CatalogRow {
            lcsc: lcsc.to_string(),
            first_category: "Resistors".to_string(),
            mfr_part: mfr.to_string(),
            package: "0402".to_string(),
            library_type: kind,
            price: price.to_string(),
            stock,
            ..Default::default()
        }
    }

    fn publish(path: &Path, rows: &[CatalogRow]) {
        let mut writer = GenerationWriter::create(path).unwrap();
        for r in rows {
            writer.insert(r).unwrap();
        }
        writer.publish().unwrap();
    }

    #[test]
    fn test_missing_catalog_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = CatalogStore::open(&dir.path().join("parts.db")).unwrap();
        assert!(!store.is_published());
        assert_eq!(store.count().unwrap(), 0);
        assert!(store.categories().unwrap().is_empty());
        let result = store.query(&CatalogQuery::default()).unwrap();
        assert!(result.rows.is_empty());
    }

    #[test]
    fn test_filters_are_conjunctive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parts.db");
        publish(
            &path,
            &[
                row("C1", "RC0402FR-0710KL", LibraryType::Basic, 100, "1-9:$0.01"),
                row("C2", "RC0402FR-071KL", LibraryType::Extended, 0, "1-9:$0.01"),
                row("C3", "RC0603FR-0710KL", LibraryType::Basic, 5, "100-999:$0.01"),
            ],
        );
        let store = CatalogStore::open(&path).unwrap();

        let mut query = CatalogQuery::default();
        query.filter.mfr_part = Some("rc0402".to_string());
        let lcsc = |q: &CatalogQuery| -> Vec<String> {
            store.query(q).unwrap().rows.into_iter().map(|r| r.lcsc).collect()
        };
        assert_eq!(lcsc(&query), vec!["C1", "C2"]);

        query.filter.in_stock = true;
        assert_eq!(lcsc(&query), vec!["C1"]);

        query.filter = CatalogFilter {
            one_off_pricing: true,
            ..Default::default()
        };
        assert_eq!(lcsc(&query), vec!["C1", "C2"]);

        query.filter = CatalogFilter {
            library_type: Some("basic".to_string()),
            ..Default::default()
        };
        assert_eq!(lcsc(&query), vec!["C1", "C3"]);
    }

    #[test]
    fn test_order_and_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parts.db");
        publish(
            &path,
            &[
                row("C1", "A", LibraryType::Basic, 10, ""),
                row("C2", "B", LibraryType::Basic, 30, ""),
                row("C3", "C", LibraryType::Basic, 20, ""),
            ],
        );
        let store = CatalogStore::open(&path).unwrap();
        let query = CatalogQuery {
            order_by: OrderBy::parse("-stock").unwrap(),
            limit: Some(2),
            ..Default::default()
        };
        let stocks: Vec<i64> = store.query(&query).unwrap().rows.iter().map(|r| r.stock).collect();
        assert_eq!(stocks, vec![30, 20]);
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let store = CatalogStore::open(Path::new("/nonexistent/parts.db")).unwrap();
        let query = CatalogQuery {
            fields: vec!["LCSC".to_string(), "Colour".to_string()],
            ..Default::default()
        };
        assert!(matches!(
            store.query(&query),
            Err(CatalogError::InvalidField(name)) if name == "Colour"
        ));
        assert!(matches!(
            OrderBy::parse("-Weight"),
            Err(CatalogError::InvalidField(_))
        ));
    }

    #[test]
    fn test_publish_replaces_previous_generation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parts.db");
        publish(&path, &[row("C1", "A", LibraryType::Basic, 1, "")]);
        publish(&path, &[row("C9", "Z", LibraryType::Basic, 1, "")]);

        let store = CatalogStore::open(&path).unwrap();
        assert_eq!(store.count().unwrap(), 1);
        assert!(store.get("C9").unwrap().is_some());
        assert!(store.get("C1").unwrap().is_none());
        assert!(store.status().unwrap().published_at.is_some());
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn test_categories_cover_both_levels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parts.db");
        let mut resistor = row("C1", "A", LibraryType::Basic, 1, "");
        resistor.second_category = "Chip Resistor - Surface Mount".to_string();
        let mut capacitor = row("C2", "B", LibraryType::Basic, 1, "");
        capacitor.first_category = "Capacitors".to_string();
        capacitor.second_category = "Multilayer Ceramic Capacitors MLCC - SMD/SMT".to_string();
        publish(&path, &[resistor, capacitor]);

        let store = CatalogStore::open(&path).unwrap();
        assert_eq!(
            store.categories().unwrap(),
            vec![
                "Capacitors",
                "Chip Resistor - Surface Mount",
                "Multilayer Ceramic Capacitors MLCC - SMD/SMT",
                "Resistors",
            ]
        );

        let query = |category: &str| {
            let query = CatalogQuery {
                filter: CatalogFilter {
                    category: Some(category.to_string()),
                    ..Default::default()
                },
                ..Default::default()
            };
            store
                .query(&query)
                .unwrap()
                .rows
                .into_iter()
                .map(|r| r.lcsc)
                .collect::<Vec<_>>()
        };
        assert_eq!(query("Chip Resistor - Surface Mount"), vec!["C1"]);
        assert_eq!(query("capacitors"), vec!["C2"]);
    }

    #[test]
    fn test_publish_survives_unwritable_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parts.db");
        fs::create_dir(version_file_path(&path)).unwrap();

        publish(&path, &[row("C1", "A", LibraryType::Basic, 1, "")]);

        let store = CatalogStore::open(&path).unwrap();
        assert_eq!(store.count().unwrap(), 1);
        let status = store.status().unwrap();
        assert!(status.published);
        assert!(status.published_at.is_none());
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn test_dropped_writer_leaves_live_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parts.db");
        publish(&path, &[row("C1", "A", LibraryType::Basic, 1, "")]);

        {
            let mut writer = GenerationWriter::create(&path).unwrap();
            writer.insert(&row("C2", "B", LibraryType::Basic, 1, "")).unwrap();
        }

        assert!(!temp_path(&path).exists());
        let store = CatalogStore::open(&path).unwrap();
        assert_eq!(store.count().unwrap(), 1);
        assert!(store.get("C1").unwrap().is_some());
    }

    #[test]
    fn test_duplicate_identifier_keeps_first() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parts.db");
        let mut writer = GenerationWriter::create(&path).unwrap();
        assert!(writer.insert(&row("C1", "first", LibraryType::Basic, 1, "")).unwrap());
        assert!(!writer.insert(&row("C1", "second", LibraryType::Basic, 1, "")).unwrap());
        writer.publish().unwrap();

        let store = CatalogStore::open(&path).unwrap();
        assert_eq!(store.get("C1").unwrap().unwrap().mfr_part, "first");
    }
}
