//! Streaming import of the supplier parts dump into a new catalog generation

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use csv::StringRecord;

use crate::error::{CatalogError, Result};
use crate::model::{CatalogField, CatalogRow, LibraryType};
use crate::store::GenerationWriter;

/// How often the progress callback fires, in rows read
pub const PROGRESS_INTERVAL: u64 = 10_000;

#[derive(Debug, Clone)]
pub struct IngestReport {
    pub db_path: PathBuf,
    /// Rows written to the new generation
    pub stored: u64,
    /// Malformed rows and duplicate identifiers
    pub skipped: u64,
    pub elapsed: Duration,
}

/// Maps supplier header positions onto catalog fields
#[derive(Debug, Clone)]
struct ColumnMap {
    columns: Vec<(CatalogField, usize)>,
}

impl ColumnMap {
    /// Returns `None` when the supplier identifier column is missing
    fn from_headers(headers: &StringRecord) -> Option<Self> {
        let mut columns: Vec<(CatalogField, usize)> = Vec::new();
        for (idx, header) in headers.iter().enumerate() {
            let header = header.trim_start_matches('\u{feff}');
            match CatalogField::lookup(header) {
                Some(field) if !columns.iter().any(|(f, _)| *f == field) => {
                    columns.push((field, idx))
                }
                Some(_) => log::debug!("Ignoring duplicate catalog column `{header}`"),
                None => log::debug!("Ignoring unknown catalog column `{header}`"),
            }
        }
        columns
            .iter()
            .any(|(f, _)| *f == CatalogField::Lcsc)
            .then_some(Self { columns })
    }

    fn get<'r>(&self, record: &'r StringRecord, field: CatalogField) -> &'r str {
        self.columns
            .iter()
            .find(|(f, _)| *f == field)
            .and_then(|(_, idx)| record.get(*idx))
            .map(str::trim)
            .unwrap_or("")
    }

    /// Coerce one record, `None` if it fails the minimal row shape
    fn parse(&self, record: &StringRecord) -> Option<CatalogRow> {
        let lcsc = self.get(record, CatalogField::Lcsc);
        if lcsc.is_empty() {
            return None;
        }

        let stock = match self.get(record, CatalogField::Stock) {
            "" => 0,
            s => s.parse::<i64>().ok()?,
        };

        let text = |field| self.get(record, field).to_string();
        Some(CatalogRow {
            lcsc: lcsc.to_string(),
            first_category: text(CatalogField::FirstCategory),
            second_category: text(CatalogField::SecondCategory),
            mfr_part: text(CatalogField::MfrPart),
            package: text(CatalogField::Package),
            solder_joint: text(CatalogField::SolderJoint),
            manufacturer: text(CatalogField::Manufacturer),
            library_type: LibraryType::parse(self.get(record, CatalogField::LibraryType)),
            description: text(CatalogField::Description),
            datasheet: text(CatalogField::Datasheet),
            price: text(CatalogField::Price),
            stock,
        })
    }
}

/// Ingest the dump at `dump_path` into a new generation published at `db_path`
pub fn ingest_file<F>(dump_path: &Path, db_path: &Path, on_progress: F) -> Result<IngestReport>
where
    F: FnMut(u64),
{
    let file = File::open(dump_path).map_err(|e| CatalogError::IngestIncomplete {
        reason: format!("cannot open {}: {e}", dump_path.display()),
    })?;
    ingest_reader(BufReader::new(file), dump_path, db_path, on_progress)
}

/// Ingest from any reader; `source` is only used in error messages
pub fn ingest_reader<R, F>(
    reader: R,
    source: &Path,
    db_path: &Path,
    mut on_progress: F,
) -> Result<IngestReport>
where
    R: Read,
    F: FnMut(u64),
{
    let start = Instant::now();
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(reader);

    let headers = csv_reader
        .headers()
        .map_err(|e| CatalogError::IngestIncomplete {
            reason: format!("cannot read header of {}: {e}", source.display()),
        })?
        .clone();
    let columns = ColumnMap::from_headers(&headers).ok_or_else(|| CatalogError::IngestSchema {
        path: source.to_path_buf(),
        header: headers.iter().collect::<Vec<_>>().join(","),
    })?;

    let incomplete = |e: CatalogError| CatalogError::IngestIncomplete {
        reason: e.to_string(),
    };

    let mut writer = GenerationWriter::create(db_path).map_err(incomplete)?;
    let mut read: u64 = 0;
    let mut stored: u64 = 0;
    let mut skipped: u64 = 0;

    for result in csv_reader.records() {
        read += 1;
        if read % PROGRESS_INTERVAL == 0 {
            on_progress(read);
        }

        let record = match result {
            Ok(record) => record,
            Err(e) if e.is_io_error() => {
                return Err(CatalogError::IngestIncomplete {
                    reason: format!("read failed after {read} rows: {e}"),
                });
            }
            Err(e) => {
                log::debug!("Skipping malformed catalog row: {e}");
                skipped += 1;
                continue;
            }
        };

        match columns.parse(&record) {
            Some(row) => {
                if writer.insert(&row).map_err(incomplete)? {
                    stored += 1;
                } else {
                    log::debug!("Skipping duplicate part {}", row.lcsc);
                    skipped += 1;
                }
            }
            None => {
                log::debug!(
                    "Skipping malformed catalog row at line {:?}",
                    record.position().map(|p| p.line())
                );
                skipped += 1;
            }
        }
    }

    let db_path = writer.publish().map_err(incomplete)?;
    let elapsed = start.elapsed();
    log::info!(
        "Ingested {stored} parts from {} ({skipped} skipped) in {:.1?}",
        source.display(),
        elapsed
    );

    Ok(IngestReport {
        db_path,
        stored,
        skipped,
        elapsed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CatalogQuery, CatalogStore};

    const HEADER: &str = "LCSC,Stock,MFR.Part,Package,Library Type,Price,Description\n";

    fn ingest_str(db_path: &Path, dump: &str) -> Result<IngestReport> {
        ingest_reader(dump.as_bytes(), Path::new("parts.csv"), db_path, |_| {})
    }

    #[test]
    fn test_malformed_rows_are_counted_not_stored() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("parts.db");
        let dump = format!(
            "{HEADER}\
             C375,2772,ADS1115IDGSR,MSOP-10_3.0x3.0x0.5P,Extended,1-9:$6.33,16-bit ADC\n\
             C376,12\n\
             C377,lots,LM358,SOIC-8,Basic,1-9:$0.10,Op amp\n\
             ,5,NE555,SOIC-8,Basic,1-9:$0.10,Timer\n\
             C25804,500,0603WAF1002T5E,0603,Basic,\"1-199:$0.0011,200-:$0.0009\",10k resistor\n"
        );

        let report = ingest_str(&db, &dump).unwrap();
        assert_eq!(report.stored, 2);
        assert_eq!(report.skipped, 3);

        let store = CatalogStore::open(&db).unwrap();
        let result = store.query(&CatalogQuery::default()).unwrap();
        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.rows[1].price, "1-199:$0.0011,200-:$0.0009");
    }

    #[test]
    fn test_header_reordering_and_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("parts.db");
        let dump = "Description,Colour,LCSC Part,First Category\n\
                    Green LED,green,C72043,Optoelectronics\n";

        ingest_str(&db, dump).unwrap();
        let store = CatalogStore::open(&db).unwrap();
        let row = store.get("C72043").unwrap().unwrap();
        assert_eq!(row.description, "Green LED");
        assert_eq!(row.first_category, "Optoelectronics");
        assert_eq!(row.stock, 0);
        assert_eq!(row.mfr_part, "");
        assert_eq!(row.library_type, LibraryType::Unknown);
    }

    #[test]
    fn test_unmatched_header_keeps_previous_generation() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("parts.db");
        ingest_str(&db, &format!("{HEADER}C1,1,A,0402,Basic,,x\n")).unwrap();

        let err = ingest_str(&db, "Name,Qty\nfoo,1\n").unwrap_err();
        assert!(matches!(err, CatalogError::IngestSchema { ref header, .. } if header == "Name,Qty"));

        let store = CatalogStore::open(&db).unwrap();
        assert_eq!(store.count().unwrap(), 1);
        assert!(!db.with_extension("db.tmp").exists());
    }

    struct ConnectionReset;

    impl Read for ConnectionReset {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset",
            ))
        }
    }

    #[test]
    fn test_read_failure_keeps_previous_generation() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("parts.db");
        ingest_str(&db, &format!("{HEADER}C1,1,A,0402,Basic,,x\n")).unwrap();

        let partial = format!(
            "{HEADER}C2,1,B,0402,Basic,,x\nC3,1,C,0402,Basic,,x\nC4,1,D,0402,Basic,,x\n"
        );
        let reader = partial.as_bytes().chain(ConnectionReset);
        let err = ingest_reader(reader, Path::new("parts.csv"), &db, |_| {}).unwrap_err();
        match err {
            CatalogError::IngestIncomplete { reason } => {
                assert!(reason.contains("connection reset"), "{reason}")
            }
            other => panic!("unexpected error {other}"),
        }

        let store = CatalogStore::open(&db).unwrap();
        assert_eq!(store.count().unwrap(), 1);
        assert!(!db.with_extension("db.tmp").exists());
    }

    #[test]
    fn test_empty_dump_is_a_schema_error() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("parts.db");
        assert!(matches!(
            ingest_str(&db, ""),
            Err(CatalogError::IngestSchema { .. })
        ));
        assert!(!db.exists());
    }

    #[test]
    fn test_progress_callback() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("parts.db");
        let mut dump = String::from(HEADER);
        for i in 0..(PROGRESS_INTERVAL * 2 + 5) {
            dump.push_str(&format!("C{i},1,MPN{i},0402,Basic,1-9:$0.01,part\n"));
        }

        let mut calls = Vec::new();
        let report = ingest_reader(dump.as_bytes(), Path::new("parts.csv"), &db, |n| {
            calls.push(n)
        })
        .unwrap();
        assert_eq!(report.stored, PROGRESS_INTERVAL * 2 + 5);
        assert_eq!(calls, vec![PROGRESS_INTERVAL, PROGRESS_INTERVAL * 2]);
    }
}
