//! Recognise BOM exports and convert them to the four column assembly shape
//!
//! Two shapes are accepted: the canonical one (`Comment,Designator,Footprint`
//! plus the supplier part column, under any known alias) and KiCad's grouped
//! export, whose extra metadata columns are dropped. Anything else is refused.

use std::fs;
use std::io::Write;
use std::path::Path;

use atomicwrites::{AtomicFile, OverwriteBehavior};
use csv::StringRecord;

use crate::error::{BomError, Result};
use crate::line::BomLine;

pub const CANONICAL_HEADER: [&str; 4] = ["Comment", "Designator", "Footprint", "LCSC Part #"];

/// Columns that may appear in a grouped export and are dropped (lowercase)
const METADATA_COLUMNS: &[&str] = &[
    "id",
    "qty",
    "quantity",
    "qnty",
    "description",
    "cmp name",
    "vendor",
    "dnp",
    "datasheet",
    "supplier and ref",
    "manufacturer",
    "mpn",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Comment,
    Designator,
    Footprint,
    PartNumber,
}

impl Column {
    const ALL: [Column; 4] = [
        Column::Comment,
        Column::Designator,
        Column::Footprint,
        Column::PartNumber,
    ];

    fn aliases(self) -> &'static [&'static str] {
        match self {
            Column::Comment => &["comment", "value", "val", "designation"],
            Column::Designator => &["designator", "reference", "references", "ref", "refs"],
            Column::Footprint => &["footprint", "package"],
            Column::PartNumber => &[
                "lcsc part #",
                "lcsc part",
                "lcsc",
                "jlcpcb part #",
                "jlcpcb part",
            ],
        }
    }

    fn lookup(header: &str) -> Option<Self> {
        let header = header.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| c.aliases().contains(&header.as_str()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BomShape {
    /// Exactly the four assembly columns
    Canonical,
    /// Grouped export with metadata columns to drop
    Grouped,
}

/// Where each assembly column lives in the source file
#[derive(Debug)]
struct Layout {
    shape: BomShape,
    comment: usize,
    designator: usize,
    footprint: usize,
    part_number: Option<usize>,
}

impl Layout {
    fn from_headers(headers: &StringRecord) -> Option<Self> {
        let mut found: [Option<usize>; 4] = [None; 4];
        let mut metadata = false;

        for (idx, header) in headers.iter().enumerate() {
            let header = header.trim_start_matches('\u{feff}').trim();
            if header.is_empty() {
                // KiCad ends grouped exports with a trailing delimiter
                continue;
            }
            if let Some(column) = Column::lookup(header) {
                let slot = &mut found[column as usize];
                if slot.is_some() {
                    return None;
                }
                *slot = Some(idx);
            } else if METADATA_COLUMNS.contains(&header.to_lowercase().as_str()) {
                metadata = true;
            } else {
                return None;
            }
        }

        let [Some(comment), Some(designator), Some(footprint), part_number] = found else {
            return None;
        };
        let shape = if !metadata && part_number.is_some() {
            BomShape::Canonical
        } else {
            BomShape::Grouped
        };
        Some(Self {
            shape,
            comment,
            designator,
            footprint,
            part_number,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedBom {
    pub shape: BomShape,
    pub delimiter: u8,
    /// Header cells as read, joined with the source delimiter
    pub header: String,
    pub lines: Vec<BomLine>,
    /// Rows dropped for a missing designator or footprint
    pub skipped: usize,
    /// Whether writing the canonical form back would change the file
    pub needs_rewrite: bool,
}

impl NormalizedBom {
    /// Replace `path` with the canonical rendering of these lines
    pub fn write_back(&self, path: &Path) -> Result<()> {
        write_bom(path, &self.lines)
    }
}

fn sniff_delimiter(header_line: &str) -> u8 {
    let count = |d: char| header_line.chars().filter(|c| *c == d).count();
    if count(';') > count(',') {
        b';'
    } else {
        b','
    }
}

fn header_text(headers: &StringRecord, delimiter: u8) -> String {
    let mut text = headers
        .iter()
        .collect::<Vec<_>>()
        .join(&char::from(delimiter).to_string());
    text.truncate(text.trim_end().len());
    text.trim_start_matches('\u{feff}').to_string()
}

/// Normalize BOM text already read into memory
pub fn parse_bom(text: &str) -> Result<NormalizedBom> {
    let body = text.trim_start_matches('\u{feff}');
    // The csv reader skips blank lines, so sniff the first line it will read
    let first_line = body.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
    let delimiter = sniff_delimiter(first_line);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .has_headers(true)
        .from_reader(body.as_bytes());

    let headers = reader.headers()?.clone();
    let header = header_text(&headers, delimiter);
    let layout =
        Layout::from_headers(&headers).ok_or_else(|| BomError::UnsupportedBomFormat {
            header: header.clone(),
            required: CANONICAL_HEADER.join(","),
        })?;
    log::debug!("Recognised {:?} BOM header `{header}`", layout.shape);

    let mut lines = Vec::new();
    let mut skipped = 0;
    for result in reader.records() {
        let record = result?;
        let field = |idx: usize| record.get(idx).unwrap_or("").trim();

        let designator = field(layout.designator);
        let footprint = field(layout.footprint);
        if designator.is_empty() || footprint.is_empty() {
            log::debug!(
                "Skipping BOM row without designator or footprint at line {:?}",
                record.position().map(|p| p.line())
            );
            skipped += 1;
            continue;
        }

        lines.push(BomLine::new(
            field(layout.comment),
            designator,
            footprint,
            layout.part_number.map(field).unwrap_or(""),
        ));
    }

    let needs_rewrite = render_bom(&lines)? != text;
    Ok(NormalizedBom {
        shape: layout.shape,
        delimiter,
        header,
        lines,
        skipped,
        needs_rewrite,
    })
}

pub fn read_bom(path: &Path) -> Result<NormalizedBom> {
    let text = fs::read_to_string(path)?;
    parse_bom(&text)
}

/// Canonical CSV rendering, CRLF terminated
pub fn render_bom(lines: &[BomLine]) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(Vec::new());
    writer.write_record(CANONICAL_HEADER)?;
    for line in lines {
        writer.write_record([
            &line.comment,
            &line.designator,
            &line.footprint,
            &line.part_number,
        ])?;
    }
    let bytes = writer.into_inner().map_err(|e| BomError::Io(e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Atomically replace `path` with the full canonical BOM
pub fn write_bom(path: &Path, lines: &[BomLine]) -> Result<()> {
    let text = render_bom(lines)?;
    AtomicFile::new(path, OverwriteBehavior::AllowOverwrite)
        .write(|f| {
            f.write_all(text.as_bytes())?;
            f.flush()
        })
        .map_err(|err| BomError::Persist {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const GROUPED: &str = "\"Id\";\"Designator\";\"Footprint\";\"Quantity\";\"Designation\";\"Supplier and ref\";\n\
        1;\"C1,C2\";\"Capacitor_SMD:C_0402_1005Metric\";2;\"100n\";;;\n\
        2;\"R1\";\"Resistor_SMD:R_0402_1005Metric\";1;\"10k\";;;\n";

    #[test]
    fn test_grouped_export_is_transformed() {
        let bom = parse_bom(GROUPED).unwrap();
        assert_eq!(bom.shape, BomShape::Grouped);
        assert_eq!(bom.delimiter, b';');
        assert!(bom.needs_rewrite);
        assert_eq!(
            bom.lines,
            vec![
                BomLine::new("100n", "C1,C2", "Capacitor_SMD:C_0402_1005Metric", ""),
                BomLine::new("10k", "R1", "Resistor_SMD:R_0402_1005Metric", ""),
            ]
        );
        assert_eq!(bom.lines[0].quantity(), 2);

        assert_eq!(
            render_bom(&bom.lines).unwrap(),
            "Comment,Designator,Footprint,LCSC Part #\r\n\
             100n,\"C1,C2\",Capacitor_SMD:C_0402_1005Metric,\r\n\
             10k,R1,Resistor_SMD:R_0402_1005Metric,\r\n"
        );
    }

    #[test]
    fn test_canonical_aliases_are_accepted() {
        let text = "Value,Reference,Package,LCSC\n100n,C1,0402,C1525\n";
        let bom = parse_bom(text).unwrap();
        assert_eq!(bom.shape, BomShape::Canonical);
        assert_eq!(bom.lines, vec![BomLine::new("100n", "C1", "0402", "C1525")]);
        assert!(bom.needs_rewrite);
    }

    #[test]
    fn test_normalizing_twice_is_identical() {
        let first = render_bom(&parse_bom(GROUPED).unwrap().lines).unwrap();
        let again = parse_bom(&first).unwrap();
        assert_eq!(again.shape, BomShape::Canonical);
        assert!(!again.needs_rewrite);
        assert_eq!(render_bom(&again.lines).unwrap(), first);
    }

    #[test]
    fn test_unsupported_header_is_refused() {
        for header in [
            "Reference,Value,Footprint,Colour",
            "Designator,Footprint,LCSC Part #",
            "Comment,Designator,Designator,Footprint",
        ] {
            let err = parse_bom(&format!("{header}\nx,y,z,w\n")).unwrap_err();
            match err {
                BomError::UnsupportedBomFormat {
                    header: found,
                    required,
                } => {
                    assert_eq!(found, header);
                    assert_eq!(required, "Comment,Designator,Footprint,LCSC Part #");
                }
                other => panic!("unexpected error {other}"),
            }
        }
    }

    #[test]
    fn test_refused_header_after_blank_lines_is_reported() {
        let err = parse_bom("\n\nRef;Colour;Footprint\nC1;red;0402\n").unwrap_err();
        assert!(matches!(
            err,
            BomError::UnsupportedBomFormat { ref header, .. } if header == "Ref;Colour;Footprint"
        ));

        let err = parse_bom("").unwrap_err();
        assert!(matches!(
            err,
            BomError::UnsupportedBomFormat { ref header, .. } if header.is_empty()
        ));
    }

    #[test]
    fn test_rows_without_designator_are_skipped() {
        let text = "Comment,Designator,Footprint,LCSC Part #\r\n\
                    100n,C1,0402,\r\n\
                    DNP,,0402,\r\n";
        let bom = parse_bom(text).unwrap();
        assert_eq!(bom.lines.len(), 1);
        assert_eq!(bom.skipped, 1);
    }

    #[test]
    fn test_write_back_replaces_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("board.csv");
        fs::write(&path, GROUPED).unwrap();

        let bom = read_bom(&path).unwrap();
        bom.write_back(&path).unwrap();

        let reread = read_bom(&path).unwrap();
        assert_eq!(reread.shape, BomShape::Canonical);
        assert_eq!(reread.lines, bom.lines);
        assert!(!reread.needs_rewrite);
    }
}
