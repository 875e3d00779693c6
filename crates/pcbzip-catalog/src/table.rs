use comfy_table::{ContentArrangement, Table};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::error::{CatalogError, Result};
use crate::store::QueryResult;

/// Truncate `text` to `width` terminal columns (marking the cut with `…`)
/// and pad it with spaces to exactly `width`.
pub fn fit_to_width(text: &str, width: usize) -> String {
    let text: String = text
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();

    let mut out = String::new();
    if text.width() <= width {
        out.push_str(&text);
    } else if width > 0 {
        let mut used = 0;
        for c in text.chars() {
            let w = c.width().unwrap_or(0);
            if used + w > width - 1 {
                break;
            }
            out.push(c);
            used += w;
        }
        out.push('…');
    }

    let pad = width.saturating_sub(out.width());
    out.extend(std::iter::repeat(' ').take(pad));
    out
}

/// Render query results as a fixed-width table, one column per field
pub fn render_table(result: &QueryResult, widths: &[usize]) -> String {
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Disabled);

    table.set_header(
        result
            .fields
            .iter()
            .zip(widths)
            .map(|(field, width)| fit_to_width(field.display_name(), *width))
            .collect::<Vec<_>>(),
    );
    for record in result.records() {
        table.add_row(
            record
                .iter()
                .zip(widths)
                .map(|(value, width)| fit_to_width(value, *width))
                .collect::<Vec<_>>(),
        );
    }

    table.to_string()
}

/// Render query results as CSV with a header row, for spreadsheet import
pub fn render_csv(result: &QueryResult) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(result.fields.iter().map(|f| f.display_name()))?;
    for record in result.records() {
        writer.write_record(&record)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| CatalogError::Io(e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CatalogField, CatalogRow};

    #[test]
    fn test_fit_to_width() {
        assert_eq!(fit_to_width("0402", 6), "0402  ");
        assert_eq!(fit_to_width("ADS1115IDGSR", 8), "ADS1115…");
        assert_eq!(fit_to_width("ADS1115IDGSR", 12), "ADS1115IDGSR");
        assert_eq!(fit_to_width("abc", 0), "");
        assert_eq!(fit_to_width("abc", 1), "…");
        assert_eq!(fit_to_width("line\nbreak", 10), "line break");
        // Wide characters are measured in terminal columns
        assert_eq!(fit_to_width("电阻器电阻器", 5), "电阻…");
    }

    fn sample() -> QueryResult {
        QueryResult {
            fields: vec![CatalogField::Lcsc, CatalogField::MfrPart, CatalogField::Description],
            rows: vec![CatalogRow {
                lcsc: "C375".to_string(),
                mfr_part: "ADS1115IDGSR".to_string(),
                description: "16-bit, 860SPS ADC".to_string(),
                ..Default::default()
            }],
        }
    }

    #[test]
    fn test_render_table_truncates() {
        let text = render_table(&sample(), &[6, 8, 30]);
        assert!(text.contains("LCSC"));
        assert!(text.contains("MFR.Part"));
        assert!(text.contains("ADS1115…"));
        assert!(!text.contains("ADS1115IDGSR"));
        assert!(text.contains("16-bit, 860SPS ADC"));
    }

    #[test]
    fn test_render_csv_quotes() {
        let csv = render_csv(&sample()).unwrap();
        assert_eq!(
            csv,
            "LCSC,MFR.Part,Description\nC375,ADS1115IDGSR,\"16-bit, 860SPS ADC\"\n"
        );
    }
}
