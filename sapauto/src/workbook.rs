//! Work item loading from the logon workbook
//!
//! Every sheet of the workbook is read in order. The first row of a sheet is
//! a header; each following row carries system, client and user in its first
//! three columns.

use crate::errors::AutomationError;
use crate::types::WorkItem;
use calamine::{open_workbook_auto, Data, Reader};
use std::path::Path;
use tracing::{debug, info, warn};

/// Work items of a single sheet, in row order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetItems {
    pub name: String,
    pub items: Vec<WorkItem>,
}

/// Read all sheets of `path`. Sheets without data rows are dropped with a warning.
pub fn read_work_items(path: impl AsRef<Path>) -> Result<Vec<SheetItems>, AutomationError> {
    let path = path.as_ref();
    let workbook_error = |message: String| AutomationError::Workbook {
        path: path.display().to_string(),
        message,
    };

    let mut workbook = open_workbook_auto(path).map_err(|e| workbook_error(e.to_string()))?;
    let mut sheets = Vec::new();

    for name in workbook.sheet_names() {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| workbook_error(format!("sheet '{name}': {e}")))?;

        let first_row = range.start().map(|(row, _)| row as usize).unwrap_or(0);
        let items = items_from_rows(&name, range.rows(), first_row);
        if items.is_empty() {
            warn!("Sheet '{}' is empty. Skipping...", name);
            continue;
        }
        debug!(sheet = %name, rows = items.len(), "sheet parsed");
        sheets.push(SheetItems { name, items });
    }

    info!(
        "All sheets from '{}' read successfully",
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string())
    );
    Ok(sheets)
}

/// Flatten sheets into the sequence the batch runner consumes.
pub fn into_work_items(sheets: Vec<SheetItems>) -> Vec<WorkItem> {
    sheets.into_iter().flat_map(|sheet| sheet.items).collect()
}

/// Turn raw sheet rows into work items, skipping the header row.
///
/// `first_row` is the zero-based sheet row the range starts at, used to
/// report 1-based row numbers that match what a spreadsheet shows.
pub fn items_from_rows<'a>(
    sheet: &str,
    rows: impl Iterator<Item = &'a [Data]>,
    first_row: usize,
) -> Vec<WorkItem> {
    let mut items = Vec::new();
    for (index, row) in rows.enumerate().skip(1) {
        let row_number = first_row + index + 1;
        let cells: Vec<Option<String>> = (0..3).map(|i| row.get(i).and_then(cell_text)).collect();

        if cells.iter().all(Option::is_none) {
            continue;
        }
        match (&cells[0], &cells[1], &cells[2]) {
            (Some(system), Some(client), Some(user)) => {
                items.push(
                    WorkItem::new(system.clone(), client.clone(), user.clone())
                        .with_origin(sheet, row_number),
                );
            }
            _ => warn!(
                sheet,
                row = row_number,
                "Row is missing system, client or user. Skipping."
            ),
        }
    }
    items
}

/// Render a cell as text. Whole floats lose their fraction so client `100.0` reads as `"100"`.
pub fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Data::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(format!("{}", *f as i64)),
        Data::Int(i) => Some(i.to_string()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> Data {
        Data::String(v.to_string())
    }

    #[test]
    fn test_cell_text_numeric_client() {
        assert_eq!(cell_text(&Data::Float(100.0)), Some("100".to_string()));
        assert_eq!(cell_text(&Data::Int(200)), Some("200".to_string()));
        assert_eq!(cell_text(&Data::Float(1.5)), Some("1.5".to_string()));
    }

    #[test]
    fn test_cell_text_blank() {
        assert_eq!(cell_text(&Data::Empty), None);
        assert_eq!(cell_text(&s("   ")), None);
        assert_eq!(cell_text(&s(" SYS1 ")), Some("SYS1".to_string()));
    }

    #[test]
    fn test_rows_skip_header_and_record_origin() {
        let rows = [
            vec![s("system"), s("client"), s("user")],
            vec![s("SYS1"), Data::Float(100.0), s("alice")],
            vec![s("SYS2"), s("200"), s("bob")],
        ];
        let items = items_from_rows("Sheet1", rows.iter().map(Vec::as_slice), 0);

        assert_eq!(items.len(), 2);
        assert_eq!(items[0], WorkItem::new("SYS1", "100", "alice").with_origin("Sheet1", 2));
        assert_eq!(items[1].row, Some(3));
    }

    #[test]
    fn test_incomplete_and_blank_rows_are_skipped() {
        let rows = [
            vec![s("system"), s("client"), s("user")],
            vec![s("SYS1"), Data::Empty, s("alice")],
            vec![Data::Empty, Data::Empty, Data::Empty],
            vec![s("SYS3"), Data::Int(300)],
            vec![s("SYS4"), Data::Int(400), s("dave"), s("ignored")],
        ];
        let items = items_from_rows("S", rows.iter().map(Vec::as_slice), 4);

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].system_name, "SYS4");
        assert_eq!(items[0].row, Some(9));
    }

    #[test]
    fn test_header_only_sheet_is_empty() {
        let rows = [vec![s("system"), s("client"), s("user")]];
        assert!(items_from_rows("S", rows.iter().map(Vec::as_slice), 0).is_empty());
    }

    #[test]
    fn test_flatten_keeps_sheet_order() {
        let sheets = vec![
            SheetItems {
                name: "A".into(),
                items: vec![WorkItem::new("SYS1", "100", "alice")],
            },
            SheetItems {
                name: "B".into(),
                items: vec![WorkItem::new("SYS2", "200", "bob")],
            },
        ];
        let items = into_work_items(sheets);
        assert_eq!(items[0].system_name, "SYS1");
        assert_eq!(items[1].system_name, "SYS2");
    }

    #[test]
    fn test_missing_workbook() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_work_items(dir.path().join("logon_sap.xlsx")).unwrap_err();
        assert!(matches!(err, AutomationError::Workbook { .. }));
    }
}
