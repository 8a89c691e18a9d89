// src/workbook/mod.rs

pub mod read;
pub mod write;

pub use read::load_workbook;
pub use write::write_subset;

use std::path::PathBuf;

/// A single cell value, reduced to what survives a values-only copy.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Bool(bool),
}

/// One worksheet as a sparse grid: cells carry their absolute
/// (row, column) coordinates so the copy lands where the source did.
#[derive(Debug, Clone)]
pub struct SheetGrid {
    pub name: String,
    pub cells: Vec<(u32, u32, CellValue)>,
}

/// An in-memory workbook, sheets in source order.
#[derive(Debug, Clone)]
pub struct WorkbookData {
    pub path: PathBuf,
    pub sheets: Vec<SheetGrid>,
    /// Raw `xl/vbaProject.bin` payload of a macro-enabled (`.xlsm`)
    /// source, carried verbatim into the output.
    pub vba_project: Option<Vec<u8>>,
}

impl WorkbookData {
    pub fn sheet_names(&self) -> impl Iterator<Item = &str> {
        self.sheets.iter().map(|s| s.name.as_str())
    }

    /// Exact-name lookup; callers needing fuzzy matching go through
    /// `select::canonical_sheet_name` first.
    pub fn sheet(&self, name: &str) -> Option<&SheetGrid> {
        self.sheets.iter().find(|s| s.name == name)
    }
}
