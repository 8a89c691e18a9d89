// src/workbook/read.rs

use anyhow::{Context, Result};
use calamine::{open_workbook_auto, Data, Reader};
use std::fs::File;
use std::io::Read as _;
use std::path::Path;
use tracing::{debug, warn};
use zip::ZipArchive;

use crate::workbook::{CellValue, SheetGrid, WorkbookData};

/// Open `path` (`.xlsx` or `.xlsm`) and pull every worksheet into memory
/// as a sparse cell list. The range's start offset is folded into the
/// coordinates so leading empty rows/columns are preserved.
pub fn load_workbook<P: AsRef<Path>>(path: P) -> Result<WorkbookData> {
    let path = path.as_ref();
    let mut source = open_workbook_auto(path)
        .with_context(|| format!("opening workbook {}", path.display()))?;
    let sheet_names = source.sheet_names().to_owned();

    let mut sheets = Vec::with_capacity(sheet_names.len());
    for name in sheet_names {
        let range = source
            .worksheet_range(&name)
            .with_context(|| format!("reading worksheet '{}' in {}", name, path.display()))?;

        let (row_offset, col_offset) = range.start().unwrap_or((0, 0));
        let mut cells = Vec::new();
        for (row, col, value) in range.cells() {
            let cell = match value {
                Data::Empty => continue,
                Data::String(s) => CellValue::Text(s.clone()),
                Data::Float(f) => CellValue::Number(*f),
                Data::Int(i) => CellValue::Number(*i as f64),
                Data::Bool(b) => CellValue::Bool(*b),
                Data::Error(e) => CellValue::Text(format!("{e:?}")),
                // DateTime and duration variants Display as their ISO/serial text
                other => CellValue::Text(other.to_string()),
            };
            cells.push((row_offset + row as u32, col_offset + col as u32, cell));
        }

        debug!(sheet = %name, cells = cells.len(), "loaded worksheet");
        sheets.push(SheetGrid { name, cells });
    }

    let vba_project = if is_macro_enabled(path) {
        match extract_vba_project(path) {
            Ok(Some(bin)) => {
                debug!(bytes = bin.len(), "extracted macro payload");
                Some(bin)
            }
            Ok(None) => {
                warn!(
                    file = %path.display(),
                    "macro-enabled workbook has no vbaProject.bin; output will be a plain copy"
                );
                None
            }
            Err(err) => {
                warn!(
                    file = %path.display(),
                    "could not extract macro payload: {err:#}"
                );
                None
            }
        }
    } else {
        None
    };

    Ok(WorkbookData {
        path: path.to_path_buf(),
        sheets,
        vba_project,
    })
}

fn is_macro_enabled(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("xlsm"))
}

/// Pull the raw `xl/vbaProject.bin` entry out of the workbook archive.
/// calamine parses the VBA container rather than exposing its bytes, so
/// the verbatim payload comes straight from the zip.
fn extract_vba_project(path: &Path) -> Result<Option<Vec<u8>>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut archive = ZipArchive::new(file)
        .with_context(|| format!("reading workbook archive {}", path.display()))?;
    let mut entry = match archive.by_name("xl/vbaProject.bin") {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    let mut bin = Vec::with_capacity(entry.size() as usize);
    entry.read_to_end(&mut bin).context("reading vbaProject.bin")?;
    Ok(Some(bin))
}
