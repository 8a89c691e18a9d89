// src/workbook/write.rs

use anyhow::{Context, Result};
use rust_xlsxwriter::Workbook as XlsxWorkbook;
use std::collections::BTreeSet;
use std::io::Write as _;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::workbook::{CellValue, WorkbookData};

/// Serialize the retained subset of `workbook` to `out_path`, keeping the
/// source's relative sheet order and cell coordinates. Cell values are
/// copied (formulas and formatting are not); a macro payload, when the
/// source carried one, is attached verbatim so `.xlsm` outputs stay
/// macro-enabled.
pub fn write_subset<P: AsRef<Path>>(
    workbook: &WorkbookData,
    keep: &BTreeSet<String>,
    out_path: P,
) -> Result<()> {
    let out_path = out_path.as_ref();
    let mut out = XlsxWorkbook::new();

    let mut kept = 0usize;
    for sheet in workbook.sheets.iter().filter(|s| keep.contains(&s.name)) {
        let ws = out.add_worksheet();
        ws.set_name(&sheet.name)
            .with_context(|| format!("naming output sheet '{}'", sheet.name))?;
        for (row, col, cell) in &sheet.cells {
            let col = *col as u16;
            match cell {
                CellValue::Text(s) => ws.write_string(*row, col, s)?,
                CellValue::Number(n) => ws.write_number(*row, col, *n)?,
                CellValue::Bool(b) => ws.write_boolean(*row, col, *b)?,
            };
        }
        debug!(sheet = %sheet.name, cells = sheet.cells.len(), "copied worksheet");
        kept += 1;
    }

    // An xlsx file needs at least one worksheet; an empty retention set
    // still yields a valid (blank) output.
    if kept == 0 {
        out.add_worksheet();
    }

    // The staged file must outlive `save`; the writer pulls the payload
    // from disk when assembling the archive.
    let mut _staged: Option<NamedTempFile> = None;
    if let Some(vba) = &workbook.vba_project {
        let mut tmp = NamedTempFile::new().context("staging macro payload")?;
        tmp.write_all(vba).context("staging macro payload")?;
        tmp.flush().context("staging macro payload")?;
        out.add_vba_project(tmp.path())
            .context("attaching macro payload")?;
        debug!(bytes = vba.len(), "carried macro payload");
        _staged = Some(tmp);
    }

    out.save(out_path)
        .with_context(|| format!("saving output workbook {}", out_path.display()))?;
    Ok(())
}
