// src/select.rs

use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

use crate::config::ExtractConfig;
use crate::workbook::{CellValue, SheetGrid, WorkbookData};

/// Sheet holding the membership control row.
pub const CONTROL_SHEET: &str = "Incl_Country_LOB_Lst";

/// Normalized form of the `TSHLD_NM` label that marks the control row.
const CONTROL_LABEL: &str = "incl_country_lob_lst";

/// Spelling variants of the administrative log tab seen in the wild.
const CHANGE_LOG_CANDIDATES: &[&str] = &["Change Log", "ChangeLog", "CHANGE LOG", "CHANGE_LOG"];

/// Clean up a cell or sheet-name string: trim, fold typographic dashes
/// to '-', fold NBSP to a plain space.
pub fn normalize(raw: &str) -> String {
    raw.trim()
        .replace('\u{2013}', "-")
        .replace('\u{2014}', "-")
        .replace('\u{a0}', " ")
}

/// Label form used when hunting for the control row: any run of spaces,
/// hyphens or underscores collapses to a single underscore and case is
/// ignored.
fn normalize_label(raw: &str) -> String {
    normalize(raw)
        .split(|c: char| matches!(c, ' ' | '-' | '_'))
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("_")
        .to_lowercase()
}

/// Case-insensitive sheet lookup, returning the workbook's canonical
/// spelling of the name.
pub fn canonical_sheet_name<'a>(workbook: &'a WorkbookData, wanted: &str) -> Option<&'a str> {
    let wanted = wanted.trim().to_lowercase();
    workbook
        .sheet_names()
        .find(|name| name.trim().to_lowercase() == wanted)
}

fn find_change_log<'a>(workbook: &'a WorkbookData) -> Option<&'a str> {
    CHANGE_LOG_CANDIDATES
        .iter()
        .find_map(|candidate| canonical_sheet_name(workbook, candidate))
}

/// Whether the control sheet's membership row contains `key`.
///
/// The first row carrying the `Incl_Country_LOB_Lst` label is
/// authoritative; further labelled rows are reported and ignored. A cell
/// may hold a delimited list of keys, so matching is an uppercase
/// substring test per cell.
pub fn control_row_contains(sheet: &SheetGrid, key: &str) -> bool {
    let key = normalize(key).to_uppercase();

    let mut rows: BTreeMap<u32, Vec<&CellValue>> = BTreeMap::new();
    for (row, _col, value) in &sheet.cells {
        rows.entry(*row).or_default().push(value);
    }

    let mut verdict: Option<bool> = None;
    for (row, cells) in rows {
        let labelled = cells
            .iter()
            .any(|v| matches!(v, CellValue::Text(s) if normalize_label(s) == CONTROL_LABEL));
        if !labelled {
            continue;
        }
        if verdict.is_some() {
            warn!(
                sheet = %sheet.name,
                row,
                "duplicate control row label; first match is authoritative"
            );
            continue;
        }
        verdict = Some(cells.iter().any(
            |v| matches!(v, CellValue::Text(s) if normalize(s).to_uppercase().contains(&key)),
        ));
    }
    verdict.unwrap_or(false)
}

/// Compute the retention set for one workbook:
///
/// 1. the change-log tab, when present;
/// 2. the country tab `TGS_<CC>_<LOB>`, when present;
/// 3. the general tab `TGS_EN_GNRL_<LOB>`, when present AND the control
///    sheet's membership row holds `<REGION>_<CC>_<LOB>`.
///
/// Missing control sheet or control row simply disables step 3.
pub fn sheets_to_keep(workbook: &WorkbookData, cfg: &ExtractConfig) -> BTreeSet<String> {
    let mut keep = BTreeSet::new();

    if let Some(name) = find_change_log(workbook) {
        keep.insert(name.to_string());
    }

    if let Some(name) = canonical_sheet_name(workbook, &cfg.country_tab_name()) {
        keep.insert(name.to_string());
    }

    if let Some(general) = canonical_sheet_name(workbook, &cfg.general_tab_name()) {
        let member = canonical_sheet_name(workbook, CONTROL_SHEET)
            .and_then(|name| workbook.sheet(name))
            .is_some_and(|control| control_row_contains(control, &cfg.membership_key()));
        if member {
            keep.insert(general.to_string());
        }
    }

    keep
}

/// Whether the retention set holds a country-relevant tab (as opposed to
/// just the change log, or nothing).
pub fn is_country_relevant(keep: &BTreeSet<String>, cfg: &ExtractConfig) -> bool {
    let country_tab = cfg.country_tab_name();
    let general_tab = cfg.general_tab_name();
    keep.iter()
        .any(|name| name.eq_ignore_ascii_case(&country_tab) || name.eq_ignore_ascii_case(&general_tab))
}
