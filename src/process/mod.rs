// src/process/mod.rs

use anyhow::{bail, Context, Result};
use glob::glob;
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::config::ExtractConfig;
use crate::select::{is_country_relevant, sheets_to_keep};
use crate::workbook::{load_workbook, write_subset};

/// Result of processing one workbook.
#[derive(Debug)]
pub struct ProcessOutcome {
    pub path: PathBuf,
    pub kept: BTreeSet<String>,
    /// Where the filtered copy landed; `None` under --dry-run.
    pub output: Option<PathBuf>,
}

/// End-of-run totals for the batch.
#[derive(Debug, Default, PartialEq)]
pub struct RunSummary {
    pub processed: usize,
    pub written: usize,
    pub failed: usize,
}

/// Output path: `<output_dir>/<stem>__<CC>.<ext>`.
pub fn output_path_for(input: &Path, output_dir: &Path, country_code: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("workbook");
    let ext = input
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("xlsx");
    output_dir.join(format!("{stem}__{country_code}.{ext}"))
}

/// Filter one workbook down to its retention set and, unless dry-running,
/// write the copy. The source file is never mutated.
#[tracing::instrument(level = "info", skip(path, cfg), fields(file = %path.as_ref().display()))]
pub fn process_workbook<P: AsRef<Path>>(path: P, cfg: &ExtractConfig) -> Result<ProcessOutcome> {
    let path = path.as_ref();
    let workbook = load_workbook(path)?;
    let kept = sheets_to_keep(&workbook, cfg);

    if !is_country_relevant(&kept, cfg) {
        warn!(
            kept = ?kept,
            "no country-relevant tab found; output will hold the change log only (or nothing)"
        );
    }

    if cfg.dry_run {
        info!(kept = ?kept, "dry-run: would keep");
        return Ok(ProcessOutcome {
            path: path.to_path_buf(),
            kept,
            output: None,
        });
    }

    fs::create_dir_all(&cfg.output_dir)
        .with_context(|| format!("creating output directory {}", cfg.output_dir.display()))?;
    let out_path = output_path_for(path, &cfg.output_dir, &cfg.country_code());
    write_subset(&workbook, &kept, &out_path)?;
    info!(out = %out_path.display(), kept = ?kept, "wrote filtered workbook");

    Ok(ProcessOutcome {
        path: path.to_path_buf(),
        kept,
        output: Some(out_path),
    })
}

/// Find every `.xlsx`/`.xlsm` under `input_dir`, recursively, sorted for
/// a deterministic processing order.
pub fn discover_workbooks(input_dir: &Path) -> Result<Vec<PathBuf>> {
    let pattern = format!("{}/**/*", input_dir.display());
    let mut found = Vec::new();
    for entry in glob(&pattern)? {
        let path = entry?;
        if !path.is_file() {
            continue;
        }
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        if matches!(ext.as_deref(), Some("xlsx") | Some("xlsm")) {
            found.push(path);
        }
    }
    found.sort();
    Ok(found)
}

/// Process every workbook under the configured input directory.
/// Per-file failures are reported and the batch continues; the caller
/// turns a non-zero `failed` count into the exit status.
pub fn run(cfg: &ExtractConfig) -> Result<RunSummary> {
    if !cfg.input_dir.exists() {
        bail!("input dir does not exist: {}", cfg.input_dir.display());
    }

    let paths = discover_workbooks(&cfg.input_dir)?;
    info!(count = paths.len(), "discovered scenario workbooks");

    // Output paths are disjoint by construction (distinct stems, fixed
    // country code), so workbooks fan out without coordination.
    let results: Vec<(PathBuf, Result<ProcessOutcome>)> = paths
        .par_iter()
        .map(|path| (path.clone(), process_workbook(path, cfg)))
        .collect();

    let mut summary = RunSummary::default();
    for (path, result) in results {
        match result {
            Ok(outcome) => {
                summary.processed += 1;
                if outcome.output.is_some() {
                    summary.written += 1;
                }
            }
            Err(err) => {
                summary.failed += 1;
                error!(file = %path.display(), "failed to process workbook: {err:#}");
            }
        }
    }

    info!(
        processed = summary.processed,
        written = summary.written,
        failed = summary.failed,
        "run summary"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use rust_xlsxwriter::Workbook as XlsxWorkbook;
    use tempfile::tempdir;

    /// Build a scenario fixture the shape the real workbooks have: a
    /// change log, country tabs, the shared general tab, and a control
    /// sheet whose labelled row may or may not carry the membership key.
    fn build_fixture(path: &Path, with_country_tab: bool, include_key: Option<&str>) -> Result<()> {
        let mut wb = XlsxWorkbook::new();
        wb.add_worksheet()
            .set_name("Change Log")?
            .write_string(0, 0, "v1")?;
        if with_country_tab {
            wb.add_worksheet()
                .set_name("TGS_EC_ICG")?
                .write_string(0, 0, "scenario data")?;
        }
        wb.add_worksheet().set_name("TGS_EN_GNRL_ICG")?;
        let control = wb.add_worksheet();
        control.set_name("Incl_Country_LOB_Lst")?;
        control.write_string(1, 1, "Incl_Country_LOB_Lst")?;
        if let Some(key) = include_key {
            control.write_string(1, 11, key)?;
        }
        // other-country tabs that must be dropped
        wb.add_worksheet().set_name("TGS_AR_ICG")?;
        wb.add_worksheet().set_name("TGS_BR_ICG")?;
        wb.save(path)?;
        Ok(())
    }

    fn cfg(input_dir: &Path, output_dir: &Path, dry_run: bool) -> ExtractConfig {
        ExtractConfig {
            input_dir: input_dir.to_path_buf(),
            output_dir: output_dir.to_path_buf(),
            country: "EC".to_string(),
            region: "LATAM".to_string(),
            lob: "ICG".to_string(),
            dry_run,
        }
    }

    fn names(keep: &BTreeSet<String>) -> Vec<&str> {
        keep.iter().map(|s| s.as_str()).collect()
    }

    #[test]
    fn keeps_change_log_country_and_general_tab() -> Result<()> {
        let dir = tempdir()?;
        let (inp, out) = (dir.path().join("in"), dir.path().join("out"));
        fs::create_dir_all(&inp)?;

        let src = inp.join("Scenario_116000079.xlsx");
        build_fixture(&src, true, Some("LATAM_EC_ICG"))?;

        let outcome = process_workbook(&src, &cfg(&inp, &out, false))?;
        assert_eq!(
            names(&outcome.kept),
            vec!["Change Log", "TGS_EC_ICG", "TGS_EN_GNRL_ICG"]
        );

        let out_path = outcome.output.unwrap();
        assert_eq!(
            out_path.file_name().unwrap().to_str().unwrap(),
            "Scenario_116000079__EC.xlsx"
        );
        let written = crate::workbook::load_workbook(&out_path)?;
        assert_eq!(
            written.sheet_names().collect::<Vec<_>>(),
            vec!["Change Log", "TGS_EC_ICG", "TGS_EN_GNRL_ICG"]
        );
        Ok(())
    }

    #[test]
    fn general_tab_dropped_without_membership() -> Result<()> {
        let dir = tempdir()?;
        let (inp, out) = (dir.path().join("in"), dir.path().join("out"));
        fs::create_dir_all(&inp)?;

        let src = inp.join("Scenario_External.xlsx");
        build_fixture(&src, true, Some("EMEA_PL_ICG"))?;

        let outcome = process_workbook(&src, &cfg(&inp, &out, false))?;
        assert_eq!(names(&outcome.kept), vec!["Change Log", "TGS_EC_ICG"]);
        Ok(())
    }

    #[test]
    fn log_only_workbook_is_still_written() -> Result<()> {
        let dir = tempdir()?;
        let (inp, out) = (dir.path().join("in"), dir.path().join("out"));
        fs::create_dir_all(&inp)?;

        let src = inp.join("Scenario_Other.xlsx");
        build_fixture(&src, false, None)?;

        let outcome = process_workbook(&src, &cfg(&inp, &out, false))?;
        assert_eq!(names(&outcome.kept), vec!["Change Log"]);

        let written = crate::workbook::load_workbook(&outcome.output.unwrap())?;
        assert_eq!(written.sheet_names().collect::<Vec<_>>(), vec!["Change Log"]);
        Ok(())
    }

    #[test]
    fn dry_run_writes_nothing_but_computes_the_same_set() -> Result<()> {
        let dir = tempdir()?;
        let (inp, out) = (dir.path().join("in"), dir.path().join("out"));
        fs::create_dir_all(&inp)?;

        let src = inp.join("Scenario_116000079.xlsx");
        build_fixture(&src, true, Some("LATAM_EC_ICG"))?;

        let dry = process_workbook(&src, &cfg(&inp, &out, true))?;
        assert!(dry.output.is_none());
        assert!(!out.exists(), "dry-run must not create the output dir");

        let wet = process_workbook(&src, &cfg(&inp, &out, false))?;
        assert_eq!(dry.kept, wet.kept);
        Ok(())
    }

    #[test]
    fn xlsm_workbook_round_trips_with_macro_payload() -> Result<()> {
        let dir = tempdir()?;
        let (inp, out) = (dir.path().join("in"), dir.path().join("out"));
        fs::create_dir_all(&inp)?;

        // OLE compound-file magic followed by filler; carried verbatim
        let mut payload = vec![0xD0u8, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
        payload.extend_from_slice(&[0u8; 120]);
        let mut staged = tempfile::NamedTempFile::new()?;
        std::io::Write::write_all(&mut staged, &payload)?;

        let src = inp.join("Scenario_Macro.xlsm");
        let mut wb = XlsxWorkbook::new();
        wb.add_worksheet().set_name("Change Log")?;
        wb.add_worksheet()
            .set_name("TGS_EC_ICG")?
            .write_string(0, 0, "scenario data")?;
        wb.add_worksheet().set_name("TGS_AR_ICG")?;
        wb.add_vba_project(staged.path())?;
        wb.save(&src)?;

        let outcome = process_workbook(&src, &cfg(&inp, &out, false))?;
        let out_path = outcome.output.unwrap();
        assert_eq!(
            out_path.file_name().unwrap().to_str().unwrap(),
            "Scenario_Macro__EC.xlsm"
        );

        let written = crate::workbook::load_workbook(&out_path)?;
        assert_eq!(
            written.sheet_names().collect::<Vec<_>>(),
            vec!["Change Log", "TGS_EC_ICG"]
        );
        assert_eq!(written.vba_project, Some(payload));
        Ok(())
    }

    #[test]
    fn output_naming_preserves_stem_and_extension() {
        let out = output_path_for(
            Path::new("/data/in/Scenario_1.xlsm"),
            Path::new("/data/out"),
            "EC",
        );
        assert_eq!(out, Path::new("/data/out/Scenario_1__EC.xlsm"));
    }

    #[test]
    fn discovery_finds_workbooks_recursively_and_sorted() -> Result<()> {
        let dir = tempdir()?;
        let nested = dir.path().join("2024").join("q3");
        fs::create_dir_all(&nested)?;

        build_fixture(&dir.path().join("b.xlsx"), true, None)?;
        build_fixture(&nested.join("a.xlsx"), true, None)?;
        fs::write(dir.path().join("notes.txt"), "ignored")?;

        let found = discover_workbooks(dir.path())?;
        assert_eq!(found.len(), 2);
        assert!(found[0].ends_with("2024/q3/a.xlsx"));
        assert!(found[1].ends_with("b.xlsx"));
        Ok(())
    }

    #[test]
    fn batch_continues_past_unreadable_files() -> Result<()> {
        let dir = tempdir()?;
        let (inp, out) = (dir.path().join("in"), dir.path().join("out"));
        fs::create_dir_all(&inp)?;

        build_fixture(&inp.join("good.xlsx"), true, Some("LATAM_EC_ICG"))?;
        fs::write(inp.join("broken.xlsx"), b"definitely not a workbook")?;

        let summary = run(&cfg(&inp, &out, false))?;
        assert_eq!(
            summary,
            RunSummary {
                processed: 1,
                written: 1,
                failed: 1
            }
        );
        assert!(out.join("good__EC.xlsx").exists());
        Ok(())
    }

    #[test]
    fn missing_input_dir_is_a_hard_error() {
        let dir = tempdir().unwrap();
        let gone = dir.path().join("nope");
        let err = run(&cfg(&gone, &dir.path().join("out"), false)).unwrap_err();
        assert!(format!("{err:#}").contains("input dir"));
    }
}
