// src/config.rs

use clap::Parser;
use std::path::PathBuf;

/// Extract country-relevant sheets from TGS scenario workbooks.
#[derive(Parser, Debug, Clone)]
#[command(name = "tgsextract")]
pub struct ExtractConfig {
    /// Directory containing scenario workbooks (.xlsx/.xlsm)
    #[arg(long)]
    pub input_dir: PathBuf,

    /// Directory to write filtered copies into (created if absent)
    #[arg(long)]
    pub output_dir: PathBuf,

    /// 2-letter country code, e.g. EC for Ecuador
    #[arg(long, value_parser = parse_country_code)]
    pub country: String,

    /// Region prefix used in Incl_Country_LOB_Lst keys
    #[arg(long, default_value = "LATAM")]
    pub region: String,

    /// LOB suffix used in sheet names
    #[arg(long, default_value = "ICG")]
    pub lob: String,

    /// Do not write files; only report what would be kept
    #[arg(long)]
    pub dry_run: bool,
}

fn parse_country_code(raw: &str) -> Result<String, String> {
    let code = raw.trim();
    if code.len() == 2 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(code.to_ascii_uppercase())
    } else {
        Err(format!(
            "'{raw}' is not a 2-letter country code (e.g. EC, PL)"
        ))
    }
}

impl ExtractConfig {
    pub fn country_code(&self) -> String {
        self.country.trim().to_uppercase()
    }

    pub fn lob_code(&self) -> String {
        self.lob.trim().to_uppercase()
    }

    /// Sheet name of the country-specific tab, e.g. `TGS_EC_ICG`.
    pub fn country_tab_name(&self) -> String {
        format!("TGS_{}_{}", self.country_code(), self.lob_code())
    }

    /// Sheet name of the shared general tab, e.g. `TGS_EN_GNRL_ICG`.
    pub fn general_tab_name(&self) -> String {
        format!("TGS_EN_GNRL_{}", self.lob_code())
    }

    /// Membership key looked up in the control row, e.g. `LATAM_EC_ICG`.
    pub fn membership_key(&self) -> String {
        format!(
            "{}_{}_{}",
            self.region.trim().to_uppercase(),
            self.country_code(),
            self.lob_code()
        )
    }
}
