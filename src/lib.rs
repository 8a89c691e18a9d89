pub mod config;
pub mod process;
pub mod select;
pub mod workbook;
