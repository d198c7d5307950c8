//! Output formatting for CLI

use console::style;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format options
pub enum OutputFormat {
    Text,
    Json,
    Table,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            "table" => OutputFormat::Table,
            _ => OutputFormat::Text,
        }
    }
}

/// One resolved item in `inspect`
#[derive(Debug, Serialize, Tabled)]
pub struct SourceRow {
    pub story: usize,
    pub item: usize,
    pub label: String,
    pub kind: String,
    pub source: String,
    pub streaming: String,
    pub preview: String,
}

pub fn table<T: Tabled>(rows: &[T]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

pub fn highlight(text: &str) -> String {
    style(text).cyan().bold().to_string()
}

pub fn success(text: &str) -> String {
    style(text).green().to_string()
}
