use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde_json::{Map, Value as Json};

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// One result line: named fields in display order.
///
/// `raw` is what `--format raw` prints, usually the single value a script
/// would want.
#[derive(Default)]
pub struct Record {
    fields: Vec<(&'static str, Json)>,
    raw: String,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: &'static str, value: impl Into<Json>) -> Self {
        self.fields.push((name, value.into()));
        self
    }

    pub fn raw(mut self, raw: impl Into<String>) -> Self {
        self.raw = raw.into();
        self
    }

    pub fn render(&self, format: OutputFormat) -> String {
        match format {
            OutputFormat::Json => {
                let map: Map<String, Json> = self
                    .fields
                    .iter()
                    .map(|(name, value)| (name.to_string(), value.clone()))
                    .collect();
                Json::Object(map).to_string()
            }
            OutputFormat::Table => {
                let mut table = Table::new();
                table
                    .load_preset(UTF8_FULL)
                    .set_content_arrangement(ContentArrangement::Dynamic)
                    .set_header(
                        self.fields
                            .iter()
                            .map(|(name, _)| name.to_uppercase())
                            .collect::<Vec<_>>(),
                    )
                    .add_row(
                        self.fields
                            .iter()
                            .map(|(_, value)| display(value))
                            .collect::<Vec<_>>(),
                    );
                table.to_string()
            }
            OutputFormat::Pretty => self
                .fields
                .iter()
                .map(|(name, value)| format!("{name}={}", display(value)))
                .collect::<Vec<_>>()
                .join(" "),
            OutputFormat::Raw => self.raw.clone(),
        }
    }

    pub fn print(&self, format: OutputFormat) {
        let mut out = std::io::stdout();
        let _ = writeln!(out, "{}", self.render(format));
        let _ = out.flush();
    }
}

/// Strings without quotes, everything else as JSON.
pub fn display(value: &Json) -> String {
    match value {
        Json::String(text) => text.clone(),
        Json::Null => "-".to_string(),
        other => other.to_string(),
    }
}
