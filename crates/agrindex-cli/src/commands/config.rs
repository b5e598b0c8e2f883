use anyhow::Result;
use serde::Serialize;
use std::path::Path;
use tabled::Tabled;

use crate::config_loader::load_config;
use crate::output::OutputWriter;

#[derive(Debug, Serialize, Tabled)]
struct ConfigRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Source")]
    source: String,
}

/// Show every configuration key with its value and source
pub fn execute(config_file: Option<&Path>, output: &OutputWriter) -> Result<()> {
    let config = load_config(config_file)?;

    let mut rows: Vec<ConfigRow> = config
        .to_inspection_map()
        .into_iter()
        .map(|(key, (value, source))| ConfigRow { key, value, source: format!("{:?}", source) })
        .collect();
    rows.sort_by(|a, b| a.key.cmp(&b.key));

    if let Err(err) = config.validate() {
        output.warning(format!("Configuration is not usable for runs: {}", err));
    }

    if output.is_json() {
        output.result(rows)
    } else {
        output.section("Configuration Values");
        output.table(rows);
        Ok(())
    }
}
