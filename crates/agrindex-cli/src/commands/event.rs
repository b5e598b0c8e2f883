use agrindex_core::models::TriggerRef;
use anyhow::Result;
use std::io::Read;
use std::path::Path;

use crate::cli::EventArgs;
use crate::config_loader::load_config_with_overrides;
use crate::errors;
use crate::output::OutputWriter;

pub async fn execute(args: EventArgs, config_file: Option<&Path>, output: &OutputWriter) -> Result<()> {
    let document = read_event(&args.path)?;
    let trigger = TriggerRef::from_event_json(&document).map_err(|e| errors::event_malformed(&e))?;

    let config = load_config_with_overrides(config_file, args.overrides.into())?;
    super::run::process(trigger, &config, output).await
}

fn read_event(path: &Path) -> Result<String> {
    let label = path.display().to_string();
    let read = if label == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf).map(|_| buf)
    } else {
        std::fs::read_to_string(path)
    };

    read.map_err(|e| errors::event_unreadable(&label, &e).into())
}
