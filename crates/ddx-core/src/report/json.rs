use std::path::Path;

use super::RunSummary;

pub fn to_json(summary: &RunSummary) -> serde_json::Result<String> {
    serde_json::to_string_pretty(summary)
}

pub fn write_json(summary: &RunSummary, out: &Path) -> anyhow::Result<()> {
    std::fs::write(out, to_json(summary)?)?;
    Ok(())
}
