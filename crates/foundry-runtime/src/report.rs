//! Output reporting.
//!
//! Rendering is best-effort per key: a missing or null output is shown as
//! [`NOT_SET`], never as an error.

use foundry_core::{ChangeType, DeploymentOutputs, GroupRef, WhatIfReport};
use serde_json::Value as JsonValue;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

/// Placeholder for outputs the deployment did not produce.
pub const NOT_SET: &str = "not set";

/// Output keys the follow-up hints read.
pub mod keys {
    pub const PROJECT_NAME: &str = "projectName";
    pub const PROJECT_ENDPOINT: &str = "projectEndpoint";
    pub const ACCOUNT_NAME: &str = "aiFoundryName";
}

fn display_value(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::Null => None,
        JsonValue::String(s) if s.is_empty() => None,
        JsonValue::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// The text of output `key`, or [`NOT_SET`].
pub fn output_text(outputs: &DeploymentOutputs, key: &str) -> String {
    outputs
        .get(key)
        .and_then(|o| display_value(&o.value))
        .unwrap_or_else(|| NOT_SET.to_string())
}

/// One `name: value` line per output, in provider order.
pub fn render(outputs: &DeploymentOutputs) -> Vec<String> {
    outputs
        .iter()
        .map(|(name, output)| {
            let value = display_value(&output.value).unwrap_or_else(|| NOT_SET.to_string());
            format!("  {name}: {value}")
        })
        .collect()
}

/// Next-step hints based on well-known outputs.
pub fn follow_up_hints(outputs: &DeploymentOutputs, group: &GroupRef) -> Vec<String> {
    let project = output_text(outputs, keys::PROJECT_NAME);
    let endpoint = output_text(outputs, keys::PROJECT_ENDPOINT);
    let account = output_text(outputs, keys::ACCOUNT_NAME);

    let mut hints = vec![
        format!("Project:  {project}"),
        format!("Endpoint: {endpoint}"),
    ];
    if account != NOT_SET {
        hints.push(format!(
            "Check access with: foundry-deploy permissions check --principal <object-id> --account {account} --resource-group-name {}",
            group.name
        ));
    }
    hints
}

/// Print the deployment report.
pub fn report(
    out: &mut dyn Write,
    deployment_name: &str,
    group: &GroupRef,
    outputs: &DeploymentOutputs,
) -> io::Result<()> {
    writeln!(out, "✔ Deployment '{deployment_name}' succeeded in '{}'", group.name)?;
    if outputs.is_empty() {
        writeln!(out, "  (no outputs)")?;
    } else {
        writeln!(out, "Outputs:")?;
        for line in render(outputs) {
            writeln!(out, "{line}")?;
        }
    }
    writeln!(out)?;
    writeln!(out, "Next steps:")?;
    for hint in follow_up_hints(outputs, group) {
        writeln!(out, "  {hint}")?;
    }
    Ok(())
}

/// Print a what-if preview.
pub fn report_preview(
    out: &mut dyn Write,
    group_name: &str,
    preview: Option<&WhatIfReport>,
) -> io::Result<()> {
    let Some(preview) = preview else {
        writeln!(
            out,
            "Resource group '{group_name}' does not exist yet; it will be created and every resource in the template deployed."
        )?;
        return Ok(());
    };

    writeln!(out, "What-if preview for '{group_name}':")?;
    for change in &preview.changes {
        writeln!(out, "  [{}] {}", change.change_type, change.resource_id)?;
    }
    let summary: Vec<String> = [
        ChangeType::Create,
        ChangeType::Modify,
        ChangeType::Delete,
        ChangeType::NoChange,
    ]
    .into_iter()
    .map(|t| format!("{} {}", preview.count(t), t))
    .collect();
    writeln!(out, "Summary: {}", summary.join(", "))?;
    Ok(())
}

/// Write outputs as `{"name": {"type": ..., "value": ...}}`, the shape
/// post-deployment scripts read.
pub fn write_outputs_file(path: &Path, outputs: &DeploymentOutputs) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_vec_pretty(outputs)?;
    fs::write(path, json)
}

/// Markdown summary for CI workflow summaries.
pub fn render_summary(
    deployment_name: &str,
    group: &GroupRef,
    outputs: &DeploymentOutputs,
) -> String {
    let mut md = String::new();
    md.push_str(&format!("## Deployment `{deployment_name}`\n\n"));
    md.push_str(&format!(
        "Resource group: `{}` ({})\n\n",
        group.name, group.location
    ));
    if outputs.is_empty() {
        md.push_str("_No outputs._\n");
        return md;
    }
    md.push_str("| Output | Value |\n|---|---|\n");
    for (name, output) in outputs.iter() {
        let value = display_value(&output.value).unwrap_or_else(|| NOT_SET.to_string());
        md.push_str(&format!("| {name} | `{}` |\n", value.replace('|', "\\|")));
    }
    md
}

/// Append `text` to the summary file at `path`.
pub fn append_summary(path: &Path, text: &str) -> io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{text}")
}
