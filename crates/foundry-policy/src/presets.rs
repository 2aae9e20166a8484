//! Named role checklists.

use crate::error::PermissionError;
use foundry_core::PermissionRequirement;
use std::collections::BTreeMap;

/// Built-in presets for the resources the platform template provisions.
pub fn builtin_presets() -> BTreeMap<String, Vec<String>> {
    let presets: [(&str, &[&str]); 3] = [
        ("foundry-user", &["Azure AI User"]),
        (
            "foundry-developer",
            &["Azure AI Developer", "Cognitive Services OpenAI User"],
        ),
        (
            "knowledge-base",
            &[
                "Search Index Data Contributor",
                "Search Service Contributor",
                "Storage Blob Data Contributor",
            ],
        ),
    ];
    presets
        .into_iter()
        .map(|(name, roles)| {
            (
                name.to_string(),
                roles.iter().map(|r| r.to_string()).collect(),
            )
        })
        .collect()
}

/// Look up a preset. Presets from configuration shadow built-in ones.
pub fn resolve_preset(
    name: &str,
    configured: &BTreeMap<String, Vec<String>>,
) -> Result<PermissionRequirement, PermissionError> {
    if let Some(roles) = configured.get(name) {
        return Ok(PermissionRequirement::new(roles.iter().cloned()));
    }
    let builtin = builtin_presets();
    match builtin.get(name) {
        Some(roles) => Ok(PermissionRequirement::new(roles.iter().cloned())),
        None => {
            let mut known: Vec<&str> = builtin
                .keys()
                .chain(configured.keys())
                .map(String::as_str)
                .collect();
            known.sort_unstable();
            known.dedup();
            Err(PermissionError::UnknownPreset {
                name: name.to_string(),
                known: known.join(", "),
            })
        }
    }
}
