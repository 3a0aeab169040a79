//! Alias-map configuration.
//!
//! Both formats map a canonical label to one pattern or a list of patterns:
//!
//! ```yaml
//! AMSR: "AMSR*"
//! MWRI: ["MWRI", "MWRI-*"]
//! ```
//!
//! Declaration order is kept because earlier canonical labels win ambiguous
//! matches.

use serde::Deserialize;
use spectrum_kernel_core::AliasMap;

use crate::IngestError;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PatternList {
    One(String),
    Many(Vec<String>),
}

impl PatternList {
    fn into_patterns(self) -> Vec<String> {
        match self {
            Self::One(pattern) => vec![pattern],
            Self::Many(patterns) => patterns,
        }
    }
}

fn push_entry(
    alias_map: &mut AliasMap,
    canonical: &str,
    patterns: PatternList,
) -> Result<(), IngestError> {
    let canonical = canonical.trim();
    if canonical.is_empty() {
        return Err(IngestError::InvalidConfig(
            "alias canonical label MUST NOT be blank".to_string(),
        ));
    }
    if alias_map.rules().iter().any(|rule| rule.canonical == canonical) {
        return Err(IngestError::InvalidConfig(format!("alias `{canonical}` declared twice")));
    }
    let patterns = patterns.into_patterns();
    if patterns.is_empty() || patterns.iter().any(|pattern| pattern.trim().is_empty()) {
        return Err(IngestError::InvalidConfig(format!(
            "alias `{canonical}` MUST list at least one non-blank pattern"
        )));
    }
    alias_map.push_rule(canonical, patterns);
    Ok(())
}

/// # Errors
/// Returns [`IngestError::InvalidConfig`] for malformed JSON, blank labels or
/// patterns, and duplicate canonical labels.
pub fn alias_map_from_json_str(text: &str) -> Result<AliasMap, IngestError> {
    let object: serde_json::Map<String, serde_json::Value> = serde_json::from_str(text)
        .map_err(|err| IngestError::InvalidConfig(format!("alias map JSON: {err}")))?;
    let mut alias_map = AliasMap::new();
    for (canonical, value) in object {
        let patterns: PatternList = serde_json::from_value(value).map_err(|err| {
            IngestError::InvalidConfig(format!("alias `{canonical}` patterns: {err}"))
        })?;
        push_entry(&mut alias_map, &canonical, patterns)?;
    }
    Ok(alias_map)
}

/// # Errors
/// Returns [`IngestError::InvalidConfig`] for malformed YAML, non-string keys,
/// blank labels or patterns, and duplicate canonical labels.
pub fn alias_map_from_yaml_str(text: &str) -> Result<AliasMap, IngestError> {
    let mapping: serde_yaml::Mapping = serde_yaml::from_str(text)
        .map_err(|err| IngestError::InvalidConfig(format!("alias map YAML: {err}")))?;
    let mut alias_map = AliasMap::new();
    for (key, value) in mapping {
        let Some(canonical) = key.as_str() else {
            return Err(IngestError::InvalidConfig(format!(
                "alias keys MUST be strings, got {key:?}"
            )));
        };
        let patterns: PatternList = serde_yaml::from_value(value).map_err(|err| {
            IngestError::InvalidConfig(format!("alias `{canonical}` patterns: {err}"))
        })?;
        push_entry(&mut alias_map, canonical, patterns)?;
    }
    Ok(alias_map)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canonicals(alias_map: &AliasMap) -> Vec<&str> {
        alias_map.rules().iter().map(|rule| rule.canonical.as_str()).collect()
    }

    #[test]
    fn json_keeps_declaration_order() {
        let text = r#"{"SSMIS": "SSMIS*", "AMSR": ["AMSR-E", "AMSR2"], "ATMS": "ATMS*"}"#;
        match alias_map_from_json_str(text) {
            Ok(alias_map) => {
                assert_eq!(canonicals(&alias_map), vec!["SSMIS", "AMSR", "ATMS"]);
                assert_eq!(alias_map.resolve("AMSR2"), Some("AMSR"));
                assert_eq!(alias_map.resolve("AMSR-3"), None);
            }
            Err(err) => panic!("alias map should load: {err}"),
        }
    }

    #[test]
    fn yaml_accepts_single_and_list_patterns() {
        let text = "MWRI:\n  - MWRI\n  - MWRI-*\nAMSR: AMSR*\n";
        match alias_map_from_yaml_str(text) {
            Ok(alias_map) => {
                assert_eq!(canonicals(&alias_map), vec!["MWRI", "AMSR"]);
                assert_eq!(alias_map.resolve("MWRI-RM"), Some("MWRI"));
            }
            Err(err) => panic!("alias map should load: {err}"),
        }
    }

    #[test]
    fn rejects_blank_and_malformed_entries() {
        assert!(matches!(
            alias_map_from_json_str(r#"{"AMSR": []}"#),
            Err(IngestError::InvalidConfig(message)) if message.contains("at least one")
        ));
        assert!(matches!(
            alias_map_from_json_str(r#"{"AMSR": 3}"#),
            Err(IngestError::InvalidConfig(_))
        ));
        assert!(matches!(
            alias_map_from_yaml_str("? [a, b]\n: AMSR*\n"),
            Err(IngestError::InvalidConfig(message)) if message.contains("MUST be strings")
        ));
    }
}
