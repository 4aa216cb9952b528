//! Built-in macro converters
//!
//! Each family is enabled by an extension identifier:
//!
//! | Extension         | Source macros                    | Target macros               |
//! |-------------------|----------------------------------|-----------------------------|
//! | `macro-tasklist`  | `tasklist`                       | `checklist`                 |
//! | `macro-code`      | `code`, `noformat`               | `code`                      |
//! | `macro-panel`     | `info`, `note`, `tip`, `warning` | `info`, `warning`, `success`, `error` |
//! | `macro-toc`       | `toc`                            | `toc`                       |

use std::collections::BTreeMap;
use std::sync::Arc;

use super::converter::MacroConverter;
use super::types::MacroOccurrence;
use crate::error::Result;

/// Body sentinel identifying task lists written by the legacy exporter
pub const LEGACY_TASKLIST_MARKER: &str = "123_test_123";

pub const EXT_TASKLIST: &str = "macro-tasklist";
pub const EXT_CODE: &str = "macro-code";
pub const EXT_PANEL: &str = "macro-panel";
pub const EXT_TOC: &str = "macro-toc";

/// Converters contributed by one extension, keyed by source macro id
pub type ExtensionConverters = Vec<(&'static str, Arc<dyn MacroConverter>)>;

/// Built-in converters for an extension identifier, if it is known
pub fn builtin_for_extension(extension_id: &str, tasklist_marker: &str) -> Option<ExtensionConverters> {
    let converters: ExtensionConverters = match extension_id {
        EXT_TASKLIST => vec![("tasklist", shared(TaskListConverter::new(tasklist_marker)))],
        EXT_CODE => vec![("code", shared(CodeConverter)), ("noformat", shared(CodeConverter))],
        EXT_PANEL => vec![
            ("info", shared(PanelConverter)),
            ("note", shared(PanelConverter)),
            ("tip", shared(PanelConverter)),
            ("warning", shared(PanelConverter)),
        ],
        EXT_TOC => vec![(
            "toc",
            shared(
                ParameterRenameConverter::new("toc")
                    .rename("minLevel", "start")
                    .rename("maxLevel", "depth"),
            ),
        )],
        _ => return None,
    };
    Some(converters)
}

fn shared<C: MacroConverter + 'static>(converter: C) -> Arc<dyn MacroConverter> {
    Arc::new(converter)
}

/// Rewrites legacy task lists into checklists.
///
/// Only bodies carrying the legacy marker are rewritten; any other
/// `tasklist` is left for the target's own compatibility layer.
pub struct TaskListConverter {
    marker: String,
}

impl TaskListConverter {
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
        }
    }
}

impl MacroConverter for TaskListConverter {
    fn should_convert(&self, occurrence: &MacroOccurrence) -> bool {
        occurrence.body.contains(&self.marker)
    }

    fn target_macro_id(&self, _occurrence: &MacroOccurrence) -> String {
        "checklist".to_string()
    }

    fn convert_parameters(&self, occurrence: &MacroOccurrence) -> Result<BTreeMap<String, String>> {
        let mut parameters = BTreeMap::new();
        if let Some(title) = occurrence.parameter("title") {
            parameters.insert("title".to_string(), title.to_string());
        }
        Ok(parameters)
    }

    fn convert_body(&self, occurrence: &MacroOccurrence) -> Result<String> {
        let mut items = Vec::new();

        for line in occurrence.body.lines() {
            let line = line.replace(&self.marker, "");
            let line = line.trim();
            let line = line
                .strip_prefix("* ")
                .or_else(|| line.strip_prefix("- "))
                .unwrap_or(line);

            let (done, text) = if let Some(rest) = line.strip_prefix("[x]") {
                (true, rest)
            } else if let Some(rest) = line.strip_prefix("[ ]") {
                (false, rest)
            } else {
                (false, line)
            };

            let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
            if text.is_empty() {
                continue;
            }

            items.push(format!("- [{}] {}", if done { "x" } else { " " }, text));
        }

        Ok(items.join("\n"))
    }
}

/// Code blocks, including preformatted `noformat` blocks
pub struct CodeConverter;

impl MacroConverter for CodeConverter {
    fn target_macro_id(&self, _occurrence: &MacroOccurrence) -> String {
        "code".to_string()
    }

    fn convert_parameters(&self, occurrence: &MacroOccurrence) -> Result<BTreeMap<String, String>> {
        let mut parameters = BTreeMap::new();

        if occurrence.macro_id() == "noformat" {
            parameters.insert("language".to_string(), "none".to_string());
        } else if let Some(language) = occurrence.parameter("language") {
            parameters.insert("language".to_string(), language.to_lowercase());
        }

        if let Some(title) = occurrence.parameter("title") {
            parameters.insert("title".to_string(), title.to_string());
        }

        if occurrence.parameter("linenumbers") == Some("true") {
            parameters.insert("layout".to_string(), "linenumbers".to_string());
        }

        Ok(parameters)
    }
}

/// Coloured information panels
pub struct PanelConverter;

impl MacroConverter for PanelConverter {
    fn target_macro_id(&self, occurrence: &MacroOccurrence) -> String {
        match occurrence.macro_id() {
            "note" => "warning",
            "tip" => "success",
            "warning" => "error",
            _ => "info",
        }
        .to_string()
    }

    fn convert_parameters(&self, occurrence: &MacroOccurrence) -> Result<BTreeMap<String, String>> {
        let mut parameters = BTreeMap::new();
        if let Some(title) = occurrence.parameter("title") {
            parameters.insert("title".to_string(), title.to_string());
        }
        Ok(parameters)
    }
}

/// Table-driven one-to-one mapping of a macro and its parameter names
pub struct ParameterRenameConverter {
    target: String,
    renames: Vec<(String, String)>,
    keep_unmapped: bool,
}

impl ParameterRenameConverter {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            renames: Vec::new(),
            keep_unmapped: false,
        }
    }

    pub fn rename(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.renames.push((from.into(), to.into()));
        self
    }

    /// Copy parameters without a rename rule instead of dropping them
    pub fn keep_unmapped(mut self) -> Self {
        self.keep_unmapped = true;
        self
    }
}

impl MacroConverter for ParameterRenameConverter {
    fn target_macro_id(&self, _occurrence: &MacroOccurrence) -> String {
        self.target.clone()
    }

    fn convert_parameters(&self, occurrence: &MacroOccurrence) -> Result<BTreeMap<String, String>> {
        let mut parameters = BTreeMap::new();

        for (name, value) in &occurrence.parameters {
            match self.renames.iter().find(|(from, _)| from == name) {
                Some((_, to)) => {
                    parameters.insert(to.clone(), value.clone());
                }
                None if self.keep_unmapped => {
                    parameters.insert(name.clone(), value.clone());
                }
                None => {}
            }
        }

        Ok(parameters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn occurrence(id: &str, pairs: &[(&str, &str)], body: &str) -> MacroOccurrence {
        let parameters = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        MacroOccurrence::new(id, parameters, body).unwrap()
    }

    #[test]
    fn test_tasklist_requires_marker() {
        let converter = TaskListConverter::new(LEGACY_TASKLIST_MARKER);
        assert!(converter.should_convert(&occurrence("tasklist", &[], "do 123_test_123 thing")));
        assert!(!converter.should_convert(&occurrence("tasklist", &[], "unrelated")));
    }

    #[test]
    fn test_tasklist_body_becomes_checklist() {
        let converter = TaskListConverter::new(LEGACY_TASKLIST_MARKER);
        let source = occurrence(
            "tasklist",
            &[("title", "Sprint")],
            "123_test_123\n* [x] write docs\n- [ ] ship   it\n\nreview",
        );

        let rewritten = converter.rewrite(&source).unwrap();
        assert_eq!(rewritten.target_macro_id, "checklist");
        assert_eq!(rewritten.parameters.get("title").map(String::as_str), Some("Sprint"));
        assert_eq!(rewritten.body, "- [x] write docs\n- [ ] ship it\n- [ ] review");
    }

    #[test]
    fn test_code_parameters() {
        let rewritten = CodeConverter
            .rewrite(&occurrence(
                "code",
                &[("language", "Java"), ("linenumbers", "true"), ("collapse", "true")],
                "class A {}",
            ))
            .unwrap();

        assert_eq!(rewritten.target_macro_id, "code");
        assert_eq!(rewritten.parameters.get("language").map(String::as_str), Some("java"));
        assert_eq!(rewritten.parameters.get("layout").map(String::as_str), Some("linenumbers"));
        assert!(!rewritten.parameters.contains_key("collapse"));
        assert_eq!(rewritten.body, "class A {}");
    }

    #[test]
    fn test_noformat_is_plain_code() {
        let rewritten = CodeConverter
            .rewrite(&occurrence("noformat", &[], "raw text"))
            .unwrap();
        assert_eq!(rewritten.parameters.get("language").map(String::as_str), Some("none"));
    }

    #[test]
    fn test_panel_mapping() {
        let cases = [("info", "info"), ("note", "warning"), ("tip", "success"), ("warning", "error")];
        for (source, target) in cases {
            let rewritten = PanelConverter
                .rewrite(&occurrence(source, &[("title", "T"), ("icon", "false")], "body"))
                .unwrap();
            assert_eq!(rewritten.target_macro_id, target);
            assert_eq!(rewritten.parameters.len(), 1);
        }
    }

    #[test]
    fn test_parameter_rename() {
        let converter = ParameterRenameConverter::new("toc")
            .rename("maxLevel", "depth");
        let rewritten = converter
            .rewrite(&occurrence("toc", &[("maxLevel", "3"), ("style", "none")], ""))
            .unwrap();
        assert_eq!(rewritten.parameters.get("depth").map(String::as_str), Some("3"));
        assert!(!rewritten.parameters.contains_key("style"));

        let converter = ParameterRenameConverter::new("toc").keep_unmapped();
        let rewritten = converter
            .rewrite(&occurrence("toc", &[("style", "none")], ""))
            .unwrap();
        assert_eq!(rewritten.parameters.get("style").map(String::as_str), Some("none"));
    }

    #[test]
    fn test_unknown_extension() {
        assert!(builtin_for_extension("macro-unknown", LEGACY_TASKLIST_MARKER).is_none());
        let panel = builtin_for_extension(EXT_PANEL, LEGACY_TASKLIST_MARKER).unwrap();
        assert_eq!(panel.len(), 4);
    }
}
