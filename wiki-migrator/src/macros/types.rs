//! Macro occurrence and rewrite result types

use crate::error::MigrationError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One macro found in a source document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawMacroOccurrence")]
pub struct MacroOccurrence {
    /// Source macro identifier (case-sensitive, never empty)
    macro_id: String,
    /// Macro parameters
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
    /// Raw body content, possibly empty
    #[serde(default)]
    pub body: String,
}

#[derive(Deserialize)]
struct RawMacroOccurrence {
    macro_id: String,
    #[serde(default)]
    parameters: BTreeMap<String, String>,
    #[serde(default)]
    body: String,
}

impl TryFrom<RawMacroOccurrence> for MacroOccurrence {
    type Error = MigrationError;

    fn try_from(raw: RawMacroOccurrence) -> Result<Self, Self::Error> {
        MacroOccurrence::new(raw.macro_id, raw.parameters, raw.body)
    }
}

impl MacroOccurrence {
    /// Create an occurrence, rejecting an empty macro identifier
    pub fn new(
        macro_id: impl Into<String>,
        parameters: BTreeMap<String, String>,
        body: impl Into<String>,
    ) -> crate::Result<Self> {
        let macro_id = macro_id.into();
        if macro_id.is_empty() {
            return Err(MigrationError::Conversion(
                "macro identifier must not be empty".to_string(),
            ));
        }
        Ok(Self {
            macro_id,
            parameters,
            body: body.into(),
        })
    }

    pub fn macro_id(&self) -> &str {
        &self.macro_id
    }

    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(String::as_str)
    }

    /// Emit this occurrence unchanged as a target macro call
    pub fn to_target_syntax(&self) -> String {
        format_macro_call(&self.macro_id, &self.parameters, &self.body)
    }
}

/// Target-native macro invocation produced by a converter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewrittenContent {
    pub target_macro_id: String,
    pub parameters: BTreeMap<String, String>,
    pub body: String,
}

impl RewrittenContent {
    pub fn to_target_syntax(&self) -> String {
        format_macro_call(&self.target_macro_id, &self.parameters, &self.body)
    }
}

/// Result of dispatching one occurrence
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionOutcome {
    /// Converter produced a target-native macro
    Rewritten(RewrittenContent),
    /// No converter applies; the occurrence passes through verbatim
    Unchanged,
}

impl ConversionOutcome {
    pub fn is_unchanged(&self) -> bool {
        matches!(self, ConversionOutcome::Unchanged)
    }
}

/// Format `{{id key="value"}}body{{/id}}`, or `{{id key="value"/}}` when the
/// body is empty
pub fn format_macro_call(id: &str, parameters: &BTreeMap<String, String>, body: &str) -> String {
    let mut call = format!("{{{{{}", id);
    for (key, value) in parameters {
        call.push(' ');
        call.push_str(key);
        call.push_str("=\"");
        call.push_str(&escape_parameter(value));
        call.push('"');
    }

    if body.is_empty() {
        call.push_str("/}}");
    } else {
        call.push_str("}}");
        call.push_str(body);
        call.push_str(&format!("{{{{/{}}}}}", id));
    }
    call
}

fn escape_parameter(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if c == '"' || c == '\\' {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
