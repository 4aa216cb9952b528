//! Macro converter capability

use std::collections::BTreeMap;

use super::types::{MacroOccurrence, RewrittenContent};
use crate::error::Result;

/// Rewrite rule for one source macro family.
///
/// Implementations customise the mapping hooks and, when a rewrite depends on
/// the macro content, [`should_convert`](MacroConverter::should_convert).
/// The rewrite itself is assembled by the provided
/// [`rewrite`](MacroConverter::rewrite) method so every family shares the
/// same mechanics. All methods must be pure: no I/O, no shared mutable state.
pub trait MacroConverter: Send + Sync {
    /// Whether this occurrence is eligible for rewriting
    fn should_convert(&self, _occurrence: &MacroOccurrence) -> bool {
        true
    }

    /// Target macro identifier
    fn target_macro_id(&self, occurrence: &MacroOccurrence) -> String {
        occurrence.macro_id().to_string()
    }

    /// Target parameters
    fn convert_parameters(&self, occurrence: &MacroOccurrence) -> Result<BTreeMap<String, String>> {
        Ok(occurrence.parameters.clone())
    }

    /// Target body
    fn convert_body(&self, occurrence: &MacroOccurrence) -> Result<String> {
        Ok(occurrence.body.clone())
    }

    /// Build the target-native invocation. Only called when
    /// `should_convert` returned true.
    fn rewrite(&self, occurrence: &MacroOccurrence) -> Result<RewrittenContent> {
        Ok(RewrittenContent {
            target_macro_id: self.target_macro_id(occurrence),
            parameters: self.convert_parameters(occurrence)?,
            body: self.convert_body(occurrence)?,
        })
    }
}
