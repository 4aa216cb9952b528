//! Macro converter registry

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::converter::MacroConverter;
use super::converters::builtin_for_extension;
use super::types::{ConversionOutcome, MacroOccurrence};
use crate::error::Result;

/// Dispatches macro occurrences to the converter bound to their identifier
#[derive(Clone, Default)]
pub struct MacroConverterRegistry {
    converters: HashMap<String, Arc<dyn MacroConverter>>,
}

impl MacroConverterRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            converters: HashMap::new(),
        }
    }

    /// Registry holding the built-in converters of every enabled extension
    pub fn with_builtins(extension_ids: &[String], tasklist_marker: &str) -> Self {
        let mut registry = Self::new();

        for extension_id in extension_ids {
            match builtin_for_extension(extension_id, tasklist_marker) {
                Some(converters) => {
                    for (macro_id, converter) in converters {
                        registry.register(macro_id, converter);
                    }
                }
                None => warn!("No built-in converters for extension: {}", extension_id),
            }
        }

        info!(
            "Macro converter registry ready with {} converters",
            registry.len()
        );
        registry
    }

    /// Bind a converter to a macro identifier.
    ///
    /// A later registration for the same identifier replaces the earlier
    /// one, which is returned.
    pub fn register(
        &mut self,
        macro_id: impl Into<String>,
        converter: Arc<dyn MacroConverter>,
    ) -> Option<Arc<dyn MacroConverter>> {
        let macro_id = macro_id.into();
        let previous = self.converters.insert(macro_id.clone(), converter);
        if previous.is_some() {
            debug!("Replaced converter for macro: {}", macro_id);
        } else {
            debug!("Registered converter for macro: {}", macro_id);
        }
        previous
    }

    /// Convert one occurrence.
    ///
    /// Unknown macros and occurrences the converter declines come back as
    /// [`ConversionOutcome::Unchanged`].
    pub fn convert(&self, occurrence: &MacroOccurrence) -> Result<ConversionOutcome> {
        let Some(converter) = self.converters.get(occurrence.macro_id()) else {
            return Ok(ConversionOutcome::Unchanged);
        };

        if !converter.should_convert(occurrence) {
            return Ok(ConversionOutcome::Unchanged);
        }

        converter.rewrite(occurrence).map(ConversionOutcome::Rewritten)
    }

    pub fn is_registered(&self, macro_id: &str) -> bool {
        self.converters.contains_key(macro_id)
    }

    /// Registered macro identifiers, sorted
    pub fn macro_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.converters.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.converters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.converters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MigrationError;
    use crate::macros::converters::{TaskListConverter, EXT_CODE, EXT_TASKLIST, LEGACY_TASKLIST_MARKER};
    use crate::macros::types::RewrittenContent;
    use std::collections::BTreeMap;

    fn occurrence(id: &str, body: &str) -> MacroOccurrence {
        let mut parameters = BTreeMap::new();
        parameters.insert("key".to_string(), "value".to_string());
        MacroOccurrence::new(id, parameters, body).unwrap()
    }

    struct Fixed(&'static str);

    impl MacroConverter for Fixed {
        fn target_macro_id(&self, _occurrence: &MacroOccurrence) -> String {
            self.0.to_string()
        }
    }

    struct Never;

    impl MacroConverter for Never {
        fn should_convert(&self, _occurrence: &MacroOccurrence) -> bool {
            false
        }

        fn rewrite(&self, _occurrence: &MacroOccurrence) -> Result<RewrittenContent> {
            panic!("rewrite must not run when should_convert is false");
        }
    }

    struct Failing;

    impl MacroConverter for Failing {
        fn convert_body(&self, _occurrence: &MacroOccurrence) -> Result<String> {
            Err(MigrationError::Conversion("broken body".to_string()))
        }
    }

    #[test]
    fn test_unregistered_macro_unchanged() {
        let registry = MacroConverterRegistry::new();
        let source = occurrence("gallery", "pictures");
        let before = source.clone();

        let outcome = registry.convert(&source).unwrap();
        assert_eq!(outcome, ConversionOutcome::Unchanged);
        assert_eq!(source, before);
    }

    #[test]
    fn test_declined_conversion_unchanged() {
        let mut registry = MacroConverterRegistry::new();
        registry.register("status", Arc::new(Never));

        let outcome = registry.convert(&occurrence("status", "green")).unwrap();
        assert!(outcome.is_unchanged());
    }

    #[test]
    fn test_last_registration_wins() {
        let mut registry = MacroConverterRegistry::new();
        assert!(registry.register("panel", Arc::new(Fixed("box"))).is_none());
        assert!(registry.register("panel", Arc::new(Fixed("info"))).is_some());

        match registry.convert(&occurrence("panel", "")).unwrap() {
            ConversionOutcome::Rewritten(content) => assert_eq!(content.target_macro_id, "info"),
            ConversionOutcome::Unchanged => panic!("expected a rewrite"),
        }
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_macro_ids_are_case_sensitive() {
        let mut registry = MacroConverterRegistry::new();
        registry.register("code", Arc::new(Fixed("code")));
        assert!(registry.convert(&occurrence("Code", "x")).unwrap().is_unchanged());
    }

    #[test]
    fn test_tasklist_marker_scenario() {
        let mut registry = MacroConverterRegistry::new();
        registry.register("tasklist", Arc::new(TaskListConverter::new("123_test_123")));

        let outcome = registry
            .convert(&occurrence("tasklist", "do 123_test_123 thing"))
            .unwrap();
        assert!(matches!(outcome, ConversionOutcome::Rewritten(_)));

        let outcome = registry.convert(&occurrence("tasklist", "unrelated")).unwrap();
        assert_eq!(outcome, ConversionOutcome::Unchanged);
    }

    #[test]
    fn test_converter_error_propagates() {
        let mut registry = MacroConverterRegistry::new();
        registry.register("broken", Arc::new(Failing));
        assert!(matches!(
            registry.convert(&occurrence("broken", "x")),
            Err(MigrationError::Conversion(_))
        ));
    }

    #[test]
    fn test_builtins_gated_by_extension() {
        let registry = MacroConverterRegistry::with_builtins(
            &[EXT_TASKLIST.to_string(), "macro-missing".to_string()],
            LEGACY_TASKLIST_MARKER,
        );
        assert_eq!(registry.macro_ids(), vec!["tasklist"]);
        assert!(!registry.is_registered("code"));

        let registry = MacroConverterRegistry::with_builtins(
            &[EXT_TASKLIST.to_string(), EXT_CODE.to_string()],
            LEGACY_TASKLIST_MARKER,
        );
        assert_eq!(registry.macro_ids(), vec!["code", "noformat", "tasklist"]);
    }
}
