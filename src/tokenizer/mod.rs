//! Field analysis: turning values into positioned tokens.

#[allow(clippy::module_inception)]
mod tokenizer;

pub use tokenizer::{Analyzer, KeywordAnalyzer, StandardAnalyzer, Token};

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{AnalyzerKind, IndexSettings, TokenizerConfig};

/// Per-field analyzer lookup built from index settings.
#[derive(Debug, Clone)]
pub struct AnalyzerRegistry {
    default: Arc<dyn Analyzer>,
    per_field: HashMap<String, Arc<dyn Analyzer>>,
}

impl AnalyzerRegistry {
    pub fn from_settings(settings: &IndexSettings) -> Self {
        let build = |kind: AnalyzerKind| -> Arc<dyn Analyzer> {
            match kind {
                AnalyzerKind::Standard => Arc::new(StandardAnalyzer::new(&settings.tokenizer)),
                AnalyzerKind::English => {
                    let config = TokenizerConfig {
                        language: settings.tokenizer.language.clone(),
                        ..TokenizerConfig::english()
                    };
                    Arc::new(StandardAnalyzer::new(&config))
                }
                AnalyzerKind::Keyword => Arc::new(KeywordAnalyzer),
            }
        };

        let mut per_field: HashMap<String, Arc<dyn Analyzer>> = settings
            .per_field
            .iter()
            .map(|(field, kind)| (field.clone(), build(*kind)))
            .collect();
        per_field.insert(settings.id_field.clone(), Arc::new(KeywordAnalyzer));

        Self {
            default: build(settings.default_analyzer),
            per_field,
        }
    }

    pub fn for_field(&self, field: &str) -> &dyn Analyzer {
        self.per_field
            .get(field)
            .map(|a| a.as_ref())
            .unwrap_or_else(|| self.default.as_ref())
    }
}

impl Default for AnalyzerRegistry {
    fn default() -> Self {
        Self::from_settings(&IndexSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_per_field() {
        let settings = IndexSettings::default().with_analyzer("tag", AnalyzerKind::Keyword);
        let registry = AnalyzerRegistry::from_settings(&settings);
        assert_eq!(registry.for_field("tag").tokenize("A B"), vec!["A B"]);
        assert_eq!(registry.for_field("path").tokenize("x/Y.txt"), vec!["x/Y.txt"]);
        assert_eq!(registry.for_field("contents").tokenize("A B"), vec!["a", "b"]);
    }
}
