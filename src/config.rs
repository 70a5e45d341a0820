use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::segment::merge::MergePolicyConfig;
use crate::segment::statistics::Bm25Params;

/// Field holding the external document identifier, as the file indexer uses it.
pub const DEFAULT_ID_FIELD: &str = "path";

/// Field searched when a query string names no field.
pub const DEFAULT_SEARCH_FIELD: &str = "contents";

/// How an index directory is opened by a writer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenMode {
    /// Discard whatever the directory holds and start generation 0.
    Create,
    /// Open the committed index, or create one if the directory is empty.
    CreateOrOpen,
}

impl Default for OpenMode {
    fn default() -> Self {
        OpenMode::CreateOrOpen
    }
}

/// Analyzer selected for a field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyzerKind {
    /// Lowercase and split on non-alphanumeric boundaries.
    Standard,
    /// Whole value is a single token.
    Keyword,
    /// Standard plus English stopwords and stemming.
    English,
}

/// Index settings configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexSettings {
    /// Keyword field used by update and delete to address documents.
    pub id_field: String,
    /// Tokenizer knobs for `Standard` and `English` analyzers.
    pub tokenizer: TokenizerConfig,
    /// Analyzer used for text fields not listed in `per_field`.
    pub default_analyzer: AnalyzerKind,
    pub per_field: BTreeMap<String, AnalyzerKind>,
    pub merge: MergePolicyConfig,
    /// Commit automatically once this many documents are buffered.
    pub max_buffered_docs: Option<usize>,
    /// Commit buffered work when the index handle is closed.
    pub commit_on_close: bool,
    pub bm25: Bm25Params,
}

impl Default for IndexSettings {
    fn default() -> Self {
        let mut per_field = BTreeMap::new();
        per_field.insert(DEFAULT_ID_FIELD.to_string(), AnalyzerKind::Keyword);
        Self {
            id_field: DEFAULT_ID_FIELD.to_string(),
            tokenizer: TokenizerConfig::default(),
            default_analyzer: AnalyzerKind::Standard,
            per_field,
            merge: MergePolicyConfig::default(),
            max_buffered_docs: None,
            commit_on_close: true,
            bm25: Bm25Params::default(),
        }
    }
}

impl IndexSettings {
    pub fn with_id_field(mut self, field: impl Into<String>) -> Self {
        let field = field.into();
        self.per_field.insert(field.clone(), AnalyzerKind::Keyword);
        self.id_field = field;
        self
    }

    pub fn with_analyzer(mut self, field: impl Into<String>, kind: AnalyzerKind) -> Self {
        self.per_field.insert(field.into(), kind);
        self
    }

    pub fn with_max_buffered_docs(mut self, max: usize) -> Self {
        self.max_buffered_docs = Some(max);
        self
    }

    pub fn with_merge(mut self, merge: MergePolicyConfig) -> Self {
        self.merge = merge;
        self
    }

    /// Analyzer kind for a field, honoring the id field and overrides.
    pub fn analyzer_for(&self, field: &str) -> AnalyzerKind {
        if field == self.id_field {
            return AnalyzerKind::Keyword;
        }
        self.per_field
            .get(field)
            .copied()
            .unwrap_or(self.default_analyzer)
    }

    /// Keep the analysis settings persisted with an existing index and
    /// take the runtime knobs from `runtime`.
    pub(crate) fn merged_with_runtime(mut self, runtime: &IndexSettings) -> Self {
        self.merge = runtime.merge.clone();
        self.max_buffered_docs = runtime.max_buffered_docs;
        self.commit_on_close = runtime.commit_on_close;
        self.bm25 = runtime.bm25;
        self
    }
}

/// Tokenizer configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenizerConfig {
    pub lowercase: bool,
    pub remove_stopwords: bool,
    pub stem: bool,
    pub min_token_length: usize,
    pub max_token_length: usize,
    pub language: String,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            lowercase: true,
            remove_stopwords: false,
            stem: false,
            min_token_length: 1,
            max_token_length: 255,
            language: "english".to_string(),
        }
    }
}

impl TokenizerConfig {
    /// Configuration used by the `English` analyzer.
    pub fn english() -> Self {
        Self {
            remove_stopwords: true,
            stem: true,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = IndexSettings::default();
        assert_eq!(settings.id_field, "path");
        assert_eq!(settings.analyzer_for("path"), AnalyzerKind::Keyword);
        assert_eq!(settings.analyzer_for("contents"), AnalyzerKind::Standard);
        assert!(settings.commit_on_close);
        assert!(settings.max_buffered_docs.is_none());
    }

    #[test]
    fn test_settings_roundtrip_json() {
        let settings = IndexSettings::default()
            .with_id_field("id")
            .with_analyzer("body", AnalyzerKind::English);
        let json = serde_json::to_string(&settings).unwrap();
        let back: IndexSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id_field, "id");
        assert_eq!(back.analyzer_for("body"), AnalyzerKind::English);
        assert_eq!(back.analyzer_for("id"), AnalyzerKind::Keyword);
    }

    #[test]
    fn test_runtime_merge_keeps_analysis() {
        let stored = IndexSettings::default().with_id_field("id");
        let runtime = IndexSettings::default().with_max_buffered_docs(10);
        let merged = stored.merged_with_runtime(&runtime);
        assert_eq!(merged.id_field, "id");
        assert_eq!(merged.max_buffered_docs, Some(10));
    }
}
