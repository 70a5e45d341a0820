use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{LucaError, Result};

/// Kind of a field, fixing how it is analyzed and stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Analyzed into positioned tokens and stored verbatim.
    StoredText,
    /// Indexed as one exact term and stored.
    Keyword,
    /// 64-bit signed integer, indexed for range queries and stored.
    Numeric,
}

/// What the engine does with values of a given kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldCapabilities {
    pub tokenized: bool,
    pub indexed: bool,
    pub stored: bool,
    pub sortable: bool,
}

impl FieldKind {
    pub const fn capabilities(self) -> FieldCapabilities {
        match self {
            FieldKind::StoredText => FieldCapabilities {
                tokenized: true,
                indexed: true,
                stored: true,
                sortable: false,
            },
            FieldKind::Keyword => FieldCapabilities {
                tokenized: false,
                indexed: true,
                stored: true,
                sortable: true,
            },
            FieldKind::Numeric => FieldCapabilities {
                tokenized: false,
                indexed: true,
                stored: true,
                sortable: true,
            },
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldKind::StoredText => "text",
            FieldKind::Keyword => "keyword",
            FieldKind::Numeric => "numeric",
        };
        f.write_str(name)
    }
}

/// Typed value of a single field occurrence
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldValue {
    Text(String),
    Keyword(String),
    Numeric(i64),
}

impl FieldValue {
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::Text(_) => FieldKind::StoredText,
            FieldValue::Keyword(_) => FieldKind::Keyword,
            FieldValue::Numeric(_) => FieldKind::Numeric,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) | FieldValue::Keyword(s) => Some(s),
            FieldValue::Numeric(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Numeric(v) => Some(*v),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub value: FieldValue,
}

/// Document as an ordered list of named, typed fields.
///
/// A field name may repeat; repeated text values are indexed as one
/// stream whose positions continue from one value to the next.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    fields: Vec<Field>,
}

impl Document {
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    pub fn add(&mut self, name: impl Into<String>, value: FieldValue) {
        self.fields.push(Field {
            name: name.into(),
            value,
        });
    }

    pub fn add_text(&mut self, name: impl Into<String>, text: impl Into<String>) {
        self.add(name, FieldValue::Text(text.into()));
    }

    pub fn add_keyword(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.add(name, FieldValue::Keyword(value.into()));
    }

    pub fn add_numeric(&mut self, name: impl Into<String>, value: i64) {
        self.add(name, FieldValue::Numeric(value));
    }

    pub fn with_text(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.add_text(name, text);
        self
    }

    pub fn with_keyword(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.add_keyword(name, value);
        self
    }

    pub fn with_numeric(mut self, name: impl Into<String>, value: i64) -> Self {
        self.add_numeric(name, value);
        self
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// First value of the named field
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.value)
    }

    /// All values of the named field, in insertion order
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a FieldValue> + 'a {
        self.fields
            .iter()
            .filter(move |f| f.name == name)
            .map(|f| &f.value)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FieldValue::as_str)
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(FieldValue::as_i64)
    }

    /// Check field names and that each name carries a single kind.
    pub fn validate(&self) -> Result<()> {
        let mut seen: Vec<(&str, FieldKind)> = Vec::new();
        for field in &self.fields {
            validate_field_name(&field.name)?;
            let kind = field.value.kind();
            match seen.iter().find(|(name, _)| *name == field.name) {
                Some((_, existing)) if *existing != kind => {
                    return Err(LucaError::InvalidDocument(format!(
                        "field '{}' used as both {} and {}",
                        field.name, existing, kind
                    )));
                }
                Some(_) => {}
                None => seen.push((&field.name, kind)),
            }
        }
        Ok(())
    }
}

/// Field names are non-empty and free of the byte that separates a field
/// from its token inside a term key.
pub fn validate_field_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(LucaError::InvalidDocument("empty field name".to_string()));
    }
    if name.as_bytes().contains(&0) {
        return Err(LucaError::InvalidDocument(format!(
            "field name {:?} contains a NUL byte",
            name
        )));
    }
    Ok(())
}

/// Get current timestamp in seconds since UNIX epoch
pub fn current_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_builder() {
        let doc = Document::new()
            .with_keyword("path", "a.txt")
            .with_text("contents", "hello")
            .with_numeric("modified", 42);
        assert_eq!(doc.len(), 3);
        assert_eq!(doc.get_str("path"), Some("a.txt"));
        assert_eq!(doc.get_i64("modified"), Some(42));
        assert!(doc.get("missing").is_none());
        assert!(doc.validate().is_ok());
    }

    #[test]
    fn test_multi_valued_fields_keep_order() {
        let doc = Document::new()
            .with_text("body", "first")
            .with_text("body", "second");
        let values: Vec<_> = doc.get_all("body").filter_map(|v| v.as_str()).collect();
        assert_eq!(values, vec!["first", "second"]);
    }

    #[test]
    fn test_validate_rejects_mixed_kinds() {
        let doc = Document::new()
            .with_text("body", "text")
            .with_numeric("body", 1);
        assert!(matches!(doc.validate(), Err(LucaError::InvalidDocument(_))));
    }

    #[test]
    fn test_validate_rejects_bad_names() {
        let doc = Document::new().with_text("", "x");
        assert!(doc.validate().is_err());
        let doc = Document::new().with_text("a\0b", "x");
        assert!(doc.validate().is_err());
    }

    #[test]
    fn test_capabilities() {
        assert!(FieldKind::StoredText.capabilities().tokenized);
        assert!(!FieldKind::Keyword.capabilities().tokenized);
        assert!(FieldKind::Numeric.capabilities().sortable);
        assert!(FieldKind::StoredText.capabilities().stored);
    }
}
