pub mod document;
pub mod search;

pub use document::{
    current_timestamp, validate_field_name, Document, Field, FieldCapabilities, FieldKind,
    FieldValue,
};
pub use search::{SearchHit, TopDocs};
