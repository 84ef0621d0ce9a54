//! JSON serialization glue shared by persistence backends.

/// Uniform string-serialization surface with a caller-chosen error type.
///
/// Backends blanket-implement this for their serde-friendly models so the
/// store code reads declaratively (`model.to_json_string()?`) instead of
/// repeating serde plumbing and error mapping.
pub trait JsonSerializable<E>: Sized {
    fn to_json_string(&self) -> Result<String, E>;
    fn from_json_str(s: &str) -> Result<Self, E>;
}
