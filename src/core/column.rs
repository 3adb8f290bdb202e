use serde::{Deserialize, Serialize};
use super::data_type::DataType;

/// Column definition as reported by the schema metadata collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
    pub primary_key: bool,
    /// Value produced by the database or a key generator rather than the client.
    pub generated: bool,
    /// Collation of the column compares bytes rather than folded text.
    pub case_sensitive: bool,
}

impl Column {
    #[must_use]
    pub fn new(name: &str, data_type: DataType) -> Self {
        Self {
            name: name.to_string(),
            data_type,
            primary_key: false,
            generated: false,
            case_sensitive: false,
        }
    }

    #[must_use]
    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    #[must_use]
    pub const fn generated(mut self) -> Self {
        self.generated = true;
        self
    }

    #[must_use]
    pub const fn case_sensitive(mut self) -> Self {
        self.case_sensitive = true;
        self
    }
}
