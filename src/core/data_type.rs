use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum DataType {
    // Numeric types
    SmallInt,
    Integer,
    Real,
    Numeric { precision: u8, scale: u8 }, // NUMERIC(p, s)
    // String types
    Text,
    Varchar { max_length: usize },  // VARCHAR(n)
    Char { length: usize },         // CHAR(n)
    // Boolean
    Boolean,
    // Date/Time types
    Date,
    Timestamp,
    TimestampTz,
    // Special types
    Uuid,
    Json,
    Bytea,
}

impl DataType {
    /// Text-like types are the only ones where collation matters.
    #[must_use]
    pub const fn is_textual(&self) -> bool {
        matches!(self, Self::Text | Self::Varchar { .. } | Self::Char { .. })
    }
}
