//! Database builder configuration.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Options controlling naming and validation of a database builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseOptions {
    /// Name of the default schema; the interpreter's default when unset.
    pub default_schema: Option<String>,
    /// Prefix of the temporary table used by reconstruction.
    pub temp_table_prefix: String,
    /// Prefix of disposable column names used to break rename cycles.
    pub temp_column_prefix: String,
    /// Refuse to generate SQL while a live table has no primary key.
    pub require_primary_key: bool,
    /// Number of idle scratch buffers kept between calls.
    pub scratch_pool_size: usize,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            default_schema: None,
            temp_table_prefix: String::from("__temp__"),
            temp_column_prefix: String::from("__rename__"),
            require_primary_key: false,
            scratch_pool_size: 4,
        }
    }
}

impl DatabaseOptions {
    /// Creates default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses options from JSON; missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Sets the default schema name.
    #[must_use]
    pub fn with_default_schema(mut self, name: impl Into<String>) -> Self {
        self.default_schema = Some(name.into());
        self
    }

    /// Sets the reconstruction temp table prefix.
    #[must_use]
    pub fn with_temp_table_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.temp_table_prefix = prefix.into();
        self
    }

    /// Sets the rename scratch column prefix.
    #[must_use]
    pub fn with_temp_column_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.temp_column_prefix = prefix.into();
        self
    }

    /// Requires a primary key on every table before SQL is generated.
    #[must_use]
    pub fn with_required_primary_keys(mut self) -> Self {
        self.require_primary_key = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = DatabaseOptions::new();
        assert_eq!(options.temp_table_prefix, "__temp__");
        assert!(!options.require_primary_key);
        assert!(options.default_schema.is_none());
    }

    #[test]
    fn test_from_json_partial() {
        let options =
            DatabaseOptions::from_json(r#"{"default_schema": "app", "require_primary_key": true}"#)
                .unwrap();
        assert_eq!(options.default_schema.as_deref(), Some("app"));
        assert!(options.require_primary_key);
        assert_eq!(options.temp_column_prefix, "__rename__");
    }

    #[test]
    fn test_from_json_invalid() {
        assert!(DatabaseOptions::from_json("{not json").is_err());
    }
}
