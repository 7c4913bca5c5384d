//! Provider configuration.

use std::{fmt, str::FromStr};

use camino::Utf8Path;
use serde::{Deserialize, Serialize};

use crate::ProviderError;

/// Identifier field used when the configuration names none.
pub const DEFAULT_ID_FIELD: &str = "id";

/// Supported backing stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendKind {
    /// A GeoJSON `FeatureCollection` document on disk.
    #[serde(rename = "GeoJSON", alias = "geojson")]
    GeoJson,
    /// A table inside a SQLite database.
    #[serde(rename = "SQLite", alias = "sqlite")]
    Sqlite,
}

impl BackendKind {
    /// Name used in configuration files.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GeoJson => "GeoJSON",
            Self::Sqlite => "SQLite",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = ProviderError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.eq_ignore_ascii_case("geojson") {
            Ok(Self::GeoJson)
        } else if value.eq_ignore_ascii_case("sqlite") {
            Ok(Self::Sqlite)
        } else {
            Err(ProviderError::InvalidConfiguration(format!(
                "unknown provider type `{value}`"
            )))
        }
    }
}

/// Immutable description of a provider instance.
///
/// # Examples
///
/// ```
/// use geoprovider_core::{BackendKind, ProviderConfig};
///
/// let config: ProviderConfig = serde_json::from_str(
///     r#"{"type": "SQLite", "data": "lakes.db", "table": "lakes", "id_field": "fid"}"#,
/// )?;
/// assert_eq!(config.kind(), BackendKind::Sqlite);
/// assert_eq!(config.id_field(), "fid");
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(rename = "type")]
    kind: BackendKind,
    data: String,
    #[serde(default)]
    id_field: Option<String>,
    #[serde(default)]
    table: Option<String>,
    #[serde(default)]
    properties: Vec<String>,
}

impl ProviderConfig {
    /// Describe a provider of `kind` over `data` (a path for file and SQLite
    /// backends).
    pub fn new(kind: BackendKind, data: impl Into<String>) -> Self {
        Self {
            kind,
            data: data.into(),
            id_field: None,
            table: None,
            properties: Vec::new(),
        }
    }

    /// Set the identifier field.
    #[must_use]
    pub fn with_id_field(mut self, id_field: impl Into<String>) -> Self {
        self.id_field = Some(id_field.into());
        self
    }

    /// Set the table for relational backends.
    #[must_use]
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Restrict emitted properties to `properties`.
    #[must_use]
    pub fn with_properties<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.properties = properties.into_iter().map(Into::into).collect();
        self
    }

    /// Backend type.
    pub const fn kind(&self) -> BackendKind {
        self.kind
    }

    /// Backend locator as configured.
    pub fn data(&self) -> &str {
        &self.data
    }

    /// Backend locator interpreted as a path.
    pub fn data_path(&self) -> &Utf8Path {
        Utf8Path::new(&self.data)
    }

    /// Identifier field, defaulting to [`DEFAULT_ID_FIELD`].
    pub fn id_field(&self) -> &str {
        self.id_field.as_deref().unwrap_or(DEFAULT_ID_FIELD)
    }

    /// Table name for relational backends.
    pub fn table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    /// Whitelisted properties; empty means all.
    pub fn properties(&self) -> &[String] {
        &self.properties
    }

    /// Check the configuration is usable for its backend.
    pub fn validate(&self) -> Result<(), ProviderError> {
        if self.data.trim().is_empty() {
            return Err(invalid("`data` must name the backend resource"));
        }
        if self.id_field().trim().is_empty() {
            return Err(invalid("`id_field` must not be empty"));
        }
        match (self.kind, self.table()) {
            (BackendKind::Sqlite, None) => Err(invalid("SQLite providers require `table`")),
            (BackendKind::Sqlite, Some(table)) if !is_sql_identifier(table) => Err(invalid(
                &format!("table name `{table}` must be a plain SQL identifier"),
            )),
            _ => Ok(()),
        }
    }
}

fn invalid(message: &str) -> ProviderError {
    ProviderError::InvalidConfiguration(message.to_owned())
}

/// Whether `name` can be used unquoted as a SQL table name.
pub(crate) fn is_sql_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
