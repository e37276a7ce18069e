//! Per-endpoint column whitelists
//!
//! A [`ColumnWhitelist`] names the table an endpoint reads from and every
//! column a client may reference, with the operations each column allows.
//! Whitelists come from configuration, never from the request, and are
//! validated before use: their names are the only text ever interpolated
//! into SQL.
//!
//! ```toml
//! [datatables.Customers.Index]
//! table_name = "Customers"
//!
//! [[datatables.Customers.Index.columns]]
//! name = "CompanyName"
//! title = "Company"
//! searchable = true
//! sortable = true
//! globally_searchable = true
//! ```

mod endpoint;
mod source;

pub use endpoint::EndpointId;
pub use source::{CachedWhitelistSource, FigmentWhitelistSource, WhitelistSource};

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Maximum length for SQL identifiers (`PostgreSQL` limit is 63).
const MAX_IDENTIFIER_LENGTH: usize = 63;

/// Whether `s` is safe to splice into SQL text as a table or column name.
///
/// Starts with an ASCII letter or underscore, continues with ASCII
/// alphanumerics or underscores, 1-63 characters.
///
/// ```
/// use datagrid_service::whitelist::is_valid_sql_identifier;
///
/// assert!(is_valid_sql_identifier("CustomerID"));
/// assert!(is_valid_sql_identifier("_rowid"));
/// assert!(!is_valid_sql_identifier("1st"));
/// assert!(!is_valid_sql_identifier("name; DROP TABLE x"));
/// ```
#[must_use]
pub fn is_valid_sql_identifier(s: &str) -> bool {
    if s.is_empty() || s.len() > MAX_IDENTIFIER_LENGTH {
        return false;
    }

    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// One allowed column
///
/// `globally_searchable` is server-side only and never serialized to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Column name, as it appears in SQL
    pub name: String,

    /// Display title for the grid header, empty unless configured
    #[serde(default)]
    pub title: String,

    /// Whether the client may send a per-column search for this column
    #[serde(default)]
    pub searchable: bool,

    /// Whether the client may sort by this column
    #[serde(default)]
    pub sortable: bool,

    /// Whether the global search box matches this column
    #[serde(default, skip_serializing)]
    pub globally_searchable: bool,
}

impl ColumnSpec {
    /// Create a column that allows nothing but being selected
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: String::new(),
            searchable: false,
            sortable: false,
            globally_searchable: false,
        }
    }

    /// Set the display title
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Allow per-column search
    #[must_use]
    pub fn searchable(mut self) -> Self {
        self.searchable = true;
        self
    }

    /// Allow sorting
    #[must_use]
    pub fn sortable(mut self) -> Self {
        self.sortable = true;
        self
    }

    /// Include in the global search
    #[must_use]
    pub fn globally_searchable(mut self) -> Self {
        self.globally_searchable = true;
        self
    }
}

/// Immutable whitelist for one endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnWhitelist {
    table_name: String,
    #[serde(default)]
    columns: Vec<ColumnSpec>,
}

impl ColumnWhitelist {
    /// Build and validate a whitelist
    pub fn new(table_name: impl Into<String>, columns: Vec<ColumnSpec>) -> Result<Self> {
        let whitelist = Self {
            table_name: table_name.into(),
            columns,
        };
        whitelist.validate()?;
        Ok(whitelist)
    }

    /// Check identifier safety and column-name uniqueness
    pub fn validate(&self) -> Result<()> {
        if !is_valid_sql_identifier(&self.table_name) {
            return Err(Error::InvalidWhitelist(format!(
                "table name '{}' is not a valid SQL identifier",
                self.table_name
            )));
        }

        let mut seen = HashSet::with_capacity(self.columns.len());
        for column in &self.columns {
            if !is_valid_sql_identifier(&column.name) {
                return Err(Error::InvalidWhitelist(format!(
                    "column name '{}' in table '{}' is not a valid SQL identifier",
                    column.name, self.table_name
                )));
            }
            if !seen.insert(column.name.as_str()) {
                return Err(Error::InvalidWhitelist(format!(
                    "column '{}' is declared more than once in table '{}'",
                    column.name, self.table_name
                )));
            }
        }
        Ok(())
    }

    /// Table the endpoint reads from
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Columns in configuration order
    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    /// Look up a column by exact name
    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|column| column.name == name)
    }
}
