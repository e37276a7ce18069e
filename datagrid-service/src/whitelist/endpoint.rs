//! Logical endpoint identity used to look up a whitelist

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Resource + operation pair naming one grid endpoint
///
/// Names are normalized the way route handlers tend to be named: a trailing
/// `Controller` is dropped from the resource, and a trailing `Async` and then
/// `Data` from the operation, so `CustomersController` / `IndexDataAsync`
/// resolves to the same endpoint as `Customers` / `Index`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EndpointId {
    resource: String,
    operation: String,
}

impl EndpointId {
    /// Normalize and validate a resource/operation pair
    pub fn new(resource: &str, operation: &str) -> Result<Self> {
        let resource = normalize(resource, &["Controller"], "resource")?;
        let operation = normalize(operation, &["Async", "Data"], "operation")?;
        Ok(Self {
            resource,
            operation,
        })
    }

    /// Resource part, e.g. `Customers`
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Operation part, e.g. `Index`
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Configuration path holding this endpoint's whitelist
    pub fn config_key(&self) -> String {
        format!("datatables.{}.{}", self.resource, self.operation)
    }

    /// Route serving this endpoint's rows
    pub fn data_path(&self) -> String {
        format!("/{}/{}/data", self.resource, self.operation)
    }
}

fn normalize(raw: &str, suffixes: &[&str], part: &str) -> Result<String> {
    let mut name = raw.trim();
    if name.is_empty() {
        return Err(Error::BadRequest(format!("endpoint {} must not be blank", part)));
    }
    for suffix in suffixes {
        name = name.strip_suffix(suffix).unwrap_or(name);
    }
    // names become figment key segments, so dots and other separators are out
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(Error::BadRequest(format!(
            "endpoint {} '{}' must be alphanumeric",
            part, raw
        )));
    }
    Ok(name.to_string())
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.resource, self.operation)
    }
}

impl FromStr for EndpointId {
    type Err = Error;

    /// Parse `Resource.Operation`
    fn from_str(s: &str) -> Result<Self> {
        let (resource, operation) = s.split_once('.').ok_or_else(|| {
            Error::BadRequest(format!("endpoint '{}' must look like Resource.Operation", s))
        })?;
        Self::new(resource, operation)
    }
}
