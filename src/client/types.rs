//! Value types exchanged with the API.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// An opaque identifier assigned by Monte Carlo (warehouse, connection, domain, ...).
///
/// Identifiers are not required to be RFC 4122 shaped; empty values and
/// values containing whitespace are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Uuid(String);

impl Uuid {
    /// Validate and wrap an identifier.
    pub fn new(value: impl Into<String>) -> Result<Self, ProviderError> {
        let value = value.into();
        if value.is_empty() {
            return Err(ProviderError::Validation(
                "identifier must not be empty".to_string(),
            ));
        }
        if value.chars().any(char::is_whitespace) {
            return Err(ProviderError::Validation(format!(
                "identifier must not contain whitespace: {:?}",
                value
            )));
        }
        Ok(Self(value))
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Uuid {
    type Error = ProviderError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Uuid> for String {
    fn from(value: Uuid) -> Self {
        value.0
    }
}

impl fmt::Display for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A string that is known to hold a JSON document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JsonString(String);

impl JsonString {
    /// Validate and wrap a JSON document.
    pub fn new(value: impl Into<String>) -> Result<Self, ProviderError> {
        let value = value.into();
        serde_json::from_str::<serde::de::IgnoredAny>(&value)
            .map_err(|err| ProviderError::Validation(format!("value is not valid JSON: {}", err)))?;
        Ok(Self(value))
    }

    /// Serialize a value into a JSON string.
    pub fn from_value(value: &serde_json::Value) -> Self {
        Self(value.to_string())
    }

    /// The document as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for JsonString {
    type Error = ProviderError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<JsonString> for String {
    fn from(value: JsonString) -> Self {
        value.0
    }
}

const MCON_PREFIX: &str = "MCON";
const MCON_SEPARATOR: &str = "++";

/// A Monte Carlo object name: `MCON++{account}++{resource}++{type}++{path}`.
///
/// This is a string convention only. Nothing about the parts is validated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Mcon(String);

impl Mcon {
    /// Build an MCON from its parts.
    pub fn new(account: &str, resource: &str, object_type: &str, path: &str) -> Self {
        Self(
            [MCON_PREFIX, account, resource, object_type, path].join(MCON_SEPARATOR),
        )
    }

    /// MCON of a project inside a warehouse.
    pub fn project(account: &str, warehouse: &str, project: &str) -> Self {
        Self::new(account, warehouse, "project", project)
    }

    /// MCON of a dataset inside a project.
    pub fn dataset(account: &str, warehouse: &str, project: &str, dataset: &str) -> Self {
        Self::new(account, warehouse, "dataset", &format!("{}:{}", project, dataset))
    }

    /// Wrap an MCON received from the API without inspecting it.
    pub fn from_raw(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Split into `(account, resource, type, path)`.
    ///
    /// Returns `None` if the value does not follow the convention. The path
    /// may itself contain the separator.
    pub fn parts(&self) -> Option<(&str, &str, &str, &str)> {
        let mut parts = self.0.splitn(5, MCON_SEPARATOR);
        if parts.next()? != MCON_PREFIX {
            return None;
        }
        Some((parts.next()?, parts.next()?, parts.next()?, parts.next()?))
    }

    /// The MCON as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Mcon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
