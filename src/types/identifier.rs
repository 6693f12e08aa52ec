use crate::error::ProvisionError;
use std::fmt;

/// PostgreSQL truncates identifiers longer than `NAMEDATALEN - 1` bytes.
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// A database object name that passed the allow-list check.
///
/// Only `[A-Za-z_][A-Za-z0-9_]*` up to 63 bytes is accepted, so the value can
/// be embedded in DDL as a double-quoted identifier and in dollar-quoted
/// blocks without escaping surprises. Case is preserved: `Orders` and `orders`
/// are different databases.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DbIdentifier(String);

impl DbIdentifier {
    pub fn parse(value: impl AsRef<str>) -> Result<Self, ProvisionError> {
        let value = value.as_ref().trim();
        let reject = |reason: &'static str| ProvisionError::InvalidIdentifier {
            value: value.to_string(),
            reason,
        };

        let mut chars = value.chars();
        let Some(first) = chars.next() else {
            return Err(reject("name must not be empty"));
        };
        if value.len() > MAX_IDENTIFIER_LEN {
            return Err(reject("name must be at most 63 bytes"));
        }
        if !(first.is_ascii_alphabetic() || first == '_') {
            return Err(reject("name must start with a letter or underscore"));
        }
        if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(reject(
                "name may only contain ASCII letters, digits and underscores",
            ));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Double-quoted form for use in DDL.
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.0)
    }

    /// Single-quoted string literal form, for catalog comparisons inside DDL.
    pub fn literal(&self) -> String {
        quote_literal(&self.0)
    }
}

impl fmt::Display for DbIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DbIdentifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Render a standard-conforming SQL string literal.
///
/// Used where the engine does not accept bind parameters (utility statements
/// such as `COMMENT` and `ALTER ROLE ... PASSWORD`).
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
