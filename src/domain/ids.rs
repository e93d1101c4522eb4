//! Validated name types
//!
//! Newtype wrappers for names that end up in an external artifact: sheet names
//! inside a workbook document and table/column identifiers spliced into SQL.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum sheet name length accepted by spreadsheet applications
pub const MAX_SHEET_NAME_LEN: usize = 31;

const FORBIDDEN_SHEET_CHARS: [char; 7] = ['[', ']', ':', '*', '?', '/', '\\'];

/// Sheet name newtype wrapper
///
/// Names a sub-resource of a workbook document. Follows the usual
/// spreadsheet rules: 1 to 31 characters, none of `[ ] : * ? / \`.
///
/// # Examples
///
/// ```
/// use sheetbridge::domain::ids::SheetName;
/// use std::str::FromStr;
///
/// let name = SheetName::from_str("users-1").unwrap();
/// assert_eq!(name.as_str(), "users-1");
/// assert!(SheetName::from_str("bad/name").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SheetName(String);

impl SheetName {
    /// Creates a new SheetName from a string
    ///
    /// # Returns
    ///
    /// Returns `Ok(SheetName)` if the name is valid, `Err` otherwise
    pub fn new(name: impl Into<String>) -> Result<Self, String> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err("Sheet name cannot be empty".to_string());
        }
        if name.chars().count() > MAX_SHEET_NAME_LEN {
            return Err(format!(
                "Sheet name '{name}' exceeds {MAX_SHEET_NAME_LEN} characters"
            ));
        }
        if let Some(c) = name.chars().find(|c| FORBIDDEN_SHEET_CHARS.contains(c)) {
            return Err(format!("Sheet name '{name}' contains forbidden character '{c}'"));
        }
        Ok(Self(name))
    }

    /// Derives the deterministic name of the sheet holding page `index`
    ///
    /// Sheets are numbered from 1 for readers, so page 0 becomes
    /// `{prefix}1`.
    pub fn for_page(prefix: &str, index: usize) -> Result<Self, String> {
        Self::new(format!("{prefix}{}", index + 1))
    }

    /// Returns the sheet name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SheetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SheetName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for SheetName {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SheetName> for String {
    fn from(name: SheetName) -> Self {
        name.0
    }
}

/// SQL identifier newtype wrapper
///
/// Table and column names cannot be bound as statement parameters, so they
/// are restricted to `[A-Za-z_][A-Za-z0-9_]*` (optionally schema-qualified
/// with a single dot) and interpolated through [`SqlIdentifier::quoted`].
/// Names are case-sensitive: `UserId` refers to the column `"UserId"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SqlIdentifier(String);

impl SqlIdentifier {
    /// Creates a new SqlIdentifier from a string
    pub fn new(ident: impl Into<String>) -> Result<Self, String> {
        let ident = ident.into();
        if ident.is_empty() {
            return Err("SQL identifier cannot be empty".to_string());
        }
        let parts: Vec<&str> = ident.split('.').collect();
        if parts.len() > 2 || !parts.iter().all(|p| is_plain_identifier(p)) {
            return Err(format!(
                "Invalid SQL identifier '{ident}'. Expected letters, digits and underscores"
            ));
        }
        Ok(Self(ident))
    }

    /// Wraps a compile-time identifier known to be valid
    pub(crate) fn from_static(ident: &'static str) -> Self {
        debug_assert!(ident.split('.').all(is_plain_identifier));
        Self(ident.to_string())
    }

    /// Returns the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the identifier carries a schema qualifier
    pub fn is_qualified(&self) -> bool {
        self.0.contains('.')
    }

    /// Double-quoted form for SQL text, e.g. `"public"."Users"`
    ///
    /// Quoting keeps the exact case and lets reserved words such as `user`
    /// be used as names.
    pub fn quoted(&self) -> String {
        self.0
            .split('.')
            .map(|part| format!("\"{part}\""))
            .collect::<Vec<_>>()
            .join(".")
    }
}

fn is_plain_identifier(part: &str) -> bool {
    let mut chars = part.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl fmt::Display for SqlIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SqlIdentifier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for SqlIdentifier {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SqlIdentifier> for String {
    fn from(ident: SqlIdentifier) -> Self {
        ident.0
    }
}
