//! Identifier validation for SQL injection prevention
//!
//! Every table and column name that reaches rendered SQL passes through this
//! module. Two checks apply, in order:
//! - the identifier syntax pattern (letter or underscore, then letters,
//!   digits and underscores)
//! - membership in the relevant [`AllowList`] set
//!
//! The allow-lists are `&'static str` sets built in code. Extending them is a
//! code change and a redeploy, never a runtime operation.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::SecurityError;

/// Longest identifier accepted, matching the PostgreSQL limit so schemas stay portable
const MAX_IDENTIFIER_LEN: usize = 63;

static IDENTIFIER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern compiles"));

static APPLICATION_ALLOW_LIST: Lazy<AllowList> = Lazy::new(|| {
    AllowList::new(
        &[
            "framework_epics",
            "framework_stories",
            "framework_tasks",
            "framework_sprints",
            "users",
            "comments",
        ],
        &[
            "id",
            "name",
            "title",
            "description",
            "status",
            "priority",
            "points",
            "epic_id",
            "story_id",
            "sprint_id",
            "user_id",
            "assignee",
            "email",
            "body",
            "started_at",
            "ended_at",
            "created_at",
            "updated_at",
        ],
    )
});

/// Validate identifier syntax only (no allow-list lookup)
///
/// # Examples
/// ```
/// use strata_orm::security::validate_identifier;
///
/// assert!(validate_identifier("framework_epics").is_ok());
/// assert!(validate_identifier("id; DROP TABLE x;--").is_err());
/// ```
pub fn validate_identifier(identifier: &str) -> Result<(), SecurityError> {
    if identifier.is_empty() {
        return Err(SecurityError::invalid(identifier, "identifier cannot be empty"));
    }

    if identifier.len() > MAX_IDENTIFIER_LEN {
        return Err(SecurityError::invalid(
            identifier,
            "identifier is longer than 63 characters",
        ));
    }

    if !IDENTIFIER_PATTERN.is_match(identifier) {
        return Err(SecurityError::invalid(
            identifier,
            "identifier must start with a letter or underscore and contain only letters, digits and underscores",
        ));
    }

    Ok(())
}

/// Split `"name alias"` or `"name AS alias"` into its parts
fn split_alias(reference: &str) -> Result<(&str, Option<&str>), SecurityError> {
    let tokens: Vec<&str> = reference.split_whitespace().collect();
    match tokens.as_slice() {
        [name] => Ok((*name, None)),
        [name, alias] => Ok((*name, Some(*alias))),
        [name, keyword, alias] if keyword.eq_ignore_ascii_case("as") => Ok((*name, Some(*alias))),
        _ => Err(SecurityError::invalid(
            reference,
            "expected 'name', 'name alias' or 'name AS alias'",
        )),
    }
}

/// Static table and column allow-lists
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    tables: HashSet<&'static str>,
    columns: HashSet<&'static str>,
}

impl AllowList {
    /// Create an allow-list from fixed table and column names
    pub fn new(tables: &[&'static str], columns: &[&'static str]) -> Self {
        Self {
            tables: tables.iter().copied().collect(),
            columns: columns.iter().copied().collect(),
        }
    }

    /// The application's deployed allow-list
    pub fn application() -> &'static AllowList {
        &APPLICATION_ALLOW_LIST
    }

    pub fn allows_table(&self, table: &str) -> bool {
        self.tables.contains(table)
    }

    pub fn allows_column(&self, column: &str) -> bool {
        self.columns.contains(column)
    }

    /// Validate a table reference, optionally aliased (`"framework_epics e"`)
    ///
    /// Returns the normalized text to splice into SQL.
    pub fn validate_table(&self, reference: &str) -> Result<String, SecurityError> {
        let (table, alias) = split_alias(reference)?;
        validate_identifier(table)?;
        if !self.allows_table(table) {
            return Err(SecurityError::TableNotAllowed(table.to_string()));
        }

        match alias {
            Some(alias) => {
                validate_identifier(alias)?;
                Ok(format!("{} AS {}", table, alias))
            }
            None => Ok(table.to_string()),
        }
    }

    /// Validate a column reference
    ///
    /// Accepts `column`, `qualifier.column` and either form with an alias.
    /// The qualifier and alias must be syntactically valid; only the column
    /// itself is checked against the allow-list.
    pub fn validate_column(&self, reference: &str) -> Result<String, SecurityError> {
        let (path, alias) = split_alias(reference)?;

        let column = match path.split_once('.') {
            Some((qualifier, column)) => {
                validate_identifier(qualifier)?;
                column
            }
            None => path,
        };

        validate_identifier(column)?;
        if !self.allows_column(column) {
            return Err(SecurityError::ColumnNotAllowed(column.to_string()));
        }

        match alias {
            Some(alias) => {
                validate_identifier(alias)?;
                Ok(format!("{} AS {}", path, alias))
            }
            None => Ok(path.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allow_list() -> AllowList {
        AllowList::new(&["users", "posts"], &["id", "name", "user_id"])
    }

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("user_table").is_ok());
        assert!(validate_identifier("table1").is_ok());
        assert!(validate_identifier("_private").is_ok());

        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("1table").is_err());
        assert!(validate_identifier("table-name").is_err());
        assert!(validate_identifier("table name").is_err());
        assert!(validate_identifier(&"a".repeat(64)).is_err());
    }

    #[test]
    fn test_injection_payloads_rejected() {
        let list = allow_list();
        for payload in [
            "id; DROP TABLE x;--",
            "id--",
            "name/*",
            "users WHERE 1=1",
            "'; DROP TABLE users; --",
        ] {
            assert!(list.validate_column(payload).is_err(), "accepted {payload}");
            assert!(list.validate_table(payload).is_err(), "accepted {payload}");
        }
    }

    #[test]
    fn test_allow_list_membership() {
        let list = allow_list();
        assert_eq!(list.validate_table("users").unwrap(), "users");
        assert_eq!(
            list.validate_table("admin_table"),
            Err(SecurityError::TableNotAllowed("admin_table".to_string()))
        );
        assert_eq!(
            list.validate_column("password"),
            Err(SecurityError::ColumnNotAllowed("password".to_string()))
        );
    }

    #[test]
    fn test_aliases_are_stripped_before_lookup() {
        let list = allow_list();
        assert_eq!(list.validate_table("users u").unwrap(), "users AS u");
        assert_eq!(list.validate_table("users AS u").unwrap(), "users AS u");
        assert_eq!(list.validate_column("u.name").unwrap(), "u.name");
        assert_eq!(list.validate_column("u.name as n").unwrap(), "u.name AS n");
        assert!(list.validate_column("u.password").is_err());
        assert!(list.validate_table("users u;").is_err());
    }

    #[test]
    fn test_application_list_is_shared() {
        let list = AllowList::application();
        assert!(list.allows_table("framework_epics"));
        assert!(list.allows_column("status"));
        assert!(!list.allows_table("not_a_real_table"));
    }
}
