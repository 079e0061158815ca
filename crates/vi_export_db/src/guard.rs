//! Guards for the one piece of configuration that is spliced into SQL.
//!
//! The cutoff is always bound as a parameter, but PostgreSQL cannot bind a
//! table name, so the configured table goes through `validate_identifier`
//! before the statement is assembled, and the assembled statement goes
//! through `validate_read_only`.

use std::error::Error;
use std::fmt;

const MAX_IDENTIFIER_LEN: usize = 63;
const FORBIDDEN_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "DROP", "CREATE", "ALTER", "TRUNCATE", "COPY", "GRANT",
    "REVOKE", "UNION", "SELECT", "WHERE", "FROM",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardError {
    message: String,
}

impl GuardError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for GuardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for GuardError {}

/// Validate a table name: `table` or `schema.table`, unquoted.
pub fn validate_identifier(name: &str) -> Result<(), GuardError> {
    if name.trim().is_empty() {
        return Err(GuardError::new("Table name is empty"));
    }

    let parts: Vec<&str> = name.split('.').collect();
    if parts.len() > 2 {
        return Err(GuardError::new(format!(
            "Table name '{}' has more than one schema qualifier",
            name
        )));
    }

    for part in parts {
        validate_part(name, part)?;
    }
    Ok(())
}

fn validate_part(full: &str, part: &str) -> Result<(), GuardError> {
    let mut chars = part.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => {
            return Err(GuardError::new(format!(
                "Table name '{}' must start each part with a letter or underscore",
                full
            )))
        }
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(GuardError::new(format!(
            "Table name '{}' may only contain letters, digits and underscores",
            full
        )));
    }
    if part.len() > MAX_IDENTIFIER_LEN {
        return Err(GuardError::new(format!(
            "Table name part '{}' exceeds {} characters",
            part, MAX_IDENTIFIER_LEN
        )));
    }
    let upper = part.to_ascii_uppercase();
    if FORBIDDEN_KEYWORDS.contains(&upper.as_str()) {
        return Err(GuardError::new(format!(
            "Table name '{}' is a reserved keyword",
            full
        )));
    }
    Ok(())
}

/// Validate that an assembled statement is a single SELECT.
pub fn validate_read_only(sql: &str) -> Result<(), GuardError> {
    let trimmed = sql.trim().trim_end_matches(';').trim_end();
    if trimmed.is_empty() {
        return Err(GuardError::new("Query is empty"));
    }
    if trimmed.contains(';') {
        return Err(GuardError::new("Multiple statements are not allowed"));
    }

    let tokens = tokens_upper(trimmed);
    if tokens.first().map(String::as_str) != Some("SELECT") {
        return Err(GuardError::new("Query must start with SELECT"));
    }
    for token in &tokens {
        if matches!(
            token.as_str(),
            "INSERT" | "UPDATE" | "DELETE" | "DROP" | "CREATE" | "ALTER" | "TRUNCATE" | "COPY"
        ) {
            return Err(GuardError::new(format!(
                "Query contains forbidden keyword: {}",
                token
            )));
        }
    }
    Ok(())
}

fn tokens_upper(sql: &str) -> Vec<String> {
    sql.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .filter(|t| !t.is_empty())
        .map(|t| t.to_ascii_uppercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_identifier_accepts_plain_and_qualified() {
        assert!(validate_identifier("reports").is_ok());
        assert!(validate_identifier("public.reports").is_ok());
        assert!(validate_identifier("_vi_reports_2024").is_ok());
    }

    #[test]
    fn test_validate_identifier_rejects_injection() {
        assert!(validate_identifier("reports; DROP TABLE reports").is_err());
        assert!(validate_identifier("\"reports\"").is_err());
        assert!(validate_identifier("reports--").is_err());
        assert!(validate_identifier("reports r").is_err());
    }

    #[test]
    fn test_validate_identifier_rejects_malformed() {
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("   ").is_err());
        assert!(validate_identifier("1reports").is_err());
        assert!(validate_identifier("a.b.c").is_err());
        assert!(validate_identifier("public.").is_err());
        assert!(validate_identifier(&"r".repeat(64)).is_err());
    }

    #[test]
    fn test_validate_identifier_rejects_keywords() {
        assert!(validate_identifier("select").is_err());
        assert!(validate_identifier("public.Drop").is_err());
    }

    #[test]
    fn test_validate_read_only() {
        assert!(validate_read_only("SELECT id FROM reports WHERE date_inspected > $1").is_ok());
        assert!(validate_read_only("SELECT id FROM reports;").is_ok());
        assert!(validate_read_only("SELECT 1; DROP TABLE reports").is_err());
        assert!(validate_read_only("DELETE FROM reports").is_err());
        assert!(validate_read_only("").is_err());
    }
}
