//! Helpers for working within SQLite statement limits.

/// Bound parameters allowed in one statement by older SQLite builds
/// (`SQLITE_MAX_VARIABLE_NUMBER`).
pub const SQLITE_MAX_VARIABLES: usize = 999;

/// Rows of `columns` bound values that fit in one multi-row INSERT.
pub fn rows_per_statement(columns: usize) -> usize {
    (SQLITE_MAX_VARIABLES / columns.max(1)).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_per_statement() {
        assert_eq!(rows_per_statement(11), 90);
        assert_eq!(rows_per_statement(0), 999);
        assert_eq!(rows_per_statement(5000), 1);
    }
}
