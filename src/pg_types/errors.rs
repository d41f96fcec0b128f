use tokio_postgres::error::SqlState;

/// The SQLSTATE carried by a server-side `PostgreSQL` error.
#[must_use]
pub fn errorcode_from_error(err: &tokio_postgres::Error) -> Option<&str> {
    err.code().map(SqlState::code)
}

/// Symbolic name for a SQLSTATE code, e.g. `42P01` -> `UNDEFINED_TABLE`.
///
/// Covers the codes an administrative tool is likely to see; unknown codes
/// fall back to the name of their class.
#[must_use]
pub fn pg_errorname_lookup(code: &str) -> Option<&'static str> {
    let name = match code {
        "00000" => "SUCCESSFUL_COMPLETION",
        "01000" => "WARNING",
        "08000" => "CONNECTION_EXCEPTION",
        "08001" => "SQLCLIENT_UNABLE_TO_ESTABLISH_SQLCONNECTION",
        "08003" => "CONNECTION_DOES_NOT_EXIST",
        "08004" => "SQLSERVER_REJECTED_ESTABLISHMENT_OF_SQLCONNECTION",
        "08006" => "CONNECTION_FAILURE",
        "08P01" => "PROTOCOL_VIOLATION",
        "0A000" => "FEATURE_NOT_SUPPORTED",
        "21000" => "CARDINALITY_VIOLATION",
        "22001" => "STRING_DATA_RIGHT_TRUNCATION",
        "22003" => "NUMERIC_VALUE_OUT_OF_RANGE",
        "22007" => "INVALID_DATETIME_FORMAT",
        "22008" => "DATETIME_FIELD_OVERFLOW",
        "22012" => "DIVISION_BY_ZERO",
        "22P02" => "INVALID_TEXT_REPRESENTATION",
        "23000" => "INTEGRITY_CONSTRAINT_VIOLATION",
        "23502" => "NOT_NULL_VIOLATION",
        "23503" => "FOREIGN_KEY_VIOLATION",
        "23505" => "UNIQUE_VIOLATION",
        "23514" => "CHECK_VIOLATION",
        "23P01" => "EXCLUSION_VIOLATION",
        "25001" => "ACTIVE_SQL_TRANSACTION",
        "25P02" => "IN_FAILED_SQL_TRANSACTION",
        "28000" => "INVALID_AUTHORIZATION_SPECIFICATION",
        "28P01" => "INVALID_PASSWORD",
        "2BP01" => "DEPENDENT_OBJECTS_STILL_EXIST",
        "3D000" => "INVALID_CATALOG_NAME",
        "3F000" => "INVALID_SCHEMA_NAME",
        "40001" => "SERIALIZATION_FAILURE",
        "40P01" => "DEADLOCK_DETECTED",
        "42501" => "INSUFFICIENT_PRIVILEGE",
        "42601" => "SYNTAX_ERROR",
        "42701" => "DUPLICATE_COLUMN",
        "42703" => "UNDEFINED_COLUMN",
        "42704" => "UNDEFINED_OBJECT",
        "42710" => "DUPLICATE_OBJECT",
        "42883" => "UNDEFINED_FUNCTION",
        "42P01" => "UNDEFINED_TABLE",
        "42P04" => "DUPLICATE_DATABASE",
        "42P06" => "DUPLICATE_SCHEMA",
        "42P07" => "DUPLICATE_TABLE",
        "53000" => "INSUFFICIENT_RESOURCES",
        "53300" => "TOO_MANY_CONNECTIONS",
        "55006" => "OBJECT_IN_USE",
        "55P03" => "LOCK_NOT_AVAILABLE",
        "57014" => "QUERY_CANCELED",
        "57P01" => "ADMIN_SHUTDOWN",
        "57P03" => "CANNOT_CONNECT_NOW",
        "58030" => "IO_ERROR",
        "XX000" => "INTERNAL_ERROR",
        _ => return class_name(code),
    };
    Some(name)
}

fn class_name(code: &str) -> Option<&'static str> {
    let name = match code.get(..2)? {
        "08" => "CLASS_CONNECTION_EXCEPTION",
        "22" => "CLASS_DATA_EXCEPTION",
        "23" => "CLASS_INTEGRITY_CONSTRAINT_VIOLATION",
        "25" => "CLASS_INVALID_TRANSACTION_STATE",
        "28" => "CLASS_INVALID_AUTHORIZATION_SPECIFICATION",
        "40" => "CLASS_TRANSACTION_ROLLBACK",
        "42" => "CLASS_SYNTAX_ERROR_OR_ACCESS_RULE_VIOLATION",
        "53" => "CLASS_INSUFFICIENT_RESOURCES",
        "55" => "CLASS_OBJECT_NOT_IN_PREREQUISITE_STATE",
        "57" => "CLASS_OPERATOR_INTERVENTION",
        "58" => "CLASS_SYSTEM_ERROR",
        "XX" => "CLASS_INTERNAL_ERROR",
        _ => return None,
    };
    Some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes() {
        assert_eq!(pg_errorname_lookup("42P01"), Some("UNDEFINED_TABLE"));
        assert_eq!(pg_errorname_lookup("55006"), Some("OBJECT_IN_USE"));
    }

    #[test]
    fn falls_back_to_class() {
        assert_eq!(
            pg_errorname_lookup("42P99"),
            Some("CLASS_SYNTAX_ERROR_OR_ACCESS_RULE_VIOLATION")
        );
        assert_eq!(pg_errorname_lookup("ZZ999"), None);
        assert_eq!(pg_errorname_lookup(""), None);
    }
}
