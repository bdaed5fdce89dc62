/// Classification of PostgreSQL errors
///
/// Services catch constraint violations narrowly, by constraint name, and
/// retry transactions that failed on serialization conflicts or deadlocks.

/// SQLSTATE for unique_violation
pub const UNIQUE_VIOLATION: &str = "23505";

/// SQLSTATE for serialization_failure
pub const SERIALIZATION_FAILURE: &str = "40001";

/// SQLSTATE for deadlock_detected
pub const DEADLOCK_DETECTED: &str = "40P01";

fn sqlstate(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db) => db.code().map(|code| code.into_owned()),
        _ => None,
    }
}

/// Name of the unique constraint `err` violated, if that is what happened
pub fn unique_violation_constraint(err: &sqlx::Error) -> Option<&str> {
    match err {
        sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
            db.constraint()
        }
        _ => None,
    }
}

/// Whether `err` violated the unique constraint `constraint`
pub fn is_unique_violation_of(err: &sqlx::Error, constraint: &str) -> bool {
    unique_violation_constraint(err) == Some(constraint)
}

/// Serialization failures and deadlocks; the transaction may succeed on retry
pub fn is_transient(err: &sqlx::Error) -> bool {
    matches!(
        sqlstate(err).as_deref(),
        Some(SERIALIZATION_FAILURE) | Some(DEADLOCK_DETECTED)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_database_errors_are_not_classified() {
        let err = sqlx::Error::RowNotFound;

        assert!(unique_violation_constraint(&err).is_none());
        assert!(!is_unique_violation_of(&err, "users_email_key"));
        assert!(!is_transient(&err));
        assert!(!is_transient(&sqlx::Error::PoolTimedOut));
    }
}
