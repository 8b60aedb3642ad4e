// ABOUTME: Custom error types for the migrator
// ABOUTME: Provides context-specific error variants with actionable messages

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MigratorError {
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Permission error: {0}")]
    Permission(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Migration error: {0}")]
    Migration(String),
    #[error("Script error: {0}")]
    Script(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T, E = MigratorError> = std::result::Result<T, E>;

const INSUFFICIENT_PRIVILEGE: &str = "42501";

impl From<tokio_postgres::Error> for MigratorError {
    fn from(err: tokio_postgres::Error) -> Self {
        if err.is_closed() {
            return MigratorError::Connection(format!(
                "the database connection was closed ({}). Check that the server is reachable and retry",
                err
            ));
        }

        match err.as_db_error() {
            Some(db) if db.code().code() == INSUFFICIENT_PRIVILEGE => {
                MigratorError::Permission(format!(
                    "{}. The migration role needs ownership of the TRS schema objects",
                    db.message()
                ))
            }
            Some(db) => {
                let mut message = format!("{} (SQLSTATE {})", db.message(), db.code().code());
                if let Some(detail) = db.detail() {
                    message.push_str(": ");
                    message.push_str(detail);
                }
                MigratorError::Migration(message)
            }
            None if is_io_failure(&err) => MigratorError::Connection(err.to_string()),
            None => MigratorError::Migration(err.to_string()),
        }
    }
}

/// True when `err` or anything in its source chain is an I/O failure.
fn is_io_failure(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if e.is::<std::io::Error>() {
            return true;
        }
        current = e.source();
    }
    false
}

impl From<std::io::Error> for MigratorError {
    fn from(err: std::io::Error) -> Self {
        MigratorError::Script(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_prefixes() {
        let err = MigratorError::Validation("bad id".to_string());
        assert_eq!(err.to_string(), "Validation error: bad id");

        let err = MigratorError::Config("missing database_url".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing database_url");
    }

    #[derive(Debug)]
    struct Wrapped(Box<dyn std::error::Error + Send + Sync>);

    impl std::fmt::Display for Wrapped {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "wrapped")
        }
    }

    impl std::error::Error for Wrapped {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            Some(self.0.as_ref())
        }
    }

    #[test]
    fn test_io_failure_found_in_source_chain() {
        let reset = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
        assert!(is_io_failure(&reset));
        assert!(is_io_failure(&Wrapped(Box::new(reset))));
    }

    #[test]
    fn test_conversion_failure_is_not_io() {
        let parse = "abc".parse::<i32>().unwrap_err();
        assert!(!is_io_failure(&parse));
        assert!(!is_io_failure(&Wrapped(Box::new(parse))));
    }

    #[test]
    fn test_io_error_maps_to_script() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err: MigratorError = io.into();
        assert!(matches!(err, MigratorError::Script(_)));
    }
}
