use diesel::result::DatabaseErrorKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),
    #[error("Foreign key constraint violated: {0}")]
    ForeignKeyViolation(String),
    #[error("Not null constraint violated: {0}")]
    NotNullViolation(String),
    #[error("{entity} with id {id} not found")]
    NotFound { entity: &'static str, id: i32 },
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Error with diesel: {source}")]
    DieselError { source: diesel::result::Error },
    #[error("Error with r2d2: {source}")]
    R2d2Error {
        #[from]
        source: r2d2::Error,
    },
    #[error("Error running migrations: {0}")]
    MigrationError(String),
    #[error("Error parsing schedule: {source}")]
    CronError {
        #[from]
        source: cron::error::Error,
    },
    #[error("Error with activity data: {source}")]
    JsonError {
        #[from]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<diesel::result::Error> for Error {
    fn from(source: diesel::result::Error) -> Self {
        if let diesel::result::Error::DatabaseError(kind, info) = &source {
            let message = info.message().to_string();
            match kind {
                DatabaseErrorKind::UniqueViolation => return Error::UniqueViolation(message),
                DatabaseErrorKind::ForeignKeyViolation => {
                    return Error::ForeignKeyViolation(message)
                }
                DatabaseErrorKind::NotNullViolation => return Error::NotNullViolation(message),
                _ => {}
            }
        }

        Error::DieselError { source }
    }
}

impl Error {
    /// True for any error raised by a schema constraint.
    pub fn is_integrity_error(&self) -> bool {
        matches!(
            self,
            Error::UniqueViolation(_) | Error::ForeignKeyViolation(_) | Error::NotNullViolation(_)
        )
    }
}
