use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClientError {
    #[error("Could not reach the registration service: {0}. Please try again or contact support.")]
    Transport(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    Permission(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Registration service returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Unexpected response from the registration service: {0}")]
    Decode(String),
}

impl ClientError {
    /// Maps a non-2xx status and the server's message onto the error taxonomy.
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            400 => ClientError::Validation(message),
            401 => ClientError::Unauthenticated(message),
            403 => ClientError::Permission(message),
            404 => ClientError::NotFound(message),
            409 => ClientError::Conflict(message),
            _ => ClientError::Status { status, message },
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(ClientError::from_status(400, "x".into()), ClientError::Validation(_)));
        assert!(matches!(ClientError::from_status(401, "x".into()), ClientError::Unauthenticated(_)));
        assert!(matches!(ClientError::from_status(403, "x".into()), ClientError::Permission(_)));
        assert!(matches!(ClientError::from_status(404, "x".into()), ClientError::NotFound(_)));
        assert!(matches!(ClientError::from_status(409, "x".into()), ClientError::Conflict(_)));
        assert_eq!(
            ClientError::from_status(502, "bad gateway".into()),
            ClientError::Status {
                status: 502,
                message: "bad gateway".into()
            }
        );
    }
}
