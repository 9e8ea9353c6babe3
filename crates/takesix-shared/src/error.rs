use thiserror::Error;

/// Failure of a call to the game server.
///
/// Every variant displays as a single human-readable message so callers can
/// surface it uniformly. For [`ApiError::Server`] that message is the
/// server's `error` string, verbatim.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Connection refused, DNS failure, TLS error, ...
    #[error("{0}")]
    Transport(String),

    /// The request did not complete in time.
    #[error("request timed out")]
    Timeout,

    /// The server answered with a non-success status and an error payload.
    #[error("{message}")]
    Server { status: u16, message: String },

    /// The response body did not match the expected envelope.
    #[error("invalid response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Message to show to the user.
    pub fn message(&self) -> String {
        self.to_string()
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_message_is_verbatim() {
        let err = ApiError::Server {
            status: 400,
            message: "User has already chosen a card".into(),
        };
        assert_eq!(err.message(), "User has already chosen a card");
        assert_eq!(err.status(), Some(400));
        assert_eq!(ApiError::Timeout.status(), None);
    }
}
