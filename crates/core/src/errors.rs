use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid slot `{0}` (expected 1..=4)")]
    InvalidSlot(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("request authentication failed: {0}")]
    Authentication(String),
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
    #[error("unsupported slash command: {0}")]
    UnsupportedCommand(String),
    #[error("integration failure: {0}")]
    Integration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("unauthorized: {message}")]
    Unauthorized { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Unauthorized { .. } => "The request could not be verified.",
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    /// HTTP status class the webhook transport answers with.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Unauthorized { .. } => 401,
            Self::Internal { .. } => 500,
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::Unauthorized { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::Unauthorized { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let correlation_id = "unassigned".to_owned();
        match value {
            // parse failures share the signature-failure status
            ApplicationError::Authentication(message)
            | ApplicationError::MalformedPayload(message) => {
                Self::Unauthorized { message, correlation_id }
            }
            ApplicationError::Domain(error) => {
                Self::Unauthorized { message: error.to_string(), correlation_id }
            }
            ApplicationError::Integration(message) => Self::Internal { message, correlation_id },
            ApplicationError::UnsupportedCommand(command) => Self::Internal {
                message: format!("unsupported slash command `{command}`"),
                correlation_id,
            },
        }
    }
}
