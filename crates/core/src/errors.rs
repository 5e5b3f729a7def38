use thiserror::Error;

pub const SERVICE_UNAVAILABLE_APOLOGY: &str =
    "Sorry, there was a problem with the AI service. Please try again later.";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

/// Failure reported by the answering service.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AnswerError {
    /// Remote model or transport failure; expected to be transient.
    #[error("answering service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("unexpected answering failure: {0}")]
    Unexpected(String),
}

/// Handling failure as surfaced to the end user. Never leaves the process as
/// an HTTP error; it is rendered into the fulfillment text instead.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FulfillmentError {
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("unexpected error: {message}")]
    Unexpected { message: String, correlation_id: String },
}

impl FulfillmentError {
    pub fn user_message(&self) -> String {
        match self {
            Self::ServiceUnavailable { .. } => SERVICE_UNAVAILABLE_APOLOGY.to_string(),
            Self::Unexpected { message, .. } => format!(
                "Sorry, something went wrong with the assistant. Error: {message}. Please try again."
            ),
        }
    }

    pub fn error_class(&self) -> &'static str {
        match self {
            Self::ServiceUnavailable { .. } => "service_unavailable",
            Self::Unexpected { .. } => "unexpected",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::ServiceUnavailable { correlation_id, .. }
            | Self::Unexpected { correlation_id, .. } => correlation_id,
        }
    }
}

impl AnswerError {
    pub fn into_fulfillment(self, correlation_id: impl Into<String>) -> FulfillmentError {
        let correlation_id = correlation_id.into();
        match self {
            Self::ServiceUnavailable(message) => {
                FulfillmentError::ServiceUnavailable { message, correlation_id }
            }
            Self::Unexpected(message) => FulfillmentError::Unexpected { message, correlation_id },
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::{AnswerError, FulfillmentError, SERVICE_UNAVAILABLE_APOLOGY};

    #[test]
    fn service_unavailable_maps_to_fixed_apology() {
        let error = AnswerError::ServiceUnavailable("HTTP 503: overloaded".to_owned())
            .into_fulfillment("req-1");

        assert!(matches!(
            error,
            FulfillmentError::ServiceUnavailable { ref correlation_id, .. } if correlation_id == "req-1"
        ));
        assert_eq!(error.user_message(), SERVICE_UNAVAILABLE_APOLOGY);
        assert!(!error.user_message().contains("overloaded"));
    }

    #[test]
    fn unexpected_error_includes_detail_in_user_message() {
        let error = AnswerError::Unexpected("tool registry poisoned".to_owned())
            .into_fulfillment("req-2");

        assert_eq!(error.error_class(), "unexpected");
        assert_eq!(error.correlation_id(), "req-2");
        assert!(error.user_message().contains("tool registry poisoned"));
    }
}
