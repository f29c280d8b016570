use thiserror::Error;

use crate::domain::order::OrderStatus;
use crate::formula::FormulaError;
use crate::reference::ReferenceError;

/// Caller-visible reasons a quote could not be produced.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum PricingError {
    #[error("reference data not loaded: {what}")]
    MissingReferenceData { what: String },
    #[error("invalid {field}: {reason}")]
    InvalidInput { field: String, reason: String },
    #[error(transparent)]
    FormulaEvaluation(#[from] FormulaError),
}

impl PricingError {
    pub fn missing_reference(what: impl Into<String>) -> Self {
        Self::MissingReferenceData { what: what.into() }
    }

    pub fn invalid_input(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput { field: field.into(), reason: reason.into() }
    }

    pub fn class(&self) -> &'static str {
        match self {
            Self::MissingReferenceData { .. } => "missing_reference_data",
            Self::InvalidInput { .. } => "invalid_input",
            Self::FormulaEvaluation(_) => "formula_evaluation",
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid order transition from {from:?} to {to:?}")]
    InvalidOrderTransition { from: OrderStatus, to: OrderStatus },
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Pricing(#[from] PricingError),
    #[error(transparent)]
    Reference(#[from] ReferenceError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { kind: &'static str, message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { kind: &'static str, message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::NotFound { .. } => "The requested record does not exist.",
            Self::ServiceUnavailable { .. } => {
                "Prices cannot be calculated right now. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::BadRequest { kind, .. } | Self::ServiceUnavailable { kind, .. } => kind,
            Self::NotFound { .. } => "not_found",
            Self::Internal { .. } => "internal",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest { message, .. }
            | Self::NotFound { message, .. }
            | Self::ServiceUnavailable { message, .. }
            | Self::Internal { message, .. } => message,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let correlation_id = "unassigned".to_owned();
        match value {
            ApplicationError::Domain(error) => {
                Self::BadRequest { kind: "domain", message: error.to_string(), correlation_id }
            }
            ApplicationError::Pricing(error @ PricingError::MissingReferenceData { .. }) => {
                Self::ServiceUnavailable {
                    kind: error.class(),
                    message: error.to_string(),
                    correlation_id,
                }
            }
            ApplicationError::Pricing(error) => {
                Self::BadRequest { kind: error.class(), message: error.to_string(), correlation_id }
            }
            ApplicationError::Reference(error) => Self::ServiceUnavailable {
                kind: "reference_data",
                message: error.to_string(),
                correlation_id,
            },
            ApplicationError::NotFound(message) => Self::NotFound { message, correlation_id },
            ApplicationError::Configuration(message) => Self::Internal { message, correlation_id },
        }
    }
}
