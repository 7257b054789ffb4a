use thiserror::Error;

/// Any failure at the node boundary: transport, timeout, revert, malformed payload or a range
/// the node refuses to scan.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
#[error("{0}")]
pub struct NodeQueryFailed(pub String);

impl NodeQueryFailed {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    /// Flattens an error chain into a single message.
    pub fn from_error(err: &anyhow::Error) -> Self {
        Self(format!("{err:#}"))
    }
}

#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum GatewayError {
    /// The block bounds could not be turned into an ordered pair of block numbers.
    #[error("Invalid block range: {0}")]
    InvalidRange(String),

    /// The value to write is not an unsigned 256-bit integer.
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// The node could not answer, carries the original cause.
    #[error("Blockchain Error: {0}")]
    Unavailable(String),
}

impl GatewayError {
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            GatewayError::InvalidRange(_) | GatewayError::InvalidValue(_)
        )
    }

    /// Short label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::InvalidRange(_) => "invalid_range",
            GatewayError::InvalidValue(_) => "invalid_value",
            GatewayError::Unavailable(_) => "unavailable",
        }
    }
}

impl From<NodeQueryFailed> for GatewayError {
    fn from(err: NodeQueryFailed) -> Self {
        GatewayError::Unavailable(err.0)
    }
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;

    use super::*;

    #[test]
    fn test_unavailable_keeps_cause() {
        let err = anyhow!("connection refused").context("eth_call");
        let err: GatewayError = NodeQueryFailed::from_error(&err).into();

        assert_eq!(
            err,
            GatewayError::Unavailable("eth_call: connection refused".to_string())
        );
        assert_eq!(err.to_string(), "Blockchain Error: eth_call: connection refused");
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_client_errors() {
        assert!(GatewayError::InvalidRange("x".into()).is_client_error());
        assert!(GatewayError::InvalidValue("x".into()).is_client_error());
        assert_eq!(GatewayError::InvalidRange("x".into()).kind(), "invalid_range");
    }
}
