//! Error types for transport operations.

use thiserror::Error;

/// Error type for transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The requested network kind is not a stream transport we can listen on.
    #[error("unsupported network: {network}")]
    UnsupportedNetwork {
        /// Network kind as given by the caller.
        network: String,
    },

    /// The address could not be parsed as `host:port`.
    #[error("invalid address {address:?}: {message}")]
    InvalidAddress {
        /// Address as given by the caller.
        address: String,
        /// Error message.
        message: String,
    },

    /// The address resolved to nothing usable for the network kind.
    #[error("no {network} address found for {address:?}")]
    AddressResolution {
        /// Network kind used for filtering.
        network: String,
        /// Address as given by the caller.
        address: String,
    },

    /// Binding the listener failed.
    #[error("failed to bind {address}: {source}")]
    Bind {
        /// Address we tried to bind.
        address: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl TransportError {
    /// Creates an unsupported network error.
    pub fn unsupported_network(network: impl Into<String>) -> Self {
        Self::UnsupportedNetwork {
            network: network.into(),
        }
    }

    /// Creates an invalid address error.
    pub fn invalid_address(address: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidAddress {
            address: address.into(),
            message: message.into(),
        }
    }

    /// Creates a bind error.
    pub fn bind(address: impl Into<String>, source: std::io::Error) -> Self {
        Self::Bind {
            address: address.into(),
            source,
        }
    }
}
