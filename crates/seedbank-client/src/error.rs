//! Client errors and their mapping onto repository failures.

use seedbank_accession::RepositoryError;

use crate::config::ConfigError;

/// Errors from accession API calls.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The request did not complete: connection, timeout, or body read.
    #[error("HTTP request to {endpoint} failed: {source}")]
    Http {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// The backend answered with a non-success status.
    #[error("{endpoint} returned {status}: {body}")]
    Api {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// The response body was not the expected JSON.
    #[error("failed to decode response from {endpoint}: {source}")]
    Deserialization {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl From<ClientError> for RepositoryError {
    fn from(error: ClientError) -> Self {
        match error {
            ClientError::Api {
                endpoint, status, ..
            } if status == 404 => RepositoryError::NotFound { resource: endpoint },
            ClientError::Api {
                endpoint,
                status: 409 | 412,
                body,
            } => RepositoryError::Conflict {
                resource: endpoint,
                reason: body,
            },
            ClientError::Api { status, body, .. } if (400..500).contains(&status) => {
                RepositoryError::Rejected {
                    reason: format!("{status}: {body}"),
                }
            }
            other => RepositoryError::Transport {
                reason: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(status: u16) -> ClientError {
        ClientError::Api {
            endpoint: "PUT /accessions/x".into(),
            status,
            body: "nope".into(),
        }
    }

    #[test]
    fn status_mapping() {
        assert!(matches!(
            RepositoryError::from(api(404)),
            RepositoryError::NotFound { .. }
        ));
        assert!(matches!(
            RepositoryError::from(api(409)),
            RepositoryError::Conflict { .. }
        ));
        assert!(matches!(
            RepositoryError::from(api(412)),
            RepositoryError::Conflict { .. }
        ));
        assert!(matches!(
            RepositoryError::from(api(422)),
            RepositoryError::Rejected { .. }
        ));
        assert!(matches!(
            RepositoryError::from(api(503)),
            RepositoryError::Transport { .. }
        ));
        assert!(matches!(
            RepositoryError::from(ClientError::Config(ConfigError::MissingUrl)),
            RepositoryError::Transport { .. }
        ));
    }
}
