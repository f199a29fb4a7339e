use std::{io, path::PathBuf};

use sindri_types::{CircuitDetail, CircuitId, JobStatus, ProofDetail, ProofId};
use thiserror::Error;

use crate::poll::Job;

/// Error type for Sindri client operations.
#[derive(Debug, Error)]
pub enum Error {
    /// API key missing, unusable as a header, or rejected by the service (HTTP 401).
    #[error("Authentication failed: {0}")]
    Auth(String),
    /// The referenced resource does not exist (HTTP 404).
    #[error("Not found: {url}")]
    NotFound {
        /// Requested URL.
        url: String,
    },
    /// The response body is not JSON or does not have the expected shape.
    #[error("Unexpected response from {url}: {reason}")]
    Protocol {
        /// Requested URL.
        url: String,
        /// What did not match.
        reason: String,
    },
    /// Server returned any other non-success status.
    #[error("Requested {url} failed with status {status} and body {body}")]
    Api {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
    },
    /// Circuit compilation reached the `Failed` status.
    #[error("Compilation of circuit {circuit_id} failed: {}", .detail.error.as_deref().unwrap_or("no error reported"))]
    Compilation {
        /// The failed circuit.
        circuit_id: CircuitId,
        /// Last detail observed while polling.
        detail: Box<CircuitDetail>,
    },
    /// Proof generation reached the `Failed` status.
    #[error("Proof {proof_id} failed: {}", .detail.error.as_deref().unwrap_or("no error reported"))]
    Proving {
        /// The failed proof.
        proof_id: ProofId,
        /// Last detail observed while polling.
        detail: Box<ProofDetail>,
    },
    /// Polling budget exhausted before a terminal status was observed.
    #[error("Gave up waiting for {job} {id} after {attempts} status reads (last status: {})", .last_status.as_ref().map(JobStatus::as_str).unwrap_or("none"))]
    Timeout {
        /// Kind of job being polled.
        job: Job,
        /// Identifier of the polled resource.
        id: String,
        /// Number of status reads issued.
        attempts: u32,
        /// Last non-terminal status, if any read was made.
        last_status: Option<JobStatus>,
    },
    /// Transport failure below HTTP (DNS, refused connection, request timeout).
    #[error("Unable to connect to the Sindri API at {url}: {reason}")]
    Connection {
        /// Requested URL.
        url: String,
        /// Description of the transport failure.
        reason: String,
    },
    /// Failed to read or package a source bundle.
    #[error("Failed to package source bundle {}: {source}", .path.display())]
    Bundle {
        /// Offending path.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },
    /// Base URL could not be parsed or joined.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// Failed to load or parse configuration.
    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn bundle(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Bundle {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
