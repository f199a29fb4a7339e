//! Shared type definitions for the Sindri proving service.
//!
//! This crate provides the request and response records used by the Sindri client
//! when creating circuits, generating proofs, and verifying them.
//!
//! ## Overview
//!
//! The types are organized around 2 remote resources:
//! - Circuit - A proof-system program uploaded to and compiled by the service
//! - Proof - A single proving job run against a compiled circuit
//!
//! Both resources move through the same [`JobStatus`] lifecycle: they start pending
//! (`Queued`, `In Progress`) and settle in exactly one terminal state (`Ready` or `Failed`).
//!
//! Response records are validated once when decoded. Fields the service adds beyond
//! the ones modeled here are kept in an `other` map so nothing is lost when a record
//! is printed back out.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Unique identifier for a circuit, assigned by the service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Hash)]
#[serde(transparent)]
pub struct CircuitId(pub String);

impl From<String> for CircuitId {
    fn from(s: String) -> Self {
        CircuitId(s)
    }
}

impl From<&str> for CircuitId {
    fn from(s: &str) -> Self {
        CircuitId(s.to_string())
    }
}

impl fmt::Display for CircuitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier for a proof, assigned by the service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Hash)]
#[serde(transparent)]
pub struct ProofId(pub String);

impl From<String> for ProofId {
    fn from(s: String) -> Self {
        ProofId(s)
    }
}

impl From<&str> for ProofId {
    fn from(s: &str) -> Self {
        ProofId(s.to_string())
    }
}

impl fmt::Display for ProofId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Status of a circuit compilation or proving job as reported by the service.
///
/// Only [`JobStatus::Ready`] and [`JobStatus::Failed`] are terminal. Labels the service
/// may introduce later are kept verbatim in [`JobStatus::Other`] and treated as pending.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobStatus {
    /// Accepted and waiting for a worker.
    Queued,
    /// A worker is compiling or proving.
    InProgress,
    /// The job finished successfully.
    Ready,
    /// The job finished with an error.
    Failed,
    /// Any other non-terminal label.
    Other(String),
}

impl JobStatus {
    /// Returns `true` once no further transitions can occur.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready | Self::Failed)
    }

    /// The label as sent on the wire.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Queued => "Queued",
            Self::InProgress => "In Progress",
            Self::Ready => "Ready",
            Self::Failed => "Failed",
            Self::Other(label) => label,
        }
    }
}

impl From<String> for JobStatus {
    fn from(label: String) -> Self {
        match label.as_str() {
            "Queued" => Self::Queued,
            "In Progress" | "InProgress" => Self::InProgress,
            "Ready" => Self::Ready,
            "Failed" => Self::Failed,
            _ => Self::Other(label),
        }
    }
}

impl From<JobStatus> for String {
    fn from(status: JobStatus) -> Self {
        match status {
            JobStatus::Other(label) => label,
            status => status.as_str().to_string(),
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Proof system a circuit is written for.
///
/// Parsing is case-insensitive and known frameworks are written back in lowercase,
/// so `"Circom"` becomes `"circom"`. Labels that are not one of the known frameworks
/// (e.g. legacy `"Circom C Groth16 bn254"`) are kept verbatim in [`CircuitType::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, strum::EnumString)]
#[serde(from = "String", into = "String")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum CircuitType {
    /// Circom circuits.
    Circom,
    /// Gnark circuits.
    Gnark,
    /// Halo2 circuits (Axiom and PSE flavors).
    Halo2,
    /// Noir circuits.
    Noir,
    /// Plonky2 circuits.
    Plonky2,
    /// Jolt guest programs.
    Jolt,
    /// Any other label.
    #[strum(disabled)]
    Other(String),
}

impl From<String> for CircuitType {
    fn from(label: String) -> Self {
        match CircuitType::from_str(&label) {
            Ok(circuit_type) => circuit_type,
            Err(_) => CircuitType::Other(label),
        }
    }
}

impl From<CircuitType> for String {
    fn from(circuit_type: CircuitType) -> Self {
        circuit_type.to_string()
    }
}

impl fmt::Display for CircuitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Circom => "circom",
            Self::Gnark => "gnark",
            Self::Halo2 => "halo2",
            Self::Noir => "noir",
            Self::Plonky2 => "plonky2",
            Self::Jolt => "jolt",
            Self::Other(label) => label,
        };
        f.write_str(label)
    }
}

/// Circuit detail returned by `circuit/{id}/detail`, `circuit/list` and `circuit/create`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitDetail {
    /// The unique identifier of the circuit.
    pub circuit_id: CircuitId,
    /// Human-readable name given at creation time.
    #[serde(default)]
    pub circuit_name: Option<String>,
    /// Proof system of the circuit.
    #[serde(default)]
    pub circuit_type: Option<CircuitType>,
    /// Compilation status.
    pub status: JobStatus,
    /// Verification key, present once compiled and only when requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_key: Option<Value>,
    /// Creation timestamp (ISO 8601).
    #[serde(default)]
    pub date_created: Option<String>,
    /// Compilation compute time (ISO 8601 duration).
    #[serde(default)]
    pub compute_time: Option<String>,
    /// Error message reported for a failed compilation.
    #[serde(default)]
    pub error: Option<String>,
    /// Remaining fields not modeled above.
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// Proof detail returned by `proof/{id}/detail`, `proof/list` and `circuit/{id}/proofs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofDetail {
    /// The unique identifier of the proof.
    pub proof_id: ProofId,
    /// The circuit this proof was generated for.
    pub circuit_id: CircuitId,
    /// Name of the circuit.
    #[serde(default)]
    pub circuit_name: Option<String>,
    /// Proof system of the circuit.
    #[serde(default)]
    pub circuit_type: Option<CircuitType>,
    /// Proving status.
    pub status: JobStatus,
    /// The input the proof was generated from, only when requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof_input: Option<Value>,
    /// Public outputs of the proof, only when requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public: Option<Value>,
    /// The proof artifact, only when requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof: Option<Value>,
    /// Verification key of the circuit, only when requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_key: Option<Value>,
    /// Creation timestamp (ISO 8601).
    #[serde(default)]
    pub date_created: Option<String>,
    /// Proving compute time (ISO 8601 duration).
    #[serde(default)]
    pub compute_time: Option<String>,
    /// Error message reported for a failed proof.
    #[serde(default)]
    pub error: Option<String>,
    /// Remaining fields not modeled above.
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl ProofDetail {
    /// Public outputs as an ordered sequence.
    ///
    /// A scalar `public` value is returned as a single-element sequence.
    pub fn public_outputs(&self) -> Vec<&Value> {
        match &self.public {
            Some(Value::Array(values)) => values.iter().collect(),
            Some(Value::Null) | None => Vec::new(),
            Some(value) => vec![value],
        }
    }
}

/// Body returned when a circuit is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitCreated {
    /// Identifier assigned to the new circuit.
    pub circuit_id: CircuitId,
    /// Remaining fields not modeled above.
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// Body returned when a proof is requested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofCreated {
    /// Identifier assigned to the new proof.
    pub proof_id: ProofId,
    /// Remaining fields not modeled above.
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// Body returned by `proof/{id}/verify`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyResponse {
    /// Whether the proof verified.
    pub success: bool,
}

/// Form body for creating an empty circuit with the staged upload flow.
#[derive(Debug, Clone, Serialize)]
pub struct CreateCircuitRequest {
    /// Human-readable circuit name.
    pub circuit_name: String,
    /// Service label for the proof system, e.g. `"Circom C Groth16 bn254"`.
    pub circuit_type: String,
}

/// Form body for `circuit/{id}/prove`.
#[derive(Debug, Clone, Serialize)]
pub struct ProveRequest {
    /// Proof input, usually a JSON document. Opaque to the client.
    pub proof_input: String,
    /// Ask the service to verify the proof as part of proving.
    pub perform_verify: bool,
}

/// Query flags for circuit detail lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CircuitQuery {
    /// Include the verification key in the response.
    pub include_verification_key: bool,
}

/// Query flags for proof detail lookups and listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProofQuery {
    /// Include the original proof input.
    pub include_proof_input: bool,
    /// Include the public outputs.
    pub include_public: bool,
    /// Include the circuit verification key.
    pub include_verification_key: bool,
    /// Include the proof artifact.
    pub include_proof: bool,
}

impl ProofQuery {
    /// Status only; used while polling.
    pub const STATUS: ProofQuery = ProofQuery {
        include_proof_input: false,
        include_public: false,
        include_verification_key: false,
        include_proof: false,
    };

    /// Everything except the proof input.
    pub const FULL: ProofQuery = ProofQuery {
        include_proof_input: false,
        include_public: true,
        include_verification_key: true,
        include_proof: true,
    };

    /// Also request the proof input.
    pub fn with_proof_input(mut self) -> Self {
        self.include_proof_input = true;
        self
    }
}

impl Default for ProofQuery {
    fn default() -> Self {
        Self::FULL
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_job_status_labels() {
        let cases = [
            ("Queued", JobStatus::Queued, false),
            ("In Progress", JobStatus::InProgress, false),
            ("Ready", JobStatus::Ready, true),
            ("Failed", JobStatus::Failed, true),
            ("Compiling", JobStatus::Other("Compiling".into()), false),
        ];
        for (label, expected, terminal) in cases {
            let status: JobStatus = serde_json::from_value(json!(label)).unwrap();
            assert_eq!(status, expected);
            assert_eq!(status.is_terminal(), terminal);
            assert_eq!(serde_json::to_value(&status).unwrap(), json!(label));
        }
    }

    #[test]
    fn test_circuit_type_parsing() {
        assert_eq!(CircuitType::from("Circom".to_string()), CircuitType::Circom);
        assert_eq!(CircuitType::from("halo2".to_string()), CircuitType::Halo2);
        assert_eq!(
            CircuitType::from("Circom C Groth16 bn254".to_string()),
            CircuitType::Other("Circom C Groth16 bn254".into())
        );
        assert_eq!(CircuitType::Noir.to_string(), "noir");
    }

    #[test]
    fn test_circuit_type_labels_round_trip() {
        let cases = [
            ("Circom", CircuitType::Circom, "circom"),
            ("GNARK", CircuitType::Gnark, "gnark"),
            ("other", CircuitType::Other("other".into()), "other"),
            (
                "Circom C Groth16 bn254",
                CircuitType::Other("Circom C Groth16 bn254".into()),
                "Circom C Groth16 bn254",
            ),
        ];
        for (label, expected, written) in cases {
            let circuit_type: CircuitType = serde_json::from_value(json!(label)).unwrap();
            assert_eq!(circuit_type, expected);
            assert_eq!(serde_json::to_value(&circuit_type).unwrap(), json!(written));
        }
        assert!("Circom C Groth16 bn254".parse::<CircuitType>().is_err());
    }

    #[test]
    fn test_circuit_detail_keeps_unmodeled_fields() {
        let body = json!({
            "circuit_id": "c-1",
            "circuit_name": "multiplier2",
            "circuit_type": "circom",
            "status": "Ready",
            "date_created": "2024-01-01T00:00:00Z",
            "compute_time": "P0DT00H00M02.000S",
            "num_proofs": 3,
        });
        let detail: CircuitDetail = serde_json::from_value(body).unwrap();
        assert_eq!(detail.circuit_id, CircuitId::from("c-1"));
        assert_eq!(detail.circuit_type, Some(CircuitType::Circom));
        assert_eq!(detail.verification_key, None);
        assert_eq!(detail.error, None);
        assert_eq!(detail.other.get("num_proofs"), Some(&json!(3)));
    }

    #[test]
    fn test_circuit_detail_requires_status() {
        let body = json!({ "circuit_id": "c-1" });
        assert!(serde_json::from_value::<CircuitDetail>(body).is_err());
    }

    #[test]
    fn test_public_outputs() {
        let mut detail: ProofDetail = serde_json::from_value(json!({
            "proof_id": "p-1",
            "circuit_id": "c-1",
            "status": "Ready",
            "public": ["294", "7"],
        }))
        .unwrap();
        assert_eq!(detail.public_outputs(), vec![&json!("294"), &json!("7")]);

        detail.public = Some(json!("42"));
        assert_eq!(detail.public_outputs(), vec![&json!("42")]);

        detail.public = None;
        assert!(detail.public_outputs().is_empty());
    }

    #[test]
    fn test_proof_query_serializes_flags() {
        let query = serde_json::to_value(ProofQuery::STATUS.with_proof_input()).unwrap();
        assert_eq!(
            query,
            json!({
                "include_proof_input": true,
                "include_public": false,
                "include_verification_key": false,
                "include_proof": false,
            })
        );
    }
}
