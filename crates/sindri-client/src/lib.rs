//! HTTP client for the Sindri proving service.
//!
//! Uploads circuit sources, waits for compilation, requests proofs, waits for them to
//! be generated, and verifies them. Long-running jobs are polled with a bounded
//! [`PollPolicy`], so every operation returns within a predictable amount of time.
//!
//! ## Example
//!
//! ```no_run
//! use sindri_client::{ClientConfig, SindriClient, SourceBundle};
//!
//! # async fn example() -> sindri_client::Result<()> {
//! let client = SindriClient::new(ClientConfig::default())?;
//!
//! // Upload and compile a circuit
//! let bundle = SourceBundle::from_path("circuits/multiplier2")?;
//! let circuit_id = client.create_circuit("multiplier2", &bundle).await?;
//!
//! // Generate a proof
//! let proof_id = client.prove_circuit(&circuit_id, r#"{"a": 3, "b": 11}"#).await?;
//!
//! // Verify the proof
//! assert!(client.verify_proof(&proof_id).await?);
//! # Ok(())
//! # }
//! ```

pub use bundle::{PackagedBundle, SourceBundle};
pub use client::SindriClient;
pub use config::{ClientConfig, PollPolicy, UploadFlow, Verbosity};
pub use error::{Error, Result};
pub use events::{ClientEvent, EventSink, TracingSink};
pub use poll::Job;
pub use sindri_types as types;

mod bundle;
mod client;
pub mod config;
pub mod credentials;
mod error;
pub mod events;
mod poll;
