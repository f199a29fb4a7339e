//! Progress reporting.
//!
//! The client describes what it is doing as [`ClientEvent`]s and hands them to an
//! [`EventSink`]. Events below the configured [`Verbosity`] are dropped before they
//! reach the sink. The default sink writes structured `tracing` records.

use std::{fmt, sync::Arc};

use sindri_types::{CircuitDetail, CircuitId, JobStatus, ProofDetail, ProofId};
use tracing::{debug, info};

use crate::{config::Verbosity, poll::Job};

/// Something the client did or observed.
#[derive(Debug, Clone, Copy)]
pub enum ClientEvent<'a> {
    /// An HTTP request is about to be sent.
    Request {
        /// HTTP method.
        method: &'a str,
        /// Full request URL.
        url: &'a str,
    },
    /// A circuit was created and its sources uploaded.
    CircuitCreated {
        /// Assigned identifier.
        circuit_id: &'a CircuitId,
    },
    /// A proof was requested.
    ProofCreated {
        /// Circuit being proved.
        circuit_id: &'a CircuitId,
        /// Assigned identifier.
        proof_id: &'a ProofId,
    },
    /// Started waiting for a job to finish.
    PollStarted {
        /// Kind of job.
        job: Job,
        /// Identifier of the resource.
        id: &'a str,
    },
    /// A status read returned.
    Polled {
        /// Kind of job.
        job: Job,
        /// Identifier of the resource.
        id: &'a str,
        /// 1-based attempt number.
        attempt: u32,
        /// Status observed.
        status: &'a JobStatus,
    },
    /// A circuit detail was fetched or a compilation finished.
    Circuit(&'a CircuitDetail),
    /// A proof detail was fetched or a proof finished.
    Proof(&'a ProofDetail),
    /// Circuits were listed.
    Circuits(&'a [CircuitDetail]),
    /// Proofs were listed.
    Proofs(&'a [ProofDetail]),
    /// A proof was verified.
    Verified {
        /// The verified proof.
        proof_id: &'a ProofId,
        /// Verification outcome.
        success: bool,
    },
}

impl ClientEvent<'_> {
    /// Lowest verbosity at which the event is reported.
    pub fn verbosity(&self) -> Verbosity {
        match self {
            Self::Request { .. } | Self::Polled { .. } => Verbosity::Full,
            _ => Verbosity::Summary,
        }
    }

    /// Short stable name of the event kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Request { .. } => "request",
            Self::CircuitCreated { .. } => "circuit_created",
            Self::ProofCreated { .. } => "proof_created",
            Self::PollStarted { .. } => "poll_started",
            Self::Polled { .. } => "polled",
            Self::Circuit(_) => "circuit",
            Self::Proof(_) => "proof",
            Self::Circuits(_) => "circuits",
            Self::Proofs(_) => "proofs",
            Self::Verified { .. } => "verified",
        }
    }
}

/// Receiver of client events.
pub trait EventSink: Send + Sync {
    /// Handles one event. `verbosity` is the client's configured level.
    fn emit(&self, event: &ClientEvent<'_>, verbosity: Verbosity);
}

/// Writes events as `tracing` records.
///
/// In [`Verbosity::Summary`] resource details are cut down to identifiers, name, type,
/// status and timings. [`Verbosity::Full`] writes whole records as JSON.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &ClientEvent<'_>, verbosity: Verbosity) {
        let full = verbosity >= Verbosity::Full;
        match *event {
            ClientEvent::Request { method, url } => debug!(%method, %url, "Sending request"),
            ClientEvent::CircuitCreated { circuit_id } => {
                info!(%circuit_id, "Circuit created")
            }
            ClientEvent::ProofCreated {
                circuit_id,
                proof_id,
            } => info!(%circuit_id, %proof_id, "Proof requested"),
            ClientEvent::PollStarted { job, id } => {
                info!(%job, %id, "Polling until Ready/Failed")
            }
            ClientEvent::Polled {
                job,
                id,
                attempt,
                status,
            } => info!(%job, %id, attempt, %status, "Polled status"),
            ClientEvent::Circuit(detail) => circuit_record(detail, full),
            ClientEvent::Proof(detail) => proof_record(detail, full),
            ClientEvent::Circuits(details) => {
                info!(count = details.len(), "Listed circuits");
                details.iter().for_each(|detail| circuit_record(detail, full));
            }
            ClientEvent::Proofs(details) => {
                info!(count = details.len(), "Listed proofs");
                details.iter().for_each(|detail| proof_record(detail, full));
            }
            ClientEvent::Verified { proof_id, success } => {
                info!(%proof_id, success, "Proof verification")
            }
        }
    }
}

fn circuit_record(detail: &CircuitDetail, full: bool) {
    if full {
        info!(circuit_id = %detail.circuit_id, detail = %Json(detail), "Circuit detail");
    } else {
        info!(
            circuit_id = %detail.circuit_id,
            circuit_name = ?detail.circuit_name,
            circuit_type = ?detail.circuit_type.as_ref().map(ToString::to_string),
            status = %detail.status,
            date_created = ?detail.date_created,
            compute_time = ?detail.compute_time,
            "Circuit detail"
        );
    }
}

fn proof_record(detail: &ProofDetail, full: bool) {
    if full {
        info!(proof_id = %detail.proof_id, detail = %Json(detail), "Proof detail");
    } else {
        info!(
            proof_id = %detail.proof_id,
            circuit_id = %detail.circuit_id,
            circuit_name = ?detail.circuit_name,
            status = %detail.status,
            date_created = ?detail.date_created,
            compute_time = ?detail.compute_time,
            "Proof detail"
        );
    }
}

struct Json<'a, T>(&'a T);

impl<T: serde::Serialize> fmt::Display for Json<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(self.0).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}

/// Applies the verbosity filter in front of a sink.
#[derive(Clone)]
pub(crate) struct Reporter {
    verbosity: Verbosity,
    sink: Arc<dyn EventSink>,
}

impl Reporter {
    pub(crate) fn new(verbosity: Verbosity, sink: Arc<dyn EventSink>) -> Self {
        Self { verbosity, sink }
    }

    pub(crate) fn report(&self, event: ClientEvent<'_>) {
        if self.verbosity != Verbosity::Silent && event.verbosity() <= self.verbosity {
            self.sink.emit(&event, self.verbosity);
        }
    }

    pub(crate) fn verbosity(&self) -> Verbosity {
        self.verbosity
    }
}

impl fmt::Debug for Reporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reporter")
            .field("verbosity", &self.verbosity)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use sindri_types::{CircuitId, JobStatus};

    use crate::{
        config::Verbosity,
        events::{ClientEvent, EventSink, Reporter},
        poll::Job,
    };

    #[derive(Default)]
    struct Recorder(Mutex<Vec<&'static str>>);

    impl EventSink for Recorder {
        fn emit(&self, event: &ClientEvent<'_>, _: Verbosity) {
            self.0.lock().unwrap().push(event.kind());
        }
    }

    fn emit_all(verbosity: Verbosity) -> Vec<&'static str> {
        let recorder = Arc::new(Recorder::default());
        let reporter = Reporter::new(verbosity, recorder.clone());
        let circuit_id = CircuitId::from("c-1");
        reporter.report(ClientEvent::Request {
            method: "GET",
            url: "http://localhost/v1/circuit/list",
        });
        reporter.report(ClientEvent::CircuitCreated {
            circuit_id: &circuit_id,
        });
        reporter.report(ClientEvent::Polled {
            job: Job::Circuit,
            id: "c-1",
            attempt: 1,
            status: &JobStatus::Queued,
        });
        recorder.0.lock().unwrap().clone()
    }

    #[test]
    fn test_verbosity_filters_events() {
        assert!(emit_all(Verbosity::Silent).is_empty());
        assert_eq!(emit_all(Verbosity::Summary), vec!["circuit_created"]);
        assert_eq!(
            emit_all(Verbosity::Full),
            vec!["request", "circuit_created", "polled"]
        );
    }
}
