use std::sync::Arc;

use reqwest::{
    Client, Method, RequestBuilder, StatusCode, Url,
    header::{ACCEPT, AUTHORIZATION, HeaderValue},
    multipart::{Form, Part},
};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use sindri_types::{
    CircuitCreated, CircuitDetail, CircuitId, CircuitQuery, CreateCircuitRequest, ProofCreated,
    ProofDetail, ProofId, ProofQuery, ProveRequest, VerifyResponse,
};
use tracing::debug;

use crate::{
    bundle::{PackagedBundle, SourceBundle},
    config::{ClientConfig, PollPolicy, UploadFlow, Verbosity},
    credentials::CredentialChain,
    error::{Error, Result},
    events::{ClientEvent, EventSink, Reporter, TracingSink},
    poll::{Job, Terminal, poll_until_terminal},
};

/// HTTP client for the Sindri API.
///
/// Provides methods to create and compile circuits, generate and verify proofs, and
/// look up circuits and proofs. Long-running jobs are polled until they finish.
///
/// The client is cheap to clone and holds no mutable state, so independent workflows
/// can share one instance across tasks.
#[derive(Clone, Debug)]
pub struct SindriClient {
    base_url: Url,
    client: Client,
    auth: HeaderValue,
    compile_poll: PollPolicy,
    prove_poll: PollPolicy,
    upload_flow: UploadFlow,
    perform_verify: bool,
    reporter: Reporter,
}

impl SindriClient {
    /// Creates a new client from `config`.
    ///
    /// Resolves the API key (explicit value, `<PREFIX>_API_KEY`, key file) and appends
    /// the API version to the base URL.
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::with_client(config, Client::new())
    }

    /// Creates a new client with a custom [`reqwest::Client`].
    pub fn with_client(config: ClientConfig, client: Client) -> Result<Self> {
        let base_url = config.versioned_api_url()?;
        let api_key = CredentialChain::standard(
            config.api_key.clone(),
            &config.env_prefix,
            config.key_file.clone(),
        )
        .resolve()?;

        let mut auth = HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|_| {
            Error::Auth("API key contains characters not allowed in a header".to_string())
        })?;
        auth.set_sensitive(true);

        debug!(api_url = %base_url, verbosity = %config.verbosity, "Sindri client configured");

        Ok(Self {
            base_url,
            client,
            auth,
            compile_poll: config.compile_poll,
            prove_poll: config.prove_poll,
            upload_flow: config.upload_flow,
            perform_verify: config.perform_verify,
            reporter: Reporter::new(config.verbosity, Arc::new(TracingSink)),
        })
    }

    /// Replaces the event sink. Defaults to [`TracingSink`].
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.reporter = Reporter::new(self.reporter.verbosity(), sink);
        self
    }

    /// Versioned base URL requests are sent to.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Configured verbosity.
    pub fn verbosity(&self) -> Verbosity {
        self.reporter.verbosity()
    }

    /// Creates a circuit from `bundle`, waits for compilation, and returns its id.
    ///
    /// `name` may be empty, in which case the service picks one. Fails with
    /// [`Error::Compilation`] if the service reports `Failed` and [`Error::Timeout`] if
    /// the compile poll budget runs out.
    pub async fn create_circuit(&self, name: &str, bundle: &SourceBundle) -> Result<CircuitId> {
        let packaged = bundle.package()?;
        debug!(path = %bundle.path().display(), size = packaged.bytes.len(), "Packaged circuit bundle");

        let circuit_id = match &self.upload_flow {
            UploadFlow::Single => {
                let mut form = Form::new().part("files", file_part(packaged));
                if !name.is_empty() {
                    form = form.text("circuit_name", name.to_string());
                }
                let created: CircuitCreated = self
                    .post_object("circuit/create", |req| req.multipart(form))
                    .await?;
                created.circuit_id
            }
            UploadFlow::Staged { circuit_type } => {
                let request = CreateCircuitRequest {
                    circuit_name: name.to_string(),
                    circuit_type: circuit_type.clone(),
                };
                let created: CircuitCreated = self
                    .post_object("circuit/create", |req| req.form(&request))
                    .await?;
                let circuit_id = created.circuit_id;

                let form = Form::new().part("files", file_part(packaged));
                self.send(
                    Method::POST,
                    &format!("circuit/{circuit_id}/uploadfiles"),
                    |req| req.multipart(form),
                )
                .await?;
                self.send(Method::POST, &format!("circuit/{circuit_id}/compile"), |req| req)
                    .await?;
                circuit_id
            }
        };
        self.reporter.report(ClientEvent::CircuitCreated {
            circuit_id: &circuit_id,
        });

        let detail = self.wait_for_circuit(&circuit_id).await?;
        self.reporter.report(ClientEvent::Circuit(&detail));
        Ok(circuit_id)
    }

    /// Polls a circuit until it is `Ready` and returns its last detail.
    pub async fn wait_for_circuit(&self, circuit_id: &CircuitId) -> Result<CircuitDetail> {
        let path = format!("circuit/{circuit_id}/detail");
        let path = path.as_str();
        let query = &CircuitQuery {
            include_verification_key: false,
        };

        let outcome = poll_until_terminal(
            &self.compile_poll,
            Job::Circuit,
            &circuit_id.0,
            &self.reporter,
            move || self.get_object::<CircuitDetail>(path, query),
        )
        .await?;

        match outcome {
            Terminal::Ready(detail) => Ok(detail),
            Terminal::Failed(detail) => Err(Error::Compilation {
                circuit_id: circuit_id.clone(),
                detail: Box::new(detail),
            }),
        }
    }

    /// Requests a proof of `circuit_id` for `proof_input`, waits for it, and returns its id.
    ///
    /// `proof_input` is passed through untouched; it is usually a JSON document whose
    /// shape depends on the proof system. The circuit is expected to be `Ready`; the
    /// service rejects the request otherwise.
    pub async fn prove_circuit(&self, circuit_id: &CircuitId, proof_input: &str) -> Result<ProofId> {
        let request = ProveRequest {
            proof_input: proof_input.to_string(),
            perform_verify: self.perform_verify,
        };
        let created: ProofCreated = self
            .post_object(&format!("circuit/{circuit_id}/prove"), |req| {
                req.form(&request)
            })
            .await?;
        let proof_id = created.proof_id;
        self.reporter.report(ClientEvent::ProofCreated {
            circuit_id,
            proof_id: &proof_id,
        });

        let detail = self.wait_for_proof(&proof_id).await?;
        self.reporter.report(ClientEvent::Proof(&detail));
        Ok(proof_id)
    }

    /// Polls a proof until it is `Ready` and returns its last (status-only) detail.
    pub async fn wait_for_proof(&self, proof_id: &ProofId) -> Result<ProofDetail> {
        let path = format!("proof/{proof_id}/detail");
        let path = path.as_str();
        let query = &ProofQuery::STATUS;

        let outcome = poll_until_terminal(
            &self.prove_poll,
            Job::Proof,
            &proof_id.0,
            &self.reporter,
            move || self.get_object::<ProofDetail>(path, query),
        )
        .await?;

        match outcome {
            Terminal::Ready(detail) => Ok(detail),
            Terminal::Failed(detail) => Err(Error::Proving {
                proof_id: proof_id.clone(),
                detail: Box::new(detail),
            }),
        }
    }

    /// Verifies a proof. One request, no polling.
    pub async fn verify_proof(&self, proof_id: &ProofId) -> Result<bool> {
        let (url, body) = self
            .send(Method::GET, &format!("proof/{proof_id}/verify"), |req| req)
            .await?;
        let response: VerifyResponse = decode(&url, body, Shape::Object)?;
        self.reporter.report(ClientEvent::Verified {
            proof_id,
            success: response.success,
        });
        Ok(response.success)
    }

    /// Fetches a circuit, including its verification key.
    pub async fn get_circuit(&self, circuit_id: &CircuitId) -> Result<CircuitDetail> {
        let detail: CircuitDetail = self
            .get_object(
                &format!("circuit/{circuit_id}/detail"),
                &CircuitQuery {
                    include_verification_key: true,
                },
            )
            .await?;
        self.reporter.report(ClientEvent::Circuit(&detail));
        Ok(detail)
    }

    /// Fetches a proof with its public outputs, proof and verification key.
    pub async fn get_proof(&self, proof_id: &ProofId) -> Result<ProofDetail> {
        self.get_proof_with(proof_id, ProofQuery::FULL).await
    }

    /// Fetches a proof, choosing which optional fields to include.
    pub async fn get_proof_with(&self, proof_id: &ProofId, query: ProofQuery) -> Result<ProofDetail> {
        let detail: ProofDetail = self
            .get_object(&format!("proof/{proof_id}/detail"), &query)
            .await?;
        self.reporter.report(ClientEvent::Proof(&detail));
        Ok(detail)
    }

    /// Lists all circuits of the account.
    pub async fn list_circuits(&self) -> Result<Vec<CircuitDetail>> {
        let circuits: Vec<CircuitDetail> = self
            .get_list(
                "circuit/list",
                &CircuitQuery {
                    include_verification_key: true,
                },
            )
            .await?;
        self.reporter.report(ClientEvent::Circuits(&circuits));
        Ok(circuits)
    }

    /// Lists all proofs of the account.
    pub async fn list_proofs(&self) -> Result<Vec<ProofDetail>> {
        let proofs: Vec<ProofDetail> = self
            .get_list("proof/list", &ProofQuery::FULL.with_proof_input())
            .await?;
        self.reporter.report(ClientEvent::Proofs(&proofs));
        Ok(proofs)
    }

    /// Lists all proofs of one circuit.
    pub async fn list_circuit_proofs(&self, circuit_id: &CircuitId) -> Result<Vec<ProofDetail>> {
        let proofs: Vec<ProofDetail> = self
            .get_list(
                &format!("circuit/{circuit_id}/proofs"),
                &ProofQuery::FULL.with_proof_input(),
            )
            .await?;
        self.reporter.report(ClientEvent::Proofs(&proofs));
        Ok(proofs)
    }

    /// Sends a GET request and decodes a JSON object response.
    async fn get_object<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &impl Serialize,
    ) -> Result<T> {
        let (url, body) = self.send(Method::GET, path, |req| req.query(query)).await?;
        decode(&url, body, Shape::Object)
    }

    /// Sends a GET request and decodes a JSON array response.
    async fn get_list<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &impl Serialize,
    ) -> Result<Vec<T>> {
        let (url, body) = self.send(Method::GET, path, |req| req.query(query)).await?;
        decode(&url, body, Shape::List)
    }

    /// Sends a POST request and decodes a JSON object response.
    async fn post_object<T: DeserializeOwned>(
        &self,
        path: &str,
        body: impl FnOnce(RequestBuilder) -> RequestBuilder,
    ) -> Result<T> {
        let (url, body) = self.send(Method::POST, path, body).await?;
        decode(&url, body, Shape::Object)
    }

    /// Sends an authenticated request and returns the JSON body of a successful response.
    async fn send(
        &self,
        method: Method,
        path: &str,
        build: impl FnOnce(RequestBuilder) -> RequestBuilder,
    ) -> Result<(Url, Value)> {
        let url = self.base_url.join(path)?;
        self.reporter.report(ClientEvent::Request {
            method: method.as_str(),
            url: url.as_str(),
        });

        let request = self
            .client
            .request(method, url.clone())
            .header(AUTHORIZATION, self.auth.clone())
            .header(ACCEPT, "application/json");
        let res = build(request)
            .send()
            .await
            .map_err(|e| connection_error(&url, &e))?;

        let status = res.status();
        let text = res.text().await.map_err(|e| connection_error(&url, &e))?;
        let body = check_response(&url, status, text)?;
        Ok((url, body))
    }
}

/// Maps a status code and raw body to an error, or parses the body as JSON.
pub(crate) fn check_response(url: &Url, status: StatusCode, text: String) -> Result<Value> {
    match status {
        StatusCode::UNAUTHORIZED => Err(Error::Auth(format!("401 - Invalid API key. url={url}"))),
        StatusCode::NOT_FOUND => Err(Error::NotFound {
            url: url.to_string(),
        }),
        status if !status.is_success() => Err(Error::Api {
            url: url.to_string(),
            status: status.as_u16(),
            body: text,
        }),
        _ => serde_json::from_str(&text).map_err(|e| Error::Protocol {
            url: url.to_string(),
            reason: format!("response body is not valid JSON ({e})"),
        }),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Shape {
    Object,
    List,
}

/// Checks the top-level JSON shape, then deserializes into the typed record.
fn decode<T: DeserializeOwned>(url: &Url, body: Value, shape: Shape) -> Result<T> {
    let matches = match shape {
        Shape::Object => body.is_object(),
        Shape::List => body.is_array(),
    };
    if !matches {
        return Err(Error::Protocol {
            url: url.to_string(),
            reason: format!("expected a JSON {shape:?}, got {}", json_kind(&body)),
        });
    }
    serde_json::from_value(body).map_err(|e| Error::Protocol {
        url: url.to_string(),
        reason: format!("unexpected response shape ({e})"),
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn connection_error(url: &Url, err: &reqwest::Error) -> Error {
    let reason = if err.is_timeout() {
        "request timed out".to_string()
    } else if err.is_connect() {
        "connection failed".to_string()
    } else {
        err.to_string()
    };
    Error::Connection {
        url: url.to_string(),
        reason,
    }
}

fn file_part(bundle: PackagedBundle) -> Part {
    Part::bytes(bundle.bytes).file_name(bundle.file_name)
}
