//! `sindri` command-line client.

#![warn(unused_crate_dependencies)]

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use sindri_client::{
    ClientConfig, SindriClient, SourceBundle, Verbosity,
    types::{CircuitId, ProofId, ProofQuery},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sindri")]
#[command(about = "Compile circuits and generate proofs on Sindri", long_about = None)]
struct Cli {
    /// Config file path (.toml or .yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// API key
    #[arg(long, env = "SINDRI_API_KEY", hide_env_values = true, global = true)]
    api_key: Option<String>,

    /// Base URL of the API, `v1/` is appended when missing
    #[arg(long, env = "SINDRI_API_URL", global = true)]
    api_url: Option<String>,

    /// silent, summary or full
    #[arg(long, global = true)]
    verbosity: Option<Verbosity>,

    /// Pause between status reads while waiting for a job
    #[arg(long, global = true)]
    poll_interval_ms: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload circuit sources and wait for compilation
    Compile {
        /// Circuit directory or archive
        #[arg(long)]
        path: PathBuf,
        /// Circuit name
        #[arg(long, default_value = "")]
        name: String,
    },
    /// Generate a proof and wait for it
    Prove {
        #[arg(long)]
        circuit_id: String,
        /// File holding the proof input
        #[arg(long)]
        input: PathBuf,
        /// Ask the service to verify while proving
        #[arg(long)]
        perform_verify: bool,
    },
    /// Verify a proof
    Verify {
        #[arg(long)]
        proof_id: String,
    },
    /// Show a circuit
    Circuit { circuit_id: String },
    /// Show a proof
    Proof {
        proof_id: String,
        /// Include the proof input
        #[arg(long)]
        include_input: bool,
    },
    /// List circuits
    Circuits,
    /// List proofs, optionally of one circuit
    Proofs {
        #[arg(long)]
        circuit_id: Option<String>,
    },
    /// Compile, prove and verify in one go
    Run {
        /// Circuit directory or archive
        #[arg(long)]
        path: PathBuf,
        /// File holding the proof input
        #[arg(long)]
        input: PathBuf,
        /// Circuit name
        #[arg(long, default_value = "")]
        name: String,
        #[arg(long)]
        skip_verify: bool,
    },
}

impl Cli {
    /// Config file, then environment and flags on top.
    fn client_config(&self) -> anyhow::Result<ClientConfig> {
        let mut config = match &self.config {
            Some(path) => ClientConfig::load(path)
                .with_context(|| format!("Failed to load config at {}", path.display()))?,
            None => ClientConfig::default(),
        };

        if let Some(api_key) = &self.api_key {
            config.api_key = Some(api_key.clone());
        }
        if let Some(api_url) = &self.api_url {
            config.api_url = api_url.clone();
        }
        if let Some(verbosity) = self.verbosity {
            config.verbosity = verbosity;
        }
        if let Some(interval_ms) = self.poll_interval_ms {
            config.compile_poll.interval_ms = interval_ms;
            config.prove_poll.interval_ms = interval_ms;
        }
        if let Command::Prove {
            perform_verify: true,
            ..
        } = self.command
        {
            config.perform_verify = true;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = cli.client_config()?;

    let default_level = match config.verbosity {
        Verbosity::Full => "debug",
        _ => "info",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .with_ansi(false)
        .init();

    let client = SindriClient::new(config)?;
    let output = execute(&client, cli.command).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn execute(client: &SindriClient, command: Command) -> anyhow::Result<Value> {
    let output = match command {
        Command::Compile { path, name } => {
            let bundle = SourceBundle::from_path(path)?;
            let circuit_id = client.create_circuit(&name, &bundle).await?;
            json!({ "circuit_id": circuit_id })
        }
        Command::Prove {
            circuit_id, input, ..
        } => {
            let proof_input = read_input(&input)?;
            let proof_id = client
                .prove_circuit(&CircuitId::from(circuit_id), &proof_input)
                .await?;
            json!({ "proof_id": proof_id })
        }
        Command::Verify { proof_id } => {
            let proof_id = ProofId::from(proof_id);
            let success = client.verify_proof(&proof_id).await?;
            json!({ "proof_id": proof_id, "success": success })
        }
        Command::Circuit { circuit_id } => {
            serde_json::to_value(client.get_circuit(&CircuitId::from(circuit_id)).await?)?
        }
        Command::Proof {
            proof_id,
            include_input,
        } => {
            let query = if include_input {
                ProofQuery::FULL.with_proof_input()
            } else {
                ProofQuery::FULL
            };
            serde_json::to_value(client.get_proof_with(&ProofId::from(proof_id), query).await?)?
        }
        Command::Circuits => serde_json::to_value(client.list_circuits().await?)?,
        Command::Proofs { circuit_id } => {
            let proofs = match circuit_id {
                Some(circuit_id) => {
                    client
                        .list_circuit_proofs(&CircuitId::from(circuit_id))
                        .await?
                }
                None => client.list_proofs().await?,
            };
            serde_json::to_value(proofs)?
        }
        Command::Run {
            path,
            input,
            name,
            skip_verify,
        } => {
            let proof_input = read_input(&input)?;
            let bundle = SourceBundle::from_path(path)?;

            let circuit_id = client.create_circuit(&name, &bundle).await?;
            let proof_id = client.prove_circuit(&circuit_id, &proof_input).await?;
            let proof = client.get_proof(&proof_id).await?;
            let verified = if skip_verify {
                None
            } else {
                Some(client.verify_proof(&proof_id).await?)
            };
            info!(%circuit_id, %proof_id, ?verified, "Run complete");

            json!({
                "circuit_id": circuit_id,
                "proof_id": proof_id,
                "public": proof.public,
                "verified": verified,
            })
        }
    };
    Ok(output)
}

fn read_input(path: &Path) -> anyhow::Result<String> {
    fs::read_to_string(path)
        .with_context(|| format!("Failed to read proof input at {}", path.display()))
}
