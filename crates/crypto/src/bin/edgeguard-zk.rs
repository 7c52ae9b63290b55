//! EdgeGuard ZK tool
//!
//! Offline helper for the auth circuit: key setup, enrollment commitments,
//! device-side proving and standalone verification.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use edgeguard_crypto::zk::{
    compute_commitment, AuthProver, CircuitKeys, FieldBytes, Groth16Verifier, ProofPayload,
    ProofVerifier, ProverInputs,
};
use rand::rngs::OsRng;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser)]
#[command(author, version, about = "EdgeGuard auth circuit tooling")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the Groth16 setup and write auth_proving.key / auth_verifying.key.
    Setup {
        #[arg(long, default_value = "keys")]
        out_dir: PathBuf,
    },
    /// Compute the enrollment commitment for a device. Generates a fresh
    /// secret when none is given.
    Commitment {
        #[arg(long)]
        device_id: String,
        #[arg(long)]
        secret: Option<String>,
    },
    /// Produce a proof payload for a challenge.
    Prove(ProveArgs),
    /// Verify a proof payload against a verifying key.
    Verify {
        #[arg(long)]
        verifying_key: PathBuf,
        #[arg(long)]
        payload: PathBuf,
    },
}

#[derive(Args)]
struct ProveArgs {
    #[arg(long)]
    proving_key: PathBuf,
    #[arg(long)]
    device_id: String,
    #[arg(long)]
    secret: String,
    #[arg(long)]
    challenge: String,
    #[arg(long)]
    commitment: String,
    /// Write the payload here instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Serialize)]
struct CommitmentOutput {
    device_id: String,
    commitment: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    secret: Option<String>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();
    if let Err(err) = dispatch(cli.command) {
        error!(error = %format!("{:#}", err), "edgeguard-zk command failed");
        std::process::exit(1);
    }
}

fn dispatch(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Setup { out_dir } => {
            let keys = CircuitKeys::setup(&mut OsRng)?;
            let (pk, vk) = keys.write_to_dir(&out_dir)?;
            info!(proving_key = %pk.display(), verifying_key = %vk.display(), "Keys written");
            Ok(())
        }
        Commands::Commitment { device_id, secret } => {
            let (secret, generated) = match secret {
                Some(hex) => (FieldBytes::from_hex(&hex)?, false),
                None => (FieldBytes::random(&mut OsRng), true),
            };
            let commitment = compute_commitment(&secret, &device_id)?;
            let output = CommitmentOutput {
                device_id,
                commitment: commitment.to_hex(),
                secret: generated.then(|| secret.to_hex()),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Commands::Prove(args) => prove(args),
        Commands::Verify {
            verifying_key,
            payload,
        } => {
            let verifier = Groth16Verifier::new();
            verifier.initialize(&verifying_key)?;

            let raw = fs::read_to_string(&payload)
                .with_context(|| format!("reading {}", payload.display()))?;
            let payload: ProofPayload = serde_json::from_str(&raw).context("parsing payload")?;
            let proof = payload.proof_bytes()?;

            if !verifier.verify(&proof, &payload.public_witness)? {
                bail!("proof is INVALID");
            }
            println!("proof is VALID");
            Ok(())
        }
    }
}

fn prove(args: ProveArgs) -> Result<()> {
    let mut prover = AuthProver::new();
    prover.initialize(&args.proving_key)?;

    let inputs = ProverInputs::from_hex(
        &args.secret,
        &args.device_id,
        &args.challenge,
        &args.commitment,
    )?;
    let bundle = prover.prove(&inputs, &mut OsRng)?;
    let json = serde_json::to_string_pretty(&ProofPayload::from(&bundle))?;

    match args.out {
        Some(path) => {
            fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), "Proof payload written");
        }
        None => println!("{}", json),
    }
    Ok(())
}
