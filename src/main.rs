//! Nibble-serial SHA-256 verification harness entrypoint.

mod collector;
mod driver;
mod evidence;
mod model;
mod preprocess;
mod scenario;
mod signals;
mod transcript;
mod verify;

use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::OnceLock;

use crate::collector::collect_digest;
use crate::driver::{CancelToken, Driver, ProtocolError};
use crate::evidence::{
    create_evidence_dir, sha256_hex, write_report, DigestReport, ErrorReport, MessageReport,
    Outcome, Report, TOOL_VERSION,
};
use crate::model::{ModelConfig, SerialSha256};
use crate::preprocess::{pad_and_split, Block};
use crate::scenario::{validate_scenario, Scenario};
use crate::signals::Dut;
use crate::transcript::Transcript;
use crate::verify::digests_match;

const DEFAULT_OUT_DIR: &str = "out";

/// CLI arguments for the verification harness.
#[derive(Parser, Debug)]
#[command(
    name = "nman",
    version,
    about = "Drive a nibble-serial SHA-256 engine and verify its digest"
)]
struct Args {
    /// Path to scenario JSON file
    scenario: PathBuf,

    /// Output directory root (evidence written under <dir>/evidence)
    #[arg(long, value_name = "DIR", default_value = DEFAULT_OUT_DIR)]
    out_dir: PathBuf,

    /// Print a cycle-stamped protocol transcript to stderr
    #[arg(long)]
    verbose: bool,

    /// Wedge the engine model's busy line (dev/debug only)
    #[arg(long)]
    stuck_busy: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Ok(Outcome::Verified) => ExitCode::SUCCESS,
        Ok(Outcome::VerifyFailed) => ExitCode::from(1),
        Ok(_) => ExitCode::from(2),
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(2)
        }
    }
}

/// Execute a single scenario and emit an evidence bundle.
fn run(args: Args) -> Result<Outcome> {
    let cancel = CancelToken::new();
    install_sigint(&cancel);
    let mut transcript = Transcript::new(args.verbose);

    let scenario_bytes = match fs::read(&args.scenario) {
        Ok(bytes) => bytes,
        Err(err) => {
            let evidence_dir = create_evidence_dir(&args.out_dir, None, None)?;
            write_report(
                &evidence_dir,
                Report {
                    tool_version: TOOL_VERSION.to_string(),
                    scenario_sha256: None,
                    scenario_id: None,
                    message: None,
                    timing: None,
                    outcome: Outcome::SchemaInvalid,
                    error: Some(ErrorReport {
                        code: "schema_invalid".to_string(),
                        message: format!("failed to read scenario file: {err}"),
                        details: Vec::new(),
                    }),
                    digest: None,
                    cycles: None,
                },
            )?;
            println!("evidence: {}", evidence_dir.display());
            return Ok(Outcome::SchemaInvalid);
        }
    };

    let scenario_hash = sha256_hex(&scenario_bytes);
    let decoded: Result<Scenario, serde_json::Error> = serde_json::from_slice(&scenario_bytes);
    let label = decoded.as_ref().ok().map(|s| s.scenario_id.clone());
    let evidence_dir = create_evidence_dir(&args.out_dir, Some(&scenario_hash), label.as_deref())?;
    fs::write(evidence_dir.join("scenario.json"), &scenario_bytes)
        .context("write scenario.json")?;

    let scenario = match decoded {
        Ok(scenario) => scenario,
        Err(err) => {
            write_report(
                &evidence_dir,
                Report {
                    tool_version: TOOL_VERSION.to_string(),
                    scenario_sha256: Some(scenario_hash),
                    scenario_id: None,
                    message: None,
                    timing: None,
                    outcome: Outcome::SchemaInvalid,
                    error: Some(ErrorReport {
                        code: "schema_invalid".to_string(),
                        message: "scenario JSON failed to parse".to_string(),
                        details: vec![err.to_string()],
                    }),
                    digest: None,
                    cycles: None,
                },
            )?;
            println!("evidence: {}", evidence_dir.display());
            return Ok(Outcome::SchemaInvalid);
        }
    };

    if let Some(errors) = validate_scenario(&scenario) {
        write_report(
            &evidence_dir,
            Report {
                tool_version: TOOL_VERSION.to_string(),
                scenario_sha256: Some(scenario_hash),
                scenario_id: Some(scenario.scenario_id.clone()),
                message: None,
                timing: Some(scenario.timing),
                outcome: Outcome::SchemaInvalid,
                error: Some(ErrorReport {
                    code: "schema_invalid".to_string(),
                    message: "scenario validation failed".to_string(),
                    details: errors,
                }),
                digest: None,
                cycles: None,
            },
        )?;
        println!("evidence: {}", evidence_dir.display());
        return Ok(Outcome::SchemaInvalid);
    }

    let timing = scenario.timing;
    let message = match scenario.message.bytes() {
        Ok(bytes) => bytes,
        Err(err) => {
            write_report(
                &evidence_dir,
                Report {
                    tool_version: TOOL_VERSION.to_string(),
                    scenario_sha256: Some(scenario_hash),
                    scenario_id: Some(scenario.scenario_id.clone()),
                    message: None,
                    timing: Some(timing),
                    outcome: Outcome::TypeMismatch,
                    error: Some(ErrorReport {
                        code: "type_mismatch".to_string(),
                        message: err.to_string(),
                        details: Vec::new(),
                    }),
                    digest: None,
                    cycles: None,
                },
            )?;
            println!("evidence: {}", evidence_dir.display());
            return Ok(Outcome::TypeMismatch);
        }
    };

    let expected = scenario
        .expected_sha256
        .as_deref()
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| sha256_hex(&message));

    let blocks = match pad_and_split(&message) {
        Ok(blocks) => blocks,
        Err(err) => {
            write_report(
                &evidence_dir,
                Report {
                    tool_version: TOOL_VERSION.to_string(),
                    scenario_sha256: Some(scenario_hash),
                    scenario_id: Some(scenario.scenario_id.clone()),
                    message: Some(MessageReport {
                        bytes: message.len() as u64,
                        sha256: sha256_hex(&message),
                    }),
                    timing: Some(timing),
                    outcome: Outcome::PaddingInvariant,
                    error: Some(ErrorReport {
                        code: "padding_invariant".to_string(),
                        message: err.to_string(),
                        details: Vec::new(),
                    }),
                    digest: None,
                    cycles: None,
                },
            )?;
            println!("evidence: {}", evidence_dir.display());
            return Ok(Outcome::PaddingInvariant);
        }
    };

    transcript.note(format!(
        "scenario {}: {} bytes, {} blocks",
        scenario.scenario_id,
        message.len(),
        blocks.len()
    ));

    let mut dut = SerialSha256::new(ModelConfig {
        result_latency: timing.result_setup,
        stuck_busy: args.stuck_busy,
        ..ModelConfig::default()
    });
    let mut driver = Driver::new(timing, cancel);

    let digest_bytes = match drive_protocol(&mut driver, &mut dut, &blocks, &mut transcript) {
        Ok(bytes) => bytes,
        Err(err) => {
            let outcome = match err {
                ProtocolError::Timeout { .. } => Outcome::ProtocolTimeout,
                ProtocolError::Cancelled { .. } => Outcome::Cancelled,
            };
            write_report(
                &evidence_dir,
                Report {
                    tool_version: TOOL_VERSION.to_string(),
                    scenario_sha256: Some(scenario_hash),
                    scenario_id: Some(scenario.scenario_id.clone()),
                    message: Some(MessageReport {
                        bytes: message.len() as u64,
                        sha256: sha256_hex(&message),
                    }),
                    timing: Some(timing),
                    outcome,
                    error: Some(ErrorReport {
                        code: err.code().to_string(),
                        message: err.to_string(),
                        details: Vec::new(),
                    }),
                    digest: None,
                    cycles: Some(driver.edges()),
                },
            )?;
            println!("evidence: {}", evidence_dir.display());
            return Ok(outcome);
        }
    };

    let actual = hex::encode(&digest_bytes);
    transcript.step(driver.edges(), format!("digest readout: {actual}"));

    let verified = digests_match(&actual, &expected);
    let outcome = if verified {
        Outcome::Verified
    } else {
        Outcome::VerifyFailed
    };
    write_report(
        &evidence_dir,
        Report {
            tool_version: TOOL_VERSION.to_string(),
            scenario_sha256: Some(scenario_hash),
            scenario_id: Some(scenario.scenario_id.clone()),
            message: Some(MessageReport {
                bytes: message.len() as u64,
                sha256: sha256_hex(&message),
            }),
            timing: Some(timing),
            outcome,
            error: if verified {
                None
            } else {
                Some(ErrorReport {
                    code: "verify_failed".to_string(),
                    message: "reconstructed digest does not equal the expected value".to_string(),
                    details: vec![format!("expected {expected}"), format!("actual   {actual}")],
                })
            },
            digest: Some(DigestReport {
                expected: expected.clone(),
                actual: actual.clone(),
            }),
            cycles: Some(driver.edges()),
        },
    )?;

    if verified {
        println!("verified: sha256 {actual} in {} edges", driver.edges());
    } else {
        println!("digest mismatch: expected {expected} actual {actual}");
    }
    println!("evidence: {}", evidence_dir.display());
    Ok(outcome)
}

/// Reset, stream every block, and read back the digest.
fn drive_protocol(
    driver: &mut Driver,
    dut: &mut dyn Dut,
    blocks: &[Block],
    transcript: &mut Transcript,
) -> Result<Vec<u8>, ProtocolError> {
    driver.reset(dut)?;
    transcript.step(driver.edges(), "reset complete");
    driver.send_blocks(dut, blocks, transcript)?;
    collect_digest(driver, dut)
}

static SIGINT_CANCEL: OnceLock<CancelToken> = OnceLock::new();

extern "C" fn handle_sigint(_signal: libc::c_int) {
    if let Some(token) = SIGINT_CANCEL.get() {
        token.cancel();
    }
}

/// Route SIGINT into the cooperative cancellation token.
fn install_sigint(token: &CancelToken) {
    if SIGINT_CANCEL.set(token.clone()).is_ok() {
        let handler = handle_sigint as extern "C" fn(libc::c_int);
        unsafe {
            libc::signal(libc::SIGINT, handler as libc::sighandler_t);
        }
    }
}
