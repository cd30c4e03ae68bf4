//! hds-upload: converts health-data-standards JSON records to FHIR
//! transaction bundles and uploads them to a FHIR server.
//!
//! Orchestration only; all conversion rules live in `hds-fhir-core`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Parser;
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use hds_fhir_core::{Patient, convert_to_conditional_updates};

/// Convert health-data-standards JSON to FHIR JSON and upload it to a
/// FHIR server.
#[derive(Debug, Parser)]
#[command(name = "hds-upload")]
struct Args {
    /// URL for the FHIR server
    #[arg(short, long)]
    fhir: String,

    /// Path to a directory of patient JSON files
    #[arg(short, long)]
    json: Option<PathBuf>,

    /// Path to a single patient JSON file
    #[arg(short, long)]
    single: Option<PathBuf>,

    /// How many years to offset dates by
    #[arg(short, long, default_value_t = 0)]
    offset: i32,

    /// Upload using conditional updates
    #[arg(short, long)]
    conditional: bool,
}

/// The part of the server's transaction response we report on.
#[derive(Debug, Deserialize)]
struct ResponseBundle {
    total: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let files = collect_files(&args)?;
    if files.is_empty() {
        bail!("no patient JSON files found");
    }

    let client = reqwest::Client::new();
    for file in &files {
        upload_record(&client, &args, file)
            .await
            .with_context(|| format!("uploading {}", file.display()))?;
    }

    Ok(())
}

/// The files to upload, sorted for a reproducible upload order.
fn collect_files(args: &Args) -> Result<Vec<PathBuf>> {
    match (&args.json, &args.single) {
        (Some(dir), _) => {
            let entries = std::fs::read_dir(dir)
                .with_context(|| format!("reading directory {}", dir.display()))?;
            let mut files = Vec::new();
            for entry in entries {
                files.push(entry?.path());
            }
            files.sort();
            Ok(files)
        }
        (None, Some(single)) => Ok(vec![single.clone()]),
        (None, None) => bail!("either --json or --single is required"),
    }
}

async fn upload_record(client: &reqwest::Client, args: &Args, path: &Path) -> Result<()> {
    let data = std::fs::read(path).context("reading patient record")?;
    let mut patient = Patient::from_json(&data)?;
    if args.offset != 0 {
        offset_years(&mut patient, args.offset);
    }

    let mut bundle = patient.transaction_bundle(args.conditional)?;
    if args.conditional {
        convert_to_conditional_updates(&mut bundle);
    }

    let response = client
        .post(format!("{}/", args.fhir.trim_end_matches('/')))
        .json(&bundle)
        .send()
        .await?
        .error_for_status()?;
    let response: ResponseBundle = response
        .json()
        .await
        .context("decoding the transaction response")?;

    match response.total {
        Some(total) => tracing::info!(total, path = %path.display(), "uploaded patient bundle"),
        None => tracing::info!(path = %path.display(), "uploaded patient bundle"),
    }
    Ok(())
}

/// Ages a synthetic record by shifting the birth date and fact start
/// times by whole years.
fn offset_years(patient: &mut Patient, years: i32) {
    patient.birth_time = patient.birth_time.map(|t| t.offset_years(years));
    for condition in &mut patient.conditions {
        condition.entry.start_time = condition.entry.start_time.map(|t| t.offset_years(years));
    }
    for encounter in &mut patient.encounters {
        encounter.entry.start_time = encounter.entry.start_time.map(|t| t.offset_years(years));
    }
    for medication in &mut patient.medications {
        medication.entry.start_time = medication.entry.start_time.map(|t| t.offset_years(years));
    }
    for vital_sign in &mut patient.vital_signs {
        vital_sign.entry.start_time = vital_sign.entry.start_time.map(|t| t.offset_years(years));
    }
    for procedure in &mut patient.procedures {
        procedure.entry.start_time = procedure.entry.start_time.map(|t| t.offset_years(years));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn offset_shifts_birth_and_fact_start_times() {
        let mut patient: Patient = serde_json::from_value(json!({
            "first": "John", "last": "Peters",
            "birthdate": 1_136_214_245,
            "conditions": [{ "codes": { "SNOMED-CT": ["16356006"] }, "start_time": 1_136_214_245 }]
        }))
        .unwrap();

        offset_years(&mut patient, 2);
        let birth = patient.birth_time.unwrap().datetime();
        assert_eq!(birth.format("%Y-%m-%d").to_string(), "2008-01-02");
        let start = patient.conditions[0].entry.start_time.unwrap().datetime();
        assert_eq!(start.format("%Y-%m-%d").to_string(), "2008-01-02");
    }
}
