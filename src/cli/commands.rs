//! The packaging command.

use super::{Args, OutputManager, params_file};
use crate::bundler::{BuildReport, Bundler, PackageType, Platform};
use crate::error::{CliError, PackagerError, Result};
use serde_json::json;
use std::str::FromStr;

/// Execute a packaging run and return the process exit code.
pub async fn execute_command(args: Args) -> Result<i32> {
    if let Err(validation_error) = args.validate() {
        let output = OutputManager::new(false);
        output.error(&format!("Invalid arguments: {validation_error}"));
        return Ok(1);
    }

    let output = OutputManager::new(args.quiet || args.json);
    let platform = match &args.platform {
        Some(p) => Platform::from_str(p)?,
        None => Platform::current(),
    };
    let bundler = Bundler::new(&args.dest).with_platform(platform);
    let types = requested_types(&args, &bundler)?;
    let seed = params_file::seed_store(&args)?;

    let names = types
        .iter()
        .map(PackageType::short_name)
        .collect::<Vec<_>>()
        .join(", ");
    let _ = output.section(&format!("Packaging for {platform}: {names}"));

    let reports = bundler.build_all(&types, &seed).await;
    for report in &reports {
        output.report(report);
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&json_reports(&reports))?);
    }

    finish(reports)
}

fn requested_types(args: &Args, bundler: &Bundler) -> Result<Vec<PackageType>> {
    if args.types.is_empty() {
        return Ok(bundler.default_types());
    }
    let mut types = Vec::with_capacity(args.types.len());
    for name in &args.types {
        let package_type = PackageType::from_str(name.trim())?;
        if !types.contains(&package_type) {
            types.push(package_type);
        }
    }
    Ok(types)
}

fn json_reports(reports: &[BuildReport]) -> serde_json::Value {
    let reports = reports
        .iter()
        .map(|report| {
            json!({
                "package_type": report.package_type,
                "bundler": report.bundler,
                "state": report.state.to_string(),
                "artifact": report.result.as_ref().ok(),
                "error": report.result.as_ref().err().map(ToString::to_string),
                "retained_image": report.retained_image,
            })
        })
        .collect::<Vec<_>>();
    json!({ "builds": reports })
}

/// A lone failed build surfaces its own error; several report a summary.
fn finish(reports: Vec<BuildReport>) -> Result<i32> {
    let total = reports.len();
    let mut failures = reports.into_iter().filter_map(|r| r.result.err()).collect::<Vec<_>>();
    match failures.len() {
        0 => Ok(0),
        1 if total == 1 => Err(PackagerError::Bundler(failures.remove(0))),
        failed => Err(CliError::BuildsFailed { failed, total }.into()),
    }
}
