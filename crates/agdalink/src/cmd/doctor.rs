use std::time::Duration;

use agdalink_client::ClientConfig;
use agdalink_process::{probe, search_path};
use serde::Serialize;

use crate::cmd::DoctorArgs;
use crate::exit::{CliResult, HEALTH_CHECK_FAILED, SUCCESS};
use crate::output::OutputFormat;

#[derive(Clone, Copy, Debug, Serialize)]
#[serde(rename_all = "lowercase")]
enum CheckStatus {
    Pass,
    Fail,
    Warn,
    Info,
    Skip,
}

#[derive(Debug, Serialize)]
struct CheckResult {
    name: String,
    status: CheckStatus,
    detail: String,
}

#[derive(Debug, Serialize)]
struct DoctorOutput {
    checks: Vec<CheckResult>,
    overall: &'static str,
}

pub async fn run(_args: DoctorArgs, format: OutputFormat) -> CliResult<i32> {
    let prover = prover_on_path_check();
    let probe = version_probe_check(&prover).await;

    let checks = vec![
        prover,
        probe,
        home_directory_check(),
        language_server_check().await,
    ];

    let has_fail = checks.iter().any(|c| matches!(c.status, CheckStatus::Fail));
    let overall = if has_fail { "fail" } else { "pass" };

    print_doctor(&DoctorOutput { checks, overall }, format);

    if has_fail {
        Ok(HEALTH_CHECK_FAILED)
    } else {
        Ok(SUCCESS)
    }
}

fn prover_on_path_check() -> CheckResult {
    match search_path("agda") {
        Some(path) => CheckResult {
            name: "prover_on_path".to_string(),
            status: CheckStatus::Pass,
            detail: path.display().to_string(),
        },
        None => CheckResult {
            name: "prover_on_path".to_string(),
            status: CheckStatus::Warn,
            detail: "agda not found on PATH; an explicit path is required".to_string(),
        },
    }
}

async fn version_probe_check(prover: &CheckResult) -> CheckResult {
    if !matches!(prover.status, CheckStatus::Pass) {
        return CheckResult {
            name: "version_probe".to_string(),
            status: CheckStatus::Skip,
            detail: "no executable to probe".to_string(),
        };
    }

    match probe(std::path::Path::new(&prover.detail), &[]).await {
        Ok(metadata) => CheckResult {
            name: "version_probe".to_string(),
            status: CheckStatus::Pass,
            detail: metadata.version,
        },
        Err(err) => CheckResult {
            name: "version_probe".to_string(),
            status: CheckStatus::Fail,
            detail: err.to_string(),
        },
    }
}

fn home_directory_check() -> CheckResult {
    match dirs::home_dir() {
        Some(home) => CheckResult {
            name: "home_directory".to_string(),
            status: CheckStatus::Pass,
            detail: home.display().to_string(),
        },
        None => CheckResult {
            name: "home_directory".to_string(),
            status: CheckStatus::Warn,
            detail: "no home directory; tilde paths will not expand".to_string(),
        },
    }
}

async fn language_server_check() -> CheckResult {
    let config = ClientConfig::default();
    let endpoint = format!("{}:{}", config.host, config.port);
    let connect = tokio::net::TcpStream::connect(&endpoint);

    match tokio::time::timeout(Duration::from_millis(500), connect).await {
        Ok(Ok(_)) => CheckResult {
            name: "language_server".to_string(),
            status: CheckStatus::Info,
            detail: format!("server listening on {endpoint}"),
        },
        _ => CheckResult {
            name: "language_server".to_string(),
            status: CheckStatus::Skip,
            detail: format!("nothing on {endpoint}; stdio method remains available"),
        },
    }
}

fn print_doctor(output: &DoctorOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(output).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("agdalink doctor\n");
            for check in &output.checks {
                println!(
                    "  [{:>4}] {:<18} {}",
                    status_text(check.status),
                    check.name,
                    check.detail
                );
            }
            if output.overall == "pass" {
                println!("\n  Result: all checks passed");
            } else {
                println!("\n  Result: one or more checks failed");
            }
        }
        OutputFormat::Raw => {
            println!("{}", output.overall);
        }
    }
}

fn status_text(status: CheckStatus) -> &'static str {
    match status {
        CheckStatus::Pass => "PASS",
        CheckStatus::Fail => "FAIL",
        CheckStatus::Warn => "WARN",
        CheckStatus::Info => "INFO",
        CheckStatus::Skip => "SKIP",
    }
}
