use concierge_agent::knowledge::{ChunkIndex, IndexOrigin};
use concierge_core::config::AppConfig;
use concierge_db::{connect, migrations};
use serde::Serialize;

use crate::commands::{block_on, load_config, CommandResult, EXIT_DOCTOR};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn pass(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Pass, details: details.into() }
    }

    fn fail(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Fail, details: details.into() }
    }

    fn skipped(name: &'static str) -> Self {
        Self {
            name,
            status: CheckStatus::Skipped,
            details: "skipped because configuration did not load".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

const DEPENDENT_CHECKS: &[&str] = &["llm_credential", "database_connectivity", "knowledge_index"];

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { EXIT_DOCTOR };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report() -> DoctorReport {
    let checks = match load_config("doctor") {
        Ok(config) => vec![
            DoctorCheck::pass("config_validation", "configuration loaded and validated"),
            check_llm_credential(&config),
            check_database(&config),
            check_knowledge_index(&config),
        ],
        Err(failure) => {
            let mut checks = vec![DoctorCheck::fail("config_validation", failure.output)];
            checks.extend(DEPENDENT_CHECKS.iter().map(|name| DoctorCheck::skipped(name)));
            checks
        }
    };

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let (overall_status, summary) = if all_pass {
        (CheckStatus::Pass, "doctor: all readiness checks passed")
    } else {
        (CheckStatus::Fail, "doctor: one or more readiness checks failed")
    };

    DoctorReport { overall_status, summary: summary.to_string(), checks }
}

// Validation already demands a key; this reports where the model calls go.
fn check_llm_credential(config: &AppConfig) -> DoctorCheck {
    match &config.llm.api_key {
        Some(_) => DoctorCheck::pass(
            "llm_credential",
            format!("api key present for model `{}` at {}", config.llm.model, config.llm.base_url),
        ),
        None => DoctorCheck::fail("llm_credential", "no api key configured"),
    }
}

fn check_database(config: &AppConfig) -> DoctorCheck {
    let outcome = block_on("doctor", async {
        let pool = connect(&config.database)
            .await
            .map_err(|error| format!("failed to connect to database: {error}"))?;
        let migrated = migrations::run_pending(&pool)
            .await
            .map_err(|error| format!("connected but migrations failed: {error}"));
        pool.close().await;
        migrated
    });

    match outcome {
        Ok(Ok(())) => DoctorCheck::pass(
            "database_connectivity",
            format!("connected and migrated `{}`", config.database.url),
        ),
        Ok(Err(details)) => DoctorCheck::fail("database_connectivity", details),
        Err(failure) => DoctorCheck::fail("database_connectivity", failure.output),
    }
}

fn check_knowledge_index(config: &AppConfig) -> DoctorCheck {
    if !config.knowledge.document_path.exists() {
        return DoctorCheck::fail(
            "knowledge_index",
            format!(
                "source document {} is missing; answers will use placeholder content",
                config.knowledge.document_path.display()
            ),
        );
    }

    match ChunkIndex::load_or_build(&config.knowledge, false) {
        Ok((index, IndexOrigin::Loaded)) => {
            DoctorCheck::pass("knowledge_index", format!("{} chunks loaded", index.chunks.len()))
        }
        Ok((index, IndexOrigin::Built)) => DoctorCheck::pass(
            "knowledge_index",
            format!("{} chunks built from {}", index.chunks.len(), index.source.display()),
        ),
        Err(error) => DoctorCheck::fail("knowledge_index", error.to_string()),
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = vec![report.summary.clone()];
    lines.extend(report.checks.iter().map(|check| {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        format!("- [{marker}] {}: {}", check.name, check.details)
    }));
    lines.join("\n")
}
