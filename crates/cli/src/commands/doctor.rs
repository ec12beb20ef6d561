use huddle_agent::executor::HttpTaskExecutor;
use huddle_core::{
    config::{AppConfig, LoadOptions},
    phone::PhoneNormalizer,
};
use secrecy::ExposeSecret;
use serde::Serialize;

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

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_bot_token(&config));
            checks.push(check_phone_region(&config));
            checks.push(check_executor_endpoint(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["bot_token_readiness", "phone_region", "executor_endpoint"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_bot_token(config: &AppConfig) -> DoctorCheck {
    let token = config.chat.bot_token.expose_secret();
    let bot_id = token.split_once(':').map(|(bot_id, _)| bot_id).unwrap_or_default();
    DoctorCheck {
        name: "bot_token_readiness",
        status: CheckStatus::Pass,
        details: format!("token shape validated for bot {bot_id}"),
    }
}

fn check_phone_region(config: &AppConfig) -> DoctorCheck {
    let region = config.phone.default_region.as_str();
    match PhoneNormalizer::for_region(region) {
        Some(normalizer) => DoctorCheck {
            name: "phone_region",
            status: CheckStatus::Pass,
            details: format!("phone metadata loaded for region {}", normalizer.default_region()),
        },
        None => DoctorCheck {
            name: "phone_region",
            status: CheckStatus::Fail,
            details: format!("no phone metadata for region `{region}`"),
        },
    }
}

fn check_executor_endpoint(config: &AppConfig) -> DoctorCheck {
    let Some(base_url) = config.executor.base_url.as_deref() else {
        return DoctorCheck {
            name: "executor_endpoint",
            status: CheckStatus::Pass,
            details: "no executor base_url configured; the local echo executor will be used"
                .to_string(),
        };
    };

    match HttpTaskExecutor::new(base_url, config.executor.timeout()) {
        Ok(executor) => DoctorCheck {
            name: "executor_endpoint",
            status: CheckStatus::Pass,
            details: format!("tasks will be posted to `{}`", executor.tasks_url()),
        },
        Err(error) => DoctorCheck {
            name: "executor_endpoint",
            status: CheckStatus::Fail,
            details: error.to_string(),
        },
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
