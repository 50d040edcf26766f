use std::sync::Arc;
use std::time::Duration;

use secrecy::ExposeSecret;
use serde::Serialize;
use slotbook_core::config::{AppConfig, LoadOptions};
use slotbook_sheets::{
    BookingGrid, GoogleSheetsStore, ServiceAccountKey, ServiceAccountTokenSource, SheetsSettings,
};

use crate::commands::CommandResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
pub struct DoctorCheck {
    pub name: &'static str,
    pub status: CheckStatus,
    pub details: String,
}

#[derive(Debug, Serialize)]
pub struct DoctorReport {
    pub overall_status: CheckStatus,
    pub summary: String,
    pub checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let passed = report.overall_status == CheckStatus::Pass;

    if json_output {
        let output = serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\
                 \"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
        return CommandResult::report(output, passed);
    }

    CommandResult::report(render_human(&report), passed)
}

pub fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(DoctorCheck {
                name: "bot_token_shape",
                status: CheckStatus::Pass,
                details: "token format validated by config contract".to_string(),
            });

            let credentials = check_credentials(&config);
            let credentials_ok = credentials.status == CheckStatus::Pass;
            checks.push(credentials);
            if credentials_ok {
                checks.push(check_store_reachability(&config));
            } else {
                checks.push(skipped("store_reachability", "service-account key is unusable"));
            }
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["bot_token_shape", "store_credentials", "store_reachability"] {
                checks.push(skipped(name, "configuration did not load"));
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

fn skipped(name: &'static str, reason: &str) -> DoctorCheck {
    DoctorCheck {
        name,
        status: CheckStatus::Skipped,
        details: format!("skipped because {reason}"),
    }
}

/// Signs a throwaway assertion so a key that would fail the token exchange is caught offline.
fn check_credentials(config: &AppConfig) -> DoctorCheck {
    let signed = ServiceAccountKey::from_json(config.store.credentials.expose_secret())
        .and_then(|key| {
            key.signed_assertion(chrono::Utc::now().timestamp())?;
            Ok(key)
        });

    match signed {
        Ok(key) => DoctorCheck {
            name: "store_credentials",
            status: CheckStatus::Pass,
            details: format!("service account `{}` can sign token requests", key.client_email()),
        },
        Err(error) => DoctorCheck {
            name: "store_credentials",
            status: CheckStatus::Fail,
            details: error.to_string(),
        },
    }
}

fn check_store_reachability(config: &AppConfig) -> DoctorCheck {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck {
                name: "store_reachability",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    let result = runtime.block_on(async {
        let key = ServiceAccountKey::from_json(config.store.credentials.expose_secret())
            .map_err(|error| error.to_string())?;
        let token_client = reqwest_client(config.store.timeout_secs)?;
        let tokens = Arc::new(ServiceAccountTokenSource::new(key, token_client));
        let store = GoogleSheetsStore::new(SheetsSettings::from(&config.store), tokens)
            .map_err(|error| error.to_string())?;

        let grid = BookingGrid::new(Arc::new(store), config.store.booking_sheet.as_str());
        grid.day_labels().await.map_err(|error| format!("failed to read day header: {error}"))
    });

    match result {
        Ok(days) if days.is_empty() => DoctorCheck {
            name: "store_reachability",
            status: CheckStatus::Fail,
            details: format!("sheet `{}` has no day headers", config.store.booking_sheet),
        },
        Ok(days) => DoctorCheck {
            name: "store_reachability",
            status: CheckStatus::Pass,
            details: format!(
                "read {} day headers from sheet `{}`",
                days.len(),
                config.store.booking_sheet
            ),
        },
        Err(error) => {
            DoctorCheck { name: "store_reachability", status: CheckStatus::Fail, details: error }
        }
    }
}

fn reqwest_client(timeout_secs: u64) -> Result<reqwest::Client, String> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|error| format!("could not build http client: {error}"))
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
