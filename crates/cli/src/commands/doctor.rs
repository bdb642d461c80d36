use cobuy_core::config::{AppConfig, LoadOptions, StoreBackend};
use cobuy_store::{connect_with_settings, migrations, open_ranked_store, redact_url};
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

const PROBE_KEY: &str = "doctor:probe";

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
            match tokio::runtime::Builder::new_current_thread().enable_all().build() {
                Ok(runtime) => {
                    checks.push(runtime.block_on(check_catalog(&config)));
                    checks.push(runtime.block_on(check_ranked_store(&config)));
                }
                Err(error) => {
                    for name in ["catalog_readiness", "ranked_store_connectivity"] {
                        checks.push(DoctorCheck {
                            name,
                            status: CheckStatus::Fail,
                            details: format!("failed to initialize async runtime: {error}"),
                        });
                    }
                }
            }
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["catalog_readiness", "ranked_store_connectivity"] {
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

async fn check_catalog(config: &AppConfig) -> DoctorCheck {
    let result = async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| format!("failed to connect to database: {error}"))?;

        let migrated = migrations::run_pending(&pool)
            .await
            .map_err(|error| format!("catalog migrations failed: {error}"));
        pool.close().await;
        migrated
    }
    .await;

    match result {
        Ok(()) => DoctorCheck {
            name: "catalog_readiness",
            status: CheckStatus::Pass,
            details: format!("catalog schema ready at `{}`", config.database.url),
        },
        Err(details) => {
            DoctorCheck { name: "catalog_readiness", status: CheckStatus::Fail, details }
        }
    }
}

async fn check_ranked_store(config: &AppConfig) -> DoctorCheck {
    let target = match config.store.backend {
        StoreBackend::Memory => "process-local memory store".to_string(),
        StoreBackend::Redis => {
            format!("redis at `{}`", redact_url(config.store.url.expose_secret()))
        }
    };

    let result = async {
        let store = open_ranked_store(&config.store).await?;
        store.exists(PROBE_KEY).await
    }
    .await;

    match result {
        Ok(_) if config.store.backend == StoreBackend::Memory => DoctorCheck {
            name: "ranked_store_connectivity",
            status: CheckStatus::Pass,
            details: format!("{target}; associations are not kept between runs"),
        },
        Ok(_) => DoctorCheck {
            name: "ranked_store_connectivity",
            status: CheckStatus::Pass,
            details: format!("connected to {target}"),
        },
        Err(error) => DoctorCheck {
            name: "ranked_store_connectivity",
            status: CheckStatus::Fail,
            details: format!("{target}: {error}"),
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

#[cfg(test)]
mod tests {
    use super::{render_human, CheckStatus, DoctorCheck, DoctorReport};

    #[test]
    fn human_report_marks_each_check() {
        let report = DoctorReport {
            overall_status: CheckStatus::Fail,
            summary: "doctor: one or more readiness checks failed".to_string(),
            checks: vec![
                DoctorCheck {
                    name: "config_validation",
                    status: CheckStatus::Pass,
                    details: "ok".to_string(),
                },
                DoctorCheck {
                    name: "ranked_store_connectivity",
                    status: CheckStatus::Skipped,
                    details: "skipped".to_string(),
                },
            ],
        };

        let rendered = render_human(&report);
        assert!(rendered.contains("- [ok] config_validation: ok"));
        assert!(rendered.contains("- [skip] ranked_store_connectivity: skipped"));
    }
}
