pub mod clear;
pub mod config;
pub mod doctor;
pub mod migrate;
pub mod record;
pub mod seed;
pub mod suggest;
pub mod weights;

mod context;

use serde::Serialize;
use serde_json::Value;

use cobuy_core::domain::product::ProductId;
use cobuy_core::errors::DomainError;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            data: None,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn success_with_data(
        command: &str,
        message: impl Into<String>,
        data: &impl Serialize,
    ) -> Self {
        let data = match serde_json::to_value(data) {
            Ok(data) => data,
            Err(error) => {
                return Self::failure(command, "serialization", error.to_string(), 3);
            }
        };
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            data: Some(data),
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            data: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

/// Parses a comma-separated product id list such as `1,2, 3`.
pub fn parse_product_ids(raw: &str) -> Result<Vec<ProductId>, DomainError> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::parse::<ProductId>)
        .collect()
}

#[cfg(test)]
mod tests {
    use cobuy_core::domain::product::ProductId;
    use cobuy_core::errors::DomainError;

    use super::{parse_product_ids, CommandResult};

    #[test]
    fn product_lists_tolerate_spaces_and_trailing_commas() {
        let parsed = parse_product_ids(" 1, 2,3, ").expect("valid list");
        assert_eq!(parsed, vec![ProductId(1), ProductId(2), ProductId(3)]);
        assert!(parse_product_ids("").expect("empty list").is_empty());
    }

    #[test]
    fn non_numeric_product_ids_are_rejected() {
        let error = parse_product_ids("1,tea").expect_err("tea is not an id");
        assert_eq!(error, DomainError::InvalidProductId("tea".to_string()));
    }

    #[test]
    fn data_payload_is_omitted_for_plain_success() {
        let plain = CommandResult::success("clear", "done");
        assert!(!plain.output.contains("\"data\""));

        let with_data = CommandResult::success_with_data("weights", "done", &vec![1, 2]);
        assert!(with_data.output.contains("\"data\":[1,2]"));
    }
}
