//! Logs API Handler
//!
//! Pods post their progress logs here while a run is in flight. The bodies
//! are only written to the manager's own log.

use axum::{
    body::Bytes,
    extract::rejection::BytesRejection,
    http::{HeaderMap, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use serde_json::Value;
use tracing::{debug, error, info, warn};

/// POST /logs
/// Log callback from a pod; answers "OK" for any readable body
pub async fn receive_logs(headers: HeaderMap, body: Result<Bytes, BytesRejection>) -> Response {
    info!("Received POST request to: /logs");

    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    debug!("Content-Type: {}", content_type);

    let body = match body {
        Ok(body) => body,
        Err(e) => {
            error!("Error processing request to /logs: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response();
        }
    };

    let text = String::from_utf8_lossy(&body);

    if is_json(content_type) {
        match serde_json::from_slice::<Value>(&body) {
            Ok(Value::Object(fields)) => {
                debug!("Received JSON payload");
                for (key, value) in fields {
                    info!("{}: {}", key, display_value(&value));
                }
            }
            Ok(other) => {
                debug!("Received JSON payload");
                info!("{}", other);
            }
            Err(_) => {
                warn!("Content-Type is application/json but failed to parse body.");
                info!("Raw body:\n{}", text);
            }
        }
    } else {
        info!("Received non-JSON body:\n{}", text);
    }

    (StatusCode::OK, "OK").into_response()
}

fn is_json(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
}

/// Strings are logged without their JSON quotes
fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_json() {
        assert!(is_json("application/json"));
        assert!(is_json("application/json; charset=utf-8"));
        assert!(!is_json("text/plain"));
        assert!(!is_json(""));
    }

    #[test]
    fn test_display_value() {
        assert_eq!(display_value(&Value::String("done".to_string())), "done");
        assert_eq!(display_value(&serde_json::json!(3)), "3");
    }
}
