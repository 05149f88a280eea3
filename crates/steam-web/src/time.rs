//! Platform time lookup
//!
//! Backs the guard clock alignment with the public time query endpoint.
//! The endpoint needs no authentication, so one reference is shared by
//! every session in a run.

use std::future::Future;
use std::pin::Pin;

use steam_guard::TimeReference;
use tracing::debug;

const QUERY_TIME_ENDPOINT: &str =
    "https://api.steampowered.com/ITwoFactorService/QueryTime/v1/";

/// `TimeReference` over the web API.
#[derive(Debug, Clone)]
pub struct WebTimeReference {
    http: reqwest::Client,
    endpoint: String,
}

impl WebTimeReference {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            endpoint: QUERY_TIME_ENDPOINT.to_string(),
        }
    }
}

impl TimeReference for WebTimeReference {
    fn server_time(
        &self,
    ) -> Pin<Box<dyn Future<Output = steam_guard::Result<i64>> + Send + '_>> {
        Box::pin(async move {
            let response = self
                .http
                .post(&self.endpoint)
                .form(&[("steamid", "0")])
                .send()
                .await
                .map_err(|e| steam_guard::Error::TimeQuery(format!("request failed: {e}")))?;

            let status = response.status();
            if !status.is_success() {
                return Err(steam_guard::Error::TimeQuery(format!(
                    "time endpoint returned {status}"
                )));
            }

            let body = response
                .text()
                .await
                .map_err(|e| steam_guard::Error::TimeQuery(format!("invalid body: {e}")))?;
            let time = parse_server_time(&body)?;
            debug!(server_time = time, "platform time queried");
            Ok(time)
        })
    }
}

/// The endpoint reports `server_time` as a decimal string inside the
/// `response` envelope; some mirrors return a bare number.
fn parse_server_time(body: &str) -> steam_guard::Result<i64> {
    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| steam_guard::Error::TimeQuery(format!("invalid json: {e}")))?;

    let field = value
        .get("response")
        .and_then(|response| response.get("server_time"))
        .ok_or_else(|| steam_guard::Error::TimeQuery("server_time missing".to_string()))?;

    match field {
        serde_json::Value::String(raw) => raw
            .parse::<i64>()
            .map_err(|e| steam_guard::Error::TimeQuery(format!("bad server_time: {e}"))),
        serde_json::Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| steam_guard::Error::TimeQuery("bad server_time".to_string())),
        _ => Err(steam_guard::Error::TimeQuery(
            "bad server_time type".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_string_server_time() {
        let body = r#"{"response":{"server_time":"1756500000","skew_tolerance_seconds":"60"}}"#;
        assert_eq!(parse_server_time(body).unwrap(), 1_756_500_000);
    }

    #[test]
    fn parses_numeric_server_time() {
        let body = r#"{"response":{"server_time":1756500000}}"#;
        assert_eq!(parse_server_time(body).unwrap(), 1_756_500_000);
    }

    #[test]
    fn missing_field_is_an_error() {
        let body = r#"{"response":{}}"#;
        assert!(matches!(
            parse_server_time(body),
            Err(steam_guard::Error::TimeQuery(_))
        ));
    }

    #[test]
    fn non_json_body_is_an_error() {
        assert!(parse_server_time("<html>busy</html>").is_err());
    }
}
