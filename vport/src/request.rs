//! HTTP+JSON control-plane client.
//!
//! Session setup (desktop selection, authentication) happens over a
//! plain HTTPS API, entirely outside the port channel. These are
//! one-shot blocking calls; run them off the async driver (e.g. via
//! `spawn_blocking`) when a runtime is involved.

use serde_json::Value;
use tracing::debug;

use crate::error::Result;

/// Client for the connection manager's JSON API.
#[derive(Debug, Clone)]
pub struct ControlClient {
    base: String,
}

impl ControlClient {
    /// Creates a client for the API rooted at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base: base_url.into(),
        }
    }

    /// Issues a GET and parses the JSON response body.
    pub fn get(&self, path: &str) -> Result<Value> {
        let uri = self.url(path);
        debug!("GET request to {uri}");
        let mut response = ureq::get(&uri).call()?;
        let body: Value = response.body_mut().read_json()?;
        debug!("request response:\n{}", hide_json_password(&body.to_string()));
        Ok(body)
    }

    /// Issues a POST with a JSON body and parses the JSON response.
    pub fn post(&self, path: &str, body: &Value) -> Result<Value> {
        let uri = self.url(path);
        debug!(
            "POST request to {uri}, body:\n{}",
            hide_json_password(&body.to_string())
        );
        let mut response = ureq::post(&uri).send_json(body)?;
        let reply: Value = response.body_mut().read_json()?;
        debug!("request response:\n{}", hide_json_password(&reply.to_string()));
        Ok(reply)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base.trim_end_matches('/'), path)
    }
}

/// Masks the value of a `"password"` field so a JSON text can be
/// logged safely. Only the first occurrence is masked; texts without
/// one pass through unchanged.
pub fn hide_json_password(json: &str) -> String {
    const FIELD: &str = "\"password\"";
    let Some(field_at) = json.find(FIELD) else {
        return json.to_owned();
    };
    let after_field = field_at + FIELD.len();
    let Some(colon) = json[after_field..].find(':') else {
        return json.to_owned();
    };
    let Some(open_quote) = json[after_field + colon..].find('"') else {
        return json.to_owned();
    };
    let value_at = after_field + colon + open_quote + 1;
    let Some(value_len) = json[value_at..].find('"') else {
        return json.to_owned();
    };
    let masked = "*".repeat(json[value_at..value_at + value_len].chars().count());
    format!(
        "{}{}{}",
        &json[..value_at],
        masked,
        &json[value_at + value_len..]
    )
}
