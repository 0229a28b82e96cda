//! Declarative HTTP blocks: build a request from templates, send it through
//! the HTTP capability, and map the response into step output.

pub mod error;
pub mod types;

pub use error::DeclarativeError;
pub use types::{is_default_success, BlockDefinition, RequestConfig, ResponseConfig};

use crate::capability::{HttpClient, HttpRequest, HttpResponse};
use crate::shared::Deadline;
use crate::template::{
    expand_template, expand_template_for_url_path, expand_template_value, resolve_path,
    DeclarativeContext,
};
use serde_json::{Map, Value};

const BODY_METHODS: &[&str] = &["POST", "PUT", "PATCH"];

pub fn build_request(
    config: &RequestConfig,
    context: &DeclarativeContext,
) -> Result<HttpRequest, DeclarativeError> {
    if config.url.trim().is_empty() {
        return Err(DeclarativeError::MissingUrl);
    }
    let method = config
        .method
        .as_deref()
        .map(str::trim)
        .filter(|method| !method.is_empty())
        .unwrap_or("GET")
        .to_ascii_uppercase();

    let mut url = expand_template_for_url_path(config.url.trim(), context);
    if !config.query_params.is_empty() {
        let query = config
            .query_params
            .iter()
            .map(|(key, template)| {
                let value = expand_template(template, context);
                format!(
                    "{}={}",
                    urlencoding::encode(key),
                    urlencoding::encode(&value)
                )
            })
            .collect::<Vec<_>>()
            .join("&");
        let separator = if url.contains('?') { '&' } else { '?' };
        url.push(separator);
        url.push_str(&query);
    }

    let mut request = HttpRequest::new(method, url);
    for (name, template) in &config.headers {
        request
            .headers
            .insert(name.clone(), expand_template(template, context));
    }

    if BODY_METHODS.contains(&request.method.as_str()) {
        if let Some(template) = &config.body {
            let body = expand_template_value(template, context);
            let encoded =
                serde_json::to_string(&body).map_err(|source| DeclarativeError::Encode { source })?;
            request.body = Some(encoded);
            if request.header("content-type").is_none() {
                request
                    .headers
                    .insert("Content-Type".to_string(), "application/json".to_string());
            }
        }
    }
    Ok(request)
}

/// Decodes the body (raw text when it is not JSON), checks the status and
/// applies the output mapping.
pub fn process_response(
    config: Option<&ResponseConfig>,
    response: &HttpResponse,
) -> Result<Map<String, Value>, DeclarativeError> {
    let accepted = match config {
        Some(config) => config.accepts(response.status),
        None => is_default_success(response.status),
    };
    if !accepted {
        return Err(DeclarativeError::HttpStatus {
            status: response.status,
            body: response.body.clone(),
        });
    }

    let envelope = response_envelope(response);
    let Some(mapping) = config
        .map(|config| &config.output_mapping)
        .filter(|mapping| !mapping.is_empty())
    else {
        return Ok(envelope);
    };

    let source = Value::Object(envelope);
    let mut output = Map::new();
    for (key, path) in mapping {
        let value = match path.trim() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            path => resolve_path(&source, path).cloned().unwrap_or(Value::Null),
        };
        output.insert(key.clone(), value);
    }
    Ok(output)
}

pub fn execute_declarative(
    deadline: &Deadline,
    request_config: &RequestConfig,
    response_config: Option<&ResponseConfig>,
    context: &DeclarativeContext,
    http: &dyn HttpClient,
) -> Result<Map<String, Value>, DeclarativeError> {
    let request = build_request(request_config, context)?;
    let response = http
        .send(deadline, &request)
        .map_err(|source| DeclarativeError::Transport {
            method: request.method.clone(),
            url: request.url.clone(),
            source,
        })?;
    process_response(response_config, &response)
}

fn response_envelope(response: &HttpResponse) -> Map<String, Value> {
    let body = if response.body.trim().is_empty() {
        Value::String(String::new())
    } else {
        serde_json::from_str(&response.body)
            .unwrap_or_else(|_| Value::String(response.body.clone()))
    };
    let headers = response
        .headers
        .iter()
        .map(|(name, value)| (name.clone(), Value::String(value.clone())))
        .collect::<Map<_, _>>();
    Map::from_iter([
        ("status".to_string(), Value::from(response.status)),
        ("headers".to_string(), Value::Object(headers)),
        ("body".to_string(), body),
    ])
}
