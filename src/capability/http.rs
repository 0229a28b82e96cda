use super::services::HttpClient;
use super::types::{HttpRequest, HttpResponse};
use super::CapabilityError;
use crate::config::HttpSettings;
use crate::shared::Deadline;
use std::collections::BTreeMap;
use std::time::Duration;

/// Blocking HTTP client backed by a shared `ureq` agent.
///
/// Each request is capped by the smaller of the client default timeout and
/// whatever is left on the caller's deadline.
#[derive(Clone)]
pub struct UreqHttpClient {
    agent: ureq::Agent,
    default_timeout: Duration,
}

impl UreqHttpClient {
    pub fn new(default_timeout: Duration, user_agent: &str) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(default_timeout)
            .user_agent(user_agent)
            .build();
        Self {
            agent,
            default_timeout,
        }
    }

    pub fn from_settings(settings: &HttpSettings) -> Self {
        Self::new(settings.timeout(), &settings.user_agent)
    }

    fn request_timeout(&self, deadline: &Deadline) -> Result<Duration, CapabilityError> {
        match deadline.remaining() {
            None => Ok(self.default_timeout),
            Some(remaining) if remaining.is_zero() => Err(CapabilityError::DeadlineExceeded {
                operation: "http.request".to_string(),
            }),
            Some(remaining) => Ok(remaining.min(self.default_timeout)),
        }
    }
}

impl Default for UreqHttpClient {
    fn default() -> Self {
        Self::from_settings(&HttpSettings::default())
    }
}

impl std::fmt::Debug for UreqHttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UreqHttpClient")
            .field("default_timeout", &self.default_timeout)
            .finish()
    }
}

impl HttpClient for UreqHttpClient {
    fn send(
        &self,
        deadline: &Deadline,
        request: &HttpRequest,
    ) -> Result<HttpResponse, CapabilityError> {
        let timeout = self.request_timeout(deadline)?;
        let mut call = self
            .agent
            .request(&request.method, &request.url)
            .timeout(timeout);
        for (name, value) in &request.headers {
            call = call.set(name, value);
        }

        let outcome = match &request.body {
            Some(body) => call.send_string(body),
            None => call.call(),
        };
        let response = match outcome {
            Ok(response) => response,
            Err(ureq::Error::Status(_, response)) => response,
            Err(ureq::Error::Transport(err)) => {
                if deadline.is_expired() {
                    return Err(CapabilityError::DeadlineExceeded {
                        operation: "http.request".to_string(),
                    });
                }
                return Err(CapabilityError::service(format!(
                    "{} {} failed: {err}",
                    request.method, request.url
                )));
            }
        };

        let status = response.status();
        let mut headers = BTreeMap::new();
        for name in response.headers_names() {
            if let Some(value) = response.header(&name) {
                headers.insert(name.to_ascii_lowercase(), value.to_string());
            }
        }
        let body = response.into_string().map_err(|err| {
            CapabilityError::service(format!("failed to read response body: {err}"))
        })?;
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
