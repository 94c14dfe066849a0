use poem::http::{HeaderValue, StatusCode};
use poem::{Endpoint, IntoResponse, Middleware, Request, Response};
use std::time::Instant;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Logs each request with method, path (query included), status and duration.
/// Tags it with a request id, reusing the caller's `x-request-id` when present.
pub struct RequestLogging;

impl<E: Endpoint> Middleware<E> for RequestLogging {
    type Output = RequestLoggingEndpoint<E>;

    fn transform(&self, ep: E) -> Self::Output {
        RequestLoggingEndpoint { inner: ep }
    }
}

pub struct RequestLoggingEndpoint<E> {
    inner: E,
}

struct RequestInfo {
    method: String,
    target: String,
    client_ip: String,
    request_id: String,
}

impl RequestInfo {
    fn log_outcome(&self, status: StatusCode, duration_ms: u128) {
        let RequestInfo {
            method,
            target,
            client_ip,
            request_id,
        } = self;
        let status = status.as_u16();
        if status >= 500 {
            tracing::error!(%method, %target, %client_ip, %request_id, status, duration_ms, "request failed");
        } else if status >= 400 {
            tracing::warn!(%method, %target, %client_ip, %request_id, status, duration_ms, "request rejected");
        } else {
            tracing::info!(%method, %target, %client_ip, %request_id, status, duration_ms, "request completed");
        }
    }
}

impl<E: Endpoint> Endpoint for RequestLoggingEndpoint<E> {
    type Output = Response;

    async fn call(&self, req: Request) -> poem::Result<Self::Output> {
        let start = Instant::now();
        let info = RequestInfo {
            method: req.method().to_string(),
            target: req
                .uri()
                .path_and_query()
                .map(|pq| pq.as_str().to_string())
                .unwrap_or_else(|| req.uri().path().to_string()),
            client_ip: req
                .remote_addr()
                .as_socket_addr()
                .map(|addr| addr.ip().to_string())
                .unwrap_or_else(|| "unknown".to_string()),
            request_id: req
                .headers()
                .get(REQUEST_ID_HEADER)
                .and_then(|v| v.to_str().ok())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        };

        let result = self.inner.call(req).await;
        let duration_ms = start.elapsed().as_millis();

        match result {
            Ok(resp) => {
                let mut resp = resp.into_response();
                info.log_outcome(resp.status(), duration_ms);
                if let Ok(value) = HeaderValue::from_str(&info.request_id) {
                    resp.headers_mut().insert(REQUEST_ID_HEADER, value);
                }
                Ok(resp)
            }
            Err(err) => {
                info.log_outcome(err.status(), duration_ms);
                tracing::debug!(request_id = %info.request_id, error = %err, "request error detail");
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use poem::{handler, test::TestClient, EndpointExt, Route};

    #[handler]
    fn ok() -> &'static str {
        "ok"
    }

    #[tokio::test]
    async fn test_request_id_is_generated() {
        let app = Route::new().at("/", ok).with(RequestLogging);
        let resp = TestClient::new(app).get("/").send().await;
        resp.assert_status_is_ok();
        let id = resp
            .0
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap()
            .to_string();
        assert!(uuid::Uuid::parse_str(&id).is_ok());
    }

    #[tokio::test]
    async fn test_request_id_is_propagated() {
        let app = Route::new().at("/", ok).with(RequestLogging);
        let resp = TestClient::new(app)
            .get("/")
            .header(REQUEST_ID_HEADER, "abc-123")
            .send()
            .await;
        resp.assert_header(REQUEST_ID_HEADER, "abc-123");
    }
}
