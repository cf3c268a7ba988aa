//! Gateway middleware.
//!
//! Runs the validation pipeline for one request and applies the decision
//! around the call to the protected application.

use axum::{
    body::Body,
    extract::State,
    http::{
        header, request::Parts, HeaderMap, HeaderName, HeaderValue, Request, Response, StatusCode,
    },
    middleware::Next,
    response::IntoResponse,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::ValidationConfig;
use crate::observability::metrics;
use crate::validation::client::{DecisionService, HttpDecisionService, RemoteValidator};
use crate::validation::descriptor::{build_descriptor, request_host, time_request_micros};
use crate::validation::encoding::encode_form;
use crate::validation::exclusion::StaticAssetFilter;
use crate::validation::relay::{merge_headers, relay_headers, stamp_latency, CookieDomainRewrite};
use crate::validation::verdict::{interpret, RewriteTarget, Verdict};
use crate::validation::{
    BOT_FAMILY_HEADER, BOT_NAME_HEADER, IS_BOT_HEADER, REQUEST_MANIFEST_HEADER,
    RESPONSE_MANIFEST_HEADER,
};

/// Connection-scoped headers that never cross the gateway.
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// What to do with a request after validation.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Static asset; validation was skipped.
    Excluded,
    /// Forward untouched (disabled, auth error or fail-open).
    PassThrough,
    /// Forward, adding headers to the request and the response.
    Forward {
        request_headers: HeaderMap,
        response_headers: HeaderMap,
    },
    /// Serve the rewrite target instead of the application.
    Rewrite {
        target: RewriteTarget,
        response_headers: HeaderMap,
    },
}

/// The validation pipeline with its configuration and clients.
pub struct Gateway {
    config: ValidationConfig,
    filter: StaticAssetFilter,
    validator: RemoteValidator,
    rewrite_client: reqwest::Client,
}

impl Gateway {
    /// Build a gateway talking to the configured decision service over HTTP.
    pub fn from_config(config: ValidationConfig) -> Result<Self, reqwest::Error> {
        let service = Arc::new(HttpDecisionService::new(&config)?);
        Self::new(config, service)
    }

    /// Build a gateway around any decision service.
    pub fn new(
        config: ValidationConfig,
        service: Arc<dyn DecisionService>,
    ) -> Result<Self, reqwest::Error> {
        let rewrite_client = reqwest::Client::builder()
            .timeout(config.rewrite_timeout())
            .build()?;

        Ok(Self {
            filter: StaticAssetFilter::new(&config.excluded_extensions),
            validator: RemoteValidator::new(service, config.timeout()),
            config,
            rewrite_client,
        })
    }

    /// Deadline applied to each validation call.
    pub fn deadline(&self) -> Duration {
        self.validator.deadline()
    }

    /// Validate one request and decide how to handle it.
    pub async fn inspect(&self, request: &Parts) -> Decision {
        if !self.config.enabled {
            return Decision::PassThrough;
        }

        let path = request.uri.path();
        if self.filter.is_excluded(path) {
            metrics::record_excluded();
            return Decision::Excluded;
        }

        let descriptor = build_descriptor(request, &self.config, time_request_micros());
        let body = encode_form(&descriptor);

        let started = Instant::now();
        let outcome = self.validator.call(body).await;
        let elapsed = started.elapsed();

        let verdict = interpret(&outcome);
        metrics::record_verdict(verdict.label(), elapsed);

        let response = match (&verdict, outcome) {
            (verdict, Ok(response)) if verdict.relays_headers() => response,
            (Verdict::AuthError, _) => {
                tracing::error!(
                    path = %path,
                    "Decision service rejected the server key (400); check validation.server_key"
                );
                return Decision::PassThrough;
            }
            (Verdict::FailOpen(reason), _) => {
                tracing::warn!(
                    path = %path,
                    reason = %reason,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Validation failed open"
                );
                return Decision::PassThrough;
            }
            _ => return Decision::PassThrough,
        };

        let host = request_host(request);
        let cookie_rewrite = CookieDomainRewrite {
            rejected: &self.config.rejected_cookie_domain,
            host: host.as_deref(),
        };
        let mut response_headers =
            relay_headers(&response.headers, RESPONSE_MANIFEST_HEADER, cookie_rewrite);
        stamp_latency(&mut response_headers, elapsed);

        match verdict {
            Verdict::Block { status, target } => {
                log_classification(&response.headers, path, status);
                Decision::Rewrite {
                    target,
                    response_headers,
                }
            }
            _ => {
                tracing::debug!(path = %path, verdict = verdict.label(), "Request allowed");
                Decision::Forward {
                    request_headers: relay_headers(
                        &response.headers,
                        REQUEST_MANIFEST_HEADER,
                        cookie_rewrite,
                    ),
                    response_headers,
                }
            }
        }
    }

    /// Fetch the rewrite target and serve it in place of the application.
    ///
    /// The client's headers go out with the fetch and the target's status,
    /// headers and body come back. If the target cannot be fetched the
    /// client is redirected to it.
    pub async fn fetch_rewrite(&self, target: &RewriteTarget, inbound: &HeaderMap) -> Response<Body> {
        let mut request = self.rewrite_client.get(&target.url);
        for (name, value) in inbound {
            if *name == header::HOST || *name == header::CONTENT_LENGTH || is_hop_by_hop(name) {
                continue;
            }
            request = request.header(name.clone(), value.clone());
        }

        let fetched = match request.send().await {
            Ok(response) => {
                let status = response.status();
                let headers = response.headers().clone();
                response.bytes().await.map(|body| (status, headers, body))
            }
            Err(e) => Err(e),
        };

        match fetched {
            Ok((status, headers, body)) => {
                let mut response = Response::new(Body::from(body));
                *response.status_mut() = status;
                let served = response.headers_mut();
                for (name, value) in &headers {
                    if *name == header::CONTENT_LENGTH || is_hop_by_hop(name) {
                        continue;
                    }
                    served.append(name.clone(), value.clone());
                }
                response
            }
            Err(e) => {
                tracing::warn!(url = %target.url, error = %e, "Rewrite fetch failed, redirecting");
                redirect_to(&target.url)
            }
        }
    }
}

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP_HEADERS.contains(&name.as_str())
}

fn redirect_to(url: &str) -> Response<Body> {
    match HeaderValue::from_str(url) {
        Ok(location) => (StatusCode::FOUND, [(header::LOCATION, location)]).into_response(),
        Err(_) => StatusCode::FORBIDDEN.into_response(),
    }
}

/// Log the bot classification of a blocked request. Informational only.
fn log_classification(headers: &HeaderMap, path: &str, status: StatusCode) {
    let text = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    if text(IS_BOT_HEADER).is_some() {
        tracing::info!(
            path = %path,
            status = status.as_u16(),
            bot_name = text(BOT_NAME_HEADER).unwrap_or("unknown"),
            bot_family = text(BOT_FAMILY_HEADER).unwrap_or("unknown"),
            "Blocked automated traffic"
        );
    } else {
        tracing::info!(path = %path, status = status.as_u16(), "Blocked request");
    }
}

/// Axum middleware enforcing the decision service's verdict.
pub async fn bot_gateway_middleware(
    State(gateway): State<Arc<Gateway>>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    let (mut parts, body) = request.into_parts();
    let decision = gateway.inspect(&parts).await;

    match decision {
        Decision::Excluded | Decision::PassThrough => {
            next.run(Request::from_parts(parts, body)).await
        }
        Decision::Forward {
            request_headers,
            response_headers,
        } => {
            merge_headers(&mut parts.headers, &request_headers);
            let mut response = next.run(Request::from_parts(parts, body)).await;
            merge_headers(response.headers_mut(), &response_headers);
            response
        }
        Decision::Rewrite {
            target,
            response_headers,
        } => {
            let mut response = gateway.fetch_rewrite(&target, &parts.headers).await;
            merge_headers(response.headers_mut(), &response_headers);
            response
        }
    }
}
