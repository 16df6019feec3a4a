use std::{convert::Infallible, sync::Arc, time::Duration};

use rama::{
    Layer as _, Service,
    error::{BoxError, ErrorContext as _},
    graceful::ShutdownGuard,
    http::{
        HeaderValue, Method, Request, Response, StatusCode,
        layer::{required_header::AddRequiredResponseHeadersLayer, trace::TraceLayer},
        server::HttpServer,
        service::web::response::{IntoResponse, Json},
    },
    layer::TimeoutLayer,
    net::socket::Interface,
    rt::Executor,
    tcp::server::TcpListener,
    telemetry::tracing,
};

use clap::Args;

use crate::{
    comparator::{API_KEY_HEADER, ActionKind, EndpointVariant},
    config::ApiKey,
    utils,
};

#[cfg(test)]
mod tests;

#[derive(Debug, Clone, Args)]
/// run a mock server serving both the with-index and no-index API
pub struct MockCommand {
    /// network interface to bind to
    #[arg(
        long,
        short = 'b',
        value_name = "INTERFACE",
        default_value = "127.0.0.1:0"
    )]
    pub bind: Interface,

    /// latency reported by the with-index API (in milliseconds, before jitter)
    #[arg(long, value_name = "MS", default_value_t = 5.)]
    base_latency: f64,

    /// factor applied to the base latency for the no-index API
    #[arg(long, value_name = "FACTOR", default_value_t = 8.)]
    penalty: f64,

    /// relative jitter applied to every reported latency, within [0, 1]
    #[arg(long, value_name = "FRACTION", default_value_t = 0.2)]
    jitter: f64,

    /// ratio of requests answered with an internal server error, within [0, 1]
    #[arg(long, value_name = "RATIO", default_value_t = 0.)]
    error_rate: f32,

    /// reject requests which do not send this `Api-Key`
    #[arg(long, value_name = "KEY")]
    api_key: Option<ApiKey>,

    /// answer immediately instead of sleeping for the reported latency
    #[arg(long, default_value_t = false)]
    no_delay: bool,
}

pub async fn exec(guard: ShutdownGuard, args: MockCommand) -> Result<(), BoxError> {
    let server = MockApiServer::try_new(&args).context("create mock api server")?;

    let exec = Executor::graceful(guard);
    let tcp_listener = TcpListener::bind(args.bind.clone(), exec.clone())
        .await
        .context("bind mock api server")?;

    let server_addr = tcp_listener
        .local_addr()
        .context("get bound address for mock api server")?;
    tracing::info!(
        with_index = %format!("http://{server_addr}/{}", EndpointVariant::WithIndex),
        no_index = %format!("http://{server_addr}/{}", EndpointVariant::NoIndex),
        "mock api server ready",
    );

    serve(tcp_listener, exec, server).await;
    Ok(())
}

async fn serve(tcp_listener: TcpListener, exec: Executor, server: MockApiServer) {
    let http_svc = (
        TraceLayer::new_for_http(),
        AddRequiredResponseHeadersLayer::new().with_server_header_value(HeaderValue::from_static(
            utils::env::network_service_identifier(),
        )),
    )
        .into_layer(Arc::new(server));

    let http_server = HttpServer::auto(exec).service(Arc::new(http_svc));
    let tcp_svc = TimeoutLayer::new(Duration::from_secs(60)).into_layer(http_server);

    tcp_listener.serve(tcp_svc).await;
}

/// Upper bound for any latency reported (and slept) by the mock server.
const MAX_LATENCY_MS: f64 = 60_000.;

#[derive(Debug)]
struct MockApiServer {
    base_latency: f64,
    penalty: f64,
    jitter: f64,
    error_rate: f32,
    api_key: Option<ApiKey>,
    delay: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MockOutcome {
    Error,
    Ok,
}

impl MockApiServer {
    fn try_new(args: &MockCommand) -> Result<Self, BoxError> {
        for (name, value) in [
            ("base latency", args.base_latency),
            ("penalty", args.penalty),
            ("jitter", args.jitter),
            ("error rate", args.error_rate as f64),
        ] {
            if !value.is_finite() || value < 0. {
                return Err(BoxError::from(format!(
                    "{name} has to be a finite, non-negative number, got: {value}"
                )));
            }
        }

        // jitter can add at most the full base latency on top
        let max_latency = args.base_latency * args.penalty.max(1.) * 2.;
        if max_latency > MAX_LATENCY_MS {
            return Err(BoxError::from(format!(
                "base latency x penalty can reach {max_latency} ms (jitter included), \
                max allowed is {MAX_LATENCY_MS} ms"
            )));
        }

        let server = Self {
            base_latency: args.base_latency,
            penalty: args.penalty,
            jitter: args.jitter.min(1.),
            error_rate: args.error_rate.min(1.),
            api_key: args.api_key.clone(),
            delay: !args.no_delay,
        };
        tracing::info!(
            base_latency = %server.base_latency,
            penalty = %server.penalty,
            jitter = %server.jitter,
            error_rate = %server.error_rate,
            api_key = server.api_key.is_some(),
            delay = server.delay,
            "mock api server config ready",
        );
        Ok(server)
    }

    /// `/{variant}/{action}`, anything else is not served.
    fn route(path: &str) -> Option<(EndpointVariant, ActionKind)> {
        let (variant, action) = path.strip_prefix('/')?.split_once('/')?;
        let variant = EndpointVariant::ALL
            .into_iter()
            .find(|candidate| candidate.as_str() == variant)?;
        let action = ActionKind::try_from_str(action)?;
        Some((variant, action))
    }

    fn is_authorized(&self, req: &Request) -> bool {
        let Some(api_key) = &self.api_key else {
            return true;
        };
        req.headers()
            .get(API_KEY_HEADER)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value == api_key.expose())
    }

    fn pick_outcome(&self, r: f32) -> MockOutcome {
        if r < self.error_rate {
            MockOutcome::Error
        } else {
            MockOutcome::Ok
        }
    }

    /// Reported latency in milliseconds for a uniform sample `u` in `[0, 1)`.
    fn compute_latency(&self, variant: EndpointVariant, u: f64) -> f64 {
        let base = match variant {
            EndpointVariant::WithIndex => self.base_latency,
            EndpointVariant::NoIndex => self.base_latency * self.penalty,
        };
        let factor = 1. + self.jitter * (u * 2. - 1.);
        ((base * factor).max(0.) * 1000.).round() / 1000.
    }

    fn error_response() -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "mock api server failure: try again later",
        )
            .into_response()
    }
}

impl Service<Request> for MockApiServer {
    type Output = Response;
    type Error = Infallible;

    async fn serve(&self, req: Request) -> Result<Self::Output, Self::Error> {
        let Some((variant, action)) = Self::route(req.uri().path()) else {
            return Ok(StatusCode::NOT_FOUND.into_response());
        };
        if req.method() != Method::GET {
            return Ok(StatusCode::METHOD_NOT_ALLOWED.into_response());
        }
        if !self.is_authorized(&req) {
            tracing::debug!(%variant, %action, "reject request: invalid api key");
            return Ok(StatusCode::UNAUTHORIZED.into_response());
        }

        if self.pick_outcome(rand::random()) == MockOutcome::Error {
            tracing::debug!(%variant, %action, "reply with mock failure");
            return Ok(Self::error_response());
        }

        let latency = self.compute_latency(variant, rand::random());
        if self.delay && latency > 0. {
            tokio::time::sleep(Duration::from_secs_f64(latency / 1000.)).await;
        }

        tracing::debug!(%variant, %action, %latency, "reply with mock latency");
        Ok(Json(serde_json::json!({ "result": latency })).into_response())
    }
}
