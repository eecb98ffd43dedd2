use std::convert::Infallible;
use std::fmt::Debug;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use opentelemetry::trace::TraceContextExt;
use serde_json::json;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::pin;
use tracing::{debug, error, info, instrument, Span};
use tracing_opentelemetry::OpenTelemetrySpanExt;

use crate::command::server::error::Error;
use crate::command::server::server_context::{canonical_path, Application};
use crate::command::server::ServerContext;
use crate::gate::ServletRequestExt;
use crate::metrics_provider::{IN_FLIGHT_REQUESTS, METRICS_PROVIDER};

pub async fn serve_request<S>(
    stream: TokioIo<S>,
    context: Arc<ServerContext>,
    timeouts: Arc<[Duration; 2]>,
    remote_address: std::net::SocketAddr,
) where
    S: Unpin + AsyncWrite + AsyncRead + Send + Debug + 'static,
{
    let conn = http1::Builder::new().serve_connection(
        stream,
        service_fn(move |mut request| {
            request.extensions_mut().insert(remote_address);
            handle_request(Arc::clone(&context), request)
        }),
    );
    pin!(conn);

    IN_FLIGHT_REQUESTS.fetch_add(1, Ordering::Relaxed);
    METRICS_PROVIDER.metric_http_request_in_flight.set(
        i64::try_from(IN_FLIGHT_REQUESTS.load(Ordering::Relaxed)).unwrap_or(i64::MAX),
    );

    for (iter, sleep_duration) in timeouts.iter().enumerate() {
        debug!("iter = {iter} sleep_duration = {sleep_duration:?}");
        tokio::select! {
            res = conn.as_mut() => {
                match res {
                    Ok(()) => debug!("after polling conn, no error"),
                    Err(error) =>  debug!("error serving connection: {error}"),
                }
                break;
            }
            () = tokio::time::sleep(*sleep_duration) => {
                debug!("iter = {iter} got timeout_interval, calling conn.graceful_shutdown");
                conn.as_mut().graceful_shutdown();
            }
        }
    }

    IN_FLIGHT_REQUESTS.fetch_sub(1, Ordering::Relaxed);
    METRICS_PROVIDER.metric_http_request_in_flight.set(
        i64::try_from(IN_FLIGHT_REQUESTS.load(Ordering::Relaxed)).unwrap_or(i64::MAX),
    );
}

fn current_trace_id() -> Option<String> {
    let context = Span::current().context();
    let span = context.span();
    let span_context = span.span_context();
    if span_context.is_valid() {
        Some(span_context.trace_id().to_string())
    } else {
        None
    }
}

#[instrument(skip(context, request))]
async fn handle_request(
    context: Arc<ServerContext>,
    request: Request<Incoming>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let start_time = Instant::now();
    let method = request.method().to_owned();
    let path = request.uri().path().to_owned();
    let application = canonical_path(&path)
        .ok()
        .and_then(|path| {
            context
                .resolve(&path)
                .map(|(application, _)| application.name.clone())
        })
        .unwrap_or_else(|| "-".to_string());

    let response = dispatch(&context, request).await;

    #[allow(clippy::cast_precision_loss)]
    let elapsed = start_time.elapsed().as_millis() as f64;
    let status = response.status();

    METRICS_PROVIDER
        .metric_http_request_total
        .with_label_values(&[method.as_str(), application.as_str(), status.as_str()])
        .inc();
    METRICS_PROVIDER
        .metric_http_request_duration
        .with_label_values(&[method.as_str(), application.as_str()])
        .observe(elapsed);

    let log = match current_trace_id() {
        Some(trace_id) => format!("{trace_id} {elapsed:?} - {status} {method} {path}"),
        None => format!("{elapsed:?} - {status} {method} {path}"),
    };

    if status.is_server_error() {
        error!("{log}");
    } else {
        info!("{log}");
    }

    Ok(response)
}

/// Routes a request to its application, running the authentication gate first.
pub async fn dispatch<B>(context: &ServerContext, request: Request<B>) -> Response<Full<Bytes>> {
    let (mut parts, _body) = request.into_parts();
    let path = match canonical_path(parts.uri.path()) {
        Ok(path) => path,
        Err(error) => {
            debug!("Rejected request path '{}': {error}", parts.uri.path());
            return error_to_response(&error);
        }
    };

    if context.metrics_path.as_deref() == Some(path.as_str()) {
        return metrics_response();
    }

    let Some((application, resource)) = context.resolve(&path) else {
        return error_to_response(&Error::NotFound(format!("No application serves '{path}'")));
    };
    parts.extensions.insert(resource);

    let (mut head, ()) = Response::new(()).into_parts();
    let decision = tokio::time::timeout(
        context.authentication_timeout,
        application.gate.handle(&parts, &mut head),
    )
    .await;

    match decision {
        Ok(Ok(true)) => application_response(application, &parts),
        Ok(Ok(false)) => {
            let body = Error::Unauthorized("Authentication required".to_string())
                .as_json(current_trace_id().as_ref());
            head.headers
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            Response::from_parts(head, Full::new(Bytes::from(body.to_string())))
        }
        Ok(Err(error)) => {
            error!("Authentication gate failure for '{path}': {error}");
            error_to_response(&Error::from(error))
        }
        Err(_) => {
            error!(
                "Authentication of '{path}' exceeded {:?}",
                context.authentication_timeout
            );
            error_to_response(&Error::ServiceUnavailable(
                "Authentication timed out".to_string(),
            ))
        }
    }
}

/// Stand-in for the application logic the request is forwarded to once allowed.
fn application_response(
    application: &Application,
    parts: &hyper::http::request::Parts,
) -> Response<Full<Bytes>> {
    let body = json!({
        "application": application.name,
        "servlet_path": parts.servlet_path(),
        "path_info": parts.path_info(),
    });

    json_response(StatusCode::OK, &body)
}

fn json_response(status: StatusCode, body: &serde_json::Value) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body.to_string())));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

fn metrics_response() -> Response<Full<Bytes>> {
    match METRICS_PROVIDER.gather() {
        Ok((content_type, metrics)) => {
            let mut response = Response::new(Full::new(Bytes::from(metrics)));
            if let Ok(content_type) = HeaderValue::from_str(&content_type) {
                response.headers_mut().insert(CONTENT_TYPE, content_type);
            }
            response
        }
        Err(error) => error_to_response(&error),
    }
}

fn error_to_response(error: &Error) -> Response<Full<Bytes>> {
    json_response(error.status_code(), &error.as_json(current_trace_id().as_ref()))
}
