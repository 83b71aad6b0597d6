use crate::stream;
use axum::body::Body;
use axum::extract::rejection::FormRejection;
use axum::extract::{Form, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde::Deserialize;
use sitectl_core::auth::Session;
use sitectl_core::response::noauth;
use sitectl_core::{Admission, Endpoint, Request};
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

pub const VERSION_HEADER: HeaderName = HeaderName::from_static("x-sitectl-version");
pub const TTL_HEADER: HeaderName = HeaderName::from_static("x-sitectl-ttl");
pub const COMMAND_HEADER: HeaderName = HeaderName::from_static("x-sitectl-command");

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// Posted fields. The `wpm-*` names are accepted from older callers.
#[derive(Debug, Default, Deserialize)]
pub struct RequestForm {
    #[serde(rename = "auth-tag", alias = "wpm-a")]
    pub tag: Option<String>,
    #[serde(alias = "wpm-c")]
    pub command: Option<String>,
    #[serde(rename = "debug-flag", alias = "wpm-d")]
    pub debug: Option<String>,
}

impl From<RequestForm> for Request {
    fn from(form: RequestForm) -> Self {
        Request {
            tag: form.tag,
            command: form.command,
            debug: form.debug.is_some(),
        }
    }
}

/// `POST /`
pub async fn endpoint(
    State(endpoint): State<Arc<Endpoint>>,
    form: Result<Form<RequestForm>, FormRejection>,
) -> Response {
    let form = match form {
        Ok(Form(form)) => form,
        Err(rejection) => {
            tracing::debug!(%rejection, "unreadable form; treating as empty");
            RequestForm::default()
        }
    };
    let request = Request::from(form);
    let now = Utc::now();

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(TEXT_PLAIN));
    if request.debug {
        let version = format!("{}, {}", sitectl_core::PROTO_VERSION, sitectl_core::AGENT_VERSION);
        if let Ok(value) = HeaderValue::from_str(&version) {
            headers.insert(VERSION_HEADER, value);
        }
    }

    let admission = {
        let endpoint = Arc::clone(&endpoint);
        let request = request.clone();
        tokio::task::spawn_blocking(move || endpoint.admit(&request, now)).await
    };
    let session = match admission {
        Ok(Ok(Admission::Granted(session))) => session,
        Ok(Ok(Admission::EarlyPing(body))) => return (headers, body).into_response(),
        Ok(Ok(Admission::Denied(failure))) => return (headers, noauth(failure)).into_response(),
        Ok(Err(e)) => {
            tracing::error!(error = %e, "authentication store failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, headers, format!("ERROR:{e}")).into_response();
        }
        Err(e) => {
            tracing::error!(error = %e, "authentication task failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, headers).into_response();
        }
    };

    if request.debug {
        debug_headers(&mut headers, &session, &request, now);
    }

    (headers, stream_reply(endpoint, session, request, now)).into_response()
}

fn debug_headers(headers: &mut HeaderMap, session: &Session, request: &Request, now: chrono::DateTime<Utc>) {
    headers.insert(TTL_HEADER, HeaderValue::from(session.remaining(now).num_seconds()));
    let command: String = url::form_urlencoded::byte_serialize(
        request.command.as_deref().unwrap_or_default().as_bytes(),
    )
    .collect();
    if let Ok(value) = HeaderValue::from_str(&command) {
        headers.insert(COMMAND_HEADER, value);
    }
}

/// Run the command on the blocking pool, streaming its reply as the body.
fn stream_reply(
    endpoint: Arc<Endpoint>,
    session: Session,
    request: Request,
    now: chrono::DateTime<Utc>,
) -> Body {
    let (mut writer, rx) = stream::channel();
    tokio::task::spawn_blocking(move || {
        match endpoint.execute(&session, &request, now, &mut writer) {
            Ok(handled) => tracing::debug!(?handled, "request handled"),
            Err(e) if e.is_transport() => tracing::warn!(error = %e, "client went away mid-reply"),
            Err(e) => tracing::error!(error = %e, "request failed"),
        }
    });
    Body::from_stream(ReceiverStream::new(rx).map(Ok::<_, Infallible>))
}
