use crate::error::request_error::RequestError;
use crate::state::admin_state::AdminState;
use crate::utils::encrypt;
use axum::extract::State;
use axum::{
    body::Body, extract::Request, http::HeaderMap, middleware::Next, response::IntoResponse,
};
use http_body_util::BodyExt;

pub const SIGNATURE_HEADER: &str = "signature";

// middleware
pub async fn body_signature_verify(
    State(state): State<AdminState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<impl IntoResponse, RequestError> {
    let signature = match headers.get(SIGNATURE_HEADER) {
        Some(value) => value.to_str().unwrap_or_default().to_owned(),
        None => String::new(),
    };
    if signature.is_empty() {
        return Err(RequestError::SignatureError);
    }
    // 提取body进行签名验证
    let request = buffer_request_body(&state, &signature, request).await?;
    Ok(next.run(request).await)
}

async fn buffer_request_body(
    state: &AdminState,
    signature: &str,
    request: Request,
) -> Result<Request, RequestError> {
    let (parts, body) = request.into_parts();
    // this wont work if the body is an long running stream
    let bytes = body
        .collect()
        .await
        .map_err(|err| {
            tracing::error!("req body get error,error:{}", err.to_string());
            RequestError::SignatureError
        })?
        .to_bytes();

    let body_str = String::from_utf8_lossy(&bytes);
    if encrypt::verify_body_signature(&body_str, &state.admin_secret, signature) {
        Ok(Request::from_parts(parts, Body::from(bytes)))
    } else {
        tracing::debug!("body_signature_verify mismatch - path:{}", parts.uri.path());
        Err(RequestError::SignatureError)
    }
}
