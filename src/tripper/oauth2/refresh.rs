// crates.io
use http::{
	HeaderValue, Method, StatusCode,
	header::{ACCEPT, CONTENT_TYPE},
};
use serde_json::{Map, Value};
// self
use crate::{
	_prelude::*,
	error::RefreshError,
	logger::{Field, LogContext, Logger},
	message::Request,
	redact::Redact,
	tripper::{RoundTrip, oauth2::OAuth2Identity},
};

const GRANT_TYPE: &str = "client_credentials";

#[derive(Serialize)]
struct TokenRequest<'a> {
	grant_type: &'static str,
	client_id: &'a str,
	client_secret: &'a str,
}

/// Requests a bearer token from the identity's token endpoint through `next`.
pub(super) async fn request_token(
	next: &dyn RoundTrip,
	identity: &OAuth2Identity,
	logger: &dyn Logger,
	ctx: &LogContext,
) -> Result<Redact, RefreshError> {
	let uri = identity.token_uri();
	let url = Url::parse(&uri).map_err(|source| RefreshError::Request {
		uri: uri.clone(),
		source: Box::new(Error::Request { method: Method::POST, uri: uri.clone(), source }),
	})?;
	let body = serde_json::to_vec(&TokenRequest {
		grant_type: GRANT_TYPE,
		client_id: &identity.client_id,
		client_secret: identity.client_secret.expose(),
	})
	.map_err(RefreshError::Encode)?;
	let request = Request::new(Method::POST, url)
		.with_header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
		.with_header(ACCEPT, HeaderValue::from_static("application/json"))
		.with_body(body)
		.with_context(ctx.clone());

	logger.debug(ctx, "requesting oauth token", &[Field::new("url", uri.as_str())]);

	let response = next
		.round_trip(request)
		.await
		.map_err(|e| RefreshError::Request { uri: uri.clone(), source: Box::new(e) })?;
	let status = response.status;
	let body = response
		.bytes()
		.await
		.map_err(|e| RefreshError::Request { uri: uri.clone(), source: Box::new(e) })?;

	if status != StatusCode::OK {
		return Err(RefreshError::Status {
			uri,
			status: status.as_u16(),
			body: String::from_utf8_lossy(&body).into_owned(),
		});
	}

	let mut de = serde_json::Deserializer::from_slice(&body);
	let mut payload: Map<String, Value> = serde_path_to_error::deserialize(&mut de)
		.map_err(|source| RefreshError::Parse { uri: uri.clone(), source })?;
	let token = match payload.get("access_token").and_then(Value::as_str) {
		Some(token) if !token.is_empty() => token,
		_ => return Err(RefreshError::MissingAccessToken { uri }),
	};

	// Must fit in `Authorization: Bearer <token>`.
	if HeaderValue::from_str(token).is_err() {
		return Err(RefreshError::InvalidAccessToken { uri });
	}

	let token = Redact::new(token);

	payload.insert("access_token".into(), token.masked().into());
	logger.info(ctx, "oauth token refreshed", &[Field::new("response", payload)]);

	Ok(token)
}
