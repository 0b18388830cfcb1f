//! Request/response JSON codec and media-type resolution
//!
//! Only `application/json` is served. The response media type is resolved in
//! order: a literal `.json` path suffix forces JSON regardless of `Accept`;
//! otherwise the `Accept` header decides, and anything that does not admit
//! JSON is rejected with a 400.
//!
//! Request bodies are decoded once per request into the dispatch context, so
//! repeated access never re-parses. An empty body decodes to an empty object;
//! raw-mode routes bypass JSON parsing entirely.

use axum::{
    body::Bytes,
    extract::Request,
    http::{header, HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::error::GatewayError;

/// The only media type the gateway serves
pub const APPLICATION_JSON: &str = "application/json";

/// Request extension marking a request whose path carried a `.json` suffix
#[derive(Debug, Clone, Copy)]
pub struct JsonSuffix;

/// Pre-routing URI rewrite implementing the `.json` route alias
///
/// Strips a trailing `.json` from the path and marks the request with
/// [`JsonSuffix`], so both URL forms resolve to the same registered route and
/// the suffixed form forces a JSON response. Applied around the router (via
/// `MapRequestLayer`) because it must run before route matching.
pub fn rewrite_json_suffix(mut req: Request) -> Request {
    let path = req.uri().path();
    let Some(stripped) = path.strip_suffix(".json") else {
        return req;
    };
    if stripped.is_empty() {
        return req;
    }

    let path_and_query = match req.uri().query() {
        Some(query) => format!("{stripped}?{query}"),
        None => stripped.to_string(),
    };

    let mut parts = req.uri().clone().into_parts();
    match path_and_query.parse() {
        Ok(pq) => parts.path_and_query = Some(pq),
        Err(_) => return req,
    }
    if let Ok(uri) = Uri::from_parts(parts) {
        *req.uri_mut() = uri;
        req.extensions_mut().insert(JsonSuffix);
    }
    req
}

/// Resolve the response media type for a request
///
/// Returns the (only) supported type, or an `UnsupportedMediaType` failure
/// when the client's `Accept` header rules JSON out.
pub fn resolve_media_type(
    headers: &HeaderMap,
    force_json: bool,
) -> Result<&'static str, GatewayError> {
    if force_json {
        return Ok(APPLICATION_JSON);
    }
    let Some(accept) = headers.get(header::ACCEPT).and_then(|v| v.to_str().ok()) else {
        return Ok(APPLICATION_JSON);
    };

    for candidate in accept.split(',') {
        let media = candidate.split(';').next().unwrap_or("").trim();
        if media.is_empty()
            || media == "*/*"
            || media == "application/*"
            || media.eq_ignore_ascii_case(APPLICATION_JSON)
        {
            return Ok(APPLICATION_JSON);
        }
    }

    Err(GatewayError::UnsupportedMediaType(accept.to_string()))
}

/// Decode a request body into a JSON object
///
/// An empty body is an empty object, not an error; a non-object document is a
/// malformed body.
pub fn decode_body(bytes: &Bytes) -> Result<Map<String, Value>, GatewayError> {
    if bytes.is_empty() {
        return Ok(Map::new());
    }

    let value: Value = serde_json::from_slice(bytes)
        .map_err(|err| GatewayError::MalformedBody(err.to_string()))?;

    match value {
        Value::Object(map) => Ok(map),
        other => Err(GatewayError::MalformedBody(format!(
            "expected a JSON object, got {}",
            json_type_name(&other)
        ))),
    }
}

/// Parse a raw query string into a flat map
pub fn parse_query(raw: Option<&str>) -> HashMap<String, String> {
    let Some(raw) = raw else {
        return HashMap::new();
    };
    url::form_urlencoded::parse(raw.as_bytes())
        .into_owned()
        .collect()
}

/// Encode a handler result into the HTTP response
///
/// A mapping payload is shallow-merged with any extra named fields from the
/// handler; extra fields on a non-mapping payload are an encoder-usage error
/// (an internal 500, not a client error). A `None` payload produces an empty
/// body, as used by 204 deletes.
pub fn encode(
    payload: Option<Value>,
    extra: Vec<(String, Value)>,
    status: StatusCode,
) -> Result<Response, GatewayError> {
    let Some(payload) = payload else {
        if !extra.is_empty() {
            return Err(GatewayError::Encoder(
                "extra fields supplied for an empty payload".into(),
            ));
        }
        return Ok(status.into_response());
    };

    let body = match payload {
        Value::Object(mut map) => {
            for (key, value) in extra {
                map.insert(key, value);
            }
            Value::Object(map)
        }
        other if extra.is_empty() => other,
        other => {
            return Err(GatewayError::Encoder(format!(
                "extra fields supplied for a non-mapping payload of type {}",
                json_type_name(&other)
            )));
        }
    };

    Ok((status, Json(body)).into_response())
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::HeaderValue;
    use serde_json::json;

    fn accept(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_media_type_defaults_to_json() {
        assert_eq!(
            resolve_media_type(&HeaderMap::new(), false).unwrap(),
            APPLICATION_JSON
        );
        assert_eq!(resolve_media_type(&accept("*/*"), false).unwrap(), APPLICATION_JSON);
        assert_eq!(
            resolve_media_type(&accept("application/json; q=0.9"), false).unwrap(),
            APPLICATION_JSON
        );
    }

    #[test]
    fn test_media_type_rejects_non_json() {
        let err = resolve_media_type(&accept("application/xml"), false).unwrap_err();
        assert!(matches!(err, GatewayError::UnsupportedMediaType(_)));
    }

    #[test]
    fn test_json_suffix_overrides_accept() {
        assert_eq!(
            resolve_media_type(&accept("application/xml"), true).unwrap(),
            APPLICATION_JSON
        );
    }

    #[test]
    fn test_rewrite_json_suffix_strips_and_marks() {
        let req = Request::builder()
            .uri("/leases/abc.json?detail=true")
            .body(Body::empty())
            .unwrap();
        let req = rewrite_json_suffix(req);
        assert_eq!(req.uri().path(), "/leases/abc");
        assert_eq!(req.uri().query(), Some("detail=true"));
        assert!(req.extensions().get::<JsonSuffix>().is_some());
    }

    #[test]
    fn test_rewrite_leaves_plain_paths_alone() {
        let req = Request::builder()
            .uri("/leases/abc")
            .body(Body::empty())
            .unwrap();
        let req = rewrite_json_suffix(req);
        assert_eq!(req.uri().path(), "/leases/abc");
        assert!(req.extensions().get::<JsonSuffix>().is_none());
    }

    #[test]
    fn test_decode_empty_body_is_empty_object() {
        let map = decode_body(&Bytes::new()).unwrap();
        assert!(map.is_empty());
    }

    #[test]
    fn test_decode_rejects_non_objects() {
        let err = decode_body(&Bytes::from_static(b"[1, 2]")).unwrap_err();
        assert!(matches!(err, GatewayError::MalformedBody(_)));
        let err = decode_body(&Bytes::from_static(b"not json")).unwrap_err();
        assert!(matches!(err, GatewayError::MalformedBody(_)));
    }

    #[test]
    fn test_decode_round_trip() {
        let original = json!({"lease": {"name": "res-1", "events": [1, 2, 3]}});
        let bytes = Bytes::from(serde_json::to_vec(&original).unwrap());
        let decoded = decode_body(&bytes).unwrap();
        assert_eq!(Value::Object(decoded), original);
    }

    #[test]
    fn test_parse_query() {
        let query = parse_query(Some("status=active&name=res%201"));
        assert_eq!(query.get("status").map(String::as_str), Some("active"));
        assert_eq!(query.get("name").map(String::as_str), Some("res 1"));
        assert!(parse_query(None).is_empty());
    }

    #[test]
    fn test_encode_merges_extra_fields_into_mapping() {
        let response = encode(
            Some(json!({"lease": {"id": "abc"}})),
            vec![("warnings".to_string(), json!([]))],
            StatusCode::OK,
        )
        .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_encode_extra_fields_on_scalar_is_encoder_error() {
        let err = encode(
            Some(json!("bare string")),
            vec![("extra".to_string(), json!(1))],
            StatusCode::OK,
        )
        .unwrap_err();
        assert!(matches!(err, GatewayError::Encoder(_)));
    }

    #[test]
    fn test_encode_empty_payload() {
        let response = encode(None, Vec::new(), StatusCode::NO_CONTENT).unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }
}
