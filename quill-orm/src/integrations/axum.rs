use axum::Json;
use axum::body::Bytes;
use axum::extract::{
    FromRef, FromRequest, FromRequestParts, Multipart, Query, RawPathParams, Request,
};
use axum::http::header::CONTENT_TYPE;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Form;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value as JsonValue};

use quill_core::{Gateway, OrmError};

/// Axum state wrapper for Quill gateways.
#[derive(Debug)]
pub struct QuillState<DB: sqlx::Database> {
    /// The database gateway.
    pub db: Gateway<DB>,
}

impl<DB: sqlx::Database> Clone for QuillState<DB> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
        }
    }
}

impl<DB: sqlx::Database> QuillState<DB> {
    /// Creates a new `QuillState` with the given gateway.
    pub fn new(db: Gateway<DB>) -> Self {
        Self { db }
    }
}

impl<DB: sqlx::Database> FromRef<QuillState<DB>> for Gateway<DB> {
    fn from_ref(state: &QuillState<DB>) -> Self {
        state.db.clone()
    }
}

/// A JSON API error: `{"error": ..., "data": ..., "message": ...}`.
///
/// `error` is a category such as `value:invalid`, `data` usually names the offending
/// field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiError {
    pub error: String,
    pub data: String,
    pub message: String,
    #[serde(skip)]
    status: StatusCode,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        error: impl Into<String>,
        data: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: error.into(),
            data: data.into(),
            message: message.into(),
            status,
        }
    }

    /// An input value is missing or malformed.
    pub fn value_invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "value:invalid", field, message)
    }

    /// The requested resource does not exist.
    pub fn not_found(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "value:notfound", field, message)
    }

    pub fn permission(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "permission:forbidden", "permission", message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}): {}", self.error, self.data, self.message)
    }
}

impl std::error::Error for ApiError {}

impl From<OrmError> for ApiError {
    fn from(err: OrmError) -> Self {
        tracing::error!("database error: {}", err);
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal:error",
            "database",
            "internal server error",
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

/// Rejection of [`Args`]: a `400 Bad Request` with a plain-text reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgsRejection {
    message: String,
}

impl ArgsRejection {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    fn invalid(err: impl std::fmt::Display) -> Self {
        Self::new(format!("Invalid argument: {}", err))
    }

    fn from_binding(err: serde_json::Error) -> Self {
        let detail = err.to_string();
        match detail
            .strip_prefix("missing field `")
            .and_then(|rest| rest.split('`').next())
        {
            Some(name) => Self::new(format!("Missing argument: {}", name)),
            None => Self::invalid(detail),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for ArgsRejection {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, self.message).into_response()
    }
}

/// Handler arguments collected from the request.
///
/// `T` declares what the handler takes: non-`Option` fields are required, `Option`
/// fields are optional, keys it does not declare are dropped (a `serde_json::Map`
/// accepts all of them). The values come from
///
/// - a `POST` body: a JSON object, or url-encoded / multipart form fields as text,
/// - the query string of a `GET`, first value per key,
/// - the path parameters, which always win over both.
#[derive(Debug, Clone, Copy, Default)]
pub struct Args<T>(pub T);

impl<T> std::ops::Deref for Args<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

fn insert_first(kw: &mut Map<String, JsonValue>, pairs: Vec<(String, String)>) {
    for (key, value) in pairs {
        kw.entry(key).or_insert(JsonValue::String(value));
    }
}

impl<S, T> FromRequest<S> for Args<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ArgsRejection;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let (mut parts, body) = req.into_parts();
        let path: Vec<(String, String)> =
            match RawPathParams::from_request_parts(&mut parts, state).await {
                Ok(params) => params
                    .iter()
                    .map(|(name, value)| (name.to_owned(), value.to_owned()))
                    .collect(),
                Err(_) => Vec::new(),
            };

        let mut kw = Map::new();
        if parts.method == Method::POST {
            let content_type = parts
                .headers
                .get(CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .map(|value| {
                    value
                        .split(';')
                        .next()
                        .unwrap_or_default()
                        .trim()
                        .to_ascii_lowercase()
                })
                .filter(|value| !value.is_empty())
                .ok_or_else(|| ArgsRejection::new("Missing Content-Type"))?;
            let req = Request::from_parts(parts, body);

            match content_type.as_str() {
                "application/json" => {
                    let bytes = Bytes::from_request(req, state)
                        .await
                        .map_err(ArgsRejection::invalid)?;
                    match serde_json::from_slice::<JsonValue>(&bytes) {
                        Ok(JsonValue::Object(map)) => kw = map,
                        Ok(_) => return Err(ArgsRejection::new("JSON body must be object.")),
                        Err(err) => return Err(ArgsRejection::invalid(err)),
                    }
                }
                "application/x-www-form-urlencoded" => {
                    let Form(pairs) = Form::<Vec<(String, String)>>::from_request(req, state)
                        .await
                        .map_err(ArgsRejection::invalid)?;
                    insert_first(&mut kw, pairs);
                }
                "multipart/form-data" => {
                    let mut multipart = Multipart::from_request(req, state)
                        .await
                        .map_err(ArgsRejection::invalid)?;
                    while let Some(field) = multipart
                        .next_field()
                        .await
                        .map_err(ArgsRejection::invalid)?
                    {
                        let Some(name) = field.name().map(str::to_owned) else {
                            continue;
                        };
                        let text = field.text().await.map_err(ArgsRejection::invalid)?;
                        kw.entry(name).or_insert(JsonValue::String(text));
                    }
                }
                other => {
                    return Err(ArgsRejection::new(format!(
                        "Unsupported Content-Type: {}",
                        other
                    )));
                }
            }
        } else if parts.method == Method::GET && parts.uri.query().is_some() {
            let Query(pairs) = Query::<Vec<(String, String)>>::try_from_uri(&parts.uri)
                .map_err(ArgsRejection::invalid)?;
            insert_first(&mut kw, pairs);
        }

        for (name, value) in path {
            if kw.contains_key(&name) {
                tracing::warn!(
                    "duplicate arg name in named arg and kw args: {}",
                    name
                );
            }
            kw.insert(name, JsonValue::String(value));
        }
        tracing::debug!("call with args: {:?}", kw);

        serde_json::from_value(JsonValue::Object(kw))
            .map(Args)
            .map_err(ArgsRejection::from_binding)
    }
}
