use rocket_okapi::okapi::Map;
use serde::{Deserialize, Serialize};
use rocket::http::{Header, Status};
use rocket::response::{self, Responder, Response};
use rocket::Request;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use rocket_okapi::okapi::schemars::JsonSchema;
use rocket_okapi::response::OpenApiResponderInner;
use rocket_okapi::r#gen::OpenApiGenerator;
use rocket_okapi::okapi::openapi3::{MediaType, Response as OpenApiResponse, Responses};

use crate::error::MarketError;

/// -----------------------------
/// Generic API response
/// -----------------------------
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        ApiResponse {
            success: true,
            message: None,
            data: Some(data),
        }
    }

    pub fn success_with_message(message: String, data: T) -> Self {
        ApiResponse {
            success: true,
            message: Some(message),
            data: Some(data),
        }
    }

    pub fn error(message: String) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            message: Some(message),
            data: None,
        }
    }
}

/// -----------------------------
/// API Error
/// -----------------------------
#[derive(Debug, Serialize, JsonSchema)]
pub struct ApiError {
    #[schemars(skip)]
    #[serde(skip_serializing)]
    pub status: Status,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError {
            status: Status::BadRequest,
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError {
            status: Status::Unauthorized,
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError {
            status: Status::Forbidden,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError {
            status: Status::NotFound,
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError {
            status: Status::Conflict,
            message: message.into(),
        }
    }

    pub fn too_many_requests(message: impl Into<String>) -> Self {
        ApiError {
            status: Status::TooManyRequests,
            message: message.into(),
        }
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        ApiError {
            status: Status::InternalServerError,
            message: message.into(),
        }
    }
}

impl From<MarketError> for ApiError {
    fn from(err: MarketError) -> Self {
        match err {
            MarketError::Validation(message) => ApiError::bad_request(message),
            MarketError::Unauthorized(message) => ApiError::unauthorized(message),
            MarketError::Forbidden(message) => ApiError::forbidden(message),
            MarketError::NotFound(message) => ApiError::not_found(message),
            MarketError::Conflict(message) => ApiError::conflict(message),
            err @ (MarketError::Storage(_) | MarketError::Internal(_)) => {
                error!("Request failed: {}", err);
                ApiError::internal_error("Internal server error")
            }
        }
    }
}

/// -----------------------------
/// Repeated-error throttle
/// -----------------------------

/// Who an error response is charged to. The auth guard records the token
/// subject here; anonymous requests fall back to the client address.
#[derive(Debug, Clone, Default)]
pub struct RequestSubject(pub Option<String>);

impl RequestSubject {
    pub fn throttle_key(req: &Request<'_>) -> String {
        match req.local_cache(RequestSubject::default).0 {
            Some(ref subject) => format!("user:{}", subject),
            None => match req.client_ip() {
                Some(ip) => format!("ip:{}", ip),
                None => "ip:unknown".to_string(),
            },
        }
    }
}

/// Remembers the last time each caller received a given error. The same
/// error for the same caller inside the window is answered with a 429.
pub struct ErrorThrottle {
    window: Duration,
    seen: Mutex<HashMap<(String, u16, String), Instant>>,
}

impl ErrorThrottle {
    pub fn new(window: Duration) -> Self {
        ErrorThrottle {
            window,
            seen: Mutex::new(HashMap::new()),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Records the error and reports whether it repeats one sent to the same
    /// caller within the window.
    pub fn is_repeat(&self, caller: &str, status: Status, message: &str, now: Instant) -> bool {
        let mut seen = self.seen.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let window = self.window;
        seen.retain(|_, at| now.duration_since(*at) < window);

        let key = (caller.to_string(), status.code, message.to_string());
        if seen.contains_key(&key) {
            return true;
        }
        seen.insert(key, now);
        false
    }
}

/// -----------------------------
/// Rocket Responder
/// -----------------------------
fn json_body(message: String) -> String {
    serde_json::to_string(&ApiResponse::<()>::error(message))
        .unwrap_or_else(|_| r#"{"success":false,"message":"Internal error"}"#.to_string())
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        if let Some(throttle) = req.rocket().state::<ErrorThrottle>() {
            let caller = RequestSubject::throttle_key(req);

            if throttle.is_repeat(&caller, self.status, &self.message, Instant::now()) {
                warn!("Throttled repeated {} for {}: {}", self.status.code, caller, self.message);
                let throttled = ApiError::too_many_requests("Too many repeated requests");
                let body = json_body(throttled.message);
                let retry_after = throttle.window().as_secs_f64().ceil().max(1.0) as u64;

                return Response::build()
                    .status(throttled.status)
                    .header(rocket::http::ContentType::JSON)
                    .header(Header::new("Retry-After", retry_after.to_string()))
                    .sized_body(body.len(), Cursor::new(body))
                    .ok();
            }
        }

        let body = json_body(self.message);

        Response::build()
            .status(self.status)
            .header(rocket::http::ContentType::JSON)
            .sized_body(body.len(), Cursor::new(body))
            .ok()
    }
}

/// -----------------------------
/// OpenAPI integration
/// -----------------------------
impl OpenApiResponderInner for ApiError {
    fn responses(generator: &mut OpenApiGenerator) -> rocket_okapi::Result<Responses> {
        let schema = generator.json_schema::<ApiResponse<()>>();

        let mut content = Map::new();
        content.insert(
            "application/json".to_owned(),
            MediaType {
                schema: Some(schema),
                ..Default::default()
            },
        );

        let mut responses = Responses::default();

        for (code, description) in [
            ("400", "Bad request"),
            ("401", "Unauthorized"),
            ("403", "Forbidden"),
            ("404", "Not found"),
            ("409", "Conflict"),
            ("429", "Too many requests"),
            ("500", "Internal server error"),
        ] {
            responses.responses.insert(
                code.to_string(),
                rocket_okapi::okapi::openapi3::RefOr::Object(OpenApiResponse {
                    description: description.to_string(),
                    content: content.clone(),
                    ..Default::default()
                }),
            );
        }

        Ok(responses)
    }
}
