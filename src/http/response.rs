//! Handler results.
//!
//! A handler never touches the response. It returns one [`HandlerResult`]
//! and the encoder alone turns it into status, headers and body.

use std::borrow::Cow;
use std::fmt;
use std::path::PathBuf;

use axum::body::Bytes;
use axum::http::StatusCode;
use serde::Serialize;

/// Internal error codes understood by the encoder.
///
/// `Other` carries any code a handler invents; those map to 500.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCode {
    UnknownToken,
    NotFound,
    MediaTooLarge,
    BadRequest,
    MethodNotAllowed,
    Unknown,
    Other(Cow<'static, str>),
}

impl ErrorCode {
    pub fn as_str(&self) -> &str {
        match self {
            ErrorCode::UnknownToken => "M_UNKNOWN_TOKEN",
            ErrorCode::NotFound => "M_NOT_FOUND",
            ErrorCode::MediaTooLarge => "M_MEDIA_TOO_LARGE",
            ErrorCode::BadRequest => "M_BAD_REQUEST",
            ErrorCode::MethodNotAllowed => "M_METHOD_NOT_ALLOWED",
            ErrorCode::Unknown => "M_UNKNOWN",
            ErrorCode::Other(code) => code,
        }
    }

    /// HTTP status for this code. Anything not in the table is a 500.
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorCode::UnknownToken => StatusCode::FORBIDDEN,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::MediaTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ErrorCode::BadRequest => StatusCode::BAD_REQUEST,
            ErrorCode::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ErrorCode::Unknown | ErrorCode::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A deliberate protocol error returned by a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    /// Extra context for the logs. Never sent to the client.
    pub detail: Option<String>,
}

/// Wire shape of every JSON error body.
#[derive(Debug, Serialize)]
pub struct ErrorBody<'a> {
    pub code: &'a str,
    pub message: &'a str,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn auth_failed() -> Self {
        Self::new(ErrorCode::UnknownToken, "Authentication Failed")
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn method_not_allowed() -> Self {
        Self::new(ErrorCode::MethodNotAllowed, "Method not allowed")
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    pub fn media_too_large() -> Self {
        Self::new(ErrorCode::MediaTooLarge, "Media too large")
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unknown, message)
    }

    pub fn body(&self) -> ErrorBody<'_> {
        ErrorBody {
            code: self.code.as_str(),
            message: &self.message,
        }
    }
}

/// Where the bytes of a streamed result come from.
#[derive(Debug, Clone)]
pub enum ByteSource {
    /// A file opened by the encoder when the response is written.
    File(PathBuf),
    /// Bytes already in memory.
    Memory(Bytes),
}

/// A stored media item to be streamed verbatim.
#[derive(Debug, Clone)]
pub struct MediaStream {
    pub content_type: String,
    pub filename: String,
    pub size_bytes: u64,
    pub source: ByteSource,
}

/// An image produced on the fly (identicons).
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub content_type: String,
    pub source: ByteSource,
}

impl GeneratedImage {
    pub fn png(bytes: impl Into<Bytes>) -> Self {
        Self {
            content_type: "image/png".to_string(),
            source: ByteSource::Memory(bytes.into()),
        }
    }
}

/// Any JSON-serializable value a handler wants to send as-is.
pub trait RawJson: Send {
    fn to_json(&self) -> serde_json::Result<Vec<u8>>;
}

impl<T: Serialize + Send> RawJson for T {
    fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

/// The outcome of one request.
pub enum HandlerResult {
    Empty,
    Error(ApiError),
    BinaryStream(MediaStream),
    GeneratedImage(GeneratedImage),
    Raw(Box<dyn RawJson>),
}

impl HandlerResult {
    pub fn raw<T: Serialize + Send + 'static>(value: T) -> Self {
        HandlerResult::Raw(Box::new(value))
    }

    /// Name used when logging which variant was sent.
    pub fn kind(&self) -> &'static str {
        match self {
            HandlerResult::Empty => "empty",
            HandlerResult::Error(_) => "error",
            HandlerResult::BinaryStream(_) => "binary_stream",
            HandlerResult::GeneratedImage(_) => "generated_image",
            HandlerResult::Raw(_) => "raw",
        }
    }
}

impl fmt::Debug for HandlerResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerResult::Empty => f.write_str("Empty"),
            HandlerResult::Error(e) => f.debug_tuple("Error").field(e).finish(),
            HandlerResult::BinaryStream(s) => f.debug_tuple("BinaryStream").field(s).finish(),
            HandlerResult::GeneratedImage(i) => f.debug_tuple("GeneratedImage").field(i).finish(),
            HandlerResult::Raw(_) => f.write_str("Raw(..)"),
        }
    }
}

impl From<ApiError> for HandlerResult {
    fn from(error: ApiError) -> Self {
        HandlerResult::Error(error)
    }
}

impl From<MediaStream> for HandlerResult {
    fn from(stream: MediaStream) -> Self {
        HandlerResult::BinaryStream(stream)
    }
}

impl From<GeneratedImage> for HandlerResult {
    fn from(image: GeneratedImage) -> Self {
        HandlerResult::GeneratedImage(image)
    }
}

impl From<()> for HandlerResult {
    fn from(_: ()) -> Self {
        HandlerResult::Empty
    }
}

impl From<Option<HandlerResult>> for HandlerResult {
    fn from(result: Option<HandlerResult>) -> Self {
        result.unwrap_or(HandlerResult::Empty)
    }
}

impl<T: Into<HandlerResult>> From<Result<T, ApiError>> for HandlerResult {
    fn from(result: Result<T, ApiError>) -> Self {
        match result {
            Ok(value) => value.into(),
            Err(error) => HandlerResult::Error(error),
        }
    }
}
