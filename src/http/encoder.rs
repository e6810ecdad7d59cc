//! Result encoding.
//!
//! # Responsibilities
//! - Turn one [`HandlerResult`] into status, headers and body
//! - Map error codes to HTTP statuses
//! - Stream files and generated images without buffering
//!
//! # Design Decisions
//! - Exhaustive match over the result enum; a new variant fails to compile here
//! - Any local failure (JSON encoding, opening a file) becomes the one
//!   generic 500 body, never a partial response
//! - The open file is owned by the body stream and closed with it
//! - A source shorter than its declared size is a local failure, so
//!   `Content-Length` never overstates the body

use std::io;

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use futures_util::stream::{self, Stream};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::http::response::{ByteSource, GeneratedImage, HandlerResult, MediaStream};

pub const GENERIC_ERROR_JSON: &str =
    r#"{"code":"M_UNKNOWN","message":"Unexpected error processing response"}"#;

const JSON_CONTENT_TYPE: &str = "application/json";
const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";
const CHUNK_SIZE: usize = 64 * 1024;

/// The fixed 500 response used when a response cannot be produced.
pub fn generic_error_response() -> Response {
    let mut response = Response::new(Body::from(GENERIC_ERROR_JSON));
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
    response
}

/// Encode a handler result into a response.
pub async fn encode_result(result: HandlerResult) -> Response {
    let kind = result.kind();
    match result {
        HandlerResult::Error(error) => {
            if let Some(detail) = &error.detail {
                tracing::warn!(code = %error.code, detail = %detail, "Handler returned an error");
            }
            json_response(error.code.status(), kind, serde_json::to_vec(&error.body()))
        }
        HandlerResult::Empty => json_response(
            StatusCode::OK,
            kind,
            serde_json::to_vec(&serde_json::Map::new()),
        ),
        HandlerResult::Raw(value) => json_response(StatusCode::OK, kind, value.to_json()),
        HandlerResult::BinaryStream(stream) => encode_media(stream, kind).await,
        HandlerResult::GeneratedImage(image) => encode_image(image, kind).await,
    }
}

fn json_response(status: StatusCode, kind: &'static str, encoded: serde_json::Result<Vec<u8>>) -> Response {
    let body = match encoded {
        Ok(body) => body,
        Err(e) => {
            tracing::error!(result = kind, error = %e, "Failed to encode response");
            return generic_error_response();
        }
    };

    tracing::info!(
        result = kind,
        status = status.as_u16(),
        body = %String::from_utf8_lossy(&body),
        "Replying with result"
    );

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
    response
}

async fn encode_media(stream: MediaStream, kind: &'static str) -> Response {
    let body = match open_source(stream.source, Some(stream.size_bytes)).await {
        Ok(body) => body,
        Err(e) => {
            tracing::error!(result = kind, error = %e, "Failed to open media for streaming");
            return generic_error_response();
        }
    };

    tracing::info!(
        result = kind,
        content_type = %stream.content_type,
        filename = %stream.filename,
        size_bytes = stream.size_bytes,
        "Replying with result"
    );

    let mut response = Response::new(body);
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, content_type_value(&stream.content_type));
    match HeaderValue::from_bytes(content_disposition(&stream.filename).as_bytes()) {
        Ok(disposition) => {
            headers.insert(header::CONTENT_DISPOSITION, disposition);
        }
        Err(_) => tracing::warn!(
            filename = ?stream.filename,
            "Filename cannot be sent as Content-Disposition, omitting header"
        ),
    }
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(stream.size_bytes));
    response
}

async fn encode_image(image: GeneratedImage, kind: &'static str) -> Response {
    let body = match open_source(image.source, None).await {
        Ok(body) => body,
        Err(e) => {
            tracing::error!(result = kind, error = %e, "Failed to open generated image");
            return generic_error_response();
        }
    };

    tracing::info!(result = kind, content_type = %image.content_type, "Replying with result");

    let mut response = Response::new(body);
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, content_type_value(&image.content_type));
    response
}

fn content_type_value(content_type: &str) -> HeaderValue {
    HeaderValue::from_str(content_type).unwrap_or_else(|_| HeaderValue::from_static(FALLBACK_CONTENT_TYPE))
}

fn content_disposition(filename: &str) -> String {
    let escaped = filename.replace('\\', "\\\\").replace('"', "\\\"");
    format!("inline; filename=\"{escaped}\"")
}

/// Open a byte source. With a `declared` size exactly that many bytes are
/// served, and a shorter source is an error.
async fn open_source(source: ByteSource, declared: Option<u64>) -> io::Result<Body> {
    match source {
        ByteSource::Memory(bytes) => {
            let len = served_length(bytes.len() as u64, declared)?;
            let end = usize::try_from(len).unwrap_or(usize::MAX).min(bytes.len());
            Ok(Body::from(bytes.slice(..end)))
        }
        ByteSource::File(path) => {
            let file = tokio::fs::File::open(&path).await?;
            let len = served_length(file.metadata().await?.len(), declared)?;
            Ok(Body::from_stream(read_chunks(file.take(len))))
        }
    }
}

fn served_length(available: u64, declared: Option<u64>) -> io::Result<u64> {
    match declared {
        Some(declared) if declared > available => Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("source holds {available} bytes but {declared} were declared"),
        )),
        Some(declared) => Ok(declared),
        None => Ok(available),
    }
}

/// Stream a reader in fixed-size chunks. Dropping the stream drops the reader.
fn read_chunks<R>(reader: R) -> impl Stream<Item = io::Result<Bytes>> + Send + 'static
where
    R: AsyncRead + Unpin + Send + 'static,
{
    stream::try_unfold(reader, |mut reader| async move {
        let mut buf = vec![0u8; CHUNK_SIZE];
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok::<_, io::Error>(None);
        }
        buf.truncate(n);
        Ok(Some((Bytes::from(buf), reader)))
    })
}
