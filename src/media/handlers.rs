//! Endpoint handlers.

use axum::http::header;
use serde::Serialize;

use crate::http::request::BodyError;
use crate::http::response::{ApiError, ByteSource, GeneratedImage, HandlerResult, MediaStream};
use crate::http::RequestContext;
use crate::media::StoredMedia;
use crate::security::is_server_ours;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";
const DEFAULT_UPLOAD_NAME: &str = "upload";
const DEFAULT_IDENTICON_SIZE: u32 = 96;
const MAX_IDENTICON_SIZE: u32 = 512;

#[derive(Debug, Serialize)]
struct UploadResponse {
    content_uri: String,
}

/// `POST /upload`
pub async fn upload(mut ctx: RequestContext) -> HandlerResult {
    let max_bytes = ctx.config.uploads.max_bytes;
    if ctx.content_length().is_some_and(|len| len > max_bytes) {
        return ApiError::media_too_large().into();
    }

    let limit = usize::try_from(max_bytes).unwrap_or(usize::MAX);
    let bytes = match ctx.read_body(limit).await {
        Ok(bytes) => bytes,
        Err(BodyError::TooLarge { .. }) => return ApiError::media_too_large().into(),
        Err(BodyError::Cancelled) => {
            tracing::info!("Client went away mid-upload, discarding body");
            return ApiError::bad_request("Upload cancelled").into();
        }
        Err(e) => {
            return ApiError::bad_request("Error reading upload")
                .with_detail(e.to_string())
                .into()
        }
    };

    let content_type = ctx
        .header(header::CONTENT_TYPE)
        .filter(|v| !v.is_empty())
        .unwrap_or(DEFAULT_CONTENT_TYPE);
    let filename = ctx
        .query_param("filename")
        .map(sanitize_filename)
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_UPLOAD_NAME.to_string());

    match ctx.store().put(&ctx.host, content_type, &filename, bytes).await {
        Ok(media) => {
            tracing::info!(
                media_id = %media.media_id,
                size_bytes = media.size_bytes,
                "Media uploaded"
            );
            HandlerResult::raw(UploadResponse {
                content_uri: format!("mxc://{}/{}", media.origin, media.media_id),
            })
        }
        Err(e) => ApiError::internal("Unexpected error uploading media")
            .with_detail(e.to_string())
            .into(),
    }
}

/// `GET /download/{server}/{media_id}[/{filename}]`
pub async fn download(ctx: RequestContext) -> Result<MediaStream, ApiError> {
    let media = find_media(&ctx).await?;
    let filename = ctx
        .capture("filename")
        .map(str::to_string)
        .unwrap_or_else(|| media.filename.clone());
    Ok(stream_of(media, filename))
}

/// `GET /thumbnail/{server}/{media_id}`
///
/// Serves the stored item unchanged once the requested size is acceptable.
pub async fn thumbnail(ctx: RequestContext) -> Result<MediaStream, ApiError> {
    let limits = &ctx.config.thumbnails;
    parse_dimension(&ctx, "width", limits.max_width)?;
    parse_dimension(&ctx, "height", limits.max_height)?;
    if let Some(method) = ctx.query_param("method") {
        if method != "crop" && method != "scale" {
            return Err(ApiError::bad_request("method must be crop or scale"));
        }
    }

    let media = find_media(&ctx).await?;
    let filename = media.filename.clone();
    Ok(stream_of(media, filename))
}

/// `GET /preview_url`
pub async fn preview_url(ctx: RequestContext) -> Result<HandlerResult, ApiError> {
    let url = ctx
        .query_param("url")
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::bad_request("No url provided"))?;

    if !ctx.config.url_previews.enabled {
        return Err(ApiError::not_found("URL previews are disabled"));
    }

    Err(ApiError::internal("URL previews are not supported").with_detail(format!("url={url}")))
}

/// `GET /identicon/{seed}`, the seed may be empty.
pub async fn identicon(ctx: RequestContext) -> Result<GeneratedImage, ApiError> {
    if !ctx.config.identicons.enabled {
        return Err(ApiError::not_found("Identicons are disabled"));
    }
    let generator = ctx
        .services
        .identicons
        .as_ref()
        .ok_or_else(|| ApiError::not_found("Identicons are not available"))?;

    let width = parse_dimension(&ctx, "width", MAX_IDENTICON_SIZE)?.unwrap_or(DEFAULT_IDENTICON_SIZE);
    let height = parse_dimension(&ctx, "height", MAX_IDENTICON_SIZE)?.unwrap_or(DEFAULT_IDENTICON_SIZE);
    let seed = ctx.capture("seed").unwrap_or_default();

    Ok(GeneratedImage::png(generator.generate(seed, width, height)))
}

async fn find_media(ctx: &RequestContext) -> Result<StoredMedia, ApiError> {
    let (Some(server), Some(media_id)) = (ctx.capture("server"), ctx.capture("media_id")) else {
        return Err(ApiError::bad_request("Missing server or media id"));
    };

    // Remote media is never fetched; only items we own can exist here.
    if !is_server_ours(server, &ctx.config) {
        return Err(ApiError::not_found("Media not found"));
    }

    match ctx.store().get(server, media_id).await {
        Ok(Some(media)) => Ok(media),
        Ok(None) => Err(ApiError::not_found("Media not found")),
        Err(e) => Err(ApiError::internal("Unexpected error looking up media").with_detail(e.to_string())),
    }
}

fn stream_of(media: StoredMedia, filename: String) -> MediaStream {
    MediaStream {
        content_type: media.content_type,
        filename,
        size_bytes: media.size_bytes,
        source: ByteSource::File(media.location),
    }
}

/// Control characters can never appear in a `Content-Disposition` header.
fn sanitize_filename(raw: &str) -> String {
    raw.chars().filter(|c| !c.is_control()).collect()
}

/// Optional positive dimension no larger than `max`.
fn parse_dimension(ctx: &RequestContext, name: &str, max: u32) -> Result<Option<u32>, ApiError> {
    let Some(raw) = ctx.query_param(name) else {
        return Ok(None);
    };
    match raw.parse::<u32>() {
        Ok(value) if value > 0 && value <= max => Ok(Some(value)),
        _ => Err(ApiError::bad_request(format!("{name} must be between 1 and {max}"))),
    }
}
