//! The versioned media API surface.

use axum::http::Method;

use crate::http::handler::{BoxedHandler, Handler};
use crate::media::handlers;
use crate::routing::{RouteError, RouteTable};

/// The handler set replicated under every protocol version.
#[derive(Clone)]
pub struct MediaHandlers {
    pub upload: BoxedHandler,
    pub download: BoxedHandler,
    pub thumbnail: BoxedHandler,
    pub preview_url: BoxedHandler,
    pub identicon: BoxedHandler,
}

impl Default for MediaHandlers {
    fn default() -> Self {
        Self {
            upload: handlers::upload.into_boxed_handler(),
            download: handlers::download.into_boxed_handler(),
            thumbnail: handlers::thumbnail.into_boxed_handler(),
            preview_url: handlers::preview_url.into_boxed_handler(),
            identicon: handlers::identicon.into_boxed_handler(),
        }
    }
}

/// Build the route table for `prefix/<version>/...` for each version.
pub fn media_routes<S: AsRef<str>>(
    prefix: &str,
    versions: &[S],
    handlers: &MediaHandlers,
) -> Result<RouteTable, RouteError> {
    let mut builder = RouteTable::builder();

    for version in versions {
        let base = format!("{}/{}", prefix, version.as_ref());
        builder = builder
            .route_boxed(Method::POST, &format!("{base}/upload"), handlers.upload.clone())?
            .route_boxed(
                Method::GET,
                &format!("{base}/download/{{server:authority}}/{{media_id:media_id}}"),
                handlers.download.clone(),
            )?
            .route_boxed(
                Method::GET,
                &format!("{base}/download/{{server:authority}}/{{media_id:media_id}}/{{filename:filename}}"),
                handlers.download.clone(),
            )?
            .route_boxed(
                Method::GET,
                &format!("{base}/thumbnail/{{server:authority}}/{{media_id:media_id}}"),
                handlers.thumbnail.clone(),
            )?
            .route_boxed(Method::GET, &format!("{base}/preview_url"), handlers.preview_url.clone())?
            .route_boxed(
                Method::GET,
                &format!("{base}/identicon/{{seed:*}}"),
                handlers.identicon.clone(),
            )?;
    }

    Ok(builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::Lookup;

    #[test]
    fn test_every_version_gets_every_route() {
        let table = media_routes("/_matrix/media", &["r0", "v1"], &MediaHandlers::default()).unwrap();
        assert_eq!(table.len(), 12);

        for version in ["r0", "v1"] {
            let paths = [
                (Method::POST, format!("/_matrix/media/{version}/upload")),
                (Method::GET, format!("/_matrix/media/{version}/download/example.org/abc")),
                (Method::GET, format!("/_matrix/media/{version}/download/example.org/abc/f.png")),
                (Method::GET, format!("/_matrix/media/{version}/thumbnail/example.org/abc")),
                (Method::GET, format!("/_matrix/media/{version}/preview_url")),
                (Method::GET, format!("/_matrix/media/{version}/identicon/seed")),
                (Method::GET, format!("/_matrix/media/{version}/identicon/")),
            ];
            for (method, path) in paths {
                assert!(
                    matches!(table.lookup(&method, &path), Lookup::Found { .. }),
                    "{method} {path}"
                );
            }
        }

        assert!(matches!(
            table.lookup(&Method::GET, "/_matrix/media/v2/upload"),
            Lookup::NotFound
        ));
    }

    #[test]
    fn test_duplicate_version_fails() {
        let result = media_routes("/_matrix/media", &["r0", "r0"], &MediaHandlers::default());
        assert!(matches!(result, Err(RouteError::Duplicate { .. })));
    }
}
