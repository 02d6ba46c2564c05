//! Artifact to HTTP response translation.

use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use mediaserver_core::cache::url_checksum;
use mediaserver_core::{Artifact, Error, SiteMetadata, Thumbnail};
use url::Url;

/// Raw thumbnail bytes with content headers.
///
/// `canonical_url` adds a `Content-Disposition` filename derived from its
/// checksum.
pub fn thumbnail_response(thumbnail: Thumbnail, canonical_url: Option<&str>) -> Response {
    let extension = thumbnail.mime.strip_prefix("image/").unwrap_or("jpeg").to_string();
    let mut response = (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, thumbnail.mime.clone()),
            (header::CONTENT_LENGTH, thumbnail.bytes.len().to_string()),
        ],
        thumbnail.bytes,
    )
        .into_response();

    if let Some(url) = canonical_url
        && let Ok(value) = HeaderValue::from_str(&format!("filename={}.{extension}", url_checksum(url)))
    {
        response.headers_mut().insert(header::CONTENT_DISPOSITION, value);
    }
    response
}

/// Serve the artifact as an image.
pub fn image_response(artifact: Artifact) -> Result<Response, Error> {
    match artifact {
        Artifact::Page { site, thumbnail } => Ok(thumbnail_response(thumbnail, Some(&site.canonical_url))),
        Artifact::Image { thumbnail } => Ok(thumbnail_response(thumbnail, None)),
        Artifact::Unavailable { .. } => Err(Error::NoThumbnail("no thumbnail available".into())),
    }
}

/// Serve the artifact's metadata as pretty-printed JSON, with image URLs
/// routed back through this service at `host`.
pub fn metadata_response(artifact: Artifact, target: &str, host: &str) -> Result<Response, Error> {
    let site = match artifact {
        Artifact::Page { mut site, .. } | Artifact::Unavailable { site: Some(mut site), .. } => {
            for image in &mut site.image_candidates {
                *image = route_back(image, host);
            }
            site
        }
        Artifact::Image { .. } => SiteMetadata {
            kind: "image".into(),
            canonical_url: target.to_string(),
            image_candidates: vec![format!("http://{host}/{target}")],
            ..Default::default()
        },
        Artifact::Unavailable { site: None, reason } => return Err(Error::NoThumbnail(reason)),
    };

    let body = serde_json::to_string_pretty(&site).map_err(|e| Error::EncodeFailed(format!("metadata json: {e}")))?;
    Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
}

/// `http://<host>/<image-host><image-path-and-query>`; unparseable URLs
/// are returned unchanged.
pub fn route_back(image: &str, host: &str) -> String {
    let Ok(url) = Url::parse(image) else {
        return image.to_string();
    };
    let Some(image_host) = url.host_str() else {
        return image.to_string();
    };

    let mut routed = format!("http://{host}/{image_host}");
    if let Some(port) = url.port() {
        routed.push_str(&format!(":{port}"));
    }
    routed.push_str(url.path());
    if let Some(query) = url.query() {
        routed.push('?');
        routed.push_str(query);
    }
    routed
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::to_bytes;
    use mediaserver_core::{Bounds, THUMBNAIL_MIME};

    fn thumbnail() -> Thumbnail {
        Thumbnail { bytes: vec![0xff, 0xd8, 0xff, 0xd9], mime: THUMBNAIL_MIME.into(), bounds: Bounds { width: 2, height: 2 } }
    }

    fn site() -> SiteMetadata {
        SiteMetadata {
            kind: "article".into(),
            canonical_url: "http://site.test/page".into(),
            title: "Example".into(),
            description: String::new(),
            image_candidates: vec!["https://cdn.test/img.png?w=10".into()],
        }
    }

    #[test]
    fn test_route_back() {
        assert_eq!(route_back("https://cdn.test/a/b.png?x=1", "media.local"), "http://media.local/cdn.test/a/b.png?x=1");
        assert_eq!(route_back("http://127.0.0.1:9000/i.png", "m:8080"), "http://m:8080/127.0.0.1:9000/i.png");
        assert_eq!(route_back("/relative.png", "m"), "/relative.png");
    }

    #[tokio::test]
    async fn test_page_thumbnail_headers() {
        let response = image_response(Artifact::Page { site: site(), thumbnail: thumbnail() }).unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_TYPE], "image/jpeg");
        assert_eq!(headers[header::CONTENT_LENGTH], "4");
        let expected = format!("filename={}.jpeg", url_checksum("http://site.test/page"));
        assert_eq!(headers[header::CONTENT_DISPOSITION], expected.as_str());

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], &[0xff, 0xd8, 0xff, 0xd9]);
    }

    #[test]
    fn test_image_thumbnail_has_no_disposition() {
        let response = image_response(Artifact::Image { thumbnail: thumbnail() }).unwrap();
        assert!(response.headers().get(header::CONTENT_DISPOSITION).is_none());
    }

    #[test]
    fn test_unavailable_is_no_thumbnail() {
        let result = image_response(Artifact::Unavailable { site: Some(site()), reason: "x".into() });
        assert!(matches!(result, Err(Error::NoThumbnail(_))));
    }

    #[tokio::test]
    async fn test_metadata_json_rewrites_images() {
        let response = metadata_response(Artifact::Page { site: site(), thumbnail: thumbnail() }, "site.test/page", "media.local").unwrap();
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["type"], "article");
        assert_eq!(json["url"], "http://site.test/page");
        assert_eq!(json["title"], "Example");
        assert_eq!(json["images"][0], "http://media.local/cdn.test/img.png?w=10");
    }

    #[tokio::test]
    async fn test_metadata_json_for_image_artifact() {
        let response = metadata_response(Artifact::Image { thumbnail: thumbnail() }, "cdn.test/a.png", "media.local").unwrap();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["type"], "image");
        assert_eq!(json["url"], "cdn.test/a.png");
        assert_eq!(json["images"][0], "http://media.local/cdn.test/a.png");
    }

    #[test]
    fn test_metadata_without_site_is_no_thumbnail() {
        let result = metadata_response(Artifact::Unavailable { site: None, reason: "gone".into() }, "t", "h");
        assert!(matches!(result, Err(Error::NoThumbnail(_))));
    }
}
