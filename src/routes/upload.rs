/**
 * Upload Routes
 * Image upload, validated locally and handed to the configured image host
 */
use axum::extract::{
    multipart::{MultipartError, MultipartRejection},
    Multipart, State,
};
use axum::http::StatusCode;
use serde::Serialize;

use crate::error::{ApiError, ApiResult, Success};
use crate::media::{ImageUpload, UploadRejection};
use crate::routes::auth::Caller;
use crate::AppState;

/// Multipart field carrying the image
const FILE_FIELD: &str = "file";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub url: String,
    pub public_id: String,
}

/// A body cut off at the size cap reports the size limit, not a parse failure.
fn body_error(error: MultipartError, fallback: &str) -> ApiError {
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        tracing::info!("Upload rejected: body over the size limit");
        return ApiError::validation(UploadRejection::TooLarge { size: None }.message());
    }
    tracing::warn!("Multipart error: {}", error);
    ApiError::validation(fallback)
}

/// POST /api/upload - multipart `file` (signed-in callers)
pub async fn upload_image(
    State(state): State<AppState>,
    caller: Caller,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<UploadResponse> {
    let identity = caller.require()?;
    let mut multipart = multipart.map_err(|e| {
        tracing::debug!(error = %e, "rejected multipart request");
        ApiError::validation("Invalid multipart data")
    })?;

    let mut file = None;
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return Err(body_error(e, "Invalid multipart data")),
        };
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| body_error(e, "Failed to read file data"))?;
        file = Some((file_name, content_type, bytes));
        break;
    }

    let Some((file_name, content_type, bytes)) = file else {
        return Err(ApiError::validation("No file provided"));
    };

    let upload = ImageUpload::validate(file_name.as_deref(), content_type.as_deref(), bytes.to_vec())
        .map_err(|rejection| {
            tracing::info!(?rejection, "Upload rejected");
            ApiError::validation(rejection.message())
        })?;

    let Some(host) = state.images.as_ref() else {
        return Err(ApiError::Unavailable(
            "Image uploads are not configured".to_string(),
        ));
    };

    let image = host.upload(upload).await.map_err(|source| ApiError::Upload {
        context: "Failed to upload image",
        source,
    })?;
    tracing::info!(user_id = %identity.user_id, public_id = %image.public_id, "Image uploaded");

    Ok(Success::ok(UploadResponse {
        url: image.url,
        public_id: image.public_id,
    }))
}

#[cfg(test)]
mod tests {
    use crate::media::MAX_FILE_SIZE;
    use crate::routes::test_support::{self, send, TestApp};
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};

    const BOUNDARY: &str = "portfolio-test-boundary";

    fn multipart_request(token: Option<&str>, field: &str, content_type: &str, data: &[u8]) -> Request<Body> {
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"photo.png\"\r\n",
                field
            )
            .as_bytes(),
        );
        body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

        let mut builder = Request::post("/api/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .header(header::CONTENT_LENGTH, body.len());
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        builder.body(Body::from(body)).unwrap()
    }

    #[tokio::test]
    async fn test_upload_requires_identity() {
        let app = TestApp::new();
        let req = multipart_request(None, "file", "image/png", b"png-bytes");
        let (status, _) = send(app.router(), req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(app.images.calls(), 0);
    }

    #[tokio::test]
    async fn test_upload_forwards_valid_image() {
        let app = TestApp::new();
        let token = test_support::token_for("user_any");

        let req = multipart_request(Some(&token), "file", "image/png", b"png-bytes");
        let (status, body) = send(app.router(), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["url"], "https://images.test/portfolio/photo.png");
        assert_eq!(body["publicId"], "portfolio/upload-1");
        assert_eq!(app.images.calls(), 1);
    }

    #[tokio::test]
    async fn test_rejections_never_reach_host() {
        let app = TestApp::new();
        let token = test_support::token_for("user_any");

        let req = multipart_request(Some(&token), "file", "application/pdf", b"%PDF-1.4");
        let (status, body) = send(app.router(), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Only image files are allowed");

        let oversized = vec![0u8; MAX_FILE_SIZE + 1];
        let req = multipart_request(Some(&token), "file", "image/png", &oversized);
        let (status, body) = send(app.router(), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "File too large. Maximum size is 5MB.");

        let req = multipart_request(Some(&token), "avatar", "image/png", b"png-bytes");
        let (status, body) = send(app.router(), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No file provided");

        assert_eq!(app.images.calls(), 0);
    }

    #[tokio::test]
    async fn test_body_over_limit_reports_file_too_large() {
        let app = TestApp::new();
        let token = test_support::token_for("user_any");

        let oversized = vec![0u8; 7 * 1024 * 1024];
        let req = multipart_request(Some(&token), "file", "image/png", &oversized);
        assert!(req.headers().contains_key(header::CONTENT_LENGTH));

        let (status, body) = send(app.router(), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "File too large. Maximum size is 5MB.");
        assert_eq!(app.images.calls(), 0);
    }

    #[tokio::test]
    async fn test_upload_without_host_is_unavailable() {
        let app = TestApp::without_images();
        let token = test_support::token_for("user_any");
        let req = multipart_request(Some(&token), "file", "image/png", b"png-bytes");
        let (status, _) = send(app.router(), req).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
