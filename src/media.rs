//! Image hosting collaborator. Uploaded bytes are validated locally and then
//! handed to an [`ImageHost`], which returns a stable URL and an opaque id.

use async_trait::async_trait;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::config::CloudinaryConfig;

/// Largest accepted upload.
pub const MAX_FILE_SIZE: usize = 5 * 1024 * 1024; // 5MB

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("upload request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("image host returned {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Why an upload was refused before reaching the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadRejection {
    Empty,
    /// `size` is `None` when the body was cut off at the request cap
    TooLarge { size: Option<usize> },
    NotAnImage { content_type: Option<String> },
}

impl UploadRejection {
    pub fn message(&self) -> String {
        match self {
            UploadRejection::Empty => "Empty file".to_string(),
            UploadRejection::TooLarge { .. } => "File too large. Maximum size is 5MB.".to_string(),
            UploadRejection::NotAnImage { .. } => "Only image files are allowed".to_string(),
        }
    }
}

/// An upload that passed local validation
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    /// Checks size and MIME type; never touches the network.
    pub fn validate(
        file_name: Option<&str>,
        content_type: Option<&str>,
        bytes: Vec<u8>,
    ) -> Result<Self, UploadRejection> {
        if bytes.is_empty() {
            return Err(UploadRejection::Empty);
        }
        if bytes.len() > MAX_FILE_SIZE {
            return Err(UploadRejection::TooLarge {
                size: Some(bytes.len()),
            });
        }
        let content_type = match content_type {
            Some(ct) if ct.to_ascii_lowercase().starts_with("image/") => ct.to_string(),
            other => {
                return Err(UploadRejection::NotAnImage {
                    content_type: other.map(str::to_string),
                })
            }
        };
        Ok(Self {
            file_name: file_name.unwrap_or("upload").to_string(),
            content_type,
            bytes,
        })
    }
}

/// Where the hosting service put the image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostedImage {
    pub url: String,
    pub public_id: String,
}

#[async_trait]
pub trait ImageHost: Send + Sync {
    async fn upload(&self, image: ImageUpload) -> Result<HostedImage, MediaError>;
}

/// Cloudinary upload API client (signed uploads).
pub struct CloudinaryHost {
    client: reqwest::Client,
    config: CloudinaryConfig,
}

#[derive(Debug, Deserialize)]
struct CloudinaryUploadResponse {
    secure_url: String,
    public_id: String,
}

impl CloudinaryHost {
    pub fn new(config: CloudinaryConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn upload_url(&self) -> String {
        format!(
            "https://api.cloudinary.com/v1_1/{}/image/upload",
            self.config.cloud_name
        )
    }
}

/// Cloudinary request signature: the signed params sorted by name, joined as
/// `k=v&k=v`, with the API secret appended, hashed with SHA-256.
fn sign_params(params: &[(&str, &str)], api_secret: &str) -> String {
    let mut sorted = params.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let joined = sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    hasher.update(api_secret.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[async_trait]
impl ImageHost for CloudinaryHost {
    async fn upload(&self, image: ImageUpload) -> Result<HostedImage, MediaError> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = sign_params(
            &[
                ("folder", self.config.folder.as_str()),
                ("timestamp", timestamp.as_str()),
            ],
            &self.config.api_secret,
        );

        let size = image.bytes.len();
        let file = reqwest::multipart::Part::bytes(image.bytes)
            .file_name(image.file_name)
            .mime_str(&image.content_type)?;

        let form = reqwest::multipart::Form::new()
            .part("file", file)
            .text("api_key", self.config.api_key.clone())
            .text("timestamp", timestamp)
            .text("folder", self.config.folder.clone())
            .text("signature_algorithm", "sha256")
            .text("signature", signature);

        let response = self
            .client
            .post(self.upload_url())
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, "image host rejected upload");
            return Err(MediaError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let uploaded: CloudinaryUploadResponse = response.json().await?;
        tracing::info!(public_id = %uploaded.public_id, size, "Image uploaded");

        Ok(HostedImage {
            url: uploaded.secure_url,
            public_id: uploaded.public_id,
        })
    }
}
