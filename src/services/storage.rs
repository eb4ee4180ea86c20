// SPDX-License-Identifier: MIT

//! Avatar storage: validation, resize, and upload to the avatars bucket.

use crate::error::AppError;
use crate::retry::RetryPolicy;
use aws_sdk_s3::primitives::ByteStream;
use std::io::Cursor;

/// Client-facing upload cap.
pub const AVATAR_MAX_BYTES: usize = 5 * 1024 * 1024;

/// Avatars are normalized to a square of this edge length.
pub const AVATAR_DIMENSION: u32 = 1000;

/// Object storage client for the fixed avatars bucket.
#[derive(Clone)]
pub struct AvatarStorage {
    client: Option<aws_sdk_s3::Client>,
    bucket: String,
    public_base: String,
    retry: RetryPolicy,
}

impl AvatarStorage {
    /// Create a storage client from ambient AWS/S3-compatible credentials.
    pub async fn new(bucket: &str, public_base: &str) -> Self {
        let config = aws_config::load_from_env().await;
        Self {
            client: Some(aws_sdk_s3::Client::new(&config)),
            bucket: bucket.to_string(),
            public_base: public_base.trim_end_matches('/').to_string(),
            retry: RetryPolicy::default(),
        }
    }

    /// Create a mock storage client for testing (offline mode).
    ///
    /// Uploads will return an error if called.
    pub fn new_mock(bucket: &str, public_base: &str) -> Self {
        Self {
            client: None,
            bucket: bucket.to_string(),
            public_base: public_base.trim_end_matches('/').to_string(),
            retry: RetryPolicy::default(),
        }
    }

    fn get_client(&self) -> Result<&aws_sdk_s3::Client, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Storage("Storage not connected (offline mode)".to_string()))
    }

    /// Upload a processed avatar and return its public URL.
    ///
    /// The object key is derived from the account ID, so re-uploading
    /// replaces the previous avatar.
    pub async fn upload_avatar(&self, account_id: &str, png: Vec<u8>) -> Result<String, AppError> {
        let client = self.get_client()?;
        let key = format!("{}.png", account_id);

        self.retry
            .run(|| {
                let body = png.clone();
                let key = key.clone();
                async move {
                    client
                        .put_object()
                        .bucket(&self.bucket)
                        .key(&key)
                        .content_type("image/png")
                        .body(ByteStream::from(body))
                        .send()
                        .await
                        .map_err(|e| AppError::Storage(e.to_string()))
                }
            })
            .await?;

        tracing::info!(account_id, key = %key, "Avatar uploaded");

        Ok(format!("{}/{}", self.public_base, key))
    }
}

/// Validate an uploaded avatar: size cap and image-type check.
pub fn validate_avatar(bytes: &[u8]) -> Result<image::ImageFormat, AppError> {
    if bytes.len() > AVATAR_MAX_BYTES {
        return Err(AppError::BadRequest(format!(
            "Avatar exceeds the {} MB limit",
            AVATAR_MAX_BYTES / (1024 * 1024)
        )));
    }

    image::guess_format(bytes)
        .map_err(|_| AppError::BadRequest("Avatar must be an image file".to_string()))
}

/// Decode and normalize an avatar to a centered 1000x1000 square PNG.
pub fn process_avatar(bytes: &[u8]) -> Result<Vec<u8>, AppError> {
    let format = validate_avatar(bytes)?;

    let img = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| AppError::BadRequest(format!("Could not decode image: {}", e)))?;

    let resized = img.resize_to_fill(
        AVATAR_DIMENSION,
        AVATAR_DIMENSION,
        image::imageops::FilterType::Lanczos3,
    );

    let mut out = Vec::new();
    resized
        .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Avatar re-encode failed: {}", e)))?;

    Ok(out)
}
