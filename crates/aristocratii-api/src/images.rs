use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::header,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use tokio::io::AsyncWriteExt;
use tracing::{error, info, warn};
use uuid::Uuid;

use aristocratii_db::blocking;
use aristocratii_db::models::{ImageRow, now_timestamp};
use aristocratii_types::api::UploadResponse;
use aristocratii_types::models::Image;

use crate::error::{ApiError, PathParam};
use crate::state::AppState;

/// Multipart field carrying the image
const IMAGE_FIELD: &str = "image";

/// Allowed extensions and the content type each is served with.
const ALLOWED_TYPES: &[(&str, &str)] = &[
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
];

fn content_type_for(filename: &str) -> Option<(String, &'static str)> {
    let (_, ext) = filename.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    ALLOWED_TYPES
        .iter()
        .find(|(allowed, _)| *allowed == ext)
        .map(|(_, content_type)| (ext, *content_type))
}

/// POST /upload-image: stores the `image` field under a server-generated
/// name and returns that name's id.
pub async fn upload_image(
    State(state): State<AppState>,
    WithRejection(mut multipart, _): WithRejection<Multipart, ApiError>,
) -> Result<Json<UploadResponse>, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let original = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| ApiError::BadRequest("image field has no filename".into()))?;
        let (ext, content_type) = content_type_for(&original).ok_or_else(|| {
            ApiError::BadRequest("file type not allowed, expected png, jpg, jpeg or gif".into())
        })?;

        let bytes = field.bytes().await?;
        if bytes.is_empty() {
            return Err(ApiError::BadRequest("image is empty".into()));
        }

        let id = Uuid::new_v4().to_string();
        let filename = format!("{}.{}", id, ext);
        let size = bytes.len() as u64;

        // Ensure uploads directory exists
        tokio::fs::create_dir_all(&state.upload_dir)
            .await
            .map_err(|e| anyhow::anyhow!("failed to create upload directory: {}", e))?;

        let file_path = state.upload_dir.join(&filename);
        let mut file = tokio::fs::File::create(&file_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to create {}: {}", file_path.display(), e))?;
        file.write_all(&bytes)
            .await
            .map_err(|e| anyhow::anyhow!("failed to write {}: {}", file_path.display(), e))?;

        let row = ImageRow {
            id: id.clone(),
            filename: filename.clone(),
            content_type: content_type.to_string(),
            size: size as i64,
            created_at: now_timestamp(),
        };
        if let Err(e) = blocking(&state.db, move |db| db.insert_image(&row)).await {
            // Do not leave an unreferenced file behind
            if let Err(rm) = tokio::fs::remove_file(&file_path).await {
                error!("Failed to remove orphaned upload {}: {}", file_path.display(), rm);
            }
            return Err(e.into());
        }

        info!("Stored image {} ({} bytes) from '{}'", filename, size, original);
        return Ok(Json(UploadResponse { id, filename, size }));
    }

    Err(ApiError::BadRequest(format!("missing multipart field '{}'", IMAGE_FIELD)))
}

/// GET /images
pub async fn list_images(State(state): State<AppState>) -> Result<Json<Vec<Image>>, ApiError> {
    let rows = blocking(&state.db, |db| db.list_images()).await?;
    Ok(Json(rows.into_iter().map(|row| row.into_image()).collect()))
}

/// GET /images/{id}: raw bytes of an uploaded image, looked up by the id
/// without extension.
pub async fn get_image(
    State(state): State<AppState>,
    WithRejection(Path(id), _): PathParam<String>,
) -> Result<impl IntoResponse, ApiError> {
    // Only ids we generated can name a file; this also rules out path traversal
    id.parse::<Uuid>()
        .map_err(|_| ApiError::BadRequest("invalid image id".into()))?;

    let row = blocking(&state.db, move |db| db.get_image(&id))
        .await?
        .ok_or_else(|| ApiError::NotFound("Image not found".into()))?;

    let file_path = state.upload_dir.join(&row.filename);
    let bytes = tokio::fs::read(&file_path).await.map_err(|e| {
        warn!("Image {} is recorded but unreadable at {}: {}", row.id, file_path.display(), e);
        ApiError::NotFound("Image not found".into())
    })?;

    Ok(([(header::CONTENT_TYPE, row.content_type)], bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_listed_extensions_are_accepted() {
        assert_eq!(
            content_type_for("cat.PNG"),
            Some(("png".to_string(), "image/png"))
        );
        assert_eq!(
            content_type_for("holiday.photo.jpeg"),
            Some(("jpeg".to_string(), "image/jpeg"))
        );
        assert_eq!(content_type_for("anim.gif").map(|(_, ct)| ct), Some("image/gif"));
        assert!(content_type_for("script.exe").is_none());
        assert!(content_type_for("noextension").is_none());
    }
}
