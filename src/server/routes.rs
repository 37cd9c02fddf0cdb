//! Image route handlers.

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, Path, State};
use axum::http::HeaderMap;
use tracing::{info, warn};

use super::response::{
    ApiError, DeletedImage, ImageList, Reply, SingleImage, NOT_DELETE, NOT_EXIST_ADDRESS,
    NOT_EXIST_ID, NOT_EXIST_IMAGE,
};
use super::AppState;
use crate::models::NewImage;
use crate::storage::UploadedFile;
use crate::Error;

pub const DEVICE_ADDRESS_HEADER: &str = "device-address";
pub const IMAGE_FIELD: &str = "image";

type ApiResult<T> = Result<Reply<T>, ApiError>;

fn device_address(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(DEVICE_ADDRESS_HEADER)
        .and_then(|value| value.to_str().ok())
}

/// Coerce a path segment to an image id.
///
/// Anything that isn't an integer maps to `None`, which callers treat the
/// same as an id with no row.
pub fn parse_image_id(raw: &str) -> Option<i64> {
    raw.trim().parse().ok()
}

/// GET /
pub async fn list_images(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<ImageList> {
    // A missing header filters on the empty address. Unlike an unfiltered
    // query, this never lists every device's images.
    let address = device_address(&headers).unwrap_or_default();

    let images = state.store.find_images_by_device_address(address).await?;
    Ok(Reply::Ok(ImageList { images }))
}

/// GET /:id
pub async fn get_image(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<SingleImage> {
    let Some(id) = parse_image_id(&id) else {
        return Ok(Reply::Rejected(NOT_EXIST_ID));
    };

    match state.store.find_image(id).await? {
        Some(image) => Ok(Reply::Ok(SingleImage { image })),
        None => Ok(Reply::Rejected(NOT_EXIST_ID)),
    }
}

/// POST / with a single file in the `image` multipart field.
pub async fn create_image(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<SingleImage> {
    let mut multipart = multipart.map_err(|e| Error::Multipart(e.body_text()))?;

    let Some(file) = read_image_field(&mut multipart).await? else {
        return Err(Error::Multipart(NOT_EXIST_IMAGE.to_string()).into());
    };

    let stored = state.uploader.store(file).await?;

    let new_image = NewImage {
        url: stored.location.clone(),
        device_id: state.upload_device_id,
    };
    let image = match state.store.create_image(new_image).await {
        Ok(image) => image,
        Err(e) => {
            warn!(key = %stored.key, "Image row not created, uploaded object is orphaned");
            return Err(e.into());
        }
    };

    info!(id = image.id, key = %stored.key, "Stored image");
    Ok(Reply::Ok(SingleImage { image }))
}

/// Pull the single file sent under [`IMAGE_FIELD`], ignoring text fields.
async fn read_image_field(multipart: &mut Multipart) -> crate::Result<Option<UploadedFile>> {
    let mut found = None;

    while let Some(field) = multipart.next_field().await? {
        let Some(original_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let field_name = field.name().unwrap_or_default().to_string();

        if field_name != IMAGE_FIELD || found.is_some() {
            return Err(Error::Multipart(format!("Unexpected field '{}'", field_name)));
        }

        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await?;
        found = Some(UploadedFile {
            field_name,
            original_name,
            content_type,
            data,
        });
    }

    Ok(found)
}

/// DELETE /:id, allowed only for the device that owns the image.
pub async fn delete_image(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<DeletedImage> {
    let address = match device_address(&headers) {
        Some(address) if !address.is_empty() => address,
        _ => return Ok(Reply::Rejected(NOT_EXIST_ADDRESS)),
    };
    let Some(id) = parse_image_id(&id) else {
        return Ok(Reply::Rejected(NOT_DELETE));
    };

    let device = state.store.find_device_by_address(address).await?;
    let image = state.store.find_image(id).await?;

    let (Some(device), Some(image)) = (device, image) else {
        return Ok(Reply::Rejected(NOT_DELETE));
    };
    if !image.is_owned_by(&device) {
        return Ok(Reply::Rejected(NOT_DELETE));
    }

    // The stored object is left in place.
    match state.store.delete_image(image.id).await? {
        Some(deleted_image) => {
            info!(id = deleted_image.id, device = device.id, "Deleted image");
            Ok(Reply::Ok(DeletedImage { deleted_image }))
        }
        // Removed by a concurrent request between lookup and delete.
        None => Ok(Reply::Rejected(NOT_DELETE)),
    }
}
