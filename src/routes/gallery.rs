/**
 * Gallery Routes
 * API endpoints for the ordered artwork collection
 */
use std::convert::Infallible;

use axum::{
    extract::{Multipart, Path, Query},
    http::{HeaderMap, StatusCode},
    response::sse::{Event, KeepAlive, Sse},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::blob::ImageFile;
use crate::routes::auth::verify_auth;
use crate::routes::{core_unavailable, sync_error_response, ErrorResponse};
use crate::sync::get_core;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for GET /api/artworks and the event stream
#[derive(Debug, Deserialize)]
pub struct GalleryQuery {
    /// Artwork id to omit from the result (detail page rail)
    pub exclude: Option<String>,
}

/// Request body for PUT /api/artworks/order
#[derive(Debug, Deserialize, Serialize)]
pub struct ReorderRequest {
    pub order: Vec<String>,
}

/// Form fields extracted from an artwork multipart submission
#[derive(Debug, Default)]
struct ArtworkForm {
    title: String,
    description: String,
    image: Option<ImageFile>,
}

// ============================================================================
// Multipart parsing
// ============================================================================

async fn read_artwork_form(
    multipart: &mut Multipart,
) -> Result<ArtworkForm, (StatusCode, Json<ErrorResponse>)> {
    let mut form = ArtworkForm::default();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                tracing::error!("Multipart error: {}", e);
                return Err((
                    StatusCode::BAD_REQUEST,
                    Json(ErrorResponse {
                        error: "Invalid multipart data".to_string(),
                        message: None,
                    }),
                ));
            }
        };

        match field.name().unwrap_or("") {
            "title" => form.title = field.text().await.unwrap_or_default(),
            "description" => form.description = field.text().await.unwrap_or_default(),
            "image" => {
                let file_name = field.file_name().unwrap_or("image").to_string();
                let bytes = match field.bytes().await {
                    Ok(b) => b.to_vec(),
                    Err(e) => {
                        tracing::error!("Failed to read upload bytes: {}", e);
                        return Err((
                            StatusCode::BAD_REQUEST,
                            Json(ErrorResponse {
                                error: "Failed to read file data".to_string(),
                                message: None,
                            }),
                        ));
                    }
                };
                form.image = Some(ImageFile { file_name, bytes });
            }
            _ => {}
        }
    }

    Ok(form)
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/artworks?exclude=...
/// Full gallery sorted by order ascending
pub async fn list_artworks(Query(query): Query<GalleryQuery>) -> impl IntoResponse {
    let core = match get_core() {
        Some(c) => c,
        None => return core_unavailable().into_response(),
    };
    let artworks = core.artworks.list(query.exclude.as_deref()).await;
    (StatusCode::OK, Json(artworks)).into_response()
}

/// GET /api/artworks/{id}
pub async fn get_artwork(Path(id): Path<String>) -> impl IntoResponse {
    let core = match get_core() {
        Some(c) => c,
        None => return core_unavailable().into_response(),
    };
    match core.artworks.get(&id).await {
        Some(artwork) => (StatusCode::OK, Json(artwork)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "Artwork not found".to_string(),
                message: None,
            }),
        )
            .into_response(),
    }
}

/// POST /api/artworks (multipart: title, description, image; requires auth)
/// Appends the new artwork at the end of the current order
pub async fn create_artwork(headers: HeaderMap, mut multipart: Multipart) -> impl IntoResponse {
    if let Err(err_response) = verify_auth(&headers) {
        return err_response.into_response();
    }
    let core = match get_core() {
        Some(c) => c,
        None => return core_unavailable().into_response(),
    };

    let form = match read_artwork_form(&mut multipart).await {
        Ok(form) => form,
        Err(err_response) => return err_response.into_response(),
    };
    let image = match form.image {
        Some(image) => image,
        None => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: "Image is required".to_string(),
                    message: None,
                }),
            )
                .into_response();
        }
    };

    match core
        .artworks
        .create(&form.title, &form.description, image)
        .await
    {
        Ok(artwork) => (StatusCode::CREATED, Json(artwork)).into_response(),
        Err(e) => sync_error_response(e, "Failed to create artwork").into_response(),
    }
}

/// PUT /api/artworks/{id} (multipart: title, description, optional image;
/// requires auth). Title and description are overwritten; the image is only
/// replaced when a new file is supplied.
pub async fn update_artwork(
    headers: HeaderMap,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    if let Err(err_response) = verify_auth(&headers) {
        return err_response.into_response();
    }
    let core = match get_core() {
        Some(c) => c,
        None => return core_unavailable().into_response(),
    };

    let form = match read_artwork_form(&mut multipart).await {
        Ok(form) => form,
        Err(err_response) => return err_response.into_response(),
    };

    match core
        .artworks
        .update(&id, &form.title, &form.description, form.image)
        .await
    {
        Ok(artwork) => (StatusCode::OK, Json(artwork)).into_response(),
        Err(e) => sync_error_response(e, "Failed to update artwork").into_response(),
    }
}

/// DELETE /api/artworks/{id} (requires auth)
/// Sibling order values are left untouched
pub async fn delete_artwork(headers: HeaderMap, Path(id): Path<String>) -> impl IntoResponse {
    if let Err(err_response) = verify_auth(&headers) {
        return err_response.into_response();
    }
    let core = match get_core() {
        Some(c) => c,
        None => return core_unavailable().into_response(),
    };

    match core.artworks.delete(&id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => sync_error_response(e, "Failed to delete artwork").into_response(),
    }
}

/// PUT /api/artworks/order (requires auth)
/// Applies the dragged ordering as one atomic batch; on failure the
/// collection is unchanged and clients fall back to the previous order.
pub async fn reorder_artworks(
    headers: HeaderMap,
    Json(payload): Json<ReorderRequest>,
) -> impl IntoResponse {
    if let Err(err_response) = verify_auth(&headers) {
        return err_response.into_response();
    }
    let core = match get_core() {
        Some(c) => c,
        None => return core_unavailable().into_response(),
    };

    match core.artworks.reorder(&payload.order).await {
        Ok(artworks) => (StatusCode::OK, Json(artworks)).into_response(),
        Err(e) => sync_error_response(e, "Failed to reorder artworks").into_response(),
    }
}

/// GET /api/artworks/events?exclude=...
/// Server-sent events: the complete sorted gallery, once on connect and
/// again after every change.
pub async fn artwork_events(Query(query): Query<GalleryQuery>) -> impl IntoResponse {
    let core = match get_core() {
        Some(c) => c,
        None => return core_unavailable().into_response(),
    };

    let feed = core.artworks.subscribe(query.exclude).await;
    let stream = futures::stream::unfold(feed, |mut feed| async move {
        let snapshot = feed.next().await?;
        let event = match Event::default().event("artworks").json_data(&snapshot) {
            Ok(event) => event,
            Err(e) => {
                tracing::error!("Failed to serialize gallery snapshot: {}", e);
                return None;
            }
        };
        Some((Ok::<_, Infallible>(event), feed))
    });

    Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response()
}
