//! HTTP surface: four image routes over the store and the uploader.

pub mod response;
pub mod routes;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::db::ImageStore;
use crate::storage::Uploader;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ImageStore>,
    pub uploader: Uploader,
    /// Owner recorded for every upload.
    pub upload_device_id: i64,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(routes::list_images).post(routes::create_image))
        .route("/:id", get(routes::get_image).delete(routes::delete_image))
        // Uploads are not size-capped.
        .layer(DefaultBodyLimit::disable())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteStore;
    use crate::models::{Image, NewImage};
    use crate::storage::{MockStorage, TimestampKeys};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const BOUNDARY: &str = "X-IMAGE-SERVER-BOUNDARY";

    struct TestApp {
        router: Router,
        store: Arc<SqliteStore>,
        storage: MockStorage,
    }

    async fn setup_test_app() -> TestApp {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        store.create_device("a").await.unwrap();
        store.create_device("b").await.unwrap();

        let storage = MockStorage::new().with_base_url("https://bucket.test".to_string());
        let router = build_router(AppState {
            store: store.clone(),
            uploader: Uploader::new(Arc::new(storage.clone()), Arc::new(TimestampKeys)),
            upload_device_id: 1,
        });

        TestApp {
            router,
            store,
            storage,
        }
    }

    async fn insert_image(store: &SqliteStore, device_id: i64) -> Image {
        store
            .create_image(NewImage {
                url: format!("https://bucket.test/image-{}.png", device_id),
                device_id,
            })
            .await
            .unwrap()
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        (status, serde_json::from_slice(&body).expect("json body"))
    }

    fn multipart_request(field: &str, file_name: &str, data: &[u8]) -> Request<Body> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .expect("request")
    }

    fn get_request(uri: &str, address: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(address) = address {
            builder = builder.header("device-address", address);
        }
        builder.body(Body::empty()).expect("request")
    }

    fn delete_request(uri: &str, address: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method("DELETE").uri(uri);
        if let Some(address) = address {
            builder = builder.header("device-address", address);
        }
        builder.body(Body::empty()).expect("request")
    }

    #[tokio::test]
    async fn list_images_for_device_without_images_is_empty() {
        let app = setup_test_app().await;

        let (status, body) = send(&app.router, get_request("/", Some("b"))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "ok": true, "images": [] }));
    }

    #[tokio::test]
    async fn list_images_filters_by_device_address() {
        let app = setup_test_app().await;
        let owned = insert_image(&app.store, 1).await;
        insert_image(&app.store, 2).await;

        let (_, body) = send(&app.router, get_request("/", Some("a"))).await;

        assert_eq!(body["images"], json!([owned]));
    }

    #[tokio::test]
    async fn list_images_without_header_matches_nothing() {
        let app = setup_test_app().await;
        insert_image(&app.store, 1).await;

        let (_, body) = send(&app.router, get_request("/", None)).await;

        assert_eq!(body, json!({ "ok": true, "images": [] }));
    }

    #[tokio::test]
    async fn get_image_returns_row() {
        let app = setup_test_app().await;
        let image = insert_image(&app.store, 2).await;

        let (status, body) =
            send(&app.router, get_request(&format!("/{}", image.id), None)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "ok": true, "image": image }));
    }

    #[tokio::test]
    async fn get_unknown_or_non_numeric_id_is_not_found() {
        let app = setup_test_app().await;

        for uri in ["/42", "/abc", "/1.5"] {
            let (status, body) = send(&app.router, get_request(uri, None)).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body, json!({ "ok": false, "message": "Not exist id." }));
        }
    }

    #[tokio::test]
    async fn create_image_uploads_and_records_hardcoded_owner() {
        let app = setup_test_app().await;

        let mut request = multipart_request("image", "photo.png", b"\x89PNG data");
        request
            .headers_mut()
            .insert("device-address", "b".parse().unwrap());
        let (status, body) = send(&app.router, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        assert_eq!(body["image"]["deviceId"], 1);

        let files = app.storage.get_files();
        assert_eq!(files.len(), 1);
        let (key, data) = files.into_iter().next().unwrap();
        assert!(key.starts_with("image-") && key.ends_with(".png"));
        assert_eq!(data, b"\x89PNG data".to_vec());
        assert_eq!(
            body["image"]["url"],
            format!("https://bucket.test/{}", key)
        );
    }

    #[tokio::test]
    async fn create_image_location_is_percent_encoded() {
        let app = setup_test_app().await;

        let (status, body) =
            send(&app.router, multipart_request("image", "cat.p g#x", b"data")).await;

        assert_eq!(status, StatusCode::OK);
        let key = app.storage.get_files().into_keys().next().unwrap();
        assert!(key.starts_with("image-") && key.ends_with(".p g#x"));

        let url = body["image"]["url"].as_str().unwrap();
        assert!(url.ends_with(".p%20g%23x"), "unexpected url {url}");
        assert_eq!(
            url,
            format!(
                "https://bucket.test/{}",
                key.replace(' ', "%20").replace('#', "%23")
            )
        );
        assert_eq!(app.store.find_image(1).await.unwrap().unwrap().url, url);
    }

    #[tokio::test]
    async fn create_image_without_image_field_is_rejected() {
        let app = setup_test_app().await;

        let (status, body) =
            send(&app.router, multipart_request("avatar", "photo.png", b"data")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["ok"], false);
        assert_eq!(app.storage.get_upload_count(), 0);
    }

    #[tokio::test]
    async fn create_image_with_non_multipart_body_is_rejected() {
        let app = setup_test_app().await;

        let request = Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/json")
            .body(Body::from("{}"))
            .unwrap();
        let (status, body) = send(&app.router, request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["ok"], false);
    }

    #[tokio::test]
    async fn create_image_storage_failure_returns_500() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        store.create_device("a").await.unwrap();
        let router = build_router(AppState {
            store: store.clone(),
            uploader: Uploader::new(
                Arc::new(MockStorage::new().with_failure(true)),
                Arc::new(TimestampKeys),
            ),
            upload_device_id: 1,
        });

        let (status, body) = send(&router, multipart_request("image", "a.png", b"x")).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "ok": false, "message": "Internal server error." }));
        assert!(store.find_image(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn create_image_insert_failure_leaves_object_in_storage() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let storage = MockStorage::new();
        let router = build_router(AppState {
            store,
            uploader: Uploader::new(Arc::new(storage.clone()), Arc::new(TimestampKeys)),
            upload_device_id: 1,
        });

        // No device 1 exists, so the foreign key rejects the row.
        let (status, body) = send(&router, multipart_request("image", "a.png", b"x")).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["ok"], false);
        assert_eq!(storage.get_upload_count(), 1);
    }

    #[tokio::test]
    async fn delete_by_owner_removes_row_once() {
        let app = setup_test_app().await;
        let image = insert_image(&app.store, 1).await;
        let uri = format!("/{}", image.id);

        let (status, body) = send(&app.router, delete_request(&uri, Some("a"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "ok": true, "deletedImage": image }));

        let (_, body) = send(&app.router, delete_request(&uri, Some("a"))).await;
        assert_eq!(body, json!({ "ok": false, "message": "Not delete." }));
    }

    #[tokio::test]
    async fn delete_by_other_device_is_refused() {
        let app = setup_test_app().await;
        let image = insert_image(&app.store, 1).await;
        let uri = format!("/{}", image.id);

        let (status, body) = send(&app.router, delete_request(&uri, Some("b"))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "ok": false, "message": "Not delete." }));
        assert_eq!(app.store.find_image(image.id).await.unwrap(), Some(image));
    }

    #[tokio::test]
    async fn delete_by_unknown_device_is_refused() {
        let app = setup_test_app().await;
        let image = insert_image(&app.store, 1).await;

        let (_, body) = send(
            &app.router,
            delete_request(&format!("/{}", image.id), Some("stranger")),
        )
        .await;

        assert_eq!(body, json!({ "ok": false, "message": "Not delete." }));
    }

    #[tokio::test]
    async fn delete_without_address_returns_early() {
        let app = setup_test_app().await;
        let image = insert_image(&app.store, 1).await;
        let uri = format!("/{}", image.id);

        for address in [None, Some("")] {
            let (status, body) = send(&app.router, delete_request(&uri, address)).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body, json!({ "ok": false, "message": "Not exist address." }));
        }
        assert!(app.store.find_image(image.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn delete_non_numeric_id_is_refused() {
        let app = setup_test_app().await;

        let (_, body) = send(&app.router, delete_request("/abc", Some("a"))).await;

        assert_eq!(body, json!({ "ok": false, "message": "Not delete." }));
    }
}
