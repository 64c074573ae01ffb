#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use automl_api::config::ServerConfig;
use automl_api::engine::dispatcher::Dispatcher;
use automl_api::router::build_app_router;
use automl_api::state::AppState;
use automl_db::{MemoryJobStore, MemoryWorkQueue};
use automl_events::LocalProgressBus;
use automl_pipeline::{Computation, UploadDirCatalog};
use automl_worker::Executor;
use axum::body::Body;
use axum::http::{HeaderValue, Method, Request};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

/// Header plus ten rows; `colA` is a float column, `colB` an integer one.
pub const R1_CSV: &str = "colA,colB\n\
    0.5,1\n1.5,2\n2.5,3\n3.5,4\n4.5,5\n5.5,6\n6.5,7\n7.5,8\n8.5,9\n9.5,10\n";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config(upload_dir: PathBuf) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec![HeaderValue::from_static("http://localhost:5173")],
        request_timeout_secs: 30,
        upload_dir,
        embedded_workers: 0,
        database_url: "postgres://unused".to_string(),
        db_max_connections: 1,
    }
}

/// The application wired to in-memory store, queue and bus, with an upload
/// directory containing `r1`.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryJobStore>,
    pub queue: Arc<MemoryWorkQueue>,
    pub bus: Arc<LocalProgressBus>,
    pub upload_dir: TempDir,
}

impl TestApp {
    /// An executor over the same store, queue and bus.
    pub fn executor(&self, computation: Arc<dyn Computation>) -> Executor {
        Executor::new(
            self.store.clone(),
            self.queue.clone(),
            self.bus.clone(),
            computation,
        )
    }
}

pub fn build_test_app() -> TestApp {
    let upload_dir = tempfile::tempdir().unwrap();
    std::fs::write(upload_dir.path().join("r1"), R1_CSV).unwrap();

    let store = Arc::new(MemoryJobStore::new());
    let queue = Arc::new(MemoryWorkQueue::new());
    let bus = Arc::new(LocalProgressBus::default());
    let config = test_config(upload_dir.path().to_path_buf());

    let dispatcher = Dispatcher::new(
        store.clone(),
        queue.clone(),
        Arc::new(UploadDirCatalog::new(upload_dir.path())),
    );
    let state = AppState {
        store: store.clone(),
        bus: bus.clone(),
        dispatcher: Arc::new(dispatcher),
        config: Arc::new(config.clone()),
    };

    TestApp {
        router: build_app_router(state, &config),
        store,
        queue,
        bus,
        upload_dir,
    }
}

/// Serve `router` on an ephemeral local port.
pub async fn serve(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response {
    app.oneshot(
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}
