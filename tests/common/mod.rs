//! A one-object fake of an S3-style bucket: GET, PUT, ETag and If-Match.

#![allow(dead_code)]

use std::net::TcpListener as StdListener;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use parking_lot::Mutex;

pub const OBJECT_PATH: &str = "/statusboard/statuses.json";

#[derive(Default)]
struct Object {
    body: Option<Vec<u8>>,
    version: u64,
    puts: usize,
    delay: Duration,
}

pub struct FakeBucket {
    object: Arc<Mutex<Object>>,
    base_url: String,
}

impl FakeBucket {
    pub fn empty() -> Self {
        Self::start(None, Duration::ZERO)
    }

    pub fn with_body(body: &str) -> Self {
        Self::start(Some(body.as_bytes().to_vec()), Duration::ZERO)
    }

    /// Answers every request only after `delay`.
    pub fn slow(body: &str, delay: Duration) -> Self {
        Self::start(Some(body.as_bytes().to_vec()), delay)
    }

    fn start(body: Option<Vec<u8>>, delay: Duration) -> Self {
        let version = u64::from(body.is_some());
        let object = Arc::new(Mutex::new(Object {
            body,
            version,
            puts: 0,
            delay,
        }));
        let router = Router::new()
            .route(OBJECT_PATH, get(get_object).put(put_object))
            .with_state(object.clone());

        let listener = StdListener::bind("127.0.0.1:0").expect("bind fake bucket");
        listener.set_nonblocking(true).expect("nonblocking listener");
        let addr = listener.local_addr().expect("local addr");

        thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(1)
                .enable_all()
                .build()
                .expect("tokio runtime");
            runtime.block_on(async move {
                let listener =
                    tokio::net::TcpListener::from_std(listener).expect("adopt listener");
                axum::serve(listener, router).await.expect("serve fake bucket");
            });
        });

        Self {
            object,
            base_url: format!("http://{addr}"),
        }
    }

    pub fn url(&self) -> String {
        format!("{}{}", self.base_url, OBJECT_PATH)
    }

    pub fn body(&self) -> Option<String> {
        self.object
            .lock()
            .body
            .as_ref()
            .map(|b| String::from_utf8_lossy(b).into_owned())
    }

    pub fn puts(&self) -> usize {
        self.object.lock().puts
    }

    /// Another writer replacing the object.
    pub fn overwrite(&self, body: &str) {
        let mut object = self.object.lock();
        object.body = Some(body.as_bytes().to_vec());
        object.version += 1;
    }
}

fn etag(version: u64) -> String {
    format!("\"v{version}\"")
}

async fn get_object(State(object): State<Arc<Mutex<Object>>>) -> Response {
    let delay = object.lock().delay;
    tokio::time::sleep(delay).await;
    let object = object.lock();
    match &object.body {
        Some(body) => (
            [
                (header::ETAG, etag(object.version)),
                (header::CONTENT_TYPE, "application/json".to_string()),
            ],
            body.clone(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn put_object(
    State(object): State<Arc<Mutex<Object>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let delay = object.lock().delay;
    tokio::time::sleep(delay).await;
    let mut object = object.lock();
    if let Some(expected) = headers.get(header::IF_MATCH) {
        let current = etag(object.version);
        if object.body.is_none() || expected.to_str().ok() != Some(current.as_str()) {
            return StatusCode::PRECONDITION_FAILED.into_response();
        }
    }
    object.body = Some(body.to_vec());
    object.version += 1;
    object.puts += 1;
    ([(header::ETAG, etag(object.version))], "").into_response()
}
