#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{HeaderMap, Request, StatusCode, header},
};
use comunidad::{
    AppConfig, AppState, InMemoryRepository, MockStorageService, create_router,
    newsletter::{NewsletterError, NewsletterService},
    repository::{Repository, RepositoryState},
    storage::StorageState,
};
use serde_json::{Value, json};
use tower::util::ServiceExt;
use uuid::Uuid;

/// Captures newsletter subscriptions instead of calling the provider.
#[derive(Default)]
pub struct RecordingNewsletter {
    pub subscribed: Mutex<Vec<String>>,
}

#[async_trait]
impl NewsletterService for RecordingNewsletter {
    async fn subscribe(&self, email: &str, _name: Option<&str>) -> Result<(), NewsletterError> {
        self.subscribed
            .lock()
            .unwrap()
            .push(email.to_string());
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub repo: Arc<InMemoryRepository>,
    pub storage: MockStorageService,
    pub newsletter: Arc<RecordingNewsletter>,
    pub config: AppConfig,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: bytes::Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or_else(|e| {
            panic!(
                "response body is not JSON ({e}): {}",
                String::from_utf8_lossy(&self.body)
            )
        })
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

pub fn spawn_app() -> TestApp {
    spawn_app_with_storage(MockStorageService::new())
}

pub fn spawn_app_with_storage(storage: MockStorageService) -> TestApp {
    let repo = Arc::new(InMemoryRepository::new());
    let newsletter = Arc::new(RecordingNewsletter::default());
    let config = AppConfig::default();

    let state = AppState::new(
        repo.clone() as RepositoryState,
        Arc::new(storage.clone()) as StorageState,
        config.clone(),
        newsletter.clone(),
    );

    TestApp {
        router: create_router(state),
        repo,
        storage,
        newsletter,
        config,
    }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.send(request("GET", uri, token, None)).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.send(request("POST", uri, token, Some(body))).await
    }

    pub async fn patch(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.send(request("PATCH", uri, token, Some(body))).await
    }

    pub async fn put(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.send(request("PUT", uri, token, Some(body))).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.send(request("DELETE", uri, token, None)).await
    }

    /// Registers through the API and returns `(token, user_id)`.
    pub async fn register(&self, email: &str, username: &str) -> (String, Uuid) {
        let res = self
            .post(
                "/api/auth/register",
                None,
                json!({ "email": email, "password": "secret123", "username": username }),
            )
            .await;
        assert_eq!(res.status, StatusCode::CREATED, "register failed: {:?}", res.json());
        let body = res.json();
        let token = body["token"].as_str().unwrap().to_string();
        let id = body["user"]["id"].as_str().unwrap().parse().unwrap();
        (token, id)
    }

    /// Moves a user to the named role directly in the repository.
    pub async fn set_role(&self, user_id: Uuid, role: &str) {
        let role = self
            .repo
            .find_role_by_name(role)
            .await
            .unwrap()
            .expect("seeded role");
        self.repo.set_user_role(user_id, role.id).await.unwrap();
    }

    pub async fn register_admin(&self) -> (String, Uuid) {
        let (token, id) = self.register("root@example.com", "root").await;
        self.set_role(id, "admin").await;
        (token, id)
    }

    /// Grants `resource:action` to the named role.
    pub async fn grant(&self, role: &str, resource: &str, action: &str) {
        let role = self
            .repo
            .find_role_by_name(role)
            .await
            .unwrap()
            .expect("seeded role");
        let permission = self
            .repo
            .list_permissions()
            .await
            .unwrap()
            .into_iter()
            .find(|p| p.resource == resource && p.action == action)
            .expect("seeded permission");
        self.repo
            .grant_permission(role.id, permission.id)
            .await
            .unwrap();
    }
}

pub fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Builds a single-field `multipart/form-data` body.
pub fn multipart_request(
    uri: &str,
    token: &str,
    file_name: &str,
    content_type: &str,
    data: &[u8],
) -> Request<Body> {
    let boundary = "comunidad-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n\
             Content-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap()
}
