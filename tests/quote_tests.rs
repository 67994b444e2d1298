mod common;

use axum::http::StatusCode;
use comunidad::estimator;
use common::spawn_app;
use serde_json::json;

fn answers() -> serde_json::Value {
    json!({
        "project_type": "corporate",
        "pages": 7,
        "features": ["blog", "auth"],
        "design": "custom",
        "timeline": "standard",
        "has_content": true
    })
}

#[tokio::test]
async fn identical_submissions_get_identical_server_estimates() {
    let app = spawn_app();
    let expected = estimator::estimate(&answers()).unwrap();

    let first = app
        .post(
            "/api/project-quotes",
            None,
            json!({ "email": "Cliente@Example.com", "answers": answers() }),
        )
        .await;
    let second = app
        .post(
            "/api/project-quotes",
            None,
            json!({ "email": "cliente@example.com", "answers": answers() }),
        )
        .await;

    assert_eq!(first.status, StatusCode::CREATED);
    assert_eq!(second.status, StatusCode::CREATED);
    let (first, second) = (first.json(), second.json());
    assert_ne!(first["id"], second["id"]);
    assert_eq!(first["email"], "cliente@example.com");
    for quote in [&first, &second] {
        assert_eq!(quote["estimate_min"], expected.min);
        assert_eq!(quote["estimate_max"], expected.max);
        assert_eq!(quote["responded"], false);
    }
}

#[tokio::test]
async fn client_supplied_estimate_is_ignored() {
    let app = spawn_app();
    let expected = estimator::estimate(&answers()).unwrap();

    let res = app
        .post(
            "/api/project-quotes",
            None,
            json!({
                "email": "cliente@example.com",
                "answers": answers(),
                "estimate": { "min": 1, "max": 2 }
            }),
        )
        .await;

    assert_eq!(res.status, StatusCode::CREATED);
    let quote = res.json();
    assert_eq!(quote["estimate_min"], expected.min);
    assert_eq!(quote["estimate_max"], expected.max);
}

#[tokio::test]
async fn malformed_answers_or_email_are_rejected() {
    let app = spawn_app();

    let bad_type = app
        .post(
            "/api/project-quotes",
            None,
            json!({ "email": "cliente@example.com", "answers": { "project_type": "spaceship" } }),
        )
        .await;
    assert_eq!(bad_type.status, StatusCode::BAD_REQUEST);

    let bad_email = app
        .post(
            "/api/project-quotes",
            None,
            json!({ "email": "nope", "answers": answers() }),
        )
        .await;
    assert_eq!(bad_email.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn admin_lists_pending_and_responds() {
    let app = spawn_app();
    let (admin, _) = app.register_admin().await;
    for email in ["a@example.com", "b@example.com"] {
        app.post(
            "/api/project-quotes",
            None,
            json!({ "email": email, "answers": { "project_type": "landing" } }),
        )
        .await;
    }

    let all = app.get("/api/admin/project-quotes", Some(&admin)).await.json();
    assert_eq!(all.as_array().unwrap().len(), 2);
    let id = all[0]["id"].as_str().unwrap().to_string();

    let responded = app
        .patch(
            &format!("/api/admin/project-quotes/{id}"),
            Some(&admin),
            json!({ "admin_note": "  Llamar el lunes " }),
        )
        .await;
    assert_eq!(responded.status, StatusCode::OK);
    let responded = responded.json();
    assert_eq!(responded["responded"], true);
    assert_eq!(responded["admin_note"], "Llamar el lunes");
    assert!(responded["responded_at"].is_string());

    let pending = app
        .get("/api/admin/project-quotes?pending=true", Some(&admin))
        .await
        .json();
    assert_eq!(pending.as_array().unwrap().len(), 1);
    assert_ne!(pending[0]["id"], id);

    let stats = app.get("/api/admin/stats", Some(&admin)).await.json();
    assert_eq!(stats["pending_quotes"], 1);

    let missing = app
        .patch(
            &format!("/api/admin/project-quotes/{}", uuid::Uuid::new_v4()),
            Some(&admin),
            json!({}),
        )
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}
