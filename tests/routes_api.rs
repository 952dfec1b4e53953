use actix_web::cookie::Cookie;
use actix_web::{test, web, App};
use noticeboard::{config, AppState, Settings};
use std::path::Path;
use tempfile::TempDir;

const SECRET: &str = "test-secret-must-be-32-bytes-long!!";

fn settings(root: &Path) -> Settings {
    Settings {
        bind_addr: "127.0.0.1".into(),
        port: 0,
        data_dir: root.join("data"),
        upload_dir: root.join("uploads"),
        credentials_file: root.join("credentials.json"),
        session_secret: SECRET.into(),
        session_ttl_hours: 1,
        max_upload_bytes: 64 * 1024,
        cors_origins: Vec::new(),
    }
}

// Fresh temp dir with an admin/hunter2 credentials file
fn setup() -> (TempDir, AppState) {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(tmp.path().join("credentials.json"), r#"{"username":"admin","password":"hunter2"}"#).unwrap();
    let state = AppState::from_settings(&settings(tmp.path())).unwrap();
    (tmp, state)
}

macro_rules! app {
    ($state:expr) => {
        test::init_service(App::new().app_data(web::Data::new($state.clone())).configure(config)).await
    };
}

// Helper to build a multipart body from text fields and (name, filename, bytes) files
fn build_multipart(fields: &[(&str, &str)], files: &[(&str, &str, &[u8])]) -> (String, Vec<u8>) {
    let boundary = "BOUNDARY123";
    let mut body: Vec<u8> = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!("--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n").as_bytes(),
        );
    }
    for (name, file_name, bytes) in files {
        body.extend_from_slice(format!("--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n").as_bytes());
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={boundary}"), body)
}

// Minimal 1x1 PNG (transparent)
fn sample_png() -> Vec<u8> {
    vec![
        0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, // signature
        0x00, 0x00, 0x00, 0x0D, b'I', b'H', b'D', b'R', 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00,
        0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F, 0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0A, b'I',
        b'D', b'A', b'T', 0x78, 0x9C, 0x63, 0x00, 0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A,
        0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, b'I', b'E', b'N', b'D', 0xAE, 0x42, 0x60, 0x82,
    ]
}

async fn json_body(resp: actix_web::dev::ServiceResponse) -> serde_json::Value {
    serde_json::from_slice(&test::read_body(resp).await).unwrap()
}

/// Logs in through the form and returns the session cookie.
macro_rules! login {
    ($app:expr) => {{
        let req = test::TestRequest::post()
            .uri("/login")
            .set_form([("username", "admin"), ("password", "hunter2")])
            .to_request();
        let resp = test::call_service(&$app, req).await;
        assert_eq!(resp.status(), 303);
        assert_eq!(resp.headers().get("location").unwrap(), "/admin");
        let cookie: Cookie<'static> = resp
            .response()
            .cookies()
            .find(|c| c.name() == "session")
            .expect("session cookie")
            .into_owned();
        cookie
    }};
}

#[actix_web::test]
async fn notice_crud_flow() {
    let (_tmp, state) = setup();
    let app = app!(state);
    let session = login!(app);

    let req = test::TestRequest::get().uri("/api/notices").to_request();
    let v = json_body(test::call_service(&app, req).await).await;
    assert_eq!(v.as_array().unwrap().len(), 0);

    let before = chrono::Utc::now().timestamp();
    let req = test::TestRequest::post()
        .uri("/api/notices")
        .cookie(session.clone())
        .set_json(serde_json::json!({"text": "Exam on Friday"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let after = chrono::Utc::now().timestamp();
    let v = json_body(resp).await;
    assert_eq!(v["status"], "success");
    assert_eq!(v["notice"]["text"], "Exam on Friday");
    let id = v["notice"]["id"].as_i64().unwrap();
    assert!(before <= id && id <= after, "id should be the creation epoch second");

    let req = test::TestRequest::get().uri("/api/notices").to_request();
    let v = json_body(test::call_service(&app, req).await).await;
    assert_eq!(v, serde_json::json!([{"id": id, "text": "Exam on Friday"}]));

    let req = test::TestRequest::put()
        .uri(&format!("/api/notices/{id}"))
        .cookie(session.clone())
        .set_json(serde_json::json!({"text": "Exam on Monday"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    assert_eq!(json_body(resp).await, serde_json::json!({"status": "updated"}));

    // unknown id: accepted, nothing changes
    let req = test::TestRequest::put()
        .uri("/api/notices/1")
        .cookie(session.clone())
        .set_json(serde_json::json!({"text": "ghost"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);

    let req = test::TestRequest::get().uri("/api/notices").to_request();
    let v = json_body(test::call_service(&app, req).await).await;
    assert_eq!(v[0]["text"], "Exam on Monday");
    assert_eq!(v.as_array().unwrap().len(), 1);

    for _ in 0..2 {
        let req = test::TestRequest::delete()
            .uri(&format!("/api/notices/{id}"))
            .cookie(session.clone())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);
        assert_eq!(json_body(resp).await, serde_json::json!({"status": "deleted"}));
    }
}

#[actix_web::test]
async fn anonymous_mutations_are_rejected_and_leave_files_untouched() {
    let (tmp, state) = setup();
    let app = app!(state);
    let session = login!(app);

    let req = test::TestRequest::post()
        .uri("/api/notices")
        .cookie(session)
        .set_json(serde_json::json!({"text": "keep me"}))
        .to_request();
    let v = json_body(test::call_service(&app, req).await).await;
    let id = v["notice"]["id"].as_i64().unwrap();
    let path = tmp.path().join("data/notices.json");
    let before = std::fs::read(&path).unwrap();

    let attempts = vec![
        test::TestRequest::post().uri("/api/notices").set_json(serde_json::json!({"text": "x"})),
        test::TestRequest::put().uri(&format!("/api/notices/{id}")).set_json(serde_json::json!({"text": "x"})),
        test::TestRequest::delete().uri(&format!("/api/notices/{id}")),
        test::TestRequest::delete().uri("/api/links/1"),
        test::TestRequest::delete().uri("/api/gallery/1"),
    ];
    for req in attempts {
        let resp = test::call_service(&app, req.to_request()).await;
        assert_eq!(resp.status(), 401);
        assert_eq!(json_body(resp).await, serde_json::json!({"status": "error", "message": "Unauthorized"}));
    }

    let png = sample_png();
    let (ct, body) = build_multipart(&[("title", "t"), ("url", "u")], &[("image", "a.png", png.as_slice())]);
    for uri in ["/api/links", "/api/gallery"] {
        let req = test::TestRequest::post()
            .uri(uri)
            .insert_header(("Content-Type", ct.clone()))
            .set_payload(body.clone())
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 401);
    }

    assert_eq!(std::fs::read(&path).unwrap(), before);
    assert!(!tmp.path().join("data/links.json").exists());
    assert_eq!(std::fs::read_dir(tmp.path().join("uploads")).unwrap().count(), 0);
}

#[actix_web::test]
async fn link_without_image_is_bad_request() {
    let (tmp, state) = setup();
    let app = app!(state);
    let session = login!(app);

    let (ct, body) = build_multipart(&[("title", "Docs"), ("url", "https://example.org")], &[]);
    let req = test::TestRequest::post()
        .uri("/api/links")
        .cookie(session.clone())
        .insert_header(("Content-Type", ct))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    assert_eq!(
        json_body(resp).await,
        serde_json::json!({"status": "error", "message": "No image file provided"})
    );

    // an empty filename counts as no file
    let (ct, body) = build_multipart(&[("title", "Docs")], &[("image", "", &b""[..])]);
    let req = test::TestRequest::post()
        .uri("/api/links")
        .cookie(session)
        .insert_header(("Content-Type", ct))
        .set_payload(body)
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 400);

    assert!(!tmp.path().join("data/links.json").exists());
    assert_eq!(std::fs::read_dir(tmp.path().join("uploads")).unwrap().count(), 0);
}

#[actix_web::test]
async fn link_image_replacement_removes_old_file() {
    let (tmp, state) = setup();
    let app = app!(state);
    let session = login!(app);
    let png = sample_png();

    let (ct, body) = build_multipart(&[("title", "Docs"), ("url", "https://example.org")], &[("image", "a.png", png.as_slice())]);
    let req = test::TestRequest::post()
        .uri("/api/links")
        .cookie(session.clone())
        .insert_header(("Content-Type", ct))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let v = json_body(resp).await;
    let id = v["link"]["id"].as_i64().unwrap();
    let old = v["link"]["image"].as_str().unwrap().to_string();
    assert_eq!(old, format!("{id}_a.png"));
    assert!(tmp.path().join("uploads").join(&old).exists());

    let (ct, body) = build_multipart(&[("title", "Docs v2")], &[("image", "../b.png", png.as_slice())]);
    let req = test::TestRequest::put()
        .uri(&format!("/api/links/{id}"))
        .cookie(session.clone())
        .insert_header(("Content-Type", ct))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    assert_eq!(json_body(resp).await, serde_json::json!({"status": "updated"}));

    let req = test::TestRequest::get().uri("/api/links").to_request();
    let v = json_body(test::call_service(&app, req).await).await;
    let new = format!("{id}_b.png");
    assert_eq!(v[0]["title"], "Docs v2");
    assert_eq!(v[0]["url"], "https://example.org");
    assert_eq!(v[0]["image"], new.as_str());
    assert!(!tmp.path().join("uploads").join(&old).exists());

    // the stored file is served back with a sniffed type
    let req = test::TestRequest::get().uri(&format!("/uploads/{new}")).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers().get("content-type").unwrap(), "image/png");
    assert_eq!(test::read_body(resp).await.as_ref(), png.as_slice());
}

#[actix_web::test]
async fn link_update_for_unknown_id_is_not_found() {
    let (_tmp, state) = setup();
    let app = app!(state);
    let session = login!(app);

    let (ct, body) = build_multipart(&[("title", "nope")], &[]);
    let req = test::TestRequest::put()
        .uri("/api/links/42")
        .cookie(session)
        .insert_header(("Content-Type", ct))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
    assert_eq!(json_body(resp).await, serde_json::json!({"status": "error", "message": "Link not found"}));
}

#[actix_web::test]
async fn gallery_create_and_delete() {
    let (tmp, state) = setup();
    let app = app!(state);
    let session = login!(app);
    let png = sample_png();

    let (ct, body) = build_multipart(&[], &[("image", "Sports Day.png", png.as_slice())]);
    let req = test::TestRequest::post()
        .uri("/api/gallery")
        .cookie(session.clone())
        .insert_header(("Content-Type", ct))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let v = json_body(resp).await;
    let id = v["image"]["id"].as_i64().unwrap();
    let filename = v["image"]["filename"].as_str().unwrap().to_string();
    assert_eq!(filename, format!("{id}_Sports_Day.png"));
    assert!(tmp.path().join("uploads").join(&filename).exists());

    let req = test::TestRequest::delete()
        .uri(&format!("/api/gallery/{id}"))
        .cookie(session)
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);
    assert!(!tmp.path().join("uploads").join(&filename).exists());

    let req = test::TestRequest::get().uri("/api/gallery").to_request();
    let v = json_body(test::call_service(&app, req).await).await;
    assert_eq!(v, serde_json::json!([]));
}

#[actix_web::test]
async fn non_image_upload_is_rejected() {
    let (tmp, state) = setup();
    let app = app!(state);
    let session = login!(app);

    let (ct, body) = build_multipart(&[], &[("image", "notes.png", &b"hello world"[..])]);
    let req = test::TestRequest::post()
        .uri("/api/gallery")
        .cookie(session)
        .insert_header(("Content-Type", ct))
        .set_payload(body)
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 415);
    assert!(!tmp.path().join("data/gallery.json").exists());
}

#[actix_web::test]
async fn oversized_upload_is_rejected() {
    let (_tmp, state) = setup();
    let app = app!(state);
    let session = login!(app);

    let mut big = sample_png();
    big.resize(65 * 1024, 0);
    let (ct, body) = build_multipart(&[], &[("image", "big.png", big.as_slice())]);
    let req = test::TestRequest::post()
        .uri("/api/gallery")
        .cookie(session)
        .insert_header(("Content-Type", ct))
        .set_payload(body)
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 413);
}

#[actix_web::test]
async fn text_parts_count_towards_the_upload_limit() {
    let (tmp, state) = setup();
    let app = app!(state);
    let session = login!(app);

    // each part is under the limit on its own, together they are not
    let chunk = "x".repeat(40 * 1024);
    let png = sample_png();
    let (ct, body) = build_multipart(
        &[("title", chunk.as_str()), ("url", chunk.as_str())],
        &[("image", "a.png", png.as_slice())],
    );
    let req = test::TestRequest::post()
        .uri("/api/links")
        .cookie(session)
        .insert_header(("Content-Type", ct))
        .set_payload(body)
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 413);
    assert!(!tmp.path().join("data/links.json").exists());
}

#[actix_web::test]
async fn malformed_requests_get_json_error_bodies() {
    let (_tmp, state) = setup();
    let app = app!(state);
    let session = login!(app);

    let req = test::TestRequest::post()
        .uri("/api/notices")
        .cookie(session.clone())
        .insert_header(("Content-Type", "application/json"))
        .set_payload("{not json")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let v = json_body(resp).await;
    assert_eq!(v["status"], "error");
    assert!(v["message"].as_str().unwrap().starts_with("Invalid JSON body"));

    let req = test::TestRequest::delete()
        .uri("/api/notices/not-a-number")
        .cookie(session)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
    assert_eq!(json_body(resp).await, serde_json::json!({"status": "error", "message": "Record not found"}));
}

#[actix_web::test]
async fn corrupt_collection_lists_as_empty() {
    let (tmp, state) = setup();
    std::fs::create_dir_all(tmp.path().join("data")).unwrap();
    std::fs::write(tmp.path().join("data/links.json"), b"[{\"id\": 1, \"tit").unwrap();
    let app = app!(state);

    let req = test::TestRequest::get().uri("/api/links").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    assert_eq!(json_body(resp).await, serde_json::json!([]));
}

#[actix_web::test]
async fn login_gates_admin_page() {
    let (_tmp, state) = setup();
    let app = app!(state);

    let req = test::TestRequest::get().uri("/admin").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 303);
    assert_eq!(resp.headers().get("location").unwrap(), "/login");

    let req = test::TestRequest::post()
        .uri("/login")
        .set_form([("username", "admin"), ("password", "wrong")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);
    assert!(resp.response().cookies().next().is_none());
    let page = String::from_utf8(test::read_body(resp).await.to_vec()).unwrap();
    assert!(page.contains("Invalid username or password"));

    let req = test::TestRequest::get().uri("/admin").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 303);

    let session = login!(app);
    let req = test::TestRequest::get().uri("/admin").cookie(session.clone()).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let page = String::from_utf8(test::read_body(resp).await.to_vec()).unwrap();
    assert!(page.contains("Signed in as admin"));

    let req = test::TestRequest::post()
        .uri("/api/notices")
        .cookie(session)
        .set_json(serde_json::json!({"text": "after login"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 201);
}

#[actix_web::test]
async fn logout_revokes_the_session() {
    let (_tmp, state) = setup();
    let app = app!(state);
    let session = login!(app);

    let req = test::TestRequest::get().uri("/logout").cookie(session.clone()).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 303);
    assert_eq!(resp.headers().get("location").unwrap(), "/login");

    // a client that kept the old cookie is anonymous again
    let req = test::TestRequest::post()
        .uri("/api/notices")
        .cookie(session.clone())
        .set_json(serde_json::json!({"text": "x"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 401);
    let req = test::TestRequest::get().uri("/admin").cookie(session).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 303);
}

#[actix_web::test]
async fn bearer_token_is_accepted() {
    let (_tmp, state) = setup();
    let token = state.sessions.issue("admin").unwrap();
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri("/api/notices")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .set_json(serde_json::json!({"text": "via api"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 201);
}

#[actix_web::test]
async fn missing_credentials_file_reports_error_without_crashing() {
    let (tmp, state) = setup();
    std::fs::remove_file(tmp.path().join("credentials.json")).unwrap();
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri("/login")
        .set_form([("username", "admin"), ("password", "hunter2")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 500);
    let page = String::from_utf8(test::read_body(resp).await.to_vec()).unwrap();
    assert!(page.contains("credentials are not configured"));

    // server keeps serving
    let req = test::TestRequest::get().uri("/api/notices").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);
}

#[actix_web::test]
async fn index_page_escapes_record_text() {
    let (_tmp, state) = setup();
    let app = app!(state);
    let session = login!(app);

    let req = test::TestRequest::post()
        .uri("/api/notices")
        .cookie(session)
        .set_json(serde_json::json!({"text": "<b>Exam</b> & quiz"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 201);

    let req = test::TestRequest::get().uri("/").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let page = String::from_utf8(test::read_body(resp).await.to_vec()).unwrap();
    assert!(page.contains("&lt;b&gt;Exam&lt;/b&gt; &amp; quiz"));
}
