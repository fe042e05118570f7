use reqwest::StatusCode;
use serde_json::json;

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(jwt_secret: &str) -> Self {
        // Same router as prod, bound to an ephemeral port.
        let app = docflow_api::app::build_app(jwt_secret.to_string());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn login(
    client: &reqwest::Client,
    base_url: &str,
    username: &str,
) -> (String, String, serde_json::Value) {
    let res = client
        .post(format!("{base_url}/auth/login"))
        .json(&json!({ "username": username }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK, "login failed for {username}");
    let body: serde_json::Value = res.json().await.unwrap();
    let access = body["tokens"]["access_token"].as_str().unwrap().to_string();
    let refresh = body["tokens"]["refresh_token"].as_str().unwrap().to_string();
    (access, refresh, body)
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let srv = TestServer::spawn("test-secret").await;

    let client = reqwest::Client::new();
    let res = client
        .get(format!("{}/whoami", srv.base_url))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn("test-secret").await;

    let client = reqwest::Client::new();
    let res = client
        .get(format!("{}/health", srv.base_url))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn refresh_rotation_blocks_reuse() {
    let srv = TestServer::spawn("test-secret").await;
    let client = reqwest::Client::new();

    let (_access, refresh, _) = login(&client, &srv.base_url, "admin").await;

    let res = client
        .post(format!("{}/auth/refresh", srv.base_url))
        .json(&json!({ "refresh_token": refresh }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // The first refresh spent the token.
    let res = client
        .post(format!("{}/auth/refresh", srv.base_url))
        .json(&json!({ "refresh_token": refresh }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn document_lifecycle_end_to_end() {
    let srv = TestServer::spawn("test-secret").await;
    let client = reqwest::Client::new();
    let base = &srv.base_url;

    let (admin_token, _, _) = login(&client, base, "admin").await;

    // Department for routing.
    let res = client
        .post(format!("{base}/org/departments"))
        .bearer_auth(&admin_token)
        .json(&json!({ "name": "Records" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let department = res.json::<serde_json::Value>().await.unwrap()["department_id"]
        .as_str()
        .unwrap()
        .to_string();

    // Self-service registration lands pending; a pending account cannot log in.
    let res = client
        .post(format!("{base}/auth/register"))
        .json(&json!({ "username": "clerk", "display_name": "Clerk" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let clerk_id = res.json::<serde_json::Value>().await.unwrap()["user_id"]
        .as_str()
        .unwrap()
        .to_string();

    let res = client
        .post(format!("{base}/auth/login"))
        .json(&json!({ "username": "clerk" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    // Approve and place the clerk in the department.
    let res = client
        .post(format!("{base}/users/{clerk_id}/approve"))
        .bearer_auth(&admin_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = client
        .post(format!("{base}/users/{clerk_id}/department"))
        .bearer_auth(&admin_token)
        .json(&json!({ "department": department }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let (clerk_token, _, _) = login(&client, base, "clerk").await;

    // Admin authors a document, routes it to the department, advances it out
    // of draft.
    let res = client
        .post(format!("{base}/documents"))
        .bearer_auth(&admin_token)
        .json(&json!({
            "title": "Incoming correspondence",
            "security_level": "normal",
            "distribution": "incoming",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let doc_id = res.json::<serde_json::Value>().await.unwrap()["document_id"]
        .as_str()
        .unwrap()
        .to_string();

    let res = client
        .post(format!("{base}/documents/{doc_id}/assign"))
        .bearer_auth(&admin_token)
        .json(&json!({ "department": department }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .post(format!("{base}/documents/{doc_id}/advance"))
        .bearer_auth(&admin_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // The projection bus is synchronous, so the clerk sees the document at
    // once: one pending item in the inbox, and an assignment notification.
    let res = client
        .get(format!("{base}/documents"))
        .bearer_auth(&clerk_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let inbox: serde_json::Value = res.json().await.unwrap();
    let documents = inbox["documents"].as_array().unwrap();
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0]["classification"], "pending");

    let res = client
        .get(format!("{base}/notifications/unread-count"))
        .bearer_auth(&clerk_token)
        .send()
        .await
        .unwrap();
    let unread = res.json::<serde_json::Value>().await.unwrap()["unread"]
        .as_u64()
        .unwrap();
    assert!(unread >= 1);

    // Clerk completes the department's part; the summary flips to processed.
    let res = client
        .post(format!("{base}/documents/{doc_id}/actions"))
        .bearer_auth(&clerk_token)
        .json(&json!({ "state": "completed", "comment": "filed" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(format!("{base}/documents/summary"))
        .bearer_auth(&clerk_token)
        .send()
        .await
        .unwrap();
    let summary: serde_json::Value = res.json().await.unwrap();
    assert_eq!(summary["processed"].as_u64().unwrap(), 1);
    assert_eq!(summary["pending"].as_u64().unwrap(), 0);

    // A second completion attempt is rejected: the clerk is already done.
    let res = client
        .post(format!("{base}/documents/{doc_id}/actions"))
        .bearer_auth(&clerk_token)
        .json(&json!({ "state": "completed" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn org_mutations_require_the_admin_role() {
    let srv = TestServer::spawn("test-secret").await;
    let client = reqwest::Client::new();
    let base = &srv.base_url;

    let (admin_token, _, _) = login(&client, base, "admin").await;

    // A plain approved user without the admin role.
    let res = client
        .post(format!("{base}/auth/register"))
        .json(&json!({ "username": "plain", "display_name": "Plain" }))
        .send()
        .await
        .unwrap();
    let user_id = res.json::<serde_json::Value>().await.unwrap()["user_id"]
        .as_str()
        .unwrap()
        .to_string();
    client
        .post(format!("{base}/users/{user_id}/approve"))
        .bearer_auth(&admin_token)
        .send()
        .await
        .unwrap();

    let (plain_token, _, _) = login(&client, base, "plain").await;
    let res = client
        .post(format!("{base}/org/departments"))
        .bearer_auth(&plain_token)
        .json(&json!({ "name": "Shadow" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}
