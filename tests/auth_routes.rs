//! End-to-end tests for login, token validation, and the password reset
//! lifecycle. Requires `TEST_DATABASE_URL`; tests skip when it is unset.

use std::sync::Arc;

use chrono::{Duration, Utc};
use hospital_api::auth::mailer::RecordingMailer;
use hospital_api::auth::{AuthError, Role};
use hospital_api::auth::reset::PasswordResetStore;
use hospital_api::auth::routes as auth_routes;
use hospital_api::test_support::{
    TestDatabase, TestDatabaseError, TestFixtures, TestRocketBuilder, test_auth_state,
};
use rocket::http::{ContentType, Header, Status};
use rocket::local::asynchronous::Client;
use rocket::routes;
use serde_json::{Value, json};

async fn provision_db(test_name: &str) -> Option<TestDatabase> {
    match TestDatabase::new_from_env().await {
        Ok(db) => Some(db),
        Err(TestDatabaseError::MissingUrl) => {
            eprintln!("skipping {}: TEST_DATABASE_URL not set", test_name);
            None
        }
        Err(err) => panic!("failed to provision test database: {err:?}"),
    }
}

async fn auth_client(db: &TestDatabase, mailer: RecordingMailer) -> Client {
    TestRocketBuilder::new()
        .manage_pg_pool(db.pool_clone())
        .manage_auth_state(test_auth_state(Arc::new(mailer)))
        .mount_api_routes(routes![
            auth_routes::login,
            auth_routes::register,
            auth_routes::create_admin,
            auth_routes::validate,
            auth_routes::forgot_password,
            auth_routes::reset_password,
        ])
        .async_client()
        .await
}

async fn login(client: &Client, email: &str, password: &str) -> (Status, Value) {
    let response = client
        .post("/api/auth/login")
        .header(ContentType::JSON)
        .body(json!({ "email": email, "password": password }).to_string())
        .dispatch()
        .await;
    let status = response.status();
    let body: Value = response.into_json().await.expect("json body");
    (status, body)
}

#[tokio::test]
async fn login_issues_token_and_rejects_wrong_password() {
    let Some(db) = provision_db("login_issues_token_and_rejects_wrong_password").await else {
        return;
    };
    let mailer = RecordingMailer::new();
    let state = test_auth_state(Arc::new(mailer.clone()));
    TestFixtures::new(db.pool())
        .create_user(&state, "doc@hospital.test", "rounds-at-seven", Role::Doctor)
        .await;

    let client = auth_client(&db, mailer).await;

    let (status, body) = login(&client, "doc@hospital.test", "rounds-at-seven").await;
    assert_eq!(status, Status::Ok);
    assert!(body["token"].as_str().is_some_and(|t| !t.is_empty()));
    assert_eq!(body["user"]["role"], "DOCTOR");

    // Wrong password: 401, and no token anywhere in the body.
    let (status, body) = login(&client, "doc@hospital.test", "wrong-password").await;
    assert_eq!(status, Status::Unauthorized);
    assert_eq!(body["message"], "Invalid email or password");
    assert!(body.get("token").is_none());

    // Unknown email reads identically to a wrong password.
    let (status, body) = login(&client, "nobody@hospital.test", "whatever").await;
    assert_eq!(status, Status::Unauthorized);
    assert_eq!(body["message"], "Invalid email or password");

    drop(client);
    db.close().await.expect("drop test database");
}

#[tokio::test]
async fn validate_echoes_identity_and_rejects_expired_tokens() {
    let Some(db) = provision_db("validate_echoes_identity_and_rejects_expired_tokens").await else {
        return;
    };
    let mailer = RecordingMailer::new();
    let state = test_auth_state(Arc::new(mailer.clone()));
    TestFixtures::new(db.pool())
        .create_user(&state, "rcp@hospital.test", "front-desk", Role::Receptionist)
        .await;

    let client = auth_client(&db, mailer).await;

    let signed = state
        .token_service
        .issue("rcp@hospital.test", Role::Receptionist)
        .expect("issue token");
    let mut response = client
        .get("/api/auth/validate")
        .header(Header::new("Authorization", format!("Bearer {}", signed.token)))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let body: Value = response.into_json().await.expect("json body");
    assert_eq!(body["email"], "rcp@hospital.test");
    assert_eq!(body["role"], "RECEPTIONIST");

    // An expired token signed with the correct key still fails the gate.
    let mut expired_config = hospital_api::test_support::test_auth_config();
    expired_config.token_ttl_secs = -120;
    let expired_service = hospital_api::auth::TokenService::from_config(&expired_config)
        .expect("token service");
    let stale = expired_service
        .issue("rcp@hospital.test", Role::Receptionist)
        .expect("issue token");
    response = client
        .get("/api/auth/validate")
        .header(Header::new("Authorization", format!("Bearer {}", stale.token)))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Unauthorized);

    // Malformed header shapes never reach identity lookup.
    response = client
        .get("/api/auth/validate")
        .header(Header::new("Authorization", signed.token.clone()))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Unauthorized);

    response = client.get("/api/auth/validate").dispatch().await;
    assert_eq!(response.status(), Status::Unauthorized);

    drop(response);
    drop(client);
    db.close().await.expect("drop test database");
}

#[tokio::test]
async fn passwords_are_verbatim_from_registration_to_login() {
    let Some(db) = provision_db("passwords_are_verbatim_from_registration_to_login").await else {
        return;
    };
    let client = auth_client(&db, RecordingMailer::new()).await;

    // Whitespace is part of the password, not noise around it.
    let mut response = client
        .post("/api/auth/register")
        .header(ContentType::JSON)
        .body(
            json!({
                "first_name": "Nina",
                "last_name": "Osei",
                "email": "nina@hospital.test",
                "password": " ward rounds ",
                "role": "DOCTOR"
            })
            .to_string(),
        )
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Created);

    let (status, _) = login(&client, "nina@hospital.test", " ward rounds ").await;
    assert_eq!(status, Status::Ok);

    let (status, _) = login(&client, "nina@hospital.test", "ward rounds").await;
    assert_eq!(status, Status::Unauthorized);

    drop(response);
    drop(client);
    db.close().await.expect("drop test database");
}

#[tokio::test]
async fn create_admin_bootstrap_runs_once() {
    let Some(db) = provision_db("create_admin_bootstrap_runs_once").await else {
        return;
    };
    let client = auth_client(&db, RecordingMailer::new()).await;

    let mut response = client.post("/api/auth/create-admin").dispatch().await;
    assert_eq!(response.status(), Status::Created);

    response = client.post("/api/auth/create-admin").dispatch().await;
    assert_eq!(response.status(), Status::BadRequest);

    let (status, _) = login(&client, "admin@hospital.com", "admin123").await;
    assert_eq!(status, Status::Ok);

    drop(response);
    drop(client);
    db.close().await.expect("drop test database");
}

fn token_from_mail(body: &str) -> String {
    body.split("token=")
        .nth(1)
        .expect("reset link carries a token")
        .trim()
        .to_string()
}

#[tokio::test]
async fn password_reset_round_trip_consumes_the_token() {
    let Some(db) = provision_db("password_reset_round_trip_consumes_the_token").await else {
        return;
    };
    let mailer = RecordingMailer::new();
    let state = test_auth_state(Arc::new(mailer.clone()));
    TestFixtures::new(db.pool())
        .create_user(&state, "phm@hospital.test", "old-password", Role::Pharmacist)
        .await;

    let client = auth_client(&db, mailer.clone()).await;

    let mut response = client
        .post("/api/auth/forgot-password")
        .header(ContentType::JSON)
        .body(json!({ "email": "phm@hospital.test" }).to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);

    let sent = mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "phm@hospital.test");
    let token = token_from_mail(&sent[0].body);

    response = client
        .post("/api/auth/reset-password")
        .header(ContentType::JSON)
        .body(json!({ "token": token, "new_password": "new-password" }).to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);

    // Old credential is dead, new one works.
    let (status, _) = login(&client, "phm@hospital.test", "old-password").await;
    assert_eq!(status, Status::Unauthorized);
    let (status, _) = login(&client, "phm@hospital.test", "new-password").await;
    assert_eq!(status, Status::Ok);

    // Second redemption of the same token fails with the generic message.
    response = client
        .post("/api/auth/reset-password")
        .header(ContentType::JSON)
        .body(json!({ "token": token, "new_password": "another-password" }).to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::BadRequest);
    let body: Value = response.into_json().await.expect("json body");
    assert_eq!(body["message"], "Invalid or expired token");

    drop(client);
    db.close().await.expect("drop test database");
}

#[tokio::test]
async fn forgot_password_is_uniform_for_unknown_emails() {
    let Some(db) = provision_db("forgot_password_is_uniform_for_unknown_emails").await else {
        return;
    };
    let mailer = RecordingMailer::new();
    let client = auth_client(&db, mailer.clone()).await;

    let mut response = client
        .post("/api/auth/forgot-password")
        .header(ContentType::JSON)
        .body(json!({ "email": "ghost@hospital.test" }).to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let body: Value = response.into_json().await.expect("json body");
    assert_eq!(
        body["message"],
        "If an account exists for that email, a reset link has been sent"
    );
    assert!(mailer.sent().is_empty());

    drop(client);
    db.close().await.expect("drop test database");
}

#[tokio::test]
async fn expired_reset_tokens_fail_regardless_of_state() {
    let Some(db) = provision_db("expired_reset_tokens_fail_regardless_of_state").await else {
        return;
    };
    let mailer = RecordingMailer::new();
    let state = test_auth_state(Arc::new(mailer.clone()));
    let user_id = TestFixtures::new(db.pool())
        .create_user(&state, "doc2@hospital.test", "password", Role::Doctor)
        .await;

    // Issue a token that expired an hour ago.
    let store = PasswordResetStore::new(db.pool_clone());
    let issued = store
        .issue(user_id, Utc::now() - Duration::hours(2), Duration::hours(1))
        .await
        .expect("issue reset token");

    let client = auth_client(&db, mailer).await;
    let mut response = client
        .post("/api/auth/reset-password")
        .header(ContentType::JSON)
        .body(json!({ "token": issued.token, "new_password": "irrelevant" }).to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::BadRequest);
    let body: Value = response.into_json().await.expect("json body");
    assert_eq!(body["message"], "Invalid or expired token");

    // The old password still logs in; nothing was applied.
    let (status, _) = login(&client, "doc2@hospital.test", "password").await;
    assert_eq!(status, Status::Ok);

    // A token that is both used and expired fails as expired: expiry takes
    // precedence over the used flag.
    let stale = store
        .issue(user_id, Utc::now() - Duration::hours(2), Duration::hours(1))
        .await
        .expect("issue reset token");
    sqlx::query("UPDATE password_reset_tokens SET used = TRUE")
        .execute(db.pool())
        .await
        .expect("mark token used");
    let err = store
        .redeem(
            &state.password_service,
            &stale.token,
            "irrelevant",
            Utc::now(),
        )
        .await
        .expect_err("redeem must fail");
    assert!(matches!(err, AuthError::ResetTokenExpired));

    drop(client);
    db.close().await.expect("drop test database");
}
