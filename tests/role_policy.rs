//! Role-gated route access: matching roles pass, mismatched roles get 403
//! with no handler side effect. Requires `TEST_DATABASE_URL`; tests skip
//! when it is unset.

use std::sync::Arc;

use hospital_api::auth::Role;
use hospital_api::auth::mailer::RecordingMailer;
use hospital_api::routes::{admin, doctor, receptionist};
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

fn bearer(token: &str) -> Header<'static> {
    Header::new("Authorization", format!("Bearer {}", token))
}

#[tokio::test]
async fn admin_routes_reject_other_roles_without_side_effects() {
    let Some(db) = provision_db("admin_routes_reject_other_roles_without_side_effects").await
    else {
        return;
    };
    let state = test_auth_state(Arc::new(RecordingMailer::new()));
    let fixtures = TestFixtures::new(db.pool());
    fixtures
        .create_user(&state, "admin@hospital.test", "password", Role::Admin)
        .await;
    fixtures
        .create_user(&state, "doc@hospital.test", "password", Role::Doctor)
        .await;

    let client: Client = TestRocketBuilder::new()
        .manage_pg_pool(db.pool_clone())
        .manage_auth_state(state.clone())
        .mount_api_routes(routes![
            admin::list_users,
            admin::get_user,
            admin::delete_user
        ])
        .async_client()
        .await;

    let admin_token = state
        .token_service
        .issue("admin@hospital.test", Role::Admin)
        .expect("issue token")
        .token;
    let doctor_token = state
        .token_service
        .issue("doc@hospital.test", Role::Doctor)
        .expect("issue token")
        .token;

    // Matching role passes.
    let mut response = client
        .get("/api/admin/users")
        .header(bearer(&admin_token))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let body: Value = response.into_json().await.expect("json body");
    let users = body["data"].as_array().expect("user list");
    assert_eq!(users.len(), 2);

    // A valid doctor token on an admin route is forbidden, not unauthorized.
    response = client
        .get("/api/admin/users")
        .header(bearer(&doctor_token))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Forbidden);

    // The forbidden delete leaves the row untouched.
    let admin_external_id: String =
        sqlx::query_scalar("SELECT user_id FROM users WHERE email = 'admin@hospital.test'")
            .fetch_one(db.pool())
            .await
            .expect("admin row");

    // Lookup by external id works for the matching role; unknown ids 404.
    response = client
        .get(format!("/api/admin/users/{}", admin_external_id))
        .header(bearer(&admin_token))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let body: Value = response.into_json().await.expect("json body");
    assert_eq!(body["data"]["email"], "admin@hospital.test");

    response = client
        .get("/api/admin/users/ADM-00000000")
        .header(bearer(&admin_token))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::NotFound);
    response = client
        .delete(format!("/api/admin/users/{}", admin_external_id))
        .header(bearer(&doctor_token))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Forbidden);

    let still_there: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE user_id = $1")
        .bind(&admin_external_id)
        .fetch_one(db.pool())
        .await
        .expect("count");
    assert_eq!(still_there, 1);

    // No token at all is a plain 401.
    response = client.get("/api/admin/users").dispatch().await;
    assert_eq!(response.status(), Status::Unauthorized);

    drop(response);
    drop(client);
    db.close().await.expect("drop test database");
}

#[tokio::test]
async fn doctor_workflow_is_scoped_to_the_authenticated_doctor() {
    let Some(db) = provision_db("doctor_workflow_is_scoped_to_the_authenticated_doctor").await
    else {
        return;
    };
    let state = test_auth_state(Arc::new(RecordingMailer::new()));
    let fixtures = TestFixtures::new(db.pool());
    fixtures
        .create_user(&state, "dr.a@hospital.test", "password", Role::Doctor)
        .await;
    fixtures
        .create_user(&state, "rcp@hospital.test", "password", Role::Receptionist)
        .await;
    let patient_id = fixtures.create_patient("Jane", "Doe").await;
    let medicine_id: i32 = sqlx::query_scalar(
        r#"
        INSERT INTO medicines (medicine_id, name, unit_price, stock)
        VALUES ('MED-TEST0001', 'Paracetamol 500mg', 0.50, 100)
        RETURNING id
        "#,
    )
    .fetch_one(db.pool())
    .await
    .expect("insert medicine");

    let client: Client = TestRocketBuilder::new()
        .manage_pg_pool(db.pool_clone())
        .manage_auth_state(state.clone())
        .mount_api_routes(routes![
            doctor::create_prescription,
            doctor::list_prescriptions,
            receptionist::list_patients,
        ])
        .async_client()
        .await;

    let doctor_token = state
        .token_service
        .issue("dr.a@hospital.test", Role::Doctor)
        .expect("issue token")
        .token;

    // Doctors cannot use receptionist routes.
    let mut response = client
        .get("/api/receptionist/patients")
        .header(bearer(&doctor_token))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Forbidden);

    // But can prescribe for an existing patient.
    response = client
        .post("/api/doctor/prescriptions")
        .header(bearer(&doctor_token))
        .header(ContentType::JSON)
        .body(
            json!({
                "patient_id": patient_id,
                "notes": "bed rest",
                "items": [{ "medicine_id": medicine_id, "quantity": 2 }]
            })
            .to_string(),
        )
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let body: Value = response.into_json().await.expect("json body");
    assert_eq!(body["data"]["status"], "PENDING");
    assert_eq!(body["data"]["items"].as_array().map(Vec::len), Some(1));

    // The prescription is visible in the doctor's own listing.
    response = client
        .get("/api/doctor/prescriptions?status=PENDING")
        .header(bearer(&doctor_token))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let body: Value = response.into_json().await.expect("json body");
    assert_eq!(body["data"].as_array().map(Vec::len), Some(1));

    // A non-positive quantity never reaches the database.
    response = client
        .post("/api/doctor/prescriptions")
        .header(bearer(&doctor_token))
        .header(ContentType::JSON)
        .body(
            json!({
                "patient_id": patient_id,
                "items": [{ "medicine_id": medicine_id, "quantity": 0 }]
            })
            .to_string(),
        )
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::BadRequest);
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM prescriptions")
        .fetch_one(db.pool())
        .await
        .expect("count");
    assert_eq!(count, 1);

    drop(response);
    drop(client);
    db.close().await.expect("drop test database");
}
