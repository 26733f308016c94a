//! Receptionist endpoints: patient registration, appointment booking,
//! billing, and bed/room inventory.

use chrono::{DateTime, NaiveDate, Utc};
use rocket::serde::json::Json;
use rocket::{State, get, post, put};
use rocket_okapi::okapi::schemars::JsonSchema;
use rocket_okapi::openapi;
use serde::Deserialize;
use sqlx::PgPool;

use crate::auth::RequireReceptionist;
use crate::error::ApiError;
use crate::models::{ApiResponse, Appointment, Bed, Billing, Patient, Room};
use crate::routes::helpers::mint_entity_id;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct NewPatientRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub gender: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub blood_group: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdatePatientRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub blood_group: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct NewAppointmentRequest {
    pub patient_id: i32,
    pub doctor_id: i32,
    pub scheduled_at: DateTime<Utc>,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct NewBillingRequest {
    pub patient_id: i32,
    pub description: Option<String>,
    pub amount: f64,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct PayBillingRequest {
    pub payment_method: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AssignBedRequest {
    pub patient_id: i32,
}

#[openapi(tag = "Receptionist")]
#[post("/receptionist/patients", data = "<payload>")]
pub async fn register_patient(
    receptionist: RequireReceptionist,
    pool: &State<PgPool>,
    payload: Json<NewPatientRequest>,
) -> Result<Json<ApiResponse<Patient>>, ApiError> {
    let payload = payload.into_inner();
    if payload.first_name.trim().is_empty() || payload.last_name.trim().is_empty() {
        return Err(ApiError::BadRequest("Patient name is required".into()));
    }

    let patient = sqlx::query_as::<_, Patient>(
        r#"
        INSERT INTO patients
            (patient_id, first_name, last_name, email, phone_number, address,
             gender, date_of_birth, blood_group, status, registered_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'ACTIVE', $10)
        RETURNING *
        "#,
    )
    .bind(mint_entity_id("PAT"))
    .bind(payload.first_name.trim())
    .bind(payload.last_name.trim())
    .bind(&payload.email)
    .bind(&payload.phone_number)
    .bind(&payload.address)
    .bind(&payload.gender)
    .bind(payload.date_of_birth)
    .bind(&payload.blood_group)
    .bind(receptionist.0.id)
    .fetch_one(pool.inner())
    .await?;

    log::info!(
        "patient {} registered by {}",
        patient.patient_id,
        receptionist.0.user_id
    );
    Ok(Json(ApiResponse::new(patient)))
}

#[openapi(tag = "Receptionist")]
#[get("/receptionist/patients?<search>")]
pub async fn list_patients(
    _receptionist: RequireReceptionist,
    pool: &State<PgPool>,
    search: Option<String>,
) -> Result<Json<ApiResponse<Vec<Patient>>>, ApiError> {
    let pattern = search.map(|s| format!("%{}%", s));
    let patients = sqlx::query_as::<_, Patient>(
        r#"
        SELECT * FROM patients
        WHERE $1::text IS NULL
           OR first_name ILIKE $1 OR last_name ILIKE $1 OR patient_id ILIKE $1
        ORDER BY last_name, first_name
        "#,
    )
    .bind(pattern)
    .fetch_all(pool.inner())
    .await?;

    Ok(Json(ApiResponse::new(patients)))
}

#[openapi(tag = "Receptionist")]
#[put("/receptionist/patients/<patient_id>", data = "<payload>")]
pub async fn update_patient(
    _receptionist: RequireReceptionist,
    pool: &State<PgPool>,
    patient_id: &str,
    payload: Json<UpdatePatientRequest>,
) -> Result<Json<ApiResponse<Patient>>, ApiError> {
    let payload = payload.into_inner();
    if let Some(status) = payload.status.as_deref() {
        if !matches!(status, "ACTIVE" | "DISCHARGED" | "DECEASED") {
            return Err(ApiError::BadRequest(format!(
                "unknown patient status '{}'",
                status
            )));
        }
    }

    let patient = sqlx::query_as::<_, Patient>(
        r#"
        UPDATE patients SET
            first_name = COALESCE($2, first_name),
            last_name = COALESCE($3, last_name),
            email = COALESCE($4, email),
            phone_number = COALESCE($5, phone_number),
            address = COALESCE($6, address),
            blood_group = COALESCE($7, blood_group),
            status = COALESCE($8, status),
            updated_at = $9
        WHERE patient_id = $1
        RETURNING *
        "#,
    )
    .bind(patient_id)
    .bind(payload.first_name)
    .bind(payload.last_name)
    .bind(payload.email)
    .bind(payload.phone_number)
    .bind(payload.address)
    .bind(payload.blood_group)
    .bind(payload.status)
    .bind(Utc::now())
    .fetch_optional(pool.inner())
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("Patient '{}' not found", patient_id)))?;

    Ok(Json(ApiResponse::new(patient)))
}

#[openapi(tag = "Receptionist")]
#[post("/receptionist/appointments", data = "<payload>")]
pub async fn book_appointment(
    _receptionist: RequireReceptionist,
    pool: &State<PgPool>,
    payload: Json<NewAppointmentRequest>,
) -> Result<Json<ApiResponse<Appointment>>, ApiError> {
    let payload = payload.into_inner();

    let doctor_role: Option<String> = sqlx::query_scalar("SELECT role FROM users WHERE id = $1")
        .bind(payload.doctor_id)
        .fetch_optional(pool.inner())
        .await?;
    match doctor_role.as_deref() {
        Some("DOCTOR") => {}
        Some(_) => {
            return Err(ApiError::BadRequest(
                "Appointments can only be booked with doctors".into(),
            ));
        }
        None => {
            return Err(ApiError::NotFound(format!(
                "Doctor {} not found",
                payload.doctor_id
            )));
        }
    }

    let appointment = sqlx::query_as::<_, Appointment>(
        r#"
        INSERT INTO appointments
            (appointment_id, patient_id, doctor_id, scheduled_at, reason, status)
        VALUES ($1, $2, $3, $4, $5, 'CONFIRMED')
        RETURNING *
        "#,
    )
    .bind(mint_entity_id("APT"))
    .bind(payload.patient_id)
    .bind(payload.doctor_id)
    .bind(payload.scheduled_at)
    .bind(&payload.reason)
    .fetch_one(pool.inner())
    .await?;

    Ok(Json(ApiResponse::new(appointment)))
}

#[openapi(tag = "Receptionist")]
#[put("/receptionist/appointments/<appointment_id>/cancel")]
pub async fn cancel_appointment(
    _receptionist: RequireReceptionist,
    pool: &State<PgPool>,
    appointment_id: &str,
) -> Result<Json<ApiResponse<Appointment>>, ApiError> {
    let appointment = sqlx::query_as::<_, Appointment>(
        r#"
        UPDATE appointments SET status = 'CANCELLED', updated_at = $2
        WHERE appointment_id = $1 AND status = 'CONFIRMED'
        RETURNING *
        "#,
    )
    .bind(appointment_id)
    .bind(Utc::now())
    .fetch_optional(pool.inner())
    .await?
    .ok_or_else(|| {
        ApiError::Conflict(format!(
            "Appointment '{}' not found or not cancellable",
            appointment_id
        ))
    })?;

    Ok(Json(ApiResponse::new(appointment)))
}

#[openapi(tag = "Receptionist")]
#[post("/receptionist/billings", data = "<payload>")]
pub async fn create_billing(
    receptionist: RequireReceptionist,
    pool: &State<PgPool>,
    payload: Json<NewBillingRequest>,
) -> Result<Json<ApiResponse<Billing>>, ApiError> {
    let payload = payload.into_inner();
    if payload.amount <= 0.0 {
        return Err(ApiError::BadRequest("Amount must be positive".into()));
    }

    let billing = sqlx::query_as::<_, Billing>(
        r#"
        INSERT INTO billings (billing_id, patient_id, description, amount, payment_status, created_by)
        VALUES ($1, $2, $3, $4, 'PENDING', $5)
        RETURNING *
        "#,
    )
    .bind(mint_entity_id("BIL"))
    .bind(payload.patient_id)
    .bind(&payload.description)
    .bind(payload.amount)
    .bind(receptionist.0.id)
    .fetch_one(pool.inner())
    .await?;

    Ok(Json(ApiResponse::new(billing)))
}

#[openapi(tag = "Receptionist")]
#[put("/receptionist/billings/<billing_id>/pay", data = "<payload>")]
pub async fn settle_billing(
    _receptionist: RequireReceptionist,
    pool: &State<PgPool>,
    billing_id: &str,
    payload: Json<PayBillingRequest>,
) -> Result<Json<ApiResponse<Billing>>, ApiError> {
    let billing = sqlx::query_as::<_, Billing>(
        r#"
        UPDATE billings SET payment_status = 'PAID', payment_method = $2, paid_at = $3
        WHERE billing_id = $1 AND payment_status = 'PENDING'
        RETURNING *
        "#,
    )
    .bind(billing_id)
    .bind(&payload.payment_method)
    .bind(Utc::now())
    .fetch_optional(pool.inner())
    .await?
    .ok_or_else(|| {
        ApiError::Conflict(format!("Billing '{}' not found or already paid", billing_id))
    })?;

    Ok(Json(ApiResponse::new(billing)))
}

#[openapi(tag = "Receptionist")]
#[get("/receptionist/billings?<status>")]
pub async fn list_billings(
    _receptionist: RequireReceptionist,
    pool: &State<PgPool>,
    status: Option<String>,
) -> Result<Json<ApiResponse<Vec<Billing>>>, ApiError> {
    let billings = sqlx::query_as::<_, Billing>(
        "SELECT * FROM billings WHERE $1::text IS NULL OR payment_status = $1 ORDER BY billed_at DESC",
    )
    .bind(status)
    .fetch_all(pool.inner())
    .await?;

    Ok(Json(ApiResponse::new(billings)))
}

#[openapi(tag = "Receptionist")]
#[get("/receptionist/rooms")]
pub async fn list_rooms(
    _receptionist: RequireReceptionist,
    pool: &State<PgPool>,
) -> Result<Json<ApiResponse<Vec<Room>>>, ApiError> {
    let rooms = sqlx::query_as::<_, Room>("SELECT * FROM rooms ORDER BY room_number")
        .fetch_all(pool.inner())
        .await?;
    Ok(Json(ApiResponse::new(rooms)))
}

#[openapi(tag = "Receptionist")]
#[get("/receptionist/beds?<status>")]
pub async fn list_beds(
    _receptionist: RequireReceptionist,
    pool: &State<PgPool>,
    status: Option<String>,
) -> Result<Json<ApiResponse<Vec<Bed>>>, ApiError> {
    let beds = sqlx::query_as::<_, Bed>(
        "SELECT * FROM beds WHERE $1::text IS NULL OR status = $1 ORDER BY bed_number",
    )
    .bind(status)
    .fetch_all(pool.inner())
    .await?;
    Ok(Json(ApiResponse::new(beds)))
}

/// Assign a free bed to a patient. The conditional update keeps two
/// receptionists from claiming the same bed.
#[openapi(tag = "Receptionist")]
#[put("/receptionist/beds/<bed_number>/assign", data = "<payload>")]
pub async fn assign_bed(
    _receptionist: RequireReceptionist,
    pool: &State<PgPool>,
    bed_number: &str,
    payload: Json<AssignBedRequest>,
) -> Result<Json<ApiResponse<Bed>>, ApiError> {
    let bed = sqlx::query_as::<_, Bed>(
        r#"
        UPDATE beds SET status = 'OCCUPIED', patient_id = $2
        WHERE bed_number = $1 AND status = 'AVAILABLE'
        RETURNING *
        "#,
    )
    .bind(bed_number)
    .bind(payload.patient_id)
    .fetch_optional(pool.inner())
    .await?
    .ok_or_else(|| {
        ApiError::Conflict(format!("Bed '{}' not found or not available", bed_number))
    })?;

    Ok(Json(ApiResponse::new(bed)))
}

#[openapi(tag = "Receptionist")]
#[put("/receptionist/beds/<bed_number>/release")]
pub async fn release_bed(
    _receptionist: RequireReceptionist,
    pool: &State<PgPool>,
    bed_number: &str,
) -> Result<Json<ApiResponse<Bed>>, ApiError> {
    let bed = sqlx::query_as::<_, Bed>(
        r#"
        UPDATE beds SET status = 'AVAILABLE', patient_id = NULL
        WHERE bed_number = $1 AND status = 'OCCUPIED'
        RETURNING *
        "#,
    )
    .bind(bed_number)
    .fetch_optional(pool.inner())
    .await?
    .ok_or_else(|| ApiError::Conflict(format!("Bed '{}' not found or not occupied", bed_number)))?;

    Ok(Json(ApiResponse::new(bed)))
}
