//! Doctor endpoints: patient review, appointment workflow, prescribing.

use chrono::Utc;
use rocket::serde::json::Json;
use rocket::{State, get, post, put};
use rocket_okapi::okapi::schemars::JsonSchema;
use rocket_okapi::openapi;
use serde::Deserialize;
use sqlx::PgPool;

use crate::auth::RequireDoctor;
use crate::error::ApiError;
use crate::models::{
    ApiResponse, Appointment, Patient, Prescription, PrescriptionItem, PrescriptionWithItems,
};
use crate::routes::helpers::{check_appointment_transition, mint_entity_id};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AppointmentStatusRequest {
    pub status: String,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct NewPrescriptionItem {
    pub medicine_id: i32,
    pub dosage: Option<String>,
    pub frequency: Option<String>,
    pub duration_days: Option<i32>,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct NewPrescriptionRequest {
    pub patient_id: i32,
    pub notes: Option<String>,
    pub items: Vec<NewPrescriptionItem>,
}

#[openapi(tag = "Doctor")]
#[get("/doctor/patients?<search>")]
pub async fn list_patients(
    _doctor: RequireDoctor,
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

/// Appointments for the authenticated doctor only.
#[openapi(tag = "Doctor")]
#[get("/doctor/appointments?<status>")]
pub async fn list_appointments(
    doctor: RequireDoctor,
    pool: &State<PgPool>,
    status: Option<String>,
) -> Result<Json<ApiResponse<Vec<Appointment>>>, ApiError> {
    let appointments = sqlx::query_as::<_, Appointment>(
        r#"
        SELECT * FROM appointments
        WHERE doctor_id = $1 AND ($2::text IS NULL OR status = $2)
        ORDER BY scheduled_at
        "#,
    )
    .bind(doctor.0.id)
    .bind(status)
    .fetch_all(pool.inner())
    .await?;

    Ok(Json(ApiResponse::new(appointments)))
}

/// Move an appointment through its status machine
/// (CONFIRMED -> COMPLETED | CANCELLED).
#[openapi(tag = "Doctor")]
#[put("/doctor/appointments/<appointment_id>/status", data = "<payload>")]
pub async fn update_appointment_status(
    doctor: RequireDoctor,
    pool: &State<PgPool>,
    appointment_id: &str,
    payload: Json<AppointmentStatusRequest>,
) -> Result<Json<ApiResponse<Appointment>>, ApiError> {
    let current = sqlx::query_as::<_, Appointment>(
        "SELECT * FROM appointments WHERE appointment_id = $1 AND doctor_id = $2",
    )
    .bind(appointment_id)
    .bind(doctor.0.id)
    .fetch_optional(pool.inner())
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("Appointment '{}' not found", appointment_id)))?;

    check_appointment_transition(&current.status, &payload.status)?;

    let updated = sqlx::query_as::<_, Appointment>(
        r#"
        UPDATE appointments
        SET status = $2, notes = COALESCE($3, notes), updated_at = $4
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(current.id)
    .bind(&payload.status)
    .bind(&payload.notes)
    .bind(Utc::now())
    .fetch_one(pool.inner())
    .await?;

    Ok(Json(ApiResponse::new(updated)))
}

#[openapi(tag = "Doctor")]
#[post("/doctor/prescriptions", data = "<payload>")]
pub async fn create_prescription(
    doctor: RequireDoctor,
    pool: &State<PgPool>,
    payload: Json<NewPrescriptionRequest>,
) -> Result<Json<ApiResponse<PrescriptionWithItems>>, ApiError> {
    let payload = payload.into_inner();
    if payload.items.is_empty() {
        return Err(ApiError::BadRequest(
            "A prescription needs at least one item".to_string(),
        ));
    }
    for item in &payload.items {
        if item.quantity <= 0 {
            return Err(ApiError::BadRequest(
                "Item quantities must be positive".to_string(),
            ));
        }
    }

    let mut tx = pool.inner().begin().await?;

    let patient_exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM patients WHERE id = $1")
        .bind(payload.patient_id)
        .fetch_one(&mut *tx)
        .await?;
    if patient_exists == 0 {
        return Err(ApiError::NotFound(format!(
            "Patient {} not found",
            payload.patient_id
        )));
    }

    let prescription = sqlx::query_as::<_, Prescription>(
        r#"
        INSERT INTO prescriptions (prescription_id, patient_id, doctor_id, status, notes)
        VALUES ($1, $2, $3, 'PENDING', $4)
        RETURNING *
        "#,
    )
    .bind(mint_entity_id("RX"))
    .bind(payload.patient_id)
    .bind(doctor.0.id)
    .bind(&payload.notes)
    .fetch_one(&mut *tx)
    .await?;

    let mut items = Vec::with_capacity(payload.items.len());
    for item in payload.items {
        let row = sqlx::query_as::<_, PrescriptionItem>(
            r#"
            INSERT INTO prescription_items
                (prescription_id, medicine_id, dosage, frequency, duration_days, quantity)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(prescription.id)
        .bind(item.medicine_id)
        .bind(&item.dosage)
        .bind(&item.frequency)
        .bind(item.duration_days)
        .bind(item.quantity)
        .fetch_one(&mut *tx)
        .await?;
        items.push(row);
    }

    tx.commit().await?;

    log::info!(
        "prescription {} created by {}",
        prescription.prescription_id,
        doctor.0.user_id
    );

    Ok(Json(ApiResponse::new(PrescriptionWithItems {
        prescription,
        items,
    })))
}

#[openapi(tag = "Doctor")]
#[get("/doctor/prescriptions?<status>")]
pub async fn list_prescriptions(
    doctor: RequireDoctor,
    pool: &State<PgPool>,
    status: Option<String>,
) -> Result<Json<ApiResponse<Vec<Prescription>>>, ApiError> {
    let prescriptions = sqlx::query_as::<_, Prescription>(
        r#"
        SELECT * FROM prescriptions
        WHERE doctor_id = $1 AND ($2::text IS NULL OR status = $2)
        ORDER BY prescribed_at DESC
        "#,
    )
    .bind(doctor.0.id)
    .bind(status)
    .fetch_all(pool.inner())
    .await?;

    Ok(Json(ApiResponse::new(prescriptions)))
}
