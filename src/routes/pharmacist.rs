//! Pharmacist endpoints: medicine inventory and prescription dispensing.

use chrono::{NaiveDate, Utc};
use rocket::serde::json::Json;
use rocket::{State, delete, get, post, put};
use rocket_okapi::okapi::schemars::JsonSchema;
use rocket_okapi::openapi;
use serde::Deserialize;
use sqlx::PgPool;

use crate::auth::RequirePharmacist;
use crate::error::ApiError;
use crate::models::{ApiResponse, Medicine, Prescription, PrescriptionItem, PrescriptionWithItems};
use crate::routes::helpers::mint_entity_id;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct NewMedicineRequest {
    pub name: String,
    pub category: Option<String>,
    pub manufacturer: Option<String>,
    pub batch_number: Option<String>,
    pub unit_price: f64,
    pub stock: i32,
    pub expiry_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateMedicineRequest {
    pub name: Option<String>,
    pub category: Option<String>,
    pub manufacturer: Option<String>,
    pub batch_number: Option<String>,
    pub unit_price: Option<f64>,
    pub stock: Option<i32>,
    pub expiry_date: Option<NaiveDate>,
}

/// List the medicine inventory. `low_stock` keeps rows at or below the
/// given stock level; `expiring_before` (YYYY-MM-DD) keeps rows whose
/// expiry date falls before the given date.
#[openapi(tag = "Pharmacist")]
#[get("/pharmacist/medicines?<search>&<category>&<low_stock>&<expiring_before>")]
pub async fn list_medicines(
    _pharmacist: RequirePharmacist,
    pool: &State<PgPool>,
    search: Option<String>,
    category: Option<String>,
    low_stock: Option<i32>,
    expiring_before: Option<String>,
) -> Result<Json<ApiResponse<Vec<Medicine>>>, ApiError> {
    let expiring_before = expiring_before
        .map(|value| {
            NaiveDate::parse_from_str(&value, "%Y-%m-%d").map_err(|_| {
                ApiError::BadRequest(format!("invalid date '{}', expected YYYY-MM-DD", value))
            })
        })
        .transpose()?;
    let pattern = search.map(|s| format!("%{}%", s));
    let medicines = sqlx::query_as::<_, Medicine>(
        r#"
        SELECT * FROM medicines
        WHERE ($1::text IS NULL OR name ILIKE $1 OR manufacturer ILIKE $1)
          AND ($2::text IS NULL OR category = $2)
          AND ($3::integer IS NULL OR stock <= $3)
          AND ($4::date IS NULL OR (expiry_date IS NOT NULL AND expiry_date < $4))
        ORDER BY name
        "#,
    )
    .bind(pattern)
    .bind(category)
    .bind(low_stock)
    .bind(expiring_before)
    .fetch_all(pool.inner())
    .await?;

    Ok(Json(ApiResponse::new(medicines)))
}

#[openapi(tag = "Pharmacist")]
#[post("/pharmacist/medicines", data = "<payload>")]
pub async fn create_medicine(
    pharmacist: RequirePharmacist,
    pool: &State<PgPool>,
    payload: Json<NewMedicineRequest>,
) -> Result<Json<ApiResponse<Medicine>>, ApiError> {
    let payload = payload.into_inner();
    if payload.name.trim().is_empty() {
        return Err(ApiError::BadRequest("Medicine name is required".into()));
    }
    if payload.unit_price < 0.0 || payload.stock < 0 {
        return Err(ApiError::BadRequest(
            "Price and stock must be non-negative".into(),
        ));
    }

    let medicine = sqlx::query_as::<_, Medicine>(
        r#"
        INSERT INTO medicines
            (medicine_id, name, category, manufacturer, batch_number, unit_price, stock, expiry_date)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(mint_entity_id("MED"))
    .bind(payload.name.trim())
    .bind(&payload.category)
    .bind(&payload.manufacturer)
    .bind(&payload.batch_number)
    .bind(payload.unit_price)
    .bind(payload.stock)
    .bind(payload.expiry_date)
    .fetch_one(pool.inner())
    .await?;

    log::info!(
        "medicine {} added by {}",
        medicine.medicine_id,
        pharmacist.0.user_id
    );
    Ok(Json(ApiResponse::new(medicine)))
}

#[openapi(tag = "Pharmacist")]
#[put("/pharmacist/medicines/<medicine_id>", data = "<payload>")]
pub async fn update_medicine(
    _pharmacist: RequirePharmacist,
    pool: &State<PgPool>,
    medicine_id: &str,
    payload: Json<UpdateMedicineRequest>,
) -> Result<Json<ApiResponse<Medicine>>, ApiError> {
    let payload = payload.into_inner();
    let medicine = sqlx::query_as::<_, Medicine>(
        r#"
        UPDATE medicines SET
            name = COALESCE($2, name),
            category = COALESCE($3, category),
            manufacturer = COALESCE($4, manufacturer),
            batch_number = COALESCE($5, batch_number),
            unit_price = COALESCE($6, unit_price),
            stock = COALESCE($7, stock),
            expiry_date = COALESCE($8, expiry_date),
            updated_at = $9
        WHERE medicine_id = $1
        RETURNING *
        "#,
    )
    .bind(medicine_id)
    .bind(payload.name)
    .bind(payload.category)
    .bind(payload.manufacturer)
    .bind(payload.batch_number)
    .bind(payload.unit_price)
    .bind(payload.stock)
    .bind(payload.expiry_date)
    .bind(Utc::now())
    .fetch_optional(pool.inner())
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("Medicine '{}' not found", medicine_id)))?;

    Ok(Json(ApiResponse::new(medicine)))
}

#[openapi(tag = "Pharmacist")]
#[delete("/pharmacist/medicines/<medicine_id>")]
pub async fn delete_medicine(
    _pharmacist: RequirePharmacist,
    pool: &State<PgPool>,
    medicine_id: &str,
) -> Result<Json<ApiResponse<String>>, ApiError> {
    let result = sqlx::query("DELETE FROM medicines WHERE medicine_id = $1")
        .bind(medicine_id)
        .execute(pool.inner())
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound(format!(
            "Medicine '{}' not found",
            medicine_id
        )));
    }

    Ok(Json(ApiResponse::new(medicine_id.to_string())))
}

#[openapi(tag = "Pharmacist")]
#[get("/pharmacist/prescriptions?<status>")]
pub async fn list_prescriptions(
    _pharmacist: RequirePharmacist,
    pool: &State<PgPool>,
    status: Option<String>,
) -> Result<Json<ApiResponse<Vec<Prescription>>>, ApiError> {
    let prescriptions = sqlx::query_as::<_, Prescription>(
        r#"
        SELECT * FROM prescriptions
        WHERE $1::text IS NULL OR status = $1
        ORDER BY prescribed_at
        "#,
    )
    .bind(status)
    .fetch_all(pool.inner())
    .await?;

    Ok(Json(ApiResponse::new(prescriptions)))
}

/// Dispense a pending prescription: decrement stock for every item and mark
/// the prescription DISPENSED, all in one transaction. Insufficient stock
/// for any item aborts the whole dispense.
#[openapi(tag = "Pharmacist")]
#[put("/pharmacist/prescriptions/<prescription_id>/dispense")]
pub async fn dispense_prescription(
    pharmacist: RequirePharmacist,
    pool: &State<PgPool>,
    prescription_id: &str,
) -> Result<Json<ApiResponse<PrescriptionWithItems>>, ApiError> {
    let mut tx = pool.inner().begin().await?;

    let prescription = sqlx::query_as::<_, Prescription>(
        "SELECT * FROM prescriptions WHERE prescription_id = $1 FOR UPDATE",
    )
    .bind(prescription_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("Prescription '{}' not found", prescription_id)))?;

    if prescription.status != "PENDING" {
        return Err(ApiError::Conflict(format!(
            "prescription is already {}",
            prescription.status.to_lowercase()
        )));
    }

    let items = sqlx::query_as::<_, PrescriptionItem>(
        "SELECT * FROM prescription_items WHERE prescription_id = $1",
    )
    .bind(prescription.id)
    .fetch_all(&mut *tx)
    .await?;

    for item in &items {
        let updated = sqlx::query(
            "UPDATE medicines SET stock = stock - $1, updated_at = $2
             WHERE id = $3 AND stock >= $1",
        )
        .bind(item.quantity)
        .bind(Utc::now())
        .bind(item.medicine_id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(ApiError::Conflict(format!(
                "insufficient stock for medicine {}",
                item.medicine_id
            )));
        }
    }

    let dispensed = sqlx::query_as::<_, Prescription>(
        r#"
        UPDATE prescriptions
        SET status = 'DISPENSED', dispensed_at = $2, dispensed_by = $3
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(prescription.id)
    .bind(Utc::now())
    .bind(pharmacist.0.id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    log::info!(
        "prescription {} dispensed by {}",
        dispensed.prescription_id,
        pharmacist.0.user_id
    );

    Ok(Json(ApiResponse::new(PrescriptionWithItems {
        prescription: dispensed,
        items,
    })))
}
