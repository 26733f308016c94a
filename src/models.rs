use chrono::{DateTime, NaiveDate, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Uniform envelope for successful responses.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ApiResponse<T> {
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

// ===== Identity =====

/// A staff identity. `role` is stored as the uppercase token of
/// [`crate::auth::policy::Role`]; `password_hash` never leaves the server.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, JsonSchema)]
pub struct User {
    pub id: i32,
    pub user_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: String,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub gender: Option<String>,
    pub specialization: Option<String>,
    pub license_number: Option<String>,
    pub qualification: Option<String>,
    pub shift: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ===== Clinical Entities =====

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, JsonSchema)]
pub struct Patient {
    pub id: i32,
    pub patient_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub gender: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub blood_group: Option<String>,
    pub status: String,
    pub registered_by: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, JsonSchema)]
pub struct Appointment {
    pub id: i32,
    pub appointment_id: String,
    pub patient_id: i32,
    pub doctor_id: i32,
    pub scheduled_at: DateTime<Utc>,
    pub reason: Option<String>,
    pub status: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, JsonSchema)]
pub struct Medicine {
    pub id: i32,
    pub medicine_id: String,
    pub name: String,
    pub category: Option<String>,
    pub manufacturer: Option<String>,
    pub batch_number: Option<String>,
    pub unit_price: f64,
    pub stock: i32,
    pub expiry_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, JsonSchema)]
pub struct Prescription {
    pub id: i32,
    pub prescription_id: String,
    pub patient_id: i32,
    pub doctor_id: i32,
    pub status: String,
    pub notes: Option<String>,
    pub prescribed_at: DateTime<Utc>,
    pub dispensed_at: Option<DateTime<Utc>>,
    pub dispensed_by: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, JsonSchema)]
pub struct PrescriptionItem {
    pub id: i32,
    pub prescription_id: i32,
    pub medicine_id: i32,
    pub dosage: Option<String>,
    pub frequency: Option<String>,
    pub duration_days: Option<i32>,
    pub quantity: i32,
}

/// A prescription with its line items, as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PrescriptionWithItems {
    #[serde(flatten)]
    pub prescription: Prescription,
    pub items: Vec<PrescriptionItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, JsonSchema)]
pub struct Billing {
    pub id: i32,
    pub billing_id: String,
    pub patient_id: i32,
    pub description: Option<String>,
    pub amount: f64,
    pub payment_status: String,
    pub payment_method: Option<String>,
    pub created_by: Option<i32>,
    pub billed_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, JsonSchema)]
pub struct Room {
    pub id: i32,
    pub room_number: String,
    pub room_type: String,
    pub daily_rate: f64,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, JsonSchema)]
pub struct Bed {
    pub id: i32,
    pub bed_number: String,
    pub room_id: i32,
    pub status: String,
    pub patient_id: Option<i32>,
}
