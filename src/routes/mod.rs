//! HTTP route handlers grouped by role prefix.
//!
//! Each submodule maps to one role-gated area of the API (`/admin`,
//! `/doctor`, `/pharmacist`, `/receptionist`) and exposes typed Rocket
//! handlers annotated with `#[openapi]` so `rocket_okapi` can derive an
//! OpenAPI document automatically. Role enforcement happens in the guards;
//! a handler here never sees a request from the wrong role.

pub mod admin;
pub mod doctor;
pub mod health;
pub(crate) mod helpers;
pub mod pharmacist;
pub mod receptionist;
