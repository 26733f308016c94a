//! Shared helper functions for Rocket route handlers.

use uuid::Uuid;

use crate::error::ApiError;

/// Mint an external entity identifier: prefix plus the first eight hex
/// digits of a fresh UUID, uppercased (`PAT-9F21A3C0`).
pub fn mint_entity_id(prefix: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string()[..8].to_uppercase();
    format!("{}-{}", prefix, suffix)
}

/// Appointment status vocabulary and legal transitions.
pub fn check_appointment_transition(current: &str, next: &str) -> Result<(), ApiError> {
    const TERMINAL: &[&str] = &["COMPLETED", "CANCELLED"];
    match next {
        "COMPLETED" | "CANCELLED" if current == "CONFIRMED" => Ok(()),
        "COMPLETED" | "CANCELLED" | "CONFIRMED" if TERMINAL.contains(&current) => Err(
            ApiError::Conflict(format!("appointment is already {}", current.to_lowercase())),
        ),
        "CONFIRMED" if current == "CONFIRMED" => Err(ApiError::Conflict(
            "appointment is already confirmed".to_string(),
        )),
        _ => Err(ApiError::BadRequest(format!(
            "unknown appointment status '{}'",
            next
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_ids_are_prefixed_and_fixed_width() {
        let id = mint_entity_id("PAT");
        assert!(id.starts_with("PAT-"));
        assert_eq!(id.len(), 12);
    }

    #[test]
    fn appointment_transitions_are_closed() {
        assert!(check_appointment_transition("CONFIRMED", "COMPLETED").is_ok());
        assert!(check_appointment_transition("CONFIRMED", "CANCELLED").is_ok());
        assert!(check_appointment_transition("COMPLETED", "CANCELLED").is_err());
        assert!(check_appointment_transition("CANCELLED", "CONFIRMED").is_err());
        assert!(check_appointment_transition("CONFIRMED", "DONE").is_err());
    }
}
