//! WebAssembly module for the inventory grid
//!
//! Provides client-side checks for:
//! - Device type slugs and triage codes
//! - Stage/state admissibility
//! - Intake detail pricing
//! - Grid edits before they are saved

use rust_decimal::Decimal;
use std::str::FromStr;
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::models::*;
pub use shared::types::*;
pub use shared::validation::*;

fn js_error(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// Device kind declared by a type slug, e.g. "M" -> "monitor"
#[wasm_bindgen]
pub fn resolve_device_kind(slug: &str) -> Result<String, JsValue> {
    resolve_specialization(slug)
        .map(|kind| kind.as_str().to_string())
        .map_err(js_error)
}

/// Slugs a triaged device type may use, comma separated
#[wasm_bindgen]
pub fn device_type_slugs() -> String {
    registered_slugs().join(",")
}

/// Whether a device in `stage` may hold `state`; unknown names are never admitted
#[wasm_bindgen]
pub fn stage_admits(stage: &str, state: &str) -> bool {
    match (DeviceStage::from_str(stage), DeviceState::from_str(state)) {
        (Some(stage), Some(state)) => stage.admits(state),
        _ => false,
    }
}

/// Kind of a triage code such as "CPU-12", or an empty string when malformed
#[wasm_bindgen]
pub fn triage_kind(code: &str) -> String {
    parse_triage(code.trim())
        .map(|(kind, _)| kind.as_str().to_string())
        .unwrap_or_default()
}

/// Validate an intake detail before it is sent to the server
#[wasm_bindgen]
pub fn check_intake_detail(detail_json: &str, priced: bool) -> Result<(), JsValue> {
    let detail: NewIntakeDetail = serde_json::from_str(detail_json)
        .map_err(|e| JsValue::from_str(&format!("Invalid detail JSON: {}", e)))?;
    detail.validate(priced).map_err(js_error)
}

/// Unit price shown next to the subtotal field
#[wasm_bindgen]
pub fn intake_unit_price(subtotal: &str, total: i32) -> String {
    Decimal::from_str(subtotal)
        .map(|s| unit_price(s, total).to_string())
        .unwrap_or_default()
}

/// Apply a grid edit to a device and return the edited device as JSON
#[wasm_bindgen]
pub fn preview_device_patch(device_json: &str, patch_json: &str) -> Result<String, JsValue> {
    let mut device: Device = serde_json::from_str(device_json)
        .map_err(|e| JsValue::from_str(&format!("Invalid device JSON: {}", e)))?;
    let patch: DevicePatch = serde_json::from_str(patch_json)
        .map_err(|e| JsValue::from_str(&format!("Invalid patch JSON: {}", e)))?;

    patch.apply(&mut device).map_err(js_error)?;
    serde_json::to_string(&device).map_err(js_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_admits() {
        assert!(stage_admits("stored", "pending"));
        assert!(stage_admits("ready", "good"));
        assert!(!stage_admits("quality_control", "pending"));
        assert!(!stage_admits("warehouse", "good"));
    }

    #[test]
    fn test_triage_kind() {
        assert_eq!(triage_kind("CPU-12"), "cpu");
        assert_eq!(triage_kind(" AP-3 "), "access_point");
        assert_eq!(triage_kind("CPU-0"), "");
        assert_eq!(triage_kind("garbage"), "");
    }

    #[test]
    fn test_intake_unit_price() {
        assert_eq!(intake_unit_price("100", 3), "33.33");
        assert_eq!(intake_unit_price("abc", 4), "");
    }

    #[test]
    fn test_device_type_slugs() {
        let slugs = device_type_slugs();
        assert!(slugs.split(',').any(|s| s == "HDD"));
    }
}
