//! Field-level validation helpers for the inventory domain

use rust_decimal::Decimal;

use crate::error::{DomainError, DomainResult};

/// Validate slug format: ASCII letters, digits, hyphens and underscores
pub fn validate_slug(slug: &str) -> DomainResult<()> {
    if slug.is_empty() {
        return Err(DomainError::validation("slug", "Slug cannot be empty"));
    }
    if slug.len() > 50 {
        return Err(DomainError::validation("slug", "Slug must be at most 50 characters"));
    }
    if !slug
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(DomainError::validation(
            "slug",
            "Slug may only contain letters, digits, hyphens and underscores",
        ));
    }
    Ok(())
}

/// Validate a catalog name: non-blank and at most `max_len` characters
pub fn validate_catalog_name(field: &str, name: &str, max_len: usize) -> DomainResult<()> {
    if name.trim().is_empty() {
        return Err(DomainError::validation(field, "Name cannot be empty"));
    }
    if name.chars().count() > max_len {
        return Err(DomainError::validation(
            field,
            format!("Name must be at most {} characters", max_len),
        ));
    }
    Ok(())
}

/// Validate a warehouse level label (a single letter)
pub fn validate_level_label(level: &str) -> DomainResult<()> {
    let mut chars = level.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_alphabetic() => Ok(()),
        _ => Err(DomainError::validation("level", "Level must be a single letter")),
    }
}

/// Validate a quantity is at least `min`
pub fn validate_quantity(value: i64, min: i64) -> DomainResult<()> {
    if value < min {
        return Err(DomainError::InvalidQuantity { min, got: value });
    }
    Ok(())
}

/// Validate a money amount: non-negative and within `max_digits` total digits, 2 decimals
pub fn validate_amount(field: &str, amount: Decimal, max_digits: u32) -> DomainResult<()> {
    if amount < Decimal::ZERO {
        return Err(DomainError::validation(field, "Amount cannot be negative"));
    }
    if amount.scale() > 2 && amount != amount.round_dp(2) {
        return Err(DomainError::validation(field, "Amount allows at most 2 decimal places"));
    }
    let limit = Decimal::from(10i64.pow(max_digits - 2));
    if amount >= limit {
        return Err(DomainError::validation(
            field,
            format!("Amount must be below {}", limit),
        ));
    }
    Ok(())
}
