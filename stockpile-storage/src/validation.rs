//! Input-shape validation for repository operations.
//!
//! Checks run before any mutation reaches the durable store, so a rejected
//! request has no store or cache side effects.

use stockpile_core::{NewRecord, RecordPatch, RecordQuery, ValidationError, MAX_PAGE_SIZE};

/// Minimum record-name length after trimming.
pub const NAME_MIN_LEN: usize = 2;
/// Maximum record-name length.
pub const NAME_MAX_LEN: usize = 100;
/// Minimum category length after trimming.
pub const CATEGORY_MIN_LEN: usize = 2;
/// Maximum category length.
pub const CATEGORY_MAX_LEN: usize = 50;

/// Validate a create request.
pub fn validate_new_record(new: &NewRecord) -> Result<(), ValidationError> {
    validate_name(&new.name)?;
    if let Some(category) = &new.category {
        validate_category(category)?;
    }
    if new.quantity < 0 {
        return Err(ValidationError::InvalidValue {
            field: "quantity".to_string(),
            reason: "must not be negative".to_string(),
        });
    }
    validate_price(new.price)?;
    if let Some(min_stock) = new.min_stock {
        validate_threshold("min_stock", min_stock)?;
    }
    if let Some(max_stock) = new.max_stock {
        validate_threshold("max_stock", max_stock)?;
    }
    if let (Some(min_stock), Some(max_stock)) = (new.min_stock, new.max_stock) {
        validate_stock_bounds(min_stock, max_stock)?;
    }
    Ok(())
}

/// Validate a field-update patch. The min/max cross-check against the stored
/// record happens in the repository, which knows the effective values.
pub fn validate_patch(patch: &RecordPatch) -> Result<(), ValidationError> {
    if patch.is_empty() {
        return Err(ValidationError::RequiredFieldMissing {
            field: "patch".to_string(),
        });
    }
    if let Some(name) = &patch.name {
        validate_name(name)?;
    }
    if let Some(category) = &patch.category {
        validate_category(category)?;
    }
    if let Some(price) = patch.price {
        validate_price(price)?;
    }
    if let Some(min_stock) = patch.min_stock {
        validate_threshold("min_stock", min_stock)?;
    }
    if let Some(max_stock) = patch.max_stock {
        validate_threshold("max_stock", max_stock)?;
    }
    Ok(())
}

/// Enforce `max_stock > min_stock`.
pub fn validate_stock_bounds(min_stock: i64, max_stock: i64) -> Result<(), ValidationError> {
    if max_stock <= min_stock {
        return Err(ValidationError::ConstraintViolation {
            constraint: "max_stock > min_stock".to_string(),
            reason: format!("max_stock {max_stock} must exceed min_stock {min_stock}"),
        });
    }
    Ok(())
}

/// A quantity adjustment must actually change something.
pub fn validate_quantity_delta(delta: i64) -> Result<(), ValidationError> {
    if delta == 0 {
        return Err(ValidationError::InvalidValue {
            field: "delta".to_string(),
            reason: "quantity change must not be zero".to_string(),
        });
    }
    Ok(())
}

/// Validate pagination bounds for listings and history.
pub fn validate_pagination(page: u32, page_size: u32) -> Result<(), ValidationError> {
    if page < 1 {
        return Err(ValidationError::InvalidValue {
            field: "page".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    if page_size < 1 || page_size > MAX_PAGE_SIZE {
        return Err(ValidationError::InvalidValue {
            field: "page_size".to_string(),
            reason: format!("must be between 1 and {MAX_PAGE_SIZE}"),
        });
    }
    Ok(())
}

/// Validate a full listing query.
pub fn validate_query(query: &RecordQuery) -> Result<(), ValidationError> {
    validate_pagination(query.page, query.page_size)
}

fn validate_name(name: &str) -> Result<(), ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::RequiredFieldMissing {
            field: "name".to_string(),
        });
    }
    if trimmed.len() < NAME_MIN_LEN || trimmed.len() > NAME_MAX_LEN {
        return Err(ValidationError::InvalidValue {
            field: "name".to_string(),
            reason: format!("must be between {NAME_MIN_LEN} and {NAME_MAX_LEN} characters"),
        });
    }
    Ok(())
}

fn validate_category(category: &str) -> Result<(), ValidationError> {
    let trimmed = category.trim();
    if trimmed.len() < CATEGORY_MIN_LEN || trimmed.len() > CATEGORY_MAX_LEN {
        return Err(ValidationError::InvalidValue {
            field: "category".to_string(),
            reason: format!(
                "must be between {CATEGORY_MIN_LEN} and {CATEGORY_MAX_LEN} characters"
            ),
        });
    }
    Ok(())
}

fn validate_price(price: f64) -> Result<(), ValidationError> {
    if !price.is_finite() || price < 0.0 {
        return Err(ValidationError::InvalidValue {
            field: "price".to_string(),
            reason: "must be a non-negative number".to_string(),
        });
    }
    Ok(())
}

fn validate_threshold(field: &str, value: i64) -> Result<(), ValidationError> {
    if value < 0 {
        return Err(ValidationError::InvalidValue {
            field: field.to_string(),
            reason: "must not be negative".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_new_record() -> NewRecord {
        NewRecord {
            name: "Hex bolt".to_string(),
            quantity: 10,
            price: 0.5,
            category: Some("fasteners".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_record_passes() {
        assert!(validate_new_record(&valid_new_record()).is_ok());
    }

    #[test]
    fn test_name_too_short() {
        let mut new = valid_new_record();
        new.name = "x".to_string();
        assert!(validate_new_record(&new).is_err());
    }

    #[test]
    fn test_name_whitespace_only_is_missing() {
        let mut new = valid_new_record();
        new.name = "   ".to_string();
        assert_eq!(
            validate_new_record(&new),
            Err(ValidationError::RequiredFieldMissing {
                field: "name".to_string()
            })
        );
    }

    #[test]
    fn test_negative_quantity_rejected() {
        let mut new = valid_new_record();
        new.quantity = -1;
        assert!(validate_new_record(&new).is_err());
    }

    #[test]
    fn test_nan_price_rejected() {
        let mut new = valid_new_record();
        new.price = f64::NAN;
        assert!(validate_new_record(&new).is_err());
    }

    #[test]
    fn test_stock_bounds_must_be_ordered() {
        let mut new = valid_new_record();
        new.min_stock = Some(100);
        new.max_stock = Some(100);
        assert!(validate_new_record(&new).is_err());

        new.max_stock = Some(101);
        assert!(validate_new_record(&new).is_ok());
    }

    #[test]
    fn test_empty_patch_rejected() {
        assert!(validate_patch(&RecordPatch::default()).is_err());
    }

    #[test]
    fn test_patch_with_bad_category_rejected() {
        let patch = RecordPatch {
            category: Some("x".to_string()),
            ..Default::default()
        };
        assert!(validate_patch(&patch).is_err());
    }

    #[test]
    fn test_zero_delta_rejected() {
        assert!(validate_quantity_delta(0).is_err());
        assert!(validate_quantity_delta(-5).is_ok());
        assert!(validate_quantity_delta(5).is_ok());
    }

    #[test]
    fn test_pagination_bounds() {
        assert!(validate_pagination(0, 10).is_err());
        assert!(validate_pagination(1, 0).is_err());
        assert!(validate_pagination(1, MAX_PAGE_SIZE + 1).is_err());
        assert!(validate_pagination(1, MAX_PAGE_SIZE).is_ok());
    }
}
