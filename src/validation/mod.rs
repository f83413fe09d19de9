use sqlx::types::BigDecimal;
use std::fmt;

pub const CURRENCY_CODE_LEN: usize = 3;
pub const PAYMENT_METHOD_MAX_LEN: usize = 32;
pub const MSISDN_MIN_LEN: usize = 9;
pub const MSISDN_MAX_LEN: usize = 15;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), ValidationError>;

pub fn sanitize_string(value: &str) -> String {
    value
        .chars()
        .filter(|ch| !ch.is_control())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn validate_required(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }

    Ok(())
}

pub fn validate_max_len(field: &'static str, value: &str, max_len: usize) -> ValidationResult {
    if value.len() > max_len {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters", max_len),
        ));
    }

    Ok(())
}

pub fn validate_positive_amount(amount: &BigDecimal) -> ValidationResult {
    if amount <= &BigDecimal::from(0) {
        return Err(ValidationError::new("amount", "must be greater than zero"));
    }

    Ok(())
}

pub fn validate_currency_code(currency: &str) -> ValidationResult {
    let currency = sanitize_string(currency);
    validate_required("currency", &currency)?;

    if currency.len() != CURRENCY_CODE_LEN {
        return Err(ValidationError::new(
            "currency",
            format!("must be exactly {} characters", CURRENCY_CODE_LEN),
        ));
    }

    if !currency.chars().all(|ch| ch.is_ascii_uppercase()) {
        return Err(ValidationError::new(
            "currency",
            "must contain only uppercase letters",
        ));
    }

    Ok(())
}

/// Payer phone number in international digits form, optional leading '+'.
pub fn validate_msisdn(msisdn: &str) -> ValidationResult {
    let msisdn = sanitize_string(msisdn);
    validate_required("phone_number", &msisdn)?;

    let digits = msisdn.strip_prefix('+').unwrap_or(&msisdn);

    if digits.len() < MSISDN_MIN_LEN || digits.len() > MSISDN_MAX_LEN {
        return Err(ValidationError::new(
            "phone_number",
            format!(
                "must be between {} and {} digits",
                MSISDN_MIN_LEN, MSISDN_MAX_LEN
            ),
        ));
    }

    if !digits.chars().all(|ch| ch.is_ascii_digit()) {
        return Err(ValidationError::new(
            "phone_number",
            "must contain only digits",
        ));
    }

    Ok(())
}
