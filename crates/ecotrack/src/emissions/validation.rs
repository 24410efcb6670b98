use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

use super::category::ValueBounds;

/// Result of validating one raw text token.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValidationOutcome {
    Rejected { reason: RejectionReason },
    Accepted { value: f64 },
}

impl ValidationOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ValidationOutcome::Accepted { .. })
    }

    pub fn into_result(self) -> Result<f64, UserInputError> {
        match self {
            ValidationOutcome::Accepted { value } => Ok(value),
            ValidationOutcome::Rejected { reason } => Err(UserInputError(reason)),
        }
    }
}

/// User-facing reasons a value was refused. `Display` is the exact message
/// shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectionReason {
    Empty,
    InvalidNumber,
    NotPositive,
    Negative,
    TooLarge { max: f64 },
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionReason::Empty => f.write_str("Please enter a value."),
            RejectionReason::InvalidNumber => f.write_str("Please enter a valid number."),
            RejectionReason::NotPositive => f.write_str("Value must be greater than 0."),
            RejectionReason::Negative => f.write_str("Value cannot be negative."),
            RejectionReason::TooLarge { max } => {
                write!(f, "Value cannot exceed {}.", group_thousands(*max))
            }
        }
    }
}

/// Expected, recoverable rejection of what the user typed.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[error("{0}")]
pub struct UserInputError(pub RejectionReason);

impl UserInputError {
    pub fn reason(&self) -> RejectionReason {
        self.0
    }
}

/// Validate a raw value against the electricity range `(0, 99999]`.
pub fn validate(raw: &str) -> ValidationOutcome {
    validate_with(raw, ValueBounds::ELECTRICITY)
}

/// Validate a raw value against a category's bounds.
///
/// Format is checked before parsing so that `1,000`, `1e3`, and `+100` are
/// refused as invalid numbers instead of being reinterpreted.
pub fn validate_with(raw: &str, bounds: ValueBounds) -> ValidationOutcome {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        debug!("empty calculator input");
        return ValidationOutcome::Rejected {
            reason: RejectionReason::Empty,
        };
    }

    if !plain_decimal().is_match(trimmed) {
        if suspicious_input().is_match(trimmed) {
            warn!(input = %trimmed, "possible injection attempt in calculator input");
        } else {
            debug!(input = %trimmed, "calculator input is not a plain decimal");
        }
        return ValidationOutcome::Rejected {
            reason: RejectionReason::InvalidNumber,
        };
    }

    match trimmed.parse::<f64>() {
        Ok(value) => check_bounds(value, bounds),
        Err(_) => ValidationOutcome::Rejected {
            reason: RejectionReason::InvalidNumber,
        },
    }
}

/// Range checks for a value that is already numeric (e.g. from a JSON body).
///
/// Infinities from over-long decimals go through the ordinary sign and
/// upper-bound checks; only NaN is an invalid number.
pub fn check_bounds(value: f64, bounds: ValueBounds) -> ValidationOutcome {
    if value.is_nan() {
        return ValidationOutcome::Rejected {
            reason: RejectionReason::InvalidNumber,
        };
    }
    // collapse -0.0
    let value = if value == 0.0 { 0.0 } else { value };

    let reason = if bounds.allow_zero && value < 0.0 {
        Some(RejectionReason::Negative)
    } else if !bounds.allow_zero && value <= 0.0 {
        Some(RejectionReason::NotPositive)
    } else if value > bounds.max {
        Some(RejectionReason::TooLarge { max: bounds.max })
    } else {
        None
    };

    match reason {
        Some(reason) => {
            debug!(value, %reason, "calculator input out of range");
            ValidationOutcome::Rejected { reason }
        }
        None => ValidationOutcome::Accepted { value },
    }
}

fn plain_decimal() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^-?\d+(?:\.\d+)?$").expect("static pattern compiles"))
}

fn suspicious_input() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?i)[<>"']|script|alert|onerror|--|;|/\*|\*/|xp_|sp_|drop|insert|delete|update"#)
            .expect("static pattern compiles")
    })
}

fn group_thousands(value: f64) -> String {
    if value.fract() != 0.0 {
        return value.to_string();
    }

    let digits = format!("{:.0}", value.abs());
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if value < 0.0 {
        grouped.insert(0, '-');
    }
    grouped
}
