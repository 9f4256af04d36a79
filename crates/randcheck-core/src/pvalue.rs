//! p-value classification and the "inapplicable" sentinel.

use serde::Serialize;

/// Written in place of every partition's p-value when a test's preconditions
/// are not met for a sequence. Distinct from a true p-value of 0.
pub const NON_P_VALUE: f64 = -999.0;

/// True if `p` is the inapplicable sentinel.
pub fn is_non_p_value(p: f64) -> bool {
    p == NON_P_VALUE
}

/// Outcome of one p-value against the significance level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PValueClass {
    Success,
    Failure,
    Inapplicable,
}

/// Classify `p` at significance `alpha`. Anything outside [0, 1] (including
/// NaN) is a failure.
pub fn classify(p: f64, alpha: f64) -> PValueClass {
    if is_non_p_value(p) {
        PValueClass::Inapplicable
    } else if (alpha..=1.0).contains(&p) {
        PValueClass::Success
    } else {
        PValueClass::Failure
    }
}

/// True for a real p-value that lies outside [0, 1].
pub fn is_out_of_range(p: f64) -> bool {
    !is_non_p_value(p) && !(0.0..=1.0).contains(&p)
}
