// 3-D Secure outcome evaluation for card-field orders
//
// Mirrors PayPal's recommended-action table for
// `payment_source.card.authentication_result`.

use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThreeDsDecision {
    /// Safe to capture
    Continue,
    /// Authentication failed; do not capture
    Reject,
    /// Outcome unknown; ask the buyer to try again
    Retry,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ThreeDsOutcome {
    pub decision: ThreeDsDecision,
    pub liability_shift: Option<String>,
    pub enrollment_status: Option<String>,
    pub authentication_status: Option<String>,
}

/// Evaluate an order's card authentication result.
///
/// Orders without an `authentication_result` never went through 3DS and may
/// be captured.
pub fn evaluate(order: &Value) -> ThreeDsOutcome {
    let result = order
        .get("payment_source")
        .and_then(|s| s.get("card"))
        .and_then(|c| c.get("authentication_result"));

    let text = |v: Option<&Value>| v.and_then(Value::as_str).map(str::to_uppercase);
    let liability_shift = text(result.and_then(|r| r.get("liability_shift")));
    let secure = result.and_then(|r| r.get("three_d_secure"));
    let enrollment_status = text(secure.and_then(|s| s.get("enrollment_status")));
    let authentication_status = text(secure.and_then(|s| s.get("authentication_status")));

    let decision = match (
        result.is_some(),
        liability_shift.as_deref(),
        enrollment_status.as_deref(),
        authentication_status.as_deref(),
    ) {
        (false, _, _, _) => ThreeDsDecision::Continue,
        (_, Some("POSSIBLE") | Some("YES"), _, _) => ThreeDsDecision::Continue,
        // Not enrolled, issuer unavailable, or bypassed: no liability shift but chargeable
        (_, Some("NO"), Some("N") | Some("U") | Some("B"), None) => ThreeDsDecision::Continue,
        (_, Some("NO"), _, Some("N") | Some("R")) => ThreeDsDecision::Reject,
        (_, Some("NO"), _, Some("U") | Some("C") | Some("A") | Some("I")) => ThreeDsDecision::Retry,
        (_, Some("NO"), _, _) => ThreeDsDecision::Reject,
        _ => ThreeDsDecision::Retry,
    };

    ThreeDsOutcome {
        decision,
        liability_shift,
        enrollment_status,
        authentication_status,
    }
}
