//! Classification of settled handler results.

use http::StatusCode;
use serde_json::Value;

use crate::error::{DomainError, InternalWarning};
use crate::resolve::Resolved;

/// What a settled handler result means for the response.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// A body with the implicit `200 OK`.
    Payload(Value),
    /// A body (possibly absent) with an explicit status.
    Override {
        payload: Option<Value>,
        status: StatusCode,
    },
    /// A domain error with its own payload and status.
    Error(DomainError),
    /// Hand off to the next handler.
    PassNext,
    /// Nothing to write.
    Absent,
}

impl Outcome {
    /// The status this outcome would be written with, if any.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Outcome::Payload(_) => Some(StatusCode::OK),
            Outcome::Override { status, .. } => Some(*status),
            Outcome::Error(e) => Some(e.status()),
            Outcome::PassNext | Outcome::Absent => None,
        }
    }
}

/// Tags a settled result.
///
/// Rules, in order:
/// 1. the pass-to-next sentinel is [`Outcome::PassNext`];
/// 2. a domain error is [`Outcome::Error`];
/// 3. an explicit response is [`Outcome::Override`]. When its payload is
///    itself an explicit response, one level is unwrapped and the inner status
///    wins;
/// 4. anything else is [`Outcome::Payload`], or [`Outcome::Absent`].
///
/// # Errors
///
/// Returns an [`InternalWarning`] for shapes that cannot be honoured: a
/// sentinel or domain error used as a response body, or explicit responses
/// nested two levels deep.
pub fn classify(resolved: Resolved) -> Result<Outcome, InternalWarning> {
    match resolved {
        Resolved::Next => Ok(Outcome::PassNext),
        Resolved::Fail(e) => Ok(Outcome::Error(e)),
        Resolved::Respond(payload, status) => match *payload {
            Resolved::Respond(inner, inner_status) => override_of(*inner, inner_status)
                .ok_or_else(|| InternalWarning::new("explicit responses nested more than one level")),
            payload => override_of(payload, status).ok_or_else(|| {
                InternalWarning::new("an explicit response body must be a payload")
            }),
        },
        Resolved::Value(v) => Ok(Outcome::Payload(v)),
        Resolved::Absent => Ok(Outcome::Absent),
    }
}

fn override_of(payload: Resolved, status: StatusCode) -> Option<Outcome> {
    let payload = match payload {
        Resolved::Value(v) => Some(v),
        Resolved::Absent => None,
        _ => return None,
    };
    Some(Outcome::Override { payload, status })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn respond(payload: Resolved, status: StatusCode) -> Resolved {
        Resolved::Respond(Box::new(payload), status)
    }

    #[test]
    fn test_plain_value_is_payload() {
        let outcome = classify(Resolved::Value(json!({ "ok": true }))).unwrap();
        assert_eq!(outcome, Outcome::Payload(json!({ "ok": true })));
        assert_eq!(outcome.status(), Some(StatusCode::OK));
    }

    #[test]
    fn test_sentinel_and_absence() {
        assert_eq!(classify(Resolved::Next).unwrap(), Outcome::PassNext);
        assert_eq!(classify(Resolved::Absent).unwrap(), Outcome::Absent);
    }

    #[test]
    fn test_domain_error_keeps_status() {
        let err = DomainError::new(StatusCode::FORBIDDEN, "nope");
        assert_eq!(classify(Resolved::Fail(err.clone())).unwrap(), Outcome::Error(err));
    }

    #[test]
    fn test_override_carries_status() {
        let outcome = classify(respond(
            Resolved::Value(json!({ "customResponse": "test" })),
            StatusCode::IM_A_TEAPOT,
        ))
        .unwrap();
        assert_eq!(
            outcome,
            Outcome::Override {
                payload: Some(json!({ "customResponse": "test" })),
                status: StatusCode::IM_A_TEAPOT,
            }
        );
    }

    #[test]
    fn test_nested_override_unwraps_one_level() {
        let nested = respond(
            respond(Resolved::Value(json!("inner")), StatusCode::CREATED),
            StatusCode::ACCEPTED,
        );
        assert_eq!(
            classify(nested).unwrap(),
            Outcome::Override {
                payload: Some(json!("inner")),
                status: StatusCode::CREATED,
            }
        );
    }

    #[test]
    fn test_doubly_nested_override_is_a_warning() {
        let nested = respond(
            respond(respond(Resolved::Absent, StatusCode::OK), StatusCode::OK),
            StatusCode::OK,
        );
        assert!(classify(nested).is_err());
    }

    #[test]
    fn test_sentinel_as_override_body_is_a_warning() {
        assert!(classify(respond(Resolved::Next, StatusCode::OK)).is_err());
    }
}
