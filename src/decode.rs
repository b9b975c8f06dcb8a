//! Strict JSON request decoding.
//!
//! [`decode`] reads exactly one JSON document from the request body, rejects
//! keys the target type does not know about, and then runs the target's
//! [`Validate`] constraints. Every failure comes back as a classified
//! [`Error`]; nothing panics on malformed input.

use http::StatusCode;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::error::{Error, RequestError};
use crate::request::Request;
use crate::validate::{Validate, Validator};

/// Why the body could not be turned into the target type.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("unknown field \"{0}\"")]
    UnknownField(String),
}

/// Decodes the request body into `T` and validates it.
///
/// - Malformed JSON, trailing data, or an unknown field: `400` [`RequestError`]
///   wrapping the [`DecodeError`].
/// - Constraint violations: `400` with cause `field validation error` and one
///   [`FieldError`](crate::FieldError) per violation.
/// - A validator failure that is not a set of field violations: returned as an
///   opaque error.
pub fn decode<T>(validator: &Validator, request: &Request) -> Result<T, Error>
where
    T: DeserializeOwned + Validate,
{
    let value: T = from_slice_strict(request.body())
        .map_err(|e| RequestError::new(e, StatusCode::BAD_REQUEST))?;
    validator.check(&value)?;
    Ok(value)
}

fn from_slice_strict<T: DeserializeOwned>(body: &[u8]) -> Result<T, DecodeError> {
    let mut de = serde_json::Deserializer::from_slice(body);
    let mut unknown = Vec::new();
    let value: T = serde_ignored::deserialize(&mut de, |path| unknown.push(path.to_string()))?;
    de.end()?;

    match unknown.into_iter().next() {
        Some(path) => Err(DecodeError::UnknownField(path)),
        None => Ok(value),
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;
    use crate::error::{ErrorKind, FieldError};
    use crate::validate::{Rules, ValidationError};

    #[derive(Debug, Deserialize, PartialEq)]
    struct NewUser {
        name: String,
        email: String,
        #[serde(default)]
        roles: Vec<String>,
    }

    impl Validate for NewUser {
        fn validate(&self) -> Result<(), ValidationError> {
            Rules::new()
                .required("name", &self.name)
                .required("email", &self.email)
                .email("email", &self.email)
                .finish()
        }
    }

    #[derive(Debug, Deserialize)]
    struct Ping {
        seq: u32,
    }

    impl Validate for Ping {}

    fn post(body: &str) -> Request {
        Request::from(http::Request::post("/users").body(body.to_owned()).unwrap())
    }

    fn bad_request(err: &Error) -> &RequestError {
        match err.kind() {
            ErrorKind::Request(e) if e.status() == StatusCode::BAD_REQUEST => e,
            other => panic!("expected 400, got {other:?}"),
        }
    }

    #[test]
    fn decodes_valid_body() {
        let req = post(r#"{"name":"alice","email":"alice@example.com","roles":["admin"]}"#);
        let user: NewUser = req.decode().unwrap();
        assert_eq!(user, NewUser {
            name: "alice".into(),
            email: "alice@example.com".into(),
            roles: vec!["admin".into()],
        });
    }

    #[test]
    fn type_without_constraints_only_decodes() {
        let ping: Ping = post(r#"{"seq":7}"#).decode().unwrap();
        assert_eq!(ping.seq, 7);
    }

    #[test]
    fn unknown_field_is_bad_request_even_when_known_fields_are_valid() {
        let req = post(r#"{"name":"alice","email":"alice@example.com","admin":true}"#);
        let err = req.decode::<NewUser>().unwrap_err();
        let e = bad_request(&err);
        assert_eq!(e.to_string(), "unknown field \"admin\"");
        assert!(e.fields().is_empty());
    }

    #[test]
    fn malformed_and_trailing_json_are_bad_request() {
        for body in ["", "{", r#"{"seq":"x"}"#, r#"{"seq":1} {"seq":2}"#, "\"text\""] {
            let err = post(body).decode::<Ping>().unwrap_err();
            bad_request(&err);
        }
    }

    #[test]
    fn trailing_whitespace_is_fine() {
        assert!(post("{\"seq\":1}\n  ").decode::<Ping>().is_ok());
    }

    #[test]
    fn every_violation_becomes_a_field_error() {
        let err = post(r#"{"name":"","email":"nope"}"#).decode::<NewUser>().unwrap_err();
        let e = bad_request(&err);
        assert_eq!(e.to_string(), "field validation error");
        assert_eq!(e.fields(), [
            FieldError::new("name", "name is a required field"),
            FieldError::new("email", "email must be a valid email address"),
        ]);
    }

    #[test]
    fn explicit_validator_is_used() {
        use crate::validate::Translator;

        let validator = Validator::with_translator(
            Translator::english().with("required", "{field} darf nicht leer sein"),
        );
        let req = post(r#"{"name":"","email":"a@b.io"}"#);
        let err = decode::<NewUser>(&validator, &req).unwrap_err();
        assert_eq!(bad_request(&err).fields(), [FieldError::new("name", "name darf nicht leer sein")]);
    }
}
