//! Field-level validation and message translation.
//!
//! Types opt in by implementing [`Validate`], usually with the [`Rules`]
//! builder:
//!
//! ```rust
//! use astor_web::validate::{Rules, Validate, ValidationError};
//!
//! struct NewUser { name: String, email: String, age: u32 }
//!
//! impl Validate for NewUser {
//!     fn validate(&self) -> Result<(), ValidationError> {
//!         Rules::new()
//!             .required("name", &self.name)
//!             .required("email", &self.email)
//!             .email("email", &self.email)
//!             .min("age", self.age, 18)
//!             .finish()
//!     }
//! }
//! ```
//!
//! Field names are the **wire** names (what the client sent), not Rust
//! identifiers. A name of `""` or `"-"` marks a field that is not on the wire;
//! rules against it never report.
//!
//! Rules are evaluated in call order. Once a field has failed, later rules for
//! the same field are skipped, so `required` + `email` on an empty string
//! reports only the missing value.

use std::collections::HashMap;

use crate::error::{BoxError, Error, FieldError, RequestError};

// ── Validate ─────────────────────────────────────────────────────────────────

/// Declares validation constraints for a decoded value.
///
/// The default body has no constraints: `impl Validate for Ping {}`.
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}

/// Why [`Validate::validate`] failed.
#[derive(Debug)]
pub enum ValidationError {
    /// One entry per violated constraint, in evaluation order.
    Fields(Vec<Violation>),
    /// The validation machinery itself failed. Not a per-field result.
    Invalid(BoxError),
}

impl<T: Validate> Validate for Option<T> {
    fn validate(&self) -> Result<(), ValidationError> {
        self.as_ref().map_or(Ok(()), T::validate)
    }
}

impl<T: Validate> Validate for Vec<T> {
    fn validate(&self) -> Result<(), ValidationError> {
        let mut rules = Rules::new();
        for (i, item) in self.iter().enumerate() {
            rules = rules.nested(&format!("[{i}]"), item);
        }
        rules.finish()
    }
}

impl Validate for serde_json::Value {}

// ── Constraint / Violation ───────────────────────────────────────────────────

/// A single constraint a field can violate.
#[derive(Clone, Debug, PartialEq)]
pub enum Constraint {
    Required,
    Email,
    Url,
    MinLen(usize),
    MaxLen(usize),
    Len(usize),
    Min(String),
    Max(String),
    OneOf(Vec<String>),
    /// An application-defined rule, translated by its tag.
    Custom(&'static str),
}

impl Constraint {
    /// The tag used to look up the message template.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Required  => "required",
            Self::Email     => "email",
            Self::Url       => "url",
            Self::MinLen(_) => "min",
            Self::MaxLen(_) => "max",
            Self::Len(_)    => "len",
            Self::Min(_)    => "gte",
            Self::Max(_)    => "lte",
            Self::OneOf(_)  => "oneof",
            Self::Custom(t) => *t,
        }
    }

    /// The constraint's argument as it appears in messages.
    pub fn param(&self) -> String {
        match self {
            Self::MinLen(n) | Self::MaxLen(n) | Self::Len(n) => n.to_string(),
            Self::Min(v) | Self::Max(v) => v.clone(),
            Self::OneOf(options) => options.join(" "),
            Self::Custom(t) => (*t).to_owned(),
            Self::Required | Self::Email | Self::Url => String::new(),
        }
    }
}

/// A constraint violation on one wire field.
#[derive(Clone, Debug, PartialEq)]
pub struct Violation {
    pub field: String,
    pub constraint: Constraint,
}

// ── Rules ────────────────────────────────────────────────────────────────────

/// Something `required` can test for presence.
pub trait Presence {
    fn is_present(&self) -> bool;
}

impl Presence for str {
    fn is_present(&self) -> bool { !self.is_empty() }
}

impl Presence for String {
    fn is_present(&self) -> bool { !self.is_empty() }
}

impl<T> Presence for Option<T> {
    fn is_present(&self) -> bool { self.is_some() }
}

impl<T> Presence for Vec<T> {
    fn is_present(&self) -> bool { !self.is_empty() }
}

impl<T> Presence for [T] {
    fn is_present(&self) -> bool { !self.is_empty() }
}

impl Presence for bool {
    fn is_present(&self) -> bool { *self }
}

macro_rules! numeric_presence {
    ($($t:ty),*) => {
        $(impl Presence for $t {
            fn is_present(&self) -> bool { *self != 0 as $t }
        })*
    };
}

numeric_presence!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64);

/// Collects violations in evaluation order.
///
/// At most one violation is recorded per field: the first constraint that
/// fails. A payload with N invalid fields therefore yields exactly N
/// violations, however many constraints each field breaks.
#[derive(Debug, Default)]
pub struct Rules {
    violations: Vec<Violation>,
    invalid: Option<BoxError>,
}

impl Rules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required<V: Presence + ?Sized>(self, field: &str, value: &V) -> Self {
        self.check(field, value.is_present(), || Constraint::Required)
    }

    pub fn email(self, field: &str, value: &str) -> Self {
        self.check(field, is_email(value), || Constraint::Email)
    }

    pub fn url(self, field: &str, value: &str) -> Self {
        self.check(field, is_url(value), || Constraint::Url)
    }

    /// At least `min` characters (not bytes).
    pub fn min_len(self, field: &str, value: &str, min: usize) -> Self {
        self.check(field, value.chars().count() >= min, || Constraint::MinLen(min))
    }

    pub fn max_len(self, field: &str, value: &str, max: usize) -> Self {
        self.check(field, value.chars().count() <= max, || Constraint::MaxLen(max))
    }

    pub fn len(self, field: &str, value: &str, len: usize) -> Self {
        self.check(field, value.chars().count() == len, || Constraint::Len(len))
    }

    pub fn min<T: PartialOrd + ToString>(self, field: &str, value: T, bound: T) -> Self {
        let ok = value >= bound;
        self.check(field, ok, || Constraint::Min(bound.to_string()))
    }

    pub fn max<T: PartialOrd + ToString>(self, field: &str, value: T, bound: T) -> Self {
        let ok = value <= bound;
        self.check(field, ok, || Constraint::Max(bound.to_string()))
    }

    pub fn one_of(self, field: &str, value: &str, options: &[&str]) -> Self {
        self.check(field, options.contains(&value), || {
            Constraint::OneOf(options.iter().map(|o| (*o).to_owned()).collect())
        })
    }

    /// An application rule. `tag` selects the translator template.
    pub fn custom(self, field: &str, tag: &'static str, valid: bool) -> Self {
        self.check(field, valid, || Constraint::Custom(tag))
    }

    /// Validates a nested value, reporting its fields as `field.child`.
    pub fn nested<T: Validate + ?Sized>(mut self, field: &str, value: &T) -> Self {
        if is_suppressed(field) || self.invalid.is_some() {
            return self;
        }
        match value.validate() {
            Ok(()) => {}
            Err(ValidationError::Fields(inner)) => {
                for v in inner {
                    let name = if v.field.starts_with('[') {
                        format!("{field}{}", v.field)
                    } else {
                        format!("{field}.{}", v.field)
                    };
                    self.violations.push(Violation { field: name, constraint: v.constraint });
                }
            }
            Err(ValidationError::Invalid(e)) => self.invalid = Some(e),
        }
        self
    }

    pub fn finish(self) -> Result<(), ValidationError> {
        if let Some(e) = self.invalid {
            return Err(ValidationError::Invalid(e));
        }
        if self.violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::Fields(self.violations))
        }
    }

    fn check(mut self, field: &str, ok: bool, constraint: impl FnOnce() -> Constraint) -> Self {
        if ok || is_suppressed(field) || self.has_failed(field) {
            return self;
        }
        self.violations.push(Violation { field: field.to_owned(), constraint: constraint() });
        self
    }

    fn has_failed(&self, field: &str) -> bool {
        self.violations.iter().any(|v| v.field == field)
    }
}

fn is_suppressed(field: &str) -> bool {
    field.is_empty() || field == "-"
}

fn is_email(value: &str) -> bool {
    let Some((local, domain)) = value.rsplit_once('@') else {
        return false;
    };
    !local.is_empty()
        && !value.chars().any(char::is_whitespace)
        && !local.contains('@')
        && domain.contains('.')
        && domain.split('.').all(|label| {
            !label.is_empty() && label.chars().all(|c| c.is_alphanumeric() || c == '-')
        })
}

fn is_url(value: &str) -> bool {
    match value.parse::<http::Uri>() {
        Ok(uri) => uri.scheme().is_some() && uri.authority().is_some(),
        Err(_) => false,
    }
}

// ── Translator ───────────────────────────────────────────────────────────────

/// Renders violations as human-readable messages for one locale.
///
/// Templates use `{field}` and `{param}` placeholders and are keyed by
/// [`Constraint::tag`].
#[derive(Clone, Debug)]
pub struct Translator {
    locale: String,
    templates: HashMap<String, String>,
}

impl Translator {
    /// English messages.
    pub fn english() -> Self {
        let templates = [
            ("required", "{field} is a required field"),
            ("email",    "{field} must be a valid email address"),
            ("url",      "{field} must be a valid URL"),
            ("min",      "{field} must be at least {param} characters in length"),
            ("max",      "{field} must be a maximum of {param} characters in length"),
            ("len",      "{field} must be {param} characters in length"),
            ("gte",      "{field} must be {param} or greater"),
            ("lte",      "{field} must be {param} or less"),
            ("oneof",    "{field} must be one of [{param}]"),
        ]
        .into_iter()
        .map(|(tag, tpl)| (tag.to_owned(), tpl.to_owned()))
        .collect();

        Self { locale: "en".to_owned(), templates }
    }

    /// An empty translator for `locale`; every tag uses the fallback message
    /// until templates are added.
    pub fn for_locale(locale: impl Into<String>) -> Self {
        Self { locale: locale.into(), templates: HashMap::new() }
    }

    /// Adds or replaces the template for `tag`.
    pub fn with(mut self, tag: impl Into<String>, template: impl Into<String>) -> Self {
        self.templates.insert(tag.into(), template.into());
        self
    }

    pub fn locale(&self) -> &str { &self.locale }

    pub fn translate(&self, violation: &Violation) -> String {
        let tag = violation.constraint.tag();
        let template = self
            .templates
            .get(tag)
            .map(String::as_str)
            .unwrap_or("{field} failed on the '{param}' tag");
        template
            .replace("{field}", &violation.field)
            .replace("{param}", &violation.constraint.param())
    }
}

impl Default for Translator {
    fn default() -> Self { Self::english() }
}

// ── Validator ────────────────────────────────────────────────────────────────

/// Process-wide validation settings, built once at startup and shared by
/// reference with the decoder.
#[derive(Clone, Debug, Default)]
pub struct Validator {
    translator: Translator,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_translator(translator: Translator) -> Self {
        Self { translator }
    }

    pub fn translator(&self) -> &Translator { &self.translator }

    /// Runs `value`'s constraints.
    ///
    /// Field violations become one `400` [`RequestError`] carrying a
    /// [`FieldError`] per violation. A machinery failure is returned as an
    /// opaque error, unwrapped.
    pub fn check<T: Validate + ?Sized>(&self, value: &T) -> Result<(), Error> {
        match value.validate() {
            Ok(()) => Ok(()),
            Err(ValidationError::Fields(violations)) if violations.is_empty() => Ok(()),
            Err(ValidationError::Fields(violations)) => {
                let fields = violations
                    .iter()
                    .map(|v| FieldError::new(v.field.clone(), self.translator.translate(v)))
                    .collect();
                Err(RequestError::validation(fields).into())
            }
            Err(ValidationError::Invalid(e)) => Err(Error::Other(e)),
        }
    }
}
