//! Built-in custom scalars.
//!
//! Every scalar is declared once in [`BUILTIN_SCALARS`]; both the SDL
//! fragment and the resolver fragment are generated from that table, so the
//! two can never disagree. Both fragments are merged last.

use std::sync::LazyLock;

use async_graphql::Value;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, Time};

use crate::error::BUILTIN_SCALARS_SOURCE;
use crate::loader::SchemaFragment;
use crate::resolvers::{ResolverFragment, ResolverMap, ScalarResolver};

/// Pragmatic email check: one `@`, no whitespace, a dot in the domain.
static EMAIL_REGEX: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("Invalid email regex")
});

/// A built-in scalar definition.
#[derive(Debug, Clone, Copy)]
pub struct BuiltinScalar {
    /// Type name.
    pub name: &'static str,
    /// Description used in both SDL and introspection.
    pub description: &'static str,
    /// Optional `specifiedBy` URL.
    pub specified_by: Option<&'static str>,
    validate: fn(&Value) -> bool,
}

impl BuiltinScalar {
    /// Checks an input value.
    #[must_use]
    pub fn is_valid(&self, value: &Value) -> bool {
        (self.validate)(value)
    }
}

/// The built-in scalars.
pub const BUILTIN_SCALARS: &[BuiltinScalar] = &[
    BuiltinScalar {
        name: "DateTime",
        description: "A date-time string in RFC 3339 format, e.g. 2024-01-15T10:30:00Z.",
        specified_by: Some("https://datatracker.ietf.org/doc/html/rfc3339"),
        validate: is_date_time,
    },
    BuiltinScalar {
        name: "Date",
        description: "A calendar date in YYYY-MM-DD format.",
        specified_by: None,
        validate: is_date,
    },
    BuiltinScalar {
        name: "Time",
        description: "A time of day in hh:mm:ss format with optional fraction.",
        specified_by: None,
        validate: is_time,
    },
    BuiltinScalar {
        name: "EmailAddress",
        description: "An email address.",
        specified_by: Some("https://datatracker.ietf.org/doc/html/rfc5322"),
        validate: is_email,
    },
    BuiltinScalar {
        name: "URL",
        description: "An absolute URL.",
        specified_by: Some("https://url.spec.whatwg.org/"),
        validate: is_url,
    },
    BuiltinScalar {
        name: "UUID",
        description: "A UUID in its canonical textual form.",
        specified_by: Some("https://datatracker.ietf.org/doc/html/rfc4122"),
        validate: is_uuid,
    },
    BuiltinScalar {
        name: "JSON",
        description: "Any JSON value.",
        specified_by: None,
        validate: is_any,
    },
    BuiltinScalar {
        name: "JSONObject",
        description: "A JSON object.",
        specified_by: None,
        validate: is_object,
    },
    BuiltinScalar {
        name: "PositiveInt",
        description: "An integer greater than zero.",
        specified_by: None,
        validate: is_positive_int,
    },
    BuiltinScalar {
        name: "NonNegativeInt",
        description: "An integer greater than or equal to zero.",
        specified_by: None,
        validate: is_non_negative_int,
    },
    BuiltinScalar {
        name: "NonEmptyString",
        description: "A string with at least one non-whitespace character.",
        specified_by: None,
        validate: is_non_empty_string,
    },
];

/// SDL declaring every built-in scalar.
#[must_use]
pub fn builtin_scalar_sdl() -> String {
    BUILTIN_SCALARS
        .iter()
        .map(|scalar| format!("\"{}\"\nscalar {}\n", scalar.description, scalar.name))
        .collect::<Vec<_>>()
        .join("\n")
}

/// The built-in scalars as a schema fragment.
#[must_use]
pub fn builtin_scalar_fragment() -> SchemaFragment {
    SchemaFragment::new(BUILTIN_SCALARS_SOURCE, builtin_scalar_sdl())
}

/// The built-in scalars as a resolver fragment.
#[must_use]
pub fn builtin_scalar_resolvers() -> ResolverFragment {
    let map = BUILTIN_SCALARS.iter().fold(ResolverMap::new(), |map, scalar| {
        let validate = scalar.validate;
        let mut resolver = ScalarResolver::new()
            .description(scalar.description)
            .validator(move |value| validate(value));
        if let Some(url) = scalar.specified_by {
            resolver = resolver.specified_by_url(url);
        }
        map.scalar(scalar.name, resolver)
    });
    ResolverFragment::new(BUILTIN_SCALARS_SOURCE, map)
}

fn as_str(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) => Some(s.as_str()),
        _ => None,
    }
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        _ => None,
    }
}

fn is_date_time(value: &Value) -> bool {
    as_str(value).is_some_and(|s| OffsetDateTime::parse(s, &Rfc3339).is_ok())
}

fn is_date(value: &Value) -> bool {
    as_str(value)
        .is_some_and(|s| Date::parse(s, format_description!("[year]-[month]-[day]")).is_ok())
}

fn is_time(value: &Value) -> bool {
    as_str(value).is_some_and(|s| {
        Time::parse(
            s,
            format_description!("[hour]:[minute]:[second][optional [.[subsecond]]]"),
        )
        .is_ok()
    })
}

fn is_email(value: &Value) -> bool {
    as_str(value).is_some_and(|s| EMAIL_REGEX.is_match(s))
}

fn is_url(value: &Value) -> bool {
    as_str(value).is_some_and(|s| url::Url::parse(s).is_ok())
}

fn is_uuid(value: &Value) -> bool {
    as_str(value).is_some_and(|s| uuid::Uuid::parse_str(s).is_ok())
}

fn is_any(_value: &Value) -> bool {
    true
}

fn is_object(value: &Value) -> bool {
    matches!(value, Value::Object(_))
}

fn is_positive_int(value: &Value) -> bool {
    as_i64(value).is_some_and(|n| n > 0)
}

fn is_non_negative_int(value: &Value) -> bool {
    as_i64(value).is_some_and(|n| n >= 0)
}

fn is_non_empty_string(value: &Value) -> bool {
    as_str(value).is_some_and(|s| !s.trim().is_empty())
}
