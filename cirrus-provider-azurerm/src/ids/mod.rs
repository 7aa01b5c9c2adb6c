//! Typed Azure resource IDs
//!
//! Every ID type knows its segment layout, builds its canonical string form
//! with `id()`, and parses either case-sensitively (`parse`) or
//! case-insensitively on the static segments (`parse_insensitively`).

use std::fmt;

use cirrus_core::schema::{AttributeType, types};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdParseError {
    #[error("parsing {kind} ID: the ID was empty")]
    Empty { kind: &'static str },

    #[error("parsing {kind} ID {input:?}: the ID must start with '/'")]
    NotAbsolute { kind: &'static str, input: String },

    #[error("parsing {kind} ID {input:?}: expected the segment {expected:?}, got {got:?}")]
    WrongSegment {
        kind: &'static str,
        input: String,
        expected: String,
        got: String,
    },

    #[error("parsing {kind} ID {input:?}: the segment {expected:?} was not found")]
    MissingSegment {
        kind: &'static str,
        input: String,
        expected: String,
    },

    #[error("parsing {kind} ID {input:?}: no value was found for {field}")]
    MissingValue {
        kind: &'static str,
        input: String,
        field: &'static str,
    },

    #[error("parsing {kind} ID {input:?}: unexpected segments {extra:?} after the ID")]
    UnexpectedSegments {
        kind: &'static str,
        input: String,
        extra: String,
    },

    #[error("parsing {kind} ID {input:?}: {message}")]
    Invalid {
        kind: &'static str,
        input: String,
        message: String,
    },
}

/// Shared behaviour of typed IDs
pub trait ResourceIdType: Sized + fmt::Display {
    /// Human readable kind, e.g. "Data Factory"
    const KIND: &'static str;

    fn parse(input: &str) -> Result<Self, IdParseError>;
    fn parse_insensitively(input: &str) -> Result<Self, IdParseError>;
    fn id(&self) -> String;
}

/// Attribute type accepting a valid ID of type `T`
pub fn id_type<T: ResourceIdType>() -> AttributeType {
    types::string_with(T::KIND, |value| {
        T::parse(value).map(|_| ()).map_err(|e| e.to_string())
    })
}

/// Walk `input` against a layout of (static prefix, value field) pairs
pub(crate) fn parse_segments(
    input: &str,
    layout: &[(&'static str, &'static str)],
    kind: &'static str,
    insensitive: bool,
) -> Result<Vec<String>, IdParseError> {
    if input.is_empty() {
        return Err(IdParseError::Empty { kind });
    }
    let Some(rest) = input.strip_prefix('/') else {
        return Err(IdParseError::NotAbsolute {
            kind,
            input: input.to_string(),
        });
    };

    let mut tokens = rest.split('/');
    let mut values = Vec::with_capacity(layout.len());

    for (prefix, field) in layout {
        for expected in prefix.split('/') {
            match tokens.next() {
                Some(token)
                    if token == expected
                        || (insensitive && token.eq_ignore_ascii_case(expected)) => {}
                None | Some("") => {
                    return Err(IdParseError::MissingSegment {
                        kind,
                        input: input.to_string(),
                        expected: expected.to_string(),
                    });
                }
                Some(token) => {
                    return Err(IdParseError::WrongSegment {
                        kind,
                        input: input.to_string(),
                        expected: expected.to_string(),
                        got: token.to_string(),
                    });
                }
            }
        }
        match tokens.next() {
            Some(value) if !value.is_empty() => values.push(value.to_string()),
            _ => {
                return Err(IdParseError::MissingValue {
                    kind,
                    input: input.to_string(),
                    field,
                });
            }
        }
    }

    let extra: Vec<&str> = tokens.collect();
    if !extra.is_empty() {
        return Err(IdParseError::UnexpectedSegments {
            kind,
            input: input.to_string(),
            extra: extra.join("/"),
        });
    }

    Ok(values)
}

/// Declare an ID type from its segment layout
///
/// Each entry is `"static/prefix" => field: "Label"`; the prefix may span
/// several segments and is always followed by exactly one user value.
macro_rules! resource_id {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $($prefix:literal => $field:ident : $label:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub struct $name {
            $(pub $field: String,)+
        }

        impl $name {
            const LAYOUT: &'static [(&'static str, &'static str)] =
                &[$(($prefix, stringify!($field))),+];

            #[allow(clippy::too_many_arguments)]
            pub fn new($($field: impl Into<String>),+) -> Self {
                Self { $($field: $field.into()),+ }
            }

            /// Canonical string form
            pub fn id(&self) -> String {
                let mut out = String::new();
                $(
                    out.push('/');
                    out.push_str($prefix);
                    out.push('/');
                    out.push_str(&self.$field);
                )+
                out
            }

            pub fn parse(input: &str) -> Result<Self, $crate::ids::IdParseError> {
                Self::parse_with(input, false)
            }

            pub fn parse_insensitively(input: &str) -> Result<Self, $crate::ids::IdParseError> {
                Self::parse_with(input, true)
            }

            fn parse_with(
                input: &str,
                insensitive: bool,
            ) -> Result<Self, $crate::ids::IdParseError> {
                let values =
                    $crate::ids::parse_segments(input, Self::LAYOUT, $kind, insensitive)?;
                let mut values = values.into_iter();
                Ok(Self {
                    $($field: values.next().unwrap_or_default(),)+
                })
            }

            /// Validation function for configuration values
            pub fn validate(input: &str) -> Result<(), String> {
                Self::parse(input).map(|_| ()).map_err(|e| e.to_string())
            }
        }

        impl $crate::ids::ResourceIdType for $name {
            const KIND: &'static str = $kind;

            fn parse(input: &str) -> Result<Self, $crate::ids::IdParseError> {
                $name::parse(input)
            }

            fn parse_insensitively(input: &str) -> Result<Self, $crate::ids::IdParseError> {
                $name::parse_insensitively(input)
            }

            fn id(&self) -> String {
                $name::id(self)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                let parts: Vec<String> = vec![
                    $(format!("{}: {:?}", $label, self.$field)),+
                ];
                write!(f, "{} ({})", $kind, parts.join(" / "))
            }
        }
    };
}

pub(crate) use resource_id;

mod common;
mod datafactory;
mod loganalytics;
mod machinelearning;
mod netapp;
mod nested_item;
mod privatedns;
mod sql;

pub use common::*;
pub use datafactory::*;
pub use loganalytics::*;
pub use machinelearning::*;
pub use netapp::*;
pub use nested_item::{NestedItemId, NestedItemType, VersionType};
pub use privatedns::*;
pub use sql::*;

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEDULE: &str = "/subscriptions/12345678-1234-9876-4563-123456789012/resourceGroups/resGroup1/providers/Microsoft.Sql/managedInstances/instance1/startStopSchedules/default";

    #[test]
    fn start_stop_schedule_id_cases() {
        let cases = [
            ("", false),
            ("/", false),
            ("/subscriptions/", false),
            ("/subscriptions/12345678-1234-9876-4563-123456789012/", false),
            (
                "/subscriptions/12345678-1234-9876-4563-123456789012/resourceGroups/",
                false,
            ),
            (
                "/subscriptions/12345678-1234-9876-4563-123456789012/resourceGroups/resGroup1/providers/Microsoft.Sql/",
                false,
            ),
            (
                "/subscriptions/12345678-1234-9876-4563-123456789012/resourceGroups/resGroup1/providers/Microsoft.Sql/managedInstances/",
                false,
            ),
            (
                "/subscriptions/12345678-1234-9876-4563-123456789012/resourceGroups/resGroup1/providers/Microsoft.Sql/managedInstances/instance1/",
                false,
            ),
            (
                "/subscriptions/12345678-1234-9876-4563-123456789012/resourceGroups/resGroup1/providers/Microsoft.Sql/managedInstances/instance1/startStopSchedules/",
                false,
            ),
            (SCHEDULE, true),
            (
                "/SUBSCRIPTIONS/12345678-1234-9876-4563-123456789012/RESOURCEGROUPS/RESGROUP1/PROVIDERS/MICROSOFT.SQL/MANAGEDINSTANCES/INSTANCE1/STARTSTOPSCHEDULES/DEFAULT",
                false,
            ),
        ];

        for (input, valid) in cases {
            let result = ManagedInstanceStartStopScheduleId::validate(input);
            assert_eq!(result.is_ok(), valid, "input {:?}: {:?}", input, result);
        }
    }

    #[test]
    fn parse_and_format_round_trip() {
        let id = ManagedInstanceStartStopScheduleId::parse(SCHEDULE).unwrap();
        assert_eq!(id.managed_instance_name, "instance1");
        assert_eq!(id.start_stop_schedule_name, "default");
        assert_eq!(id.id(), SCHEDULE);
    }

    #[test]
    fn insensitive_parse_keeps_user_values() {
        let id = ManagedInstanceStartStopScheduleId::parse_insensitively(&SCHEDULE.replace(
            "resourceGroups",
            "resourcegroups",
        ))
        .unwrap();
        assert_eq!(id.resource_group_name, "resGroup1");
        assert_eq!(id.id(), SCHEDULE);
    }

    #[test]
    fn trailing_and_extra_segments_are_rejected() {
        let err = ManagedInstanceStartStopScheduleId::parse(&format!("{}/", SCHEDULE)).unwrap_err();
        assert!(matches!(err, IdParseError::UnexpectedSegments { .. }));

        let err =
            ManagedInstanceStartStopScheduleId::parse(&format!("{}/extra/value", SCHEDULE)).unwrap_err();
        assert!(matches!(err, IdParseError::UnexpectedSegments { .. }));
    }

    #[test]
    fn display_is_human_readable() {
        let id = ResourceGroupId::new("sub", "rg");
        assert_eq!(
            id.to_string(),
            "Resource Group (Subscription: \"sub\" / Resource Group Name: \"rg\")"
        );
    }

    #[test]
    fn id_type_validates_configuration_values() {
        let t = id_type::<ResourceGroupId>();
        assert!(
            t.validate(&cirrus_core::resource::Value::string("/subscriptions/1/resourceGroups/rg"))
                .is_ok()
        );
        assert!(
            t.validate(&cirrus_core::resource::Value::string("/subscriptions/1"))
                .is_err()
        );
    }
}
