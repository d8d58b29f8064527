//! Entity identifiers
//!
//! Ids are UUID v4 values rendered with a kind prefix (`task-…`, `flow-…`)
//! so that a flow id pasted where a task id belongs is caught as a
//! type mismatch instead of a dangling reference.

use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

use crate::error::FlowError;

const KNOWN_PREFIXES: &[&str] = &[TaskId::PREFIX, FlowId::PREFIX];

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(Uuid);

        impl $name {
            pub const PREFIX: &'static str = $prefix;

            /// Fresh random id
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            /// Parse the prefixed form produced by `Display`
            pub fn parse(raw: &str) -> Result<Self, FlowError> {
                parse_prefixed(raw, Self::PREFIX).map(Self)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}-{}", Self::PREFIX, self.0.simple())
            }
        }

        impl FromStr for $name {
            type Err = FlowError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }
    };
}

entity_id!(
    /// Process-unique task identity, assigned at construction
    TaskId,
    "task"
);

entity_id!(
    /// Flow identity, assigned when a flow is first persisted
    FlowId,
    "flow"
);

fn parse_prefixed(raw: &str, expected: &str) -> Result<Uuid, FlowError> {
    let Some((prefix, body)) = raw.split_once('-') else {
        return Err(FlowError::invalid_document(format!(
            "malformed {expected} id '{raw}'"
        )));
    };

    if prefix != expected {
        if KNOWN_PREFIXES.contains(&prefix) {
            return Err(FlowError::TypeMismatch {
                expected: format!("{expected} id"),
                actual: format!("{prefix} id '{raw}'"),
            });
        }
        return Err(FlowError::invalid_document(format!(
            "malformed {expected} id '{raw}'"
        )));
    }

    Uuid::parse_str(body).map_err(|e| {
        FlowError::invalid_document(format!("malformed {expected} id '{raw}': {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_display_has_prefix() {
        let id = TaskId::new();
        let rendered = id.to_string();
        assert!(rendered.starts_with("task-"));
        assert_eq!(rendered.len(), "task-".len() + 32);
    }

    #[test]
    fn test_parse_display_form() {
        let id = FlowId::new();
        let parsed: FlowId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_parse_accepts_hyphenated_uuid_body() {
        let uuid = Uuid::new_v4();
        let parsed = TaskId::parse(&format!("task-{}", uuid.hyphenated())).unwrap();
        assert_eq!(parsed.as_uuid(), &uuid);
    }

    #[test]
    fn test_flow_id_where_task_id_expected() {
        let flow_id = FlowId::new().to_string();
        let err = TaskId::parse(&flow_id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    }

    #[test]
    fn test_garbage_is_serialization_error() {
        for raw in ["", "task", "task-nothex", "node-1234"] {
            let err = TaskId::parse(raw).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Serialization, "{raw}");
        }
    }

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(TaskId::new(), TaskId::new());
    }
}
