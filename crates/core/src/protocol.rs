//! JSON contract between the dispatcher and remote agents.
//!
//! `GET /internal/task` answers with a [`TaskEnvelope`]; agents post a
//! [`TaskResult`] back to the same path.

use serde::{Deserialize, Serialize};

use crate::operation::Operation;

/// A ready binary operation handed to an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentTask {
    pub id: String,
    pub operation: Operation,
    #[serde(with = "wire_float")]
    pub arg1: f64,
    #[serde(with = "wire_float")]
    pub arg2: f64,
    /// Simulated compute duration in milliseconds.
    pub operation_time: u64,
    /// Dispatch generation; echo it back so a late result from a reaped
    /// dispatch can be told apart from the current one.
    #[serde(default)]
    pub generation: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEnvelope {
    pub task: AgentTask,
}

/// Result posted by an agent after computing a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub id: String,
    #[serde(with = "wire_float")]
    pub result: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation: Option<u64>,
}

impl AgentTask {
    /// Compute the result locally.
    pub fn evaluate(&self) -> f64 {
        self.operation.apply(self.arg1, self.arg2)
    }

    /// Build the result message for this task.
    pub fn result(&self, value: f64) -> TaskResult {
        TaskResult {
            id: self.id.clone(),
            result: value,
            generation: Some(self.generation),
        }
    }
}

/// Serde adapter for `f64` fields that may carry a division-by-zero result.
///
/// JSON has no literal for infinities or NaN, so those travel as the strings
/// `"inf"`, `"-inf"` and `"NaN"`; finite values stay plain numbers. Use with
/// `#[serde(with = "wire_float")]`, or [`wire_float::option`] for `Option<f64>`.
pub mod wire_float {
    use std::fmt;

    use serde::de::{self, Unexpected, Visitor};
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        match label(*value) {
            Some(label) => serializer.serialize_str(label),
            None => serializer.serialize_f64(*value),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        deserializer.deserialize_any(FloatVisitor)
    }

    fn label(value: f64) -> Option<&'static str> {
        if value.is_nan() {
            Some("NaN")
        } else if value == f64::INFINITY {
            Some("inf")
        } else if value == f64::NEG_INFINITY {
            Some("-inf")
        } else {
            None
        }
    }

    struct FloatVisitor;

    impl Visitor<'_> for FloatVisitor {
        type Value = f64;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a number or one of \"inf\", \"-inf\", \"NaN\"")
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<f64, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<f64, E> {
            Ok(v as f64)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<f64, E> {
            Ok(v as f64)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<f64, E> {
            match v {
                "inf" | "+inf" | "Infinity" => Ok(f64::INFINITY),
                "-inf" | "-Infinity" => Ok(f64::NEG_INFINITY),
                "NaN" | "nan" => Ok(f64::NAN),
                _ => Err(E::invalid_value(Unexpected::Str(v), &self)),
            }
        }
    }

    /// Same encoding for an optional value; `None` is `null`.
    pub mod option {
        use std::fmt;

        use serde::de::{self, Visitor};
        use serde::{Deserializer, Serializer};

        pub fn serialize<S: Serializer>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
            match value {
                Some(v) => super::serialize(v, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
            deserializer.deserialize_option(OptionVisitor)
        }

        struct OptionVisitor;

        impl<'de> Visitor<'de> for OptionVisitor {
            type Value = Option<f64>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("null or a wire float")
            }

            fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(None)
            }

            fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(None)
            }

            fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
                super::deserialize(deserializer).map(Some)
            }
        }
    }
}
