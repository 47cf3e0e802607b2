//! Binary arithmetic operations shared by the scheduler and the agents.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// One of the four supported binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Subtract,
    #[serde(rename = "*")]
    Multiply,
    #[serde(rename = "/")]
    Divide,
}

impl Operation {
    /// Map an operator character to its operation, if it is one.
    pub fn from_symbol(ch: char) -> Option<Self> {
        match ch {
            '+' => Some(Self::Add),
            '-' => Some(Self::Subtract),
            '*' => Some(Self::Multiply),
            '/' => Some(Self::Divide),
            _ => None,
        }
    }

    pub fn symbol(self) -> char {
        match self {
            Self::Add => '+',
            Self::Subtract => '-',
            Self::Multiply => '*',
            Self::Divide => '/',
        }
    }

    /// Binding strength: `*` and `/` bind tighter than `+` and `-`.
    pub fn precedence(self) -> u8 {
        match self {
            Self::Add | Self::Subtract => 1,
            Self::Multiply | Self::Divide => 2,
        }
    }

    /// Evaluate `lhs <op> rhs` with IEEE-754 semantics.
    ///
    /// Division by zero is not an error: it yields an infinity or NaN that
    /// flows into dependent operations like any other value.
    pub fn apply(self, lhs: f64, rhs: f64) -> f64 {
        match self {
            Self::Add => lhs + rhs,
            Self::Subtract => lhs - rhs,
            Self::Multiply => lhs * rhs,
            Self::Divide => lhs / rhs,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

impl FromStr for Operation {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(ch), None) => {
                Self::from_symbol(ch).ok_or_else(|| CoreError::UnknownOperation(s.to_string()))
            }
            _ => Err(CoreError::UnknownOperation(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precedence_levels() {
        assert!(Operation::Multiply.precedence() > Operation::Add.precedence());
        assert_eq!(Operation::Multiply.precedence(), Operation::Divide.precedence());
        assert_eq!(Operation::Add.precedence(), Operation::Subtract.precedence());
    }

    #[test]
    fn apply_basic() {
        assert_eq!(Operation::Add.apply(3.0, 4.0), 7.0);
        assert_eq!(Operation::Subtract.apply(10.0, 2.5), 7.5);
        assert_eq!(Operation::Multiply.apply(4.0, 2.0), 8.0);
        assert_eq!(Operation::Divide.apply(8.0, 4.0), 2.0);
    }

    #[test]
    fn divide_by_zero_is_non_finite() {
        assert!(Operation::Divide.apply(1.0, 0.0).is_infinite());
        assert!(Operation::Divide.apply(0.0, 0.0).is_nan());
    }

    #[test]
    fn serde_uses_symbols() {
        let json = serde_json::to_string(&Operation::Multiply).unwrap();
        assert_eq!(json, "\"*\"");
        let op: Operation = serde_json::from_str("\"-\"").unwrap();
        assert_eq!(op, Operation::Subtract);
    }

    #[test]
    fn from_str_rejects_unknown() {
        assert_eq!("/".parse::<Operation>().unwrap(), Operation::Divide);
        assert!("num".parse::<Operation>().is_err());
        assert!("".parse::<Operation>().is_err());
        assert!("%".parse::<Operation>().is_err());
    }
}
