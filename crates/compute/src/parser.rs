//! Infix expression parser.
//!
//! Two-stack precedence climbing (shunting-yard without parentheses): numbers
//! become completed leaf tasks, each reduction becomes a binary task whose
//! operands are the two topmost stack entries.

use calc_core::Operation;
use tracing::debug;

use crate::error::ParseError;
use crate::graph::{GraphBuilder, NodeIndex, Operand, TaskGraph};

/// Parse `expression` into a task graph.
///
/// Accepts digits, `.`, `+ - * /` and whitespace (ignored). `*` and `/` bind
/// tighter than `+` and `-`; equal precedence associates left to right.
/// Division by a literal zero is accepted and evaluates to a non-finite value.
pub fn parse(expression: &str) -> Result<TaskGraph, ParseError> {
    let mut parser = Parser::default();

    for (position, ch) in expression.chars().enumerate() {
        if ch.is_whitespace() {
            continue;
        }
        if ch.is_ascii_digit() || ch == '.' {
            parser.number.push(ch);
            continue;
        }
        match Operation::from_symbol(ch) {
            Some(op) => parser.operator(op)?,
            None => return Err(ParseError::InvalidCharacter { ch, position }),
        }
    }

    parser.finish()
}

#[derive(Default)]
struct Parser {
    builder: GraphBuilder,
    operands: Vec<NodeIndex>,
    operators: Vec<Operation>,
    number: String,
}

impl Parser {
    fn operator(&mut self, op: Operation) -> Result<(), ParseError> {
        self.flush_number()?;
        while let Some(&top) = self.operators.last() {
            if top.precedence() < op.precedence() {
                break;
            }
            self.reduce()?;
        }
        self.operators.push(op);
        Ok(())
    }

    fn flush_number(&mut self) -> Result<(), ParseError> {
        if self.number.is_empty() {
            return Ok(());
        }
        let literal = std::mem::take(&mut self.number);
        let value: f64 = literal
            .parse()
            .map_err(|_| ParseError::InvalidNumber(literal.clone()))?;
        let idx = self.builder.number(value);
        self.operands.push(idx);
        Ok(())
    }

    fn reduce(&mut self) -> Result<(), ParseError> {
        let Some(op) = self.operators.pop() else {
            return Err(ParseError::InvalidExpression("no operator to apply".into()));
        };
        let (Some(arg2), Some(arg1)) = (self.operands.pop(), self.operands.pop()) else {
            return Err(ParseError::InvalidExpression(format!(
                "operator '{op}' is missing an operand"
            )));
        };
        let idx = self
            .builder
            .binary(op, Operand::Task(arg1), Operand::Task(arg2));
        self.operands.push(idx);
        Ok(())
    }

    fn finish(mut self) -> Result<TaskGraph, ParseError> {
        self.flush_number()?;
        while !self.operators.is_empty() {
            self.reduce()?;
        }
        match self.operands.as_slice() {
            [root] => {
                let root = *root;
                let graph = self.builder.finish(root);
                debug!(tasks = graph.len(), "parsed expression");
                Ok(graph)
            }
            [] => Err(ParseError::InvalidExpression("empty expression".into())),
            _ => Err(ParseError::InvalidExpression("too many operands".into())),
        }
    }
}
