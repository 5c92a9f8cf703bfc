//! Designer-formula interpreter.
//!
//! A minimal four-operator (`+ - * /`) arithmetic expression language over
//! named variables (dimension identifiers) and numeric literals, with
//! parentheses. Expressions are tokenized, converted to postfix with the
//! shunting-yard algorithm, and evaluated against a map of variable values.
//!
//! The interpreter is deliberately lenient: unknown variables evaluate to 0,
//! division by (near-)zero yields 0, and malformed operand counts log an
//! error and yield 0 rather than failing the caller. Expressions are short,
//! designer-authored, and evaluated rarely (rule checks), so robustness is
//! traded for simplicity. Validation only checks parenthesis balance.

use crate::VALUE_EPSILON;
use log::{error, warn};
use std::collections::HashMap;
use thiserror::Error;

/// Error type for formula validation and parsing.
#[derive(Debug, Error)]
pub enum FormulaError {
    #[error("mismatched parenthesis in expression '{0}'")]
    MismatchedParenthesis(String),
}

/// Binary arithmetic operators, in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Operator {
    fn precedence(self) -> u8 {
        match self {
            Operator::Add | Operator::Subtract => 1,
            Operator::Multiply | Operator::Divide => 2,
        }
    }

    fn apply(self, a: f32, b: f32) -> f32 {
        match self {
            Operator::Add => a + b,
            Operator::Subtract => a - b,
            Operator::Multiply => a * b,
            Operator::Divide => {
                if b.abs() > VALUE_EPSILON {
                    a / b
                } else {
                    0.0
                }
            }
        }
    }

    fn from_char(ch: char) -> Option<Self> {
        match ch {
            '+' => Some(Operator::Add),
            '-' => Some(Operator::Subtract),
            '*' => Some(Operator::Multiply),
            '/' => Some(Operator::Divide),
            _ => None,
        }
    }
}

/// A single token of an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f32),
    Variable(String),
    Operator(Operator),
    OpenParen,
    CloseParen,
}

/// Split an expression into tokens.
///
/// Whitespace separates tokens; `+ - * / ( )` are always single-character
/// tokens; any other contiguous run of characters is one identifier-or-number
/// token (classified here: parseable as `f32` means number).
pub fn tokenize(expression: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut current = String::new();

    let mut flush = |current: &mut String, tokens: &mut Vec<Token>| {
        if current.is_empty() {
            return;
        }
        let token = match current.parse::<f32>() {
            Ok(n) => Token::Number(n),
            Err(_) => Token::Variable(current.clone()),
        };
        tokens.push(token);
        current.clear();
    };

    for ch in expression.chars() {
        if ch.is_whitespace() {
            flush(&mut current, &mut tokens);
        } else if let Some(op) = Operator::from_char(ch) {
            flush(&mut current, &mut tokens);
            tokens.push(Token::Operator(op));
        } else if ch == '(' {
            flush(&mut current, &mut tokens);
            tokens.push(Token::OpenParen);
        } else if ch == ')' {
            flush(&mut current, &mut tokens);
            tokens.push(Token::CloseParen);
        } else {
            current.push(ch);
        }
    }
    flush(&mut current, &mut tokens);

    tokens
}

/// Check parenthesis balance. Other malformations are deferred to evaluation.
pub fn validate(expression: &str) -> Result<(), FormulaError> {
    let mut depth: i32 = 0;
    for token in tokenize(expression) {
        match token {
            Token::OpenParen => depth += 1,
            Token::CloseParen => {
                depth -= 1;
                if depth < 0 {
                    return Err(FormulaError::MismatchedParenthesis(expression.to_string()));
                }
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(FormulaError::MismatchedParenthesis(expression.to_string()));
    }
    Ok(())
}

/// Convert infix tokens to postfix (shunting-yard).
fn to_postfix(tokens: Vec<Token>) -> Vec<Token> {
    let mut output = Vec::with_capacity(tokens.len());
    let mut operators: Vec<Token> = Vec::new();

    for token in tokens {
        match token {
            Token::Number(_) | Token::Variable(_) => output.push(token),
            Token::OpenParen => operators.push(token),
            Token::CloseParen => {
                while let Some(top) = operators.pop() {
                    if matches!(top, Token::OpenParen) {
                        break;
                    }
                    output.push(top);
                }
            }
            Token::Operator(op) => {
                loop {
                    let pop_higher = matches!(
                        operators.last(),
                        Some(Token::Operator(top)) if top.precedence() >= op.precedence()
                    );
                    if !pop_higher {
                        break;
                    }
                    if let Some(popped) = operators.pop() {
                        output.push(popped);
                    }
                }
                operators.push(Token::Operator(op));
            }
        }
    }

    while let Some(op) = operators.pop() {
        output.push(op);
    }

    output
}

/// Evaluate a postfix token sequence against variable values.
pub fn evaluate_postfix(tokens: &[Token], values: &HashMap<String, f32>) -> f32 {
    let mut stack: Vec<f32> = Vec::new();

    for token in tokens {
        match token {
            Token::Number(n) => stack.push(*n),
            Token::Variable(name) => match values.get(name) {
                Some(v) => stack.push(*v),
                None => {
                    warn!("formula variable not found: {name}");
                    stack.push(0.0);
                }
            },
            Token::Operator(op) => {
                if stack.len() < 2 {
                    error!("formula evaluation error: insufficient operands");
                    return 0.0;
                }
                let b = stack.pop().unwrap_or(0.0);
                let a = stack.pop().unwrap_or(0.0);
                stack.push(op.apply(a, b));
            }
            Token::OpenParen | Token::CloseParen => {
                // Postfix sequences never contain parentheses.
            }
        }
    }

    stack.first().copied().unwrap_or(0.0)
}

/// Variable-like tokens referenced by an expression, deduplicated in order.
///
/// Used for dependency analysis and cache invalidation by callers.
pub fn extract_variables(expression: &str) -> Vec<String> {
    let mut variables = Vec::new();
    for token in tokenize(expression) {
        if let Token::Variable(name) = token {
            if !variables.contains(&name) {
                variables.push(name);
            }
        }
    }
    variables
}

/// A parsed, validated formula with its cached postfix program.
///
/// Serializes as its source expression and re-parses on deserialization, so
/// designer data files only ever contain the readable infix form.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Formula {
    expression: String,
    postfix: Vec<Token>,
}

impl Formula {
    /// Parse an expression, failing on unbalanced parentheses.
    pub fn parse(expression: &str) -> Result<Self, FormulaError> {
        validate(expression)?;
        let postfix = to_postfix(tokenize(expression));
        Ok(Self {
            expression: expression.to_string(),
            postfix,
        })
    }

    /// The original infix expression.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Evaluate against a map of variable (dimension) values.
    pub fn evaluate(&self, values: &HashMap<String, f32>) -> f32 {
        if self.postfix.is_empty() {
            return 0.0;
        }
        evaluate_postfix(&self.postfix, values)
    }

    /// Variables referenced by this formula.
    pub fn referenced_variables(&self) -> Vec<String> {
        extract_variables(&self.expression)
    }
}

impl TryFrom<String> for Formula {
    type Error = FormulaError;

    fn try_from(expression: String) -> Result<Self, Self::Error> {
        Formula::parse(&expression)
    }
}

impl From<Formula> for String {
    fn from(formula: Formula) -> String {
        formula.expression
    }
}

impl PartialEq for Formula {
    fn eq(&self, other: &Self) -> bool {
        self.expression == other.expression
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, f32)]) -> HashMap<String, f32> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect()
    }

    #[test]
    fn test_tokenize_splits_operators_and_identifiers() {
        let tokens = tokenize("Trust*0.5 + Friendship-10");
        assert_eq!(
            tokens,
            vec![
                Token::Variable("Trust".to_string()),
                Token::Operator(Operator::Multiply),
                Token::Number(0.5),
                Token::Operator(Operator::Add),
                Token::Variable("Friendship".to_string()),
                Token::Operator(Operator::Subtract),
                Token::Number(10.0),
            ]
        );
    }

    #[test]
    fn test_precedence() {
        let f = Formula::parse("A + B * 2").unwrap();
        assert_eq!(f.evaluate(&vars(&[("A", 3.0), ("B", 4.0)])), 11.0);
    }

    #[test]
    fn test_parentheses_override_precedence() {
        let f = Formula::parse("(A + B) * 2").unwrap();
        assert_eq!(f.evaluate(&vars(&[("A", 3.0), ("B", 4.0)])), 14.0);
    }

    #[test]
    fn test_division() {
        let f = Formula::parse("A / B").unwrap();
        assert_eq!(f.evaluate(&vars(&[("A", 10.0), ("B", 4.0)])), 2.5);
    }

    #[test]
    fn test_division_by_zero_yields_zero() {
        let f = Formula::parse("A / B").unwrap();
        assert_eq!(f.evaluate(&vars(&[("A", 10.0), ("B", 0.0)])), 0.0);
    }

    #[test]
    fn test_missing_variable_treated_as_zero() {
        let f = Formula::parse("A + Missing").unwrap();
        assert_eq!(f.evaluate(&vars(&[("A", 7.0)])), 7.0);
    }

    #[test]
    fn test_unbalanced_parens_fail_validation() {
        assert!(Formula::parse("(A + B").is_err());
        assert!(Formula::parse("A + B)").is_err());
        assert!(validate("((A)").is_err());
    }

    #[test]
    fn test_insufficient_operands_yield_zero() {
        let f = Formula::parse("+ A").unwrap();
        assert_eq!(f.evaluate(&vars(&[("A", 5.0)])), 0.0);
    }

    #[test]
    fn test_empty_expression_evaluates_to_zero() {
        let f = Formula::parse("").unwrap();
        assert_eq!(f.evaluate(&HashMap::new()), 0.0);
    }

    #[test]
    fn test_extract_variables_dedups_in_order() {
        let vars = extract_variables("Trust * 0.5 + Friendship - Trust");
        assert_eq!(vars, vec!["Trust".to_string(), "Friendship".to_string()]);
    }

    #[test]
    fn test_formula_serde_roundtrip() {
        let f = Formula::parse("Trust * 0.5 + 1").unwrap();
        let json = serde_json::to_string(&f).unwrap();
        assert_eq!(json, "\"Trust * 0.5 + 1\"");
        let back: Formula = serde_json::from_str(&json).unwrap();
        assert_eq!(back, f);
        assert_eq!(back.evaluate(&vars(&[("Trust", 10.0)])), 6.0);
    }

    #[test]
    fn test_formula_serde_rejects_unbalanced() {
        let result: Result<Formula, _> = serde_json::from_str("\"(A + B\"");
        assert!(result.is_err());
    }
}
