//! Lexer and recursive-descent parser for condition and projection
//! expressions.
//!
//! Placeholders are resolved while parsing: `#name` through
//! `ExpressionAttributeNames`, `:value` through `ExpressionAttributeValues`.
//! The result is a [`Condition`] tree holding real attribute names and
//! literal values, the same shape the builder produces. Keywords and
//! function names are matched case-insensitively.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

use dynachain_core::condition::{
    AttributePath, CompareOp, Condition, FunctionName, LogicalOp, Operand, PathElement,
};
use dynachain_model::AttributeValue;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors produced while parsing or evaluating an expression.
#[derive(Debug, thiserror::Error)]
pub enum ExpressionError {
    /// An unexpected token was encountered.
    #[error("Syntax error; token: {found}, expected: {expected}")]
    UnexpectedToken {
        /// What was expected.
        expected: String,
        /// What was found.
        found: String,
    },
    /// The expression was empty or whitespace.
    #[error("The expression can not be empty")]
    Empty,
    /// A `#name` placeholder has no entry in the names map.
    #[error(
        "An expression attribute name used in the document path is not defined; attribute name: {name}"
    )]
    UnresolvedName {
        /// The placeholder, including `#`.
        name: String,
    },
    /// A `:value` placeholder has no entry in the values map.
    #[error("An expression attribute value used in expression is not defined; attribute value: {name}")]
    UnresolvedValue {
        /// The placeholder, including `:`.
        name: String,
    },
    /// Names supplied but never referenced.
    #[error("Value provided in ExpressionAttributeNames unused in expressions: keys: {{{keys}}}")]
    UnusedNames {
        /// Comma-separated placeholders.
        keys: String,
    },
    /// Values supplied but never referenced.
    #[error("Value provided in ExpressionAttributeValues unused in expressions: keys: {{{keys}}}")]
    UnusedValues {
        /// Comma-separated placeholders.
        keys: String,
    },
    /// An operand is invalid for the given operation.
    #[error("Invalid operand for {operation}: {message}")]
    InvalidOperand {
        /// The operation that failed.
        operation: String,
        /// Explanation.
        message: String,
    },
    /// A type mismatch occurred during evaluation.
    #[error("Type mismatch: {message}")]
    TypeMismatch {
        /// Explanation.
        message: String,
    },
}

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Identifier(String),
    Name(String),
    Value(String),
    Compare(CompareOp),
    Dot,
    Comma,
    LParen,
    RParen,
    LBracket,
    RBracket,
    And,
    Or,
    Not,
    Between,
    In,
    Function(FunctionName),
    Size,
    Index(usize),
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identifier(s) => write!(f, "{s}"),
            Self::Name(s) => write!(f, "#{s}"),
            Self::Value(s) => write!(f, ":{s}"),
            Self::Compare(op) => write!(f, "{op}"),
            Self::Dot => f.write_str("."),
            Self::Comma => f.write_str(","),
            Self::LParen => f.write_str("("),
            Self::RParen => f.write_str(")"),
            Self::LBracket => f.write_str("["),
            Self::RBracket => f.write_str("]"),
            Self::And => f.write_str("AND"),
            Self::Or => f.write_str("OR"),
            Self::Not => f.write_str("NOT"),
            Self::Between => f.write_str("BETWEEN"),
            Self::In => f.write_str("IN"),
            Self::Function(name) => write!(f, "{name}"),
            Self::Size => f.write_str("size"),
            Self::Index(n) => write!(f, "{n}"),
            Self::Eof => f.write_str("<EOF>"),
        }
    }
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
        }
    }

    fn tokenize(mut self) -> Result<Vec<Token>, ExpressionError> {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token()?;
            let done = tok == Token::Eof;
            tokens.push(tok);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn bump(&mut self, tok: Token) -> Token {
        self.chars.next();
        tok
    }

    fn next_token(&mut self) -> Result<Token, ExpressionError> {
        while self.chars.peek().is_some_and(char::is_ascii_whitespace) {
            self.chars.next();
        }
        let Some(&ch) = self.chars.peek() else {
            return Ok(Token::Eof);
        };
        let tok = match ch {
            '#' => {
                self.chars.next();
                Token::Name(self.placeholder_body('#')?)
            }
            ':' => {
                self.chars.next();
                Token::Value(self.placeholder_body(':')?)
            }
            '=' => self.bump(Token::Compare(CompareOp::Eq)),
            '<' => {
                self.chars.next();
                match self.chars.peek() {
                    Some('=') => self.bump(Token::Compare(CompareOp::Le)),
                    Some('>') => self.bump(Token::Compare(CompareOp::Ne)),
                    _ => Token::Compare(CompareOp::Lt),
                }
            }
            '>' => {
                self.chars.next();
                match self.chars.peek() {
                    Some('=') => self.bump(Token::Compare(CompareOp::Ge)),
                    _ => Token::Compare(CompareOp::Gt),
                }
            }
            '.' => self.bump(Token::Dot),
            ',' => self.bump(Token::Comma),
            '(' => self.bump(Token::LParen),
            ')' => self.bump(Token::RParen),
            '[' => self.bump(Token::LBracket),
            ']' => self.bump(Token::RBracket),
            c if c.is_ascii_digit() => self.index()?,
            c if c.is_ascii_alphabetic() || c == '_' => keyword_or_identifier(self.word()),
            other => {
                return Err(ExpressionError::UnexpectedToken {
                    expected: "a valid token".to_owned(),
                    found: other.to_string(),
                });
            }
        };
        Ok(tok)
    }

    fn word(&mut self) -> String {
        let mut s = String::new();
        while let Some(&c) = self.chars.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                s.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        s
    }

    fn placeholder_body(&mut self, prefix: char) -> Result<String, ExpressionError> {
        let body = self.word();
        if body.is_empty() {
            return Err(ExpressionError::UnexpectedToken {
                expected: format!("a placeholder name after '{prefix}'"),
                found: self.chars.peek().map_or_else(|| "<EOF>".to_owned(), char::to_string),
            });
        }
        Ok(body)
    }

    fn index(&mut self) -> Result<Token, ExpressionError> {
        let mut digits = String::new();
        while let Some(&c) = self.chars.peek() {
            if !c.is_ascii_digit() {
                break;
            }
            digits.push(c);
            self.chars.next();
        }
        digits
            .parse()
            .map(Token::Index)
            .map_err(|_| ExpressionError::InvalidOperand {
                operation: "list index".to_owned(),
                message: format!("'{digits}' is not a valid index"),
            })
    }
}

fn keyword_or_identifier(word: String) -> Token {
    match word.to_ascii_lowercase().as_str() {
        "and" => Token::And,
        "or" => Token::Or,
        "not" => Token::Not,
        "between" => Token::Between,
        "in" => Token::In,
        "size" => Token::Size,
        "attribute_exists" => Token::Function(FunctionName::AttributeExists),
        "attribute_not_exists" => Token::Function(FunctionName::AttributeNotExists),
        "attribute_type" => Token::Function(FunctionName::AttributeType),
        "begins_with" => Token::Function(FunctionName::BeginsWith),
        "contains" => Token::Function(FunctionName::Contains),
        _ => Token::Identifier(word),
    }
}

// ---------------------------------------------------------------------------
// Placeholder resolution
// ---------------------------------------------------------------------------

/// Resolves placeholders for every expression of one request and tracks
/// which ones were referenced.
///
/// Parse each expression of the request through the same instance, then call
/// [`Placeholders::finish`] to reject names or values nothing referenced.
#[derive(Debug)]
pub struct Placeholders<'a> {
    names: &'a HashMap<String, String>,
    values: &'a HashMap<String, AttributeValue>,
    used_names: HashSet<String>,
    used_values: HashSet<String>,
}

impl<'a> Placeholders<'a> {
    /// Resolve against the request's name and value maps.
    #[must_use]
    pub fn new(
        names: &'a HashMap<String, String>,
        values: &'a HashMap<String, AttributeValue>,
    ) -> Self {
        Self {
            names,
            values,
            used_names: HashSet::new(),
            used_values: HashSet::new(),
        }
    }

    /// Parse a condition, filter or key-condition expression.
    pub fn condition(&mut self, expression: &str) -> Result<Condition, ExpressionError> {
        let mut parser = Parser::new(expression, self)?;
        let condition = parser.parse_or()?;
        parser.expect(&Token::Eof)?;
        Ok(condition)
    }

    /// Parse a projection expression into its document paths.
    pub fn projection(&mut self, expression: &str) -> Result<Vec<AttributePath>, ExpressionError> {
        let mut parser = Parser::new(expression, self)?;
        let mut paths = vec![parser.parse_path()?];
        while parser.peek() == &Token::Comma {
            parser.advance();
            paths.push(parser.parse_path()?);
        }
        parser.expect(&Token::Eof)?;
        Ok(paths)
    }

    /// Fail if a supplied name or value was never referenced.
    pub fn finish(&self) -> Result<(), ExpressionError> {
        let unused_names = unused(self.names.keys(), &self.used_names);
        if !unused_names.is_empty() {
            return Err(ExpressionError::UnusedNames { keys: unused_names });
        }
        let unused_values = unused(self.values.keys(), &self.used_values);
        if !unused_values.is_empty() {
            return Err(ExpressionError::UnusedValues {
                keys: unused_values,
            });
        }
        Ok(())
    }

    fn name(&mut self, body: &str) -> Result<String, ExpressionError> {
        let placeholder = format!("#{body}");
        let name = self
            .names
            .get(&placeholder)
            .cloned()
            .ok_or_else(|| ExpressionError::UnresolvedName {
                name: placeholder.clone(),
            })?;
        self.used_names.insert(placeholder);
        Ok(name)
    }

    fn value(&mut self, body: &str) -> Result<AttributeValue, ExpressionError> {
        let placeholder = format!(":{body}");
        let value = self
            .values
            .get(&placeholder)
            .cloned()
            .ok_or_else(|| ExpressionError::UnresolvedValue {
                name: placeholder.clone(),
            })?;
        self.used_values.insert(placeholder);
        Ok(value)
    }
}

fn unused<'k>(keys: impl Iterator<Item = &'k String>, used: &HashSet<String>) -> String {
    keys.filter(|k| !used.contains(*k))
        .map(String::as_str)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect::<Vec<_>>()
        .join(", ")
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser<'p, 'a> {
    tokens: Vec<Token>,
    pos: usize,
    placeholders: &'p mut Placeholders<'a>,
}

impl<'p, 'a> Parser<'p, 'a> {
    fn new(input: &str, placeholders: &'p mut Placeholders<'a>) -> Result<Self, ExpressionError> {
        let tokens = Lexer::new(input).tokenize()?;
        if tokens.first() == Some(&Token::Eof) {
            return Err(ExpressionError::Empty);
        }
        Ok(Self {
            tokens,
            pos: 0,
            placeholders,
        })
    }

    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens.get(self.pos).cloned().unwrap_or(Token::Eof);
        self.pos += 1;
        tok
    }

    fn expect(&mut self, expected: &Token) -> Result<(), ExpressionError> {
        let tok = self.advance();
        if &tok == expected {
            Ok(())
        } else {
            Err(unexpected(expected.to_string(), &tok))
        }
    }

    // OR binds loosest, then AND, then NOT.
    fn parse_or(&mut self) -> Result<Condition, ExpressionError> {
        let mut left = self.parse_and()?;
        while self.peek() == &Token::Or {
            self.advance();
            let right = self.parse_and()?;
            left = left.combine(LogicalOp::Or, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Condition, ExpressionError> {
        let mut left = self.parse_not()?;
        while self.peek() == &Token::And {
            self.advance();
            let right = self.parse_not()?;
            left = left.combine(LogicalOp::And, right);
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Condition, ExpressionError> {
        if self.peek() == &Token::Not {
            self.advance();
            return Ok(Condition::Not(Box::new(self.parse_not()?)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Condition, ExpressionError> {
        match self.peek() {
            Token::LParen => {
                self.advance();
                let inner = self.parse_or()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Token::Function(name) => {
                let name = *name;
                self.advance();
                self.parse_function(name)
            }
            _ => {
                let left = self.parse_operand()?;
                self.parse_postfix(left)
            }
        }
    }

    fn parse_function(&mut self, name: FunctionName) -> Result<Condition, ExpressionError> {
        self.expect(&Token::LParen)?;
        let args = self.parse_operand_list()?;
        self.expect(&Token::RParen)?;

        let arity = match name {
            FunctionName::AttributeExists | FunctionName::AttributeNotExists => 1,
            FunctionName::AttributeType | FunctionName::BeginsWith | FunctionName::Contains => 2,
        };
        if args.len() != arity {
            return Err(ExpressionError::InvalidOperand {
                operation: name.to_string(),
                message: format!("expected {arity} argument(s), found {}", args.len()),
            });
        }
        if !matches!(args[0], Operand::Path(_)) {
            return Err(ExpressionError::InvalidOperand {
                operation: name.to_string(),
                message: "the first argument must be a document path".to_owned(),
            });
        }
        Ok(Condition::Function { name, args })
    }

    fn parse_postfix(&mut self, left: Operand) -> Result<Condition, ExpressionError> {
        match self.advance() {
            Token::Compare(op) => {
                let right = self.parse_operand()?;
                Ok(Condition::Compare { left, op, right })
            }
            Token::Between => {
                let low = self.parse_operand()?;
                self.expect(&Token::And)?;
                let high = self.parse_operand()?;
                Ok(Condition::Between {
                    value: left,
                    low,
                    high,
                })
            }
            Token::In => {
                self.expect(&Token::LParen)?;
                let list = self.parse_operand_list()?;
                self.expect(&Token::RParen)?;
                Ok(Condition::In { value: left, list })
            }
            other => Err(unexpected(
                "a comparison operator, BETWEEN or IN".to_owned(),
                &other,
            )),
        }
    }

    fn parse_operand_list(&mut self) -> Result<Vec<Operand>, ExpressionError> {
        let mut list = vec![self.parse_operand()?];
        while self.peek() == &Token::Comma {
            self.advance();
            list.push(self.parse_operand()?);
        }
        Ok(list)
    }

    fn parse_operand(&mut self) -> Result<Operand, ExpressionError> {
        match self.peek() {
            Token::Value(body) => {
                let body = body.clone();
                self.advance();
                Ok(Operand::Value(self.placeholders.value(&body)?))
            }
            Token::Size => {
                self.advance();
                self.expect(&Token::LParen)?;
                let path = self.parse_path()?;
                self.expect(&Token::RParen)?;
                Ok(Operand::Size(path))
            }
            _ => Ok(Operand::Path(self.parse_path()?)),
        }
    }

    fn parse_path(&mut self) -> Result<AttributePath, ExpressionError> {
        let mut elements = vec![self.parse_path_name()?];
        loop {
            match self.peek() {
                Token::Dot => {
                    self.advance();
                    elements.push(self.parse_path_name()?);
                }
                Token::LBracket => {
                    self.advance();
                    match self.advance() {
                        Token::Index(idx) => elements.push(PathElement::Index(idx)),
                        other => return Err(unexpected("a list index".to_owned(), &other)),
                    }
                    self.expect(&Token::RBracket)?;
                }
                _ => return Ok(AttributePath { elements }),
            }
        }
    }

    fn parse_path_name(&mut self) -> Result<PathElement, ExpressionError> {
        match self.advance() {
            Token::Identifier(name) => Ok(PathElement::Attribute(name)),
            Token::Name(body) => Ok(PathElement::Attribute(self.placeholders.name(&body)?)),
            other => Err(unexpected("an attribute name or #name".to_owned(), &other)),
        }
    }
}

fn unexpected(expected: String, found: &Token) -> ExpressionError {
    ExpressionError::UnexpectedToken {
        expected,
        found: found.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use dynachain_core::compiler::compile;
    use dynachain_core::condition::{Attr, Key};

    use super::*;

    fn names(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn test_should_recover_builder_condition_from_compiled_expression() {
        let condition = (Key::new("ForumName").eq("Amazon S3")
            & Key::new("Subject").gte("S3 Thread 2"))
            & !(Attr::new("LastPostedBy").eq("User A") | Attr::new("Views").between(1, 3))
            & Attr::new("Tags").is_in(["a", "b"])
            & Attr::new("Replies[0].Author").exists()
            & Attr::new("Message").size().gt(10);
        let compiled = compile(&condition);

        let mut placeholders = Placeholders::new(&compiled.names, &compiled.values);
        let parsed = placeholders.condition(&compiled.expression).unwrap();
        assert_eq!(parsed, condition);
        placeholders.finish().unwrap();
    }

    #[test]
    fn test_should_parse_keywords_case_insensitively() {
        let values = HashMap::from([
            (":a".to_owned(), AttributeValue::from(1)),
            (":b".to_owned(), AttributeValue::from(5)),
        ]);
        let empty = HashMap::new();
        let mut placeholders = Placeholders::new(&empty, &values);
        let parsed = placeholders
            .condition("Views between :a and :b Or not attribute_EXISTS(Views)")
            .unwrap();
        assert!(matches!(
            parsed,
            Condition::Logical {
                op: LogicalOp::Or,
                ..
            }
        ));
    }

    #[test]
    fn test_should_parse_projection_paths() {
        let names = names(&[("#n0", "ForumName"), ("#n1", "Subject")]);
        let empty = HashMap::new();
        let mut placeholders = Placeholders::new(&names, &empty);
        let paths = placeholders
            .projection("#n0, #n1, Info.Tags[2]")
            .unwrap();
        assert_eq!(paths.len(), 3);
        assert_eq!(paths[0], AttributePath::parse("ForumName"));
        assert_eq!(paths[2], AttributePath::parse("Info.Tags[2]"));
        placeholders.finish().unwrap();
    }

    #[test]
    fn test_should_report_unresolved_placeholders() {
        let empty_names = HashMap::new();
        let empty_values = HashMap::new();
        let mut placeholders = Placeholders::new(&empty_names, &empty_values);
        let err = placeholders.condition("#n0 = :v0").unwrap_err();
        assert!(matches!(err, ExpressionError::UnresolvedName { ref name } if name == "#n0"));

        let names = names(&[("#n0", "Views")]);
        let mut placeholders = Placeholders::new(&names, &empty_values);
        let err = placeholders.condition("#n0 = :v0").unwrap_err();
        assert!(matches!(err, ExpressionError::UnresolvedValue { ref name } if name == ":v0"));
    }

    #[test]
    fn test_should_reject_unused_placeholders() {
        let names = names(&[("#n0", "Views"), ("#n1", "Message")]);
        let values = HashMap::from([(":v0".to_owned(), AttributeValue::from(0))]);
        let mut placeholders = Placeholders::new(&names, &values);
        placeholders.condition("#n0 = :v0").unwrap();
        let err = placeholders.finish().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Value provided in ExpressionAttributeNames unused in expressions: keys: {#n1}"
        );
    }

    #[test]
    fn test_should_reject_malformed_expressions() {
        let empty_names = HashMap::new();
        let empty_values = HashMap::new();
        for input in ["", "   ", "Views =", "(Views = Views", "Views ! Views", "Views Views"] {
            let mut placeholders = Placeholders::new(&empty_names, &empty_values);
            assert!(placeholders.condition(input).is_err(), "{input:?}");
        }
        let mut placeholders = Placeholders::new(&empty_names, &empty_values);
        assert!(matches!(
            placeholders.condition("attribute_exists(a, b)"),
            Err(ExpressionError::InvalidOperand { .. })
        ));
    }
}
