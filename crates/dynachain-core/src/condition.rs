//! Condition trees over attribute paths and literal values.
//!
//! A [`Condition`] is immutable: `and`, `or` and `!` build a new tree and
//! leave their inputs untouched. [`Key`] constructs the comparisons DynamoDB
//! accepts in a key condition; [`Attr`] constructs everything a filter or
//! write condition may use.
//!
//! ```
//! use dynachain_core::condition::{Attr, Key};
//!
//! let key = Key::new("ForumName").eq("Amazon S3") & Key::new("Subject").gte("S3 Thread 2");
//! let filter = Attr::new("LastPostedBy").eq("User A") | Attr::new("Views").eq(1);
//! assert!(key.is_logical());
//! let negated = !filter;
//! assert!(!negated.is_logical());
//! ```

use std::fmt;
use std::ops::{BitAnd, BitOr, Not};

use dynachain_model::AttributeValue;

// ---------------------------------------------------------------------------
// Operators
// ---------------------------------------------------------------------------

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    /// Equal (`=`).
    Eq,
    /// Not equal (`<>`).
    Ne,
    /// Less than (`<`).
    Lt,
    /// Less than or equal (`<=`).
    Le,
    /// Greater than (`>`).
    Gt,
    /// Greater than or equal (`>=`).
    Ge,
}

impl CompareOp {
    /// Returns `true` for the operators allowed in a key condition.
    #[must_use]
    pub fn is_key_operator(self) -> bool {
        !matches!(self, Self::Ne)
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eq => write!(f, "="),
            Self::Ne => write!(f, "<>"),
            Self::Lt => write!(f, "<"),
            Self::Le => write!(f, "<="),
            Self::Gt => write!(f, ">"),
            Self::Ge => write!(f, ">="),
        }
    }
}

/// Logical operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalOp {
    /// Logical AND.
    And,
    /// Logical OR.
    Or,
}

impl fmt::Display for LogicalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => write!(f, "AND"),
            Self::Or => write!(f, "OR"),
        }
    }
}

/// Built-in DynamoDB condition functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionName {
    /// `attribute_exists(path)`.
    AttributeExists,
    /// `attribute_not_exists(path)`.
    AttributeNotExists,
    /// `attribute_type(path, type)`.
    AttributeType,
    /// `begins_with(path, prefix)`.
    BeginsWith,
    /// `contains(path, operand)`.
    Contains,
}

impl fmt::Display for FunctionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AttributeExists => write!(f, "attribute_exists"),
            Self::AttributeNotExists => write!(f, "attribute_not_exists"),
            Self::AttributeType => write!(f, "attribute_type"),
            Self::BeginsWith => write!(f, "begins_with"),
            Self::Contains => write!(f, "contains"),
        }
    }
}

// ---------------------------------------------------------------------------
// Paths and operands
// ---------------------------------------------------------------------------

/// A single element in an attribute path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathElement {
    /// A named attribute.
    Attribute(String),
    /// A list index dereference (`[0]`).
    Index(usize),
}

/// A document path such as `info.rating` or `tags[0]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttributePath {
    /// The path elements in order.
    pub elements: Vec<PathElement>,
}

impl AttributePath {
    /// Split a dotted path into elements.
    ///
    /// Segments are separated by `.`; a segment may end with one or more
    /// `[n]` list indexes. A segment whose brackets do not hold a number is
    /// kept verbatim as an attribute name.
    #[must_use]
    pub fn parse(path: &str) -> Self {
        let mut elements = Vec::new();
        for segment in path.split('.') {
            match split_indexes(segment) {
                Some((name, indexes)) => {
                    elements.push(PathElement::Attribute(name.to_owned()));
                    elements.extend(indexes.into_iter().map(PathElement::Index));
                }
                None => elements.push(PathElement::Attribute(segment.to_owned())),
            }
        }
        Self { elements }
    }

    /// Returns the top-level attribute name.
    #[must_use]
    pub fn root(&self) -> Option<&str> {
        match self.elements.first() {
            Some(PathElement::Attribute(name)) => Some(name),
            _ => None,
        }
    }

    /// Returns `true` if the path names a single top-level attribute.
    #[must_use]
    pub fn is_top_level(&self) -> bool {
        self.elements.len() == 1 && self.root().is_some()
    }
}

fn split_indexes(segment: &str) -> Option<(&str, Vec<usize>)> {
    let Some(open) = segment.find('[') else {
        return Some((segment, Vec::new()));
    };
    let (name, mut rest) = segment.split_at(open);
    if name.is_empty() {
        return None;
    }
    let mut indexes = Vec::new();
    while !rest.is_empty() {
        let inner = rest.strip_prefix('[')?;
        let close = inner.find(']')?;
        indexes.push(inner[..close].parse().ok()?);
        rest = &inner[close + 1..];
    }
    Some((name, indexes))
}

impl From<&str> for AttributePath {
    fn from(path: &str) -> Self {
        Self::parse(path)
    }
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, elem) in self.elements.iter().enumerate() {
            match elem {
                PathElement::Attribute(name) if i > 0 => write!(f, ".{name}")?,
                PathElement::Attribute(name) => write!(f, "{name}")?,
                PathElement::Index(idx) => write!(f, "[{idx}]")?,
            }
        }
        Ok(())
    }
}

/// An operand in a condition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operand {
    /// A document path.
    Path(AttributePath),
    /// A literal value.
    Value(AttributeValue),
    /// `size(path)`.
    Size(AttributePath),
}

// ---------------------------------------------------------------------------
// Condition tree
// ---------------------------------------------------------------------------

/// A boolean condition tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Condition {
    /// `left op right`.
    Compare {
        /// Left-hand operand.
        left: Operand,
        /// Comparison operator.
        op: CompareOp,
        /// Right-hand operand.
        right: Operand,
    },
    /// `value BETWEEN low AND high`.
    Between {
        /// Value to test.
        value: Operand,
        /// Lower bound (inclusive).
        low: Operand,
        /// Upper bound (inclusive).
        high: Operand,
    },
    /// `value IN (list...)`.
    In {
        /// Value to search for.
        value: Operand,
        /// Candidate values.
        list: Vec<Operand>,
    },
    /// `left AND right` or `left OR right`.
    Logical {
        /// Logical operator.
        op: LogicalOp,
        /// Left-hand condition.
        left: Box<Condition>,
        /// Right-hand condition.
        right: Box<Condition>,
    },
    /// `NOT condition`.
    Not(Box<Condition>),
    /// `function(args...)`.
    Function {
        /// Function name.
        name: FunctionName,
        /// Function arguments.
        args: Vec<Operand>,
    },
}

impl Condition {
    /// Compose two conditions with `op`.
    #[must_use]
    pub fn combine(self, op: LogicalOp, other: Self) -> Self {
        Self::Logical {
            op,
            left: Box::new(self),
            right: Box::new(other),
        }
    }

    /// `self AND other`.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        self.combine(LogicalOp::And, other)
    }

    /// `self OR other`.
    #[must_use]
    pub fn or(self, other: Self) -> Self {
        self.combine(LogicalOp::Or, other)
    }

    /// Returns `true` for AND/OR nodes.
    #[must_use]
    pub fn is_logical(&self) -> bool {
        matches!(self, Self::Logical { .. })
    }
}

impl BitAnd for Condition {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        self.and(rhs)
    }
}

impl BitOr for Condition {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.or(rhs)
    }
}

impl Not for Condition {
    type Output = Self;

    fn not(self) -> Self {
        Self::Not(Box::new(self))
    }
}

// ---------------------------------------------------------------------------
// Constructors
// ---------------------------------------------------------------------------

fn compare(path: &AttributePath, op: CompareOp, value: AttributeValue) -> Condition {
    Condition::Compare {
        left: Operand::Path(path.clone()),
        op,
        right: Operand::Value(value),
    }
}

fn between(left: Operand, low: AttributeValue, high: AttributeValue) -> Condition {
    Condition::Between {
        value: left,
        low: Operand::Value(low),
        high: Operand::Value(high),
    }
}

fn function(name: FunctionName, path: &AttributePath, arg: Option<AttributeValue>) -> Condition {
    let mut args = vec![Operand::Path(path.clone())];
    args.extend(arg.map(Operand::Value));
    Condition::Function { name, args }
}

/// A key attribute, offering only the operators legal in a key condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key {
    path: AttributePath,
}

impl Key {
    /// Reference the key attribute `name`.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            path: AttributePath::parse(name),
        }
    }

    /// `name = value`.
    #[must_use]
    pub fn eq(&self, value: impl Into<AttributeValue>) -> Condition {
        compare(&self.path, CompareOp::Eq, value.into())
    }

    /// `name < value`.
    #[must_use]
    pub fn lt(&self, value: impl Into<AttributeValue>) -> Condition {
        compare(&self.path, CompareOp::Lt, value.into())
    }

    /// `name <= value`.
    #[must_use]
    pub fn lte(&self, value: impl Into<AttributeValue>) -> Condition {
        compare(&self.path, CompareOp::Le, value.into())
    }

    /// `name > value`.
    #[must_use]
    pub fn gt(&self, value: impl Into<AttributeValue>) -> Condition {
        compare(&self.path, CompareOp::Gt, value.into())
    }

    /// `name >= value`.
    #[must_use]
    pub fn gte(&self, value: impl Into<AttributeValue>) -> Condition {
        compare(&self.path, CompareOp::Ge, value.into())
    }

    /// `name BETWEEN low AND high`.
    #[must_use]
    pub fn between(
        &self,
        low: impl Into<AttributeValue>,
        high: impl Into<AttributeValue>,
    ) -> Condition {
        between(Operand::Path(self.path.clone()), low.into(), high.into())
    }

    /// `begins_with(name, prefix)`.
    #[must_use]
    pub fn begins_with(&self, prefix: impl Into<AttributeValue>) -> Condition {
        function(FunctionName::BeginsWith, &self.path, Some(prefix.into()))
    }
}

/// A non-key attribute, offering every condition DynamoDB supports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attr {
    path: AttributePath,
}

impl Attr {
    /// Reference the attribute at `path` (`info.rating`, `tags[0]`).
    #[must_use]
    pub fn new(path: &str) -> Self {
        Self {
            path: AttributePath::parse(path),
        }
    }

    /// `path = value`.
    #[must_use]
    pub fn eq(&self, value: impl Into<AttributeValue>) -> Condition {
        compare(&self.path, CompareOp::Eq, value.into())
    }

    /// `path <> value`.
    #[must_use]
    pub fn ne(&self, value: impl Into<AttributeValue>) -> Condition {
        compare(&self.path, CompareOp::Ne, value.into())
    }

    /// `path < value`.
    #[must_use]
    pub fn lt(&self, value: impl Into<AttributeValue>) -> Condition {
        compare(&self.path, CompareOp::Lt, value.into())
    }

    /// `path <= value`.
    #[must_use]
    pub fn lte(&self, value: impl Into<AttributeValue>) -> Condition {
        compare(&self.path, CompareOp::Le, value.into())
    }

    /// `path > value`.
    #[must_use]
    pub fn gt(&self, value: impl Into<AttributeValue>) -> Condition {
        compare(&self.path, CompareOp::Gt, value.into())
    }

    /// `path >= value`.
    #[must_use]
    pub fn gte(&self, value: impl Into<AttributeValue>) -> Condition {
        compare(&self.path, CompareOp::Ge, value.into())
    }

    /// `path BETWEEN low AND high`.
    #[must_use]
    pub fn between(
        &self,
        low: impl Into<AttributeValue>,
        high: impl Into<AttributeValue>,
    ) -> Condition {
        between(Operand::Path(self.path.clone()), low.into(), high.into())
    }

    /// `begins_with(path, prefix)`.
    #[must_use]
    pub fn begins_with(&self, prefix: impl Into<AttributeValue>) -> Condition {
        function(FunctionName::BeginsWith, &self.path, Some(prefix.into()))
    }

    /// `path IN (values...)`.
    #[must_use]
    pub fn is_in<I, V>(&self, values: I) -> Condition
    where
        I: IntoIterator<Item = V>,
        V: Into<AttributeValue>,
    {
        Condition::In {
            value: Operand::Path(self.path.clone()),
            list: values
                .into_iter()
                .map(|v| Operand::Value(v.into()))
                .collect(),
        }
    }

    /// `attribute_exists(path)`.
    #[must_use]
    pub fn exists(&self) -> Condition {
        function(FunctionName::AttributeExists, &self.path, None)
    }

    /// `attribute_not_exists(path)`.
    #[must_use]
    pub fn not_exists(&self) -> Condition {
        function(FunctionName::AttributeNotExists, &self.path, None)
    }

    /// `contains(path, value)`.
    #[must_use]
    pub fn contains(&self, value: impl Into<AttributeValue>) -> Condition {
        function(FunctionName::Contains, &self.path, Some(value.into()))
    }

    /// `attribute_type(path, type)` where `type` is a descriptor such as `S` or `SS`.
    #[must_use]
    pub fn attribute_type(&self, type_descriptor: &str) -> Condition {
        function(
            FunctionName::AttributeType,
            &self.path,
            Some(AttributeValue::S(type_descriptor.to_owned())),
        )
    }

    /// `size(path)`, for comparisons on the attribute's size.
    #[must_use]
    pub fn size(&self) -> Size {
        Size {
            path: self.path.clone(),
        }
    }
}

/// `size(path)` as the left-hand side of a comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Size {
    path: AttributePath,
}

impl Size {
    fn compare(&self, op: CompareOp, value: AttributeValue) -> Condition {
        Condition::Compare {
            left: Operand::Size(self.path.clone()),
            op,
            right: Operand::Value(value),
        }
    }

    /// `size(path) = value`.
    #[must_use]
    pub fn eq(&self, value: impl Into<AttributeValue>) -> Condition {
        self.compare(CompareOp::Eq, value.into())
    }

    /// `size(path) <> value`.
    #[must_use]
    pub fn ne(&self, value: impl Into<AttributeValue>) -> Condition {
        self.compare(CompareOp::Ne, value.into())
    }

    /// `size(path) < value`.
    #[must_use]
    pub fn lt(&self, value: impl Into<AttributeValue>) -> Condition {
        self.compare(CompareOp::Lt, value.into())
    }

    /// `size(path) <= value`.
    #[must_use]
    pub fn lte(&self, value: impl Into<AttributeValue>) -> Condition {
        self.compare(CompareOp::Le, value.into())
    }

    /// `size(path) > value`.
    #[must_use]
    pub fn gt(&self, value: impl Into<AttributeValue>) -> Condition {
        self.compare(CompareOp::Gt, value.into())
    }

    /// `size(path) >= value`.
    #[must_use]
    pub fn gte(&self, value: impl Into<AttributeValue>) -> Condition {
        self.compare(CompareOp::Ge, value.into())
    }

    /// `size(path) BETWEEN low AND high`.
    #[must_use]
    pub fn between(
        &self,
        low: impl Into<AttributeValue>,
        high: impl Into<AttributeValue>,
    ) -> Condition {
        between(Operand::Size(self.path.clone()), low.into(), high.into())
    }
}
