//! Condition and projection compiler.
//!
//! Renders [`Condition`] trees into DynamoDB expression strings in which
//! every attribute name is replaced by a `#nX` placeholder and every literal
//! value by a `:vX` placeholder. One [`PlaceholderTable`] covers a single
//! compilation pass over one request document, so a name used in both the
//! key condition and the projection gets the same placeholder.
//!
//! Every composite node is wrapped in parentheses:
//!
//! ```
//! use dynachain_core::compiler::compile;
//! use dynachain_core::condition::Attr;
//!
//! let compiled = compile(&(Attr::new("LastPostedBy").eq("User A") | Attr::new("Views").eq(1)));
//! assert_eq!(compiled.expression, "((#n0 = :v0) OR (#n1 = :v1))");
//! assert_eq!(compiled.names["#n0"], "LastPostedBy");
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;

use dynachain_model::AttributeValue;

use crate::condition::{AttributePath, Condition, FunctionName, LogicalOp, Operand, PathElement};
use crate::error::{ChainError, Result};

/// The output of compiling one condition with a fresh placeholder table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledExpression {
    /// The expression string, placeholders only.
    pub expression: String,
    /// `ExpressionAttributeNames`: placeholder to attribute name.
    pub names: HashMap<String, String>,
    /// `ExpressionAttributeValues`: placeholder to value.
    pub values: HashMap<String, AttributeValue>,
}

/// Compile a single condition with a fresh placeholder table.
#[must_use]
pub fn compile(condition: &Condition) -> CompiledExpression {
    let mut table = PlaceholderTable::new();
    let expression = table.render(condition);
    let (names, values) = table.into_maps();
    CompiledExpression {
        expression,
        names,
        values,
    }
}

/// Name and value placeholders for one compilation pass.
///
/// Each distinct name and each distinct value gets exactly one placeholder.
/// Placeholders are numbered in first-use order, skipping any placeholder
/// already present in the maps the table was seeded with.
#[derive(Debug, Default)]
pub struct PlaceholderTable {
    names: HashMap<String, String>,
    values: HashMap<AttributeValue, String>,
    used_names: HashSet<String>,
    used_values: HashSet<String>,
    next_name: usize,
    next_value: usize,
}

impl PlaceholderTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table that reuses the placeholders already on a document.
    #[must_use]
    pub fn seeded(
        names: &HashMap<String, String>,
        values: &HashMap<String, AttributeValue>,
    ) -> Self {
        let mut table = Self::new();
        for (placeholder, name) in names {
            table.used_names.insert(placeholder.clone());
            table
                .names
                .entry(name.clone())
                .or_insert_with(|| placeholder.clone());
        }
        for (placeholder, value) in values {
            table.used_values.insert(placeholder.clone());
            table
                .values
                .entry(value.clone())
                .or_insert_with(|| placeholder.clone());
        }
        table
    }

    /// Returns the placeholder for an attribute name, allocating one if needed.
    pub fn name(&mut self, name: &str) -> String {
        if let Some(placeholder) = self.names.get(name) {
            return placeholder.clone();
        }
        let placeholder = loop {
            let candidate = format!("#n{}", self.next_name);
            self.next_name += 1;
            if !self.used_names.contains(&candidate) {
                break candidate;
            }
        };
        self.used_names.insert(placeholder.clone());
        self.names.insert(name.to_owned(), placeholder.clone());
        placeholder
    }

    /// Returns the placeholder for a literal value, allocating one if needed.
    pub fn value(&mut self, value: &AttributeValue) -> String {
        if let Some(placeholder) = self.values.get(value) {
            return placeholder.clone();
        }
        let placeholder = loop {
            let candidate = format!(":v{}", self.next_value);
            self.next_value += 1;
            if !self.used_values.contains(&candidate) {
                break candidate;
            }
        };
        self.used_values.insert(placeholder.clone());
        self.values.insert(value.clone(), placeholder.clone());
        placeholder
    }

    /// Render a path as placeholders, one per named segment.
    pub fn path(&mut self, path: &AttributePath) -> String {
        let mut out = String::new();
        for (i, elem) in path.elements.iter().enumerate() {
            match elem {
                PathElement::Attribute(name) => {
                    if i > 0 {
                        out.push('.');
                    }
                    out.push_str(&self.name(name));
                }
                PathElement::Index(idx) => {
                    let _ = write!(out, "[{idx}]");
                }
            }
        }
        out
    }

    fn operand(&mut self, operand: &Operand) -> String {
        match operand {
            Operand::Path(path) => self.path(path),
            Operand::Value(value) => self.value(value),
            Operand::Size(path) => format!("size({})", self.path(path)),
        }
    }

    /// Render a condition tree.
    pub fn render(&mut self, condition: &Condition) -> String {
        match condition {
            Condition::Compare { left, op, right } => {
                let left = self.operand(left);
                let right = self.operand(right);
                format!("({left} {op} {right})")
            }
            Condition::Between { value, low, high } => {
                let value = self.operand(value);
                let low = self.operand(low);
                let high = self.operand(high);
                format!("({value} BETWEEN {low} AND {high})")
            }
            Condition::In { value, list } => {
                let value = self.operand(value);
                let list: Vec<String> = list.iter().map(|o| self.operand(o)).collect();
                format!("({value} IN ({}))", list.join(", "))
            }
            Condition::Logical { op, left, right } => {
                let left = self.render(left);
                let right = self.render(right);
                format!("({left} {op} {right})")
            }
            Condition::Not(inner) => format!("(NOT {})", self.render(inner)),
            Condition::Function { name, args } => {
                let args: Vec<String> = args.iter().map(|o| self.operand(o)).collect();
                format!("{name}({})", args.join(", "))
            }
        }
    }

    /// Render a key condition, rejecting constructs DynamoDB does not accept
    /// in a `KeyConditionExpression`.
    pub fn render_key_condition(&mut self, condition: &Condition) -> Result<String> {
        validate_key_condition(condition)?;
        Ok(self.render(condition))
    }

    /// Render a projection list.
    ///
    /// Each entry is split on commas and trimmed; empty names are dropped and
    /// duplicates collapse to their first occurrence. Returns `None` when no
    /// name remains.
    pub fn render_projection<S: AsRef<str>>(&mut self, entries: &[S]) -> Option<String> {
        let mut seen = HashSet::new();
        let mut rendered = Vec::new();
        for name in entries
            .iter()
            .flat_map(|entry| entry.as_ref().split(','))
            .map(str::trim)
            .filter(|name| !name.is_empty())
        {
            if seen.insert(name) {
                rendered.push(self.path(&AttributePath::parse(name)));
            }
        }
        (!rendered.is_empty()).then(|| rendered.join(","))
    }

    /// Consume the table, returning `(ExpressionAttributeNames, ExpressionAttributeValues)`
    /// keyed by placeholder.
    #[must_use]
    pub fn into_maps(self) -> (HashMap<String, String>, HashMap<String, AttributeValue>) {
        let names = self
            .names
            .into_iter()
            .map(|(name, placeholder)| (placeholder, name))
            .collect();
        let values = self
            .values
            .into_iter()
            .map(|(value, placeholder)| (placeholder, value))
            .collect();
        (names, values)
    }
}

fn validate_key_condition(condition: &Condition) -> Result<()> {
    match condition {
        Condition::Logical {
            op: LogicalOp::And,
            left,
            right,
        } => {
            validate_key_condition(left)?;
            validate_key_condition(right)
        }
        Condition::Logical {
            op: LogicalOp::Or, ..
        } => Err(ChainError::invalid_key_condition(
            "OR is not supported in a key condition",
        )),
        Condition::Not(_) => Err(ChainError::invalid_key_condition(
            "NOT is not supported in a key condition",
        )),
        Condition::In { .. } => Err(ChainError::invalid_key_condition(
            "IN is not supported in a key condition",
        )),
        Condition::Compare { left, op, right } => {
            if !op.is_key_operator() {
                return Err(ChainError::invalid_key_condition(format!(
                    "operator {op} is not supported in a key condition"
                )));
            }
            validate_key_operand(left)?;
            validate_key_operand(right)
        }
        Condition::Between { value, low, high } => {
            validate_key_operand(value)?;
            validate_key_operand(low)?;
            validate_key_operand(high)
        }
        Condition::Function {
            name: FunctionName::BeginsWith,
            args,
        } => args.iter().try_for_each(validate_key_operand),
        Condition::Function { name, .. } => Err(ChainError::invalid_key_condition(format!(
            "function {name} is not supported in a key condition"
        ))),
    }
}

fn validate_key_operand(operand: &Operand) -> Result<()> {
    match operand {
        Operand::Size(_) => Err(ChainError::invalid_key_condition(
            "size() is not supported in a key condition",
        )),
        Operand::Path(path) if !path.is_top_level() => Err(ChainError::invalid_key_condition(
            format!("key attribute {path} must be a top-level attribute"),
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{Attr, Key};

    #[test]
    fn test_should_render_comparison_with_placeholders() {
        let compiled = compile(&Key::new("ForumName").eq("Amazon S3"));
        assert_eq!(compiled.expression, "(#n0 = :v0)");
        assert_eq!(compiled.names, HashMap::from([("#n0".to_owned(), "ForumName".to_owned())]));
        assert_eq!(
            compiled.values,
            HashMap::from([(":v0".to_owned(), AttributeValue::from("Amazon S3"))])
        );
    }

    #[test]
    fn test_should_parenthesize_every_composite() {
        let cond = (Attr::new("a").eq(1) | Attr::new("b").eq(2)) & !Attr::new("c").exists();
        let compiled = compile(&cond);
        assert_eq!(
            compiled.expression,
            "(((#n0 = :v0) OR (#n1 = :v1)) AND (NOT attribute_exists(#n2)))"
        );
    }

    #[test]
    fn test_should_share_placeholders_for_repeated_names_and_values() {
        let cond = Attr::new("Views").gte(1) & Attr::new("Views").lte(1) & Attr::new("Replies").eq(1);
        let compiled = compile(&cond);
        assert_eq!(
            compiled.expression,
            "(((#n0 >= :v0) AND (#n0 <= :v0)) AND (#n1 = :v0))"
        );
        assert_eq!(compiled.names.len(), 2);
        assert_eq!(compiled.values.len(), 1);
    }

    #[test]
    fn test_should_render_between_in_and_functions() {
        let mut table = PlaceholderTable::new();
        assert_eq!(
            table.render(&Key::new("Subject").between("A", "M")),
            "(#n0 BETWEEN :v0 AND :v1)"
        );
        assert_eq!(
            table.render(&Attr::new("Views").is_in([0, 1])),
            "(#n1 IN (:v2, :v3))"
        );
        assert_eq!(
            table.render(&Key::new("Subject").begins_with("S3")),
            "begins_with(#n0, :v4)"
        );
        assert_eq!(
            table.render(&Attr::new("Tags").size().gt(1)),
            "(size(#n2) > :v3)"
        );
        assert_eq!(
            table.render(&Attr::new("Message").attribute_type("S")),
            "attribute_type(#n3, :v5)"
        );
    }

    #[test]
    fn test_should_render_nested_paths_per_segment() {
        let compiled = compile(&Attr::new("info.tags[1]").contains("rust"));
        assert_eq!(compiled.expression, "contains(#n0.#n1[1], :v0)");
        assert_eq!(compiled.names["#n0"], "info");
        assert_eq!(compiled.names["#n1"], "tags");
    }

    #[test]
    fn test_should_compile_structurally_equal_output_twice() {
        let cond = Attr::new("LastPostedBy").eq("User A") | Attr::new("Views").eq(1);
        assert_eq!(compile(&cond), compile(&cond));
    }

    #[test]
    fn test_should_reject_or_in_key_condition() {
        let cond = Key::new("ForumName").eq("a") | Key::new("ForumName").eq("b");
        let err = PlaceholderTable::new()
            .render_key_condition(&cond)
            .unwrap_err();
        assert!(matches!(err, ChainError::InvalidKeyCondition { .. }));
    }

    #[test]
    fn test_should_reject_non_key_operators() {
        let mut table = PlaceholderTable::new();
        assert!(table.render_key_condition(&Attr::new("pk").ne("a")).is_err());
        assert!(table.render_key_condition(&Attr::new("pk").exists()).is_err());
        assert!(table.render_key_condition(&Attr::new("pk").size().eq(1)).is_err());
        assert!(table.render_key_condition(&Attr::new("a.b").eq(1)).is_err());
        let ok = Key::new("ForumName").eq("x") & Key::new("Subject").begins_with("S3");
        assert_eq!(
            table.render_key_condition(&ok).unwrap(),
            "((#n0 = :v0) AND begins_with(#n1, :v1))"
        );
    }

    #[test]
    fn test_should_render_projection_trimmed_and_deduplicated() {
        let mut table = PlaceholderTable::new();
        let rendered = table
            .render_projection(&["ForumName, Subject", " Message ", "Subject", ""])
            .unwrap();
        assert_eq!(rendered, "#n0,#n1,#n2");
        let (names, _) = table.into_maps();
        let round_trip: Vec<&str> = rendered.split(',').map(|p| names[p].as_str()).collect();
        assert_eq!(round_trip, vec!["ForumName", "Subject", "Message"]);
    }

    #[test]
    fn test_should_return_none_for_empty_projection() {
        let mut table = PlaceholderTable::new();
        assert_eq!(table.render_projection(&[" , "]), None);
    }

    #[test]
    fn test_should_reuse_seeded_placeholders() {
        let names = HashMap::from([("#n0".to_owned(), "ForumName".to_owned())]);
        let values = HashMap::from([(":v0".to_owned(), AttributeValue::from("Amazon S3"))]);
        let mut table = PlaceholderTable::seeded(&names, &values);
        assert_eq!(table.name("ForumName"), "#n0");
        assert_eq!(table.name("Subject"), "#n1");
        assert_eq!(table.value(&AttributeValue::from("Amazon S3")), ":v0");
        assert_eq!(table.value(&AttributeValue::from("x")), ":v1");
    }

    #[test]
    fn test_should_skip_colliding_placeholders() {
        let names = HashMap::from([("#n0".to_owned(), "Other".to_owned())]);
        let mut table = PlaceholderTable::seeded(&names, &HashMap::new());
        assert_eq!(table.name("ForumName"), "#n1");
    }
}
