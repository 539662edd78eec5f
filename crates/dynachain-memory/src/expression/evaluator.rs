//! Condition evaluation and projection against stored items.

use std::borrow::Cow;
use std::cmp::Ordering;

use dynachain_core::condition::{
    AttributePath, CompareOp, Condition, FunctionName, LogicalOp, Operand, PathElement,
};
use dynachain_model::{AttributeValue, Item};

use super::parser::ExpressionError;

// ---------------------------------------------------------------------------
// Condition evaluation
// ---------------------------------------------------------------------------

/// Evaluate `condition` against `item`.
///
/// A comparison involving a missing attribute is `false`.
pub fn matches(condition: &Condition, item: &Item) -> Result<bool, ExpressionError> {
    match condition {
        Condition::Compare { left, op, right } => {
            let (Some(l), Some(r)) = (resolve(item, left), resolve(item, right)) else {
                return Ok(false);
            };
            compare(&l, *op, &r)
        }
        Condition::Between { value, low, high } => {
            let (Some(v), Some(lo), Some(hi)) =
                (resolve(item, value), resolve(item, low), resolve(item, high))
            else {
                return Ok(false);
            };
            Ok(compare(&v, CompareOp::Ge, &lo)? && compare(&v, CompareOp::Le, &hi)?)
        }
        Condition::In { value, list } => {
            let Some(v) = resolve(item, value) else {
                return Ok(false);
            };
            for candidate in list {
                if let Some(c) = resolve(item, candidate) {
                    if compare(&v, CompareOp::Eq, &c)? {
                        return Ok(true);
                    }
                }
            }
            Ok(false)
        }
        Condition::Logical { op, left, right } => match op {
            LogicalOp::And => Ok(matches(left, item)? && matches(right, item)?),
            LogicalOp::Or => Ok(matches(left, item)? || matches(right, item)?),
        },
        Condition::Not(inner) => matches(inner, item).map(|v| !v),
        Condition::Function { name, args } => call(*name, args, item),
    }
}

fn call(name: FunctionName, args: &[Operand], item: &Item) -> Result<bool, ExpressionError> {
    let Some(Operand::Path(path)) = args.first() else {
        return Err(ExpressionError::InvalidOperand {
            operation: name.to_string(),
            message: "the first argument must be a document path".to_owned(),
        });
    };
    let target = resolve_path(item, path);
    let argument = args.get(1).and_then(|arg| resolve(item, arg));

    match name {
        FunctionName::AttributeExists => Ok(target.is_some()),
        FunctionName::AttributeNotExists => Ok(target.is_none()),
        FunctionName::AttributeType => {
            let Some(AttributeValue::S(expected)) = argument.as_deref() else {
                return Err(ExpressionError::TypeMismatch {
                    message: "attribute_type expects a type descriptor string".to_owned(),
                });
            };
            Ok(target.is_some_and(|v| v.type_descriptor() == expected.as_str()))
        }
        FunctionName::BeginsWith => Ok(match (target, argument.as_deref()) {
            (Some(AttributeValue::S(s)), Some(AttributeValue::S(prefix))) => {
                s.starts_with(prefix.as_str())
            }
            (Some(AttributeValue::B(b)), Some(AttributeValue::B(prefix))) => {
                b.starts_with(prefix)
            }
            _ => false,
        }),
        FunctionName::Contains => Ok(match (target, argument.as_deref()) {
            (Some(AttributeValue::S(s)), Some(AttributeValue::S(sub))) => s.contains(sub.as_str()),
            (Some(AttributeValue::Ss(set)), Some(AttributeValue::S(v)))
            | (Some(AttributeValue::Ns(set)), Some(AttributeValue::N(v))) => set.contains(v),
            (Some(AttributeValue::Bs(set)), Some(AttributeValue::B(v))) => set.contains(v),
            (Some(AttributeValue::L(list)), Some(v)) => list.contains(v),
            _ => false,
        }),
    }
}

fn resolve<'i>(item: &'i Item, operand: &'i Operand) -> Option<Cow<'i, AttributeValue>> {
    match operand {
        Operand::Path(path) => resolve_path(item, path).map(Cow::Borrowed),
        Operand::Value(value) => Some(Cow::Borrowed(value)),
        Operand::Size(path) => {
            resolve_path(item, path).map(|v| Cow::Owned(AttributeValue::from(size_of(v))))
        }
    }
}

/// Walk a document path through nested maps and lists.
#[must_use]
pub fn resolve_path<'i>(item: &'i Item, path: &AttributePath) -> Option<&'i AttributeValue> {
    let mut elements = path.elements.iter();
    let mut current = match elements.next()? {
        PathElement::Attribute(name) => item.get(name)?,
        PathElement::Index(_) => return None,
    };
    for element in elements {
        current = match element {
            PathElement::Attribute(name) => current.as_m()?.get(name)?,
            PathElement::Index(idx) => current.as_l()?.get(*idx)?,
        };
    }
    Some(current)
}

fn size_of(value: &AttributeValue) -> usize {
    match value {
        AttributeValue::S(s) => s.len(),
        AttributeValue::N(n) => n.len(),
        AttributeValue::B(b) => b.len(),
        AttributeValue::Ss(v) | AttributeValue::Ns(v) => v.len(),
        AttributeValue::Bs(v) => v.len(),
        AttributeValue::L(v) => v.len(),
        AttributeValue::M(m) => m.len(),
        AttributeValue::Bool(_) | AttributeValue::Null(_) => 1,
    }
}

/// Compare two values. Values of different types are never equal and never
/// ordered.
fn compare(
    left: &AttributeValue,
    op: CompareOp,
    right: &AttributeValue,
) -> Result<bool, ExpressionError> {
    let ordering = match (left, right) {
        (AttributeValue::S(a), AttributeValue::S(b)) => Some(a.as_bytes().cmp(b.as_bytes())),
        (AttributeValue::N(a), AttributeValue::N(b)) => number(a)?.partial_cmp(&number(b)?),
        (AttributeValue::B(a), AttributeValue::B(b)) => Some(a.as_ref().cmp(b.as_ref())),
        _ => None,
    };
    Ok(match (op, ordering) {
        (CompareOp::Eq, Some(o)) => o == Ordering::Equal,
        (CompareOp::Eq, None) => left == right,
        (CompareOp::Ne, Some(o)) => o != Ordering::Equal,
        (CompareOp::Ne, None) => left != right,
        (CompareOp::Lt, Some(o)) => o == Ordering::Less,
        (CompareOp::Le, Some(o)) => o != Ordering::Greater,
        (CompareOp::Gt, Some(o)) => o == Ordering::Greater,
        (CompareOp::Ge, Some(o)) => o != Ordering::Less,
        (_, None) => false,
    })
}

fn number(s: &str) -> Result<f64, ExpressionError> {
    s.trim().parse().map_err(|_| ExpressionError::TypeMismatch {
        message: format!("'{s}' is not a valid number"),
    })
}

// ---------------------------------------------------------------------------
// Projection
// ---------------------------------------------------------------------------

/// Keep only the attributes named by `paths`.
///
/// Map paths are rebuilt as nested maps holding just the projected leaf.
/// A path through a list index projects its whole top-level attribute.
#[must_use]
pub fn project(item: &Item, paths: &[AttributePath]) -> Item {
    let mut projected = Item::new();
    for path in paths {
        let Some(value) = resolve_path(item, path) else {
            continue;
        };
        let names: Option<Vec<&str>> = path
            .elements
            .iter()
            .map(|e| match e {
                PathElement::Attribute(name) => Some(name.as_str()),
                PathElement::Index(_) => None,
            })
            .collect();
        match names {
            Some(names) => insert_at(&mut projected, &names, value.clone()),
            None => {
                if let Some((root, whole)) = path.root().and_then(|r| item.get_key_value(r)) {
                    projected.insert(root.clone(), whole.clone());
                }
            }
        }
    }
    projected
}

fn insert_at(target: &mut Item, names: &[&str], value: AttributeValue) {
    match names {
        [] => {}
        [last] => {
            target.insert((*last).to_owned(), value);
        }
        [first, rest @ ..] => {
            let entry = target
                .entry((*first).to_owned())
                .or_insert_with(|| AttributeValue::M(Item::new()));
            if let AttributeValue::M(map) = entry {
                insert_at(map, rest, value);
            }
        }
    }
}
