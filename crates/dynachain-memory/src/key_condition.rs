//! Splits a parsed key condition into the partition value and an optional
//! sort-key condition.

use dynachain_core::condition::{CompareOp, Condition, FunctionName, LogicalOp, Operand};
use dynachain_model::{AttributeValue, DynamoDBError};

use crate::storage::{KeyAttribute, KeySchema, SortKeyCondition, SortableAttributeValue};

/// The partition equality and the sort-key condition of a query.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyCondition {
    /// Value the partition key must equal.
    pub partition: AttributeValue,
    /// Condition on the sort key, if any.
    pub sort: Option<SortKeyCondition>,
}

/// Extract the key condition against `schema`.
///
/// The condition must be one partition-key equality, optionally AND-ed with
/// one sort-key comparison, `BETWEEN` or `begins_with`.
pub fn extract(condition: &Condition, schema: &KeySchema) -> Result<KeyCondition, DynamoDBError> {
    let mut leaves = Vec::new();
    conjuncts(condition, &mut leaves)?;

    let mut partition = None;
    let mut sort = None;
    for leaf in leaves {
        match classify(leaf, schema)? {
            Part::Partition(value) => {
                if partition.replace(value).is_some() {
                    return Err(invalid("a key attribute may be used only once"));
                }
            }
            Part::Sort(cond) => {
                if sort.replace(cond).is_some() {
                    return Err(invalid("a key attribute may be used only once"));
                }
            }
        }
    }

    let partition = partition.ok_or_else(|| {
        DynamoDBError::validation(format!(
            "Query condition missed key schema element: {}",
            schema.partition_key.name
        ))
    })?;
    Ok(KeyCondition { partition, sort })
}

enum Part {
    Partition(AttributeValue),
    Sort(SortKeyCondition),
}

fn conjuncts<'c>(condition: &'c Condition, out: &mut Vec<&'c Condition>) -> Result<(), DynamoDBError> {
    match condition {
        Condition::Logical {
            op: LogicalOp::And,
            left,
            right,
        } => {
            conjuncts(left, out)?;
            conjuncts(right, out)
        }
        Condition::Logical {
            op: LogicalOp::Or, ..
        } => Err(invalid("unsupported operator OR")),
        Condition::Not(_) => Err(invalid("unsupported operator NOT")),
        leaf => {
            out.push(leaf);
            Ok(())
        }
    }
}

fn classify(leaf: &Condition, schema: &KeySchema) -> Result<Part, DynamoDBError> {
    match leaf {
        Condition::Compare { left, op, right } => {
            let (name, value, op) = match (left, right) {
                (Operand::Path(path), Operand::Value(value)) => (path_name(path)?, value, *op),
                (Operand::Value(value), Operand::Path(path)) => {
                    (path_name(path)?, value, flip(*op))
                }
                _ => return Err(invalid("key comparisons need one attribute and one value")),
            };
            if name == schema.partition_key.name {
                if op != CompareOp::Eq {
                    return Err(invalid(&format!(
                        "the partition key {name} only supports equality"
                    )));
                }
                let value = checked(&schema.partition_key, value)?;
                return Ok(Part::Partition(value));
            }
            let sk = sort_key(schema, name)?;
            let v = sortable(sk, value)?;
            let cond = match op {
                CompareOp::Eq => SortKeyCondition::Eq(v),
                CompareOp::Lt => SortKeyCondition::Lt(v),
                CompareOp::Le => SortKeyCondition::Le(v),
                CompareOp::Gt => SortKeyCondition::Gt(v),
                CompareOp::Ge => SortKeyCondition::Ge(v),
                CompareOp::Ne => return Err(invalid("unsupported operator <>")),
            };
            Ok(Part::Sort(cond))
        }
        Condition::Between { value, low, high } => {
            let (Operand::Path(path), Operand::Value(low), Operand::Value(high)) =
                (value, low, high)
            else {
                return Err(invalid("BETWEEN needs an attribute and two values"));
            };
            let sk = sort_key(schema, path_name(path)?)?;
            let (low, high) = (sortable(sk, low)?, sortable(sk, high)?);
            if low > high {
                return Err(invalid(
                    "the BETWEEN lower bound is greater than the upper bound",
                ));
            }
            Ok(Part::Sort(SortKeyCondition::Between(low, high)))
        }
        Condition::Function {
            name: FunctionName::BeginsWith,
            args,
        } => {
            let [Operand::Path(path), Operand::Value(prefix)] = args.as_slice() else {
                return Err(invalid("begins_with needs an attribute and a value"));
            };
            let sk = sort_key(schema, path_name(path)?)?;
            if !matches!(prefix, AttributeValue::S(_) | AttributeValue::B(_)) {
                return Err(invalid("begins_with needs a string or binary prefix"));
            }
            Ok(Part::Sort(SortKeyCondition::BeginsWith(sortable(sk, prefix)?)))
        }
        Condition::Function { name, .. } => {
            Err(invalid(&format!("unsupported function {name}")))
        }
        Condition::In { .. } => Err(invalid("unsupported operator IN")),
        Condition::Logical { .. } | Condition::Not(_) => Err(invalid("unsupported operator")),
    }
}

fn path_name(path: &dynachain_core::condition::AttributePath) -> Result<&str, DynamoDBError> {
    if !path.is_top_level() {
        return Err(invalid("nested attributes are not key attributes"));
    }
    path.root()
        .ok_or_else(|| invalid("nested attributes are not key attributes"))
}

fn sort_key<'s>(schema: &'s KeySchema, name: &str) -> Result<&'s KeyAttribute, DynamoDBError> {
    schema
        .sort_key
        .as_ref()
        .filter(|sk| sk.name == name)
        .ok_or_else(|| {
            DynamoDBError::validation(format!(
                "Query condition missed key schema element: {name} is not a key attribute"
            ))
        })
}

fn checked(attr: &KeyAttribute, value: &AttributeValue) -> Result<AttributeValue, DynamoDBError> {
    SortableAttributeValue::typed(attr, value)
        .map(|_| value.clone())
        .map_err(|_| mismatch(attr))
}

fn sortable(attr: &KeyAttribute, value: &AttributeValue) -> Result<SortableAttributeValue, DynamoDBError> {
    SortableAttributeValue::typed(attr, value).map_err(|_| mismatch(attr))
}

fn mismatch(attr: &KeyAttribute) -> DynamoDBError {
    DynamoDBError::validation(format!(
        "One or more parameter values were invalid: Condition parameter type does not match schema type for key attribute {}",
        attr.name
    ))
}

fn flip(op: CompareOp) -> CompareOp {
    match op {
        CompareOp::Lt => CompareOp::Gt,
        CompareOp::Le => CompareOp::Ge,
        CompareOp::Gt => CompareOp::Lt,
        CompareOp::Ge => CompareOp::Le,
        other => other,
    }
}

fn invalid(reason: &str) -> DynamoDBError {
    DynamoDBError::validation(format!(
        "Query key condition not supported: {reason}"
    ))
}

#[cfg(test)]
mod tests {
    use dynachain_core::condition::{Attr, Key};
    use dynachain_model::types::ScalarAttributeType;

    use super::*;

    fn schema() -> KeySchema {
        KeySchema::new("ForumName", ScalarAttributeType::S)
            .with_sort_key("Subject", ScalarAttributeType::S)
    }

    #[test]
    fn test_should_extract_partition_and_sort_condition() {
        let cond = Key::new("ForumName").eq("Amazon S3") & Key::new("Subject").gte("S3 Thread 2");
        let key = extract(&cond, &schema()).unwrap();
        assert_eq!(key.partition, AttributeValue::from("Amazon S3"));
        assert_eq!(
            key.sort,
            Some(SortKeyCondition::Ge(SortableAttributeValue::S(
                "S3 Thread 2".to_owned()
            )))
        );
    }

    #[test]
    fn test_should_accept_sort_condition_first_and_begins_with() {
        let cond = Key::new("Subject").begins_with("S3") & Key::new("ForumName").eq("Amazon S3");
        let key = extract(&cond, &schema()).unwrap();
        assert!(matches!(key.sort, Some(SortKeyCondition::BeginsWith(_))));
    }

    #[test]
    fn test_should_require_partition_equality() {
        let err = extract(&Key::new("Subject").eq("S3 Thread 1"), &schema()).unwrap_err();
        assert!(err.message.contains("missed key schema element: ForumName"));

        let err = extract(&Key::new("ForumName").gt("A"), &schema()).unwrap_err();
        assert!(err.message.contains("only supports equality"));
    }

    #[test]
    fn test_should_reject_non_key_and_or_conditions() {
        let or = Key::new("ForumName").eq("a") | Key::new("ForumName").eq("b");
        assert!(extract(&or, &schema()).is_err());

        let non_key = Key::new("ForumName").eq("a") & Attr::new("Views").eq(1);
        assert!(extract(&non_key, &schema()).is_err());
    }

    #[test]
    fn test_should_reject_mistyped_key_values() {
        let err = extract(&Key::new("ForumName").eq(1), &schema()).unwrap_err();
        assert!(err.message.contains("does not match schema type"));
    }
}
