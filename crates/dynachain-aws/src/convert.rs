//! Conversions between the wire model and the AWS SDK types.

use std::collections::HashMap;

use aws_sdk_dynamodb::primitives::Blob;
use aws_sdk_dynamodb::types as sdk;
use bytes::Bytes;
use dynachain_model::types::{ConsumedCapacity, ReturnConsumedCapacity, Select};
use dynachain_model::{AttributeValue, DynamoDBError, Item};

// ---------------------------------------------------------------------------
// Attribute values
// ---------------------------------------------------------------------------

/// Convert a model value into its SDK form.
#[must_use]
pub fn to_sdk_value(value: AttributeValue) -> sdk::AttributeValue {
    match value {
        AttributeValue::S(s) => sdk::AttributeValue::S(s),
        AttributeValue::N(n) => sdk::AttributeValue::N(n),
        AttributeValue::B(b) => sdk::AttributeValue::B(Blob::new(b.to_vec())),
        AttributeValue::Ss(v) => sdk::AttributeValue::Ss(v),
        AttributeValue::Ns(v) => sdk::AttributeValue::Ns(v),
        AttributeValue::Bs(v) => {
            sdk::AttributeValue::Bs(v.into_iter().map(|b| Blob::new(b.to_vec())).collect())
        }
        AttributeValue::Bool(b) => sdk::AttributeValue::Bool(b),
        AttributeValue::Null(b) => sdk::AttributeValue::Null(b),
        AttributeValue::L(v) => sdk::AttributeValue::L(v.into_iter().map(to_sdk_value).collect()),
        AttributeValue::M(m) => sdk::AttributeValue::M(to_sdk_item(m)),
    }
}

/// Convert an SDK value into the model.
///
/// Fails on variants this SDK version does not know.
pub fn from_sdk_value(value: sdk::AttributeValue) -> Result<AttributeValue, DynamoDBError> {
    Ok(match value {
        sdk::AttributeValue::S(s) => AttributeValue::S(s),
        sdk::AttributeValue::N(n) => AttributeValue::N(n),
        sdk::AttributeValue::B(b) => AttributeValue::B(Bytes::from(b.into_inner())),
        sdk::AttributeValue::Ss(v) => AttributeValue::Ss(v),
        sdk::AttributeValue::Ns(v) => AttributeValue::Ns(v),
        sdk::AttributeValue::Bs(v) => AttributeValue::Bs(
            v.into_iter()
                .map(|b| Bytes::from(b.into_inner()))
                .collect(),
        ),
        sdk::AttributeValue::Bool(b) => AttributeValue::Bool(b),
        sdk::AttributeValue::Null(b) => AttributeValue::Null(b),
        sdk::AttributeValue::L(v) => AttributeValue::L(
            v.into_iter()
                .map(from_sdk_value)
                .collect::<Result<_, _>>()?,
        ),
        sdk::AttributeValue::M(m) => AttributeValue::M(from_sdk_item(m)?),
        other => {
            return Err(DynamoDBError::validation(format!(
                "unsupported attribute value in response: {other:?}"
            )));
        }
    })
}

/// Convert a model item into its SDK form.
#[must_use]
pub fn to_sdk_item(item: Item) -> HashMap<String, sdk::AttributeValue> {
    item.into_iter().map(|(k, v)| (k, to_sdk_value(v))).collect()
}

/// Convert an SDK item into the model.
pub fn from_sdk_item(item: HashMap<String, sdk::AttributeValue>) -> Result<Item, DynamoDBError> {
    item.into_iter()
        .map(|(k, v)| from_sdk_value(v).map(|v| (k, v)))
        .collect()
}

/// `None` for an empty map. DynamoDB rejects empty key, name and value maps.
#[must_use]
pub fn non_empty<V>(map: HashMap<String, V>) -> Option<HashMap<String, V>> {
    (!map.is_empty()).then_some(map)
}

/// Convert an optional SDK item, treating an empty one as absent.
pub fn from_sdk_key(
    key: Option<HashMap<String, sdk::AttributeValue>>,
) -> Result<Item, DynamoDBError> {
    key.map_or_else(|| Ok(Item::new()), from_sdk_item)
}

// ---------------------------------------------------------------------------
// Enums & capacity
// ---------------------------------------------------------------------------

/// `Select` by wire name.
#[must_use]
pub fn to_sdk_select(select: Select) -> sdk::Select {
    sdk::Select::from(select.as_str())
}

/// `ReturnConsumedCapacity` by wire name.
#[must_use]
pub fn to_sdk_return_consumed_capacity(mode: ReturnConsumedCapacity) -> sdk::ReturnConsumedCapacity {
    sdk::ReturnConsumedCapacity::from(mode.as_str())
}

/// Copy the capacity report out of an SDK response.
#[must_use]
pub fn from_sdk_capacity(capacity: Option<sdk::ConsumedCapacity>) -> Option<ConsumedCapacity> {
    capacity.map(|c| ConsumedCapacity {
        table_name: c.table_name,
        capacity_units: c.capacity_units,
        read_capacity_units: c.read_capacity_units,
        write_capacity_units: c.write_capacity_units,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_convert_nested_item_both_ways() {
        let item = Item::from([
            ("ForumName".to_owned(), AttributeValue::from("Amazon S3")),
            ("Views".to_owned(), AttributeValue::from(3)),
            ("Avatar".to_owned(), AttributeValue::B(Bytes::from_static(b"\x00\x01"))),
            (
                "Info".to_owned(),
                AttributeValue::M(Item::from([(
                    "Tags".to_owned(),
                    AttributeValue::L(vec![AttributeValue::from("s3"), AttributeValue::Null(true)]),
                )])),
            ),
        ]);
        let sdk_item = to_sdk_item(item.clone());
        assert_eq!(
            sdk_item.get("Views"),
            Some(&sdk::AttributeValue::N("3".to_owned()))
        );
        assert_eq!(from_sdk_item(sdk_item).unwrap(), item);
    }

    #[test]
    fn test_should_map_enums_by_wire_name() {
        assert_eq!(to_sdk_select(Select::Count), sdk::Select::Count);
        assert_eq!(
            to_sdk_return_consumed_capacity(ReturnConsumedCapacity::Total),
            sdk::ReturnConsumedCapacity::Total
        );
    }

    #[test]
    fn test_should_drop_empty_maps() {
        assert!(non_empty(HashMap::<String, String>::new()).is_none());
        assert!(from_sdk_key(None).unwrap().is_empty());
    }
}
