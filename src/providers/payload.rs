//! Renders decoded call arguments and event fields into JSON strings.
//!
//! Account ids are emitted in SS58 form so an operator-configured address
//! can be found in a payload by plain substring search. Other byte arrays
//! become `0x`-prefixed hex.

use serde_json::{Map, Value as Json};
use subxt::{
    ext::scale_value::{Composite, Primitive, Value, ValueDef},
    utils::AccountId32,
};

/// Converts a decoded composite (the fields of a call or an event) into JSON.
///
/// `is_account` tells whether a value's type context is an account id.
pub fn composite_to_json<T>(composite: &Composite<T>, is_account: &impl Fn(&T) -> bool) -> Json {
    match composite {
        Composite::Named(fields) => Json::Object(
            fields
                .iter()
                .map(|(name, value)| (name.clone(), value_to_json(value, is_account)))
                .collect::<Map<_, _>>(),
        ),
        Composite::Unnamed(values) => {
            if let Some(bytes) = byte_string(values) {
                return Json::String(format!("0x{}", hex::encode(bytes)));
            }
            match values.as_slice() {
                [single] => value_to_json(single, is_account),
                _ => Json::Array(values.iter().map(|v| value_to_json(v, is_account)).collect()),
            }
        }
    }
}

/// Converts a single decoded value into JSON.
pub fn value_to_json<T>(value: &Value<T>, is_account: &impl Fn(&T) -> bool) -> Json {
    if is_account(&value.context) {
        if let Some(bytes) = account_bytes(value) {
            return Json::String(AccountId32(bytes).to_string());
        }
    }

    match &value.value {
        ValueDef::Composite(composite) => composite_to_json(composite, is_account),
        ValueDef::Variant(variant) =>
            if variant.values.is_empty() {
                Json::String(variant.name.clone())
            } else {
                let mut object = Map::new();
                object.insert(variant.name.clone(), composite_to_json(&variant.values, is_account));
                Json::Object(object)
            },
        ValueDef::BitSequence(bits) => Json::String(format!("{bits:?}")),
        ValueDef::Primitive(primitive) => primitive_to_json(primitive),
    }
}

fn primitive_to_json(primitive: &Primitive) -> Json {
    match primitive {
        Primitive::Bool(b) => Json::Bool(*b),
        Primitive::Char(c) => Json::String(c.to_string()),
        Primitive::String(s) => Json::String(s.clone()),
        Primitive::U128(n) => match u64::try_from(*n) {
            Ok(small) => Json::from(small),
            Err(_) => Json::String(n.to_string()),
        },
        Primitive::I128(n) => match i64::try_from(*n) {
            Ok(small) => Json::from(small),
            Err(_) => Json::String(n.to_string()),
        },
        Primitive::U256(bytes) | Primitive::I256(bytes) =>
            Json::String(format!("0x{}", hex::encode(bytes))),
    }
}

/// Extracts the 32 bytes of an account id, looking through newtype wrappers.
fn account_bytes<T>(value: &Value<T>) -> Option<[u8; 32]> {
    let ValueDef::Composite(Composite::Unnamed(values)) = &value.value else {
        return None;
    };
    if let [inner] = values.as_slice() {
        return account_bytes(inner);
    }
    byte_string(values)?.try_into().ok()
}

/// Returns the bytes when every value is a primitive that fits in a `u8`.
fn byte_string<T>(values: &[Value<T>]) -> Option<Vec<u8>> {
    if values.len() < 2 {
        return None;
    }
    values.iter().map(|v| v.as_u128().and_then(|n| u8::try_from(n).ok())).collect()
}

#[cfg(test)]
mod tests {
    use subxt::ext::scale_value::Variant;

    use super::*;

    const ACCOUNT: u32 = 1;
    const OTHER: u32 = 0;

    fn is_account(ctx: &u32) -> bool {
        *ctx == ACCOUNT
    }

    fn account_value(byte: u8) -> Value<u32> {
        let inner = Value::unnamed_composite((0..32).map(|_| Value::u128(byte as u128)));
        Value::unnamed_composite([inner]).map_context(|_| ACCOUNT)
    }

    #[test]
    fn test_account_ids_render_as_ss58() {
        let dest = Value {
            value: ValueDef::Variant(Variant {
                name: "Id".to_string(),
                values: Composite::Unnamed(vec![account_value(7)]),
            }),
            context: OTHER,
        };
        let fields: Composite<u32> = Composite::Named(vec![
            ("dest".to_string(), dest),
            ("value".to_string(), Value::u128(1_000).map_context(|_| OTHER)),
        ]);

        let json = composite_to_json(&fields, &is_account);

        let expected = AccountId32([7u8; 32]).to_string();
        assert_eq!(json["dest"]["Id"], Json::String(expected.clone()));
        assert_eq!(json["value"], 1_000);
        assert!(json.to_string().contains(&expected));
    }

    #[test]
    fn test_non_account_bytes_render_as_hex() {
        let remark = Value::unnamed_composite([Value::u128(0xde), Value::u128(0xad)])
            .map_context(|_| OTHER);
        let json = value_to_json(&remark, &is_account);
        assert_eq!(json, Json::String("0xdead".to_string()));
    }

    #[test]
    fn test_unit_variant_renders_as_name() {
        let value = Value::unnamed_variant("Free", Vec::<Value<()>>::new()).map_context(|_| OTHER);
        assert_eq!(value_to_json(&value, &is_account), Json::String("Free".to_string()));
    }

    #[test]
    fn test_large_integers_render_as_strings() {
        let value = Value::u128(u128::MAX).map_context(|_| OTHER);
        assert_eq!(value_to_json(&value, &is_account), Json::String(u128::MAX.to_string()));
    }
}
