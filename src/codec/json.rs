//! JSON request bodies and JSON responses.

use axum::http::HeaderValue;
use bytes::Bytes;
use serde_json::Value;

use super::DecodeInput;
use crate::errors::Status;

pub const CONTENT_TYPE: &str = "application/json";

/// Merge the JSON body into the request, or into its selected field.
pub(super) fn decode(input: &DecodeInput<'_>, target: &mut Value) -> Result<(), Status> {
    if input.body.iter().all(u8::is_ascii_whitespace) {
        return Ok(());
    }

    let body: Value =
        serde_json::from_slice(input.body).map_err(|e| Status::invalid_argument(e.to_string()))?;
    let slot = input.route.request_field().access_mut(target)?;
    merge(slot, body);
    Ok(())
}

/// Deep merge: objects merge field by field, nulls leave the target alone,
/// anything else replaces it.
pub(crate) fn merge(target: &mut Value, source: Value) {
    match (target, source) {
        (_, Value::Null) => {}
        (Value::Object(fields), Value::Object(source)) => {
            for (key, value) in source {
                match fields.get_mut(&key) {
                    Some(slot) => merge(slot, value),
                    None => {
                        fields.insert(key, value);
                    }
                }
            }
        }
        (target, source) => *target = source,
    }
}

pub(super) fn encode(value: &Value) -> Result<(HeaderValue, Bytes), Status> {
    let body = serde_json::to_vec(value)
        .map_err(|e| Status::internal(format!("failed to encode response: {e}")))?;
    Ok((HeaderValue::from_static(CONTENT_TYPE), Bytes::from(body)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_keeps_untouched_fields() {
        let mut target = json!({"a": 1, "nested": {"b": 2, "c": 3}, "list": [1]});
        merge(
            &mut target,
            json!({"nested": {"b": 20}, "list": [4, 5], "a": null, "extra": true}),
        );

        assert_eq!(
            target,
            json!({"a": 1, "nested": {"b": 20, "c": 3}, "list": [4, 5], "extra": true})
        );
    }

    #[test]
    fn merge_replaces_scalars_and_null_targets() {
        let mut target = json!({"nested": null});
        merge(&mut target, json!({"nested": {"x": 1}}));
        assert_eq!(target, json!({"nested": {"x": 1}}));

        let mut scalar = json!("old");
        merge(&mut scalar, json!("new"));
        assert_eq!(scalar, "new");
    }
}
