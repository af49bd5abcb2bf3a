//! Path variable decoding.

use percent_encoding::percent_decode_str;
use serde_json::Value;

use super::populate::{populate_field, FieldValue, PopulateError};
use super::DecodeInput;
use crate::errors::Status;

/// Bind matched path variables, then check every declared parameter was present.
///
/// Variables arrive percent-encoded and are decoded here, one segment at a time.
pub(super) fn decode(input: &DecodeInput<'_>, target: &mut Value) -> Result<(), Status> {
    let shape = input.shape();
    for (name, raw) in input.vars {
        let value = percent_decode_str(raw).decode_utf8().map_err(|_| {
            Status::invalid_argument(format!("path parameter {name} is not valid UTF-8"))
        })?;
        match populate_field(target, shape, name, &[FieldValue::Text(value.into_owned())]) {
            Ok(()) => {}
            Err(PopulateError::UnknownField(_)) => {
                tracing::debug!(field = %name, "Ignoring path parameter with no matching field");
            }
            Err(e) => {
                return Err(Status::invalid_argument(format!(
                    "type mismatch, path parameter: {name}, error: {e}"
                )))
            }
        }
    }

    if let Some(missing) = input
        .route
        .path_parameters()
        .iter()
        .find(|name| !input.vars.iter().any(|(k, _)| k == *name))
    {
        return Err(Status::invalid_argument(format!("missing path parameter {missing}")));
    }
    Ok(())
}
