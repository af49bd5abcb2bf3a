//! Query string and urlencoded form decoding.

use serde_json::Value;
use url::form_urlencoded;

use super::populate::{group, populate_params, FieldFilter, FieldValue};
use super::{content_type_essence, DecodeInput};
use crate::errors::Status;

pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Bind query parameters, then urlencoded form fields, onto the outer request.
///
/// Parameters naming the body field or a path parameter are skipped: those
/// are owned by the JSON and path decoders.
pub(super) fn decode(input: &DecodeInput<'_>, target: &mut Value) -> Result<(), Status> {
    let mut pairs: Vec<(String, FieldValue)> = input
        .query
        .map(|query| {
            form_urlencoded::parse(query.as_bytes())
                .map(|(k, v)| (k.into_owned(), FieldValue::Text(v.into_owned())))
                .collect()
        })
        .unwrap_or_default();

    if content_type_essence(input.headers).as_deref() == Some(FORM_CONTENT_TYPE) {
        pairs.extend(
            form_urlencoded::parse(input.body)
                .map(|(k, v)| (k.into_owned(), FieldValue::Text(v.into_owned()))),
        );
    }
    if pairs.is_empty() {
        return Ok(());
    }

    let mut filter = FieldFilter::new();
    filter.exclude(input.route.request_field().name());
    for name in input.route.path_parameters() {
        filter.exclude(name);
    }

    populate_params(target, input.shape(), &group(pairs), &filter)
}
