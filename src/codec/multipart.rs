//! `multipart/form-data` decoding.
//!
//! Text fields bind like query parameters. Files are parked in the request's
//! upload table and bound as [`UploadRef`](crate::context::UploadRef) handles.

use axum::body::Body;
use axum::extract::{FromRequest, Multipart};
use axum::http::{header, Request};
use serde_json::Value;

use super::populate::{group, populate_params, FieldFilter, FieldValue};
use super::DecodeInput;
use crate::context::UploadedFile;
use crate::errors::Status;

pub const CONTENT_TYPE: &str = "multipart/form-data";

pub(super) async fn decode(input: &DecodeInput<'_>, target: &mut Value) -> Result<(), Status> {
    let Some(content_type) = input.headers.get(header::CONTENT_TYPE) else {
        return Ok(());
    };
    let request = Request::builder()
        .header(header::CONTENT_TYPE, content_type.clone())
        .body(Body::from(input.body.clone()))
        .map_err(|e| Status::internal(e.to_string()))?;

    let mut multipart = <Multipart as FromRequest<()>>::from_request(request, &())
        .await
        .map_err(|e| Status::invalid_argument(e.body_text()))?;

    let mut fields = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Status::invalid_argument(e.body_text()))?
    {
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };
        let file_name = field.file_name().map(str::to_owned);
        let content_type = field.content_type().map(str::to_owned);
        let data = field
            .bytes()
            .await
            .map_err(|e| Status::invalid_argument(e.body_text()))?;

        if file_name.is_some() {
            let upload = input.uploads.push(UploadedFile {
                field_name: name.clone(),
                file_name,
                content_type,
                data,
            });
            fields.push((name, FieldValue::Upload(upload)));
        } else {
            let text = String::from_utf8(data.to_vec()).map_err(|_| {
                Status::invalid_argument(format!("multipart field {name} is not valid UTF-8"))
            })?;
            fields.push((name, FieldValue::Text(text)));
        }
    }

    let mut filter = FieldFilter::new();
    for name in input.route.path_parameters() {
        filter.exclude(name);
    }

    let request_field = input.route.request_field();
    let shape = input.shape().at(request_field.segments());
    let slot = request_field.access_mut(target)?;
    populate_params(slot, shape, &group(fields), &filter)
}
