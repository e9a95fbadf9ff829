//! Payload shape validation
//!
//! A payload is a JSON object carrying `id`, `timestamp` and `value`. The
//! envelope check is shared; the `value` check dispatches on the chart
//! type's [`PayloadShape`].

use serde_json::Value;

use super::kind::{ChartType, PayloadShape};

/// Reason a payload was rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Payload is not a JSON object
    #[error("payload is not an object")]
    NotAnObject,

    /// A required envelope field is absent
    #[error("payload is missing field `{0}`")]
    MissingField(&'static str),

    /// `value` does not match the chart type's shape
    #[error("value does not match {shape:?} shape: {reason}")]
    ShapeMismatch {
        shape: PayloadShape,
        reason: &'static str,
    },
}

const ENVELOPE_FIELDS: [&str; 3] = ["id", "timestamp", "value"];

/// Validate a raw payload against a chart type
pub fn validate(chart_type: ChartType, payload: &Value) -> Result<(), ValidationError> {
    let object = payload.as_object().ok_or(ValidationError::NotAnObject)?;

    for field in ENVELOPE_FIELDS {
        if !object.contains_key(field) {
            return Err(ValidationError::MissingField(field));
        }
    }

    let shape = chart_type.shape();
    check_shape(shape, &object["value"])
        .map_err(|reason| ValidationError::ShapeMismatch { shape, reason })
}

/// Validate a payload given the chart tag as a string
///
/// Unknown tags are never valid.
pub fn is_valid_payload(chart_tag: &str, payload: &Value) -> bool {
    match chart_tag.parse::<ChartType>() {
        Ok(chart_type) => validate(chart_type, payload).is_ok(),
        Err(_) => false,
    }
}

fn check_shape(shape: PayloadShape, value: &Value) -> Result<(), &'static str> {
    match shape {
        PayloadShape::Number => expect(value.is_number(), "expected a number"),
        PayloadShape::Text => expect(value.is_string(), "expected a string"),
        PayloadShape::Map => expect(value.is_object(), "expected an object"),
        PayloadShape::Coordinate => {
            let items = as_array(value)?;
            expect(items.len() == 2, "expected exactly two elements")?;
            expect(items.iter().all(Value::is_number), "coordinates must be numbers")
        }
        PayloadShape::Dimension => {
            let items = as_array(value)?;
            expect(items.len() == 2, "expected [labels, values]")?;
            let labels = as_array(&items[0])?;
            let values = as_array(&items[1])?;
            expect(labels.len() == values.len(), "labels and values differ in length")
        }
        PayloadShape::Dimensions => {
            let items = as_array(value)?;
            expect(items.len() == 3, "expected [labels, series, values]")?;
            as_array(&items[0])?;
            let series = as_array(&items[1])?;
            let values = as_array(&items[2])?;
            expect(series.len() == values.len(), "series and values differ in length")
        }
        PayloadShape::Surface => {
            let items = as_array(value)?;
            expect(items.len() == 3, "expected [axis, shape, points]")?;
            let axis = as_array(&items[0])?;
            let dims = as_array(&items[1])?;
            let points = as_array(&items[2])?;
            expect(axis.len() == 3, "axis must name three dimensions")?;
            expect(dims.len() == 2, "shape must be [rows, cols]")?;

            let (rows, cols) = match (dims[0].as_u64(), dims[1].as_u64()) {
                (Some(rows), Some(cols)) => (rows, cols),
                _ => return Err("shape entries must be non-negative integers"),
            };
            let expected = rows.checked_mul(cols).ok_or("shape overflows")?;
            expect(points.len() as u64 == expected, "point count does not match shape")
        }
    }
}

fn as_array(value: &Value) -> Result<&Vec<Value>, &'static str> {
    value.as_array().ok_or("expected an array")
}

fn expect(condition: bool, reason: &'static str) -> Result<(), &'static str> {
    if condition {
        Ok(())
    } else {
        Err(reason)
    }
}
