// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn value_reports_its_type() {
    assert_eq!(Value::I16(5).data_type(), DataType::Int16);
    assert_eq!(Value::F64Array(vec![1.0]).data_type(), DataType::ArrayDouble);
    assert_eq!(
        Value::Error(ErrorCode::TagValueExpired).data_type(),
        DataType::Error
    );
}

#[test]
fn nan_floats_become_expired_errors() {
    assert_eq!(
        Value::F32(f32::NAN).sanitized(),
        Value::Error(ErrorCode::TagValueExpired)
    );
    assert_eq!(
        Value::F64(f64::NAN).sanitized(),
        Value::Error(ErrorCode::TagValueExpired)
    );
    // Finite floats pass through untouched
    assert_eq!(Value::F64(1.5).sanitized(), Value::F64(1.5));
    assert_eq!(Value::I32(7).sanitized(), Value::I32(7));
}

#[yare::parameterized(
    i16_w = { DataType::Int16, Some(16) },
    u32_w = { DataType::Uint32, Some(32) },
    f32_w = { DataType::Float, Some(32) },
    f64_w = { DataType::Double, Some(64) },
    time_w = { DataType::Time, Some(64) },
    str_w = { DataType::String, None },
    bit_w = { DataType::Bit, None },
)]
fn bit_width_classes(dt: DataType, expected: Option<u8>) {
    assert_eq!(dt.bit_width(), expected);
}

#[test]
fn json_rendering() {
    assert_eq!(Value::Bool(true).to_json(), serde_json::json!(true));
    assert_eq!(Value::Str("x".into()).to_json(), serde_json::json!("x"));
    assert_eq!(
        Value::I16Array(vec![1, 2, 3]).to_json(),
        serde_json::json!([1, 2, 3])
    );
    assert_eq!(
        Value::Error(ErrorCode::TagValueExpired).to_json(),
        serde_json::json!(4015)
    );
}
