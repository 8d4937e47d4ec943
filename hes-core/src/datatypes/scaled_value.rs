//! Scaler/unit model for register readings

use crate::datatypes::unit::Unit;
use crate::datatypes::value::DlmsValue;
use serde::{Deserialize, Serialize};

/// Scaler (power of ten) and unit attached to a register value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScalerUnit {
    pub scaler: i8,
    pub unit: Unit,
}

impl ScalerUnit {
    pub fn new(scaler: i8, unit: Unit) -> Self {
        Self { scaler, unit }
    }

    /// Interpret a `structure { scaler, unit }` value
    ///
    /// The scaler byte may arrive as `integer` or `unsigned`; unsigned bytes
    /// above 127 are read as two's complement.
    pub fn from_value(value: &DlmsValue) -> Option<Self> {
        let DlmsValue::Structure(items) = value else {
            return None;
        };
        let [scaler, unit] = items.as_slice() else {
            return None;
        };
        let scaler = match scaler {
            DlmsValue::Integer8(v) => *v,
            DlmsValue::Unsigned8(v) | DlmsValue::Enum(v) => *v as i8,
            DlmsValue::Integer16(v) => i8::try_from(*v).ok()?,
            _ => return None,
        };
        let unit = match unit {
            DlmsValue::Enum(v) | DlmsValue::Unsigned8(v) => Unit(*v),
            _ => return None,
        };
        Some(Self { scaler, unit })
    }

    pub fn to_value(&self) -> DlmsValue {
        DlmsValue::Structure(vec![
            DlmsValue::Integer8(self.scaler),
            DlmsValue::Enum(self.unit.code()),
        ])
    }
}

/// Raw register value with its scaler and unit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaledValue {
    pub raw: f64,
    pub scaler: Option<i8>,
    pub unit: Option<Unit>,
}

impl ScaledValue {
    pub fn new(raw: f64, scaler_unit: Option<ScalerUnit>) -> Self {
        Self {
            raw,
            scaler: scaler_unit.map(|su| su.scaler),
            unit: scaler_unit.map(|su| su.unit),
        }
    }

    /// Recognize the `[value, [scaler, unit]]` measurement shape
    pub fn from_structure(value: &DlmsValue) -> Option<Self> {
        let DlmsValue::Structure(items) = value else {
            return None;
        };
        let [raw, scaler_unit] = items.as_slice() else {
            return None;
        };
        let raw = raw.as_f64()?;
        let scaler_unit = ScalerUnit::from_value(scaler_unit)?;
        Some(Self::new(raw, Some(scaler_unit)))
    }

    /// `raw * 10^scaler`
    pub fn actual_value(&self) -> f64 {
        apply_scaler(self.raw, self.scaler)
    }
}

/// Normalize a raw register value: `raw * 10^scaler`, or `raw` when no scaler is known
///
/// Negative scalers divide by the exact power of ten so that `12345` with
/// scaler `-2` yields exactly `123.45`.
pub fn apply_scaler(raw: f64, scaler: Option<i8>) -> f64 {
    match scaler {
        None | Some(0) => raw,
        Some(s) if s > 0 => raw * 10f64.powi(s as i32),
        Some(s) => raw / 10f64.powi(-(s as i32)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_scaler() {
        assert_eq!(apply_scaler(12345.0, Some(-2)), 123.45);
        assert_eq!(apply_scaler(12345.0, Some(-3)), 12.345);
        assert_eq!(apply_scaler(12345.0, Some(-1)), 1234.5);
        assert_eq!(apply_scaler(12345.0, Some(0)), 12345.0);
        assert_eq!(apply_scaler(12.0, Some(3)), 12000.0);
        assert_eq!(apply_scaler(7.0, Some(1)), 70.0);
        assert_eq!(apply_scaler(42.0, None), 42.0);
    }

    #[test]
    fn test_scaler_unit_signed_conversion() {
        let value = DlmsValue::Structure(vec![DlmsValue::Unsigned8(0xFE), DlmsValue::Enum(30)]);
        let su = ScalerUnit::from_value(&value).unwrap();
        assert_eq!(su.scaler, -2);
        assert_eq!(su.unit, Unit::WATT_HOUR);
    }

    #[test]
    fn test_scaled_structure() {
        let value = DlmsValue::Structure(vec![
            DlmsValue::Unsigned32(12345),
            DlmsValue::Structure(vec![DlmsValue::Integer8(-2), DlmsValue::Enum(30)]),
        ]);
        let scaled = ScaledValue::from_structure(&value).unwrap();
        assert_eq!(scaled.actual_value(), 123.45);
        assert_eq!(scaled.unit, Some(Unit::WATT_HOUR));

        let plain = DlmsValue::Structure(vec![DlmsValue::Unsigned8(1), DlmsValue::Unsigned8(2)]);
        assert!(ScaledValue::from_structure(&plain).is_none());
    }
}
