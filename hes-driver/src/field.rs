//! Logical readings and the COSEM objects that carry them

use hes_core::ObisCode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A reading the head-end knows how to ask any meter for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalField {
    SerialNumber,
    FirmwareVersion,
    HardwareVersion,
    MeterTime,
    MeterStatus,
    TamperStatus,
    RelayStatus,

    TotalActiveEnergy,
    ActiveEnergyTou1,
    ActiveEnergyTou2,
    ActiveEnergyTou3,
    ActiveEnergyTou4,
    ImportActiveEnergy,
    ImportActiveTou1,
    ImportActiveTou2,
    ImportActiveTou3,
    ImportActiveTou4,
    ExportActiveEnergy,
    TotalReactiveEnergy,
    MaxDemandActive,
    MaxDemandReactive,

    VoltageL1,
    VoltageL2,
    VoltageL3,
    CurrentL1,
    CurrentL2,
    CurrentL3,
    ActivePower,
    ReactivePower,
    ApparentPower,
    PowerFactor,
    Frequency,

    ShortPowerFailures,
    LongPowerFailures,
    VoltageSags,
    VoltageSwells,
}

/// How the attribute value of a field is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Octet or visible string rendered as text
    Text,
    /// Clock attribute (date-time or 12-byte octet-string)
    Clock,
    /// Register value normalized with its scaler
    Measurement,
    /// Plain integer, no scaler (counters, status words)
    Count,
    /// Disconnect control output state
    Switch,
}

impl LogicalField {
    pub fn name(&self) -> &'static str {
        match self {
            LogicalField::SerialNumber => "serial_number",
            LogicalField::FirmwareVersion => "firmware_version",
            LogicalField::HardwareVersion => "hardware_version",
            LogicalField::MeterTime => "meter_time",
            LogicalField::MeterStatus => "meter_status",
            LogicalField::TamperStatus => "tamper_status",
            LogicalField::RelayStatus => "relay_status",
            LogicalField::TotalActiveEnergy => "total_active_energy",
            LogicalField::ActiveEnergyTou1 => "active_energy_tou1",
            LogicalField::ActiveEnergyTou2 => "active_energy_tou2",
            LogicalField::ActiveEnergyTou3 => "active_energy_tou3",
            LogicalField::ActiveEnergyTou4 => "active_energy_tou4",
            LogicalField::ImportActiveEnergy => "import_active_energy",
            LogicalField::ImportActiveTou1 => "import_active_tou1",
            LogicalField::ImportActiveTou2 => "import_active_tou2",
            LogicalField::ImportActiveTou3 => "import_active_tou3",
            LogicalField::ImportActiveTou4 => "import_active_tou4",
            LogicalField::ExportActiveEnergy => "export_active_energy",
            LogicalField::TotalReactiveEnergy => "total_reactive_energy",
            LogicalField::MaxDemandActive => "max_demand_active",
            LogicalField::MaxDemandReactive => "max_demand_reactive",
            LogicalField::VoltageL1 => "voltage_l1",
            LogicalField::VoltageL2 => "voltage_l2",
            LogicalField::VoltageL3 => "voltage_l3",
            LogicalField::CurrentL1 => "current_l1",
            LogicalField::CurrentL2 => "current_l2",
            LogicalField::CurrentL3 => "current_l3",
            LogicalField::ActivePower => "active_power",
            LogicalField::ReactivePower => "reactive_power",
            LogicalField::ApparentPower => "apparent_power",
            LogicalField::PowerFactor => "power_factor",
            LogicalField::Frequency => "frequency",
            LogicalField::ShortPowerFailures => "short_power_failures",
            LogicalField::LongPowerFailures => "long_power_failures",
            LogicalField::VoltageSags => "voltage_sags",
            LogicalField::VoltageSwells => "voltage_swells",
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            LogicalField::SerialNumber
            | LogicalField::FirmwareVersion
            | LogicalField::HardwareVersion => ValueKind::Text,
            LogicalField::MeterTime => ValueKind::Clock,
            LogicalField::RelayStatus => ValueKind::Switch,
            LogicalField::MeterStatus
            | LogicalField::TamperStatus
            | LogicalField::ShortPowerFailures
            | LogicalField::LongPowerFailures
            | LogicalField::VoltageSags
            | LogicalField::VoltageSwells => ValueKind::Count,
            _ => ValueKind::Measurement,
        }
    }
}

impl fmt::Display for LogicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where a brand keeps one logical field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldObject {
    pub field: LogicalField,
    pub obis: ObisCode,
    pub class_id: u16,
    pub attribute_id: u8,
}

impl FieldObject {
    pub const fn new(field: LogicalField, obis: ObisCode, class_id: u16, attribute_id: u8) -> Self {
        Self {
            field,
            obis,
            class_id,
            attribute_id,
        }
    }
}

/// Class ids of the objects the drivers touch
pub mod class {
    pub const DATA: u16 = 1;
    pub const REGISTER: u16 = 3;
    pub const EXTENDED_REGISTER: u16 = 4;
    pub const DEMAND_REGISTER: u16 = 5;
    pub const CLOCK: u16 = 8;
    pub const DISCONNECT_CONTROL: u16 = 70;

    /// Attribute holding `scaler_unit` for register-family classes
    pub fn scaler_unit_attribute(class_id: u16) -> Option<u8> {
        match class_id {
            REGISTER | EXTENDED_REGISTER => Some(3),
            DEMAND_REGISTER => Some(4),
            _ => None,
        }
    }
}

/// Disconnect control object shared by both brands
pub const RELAY_OBIS: ObisCode = ObisCode::new(0, 0, 96, 3, 10, 255);
pub const CLOCK_OBIS: ObisCode = ObisCode::new(0, 0, 1, 0, 0, 255);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_names_match_serde() {
        use serde::de::IntoDeserializer;
        use serde::de::value::{Error as ValueError, StrDeserializer};

        for field in [
            LogicalField::SerialNumber,
            LogicalField::ActiveEnergyTou3,
            LogicalField::VoltageL2,
            LogicalField::ShortPowerFailures,
        ] {
            let de: StrDeserializer<'_, ValueError> = field.name().into_deserializer();
            assert_eq!(LogicalField::deserialize(de).unwrap(), field);
            assert_eq!(field.to_string(), field.name());
        }
    }

    #[test]
    fn test_field_kinds() {
        assert_eq!(LogicalField::SerialNumber.kind(), ValueKind::Text);
        assert_eq!(LogicalField::MeterTime.kind(), ValueKind::Clock);
        assert_eq!(LogicalField::VoltageL1.kind(), ValueKind::Measurement);
        assert_eq!(LogicalField::TamperStatus.kind(), ValueKind::Count);
        assert_eq!(LogicalField::RelayStatus.kind(), ValueKind::Switch);
    }

    #[test]
    fn test_scaler_attribute_by_class() {
        assert_eq!(class::scaler_unit_attribute(class::REGISTER), Some(3));
        assert_eq!(class::scaler_unit_attribute(class::DEMAND_REGISTER), Some(4));
        assert_eq!(class::scaler_unit_attribute(class::DATA), None);
    }
}
