//! Hexcell meters (DLMS MD object list)

use crate::driver::{DriverCore, MeterDriver};
use crate::field::{class, FieldObject, LogicalField, CLOCK_OBIS, RELAY_OBIS};
use hes_client::CosemConnection;
use hes_core::{MeterBrand, ObisCode};
use std::sync::Arc;

const fn register(field: LogicalField, c: u8, d: u8, e: u8) -> FieldObject {
    FieldObject::new(field, ObisCode::new(1, 0, c, d, e, 255), class::REGISTER, 2)
}

const fn data(field: LogicalField, obis: ObisCode) -> FieldObject {
    FieldObject::new(field, obis, class::DATA, 2)
}

/// Hexcell object table; these meters keep no power quality counters
pub static HEXCELL_OBJECTS: [FieldObject; 29] = [
    data(LogicalField::SerialNumber, ObisCode::new(0, 0, 96, 1, 0, 255)),
    data(LogicalField::FirmwareVersion, ObisCode::new(1, 0, 0, 2, 0, 255)),
    data(LogicalField::HardwareVersion, ObisCode::new(0, 0, 96, 1, 1, 255)),
    FieldObject::new(LogicalField::MeterTime, CLOCK_OBIS, class::CLOCK, 2),
    register(LogicalField::TotalActiveEnergy, 15, 8, 0),
    register(LogicalField::ActiveEnergyTou1, 15, 8, 1),
    register(LogicalField::ActiveEnergyTou2, 15, 8, 2),
    register(LogicalField::ActiveEnergyTou3, 15, 8, 3),
    register(LogicalField::ActiveEnergyTou4, 15, 8, 4),
    register(LogicalField::ImportActiveEnergy, 1, 8, 0),
    register(LogicalField::ImportActiveTou1, 1, 8, 1),
    register(LogicalField::ImportActiveTou2, 1, 8, 2),
    register(LogicalField::ImportActiveTou3, 1, 8, 3),
    register(LogicalField::ImportActiveTou4, 1, 8, 4),
    register(LogicalField::ExportActiveEnergy, 2, 8, 0),
    register(LogicalField::VoltageL1, 32, 7, 0),
    register(LogicalField::VoltageL2, 52, 7, 0),
    register(LogicalField::VoltageL3, 72, 7, 0),
    register(LogicalField::CurrentL1, 31, 7, 0),
    register(LogicalField::CurrentL2, 51, 7, 0),
    register(LogicalField::CurrentL3, 71, 7, 0),
    register(LogicalField::ActivePower, 1, 7, 0),
    register(LogicalField::ReactivePower, 3, 7, 0),
    register(LogicalField::ApparentPower, 9, 7, 0),
    register(LogicalField::PowerFactor, 13, 7, 0),
    register(LogicalField::Frequency, 14, 7, 0),
    data(LogicalField::MeterStatus, ObisCode::new(0, 0, 97, 97, 0, 255)),
    data(LogicalField::TamperStatus, ObisCode::new(0, 0, 96, 5, 0, 255)),
    FieldObject::new(LogicalField::RelayStatus, RELAY_OBIS, class::DISCONNECT_CONTROL, 2),
];

pub struct HexcellMeterDriver {
    core: DriverCore,
}

impl HexcellMeterDriver {
    pub fn new(connection: Arc<dyn CosemConnection>) -> Self {
        Self {
            core: DriverCore::new(MeterBrand::Hexcell, &HEXCELL_OBJECTS, connection),
        }
    }
}

impl MeterDriver for HexcellMeterDriver {
    fn core(&self) -> &DriverCore {
        &self.core
    }
}
