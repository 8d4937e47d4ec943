//! Hexing meters (HexView object list)

use crate::driver::{DriverCore, MeterDriver};
use crate::field::{class, FieldObject, LogicalField, CLOCK_OBIS, RELAY_OBIS};
use hes_client::CosemConnection;
use hes_core::{MeterBrand, ObisCode};
use std::sync::Arc;

const fn object(field: LogicalField, obis: ObisCode, class_id: u16) -> FieldObject {
    FieldObject::new(field, obis, class_id, 2)
}

/// Hexing object table
///
/// Energy registers live under the combined active energy quantity (C=15)
/// and total reactive energy under C=3, D=8, so none of them alias the clock.
pub static HEXING_OBJECTS: [FieldObject; 36] = [
    object(LogicalField::SerialNumber, ObisCode::new(0, 0, 96, 1, 0, 255), class::DATA),
    object(LogicalField::FirmwareVersion, ObisCode::new(1, 0, 0, 2, 0, 255), class::DATA),
    object(LogicalField::HardwareVersion, ObisCode::new(0, 0, 96, 1, 1, 255), class::DATA),
    object(LogicalField::MeterTime, CLOCK_OBIS, class::CLOCK),
    object(LogicalField::MeterStatus, ObisCode::new(0, 0, 97, 97, 0, 12), class::DATA),
    object(LogicalField::TamperStatus, ObisCode::new(0, 0, 96, 5, 0, 255), class::DATA),
    object(LogicalField::RelayStatus, RELAY_OBIS, class::DISCONNECT_CONTROL),
    object(LogicalField::TotalActiveEnergy, ObisCode::new(1, 0, 15, 8, 0, 255), class::REGISTER),
    object(LogicalField::ActiveEnergyTou1, ObisCode::new(1, 0, 15, 8, 1, 255), class::REGISTER),
    object(LogicalField::ActiveEnergyTou2, ObisCode::new(1, 0, 15, 8, 2, 255), class::REGISTER),
    object(LogicalField::ActiveEnergyTou3, ObisCode::new(1, 0, 15, 8, 3, 255), class::REGISTER),
    object(LogicalField::ActiveEnergyTou4, ObisCode::new(1, 0, 15, 8, 4, 255), class::REGISTER),
    object(LogicalField::ImportActiveEnergy, ObisCode::new(1, 0, 1, 8, 0, 255), class::REGISTER),
    object(LogicalField::ImportActiveTou1, ObisCode::new(1, 0, 1, 8, 1, 255), class::REGISTER),
    object(LogicalField::ImportActiveTou2, ObisCode::new(1, 0, 1, 8, 2, 255), class::REGISTER),
    object(LogicalField::ImportActiveTou3, ObisCode::new(1, 0, 1, 8, 3, 255), class::REGISTER),
    object(LogicalField::ImportActiveTou4, ObisCode::new(1, 0, 1, 8, 4, 255), class::REGISTER),
    object(LogicalField::ExportActiveEnergy, ObisCode::new(1, 0, 2, 8, 0, 255), class::REGISTER),
    object(LogicalField::TotalReactiveEnergy, ObisCode::new(1, 0, 3, 8, 0, 255), class::REGISTER),
    object(LogicalField::MaxDemandActive, ObisCode::new(1, 0, 1, 6, 0, 255), class::EXTENDED_REGISTER),
    object(LogicalField::MaxDemandReactive, ObisCode::new(1, 0, 3, 6, 0, 255), class::EXTENDED_REGISTER),
    object(LogicalField::VoltageL1, ObisCode::new(1, 0, 32, 7, 0, 255), class::REGISTER),
    object(LogicalField::VoltageL2, ObisCode::new(1, 0, 52, 7, 0, 255), class::REGISTER),
    object(LogicalField::VoltageL3, ObisCode::new(1, 0, 72, 7, 0, 255), class::REGISTER),
    object(LogicalField::CurrentL1, ObisCode::new(1, 0, 31, 7, 0, 255), class::REGISTER),
    object(LogicalField::CurrentL2, ObisCode::new(1, 0, 51, 7, 0, 255), class::REGISTER),
    object(LogicalField::CurrentL3, ObisCode::new(1, 0, 71, 7, 0, 255), class::REGISTER),
    object(LogicalField::ActivePower, ObisCode::new(1, 0, 1, 7, 0, 255), class::REGISTER),
    object(LogicalField::ReactivePower, ObisCode::new(1, 0, 3, 7, 0, 255), class::REGISTER),
    object(LogicalField::ApparentPower, ObisCode::new(1, 0, 9, 7, 0, 255), class::REGISTER),
    object(LogicalField::PowerFactor, ObisCode::new(1, 0, 13, 7, 0, 255), class::REGISTER),
    object(LogicalField::Frequency, ObisCode::new(1, 0, 14, 7, 0, 255), class::REGISTER),
    object(LogicalField::ShortPowerFailures, ObisCode::new(0, 0, 96, 7, 21, 255), class::DATA),
    object(LogicalField::LongPowerFailures, ObisCode::new(0, 0, 96, 7, 9, 255), class::DATA),
    object(LogicalField::VoltageSags, ObisCode::new(1, 0, 32, 32, 0, 255), class::DATA),
    object(LogicalField::VoltageSwells, ObisCode::new(1, 0, 32, 36, 0, 255), class::DATA),
];

pub struct HexingMeterDriver {
    core: DriverCore,
}

impl HexingMeterDriver {
    pub fn new(connection: Arc<dyn CosemConnection>) -> Self {
        Self {
            core: DriverCore::new(MeterBrand::Hexing, &HEXING_OBJECTS, connection),
        }
    }
}

impl MeterDriver for HexingMeterDriver {
    fn core(&self) -> &DriverCore {
        &self.core
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reading::RelayAction;
    use chrono::{FixedOffset, TimeZone};
    use hes_client::{MeterDriverConfig, MeterSession};
    use hes_core::{CosemDateTime, DlmsValue, Unit};
    use hes_simulator::{SimulatedMeter, SimulatorConnector};
    use std::collections::HashSet;

    fn simulated_hexing() -> SimulatedMeter {
        let time = FixedOffset::east_opt(3 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 6, 1, 12, 0, 0)
            .unwrap();
        let mut meter = SimulatedMeter::new()
            .with_object(
                ObisCode::new(0, 0, 96, 1, 0, 255),
                1,
                2,
                DlmsValue::OctetString(b"HX20240001".to_vec()),
            )
            .with_object(
                ObisCode::new(1, 0, 0, 2, 0, 255),
                1,
                2,
                DlmsValue::VisibleString(b"V2.1.7".to_vec()),
            )
            .with_clock(CosemDateTime::from_chrono(&time))
            .with_relay(true)
            .with_register(
                ObisCode::new(1, 0, 15, 8, 0, 255),
                DlmsValue::Unsigned32(12345),
                -2,
                Unit::WATT_HOUR.code(),
            )
            .with_register(
                ObisCode::new(1, 0, 32, 7, 0, 255),
                DlmsValue::Unsigned16(2301),
                -1,
                Unit::VOLT.code(),
            )
            .with_register(
                ObisCode::new(1, 0, 31, 7, 0, 255),
                DlmsValue::Unsigned16(512),
                -2,
                Unit::AMPERE.code(),
            )
            .with_register(
                ObisCode::new(1, 0, 14, 7, 0, 255),
                DlmsValue::Unsigned16(4998),
                -2,
                Unit::HERTZ.code(),
            )
            .with_object(
                ObisCode::new(0, 0, 96, 7, 21, 255),
                1,
                2,
                DlmsValue::Unsigned16(3),
            );
        for tou in 1..=4u8 {
            meter = meter.with_register(
                ObisCode::new(1, 0, 15, 8, tou, 255),
                DlmsValue::Unsigned32(1000 * tou as u32),
                0,
                Unit::WATT_HOUR.code(),
            );
        }
        meter
    }

    async fn driver_for(meter: SimulatedMeter) -> (HexingMeterDriver, Arc<MeterSession>) {
        let config = MeterDriverConfig::builder("hexing-1").build().unwrap();
        let connector = SimulatorConnector::new().with_meter("hexing-1", meter);
        let session = Arc::new(MeterSession::new(config, Arc::new(connector)).unwrap());
        session.open().await.unwrap();
        (HexingMeterDriver::new(session.clone()), session)
    }

    #[test]
    fn test_table_has_unique_objects() {
        let fields: HashSet<_> = HEXING_OBJECTS.iter().map(|o| o.field).collect();
        assert_eq!(fields.len(), HEXING_OBJECTS.len());

        let obis: HashSet<_> = HEXING_OBJECTS.iter().map(|o| o.obis).collect();
        assert_eq!(obis.len(), HEXING_OBJECTS.len());
    }

    #[tokio::test]
    async fn test_typed_reads_against_simulator() {
        let (driver, session) = driver_for(simulated_hexing()).await;
        assert_eq!(driver.brand(), MeterBrand::Hexing);

        assert_eq!(driver.read_serial_number().await.unwrap(), "HX20240001");
        assert_eq!(driver.read_firmware_version().await.unwrap(), "V2.1.7");
        assert_eq!(driver.read_total_active_energy().await.unwrap(), 123.45);

        let tou = driver.read_tou_energy().await.unwrap();
        assert_eq!(tou.total, 123.45);
        assert_eq!((tou.tou1, tou.tou4), (1000.0, 4000.0));

        let voltage = driver.read_voltage().await.unwrap();
        assert_eq!(voltage.l1, 230.1);
        assert_eq!(voltage.l2, None);
        assert_eq!(driver.read_current().await.unwrap().l1, 5.12);
        assert_eq!(driver.read_frequency().await.unwrap(), 49.98);

        let quality = driver.read_power_quality().await.unwrap();
        assert_eq!(quality.short_power_failures, Some(3));
        assert_eq!(quality.voltage_swells, None);

        let time = driver.read_meter_time().await.unwrap();
        assert_eq!(time.offset().local_minus_utc(), 3 * 3600);

        session.release().await;
    }

    #[tokio::test]
    async fn test_read_all_data_is_partial_on_single_phase_meter() {
        let (driver, session) = driver_for(simulated_hexing()).await;
        let reading = driver.read_all_data().await;

        assert_eq!(reading.records.len(), HEXING_OBJECTS.len());
        assert_eq!(reading.number(LogicalField::TotalActiveEnergy), Some(123.45));
        assert_eq!(reading.number(LogicalField::VoltageL1), Some(230.1));
        assert_eq!(reading.text(LogicalField::SerialNumber), Some("HX20240001"));
        assert!(reading.value(LogicalField::MeterTime).is_some());
        // phase 2 is not on the meter, the session survives the refusal
        assert!(reading.value(LogicalField::VoltageL2).is_none());
        assert!(!reading.records[&LogicalField::VoltageL2].success);
        assert_eq!(
            reading.records[&LogicalField::TotalActiveEnergy].unit.as_deref(),
            Some("Wh")
        );

        session.release().await;
    }

    #[tokio::test]
    async fn test_relay_cycle_against_simulator() {
        let meter = simulated_hexing();
        let (driver, session) = driver_for(meter.clone()).await;

        assert!(driver.read_relay_status().await.unwrap());
        driver.relay_control(RelayAction::Disconnect).await.unwrap();
        assert!(!meter.relay_connected());
        assert!(!driver.read_relay_status().await.unwrap());

        driver.relay_control(RelayAction::Connect).await.unwrap();
        assert!(meter.relay_connected());

        session.release().await;
    }

    #[tokio::test]
    async fn test_set_meter_time_updates_clock() {
        let meter = simulated_hexing();
        let (driver, session) = driver_for(meter.clone()).await;

        let new_time = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2025, 2, 3, 4, 5, 6)
            .unwrap();
        driver.set_meter_time(new_time).await.unwrap();
        assert_eq!(driver.read_meter_time().await.unwrap(), new_time);

        session.release().await;
    }
}
