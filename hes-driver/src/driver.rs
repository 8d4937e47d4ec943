//! Brand-independent driver machinery
//!
//! A brand supplies a static [`FieldObject`] table; [`DriverCore`] turns table
//! entries into GET/SET/ACTION calls on a [`CosemConnection`] and normalizes
//! whatever comes back. Every numeric value leaving this module has had its
//! scaler applied.

use crate::field::{class, FieldObject, LogicalField, ValueKind, CLOCK_OBIS, RELAY_OBIS};
use crate::reading::{
    MeterReading, PhaseValues, PowerQuality, PowerValues, ReadingRecord, ReadingValue,
    RelayAction, TouEnergy,
};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use hes_client::CosemConnection;
use hes_core::{
    CosemDateTime, DlmsError, DlmsResult, DlmsValue, MeterBrand, ObisCode, ScaledValue, ScalerUnit,
};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Clock `time` attribute
const CLOCK_TIME_ATTRIBUTE: u8 = 2;
/// Disconnect control `output_state` attribute
const RELAY_OUTPUT_STATE_ATTRIBUTE: u8 = 2;

/// Connection, object table and scaler cache shared by every brand driver
pub struct DriverCore {
    brand: MeterBrand,
    objects: &'static [FieldObject],
    connection: Arc<dyn CosemConnection>,
    scalers: RwLock<HashMap<ObisCode, ScalerUnit>>,
}

impl DriverCore {
    pub fn new(
        brand: MeterBrand,
        objects: &'static [FieldObject],
        connection: Arc<dyn CosemConnection>,
    ) -> Self {
        Self {
            brand,
            objects,
            connection,
            scalers: RwLock::new(HashMap::new()),
        }
    }

    pub fn brand(&self) -> MeterBrand {
        self.brand
    }

    pub fn objects(&self) -> &'static [FieldObject] {
        self.objects
    }

    pub fn connection(&self) -> &dyn CosemConnection {
        self.connection.as_ref()
    }

    pub fn object(&self, field: LogicalField) -> Option<&'static FieldObject> {
        self.objects.iter().find(|object| object.field == field)
    }

    fn require(&self, field: LogicalField) -> DlmsResult<&'static FieldObject> {
        self.object(field).ok_or_else(|| {
            DlmsError::InvalidState(format!("{} meters do not provide {}", self.brand, field))
        })
    }

    /// Scaler and unit of a register-family object, cached per OBIS
    async fn scaler_unit(&self, obis: ObisCode, class_id: u16) -> DlmsResult<Option<ScalerUnit>> {
        let Some(attribute_id) = class::scaler_unit_attribute(class_id) else {
            return Ok(None);
        };
        if let Some(cached) = self.scalers.read().await.get(&obis) {
            return Ok(Some(*cached));
        }

        let value = self
            .connection
            .get_attribute(obis, class_id, attribute_id)
            .await?;
        let scaler_unit = ScalerUnit::from_value(&value).ok_or_else(|| {
            DlmsError::protocol(format!("Malformed scaler_unit for {}: {:?}", obis, value))
        })?;
        debug!(
            "Scaler for {}: 10^{} {}",
            obis, scaler_unit.scaler, scaler_unit.unit
        );
        self.scalers.write().await.insert(obis, scaler_unit);
        Ok(Some(scaler_unit))
    }

    /// Turn a raw numeric attribute into a scaled measurement
    async fn measurement(
        &self,
        obis: ObisCode,
        class_id: u16,
        value: &DlmsValue,
    ) -> DlmsResult<ScaledValue> {
        if let Some(inline) = ScaledValue::from_structure(value) {
            return Ok(inline);
        }
        let raw = value.as_f64().ok_or_else(|| {
            DlmsError::protocol(format!("Expected a numeric value at {}, got {:?}", obis, value))
        })?;
        let scaler_unit = self.scaler_unit(obis, class_id).await?;
        Ok(ScaledValue::new(raw, scaler_unit))
    }

    async fn interpret(&self, object: &FieldObject, value: DlmsValue) -> DlmsResult<ReadingRecord> {
        let (obis, name) = (object.obis, object.field.name());
        let record = match object.field.kind() {
            ValueKind::Text => ReadingRecord::success(obis, name, ReadingValue::Text(text_of(&value))),
            ValueKind::Clock => ReadingRecord::success(obis, name, ReadingValue::Time(clock_of(&value)?)),
            ValueKind::Count => {
                let count = value.as_f64().ok_or_else(|| {
                    DlmsError::protocol(format!("Expected a counter at {}, got {:?}", obis, value))
                })?;
                ReadingRecord::success(obis, name, ReadingValue::Number(count))
            }
            ValueKind::Switch => {
                let connected = value
                    .as_bool()
                    .or_else(|| value.as_i64().map(|v| v != 0))
                    .ok_or_else(|| {
                        DlmsError::protocol(format!("Expected relay state, got {:?}", value))
                    })?;
                ReadingRecord::success(obis, name, ReadingValue::Flag(connected))
            }
            ValueKind::Measurement => {
                let scaled = self.measurement(obis, object.class_id, &value).await?;
                ReadingRecord::success(obis, name, ReadingValue::Number(scaled.actual_value()))
                    .with_scaling(scaled.scaler, scaled.unit.map(|unit| unit.to_string()))
            }
        };
        Ok(record)
    }

    /// Read and normalize one table entry
    pub async fn read_object(&self, object: &FieldObject) -> DlmsResult<ReadingRecord> {
        let value = self
            .connection
            .get_attribute(object.obis, object.class_id, object.attribute_id)
            .await?;
        self.interpret(object, value).await
    }

    /// Read one logical field; failures become an unsuccessful record
    pub async fn read_field(&self, field: LogicalField) -> ReadingRecord {
        let Some(object) = self.object(field) else {
            let error = DlmsError::InvalidState(format!(
                "{} meters do not provide {}",
                self.brand, field
            ));
            return ReadingRecord::failure(ObisCode::new(0, 0, 0, 0, 0, 0), field.name(), &error);
        };
        match self.read_object(object).await {
            Ok(record) => record,
            Err(e) => {
                warn!("Reading {} ({}) failed: {}", field, object.obis, e);
                ReadingRecord::failure(object.obis, field.name(), &e)
            }
        }
    }

    pub async fn value(&self, field: LogicalField) -> DlmsResult<ReadingValue> {
        let object = self.require(field)?;
        let record = self.read_object(object).await?;
        record
            .value
            .ok_or_else(|| DlmsError::protocol(format!("No value for {}", field)))
    }

    pub async fn number(&self, field: LogicalField) -> DlmsResult<f64> {
        match self.value(field).await? {
            ReadingValue::Number(v) => Ok(v),
            other => Err(DlmsError::protocol(format!(
                "Expected a number for {}, got {:?}",
                field, other
            ))),
        }
    }

    /// Like [`number`](Self::number), but `None` for fields the brand lacks or the meter refuses
    pub async fn optional_number(&self, field: LogicalField) -> Option<f64> {
        self.object(field)?;
        match self.number(field).await {
            Ok(v) => Some(v),
            Err(e) => {
                debug!("Optional field {} unavailable: {}", field, e);
                None
            }
        }
    }
}

fn text_of(value: &DlmsValue) -> String {
    if let Some(text) = value.as_text() {
        return text.trim_end_matches('\0').trim().to_string();
    }
    if let Some(bytes) = value.as_bytes() {
        return bytes.iter().map(|b| format!("{:02X}", b)).collect();
    }
    match value.as_i64() {
        Some(v) => v.to_string(),
        None => format!("{:?}", value),
    }
}

/// Clock value as an offset date-time; an unspecified deviation is read as UTC
fn clock_of(value: &DlmsValue) -> DlmsResult<DateTime<FixedOffset>> {
    let date_time = value
        .as_date_time()
        .ok_or_else(|| DlmsError::protocol(format!("Expected a date-time, got {:?}", value)))?;
    if let Some(fixed) = date_time.to_fixed_offset() {
        return Ok(fixed);
    }
    let naive = date_time.to_naive().ok_or_else(|| {
        DlmsError::protocol(format!("Meter clock is not a complete date-time: {}", date_time))
    })?;
    Ok(Utc.from_utc_datetime(&naive).fixed_offset())
}

/// Value of an arbitrary object, interpreted from its shape and class
async fn custom_value(
    core: &DriverCore,
    obis: ObisCode,
    class_id: u16,
    value: DlmsValue,
) -> DlmsResult<(ReadingValue, Option<i8>, Option<String>)> {
    if class_id == class::CLOCK {
        return Ok((ReadingValue::Time(clock_of(&value)?), None, None));
    }
    if ScaledValue::from_structure(&value).is_some()
        || (value.is_numeric() && class::scaler_unit_attribute(class_id).is_some())
    {
        let scaled = core.measurement(obis, class_id, &value).await?;
        return Ok((
            ReadingValue::Number(scaled.actual_value()),
            scaled.scaler,
            scaled.unit.map(|unit| unit.to_string()),
        ));
    }
    let reading = match &value {
        DlmsValue::Boolean(v) => ReadingValue::Flag(*v),
        DlmsValue::DateTime(_) => ReadingValue::Time(clock_of(&value)?),
        v => match v.as_f64() {
            Some(number) => ReadingValue::Number(number),
            None => ReadingValue::Text(text_of(v)),
        },
    };
    Ok((reading, None, None))
}

/// High-level meter operations
///
/// Implementors only provide [`core`](MeterDriver::core); every operation has
/// a default built on the brand's object table. Reads go out one at a time
/// because a session carries a single outstanding request.
#[async_trait]
pub trait MeterDriver: Send + Sync {
    fn core(&self) -> &DriverCore;

    fn brand(&self) -> MeterBrand {
        self.core().brand()
    }

    fn supports(&self, field: LogicalField) -> bool {
        self.core().object(field).is_some()
    }

    async fn read_field(&self, field: LogicalField) -> ReadingRecord {
        self.core().read_field(field).await
    }

    /// Read every field in the brand table, keeping failures per field
    async fn read_all_data(&self) -> MeterReading {
        let core = self.core();
        let mut reading = MeterReading::new(core.brand());
        for object in core.objects() {
            reading.insert(object.field, core.read_field(object.field).await);
        }
        let failed = reading.failures().count();
        if failed > 0 {
            info!(
                "{} read finished: {} of {} fields failed",
                core.brand(),
                failed,
                reading.records.len()
            );
        }
        reading
    }

    async fn read_serial_number(&self) -> DlmsResult<String> {
        match self.core().value(LogicalField::SerialNumber).await? {
            ReadingValue::Text(serial) => Ok(serial),
            other => Err(DlmsError::protocol(format!("Unexpected serial number {:?}", other))),
        }
    }

    async fn read_firmware_version(&self) -> DlmsResult<String> {
        match self.core().value(LogicalField::FirmwareVersion).await? {
            ReadingValue::Text(version) => Ok(version),
            other => Err(DlmsError::protocol(format!("Unexpected firmware version {:?}", other))),
        }
    }

    async fn read_meter_time(&self) -> DlmsResult<DateTime<FixedOffset>> {
        match self.core().value(LogicalField::MeterTime).await? {
            ReadingValue::Time(time) => Ok(time),
            other => Err(DlmsError::protocol(format!("Unexpected meter time {:?}", other))),
        }
    }

    /// Write the clock `time` attribute as a 12-byte date-time octet string
    async fn set_meter_time(&self, date_time: DateTime<FixedOffset>) -> DlmsResult<()> {
        let encoded = CosemDateTime::from_chrono(&date_time).encode();
        self.core()
            .connection()
            .set_attribute(
                CLOCK_OBIS,
                class::CLOCK,
                CLOCK_TIME_ATTRIBUTE,
                DlmsValue::OctetString(encoded.to_vec()),
            )
            .await?;
        info!("Meter time set to {}", date_time);
        Ok(())
    }

    async fn read_total_active_energy(&self) -> DlmsResult<f64> {
        self.core().number(LogicalField::TotalActiveEnergy).await
    }

    async fn read_tou_energy(&self) -> DlmsResult<TouEnergy> {
        let core = self.core();
        Ok(TouEnergy {
            total: core.number(LogicalField::TotalActiveEnergy).await?,
            tou1: core.number(LogicalField::ActiveEnergyTou1).await?,
            tou2: core.number(LogicalField::ActiveEnergyTou2).await?,
            tou3: core.number(LogicalField::ActiveEnergyTou3).await?,
            tou4: core.number(LogicalField::ActiveEnergyTou4).await?,
        })
    }

    async fn read_voltage(&self) -> DlmsResult<PhaseValues> {
        let core = self.core();
        Ok(PhaseValues {
            l1: core.number(LogicalField::VoltageL1).await?,
            l2: core.optional_number(LogicalField::VoltageL2).await,
            l3: core.optional_number(LogicalField::VoltageL3).await,
        })
    }

    async fn read_current(&self) -> DlmsResult<PhaseValues> {
        let core = self.core();
        Ok(PhaseValues {
            l1: core.number(LogicalField::CurrentL1).await?,
            l2: core.optional_number(LogicalField::CurrentL2).await,
            l3: core.optional_number(LogicalField::CurrentL3).await,
        })
    }

    async fn read_power(&self) -> DlmsResult<PowerValues> {
        let core = self.core();
        Ok(PowerValues {
            active: core.number(LogicalField::ActivePower).await?,
            reactive: core.number(LogicalField::ReactivePower).await?,
            apparent: core.number(LogicalField::ApparentPower).await?,
            power_factor: core.number(LogicalField::PowerFactor).await?,
        })
    }

    async fn read_frequency(&self) -> DlmsResult<f64> {
        self.core().number(LogicalField::Frequency).await
    }

    async fn read_power_quality(&self) -> DlmsResult<PowerQuality> {
        let core = self.core();
        let count = |v: Option<f64>| v.map(|v| v.max(0.0) as u64);
        Ok(PowerQuality {
            short_power_failures: count(core.optional_number(LogicalField::ShortPowerFailures).await),
            long_power_failures: count(core.optional_number(LogicalField::LongPowerFailures).await),
            voltage_sags: count(core.optional_number(LogicalField::VoltageSags).await),
            voltage_swells: count(core.optional_number(LogicalField::VoltageSwells).await),
        })
    }

    /// `true` when the disconnect control output is connected
    async fn read_relay_status(&self) -> DlmsResult<bool> {
        let value = self
            .core()
            .connection()
            .get_attribute(RELAY_OBIS, class::DISCONNECT_CONTROL, RELAY_OUTPUT_STATE_ATTRIBUTE)
            .await?;
        value
            .as_bool()
            .or_else(|| value.as_i64().map(|v| v != 0))
            .ok_or_else(|| DlmsError::protocol(format!("Expected relay state, got {:?}", value)))
    }

    /// Invoke `remote_reconnect` or `remote_disconnect` on the disconnect control object
    ///
    /// # Errors
    /// `RelayControl` when the meter answers with a non-success action result;
    /// transport failures propagate unchanged.
    async fn relay_control(&self, action: RelayAction) -> DlmsResult<()> {
        let result = self
            .core()
            .connection()
            .invoke_method(
                RELAY_OBIS,
                class::DISCONNECT_CONTROL,
                action.method_id(),
                Some(DlmsValue::Integer8(0)),
            )
            .await;
        match result {
            Ok(_) => {
                info!("Relay {} successful", action.as_str());
                Ok(())
            }
            Err(DlmsError::Protocol { message, code }) => {
                let detail = match code {
                    Some(code) => format!("{} (code {})", message, code),
                    None => message,
                };
                Err(DlmsError::RelayControl(format!(
                    "Relay {} failed: {}",
                    action.as_str(),
                    detail
                )))
            }
            Err(e) => Err(e),
        }
    }

    /// Read any object; register-family classes get their scaler applied
    async fn read_custom_obis(
        &self,
        obis: ObisCode,
        class_id: u16,
        attribute_id: u8,
    ) -> ReadingRecord {
        let core = self.core();
        let name = obis.to_string();
        let outcome = match core.connection().get_attribute(obis, class_id, attribute_id).await {
            Ok(value) => custom_value(core, obis, class_id, value).await,
            Err(e) => Err(e),
        };
        match outcome {
            Ok((value, scaler, unit)) => {
                ReadingRecord::success(obis, name, value).with_scaling(scaler, unit)
            }
            Err(e) => {
                warn!("Reading {} failed: {}", obis, e);
                ReadingRecord::failure(obis, name, &e)
            }
        }
    }
}
