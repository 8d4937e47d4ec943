//! Attribute-level access to an associated meter

use async_trait::async_trait;
use hes_core::{DlmsResult, DlmsValue, ObisCode};

/// GET/SET/ACTION against logical-name objects
///
/// [`MeterSession`](crate::MeterSession) is the production implementation;
/// drivers depend on this trait only, so they can be exercised without a meter.
#[async_trait]
pub trait CosemConnection: Send + Sync {
    /// Read one attribute
    ///
    /// # Errors
    /// `Protocol` with the data-access-result code when the meter refuses,
    /// `Timeout` when no answer arrives in time.
    async fn get_attribute(
        &self,
        obis: ObisCode,
        class_id: u16,
        attribute_id: u8,
    ) -> DlmsResult<DlmsValue>;

    async fn set_attribute(
        &self,
        obis: ObisCode,
        class_id: u16,
        attribute_id: u8,
        value: DlmsValue,
    ) -> DlmsResult<()>;

    /// Invoke a method, returning its optional return value
    async fn invoke_method(
        &self,
        obis: ObisCode,
        class_id: u16,
        method_id: u8,
        parameters: Option<DlmsValue>,
    ) -> DlmsResult<Option<DlmsValue>>;
}
