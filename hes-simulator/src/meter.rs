//! Object model and COSEM request handling of the simulated meter

use hes_application::{
    build_action_response, build_get_response, build_rlre, build_set_response,
    decode_action_request, decode_get_request, decode_set_request, tags, AareResponse,
    AarqRequest, CosemAttributeDescriptor, CosemMethodDescriptor, DataAccessResult,
    GetDataResult, InitiateResponse,
};
use hes_core::{CosemDateTime, DlmsValue, ObisCode};
use log::{debug, info, warn};
use std::collections::{HashMap, HashSet};
use std::mem::discriminant;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Disconnect control object
pub const RELAY_OBIS: ObisCode = ObisCode::new(0, 0, 96, 3, 10, 255);
pub const CLOCK_OBIS: ObisCode = ObisCode::new(0, 0, 1, 0, 0, 255);

const RELAY_CLASS: u16 = 70;
const CLOCK_CLASS: u16 = 8;
const REGISTER_CLASS: u16 = 3;

/// acse-service-user diagnostic "authentication failure"
const AUTHENTICATION_FAILURE: u8 = 13;

/// state-error / service-error pairs of an exception-response
const SERVICE_NOT_ALLOWED: [u8; 2] = [0x01, 0x01];
const SERVICE_NOT_SUPPORTED: [u8; 2] = [0x02, 0x03];

/// What the link layer should do with a request
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Apdu(Vec<u8>),
    /// Swallow the request
    Silent,
    /// Close the connection
    HangUp,
}

/// Write-side faults applied to every outgoing frame
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct WriteFaults {
    pub garbage: bool,
    pub split: bool,
    pub delay: Option<Duration>,
}

#[derive(Debug, Default)]
struct MeterModel {
    classes: HashMap<ObisCode, u16>,
    attributes: HashMap<(ObisCode, u8), DlmsValue>,
    password: Option<Vec<u8>>,
    rejection: Option<u8>,
    silent_link: bool,
    silent_objects: HashSet<ObisCode>,
    hang_up_objects: HashSet<ObisCode>,
    access_errors: HashMap<ObisCode, u8>,
    write_faults: WriteFaults,
    associations: usize,
}

impl MeterModel {
    fn check_object(&self, class_id: u16, obis: ObisCode) -> Result<(), DataAccessResult> {
        match self.classes.get(&obis) {
            None => Err(DataAccessResult::ObjectUndefined),
            Some(&class) if class != class_id => Err(DataAccessResult::ObjectClassInconsistent),
            Some(_) => match self.access_errors.get(&obis) {
                Some(&code) => Err(DataAccessResult::from(code)),
                None => Ok(()),
            },
        }
    }

    fn read(&self, attribute: &CosemAttributeDescriptor) -> Result<DlmsValue, DataAccessResult> {
        self.check_object(attribute.class_id, attribute.instance)?;
        if attribute.attribute_id == 1 {
            return Ok(DlmsValue::OctetString(attribute.instance.as_bytes().to_vec()));
        }
        self.attributes
            .get(&(attribute.instance, attribute.attribute_id))
            .cloned()
            .ok_or(DataAccessResult::ObjectUnavailable)
    }

    fn write(
        &mut self,
        attribute: &CosemAttributeDescriptor,
        value: DlmsValue,
    ) -> Result<(), DataAccessResult> {
        self.check_object(attribute.class_id, attribute.instance)?;
        if attribute.attribute_id == 1 {
            return Err(DataAccessResult::ReadWriteDenied);
        }
        let key = (attribute.instance, attribute.attribute_id);
        if let Some(current) = self.attributes.get(&key) {
            if discriminant(current) != discriminant(&value) {
                return Err(DataAccessResult::TypeUnmatched);
            }
        }
        self.attributes.insert(key, value);
        Ok(())
    }

    fn invoke(&mut self, method: &CosemMethodDescriptor) -> Result<(), DataAccessResult> {
        self.check_object(method.class_id, method.instance)?;
        if method.class_id != RELAY_CLASS {
            return Err(DataAccessResult::ReadWriteDenied);
        }
        let connected = match method.method_id {
            1 => true, // remote_reconnect
            2 => false, // remote_disconnect
            _ => return Err(DataAccessResult::ObjectUnavailable),
        };
        self.set_relay(method.instance, connected);
        Ok(())
    }

    fn set_relay(&mut self, obis: ObisCode, connected: bool) {
        self.attributes.insert((obis, 2), DlmsValue::Boolean(connected));
        self.attributes
            .insert((obis, 3), DlmsValue::Enum(if connected { 1 } else { 0 }));
    }

    fn interruption(&self, obis: ObisCode) -> Option<Reply> {
        if self.hang_up_objects.contains(&obis) {
            Some(Reply::HangUp)
        } else if self.silent_objects.contains(&obis) {
            Some(Reply::Silent)
        } else {
            None
        }
    }
}

/// Handle to a simulated meter
///
/// Clones share the same object model, so a test can keep one handle to
/// inspect what a session changed through another.
#[derive(Debug, Clone, Default)]
pub struct SimulatedMeter {
    model: Arc<Mutex<MeterModel>>,
}

impl SimulatedMeter {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MeterModel> {
        self.model.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `class_id` at `obis` and set one attribute
    pub fn with_object(self, obis: ObisCode, class_id: u16, attribute_id: u8, value: DlmsValue) -> Self {
        {
            let mut model = self.lock();
            model.classes.insert(obis, class_id);
            model.attributes.insert((obis, attribute_id), value);
        }
        self
    }

    /// Register (class 3) with value in attribute 2 and scaler_unit in attribute 3
    pub fn with_register(self, obis: ObisCode, value: DlmsValue, scaler: i8, unit: u8) -> Self {
        self.with_object(obis, REGISTER_CLASS, 2, value).with_object(
            obis,
            REGISTER_CLASS,
            3,
            DlmsValue::Structure(vec![DlmsValue::Integer8(scaler), DlmsValue::Enum(unit)]),
        )
    }

    /// Disconnect control object at [`RELAY_OBIS`]
    pub fn with_relay(self, connected: bool) -> Self {
        {
            let mut model = self.lock();
            model.classes.insert(RELAY_OBIS, RELAY_CLASS);
            model.set_relay(RELAY_OBIS, connected);
            // control_mode 4: remote disconnect and reconnect allowed
            model.attributes.insert((RELAY_OBIS, 4), DlmsValue::Enum(4));
        }
        self
    }

    /// Clock object at [`CLOCK_OBIS`]; time is held as a 12-byte octet-string
    pub fn with_clock(self, time: CosemDateTime) -> Self {
        self.with_object(
            CLOCK_OBIS,
            CLOCK_CLASS,
            2,
            DlmsValue::OctetString(time.encode().to_vec()),
        )
    }

    /// Reject any AARQ whose password differs from `password`
    pub fn require_password(self, password: impl AsRef<[u8]>) -> Self {
        self.lock().password = Some(password.as_ref().to_vec());
        self
    }

    /// Reject every AARQ with the given acse-service-user diagnostic
    pub fn reject_association(self, diagnostic: u8) -> Self {
        self.lock().rejection = Some(diagnostic);
        self
    }

    /// Never answer SNRM
    pub fn silent_link(self) -> Self {
        self.lock().silent_link = true;
        self
    }

    /// Never answer requests addressed to `obis`
    pub fn silent_object(self, obis: ObisCode) -> Self {
        self.lock().silent_objects.insert(obis);
        self
    }

    /// Close the connection when `obis` is addressed
    pub fn hang_up_on(self, obis: ObisCode) -> Self {
        self.lock().hang_up_objects.insert(obis);
        self
    }

    /// Answer every request addressed to `obis` with data-access-result `code`
    pub fn access_error(self, obis: ObisCode, code: u8) -> Self {
        self.lock().access_errors.insert(obis, code);
        self
    }

    pub fn response_delay(self, delay: Duration) -> Self {
        self.lock().write_faults.delay = Some(delay);
        self
    }

    /// Precede every frame with bytes that are not a frame
    pub fn garbage_before_frames(self) -> Self {
        self.lock().write_faults.garbage = true;
        self
    }

    /// Write every frame in two halves
    pub fn split_writes(self) -> Self {
        self.lock().write_faults.split = true;
        self
    }

    pub fn value(&self, obis: ObisCode, attribute_id: u8) -> Option<DlmsValue> {
        self.lock().attributes.get(&(obis, attribute_id)).cloned()
    }

    pub fn relay_connected(&self) -> bool {
        matches!(self.value(RELAY_OBIS, 2), Some(DlmsValue::Boolean(true)))
    }

    /// Number of accepted associations so far
    pub fn associations(&self) -> usize {
        self.lock().associations
    }

    pub(crate) fn link_is_silent(&self) -> bool {
        self.lock().silent_link
    }

    pub(crate) fn write_faults(&self) -> WriteFaults {
        self.lock().write_faults
    }

    /// Answer one APDU; `associated` is the association state of the calling link
    pub fn handle_apdu(&self, apdu: &[u8], associated: &mut bool) -> Reply {
        match apdu.first().copied() {
            Some(tags::AARQ) => {
                let (aare, accepted) = self.answer_aarq(apdu);
                *associated = accepted;
                Reply::Apdu(aare)
            }
            Some(tags::RLRQ) => {
                *associated = false;
                debug!("Simulated meter: association released");
                Reply::Apdu(build_rlre())
            }
            Some(tags::GET_REQUEST | tags::SET_REQUEST | tags::ACTION_REQUEST) if !*associated => {
                warn!("Simulated meter: service request without association");
                Reply::Apdu(exception(SERVICE_NOT_ALLOWED))
            }
            Some(tags::GET_REQUEST) => self.answer_get(apdu),
            Some(tags::SET_REQUEST) => self.answer_set(apdu),
            Some(tags::ACTION_REQUEST) => self.answer_action(apdu),
            other => {
                warn!("Simulated meter: unsupported APDU {:02X?}", other);
                Reply::Apdu(exception(SERVICE_NOT_SUPPORTED))
            }
        }
    }

    fn answer_aarq(&self, apdu: &[u8]) -> (Vec<u8>, bool) {
        let request = match AarqRequest::decode(apdu) {
            Ok(request) => request,
            Err(e) => {
                warn!("Simulated meter: malformed AARQ: {}", e);
                return (AareResponse::rejected(1).encode(), false);
            }
        };

        let mut model = self.lock();
        if let Some(diagnostic) = model.rejection {
            return (AareResponse::rejected(diagnostic).encode(), false);
        }
        if let Some(expected) = &model.password {
            if request.password.as_deref() != Some(expected.as_slice()) {
                info!("Simulated meter: rejecting AARQ, wrong password");
                return (AareResponse::rejected(AUTHENTICATION_FAILURE).encode(), false);
            }
        }

        model.associations += 1;
        let initiate = InitiateResponse {
            dlms_version: 6,
            conformance: request.conformance & 0x00_501F,
            max_pdu_size: request.max_receive_pdu_size.min(500),
            vaa_name: 0x0007,
        };
        (AareResponse::accepted(initiate).encode(), true)
    }

    fn answer_get(&self, apdu: &[u8]) -> Reply {
        let (invoke, attribute) = match decode_get_request(apdu) {
            Ok(request) => request,
            Err(e) => return malformed(e),
        };
        let model = self.lock();
        if let Some(reply) = model.interruption(attribute.instance) {
            return reply;
        }
        let result = match model.read(&attribute) {
            Ok(value) => GetDataResult::Data(value),
            Err(error) => {
                debug!("Simulated meter: GET {} -> {}", attribute, error);
                GetDataResult::DataAccessError(error)
            }
        };
        Reply::Apdu(build_get_response(invoke, &result))
    }

    fn answer_set(&self, apdu: &[u8]) -> Reply {
        let (invoke, attribute, value) = match decode_set_request(apdu) {
            Ok(request) => request,
            Err(e) => return malformed(e),
        };
        let mut model = self.lock();
        if let Some(reply) = model.interruption(attribute.instance) {
            return reply;
        }
        let result = match model.write(&attribute, value) {
            Ok(()) => DataAccessResult::Success,
            Err(error) => error,
        };
        debug!("Simulated meter: SET {} -> {}", attribute, result);
        Reply::Apdu(build_set_response(invoke, result))
    }

    fn answer_action(&self, apdu: &[u8]) -> Reply {
        let (invoke, method, _parameters) = match decode_action_request(apdu) {
            Ok(request) => request,
            Err(e) => return malformed(e),
        };
        let mut model = self.lock();
        if let Some(reply) = model.interruption(method.instance) {
            return reply;
        }
        let result = match model.invoke(&method) {
            Ok(()) => DataAccessResult::Success,
            Err(error) => error,
        };
        debug!("Simulated meter: ACTION {} -> {}", method, result);
        Reply::Apdu(build_action_response(invoke, result, None))
    }
}

fn exception(errors: [u8; 2]) -> Vec<u8> {
    vec![tags::EXCEPTION_RESPONSE, errors[0], errors[1]]
}

fn malformed(error: hes_core::DlmsError) -> Reply {
    warn!("Simulated meter: malformed request: {}", error);
    Reply::Apdu(exception(SERVICE_NOT_SUPPORTED))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hes_application::{
        build_aarq, build_action_request, build_get_request, build_rlrq, build_set_request, parse_aare,
        parse_get_response, parse_set_response, InvokeIdAndPriority,
    };

    const SERIAL: ObisCode = ObisCode::new(0, 0, 96, 1, 0, 255);
    const VOLTAGE: ObisCode = ObisCode::new(1, 0, 32, 7, 0, 255);

    fn meter() -> SimulatedMeter {
        SimulatedMeter::new()
            .with_object(SERIAL, 1, 2, DlmsValue::OctetString(b"HX0001".to_vec()))
            .with_register(VOLTAGE, DlmsValue::Unsigned16(2301), -1, 35)
            .with_relay(true)
    }

    fn apdu(reply: Reply) -> Vec<u8> {
        match reply {
            Reply::Apdu(apdu) => apdu,
            other => panic!("expected an APDU, got {:?}", other),
        }
    }

    fn get(meter: &SimulatedMeter, obis: ObisCode, class_id: u16, attribute_id: u8) -> Reply {
        let request = build_get_request(InvokeIdAndPriority::new(1), obis, class_id, attribute_id);
        meter.handle_apdu(&request, &mut true)
    }

    #[test]
    fn test_association_accepted() {
        let meter = meter();
        let mut associated = false;
        let aare = apdu(meter.handle_apdu(&build_aarq(None), &mut associated));
        assert!(associated);
        let aare = parse_aare(&aare).unwrap();
        assert!(aare.is_accepted());
        assert_eq!(aare.initiate.map(|i| i.max_pdu_size), Some(500));
        assert_eq!(meter.associations(), 1);
    }

    #[test]
    fn test_association_password() {
        let meter = meter().require_password("12345678");
        let mut associated = false;

        let aare = apdu(meter.handle_apdu(&build_aarq(Some(b"wrong")), &mut associated));
        assert!(!associated);
        let aare = parse_aare(&aare).unwrap();
        assert_eq!(aare.diagnostic, Some(AUTHENTICATION_FAILURE));

        let aare = apdu(meter.handle_apdu(&build_aarq(Some(b"12345678")), &mut associated));
        assert!(associated);
        assert!(parse_aare(&aare).unwrap().is_accepted());
    }

    #[test]
    fn test_get_before_association_is_refused() {
        let request = build_get_request(InvokeIdAndPriority::new(1), SERIAL, 1, 2);
        let reply = apdu(meter().handle_apdu(&request, &mut false));
        assert_eq!(reply[0], tags::EXCEPTION_RESPONSE);
    }

    #[test]
    fn test_get_register_attributes() {
        let meter = meter();
        let value = parse_get_response(&apdu(get(&meter, VOLTAGE, 3, 2))).unwrap();
        assert_eq!(value, DlmsValue::Unsigned16(2301));

        let scaler_unit = parse_get_response(&apdu(get(&meter, VOLTAGE, 3, 3))).unwrap();
        assert_eq!(
            scaler_unit,
            DlmsValue::Structure(vec![DlmsValue::Integer8(-1), DlmsValue::Enum(35)])
        );

        let logical_name = parse_get_response(&apdu(get(&meter, VOLTAGE, 3, 1))).unwrap();
        assert_eq!(logical_name.as_bytes(), Some(&VOLTAGE.to_bytes()[..]));
    }

    #[test]
    fn test_get_errors() {
        let meter = meter();
        let unknown = ObisCode::new(1, 0, 99, 99, 0, 255);
        let err = parse_get_response(&apdu(get(&meter, unknown, 3, 2))).unwrap_err();
        assert_eq!(err.code(), Some(DataAccessResult::ObjectUndefined.code()));

        let err = parse_get_response(&apdu(get(&meter, VOLTAGE, 4, 2))).unwrap_err();
        assert_eq!(err.code(), Some(DataAccessResult::ObjectClassInconsistent.code()));

        let meter = meter.access_error(VOLTAGE, 3);
        let err = parse_get_response(&apdu(get(&meter, VOLTAGE, 3, 2))).unwrap_err();
        assert_eq!(err.code(), Some(3));
    }

    #[test]
    fn test_interruptions() {
        let meter = meter().silent_object(SERIAL).hang_up_on(VOLTAGE);
        assert_eq!(get(&meter, SERIAL, 1, 2), Reply::Silent);
        assert_eq!(get(&meter, VOLTAGE, 3, 2), Reply::HangUp);
    }

    #[test]
    fn test_set_checks_type() {
        let meter = meter();
        let invoke = InvokeIdAndPriority::new(2);
        let encoded = hes_axdr::encode(&DlmsValue::OctetString(b"HX0002".to_vec()));
        let request = build_set_request(invoke, SERIAL, 1, 2, &encoded);
        parse_set_response(&apdu(meter.handle_apdu(&request, &mut true))).unwrap();
        assert_eq!(
            meter.value(SERIAL, 2),
            Some(DlmsValue::OctetString(b"HX0002".to_vec()))
        );

        let encoded = hes_axdr::encode(&DlmsValue::Unsigned8(1));
        let request = build_set_request(invoke, SERIAL, 1, 2, &encoded);
        let err = parse_set_response(&apdu(meter.handle_apdu(&request, &mut true))).unwrap_err();
        assert_eq!(err.code(), Some(DataAccessResult::TypeUnmatched.code()));
    }

    #[test]
    fn test_relay_methods() {
        let meter = meter();
        let invoke = InvokeIdAndPriority::new(3);
        let params = hes_axdr::encode(&DlmsValue::Integer8(0));

        let request = build_action_request(invoke, RELAY_OBIS, 70, 2, Some(&params));
        let response = apdu(meter.handle_apdu(&request, &mut true));
        assert_eq!(response, vec![0xC7, 0x01, 0xC3, 0x00, 0x00]);
        assert!(!meter.relay_connected());
        assert_eq!(meter.value(RELAY_OBIS, 3), Some(DlmsValue::Enum(0)));

        let request = build_action_request(invoke, RELAY_OBIS, 70, 1, Some(&params));
        meter.handle_apdu(&request, &mut true);
        assert!(meter.relay_connected());

        let request = build_action_request(invoke, RELAY_OBIS, 70, 9, None);
        let response = apdu(meter.handle_apdu(&request, &mut true));
        assert_eq!(response[3], DataAccessResult::ObjectUnavailable.code());
    }

    #[test]
    fn test_release() {
        let mut associated = true;
        let reply = apdu(meter().handle_apdu(&build_rlrq(), &mut associated));
        assert_eq!(reply[0], tags::RLRE);
        assert!(!associated);
    }
}
