//! Single pending-request slot shared between callers and the reader task

use hes_application::{ApduKind, InvokeIdAndPriority};
use hes_core::{DlmsError, DlmsResult};
use log::debug;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;
use tokio::time::Instant;

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// What the outstanding request is waiting for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Expectation {
    /// UA (or DM) answering SNRM
    LinkAck,
    /// AARE answering AARQ
    Association,
    Service {
        response_tag: u8,
        invoke: InvokeIdAndPriority,
    },
}

impl Expectation {
    fn invoke_id(&self) -> Option<u8> {
        match self {
            Expectation::Service { invoke, .. } => Some(invoke.invoke_id()),
            _ => None,
        }
    }
}

/// Payload delivered by the reader task
#[derive(Debug, Clone, Copy)]
pub(crate) enum Inbound<'a> {
    Ua(&'a [u8]),
    Dm,
    Apdu(&'a [u8]),
}

impl Expectation {
    fn accepts(&self, inbound: &Inbound<'_>) -> bool {
        match (self, inbound) {
            (Expectation::LinkAck, Inbound::Ua(_) | Inbound::Dm) => true,
            (Expectation::Association, Inbound::Apdu(apdu)) => match ApduKind::classify(apdu) {
                Some(ApduKind::Aare) => true,
                Some(kind) => kind.is_error_response(),
                None => false,
            },
            (
                Expectation::Service {
                    response_tag,
                    invoke,
                },
                Inbound::Apdu(apdu),
            ) => match ApduKind::classify(apdu) {
                Some(kind) if kind.is_error_response() => true,
                Some(kind) if apdu[0] == *response_tag => {
                    let matches = kind.invoke_id() == Some(invoke.invoke_id());
                    if !matches {
                        debug!(
                            "Discarding stale response for invoke id {:?}, waiting for {}",
                            kind.invoke_id(),
                            invoke.invoke_id()
                        );
                    }
                    matches
                }
                _ => false,
            },
            _ => false,
        }
    }
}

pub(crate) struct PendingRequest {
    token: u64,
    expectation: Expectation,
    deadline: Instant,
    sender: oneshot::Sender<DlmsResult<Vec<u8>>>,
}

pub(crate) struct Registration {
    pub token: u64,
    pub expectation: Expectation,
    pub receiver: oneshot::Receiver<DlmsResult<Vec<u8>>>,
}

#[derive(Default)]
struct SlotInner {
    pending: Option<PendingRequest>,
    next_token: u64,
}

/// At most one live request per session
#[derive(Default)]
pub(crate) struct PendingSlot {
    inner: Mutex<SlotInner>,
}

impl PendingSlot {
    /// Claim the slot; `make` runs only when the slot is free
    pub fn register(
        &self,
        deadline: Instant,
        make: impl FnOnce() -> Expectation,
    ) -> DlmsResult<Registration> {
        let mut inner = lock(&self.inner);
        if let Some(existing) = &inner.pending {
            return Err(DlmsError::RequestInFlight {
                invoke_id: existing.expectation.invoke_id().unwrap_or(0),
            });
        }
        let expectation = make();
        let (sender, receiver) = oneshot::channel();
        inner.next_token += 1;
        let token = inner.next_token;
        inner.pending = Some(PendingRequest {
            token,
            expectation,
            deadline,
            sender,
        });
        Ok(Registration {
            token,
            expectation,
            receiver,
        })
    }

    /// Free the slot if `token` still owns it
    pub fn release(&self, token: u64) {
        let mut inner = lock(&self.inner);
        if inner.pending.as_ref().is_some_and(|p| p.token == token) {
            inner.pending = None;
        }
    }

    /// Resolve the pending request if `inbound` answers it
    pub fn offer(&self, inbound: Inbound<'_>) -> bool {
        let mut inner = lock(&self.inner);
        let accepted = inner
            .pending
            .as_ref()
            .is_some_and(|p| p.expectation.accepts(&inbound));
        if !accepted {
            debug!("No pending request for inbound {:?}", inbound);
            return false;
        }
        let Some(pending) = inner.pending.take() else {
            return false;
        };
        let result = match inbound {
            Inbound::Ua(information) => Ok(information.to_vec()),
            Inbound::Dm => Err(DlmsError::Association(
                "Meter answered SNRM with DM (link refused)".to_string(),
            )),
            Inbound::Apdu(apdu) => Ok(apdu.to_vec()),
        };
        if Instant::now() > pending.deadline {
            debug!("Response arrived after the deadline of {:?}", pending.expectation);
        }
        // The receiver may already be gone if the caller was cancelled
        let _ = pending.sender.send(result);
        true
    }

    /// Fail whatever is pending
    pub fn fail(&self, error: DlmsError) {
        if let Some(pending) = lock(&self.inner).pending.take() {
            let _ = pending.sender.send(Err(error));
        }
    }

    #[cfg(test)]
    pub fn is_occupied(&self) -> bool {
        lock(&self.inner).pending.is_some()
    }
}

/// Frees the slot when the waiting future completes or is dropped
pub(crate) struct PendingGuard<'a> {
    slot: &'a PendingSlot,
    token: u64,
}

impl<'a> PendingGuard<'a> {
    pub fn new(slot: &'a PendingSlot, token: u64) -> Self {
        Self { slot, token }
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.slot.release(self.token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hes_application::tags;
    use std::time::Duration;

    fn service(invoke_id: u8) -> Expectation {
        Expectation::Service {
            response_tag: tags::GET_RESPONSE,
            invoke: InvokeIdAndPriority::new(invoke_id),
        }
    }

    fn deadline() -> Instant {
        Instant::now() + Duration::from_secs(30)
    }

    #[tokio::test]
    async fn test_second_registration_is_rejected() {
        let slot = PendingSlot::default();
        let _first = slot.register(deadline(), || service(4)).unwrap();
        let err = slot.register(deadline(), || service(5)).err().unwrap();
        assert!(matches!(err, DlmsError::RequestInFlight { invoke_id: 4 }));
    }

    #[tokio::test]
    async fn test_offer_matches_invoke_id() {
        let slot = PendingSlot::default();
        let registration = slot.register(deadline(), || service(2)).unwrap();

        // stale answer for invoke id 1
        assert!(!slot.offer(Inbound::Apdu(&[0xC4, 0x01, 0xC1, 0x00, 0x11, 0x01])));
        // a different service
        assert!(!slot.offer(Inbound::Apdu(&[0xC5, 0x01, 0xC2, 0x00])));
        assert!(slot.offer(Inbound::Apdu(&[0xC4, 0x01, 0xC2, 0x00, 0x11, 0x07])));

        let apdu = registration.receiver.await.unwrap().unwrap();
        assert_eq!(apdu, vec![0xC4, 0x01, 0xC2, 0x00, 0x11, 0x07]);
        assert!(!slot.is_occupied());
    }

    #[tokio::test]
    async fn test_guard_releases_only_its_own_token() {
        let slot = PendingSlot::default();
        let first = slot.register(deadline(), || Expectation::LinkAck).unwrap();
        {
            let _guard = PendingGuard::new(&slot, first.token);
        }
        assert!(!slot.is_occupied());

        let second = slot.register(deadline(), || Expectation::Association).unwrap();
        slot.release(first.token);
        assert!(slot.is_occupied());
        slot.release(second.token);
        assert!(!slot.is_occupied());
    }

    #[tokio::test]
    async fn test_dm_fails_link_request() {
        let slot = PendingSlot::default();
        let registration = slot.register(deadline(), || Expectation::LinkAck).unwrap();
        assert!(slot.offer(Inbound::Dm));
        let err = registration.receiver.await.unwrap().unwrap_err();
        assert_eq!(err.kind(), hes_core::ErrorKind::Association);
    }
}
