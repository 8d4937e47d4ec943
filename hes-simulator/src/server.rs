//! HDLC link handling of the simulated meter
//!
//! One [`serve`] call handles one connection: it answers SNRM with UA,
//! keeps N(S)/N(R), strips and adds the LLC header, and hands every APDU to
//! the meter's object model.

use crate::meter::{Reply, SimulatedMeter, WriteFaults};
use hes_core::DlmsResult;
use hes_session::{
    strip_llc, FrameType, HdlcFrame, HdlcFrameDecoder, LinkParameters, LLC_RESPONSE,
};
use log::{debug, info, warn};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;

const READ_BUFFER_SIZE: usize = 2048;
/// Never contains the HDLC flag
const NOISE: [u8; 5] = [0x00, 0x13, 0x37, 0xA5, 0x5A];

/// What to do after one inbound frame
#[derive(Debug)]
enum Outcome {
    Send(HdlcFrame),
    Nothing,
    HangUp,
}

/// Server side state of one HDLC link
#[derive(Debug, Default)]
struct Link {
    open: bool,
    associated: bool,
    send_sequence: u8,
    receive_sequence: u8,
}

impl Link {
    fn on_frame(&mut self, meter: &SimulatedMeter, frame: &HdlcFrame) -> Outcome {
        // answer from the address the client called, to the address it called from
        let (reply_to, local) = (frame.source(), frame.destination());

        match frame.frame_type() {
            FrameType::SetNormalResponseMode => {
                if meter.link_is_silent() {
                    debug!("Simulated meter: ignoring SNRM");
                    return Outcome::Nothing;
                }
                *self = Link {
                    open: true,
                    ..Link::default()
                };
                Outcome::Send(HdlcFrame::ua(
                    reply_to,
                    local,
                    LinkParameters::default().encode(),
                ))
            }
            FrameType::Disconnect => {
                if !self.open {
                    return Outcome::Send(HdlcFrame::dm(reply_to, local));
                }
                *self = Link::default();
                Outcome::Send(HdlcFrame::ua(reply_to, local, Vec::new()))
            }
            FrameType::Information => {
                if !self.open {
                    return Outcome::Send(HdlcFrame::dm(reply_to, local));
                }
                if let Some(ns) = frame.send_sequence() {
                    self.receive_sequence = (ns + 1) & 0x07;
                }
                let apdu = strip_llc(frame.information_field());
                match meter.handle_apdu(apdu, &mut self.associated) {
                    Reply::Apdu(response) => {
                        let mut information = LLC_RESPONSE.to_vec();
                        information.extend_from_slice(&response);
                        let ns = self.send_sequence;
                        self.send_sequence = (ns + 1) & 0x07;
                        Outcome::Send(HdlcFrame::information(
                            reply_to,
                            local,
                            ns,
                            self.receive_sequence,
                            information,
                        ))
                    }
                    Reply::Silent => Outcome::Nothing,
                    Reply::HangUp => Outcome::HangUp,
                }
            }
            FrameType::ReceiveReady => Outcome::Nothing,
            other => {
                debug!("Simulated meter: ignoring {:?} frame", other);
                Outcome::Nothing
            }
        }
    }
}

async fn write_frame<S>(stream: &mut S, faults: WriteFaults, frame: &HdlcFrame) -> DlmsResult<()>
where
    S: AsyncWrite + Unpin,
{
    let bytes = frame.encode()?;
    if let Some(delay) = faults.delay {
        tokio::time::sleep(delay).await;
    }
    if faults.garbage {
        stream.write_all(&NOISE).await?;
    }
    if faults.split {
        let (head, tail) = bytes.split_at(bytes.len() / 2);
        stream.write_all(head).await?;
        stream.flush().await?;
        tokio::task::yield_now().await;
        stream.write_all(tail).await?;
    } else {
        stream.write_all(&bytes).await?;
    }
    stream.flush().await?;
    Ok(())
}

/// Serve one connection until the peer closes it or a fault hangs up
pub async fn serve<S>(mut stream: S, meter: SimulatedMeter) -> DlmsResult<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut decoder = HdlcFrameDecoder::new();
    let mut link = Link::default();
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    loop {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            debug!("Simulated meter: peer closed the connection");
            return Ok(());
        }
        for frame in decoder.feed(&buf[..n]) {
            match link.on_frame(&meter, &frame) {
                Outcome::Send(reply) => write_frame(&mut stream, meter.write_faults(), &reply).await?,
                Outcome::Nothing => {}
                Outcome::HangUp => {
                    info!("Simulated meter: hanging up");
                    return Ok(());
                }
            }
        }
    }
}

/// Accept connections forever, serving each one on its own task
pub async fn serve_tcp(listener: TcpListener, meter: SimulatedMeter) -> DlmsResult<()> {
    info!("Simulated meter listening on {}", listener.local_addr()?);
    loop {
        let (socket, peer) = listener.accept().await?;
        debug!("Simulated meter accepted {}", peer);
        let meter = meter.clone();
        tokio::spawn(async move {
            if let Err(e) = serve(socket, meter).await {
                warn!("Simulated meter connection from {} failed: {}", peer, e);
            }
        });
    }
}
