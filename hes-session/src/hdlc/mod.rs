//! HDLC session layer module

pub mod address;
pub mod decoder;
pub mod fcs;
pub mod frame;
pub mod parameters;
pub mod statistics;

pub use address::HdlcAddress;
pub use decoder::HdlcFrameDecoder;
pub use fcs::{fcs16, FcsCalc};
pub use frame::{strip_llc, FrameType, HdlcFrame, FLAG, LLC_REQUEST, LLC_RESPONSE};
pub use parameters::LinkParameters;
pub use statistics::HdlcStatistics;
