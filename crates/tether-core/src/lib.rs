//! # tether-core
//!
//! Wire protocol, error taxonomy and host capability traits shared by the
//! bridge and its host implementations.

pub mod envelope;
pub mod errors;
pub mod host;
pub mod lifecycle;
pub mod position;
pub mod protocol;

pub use envelope::{decode, encode, DecodeError, Envelope, RawMessage};
pub use errors::{BridgeError, FixError, FixErrorCode, HostError};
pub use lifecycle::{AppLifecycleState, CameraEvent, HostInput, NativeEvent};
pub use position::{Fix, FixRequest, PositionWatch, WatchId, WatchPolicy};
pub use protocol::{InboundMessage, LatLng, OutboundMessage};
