//! # tether-bridge
//!
//! The bridge between the content surface and the host: an envelope
//! dispatcher in front of three coordinators (location tracking, photo
//! capture, app lifecycle), all driven from one event loop.
//!
//! ```text
//! surface / native ─> BridgeHandle ─> Bridge ─> Dispatcher ─> coordinators
//!                                                   │
//!                        surface <──── Outbox <─────┘
//! ```

pub mod bridge;
pub mod capture;
pub mod cleanup;
pub mod dispatcher;
pub mod event;
pub mod hosts;
pub mod lifecycle;
pub mod location;
pub mod outbox;

pub use bridge::{Bridge, BridgeHandle, Shutdown};
pub use capture::{CapturePipeline, CaptureSession, CaptureState, CompressionAttempt};
pub use dispatcher::{Dispatcher, Flow};
pub use hosts::Hosts;
pub use lifecycle::{LifecycleCoordinator, Transition};
pub use location::{HistoryTarget, LocationCoordinator, TrackingMode};
pub use outbox::Outbox;
