//! # tether-host
//!
//! Desktop implementations of the host capabilities the bridge depends on,
//! plus recording mocks for tests.

pub mod camera;
pub mod location;
pub mod mock;
pub mod resizer;
pub mod shell;

pub use camera::FileCamera;
pub use location::SimulatedLocation;
pub use resizer::JpegResizer;
pub use shell::DesktopShell;
