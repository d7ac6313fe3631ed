use std::sync::Arc;

use tether_core::host::{
    CameraDevice, ConnectivityMonitor, ImageResizer, LocationHistory, LocationProvider,
    ShellSurface,
};

/// The set of host capabilities one bridge instance drives.
#[derive(Clone)]
pub struct Hosts {
    pub location: Arc<dyn LocationProvider>,
    pub camera: Arc<dyn CameraDevice>,
    pub resizer: Arc<dyn ImageResizer>,
    pub shell: Arc<dyn ShellSurface>,
    pub connectivity: Arc<dyn ConnectivityMonitor>,
    /// Location history sink, when persistence is configured.
    pub history: Option<Arc<dyn LocationHistory>>,
}
