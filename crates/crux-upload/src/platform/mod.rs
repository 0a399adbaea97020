//! Platform capability interfaces used by the resilience layer.
//!
//! Each capability has a native implementation here; hosts with richer signals
//! (a mobile shell, a browser bridge) plug in their own.

pub mod connectivity;
pub mod power;
pub mod visibility;

pub use connectivity::{ConnectivityMonitor, ManualConnectivity, TcpConnectivityMonitor};
pub use power::{NoopPowerHold, PowerHold};
pub use visibility::{ManualVisibility, VisibilityMonitor};
