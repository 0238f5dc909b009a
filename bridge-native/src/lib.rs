//! Native bridge adapters.
//!
//! Reqwest-backed implementations of the [`bridge_traits`] seams for desktop
//! and server hosts. Mobile hosts inject their own platform adapters.

pub mod http;
pub mod network;

pub use http::ReqwestHttpClient;
pub use network::ProbeNetworkMonitor;
