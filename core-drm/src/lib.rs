//! # Content Key Exchange
//!
//! The DRM handshake that turns a playback entitlement into a persisted
//! content key: fetch the application certificate, have the platform key
//! vendor build a key-request blob, trade it with the license server for a
//! content key context, derive a persistable key and write it to the key
//! store.
//!
//! The exchange is a small state machine driven by key-loading requests.
//! The request url's host names the content key. A persisted key
//! short-circuits the whole handshake: if the key store already holds a
//! key under that identifier, no network traffic happens at all.

pub mod error;
pub mod exchange;
pub mod loading;
pub mod platform;

pub use error::FairplayError;
pub use exchange::{ContentKeyExchange, ExchangeState, Handling};
pub use loading::{KeyResponse, LoadingRequest, FAIRPLAY_KEY_SCHEME, PERSISTENT_KEY_CONTENT_TYPE};
pub use platform::KeyVendor;
