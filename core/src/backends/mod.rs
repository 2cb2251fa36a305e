//! Transport backend implementations.

#[cfg(feature = "ureq")]
mod ureq_transport;
#[cfg(feature = "ureq")]
pub use ureq_transport::UreqTransport;
