//! Bundled dissectors.
//!
//! Link layers (`eth`, `raw`) hang off the root dispatch namespace set by
//! the session's link hint; IP dissectors claim `*ipv4`/`*ipv6` and rewrite
//! their dispatch namespace to the carried protocol; transport dissectors
//! claim `*tcp`/`*udp`. `tcp-stream` is a stream dissector on plain `tcp`.

mod common;
pub mod ethernet;
pub mod ipv4;
pub mod ipv6;
pub mod raw;
pub mod tcp;
pub mod tcp_stream;
pub mod udp;

use std::sync::Arc;

use crate::dissector::DissectorFactory;
use crate::session::SessionBuilder;

pub use ethernet::EthernetFactory;
pub use ipv4::Ipv4Factory;
pub use ipv6::Ipv6Factory;
pub use raw::RawFactory;
pub use tcp::TcpFactory;
pub use tcp_stream::TcpStreamFactory;
pub use udp::UdpFactory;

/// Every bundled factory, in dispatch priority order.
pub fn builtin_factories() -> Vec<Arc<dyn DissectorFactory>> {
    vec![
        Arc::new(EthernetFactory),
        Arc::new(RawFactory),
        Arc::new(Ipv4Factory),
        Arc::new(Ipv6Factory),
        Arc::new(TcpFactory),
        Arc::new(UdpFactory),
        Arc::new(TcpStreamFactory),
    ]
}

impl SessionBuilder {
    /// Register all bundled dissectors after any already registered.
    pub fn with_builtin_dissectors(self) -> Self {
        builtin_factories()
            .into_iter()
            .fold(self, |builder, factory| builder.register_shared(factory))
    }
}
