pub mod classifier;
mod engine;
mod registry;
mod runner;

pub use classifier::{classify, NetworkEvent, NetworkEventKind, UrlCategory, UrlMarkers};
pub use engine::{DiscoveryEngine, DiscoveryOutcome, DiscoveryPhase};
pub use registry::{RecordOutcome, RegistrySnapshot, UrlRegistry};
pub use runner::{DiscoveryRequest, DiscoveryRunner};
