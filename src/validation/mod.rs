//! Request validation against the bot-detection decision service.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → exclusion.rs (static assets short-circuit, no remote call)
//!     → descriptor.rs (request → ValidationDescriptor, pure)
//!     → encoding.rs (descriptor → form body)
//!     → client.rs (POST raced against the deadline)
//!     → verdict.rs (status → Verdict)
//!     → relay.rs (manifest headers, cookie domain fix, latency)
//!     → gateway.rs (apply the decision around the upstream call)
//! ```
//!
//! # Design Decisions
//! - Fail open: timeouts, transport errors and unknown statuses never block traffic
//! - Everything here is request-scoped; the only shared state is configuration
//!   and the pooled HTTP clients
//! - The decision service is reached through the [`DecisionService`] trait so
//!   tests can substitute a fake

pub mod client;
pub mod descriptor;
pub mod encoding;
pub mod exclusion;
pub mod gateway;
pub mod relay;
pub mod verdict;

pub use client::{DecisionResponse, DecisionService, HttpDecisionService, RemoteValidator, ValidatorError};
pub use descriptor::{build_descriptor, FieldValue, ValidationDescriptor};
pub use exclusion::StaticAssetFilter;
pub use gateway::{bot_gateway_middleware, Decision, Gateway};
pub use verdict::{interpret, FailOpenReason, RewriteTarget, Verdict};

/// Response header listing decision-service headers to relay to the client.
pub const RESPONSE_MANIFEST_HEADER: &str = "x-decision-headers";

/// Response header listing decision-service headers to add to the forwarded request.
pub const REQUEST_MANIFEST_HEADER: &str = "x-decision-request-headers";

/// Set by the decision service when the request is classified as automated.
pub const IS_BOT_HEADER: &str = "x-decision-isbot";

pub const BOT_NAME_HEADER: &str = "x-decision-botname";

pub const BOT_FAMILY_HEADER: &str = "x-decision-botfamily";

/// Stamped on decorated responses with the decision call duration in milliseconds.
pub const LATENCY_HEADER: &str = "x-decision-latency";
