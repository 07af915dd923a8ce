//! REST core for managing Discord guilds declaratively.
//!
//! The [`http`] client owns authentication, rate-limit handling and
//! cancellation; [`reconcile`] turns declared sets (overwrites, ordering,
//! member roles) into the minimal sequence of calls; [`resources`] wires both
//! into the create/read/update/delete lifecycle the host drives.

pub mod config;
pub mod error;
pub mod http;
pub mod ids;
pub mod json;
pub mod permissions;
pub mod ratelimit;
pub mod reconcile;
pub mod resources;
pub mod types;

pub use config::ProviderConfig;
pub use error::{ApiError, Error, Result};
pub use http::{FilePart, RestClient};
pub use ratelimit::RateLimitGate;
pub use resources::{Context, Registry, Resource, ResourceData};
