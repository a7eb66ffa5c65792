//! Marketplace replication: tell the mirror service about newly published
//! bundles.
//!
//! Only bundles published from a marketplace repository are forwarded. The
//! RPC schema lives in [`rpc`]; [`MirrorServiceClient`] speaks it over the
//! Twirp JSON protocol.

pub mod rpc;
mod replication;

pub use replication::{ReplicationEvent, ReplicationOutcome, is_replication_target, notify_replication};
pub use rpc::{BundleData, Empty, MirrorService, MirrorServiceClient, NewOperatorBundlesRequest};
