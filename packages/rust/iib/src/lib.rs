//! Index image build (IIB) submission and status polling.
//!
//! Publishing a bundle is a three step flow:
//!
//! 1. [`IibClient::add_build`] submits the build and yields its identifier
//! 2. [`wait_for_build`] polls the build until it completes, fails, or the
//!    wait budget runs out, returning a [`PollOutcome`]
//! 3. [`publish_bundle`] maps the non-success outcomes to distinct errors

mod client;
mod poll;
mod publish;

pub use client::{AddBuildRequest, BuildResponse, BuildState, IibClient, StateHistoryEntry};
pub use poll::{PollObserver, PollOutcome, PollSettings, SilentObserver, wait_for_build};
pub use publish::{PublishRequest, build_add_request, publish_bundle};
