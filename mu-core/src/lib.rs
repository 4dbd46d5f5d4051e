//! # Core types and traits
//!
//! This crate holds everything that is shared between the mailbox sources
//! and the upload coordinator.
//!
//! It contains the following modules:
//!
//! ## model
//!
//! The outline tree: the hierarchical, selectable representation of a
//! mailbox root. Sources build one tree per root, the coordinator walks the
//! tree's message-bearing chain in order to upload in a deterministic order.
//!
//! ## types
//!
//! Types which are needed across the codebase, such as the `Config`, the
//! `UploadCandidate` that is handed to the transport, and the skip records
//! that end up in the diagnostics report.
//!
//! ## source / uploader
//!
//! The two seams of the pipeline. `MailSource` is implemented by the
//! per-format controllers in `mu-sources`, `Uploaderlike` by the upload
//! transport. The coordinator in `mu-uploader` depends only on these traits.
//!
//! # Usage
//!
//! The core library by itself does nothing. Scan one or more mailbox roots
//! into `MailSource` instances, hand them to the coordinator together with
//! an `Uploaderlike` transport, and watch the `Message` channel for
//! progress.

mod limits;
pub mod model;
mod source;
mod status;
mod types;
mod uploader;

pub use limits::{Limits, Mode, MAX_MESSAGE_SIZE};
pub use source::{Fetched, MailSource};
pub use status::{Message, StatusReceiver, StatusSender};
pub use types::{
    Config, FormatType, MailProperty, Provenance, SkipReason, SkippedMessage, UploadCandidate,
    UploadOptions,
};
pub use uploader::{UploadOutcome, Uploaderlike};

// Re-Export some dependencies so they don't
// need to be listed again in other Cargo tomls
pub use crossbeam_channel;
pub use eyre;
pub use rand;
pub use tracing;

// Tracing

use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

pub fn setup_tracing() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "error")
    }

    let collector = tracing_subscriber::registry().with(fmt::layer().with_writer(std::io::stdout));

    tracing::subscriber::set_global_default(collector).expect("Unable to set a global collector");
}
