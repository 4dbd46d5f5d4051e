mod candidate;
mod config;
mod skipped;

pub use candidate::{MailProperty, Provenance, UploadCandidate};
pub use config::{Config, FormatType, UploadOptions};
pub use skipped::{SkipReason, SkippedMessage};
