//! # The upload coordinator
//!
//! Pushes the selected messages of any number of [`mu_core::MailSource`]s
//! through an [`mu_core::Uploaderlike`] transport: rate-adaptive
//! (fast / slow mode with back-pressure escalation), retry-capable,
//! duplicate-aware, pausable, and auditable through the skipped-messages
//! report.

mod coordinator;
mod progress;
mod session;
mod simulate;

pub use coordinator::{Control, Coordinator, UploadHandle, UploadReport};
pub use progress::{Adapter, Progress, State};
pub use simulate::SimulatedUploader;
