//! # Mailbox sources
//!
//! Scanning of local mail stores into outline trees, and the per-format
//! [`Controller`] that feeds the upload coordinator one candidate at a
//! time. Three formats are supported: Apple Mail (`.emlx` trees), plain
//! maildirs, and folders of mbox files (Eudora, Thunderbird, Entourage
//! RGE archives).

mod controller;
pub(crate) mod formats;
pub mod headers;
pub mod locator;

pub use controller::Controller;

use mu_core::eyre::Result;
use mu_core::{Config, FormatType, StatusSender};

use std::path::PathBuf;
use std::str::FromStr;

pub fn apple_mail_controller(config: Config, sender: &StatusSender) -> Result<Controller> {
    let scanned = formats::scan_apple_mail(&config, sender)?;
    Ok(Controller::new(config, scanned))
}

#[cfg(unix)]
pub fn maildir_controller(config: Config, sender: &StatusSender) -> Result<Controller> {
    let scanned = formats::scan_maildir(&config, sender)?;
    Ok(Controller::new(config, scanned))
}

pub fn mbox_controller(config: Config, sender: &StatusSender) -> Result<Controller> {
    let scanned = formats::scan_mbox_root(&config, sender)?;
    Ok(Controller::new(config, scanned))
}

/// Build the controller matching `config.format`.
pub fn controller_for(config: Config, sender: &StatusSender) -> Result<Controller> {
    match config.format {
        FormatType::AppleMail => apple_mail_controller(config, sender),
        #[cfg(unix)]
        FormatType::Maildir => maildir_controller(config, sender),
        FormatType::Mbox => mbox_controller(config, sender),
    }
}

/// The default location where the data for this format resides on the
/// system. If there is none (such as for mbox) return `None`.
pub fn default_folder(format: FormatType) -> Option<PathBuf> {
    match format {
        FormatType::AppleMail => {
            let path = shellexpand::tilde("~/Library/Mail");
            PathBuf::from_str(path.as_ref()).ok()
        }
        _ => None,
    }
}
