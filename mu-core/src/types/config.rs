use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{EnumIter, IntoStaticStr};

use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr, EnumIter, Serialize, Deserialize)]
pub enum FormatType {
    /// Apple Mail folders of `.emlx` messages (one file per message).
    AppleMail,
    /// Plain maildir folders (`cur` / `new` directories).
    #[cfg(unix)]
    Maildir,
    /// Folders of mbox files, as written by Eudora, Thunderbird, or an
    /// Entourage RGE archive.
    Mbox,
}

impl FormatType {
    pub fn all_cases() -> impl Iterator<Item = FormatType> {
        FormatType::iter()
    }

    pub fn name(&self) -> &'static str {
        match self {
            FormatType::AppleMail => "Apple Mail",
            #[cfg(unix)]
            FormatType::Maildir => "Maildir",
            FormatType::Mbox => "Mbox",
        }
    }
}

impl Default for FormatType {
    fn default() -> Self {
        #[cfg(target_os = "macos")]
        return FormatType::AppleMail;

        #[cfg(not(target_os = "macos"))]
        return FormatType::Mbox;
    }
}

impl From<&str> for FormatType {
    fn from(format: &str) -> Self {
        match format {
            "apple" => FormatType::AppleMail,
            #[cfg(unix)]
            "maildir" => FormatType::Maildir,
            "mbox" => FormatType::Mbox,
            _ => panic!("Unknown format: {}", &format),
        }
    }
}

impl From<FormatType> for String {
    fn from(format: FormatType) -> Self {
        match format {
            FormatType::AppleMail => "apple".to_owned(),
            #[cfg(unix)]
            FormatType::Maildir => "maildir".to_owned(),
            FormatType::Mbox => "mbox".to_owned(),
        }
    }
}

/// The user-facing upload switches. These shape the labels and extension
/// properties that are attached to every [`super::UploadCandidate`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadOptions {
    /// Attach the originating mailbox name as a label.
    pub mailbox_names_as_labels: bool,
    /// Carry the seen / flagged state of the message over as properties.
    pub preserve_mail_properties: bool,
    /// Mark every uploaded message as an inbox message.
    pub put_all_mail_in_inbox: bool,
    /// One extra label to assign to everything in this run.
    pub additional_label: Option<String>,
}

impl Default for UploadOptions {
    fn default() -> Self {
        UploadOptions {
            mailbox_names_as_labels: true,
            preserve_mail_properties: true,
            put_all_mail_in_inbox: false,
            additional_label: None,
        }
    }
}

/// Configuration for one imported mailbox root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// The folder where the mails of this root are.
    pub mail_folder_path: PathBuf,
    /// The name under which this root appears in the outline and in
    /// mailbox-name labels.
    pub root_name: String,
    /// The source format of this root.
    pub format: FormatType,
    /// The upload switches for this run.
    pub options: UploadOptions,
}

impl Config {
    pub fn new<P: AsRef<Path>>(
        mail_folder_path: P,
        format: FormatType,
        options: UploadOptions,
    ) -> eyre::Result<Self> {
        let mail_folder_path = mail_folder_path.as_ref().to_path_buf();
        // Derive a display name from the folder, falling back to the
        // format name for roots like `/`.
        let root_name = mail_folder_path
            .file_name()
            .and_then(|e| e.to_str())
            .map(|e| e.to_owned())
            .unwrap_or_else(|| format.name().to_owned());
        Ok(Config {
            mail_folder_path,
            root_name,
            format,
            options,
        })
    }
}
