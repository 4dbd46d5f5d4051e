use mu_core::{crossbeam_channel, Config, Fetched, FormatType, MailSource, UploadOptions};
use mu_sources::{apple_mail_controller, mbox_controller, Controller};

#[cfg(test)]
mod tests {
    use super::*;
    use mu_core::model::CheckState;
    use std::fs;
    use std::path::Path;

    fn drain(controller: &mut Controller) -> Vec<String> {
        let mut ids = Vec::new();
        loop {
            match controller.next_upload_candidate().expect("candidate") {
                Fetched::Candidate(candidate) => {
                    ids.push(candidate.message_id.clone().expect("message id"))
                }
                Fetched::Failed(skip) => panic!("unexpected skip: {}", skip),
                Fetched::Exhausted => break,
            }
        }
        ids
    }

    fn mbox_fixture() -> Controller {
        let (sender, _receiver) = crossbeam_channel::unbounded();
        let config = Config::new(
            "tests/resources/mbox",
            FormatType::Mbox,
            UploadOptions::default(),
        )
        .expect("Config");
        mbox_controller(config, &sender).expect("controller")
    }

    /// The mbox root has 5 messages across two files; draining returns all
    /// of them in a fixed order, then reports exhaustion.
    #[test]
    fn test_mbox_drain_order() {
        let mut controller = mbox_fixture();
        assert_eq!(controller.count_selected_messages(), 5);
        let ids = drain(&mut controller);
        assert_eq!(
            ids,
            vec![
                "<old-1@example.com>",
                "<old-2@example.com>",
                "<inbox-1@example.com>",
                "<inbox-2@example.com>",
                "<inbox-3@example.com>",
            ]
        );
        // Once exhausted, it stays exhausted.
        assert!(matches!(
            controller.next_upload_candidate().unwrap(),
            Fetched::Exhausted
        ));
    }

    /// Rewinding the cursor reproduces the identical candidate sequence.
    #[test]
    fn test_reset_is_idempotent() {
        let mut controller = mbox_fixture();
        let first = drain(&mut controller);
        controller.reset_upload();
        let second = drain(&mut controller);
        assert_eq!(first, second);
    }

    /// Deselecting one mailbox removes exactly its messages from the
    /// sequence and from the selected count.
    #[test]
    fn test_selection_filters_candidates() {
        let mut controller = mbox_fixture();
        let inbox = controller
            .tree()
            .chain()
            .iter()
            .copied()
            .find(|id| controller.tree().item(*id).name == "Inbox")
            .expect("Inbox node");
        controller.tree_mut().set_state(inbox, false);
        assert_eq!(controller.count_selected_messages(), 2);
        assert_eq!(
            controller.tree().item(controller.tree().root()).state(),
            CheckState::Mixed
        );

        let ids = drain(&mut controller);
        assert_eq!(ids, vec!["<old-1@example.com>", "<old-2@example.com>"]);
    }

    /// Candidates carry the mailbox name as a label and the provenance of
    /// their byte range.
    #[test]
    fn test_candidate_labels_and_provenance() {
        let mut controller = mbox_fixture();
        let candidate = match controller.next_upload_candidate().unwrap() {
            Fetched::Candidate(c) => c,
            other => panic!("expected candidate, got {:?}", other),
        };
        assert_eq!(candidate.mailbox_name, "Old");
        assert_eq!(candidate.labels, vec!["Old".to_string()]);
        assert!(candidate.provenance.byte_range.is_some());
        assert_eq!(candidate.provenance.index, 0);
        assert!(candidate.rfc822.starts_with(b"From: dave@example.com"));
    }

    // Apple Mail fixtures are generated on the fly: an emlx file is the
    // message byte count on its own line, the message, then a property
    // list with the flags.
    fn write_emlx(path: &Path, message: &[u8], flags: u64) {
        let plist = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
<!DOCTYPE plist PUBLIC \"-//Apple//DTD PLIST 1.0//EN\" \"http://www.apple.com/DTDs/PropertyList-1.0.dtd\">\n\
<plist version=\"1.0\">\n<dict>\n\t<key>flags</key>\n\t<integer>{}</integer>\n</dict>\n</plist>\n",
            flags
        );
        let mut data = Vec::new();
        data.extend(format!("{}\n", message.len()).into_bytes());
        data.extend_from_slice(message);
        data.extend(plist.into_bytes());
        fs::write(path, data).expect("write emlx");
    }

    #[test]
    fn test_apple_mail_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let messages = dir.path().join("Inbox.mbox").join("Messages");
        fs::create_dir_all(&messages).expect("mkdir");
        write_emlx(
            &messages.join("1.emlx"),
            b"From: alice@example.com\nMessage-ID: <emlx-1@example.com>\n\nHi\n",
            0,
        );
        write_emlx(
            &messages.join("2.emlx"),
            b"From: bob@example.com\nMessage-ID: <emlx-2@example.com>\n\nHo\n",
            1, // read
        );

        let (sender, _receiver) = crossbeam_channel::unbounded();
        let config = Config::new(dir.path(), FormatType::AppleMail, UploadOptions::default())
            .expect("Config");
        let mut controller = apple_mail_controller(config, &sender).expect("controller");
        assert_eq!(controller.count_selected_messages(), 2);

        let first = match controller.next_upload_candidate().unwrap() {
            Fetched::Candidate(c) => c,
            other => panic!("expected candidate, got {:?}", other),
        };
        assert_eq!(first.message_id.as_deref(), Some("<emlx-1@example.com>"));
        assert_eq!(first.mailbox_name, "Inbox");
        // Message 1 is unread, so the property is carried over.
        assert!(first
            .properties
            .contains(&mu_core::MailProperty::IsUnread));

        let second = match controller.next_upload_candidate().unwrap() {
            Fetched::Candidate(c) => c,
            other => panic!("expected candidate, got {:?}", other),
        };
        assert_eq!(second.message_id.as_deref(), Some("<emlx-2@example.com>"));
        assert!(!second
            .properties
            .contains(&mu_core::MailProperty::IsUnread));

        assert!(matches!(
            controller.next_upload_candidate().unwrap(),
            Fetched::Exhausted
        ));
    }
}
