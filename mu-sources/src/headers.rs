//! Minimal header-line extraction. This deliberately stops far short of
//! full RFC822 parsing: the pipeline only ever needs single-line header
//! values (Message-ID for duplicate detection) and one fix-up for
//! Eudora's `<x-html>` bodies.

use crate::locator::LineEnding;

/// The header block of a message: everything up to the first blank line.
/// Messages without a blank line are all headers.
pub fn header_block<'a>(message: &'a [u8], eol: LineEnding) -> &'a [u8] {
    let eol_bytes = eol.as_bytes();
    let separator: Vec<u8> = [eol_bytes, eol_bytes].concat();
    match find(message, &separator) {
        Some(position) => &message[..position + eol_bytes.len()],
        None => message,
    }
}

/// Scan the header block for `name` and return the text after the `:`,
/// trimmed. Only works for single-line headers; a folded continuation is
/// not followed.
pub fn header_value(message: &[u8], name: &str, eol: LineEnding) -> Option<String> {
    let block = header_block(message, eol);
    for line in split_lines(block, eol) {
        let colon = match line.iter().position(|b| *b == b':') {
            Some(colon) => colon,
            None => continue,
        };
        if !line[..colon].eq_ignore_ascii_case(name.as_bytes()) {
            continue;
        }
        let value = String::from_utf8_lossy(&line[colon + 1..]);
        let value = value.trim();
        if value.is_empty() {
            return None;
        }
        return Some(value.to_owned());
    }
    None
}

/// The Message-ID of a message, as written in its header, angle brackets
/// and all. Used as the duplicate-index key.
pub fn message_id(message: &[u8], eol: LineEnding) -> Option<String> {
    header_value(message, "Message-ID", eol)
}

/// Fix the headers of a message. Currently this sets the Content-Type
/// header to text/html when the body begins with `<x-html>`, which is how
/// Eudora marks HTML mail.
pub fn altered_message(message: Vec<u8>, eol: LineEnding) -> Vec<u8> {
    let eol_bytes = eol.as_bytes();
    let block_len = header_block(&message, eol).len();
    let body = &message[(block_len + eol_bytes.len()).min(message.len())..];
    if !body.starts_with(b"<x-html>") {
        return message;
    }

    let mut altered = Vec::with_capacity(message.len() + 32);
    let mut replaced = false;
    for line in split_lines(&message[..block_len], eol) {
        let is_content_type = line
            .iter()
            .position(|b| *b == b':')
            .map(|colon| line[..colon].eq_ignore_ascii_case(b"Content-Type"))
            .unwrap_or(false);
        if is_content_type {
            altered.extend_from_slice(b"Content-Type: text/html");
            replaced = true;
        } else {
            altered.extend_from_slice(line);
        }
        altered.extend_from_slice(eol_bytes);
    }
    if !replaced {
        altered.extend_from_slice(b"Content-Type: text/html");
        altered.extend_from_slice(eol_bytes);
    }
    altered.extend_from_slice(&message[block_len..]);
    altered
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn split_lines<'a>(block: &'a [u8], eol: LineEnding) -> impl Iterator<Item = &'a [u8]> {
    let eol_bytes = eol.as_bytes();
    block
        .split(move |b| *b == b'\n')
        .filter(|line| !line.is_empty())
        .map(move |line| {
            if eol_bytes == b"\r\n" && line.ends_with(b"\r") {
                &line[..line.len() - 1]
            } else {
                line
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MESSAGE: &[u8] = b"From: alice@example.com\n\
Subject: Hello\n\
Message-ID: <abc123@example.com>\n\
\n\
Body text\n";

    #[test]
    fn test_header_block() {
        let block = header_block(MESSAGE, LineEnding::Lf);
        assert!(block.ends_with(b"<abc123@example.com>\n"));
        assert!(!block.windows(4).any(|w| w == b"Body"));
    }

    #[test]
    fn test_header_value_is_case_insensitive() {
        assert_eq!(
            header_value(MESSAGE, "subject", LineEnding::Lf).as_deref(),
            Some("Hello")
        );
        assert_eq!(
            message_id(MESSAGE, LineEnding::Lf).as_deref(),
            Some("<abc123@example.com>")
        );
        assert_eq!(header_value(MESSAGE, "Received", LineEnding::Lf), None);
    }

    #[test]
    fn test_header_value_crlf() {
        let message = b"Subject: Greetings\r\nMessage-ID: <x@y>\r\n\r\nBody\r\n";
        assert_eq!(
            header_value(message, "Subject", LineEnding::CrLf).as_deref(),
            Some("Greetings")
        );
    }

    #[test]
    fn test_x_html_rewrites_content_type() {
        let message = b"From: a@b\nContent-Type: text/plain\n\n<x-html><b>Hi</b></x-html>\n";
        let altered = altered_message(message.to_vec(), LineEnding::Lf);
        assert_eq!(
            header_value(&altered, "Content-Type", LineEnding::Lf).as_deref(),
            Some("text/html")
        );
        assert!(altered.ends_with(b"<x-html><b>Hi</b></x-html>\n"));
    }

    #[test]
    fn test_x_html_adds_missing_content_type() {
        let message = b"From: a@b\n\n<x-html>Hi</x-html>\n";
        let altered = altered_message(message.to_vec(), LineEnding::Lf);
        assert_eq!(
            header_value(&altered, "Content-Type", LineEnding::Lf).as_deref(),
            Some("text/html")
        );
    }

    #[test]
    fn test_plain_message_is_untouched() {
        let altered = altered_message(MESSAGE.to_vec(), LineEnding::Lf);
        assert_eq!(altered, MESSAGE);
    }
}
