//! MIME part trees and body extraction.
//!
//! Only what the reference backend needs: header parsing, multipart
//! splitting on the boundary parameter, and reducing a part tree to the
//! text shown as the message body.

/// One node of a MIME part tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MimePart {
    /// Lowercase `type/subtype`.
    pub content_type: String,
    /// Lowercase disposition, e.g. `attachment`.
    pub disposition: Option<String>,
    /// Headers in order, names lowercased.
    pub headers: Vec<(String, String)>,
    /// Body of a leaf part.
    pub body: String,
    /// Children of a multipart part.
    pub parts: Vec<MimePart>,
}

impl MimePart {
    /// Creates a leaf part.
    pub fn leaf(content_type: &str, body: impl Into<String>) -> Self {
        Self {
            content_type: content_type.to_ascii_lowercase(),
            body: body.into(),
            ..Self::default()
        }
    }

    /// Creates a multipart part.
    pub fn multipart(content_type: &str, parts: Vec<MimePart>) -> Self {
        Self {
            content_type: content_type.to_ascii_lowercase(),
            parts,
            ..Self::default()
        }
    }

    /// Sets the disposition.
    pub fn with_disposition(mut self, disposition: &str) -> Self {
        self.disposition = Some(disposition.to_ascii_lowercase());
        self
    }

    /// Parses a message or part from its raw text.
    ///
    /// A part without a content type is `text/plain`.
    pub fn parse(raw: &str) -> Self {
        let (head, body) = split_head(raw);
        let headers = parse_headers(head);
        let (content_type, params) = headers
            .iter()
            .find(|(name, _)| name == "content-type")
            .map(|(_, value)| parse_header_value(value))
            .unwrap_or_else(|| ("text/plain".to_string(), Vec::new()));
        let disposition = headers
            .iter()
            .find(|(name, _)| name == "content-disposition")
            .map(|(_, value)| parse_header_value(value).0);

        let boundary = params
            .iter()
            .find(|(name, _)| name == "boundary")
            .map(|(_, value)| value.clone());
        let (body, parts) = match boundary {
            Some(boundary) if content_type.starts_with("multipart/") => {
                (String::new(), split_multipart(body, &boundary))
            }
            _ => (body.to_string(), Vec::new()),
        };

        Self {
            content_type,
            disposition,
            headers,
            body,
            parts,
        }
    }

    /// First value of a header, by lowercase name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Returns true if the part is marked as an attachment.
    pub fn is_attachment(&self) -> bool {
        self.disposition.as_deref() == Some("attachment")
    }

    fn is_multipart(&self) -> bool {
        self.content_type.starts_with("multipart/")
    }
}

/// Reduces a part tree to body text.
///
/// Every `text/plain` part is concatenated in depth-first order,
/// skipping attachments. Without any plain text, the `text/html` parts
/// are used instead with style blocks and tags removed.
pub fn extract_body(message: &MimePart) -> String {
    let mut body = String::new();
    collect_text(message, "text/plain", &mut body);
    if body.is_empty() {
        collect_text(message, "text/html", &mut body);
        body = strip_html(&body);
    }
    body
}

fn collect_text(part: &MimePart, content_type: &str, out: &mut String) {
    if part.content_type == content_type {
        out.push_str(&part.body);
    }
    if part.is_multipart() {
        for child in part.parts.iter().filter(|p| !p.is_attachment()) {
            collect_text(child, content_type, out);
        }
    }
}

/// Removes style blocks and tags, and decodes the common entities.
pub fn strip_html(html: &str) -> String {
    let without_style = remove_style_blocks(html);
    let mut text = String::with_capacity(without_style.len());
    let mut in_tag = false;
    for c in without_style.chars() {
        match (c, in_tag) {
            ('<', _) => in_tag = true,
            ('>', true) => in_tag = false,
            (_, false) => text.push(c),
            _ => {}
        }
    }
    decode_entities(&text)
}

fn remove_style_blocks(html: &str) -> String {
    let lower = html.to_ascii_lowercase();
    let mut out = String::with_capacity(html.len());
    let mut pos = 0;
    while let Some(start) = lower[pos..].find("<style") {
        let start = pos + start;
        out.push_str(&html[pos..start]);
        match lower[start..].find("</style>") {
            Some(end) => pos = start + end + "</style>".len(),
            None => return out,
        }
    }
    out.push_str(&html[pos..]);
    out
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

fn split_head(raw: &str) -> (&str, &str) {
    for sep in ["\r\n\r\n", "\n\n"] {
        if let Some(i) = raw.find(sep) {
            return (&raw[..i], &raw[i + sep.len()..]);
        }
    }
    (raw, "")
}

fn parse_headers(head: &str) -> Vec<(String, String)> {
    let mut headers: Vec<(String, String)> = Vec::new();
    for line in head.lines() {
        if line.starts_with([' ', '\t']) {
            if let Some((_, value)) = headers.last_mut() {
                value.push(' ');
                value.push_str(line.trim());
            }
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.push((name.trim().to_ascii_lowercase(), value.trim().to_string()));
        }
    }
    headers
}

fn parse_header_value(value: &str) -> (String, Vec<(String, String)>) {
    let mut pieces = value.split(';');
    let main = pieces.next().unwrap_or_default().trim().to_ascii_lowercase();
    let params = pieces
        .filter_map(|p| p.split_once('='))
        .map(|(k, v)| {
            (
                k.trim().to_ascii_lowercase(),
                v.trim().trim_matches('"').to_string(),
            )
        })
        .collect();
    (main, params)
}

fn split_multipart(body: &str, boundary: &str) -> Vec<MimePart> {
    let open = format!("--{boundary}");
    let close = format!("--{boundary}--");
    let mut parts = Vec::new();
    let mut current: Option<Vec<&str>> = None;
    for line in body.lines() {
        let line_trimmed = line.trim_end();
        if line_trimmed == close {
            break;
        }
        if line_trimmed == open {
            if let Some(lines) = current.take() {
                parts.push(MimePart::parse(&lines.join("\n")));
            }
            current = Some(Vec::new());
            continue;
        }
        if let Some(lines) = current.as_mut() {
            lines.push(line);
        }
    }
    if let Some(lines) = current {
        parts.push(MimePart::parse(&lines.join("\n")));
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_plain_text() {
        let message = MimePart::multipart(
            "multipart/alternative",
            vec![
                MimePart::leaf("text/html", "<p>hi</p>"),
                MimePart::leaf("text/plain", "hi"),
            ],
        );
        assert_eq!(extract_body(&message), "hi");
    }

    #[test]
    fn skips_attachments() {
        let message = MimePart::multipart(
            "multipart/mixed",
            vec![
                MimePart::leaf("text/plain", "body"),
                MimePart::leaf("text/plain", "notes.txt").with_disposition("attachment"),
            ],
        );
        assert_eq!(extract_body(&message), "body");
    }

    #[test]
    fn walks_nested_parts_depth_first() {
        let message = MimePart::multipart(
            "multipart/mixed",
            vec![
                MimePart::multipart(
                    "multipart/alternative",
                    vec![MimePart::leaf("text/plain", "one ")],
                ),
                MimePart::leaf("text/plain", "two"),
            ],
        );
        assert_eq!(extract_body(&message), "one two");
    }

    #[test]
    fn falls_back_to_stripped_html() {
        let message = MimePart::leaf(
            "text/html",
            "<html><style type=\"text/css\">p { color: red }</style><p>Fish &amp; chips</p></html>",
        );
        assert_eq!(extract_body(&message), "Fish & chips");
    }

    #[test]
    fn parses_multipart_message() {
        let raw = "From: a@example.com\r\nSubject: Hello\r\n  world\r\n\
                   Content-Type: multipart/mixed; boundary=\"xyz\"\r\n\r\n\
                   preamble\r\n--xyz\r\nContent-Type: text/plain\r\n\r\nThe body\r\n\
                   --xyz\r\nContent-Type: application/pdf\r\n\
                   Content-Disposition: attachment; filename=a.pdf\r\n\r\n%PDF\r\n--xyz--\r\n";
        let message = MimePart::parse(raw);

        assert_eq!(message.header("subject"), Some("Hello world"));
        assert_eq!(message.parts.len(), 2);
        assert!(message.parts[1].is_attachment());
        assert_eq!(extract_body(&message), "The body");
    }

    #[test]
    fn missing_content_type_is_plain_text() {
        let message = MimePart::parse("Subject: x\n\nbody");
        assert_eq!(message.content_type, "text/plain");
        assert_eq!(extract_body(&message), "body");
    }
}
