//! MTOM (multipart/related, XOP) packaging
//!
//! The root part carries the SOAP envelope as `application/xop+xml`. Binary
//! values are emitted as separate parts and referenced from the envelope
//! through `xop:Include href="cid:..."`.

use super::xml::XmlElement;
use crate::{Error, Result};
use bytes::Bytes;
use mail_parser::{HeaderValue, MessageParser, PartType};
use std::collections::HashMap;
use tracing::{debug, trace};

/// Content-ID of the root part
pub const ROOT_CONTENT_ID: &str = "root.message@emapi";

const ROOT_PART_TYPE: &str = r#"application/xop+xml;charset=utf-8;type="text/xml""#;

/// Binary part referenced from the envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub content_id: String,
    pub data: Bytes,
}

/// Decoded multipart package
#[derive(Debug, Default)]
pub struct MtomPackage {
    /// Root part (the SOAP envelope)
    pub root: Vec<u8>,
    /// Remaining parts keyed by Content-ID, without angle brackets
    pub attachments: HashMap<String, Bytes>,
}

pub fn new_boundary() -> String {
    format!("uuid:{:016x}{:016x}", rand::random::<u64>(), rand::random::<u64>())
}

pub fn content_id(index: usize) -> String {
    format!("attachment{index}@emapi")
}

/// Content-Type header of a multipart request
pub fn content_type(boundary: &str) -> String {
    format!(
        "multipart/related; type=\"application/xop+xml\"; start=\"<{ROOT_CONTENT_ID}>\"; start-info=\"text/xml\"; boundary=\"{boundary}\""
    )
}

pub fn is_multipart(content_type: &str) -> bool {
    content_type
        .trim_start()
        .to_ascii_lowercase()
        .starts_with("multipart/related")
}

/// Assemble the multipart body
pub fn encode(envelope: &[u8], attachments: &[Attachment], boundary: &str) -> Vec<u8> {
    let mut body = Vec::with_capacity(
        envelope.len() + attachments.iter().map(|a| a.data.len() + 160).sum::<usize>() + 256,
    );

    push_part_headers(
        &mut body,
        boundary,
        ROOT_CONTENT_ID,
        "8bit",
        ROOT_PART_TYPE,
    );
    body.extend_from_slice(envelope);
    body.extend_from_slice(b"\r\n");

    for attachment in attachments {
        push_part_headers(
            &mut body,
            boundary,
            &attachment.content_id,
            "binary",
            "application/octet-stream",
        );
        body.extend_from_slice(&attachment.data);
        body.extend_from_slice(b"\r\n");
    }

    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    trace!(
        "Encoded MTOM body: {} bytes, {} attachment(s)",
        body.len(),
        attachments.len()
    );
    body
}

fn push_part_headers(
    body: &mut Vec<u8>,
    boundary: &str,
    content_id: &str,
    transfer_encoding: &str,
    part_type: &str,
) {
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-ID: <{content_id}>\r\nContent-Transfer-Encoding: {transfer_encoding}\r\nContent-Type: {part_type}\r\n\r\n"
        )
        .as_bytes(),
    );
}

/// Split a multipart body into its root part and attachments
pub fn decode(content_type: &str, body: &[u8]) -> Result<MtomPackage> {
    // The HTTP Content-Type header is not part of the body, so it is
    // prepended to make the body a complete MIME entity.
    let mut raw = Vec::with_capacity(content_type.len() + body.len() + 20);
    raw.extend_from_slice(b"Content-Type: ");
    raw.extend_from_slice(content_type.as_bytes());
    raw.extend_from_slice(b"\r\n\r\n");
    raw.extend_from_slice(body);

    let message = MessageParser::default()
        .parse(&raw)
        .ok_or_else(|| Error::mime("failed to parse multipart response"))?;

    let start = start_parameter(content_type);
    let mut root = None;
    let mut first_leaf = None;
    let mut attachments = HashMap::new();

    for (i, part) in message.parts.iter().enumerate() {
        let contents: &[u8] = match &part.body {
            PartType::Text(text) | PartType::Html(text) => text.as_bytes(),
            PartType::Binary(data) | PartType::InlineBinary(data) => data.as_ref(),
            _ => continue,
        };

        let id = part_content_id(&part.headers);
        let is_root = match (&start, &id) {
            (Some(start), Some(id)) => start == id,
            _ => root.is_none() && part_is_xop(&part.headers),
        };
        trace!("MIME part {}: id={:?} root={}", i, id, is_root);

        if is_root && root.is_none() {
            root = Some(contents.to_vec());
            continue;
        }
        if first_leaf.is_none() {
            first_leaf = Some(contents.to_vec());
        }
        if let Some(id) = id {
            attachments.insert(id, Bytes::copy_from_slice(contents));
        }
    }

    let root = root
        .or(first_leaf)
        .ok_or_else(|| Error::mime("multipart response has no root part"))?;
    debug!(
        "Decoded MTOM response: root {} bytes, {} attachment(s)",
        root.len(),
        attachments.len()
    );
    Ok(MtomPackage { root, attachments })
}

/// Replace `xop:Include` children with the binary content they reference
pub fn resolve_includes(element: &mut XmlElement, attachments: &HashMap<String, Bytes>) -> Result<()> {
    if let Some(pos) = element.children.iter().position(|c| c.name == "Include") {
        let href = element.children[pos].attribute("href").unwrap_or_default();
        let id = percent_decode(href.strip_prefix("cid:").unwrap_or(href));
        let data = attachments
            .get(&id)
            .ok_or_else(|| Error::mime(format!("missing attachment for cid:{id}")))?;
        element.binary = Some(data.clone());
        element.children.remove(pos);
    }
    for child in &mut element.children {
        resolve_includes(child, attachments)?;
    }
    Ok(())
}

fn start_parameter(content_type: &str) -> Option<String> {
    content_type.split(';').find_map(|param| {
        let (key, value) = param.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("start")
            .then(|| strip_id(value.trim().trim_matches('"')))
    })
}

fn part_content_id(headers: &[mail_parser::Header<'_>]) -> Option<String> {
    headers
        .iter()
        .find(|h| h.name.as_str().eq_ignore_ascii_case("content-id"))
        .and_then(|h| match &h.value {
            HeaderValue::Text(t) => Some(strip_id(t)),
            HeaderValue::TextList(list) => list.first().map(|t| strip_id(t)),
            _ => None,
        })
}

fn part_is_xop(headers: &[mail_parser::Header<'_>]) -> bool {
    headers.iter().any(|h| match &h.value {
        HeaderValue::ContentType(ct) => {
            ct.c_type.eq_ignore_ascii_case("application")
                && ct
                    .c_subtype
                    .as_deref()
                    .is_some_and(|s| s.eq_ignore_ascii_case("xop+xml"))
        }
        _ => false,
    })
}

fn strip_id(id: &str) -> String {
    id.trim()
        .trim_start_matches('<')
        .trim_end_matches('>')
        .to_string()
}

fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%'
            && i + 2 < bytes.len()
            && let Some(byte) = std::str::from_utf8(&bytes[i + 1..i + 3])
                .ok()
                .and_then(|hex| u8::from_str_radix(hex, 16).ok())
        {
            out.push(byte);
            i += 3;
            continue;
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
