// src/encoding.rs

use encoding_rs::{Encoding, UTF_16LE, WINDOWS_1252};
use regex::Regex;
use serde::Serialize;
use std::borrow::Cow;
use std::sync::LazyLock;
use tracing::{debug, warn};

/// How far into the payload we look for an XML declaration.
const DECLARATION_SCAN_BYTES: usize = 200;

/// Charset detection results at or below this confidence are ignored.
const MIN_DETECTION_CONFIDENCE: f32 = 0.7;

/// Encodings probed in order once the declaration and detector gave nothing.
const PROBE_ORDER: [&str; 7] = [
    "utf-8",
    "latin-1",
    "iso-8859-1",
    "windows-1252",
    "cp1252",
    "utf-16",
    "utf-32",
];

static DECLARED_ENCODING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"encoding=["']([^"']+)["']"#).expect("valid declared encoding pattern")
});

static DECLARATION_ENCODING_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(<\?xml[^>]+encoding=)["'][^"']+["']"#).expect("valid declaration pattern")
});

/// An uploaded document, either still raw or already decoded by the caller.
#[derive(Debug, Clone)]
pub enum RawDocument {
    Text(String),
    Bytes(Vec<u8>),
}

impl From<String> for RawDocument {
    fn from(text: String) -> Self {
        RawDocument::Text(text)
    }
}

impl From<&str> for RawDocument {
    fn from(text: &str) -> Self {
        RawDocument::Text(text.to_string())
    }
}

impl From<Vec<u8>> for RawDocument {
    fn from(bytes: Vec<u8>) -> Self {
        RawDocument::Bytes(bytes)
    }
}

impl From<&[u8]> for RawDocument {
    fn from(bytes: &[u8]) -> Self {
        RawDocument::Bytes(bytes.to_vec())
    }
}

/// Which step of the resolver produced the text.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    AlreadyText,
    Declared,
    Detected { confidence: f32 },
    Probed,
    /// Last resort: lossy latin-1, low confidence.
    Forced,
}

#[derive(Debug, Clone)]
pub struct Decoded {
    pub text: String,
    pub encoding: String,
    pub strategy: Strategy,
}

/// Turn a raw document into text. Never fails.
pub fn resolve(input: RawDocument) -> Decoded {
    match input {
        RawDocument::Text(text) => Decoded {
            text,
            encoding: "already_string".to_string(),
            strategy: Strategy::AlreadyText,
        },
        RawDocument::Bytes(bytes) => decode_best_effort(&bytes),
    }
}

/// Decode bytes using, in order: the XML declaration, statistical
/// detection, a fixed probe list, and finally a forced latin-1 decode.
pub fn decode_best_effort(bytes: &[u8]) -> Decoded {
    if let Some(label) = declared_encoding(bytes) {
        match decode_strict(bytes, &label) {
            Some(text) => {
                return Decoded {
                    text,
                    encoding: label,
                    strategy: Strategy::Declared,
                };
            }
            None => debug!(encoding = %label, "Declared encoding does not decode the payload"),
        }
    }

    let (charset, confidence, _language) = chardet::detect(bytes);
    if confidence > MIN_DETECTION_CONFIDENCE {
        let label = charset.to_lowercase();
        if let Some(text) = decode_strict(bytes, &label) {
            return Decoded {
                text,
                encoding: label,
                strategy: Strategy::Detected { confidence },
            };
        }
        debug!(charset = %label, confidence, "Detected charset does not decode the payload");
    }

    for label in PROBE_ORDER {
        let Some(text) = decode_strict(bytes, label) else {
            continue;
        };
        if text.contains("<?xml") || text.contains("<Envelope") {
            return Decoded {
                text,
                encoding: label.to_string(),
                strategy: Strategy::Probed,
            };
        }
    }

    warn!(bytes = bytes.len(), "No encoding matched — forcing latin-1");
    // no BOM sniffing here: a stray FF FE must not turn this into UTF-16
    let (text, _) = WINDOWS_1252.decode_without_bom_handling(bytes);
    Decoded {
        text: text.into_owned(),
        encoding: "latin-1_forced".to_string(),
        strategy: Strategy::Forced,
    }
}

/// Point the XML declaration at UTF-8, adding one if the text has none.
pub fn ensure_utf8_declaration(xml: &str) -> String {
    let xml = xml.strip_prefix('\u{feff}').unwrap_or(xml);
    let rewritten = DECLARATION_ENCODING_ATTR.replace(xml, r#"${1}"UTF-8""#);
    if rewritten.starts_with("<?xml") {
        rewritten.into_owned()
    } else {
        format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{rewritten}")
    }
}

/// Whether a resolved label already means UTF-8 output needs no rewrite.
pub fn is_utf8_label(label: &str) -> bool {
    matches!(label, "utf-8" | "utf8" | "ascii" | "already_string")
}

fn declared_encoding(bytes: &[u8]) -> Option<String> {
    let head: String = bytes
        .iter()
        .take(DECLARATION_SCAN_BYTES)
        .filter(|b| b.is_ascii())
        .map(|&b| b as char)
        .collect();
    let cap = DECLARED_ENCODING.captures(&head)?;
    Some(normalize_label(&cap[1]))
}

fn normalize_label(label: &str) -> String {
    let label = label.to_lowercase();
    match label.as_str() {
        "utf8" => "utf-8".to_string(),
        "latin1" | "iso-8859-1" | "iso8859-1" => "latin-1".to_string(),
        "windows-1252" | "cp-1252" => "cp1252".to_string(),
        _ => label,
    }
}

/// Decode without replacement characters; `None` on any malformed sequence.
fn decode_strict(bytes: &[u8], label: &str) -> Option<String> {
    match label {
        "latin-1" => decode_with(WINDOWS_1252, bytes),
        "utf-16" => {
            let (encoding, bom_len) = Encoding::for_bom(bytes)
                .filter(|(enc, _)| enc.name().starts_with("UTF-16"))
                .unwrap_or((UTF_16LE, 0));
            decode_with(encoding, &bytes[bom_len..])
        }
        "utf-32" => decode_utf32(bytes),
        other => decode_with(Encoding::for_label(other.as_bytes())?, bytes),
    }
}

fn decode_with(encoding: &'static Encoding, bytes: &[u8]) -> Option<String> {
    encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(Cow::into_owned)
}

fn decode_utf32(bytes: &[u8]) -> Option<String> {
    if bytes.len() % 4 != 0 {
        return None;
    }
    let (big_endian, body) = match bytes {
        [0xFF, 0xFE, 0x00, 0x00, rest @ ..] => (false, rest),
        [0x00, 0x00, 0xFE, 0xFF, rest @ ..] => (true, rest),
        _ => (false, bytes),
    };
    body.chunks_exact(4)
        .map(|chunk| {
            let unit = [chunk[0], chunk[1], chunk[2], chunk[3]];
            let code = if big_endian {
                u32::from_be_bytes(unit)
            } else {
                u32::from_le_bytes(unit)
            };
            char::from_u32(code)
        })
        .collect()
}
