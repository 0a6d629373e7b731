//! Label payload extraction from disassembled output scripts.
//!
//! A public label script disassembles as `OP_RETURN <format> <hex payload>`.
//! The format field is ignored; the payload is hex-encoded UTF-8, possibly
//! NUL-padded to a fixed width.

const MARKER: &str = "OP_RETURN";

/// Node type tag for label-carrying outputs.
pub const PUBLIC_LABEL_TAG: &str = "publiclabel";

/// Output script variants the indexer distinguishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptKind {
    /// Carries an embedded label; its value lives in the next output.
    PublicLabel,
    /// Anything else, keeping the node's type tag.
    Other(String),
}

impl ScriptKind {
    /// Map a node `scriptPubKey.type` tag onto a kind.
    pub fn from_type_tag(tag: &str) -> Self {
        if tag == PUBLIC_LABEL_TAG {
            Self::PublicLabel
        } else {
            Self::Other(tag.to_owned())
        }
    }
}

/// An output's script as reported by the node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputScript {
    /// Classified type tag.
    pub kind: ScriptKind,
    /// Disassembled form (`asm`).
    pub asm: String,
}

impl OutputScript {
    /// Build from the node's type tag and disassembly.
    pub fn new(type_tag: &str, asm: impl Into<String>) -> Self {
        Self {
            kind: ScriptKind::from_type_tag(type_tag),
            asm: asm.into(),
        }
    }

    /// The embedded label, if this is a label output with a readable payload.
    pub fn label(&self) -> Option<String> {
        match self.kind {
            ScriptKind::PublicLabel => extract_label(&self.asm),
            ScriptKind::Other(_) => None,
        }
    }
}

/// Pull the label text out of a disassembled script.
///
/// Returns `None` when the marker is missing, either field after it is missing,
/// the payload is not hex, the bytes are not UTF-8, or nothing is left once NUL
/// padding is removed. Malformed payloads are dropped, never reported.
pub fn extract_label(asm: &str) -> Option<String> {
    let mut fields = asm.split_whitespace().skip_while(|f| *f != MARKER);
    fields.next()?; // marker
    fields.next()?; // format/version
    let payload = fields.next()?;

    let bytes = hex::decode(payload).ok()?;
    let text = String::from_utf8(bytes).ok()?;
    let text = text.replace('\0', "");

    (!text.is_empty()).then_some(text)
}
