use public_label_indexer::extract::{extract_label, OutputScript, ScriptKind};

fn asm(payload: &str) -> String {
    format!("OP_RETURN 1 {payload}")
}

#[test]
fn ascii_labels_survive_hex_roundtrip() {
    for s in ["hello", "Bitcoin Voice", "a", "with  double  spaces", "#tag:42!"] {
        assert_eq!(extract_label(&asm(&hex::encode(s))).as_deref(), Some(s));
    }
}

#[test]
fn nul_padding_is_stripped() {
    let mut padded = b"vote".to_vec();
    padded.resize(20, 0);
    assert_eq!(extract_label(&asm(&hex::encode(&padded))).as_deref(), Some("vote"));

    // All padding leaves nothing.
    assert_eq!(extract_label(&asm(&hex::encode([0u8; 8]))), None);
}

#[test]
fn utf8_payloads_decode() {
    assert_eq!(extract_label(&asm(&hex::encode("café ✓"))).as_deref(), Some("café ✓"));
}

#[test]
fn malformed_payloads_are_dropped() {
    assert_eq!(extract_label(&asm("zzzz")), None, "not hex");
    assert_eq!(extract_label(&asm("abc")), None, "odd length");
    assert_eq!(extract_label(&asm("fffe")), None, "not utf-8");
}

#[test]
fn unmatched_scripts_yield_nothing() {
    assert_eq!(extract_label(""), None);
    assert_eq!(extract_label("OP_DUP OP_HASH160 00 OP_EQUALVERIFY OP_CHECKSIG"), None);
    assert_eq!(extract_label("OP_RETURN"), None);
    assert_eq!(extract_label("OP_RETURN 1"), None, "format field but no payload");
}

#[test]
fn marker_may_follow_other_fields() {
    let s = format!("OP_NOP OP_RETURN 0 {}", hex::encode("late"));
    assert_eq!(extract_label(&s).as_deref(), Some("late"));
}

#[test]
fn only_label_scripts_are_extracted() {
    let payload = asm(&hex::encode("hi"));

    let label = OutputScript::new("publiclabel", payload.clone());
    assert_eq!(label.kind, ScriptKind::PublicLabel);
    assert_eq!(label.label().as_deref(), Some("hi"));

    let other = OutputScript::new("nulldata", payload);
    assert_eq!(other.kind, ScriptKind::Other("nulldata".into()));
    assert_eq!(other.label(), None);
}
