use blockterm::ansi::{parse, strip, PLAIN_TOKEN};
use blockterm::buffer::OutputBuffer;
use proptest::prelude::*;

fn fragment() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z ]{0,6}",
        Just("é✓".to_string()),
        Just("\x1b[".to_string()),
        Just("\x1b[1;31m".to_string()),
        Just("\x1b[0m".to_string()),
        Just("\x1b[m".to_string()),
        Just("\x1b[2J".to_string()),
        Just("\x1b]0;title\x07".to_string()),
        Just("\x1b]8;;http://x\x1b\\".to_string()),
        Just("\x1b".to_string()),
        Just("38;5;2m".to_string()),
        Just("\x07".to_string()),
    ]
}

fn noisy_text() -> impl Strategy<Value = String> {
    prop::collection::vec(fragment(), 0..12).prop_map(|parts| parts.concat())
}

proptest! {
    #[test]
    fn strip_matches_concatenated_span_text(text in noisy_text()) {
        let joined: String = parse(&text).into_iter().map(|span| span.text).collect();
        prop_assert_eq!(strip(&text), joined);
    }

    #[test]
    fn stripped_text_has_no_escape_bytes(text in noisy_text()) {
        let stripped = strip(&text);
        prop_assert!(!stripped.contains('\x1b'));
        prop_assert!(!stripped.contains('\x07'));
    }

    #[test]
    fn parse_never_returns_empty_or_blank_runs(text in noisy_text()) {
        let spans = parse(&text);
        prop_assert!(!spans.is_empty());
        if spans.len() > 1 {
            prop_assert!(spans.iter().all(|span| !span.text.is_empty()));
        }
    }

    #[test]
    fn buffer_append_is_split_independent(
        text in "[a-z\\n ]{0,40}",
        split in 0usize..41,
    ) {
        let split = split.min(text.len());
        let mut whole = OutputBuffer::new();
        whole.append_output(&text);

        let mut pieces = OutputBuffer::new();
        pieces.append_output(&text[..split]);
        pieces.append_output(&text[split..]);

        prop_assert_eq!(whole.all_text(), pieces.all_text());
        prop_assert_eq!(whole.line_count(), pieces.line_count());
        prop_assert_eq!(whole.bytes(), pieces.bytes());
    }
}

#[test]
fn plain_text_uses_sentinel_token() {
    let spans = parse("hello");
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].style_token, PLAIN_TOKEN);
}
