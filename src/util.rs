use crate::types::Millis;
use std::time::{SystemTime, UNIX_EPOCH};
use unicode_width::UnicodeWidthChar;

pub fn now_millis() -> Millis {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as Millis)
        .unwrap_or(0)
}

pub fn char_display_width(ch: char) -> usize {
    UnicodeWidthChar::width(ch).unwrap_or(0)
}

pub fn display_width(text: &str) -> usize {
    text.chars().map(char_display_width).sum()
}

pub fn truncate_to_display_width(text: &str, max_width: usize) -> String {
    let mut out = String::new();
    let mut used = 0usize;
    for ch in text.chars() {
        let ch_width = char_display_width(ch);
        if used + ch_width > max_width && used > 0 {
            break;
        }
        out.push(ch);
        used += ch_width;
    }
    out
}

/// Human duration for block footers: `850ms`, `2.4s`, `3m05s`. Rounds before
/// choosing a unit, so 59.95s reads `1m00s`.
pub fn format_duration_ms(ms: u64) -> String {
    if ms < 1_000 {
        return format!("{ms}ms");
    }
    let tenths = (ms + 50) / 100;
    if tenths < 600 {
        return format!("{}.{}s", tenths / 10, tenths % 10);
    }
    let secs = (ms + 500) / 1_000;
    format!("{}m{:02}s", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_respects_wide_characters() {
        assert_eq!(truncate_to_display_width("abcdef", 3), "abc");
        assert_eq!(truncate_to_display_width("日本語", 4), "日本");
        assert_eq!(display_width("日本"), 4);
    }

    #[test]
    fn test_format_duration_ms() {
        assert_eq!(format_duration_ms(850), "850ms");
        assert_eq!(format_duration_ms(2_400), "2.4s");
        assert_eq!(format_duration_ms(185_000), "3m05s");
        assert_eq!(format_duration_ms(1_000), "1.0s");
        assert_eq!(format_duration_ms(59_949), "59.9s");
        assert_eq!(format_duration_ms(59_950), "1m00s");
        assert_eq!(format_duration_ms(119_600), "2m00s");
    }

    #[test]
    fn test_now_millis_is_after_2020() {
        assert!(now_millis() > 1_577_836_800_000);
    }
}
