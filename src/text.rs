use crate::layout::is_cjk;

/// Cleans translated text before layout: full-width periods and ellipses become
/// ASCII periods, spaced dots (`. .`) are pulled together, and any run of three
/// or more periods collapses to `...`.
pub fn normalize_translation(text: &str) -> String {
    let ascii: String = text
        .chars()
        .map(|ch| match ch {
            '．' | '…' => '.',
            other => other,
        })
        .collect();
    collapse_period_runs(&join_spaced_periods(&ascii))
}

fn join_spaced_periods(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut idx = 0;
    while idx < chars.len() {
        let ch = chars[idx];
        out.push(ch);
        idx += 1;
        if ch != '.' {
            continue;
        }
        let mut look = idx;
        while look < chars.len() && chars[look].is_whitespace() {
            look += 1;
        }
        if look > idx && look < chars.len() && chars[look] == '.' {
            idx = look;
        }
    }
    out
}

fn collapse_period_runs(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut run = 0usize;
    for ch in text.chars() {
        if ch == '.' {
            run += 1;
            continue;
        }
        flush_periods(&mut out, run);
        run = 0;
        out.push(ch);
    }
    flush_periods(&mut out, run);
    out
}

fn flush_periods(out: &mut String, run: usize) {
    let count = if run >= 3 { 3 } else { run };
    out.extend(std::iter::repeat_n('.', count));
}

/// Joins two OCR fragments, inserting a space between words and after
/// trailing punctuation. CJK fragments are joined directly.
pub fn join_inline(left: &str, right: &str) -> String {
    if needs_space(left, right) {
        format!("{} {}", left.trim_end(), right.trim_start())
    } else {
        format!("{}{}", left.trim_end(), right.trim_start())
    }
}

pub(crate) fn needs_space(left: &str, right: &str) -> bool {
    let last = left.chars().rev().find(|ch| !ch.is_whitespace());
    let first = right.chars().find(|ch| !ch.is_whitespace());
    match (last, first) {
        (Some(a), Some(b)) => {
            if is_cjk(a) || is_cjk(b) {
                return false;
            }
            let after_punct = matches!(a, ',' | '.' | '!' | '?' | ';' | ':')
                && b.is_ascii_alphanumeric()
                // keep "3." + "5" as a decimal
                && !(matches!(a, '.' | ',') && b.is_ascii_digit());
            after_punct
                || (a.is_ascii_alphanumeric() && b.is_ascii_alphanumeric())
                || (a.is_alphabetic() && b.is_alphabetic())
        }
        _ => false,
    }
}

pub(crate) fn contains_cjk(text: &str) -> bool {
    text.chars().any(is_cjk)
}

/// Short preview for log lines.
pub(crate) fn preview(text: &str, max_chars: usize) -> String {
    let mut out: String = text.chars().take(max_chars).collect();
    if text.chars().count() > max_chars {
        out.push_str("...");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_width_punctuation_becomes_ascii() {
        assert_eq!(normalize_translation("Wait．"), "Wait.");
        assert_eq!(normalize_translation("Well…"), "Well.");
        assert_eq!(normalize_translation("Well……"), "Well..");
    }

    #[test]
    fn spaced_periods_are_joined() {
        assert_eq!(normalize_translation("Huh. . ."), "Huh...");
        assert_eq!(normalize_translation("Yes. No."), "Yes. No.");
    }

    #[test]
    fn long_period_runs_collapse() {
        assert_eq!(normalize_translation("Hmm......"), "Hmm...");
        assert_eq!(normalize_translation("....what"), "...what");
        assert_eq!(normalize_translation("ok.."), "ok..");
    }

    #[test]
    fn join_inline_spaces_words_and_punctuation() {
        assert_eq!(join_inline("hello ", " world"), "hello world");
        assert_eq!(join_inline("おはよう", "ございます"), "おはようございます");
        assert_eq!(join_inline("wait,", "what"), "wait, what");
        assert_eq!(join_inline("Run!", " Now"), "Run! Now");
        assert_eq!(join_inline("3.", "5"), "3.5");
        assert_eq!(join_inline("まって、", "ください"), "まって、ください");
    }

    #[test]
    fn preview_truncates_long_text() {
        assert_eq!(preview("abcdef", 3), "abc...");
        assert_eq!(preview("abc", 3), "abc");
    }
}
