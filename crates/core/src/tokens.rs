//! Conservative pre-flight token estimation.
//!
//! Roughly four characters per token, always rounded up, plus a fixed
//! per-message overhead for role and JSON framing. The constants are
//! chosen so the estimate never undershoots what providers bill.

pub const CHARS_PER_TOKEN: usize = 4;
pub const PER_MESSAGE_OVERHEAD: u32 = 15;

pub fn estimate_text(text: &str) -> u32 {
    let chars = text.chars().count();
    chars.div_ceil(CHARS_PER_TOKEN) as u32
}

pub fn estimate_messages<I, S>(contents: I) -> u32
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    contents
        .into_iter()
        .map(|content| estimate_text(content.as_ref()) + PER_MESSAGE_OVERHEAD)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_up() {
        assert_eq!(estimate_text(""), 0);
        assert_eq!(estimate_text("abc"), 1);
        assert_eq!(estimate_text("abcd"), 1);
        assert_eq!(estimate_text("abcde"), 2);
    }

    #[test]
    fn counts_chars_not_bytes() {
        assert_eq!(estimate_text("äöüß"), 1);
    }

    #[test]
    fn per_message_overhead_applied() {
        let estimate = estimate_messages(["hello", "world!!!"]);
        assert_eq!(estimate, 2 + 15 + 2 + 15);
    }

    #[test]
    fn empty_conversation_estimates_zero() {
        assert_eq!(estimate_messages(Vec::<String>::new()), 0);
    }
}
