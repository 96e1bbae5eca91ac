//! Reply formatting within Discord's size limits.

/// Longest message body Discord accepts.
pub const MAX_MESSAGE_LEN: usize = 2000;

/// Longest autocomplete choice name Discord accepts.
pub const MAX_CHOICE_NAME_LEN: usize = 100;

/// Cuts `text` to at most `max` characters, ending in an ellipsis when cut.
#[must_use]
pub fn clip(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut clipped: String = text.chars().take(max.saturating_sub(1)).collect();
    clipped.push('…');
    clipped
}

/// Builds a message from a header and lines, stopping before `max` characters.
///
/// Lines that do not fit are summarized as "…and N more". Each line is clipped
/// so a single long line cannot crowd out the rest.
#[must_use]
pub fn bounded_list<I>(header: &str, lines: I, max: usize) -> String
where
    I: IntoIterator<Item = String>,
{
    const TRAILER_RESERVE: usize = 24;

    let budget = max.saturating_sub(TRAILER_RESERVE);
    let line_max = budget / 4;
    let mut out = clip(header, budget);
    let mut used = out.chars().count();
    let mut hidden = 0_usize;

    for line in lines {
        if hidden > 0 {
            hidden += 1;
            continue;
        }
        let line = clip(&line, line_max);
        let cost = line.chars().count() + 1;
        if used + cost > budget {
            hidden = 1;
            continue;
        }
        out.push_str(&line);
        out.push('\n');
        used += cost;
    }

    if hidden > 0 {
        out.push_str(&format!("…and {hidden} more"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip() {
        assert_eq!(clip("short", 10), "short");
        assert_eq!(clip("exactly10!", 10), "exactly10!");
        let clipped = clip("ünïcödé text that goes on", 8);
        assert_eq!(clipped.chars().count(), 8);
        assert!(clipped.ends_with('…'));
    }

    #[test]
    fn test_bounded_list_fits_discord_limit() {
        let lines = (0..500).map(|i| format!("#{i} Offer with a reasonably long title - 3h, Pending"));
        let message = bounded_list("**Your offers**\n", lines, MAX_MESSAGE_LEN);

        assert!(message.chars().count() <= MAX_MESSAGE_LEN);
        assert!(message.starts_with("**Your offers**\n#0 "));
        assert!(message.ends_with(" more"));
    }

    #[test]
    fn test_bounded_list_keeps_short_lists_whole() {
        let lines = vec!["#1 a".to_string(), "#2 b".to_string()];
        let message = bounded_list("Header\n", lines, MAX_MESSAGE_LEN);
        assert_eq!(message, "Header\n#1 a\n#2 b\n");
    }

    #[test]
    fn test_bounded_list_clips_a_huge_line() {
        let lines = vec!["x".repeat(5000), "#2 b".to_string()];
        let message = bounded_list("", lines, MAX_MESSAGE_LEN);
        assert!(message.chars().count() <= MAX_MESSAGE_LEN);
        assert!(message.contains("#2 b"));
    }
}
