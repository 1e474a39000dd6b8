//! Utility functions and helpers

/// Name validation
///
/// Names are compared as exact byte strings everywhere; these checks only
/// decide which names may be claimed in the first place.
pub mod string {
    const NICK_SPECIALS: &str = "[]\\`_^{|}~";

    /// Check if a string is a valid channel name
    pub fn is_valid_channel_name(name: &str, max_length: usize) -> bool {
        if name.len() < 2 || name.len() > max_length || !name.starts_with('#') {
            return false;
        }

        // No separators, BEL or other control characters
        name.chars()
            .all(|c| !c.is_control() && c != ' ' && c != ',' && c != ':')
    }

    /// Check if a string is a valid nickname
    pub fn is_valid_nickname(nick: &str, max_length: usize) -> bool {
        if nick.is_empty() || nick.len() > max_length {
            return false;
        }

        let mut chars = nick.chars();

        // First character must be letter or special character
        match chars.next() {
            Some(first) if first.is_ascii_alphabetic() || NICK_SPECIALS.contains(first) => {}
            _ => return false,
        }

        // Remaining characters must be letter, digit, hyphen or special character
        chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || NICK_SPECIALS.contains(c))
    }

    /// Strip characters that would corrupt a `nick!user@host` prefix
    pub fn sanitize_username(username: &str, max_length: usize) -> String {
        username
            .chars()
            .filter(|c| c.is_ascii_graphic() && *c != '@' && *c != '!')
            .take(max_length)
            .collect()
    }

    /// Whether a message target names a channel
    pub fn is_channel_target(target: &str) -> bool {
        target.starts_with('#')
    }

    /// Match `text` against an IRC mask where `*` is any run and `?` any one character
    pub fn matches_mask(mask: &str, text: &str) -> bool {
        let pattern: Vec<char> = mask.chars().collect();
        let text: Vec<char> = text.chars().collect();

        let (mut p, mut t) = (0, 0);
        // Last `*` seen and the text position it currently absorbs up to
        let mut star: Option<(usize, usize)> = None;

        while t < text.len() {
            if p < pattern.len() && (pattern[p] == '?' || pattern[p] == text[t]) {
                p += 1;
                t += 1;
            } else if p < pattern.len() && pattern[p] == '*' {
                star = Some((p, t));
                p += 1;
            } else if let Some((star_p, star_t)) = star {
                p = star_p + 1;
                t = star_t + 1;
                star = Some((star_p, star_t + 1));
            } else {
                return false;
            }
        }

        pattern[p..].iter().all(|c| *c == '*')
    }

    /// Cut `text` to at most `max_bytes` without splitting a character
    pub fn truncate(text: &str, max_bytes: usize) -> &str {
        if text.len() <= max_bytes {
            return text;
        }
        let mut end = max_bytes;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        &text[..end]
    }
}
