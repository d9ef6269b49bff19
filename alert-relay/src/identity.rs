/// Raw keys at least this long are treated as globally unique already.
pub const DEFAULT_UNIQUE_KEY_LEN: usize = 8;

/// Derives the physical identity of a bulletin. Feeds expose differently
/// truncated keys for the same bulletin; short keys are widened with the
/// month and day of the release time so every source agrees on one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentityRule {
    unique_key_len: usize,
}

impl IdentityRule {
    pub fn new(unique_key_len: usize) -> Self {
        Self { unique_key_len }
    }

    pub fn page_key(&self, release_time: &str, raw_key: &str) -> String {
        if raw_key.chars().count() >= self.unique_key_len {
            return raw_key.to_string();
        }

        // Digits 5..8 of the timestamp, i.e. MMDD after the year.
        let fragment: String = release_time
            .chars()
            .filter(|c| c.is_ascii_digit())
            .skip(4)
            .take(4)
            .collect();

        format!("{fragment}{raw_key}")
    }
}

impl Default for IdentityRule {
    fn default() -> Self {
        Self::new(DEFAULT_UNIQUE_KEY_LEN)
    }
}
