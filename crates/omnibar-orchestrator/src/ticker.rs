//! The ticker rotator: a finite cyclic sequence of ambient content tags
//! shown when no interrupt is active.

/// Cyclic rotation over a fixed list of content tags.
#[derive(Debug, Clone)]
pub struct TickerRotator {
    tags: Vec<String>,
    cursor: usize,
}

impl TickerRotator {
    /// Construct a rotator over `tags`, starting at the first tag.
    #[must_use]
    pub fn new(tags: Vec<String>) -> Self {
        Self { tags, cursor: 0 }
    }

    /// Whether the rotation has no tags to show.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Tag at the current cursor position, if any.
    #[must_use]
    pub fn current(&self) -> Option<&str> {
        self.tags.get(self.cursor).map(String::as_str)
    }

    /// Current cursor index, exposed for observability.
    #[must_use]
    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    /// Advance the cursor to the next tag, wrapping around.
    pub fn advance(&mut self) {
        if self.tags.is_empty() {
            return;
        }
        self.cursor = (self.cursor + 1) % self.tags.len();
    }

    /// Replace the tag list, resetting the cursor to the start.
    pub fn set_tags(&mut self, tags: Vec<String>) {
        self.tags = tags;
        self.cursor = 0;
    }
}
