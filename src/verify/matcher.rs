// src/verify/matcher.rs

//! Incremental token matcher.
//!
//! Output and expectation are compared as sequences of whitespace-separated
//! tokens: token content and order must match exactly, the amount and kind of
//! whitespace between tokens does not matter.
//!
//! Output arrives in chunks split at arbitrary points, so the last token of a
//! chunk may be the first half of a longer token. Such a token is carried
//! over to the next call as long as it is a prefix of the next expected
//! token and the chunk did not end in whitespace.

use tracing::debug;

#[derive(Debug, Clone)]
pub struct TokenMatcher {
    expected: Vec<String>,
    cursor: usize,
    carry: String,
    alive: bool,
}

impl TokenMatcher {
    pub fn new(expected: &str) -> Self {
        Self {
            expected: tokenize(expected).map(str::to_string).collect(),
            cursor: 0,
            carry: String::new(),
            alive: true,
        }
    }

    /// Consume the next chunk of output.
    ///
    /// Returns `false` once any mismatch has been seen; after that every call
    /// is a no-op returning `false`.
    pub fn feed(&mut self, chunk: &str) -> bool {
        if !self.alive {
            return false;
        }

        let mut combined = std::mem::take(&mut self.carry);
        combined.push_str(chunk);

        let tokens: Vec<&str> = tokenize(&combined).collect();
        let Some((last, complete)) = tokens.split_last() else {
            return true;
        };

        for token in complete {
            if self.expected.get(self.cursor).map(String::as_str) != Some(*token) {
                return self.fail(token);
            }
            self.cursor += 1;
        }

        let Some(next) = self.expected.get(self.cursor) else {
            return self.fail(last);
        };

        if ends_with_whitespace(chunk) {
            if next.as_str() != *last {
                return self.fail(last);
            }
            self.cursor += 1;
        } else if next.starts_with(*last) {
            // Possibly still streaming; settled by the next chunk or `finish`.
            self.carry = (*last).to_string();
        } else {
            return self.fail(last);
        }

        true
    }

    /// Resolve any carried token and report the final verdict.
    ///
    /// Succeeds only if no mismatch happened and every expected token was
    /// seen.
    pub fn finish(&mut self) -> bool {
        self.feed("\n");
        if self.cursor < self.expected.len() {
            if self.alive {
                debug!(
                    matched = self.cursor,
                    expected = self.expected.len(),
                    "output ended before all expected tokens were seen"
                );
            }
            self.alive = false;
        }
        self.alive
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Number of expected tokens matched so far.
    pub fn position(&self) -> usize {
        self.cursor
    }

    fn fail(&mut self, token: &str) -> bool {
        debug!(
            position = self.cursor,
            expected = self.expected.get(self.cursor).map(String::as_str).unwrap_or("<end>"),
            actual = token,
            "output mismatch"
        );
        self.alive = false;
        self.carry.clear();
        false
    }
}

fn tokenize(s: &str) -> impl Iterator<Item = &str> {
    s.split_whitespace()
}

fn ends_with_whitespace(s: &str) -> bool {
    s.chars().next_back().is_some_and(char::is_whitespace)
}
