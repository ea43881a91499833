// src/verify/mod.rs

//! Streaming verification of program output.
//!
//! - [`ExpectedOutput`] says whether a run declared an expected output at all.
//! - [`matcher::TokenMatcher`] compares arbitrarily chunked output against the
//!   expected whitespace-separated tokens while the process is still running.

pub mod matcher;

pub use matcher::TokenMatcher;

/// Expected output attached to a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpectedOutput {
    /// No expectation declared; output is shown but never judged.
    None,
    /// Expected program output, compared token by token.
    Expected(String),
}

impl ExpectedOutput {
    /// An empty output section declares nothing.
    pub fn from_option(text: Option<&str>) -> Self {
        match text {
            Some(t) if !t.is_empty() => ExpectedOutput::Expected(t.to_string()),
            _ => ExpectedOutput::None,
        }
    }

    /// Build a matcher for this expectation, if there is one.
    pub fn matcher(&self) -> Option<TokenMatcher> {
        match self {
            ExpectedOutput::None => None,
            ExpectedOutput::Expected(text) => Some(TokenMatcher::new(text)),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ExpectedOutput::None => None,
            ExpectedOutput::Expected(text) => Some(text),
        }
    }
}

/// Verdict on a run's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputCheck {
    /// Nothing to compare against.
    Unchecked,
    Matched,
    Mismatched,
}

impl OutputCheck {
    pub fn from_verdict(matched: bool) -> Self {
        if matched {
            OutputCheck::Matched
        } else {
            OutputCheck::Mismatched
        }
    }

    /// `Some(true/false)` when output was compared, `None` otherwise.
    pub fn as_option(self) -> Option<bool> {
        match self {
            OutputCheck::Unchecked => None,
            OutputCheck::Matched => Some(true),
            OutputCheck::Mismatched => Some(false),
        }
    }
}
