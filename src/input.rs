// src/input.rs

//! Input blocks embedded in source files.
//!
//! A source file may contain any number of blocks like
//!
//! ```text
//! /*input
//! 3 4
//! */
//! /*output
//! 7
//! */
//! ```
//!
//! Each block's input text is fed to the program's stdin on a separate run;
//! the optional output section is the expected output for that run.

use std::fmt;

use crate::types::LineEnding;
use crate::verify::ExpectedOutput;

/// Lines spanned by a block, 0-based, end exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockLocation {
    pub start_line: usize,
    pub end_line: usize,
}

/// One run's worth of stdin plus its optional expected output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputBlock {
    pub location: Option<BlockLocation>,
    pub input: String,
    pub expected: ExpectedOutput,
}

impl InputBlock {
    pub fn new(location: Option<BlockLocation>, input: impl Into<String>, expected: ExpectedOutput) -> Self {
        Self {
            location,
            input: input.into(),
            expected,
        }
    }

    /// Stable identity, sortable by position in the file.
    pub fn id(&self) -> String {
        match self.location {
            None => "null".to_string(),
            Some(loc) => format!("{:010}:{:010}:{}:0", loc.start_line, 0, loc.end_line),
        }
    }

    pub fn label(&self) -> String {
        match self.location {
            None => "Without input".to_string(),
            Some(loc) => format!("Input on line {}", loc.start_line + 1),
        }
    }
}

impl fmt::Display for InputBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Marker strings delimiting input (and optionally expected output) blocks.
///
/// Markers containing `\r\n` are taken to be written for CRLF documents, all
/// others for LF documents; they are adapted to the document's line ending
/// before searching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockMarkers {
    pub input_begin: String,
    pub input_end: String,
    pub output: Option<(String, String)>,
}

impl BlockMarkers {
    fn written_for(&self) -> LineEnding {
        if self.input_begin.contains("\r\n") || self.input_end.contains("\r\n") {
            LineEnding::CrLf
        } else {
            LineEnding::Lf
        }
    }

    fn adapted(&self, doc: LineEnding) -> BlockMarkers {
        let from = self.written_for().as_str();
        let to = doc.as_str();
        let adapt = |s: &str| if from == to { s.to_string() } else { s.replace(from, to) };
        BlockMarkers {
            input_begin: adapt(&self.input_begin),
            input_end: adapt(&self.input_end),
            output: self
                .output
                .as_ref()
                .map(|(begin, end)| (adapt(begin), adapt(end))),
        }
    }
}

/// Extract all complete input blocks from `text`, in order.
///
/// Blocks without an end marker are skipped. An output section is looked up
/// after the block's begin marker; a missing output end marker takes the
/// rest of the block.
pub fn extract_blocks(text: &str, markers: &BlockMarkers) -> Vec<InputBlock> {
    if markers.input_begin.is_empty() || markers.input_end.is_empty() {
        return Vec::new();
    }

    let eol = LineEnding::detect(text);
    let m = markers.adapted(eol);
    let eol = eol.as_str();

    let mut pieces = text.split(m.input_begin.as_str());
    let mut line = pieces.next().map_or(0, |head| head.matches(eol).count());
    let begin_lines = m.input_begin.matches(eol).count();

    let mut blocks = Vec::new();
    for piece in pieces {
        let start_line = line;
        line += begin_lines + piece.matches(eol).count();

        let Some((input, _)) = piece.split_once(m.input_end.as_str()) else {
            continue;
        };

        let expected = m
            .output
            .as_ref()
            .and_then(|(begin, end)| piece.split_once(begin.as_str()).map(|(_, rest)| (rest, end)))
            .map(|(rest, end)| rest.split(end.as_str()).next().unwrap_or(rest));

        blocks.push(InputBlock::new(
            Some(BlockLocation {
                start_line,
                end_line: line,
            }),
            input,
            ExpectedOutput::from_option(expected),
        ));
    }
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn markers(with_output: bool) -> BlockMarkers {
        BlockMarkers {
            input_begin: "/*input\n".to_string(),
            input_end: "*/".to_string(),
            output: with_output.then(|| ("/*output\n".to_string(), "*/".to_string())),
        }
    }

    const SOURCE: &str = "int main() {}\n/*input\n1 2\n*/\n/*output\n3\n*/\n\n/*input\n5\n*/\n";

    #[test]
    fn extracts_blocks_with_locations() {
        let blocks = extract_blocks(SOURCE, &markers(false));
        assert_eq!(blocks.len(), 2);

        assert_eq!(blocks[0].input, "1 2\n");
        assert_eq!(blocks[0].expected, ExpectedOutput::None);
        assert_eq!(
            blocks[0].location,
            Some(BlockLocation {
                start_line: 1,
                end_line: 8
            })
        );
        assert_eq!(blocks[1].input, "5\n");
        assert_eq!(blocks[1].location.unwrap().start_line, 8);
        assert_eq!(blocks[1].label(), "Input on line 9");
    }

    #[test]
    fn extracts_expected_output() {
        let blocks = extract_blocks(SOURCE, &markers(true));
        assert_eq!(blocks[0].expected, ExpectedOutput::Expected("3\n".to_string()));
        assert_eq!(blocks[1].expected, ExpectedOutput::None);
    }

    #[test]
    fn empty_output_section_is_no_expectation() {
        let text = "/*input\n1\n*/\n/*output\n*/\n/*input\n2\n*/\n/*output\n \n*/\n";
        let blocks = extract_blocks(text, &markers(true));
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].expected, ExpectedOutput::None);
        assert!(blocks[0].expected.matcher().is_none());
        assert_eq!(blocks[1].expected, ExpectedOutput::Expected(" \n".to_string()));
    }

    #[test]
    fn skips_unterminated_block() {
        let text = "/*input\n1\n*/\n/*input\nnever closed";
        let blocks = extract_blocks(text, &markers(false));
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].input, "1\n");
    }

    #[test]
    fn lf_markers_match_crlf_documents() {
        let text = "x\r\n/*input\r\n7\r\n*/\r\n/*output\r\n7\r\n*/\r\n";
        let blocks = extract_blocks(text, &markers(true));
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].input, "7\r\n");
        assert_eq!(blocks[0].expected, ExpectedOutput::Expected("7\r\n".to_string()));
        assert_eq!(blocks[0].location.unwrap().start_line, 1);
    }

    #[test]
    fn ids_sort_by_position() {
        let blocks = extract_blocks(SOURCE, &markers(false));
        assert!(blocks[0].id() < blocks[1].id());
        let anon = InputBlock::new(None, "", ExpectedOutput::None);
        assert_eq!(anon.id(), "null");
        assert_eq!(anon.label(), "Without input");
    }

    #[test]
    fn no_blocks_without_begin_marker() {
        assert!(extract_blocks("plain source\n", &markers(true)).is_empty());
    }
}
