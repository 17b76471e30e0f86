// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Extract code blocks from markdown documents.
//!
//! A fenced block is runnable when its info string names a script language
//! and carries the `runnable` token:
//! ````markdown
//! ```js runnable
//! console.log(1 + 1)
//! ```
//!
//! ```output
//! 2
//! ```
//! ````
//!
//! ## Annotation tokens
//!
//! - `runnable` - execute the block
//! - `expect-error` / `expect-error=TypeError` - the block must throw
//! - `isolated` (alias `fresh`) - run in a context of its own
//! - anything else is kept verbatim in [`Annotations::extra`]
//!
//! An `output` block that follows a runnable block, with only blank lines
//! in between, declares the lines that block must print.

use serde::Serialize;
use tracing::warn;

/// Raw input to a run: a path or title plus the document text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentSource {
    pub id: String,
    pub text: String,
}

impl DocumentSource {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// A parsed document: its segments in source order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub id: String,
    pub segments: Vec<Segment>,
}

impl Document {
    pub fn code_blocks(&self) -> impl Iterator<Item = &CodeBlock> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Code(block) => Some(block),
            Segment::Prose(_) => None,
        })
    }

    pub fn runnable_blocks(&self) -> impl Iterator<Item = &CodeBlock> {
        self.code_blocks().filter(|b| b.annotations.runnable)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Segment {
    Prose(String),
    Code(CodeBlock),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CodeBlock {
    pub source: String,
    /// Lowercased first word of the info string; empty when absent.
    pub language: String,
    pub annotations: Annotations,
    /// 1-based line of the opening fence
    pub start_line: usize,
    /// Lines declared by a following `output` block.
    pub expected_output: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Annotations {
    pub runnable: bool,
    pub expect_error: Option<ExpectError>,
    pub isolated: bool,
    pub extra: Vec<String>,
}

/// What an `expect-error` annotation asks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpectError {
    Any,
    Named(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize)]
#[error("{id}:{line}: unterminated code fence")]
pub struct ParseError {
    pub id: String,
    /// Line of the fence that was never closed.
    pub line: usize,
}

/// Splits documents into segments, treating the given language tags as
/// the script language.
#[derive(Debug, Clone)]
pub struct Extractor {
    language_tags: Vec<String>,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new(["js", "javascript"])
    }
}

struct Fence {
    indent: usize,
    marker: char,
    len: usize,
    info: String,
    line: usize,
}

impl Extractor {
    pub fn new<S: AsRef<str>>(tags: impl IntoIterator<Item = S>) -> Self {
        Self {
            language_tags: tags
                .into_iter()
                .map(|t| t.as_ref().to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn extract(&self, id: &str, text: &str) -> Result<Document, ParseError> {
        let mut segments = Vec::new();
        let mut prose: Vec<&str> = Vec::new();
        // Index of the last runnable block an `output` block may attach to.
        let mut pending: Option<usize> = None;
        let mut lines = text.lines().enumerate();

        while let Some((index, line)) = lines.next() {
            let Some(fence) = opening_fence(line, index + 1) else {
                prose.push(line);
                continue;
            };
            if prose.iter().any(|l| !l.trim().is_empty()) {
                pending = None;
            }
            flush_prose(&mut prose, &mut segments);

            let mut body = Vec::new();
            let mut closed = false;
            for (_, line) in lines.by_ref() {
                if is_closing(line, &fence) {
                    closed = true;
                    break;
                }
                body.push(strip_indent(line, fence.indent));
            }
            if !closed {
                return Err(ParseError {
                    id: id.to_string(),
                    line: fence.line,
                });
            }

            let block = self.code_block(id, &fence, body.join("\n"));
            if block.language == "output" {
                if let Some(index) = pending {
                    if let Some(Segment::Code(target)) = segments.get_mut(index) {
                        target.expected_output = Some(body.iter().map(|l| l.to_string()).collect());
                    }
                }
                pending = None;
            } else if block.annotations.runnable {
                pending = Some(segments.len());
            } else {
                pending = None;
            }
            segments.push(Segment::Code(block));
        }
        flush_prose(&mut prose, &mut segments);

        Ok(Document {
            id: id.to_string(),
            segments,
        })
    }

    fn code_block(&self, id: &str, fence: &Fence, source: String) -> CodeBlock {
        let mut tokens = fence
            .info
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|t| !t.is_empty());
        let language = tokens.next().unwrap_or("").to_ascii_lowercase();
        let mut annotations = Annotations::default();
        for token in tokens {
            match token {
                "runnable" => annotations.runnable = true,
                "expect-error" => annotations.expect_error = Some(ExpectError::Any),
                "isolated" | "fresh" => annotations.isolated = true,
                _ => match token.strip_prefix("expect-error=") {
                    Some(name) if !name.is_empty() => {
                        annotations.expect_error = Some(ExpectError::Named(name.to_string()))
                    }
                    _ => annotations.extra.push(token.to_string()),
                },
            }
        }
        if annotations.runnable && !self.language_tags.contains(&language) {
            warn!(
                document = %id,
                line = fence.line,
                language = %language,
                "`runnable` ignored on a block that is not a script block"
            );
            annotations.runnable = false;
        }
        CodeBlock {
            source,
            language,
            annotations,
            start_line: fence.line,
            expected_output: None,
        }
    }
}

/// Extract with the default script language tags (`js`, `javascript`).
pub fn extract(id: &str, text: &str) -> Result<Document, ParseError> {
    Extractor::default().extract(id, text)
}

fn flush_prose(prose: &mut Vec<&str>, segments: &mut Vec<Segment>) {
    if !prose.is_empty() {
        segments.push(Segment::Prose(prose.join("\n")));
        prose.clear();
    }
}

fn leading_spaces(line: &str) -> usize {
    line.len() - line.trim_start_matches(' ').len()
}

/// Three or more backticks or tildes, indented at most three spaces.
fn opening_fence(line: &str, number: usize) -> Option<Fence> {
    let indent = leading_spaces(line);
    if indent > 3 {
        return None;
    }
    let rest = &line[indent..];
    let marker = rest.chars().next().filter(|c| *c == '`' || *c == '~')?;
    let len = rest.chars().take_while(|c| *c == marker).count();
    if len < 3 {
        return None;
    }
    let info = rest[len..].trim();
    if marker == '`' && info.contains('`') {
        return None;
    }
    Some(Fence {
        indent,
        marker,
        len,
        info: info.to_string(),
        line: number,
    })
}

fn is_closing(line: &str, fence: &Fence) -> bool {
    let indent = leading_spaces(line);
    if indent > 3 {
        return false;
    }
    let rest = &line[indent..];
    let run = rest.chars().take_while(|c| *c == fence.marker).count();
    run >= fence.len && rest[run..].trim().is_empty()
}

/// Content lines lose as much indentation as the opening fence had.
fn strip_indent(line: &str, indent: usize) -> &str {
    let strip = leading_spaces(line).min(indent);
    &line[strip..]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blocks(doc: &Document) -> Vec<&CodeBlock> {
        doc.code_blocks().collect()
    }

    #[test]
    fn test_segments_keep_source_order() {
        let markdown = "# Title\n\nIntro.\n\n```js runnable\nlet a = 1;\n```\n\nMore prose.\n\n```js\nlet b;\n```\n";
        let doc = extract("doc.md", markdown).unwrap();
        assert_eq!(doc.segments.len(), 4);
        assert!(matches!(&doc.segments[0], Segment::Prose(p) if p.starts_with("# Title")));
        let code = blocks(&doc);
        assert_eq!(code[0].start_line, 5);
        assert_eq!(code[0].source, "let a = 1;");
        assert!(code[0].annotations.runnable);
        assert!(!code[1].annotations.runnable);
        assert_eq!(doc.runnable_blocks().count(), 1);
    }

    #[test]
    fn test_annotations() {
        let markdown = "```javascript runnable expect-error=TypeError fresh title=demo\nnull.x\n```\n```js runnable,expect-error\nthrow 1\n```\n";
        let doc = extract("doc.md", markdown).unwrap();
        let code = blocks(&doc);
        let a = &code[0].annotations;
        assert!(a.runnable && a.isolated);
        assert_eq!(a.expect_error, Some(ExpectError::Named("TypeError".into())));
        assert_eq!(a.extra, vec!["title=demo"]);
        assert_eq!(code[1].annotations.expect_error, Some(ExpectError::Any));
    }

    #[test]
    fn test_runnable_needs_a_script_tag() {
        let doc = extract("doc.md", "```python runnable\nprint(1)\n```\n").unwrap();
        let code = blocks(&doc);
        assert_eq!(code[0].language, "python");
        assert!(!code[0].annotations.runnable);

        let custom = Extractor::new(["mjs"]).extract("doc.md", "```mjs runnable\n1\n```\n").unwrap();
        assert_eq!(custom.runnable_blocks().count(), 1);
    }

    #[test]
    fn test_fence_rules() {
        // Tildes, longer fences and a shorter inner run that does not close.
        let markdown = "~~~~js runnable\nlet s = `\n~~~\n`;\n~~~~\n";
        let doc = extract("doc.md", markdown).unwrap();
        assert_eq!(blocks(&doc)[0].source, "let s = `\n~~~\n`;");

        // Four spaces of indentation is not a fence.
        let doc = extract("doc.md", "    ```js runnable\n    code\n").unwrap();
        assert_eq!(doc.code_blocks().count(), 0);

        // Content loses the fence's indentation.
        let doc = extract("doc.md", "  ```js\n  a\n    b\n  ```\n").unwrap();
        assert_eq!(blocks(&doc)[0].source, "a\n  b");
    }

    #[test]
    fn test_unterminated_fence() {
        let err = extract("broken.md", "text\n\n```js runnable\nlet a = 1;\n").unwrap_err();
        assert_eq!(err.line, 3);
        assert_eq!(err.to_string(), "broken.md:3: unterminated code fence");
    }

    #[test]
    fn test_output_blocks_attach_to_the_preceding_runnable_block() {
        let markdown = "```js runnable\nconsole.log(1)\n```\n\n```output\n1\n```\n\n```js runnable\nconsole.log(2)\n```\nProse breaks the link.\n```output\n2\n```\n";
        let doc = extract("doc.md", markdown).unwrap();
        let runnable: Vec<&CodeBlock> = doc.runnable_blocks().collect();
        assert_eq!(runnable[0].expected_output, Some(vec!["1".to_string()]));
        assert_eq!(runnable[1].expected_output, None);
    }
}
