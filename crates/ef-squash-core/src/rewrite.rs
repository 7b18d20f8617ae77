//! Targeted rewrite of one named C# attribute.
//!
//! The source is parsed with the tree-sitter C# grammar and every attribute
//! whose name is exactly the configured identifier gets its argument list
//! replaced with a single string literal. Only that byte span changes.

use std::ops::Range;
use std::path::Path;
use thiserror::Error;
use tree_sitter::{Node, Parser};
use tracing::warn;

#[derive(Error, Debug)]
pub enum RewriteError {
    #[error("failed to initialise C# parser: {0}")]
    ParserInit(String),

    #[error("parser produced no syntax tree")]
    ParseFailed,

    #[error("attribute not found")]
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    pub source: String,
    pub occurrences: usize,
}

#[derive(Debug, Clone)]
pub struct AttributeRewriter {
    attribute: String,
}

impl AttributeRewriter {
    pub fn new(attribute: &str) -> Self {
        Self {
            attribute: attribute.to_string(),
        }
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Whether a file can be rewritten, judged by its extension.
    pub fn supports(file_name: &str) -> bool {
        Path::new(file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("cs"))
    }

    pub fn rewrite(&self, source: &str, value: &str) -> Result<Rewrite, RewriteError> {
        let spans = self.argument_spans(source)?;
        if spans.is_empty() {
            return Err(RewriteError::NotFound);
        }

        let replacement = format!("(\"{}\")", escape_string(value));
        let mut rewritten = source.to_string();
        for span in spans.iter().rev() {
            rewritten.replace_range(span.clone(), &replacement);
        }

        Ok(Rewrite {
            source: rewritten,
            occurrences: spans.len(),
        })
    }

    /// Byte spans of the argument lists to replace. An attribute written
    /// without parentheses yields an empty span right after its name.
    fn argument_spans(&self, source: &str) -> Result<Vec<Range<usize>>, RewriteError> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_c_sharp::LANGUAGE.into())
            .map_err(|e| RewriteError::ParserInit(e.to_string()))?;

        let tree = parser.parse(source, None).ok_or(RewriteError::ParseFailed)?;
        let root = tree.root_node();
        if root.has_error() {
            warn!("Source contains syntax errors; rewriting recognised attributes only");
        }

        let mut spans = Vec::new();
        self.collect(root, source.as_bytes(), &mut spans);
        Ok(spans)
    }

    fn collect(&self, node: Node, source: &[u8], spans: &mut Vec<Range<usize>>) {
        if node.kind() == "attribute" {
            if let Some(name) = node
                .child_by_field_name("name")
                .or_else(|| node.named_child(0))
            {
                if name.utf8_text(source).unwrap_or_default() == self.attribute {
                    let mut cursor = node.walk();
                    let args = node
                        .named_children(&mut cursor)
                        .find(|child| child.kind() == "attribute_argument_list");
                    spans.push(match args {
                        Some(args) => args.byte_range(),
                        None => name.end_byte()..name.end_byte(),
                    });
                }
            }
            return;
        }

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.collect(child, source, spans);
        }
    }
}

fn escape_string(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
