//! Function span extraction for the function-length rule.
//!
//! Python sources are parsed with tree-sitter and every function
//! definition, nested ones included, is reported with its name and
//! 1-based start and end lines.

use tracing::warn;
use tree_sitter::{Node, Parser};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSpan {
    pub name: String,
    pub start_line: usize,
    pub end_line: usize,
}

impl FunctionSpan {
    pub fn line_count(&self) -> usize {
        self.end_line - self.start_line + 1
    }
}

/// Extract all function definitions from Python source.
///
/// A parser setup failure or an unparseable file yields no spans; the
/// rule then simply reports nothing for that file.
pub fn function_spans(source: &str) -> Vec<FunctionSpan> {
    let mut parser = Parser::new();
    let language = tree_sitter_python::LANGUAGE;
    if let Err(err) = parser.set_language(&language.into()) {
        warn!(error = %err, "failed to load python grammar");
        return Vec::new();
    }

    let Some(tree) = parser.parse(source, None) else {
        return Vec::new();
    };

    let mut spans = Vec::new();
    collect(tree.root_node(), source.as_bytes(), &mut spans);
    spans
}

fn collect(node: Node<'_>, source: &[u8], spans: &mut Vec<FunctionSpan>) {
    if node.kind() == "function_definition" {
        let name = node
            .child_by_field_name("name")
            .and_then(|n| n.utf8_text(source).ok())
            .unwrap_or("<anonymous>")
            .to_string();
        spans.push(FunctionSpan {
            name,
            start_line: node.start_position().row + 1,
            end_line: node.end_position().row + 1,
        });
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect(child, source, spans);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_top_level_function() {
        let spans = function_spans("def hello(name):\n    return name\n");
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].name, "hello");
        assert_eq!(spans[0].start_line, 1);
        assert_eq!(spans[0].end_line, 2);
        assert_eq!(spans[0].line_count(), 2);
    }

    #[test]
    fn extracts_methods_and_nested_functions() {
        let source = "\
class Thing:
    def outer(self):
        def inner():
            return 1
        return inner
";
        let spans = function_spans(source);
        let names: Vec<&str> = spans.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["outer", "inner"]);
    }

    #[test]
    fn empty_source_has_no_spans() {
        assert!(function_spans("").is_empty());
    }
}
