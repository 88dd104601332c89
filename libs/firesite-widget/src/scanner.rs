use super::{debug, Parser, WidgetError, WidgetInvocation};

/// A piece of page content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Widget(WidgetInvocation),
    /// A `{` that did not start a valid widget. `raw` runs up to the first `}`
    /// at or after the failure point, so the renderer can show it verbatim or
    /// reject the page.
    Malformed { raw: String, error: WidgetError },
}

fn push_text(segments: &mut Vec<Segment>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(Segment::Text(prev)) = segments.last_mut() {
        prev.push_str(text);
    } else {
        segments.push(Segment::Text(text.to_string()));
    }
}

/// Splits content into literal text and widget occurrences, in order.
pub fn scan(content: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut cursor = 0;

    while let Some(found) = content[cursor..].find('{') {
        let start = cursor + found;
        push_text(&mut segments, &content[cursor..start]);

        let mut parser = Parser::new(&content[start..]);
        match parser.widget() {
            Ok(widget) => {
                segments.push(Segment::Widget(widget));
                cursor = start + parser.consumed();
            }
            Err(error) => {
                let failed_at = start + error.offset().unwrap_or(1).max(1);
                let end = content[failed_at..]
                    .find('}')
                    .map(|idx| failed_at + idx + 1)
                    .unwrap_or(failed_at);
                debug!("malformed widget at {start}: {error}");
                segments.push(Segment::Malformed {
                    raw: content[start..end].to_string(),
                    error,
                });
                cursor = end;
            }
        }
    }
    push_text(&mut segments, &content[cursor..]);

    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_text_and_widgets() {
        let segments = scan("Intro\n{button label=\"Go\"}\nmiddle {divider}end");
        assert_eq!(
            segments,
            vec![
                Segment::Text("Intro\n".into()),
                Segment::Widget(WidgetInvocation::new("button").with_arg("label", "Go")),
                Segment::Text("\nmiddle ".into()),
                Segment::Widget(WidgetInvocation::new("divider")),
                Segment::Text("end".into()),
            ]
        );
    }

    #[test]
    fn plain_text_is_one_segment() {
        assert_eq!(scan("no widgets here"), vec![Segment::Text("no widgets here".into())]);
        assert!(scan("").is_empty());
    }

    #[test]
    fn block_values_may_contain_braces() {
        let segments = scan("{code src=[[if x { y }]]} after");
        assert_eq!(
            segments[0],
            Segment::Widget(WidgetInvocation::new("code").with_arg("src", "if x { y }"))
        );
        assert_eq!(segments[1], Segment::Text(" after".into()));
    }

    #[test]
    fn malformed_occurrence_is_reported_and_scanning_continues() {
        let segments = scan("a {b c} d {e f=\"g\"}");
        assert_eq!(segments[0], Segment::Text("a ".into()));
        match &segments[1] {
            Segment::Malformed { raw, error } => {
                assert_eq!(raw, "{b c}");
                assert!(matches!(error, WidgetError::UnexpectedToken { .. }));
            }
            other => panic!("expected malformed segment, got {other:?}"),
        }
        assert_eq!(segments[2], Segment::Text(" d ".into()));
        assert_eq!(
            segments[3],
            Segment::Widget(WidgetInvocation::new("e").with_arg("f", "g"))
        );
    }

    #[test]
    fn unterminated_occurrence_swallows_the_rest() {
        let segments = scan("before {bad");
        assert_eq!(segments.len(), 2);
        assert!(matches!(&segments[1], Segment::Malformed { raw, .. } if raw == "{bad"));
    }

    #[test]
    fn lone_brace_with_unicode_after() {
        let segments = scan("x { é }");
        assert!(matches!(&segments[1], Segment::Malformed { raw, .. } if raw == "{ é }"));
    }
}
