use super::{
    lexer::{is_bare_line_break, is_identifier_char},
    WidgetError, WidgetResult,
};
use serde::{Deserialize, Serialize};

/// Argument syntax used when writing a widget back to markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArgSyntax {
    /// `key="value"`
    Simple,
    /// `key=[[value]]`
    Block,
    /// Simple where possible, block otherwise.
    #[default]
    Auto,
}

impl ArgSyntax {
    fn name(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Block => "block",
            Self::Auto => "any",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WidgetInvocation {
    #[serde(rename = "widget")]
    pub name: String,
    pub args: Vec<(String, String)>,
}

fn check_identifier(ident: &str) -> WidgetResult<()> {
    if !ident.is_empty() && ident.chars().all(is_identifier_char) {
        Ok(())
    } else {
        Err(WidgetError::InvalidIdentifier(ident.to_string()))
    }
}

fn fits_simple(value: &str) -> bool {
    !value.is_empty() && !value.contains('"')
}

// a trailing `]` would merge with the closing `]]` and end the value early
fn fits_block(value: &str) -> bool {
    !value.is_empty() && !value.contains("]]") && !value.ends_with(']') && !value.contains(is_bare_line_break)
}

impl WidgetInvocation {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn with_arg<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.args.push((key.into(), value.into()));
        self
    }

    /// First value given for `key`.
    pub fn arg(&self, key: &str) -> Option<&str> {
        self.args.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// Writes the widget as markup that parses back to an equal invocation.
    pub fn to_source(&self, syntax: ArgSyntax) -> WidgetResult<String> {
        check_identifier(&self.name)?;

        let mut out = format!("{{{}", self.name);
        for (key, value) in &self.args {
            check_identifier(key)?;
            let block = match syntax {
                ArgSyntax::Simple if fits_simple(value) => false,
                ArgSyntax::Block if fits_block(value) => true,
                ArgSyntax::Auto if fits_simple(value) => false,
                ArgSyntax::Auto if fits_block(value) => true,
                _ => {
                    return Err(WidgetError::Unrepresentable {
                        key: key.clone(),
                        syntax: syntax.name(),
                    })
                }
            };
            if block {
                out.push_str(&format!(" {key}=[[{value}]]"));
            } else {
                out.push_str(&format!(" {key}=\"{value}\""));
            }
        }
        out.push('}');

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::{super::parse_widget, *};
    use proptest::{collection::vec, prelude::*};

    fn identifier() -> impl Strategy<Value = String> {
        "[A-Za-z0-9_]{1,12}"
    }

    fn simple_value() -> impl Strategy<Value = String> {
        "[^\"]{1,24}"
    }

    fn block_value() -> impl Strategy<Value = String> {
        "[a-z0-9 \t\n\"{}=\\[\\]]{1,24}".prop_filter("fits block syntax", |v| fits_block(v))
    }

    fn invocation(value: impl Strategy<Value = String>) -> impl Strategy<Value = WidgetInvocation> {
        (identifier(), vec((identifier(), value), 0..5)).prop_map(|(name, args)| WidgetInvocation { name, args })
    }

    proptest! {
        #[test]
        fn reparses_with_simple_syntax(widget in invocation(simple_value())) {
            let source = widget.to_source(ArgSyntax::Simple).unwrap();
            prop_assert_eq!(parse_widget(&source).unwrap(), widget);
        }

        #[test]
        fn reparses_with_block_syntax(widget in invocation(block_value())) {
            let source = widget.to_source(ArgSyntax::Block).unwrap();
            prop_assert_eq!(parse_widget(&source).unwrap(), widget);
        }

        #[test]
        fn reparses_with_mixed_syntax(widget in invocation(prop_oneof![simple_value(), block_value()])) {
            let source = widget.to_source(ArgSyntax::Auto).unwrap();
            prop_assert_eq!(parse_widget(&source).unwrap(), widget);
        }
    }

    #[test]
    fn multiline_code_reparses() {
        let widget = WidgetInvocation::new("code").with_arg("src", "fn main() {\n    println!(\"]\");\n}");
        let source = widget.to_source(ArgSyntax::Auto).unwrap();
        assert_eq!(source, "{code src=[[fn main() {\n    println!(\"]\");\n}]]}");
        assert_eq!(parse_widget(&source).unwrap(), widget);
    }

    #[test]
    fn auto_picks_block_for_quotes() {
        let widget = WidgetInvocation::new("say").with_arg("text", "\"hi\"");
        assert_eq!(widget.to_source(ArgSyntax::Auto).unwrap(), "{say text=[[\"hi\"]]}");
        assert!(matches!(
            widget.to_source(ArgSyntax::Simple),
            Err(WidgetError::Unrepresentable { syntax: "simple", .. })
        ));
    }

    #[test]
    fn rejects_unrepresentable_values() {
        let widget = WidgetInvocation::new("w").with_arg("k", "\"]]");
        assert!(widget.to_source(ArgSyntax::Auto).is_err());

        let widget = WidgetInvocation::new("w").with_arg("k", "");
        assert!(widget.to_source(ArgSyntax::Auto).is_err());

        let widget = WidgetInvocation::new("w").with_arg("k", "x]");
        assert!(widget.to_source(ArgSyntax::Block).is_err());

        let widget = WidgetInvocation::new("w").with_arg("k", "a\r\nb");
        assert!(widget.to_source(ArgSyntax::Block).is_err());
        assert_eq!(widget.to_source(ArgSyntax::Auto).unwrap(), "{w k=\"a\r\nb\"}");

        let widget = WidgetInvocation::new("bad name");
        assert_eq!(
            widget.to_source(ArgSyntax::Auto),
            Err(WidgetError::InvalidIdentifier("bad name".into()))
        );
    }
}
