//! Parser for the widget markup embedded in page content:
//!
//! ```text
//! {button label="Click" onClick=[[doThing()]]}
//! ```
//!
//! A widget is a brace-delimited name followed by `key="value"` or
//! `key=[[block value]]` arguments. Block values may span lines and end at
//! the nearest `]]`.

mod error;
mod invocation;
mod lexer;
mod parser;
mod scanner;

pub use error::{WidgetError, WidgetResult};
pub use invocation::{ArgSyntax, WidgetInvocation};
pub use lexer::{Lexer, Token, TokenKind};
pub use parser::{parse_widget, Parser};
pub use scanner::{scan, Segment};

use tracing::{debug, trace};
