//! Script items and Lua literal helpers

use crate::host::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One semantic command with its rendering
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionLine {
    /// Full statement, e.g. `buttonClick('n=ok_0');`
    pub command: String,
    /// Trailing comment without the `--` marker
    pub comment: Option<String>,
}

impl ActionLine {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            comment: None,
        }
    }

    /// Build `name(arg, arg, ...);`
    pub fn call(name: &str, args: &[String]) -> Self {
        Self::new(format!("{}({});", name, args.join(", ")))
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Name of the called function
    pub fn function(&self) -> &str {
        self.command
            .split_once('(')
            .map(|(name, _)| name)
            .unwrap_or(&self.command)
    }

    /// Statement followed by its comment, if any
    pub fn render(&self) -> String {
        match &self.comment {
            Some(comment) => format!("{} -- {}", self.command, comment),
            None => self.command.clone(),
        }
    }
}

impl fmt::Display for ActionLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Items produced by classification, in recording order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScriptItem {
    /// A command to replay
    Action(ActionLine),
    /// A note for the reader; never executed
    Comment(String),
    /// Property checks on one object
    Verification {
        path: String,
        checks: Vec<(String, Value)>,
    },
}

impl ScriptItem {
    pub fn action(line: ActionLine) -> Self {
        ScriptItem::Action(line)
    }

    pub fn comment(text: impl Into<String>) -> Self {
        ScriptItem::Comment(text.into())
    }

    pub fn is_action(&self) -> bool {
        matches!(self, ScriptItem::Action(_))
    }

    pub fn as_action(&self) -> Option<&ActionLine> {
        match self {
            ScriptItem::Action(line) => Some(line),
            _ => None,
        }
    }

    /// `verify(...)` statements for a verification item
    pub fn verification_lines(&self) -> Vec<String> {
        match self {
            ScriptItem::Verification { path, checks } => checks
                .iter()
                .map(|(property, value)| {
                    format!(
                        "verify({}, {}, {});",
                        quote(path),
                        quote(property),
                        quote(&value.to_string())
                    )
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Escape text for a single-quoted Lua string
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out
}

/// Single-quoted Lua string literal
pub fn quote(text: &str) -> String {
    format!("'{}'", escape_text(text))
}

/// Lua table literal of integers, e.g. `{0, 2}`
pub fn int_table(values: &[i32]) -> String {
    let items: Vec<String> = values.iter().map(i32::to_string).collect();
    format!("{{{}}}", items.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_text() {
        assert_eq!(escape_text("plain"), "plain");
        assert_eq!(escape_text("it's"), "it\\'s");
        assert_eq!(escape_text("a\\b"), "a\\\\b");
        assert_eq!(escape_text("one\ntwo\tthree"), "one\\ntwo\\tthree");
        assert_eq!(quote("it's"), "'it\\'s'");
    }

    #[test]
    fn test_action_line_rendering() {
        let line = ActionLine::call("buttonClick", &[quote("n=ok_0")])
            .with_comment("Button text: 'OK'");
        assert_eq!(line.command, "buttonClick('n=ok_0');");
        assert_eq!(line.function(), "buttonClick");
        assert_eq!(
            line.render(),
            "buttonClick('n=ok_0'); -- Button text: 'OK'"
        );
    }

    #[test]
    fn test_int_table() {
        assert_eq!(int_table(&[0, 2, 1]), "{0, 2, 1}");
        assert_eq!(int_table(&[]), "{}");
    }

    #[test]
    fn test_verification_lines() {
        let item = ScriptItem::Verification {
            path: "n=spin_0".into(),
            checks: vec![
                ("value".into(), Value::Int(4)),
                ("enabled".into(), Value::Bool(true)),
            ],
        };
        assert_eq!(
            item.verification_lines(),
            vec![
                "verify('n=spin_0', 'value', '4');".to_string(),
                "verify('n=spin_0', 'enabled', 'true');".to_string(),
            ]
        );
        assert!(ScriptItem::comment("x").verification_lines().is_empty());
    }
}
