//! Script Line Composition
//!
//! Folds runs of identical action lines into loops and batches comments.
//! Lines come out without trailing newlines, already indented.

use super::action::{ActionLine, ScriptItem};
use super::GenerationConfig;
use std::mem;

/// Builds indented script lines from the item stream
#[derive(Debug)]
pub struct Composer {
    indent: usize,
    level: usize,
    cycles: bool,
    cycle_min: usize,
    block_comment_min: usize,
    /// One-slot repeat buffer
    repeat: Option<(ActionLine, usize)>,
    /// Comments waiting to be written as one batch
    comments: Vec<String>,
    /// Finished lines not yet drained
    lines: Vec<String>,
}

impl Composer {
    /// Composer writing at indentation `level`
    pub fn new(config: &GenerationConfig, level: usize) -> Self {
        Self {
            indent: config.indent,
            level,
            cycles: config.cycles,
            cycle_min: config.cycle_min,
            block_comment_min: config.block_comment_min,
            repeat: None,
            comments: Vec::new(),
            lines: Vec::new(),
        }
    }

    pub fn push(&mut self, item: ScriptItem) {
        match item {
            ScriptItem::Action(line) => {
                self.flush_comments();
                match &mut self.repeat {
                    Some((buffered, count)) if *buffered == line => *count += 1,
                    _ => {
                        self.flush_repeat();
                        self.repeat = Some((line, 1));
                    }
                }
            }
            ScriptItem::Comment(text) => {
                self.flush_repeat();
                self.comments.push(text);
            }
            verification @ ScriptItem::Verification { .. } => {
                self.flush_repeat();
                self.flush_comments();
                let pad = self.pad(self.level);
                for line in verification.verification_lines() {
                    self.lines.push(format!("{}{}", pad, line));
                }
            }
        }
    }

    /// Repeat count of the buffered line
    pub fn pending_repeat(&self) -> Option<usize> {
        self.repeat.as_ref().map(|(_, count)| *count)
    }

    /// Take the lines finished so far. Buffered repeats and comments stay.
    pub fn drain(&mut self) -> Vec<String> {
        mem::take(&mut self.lines)
    }

    /// Flush the buffers and take every remaining line
    pub fn finish(&mut self) -> Vec<String> {
        self.flush_repeat();
        self.flush_comments();
        self.drain()
    }

    fn pad(&self, level: usize) -> String {
        " ".repeat(self.indent * level)
    }

    fn flush_repeat(&mut self) {
        let Some((line, count)) = self.repeat.take() else {
            return;
        };
        let pad = self.pad(self.level);
        if self.cycles && count >= self.cycle_min {
            self.lines.push(format!("{}for i = 1, {} do", pad, count));
            self.lines
                .push(format!("{}{}", self.pad(self.level + 1), line.render()));
            self.lines.push(format!("{}end", pad));
        } else {
            let rendered = format!("{}{}", pad, line.render());
            self.lines
                .extend(std::iter::repeat(rendered).take(count));
        }
    }

    fn flush_comments(&mut self) {
        if self.comments.is_empty() {
            return;
        }
        let comments = mem::take(&mut self.comments);
        let pad = self.pad(self.level);
        // A "]]" inside the text would end a block comment early
        let block = self.block_comment_min > 0
            && comments.len() >= self.block_comment_min
            && !comments.iter().any(|c| c.contains("]]"));
        if block {
            self.lines.push(format!("{}--[[", pad));
            for text in comments {
                self.lines.push(format!("{}{}", pad, text));
            }
            self.lines.push(format!("{}]]", pad));
        } else {
            for text in comments {
                self.lines.push(format!("{}-- {}", pad, text));
            }
        }
    }
}
