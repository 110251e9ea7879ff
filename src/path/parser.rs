//! Path Parser
//!
//! Recursive descent over the abbreviated and unabbreviated syntax of the
//! supported fragment:
//!
//! ```text
//! path      := '.' | ['/' | '//'] step (('/' | '//') step)*
//! step      := [axis '::'] test [predicate]
//! axis      := 'child' | 'descendant' | 'descendant-or-self'
//! test      := NAME | '*' | 'node()' | 'text()'
//! predicate := '[' k ']' | '[' 'position()' '=' k ']'      (k >= 1)
//! ```
//!
//! Paths are relative to the iterator's base, so a leading `/` only
//! states the axis of the first step. `//` selects the descendant axis
//! for the step that follows it.

use super::step::{Axis, NodeTest, PathExpr, PathStep};
use crate::error::{Error, Result};
use crate::tags::TagTable;

/// Parse `input`, interning element names into `tags`
pub fn parse_path(input: &str, tags: &mut TagTable) -> Result<PathExpr> {
    let mut parser = PathParser::new(input);
    parser.parse(tags)
}

struct PathParser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> PathParser<'a> {
    fn new(input: &'a str) -> Self {
        PathParser { input, pos: 0 }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn advance(&mut self, n: usize) {
        self.pos += n;
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.advance(c.len_utf8());
        }
    }

    fn eat(&mut self, token: &str) -> bool {
        self.skip_whitespace();
        if self.remaining().starts_with(token) {
            self.advance(token.len());
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &str) -> Result<()> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{token}'")))
        }
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::path_syntax(message, self.pos)
    }

    fn parse(&mut self, tags: &mut TagTable) -> Result<PathExpr> {
        self.skip_whitespace();
        if self.remaining().is_empty() {
            return Ok(PathExpr::empty());
        }
        if self.eat(".") {
            self.skip_whitespace();
            if self.remaining().is_empty() {
                return Ok(PathExpr::empty());
            }
            return Err(self.error("'.' is only supported as the whole path"));
        }

        let mut steps = Vec::new();
        let mut descendant = if self.eat("//") {
            true
        } else {
            self.eat("/");
            false
        };

        loop {
            steps.push(self.parse_step(tags, descendant)?);
            self.skip_whitespace();
            if self.remaining().is_empty() {
                break;
            }
            descendant = if self.eat("//") {
                true
            } else if self.eat("/") {
                false
            } else {
                return Err(self.error("expected '/' or end of path"));
            };
        }
        Ok(PathExpr::new(steps))
    }

    fn parse_step(&mut self, tags: &mut TagTable, after_double_slash: bool) -> Result<PathStep> {
        self.skip_whitespace();
        let start = self.pos;
        let mut axis = Axis::Child;

        if let Some(name) = self.read_name() {
            self.skip_whitespace();
            if self.remaining().starts_with("::") {
                axis = Axis::from_str(name)
                    .ok_or_else(|| Error::path_syntax(format!("unsupported axis '{name}'"), start))?;
                self.advance(2);
            } else {
                // not an axis, re-read as node test
                self.pos = start;
            }
        }

        if after_double_slash && axis == Axis::Child {
            axis = Axis::Descendant;
        }

        let test = self.parse_node_test(tags)?;
        let mut step = PathStep::new(axis, test);
        if self.eat("[") {
            step.position = Some(self.parse_position()?);
            self.expect("]")?;
        }
        Ok(step)
    }

    fn parse_node_test(&mut self, tags: &mut TagTable) -> Result<NodeTest> {
        self.skip_whitespace();
        if self.eat("*") {
            return Ok(NodeTest::AnyTag);
        }
        let Some(name) = self.read_name() else {
            return Err(self.error("expected a node test"));
        };
        let kind_test = match name {
            "node" => Some(NodeTest::AnyNode),
            "text" => Some(NodeTest::Text),
            _ => None,
        };
        if let Some(test) = kind_test {
            let after_name = self.pos;
            if self.eat("(") {
                self.expect(")")?;
                return Ok(test);
            }
            self.pos = after_name;
        }
        Ok(NodeTest::Name(tags.intern(name)))
    }

    fn parse_position(&mut self) -> Result<u32> {
        if self.eat("position") {
            self.expect("(")?;
            self.expect(")")?;
            self.expect("=")?;
        }
        self.skip_whitespace();
        let start = self.pos;
        let digits = self
            .remaining()
            .bytes()
            .take_while(u8::is_ascii_digit)
            .count();
        if digits == 0 {
            return Err(self.error("expected a position"));
        }
        self.advance(digits);
        let k: u32 = self.input[start..self.pos]
            .parse()
            .map_err(|_| Error::path_syntax("position out of range", start))?;
        if k == 0 {
            return Err(Error::path_syntax("positions start at 1", start));
        }
        Ok(k)
    }

    /// Element name; stops before `::` so axis names can be split off
    fn read_name(&mut self) -> Option<&'a str> {
        let rest = self.remaining();
        let mut chars = rest.char_indices();
        let (_, first) = chars.next()?;
        if !is_name_start_char(first) {
            return None;
        }
        let mut end = rest.len();
        for (i, c) in chars {
            if c == ':' && rest[i..].starts_with("::") {
                end = i;
                break;
            }
            if !is_name_char(c) {
                end = i;
                break;
            }
        }
        self.advance(end);
        Some(&rest[..end])
    }
}

fn is_name_start_char(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-' || c == '.' || c == ':'
}
