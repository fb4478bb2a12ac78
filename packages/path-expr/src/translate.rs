//! Translation of a predicate-filtered path expression into regex source.
//!
//! | expression        | regex                        |
//! |-------------------|------------------------------|
//! | `*`               | `[^/]*`                      |
//! | `//` (inner)      | `(?:/[^/]*)*/`               |
//! | `//` (at end)     | `(?:/[^/]*)*`                |
//! | `[]`, `[*]`       | `(?:\[\d+\])?`               |
//! | `[0]`             | `(?:\[0\])?`                 |
//! | `[3]`             | `\[3\]`                      |
//! | `[0,1,2]`         | `(?:\[(?:1|2)\])?`           |
//! | `/(|a|b)`         | `(?:/(a|b))?`                |
//! | trailing `[x/@p]` | `/x/@p`                      |
//!
//! Every `(` in the expression becomes a capturing group, so group numbers
//! follow the order of opening parentheses. Helper groups never capture.

use crate::ExpressionError;

const ANY_SEGMENT: &str = "[^/]*";
const ANY_DESCENDANTS: &str = "(?:/[^/]*)*";
const ANY_INDEX: &str = r"(?:\[\d+\])?";

/// Translate an expression whose non-index predicates have already been
/// filtered out (see [`crate::remove_unused_predicates`]).
pub(crate) fn translate(expression: &str) -> Result<String, ExpressionError> {
    let mut translator = Translator {
        expression,
        chars: expression.chars().collect(),
        pos: 0,
    };
    let branches = translator.alternatives()?;
    if translator.pos < translator.chars.len() {
        return Err(translator.error("unbalanced ')'"));
    }
    Ok(branches.into_top_level())
}

struct Translator<'a> {
    expression: &'a str,
    chars: Vec<char>,
    pos: usize,
}

/// The `|`-separated alternatives of one group (or of the whole expression).
struct Branches {
    branches: Vec<String>,
    has_empty: bool,
}

impl Branches {
    fn joined(&self) -> String {
        self.branches.join("|")
    }

    fn into_top_level(self) -> String {
        match (self.branches.len(), self.has_empty) {
            (0, _) => String::new(),
            (1, false) => self.joined(),
            (_, false) => format!("(?:{})", self.joined()),
            (_, true) => format!("(?:{})?", self.joined()),
        }
    }
}

impl Translator<'_> {
    fn error(&self, message: &str) -> ExpressionError {
        ExpressionError::invalid(self.expression, message)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    /// Parse alternatives up to an unconsumed `)` or the end of input.
    fn alternatives(&mut self) -> Result<Branches, ExpressionError> {
        let mut branches = Branches {
            branches: Vec::new(),
            has_empty: false,
        };
        loop {
            let branch = self.sequence()?;
            if branch.is_empty() {
                branches.has_empty = true;
            } else {
                branches.branches.push(branch);
            }
            match self.peek() {
                Some('|') => self.pos += 1,
                _ => return Ok(branches),
            }
        }
    }

    /// Parse one alternative, stopping before `|`, `)` or the end of input.
    fn sequence(&mut self) -> Result<String, ExpressionError> {
        let mut out = String::new();
        // True when `out` ends with a lone `/` that an optional group may absorb.
        let mut after_slash = false;

        while let Some(c) = self.peek() {
            match c {
                '|' | ')' => break,
                '/' => {
                    let start = self.pos;
                    while self.peek() == Some('/') {
                        self.pos += 1;
                    }
                    if self.pos - start == 1 {
                        out.push('/');
                        after_slash = true;
                        continue;
                    }
                    out.push_str(ANY_DESCENDANTS);
                    if !matches!(self.peek(), None | Some('|') | Some(')')) {
                        out.push('/');
                    }
                }
                '(' => {
                    self.pos += 1;
                    let group = self.alternatives()?;
                    if self.peek() != Some(')') {
                        return Err(self.error("unbalanced '('"));
                    }
                    self.pos += 1;

                    if group.branches.is_empty() {
                        out.push_str("()");
                    } else if !group.has_empty {
                        out.push_str(&format!("({})", group.joined()));
                    } else if after_slash {
                        out.pop();
                        out.push_str(&format!("(?:/({}))?", group.joined()));
                    } else {
                        out.push_str(&format!("({})?", group.joined()));
                    }
                }
                '[' => {
                    let close = self.chars[self.pos..]
                        .iter()
                        .position(|&c| c == ']')
                        .map(|offset| self.pos + offset)
                        .ok_or_else(|| self.error("unclosed '['"))?;
                    let content: String = self.chars[self.pos + 1..close].iter().collect();
                    let trailing = close + 1 == self.chars.len();
                    self.pos = close + 1;

                    if let Some(index) = index_pattern(&content) {
                        out.push_str(&index);
                    } else if trailing {
                        out.push('/');
                        out.push_str(&translate(&content)?);
                    } else {
                        return Err(self.error(&format!("unsupported predicate '[{}]'", content)));
                    }
                }
                '*' => {
                    self.pos += 1;
                    out.push_str(ANY_SEGMENT);
                }
                '\\' => {
                    self.pos += 1;
                    let escaped = self.peek().ok_or_else(|| self.error("dangling '\\'"))?;
                    self.pos += 1;
                    push_literal(&mut out, escaped);
                }
                _ => {
                    self.pos += 1;
                    push_literal(&mut out, c);
                }
            }
            after_slash = false;
        }

        Ok(out)
    }
}

fn push_literal(out: &mut String, c: char) {
    let mut buf = [0u8; 4];
    out.push_str(&regex::escape(c.encode_utf8(&mut buf)));
}

/// Regex for a same-name-sibling index predicate, or `None` if `content`
/// is not an index.
fn index_pattern(content: &str) -> Option<String> {
    if content.is_empty() || content == "*" {
        return Some(ANY_INDEX.to_string());
    }
    let numbers: Vec<&str> = content.split(',').collect();
    if !numbers
        .iter()
        .all(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
    {
        return None;
    }

    let mut optional = false;
    let mut indexes: Vec<&str> = Vec::new();
    for n in numbers {
        if n.bytes().all(|b| b == b'0') {
            optional = true;
        } else if !indexes.contains(&n) {
            indexes.push(n);
        }
    }

    let required = match indexes.as_slice() {
        [] => return Some(r"(?:\[0\])?".to_string()),
        [single] => format!(r"\[{}\]", single),
        many => format!(r"\[(?:{})\]", many.join("|")),
    };
    Some(if optional {
        format!("(?:{})?", required)
    } else {
        required
    })
}
