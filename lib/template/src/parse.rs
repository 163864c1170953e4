//! Tokenizer for `{{ ... }}` interpolations and the pipeline
//! expressions inside them.

use crate::Error;

#[derive(Debug)]
pub enum Node<'a> {
  Text(&'a str),
  Expr(Pipeline),
}

/// `command ('|' command)*`. Each pipe stage receives the
/// previous stage's result as its final argument.
#[derive(Debug, Clone)]
pub struct Pipeline {
  pub commands: Vec<Command>,
}

/// One or more terms. A multi-term command (or any command
/// after the first pipe stage) calls the function named by
/// its leading identifier.
#[derive(Debug, Clone)]
pub struct Command {
  pub terms: Vec<Term>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Term {
  /// `.A.B.C`, or `.` for the whole tree.
  Path(Vec<String>),
  Str(String),
  Int(i64),
  Bool(bool),
  /// Function name.
  Ident(String),
}

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

pub fn parse_template(template: &str) -> crate::Result<Vec<Node>> {
  let mut nodes = Vec::new();
  let mut rest = template;
  let mut offset = 0;
  while let Some(start) = rest.find(OPEN) {
    if start > 0 {
      nodes.push(Node::Text(&rest[..start]));
    }
    let after_open = &rest[start + OPEN.len()..];
    let end = after_open.find(CLOSE).ok_or(Error::Parse {
      offset: offset + start,
      message: String::from("unterminated '{{' interpolation"),
    })?;
    let expr = &after_open[..end];
    let pipeline = parse_pipeline(expr, offset + start + OPEN.len())?;
    nodes.push(Node::Expr(pipeline));
    let consumed = start + OPEN.len() + end + CLOSE.len();
    offset += consumed;
    rest = &rest[consumed..];
  }
  if !rest.is_empty() {
    nodes.push(Node::Text(rest));
  }
  Ok(nodes)
}

/// Parse a bare pipeline expression, as used by rule
/// conditions and file / asset include predicates.
pub fn parse_expression(expr: &str) -> crate::Result<Pipeline> {
  parse_pipeline(expr, 0)
}

fn parse_pipeline(
  expr: &str,
  base_offset: usize,
) -> crate::Result<Pipeline> {
  let mut lexer = Lexer {
    src: expr,
    pos: 0,
    base_offset,
  };
  let mut commands = Vec::new();
  let mut terms = Vec::new();
  loop {
    match lexer.next_token()? {
      Some(Token::Pipe) => {
        if terms.is_empty() {
          return Err(lexer.error("empty pipeline stage"));
        }
        commands.push(Command {
          terms: std::mem::take(&mut terms),
        });
      }
      Some(Token::Term(term)) => terms.push(term),
      None => break,
    }
  }
  if terms.is_empty() {
    return Err(lexer.error(if commands.is_empty() {
      "empty interpolation"
    } else {
      "empty pipeline stage"
    }));
  }
  commands.push(Command { terms });
  Ok(Pipeline { commands })
}

enum Token {
  Term(Term),
  Pipe,
}

struct Lexer<'a> {
  src: &'a str,
  pos: usize,
  base_offset: usize,
}

impl Lexer<'_> {
  fn error(&self, message: impl Into<String>) -> Error {
    Error::Parse {
      offset: self.base_offset + self.pos,
      message: message.into(),
    }
  }

  fn remaining(&self) -> &str {
    &self.src[self.pos..]
  }

  fn bump(&mut self, bytes: usize) {
    self.pos += bytes;
  }

  fn next_token(&mut self) -> crate::Result<Option<Token>> {
    while self
      .remaining()
      .starts_with(|c: char| c.is_ascii_whitespace())
    {
      self.bump(1);
    }
    let rest = self.remaining();
    let Some(first) = rest.chars().next() else {
      return Ok(None);
    };
    match first {
      '|' => {
        self.bump(1);
        Ok(Some(Token::Pipe))
      }
      '.' => self.lex_path().map(|t| Some(Token::Term(t))),
      '"' => self.lex_string().map(|t| Some(Token::Term(t))),
      c if c == '-' || c.is_ascii_digit() => {
        self.lex_int().map(|t| Some(Token::Term(t)))
      }
      c if is_ident_start(c) => {
        let ident = self.lex_ident();
        let term = match ident.as_str() {
          "true" => Term::Bool(true),
          "false" => Term::Bool(false),
          _ => Term::Ident(ident),
        };
        Ok(Some(Token::Term(term)))
      }
      c => Err(self.error(format!("unexpected character '{c}'"))),
    }
  }

  fn lex_path(&mut self) -> crate::Result<Term> {
    let mut segments = Vec::new();
    // leading '.'
    self.bump(1);
    while self
      .remaining()
      .chars()
      .next()
      .is_some_and(is_ident_start)
    {
      segments.push(self.lex_ident());
      if self.remaining().starts_with('.') {
        self.bump(1);
        if !self
          .remaining()
          .chars()
          .next()
          .is_some_and(is_ident_start)
        {
          return Err(
            self.error("expected field name after '.' in path"),
          );
        }
      } else {
        break;
      }
    }
    Ok(Term::Path(segments))
  }

  fn lex_ident(&mut self) -> String {
    let rest = self.remaining();
    let end = rest
      .char_indices()
      .find(|(_, c)| !is_ident_char(*c))
      .map(|(i, _)| i)
      .unwrap_or(rest.len());
    let ident = rest[..end].to_string();
    self.bump(end);
    ident
  }

  fn lex_string(&mut self) -> crate::Result<Term> {
    // opening quote
    self.bump(1);
    let mut out = String::new();
    let mut consumed = None;
    let mut chars = self.remaining().char_indices();
    while let Some((i, c)) = chars.next() {
      match c {
        '"' => {
          consumed = Some(i + 1);
          break;
        }
        '\\' => match chars.next() {
          Some((_, 'n')) => out.push('\n'),
          Some((_, 't')) => out.push('\t'),
          Some((_, '"')) => out.push('"'),
          Some((_, '\\')) => out.push('\\'),
          Some((_, other)) => {
            return Err(self.error(format!(
              "invalid escape '\\{other}' in string literal"
            )));
          }
          None => break,
        },
        _ => out.push(c),
      }
    }
    match consumed {
      Some(n) => {
        self.bump(n);
        Ok(Term::Str(out))
      }
      None => Err(self.error("unterminated string literal")),
    }
  }

  fn lex_int(&mut self) -> crate::Result<Term> {
    let rest = self.remaining();
    let digits_start = usize::from(rest.starts_with('-'));
    let end = rest[digits_start..]
      .char_indices()
      .find(|(_, c)| !c.is_ascii_digit())
      .map(|(i, _)| i + digits_start)
      .unwrap_or(rest.len());
    if end == digits_start {
      return Err(self.error("expected digits after '-'"));
    }
    let value = rest[..end].parse::<i64>().map_err(|_| {
      self.error(format!("integer '{}' out of range", &rest[..end]))
    })?;
    self.bump(end);
    Ok(Term::Int(value))
  }
}

fn is_ident_start(c: char) -> bool {
  c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
  c.is_ascii_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_text_and_interpolations() {
    let nodes =
      parse_template("a {{ .B }} c {{ upper \"x\" }}").unwrap();
    assert_eq!(nodes.len(), 4);
    assert!(matches!(nodes[0], Node::Text("a ")));
    assert!(matches!(nodes[2], Node::Text(" c ")));
  }

  #[test]
  fn parses_pipelines() {
    let pipeline =
      parse_expression(".Name | replace \"a\" \"b\" | upper")
        .unwrap();
    assert_eq!(pipeline.commands.len(), 3);
    assert_eq!(
      pipeline.commands[0].terms,
      vec![Term::Path(vec![String::from("Name")])]
    );
    assert_eq!(
      pipeline.commands[1].terms,
      vec![
        Term::Ident(String::from("replace")),
        Term::Str(String::from("a")),
        Term::Str(String::from("b")),
      ]
    );
  }

  #[test]
  fn parses_literals() {
    let pipeline = parse_expression("eq .A -42").unwrap();
    assert_eq!(
      pipeline.commands[0].terms,
      vec![
        Term::Ident(String::from("eq")),
        Term::Path(vec![String::from("A")]),
        Term::Int(-42),
      ]
    );
    let b = parse_expression("true").unwrap();
    assert_eq!(b.commands[0].terms, vec![Term::Bool(true)]);
  }

  #[test]
  fn rejects_malformed_expressions() {
    assert!(parse_expression("").is_err());
    assert!(parse_expression(".A |").is_err());
    assert!(parse_expression("\"unterminated").is_err());
    assert!(parse_expression(".A.").is_err());
    assert!(parse_expression("@").is_err());
  }

  #[test]
  fn escapes_in_strings() {
    let pipeline =
      parse_expression("\"a\\n\\\"b\\\"\\\\c\"").unwrap();
    assert_eq!(
      pipeline.commands[0].terms,
      vec![Term::Str(String::from("a\n\"b\"\\c"))]
    );
  }
}
