//! scheduler::script
//!
//! Parser for the step language run by the local scheduler.
//!
//! # Grammar
//!
//! ```text
//! script    := statement (SEP statement)*
//! statement := "node" "{" script "}"
//!            | "checkout" "scm"
//!            | "echo" expr
//!            | "semaphore" STRING
//! expr      := STRING | "readFile" "(" STRING ")"
//! SEP       := ";" | newline
//! ```
//!
//! Strings are single- or double-quoted with `\` escapes. `//` starts a
//! comment running to the end of the line. `node` blocks nest at most
//! [`MAX_NESTING`] levels. Anything else is a parse error naming the line; the
//! script never partially runs.

use thiserror::Error;

/// Deepest allowed `node { }` nesting.
pub const MAX_NESTING: usize = 64;

/// A parse failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("script line {line}: {message}")]
pub struct ScriptError {
    /// 1-based line number
    pub line: usize,
    /// What went wrong
    pub message: String,
}

/// One step of a script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Allocate a workspace and run the nested steps in it.
    Node(Vec<Step>),
    /// Check out the branch being built into the current workspace.
    Checkout,
    /// Print a value to the run log.
    Echo(Expr),
    /// Block until the named semaphore is released.
    Semaphore(String),
}

/// A value printed by `echo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// A string literal
    Literal(String),
    /// Contents of a file in the checked-out workspace
    ReadFile(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Str(String),
    LBrace,
    RBrace,
    LParen,
    RParen,
    Sep,
}

/// Parse a script into steps.
///
/// # Example
///
/// ```
/// use pipeline_defaults::scheduler::script::{parse, Expr, Step};
///
/// let steps = parse("semaphore 'wait'; node {checkout scm; echo readFile('file')}").unwrap();
/// assert_eq!(
///     steps,
///     vec![
///         Step::Semaphore("wait".into()),
///         Step::Node(vec![Step::Checkout, Step::Echo(Expr::ReadFile("file".into()))]),
///     ]
/// );
/// ```
pub fn parse(script: &str) -> Result<Vec<Step>, ScriptError> {
    let tokens = tokenize(script)?;
    let mut parser = Parser { tokens, pos: 0 };
    let steps = parser.block(0)?;
    match parser.peek() {
        None => Ok(steps),
        Some((line, _)) => Err(ScriptError {
            line,
            message: "unexpected '}'".to_string(),
        }),
    }
}

fn tokenize(script: &str) -> Result<Vec<(usize, Token)>, ScriptError> {
    let mut tokens = Vec::new();
    let mut chars = script.chars().peekable();
    let mut line = 1;

    while let Some(c) = chars.next() {
        match c {
            '\n' => {
                tokens.push((line, Token::Sep));
                line += 1;
            }
            ';' => tokens.push((line, Token::Sep)),
            '{' => tokens.push((line, Token::LBrace)),
            '}' => tokens.push((line, Token::RBrace)),
            '(' => tokens.push((line, Token::LParen)),
            ')' => tokens.push((line, Token::RParen)),
            '/' if chars.peek() == Some(&'/') => {
                while chars.peek().is_some_and(|&c| c != '\n') {
                    chars.next();
                }
            }
            '\'' | '"' => {
                let quote = c;
                let start = line;
                let mut value = String::new();
                loop {
                    match chars.next() {
                        None => {
                            return Err(ScriptError {
                                line: start,
                                message: "unterminated string".to_string(),
                            })
                        }
                        Some('\\') => match chars.next() {
                            Some('n') => value.push('\n'),
                            Some('t') => value.push('\t'),
                            Some(other) => value.push(other),
                            None => {
                                return Err(ScriptError {
                                    line: start,
                                    message: "unterminated string".to_string(),
                                })
                            }
                        },
                        Some(c) if c == quote => break,
                        Some(c) => {
                            if c == '\n' {
                                line += 1;
                            }
                            value.push(c);
                        }
                    }
                }
                tokens.push((start, Token::Str(value)));
            }
            c if c.is_whitespace() => {}
            c if c.is_ascii_alphabetic() => {
                let mut word = String::from(c);
                while let Some(&next) = chars.peek() {
                    if !next.is_ascii_alphanumeric() && next != '_' {
                        break;
                    }
                    word.push(next);
                    chars.next();
                }
                tokens.push((line, Token::Word(word)));
            }
            other => {
                return Err(ScriptError {
                    line,
                    message: format!("unexpected character '{}'", other),
                })
            }
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<(usize, &Token)> {
        self.tokens.get(self.pos).map(|(line, tok)| (*line, tok))
    }

    fn next(&mut self) -> Option<(usize, Token)> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn last_line(&self) -> usize {
        self.tokens.last().map(|(line, _)| *line).unwrap_or(1)
    }

    fn expect(&mut self, expected: Token, what: &str) -> Result<(), ScriptError> {
        match self.next() {
            Some((_, tok)) if tok == expected => Ok(()),
            Some((line, _)) => Err(ScriptError {
                line,
                message: format!("expected {}", what),
            }),
            None => Err(ScriptError {
                line: self.last_line(),
                message: format!("expected {} before end of script", what),
            }),
        }
    }

    fn string(&mut self, what: &str) -> Result<String, ScriptError> {
        match self.next() {
            Some((_, Token::Str(s))) => Ok(s),
            Some((line, _)) => Err(ScriptError {
                line,
                message: format!("expected a quoted {}", what),
            }),
            None => Err(ScriptError {
                line: self.last_line(),
                message: format!("expected a quoted {} before end of script", what),
            }),
        }
    }

    /// Statements up to a closing brace or the end of input.
    fn block(&mut self, depth: usize) -> Result<Vec<Step>, ScriptError> {
        let mut steps = Vec::new();
        loop {
            let next = self.peek().map(|(_, tok)| tok.clone());
            match next {
                None | Some(Token::RBrace) => return Ok(steps),
                Some(Token::Sep) => {
                    self.pos += 1;
                }
                Some(_) => {
                    steps.push(self.statement(depth)?);
                    match self.peek() {
                        None | Some((_, Token::RBrace)) | Some((_, Token::Sep)) => {}
                        Some((line, _)) => {
                            return Err(ScriptError {
                                line,
                                message: "expected ';' or newline between steps".to_string(),
                            })
                        }
                    }
                }
            }
        }
    }

    fn statement(&mut self, depth: usize) -> Result<Step, ScriptError> {
        let (line, tok) = match self.next() {
            Some(t) => t,
            None => {
                return Err(ScriptError {
                    line: self.last_line(),
                    message: "expected a step".to_string(),
                })
            }
        };

        let word = match tok {
            Token::Word(w) => w,
            _ => {
                return Err(ScriptError {
                    line,
                    message: "expected a step name".to_string(),
                })
            }
        };

        match word.as_str() {
            "node" => {
                if depth >= MAX_NESTING {
                    return Err(ScriptError {
                        line,
                        message: format!("node nesting exceeds {} levels", MAX_NESTING),
                    });
                }
                self.expect(Token::LBrace, "'{' after node")?;
                let body = self.block(depth + 1)?;
                self.expect(Token::RBrace, "'}' closing node")?;
                Ok(Step::Node(body))
            }
            "checkout" => match self.next() {
                Some((_, Token::Word(w))) if w == "scm" => Ok(Step::Checkout),
                _ => Err(ScriptError {
                    line,
                    message: "only 'checkout scm' is supported".to_string(),
                }),
            },
            "echo" => Ok(Step::Echo(self.expr()?)),
            "semaphore" => Ok(Step::Semaphore(self.string("semaphore name")?)),
            other => Err(ScriptError {
                line,
                message: format!("unknown step '{}'", other),
            }),
        }
    }

    fn expr(&mut self) -> Result<Expr, ScriptError> {
        match self.next() {
            Some((_, Token::Str(s))) => Ok(Expr::Literal(s)),
            Some((_, Token::Word(w))) if w == "readFile" => {
                self.expect(Token::LParen, "'(' after readFile")?;
                let path = self.string("file path")?;
                self.expect(Token::RParen, "')' closing readFile")?;
                Ok(Expr::ReadFile(path))
            }
            Some((line, _)) => Err(ScriptError {
                line,
                message: "echo takes a string or readFile(...)".to_string(),
            }),
            None => Err(ScriptError {
                line: self.last_line(),
                message: "echo needs an argument".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiline_script() {
        let steps = parse(
            "// default pipeline\nnode {\n  checkout scm\n  echo \"built\"\n}\n",
        )
        .unwrap();
        assert_eq!(
            steps,
            vec![Step::Node(vec![
                Step::Checkout,
                Step::Echo(Expr::Literal("built".into()))
            ])]
        );
    }

    #[test]
    fn empty_script_is_no_steps() {
        assert!(parse("").unwrap().is_empty());
        assert!(parse("\n;\n").unwrap().is_empty());
        assert_eq!(parse("node {}").unwrap(), vec![Step::Node(vec![])]);
    }

    #[test]
    fn escapes_in_strings() {
        let steps = parse(r#"echo 'it\'s'"#).unwrap();
        assert_eq!(steps, vec![Step::Echo(Expr::Literal("it's".into()))]);
    }

    #[test]
    fn unknown_step_names_line() {
        let err = parse("node {\n  sh 'make'\n}").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.message.contains("sh"));
    }

    #[test]
    fn unbalanced_braces() {
        assert!(parse("node { checkout scm").is_err());
        assert!(parse("checkout scm }").is_err());
    }

    #[test]
    fn missing_separator() {
        let err = parse("checkout scm echo 'x'").unwrap_err();
        assert!(err.message.contains("';'"));
    }

    #[test]
    fn unterminated_string() {
        assert!(parse("echo 'oops").is_err());
    }

    #[test]
    fn nesting_is_capped() {
        let nested = |levels: usize| format!("{}{}", "node {".repeat(levels), "}".repeat(levels));

        assert!(parse(&nested(MAX_NESTING)).is_ok());

        let err = parse(&nested(MAX_NESTING + 1)).unwrap_err();
        assert_eq!(err.message, "node nesting exceeds 64 levels");

        let err = parse(&nested(200_000)).unwrap_err();
        assert!(err.message.contains("nesting"));
    }

    #[test]
    fn checkout_requires_scm() {
        assert!(parse("checkout git").is_err());
    }
}
