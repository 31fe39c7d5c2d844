use std::str::FromStr;

use itertools::Itertools;
use strum::IntoEnumIterator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumString, strum::Display, strum::EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum Keyword {
    Int,
    Pair,
    Pop,
    Push,
    SetFirst,
    SetSecond,
    Collect,
    Print,
    Stats,
    Clear,
}

/// One line of a script. Stack slots are counted from the bottom of the root stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Int(i64),
    Pair,
    Pop,
    Push(usize),
    SetFirst { pair: usize, child: Option<usize> },
    SetSecond { pair: usize, child: Option<usize> },
    Collect,
    Print,
    Stats,
    Clear,
}

fn strip_comment(line: &str) -> &str {
    let end = [line.find('#'), line.find("//")].into_iter().flatten().min().unwrap_or(line.len());
    &line[..end]
}

fn slot(arg: &str) -> Result<usize, String> {
    arg.parse().map_err(|_| format!("Invalid stack slot '{arg}'"))
}

fn child(arg: &str) -> Result<Option<usize>, String> {
    match arg {
        "nil" => Ok(None),
        _ => slot(arg).map(Some),
    }
}

impl Command {
    /// Parses a single line. Blank lines and comments (`#` or `//`) yield `None`.
    pub fn parse(line: &str) -> Result<Option<Command>, String> {
        let mut words = strip_comment(line).split_whitespace();
        let Some(word) = words.next() else {
            return Ok(None);
        };

        let keyword = Keyword::from_str(word).map_err(|_| {
            format!("Unknown command '{word}', expected one of: {}", Keyword::iter().join(", "))
        })?;

        let args = words.collect_vec();
        let arity = |n: usize| {
            if args.len() == n {
                Ok(())
            } else {
                Err(format!("'{keyword}' takes {n} argument(s), got {}", args.len()))
            }
        };

        let command = match keyword {
            Keyword::Int => {
                arity(1)?;
                let value = args[0].parse().map_err(|_| format!("Invalid integer '{}'", args[0]))?;
                Command::Int(value)
            }
            Keyword::Push => {
                arity(1)?;
                Command::Push(slot(args[0])?)
            }
            Keyword::SetFirst => {
                arity(2)?;
                Command::SetFirst { pair: slot(args[0])?, child: child(args[1])? }
            }
            Keyword::SetSecond => {
                arity(2)?;
                Command::SetSecond { pair: slot(args[0])?, child: child(args[1])? }
            }
            Keyword::Pair => arity(0).map(|_| Command::Pair)?,
            Keyword::Pop => arity(0).map(|_| Command::Pop)?,
            Keyword::Collect => arity(0).map(|_| Command::Collect)?,
            Keyword::Print => arity(0).map(|_| Command::Print)?,
            Keyword::Stats => arity(0).map(|_| Command::Stats)?,
            Keyword::Clear => arity(0).map(|_| Command::Clear)?,
        };

        Ok(Some(command))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn commands() {
        assert_eq!(Command::parse("int -12"), Ok(Some(Command::Int(-12))));
        assert_eq!(Command::parse("  pair  "), Ok(Some(Command::Pair)));
        assert_eq!(Command::parse("push 3"), Ok(Some(Command::Push(3))));
        assert_eq!(
            Command::parse("set_second 0 1"),
            Ok(Some(Command::SetSecond { pair: 0, child: Some(1) }))
        );
        assert_eq!(
            Command::parse("set_first 2 nil"),
            Ok(Some(Command::SetFirst { pair: 2, child: None }))
        );
    }

    #[test]
    fn comments_and_blank_lines() {
        assert_eq!(Command::parse(""), Ok(None));
        assert_eq!(Command::parse("# int 1"), Ok(None));
        assert_eq!(Command::parse("// expect: Collected 0 objects, 0 remaining."), Ok(None));
        assert_eq!(Command::parse("collect // expect: something"), Ok(Some(Command::Collect)));
        assert_eq!(Command::parse("int 4 # four"), Ok(Some(Command::Int(4))));
    }

    #[test]
    fn errors() {
        assert_eq!(
            Command::parse("frob"),
            Err("Unknown command 'frob', expected one of: int, pair, pop, push, set_first, \
                 set_second, collect, print, stats, clear"
                .to_string())
        );
        assert_eq!(Command::parse("int"), Err("'int' takes 1 argument(s), got 0".to_string()));
        assert_eq!(Command::parse("pop 1"), Err("'pop' takes 0 argument(s), got 1".to_string()));
        assert_eq!(Command::parse("int x"), Err("Invalid integer 'x'".to_string()));
        assert_eq!(Command::parse("push -1"), Err("Invalid stack slot '-1'".to_string()));
    }
}
