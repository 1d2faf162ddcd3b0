//! String extension.
//!
//! All indices are code-point positions, not byte offsets.
//!
//! # Functions
//!
//! - `charAt(index)` - one-character string; `index == size` gives `""`
//! - `indexOf(sub)` / `indexOf(sub, offset)` - first occurrence or -1
//! - `lastIndexOf(sub)` / `lastIndexOf(sub, offset)` - last occurrence
//!   starting at or before `offset`, or -1
//! - `lowerAscii()`, `upperAscii()` - ASCII-only case mapping
//! - `replace(old, new)` / `replace(old, new, n)` - negative `n` replaces all
//! - `split(sep)` / `split(sep, n)` - at most `n` parts; negative is unlimited
//! - `substring(start)` / `substring(start, end)`
//! - `trim()` - strip leading and trailing whitespace
//! - `reverse()` - reverse by code point
//! - `join()` / `join(sep)` - on a list of strings
//! - `strings.quote(string)` - double-quoted with escapes

use super::{arg, expect_int, expect_list, expect_str};
use crate::error::{EvalError, Result};
use crate::extension::Extension;
use crate::functions::Function;
use crate::value::{Kind, Value};

#[derive(Debug, Clone, Copy, Default)]
pub struct StringsExtension;

impl Extension for StringsExtension {
    fn name(&self) -> &str {
        "strings"
    }

    fn functions(&self) -> Vec<Function> {
        vec![
            Function::new("charAt").with_overload(vec![Kind::String, Kind::Int], |_, args| {
                let s = expect_str(arg(args, 0)?)?;
                let idx = code_point_index(s, expect_int(arg(args, 1)?)?)?;
                Ok(Value::string(
                    s.chars().nth(idx).map(String::from).unwrap_or_default(),
                ))
            }),
            index_of(),
            last_index_of(),
            map_str("lowerAscii", str::to_ascii_lowercase),
            map_str("upperAscii", str::to_ascii_uppercase),
            replace(),
            split(),
            substring(),
            map_str("trim", |s| s.trim().to_string()),
            map_str("reverse", |s| s.chars().rev().collect()),
            join(),
            map_str("strings.quote", quote),
        ]
    }
}

/// Validate `index` as a position in `0..=len` code points.
fn code_point_index(s: &str, index: i64) -> Result<usize> {
    let len = s.chars().count();
    match usize::try_from(index) {
        Ok(i) if i <= len => Ok(i),
        _ => Err(EvalError::out_of_range(format!("index out of range: {}", index)).into()),
    }
}

fn byte_offset(s: &str, code_point: usize) -> usize {
    s.char_indices()
        .nth(code_point)
        .map_or(s.len(), |(offset, _)| offset)
}

fn code_points_before(s: &str, byte: usize) -> i64 {
    s[..byte].chars().count() as i64
}

fn map_str(name: &str, apply: fn(&str) -> String) -> Function {
    Function::new(name).with_overload(vec![Kind::String], move |_, args| {
        Ok(Value::string(apply(expect_str(arg(args, 0)?)?)))
    })
}

fn index_of() -> Function {
    fn search(s: &str, sub: &str, from: usize) -> Value {
        let start = byte_offset(s, from);
        Value::Int(
            s[start..]
                .find(sub)
                .map_or(-1, |found| code_points_before(s, start + found)),
        )
    }

    Function::new("indexOf")
        .with_overload(vec![Kind::String, Kind::String], |_, args| {
            let (s, sub) = (expect_str(arg(args, 0)?)?, expect_str(arg(args, 1)?)?);
            Ok(search(s, sub, 0))
        })
        .with_overload(vec![Kind::String, Kind::String, Kind::Int], |_, args| {
            let (s, sub) = (expect_str(arg(args, 0)?)?, expect_str(arg(args, 1)?)?);
            let from = code_point_index(s, expect_int(arg(args, 2)?)?)?;
            Ok(search(s, sub, from))
        })
}

fn last_index_of() -> Function {
    // Matches may start at `from` at the latest.
    fn search(s: &str, sub: &str, from: usize) -> Value {
        let end = byte_offset(s, from + sub.chars().count());
        Value::Int(
            s[..end]
                .rfind(sub)
                .map_or(-1, |found| code_points_before(s, found)),
        )
    }

    Function::new("lastIndexOf")
        .with_overload(vec![Kind::String, Kind::String], |_, args| {
            let (s, sub) = (expect_str(arg(args, 0)?)?, expect_str(arg(args, 1)?)?);
            Ok(search(s, sub, s.chars().count()))
        })
        .with_overload(vec![Kind::String, Kind::String, Kind::Int], |_, args| {
            let (s, sub) = (expect_str(arg(args, 0)?)?, expect_str(arg(args, 1)?)?);
            let from = code_point_index(s, expect_int(arg(args, 2)?)?)?;
            Ok(search(s, sub, from))
        })
}

fn replace() -> Function {
    fn apply(s: &str, old: &str, new: &str, limit: i64) -> Value {
        match usize::try_from(limit) {
            Ok(n) => Value::string(s.replacen(old, new, n)),
            Err(_) => Value::string(s.replace(old, new)),
        }
    }

    Function::new("replace")
        .with_overload(vec![Kind::String, Kind::String, Kind::String], |_, args| {
            let s = expect_str(arg(args, 0)?)?;
            Ok(apply(s, expect_str(arg(args, 1)?)?, expect_str(arg(args, 2)?)?, -1))
        })
        .with_overload(
            vec![Kind::String, Kind::String, Kind::String, Kind::Int],
            |_, args| {
                let s = expect_str(arg(args, 0)?)?;
                let limit = expect_int(arg(args, 3)?)?;
                Ok(apply(s, expect_str(arg(args, 1)?)?, expect_str(arg(args, 2)?)?, limit))
            },
        )
}

fn split() -> Function {
    fn parts<'a>(pieces: impl Iterator<Item = &'a str>) -> Value {
        Value::list(pieces.map(Value::string).collect::<Vec<_>>())
    }

    Function::new("split")
        .with_overload(vec![Kind::String, Kind::String], |_, args| {
            let (s, sep) = (expect_str(arg(args, 0)?)?, expect_str(arg(args, 1)?)?);
            Ok(parts(s.split(sep)))
        })
        .with_overload(vec![Kind::String, Kind::String, Kind::Int], |_, args| {
            let (s, sep) = (expect_str(arg(args, 0)?)?, expect_str(arg(args, 1)?)?);
            Ok(match usize::try_from(expect_int(arg(args, 2)?)?) {
                Ok(n) => parts(s.splitn(n, sep)),
                Err(_) => parts(s.split(sep)),
            })
        })
}

fn substring() -> Function {
    Function::new("substring")
        .with_overload(vec![Kind::String, Kind::Int], |_, args| {
            let s = expect_str(arg(args, 0)?)?;
            let start = code_point_index(s, expect_int(arg(args, 1)?)?)?;
            Ok(Value::string(&s[byte_offset(s, start)..]))
        })
        .with_overload(vec![Kind::String, Kind::Int, Kind::Int], |_, args| {
            let s = expect_str(arg(args, 0)?)?;
            let start = code_point_index(s, expect_int(arg(args, 1)?)?)?;
            let end = code_point_index(s, expect_int(arg(args, 2)?)?)?;
            if start > end {
                return Err(EvalError::out_of_range(format!(
                    "invalid substring range. start: {}, end: {}",
                    start, end
                ))
                .into());
            }
            Ok(Value::string(&s[byte_offset(s, start)..byte_offset(s, end)]))
        })
}

fn join() -> Function {
    fn apply(items: &[Value], sep: &str) -> Result<Value> {
        let parts = items
            .iter()
            .map(|item| {
                item.as_string().ok_or_else(|| {
                    EvalError::invalid_argument(format!("join() expects strings, got {}", item.kind()))
                })
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Value::string(parts.join(sep)))
    }

    Function::new("join")
        .with_overload(vec![Kind::List], |_, args| apply(expect_list(arg(args, 0)?)?, ""))
        .with_overload(vec![Kind::List, Kind::String], |_, args| {
            apply(expect_list(arg(args, 0)?)?, expect_str(arg(args, 1)?)?)
        })
}

fn quote(s: &str) -> String {
    let mut quoted = String::with_capacity(s.len() + 2);
    quoted.push('"');
    for c in s.chars() {
        match c {
            '\x07' => quoted.push_str("\\a"),
            '\x08' => quoted.push_str("\\b"),
            '\x0C' => quoted.push_str("\\f"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            '\x0B' => quoted.push_str("\\v"),
            '\\' => quoted.push_str("\\\\"),
            '"' => quoted.push_str("\\\""),
            _ => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EvalErrorKind;
    use crate::runtime::RuntimeBuilder;

    fn call(name: &str, args: &[Value]) -> Result<Value> {
        let runtime = RuntimeBuilder::new()
            .with_extension(StringsExtension)
            .build()
            .unwrap();
        runtime.functions().call(name, &(0..0), args).map(|out| out.value)
    }

    fn s(v: &str) -> Value {
        Value::string(v)
    }

    #[test]
    fn test_char_at() {
        assert_eq!(call("charAt", &[s("héllo"), Value::Int(1)]).unwrap(), s("é"));
        assert_eq!(call("charAt", &[s("abc"), Value::Int(3)]).unwrap(), s(""));
        let err = call("charAt", &[s("abc"), Value::Int(4)]).unwrap_err();
        assert_eq!(err.as_eval().unwrap().kind, EvalErrorKind::OutOfRange);
        assert!(err.to_string().contains("index out of range: 4"));
    }

    #[test]
    fn test_index_of_counts_code_points() {
        assert_eq!(call("indexOf", &[s("añob"), s("b")]).unwrap(), Value::Int(3));
        assert_eq!(call("indexOf", &[s("abcabc"), s("c"), Value::Int(3)]).unwrap(), Value::Int(5));
        assert_eq!(call("indexOf", &[s("abc"), s("")]).unwrap(), Value::Int(0));
        assert_eq!(call("indexOf", &[s("abc"), s("z")]).unwrap(), Value::Int(-1));
    }

    #[test]
    fn test_last_index_of() {
        assert_eq!(call("lastIndexOf", &[s("abcabc"), s("bc")]).unwrap(), Value::Int(4));
        assert_eq!(
            call("lastIndexOf", &[s("abcabc"), s("bc"), Value::Int(3)]).unwrap(),
            Value::Int(1)
        );
        assert_eq!(call("lastIndexOf", &[s("abc"), s("")]).unwrap(), Value::Int(3));
    }

    #[test]
    fn test_replace_and_split_limits() {
        assert_eq!(call("replace", &[s("aaa"), s("a"), s("b")]).unwrap(), s("bbb"));
        assert_eq!(
            call("replace", &[s("aaa"), s("a"), s("b"), Value::Int(2)]).unwrap(),
            s("bba")
        );
        assert_eq!(
            call("split", &[s("a,b,c"), s(","), Value::Int(2)]).unwrap(),
            Value::list(vec![s("a"), s("b,c")])
        );
        assert_eq!(
            call("split", &[s("a,b"), s(","), Value::Int(0)]).unwrap(),
            Value::list(vec![])
        );
    }

    #[test]
    fn test_substring() {
        assert_eq!(call("substring", &[s("tacocat"), Value::Int(4)]).unwrap(), s("cat"));
        assert_eq!(
            call("substring", &[s("tacocat"), Value::Int(0), Value::Int(4)]).unwrap(),
            s("taco")
        );
        let err = call("substring", &[s("abc"), Value::Int(2), Value::Int(1)]).unwrap_err();
        assert_eq!(err.as_eval().unwrap().kind, EvalErrorKind::OutOfRange);
    }

    #[test]
    fn test_join_and_quote() {
        let list = Value::list(vec![s("x"), s("y")]);
        assert_eq!(call("join", &[list.clone()]).unwrap(), s("xy"));
        assert_eq!(call("join", &[list, s("-")]).unwrap(), s("x-y"));
        let err = call("join", &[Value::list(vec![Value::Int(1)])]).unwrap_err();
        assert_eq!(err.as_eval().unwrap().kind, EvalErrorKind::InvalidArgument);

        assert_eq!(call("strings.quote", &[s("a\"b\n")]).unwrap(), s("\"a\\\"b\\n\""));
    }

    #[test]
    fn test_case_trim_reverse() {
        assert_eq!(call("upperAscii", &[s("héllo")]).unwrap(), s("HéLLO"));
        assert_eq!(call("trim", &[s("  x \n")]).unwrap(), s("x"));
        assert_eq!(call("reverse", &[s("añb")]).unwrap(), s("bña"));
    }
}
