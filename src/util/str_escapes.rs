use crate::parser::ParseError;
use regex::Regex;
use std::convert::TryFrom;

pub(crate) fn apply_escapes(origin: &str) -> Result<String, ParseError> {
    lazy_static! {
        static ref RE: Regex = Regex::new(r"\\(u\{.+?\}|.)").unwrap();
        static ref BYTECODE: Regex = Regex::new("^[a-fA-F0-9]{1,6}$").unwrap();
    }
    let bad = |sequence: &str| ParseError::BadEscapeSequence {
        sequence: sequence.to_string(),
    };
    // the grammar never lets a literal end with a lone slash
    let mut ret = String::with_capacity(origin.len());
    let mut next_start = 0usize;
    for caps in RE.captures_iter(origin) {
        let Some(whole) = caps.get(0) else { continue };
        ret.push_str(&origin[next_start..whole.start()]);
        next_start = whole.end();

        ret.push({
            if let Some(bytecode) = caps[1].strip_prefix("u{").and_then(|s| s.strip_suffix('}')) {
                if !BYTECODE.is_match(bytecode) {
                    return Err(bad(whole.as_str()));
                }
                u32::from_str_radix(bytecode, 16)
                    .ok()
                    .and_then(|code| char::try_from(code).ok())
                    .ok_or_else(|| bad(whole.as_str()))?
            } else {
                match &caps[1] {
                    "n" => '\n',
                    "t" => '\t',
                    "r" => '\r',
                    "0" => '\0',
                    "\\" => '\\',
                    "\"" => '"',
                    "'" => '\'',
                    _ => return Err(bad(whole.as_str())),
                }
            }
        })
    }
    ret.push_str(&origin[next_start..]);
    ret.shrink_to_fit();
    Ok(ret)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple() {
        assert_eq!(apply_escapes("abc").unwrap(), "abc")
    }

    #[test]
    fn test_complex() {
        assert_eq!(apply_escapes(r"a\nb\'c").unwrap(), "a\nb\'c")
    }

    #[test]
    fn test_slashes() {
        assert_eq!(apply_escapes(r"a\\b\\c").unwrap(), "a\\b\\c")
    }

    #[test]
    fn test_unicode() {
        assert_eq!(apply_escapes(r"a\u{1Ab}b\u{0}c").unwrap(), "a\u{1Ab}b\0c")
    }

    #[test]
    fn test_bad_sequence() {
        assert!(matches!(
            apply_escapes(r"a\qb"),
            Err(ParseError::BadEscapeSequence { .. })
        ))
    }
}
