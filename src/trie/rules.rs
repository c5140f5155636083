//! Pattern rules and the fail-closed rule compiler.
//!
//! A rule sequence is a run of literal bytes optionally ending in one
//! matching primitive. The compiler understands literals, `\x` escapes, `.`
//! and single-interval classes (`[a-z]`, `[a]`). Quantifiers, grouping,
//! anchors and alternation are rejected rather than approximated.

use thiserror::Error;

/// One position of a pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    /// One exact byte.
    Literal(u8),
    /// Any byte.
    Any,
    /// Any byte in `min..=max`.
    Range { min: u8, max: u8 },
    /// One or more repetitions of the inner rule.
    Repeat(Box<Rule>),
}

impl Rule {
    pub fn is_literal(&self) -> bool {
        matches!(self, Rule::Literal(_))
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleError {
    #[error("pattern is empty")]
    Empty,

    #[error("unsupported operator '{}' at byte {position}", char::from(*byte))]
    Unsupported { byte: u8, position: usize },

    #[error("character class opened at byte {position} is never closed")]
    UnterminatedClass { position: usize },

    #[error("character class at byte {position} is empty")]
    EmptyClass { position: usize },

    #[error("character class at byte {position} is not a single interval")]
    MultiIntervalClass { position: usize },

    #[error("pattern ends with a dangling escape")]
    TrailingEscape,

    #[error("matching primitive at rule {position} must be the last element of a pattern")]
    PrimitiveNotLast { position: usize },
}

const ESCAPE: u8 = b'\\';
const OPEN_CLASS: u8 = b'[';
const CLOSE_CLASS: u8 = b']';
const ANY: u8 = b'.';
const UNSUPPORTED: &[u8] = b"*+?,()^$|";

/// Compile pattern bytes into a rule sequence.
pub fn compile(pattern: &[u8]) -> Result<Vec<Rule>, RuleError> {
    if pattern.is_empty() {
        return Err(RuleError::Empty);
    }

    let mut rules = Vec::with_capacity(pattern.len());
    let mut pos = 0;

    while pos < pattern.len() {
        let byte = pattern[pos];
        match byte {
            ESCAPE => {
                let escaped = *pattern.get(pos + 1).ok_or(RuleError::TrailingEscape)?;
                rules.push(Rule::Literal(escaped));
                pos += 2;
            }
            ANY => {
                rules.push(Rule::Any);
                pos += 1;
            }
            OPEN_CLASS => {
                let (rule, next) = compile_class(pattern, pos)?;
                rules.push(rule);
                pos = next;
            }
            b if UNSUPPORTED.contains(&b) => {
                return Err(RuleError::Unsupported { byte, position: pos });
            }
            _ => {
                rules.push(Rule::Literal(byte));
                pos += 1;
            }
        }
    }

    validate(&rules)?;
    Ok(rules)
}

/// Check that only the final rule is a matching primitive.
pub fn validate(rules: &[Rule]) -> Result<(), RuleError> {
    if rules.is_empty() {
        return Err(RuleError::Empty);
    }
    let last = rules.len() - 1;
    if let Some(position) = rules[..last].iter().position(|rule| !rule.is_literal()) {
        return Err(RuleError::PrimitiveNotLast { position });
    }
    Ok(())
}

/// Parse a class starting at `open`; returns the rule and the index after `]`.
fn compile_class(pattern: &[u8], open: usize) -> Result<(Rule, usize), RuleError> {
    let mut body = Vec::new();
    let mut pos = open + 1;

    loop {
        match pattern.get(pos) {
            None => return Err(RuleError::UnterminatedClass { position: open }),
            Some(&CLOSE_CLASS) => break,
            Some(&ESCAPE) => {
                let escaped = *pattern.get(pos + 1).ok_or(RuleError::TrailingEscape)?;
                body.push(escaped);
                pos += 2;
            }
            Some(&byte) => {
                body.push(byte);
                pos += 1;
            }
        }
    }

    let rule = match body.as_slice() {
        [] => return Err(RuleError::EmptyClass { position: open }),
        [single] => Rule::Range {
            min: *single,
            max: *single,
        },
        [min, b'-', max] if min <= max => Rule::Range {
            min: *min,
            max: *max,
        },
        _ => return Err(RuleError::MultiIntervalClass { position: open }),
    };

    Ok((rule, pos + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_literals_and_escapes() {
        let rules = compile(br"a\.b").unwrap();
        assert_eq!(
            rules,
            vec![Rule::Literal(b'a'), Rule::Literal(b'.'), Rule::Literal(b'b')]
        );
    }

    #[test]
    fn test_compile_trailing_wildcard() {
        let rules = compile(b"id.").unwrap();
        assert_eq!(rules.last(), Some(&Rule::Any));
    }

    #[test]
    fn test_compile_class() {
        let rules = compile(b"v[0-9]").unwrap();
        assert_eq!(rules[1], Rule::Range { min: b'0', max: b'9' });

        let rules = compile(b"x[q]").unwrap();
        assert_eq!(rules[1], Rule::Range { min: b'q', max: b'q' });
    }

    #[test]
    fn test_rejects_quantifiers_and_groups() {
        for pattern in [&b"a+"[..], b"a*", b"(ab)", b"^a", b"a|b", b"a,"] {
            assert!(
                matches!(compile(pattern), Err(RuleError::Unsupported { .. })),
                "expected rejection for {:?}",
                String::from_utf8_lossy(pattern)
            );
        }
    }

    #[test]
    fn test_rejects_primitive_before_end() {
        assert_eq!(
            compile(b"a.b"),
            Err(RuleError::PrimitiveNotLast { position: 1 })
        );
    }

    #[test]
    fn test_rejects_malformed_classes() {
        assert_eq!(
            compile(b"a[b-"),
            Err(RuleError::UnterminatedClass { position: 1 })
        );
        assert_eq!(compile(b"a[]"), Err(RuleError::EmptyClass { position: 1 }));
        assert_eq!(
            compile(b"a[abc]"),
            Err(RuleError::MultiIntervalClass { position: 1 })
        );
        assert_eq!(
            compile(b"a[z-a]"),
            Err(RuleError::MultiIntervalClass { position: 1 })
        );
    }

    #[test]
    fn test_rejects_empty_and_dangling_escape() {
        assert_eq!(compile(b""), Err(RuleError::Empty));
        assert_eq!(compile(b"ab\\"), Err(RuleError::TrailingEscape));
    }
}
