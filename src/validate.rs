//! Structural checks on the rebuilt file. Violations are reported, never
//! fixed here, and never block the pipeline; the driver surfaces them as
//! warnings alongside the output.

use std::collections::HashSet;
use std::fmt;

use crate::language::{declaration_name, BlockStyle, TargetLanguage};
use crate::scan::{delimiter_balance, scan};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// Net brace balance over code-mode bytes is off.
    UnbalancedDelimiters { balance: i64 },
    /// A string or comment is still open at end of file.
    UnterminatedSpan,
    /// Expected exactly one file-level wrapper.
    WrapperCount { found: usize },
    /// No test declarations at all.
    NoTests,
    /// Two tests share a normalized name.
    DuplicateName { name: String },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::UnbalancedDelimiters { balance } => {
                write!(f, "unbalanced delimiters (net {balance:+})")
            }
            Violation::UnterminatedSpan => {
                write!(f, "unterminated string or comment at end of file")
            }
            Violation::WrapperCount { found } => {
                write!(f, "expected exactly one wrapper, found {found}")
            }
            Violation::NoTests => write!(f, "no test declarations found"),
            Violation::DuplicateName { name } => {
                write!(f, "duplicate test name '{name}'")
            }
        }
    }
}

/// Check a finished test file. An empty result means the file looks sound.
pub fn validate(text: &str, lang: TargetLanguage) -> Vec<Violation> {
    let map = scan(text, &lang.lexical_profile());
    let mut violations = Vec::new();

    if !map.ends_in_code() {
        violations.push(Violation::UnterminatedSpan);
    }

    if lang.block_style() == BlockStyle::Braced {
        let balance = delimiter_balance(text, &map, b'{', b'}');
        if balance != 0 {
            violations.push(Violation::UnbalancedDelimiters { balance });
        }
    }

    let wrappers = lang
        .wrapper_regex()
        .find_iter(text)
        .filter(|m| map.is_code(m.start()))
        .count();
    if wrappers != 1 {
        violations.push(Violation::WrapperCount { found: wrappers });
    }

    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    let mut declarations = 0usize;
    for caps in lang.declaration_regex().captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        if !map.is_code(whole.start()) {
            continue;
        }
        declarations += 1;
        let Some(name) = declaration_name(&caps) else { continue };
        let key = name.as_str().trim().to_lowercase();
        if !seen.insert(key.clone()) && reported.insert(key) {
            violations.push(Violation::DuplicateName {
                name: name.as_str().to_string(),
            });
        }
    }
    if declarations == 0 {
        violations.push(Violation::NoTests);
    }

    violations
}

#[cfg(test)]
mod tests {
    use super::*;

    const JS: TargetLanguage = TargetLanguage::JavaScript;
    const PY: TargetLanguage = TargetLanguage::Python;

    const CLEAN: &str = "\
describe('Calc', () => {
  test('adds', () => {
    expect(add(1, 2)).toBe(3);
  });

  test('subs', () => {
    expect(sub(5, 2)).toBe(3);
  });
});
";

    #[test]
    fn clean_file_has_no_violations() {
        assert!(validate(CLEAN, JS).is_empty());
    }

    #[test]
    fn detects_unbalanced_delimiters() {
        let text = "describe('X', () => {\n  test('a', () => {\n    f();\n  });\n";
        let violations = validate(text, JS);
        assert!(violations
            .iter()
            .any(|v| matches!(v, Violation::UnbalancedDelimiters { balance: 1 })));
    }

    #[test]
    fn detects_missing_wrapper() {
        let text = "test('a', () => {\n  f();\n});\n";
        let violations = validate(text, JS);
        assert!(violations
            .iter()
            .any(|v| matches!(v, Violation::WrapperCount { found: 0 })));
    }

    #[test]
    fn detects_duplicate_names_once() {
        let text = "\
describe('X', () => {
  test('same', () => {
    a();
  });
  test('Same', () => {
    b();
  });
  test('SAME', () => {
    c();
  });
});
";
        let violations = validate(text, JS);
        let dups: Vec<_> = violations
            .iter()
            .filter(|v| matches!(v, Violation::DuplicateName { .. }))
            .collect();
        assert_eq!(dups.len(), 1);
    }

    #[test]
    fn detects_empty_file() {
        let violations = validate("", JS);
        assert!(violations.contains(&Violation::NoTests));
        assert!(violations
            .iter()
            .any(|v| matches!(v, Violation::WrapperCount { found: 0 })));
    }

    #[test]
    fn python_unterminated_string_reported() {
        let text = "class TestX(unittest.TestCase):\n    def test_a(self):\n        s = '''open\n";
        let violations = validate(text, PY);
        assert!(violations.contains(&Violation::UnterminatedSpan));
    }

    #[test]
    fn brace_inside_string_does_not_fail_balance() {
        let text = "\
describe('X', () => {
  test('brace', () => {
    expect(s).toBe('{');
  });
});
";
        assert!(validate(text, JS).is_empty());
    }
}
