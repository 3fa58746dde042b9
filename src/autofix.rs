//! Mechanical repair passes for raw model output.
//!
//! Order matters: markdown fences come off first, then declaration keywords
//! are normalized, duplicate imports dropped, and finally orphaned closing
//! delimiters removed. Every pass is idempotent, so running the whole suite
//! twice produces byte-identical output. None of the passes attempt to parse
//! the language; they are all lexical, guided by [`crate::scan`] where
//! delimiter positions matter.

use std::collections::HashSet;

use regex::Regex;

use crate::language::{BlockStyle, TargetLanguage};
use crate::scan::scan;

/// Run the full fix suite in canonical order.
pub fn apply_fixes(text: &str, lang: TargetLanguage) -> String {
    let stripped = strip_code_fences(text);
    let normalized = normalize_declarations(&stripped, lang);
    let deduped = dedupe_imports(&normalized, lang);
    remove_orphan_closers(&deduped, lang)
}

/// Keep only the contents of markdown code fences, dropping the fences and
/// any prose around or between them. Text without fences passes through
/// untouched. An unclosed final fence keeps everything after its opener.
pub fn strip_code_fences(text: &str) -> String {
    if !text.lines().any(is_fence_line) {
        return text.to_string();
    }
    let mut inside = false;
    let mut kept: Vec<&str> = Vec::new();
    for line in text.lines() {
        if is_fence_line(line) {
            inside = !inside;
            continue;
        }
        if inside {
            kept.push(line);
        }
    }
    let mut result = kept.join("\n");
    if !result.is_empty() {
        result.push('\n');
    }
    result
}

fn is_fence_line(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("```") || trimmed.starts_with("~~~")
}

/// Rewrite declaration-keyword synonyms to the framework's canonical form,
/// e.g. `Test(` to `test(` for Jest or `@test` to `@Test` for JUnit.
pub fn normalize_declarations(text: &str, lang: TargetLanguage) -> String {
    let mut current = text.to_string();
    for (pattern, replacement) in lang.declaration_synonyms() {
        // Synonym patterns are compile-time constants.
        let re = Regex::new(pattern).unwrap();
        if re.is_match(&current) {
            current = re.replace_all(&current, *replacement).into_owned();
        }
    }
    current
}

/// Drop repeated import statements, keeping the first occurrence. Statements
/// are compared with all whitespace removed, so spacing variants of the same
/// import collapse.
pub fn dedupe_imports(text: &str, lang: TargetLanguage) -> String {
    let mut seen = HashSet::new();
    let mut kept: Vec<&str> = Vec::new();
    for line in text.lines() {
        if lang.is_import_line(line) && !seen.insert(import_key(line)) {
            continue;
        }
        kept.push(line);
    }
    let mut result = kept.join("\n");
    if text.ends_with('\n') {
        result.push('\n');
    }
    result
}

/// Whitespace-free form of an import line, the key for duplicate detection.
pub fn import_key(line: &str) -> String {
    line.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Delete closing delimiters that have no matching opener, plus any stray
/// punctuation trailing them on the same line. Only code-mode delimiters
/// count; braces inside strings and comments are never touched. No-op for
/// indentation-delimited languages.
pub fn remove_orphan_closers(text: &str, lang: TargetLanguage) -> String {
    if lang.block_style() != BlockStyle::Braced {
        return text.to_string();
    }
    let map = scan(text, &lang.lexical_profile());
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut out = String::with_capacity(text.len());
    let mut balance: i64 = 0;
    let mut k = 0;

    while k < chars.len() {
        let (offset, c) = chars[k];
        if !map.is_code(offset) {
            out.push(c);
            k += 1;
            continue;
        }
        match c {
            '{' => {
                balance += 1;
                out.push(c);
                k += 1;
            }
            '}' if balance == 0 => {
                // Orphan: drop it and any stray punctuation through the end
                // of its line.
                k += 1;
                while k < chars.len() {
                    let (_, trailing) = chars[k];
                    if trailing == '\n' {
                        k += 1;
                        break;
                    }
                    if matches!(trailing, ')' | ';' | ',' | ' ' | '\t' | '\r') {
                        k += 1;
                    } else {
                        break;
                    }
                }
            }
            '}' => {
                balance -= 1;
                out.push(c);
                k += 1;
            }
            _ => {
                out.push(c);
                k += 1;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const JS: TargetLanguage = TargetLanguage::JavaScript;
    const PY: TargetLanguage = TargetLanguage::Python;
    const JAVA: TargetLanguage = TargetLanguage::Java;

    #[test]
    fn fences_and_prose_are_stripped() {
        let raw = "Here are the tests:\n```javascript\nconst x = 1;\n```\nHope that helps!";
        assert_eq!(strip_code_fences(raw), "const x = 1;\n");
    }

    #[test]
    fn unclosed_fence_keeps_tail() {
        let raw = "intro\n```js\nline1\nline2";
        assert_eq!(strip_code_fences(raw), "line1\nline2\n");
    }

    #[test]
    fn text_without_fences_passes_through() {
        let raw = "const x = 1;\nconst y = 2;";
        assert_eq!(strip_code_fences(raw), raw);
    }

    #[test]
    fn multiple_fences_concatenate() {
        let raw = "```js\na();\n```\nand also\n```js\nb();\n```";
        assert_eq!(strip_code_fences(raw), "a();\nb();\n");
    }

    #[test]
    fn declaration_synonyms_normalize() {
        assert_eq!(
            normalize_declarations("Test('x', () => {", JS),
            "test('x', () => {"
        );
        assert_eq!(
            normalize_declarations("  test.only('x', () => {", JS),
            "  test('x', () => {"
        );
        assert_eq!(normalize_declarations("fit('x', () => {", JS), "it('x', () => {");
        assert_eq!(normalize_declarations("@test\nvoid x() {", JAVA), "@Test\nvoid x() {");
        assert_eq!(
            normalize_declarations("def Test_add():\n", PY),
            "def test_add():\n"
        );
    }

    #[test]
    fn normalization_leaves_canonical_forms_alone() {
        let canonical = "test('x', () => {\nit('y', () => {";
        assert_eq!(normalize_declarations(canonical, JS), canonical);
    }

    #[test]
    fn duplicate_imports_collapse_across_whitespace() {
        let text = "const { add } = require('./calc');\nconst {add} = require('./calc');\ncode();";
        let fixed = dedupe_imports(text, JS);
        assert_eq!(fixed, "const { add } = require('./calc');\ncode();");
    }

    #[test]
    fn first_import_occurrence_wins() {
        let text = "import unittest\nimport os\nimport unittest\n";
        assert_eq!(dedupe_imports(text, PY), "import unittest\nimport os\n");
    }

    #[test]
    fn distinct_imports_survive() {
        let text = "import a from 'a';\nimport b from 'b';";
        assert_eq!(dedupe_imports(text, JS), text);
    }

    #[test]
    fn orphan_closer_line_is_removed() {
        let text = "test('x', () => {\n  expect(1).toBe(1);\n});\n});\n";
        let fixed = remove_orphan_closers(text, JS);
        assert_eq!(fixed, "test('x', () => {\n  expect(1).toBe(1);\n});\n");
    }

    #[test]
    fn brace_in_string_not_treated_as_orphan() {
        let text = "const s = \"}\";\nconst t = '}';\n";
        assert_eq!(remove_orphan_closers(text, JS), text);
    }

    #[test]
    fn balanced_text_is_untouched() {
        let text = "test('x', () => {\n  if (a) { b(); }\n});\n";
        assert_eq!(remove_orphan_closers(text, JS), text);
    }

    #[test]
    fn python_is_exempt_from_orphan_removal() {
        let text = "def test_x():\n    pass\n}\n";
        assert_eq!(remove_orphan_closers(text, PY), text);
    }

    #[test]
    fn stray_closer_between_blocks_does_not_block_extraction() {
        let raw = "test('a', () => {\n  expect(1).toBe(1);\n});\n});\ntest('b', () => {\n  expect(2).toBe(2);\n});\n";
        let fixed = apply_fixes(raw, JS);
        let outcome = crate::extract::extract_blocks(&fixed, JS);
        let names: Vec<&str> = outcome.blocks.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn fix_suite_is_idempotent() {
        let raw = "```javascript\nimport { add } from './calc';\nimport {add} from './calc';\nTest('adds', () => {\n  expect(add(1, 2)).toBe(3);\n});\n});\n```";
        let once = apply_fixes(raw, JS);
        let twice = apply_fixes(&once, JS);
        assert_eq!(once, twice);
        assert!(once.contains("test('adds'"));
        assert_eq!(once.matches("import").count(), 1);
        assert_eq!(once.matches("});").count(), 1);
    }
}
