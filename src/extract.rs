//! Test-block extraction from repaired source text.
//!
//! Candidates are located with the language's declaration matcher, then each
//! body is walked to its true end: brace depth for braced languages, dedent
//! for Python. All delimiter counting is gated by the scan map so braces in
//! strings and comments never confuse the walk. A candidate that cannot be
//! closed is dropped with a warning; extraction never fails outright.

use crate::block::TestBlock;
use crate::error::PipelineWarning;
use crate::language::{declaration_name, BlockStyle, TargetLanguage};
use crate::scan::{scan, ScanMap};

#[derive(Debug, Default)]
pub struct ExtractOutcome {
    pub blocks: Vec<TestBlock>,
    pub warnings: Vec<PipelineWarning>,
}

/// Pull every well-formed test block out of `text`.
///
/// Declarations nested inside an already-extracted block are left where they
/// are; they ship as part of the enclosing block's body.
pub fn extract_blocks(text: &str, lang: TargetLanguage) -> ExtractOutcome {
    let map = scan(text, &lang.lexical_profile());
    let re = lang.declaration_regex();
    let mut outcome = ExtractOutcome::default();
    let mut cursor = 0usize;

    for caps in re.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        // A declaration whose body start falls inside the previous block is
        // nested; it stays part of that block.
        if whole.end() <= cursor {
            continue;
        }
        if !map.is_code(whole.start()) {
            continue;
        }
        let Some(name) = declaration_name(&caps) else { continue };
        let name = name.as_str().to_string();

        let parsed = match lang.block_style() {
            BlockStyle::Braced => close_braced(text, &map, whole.end()),
            BlockStyle::Indented => {
                let indent = caps.name("indent").map(|m| m.as_str().chars().count()).unwrap_or(0);
                close_indented(text, &map, whole.end(), indent)
            }
        };

        match parsed {
            Ok(span) => {
                let full_text = text[whole.start()..span.end].trim_end().to_string();
                let body = text[whole.end()..span.body_end].trim_end().to_string();
                outcome.blocks.push(TestBlock::new(name, body, full_text));
                cursor = span.end;
            }
            Err(kind) => {
                outcome.warnings.push(match kind {
                    CloseFailure::Unterminated => PipelineWarning::UnterminatedBlock { name },
                    CloseFailure::NoCloser => PipelineWarning::UnclosedBlock { name },
                });
            }
        }
    }
    outcome
}

struct BlockSpan {
    /// End of the whole block, trailing punctuation included.
    end: usize,
    /// End of the body proper, before the closing delimiter.
    body_end: usize,
}

enum CloseFailure {
    /// A string or comment was still open when input ran out.
    Unterminated,
    /// Input ended before the brace depth returned to zero.
    NoCloser,
}

/// Walk from just past the opening brace (depth 1) to the brace that brings
/// depth back to zero, then extend past closing punctuation.
fn close_braced(text: &str, map: &ScanMap, body_start: usize) -> Result<BlockSpan, CloseFailure> {
    let bytes = text.as_bytes();
    let mut depth = 1u32;
    let mut close = None;
    let mut i = body_start;
    while i < bytes.len() {
        if map.is_code(i) {
            match bytes[i] {
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        close = Some(i);
                        break;
                    }
                }
                _ => {}
            }
        }
        i += 1;
    }

    let Some(close) = close else {
        return Err(if map.ends_in_code() {
            CloseFailure::NoCloser
        } else {
            CloseFailure::Unterminated
        });
    };

    // Take the call-closing paren and statement terminator along with the
    // block, e.g. the `);` of a Jest `});`.
    let mut end = close + 1;
    while end < bytes.len() {
        match bytes[end] {
            b')' | b';' => end += 1,
            b' ' | b'\t' | b'\r' | b'\n' => end += 1,
            _ => break,
        }
    }
    Ok(BlockSpan {
        end,
        body_end: close,
    })
}

/// Walk line by line from the end of the declaration to the first code line
/// at or below the declaration's indent. Blank lines, comment lines, and
/// string continuations never terminate the suite.
fn close_indented(
    text: &str,
    map: &ScanMap,
    body_start: usize,
    decl_indent: usize,
) -> Result<BlockSpan, CloseFailure> {
    let mut pos = body_start;
    let mut end = text.len();

    while pos < text.len() {
        let line_end = text[pos..]
            .find('\n')
            .map(|k| pos + k + 1)
            .unwrap_or(text.len());
        let line = text[pos..line_end].trim_end_matches(['\n', '\r']);

        let mut indent = 0usize;
        let mut first_non_ws = None;
        for (byte_idx, c) in line.char_indices() {
            if c.is_whitespace() {
                indent += 1;
            } else {
                first_non_ws = Some(byte_idx);
                break;
            }
        }
        let Some(byte_idx) = first_non_ws else {
            pos = line_end;
            continue;
        };
        if map.is_code(pos + byte_idx) && indent <= decl_indent {
            end = pos;
            break;
        }
        pos = line_end;
    }

    if end == text.len() && !map.ends_in_code() {
        return Err(CloseFailure::Unterminated);
    }
    Ok(BlockSpan {
        end,
        body_end: end,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::TestKind;
    use crate::scan::delimiter_balance;

    const JS: TargetLanguage = TargetLanguage::JavaScript;
    const PY: TargetLanguage = TargetLanguage::Python;
    const JAVA: TargetLanguage = TargetLanguage::Java;

    #[test]
    fn extracts_two_js_tests_with_names_and_bodies() {
        let text = "\
test('adds two numbers', () => {
  expect(add(1, 2)).toBe(3);
});

it('subtracts', () => {
  expect(sub(5, 2)).toBe(3);
});
";
        let out = extract_blocks(text, JS);
        assert_eq!(out.blocks.len(), 2);
        assert_eq!(out.blocks[0].name, "adds two numbers");
        assert_eq!(out.blocks[1].name, "subtracts");
        assert!(out.blocks[0].body.contains("toBe(3)"));
        assert!(out.blocks[0].full_text.ends_with("});"));
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn extracts_js_tests_across_quote_styles() {
        let text = "\
test('single quoted', () => {
  a();
});
test(\"double quoted\", () => {
  b();
});
test(`template quoted`, () => {
  c();
});
";
        let out = extract_blocks(text, JS);
        let names: Vec<&str> = out.blocks.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["single quoted", "double quoted", "template quoted"]);
    }

    #[test]
    fn nested_braces_and_strings_stay_inside_the_block() {
        let text = "\
test('handles objects', () => {
  const o = { a: '{', b: \"}\" };
  if (o.a) { check(o); }
});
";
        let out = extract_blocks(text, JS);
        assert_eq!(out.blocks.len(), 1);
        let full = &out.blocks[0].full_text;
        assert!(full.contains("check(o)"));
        let map = scan(full, &JS.lexical_profile());
        assert_eq!(delimiter_balance(full, &map, b'{', b'}'), 0);
    }

    #[test]
    fn declaration_inside_comment_is_skipped() {
        let text = "\
/*
test('ghost', () => {
  nope();
});
*/
test('real', () => {
  yes();
});
";
        let out = extract_blocks(text, JS);
        assert_eq!(out.blocks.len(), 1);
        assert_eq!(out.blocks[0].name, "real");
    }

    #[test]
    fn unclosed_block_is_dropped_with_warning_and_rest_survive() {
        let text = "\
test('complete', () => {
  ok();
});
test('truncated', () => {
  expect(x).toBe(
";
        let out = extract_blocks(text, JS);
        assert_eq!(out.blocks.len(), 1);
        assert_eq!(out.blocks[0].name, "complete");
        assert_eq!(out.warnings.len(), 1);
        assert!(out.warnings[0].to_string().contains("truncated"));
    }

    #[test]
    fn unterminated_string_classified_separately() {
        let text = "test('broken', () => {\n  const s = 'never closed\n";
        let out = extract_blocks(text, JS);
        assert!(out.blocks.is_empty());
        assert!(matches!(
            out.warnings[0],
            PipelineWarning::UnterminatedBlock { .. }
        ));
    }

    #[test]
    fn nested_test_ships_inside_enclosing_block() {
        let text = "\
test('outer', () => {
  test('inner', () => {
    x();
  });
});
";
        let out = extract_blocks(text, JS);
        assert_eq!(out.blocks.len(), 1);
        assert_eq!(out.blocks[0].name, "outer");
        assert!(out.blocks[0].body.contains("inner"));
    }

    #[test]
    fn java_test_method_with_modifiers_and_throws() {
        let text = "\
    @Test
    public void testDivideByZeroThrows() throws Exception {
        assertThrows(ArithmeticException.class, () -> calc.divide(1, 0));
    }
";
        let out = extract_blocks(text, JAVA);
        assert_eq!(out.blocks.len(), 1);
        assert_eq!(out.blocks[0].name, "testDivideByZeroThrows");
        assert_eq!(out.blocks[0].kind, TestKind::Error);
    }

    #[test]
    fn python_block_ends_at_dedent() {
        let text = "\
def test_add():
    result = add(1, 2)
    assert result == 3

def test_sub():
    assert sub(5, 2) == 3
";
        let out = extract_blocks(text, PY);
        assert_eq!(out.blocks.len(), 2);
        assert_eq!(out.blocks[0].name, "test_add");
        assert!(out.blocks[0].full_text.ends_with("assert result == 3"));
        assert!(!out.blocks[0].full_text.contains("test_sub"));
    }

    #[test]
    fn python_blank_and_comment_lines_do_not_terminate() {
        let text = "\
def test_multiline():
    a = 1

    # still inside
    b = 2
x = done()
";
        let out = extract_blocks(text, PY);
        assert_eq!(out.blocks.len(), 1);
        assert!(out.blocks[0].full_text.contains("still inside"));
        assert!(out.blocks[0].full_text.ends_with("b = 2"));
    }

    #[test]
    fn python_docstring_lines_stay_in_block() {
        let text = "\
def test_doc():
    s = '''
text at column zero
'''
    assert s
final = True
";
        let out = extract_blocks(text, PY);
        assert_eq!(out.blocks.len(), 1);
        assert!(out.blocks[0].full_text.contains("column zero"));
        assert!(out.blocks[0].full_text.ends_with("assert s"));
    }

    #[test]
    fn python_method_indent_respected() {
        let text = "\
class TestCalc(unittest.TestCase):
    def test_one(self):
        self.assertEqual(add(1, 1), 2)

    def test_two(self):
        self.assertEqual(add(2, 2), 4)
";
        let out = extract_blocks(text, PY);
        assert_eq!(out.blocks.len(), 2);
        assert!(out.blocks[0].full_text.contains("assertEqual(add(1, 1), 2)"));
        assert!(!out.blocks[0].full_text.contains("test_two"));
    }

    #[test]
    fn python_block_at_end_of_input() {
        let text = "def test_last():\n    assert True";
        let out = extract_blocks(text, PY);
        assert_eq!(out.blocks.len(), 1);
        assert_eq!(out.blocks[0].full_text, "def test_last():\n    assert True");
    }

    #[test]
    fn fake_declaration_inside_docstring_skipped() {
        let text = "\
s = '''
def test_fake():
    pass
'''
def test_real():
    assert True
";
        let out = extract_blocks(text, PY);
        assert_eq!(out.blocks.len(), 1);
        assert_eq!(out.blocks[0].name, "test_real");
    }
}
