//! Target-language knowledge: lexical profiles, test-declaration shapes,
//! import detection, and canonical output conventions.
//!
//! Everything language-specific the pipeline needs lives behind
//! [`TargetLanguage`] so the extraction and rebuild passes stay generic.

use std::path::Path;

use regex::{Captures, Match, Regex};
use serde::Serialize;

use crate::scan::LexicalProfile;

/// How a language delimits a test body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStyle {
    /// Body enclosed in `{ ... }`; extraction counts brace depth.
    Braced,
    /// Body is the indented suite after the declaration; extraction ends at
    /// the first code line at or below the declaration's indent.
    Indented,
}

/// Languages the pipeline can produce test files for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetLanguage {
    JavaScript,
    TypeScript,
    Python,
    Java,
}

impl TargetLanguage {
    pub fn label(&self) -> &'static str {
        match self {
            TargetLanguage::JavaScript => "JavaScript",
            TargetLanguage::TypeScript => "TypeScript",
            TargetLanguage::Python => "Python",
            TargetLanguage::Java => "Java",
        }
    }

    /// Test framework the canonical output targets.
    pub fn framework(&self) -> &'static str {
        match self {
            TargetLanguage::JavaScript | TargetLanguage::TypeScript => "Jest",
            TargetLanguage::Python => "unittest",
            TargetLanguage::Java => "JUnit 5",
        }
    }

    /// Detect from a source file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        match ext {
            "js" | "jsx" | "mjs" | "cjs" => Some(TargetLanguage::JavaScript),
            "ts" | "tsx" | "mts" => Some(TargetLanguage::TypeScript),
            "py" => Some(TargetLanguage::Python),
            "java" => Some(TargetLanguage::Java),
            _ => None,
        }
    }

    pub fn block_style(&self) -> BlockStyle {
        match self {
            TargetLanguage::Python => BlockStyle::Indented,
            _ => BlockStyle::Braced,
        }
    }

    pub fn lexical_profile(&self) -> LexicalProfile {
        match self {
            TargetLanguage::JavaScript | TargetLanguage::TypeScript => LexicalProfile {
                line_comment: "//",
                block_comment: Some(("/*", "*/")),
                template_strings: true,
                triple_single: false,
                triple_double: false,
            },
            TargetLanguage::Python => LexicalProfile {
                line_comment: "#",
                block_comment: None,
                template_strings: false,
                triple_single: true,
                triple_double: true,
            },
            TargetLanguage::Java => LexicalProfile {
                line_comment: "//",
                block_comment: Some(("/*", "*/")),
                template_strings: false,
                triple_single: false,
                triple_double: true,
            },
        }
    }

    /// Matcher for the start of a test declaration, anchored at line start.
    ///
    /// Capture group names must be unique within one pattern, so the JS/TS
    /// arm names a separate group per quote style; [`declaration_name`]
    /// resolves whichever one matched. For braced languages the match ends
    /// immediately after the opening `{`; for Python it ends after the colon
    /// line so the body starts on the next line.
    pub fn declaration_regex(&self) -> Regex {
        let pattern = match self {
            TargetLanguage::JavaScript | TargetLanguage::TypeScript => {
                r#"(?m)^[ \t]*(?:test|it)\s*\(\s*(?:'(?P<name>[^'\n]+)'|"(?P<name2>[^"\n]+)"|`(?P<name3>[^`\n]+)`)\s*,\s*(?:async\s+)?(?:\([^)]*\)\s*=>|function\s*\([^)]*\))\s*\{"#
            }
            TargetLanguage::Python => {
                r"(?m)^(?P<indent>[ \t]*)(?:async\s+)?def\s+(?P<name>test\w*)\s*\([^)]*\)\s*(?:->\s*[^:\n]+)?:[ \t]*(?:#[^\n]*)?\r?\n"
            }
            TargetLanguage::Java => {
                r"(?m)^[ \t]*@Test\s*(?:\([^)]*\))?\s*(?:(?:public|protected|private|static|final)\s+)*void\s+(?P<name>\w+)\s*\([^)]*\)\s*(?:throws\s+[\w.,\s]+?)?\{"
            }
        };
        // Patterns are compile-time constants; Regex::new cannot fail on them.
        Regex::new(pattern).unwrap()
    }

    /// Matcher for the file-level wrapper construct in canonical output.
    pub fn wrapper_regex(&self) -> Regex {
        let pattern = match self {
            TargetLanguage::JavaScript | TargetLanguage::TypeScript => r"(?m)^describe\s*\(",
            TargetLanguage::Python => r"(?m)^class\s+\w+\s*\(",
            TargetLanguage::Java => r"(?m)^(?:public\s+)?(?:final\s+)?class\s+\w+",
        };
        Regex::new(pattern).unwrap()
    }

    /// Whether a single line is an import/require statement.
    pub fn is_import_line(&self, line: &str) -> bool {
        let trimmed = line.trim_start();
        match self {
            TargetLanguage::JavaScript | TargetLanguage::TypeScript => {
                starts_with_word(trimmed, "import")
                    || ((starts_with_word(trimmed, "const")
                        || starts_with_word(trimmed, "let")
                        || starts_with_word(trimmed, "var"))
                        && trimmed.contains("require("))
            }
            TargetLanguage::Python => {
                starts_with_word(trimmed, "import") || starts_with_word(trimmed, "from")
            }
            TargetLanguage::Java => starts_with_word(trimmed, "import"),
        }
    }

    /// Declaration-keyword rewrites applied by the normalization pass. Each
    /// pair is (pattern, replacement); patterns never match their own output,
    /// which is what makes the pass idempotent.
    pub fn declaration_synonyms(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            TargetLanguage::JavaScript | TargetLanguage::TypeScript => &[
                (r"(?m)^([ \t]*)(?:Test|TEST|testcase|test_case)\s*\(", "${1}test("),
                (r"(?m)^([ \t]*)(?:It|IT)\s*\(", "${1}it("),
                (r"(?m)^([ \t]*)test\.only\s*\(", "${1}test("),
                (r"(?m)^([ \t]*)it\.only\s*\(", "${1}it("),
                (r"(?m)^([ \t]*)(?:fit|xit)\s*\(", "${1}it("),
                (r"(?m)^([ \t]*)(?:xtest|ftest)\s*\(", "${1}test("),
            ],
            TargetLanguage::Python => &[
                (r"(?m)^([ \t]*(?:async\s+)?def\s+)Test_", "${1}test_"),
                (r"(?m)^([ \t]*(?:async\s+)?def\s+)TEST_", "${1}test_"),
            ],
            TargetLanguage::Java => &[(r"(?m)^([ \t]*)@(?:test|TEST)\b", "${1}@Test")],
        }
    }

    /// Suffix appended to a variation's name so it reads as intentional.
    pub fn variation_marker(&self) -> &'static str {
        match self {
            TargetLanguage::JavaScript | TargetLanguage::TypeScript => " variant",
            TargetLanguage::Python | TargetLanguage::Java => "_variant",
        }
    }

    /// Opening line of the file-level wrapper in canonical output.
    pub fn wrapper_open(&self, title: &str) -> String {
        match self {
            TargetLanguage::JavaScript | TargetLanguage::TypeScript => {
                format!("describe('{title}', () => {{")
            }
            TargetLanguage::Python => format!("class {title}(unittest.TestCase):"),
            TargetLanguage::Java => format!("public class {title} {{"),
        }
    }

    /// Closing line of the wrapper, when the language needs one.
    pub fn wrapper_close(&self) -> Option<&'static str> {
        match self {
            TargetLanguage::JavaScript | TargetLanguage::TypeScript => Some("});"),
            TargetLanguage::Python => None,
            TargetLanguage::Java => Some("}"),
        }
    }

    /// Indentation unit for canonical output.
    pub fn indent_unit(&self) -> &'static str {
        match self {
            TargetLanguage::JavaScript | TargetLanguage::TypeScript => "  ",
            TargetLanguage::Python | TargetLanguage::Java => "    ",
        }
    }

    /// Conventional test-file name for a source file stem.
    pub fn test_file_name(&self, stem: &str) -> String {
        match self {
            TargetLanguage::JavaScript => format!("{stem}.test.js"),
            TargetLanguage::TypeScript => format!("{stem}.test.ts"),
            TargetLanguage::Python => format!("test_{stem}.py"),
            TargetLanguage::Java => format!("{}Test.java", type_name(stem)),
        }
    }

    /// Title for the file-level wrapper: the describe string, class name, or
    /// TestCase name derived from a source file stem.
    pub fn wrapper_title(&self, stem: &str) -> String {
        match self {
            TargetLanguage::JavaScript | TargetLanguage::TypeScript => type_name(stem),
            TargetLanguage::Python => format!("Test{}", type_name(stem)),
            TargetLanguage::Java => format!("{}Test", type_name(stem)),
        }
    }
}

impl std::fmt::Display for TargetLanguage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// The declared name from a [`TargetLanguage::declaration_regex`] match,
/// whichever quote-style group matched.
pub fn declaration_name<'t>(caps: &Captures<'t>) -> Option<Match<'t>> {
    caps.name("name")
        .or_else(|| caps.name("name2"))
        .or_else(|| caps.name("name3"))
}

fn starts_with_word(s: &str, word: &str) -> bool {
    s.strip_prefix(word)
        .is_some_and(|rest| !rest.starts_with(|c: char| c.is_alphanumeric() || c == '_'))
}

/// Upper-camel identifier from a file stem: `string_utils` -> `StringUtils`.
fn type_name(stem: &str) -> String {
    let mut out = String::with_capacity(stem.len());
    let mut upper_next = true;
    for c in stem.chars() {
        if c.is_alphanumeric() {
            if upper_next {
                out.extend(c.to_uppercase());
                upper_next = false;
            } else {
                out.push(c);
            }
        } else {
            upper_next = true;
        }
    }
    if out.is_empty() {
        out.push_str("Generated");
    }
    out
}
