//! Prompt construction for test generation rounds.

use crate::language::TargetLanguage;

/// Source files larger than this are truncated head-and-tail before being
/// embedded in the prompt.
pub const MAX_SOURCE_CHARS: usize = 24_000;

pub fn system_prompt(lang: TargetLanguage) -> String {
    format!(
        "You are a senior engineer writing {framework} unit tests for {language} code.\n\
         Output only code. No prose, no explanations, no markdown fences.\n\
         Every test must be self-contained and runnable. Cover normal cases, \
         edge cases (empty inputs, zero, boundaries), and error cases \
         (invalid input, exceptions). Use descriptive test names.",
        framework = lang.framework(),
        language = lang.label(),
    )
}

pub fn user_prompt(
    lang: TargetLanguage,
    source: &str,
    source_name: &str,
    count: usize,
    avoid: &[String],
) -> String {
    let mut prompt = format!(
        "Write {count} {framework} tests for this {language} file ({source_name}):\n\n{source}\n\n{shape}",
        count = count,
        framework = lang.framework(),
        language = lang.label(),
        source_name = source_name,
        source = truncate_content(source, MAX_SOURCE_CHARS),
        shape = shape_rules(lang),
    );

    if !avoid.is_empty() {
        prompt.push_str("\n\nDo NOT duplicate any of these existing tests:\n");
        for name in avoid {
            prompt.push_str("- ");
            prompt.push_str(name);
            prompt.push('\n');
        }
    }
    prompt
}

fn shape_rules(lang: TargetLanguage) -> &'static str {
    match lang {
        TargetLanguage::JavaScript | TargetLanguage::TypeScript => {
            "Rules:\n\
             - Each test is a top-level test('...', () => { ... }); call.\n\
             - Do not wrap tests in describe(); the harness adds the wrapper.\n\
             - Put any import/require lines at the top, once each."
        }
        TargetLanguage::Python => {
            "Rules:\n\
             - Each test is a method: def test_xxx(self): using unittest assertions.\n\
             - Do not emit the TestCase class; the harness adds the wrapper.\n\
             - Put any import lines at the top, once each."
        }
        TargetLanguage::Java => {
            "Rules:\n\
             - Each test is an @Test annotated void method using JUnit 5 assertions.\n\
             - Do not emit the surrounding class; the harness adds the wrapper.\n\
             - Put any import lines at the top, once each."
        }
    }
}

/// Head-and-tail truncation for oversized sources.
pub(crate) fn truncate_content(content: &str, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        content.to_string()
    } else {
        let head: String = content.chars().take(max_chars / 2).collect();
        let tail: String = content.chars().rev().take(max_chars / 2).collect::<String>();
        format!(
            "{}\n\n... [truncated] ...\n\n{}",
            head,
            tail.chars().rev().collect::<String>()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn avoid_list_rendered_when_present() {
        let prompt = user_prompt(
            TargetLanguage::JavaScript,
            "const add = (a, b) => a + b;",
            "calc.js",
            5,
            &["adds numbers".to_string()],
        );
        assert!(prompt.contains("Do NOT duplicate"));
        assert!(prompt.contains("- adds numbers"));

        let bare = user_prompt(TargetLanguage::JavaScript, "x", "calc.js", 5, &[]);
        assert!(!bare.contains("Do NOT duplicate"));
    }

    #[test]
    fn prompts_name_the_framework() {
        assert!(system_prompt(TargetLanguage::Python).contains("unittest"));
        assert!(system_prompt(TargetLanguage::Java).contains("JUnit 5"));
        let prompt = user_prompt(TargetLanguage::Python, "def f(): pass", "calc.py", 3, &[]);
        assert!(prompt.contains("def test_xxx(self)"));
    }

    #[test]
    fn oversized_source_truncated_head_and_tail() {
        let source = "a".repeat(30_000);
        let out = truncate_content(&source, MAX_SOURCE_CHARS);
        assert!(out.contains("[truncated]"));
        assert!(out.chars().count() < source.chars().count());
    }
}
