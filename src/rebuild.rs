//! Canonical file assembly: one import section, one wrapper, uniformly
//! re-indented blocks.
//!
//! The rebuilder owns all structure in the output file. Import lines that
//! survived inside block bodies are dropped here (the merged import section
//! is the only place imports appear), and each block is re-indented to the
//! wrapper's convention: flattened two-level indentation for braced
//! languages, relative indentation preserved for Python.

use crate::block::TestBlock;
use crate::language::{BlockStyle, TargetLanguage};
use crate::scan::scan;

/// Assemble the canonical test file.
pub fn rebuild(
    blocks: &[TestBlock],
    import_section: &str,
    lang: TargetLanguage,
    title: &str,
) -> String {
    let mut out = String::new();
    let imports = assemble_imports(import_section, lang);
    if !imports.is_empty() {
        out.push_str(&imports);
        out.push_str("\n\n");
    }

    out.push_str(&lang.wrapper_open(title));
    out.push('\n');

    let rendered: Vec<String> = blocks
        .iter()
        .map(|b| match lang.block_style() {
            BlockStyle::Braced => render_braced(b, lang),
            BlockStyle::Indented => render_indented(b, lang),
        })
        .collect();
    out.push_str(&rendered.join("\n\n"));
    if !rendered.is_empty() {
        out.push('\n');
    }

    if let Some(close) = lang.wrapper_close() {
        out.push_str(close);
        out.push('\n');
    }
    out
}

/// The import section verbatim, except Python always gets `import unittest`
/// since the wrapper relies on it.
fn assemble_imports(import_section: &str, lang: TargetLanguage) -> String {
    let mut lines: Vec<String> = import_section
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(str::to_string)
        .collect();
    if lang == TargetLanguage::Python {
        let have_unittest = lines
            .iter()
            .any(|l| crate::autofix::import_key(l) == "importunittest");
        if !have_unittest {
            lines.insert(0, "import unittest".to_string());
        }
    }
    lines.join("\n")
}

/// Number of leading lines that belong to the declaration, through the line
/// holding the opening delimiter (or the colon for Python, whose match
/// consumes the line-ending newline).
fn declaration_line_count(block: &TestBlock, lang: TargetLanguage) -> usize {
    match lang.declaration_regex().find(&block.full_text) {
        Some(m) => {
            let matched = block.full_text[..m.end()].trim_end_matches(['\r', '\n']);
            matched.matches('\n').count() + 1
        }
        None => 1,
    }
}

/// Flatten a braced block to two indent levels: declaration lines and the
/// final closer at one level, everything between at two. Interior structure
/// deeper than that is intentionally flattened.
fn render_braced(block: &TestBlock, lang: TargetLanguage) -> String {
    let unit = lang.indent_unit();
    let lines: Vec<&str> = block.full_text.lines().collect();
    let decl_lines = declaration_line_count(block, lang).min(lines.len());
    let map = scan(&block.full_text, &lang.lexical_profile());

    let mut rendered: Vec<String> = Vec::with_capacity(lines.len());
    let mut offset = 0usize;
    let mut balance = 0i64;

    for (idx, line) in lines.iter().enumerate() {
        let trimmed = line.trim();
        let mut delta = 0i64;
        for (i, b) in line.bytes().enumerate() {
            if map.is_code(offset + i) {
                match b {
                    b'{' => delta += 1,
                    b'}' => delta -= 1,
                    _ => {}
                }
            }
        }
        let first_byte = line.len() - line.trim_start().len();
        let code_line = map.is_code(offset + first_byte);
        balance += delta;
        offset += line.len() + 1;

        if !code_line && idx >= decl_lines {
            // Inside a template literal or block comment: the exact text is
            // significant, keep the line as is.
            rendered.push((*line).to_string());
            continue;
        }

        let is_last = idx + 1 == lines.len();
        if trimmed.is_empty() {
            if !is_last && idx >= decl_lines {
                rendered.push(String::new());
            }
        } else if lang.is_import_line(trimmed) {
            // Imports live in the file header only.
        } else if closers_only(trimmed) && balance < 0 {
            // A closing-only line with nothing left open is an orphan; drop
            // it and back its closers out of the running balance.
            balance -= delta;
        } else if idx < decl_lines || (is_last && closers_only(trimmed)) {
            rendered.push(format!("{unit}{trimmed}"));
        } else {
            rendered.push(format!("{unit}{unit}{trimmed}"));
        }
    }
    rendered.join("\n")
}

/// Re-indent a Python block under the wrapper class: declaration at one
/// level, body shifted so its shallowest line sits at two levels, deeper
/// nesting preserved relative to that.
fn render_indented(block: &TestBlock, lang: TargetLanguage) -> String {
    let unit = lang.indent_unit();
    let lines: Vec<&str> = block.full_text.lines().collect();
    let decl_lines = declaration_line_count(block, lang).min(lines.len());
    let map = scan(&block.full_text, &lang.lexical_profile());

    // Shallowest code-mode body line sets the shift; string continuation
    // lines may legitimately sit at column zero and must not distort it.
    let mut offset = 0usize;
    let mut min_indent = usize::MAX;
    for (idx, line) in lines.iter().enumerate() {
        let in_body = idx >= decl_lines;
        let content = line.trim();
        if in_body && !content.is_empty() && !lang.is_import_line(content) {
            let ws = crate::util::indent_width(line);
            let first_byte = line.len() - line.trim_start().len();
            if map.is_code(offset + first_byte) {
                min_indent = min_indent.min(ws);
            }
        }
        offset += line.len() + 1;
    }
    let min_indent = if min_indent == usize::MAX { 0 } else { min_indent };

    let mut rendered: Vec<String> = Vec::with_capacity(lines.len());
    let mut offset = 0usize;
    for (idx, line) in lines.iter().enumerate() {
        let content = line.trim();
        let first_byte = line.len() - line.trim_start().len();
        let code_line = map.is_code(offset + first_byte);
        offset += line.len() + 1;

        if idx < decl_lines {
            rendered.push(format!("{unit}{}", content));
            continue;
        }
        if content.is_empty() {
            rendered.push(String::new());
            continue;
        }
        if code_line && lang.is_import_line(content) {
            continue;
        }
        if !code_line {
            // Inside a multi-line string: indentation is significant, keep
            // the line byte-for-byte.
            rendered.push((*line).to_string());
            continue;
        }
        let shifted: String = line.chars().skip(min_indent).collect();
        rendered.push(format!("{unit}{unit}{shifted}"));
    }

    while rendered.last().is_some_and(|l| l.is_empty()) {
        rendered.pop();
    }
    rendered.join("\n")
}

fn closers_only(trimmed: &str) -> bool {
    !trimmed.is_empty() && trimmed.chars().all(|c| matches!(c, '}' | ')' | ';' | ','))
}
