//! Synthetic variations to pad the corpus toward the requested count.
//!
//! Each variant is an existing block with placeholder identifiers swapped,
//! integer literals scaled by one random factor, and the name suffixed with
//! a variation marker. The transforms are purely lexical and deliberately
//! conservative: literal zeros keep their semantics, failure-path lines in
//! error tests are left untouched, and digits glued to identifiers or
//! decimal points are never scaled. Every candidate re-enters through the
//! duplicate screen, so variation can never reintroduce a near-duplicate.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::block::{Corpus, TestBlock, TestKind};
use crate::config::PipelineTuning;
use crate::dedupe;
use crate::language::{declaration_name, TargetLanguage};

/// Identifier pairs swapped wholesale in variant text.
const PLACEHOLDER_SWAPS: &[(&str, &str)] = &[
    ("foo", "bar"),
    ("hello", "world"),
    ("lorem", "ipsum"),
    ("alice", "bob"),
    ("example.com", "example.org"),
];

/// Words that mark a line as carrying failure-path semantics. Lines in an
/// error test that mention any of these are copied verbatim into variants.
const FAILURE_LINE_WORDS: &[&str] = &[
    "divide", "zero", "empty", "null", "none", "invalid", "negative", "error", "throw",
    "raise", "fail", "exception",
];

/// Generate up to `needed` variants from the blocks already in `corpus`,
/// admitting each through the duplicate screen. Sources are visited in
/// shuffled order, one variant attempted per source, no retries. Returns
/// how many variants were admitted.
pub fn pad_with_variations(
    corpus: &mut Corpus,
    needed: usize,
    lang: TargetLanguage,
    tuning: &PipelineTuning,
    rng: &mut StdRng,
) -> usize {
    if needed == 0 || corpus.is_empty() {
        return 0;
    }
    let pool: Vec<TestBlock> = corpus.blocks().to_vec();
    let mut order: Vec<usize> = (0..pool.len()).collect();
    order.shuffle(rng);

    let mut generated = 0usize;
    for &idx in &order {
        if generated >= needed {
            break;
        }
        let source = &pool[idx];
        let factor = rng.random_range(tuning.multiplier_min..=tuning.multiplier_max);
        let Some(candidate) = derive_variant(source, factor, lang) else {
            continue;
        };
        if dedupe::would_accept(corpus, &candidate, tuning.similarity_threshold) {
            corpus.push(candidate);
            generated += 1;
        }
    }
    generated
}

/// Build one variant of `source`. Returns `None` when the transformed text
/// no longer matches the language's declaration shape, which would leave the
/// variant unrenamable.
fn derive_variant(source: &TestBlock, factor: u32, lang: TargetLanguage) -> Option<TestBlock> {
    let swapped = swap_placeholders(&source.full_text);
    let scaled = transform_lines(&swapped, factor, source.kind);

    let marker = lang.variation_marker();
    let caps = lang.declaration_regex().captures(&scaled)?;
    let name_span = declaration_name(&caps)?;
    let name = name_span.as_str();

    let (new_name, full_text) = if name.contains(marker.trim_start()) {
        (name.to_string(), scaled.clone())
    } else {
        let mut renamed = String::with_capacity(scaled.len() + marker.len());
        renamed.push_str(&scaled[..name_span.end()]);
        renamed.push_str(marker);
        renamed.push_str(&scaled[name_span.end()..]);
        (format!("{name}{marker}"), renamed)
    };

    let body = transform_lines(&swap_placeholders(&source.body), factor, source.kind);
    Some(TestBlock::variant_of(source, new_name, body, full_text))
}

fn swap_placeholders(text: &str) -> String {
    let mut out = text.to_string();
    for (from, to) in PLACEHOLDER_SWAPS {
        if out.contains(from) {
            out = out.replace(from, to);
        }
    }
    out
}

/// Scale integer literals line by line with one factor. Failure-path lines
/// of error tests pass through untouched.
fn transform_lines(text: &str, factor: u32, kind: TestKind) -> String {
    let lines: Vec<String> = text
        .lines()
        .map(|line| {
            if kind == TestKind::Error && mentions_failure(line) {
                line.to_string()
            } else {
                scale_line(line, factor)
            }
        })
        .collect();
    lines.join("\n")
}

fn mentions_failure(line: &str) -> bool {
    let lower = line.to_lowercase();
    FAILURE_LINE_WORDS.iter().any(|w| lower.contains(w))
}

/// Multiply standalone integer literals on one line by `factor`. A digit run
/// is standalone when it touches neither a letter nor a decimal point; runs
/// that parse to zero, or whose product would overflow, keep their original
/// text.
fn scale_line(line: &str, factor: u32) -> String {
    let bytes = line.as_bytes();
    let mut out = String::with_capacity(line.len() + 8);
    let mut i = 0;

    while i < bytes.len() {
        if !bytes[i].is_ascii_digit() {
            let start = i;
            while i < bytes.len() && !bytes[i].is_ascii_digit() {
                i += 1;
            }
            out.push_str(&line[start..i]);
            continue;
        }

        let start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        let run = &line[start..i];
        let prev = start.checked_sub(1).map(|p| bytes[p]);
        let next = bytes.get(i).copied();
        let glued = prev.is_some_and(|b| b.is_ascii_alphabetic() || b == b'.')
            || next.is_some_and(|b| b.is_ascii_alphabetic() || b == b'.');
        if glued {
            out.push_str(run);
            continue;
        }

        match run.parse::<u128>() {
            Ok(0) => out.push_str(run),
            Ok(value) => match value.checked_mul(u128::from(factor)) {
                Some(scaled) => out.push_str(&scaled.to_string()),
                None => out.push_str(run),
            },
            Err(_) => out.push_str(run),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    const JS: TargetLanguage = TargetLanguage::JavaScript;

    fn tuning() -> PipelineTuning {
        PipelineTuning::default()
    }

    fn js_block(name: &str, body_line: &str) -> TestBlock {
        TestBlock::new(
            name,
            format!("  {body_line}"),
            format!("test('{name}', () => {{\n  {body_line}\n}});"),
        )
    }

    fn seeded_corpus(names_and_bodies: &[(&str, &str)]) -> Corpus {
        let mut corpus = Corpus::new();
        let blocks = names_and_bodies
            .iter()
            .map(|(n, b)| js_block(n, b))
            .collect();
        dedupe::absorb(&mut corpus, blocks, 0.8);
        corpus
    }

    #[test]
    fn pads_exactly_to_target_with_marker() {
        let mut corpus = seeded_corpus(&[
            ("adds small numbers", "expect(add(2, 3)).toBe(5);"),
            ("multiplies values", "expect(mul(3, 4)).toBe(12);"),
            ("concatenates strings", "expect(cat('a', 'b')).toBe('ab');"),
        ]);
        let mut rng = StdRng::seed_from_u64(7);
        let generated = pad_with_variations(&mut corpus, 2, JS, &tuning(), &mut rng);
        assert_eq!(generated, 2);
        assert_eq!(corpus.len(), 5);
        let variant_names: Vec<_> = corpus
            .names()
            .into_iter()
            .filter(|n| n.ends_with(" variant"))
            .collect();
        assert_eq!(variant_names.len(), 2);
    }

    #[test]
    fn seven_sources_pad_five_to_reach_twelve() {
        let mut corpus = seeded_corpus(&[
            ("adds positive numbers", "expect(add(2, 3)).toBe(5);"),
            ("subtracts larger from smaller", "expect(sub(9, 4)).toBe(5);"),
            ("multiplies by two", "expect(mul(6, 2)).toBe(12);"),
            ("divides evenly", "expect(div(8, 2)).toBe(4);"),
            ("concatenates words", "expect(cat('a', 'b')).toBe('ab');"),
            ("compares magnitudes", "expect(cmp(7, 3)).toBe(1);"),
            ("rounds to nearest ten", "expect(round(14)).toBe(10);"),
        ]);
        assert_eq!(corpus.len(), 7);
        let mut rng = StdRng::seed_from_u64(3);
        let generated = pad_with_variations(&mut corpus, 5, JS, &tuning(), &mut rng);
        assert_eq!(generated, 5);
        assert_eq!(corpus.len(), 12);
        let variants = corpus
            .names()
            .into_iter()
            .filter(|n| n.ends_with(" variant"))
            .count();
        assert_eq!(variants, 5);
    }

    #[test]
    fn same_seed_gives_same_variants() {
        let build = || {
            let mut corpus = seeded_corpus(&[
                ("adds small numbers", "expect(add(2, 3)).toBe(5);"),
                ("multiplies values", "expect(mul(3, 4)).toBe(12);"),
            ]);
            let mut rng = StdRng::seed_from_u64(42);
            pad_with_variations(&mut corpus, 2, JS, &tuning(), &mut rng);
            (
                corpus.names(),
                corpus.blocks().iter().map(|b| b.full_text.clone()).collect::<Vec<_>>(),
            )
        };
        assert_eq!(build(), build());
    }

    #[test]
    fn single_factor_scales_all_literals_in_a_variant() {
        let source = js_block("scales literals", "expect(add(2, 3)).toBe(5);");
        for factor in 2..=5u32 {
            let variant = derive_variant(&source, factor, JS).unwrap();
            let expected = format!(
                "expect(add({}, {})).toBe({});",
                2 * factor,
                3 * factor,
                5 * factor
            );
            assert!(variant.full_text.contains(&expected), "{}", variant.full_text);
        }
    }

    #[test]
    fn literal_zero_is_preserved() {
        let source = js_block("keeps identity", "expect(add(0, 4)).toBe(4);");
        let variant = derive_variant(&source, 3, JS).unwrap();
        assert!(variant.full_text.contains("add(0, 12)"));
        assert!(variant.full_text.contains("toBe(12)"));
    }

    #[test]
    fn error_test_failure_lines_pass_through() {
        let source = TestBlock::new(
            "throws on divide by zero",
            "  expect(() => divide(10, 0)).toThrow('divide by zero');",
            "test('throws on divide by zero', () => {\n  expect(() => divide(10, 0)).toThrow('divide by zero');\n});",
        );
        assert_eq!(source.kind, TestKind::Error);
        let variant = derive_variant(&source, 5, JS).unwrap();
        assert!(variant
            .full_text
            .contains("expect(() => divide(10, 0)).toThrow('divide by zero');"));
        assert_eq!(variant.kind, TestKind::Error);
    }

    #[test]
    fn digits_glued_to_identifiers_or_decimals_stay() {
        assert_eq!(scale_line("const v2 = get2();", 3), "const v2 = get2();");
        assert_eq!(scale_line("expect(avg(1.5, 2.5)).toBe(2.0);", 3), "expect(avg(1.5, 2.5)).toBe(2.0);");
        assert_eq!(scale_line("expect(add(2, 3)).toBe(5);", 2), "expect(add(4, 6)).toBe(10);");
    }

    #[test]
    fn placeholder_identifiers_swap() {
        let source = js_block("renames foo", "expect(foo.value).toBe(1);");
        let variant = derive_variant(&source, 2, JS).unwrap();
        assert!(variant.full_text.contains("bar.value"));
        assert!(!variant.full_text.contains("foo.value"));
    }

    #[test]
    fn rejected_variant_is_not_admitted() {
        // Seed the corpus with a block whose name already equals the variant
        // the single source would produce.
        let mut corpus = seeded_corpus(&[("adds small numbers", "expect(add(2, 3)).toBe(5);")]);
        let occupied = js_block("adds small numbers variant", "anything();");
        dedupe::absorb(&mut corpus, vec![occupied], 0.8);
        let before = corpus.len();
        let mut rng = StdRng::seed_from_u64(1);
        let generated = pad_with_variations(&mut corpus, 1, JS, &tuning(), &mut rng);
        assert_eq!(generated, 0);
        assert_eq!(corpus.len(), before);
    }

    #[test]
    fn variant_full_text_is_still_extractable() {
        let source = js_block("stays parseable", "expect(add(2, 3)).toBe(5);");
        let variant = derive_variant(&source, 4, JS).unwrap();
        let out = crate::extract::extract_blocks(&variant.full_text, JS);
        assert_eq!(out.blocks.len(), 1);
        assert_eq!(out.blocks[0].name, variant.name);
    }
}
