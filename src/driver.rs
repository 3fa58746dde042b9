//! Round-based orchestration: prompt, repair, extract, deduplicate, pad,
//! rebuild, check.
//!
//! Each generation round asks the service only for the tests still missing
//! and tells it which names already exist. Rounds degrade independently: a
//! response that yields nothing becomes a warning, a failed call becomes a
//! warning plus a classified error held in reserve, and the run only fails
//! outright when every round is spent and the corpus is still empty.

use std::collections::HashSet;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;

use crate::autofix;
use crate::block::{Corpus, TestBlock};
use crate::config::{Config, PipelineTuning};
use crate::dedupe;
use crate::error::{PipelineWarning, ServiceError};
use crate::extract;
use crate::language::TargetLanguage;
use crate::llm::{self, prompts, Usage};
use crate::rebuild::rebuild;
use crate::util;
use crate::validate::validate;
use crate::variation;

pub const DEFAULT_COUNT: usize = 12;
pub const DEFAULT_ROUNDS: u32 = 3;

/// Everything one generation run needs as input.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub language: TargetLanguage,
    /// Source file contents the tests should target.
    pub source: String,
    /// Display name of the source file, used in prompts.
    pub source_name: String,
    /// Wrapper title for the output file.
    pub title: String,
    pub count: usize,
    pub rounds: u32,
    /// Fixed RNG seed for reproducible variation; `None` seeds from the OS.
    pub seed: Option<u64>,
}

/// Offline repair of text already in hand.
#[derive(Debug, Clone)]
pub struct RepairRequest {
    pub language: TargetLanguage,
    pub raw: String,
    pub title: String,
    /// Pad or trim to this count when set; otherwise keep every unique test.
    pub count: Option<usize>,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct GenerationMetrics {
    pub requested: usize,
    pub unique_count: usize,
    pub duplicates_removed: usize,
    pub variations_generated: usize,
    pub attempts: u32,
}

#[derive(Debug, Serialize)]
pub struct GenerationResult {
    pub language: TargetLanguage,
    pub blocks: Vec<TestBlock>,
    pub import_section: String,
    /// The finished test file.
    pub canonical_text: String,
    pub metrics: GenerationMetrics,
    pub warnings: Vec<String>,
    pub usage: Option<Usage>,
    pub created_at: DateTime<Utc>,
}

/// Accumulates corpus, imports, and warnings across rounds.
#[derive(Default)]
struct Assembly {
    corpus: Corpus,
    imports: Vec<String>,
    import_keys: HashSet<String>,
    warnings: Vec<PipelineWarning>,
}

struct IngestOutcome {
    extracted: usize,
    duplicates: usize,
}

impl Assembly {
    /// Run one raw response through the repair passes, fold its imports into
    /// the shared section (first spelling wins), and absorb its blocks.
    fn ingest(&mut self, raw: &str, lang: TargetLanguage, tuning: &PipelineTuning) -> IngestOutcome {
        let fixed = autofix::apply_fixes(raw, lang);
        for line in fixed.lines() {
            if lang.is_import_line(line) && self.import_keys.insert(autofix::import_key(line)) {
                self.imports.push(line.trim().to_string());
            }
        }
        let extraction = extract::extract_blocks(&fixed, lang);
        let extracted = extraction.blocks.len();
        self.warnings.extend(extraction.warnings);
        let outcome = dedupe::absorb(&mut self.corpus, extraction.blocks, tuning.similarity_threshold);
        IngestOutcome {
            extracted,
            duplicates: outcome.duplicates,
        }
    }
}

/// Generate a test file by calling the generation service for up to
/// `req.rounds` rounds, then padding with variations if the corpus is still
/// short of `req.count`.
pub async fn generate(req: &GenerationRequest, config: &Config) -> Result<GenerationResult> {
    let api_key = config.get_api_key().ok_or(ServiceError::MissingApiKey)?;
    let model_id = config.model_id();
    let tuning = config.tuning();
    let mut rng = seeded_rng(req.seed);
    let target = req.count.max(1);

    let mut asm = Assembly::default();
    let mut metrics = GenerationMetrics {
        requested: target,
        ..Default::default()
    };
    let mut usage: Option<Usage> = None;
    let mut last_error: Option<ServiceError> = None;
    let mut prev_hash: Option<String> = None;

    let system = prompts::system_prompt(req.language);
    for round in 1..=req.rounds.max(1) {
        if asm.corpus.len() >= target {
            break;
        }
        let user = prompts::user_prompt(
            req.language,
            &req.source,
            &req.source_name,
            target - asm.corpus.len(),
            &asm.corpus.names(),
        );

        match llm::generate(&system, &user, &model_id, &api_key).await {
            Ok(response) => {
                metrics.attempts = round;
                usage = Usage::merge(usage.take(), response.usage.clone());
                log::debug!(
                    "round {}: {} chars from {}",
                    round,
                    response.content.len(),
                    response.model
                );

                let hash = util::hash_str(&response.content);
                if prev_hash.as_deref() == Some(hash.as_str()) {
                    log::info!("round {} repeated the previous response verbatim", round);
                }
                prev_hash = Some(hash);

                let outcome = asm.ingest(&response.content, req.language, &tuning);
                metrics.duplicates_removed += outcome.duplicates;
                if outcome.extracted == 0 {
                    asm.warnings.push(PipelineWarning::NothingExtracted { round });
                }
            }
            Err(err) => {
                metrics.attempts = round;
                asm.warnings.push(PipelineWarning::RoundFailed {
                    round,
                    message: err.to_string(),
                });
                let recoverable = err.is_retryable();
                last_error = Some(err);
                if !recoverable {
                    break;
                }
            }
        }
    }

    if asm.corpus.is_empty() {
        return match last_error {
            Some(err) => {
                Err(anyhow::Error::new(err).context("generation produced no usable tests"))
            }
            None => Err(anyhow!(
                "the model produced no extractable test blocks in {} round(s)",
                metrics.attempts.max(1)
            )),
        };
    }

    Ok(finalize(
        asm,
        req.language,
        &req.title,
        Some(target),
        &tuning,
        &mut rng,
        metrics,
        usage,
    ))
}

/// Repair raw text offline: same pipeline, no service calls.
pub fn repair(req: &RepairRequest, config: &Config) -> Result<GenerationResult> {
    let tuning = config.tuning();
    let mut rng = seeded_rng(req.seed);

    let mut asm = Assembly::default();
    let outcome = asm.ingest(&req.raw, req.language, &tuning);
    if asm.corpus.is_empty() {
        return Err(anyhow!("no test blocks could be extracted from the input"))
            .context("repair produced nothing usable");
    }
    let metrics = GenerationMetrics {
        requested: req.count.unwrap_or(asm.corpus.len()),
        duplicates_removed: outcome.duplicates,
        ..Default::default()
    };
    Ok(finalize(
        asm,
        req.language,
        &req.title,
        req.count,
        &tuning,
        &mut rng,
        metrics,
        None,
    ))
}

fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

/// Pad, trim, rebuild, and check. Shared tail of both entry points.
#[allow(clippy::too_many_arguments)]
fn finalize(
    mut asm: Assembly,
    lang: TargetLanguage,
    title: &str,
    target: Option<usize>,
    tuning: &PipelineTuning,
    rng: &mut StdRng,
    mut metrics: GenerationMetrics,
    usage: Option<Usage>,
) -> GenerationResult {
    if let Some(target) = target {
        if asm.corpus.len() < target {
            let needed = target - asm.corpus.len();
            metrics.variations_generated =
                variation::pad_with_variations(&mut asm.corpus, needed, lang, tuning, rng);
            if asm.corpus.len() < target {
                asm.warnings.push(PipelineWarning::UnderTarget {
                    requested: target,
                    produced: asm.corpus.len(),
                });
            }
        }
        asm.corpus.truncate_to(target);
    }
    metrics.unique_count = asm.corpus.len();

    let import_section = asm.imports.join("\n");
    let canonical_text = rebuild(asm.corpus.blocks(), &import_section, lang, title);
    for violation in validate(&canonical_text, lang) {
        asm.warnings.push(PipelineWarning::OutputCheck(violation.to_string()));
    }

    GenerationResult {
        language: lang,
        blocks: asm.corpus.into_blocks(),
        import_section,
        canonical_text,
        metrics,
        warnings: asm.warnings.iter().map(ToString::to_string).collect(),
        usage,
        created_at: Utc::now(),
    }
}
