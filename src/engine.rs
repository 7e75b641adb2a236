//! Alignment engine: the full per-run workflow.
//!
//! ## Workflow
//!
//! 1. Validate input (at least 2 drafts, well-formed ids)
//! 2. Group blocks by id across drafts, in first-seen order
//! 3. Per block: tokenize + build format mappings → align → score →
//!    synthesize consensus → reconstruct per-draft display text
//! 4. Assemble the [`AlignmentRun`] report with summary, fingerprint,
//!    and timing
//!
//! Block processing is pure, CPU-bound, and block-independent: no state
//! crosses block boundaries except the run-scoped aligner cache, so a
//! caller needing parallelism can shard blocks across threads and merge
//! the results. A failed block degrades locally and never aborts its
//! siblings; a failed run still returns a structured report carrying
//! everything computed up to the failure.

use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::aligner::{single_draft_alignment, BlockAligner};
use crate::config::{AlignmentConfig, ConfigContractError};
use crate::confidence::{difference_records, ConfidenceScorer};
use crate::consensus::{consensus_document, consensus_text, ConsensusStrategy};
use crate::format_map::FormatMapping;
use crate::reconstruct::FormatReconstructor;
use crate::tokenizer::{build_mapping, formatting_statistics};
use crate::types::{
    validate_drafts, AlignedBlock, AlignmentRun, BlockId, BlockResult, Draft, DraftId, RunSummary,
    ValidationError,
};

/// Fatal engine error: the run cannot start at all.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    /// The configured scoring capability cannot satisfy its contract.
    #[error("Alignment capability unavailable: {0}")]
    Unavailable(#[from] ConfigContractError),
}

/// Engine comparing drafts of one source document.
///
/// Construction checks the configuration against the scoring contract;
/// a config that cannot align is rejected up front rather than failing
/// block by block.
pub struct AlignmentEngine {
    config: AlignmentConfig,
}

impl AlignmentEngine {
    /// Create an engine, verifying the configured scoring capability.
    pub fn new(config: AlignmentConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Engine with the default configuration.
    pub fn with_defaults() -> Self {
        Self {
            config: AlignmentConfig::default(),
        }
    }

    /// The engine's configuration.
    pub fn config(&self) -> &AlignmentConfig {
        &self.config
    }

    /// Run the full alignment workflow over a set of drafts.
    ///
    /// Always returns a structured [`AlignmentRun`]: on validation
    /// failure the report carries `success = false` and the message, and
    /// retains the input content hashes and timing computed before the
    /// rejection.
    pub fn run(&self, drafts: &[Draft], strategy: ConsensusStrategy) -> AlignmentRun {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let start = Instant::now();
        info!(
            run = %run_id,
            drafts = drafts.len(),
            strategy = %strategy,
            config = %self.config.params_hash(),
            "alignment run started"
        );

        let draft_content_hashes: Vec<(DraftId, String)> = drafts
            .iter()
            .map(|d| (d.draft_id.clone(), d.content_hash()))
            .collect();

        match self.try_run(drafts, strategy) {
            Ok(blocks) => {
                let summary = RunSummary::from_blocks(&blocks);
                let block_texts: Vec<String> =
                    blocks.iter().map(|b| b.consensus_text.clone()).collect();
                let elapsed_ms = start.elapsed().as_millis() as u64;
                info!(
                    run = %run_id,
                    blocks = summary.total_blocks,
                    differences = summary.total_differences,
                    elapsed_ms,
                    "alignment run complete"
                );
                AlignmentRun {
                    success: true,
                    error: None,
                    run_id,
                    started_at,
                    elapsed_ms,
                    consensus_document: consensus_document(&block_texts),
                    blocks,
                    summary,
                    draft_content_hashes,
                }
            }
            Err(error) => {
                let elapsed_ms = start.elapsed().as_millis() as u64;
                warn!(run = %run_id, %error, "alignment run rejected");
                AlignmentRun {
                    success: false,
                    error: Some(error.to_string()),
                    run_id,
                    started_at,
                    elapsed_ms,
                    blocks: Vec::new(),
                    summary: RunSummary::from_blocks(&[]),
                    consensus_document: String::new(),
                    draft_content_hashes,
                }
            }
        }
    }

    fn try_run(
        &self,
        drafts: &[Draft],
        strategy: ConsensusStrategy,
    ) -> Result<Vec<BlockResult>, ValidationError> {
        validate_drafts(drafts)?;

        // Group block texts by id across drafts, first-seen order.
        let mut block_order: Vec<BlockId> = Vec::new();
        let mut contributions: Vec<Vec<(DraftId, String)>> = Vec::new();
        for draft in drafts {
            for block in &draft.blocks {
                let slot = match block_order.iter().position(|id| *id == block.id) {
                    Some(i) => i,
                    None => {
                        block_order.push(block.id.clone());
                        contributions.push(Vec::new());
                        block_order.len() - 1
                    }
                };
                contributions[slot].push((draft.draft_id.clone(), block.text.clone()));
            }
        }
        info!(blocks = block_order.len(), "grouped blocks across drafts");

        let mut aligner = BlockAligner::new(self.config.clone());
        let scorer = ConfidenceScorer::new(&self.config);
        let reconstructor = FormatReconstructor::new();

        let mut results = Vec::with_capacity(block_order.len());
        for (block_id, drafts_for_block) in block_order.into_iter().zip(contributions) {
            let result = self.process_block(
                &block_id,
                &drafts_for_block,
                strategy,
                &mut aligner,
                &scorer,
                &reconstructor,
            )?;
            results.push(result);
        }
        Ok(results)
    }

    fn process_block(
        &self,
        block_id: &BlockId,
        drafts_for_block: &[(DraftId, String)],
        strategy: ConsensusStrategy,
        aligner: &mut BlockAligner,
        scorer: &ConfidenceScorer,
        reconstructor: &FormatReconstructor,
    ) -> Result<BlockResult, ValidationError> {
        // Tokenize every contribution and keep the format mappings for
        // reconstruction.
        let mut tokenized: Vec<(DraftId, Vec<String>)> = Vec::new();
        let mut mappings: Vec<FormatMapping> = Vec::new();
        for (draft_id, text) in drafts_for_block {
            let (tokens, mapping) = build_mapping(draft_id, text);
            debug!(
                block = %block_id,
                draft = %draft_id,
                stats = ?formatting_statistics(&mapping),
                "format mapping built"
            );
            tokenized.push((draft_id.clone(), tokens));
            mappings.push(mapping);
        }

        let aligned: AlignedBlock = if tokenized.len() < 2 {
            warn!(block = %block_id, "block present in only one draft, passing through");
            let (draft_id, tokens) = &tokenized[0];
            single_draft_alignment(block_id, draft_id, tokens)
        } else {
            aligner.align(block_id, &tokenized)?
        };

        let confidence = scorer.score_block(&aligned);
        let consensus = consensus_text(&aligned, &confidence, strategy);
        let differences = difference_records(&aligned, &confidence);
        let reconstructions = aligned
            .aligned_sequences
            .iter()
            .zip(&mappings)
            .map(|(seq, mapping)| (seq.draft_id.clone(), reconstructor.reconstruct(seq, mapping)))
            .collect();

        Ok(BlockResult {
            aligned,
            confidence,
            consensus_text: consensus,
            reconstructions,
            differences,
        })
    }
}
