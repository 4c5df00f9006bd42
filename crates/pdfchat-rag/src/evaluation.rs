//! Groundedness evaluation over a query dataset
//!
//! Each dataset row is answered by the grounded responder, then an evaluation
//! model rates the answer against the documents that grounded it. Failed rows
//! are reported, not fatal.

use futures::stream::{self, StreamExt};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use pdfchat_core::{ChatModel, Error, Result, SourceDocument};

use crate::{GroundedAnswer, KnowledgeBase, PromptTemplate};

const GROUNDEDNESS: &str = include_str!("../assets/groundedness.prompty");

pub const DEFAULT_EVAL_DATA: &str = "assets/chat_eval_data.jsonl";
pub const DEFAULT_EVAL_OUTPUT: &str = "./myevalresults.json";

/// One dataset line
#[derive(Debug, Clone, Deserialize)]
pub struct EvaluationInput {
    /// 1-based line in the dataset file
    #[serde(skip)]
    pub line_number: usize,
    pub query: String,
}

impl EvaluationInput {
    pub fn new(line_number: usize, query: impl Into<String>) -> Self {
        Self {
            line_number,
            query: query.into(),
        }
    }
}

/// Score and explanation returned by the evaluation model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundednessScore {
    pub groundedness: u8,
    pub reason: String,
}

/// Rates answers with a chat model
pub struct GroundednessEvaluator {
    model: Arc<dyn ChatModel>,
    prompt: PromptTemplate,
}

impl GroundednessEvaluator {
    pub fn new(model: Arc<dyn ChatModel>) -> Result<Self> {
        Ok(Self {
            model,
            prompt: PromptTemplate::parse(GROUNDEDNESS)?,
        })
    }

    pub async fn evaluate(
        &self,
        query: &str,
        response: &str,
        context: &[SourceDocument],
    ) -> Result<GroundednessScore> {
        let messages = self.prompt.create_messages(
            context,
            &json!({ "query": query, "response": response }),
        )?;
        let completion = self.model.complete(&messages, &self.prompt.parameters).await?;
        parse_score(&completion.content)
    }
}

const SCORE_PATTERN: &str = r"(?i)score\**\s*[:=]?\s*\**\s*([1-5])\b";
const REASON_PATTERN: &str = r"(?is)reason\s*:\s*(.+)";

/// Read `Score: N` and `Reason: ...` from an evaluation reply
pub fn parse_score(reply: &str) -> Result<GroundednessScore> {
    let score_pattern =
        Regex::new(SCORE_PATTERN).map_err(|e| Error::Other(e.to_string()))?;
    let reason_pattern =
        Regex::new(REASON_PATTERN).map_err(|e| Error::Other(e.to_string()))?;

    let groundedness = score_pattern
        .captures(reply)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<u8>().ok())
        .ok_or_else(|| {
            Error::Inference(format!("evaluation reply has no 1-5 score: {}", reply.trim()))
        })?;

    let reason = reason_pattern
        .captures(reply)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default();

    Ok(GroundednessScore {
        groundedness,
        reason,
    })
}

/// Outcome of one dataset line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationRow {
    pub line_number: usize,
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    pub context: Vec<SourceDocument>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub groundedness: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Summary over all rows
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationMetrics {
    #[serde(rename = "groundedness.groundedness")]
    pub groundedness: Option<f64>,
    pub completed_lines: usize,
    pub failed_lines: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub rows: Vec<EvaluationRow>,
    pub metrics: EvaluationMetrics,
}

impl EvaluationReport {
    fn from_rows(rows: Vec<EvaluationRow>) -> Self {
        let scores: Vec<f64> = rows
            .iter()
            .filter_map(|r| r.groundedness)
            .map(f64::from)
            .collect();
        let groundedness = if scores.is_empty() {
            None
        } else {
            Some(scores.iter().sum::<f64>() / scores.len() as f64)
        };

        let metrics = EvaluationMetrics {
            groundedness,
            completed_lines: scores.len(),
            failed_lines: rows.len() - scores.len(),
        };
        Self { rows, metrics }
    }

    /// Write the report as pretty-printed JSON
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let mut writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }
}

/// Read a JSONL dataset, skipping blank lines
pub fn read_dataset(path: &Path) -> Result<Vec<EvaluationInput>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::InvalidInput(format!("cannot read {}: {}", path.display(), e)))?;

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            let mut input: EvaluationInput = serde_json::from_str(line).map_err(|e| {
                Error::Serialization(format!("{} line {}: {}", path.display(), i + 1, e))
            })?;
            input.line_number = i + 1;
            Ok(input)
        })
        .collect()
}

/// Runs a dataset through the knowledge base and the evaluator
pub struct EvaluationRunner {
    knowledge_base: Arc<KnowledgeBase>,
    evaluator: GroundednessEvaluator,
    index_name: String,
    concurrency: usize,
}

impl EvaluationRunner {
    pub fn new(
        knowledge_base: Arc<KnowledgeBase>,
        evaluator: GroundednessEvaluator,
        index_name: impl Into<String>,
    ) -> Self {
        Self {
            knowledge_base,
            evaluator,
            index_name: index_name.into(),
            concurrency: 1,
        }
    }

    /// Number of rows evaluated at the same time
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub async fn run(&self, inputs: Vec<EvaluationInput>) -> EvaluationReport {
        let rows = stream::iter(inputs)
            .map(|input| self.evaluate_row(input))
            .buffered(self.concurrency)
            .collect::<Vec<_>>()
            .await;

        let report = EvaluationReport::from_rows(rows);
        tracing::info!(
            completed = report.metrics.completed_lines,
            failed = report.metrics.failed_lines,
            "evaluation finished"
        );
        report
    }

    async fn evaluate_row(&self, input: EvaluationInput) -> EvaluationRow {
        let line_number = input.line_number;
        let mut row = EvaluationRow {
            line_number,
            query: input.query,
            response: None,
            context: Vec::new(),
            groundedness: None,
            reason: None,
            error: None,
        };

        let asked = self.knowledge_base.ask(&self.index_name, &row.query).await;
        let answer: GroundedAnswer = match asked {
            Ok(answer) => answer,
            Err(e) => {
                tracing::warn!(line = line_number, error = %e, "query failed");
                row.error = Some(e.to_string());
                return row;
            }
        };
        row.response = Some(answer.message.content.clone());
        row.context = answer.grounding_data;

        let scored = self
            .evaluator
            .evaluate(&row.query, &answer.message.content, &row.context)
            .await;
        match scored {
            Ok(score) => {
                row.groundedness = Some(score.groundedness);
                row.reason = Some(score.reason);
            }
            Err(e) => {
                tracing::warn!(line = line_number, error = %e, "evaluation failed");
                row.error = Some(e.to_string());
            }
        }
        row
    }
}
