//! Reading and writing benchmark datasets and evaluation results.
//!
//! Question files are CSV with the columns `query, standard_answer, course,
//! material, page_range, question_type`; answered files add `agent_answer`.
//! Evaluation results are written as CSV or JSON depending on the configured
//! [`OutputFormat`].

use crate::config::OutputFormat;
use crate::error::{BenchError, Result};
use crate::eval::{AnsweredRecord, EvaluationRecord, QuestionRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// On-disk row of an answered file. `AnsweredRecord` nests its question,
/// which the CSV reader cannot flatten.
#[derive(Debug, Serialize, Deserialize)]
struct AnsweredRow {
    #[serde(default)]
    query: String,
    #[serde(default)]
    standard_answer: String,
    #[serde(default)]
    course: String,
    #[serde(default)]
    material: String,
    #[serde(default)]
    page_range: String,
    #[serde(default)]
    question_type: String,
    #[serde(default)]
    agent_answer: String,
}

impl From<AnsweredRow> for AnsweredRecord {
    fn from(row: AnsweredRow) -> Self {
        let question = QuestionRecord {
            query: row.query,
            standard_answer: row.standard_answer,
            course: row.course,
            material: row.material,
            page_range: row.page_range,
            question_type: row.question_type,
        };
        AnsweredRecord::new(question, row.agent_answer)
    }
}

impl From<&AnsweredRecord> for AnsweredRow {
    fn from(record: &AnsweredRecord) -> Self {
        let q = &record.question;
        AnsweredRow {
            query: q.query.clone(),
            standard_answer: q.standard_answer.clone(),
            course: q.course.clone(),
            material: q.material.clone(),
            page_range: q.page_range.clone(),
            question_type: q.question_type.clone(),
            agent_answer: record.agent_answer.clone(),
        }
    }
}

/// Evaluation row without the reasoning columns.
#[derive(Serialize)]
struct CompactEvaluation<'a> {
    query: &'a str,
    standard_answer: &'a str,
    standard_page_range: &'a str,
    agent_answer: &'a str,
    source_accuracy_score: f64,
    content_accuracy_score: f64,
    completeness_score: f64,
    relevance_score: f64,
    final_score: f64,
    course: &'a str,
    material: &'a str,
    question_type: &'a str,
}

impl<'a> From<&'a EvaluationRecord> for CompactEvaluation<'a> {
    fn from(r: &'a EvaluationRecord) -> Self {
        CompactEvaluation {
            query: &r.query,
            standard_answer: &r.standard_answer,
            standard_page_range: &r.page_range,
            agent_answer: &r.agent_answer,
            source_accuracy_score: r.source_accuracy_score,
            content_accuracy_score: r.content_accuracy_score,
            completeness_score: r.completeness_score,
            relevance_score: r.relevance_score,
            final_score: r.final_score,
            course: &r.course,
            material: &r.material,
            question_type: &r.question_type,
        }
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| BenchError::io(parent, e))?;
        }
    }
    Ok(())
}

fn open_reader(path: &Path) -> Result<csv::Reader<fs::File>> {
    if !path.exists() {
        return Err(BenchError::DatasetNotFound(path.to_path_buf()));
    }
    let file = fs::File::open(path).map_err(|e| BenchError::io(path, e))?;
    Ok(csv::ReaderBuilder::new().flexible(true).from_reader(file))
}

fn open_writer(path: &Path) -> Result<csv::Writer<fs::File>> {
    ensure_parent(path)?;
    let file = fs::File::create(path).map_err(|e| BenchError::io(path, e))?;
    Ok(csv::Writer::from_writer(file))
}

/// Load benchmark questions, keeping at most `limit` rows.
pub fn load_questions_csv(path: &Path, limit: Option<usize>) -> Result<Vec<QuestionRecord>> {
    let mut reader = open_reader(path)?;
    let mut questions = Vec::new();

    for row in reader.deserialize::<QuestionRecord>() {
        if limit.is_some_and(|n| questions.len() >= n) {
            break;
        }
        questions.push(row?);
    }

    tracing::debug!(path = %path.display(), count = questions.len(), "Loaded questions");
    Ok(questions)
}

/// Load a file produced by the answering stage.
pub fn load_answered_csv(path: &Path) -> Result<Vec<AnsweredRecord>> {
    let mut reader = open_reader(path)?;
    reader
        .deserialize::<AnsweredRow>()
        .map(|row| row.map(AnsweredRecord::from).map_err(BenchError::from))
        .collect()
}

/// Write answered records with the question columns followed by `agent_answer`.
pub fn save_answered_csv(path: &Path, records: &[AnsweredRecord]) -> Result<()> {
    let mut writer = open_writer(path)?;
    for record in records {
        writer.serialize(AnsweredRow::from(record))?;
    }
    writer.flush().map_err(|e| BenchError::io(path, e))?;
    Ok(())
}

/// Persist evaluation records. Reasoning columns are included only when
/// `detailed_reasoning` is set.
pub fn save_evaluations(
    path: &Path,
    records: &[EvaluationRecord],
    format: OutputFormat,
    detailed_reasoning: bool,
) -> Result<()> {
    match format {
        OutputFormat::Csv => {
            let mut writer = open_writer(path)?;
            for record in records {
                if detailed_reasoning {
                    writer.serialize(record)?;
                } else {
                    writer.serialize(CompactEvaluation::from(record))?;
                }
            }
            writer.flush().map_err(|e| BenchError::io(path, e))?;
        }
        OutputFormat::Json => {
            ensure_parent(path)?;
            let json = if detailed_reasoning {
                serde_json::to_string_pretty(records)?
            } else {
                let compact: Vec<CompactEvaluation<'_>> =
                    records.iter().map(CompactEvaluation::from).collect();
                serde_json::to_string_pretty(&compact)?
            };
            fs::write(path, json).map_err(|e| BenchError::io(path, e))?;
        }
    }

    tracing::info!(path = %path.display(), records = records.len(), "Saved evaluation results");
    Ok(())
}

/// Load previously saved evaluation results, choosing the format by extension.
pub fn load_evaluations(path: &Path) -> Result<Vec<EvaluationRecord>> {
    match OutputFormat::from_path(path) {
        OutputFormat::Csv => {
            let mut reader = open_reader(path)?;
            reader
                .deserialize::<EvaluationRecord>()
                .map(|row| row.map_err(BenchError::from))
                .collect()
        }
        OutputFormat::Json => {
            if !path.exists() {
                return Err(BenchError::DatasetNotFound(path.to_path_buf()));
            }
            let content = fs::read_to_string(path).map_err(|e| BenchError::io(path, e))?;
            Ok(serde_json::from_str(&content)?)
        }
    }
}

/// Path of a split's question file inside the QA data directory.
pub fn split_path(qa_dir: &Path, split: &str) -> PathBuf {
    qa_dir.join(format!("{}.csv", split))
}

/// Find which splits have a question file with at least one row.
pub fn check_splits(qa_dir: &Path, splits: &[String]) -> BTreeMap<String, PathBuf> {
    let mut available = BTreeMap::new();

    for split in splits {
        let path = split_path(qa_dir, split);
        match load_questions_csv(&path, Some(1)) {
            Ok(rows) if !rows.is_empty() => {
                available.insert(split.clone(), path);
            }
            Ok(_) => tracing::warn!(split, path = %path.display(), "Split file is empty"),
            Err(e) => tracing::warn!(split, error = %e, "Split unavailable"),
        }
    }

    available
}
