//! Judge evaluation pipeline.
//!
//! This module provides:
//! - The answering stage that drives a RAG agent over benchmark questions
//! - An LLM-as-judge client with retry and a tolerant response parser
//! - A bounded-concurrency orchestrator producing one evaluation per input
//! - Batch statistics and the per-split benchmark runner

pub mod answer;
pub mod benchmark;
pub mod evaluator;
pub mod judge;
pub mod parser;
pub mod pool;
pub mod progress;
pub mod record;
pub mod stats;

pub use answer::{ChatAgent, RagAgent, answer_batch};
pub use benchmark::{BenchmarkReport, BenchmarkRunner, SplitOutcome};
pub use evaluator::{Evaluator, EvaluatorConfig};
pub use judge::{JudgeClient, RetryPolicy};
pub use parser::{parse_judge_response, try_parse_judge_response};
pub use progress::{NoopObserver, ProgressBarObserver, ProgressObserver};
pub use record::{AnsweredRecord, EvaluationRecord, QuestionRecord, ScoreRecord};
pub use stats::{BatchStatistics, PASS_THRESHOLD};
