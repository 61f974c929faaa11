//! Answering stage: drive a RAG agent over benchmark questions.

use super::pool::{PoolOptions, run_bounded};
use super::progress::ProgressObserver;
use super::record::{AnsweredRecord, QuestionRecord};
use crate::config::AgentConfig;
use crate::error::{BenchError, Result};
use crate::llm::{ChatModel, LlmClient, Message, Prompts};
use async_trait::async_trait;
use std::sync::Arc;

/// The agent under evaluation.
#[async_trait]
pub trait RagAgent: Send + Sync {
    /// Answer one question, optionally continuing a conversation.
    async fn answer_question(&self, query: &str, chat_history: Option<&[Message]>)
    -> Result<String>;
}

/// Agent reached through an OpenAI-compatible chat endpoint.
pub struct ChatAgent<M = LlmClient> {
    model: M,
}

impl ChatAgent<LlmClient> {
    pub fn from_config(config: &AgentConfig) -> Self {
        Self::new(LlmClient::new(config.as_api()))
    }
}

impl<M: ChatModel> ChatAgent<M> {
    pub fn new(model: M) -> Self {
        Self { model }
    }
}

#[async_trait]
impl<M: ChatModel> RagAgent for ChatAgent<M> {
    async fn answer_question(
        &self,
        query: &str,
        chat_history: Option<&[Message]>,
    ) -> Result<String> {
        let prompt = match chat_history {
            Some(history) if !history.is_empty() => {
                let mut transcript = history
                    .iter()
                    .map(|m| format!("{:?}: {}", m.role, m.content))
                    .collect::<Vec<_>>()
                    .join("\n");
                transcript.push_str("\n\nUser: ");
                transcript.push_str(query);
                transcript
            }
            _ => query.to_string(),
        };

        let answer = self
            .model
            .complete(Some(Prompts::agent_system()), &prompt)
            .await
            .map_err(|e| BenchError::Agent(e.to_string()))?;
        Ok(answer.trim().to_string())
    }
}

/// Answer every question with a non-empty query.
///
/// Empty queries are dropped. Agent failures do not drop the record; the
/// error message becomes the answer so the judge scores it as wrong.
pub async fn answer_batch<A: RagAgent + 'static>(
    agent: Arc<A>,
    questions: Vec<QuestionRecord>,
    workers: usize,
    observer: &dyn ProgressObserver<AnsweredRecord>,
) -> Vec<AnsweredRecord> {
    let submitted = questions.len();
    let questions: Vec<QuestionRecord> = questions
        .into_iter()
        .filter(|q| !q.query.trim().is_empty())
        .collect();

    if questions.len() < submitted {
        tracing::info!(
            dropped = submitted - questions.len(),
            "Skipping questions with empty queries"
        );
    }
    tracing::info!(questions = questions.len(), workers, "Generating agent answers");

    let work = move |question: QuestionRecord| {
        let agent = Arc::clone(&agent);
        async move {
            let answer = match agent.answer_question(question.query.trim(), None).await {
                Ok(answer) => answer,
                Err(e) => {
                    tracing::warn!(query = %question.query, error = %e, "Agent failed to answer");
                    error_answer(&e.to_string())
                }
            };
            AnsweredRecord::new(question, answer)
        }
    };
    let recover = |question: QuestionRecord, reason: String| {
        AnsweredRecord::new(question, error_answer(&reason))
    };

    run_bounded(
        questions,
        PoolOptions {
            workers,
            deadline: None,
        },
        work,
        recover,
        observer,
    )
    .await
    .into_iter()
    .map(|(_, record)| record)
    .collect()
}

fn error_answer(message: &str) -> String {
    format!("[error] {}", message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::progress::NoopObserver;
    use crate::eval::record::MAX_ANSWER_CHARS;

    struct EchoAgent;

    #[async_trait]
    impl RagAgent for EchoAgent {
        async fn answer_question(
            &self,
            query: &str,
            _chat_history: Option<&[Message]>,
        ) -> Result<String> {
            match query {
                "broken" => Err(BenchError::Agent("index offline".to_string())),
                "long" => Ok("x".repeat(MAX_ANSWER_CHARS * 2)),
                other => Ok(format!("answer to {}", other)),
            }
        }
    }

    fn question(query: &str) -> QuestionRecord {
        QuestionRecord {
            query: query.to_string(),
            standard_answer: "std".to_string(),
            course: "c".to_string(),
            material: "m".to_string(),
            page_range: "1".to_string(),
            question_type: "t".to_string(),
        }
    }

    #[tokio::test]
    async fn test_answer_batch() {
        let questions = vec![
            question("  what?  "),
            question("   "),
            question("broken"),
            question("long"),
        ];
        let mut answered = answer_batch(Arc::new(EchoAgent), questions, 2, &NoopObserver).await;
        answered.sort_by(|a, b| a.question.query.cmp(&b.question.query));

        assert_eq!(answered.len(), 3);

        let what = &answered[0];
        assert_eq!(what.question.query, "  what?  ");
        assert_eq!(what.agent_answer, "answer to what?");

        let broken = &answered[1];
        assert_eq!(broken.agent_answer, "[error] Agent error: index offline");

        let long = &answered[2];
        assert_eq!(long.agent_answer.chars().count(), MAX_ANSWER_CHARS);
    }

    #[tokio::test]
    async fn test_chat_agent_wraps_model_errors() {
        use crate::eval::judge::testing::ScriptedModel;

        let model = ScriptedModel::new(vec![Ok("  From page 4: yes. "), Err("down")]);
        let agent = ChatAgent::new(model);
        assert_eq!(
            agent.answer_question("q", None).await.unwrap(),
            "From page 4: yes."
        );
        assert!(matches!(
            agent.answer_question("q", None).await,
            Err(BenchError::Agent(_))
        ));
    }
}
