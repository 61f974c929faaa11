//! LLM-as-judge client with bounded retry.

use crate::config::ApiConfig;
use crate::error::{BenchError, Result};
use crate::llm::{ChatModel, LlmClient, Prompts};
use std::time::Duration;

/// Retry policy for judge calls.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, at least one.
    pub max_attempts: u32,
    /// Sleep `backoff * attempt` between attempts.
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn from_api(api: &ApiConfig) -> Self {
        Self {
            max_attempts: api.max_retries.max(1),
            backoff: Duration::from_millis(api.retry_backoff_ms),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(500),
        }
    }
}

/// Sends judge prompts to a chat model, retrying transport failures.
pub struct JudgeClient<M> {
    model: M,
    retry: RetryPolicy,
}

impl JudgeClient<LlmClient> {
    /// Build a judge backed by the HTTP client described by `api`.
    pub fn from_config(api: ApiConfig) -> Self {
        let retry = RetryPolicy::from_api(&api);
        Self::new(LlmClient::new(api), retry)
    }
}

impl<M: ChatModel> JudgeClient<M> {
    pub fn new(model: M, retry: RetryPolicy) -> Self {
        Self { model, retry }
    }

    /// The underlying chat model.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Send `prompt` with the judge persona and return the trimmed reply.
    ///
    /// Every failed attempt is logged; once all attempts are spent the last
    /// error is returned as [`BenchError::JudgeUnavailable`].
    pub async fn call(&self, prompt: &str) -> Result<String> {
        let max = self.retry.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=max {
            match self
                .model
                .complete(Some(Prompts::judge_system()), prompt)
                .await
            {
                Ok(reply) => return Ok(reply.trim().to_string()),
                Err(e) => {
                    tracing::warn!(
                        attempt,
                        max_attempts = max,
                        model = self.model.model_id(),
                        error = %e,
                        "Judge call failed"
                    );
                    last_error = e.to_string();

                    if attempt < max && !self.retry.backoff.is_zero() {
                        tokio::time::sleep(self.retry.backoff * attempt).await;
                    }
                }
            }
        }

        Err(BenchError::JudgeUnavailable {
            attempts: max,
            last_error,
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted chat models shared by the evaluation tests.

    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Replays a fixed sequence of outcomes, then repeats the last one.
    pub struct ScriptedModel {
        script: Mutex<VecDeque<std::result::Result<String, String>>>,
        last: Mutex<Option<std::result::Result<String, String>>>,
        pub calls: AtomicUsize,
    }

    impl ScriptedModel {
        pub fn new(script: Vec<std::result::Result<&str, &str>>) -> Self {
            Self {
                script: Mutex::new(
                    script
                        .into_iter()
                        .map(|r| r.map(str::to_string).map_err(str::to_string))
                        .collect(),
                ),
                last: Mutex::new(None),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn complete(&self, _system: Option<&str>, _user: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.script.lock().unwrap().pop_front();
            let outcome = match next {
                Some(outcome) => {
                    *self.last.lock().unwrap() = Some(outcome.clone());
                    outcome
                }
                None => self
                    .last
                    .lock()
                    .unwrap()
                    .clone()
                    .unwrap_or_else(|| Err("script exhausted".to_string())),
            };
            outcome.map_err(BenchError::JudgeTransport)
        }

        fn model_id(&self) -> &str {
            "scripted"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedModel;
    use super::*;
    use std::sync::atomic::Ordering;

    fn no_backoff(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            backoff: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let model = ScriptedModel::new(vec![Err("timeout"), Err("502"), Ok("  {\"a\": 1}  ")]);
        let judge = JudgeClient::new(model, no_backoff(3));

        let reply = judge.call("prompt").await.unwrap();
        assert_eq!(reply, "{\"a\": 1}");
        assert_eq!(judge.model().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausted_retries_report_last_error() {
        let model = ScriptedModel::new(vec![Err("first"), Err("second")]);
        let judge = JudgeClient::new(model, no_backoff(2));

        match judge.call("prompt").await {
            Err(BenchError::JudgeUnavailable {
                attempts,
                last_error,
            }) => {
                assert_eq!(attempts, 2);
                assert!(last_error.contains("second"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(judge.model().calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_zero_attempts_still_calls_once() {
        let model = ScriptedModel::new(vec![Ok("ok")]);
        let judge = JudgeClient::new(model, no_backoff(0));

        assert_eq!(judge.call("prompt").await.unwrap(), "ok");
        assert_eq!(judge.model().calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_policy_from_api() {
        let api = ApiConfig {
            max_retries: 5,
            retry_backoff_ms: 0,
            ..Default::default()
        };
        let policy = RetryPolicy::from_api(&api);
        assert_eq!(policy.max_attempts, 5);
        assert!(policy.backoff.is_zero());
    }
}
