//! Configuration for the benchmark harness.
//!
//! Loaded from a YAML file whose every field has a declared default, then
//! overlaid with environment variables. Validation runs once before any
//! batch work starts.

use crate::error::{BenchError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

/// QA dataset splits published for the benchmark, one per course.
pub const KNOWN_SPLITS: &[&str] = &[
    "Mao_Zedong_Thought",
    "Principles_of_Marxism",
    "Outline_of_Modern_and_Contemporary_Chinese_History",
    "Ideological_Morality_and_Legal_System",
    "An_Introduction_to_Xi_Jinping_Thought_on_Socialism_with_Chinese_Characteristics_for_a_New_Era",
];

/// Judge endpoint settings (`api` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// API key for authentication
    pub api_key: String,

    /// Base URL including the version prefix (e.g., "http://localhost:4000/v1")
    pub base_url: String,

    /// Judge model identifier
    pub model_id: String,

    /// Total attempts per judge call
    pub max_retries: u32,

    /// Maximum tokens for the judge reply
    pub max_tokens: u32,

    /// Sampling temperature, kept low for scoring consistency
    pub temperature: f32,

    /// Linear backoff unit between attempts, in milliseconds
    pub retry_backoff_ms: u64,

    /// Per-request HTTP timeout in seconds
    pub request_timeout_secs: Option<u64>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: String::new(),
            model_id: String::new(),
            max_retries: 3,
            max_tokens: 2000,
            temperature: 0.3,
            retry_backoff_ms: 500,
            request_timeout_secs: Some(120),
        }
    }
}

/// Output serialization format for evaluation results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Json,
}

impl OutputFormat {
    /// File extension used for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
        }
    }

    /// Determine format from file extension, defaulting to CSV.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => OutputFormat::Json,
            _ => OutputFormat::Csv,
        }
    }
}

/// `judge_evaluation.output` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub directory: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Csv,
            directory: PathBuf::from("evaluation_results"),
        }
    }
}

/// `judge_evaluation` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JudgeEvaluationConfig {
    /// Concurrent judge calls
    pub workers: usize,

    /// Persist the per-dimension reasoning text columns
    pub detailed_reasoning: bool,

    /// Derive final_score from the sub-scores instead of trusting the judge
    pub recompute_final_score: bool,

    /// Deadline for a whole batch; unfinished items fall back to zero scores
    pub batch_timeout_secs: Option<u64>,

    pub output: OutputConfig,
}

impl Default for JudgeEvaluationConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            detailed_reasoning: true,
            recompute_final_score: true,
            batch_timeout_secs: None,
            output: OutputConfig::default(),
        }
    }
}

/// Which splits a benchmark run covers: `all`, a single name, or a list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum SplitSelection {
    One(String),
    Many(Vec<String>),
}

impl Default for SplitSelection {
    fn default() -> Self {
        SplitSelection::One("all".to_string())
    }
}

impl SplitSelection {
    /// Expand into concrete split names, rejecting unknown ones.
    pub fn resolve(&self) -> Result<Vec<String>> {
        let names: Vec<String> = match self {
            SplitSelection::One(name) if name == "all" => {
                return Ok(KNOWN_SPLITS.iter().map(|s| s.to_string()).collect());
            }
            SplitSelection::One(name) => vec![name.clone()],
            SplitSelection::Many(names) => names.clone(),
        };

        let unknown: Vec<&str> = names
            .iter()
            .filter(|n| !KNOWN_SPLITS.contains(&n.as_str()))
            .map(String::as_str)
            .collect();

        if !unknown.is_empty() {
            return Err(BenchError::Config(format!(
                "Invalid split name(s): {}. Available splits: {}",
                unknown.join(", "),
                KNOWN_SPLITS.join(", ")
            )));
        }

        Ok(names)
    }
}

/// `benchmark` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkSection {
    pub splits: SplitSelection,

    /// Cap per split; absent or -1 means no limit
    pub max_questions_per_split: Option<i64>,

    /// Directory holding `<split>.csv` files
    pub qa_data_dir: PathBuf,
}

impl Default for BenchmarkSection {
    fn default() -> Self {
        Self {
            splits: SplitSelection::default(),
            max_questions_per_split: None,
            qa_data_dir: PathBuf::from("QA_data"),
        }
    }
}

impl BenchmarkSection {
    /// Per-split question limit, with non-positive values meaning unlimited.
    pub fn question_limit(&self) -> Option<usize> {
        match self.max_questions_per_split {
            Some(n) if n > 0 => Some(n as usize),
            _ => None,
        }
    }
}

/// RAG agent endpoint (`agent` section), served over an OpenAI-compatible API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub base_url: String,
    pub api_key: String,
    pub model_id: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub request_timeout_secs: Option<u64>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            model_id: String::new(),
            max_tokens: 1000,
            temperature: 0.0,
            request_timeout_secs: Some(300),
        }
    }
}

impl AgentConfig {
    /// Agent endpoint settings in the shape the chat client expects.
    pub fn as_api(&self) -> ApiConfig {
        ApiConfig {
            api_key: self.api_key.clone(),
            base_url: self.base_url.clone(),
            model_id: self.model_id.clone(),
            max_retries: 1,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            retry_backoff_ms: 0,
            request_timeout_secs: self.request_timeout_secs,
        }
    }
}

/// Full application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub judge_evaluation: JudgeEvaluationConfig,
    pub benchmark: BenchmarkSection,
    pub agent: Option<AgentConfig>,
}

impl Config {
    /// Load configuration from an explicit file, the default file, or defaults,
    /// then apply environment overrides.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (JUDGE_API_BASE, JUDGE_API_KEY, JUDGE_MODEL, ...)
    /// 2. Config file (`path`, or ~/.config/rag-judge-bench/config.yaml)
    /// 3. Default values
    ///
    /// An explicit `path` that does not exist is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(BenchError::Config(format!(
                        "Config file not found: {}",
                        path.display()
                    )));
                }
                Self::load_from_file(path)?
            }
            None => match Self::config_file_path() {
                Some(default_path) if default_path.exists() => {
                    Self::load_from_file(&default_path)?
                }
                _ => Config::default(),
            },
        };

        config.apply_env();
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| BenchError::io(path, e))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| BenchError::Config(format!("Failed to parse config file: {}", e)))
    }

    fn apply_env(&mut self) {
        if let Ok(base_url) = env::var("JUDGE_API_BASE") {
            self.api.base_url = base_url;
        }

        if let Ok(api_key) = env::var("JUDGE_API_KEY") {
            self.api.api_key = api_key;
        }

        if let Ok(model) = env::var("JUDGE_MODEL") {
            self.api.model_id = model;
        }

        if let Ok(max_tokens) = env::var("JUDGE_MAX_TOKENS") {
            if let Ok(tokens) = max_tokens.parse() {
                self.api.max_tokens = tokens;
            }
        }

        if let Ok(workers) = env::var("JUDGE_WORKERS") {
            if let Ok(workers) = workers.parse() {
                self.judge_evaluation.workers = workers;
            }
        }
    }

    /// Get the default config file path.
    pub fn config_file_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "rag-judge-bench")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Validate that required configuration is present and in range.
    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.is_empty() {
            return Err(BenchError::Config(
                "api.base_url is required. Set JUDGE_API_BASE or add it to the config file."
                    .to_string(),
            ));
        }

        if self.api.api_key.is_empty() {
            return Err(BenchError::Config(
                "api.api_key is required. Set JUDGE_API_KEY or add it to the config file."
                    .to_string(),
            ));
        }

        if self.api.model_id.is_empty() {
            return Err(BenchError::Config(
                "api.model_id is required. Set JUDGE_MODEL or add it to the config file."
                    .to_string(),
            ));
        }

        if self.api.max_retries == 0 {
            return Err(BenchError::Config("api.max_retries must be at least 1".to_string()));
        }

        if self.api.max_tokens == 0 {
            return Err(BenchError::Config("api.max_tokens must be positive".to_string()));
        }

        if self.judge_evaluation.workers == 0 {
            return Err(BenchError::Config(
                "judge_evaluation.workers must be at least 1".to_string(),
            ));
        }

        if let Some(agent) = &self.agent {
            if agent.base_url.is_empty() || agent.model_id.is_empty() {
                return Err(BenchError::Config(
                    "agent.base_url and agent.model_id are required when the agent section is present"
                        .to_string(),
                ));
            }
        }

        Ok(())
    }

    /// The agent section, required by commands that generate answers.
    pub fn agent_config(&self) -> Result<&AgentConfig> {
        self.agent.as_ref().ok_or_else(|| {
            BenchError::Config(
                "agent section is required to generate answers (agent.base_url, agent.model_id)"
                    .to_string(),
            )
        })
    }

    /// Create a config from explicit values (useful for testing).
    pub fn with_api(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model_id: impl Into<String>,
    ) -> Self {
        Self {
            api: ApiConfig {
                base_url: base_url.into(),
                api_key: api_key.into(),
                model_id: model_id.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}
