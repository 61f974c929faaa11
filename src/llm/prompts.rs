//! Prompts for the judge model and the chat-backed agent.

/// Weight of the source-accuracy dimension in the composite score.
pub const SOURCE_ACCURACY_WEIGHT: f64 = 0.6;
/// Weight of the content-accuracy dimension in the composite score.
pub const CONTENT_ACCURACY_WEIGHT: f64 = 0.2;
/// Weight of the completeness dimension in the composite score.
pub const COMPLETENESS_WEIGHT: f64 = 0.15;
/// Weight of the relevance dimension in the composite score.
pub const RELEVANCE_WEIGHT: f64 = 0.05;

/// Collection of prompts used for judging and answering.
pub struct Prompts;

impl Prompts {
    /// System persona sent with every judge request.
    pub fn judge_system() -> &'static str {
        "You are a professional evaluator of RAG systems, skilled at assessing answer quality objectively and fairly."
    }

    /// System prompt for an agent answering benchmark questions over chat.
    pub fn agent_system() -> &'static str {
        "You are a course assistant answering questions from the course materials. \
Cite the material name and page numbers your answer is based on."
    }
}

/// Build the judge prompt for one answered question.
///
/// Empty inputs are accepted; they only make the prompt less informative.
pub fn build_judge_prompt(
    query: &str,
    standard_answer: &str,
    rag_answer: &str,
    standard_material: &str,
    standard_page_range: &str,
) -> String {
    format!(
        r#"You are a professional evaluator of RAG systems. Your task is to score the RAG system's answer along several dimensions.

## Scoring criteria

Score the answer on the following four dimensions (0-10 points each):

1. **Source Accuracy** - weight 60%
   - **This reflects the retrieval ability of the RAG system and is the most important dimension**
   - Check whether the answer cites page numbers, chapters or other source information
   - Source of the standard answer: {standard_material}, pages: {standard_page_range}
   - Guidance:
     * Explicitly cites the correct page/chapter (e.g. "according to page 15", "chapter 3 states"): 8-10
     * Cites page numbers that are not fully correct: 5-7
     * Mentions a source but no specific pages: 3-5
     * Mentions no source information at all: 0-2

2. **Content Accuracy** - weight 20%
   - Is the core information in the answer correct?
   - Are there factual errors?
   - Does it agree with the main points of the standard answer?

3. **Completeness** - weight 15%
   - Does the answer cover the key information in the standard answer?
   - Is important content missing?
   - Is the level of detail sufficient?

4. **Relevance** - weight 5%
   - Does the answer stay on topic?
   - Does it contain unrelated information?
   - Is the emphasis of the answer correct?

## Input

**Question:** {query}

**Standard answer:**
{standard_answer}
**Source of the standard answer:** {standard_material}, pages: {standard_page_range}

**RAG system answer:**
{rag_answer}

## Output format

Output the scores as JSON:

```json
{{
  "source_accuracy_score": 8.5,
  "content_accuracy_score": 7.0,
  "completeness_score": 7.5,
  "relevance_score": 9.0,
  "final_score": 7.9,
  "source_accuracy_reasoning": "The answer explicitly says 'according to page 15', matching the standard source.",
  "content_accuracy_reasoning": "The core information is accurate...",
  "completeness_reasoning": "Covers the main content...",
  "relevance_reasoning": "Stays on topic...",
  "overall_reasoning": "Good overall quality with strong source attribution..."
}}
```

**Formula**: final_score = source_accuracy * 0.6 + content_accuracy * 0.2 + completeness * 0.15 + relevance * 0.05

**Key points**:
- Source accuracy carries 60% of the weight and is the most important capability of a RAG system
- Even if the content is correct, an answer without source information must get a low source accuracy score
- A good RAG answer reads like: "According to page 15 of the course material, the core idea is..."

Output only the JSON, nothing else."#
    )
}
