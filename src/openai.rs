//! Minimal OpenAI-compatible client that generates exam questions.
//!
//! We only call chat.completions with `response_format = json_object` and
//! parse the reply into four-choice questions. Anything that does not match
//! the expected shape is a generation failure; we never patch up a response.
//! Calls are instrumented and log model names, latencies and token usage (not contents).
//!
//! NOTE: We never log the API key.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::config::Prompts;
use crate::domain::{validate_batch, Difficulty, Question, CHOICE_COUNT};
use crate::error::GenerationError;
use crate::source::QuestionSource;
use crate::util::{fill_template, trunc_for_log};

#[derive(Clone)]
pub struct OpenAI {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub model: String,
  pub prompts: Prompts,
}

impl OpenAI {
  /// Construct the client if we find OPENAI_API_KEY; otherwise return None.
  pub fn from_env(prompts: Prompts) -> Option<Self> {
    let api_key = std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.trim().is_empty())?;
    let base_url =
      std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
    let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());

    // Full mock-exam chapters are long completions.
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(60))
      .build()
      .ok()?;

    Some(Self { client, api_key, base_url, model, prompts })
  }

  /// JSON-object chat completion; returns the raw message content.
  #[instrument(level = "info", skip(self, system, user), fields(model = %self.model))]
  async fn chat_json(&self, system: &str, user: &str, temperature: f32) -> Result<String, GenerationError> {
    let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
    let req = ChatCompletionRequest {
      model: self.model.clone(),
      messages: vec![
        ChatMessageReq { role: "system".into(), content: system.into() },
        ChatMessageReq { role: "user".into(), content: user.into() },
      ],
      temperature,
      response_format: Some(ResponseFormat { r#type: "json_object".into() }),
    };

    let start = Instant::now();
    let res = self.client.post(&url)
      .header(USER_AGENT, "passport-trainer/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req).send().await?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let message = extract_openai_error(&body).unwrap_or_else(|| trunc_for_log(&body, 200));
      return Err(GenerationError::Status { status, message });
    }

    let body: ChatCompletionResponse = res.json().await?;
    if let Some(usage) = &body.usage {
      info!(target: "generation", elapsed = ?start.elapsed(), prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "OpenAI usage");
    }
    Ok(body.choices.into_iter().next()
      .and_then(|c| c.message.content)
      .unwrap_or_default())
  }
}

#[async_trait]
impl QuestionSource for OpenAI {
  #[instrument(level = "info", skip(self, topic_description), fields(%chapter, %count, %difficulty))]
  async fn generate(
    &self,
    chapter: u32,
    topic_description: &str,
    count: usize,
    difficulty: Difficulty,
  ) -> Result<Vec<Question>, GenerationError> {
    let p = &self.prompts;
    let chapter_s = chapter.to_string();
    let count_s = count.to_string();
    let user = fill_template(
      &p.generate_user_template,
      &[
        ("chapter", &chapter_s),
        ("count", &count_s),
        ("syllabus", topic_description),
        ("difficulty_instruction", p.difficulty_instruction(difficulty)),
      ],
    );

    let text = self.chat_json(&p.generate_system, &user, 0.9).await.inspect_err(|e| {
      error!(target: "generation", %chapter, error = %e, "Model call failed during question generation");
    })?;
    let questions = parse_generated(&text, chapter, difficulty, count)?;
    info!(target: "generation", %chapter, count = questions.len(), "Questions generated");
    Ok(questions)
  }

  #[instrument(level = "info", skip(self, original, topic_description), fields(original_id = %original.id, %difficulty))]
  async fn generate_similar(
    &self,
    original: &Question,
    topic_description: &str,
    difficulty: Difficulty,
  ) -> Result<Question, GenerationError> {
    let p = &self.prompts;
    let chapter_s = original.chapter.to_string();
    let original_difficulty = original.difficulty.unwrap_or(difficulty);
    let user = fill_template(
      &p.similar_user_template,
      &[
        ("topic_tag", &original.topic_tag),
        ("original_question", &original.question),
        ("original_difficulty", original_difficulty.as_str()),
        ("difficulty_instruction", p.difficulty_instruction(difficulty)),
        ("chapter", &chapter_s),
        ("syllabus", topic_description),
      ],
    );

    let text = self.chat_json(&p.similar_system, &user, 0.9).await.inspect_err(|e| {
      error!(target: "generation", original_id = %original.id, error = %e, "Model call failed during similar-question generation");
    })?;
    let mut questions = parse_generated(&text, original.chapter, difficulty, 1)?;
    questions.pop().ok_or(GenerationError::CountMismatch { expected: 1, received: 0 })
  }
}

// --- Response parsing ---

#[derive(Deserialize)]
#[serde(untagged)]
enum GeneratedPayload {
  Wrapped { questions: Vec<GeneratedQuestion> },
  Bare(Vec<GeneratedQuestion>),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeneratedQuestion {
  topic_tag: String,
  question: String,
  choices: Vec<String>,
  correct_index: usize,
  explanation: String,
}

/// Turn the model's JSON into validated questions with fresh ids.
///
/// Chapter and difficulty come from the request, not the model.
pub fn parse_generated(
  text: &str,
  chapter: u32,
  difficulty: Difficulty,
  expected: usize,
) -> Result<Vec<Question>, GenerationError> {
  let payload: GeneratedPayload = serde_json::from_str(text.trim())?;
  let items = match payload {
    GeneratedPayload::Wrapped { questions } | GeneratedPayload::Bare(questions) => questions,
  };
  if items.len() != expected {
    return Err(GenerationError::CountMismatch { expected, received: items.len() });
  }

  let questions: Vec<Question> = items
    .into_iter()
    .map(|g| Question {
      id: format!("q_ch{chapter}_{}", Uuid::new_v4().simple()),
      chapter,
      topic_tag: g.topic_tag,
      question: g.question,
      choices: g.choices,
      correct_index: g.correct_index,
      explanation: g.explanation,
      difficulty: Some(difficulty),
    })
    .collect();

  validate_batch(&questions)?;
  debug_assert!(questions.iter().all(|q| q.choices.len() == CHOICE_COUNT));
  Ok(questions)
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_format: Option<ResponseFormat>,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }
#[derive(Serialize)]
struct ResponseFormat { #[serde(rename = "type")] r#type: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from an OpenAI error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::QuestionDefect;

  fn item(choices: usize, correct: usize) -> String {
    let choices: Vec<String> = (0..choices).map(|i| format!("\"choice {i}\"")).collect();
    format!(
      r#"{{"topicTag":"GAN","question":"What is a GAN?","choices":[{}],"correctIndex":{correct},"explanation":"Because."}}"#,
      choices.join(",")
    )
  }

  #[test]
  fn parses_wrapped_batch_and_stamps_request_fields() {
    let text = format!(r#"{{"questions":[{},{}]}}"#, item(4, 1), item(4, 3));
    let qs = parse_generated(&text, 2, Difficulty::Hard, 2).unwrap();

    assert_eq!(qs.len(), 2);
    assert!(qs.iter().all(|q| q.chapter == 2 && q.difficulty == Some(Difficulty::Hard)));
    assert!(qs[0].id.starts_with("q_ch2_"));
    assert_ne!(qs[0].id, qs[1].id);
    assert_eq!(qs[1].correct_index, 3);
  }

  #[test]
  fn accepts_bare_array() {
    let text = format!("[{}]", item(4, 0));
    assert_eq!(parse_generated(&text, 1, Difficulty::Easy, 1).unwrap().len(), 1);
  }

  #[test]
  fn wrong_choice_count_is_a_schema_error() {
    let text = format!(r#"{{"questions":[{}]}}"#, item(3, 0));
    let err = parse_generated(&text, 1, Difficulty::Normal, 1).unwrap_err();
    assert!(matches!(err, GenerationError::Schema(QuestionDefect::ChoiceCount { len: 3, .. })));
  }

  #[test]
  fn out_of_range_index_is_a_schema_error() {
    let text = format!(r#"{{"questions":[{}]}}"#, item(4, 4));
    let err = parse_generated(&text, 1, Difficulty::Normal, 1).unwrap_err();
    assert!(matches!(err, GenerationError::Schema(QuestionDefect::CorrectIndex { index: 4, .. })));
  }

  #[test]
  fn wrong_field_types_fail_to_parse() {
    let text = r#"{"questions":[{"topicTag":"x","question":"q","choices":"a,b,c,d","correctIndex":"1","explanation":"e"}]}"#;
    assert!(matches!(parse_generated(text, 1, Difficulty::Normal, 1), Err(GenerationError::Parse(_))));
  }

  #[test]
  fn short_batch_is_a_count_mismatch() {
    let text = format!(r#"{{"questions":[{}]}}"#, item(4, 0));
    let err = parse_generated(&text, 1, Difficulty::Normal, 10).unwrap_err();
    assert!(matches!(err, GenerationError::CountMismatch { expected: 10, received: 1 }));
  }

  #[test]
  fn extracts_provider_error_message() {
    let body = r#"{"error":{"message":"Invalid API key","type":"auth"}}"#;
    assert_eq!(extract_openai_error(body).as_deref(), Some("Invalid API key"));
    assert_eq!(extract_openai_error("<html>"), None);
  }
}
