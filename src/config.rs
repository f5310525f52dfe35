//! Loading trainer configuration (prompts, exam parameters, chapters) from TOML.
//!
//! Every section is optional; anything missing falls back to the built-in
//! syllabus and reference exam constants.

use std::collections::BTreeMap;

use serde::Deserialize;
use tracing::{error, info};

use crate::domain::Difficulty;
use crate::syllabus;

#[derive(Clone, Debug, Deserialize)]
pub struct TrainerConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub exam: ExamCfg,
  #[serde(default = "syllabus::default_chapters")]
  pub chapters: Vec<ChapterCfg>,
}

impl Default for TrainerConfig {
  fn default() -> Self {
    Self { prompts: Prompts::default(), exam: ExamCfg::default(), chapters: syllabus::default_chapters() }
  }
}

impl TrainerConfig {
  pub fn chapter(&self, number: u32) -> Option<&ChapterCfg> {
    self.chapters.iter().find(|c| c.number == number)
  }
}

/// One syllabus chapter: the unit of question generation and scoring.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct ChapterCfg {
  pub number: u32,
  pub title: String,
  pub syllabus: String,
}

/// Session sizes and limits.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExamCfg {
  pub practice_count: usize,
  pub similar_sample: usize,
  pub time_limit_secs: u32,
  pub passing_score: usize,
  /// Chapter number -> question count for the mock exam. TOML keys are strings.
  #[serde(deserialize_with = "chapter_keyed")]
  pub mock_distribution: BTreeMap<u32, usize>,
}

impl Default for ExamCfg {
  fn default() -> Self {
    Self {
      practice_count: syllabus::PRACTICE_QUESTION_COUNT,
      similar_sample: syllabus::SIMILAR_SAMPLE_SIZE,
      time_limit_secs: syllabus::MOCK_EXAM_TIME_LIMIT_SECS,
      passing_score: syllabus::PASSING_SCORE,
      mock_distribution: syllabus::mock_distribution(),
    }
  }
}

impl ExamCfg {
  pub fn mock_total(&self) -> usize {
    self.mock_distribution.values().sum()
  }
}

fn chapter_keyed<'de, D>(de: D) -> Result<BTreeMap<u32, usize>, D::Error>
where
  D: serde::Deserializer<'de>,
{
  let raw = BTreeMap::<String, usize>::deserialize(de)?;
  raw
    .into_iter()
    .map(|(k, v)| k.trim().parse::<u32>().map(|ch| (ch, v)).map_err(serde::de::Error::custom))
    .collect()
}

/// Prompts sent to the question generator. Placeholders use `{name}` syntax.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub generate_system: String,
  pub generate_user_template: String,
  pub similar_system: String,
  pub similar_user_template: String,
  pub difficulty_easy: String,
  pub difficulty_normal: String,
  pub difficulty_hard: String,
  pub difficulty_exam: String,
}

impl Prompts {
  pub fn difficulty_instruction(&self, difficulty: Difficulty) -> &str {
    match difficulty {
      Difficulty::Easy => &self.difficulty_easy,
      Difficulty::Normal => &self.difficulty_normal,
      Difficulty::Hard => &self.difficulty_hard,
      Difficulty::Exam => &self.difficulty_exam,
    }
  }
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      generate_system: "You are an expert author of the Japanese \"Generative AI Passport\" certification exam. Respond ONLY with strict JSON.".into(),
      generate_user_template: "Write {count} original four-choice questions in Japanese for chapter {chapter}, based on the syllabus below.\n\n{difficulty_instruction}\n\nSyllabus:\n{syllabus}\n\nReturn JSON {\"questions\": [{\"topicTag\": string, \"question\": string, \"choices\": [4 strings], \"correctIndex\": 0-3, \"explanation\": string}]}. The explanation must say in 1-3 sentences why the answer is right and the others are wrong.".into(),
      similar_system: "You are an expert author of the Japanese \"Generative AI Passport\" certification exam. Respond ONLY with strict JSON.".into(),
      similar_user_template: "Write ONE new four-choice question in Japanese on the same topic ({topic_tag}) as the question below, but from a different angle. Do not reuse its wording or choices.\n\nOriginal question: {original_question}\nOriginal difficulty: {original_difficulty}\n\n{difficulty_instruction}\n\nChapter {chapter} syllabus: {syllabus}\n\nReturn JSON {\"questions\": [one object with topicTag, question, choices (4 strings), correctIndex (0-3), explanation]}.".into(),
      difficulty_easy: "Difficulty: easy. Straightforward questions that check definitions and basic knowledge.".into(),
      difficulty_normal: "Difficulty: normal. Definitions mixed with simple use-case questions; few trick choices.".into(),
      difficulty_hard: "Difficulty: hard. Scenario-based questions with plausible distractors; prefer \"most appropriate\" / \"least appropriate\" formats.".into(),
      difficulty_exam: "Difficulty: exam. Match the real Generative AI Passport exam: all four choices should make an expert hesitate, separated by subtle wording such as \"only\", \"may\", \"required\".".into(),
    }
  }
}

/// Load `TrainerConfig` from PASSPORT_CONFIG_PATH. Missing variable, IO or parse
/// errors all yield the defaults.
pub fn load_trainer_config_from_env() -> TrainerConfig {
  let Ok(path) = std::env::var("PASSPORT_CONFIG_PATH") else {
    return TrainerConfig::default();
  };
  match std::fs::read_to_string(&path) {
    Ok(s) => match parse_trainer_config(&s) {
      Ok(cfg) => {
        info!(target: "passport_trainer", %path, chapters = cfg.chapters.len(), "Loaded trainer config (TOML)");
        cfg
      }
      Err(e) => {
        error!(target: "passport_trainer", %path, error = %e, "Failed to parse TOML config; using defaults");
        TrainerConfig::default()
      }
    },
    Err(e) => {
      error!(target: "passport_trainer", %path, error = %e, "Failed to read TOML config file; using defaults");
      TrainerConfig::default()
    }
  }
}

pub fn parse_trainer_config(s: &str) -> Result<TrainerConfig, toml::de::Error> {
  toml::from_str::<TrainerConfig>(s)
}
