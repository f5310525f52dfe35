//! Domain models: questions, difficulty levels, exam results, persisted app data,
//! and the transient session descriptor handed from the launcher to the engine.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Every question carries exactly this many answer choices.
pub const CHOICE_COUNT: usize = 4;

/// How hard generated questions should be. Ordered from easiest to hardest.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
  Easy,
  #[default]
  Normal,
  Hard,
  Exam,
}

impl Difficulty {
  pub const ALL: [Difficulty; 4] = [Difficulty::Easy, Difficulty::Normal, Difficulty::Hard, Difficulty::Exam];

  pub fn as_str(self) -> &'static str {
    match self {
      Difficulty::Easy => "easy",
      Difficulty::Normal => "normal",
      Difficulty::Hard => "hard",
      Difficulty::Exam => "exam",
    }
  }

  /// Label shown next to titles and history entries.
  pub fn label(self) -> &'static str {
    match self {
      Difficulty::Easy => "初級 (Easy)",
      Difficulty::Normal => "中級 (Normal)",
      Difficulty::Hard => "上級 (Hard)",
      Difficulty::Exam => "本番級 (Exam)",
    }
  }
}

impl fmt::Display for Difficulty {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown difficulty '{0}' (expected easy, normal, hard or exam)")]
pub struct UnknownDifficulty(pub String);

impl FromStr for Difficulty {
  type Err = UnknownDifficulty;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let wanted = s.trim().to_ascii_lowercase();
    Difficulty::ALL
      .into_iter()
      .find(|d| d.as_str() == wanted)
      .ok_or_else(|| UnknownDifficulty(s.trim().to_string()))
  }
}

/// A generated four-choice question. Immutable once it enters the bank.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Question {
  pub id: String,
  pub chapter: u32,
  pub topic_tag: String,
  pub question: String,
  pub choices: Vec<String>,
  pub correct_index: usize,
  pub explanation: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub difficulty: Option<Difficulty>,
}

/// Why a question record is unusable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuestionDefect {
  #[error("question id is empty")]
  EmptyId,
  #[error("question {id} has {len} choices, expected 4")]
  ChoiceCount { id: String, len: usize },
  #[error("question {id} has correct index {index}, expected 0..=3")]
  CorrectIndex { id: String, index: usize },
  #[error("question {0} has an empty question or choice text")]
  EmptyText(String),
  #[error("question id {0} appears more than once in a batch")]
  DuplicateId(String),
}

impl Question {
  pub fn validate(&self) -> Result<(), QuestionDefect> {
    if self.id.trim().is_empty() {
      return Err(QuestionDefect::EmptyId);
    }
    if self.choices.len() != CHOICE_COUNT {
      return Err(QuestionDefect::ChoiceCount { id: self.id.clone(), len: self.choices.len() });
    }
    if self.correct_index >= CHOICE_COUNT {
      return Err(QuestionDefect::CorrectIndex { id: self.id.clone(), index: self.correct_index });
    }
    if self.question.trim().is_empty() || self.choices.iter().any(|c| c.trim().is_empty()) {
      return Err(QuestionDefect::EmptyText(self.id.clone()));
    }
    Ok(())
  }
}

/// Validate every question of a batch and check ids are unique within it.
pub fn validate_batch(batch: &[Question]) -> Result<(), QuestionDefect> {
  let mut seen = HashSet::with_capacity(batch.len());
  for q in batch {
    q.validate()?;
    if !seen.insert(q.id.as_str()) {
      return Err(QuestionDefect::DuplicateId(q.id.clone()));
    }
  }
  Ok(())
}

/// A question as it was answered in one session. `None` means unanswered.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AnsweredQuestion {
  #[serde(flatten)]
  pub question: Question,
  pub selected_index: Option<usize>,
}

impl AnsweredQuestion {
  pub fn is_correct(&self) -> bool {
    self.selected_index == Some(self.question.correct_index)
  }
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChapterScore {
  pub correct: usize,
  pub total: usize,
}

impl ChapterScore {
  /// Rounded percentage; 0 for an empty chapter.
  pub fn percent(&self) -> usize {
    if self.total == 0 { 0 } else { (self.correct * 100 + self.total / 2) / self.total }
  }
}

/// Outcome of one completed session.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExamResult {
  pub date: DateTime<Utc>,
  pub score: usize,
  pub total: usize,
  pub chapter_scores: BTreeMap<u32, ChapterScore>,
  pub questions: Vec<AnsweredQuestion>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub is_passed: Option<bool>,
  pub difficulty: Difficulty,
}

/// Everything that survives between runs.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AppData {
  #[serde(default)]
  pub questions: Vec<Question>,
  #[serde(default)]
  pub wrong_question_ids: BTreeSet<String>,
  #[serde(default)]
  pub exam_history: Vec<ExamResult>,
  #[serde(default)]
  pub difficulty: Difficulty,
}

/// Which entry point produced a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionKind {
  Practice { chapter: u32 },
  Mock,
  ReviewWrong,
  ReviewSimilar,
}

/// Parameters for one exam attempt. Lives only in memory.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionDescriptor {
  pub title: String,
  pub kind: SessionKind,
  pub questions: Vec<Question>,
  pub time_limit_secs: Option<u32>,
  pub difficulty: Difficulty,
  pub passing_score: Option<usize>,
}

#[cfg(test)]
pub(crate) fn sample_question(id: &str, chapter: u32, correct_index: usize) -> Question {
  Question {
    id: id.to_string(),
    chapter,
    topic_tag: format!("topic-{chapter}"),
    question: format!("Question {id}?"),
    choices: vec!["A".into(), "B".into(), "C".into(), "D".into()],
    correct_index,
    explanation: "Because.".into(),
    difficulty: None,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn difficulty_parses_case_insensitively() {
    assert_eq!("HARD".parse::<Difficulty>(), Ok(Difficulty::Hard));
    assert_eq!(" exam ".parse::<Difficulty>(), Ok(Difficulty::Exam));
    assert!("brutal".parse::<Difficulty>().is_err());
    assert!(Difficulty::Easy < Difficulty::Exam);
  }

  #[test]
  fn validate_rejects_bad_choice_count_and_index() {
    let mut q = sample_question("q1", 1, 0);
    assert!(q.validate().is_ok());

    q.choices.pop();
    assert!(matches!(q.validate(), Err(QuestionDefect::ChoiceCount { len: 3, .. })));

    let mut q = sample_question("q1", 1, 4);
    assert!(matches!(q.validate(), Err(QuestionDefect::CorrectIndex { index: 4, .. })));

    q.correct_index = 3;
    q.choices[1] = " ".into();
    assert_eq!(q.validate(), Err(QuestionDefect::EmptyText("q1".into())));

    q.id = "  ".into();
    assert_eq!(q.validate(), Err(QuestionDefect::EmptyId));
  }

  #[test]
  fn batch_rejects_duplicate_ids() {
    let batch = vec![sample_question("q1", 1, 0), sample_question("q1", 2, 1)];
    assert_eq!(validate_batch(&batch), Err(QuestionDefect::DuplicateId("q1".into())));
  }

  #[test]
  fn app_data_uses_camel_case_keys() {
    let mut data = AppData::default();
    data.questions.push(sample_question("q1", 1, 2));
    data.wrong_question_ids.insert("q1".into());

    let json = serde_json::to_string(&data).unwrap();
    assert!(json.contains("\"wrongQuestionIds\":[\"q1\"]"));
    assert!(json.contains("\"correctIndex\":2"));
    assert!(json.contains("\"difficulty\":\"normal\""));

    let back: AppData = serde_json::from_str(&json).unwrap();
    assert_eq!(back, data);
  }

  #[test]
  fn chapter_percent_rounds() {
    assert_eq!(ChapterScore { correct: 2, total: 3 }.percent(), 67);
    assert_eq!(ChapterScore { correct: 0, total: 0 }.percent(), 0);
  }
}
