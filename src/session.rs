//! Exam session engine: one attempt from first question to result.
//!
//! `ExamSession` is a plain state machine (`Active` -> `Submitted` | `Cancelled`).
//! Manual submission and timer expiry both go through `submit`, so whichever
//! fires first produces the only result and the other sees `SessionError::Closed`.
//! `Countdown` drives `tick` once per second on a tokio task and is aborted on
//! stop or drop.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, instrument};

use crate::clock::Clock;
use crate::domain::{
  AnsweredQuestion, ChapterScore, Difficulty, ExamResult, Question, SessionDescriptor, SessionKind, CHOICE_COUNT,
};
use crate::error::SessionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
  Active,
  Submitted,
  Cancelled,
}

pub struct ExamSession {
  title: String,
  kind: SessionKind,
  questions: Vec<Question>,
  answers: Vec<Option<usize>>,
  current: usize,
  time_limit_secs: Option<u32>,
  remaining_secs: Option<u32>,
  difficulty: Difficulty,
  passing_score: Option<usize>,
  status: SessionStatus,
  clock: Clock,
}

impl ExamSession {
  /// Start a session from a launcher descriptor.
  ///
  /// # Errors
  ///
  /// Returns `SessionError::Empty` if the descriptor has no questions.
  pub fn new(descriptor: SessionDescriptor, clock: Clock) -> Result<Self, SessionError> {
    if descriptor.questions.is_empty() {
      return Err(SessionError::Empty);
    }
    let n = descriptor.questions.len();
    Ok(Self {
      title: descriptor.title,
      kind: descriptor.kind,
      questions: descriptor.questions,
      answers: vec![None; n],
      current: 0,
      time_limit_secs: descriptor.time_limit_secs,
      remaining_secs: descriptor.time_limit_secs,
      difficulty: descriptor.difficulty,
      passing_score: descriptor.passing_score,
      status: SessionStatus::Active,
      clock,
    })
  }

  pub fn title(&self) -> &str {
    &self.title
  }

  pub fn kind(&self) -> SessionKind {
    self.kind
  }

  pub fn status(&self) -> SessionStatus {
    self.status
  }

  pub fn is_active(&self) -> bool {
    self.status == SessionStatus::Active
  }

  pub fn total(&self) -> usize {
    self.questions.len()
  }

  pub fn position(&self) -> usize {
    self.current
  }

  pub fn is_last(&self) -> bool {
    self.current + 1 == self.questions.len()
  }

  pub fn current_question(&self) -> &Question {
    &self.questions[self.current]
  }

  pub fn current_answer(&self) -> Option<usize> {
    self.answers[self.current]
  }

  pub fn answered_count(&self) -> usize {
    self.answers.iter().filter(|a| a.is_some()).count()
  }

  pub fn time_limit_secs(&self) -> Option<u32> {
    self.time_limit_secs
  }

  pub fn remaining_secs(&self) -> Option<u32> {
    self.remaining_secs
  }

  /// Record `choice` for the current question, replacing any earlier pick.
  ///
  /// # Errors
  ///
  /// `SessionError::Closed` once the session has ended,
  /// `SessionError::InvalidChoice` for an index outside the four choices.
  pub fn select_answer(&mut self, choice: usize) -> Result<(), SessionError> {
    if !self.is_active() {
      return Err(SessionError::Closed);
    }
    if choice >= CHOICE_COUNT {
      return Err(SessionError::InvalidChoice(choice));
    }
    self.answers[self.current] = Some(choice);
    Ok(())
  }

  /// Move by `delta` questions, clamped to the first and last question.
  pub fn advance(&mut self, delta: isize) {
    if !self.is_active() {
      return;
    }
    let last = self.questions.len() - 1;
    self.current = self.current.saturating_add_signed(delta).min(last);
  }

  /// Score the attempt and end the session.
  ///
  /// # Errors
  ///
  /// `SessionError::Closed` if the session was already submitted or cancelled.
  #[instrument(level = "info", skip(self), fields(title = %self.title, total = self.questions.len()))]
  pub fn submit(&mut self) -> Result<ExamResult, SessionError> {
    if !self.is_active() {
      return Err(SessionError::Closed);
    }
    self.status = SessionStatus::Submitted;

    let mut score = 0;
    let mut chapter_scores: BTreeMap<u32, ChapterScore> = BTreeMap::new();
    let answered: Vec<AnsweredQuestion> = self
      .questions
      .iter()
      .zip(&self.answers)
      .map(|(q, selected)| {
        let entry = AnsweredQuestion { question: q.clone(), selected_index: *selected };
        let correct = entry.is_correct();
        let chapter = chapter_scores.entry(q.chapter).or_default();
        chapter.total += 1;
        if correct {
          chapter.correct += 1;
          score += 1;
        }
        entry
      })
      .collect();

    let result = ExamResult {
      date: self.clock.now(),
      score,
      total: self.questions.len(),
      chapter_scores,
      questions: answered,
      is_passed: self.passing_score.map(|pass| score >= pass),
      difficulty: self.difficulty,
    };
    info!(target: "session", score, total = result.total, passed = ?result.is_passed, "Session submitted");
    Ok(result)
  }

  /// End the session without a result. Callers confirm with the user first.
  pub fn cancel(&mut self) -> bool {
    if !self.is_active() {
      return false;
    }
    self.status = SessionStatus::Cancelled;
    info!(target: "session", title = %self.title, answered = self.answered_count(), "Session cancelled");
    true
  }

  /// Advance the countdown by one second; auto-submits when it reaches zero.
  ///
  /// Returns the result only for the tick that performed the submission.
  pub fn tick(&mut self) -> Option<ExamResult> {
    if !self.is_active() {
      return None;
    }
    let remaining = self.remaining_secs.as_mut()?;
    *remaining = remaining.saturating_sub(1);
    if *remaining > 0 {
      return None;
    }
    debug!(target: "session", "Time limit reached; submitting");
    self.submit().ok()
  }
}

impl fmt::Debug for ExamSession {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ExamSession")
      .field("title", &self.title)
      .field("questions_len", &self.questions.len())
      .field("current", &self.current)
      .field("answered", &self.answered_count())
      .field("remaining_secs", &self.remaining_secs)
      .field("status", &self.status)
      .finish_non_exhaustive()
  }
}

/// Background one-second ticker for a timed session.
#[derive(Debug)]
pub struct Countdown {
  handle: JoinHandle<()>,
}

impl Countdown {
  /// Spawn the ticker if the session has a time limit. The auto-submitted
  /// result, if any, is delivered on `results`.
  pub async fn spawn(session: Arc<Mutex<ExamSession>>, results: mpsc::Sender<ExamResult>) -> Option<Self> {
    if session.lock().await.time_limit_secs().is_none() {
      return None;
    }
    let period = Duration::from_secs(1);
    let handle = tokio::spawn(async move {
      let mut ticker = interval_at(Instant::now() + period, period);
      ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);
      loop {
        ticker.tick().await;
        let mut guard = session.lock().await;
        if !guard.is_active() {
          break;
        }
        if let Some(result) = guard.tick() {
          drop(guard);
          let _ = results.send(result).await;
          break;
        }
      }
    });
    Some(Self { handle })
  }

  pub fn stop(self) {
    // Drop aborts the task.
  }
}

impl Drop for Countdown {
  fn drop(&mut self) {
    self.handle.abort();
  }
}
