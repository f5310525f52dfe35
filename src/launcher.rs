//! Entry points that turn a user choice into a ready-to-run session.
//!
//! This includes:
//!   - per-chapter practice (fresh questions, untimed)
//!   - the full mock exam (fresh questions from every chapter, shuffled, timed)
//!   - review of missed questions (existing bank questions, shuffled)
//!   - review via similar questions (one fresh variant per sampled miss)

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{error, info, instrument};

use crate::config::{ChapterCfg, TrainerConfig};
use crate::domain::{validate_batch, Difficulty, Question, SessionDescriptor, SessionKind};
use crate::error::{GenerationError, LaunchError};
use crate::progress::ProgressTracker;
use crate::shuffle::{shuffled, Shuffler};
use crate::source::QuestionSource;

pub const REVIEW_WRONG_TITLE: &str = "復習（間違えた問題）";
pub const REVIEW_SIMILAR_TITLE: &str = "復習（AIによる類題）";

#[derive(Clone)]
pub struct Launcher {
  source: Arc<dyn QuestionSource>,
  progress: ProgressTracker,
  shuffler: Arc<dyn Shuffler>,
  config: TrainerConfig,
  generating: Arc<AtomicBool>,
}

/// Raises the generating flag for its lifetime.
struct GeneratingGuard<'a>(&'a AtomicBool);

impl<'a> GeneratingGuard<'a> {
  fn raise(flag: &'a AtomicBool) -> Self {
    flag.store(true, Ordering::SeqCst);
    Self(flag)
  }
}

impl Drop for GeneratingGuard<'_> {
  fn drop(&mut self) {
    self.0.store(false, Ordering::SeqCst);
  }
}

/// Checks a source batch against the question contract.
fn checked(batch: Vec<Question>, expected: usize) -> Result<Vec<Question>, GenerationError> {
  if batch.len() != expected {
    return Err(GenerationError::CountMismatch { expected, received: batch.len() });
  }
  validate_batch(&batch)?;
  Ok(batch)
}

impl Launcher {
  pub fn new(
    source: Arc<dyn QuestionSource>,
    progress: ProgressTracker,
    shuffler: Arc<dyn Shuffler>,
    config: &TrainerConfig,
  ) -> Self {
    Self {
      source,
      progress,
      shuffler,
      config: config.clone(),
      generating: Arc::new(AtomicBool::new(false)),
    }
  }

  /// True while a launch is waiting on the question source.
  #[cfg(test)]
  pub fn is_generating(&self) -> bool {
    self.generating.load(Ordering::SeqCst)
  }

  fn chapter(&self, number: u32) -> Result<&ChapterCfg, LaunchError> {
    self.config.chapter(number).ok_or(LaunchError::UnknownChapter(number))
  }

  async fn generate_checked(
    &self,
    chapter: &ChapterCfg,
    count: usize,
    difficulty: Difficulty,
  ) -> Result<Vec<Question>, LaunchError> {
    let batch = self
      .source
      .generate(chapter.number, &chapter.syllabus, count, difficulty)
      .await
      .and_then(|b| checked(b, count))
      .inspect_err(|e| error!(target: "generation", chapter = chapter.number, error = %e, "Question generation failed"))?;
    Ok(batch)
  }

  /// Ten fresh questions for one chapter at the active difficulty.
  #[instrument(level = "info", skip(self))]
  pub async fn practice(&self, chapter: u32) -> Result<SessionDescriptor, LaunchError> {
    let chapter = self.chapter(chapter)?.clone();
    let difficulty = self.progress.difficulty().await;
    let _busy = GeneratingGuard::raise(&self.generating);

    let questions = self.generate_checked(&chapter, self.config.exam.practice_count, difficulty).await?;
    self.progress.record_questions(&questions).await;
    info!(target: "generation", chapter = chapter.number, count = questions.len(), %difficulty, "Practice session ready");

    Ok(SessionDescriptor {
      title: format!("{} [{}]", chapter.title, difficulty.label()),
      kind: SessionKind::Practice { chapter: chapter.number },
      questions,
      time_limit_secs: None,
      difficulty,
      passing_score: None,
    })
  }

  /// Full-length timed exam drawn from every chapter in the configured proportion.
  ///
  /// Chapters are requested one after another in ascending order; each batch
  /// is recorded as soon as it arrives.
  #[instrument(level = "info", skip(self))]
  pub async fn mock_exam(&self) -> Result<SessionDescriptor, LaunchError> {
    let difficulty = self.progress.difficulty().await;
    let _busy = GeneratingGuard::raise(&self.generating);

    let mut generated: Vec<Question> = Vec::with_capacity(self.config.exam.mock_total());
    for (&number, &count) in &self.config.exam.mock_distribution {
      if count == 0 {
        continue;
      }
      let chapter = self.chapter(number)?.clone();
      let batch = self.generate_checked(&chapter, count, difficulty).await?;
      self.progress.record_questions(&batch).await;
      generated.extend(batch);
    }

    let presented = shuffled(self.shuffler.as_ref(), &generated);
    info!(target: "generation", total = presented.len(), %difficulty, "Mock exam ready");

    Ok(SessionDescriptor {
      title: format!("模擬試験（全{}問） [{}]", presented.len(), difficulty.label()),
      kind: SessionKind::Mock,
      questions: presented,
      time_limit_secs: Some(self.config.exam.time_limit_secs),
      difficulty,
      passing_score: Some(self.config.exam.passing_score),
    })
  }

  /// Replay every currently missed question in random order.
  #[instrument(level = "info", skip(self))]
  pub async fn review_wrong(&self) -> Result<SessionDescriptor, LaunchError> {
    let wrong = self.progress.wrong_questions().await;
    if wrong.is_empty() {
      return Err(LaunchError::NothingToReview);
    }
    let difficulty = self.progress.difficulty().await;
    Ok(SessionDescriptor {
      title: REVIEW_WRONG_TITLE.into(),
      kind: SessionKind::ReviewWrong,
      questions: shuffled(self.shuffler.as_ref(), &wrong),
      time_limit_secs: None,
      difficulty,
      passing_score: None,
    })
  }

  /// One freshly generated variant for each of a few randomly sampled misses.
  #[instrument(level = "info", skip(self))]
  pub async fn review_similar(&self) -> Result<SessionDescriptor, LaunchError> {
    let wrong = self.progress.wrong_questions().await;
    if wrong.is_empty() {
      return Err(LaunchError::NothingToReview);
    }
    let active = self.progress.difficulty().await;
    let _busy = GeneratingGuard::raise(&self.generating);

    let mut sample = shuffled(self.shuffler.as_ref(), &wrong);
    sample.truncate(self.config.exam.similar_sample);

    let mut similar = Vec::with_capacity(sample.len());
    for original in &sample {
      let target = original.difficulty.unwrap_or(active);
      let syllabus = self.chapter(original.chapter).map(|c| c.syllabus.as_str()).unwrap_or_default();
      let q = self
        .source
        .generate_similar(original, syllabus, target)
        .await
        .inspect_err(|e| error!(target: "generation", original_id = %original.id, error = %e, "Similar question generation failed"))?;
      similar.push(q);
    }
    let similar = checked(similar, sample.len())?;
    self.progress.record_questions(&similar).await;
    info!(target: "generation", count = similar.len(), "Similar-question review ready");

    Ok(SessionDescriptor {
      title: REVIEW_SIMILAR_TITLE.into(),
      kind: SessionKind::ReviewSimilar,
      questions: similar,
      time_limit_secs: None,
      difficulty: active,
      passing_score: None,
    })
  }
}
