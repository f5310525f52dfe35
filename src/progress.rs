//! Cross-session progress: question bank, missed-question set, exam history
//! and the difficulty setting.
//!
//! Every mutation runs under one write guard and flushes the complete state
//! before the guard is released, so concurrent mutations are serialized and
//! the store always receives the latest snapshot.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{error, info, instrument, warn};

use crate::domain::{AppData, Difficulty, ExamResult, Question};
use crate::store::Store;

#[derive(Clone)]
pub struct ProgressTracker {
    data: Arc<RwLock<AppData>>,
    store: Arc<dyn Store>,
}

impl ProgressTracker {
    /// Load the saved state, or start empty on first run or an unreadable store.
    #[instrument(level = "info", skip_all)]
    pub fn load(store: Arc<dyn Store>) -> Self {
        let data = match store.load() {
            Ok(Some(data)) => {
                info!(target: "progress", questions = data.questions.len(), wrong = data.wrong_question_ids.len(), history = data.exam_history.len(), "Restored saved progress");
                data
            }
            Ok(None) => {
                info!(target: "progress", "No saved progress; starting fresh");
                AppData::default()
            }
            Err(e) => {
                error!(target: "progress", error = %e, "Saved progress unreadable; starting fresh");
                AppData::default()
            }
        };
        Self::with_data(data, store)
    }

    pub fn with_data(data: AppData, store: Arc<dyn Store>) -> Self {
        Self { data: Arc::new(RwLock::new(data)), store }
    }

    /// Best-effort write of the full snapshot on the blocking pool. Failures are
    /// logged and the in-memory state stays authoritative.
    ///
    /// Callers hold the write guard across the await, so saves land in mutation order.
    async fn flush(&self, data: &AppData) {
        let store = Arc::clone(&self.store);
        let snapshot = data.clone();
        match tokio::task::spawn_blocking(move || store.save(&snapshot)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(target: "progress", error = %e, "Failed to persist progress"),
            Err(e) => error!(target: "progress", error = %e, "Persist task did not complete"),
        }
    }

    /// Append a freshly generated batch to the bank, preserving order.
    #[instrument(level = "debug", skip(self, batch), fields(count = batch.len()))]
    pub async fn record_questions(&self, batch: &[Question]) {
        let mut data = self.data.write().await;
        data.questions.extend_from_slice(batch);
        self.flush(&data).await;
    }

    /// Fold a completed session into the missed-question set and history.
    ///
    /// Returns the result as stored: tagged with the active difficulty.
    #[instrument(level = "info", skip(self, result), fields(score = result.score, total = result.total))]
    pub async fn apply_result(&self, mut result: ExamResult) -> ExamResult {
        let mut data = self.data.write().await;
        let known: HashSet<String> = data.questions.iter().map(|q| q.id.clone()).collect();

        for answered in &result.questions {
            let id = &answered.question.id;
            if answered.is_correct() {
                data.wrong_question_ids.remove(id);
            } else if known.contains(id) {
                data.wrong_question_ids.insert(id.clone());
            } else {
                warn!(target: "progress", %id, "Missed question is not in the bank; not tracking it");
            }
        }

        result.difficulty = data.difficulty;
        data.exam_history.insert(0, result.clone());
        info!(target: "progress", wrong = data.wrong_question_ids.len(), history = data.exam_history.len(), "Result recorded");
        self.flush(&data).await;
        result
    }

    /// Bank questions currently in the missed set. Order is not meaningful.
    pub async fn wrong_questions(&self) -> Vec<Question> {
        let data = self.data.read().await;
        data.questions
            .iter()
            .filter(|q| data.wrong_question_ids.contains(&q.id))
            .cloned()
            .collect()
    }

    #[instrument(level = "info", skip(self))]
    pub async fn set_difficulty(&self, difficulty: Difficulty) {
        let mut data = self.data.write().await;
        data.difficulty = difficulty;
        self.flush(&data).await;
    }

    pub async fn difficulty(&self) -> Difficulty {
        self.data.read().await.difficulty
    }

    pub async fn wrong_count(&self) -> usize {
        self.data.read().await.wrong_question_ids.len()
    }

    /// Newest-first history, at most `limit` entries.
    pub async fn history(&self, limit: usize) -> Vec<ExamResult> {
        self.data.read().await.exam_history.iter().take(limit).cloned().collect()
    }

    pub async fn snapshot(&self) -> AppData {
        self.data.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::clock::fixed_now;
    use crate::domain::{sample_question, AnsweredQuestion, ChapterScore};
    use crate::store::{JsonFileStore, MemoryStore};

    fn tracker() -> (ProgressTracker, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (ProgressTracker::load(store.clone()), store)
    }

    fn result_of(answers: &[(&Question, Option<usize>)]) -> ExamResult {
        let questions: Vec<AnsweredQuestion> = answers
            .iter()
            .map(|(q, sel)| AnsweredQuestion { question: (*q).clone(), selected_index: *sel })
            .collect();
        let score = questions.iter().filter(|q| q.is_correct()).count();
        let mut chapter_scores = BTreeMap::new();
        for q in &questions {
            let c: &mut ChapterScore = chapter_scores.entry(q.question.chapter).or_default();
            c.total += 1;
            c.correct += usize::from(q.is_correct());
        }
        ExamResult {
            date: fixed_now(),
            score,
            total: questions.len(),
            chapter_scores,
            questions,
            is_passed: None,
            difficulty: Difficulty::Easy,
        }
    }

    #[tokio::test]
    async fn wrong_then_right_clears_the_question() {
        let (tracker, _) = tracker();
        let q1 = sample_question("q1", 1, 0);
        let q2 = sample_question("q2", 1, 1);
        tracker.record_questions(&[q1.clone(), q2.clone()]).await;

        tracker.apply_result(result_of(&[(&q1, Some(3)), (&q2, None)])).await;
        let mut wrong: Vec<String> = tracker.wrong_questions().await.into_iter().map(|q| q.id).collect();
        wrong.sort();
        assert_eq!(wrong, vec!["q1", "q2"]);

        tracker.apply_result(result_of(&[(&q1, Some(0)), (&q2, Some(2))])).await;
        let wrong: Vec<String> = tracker.wrong_questions().await.into_iter().map(|q| q.id).collect();
        assert_eq!(wrong, vec!["q2"]);
    }

    #[tokio::test]
    async fn unknown_ids_never_enter_the_wrong_set() {
        let (tracker, _) = tracker();
        let stray = sample_question("stray", 2, 0);
        tracker.apply_result(result_of(&[(&stray, Some(1))])).await;

        let snap = tracker.snapshot().await;
        assert!(snap.wrong_question_ids.is_empty());
        assert_eq!(snap.exam_history.len(), 1);
        let bank: HashSet<&str> = snap.questions.iter().map(|q| q.id.as_str()).collect();
        assert!(snap.wrong_question_ids.iter().all(|id| bank.contains(id.as_str())));
    }

    #[tokio::test]
    async fn history_is_newest_first_and_tagged_with_active_difficulty() {
        let (tracker, _) = tracker();
        let q = sample_question("q", 1, 0);
        tracker.record_questions(std::slice::from_ref(&q)).await;

        tracker.set_difficulty(Difficulty::Hard).await;
        let first = tracker.apply_result(result_of(&[(&q, Some(0))])).await;
        assert_eq!(first.difficulty, Difficulty::Hard);

        tracker.set_difficulty(Difficulty::Exam).await;
        tracker.apply_result(result_of(&[(&q, Some(1))])).await;

        let history = tracker.history(5).await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].difficulty, Difficulty::Exam);
        assert_eq!(history[0].score, 0);
        assert_eq!(history[1].difficulty, Difficulty::Hard);
        assert_eq!(tracker.history(1).await.len(), 1);
    }

    #[tokio::test]
    async fn every_mutation_flushes_full_state() {
        let (tracker, store) = tracker();
        let q = sample_question("q", 1, 0);

        tracker.record_questions(std::slice::from_ref(&q)).await;
        assert_eq!(store.saves(), 1);
        tracker.set_difficulty(Difficulty::Easy).await;
        assert_eq!(store.saves(), 2);
        tracker.apply_result(result_of(&[(&q, Some(2))])).await;
        assert_eq!(store.saves(), 3);

        assert_eq!(store.stored(), Some(tracker.snapshot().await));
        assert_eq!(tracker.wrong_count().await, 1);
    }

    #[tokio::test]
    async fn save_failures_keep_in_memory_state() {
        let (tracker, store) = tracker();
        store.set_fail_saves(true);
        tracker.set_difficulty(Difficulty::Exam).await;

        assert_eq!(tracker.difficulty().await, Difficulty::Exam);
        assert_eq!(store.saves(), 0);
    }

    #[tokio::test]
    async fn load_restores_saved_state() {
        let mut data = AppData { difficulty: Difficulty::Hard, ..AppData::default() };
        data.questions.push(sample_question("q", 3, 1));
        data.wrong_question_ids.insert("q".into());
        let store = Arc::new(MemoryStore::with_data(data.clone()));

        let tracker = ProgressTracker::load(store);
        assert_eq!(tracker.snapshot().await, data);
        assert_eq!(tracker.wrong_questions().await.len(), 1);
    }

    #[tokio::test]
    async fn unreadable_state_file_survives_later_mutations() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        let original = r#"{"questions":[],"wrongQuestionIds":[],"examHistory":[],"difficulty":"hard""#;
        std::fs::write(&path, original).unwrap();

        let tracker = ProgressTracker::load(Arc::new(JsonFileStore::new(&path)));
        assert_eq!(tracker.snapshot().await, AppData::default());
        tracker.set_difficulty(Difficulty::Easy).await;

        let aside: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.file_name().unwrap().to_string_lossy().starts_with("state.json.corrupt-"))
            .collect();
        assert_eq!(aside.len(), 1);
        assert_eq!(std::fs::read_to_string(&aside[0]).unwrap(), original);

        let fresh: AppData = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(fresh.difficulty, Difficulty::Easy);
    }

    #[tokio::test]
    async fn concurrent_mutations_are_not_lost() {
        let (tracker, store) = tracker();
        let q = sample_question("q", 1, 0);
        tracker.record_questions(std::slice::from_ref(&q)).await;

        let a = tracker.clone();
        let b = tracker.clone();
        let r = result_of(&[(&q, Some(1))]);
        let (_, _) = tokio::join!(a.set_difficulty(Difficulty::Exam), b.apply_result(r));

        let snap = tracker.snapshot().await;
        assert_eq!(snap.difficulty, Difficulty::Exam);
        assert_eq!(snap.exam_history.len(), 1);
        assert!(snap.wrong_question_ids.contains("q"));
        assert_eq!(store.stored(), Some(snap));
    }
}
