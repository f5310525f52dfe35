//! Plain-text views for the console. Pure functions: state in, text out.

use crate::config::ChapterCfg;
use crate::domain::{Difficulty, ExamResult};
use crate::session::ExamSession;
use crate::util::{choice_letter, format_clock};

const RULE: &str = "------------------------------------------------------------";

pub const GENERATION_FAILED: &str = "問題生成に失敗しました。時間をおいて再度お試しください。";
pub const NOTHING_TO_REVIEW: &str = "復習する問題がありません。まずは演習か模擬試験を解いてください。";
pub const GENERATING: &str = "問題を生成しています…";
pub const CANCEL_PROMPT: &str = "試験を中断しますか？結果は保存されません。 [y/N] ";

pub fn menu(difficulty: Difficulty, wrong_count: usize) -> String {
  format!(
    "\n{RULE}\n生成AIパスポート 試験対策  難易度: {}\n{RULE}\n  syllabus       シラバス一覧\n  practice <n>   第n章の演習（10問）\n  mock           模擬試験（60問・60分）\n  review         間違えた問題の復習（{wrong_count}問）\n  similar        AIによる類題で復習\n  history        成績履歴\n  difficulty <d> 難易度変更 (easy|normal|hard|exam)\n  quit           終了\n> ",
    difficulty.label(),
  )
}

pub fn syllabus(chapters: &[ChapterCfg]) -> String {
  let mut out = format!("\n{RULE}\nシラバス\n{RULE}\n");
  for c in chapters {
    out.push_str(&format!("[{}] {}\n    {}\n", c.number, c.title, c.syllabus));
  }
  out
}

pub fn difficulty_choices(active: Difficulty) -> String {
  let mut out = String::from("難易度:\n");
  for d in Difficulty::ALL {
    let marker = if d == active { '*' } else { ' ' };
    out.push_str(&format!(" {marker} {:<7} {}\n", d.as_str(), d.label()));
  }
  out
}

/// The current question with progress, countdown and the recorded pick.
pub fn question(session: &ExamSession) -> String {
  let q = session.current_question();
  let mut header = format!("\n{RULE}\n{}  問 {}/{}", session.title(), session.position() + 1, session.total());
  if let Some(left) = session.remaining_secs() {
    header.push_str(&format!("  残り {}", format_clock(left)));
  }
  header.push_str(&format!("  回答済 {}/{}", session.answered_count(), session.total()));

  let mut out = format!("{header}\n{RULE}\n[{}] {}\n\n", q.topic_tag, q.question);
  for (i, choice) in q.choices.iter().enumerate() {
    let marker = if session.current_answer() == Some(i) { '>' } else { ' ' };
    out.push_str(&format!("{marker} {}. {choice}\n", choice_letter(i)));
  }
  let nav = if session.is_last() { "a-d 回答 / p 前へ / submit 採点 / cancel 中断" } else { "a-d 回答 / n 次へ / p 前へ / submit 採点 / cancel 中断" };
  out.push_str(&format!("\n{nav}\n> "));
  out
}

/// Score, pass/fail for mock exams, chapter breakdown and a full answer review.
pub fn result(title: &str, result: &ExamResult) -> String {
  let mut out = format!("\n{RULE}\n結果: {title}\n{RULE}\n");
  out.push_str(&format!("スコア: {} / {}  ({})\n", result.score, result.total, result.difficulty.label()));
  match result.is_passed {
    Some(true) => out.push_str("判定: 合格\n"),
    Some(false) => out.push_str("判定: 不合格\n"),
    None => {}
  }

  out.push_str("\n章別正答率:\n");
  for (chapter, s) in &result.chapter_scores {
    out.push_str(&format!("  第{chapter}章  {}/{}  {}%\n", s.correct, s.total, s.percent()));
  }

  out.push_str("\n解答と解説:\n");
  for (i, a) in result.questions.iter().enumerate() {
    let mark = if a.is_correct() { "○" } else { "×" };
    let picked = a.selected_index.map_or_else(|| "未回答".to_string(), |s| choice_letter(s).to_string());
    let q = &a.question;
    out.push_str(&format!(
      "{mark} Q{} [第{}章 {}] {}\n    あなたの解答: {picked}  正解: {}. {}\n    解説: {}\n",
      i + 1,
      q.chapter,
      q.topic_tag,
      q.question,
      choice_letter(q.correct_index),
      q.choices.get(q.correct_index).map(String::as_str).unwrap_or_default(),
      q.explanation,
    ));
  }
  out.push_str("\nEnter でメニューへ戻る\n");
  out
}

/// Newest-first list of past results.
pub fn history(results: &[ExamResult]) -> String {
  let mut out = format!("\n{RULE}\n成績履歴\n{RULE}\n");
  if results.is_empty() {
    out.push_str("まだ記録がありません。\n");
    return out;
  }
  for r in results {
    let kind = match r.is_passed {
      Some(true) => "合格",
      Some(false) => "不合格",
      None => "章別演習",
    };
    out.push_str(&format!(
      "{}  {:>3}/{:<3}  {}  {}\n",
      r.date.format("%Y-%m-%d %H:%M"),
      r.score,
      r.total,
      r.difficulty.label(),
      kind,
    ));
  }
  out
}

pub fn session_help() -> &'static str {
  "a-d / 1-4: 回答, n: 次へ, p: 前へ, submit: 採点, cancel: 中断\n> "
}
