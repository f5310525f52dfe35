//! Line-oriented console: main menu loop plus the in-session loop.
//! Each input line is parsed into a command and dispatched; the view is
//! redrawn after every command. During a timed session the countdown's
//! auto-submitted result races user input through `tokio::select!`.

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, Lines};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, instrument, warn};

use crate::domain::{ExamResult, SessionDescriptor};
use crate::error::{LaunchError, SessionError};
use crate::protocol::{is_yes, MenuCommand, SessionCommand};
use crate::render;
use crate::session::{Countdown, ExamSession};
use crate::state::AppState;

/// Latest results shown by `history`.
const HISTORY_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

enum Outcome {
    Finished { result: ExamResult, timed_out: bool },
    Cancelled,
    InputClosed,
}

enum Event {
    Line(Option<String>),
    TimeUp(ExamResult),
}

pub struct Console<R, W> {
    state: Arc<AppState>,
    lines: Lines<R>,
    out: W,
}

impl<R, W> Console<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(state: Arc<AppState>, input: R, out: W) -> Self {
        Self { state, lines: input.lines(), out }
    }

    async fn say(&mut self, text: &str) -> std::io::Result<()> {
        self.out.write_all(text.as_bytes()).await?;
        self.out.flush().await
    }

    /// Run the main menu until `quit` or end of input.
    #[instrument(level = "info", skip(self))]
    pub async fn run(&mut self) -> std::io::Result<()> {
        info!(target: "passport_trainer", "Console started");
        loop {
            let difficulty = self.state.progress.difficulty().await;
            let wrong = self.state.progress.wrong_count().await;
            self.say(&render::menu(difficulty, wrong)).await?;

            let Some(line) = self.lines.next_line().await? else { break };
            if line.trim().is_empty() {
                continue;
            }
            let cmd = match line.parse::<MenuCommand>() {
                Ok(cmd) => cmd,
                Err(e) => {
                    self.say(&format!("{e}\n")).await?;
                    continue;
                }
            };
            debug!(target: "passport_trainer", ?cmd, "Menu command");
            if self.dispatch(cmd).await? == Flow::Quit {
                break;
            }
        }
        let snap = self.state.progress.snapshot().await;
        info!(target: "passport_trainer", questions = snap.questions.len(), wrong = snap.wrong_question_ids.len(), history = snap.exam_history.len(), "Console closed");
        Ok(())
    }

    async fn dispatch(&mut self, cmd: MenuCommand) -> std::io::Result<Flow> {
        let state = self.state.clone();
        let launched = match cmd {
            MenuCommand::Syllabus => {
                self.say(&render::syllabus(&state.config.chapters)).await?;
                return Ok(Flow::Continue);
            }
            MenuCommand::History => {
                let history = state.progress.history(HISTORY_LIMIT).await;
                self.say(&render::history(&history)).await?;
                return Ok(Flow::Continue);
            }
            MenuCommand::Difficulty(Some(d)) => {
                state.progress.set_difficulty(d).await;
                self.say(&format!("難易度を {} に変更しました。\n", d.label())).await?;
                return Ok(Flow::Continue);
            }
            MenuCommand::Difficulty(None) => {
                let active = state.progress.difficulty().await;
                self.say(&render::difficulty_choices(active)).await?;
                return Ok(Flow::Continue);
            }
            MenuCommand::Help => return Ok(Flow::Continue),
            MenuCommand::Quit => return Ok(Flow::Quit),
            MenuCommand::Practice { chapter } => {
                self.say(&format!("{}\n", render::GENERATING)).await?;
                state.launcher.practice(chapter).await
            }
            MenuCommand::Mock => {
                self.say(&format!("{}\n", render::GENERATING)).await?;
                state.launcher.mock_exam().await
            }
            MenuCommand::Review => state.launcher.review_wrong().await,
            MenuCommand::Similar => {
                if state.progress.wrong_count().await > 0 {
                    self.say(&format!("{}\n", render::GENERATING)).await?;
                }
                state.launcher.review_similar().await
            }
        };

        match launched {
            Ok(descriptor) => self.run_session(descriptor).await,
            Err(LaunchError::NothingToReview) => {
                self.say(&format!("{}\n", render::NOTHING_TO_REVIEW)).await?;
                Ok(Flow::Continue)
            }
            Err(LaunchError::UnknownChapter(n)) => {
                self.say(&format!("第{n}章はありません。syllabus で章番号を確認してください。\n")).await?;
                Ok(Flow::Continue)
            }
            Err(e) => {
                warn!(target: "passport_trainer", error = %e, "Launch failed");
                self.say(&format!("{}\n", render::GENERATION_FAILED)).await?;
                Ok(Flow::Continue)
            }
        }
    }

    #[instrument(level = "info", skip(self, descriptor), fields(title = %descriptor.title, total = descriptor.questions.len()))]
    async fn run_session(&mut self, descriptor: SessionDescriptor) -> std::io::Result<Flow> {
        let title = descriptor.title.clone();
        let session = match ExamSession::new(descriptor, self.state.clock) {
            Ok(s) => s,
            Err(e) => {
                warn!(target: "session", error = %e, "Session not started");
                self.say(&format!("{}\n", render::GENERATION_FAILED)).await?;
                return Ok(Flow::Continue);
            }
        };
        info!(target: "session", kind = ?session.kind(), total = session.total(), timed = session.time_limit_secs().is_some(), "Session started");
        let shared = Arc::new(Mutex::new(session));
        let (tx, mut rx) = mpsc::channel(1);
        let countdown = Countdown::spawn(shared.clone(), tx).await;

        let outcome = self.session_loop(&shared, &mut rx).await;
        if let Some(countdown) = countdown {
            countdown.stop();
        }
        let status = shared.lock().await.status();
        debug!(target: "session", ?status, "Session ended");

        match outcome? {
            Outcome::Finished { result, timed_out } => {
                if timed_out {
                    self.say("\n時間切れです。自動採点しました。\n").await?;
                }
                let stored = self.state.progress.apply_result(result).await;
                self.say(&render::result(&title, &stored)).await?;
                match self.lines.next_line().await? {
                    Some(_) => Ok(Flow::Continue),
                    None => Ok(Flow::Quit),
                }
            }
            Outcome::Cancelled => {
                self.say("試験を中断しました。\n").await?;
                Ok(Flow::Continue)
            }
            Outcome::InputClosed => Ok(Flow::Quit),
        }
    }

    async fn session_loop(
        &mut self,
        shared: &Arc<Mutex<ExamSession>>,
        rx: &mut mpsc::Receiver<ExamResult>,
    ) -> std::io::Result<Outcome> {
        let view = render::question(&*shared.lock().await);
        self.say(&view).await?;

        loop {
            let event = tokio::select! {
                Some(result) = rx.recv() => Event::TimeUp(result),
                line = self.lines.next_line() => Event::Line(line?),
            };

            let line = match event {
                Event::TimeUp(result) => return Ok(Outcome::Finished { result, timed_out: true }),
                Event::Line(None) => {
                    shared.lock().await.cancel();
                    return Ok(Outcome::InputClosed);
                }
                Event::Line(Some(line)) => line,
            };
            if line.trim().is_empty() {
                self.say("> ").await?;
                continue;
            }

            let cmd = match line.parse::<SessionCommand>() {
                Ok(cmd) => cmd,
                Err(e) => {
                    self.say(&format!("{e}\n> ")).await?;
                    continue;
                }
            };

            match cmd {
                SessionCommand::Answer(choice) => {
                    if let Err(e) = shared.lock().await.select_answer(choice) {
                        debug!(target: "session", error = %e, "Answer ignored");
                    }
                }
                SessionCommand::Next => shared.lock().await.advance(1),
                SessionCommand::Prev => shared.lock().await.advance(-1),
                SessionCommand::Help => {
                    self.say(render::session_help()).await?;
                    continue;
                }
                SessionCommand::Submit => {
                    let submitted = shared.lock().await.submit();
                    return match submitted {
                        Ok(result) => Ok(Outcome::Finished { result, timed_out: false }),
                        Err(SessionError::Closed) => Ok(Self::await_timer(rx).await),
                        Err(e) => {
                            warn!(target: "session", error = %e, "Submit failed");
                            Ok(Outcome::Cancelled)
                        }
                    };
                }
                SessionCommand::Cancel => {
                    self.say(render::CANCEL_PROMPT).await?;
                    // The countdown keeps running while the user decides.
                    let reply = tokio::select! {
                        Some(result) = rx.recv() => {
                            return Ok(Outcome::Finished { result, timed_out: true });
                        }
                        line = self.lines.next_line() => line?,
                    };
                    let Some(answer) = reply else {
                        shared.lock().await.cancel();
                        return Ok(Outcome::InputClosed);
                    };
                    if is_yes(&answer) {
                        if shared.lock().await.cancel() {
                            return Ok(Outcome::Cancelled);
                        }
                        // The timer submitted while we were asking.
                        return Ok(Self::await_timer(rx).await);
                    }
                }
            }

            let view = render::question(&*shared.lock().await);
            self.say(&view).await?;
        }
    }

    /// The countdown already submitted; its result is in flight on the channel.
    async fn await_timer(rx: &mut mpsc::Receiver<ExamResult>) -> Outcome {
        match rx.recv().await {
            Some(result) => Outcome::Finished { result, timed_out: true },
            None => {
                warn!(target: "session", "Session closed without a result");
                Outcome::Cancelled
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::BufReader;

    use super::*;
    use crate::clock::{fixed_now, Clock};
    use crate::config::TrainerConfig;
    use crate::domain::Difficulty;
    use crate::shuffle::ReverseShuffler;
    use crate::source::fake::FakeSource;
    use crate::store::MemoryStore;

    fn app(source: FakeSource) -> (Arc<AppState>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let state = AppState::from_parts(
            TrainerConfig::default(),
            Arc::new(source),
            store.clone(),
            Arc::new(ReverseShuffler),
            Clock::fixed(fixed_now()),
        );
        (Arc::new(state), store)
    }

    async fn drive(state: &Arc<AppState>, script: &str) -> String {
        let mut out = Vec::new();
        Console::new(state.clone(), BufReader::new(script.as_bytes()), &mut out).run().await.unwrap();
        String::from_utf8(out).unwrap()
    }

    #[tokio::test]
    async fn practice_answer_submit_records_result() {
        let (state, _) = app(FakeSource::default());
        // Fake question i has correct index i % 4: answer the first two correctly.
        let out = drive(&state, "practice 1\na\nn\nb\nn\nd\nsubmit\n\nquit\n").await;

        assert!(out.contains("問 1/10"));
        assert!(out.contains("スコア: 2 / 10"));
        let history = state.progress.history(5).await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].score, 2);
        assert_eq!(state.progress.wrong_count().await, 8);
    }

    #[tokio::test]
    async fn confirmed_cancel_leaves_history_untouched() {
        let (state, store) = app(FakeSource::default());
        let out = drive(&state, "practice 2\ncancel\ny\nquit\n").await;

        assert!(out.contains(render::CANCEL_PROMPT));
        assert!(out.contains("試験を中断しました"));
        let snap = state.progress.snapshot().await;
        assert!(snap.exam_history.is_empty());
        assert!(snap.wrong_question_ids.is_empty());
        // Only the generated batch was saved.
        assert_eq!(store.saves(), 1);
    }

    #[tokio::test]
    async fn declined_cancel_keeps_the_session_running() {
        let (state, _) = app(FakeSource::default());
        let out = drive(&state, "practice 1\ncancel\nn\nsubmit\n\nquit\n").await;

        assert!(!out.contains("試験を中断しました"));
        assert_eq!(state.progress.history(5).await.len(), 1);
    }

    #[tokio::test]
    async fn generation_failure_shows_notice_and_starts_nothing() {
        let (state, _) = app(FakeSource::failing_on(0));
        let out = drive(&state, "practice 1\nquit\n").await;

        assert!(out.contains(render::GENERATION_FAILED));
        assert!(!out.contains("問 1/"));
        assert!(!state.launcher.is_generating());
        assert!(state.progress.snapshot().await.questions.is_empty());
    }

    #[tokio::test]
    async fn empty_review_is_a_notice() {
        let (state, store) = app(FakeSource::default());
        let out = drive(&state, "review\nsimilar\nquit\n").await;

        assert_eq!(out.matches(render::NOTHING_TO_REVIEW).count(), 2);
        assert_eq!(store.saves(), 0);
    }

    #[tokio::test]
    async fn menu_handles_difficulty_history_and_bad_input() {
        let (state, _) = app(FakeSource::default());
        let out = drive(&state, "difficulty exam\nhistory\npractice 9\nfly\nsyllabus\n").await;

        assert_eq!(state.progress.difficulty().await, Difficulty::Exam);
        assert!(out.contains("本番級 (Exam) に変更しました"));
        assert!(out.contains("まだ記録がありません"));
        assert!(out.contains("第9章はありません"));
        assert!(out.contains("unknown command 'fly'"));
        assert!(out.contains("第5章 テキスト生成AIのプロンプト制作と実例"));
    }

    #[tokio::test]
    async fn end_of_input_mid_session_records_nothing() {
        let (state, _) = app(FakeSource::default());
        drive(&state, "practice 1\na\n").await;
        assert!(state.progress.history(5).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn mock_exam_auto_submits_when_time_runs_out() {
        let (state, _) = app(FakeSource::default());
        let (mut client, server) = tokio::io::duplex(64 * 1024);

        let console_state = state.clone();
        let console = tokio::spawn(async move {
            let mut out = Vec::new();
            Console::new(console_state, BufReader::new(server), &mut out).run().await.unwrap();
            String::from_utf8(out).unwrap()
        });

        client.write_all(b"mock\nb\n").await.unwrap();
        tokio::time::sleep(Duration::from_secs(3601)).await;
        client.write_all(b"\nquit\n").await.unwrap();
        let out = console.await.unwrap();

        assert!(out.contains("残り 60:00"));
        assert!(out.contains("時間切れです"));
        assert!(out.contains("判定: 不合格"));
        let history = state.progress.history(5).await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].total, 60);
        assert_eq!(history[0].is_passed, Some(false));
    }

    #[tokio::test(start_paused = true)]
    async fn time_up_during_cancel_prompt_submits_without_waiting_for_an_answer() {
        use tokio::io::AsyncReadExt;

        let (state, _) = app(FakeSource::default());
        let (mut client, server) = tokio::io::duplex(64 * 1024);
        let (out_writer, mut out_reader) = tokio::io::duplex(256 * 1024);

        let console_state = state.clone();
        let console = tokio::spawn(async move {
            Console::new(console_state, BufReader::new(server), out_writer).run().await.unwrap();
        });

        client.write_all(b"mock\ncancel\n").await.unwrap();
        tokio::time::sleep(Duration::from_secs(3601)).await;

        // Nothing else is typed: the result must show up on its own.
        let mut out = Vec::new();
        let waited = tokio::time::timeout(Duration::from_secs(5), async {
            let mut buf = [0u8; 4096];
            while !String::from_utf8_lossy(&out).contains("時間切れです") {
                let n = out_reader.read(&mut buf).await.unwrap();
                assert!(n > 0, "console closed its output early");
                out.extend_from_slice(&buf[..n]);
            }
        })
        .await;
        assert!(waited.is_ok(), "time-up was held back by the cancel prompt");

        client.write_all(b"\nquit\n").await.unwrap();
        console.await.unwrap();
        out_reader.read_to_end(&mut out).await.unwrap();
        let out = String::from_utf8_lossy(&out);

        assert!(out.contains(render::CANCEL_PROMPT));
        assert!(!out.contains("試験を中断しました"));
        let history = state.progress.history(5).await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].is_passed, Some(false));
    }
}
