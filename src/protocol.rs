//! Commands the console accepts, parsed from one input line.
//! Keep this small and stable so views and the loop can evolve independently.

use std::str::FromStr;

use thiserror::Error;

use crate::domain::{Difficulty, UnknownDifficulty, CHOICE_COUNT};

/// Commands available from the main menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuCommand {
    Syllabus,
    Practice { chapter: u32 },
    Mock,
    History,
    Review,
    Similar,
    Difficulty(Option<Difficulty>),
    Help,
    Quit,
}

/// Commands available while a session is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    Answer(usize),
    Next,
    Prev,
    Submit,
    Cancel,
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseCommandError {
    #[error("empty input")]
    Empty,
    #[error("unknown command '{0}' (type 'help')")]
    Unknown(String),
    #[error("'practice' needs a chapter number, e.g. 'practice 2'")]
    MissingChapter,
    #[error("'{0}' is not a chapter number")]
    BadChapter(String),
    #[error(transparent)]
    Difficulty(#[from] UnknownDifficulty),
}

fn split(line: &str) -> Result<(String, Option<&str>), ParseCommandError> {
    let mut parts = line.split_whitespace();
    let head = parts.next().ok_or(ParseCommandError::Empty)?;
    Ok((head.to_ascii_lowercase(), parts.next()))
}

impl FromStr for MenuCommand {
    type Err = ParseCommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let (head, arg) = split(line)?;
        let cmd = match head.as_str() {
            "syllabus" | "s" => MenuCommand::Syllabus,
            "practice" | "p" => {
                let raw = arg.ok_or(ParseCommandError::MissingChapter)?;
                let chapter = raw.parse().map_err(|_| ParseCommandError::BadChapter(raw.to_string()))?;
                MenuCommand::Practice { chapter }
            }
            "mock" | "m" => MenuCommand::Mock,
            "history" | "h" => MenuCommand::History,
            "review" | "r" => MenuCommand::Review,
            "similar" => MenuCommand::Similar,
            "difficulty" | "d" => MenuCommand::Difficulty(arg.map(str::parse::<Difficulty>).transpose()?),
            "help" | "?" => MenuCommand::Help,
            "quit" | "q" | "exit" => MenuCommand::Quit,
            other => return Err(ParseCommandError::Unknown(other.to_string())),
        };
        Ok(cmd)
    }
}

impl FromStr for SessionCommand {
    type Err = ParseCommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let (head, _) = split(line)?;
        let cmd = match head.as_str() {
            "n" | "next" => SessionCommand::Next,
            "p" | "prev" => SessionCommand::Prev,
            "submit" => SessionCommand::Submit,
            "cancel" => SessionCommand::Cancel,
            "help" | "?" => SessionCommand::Help,
            other => return answer_index(other).map(SessionCommand::Answer).ok_or_else(|| ParseCommandError::Unknown(other.to_string())),
        };
        Ok(cmd)
    }
}

/// `a`..`d` or `1`..`4` to a 0-based choice index.
fn answer_index(token: &str) -> Option<usize> {
    let mut chars = token.chars();
    let c = chars.next()?;
    if chars.next().is_some() {
        return None;
    }
    let idx = match c {
        'a'..='z' => c as usize - 'a' as usize,
        '1'..='9' => c as usize - '1' as usize,
        _ => return None,
    };
    (idx < CHOICE_COUNT).then_some(idx)
}

/// True for an explicit yes on a confirmation prompt; anything else is no.
pub fn is_yes(line: &str) -> bool {
    matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
