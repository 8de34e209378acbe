use std::path::Path;

use anyhow::{anyhow, Context, Result};
use uuid::Uuid;

use crate::schemas::answer::{AnswerData, FileAnswer};
use crate::schemas::exam::{Exam, Question, QuestionType};

/// One line typed by the student while an attempt is running.
#[derive(Debug, Clone, PartialEq)]
pub enum InputLine {
    Answer { question_id: Uuid, data: AnswerData },
    Submit,
    Status,
    Help,
}

pub const INPUT_HELP: &str = "\
  answer <n|question_id> <value>   single: one option; multi: a,b; text: as typed; upload: @path
  status                           show time left and progress
  submit                           submit the attempt
  (Ctrl+C leaves the attempt open for `resume`)";

pub fn parse_line(exam: &Exam, line: &str) -> Result<Option<InputLine>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (word, rest) = split_word(line);
    let parsed = match word {
        "submit" => InputLine::Submit,
        "status" => InputLine::Status,
        "help" | "?" => InputLine::Help,
        "answer" | "a" => {
            let (target, value) = split_word(rest);
            if target.is_empty() {
                return Err(anyhow!("answer needs a question number and a value"));
            }
            let question = find_question(exam, target)?;
            let data = answer_for(question, value)?;
            InputLine::Answer { question_id: question.id, data }
        }
        _ => return Err(anyhow!("Unknown command: {word} (type `help`)")),
    };

    Ok(Some(parsed))
}

fn split_word(input: &str) -> (&str, &str) {
    let input = input.trim_start();
    match input.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (input, ""),
    }
}

/// Questions are addressed by 1-based position or by id.
fn find_question<'a>(exam: &'a Exam, target: &str) -> Result<&'a Question> {
    if let Ok(position) = target.parse::<usize>() {
        return position
            .checked_sub(1)
            .and_then(|index| exam.questions.get(index))
            .ok_or_else(|| anyhow!("No question number {position}"));
    }

    let id: Uuid = target.parse().with_context(|| format!("Not a question number or id: {target}"))?;
    exam.question(id).ok_or_else(|| anyhow!("Question {id} is not part of this exam"))
}

pub fn answer_for(question: &Question, raw: &str) -> Result<AnswerData> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(anyhow!("Answer value is empty"));
    }

    let data = match question.kind {
        QuestionType::MultiChoice => AnswerData::multi_choice(
            raw.split(',').map(str::trim).filter(|part| !part.is_empty()),
        ),
        QuestionType::SingleChoice => AnswerData::single_choice(raw),
        QuestionType::ImageUpload => {
            let path = raw.strip_prefix('@').unwrap_or(raw);
            let file = FileAnswer::from_path(Path::new(path), true)
                .with_context(|| format!("Failed to read {path}"))?;
            AnswerData::File(file)
        }
        _ => match raw.strip_prefix('@') {
            Some(path) => {
                let file = FileAnswer::from_path(Path::new(path), false)
                    .with_context(|| format!("Failed to read {path}"))?;
                AnswerData::File(file)
            }
            None => AnswerData::text(raw),
        },
    };

    question.check_choice(&data)?;
    Ok(data)
}
