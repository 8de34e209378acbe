use std::collections::HashMap;

use serde_json::Value;
use uuid::Uuid;

use crate::schemas::answer::{display_value, value_strings, AnswerData};
use crate::schemas::attempt::AttemptResults;
use crate::schemas::exam::{Question, QuestionType};

const EMPTY_DISPLAY: &str = "—";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grade {
    Correct,
    Incorrect,
    NotAutoGraded,
}

impl Grade {
    pub fn label(self) -> &'static str {
        match self {
            Grade::Correct => "Correct",
            Grade::Incorrect => "Incorrect",
            Grade::NotAutoGraded => "Not auto-graded",
        }
    }
}

#[derive(Debug, Clone)]
pub struct QuestionOutcome {
    pub question_id: Uuid,
    pub title: String,
    pub kind: QuestionType,
    pub student_answer: Option<AnswerData>,
    pub correct_answer: Option<Value>,
    pub grade: Grade,
    pub student_display: String,
    pub correct_display: String,
}

/// Read-only comparison of the recorded answers against the answer key.
#[derive(Debug, Clone)]
pub struct ResultsView {
    pub attempt_id: Uuid,
    pub exam_title: String,
    /// Correct auto-graded answers as counted by the server.
    pub correct_count: f64,
    pub auto_graded_count: usize,
    pub total_possible_score: Option<f64>,
    pub questions: Vec<QuestionOutcome>,
}

impl ResultsView {
    pub fn from_results(results: &AttemptResults) -> Self {
        let answers: HashMap<Uuid, &AnswerData> = results
            .attempt
            .answers
            .iter()
            .filter_map(|saved| saved.answer_data.as_ref().map(|data| (saved.question_id, data)))
            .collect();

        let questions = results
            .exam
            .questions
            .iter()
            .map(|question| outcome(question, answers.get(&question.id).copied()))
            .collect();

        let auto_graded_count =
            results.exam.questions.iter().filter(|question| question.kind.is_auto_gradable()).count();

        Self {
            attempt_id: results.attempt.id,
            exam_title: if results.exam.title.is_empty() {
                "Exam Results".to_string()
            } else {
                results.exam.title.clone()
            },
            correct_count: results.attempt.score.unwrap_or(0.0),
            auto_graded_count,
            total_possible_score: results.attempt.total_possible_score,
            questions,
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "You got {} out of {} auto-graded questions correct.",
            self.correct_count, self.auto_graded_count
        )
    }
}

fn outcome(question: &Question, answer: Option<&AnswerData>) -> QuestionOutcome {
    let grade = grade(question, answer);

    let student_display = answer.map(AnswerData::display).filter(|text| !text.is_empty());
    let correct_display = question
        .correct_answers
        .as_ref()
        .map(display_value)
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| match question.kind {
            QuestionType::Text => "N/A (text question)".to_string(),
            _ => EMPTY_DISPLAY.to_string(),
        });

    QuestionOutcome {
        question_id: question.id,
        title: question.title.clone(),
        kind: question.kind,
        student_answer: answer.cloned(),
        correct_answer: question.correct_answers.clone(),
        grade,
        student_display: student_display.unwrap_or_else(|| EMPTY_DISPLAY.to_string()),
        correct_display,
    }
}

/// Exact, order-insensitive comparison of option strings for choice questions.
pub fn grade(question: &Question, answer: Option<&AnswerData>) -> Grade {
    if !question.kind.is_auto_gradable() {
        return Grade::NotAutoGraded;
    }

    let Some(correct) = question.correct_answers.as_ref().filter(|value| !value.is_null()) else {
        return Grade::NotAutoGraded;
    };

    let mut expected = value_strings(correct);
    let mut given = answer.map(AnswerData::option_strings).unwrap_or_default();
    expected.sort();
    given.sort();

    if expected == given {
        Grade::Correct
    } else {
        Grade::Incorrect
    }
}
