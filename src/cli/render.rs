use std::collections::HashMap;
use std::fmt::Write;

use uuid::Uuid;

use crate::core::time::{format_countdown, format_offset};
use crate::schemas::answer::AnswerData;
use crate::schemas::attempt::{CompletedExam, UnfinishedAttempt};
use crate::schemas::evaluation::EvaluatedResults;
use crate::schemas::exam::{AvailableExam, Exam};
use crate::services::exam_session::SessionSnapshot;
use crate::services::results::ResultsView;

pub fn exam_overview(exam: &Exam, answers: &HashMap<Uuid, AnswerData>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "== {} ==", exam.title);
    for (index, question) in exam.questions.iter().enumerate() {
        let _ = writeln!(
            out,
            "{}. [{}] {}",
            index + 1,
            question.kind.as_str(),
            question.title
        );
        if let Some(description) = question.description.as_deref().filter(|text| !text.is_empty()) {
            let _ = writeln!(out, "   {description}");
        }
        let options = question.option_labels();
        if !options.is_empty() {
            let _ = writeln!(out, "   options: {}", options.join(" | "));
        }
        if let Some(answer) = answers.get(&question.id) {
            let _ = writeln!(out, "   saved: {}", answer.display());
        }
    }
    out
}

pub fn status(snapshot: &SessionSnapshot) -> String {
    let mut line = format!(
        "[{}] {} left, {}/{} answered",
        snapshot.state.label(),
        format_countdown(snapshot.remaining_seconds),
        snapshot.answered,
        snapshot.total
    );
    if snapshot.saving {
        line.push_str(", saving...");
    }
    line
}

pub fn results(view: &ResultsView) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "== {} ==", view.exam_title);
    let _ = writeln!(out, "{}", view.summary());
    for (index, question) in view.questions.iter().enumerate() {
        let _ = writeln!(out, "{}. {} ({})", index + 1, question.title, question.grade.label());
        let _ = writeln!(out, "   your answer:    {}", question.student_display);
        let _ = writeln!(out, "   correct answer: {}", question.correct_display);
    }
    out
}

pub fn available(exams: &[AvailableExam]) -> String {
    if exams.is_empty() {
        return "No exams available.\n".to_string();
    }

    let mut out = String::new();
    for entry in exams {
        let exam = &entry.exam;
        let mut line = format!("{}  {}  [{}]", exam.id, exam.title, entry.window_label());
        if let Some(minutes) = exam.duration_minutes {
            let _ = write!(line, "  {minutes} min");
        }
        if let Some(end) = exam.end_time {
            let _ = write!(line, "  closes {}", format_offset(end));
        }
        let _ = writeln!(out, "{line}");
    }
    out
}

pub fn unfinished(attempts: &[UnfinishedAttempt]) -> String {
    if attempts.is_empty() {
        return "No unfinished attempts.\n".to_string();
    }

    let mut out = String::new();
    for attempt in attempts {
        let _ = writeln!(
            out,
            "{}  {}  started {}",
            attempt.id,
            attempt.exam.title,
            format_offset(attempt.start_time)
        );
    }
    out
}

pub fn completed(exams: &[CompletedExam]) -> String {
    if exams.is_empty() {
        return "No completed exams.\n".to_string();
    }

    let mut out = String::new();
    for exam in exams {
        let total = exam.total_possible_score.map(|total| format!("/{total}")).unwrap_or_default();
        let _ = writeln!(
            out,
            "{}  {}  score {}{} ({:.1}%)  finished {}",
            exam.id,
            exam.exam_title,
            exam.score,
            total,
            exam.percentage,
            format_offset(exam.end_time)
        );
    }
    out
}

pub fn evaluated(results: &EvaluatedResults) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "== {} ==", results.exam_title);
    let total = results.total_possible_score.map(|total| format!("/{total}")).unwrap_or_default();
    let _ = writeln!(
        out,
        "score {}{} ({:.1}%), submitted {}",
        results.score,
        total,
        results.percentage,
        format_offset(results.submitted_at)
    );
    if let Some(publisher) = results.published_by.as_deref() {
        let _ = writeln!(out, "published by {publisher}");
    }

    for (index, answer) in results.answers_with_evaluations.iter().enumerate() {
        let given = answer
            .answer_data
            .as_ref()
            .map(AnswerData::display)
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| "—".to_string());
        let _ = writeln!(
            out,
            "{}. [{}] {}",
            index + 1,
            answer.question_type.as_str(),
            answer.question_title
        );
        let _ = writeln!(out, "   answer: {given}");

        match &answer.evaluation {
            Some(evaluation) => {
                let verdict = match evaluation.is_correct {
                    Some(true) => "correct",
                    Some(false) => "incorrect",
                    None => "graded",
                };
                let score = evaluation
                    .score_awarded
                    .map(|score| format!(", {score} points"))
                    .unwrap_or_default();
                let _ = writeln!(out, "   evaluation: {verdict}{score}");
                if let Some(comment) = evaluation.comment.as_deref().filter(|text| !text.is_empty()) {
                    let _ = writeln!(out, "   comment: {comment}");
                }
            }
            None if !answer.question_type.is_auto_gradable() => {
                let _ = writeln!(out, "   evaluation: pending");
            }
            None => {}
        }
    }

    let pending = results.pending_evaluations();
    if pending > 0 {
        let _ = writeln!(out, "{pending} answer(s) still awaiting manual evaluation");
    }
    out
}
