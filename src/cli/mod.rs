mod args;
mod input;
mod render;

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use time::OffsetDateTime;
use tokio::sync::{mpsc, watch};
use validator::Validate;

use crate::auth::{AuthSession, SessionStore};
use crate::client::{ApiError, ExamApi, HttpExamApi};
use crate::core::config::Settings;
use crate::core::shutdown::stop_signal;
use crate::core::time::{format_countdown, SystemClock};
use crate::schemas::exam::Exam;
use crate::services::attempt_state::AttemptState;
use crate::services::exam_session::{
    ExamSession, SessionCommand, SessionDeps, SessionError, SessionOutcome, SessionSnapshot,
};
use crate::services::finalizer::SubmissionFinalizer;

pub use args::{parse_args, Command, LoginMethod, USAGE};
pub use input::{parse_line, InputLine};

/// Remaining-time marks at which a warning is printed.
const WARN_AT_SECONDS: [i64; 2] = [300, 60];

pub async fn execute(settings: &Settings, command: Command) -> Result<()> {
    let store = SessionStore::new(&settings.session().file, settings.session().idle_timeout());

    match command {
        Command::Help => println!("{USAGE}"),
        Command::Login { method, remember } => {
            let session = sign_in(settings, method, remember).await?;
            store.save(&session).context("Failed to store session")?;
            if let Some(user) = &session.user {
                println!("Signed in as {} ({})", user.email, user.role);
                if !user.is_student() {
                    println!("Note: exam commands need a student account.");
                }
            }
            println!("Credentials saved to {}", store.path().display());
        }
        Command::Exams => {
            let api = connect(settings, &store)?;
            let exams = checked(&store, api.list_available_exams().await)
                .context("Failed to list exams")?;
            print!("{}", render::available(&exams));
        }
        Command::Logout => {
            store.clear().context("Failed to remove stored session")?;
            println!("Signed out");
        }
        Command::Start { exam_id } => {
            let api = connect(settings, &store)?;
            let deps = SessionDeps::from_settings(api, Arc::new(SystemClock), settings.exam());
            let opened = ExamSession::start(deps, exam_id).await;
            attend(&store, opened).await?;
        }
        Command::Resume { attempt_id } => {
            let api = connect(settings, &store)?;
            let deps = SessionDeps::from_settings(api, Arc::new(SystemClock), settings.exam());
            let opened = ExamSession::resume(deps, attempt_id).await;
            attend(&store, opened).await?;
        }
        Command::Unfinished => {
            let api = connect(settings, &store)?;
            let attempts = checked(&store, api.list_unfinished_attempts().await)
                .context("Failed to list unfinished attempts")?;
            print!("{}", render::unfinished(&attempts));
        }
        Command::Completed => {
            let api = connect(settings, &store)?;
            let exams = checked(&store, api.list_completed_exams().await)
                .context("Failed to list completed exams")?;
            print!("{}", render::completed(&exams));
        }
        Command::Results { attempt_id } => {
            let api = connect(settings, &store)?;
            let finalizer =
                SubmissionFinalizer::new(api, settings.exam().result_retry_policy());
            let view = checked(&store, finalizer.fetch_results(attempt_id).await)
                .context("Failed to load exam results")?;
            print!("{}", render::results(&view));
        }
        Command::Evaluated { attempt_id } => {
            let api = connect(settings, &store)?;
            let results = checked(&store, api.fetch_evaluated_results(attempt_id).await)
                .context("Failed to load evaluated results")?;
            print!("{}", render::evaluated(&results));
        }
    }

    Ok(())
}

async fn sign_in(settings: &Settings, method: LoginMethod, remember: bool) -> Result<AuthSession> {
    let api = HttpExamApi::anonymous(&settings.api().base_url, settings.api().timeout())?;
    let now = OffsetDateTime::now_utc();

    let signed_in = match method {
        LoginMethod::Password { username } => {
            let password = read_password(&username).await?;
            api.sign_in(&username, &password, remember, now).await
        }
        LoginMethod::Token(token) => {
            AuthSession::new(token.as_str(), remember, now).validate().context("Invalid token")?;
            api.adopt_token(token, remember, now).await
        }
    };

    signed_in.map_err(|err| anyhow!(err.user_message("Login failed")))
}

/// Prompts on stderr and reads one line from stdin, so the password can also be piped in.
async fn read_password(username: &str) -> Result<String> {
    eprint!("Password for {username}: ");
    let line = tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        std::io::stdin().read_line(&mut line).map(|_| line)
    })
    .await
    .context("Password prompt failed")?
    .context("Failed to read password")?;

    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        return Err(anyhow!("Password must not be empty"));
    }
    Ok(password)
}

fn connect(settings: &Settings, store: &SessionStore) -> Result<Arc<dyn ExamApi>> {
    let session = store
        .load(OffsetDateTime::now_utc())
        .context("Failed to read stored session")?
        .ok_or_else(|| anyhow!("Not signed in; run `exam-runner login <email>` first"))?;

    Ok(Arc::new(HttpExamApi::from_settings(settings, session)?))
}

fn checked<T>(store: &SessionStore, result: Result<T, ApiError>) -> Result<T, ApiError> {
    if let Err(err) = &result {
        forget_rejected_token(store, err);
    }
    result
}

/// A rejected token means the stored session is useless; drop it so the next command asks
/// for a fresh login.
fn forget_rejected_token(store: &SessionStore, err: &ApiError) {
    if !err.is_unauthorized() {
        return;
    }
    tracing::warn!(error = %err, "Server rejected the stored token; signing out");
    if let Err(clear_err) = store.clear() {
        tracing::error!(error = %clear_err, "Failed to remove stored session");
    }
}

async fn attend(
    store: &SessionStore,
    opened: Result<ExamSession, SessionError>,
) -> Result<()> {
    let session = match opened {
        Ok(session) => session,
        Err(SessionError::Api(err)) => {
            forget_rejected_token(store, &err);
            return Err(anyhow!(err.user_message("Failed to open exam attempt")));
        }
        Err(err) => return Err(err).context("Failed to open exam attempt"),
    };

    let attempt_id = session.attempt_id();
    let exam = session.exam().clone();
    if session.state().is_in_progress() {
        print!("{}", render::exam_overview(&exam, &session.answers()));
        println!("Type `help` for commands.");
    } else {
        println!("This attempt was already submitted; loading results.");
    }

    let updates = session.subscribe();
    let (tx, rx) = mpsc::channel(32);
    let mut driver = tokio::spawn(session.run(rx));
    let reader = tokio::spawn(read_input(exam, updates.clone(), tx));
    let reporter = tokio::spawn(report_progress(updates));

    let finished = tokio::select! {
        joined = &mut driver => Some(joined),
        _ = stop_signal() => None,
    };
    let joined = match finished {
        Some(joined) => joined,
        None => {
            // Closing the command channel detaches an open attempt; a submission already
            // underway still runs to completion.
            reader.abort();
            driver.await
        }
    };
    let outcome = joined.context("Exam session task failed")?;
    reader.abort();
    reporter.abort();

    match outcome {
        SessionOutcome::Completed(view) => {
            print!("{}", render::results(&view));
            Ok(())
        }
        SessionOutcome::Detached => {
            println!("Attempt {attempt_id} is still open. Continue with: exam-runner resume {attempt_id}");
            Ok(())
        }
        SessionOutcome::Failed { message, state } => Err(anyhow!(
            "{message} (state: {}). Retry with: exam-runner resume {attempt_id}",
            state.label()
        )),
    }
}

async fn read_input(
    exam: Exam,
    updates: watch::Receiver<SessionSnapshot>,
    commands: mpsc::Sender<SessionCommand>,
) {
    let mut lines = stdin_lines();

    while let Some(line) = lines.recv().await {
        let command = match parse_line(&exam, &line) {
            Ok(Some(InputLine::Answer { question_id, data })) => {
                SessionCommand::Answer { question_id, data }
            }
            Ok(Some(InputLine::Submit)) => SessionCommand::Submit,
            Ok(Some(InputLine::Status)) => {
                println!("{}", render::status(&updates.borrow()));
                continue;
            }
            Ok(Some(InputLine::Help)) => {
                println!("{}", input::INPUT_HELP);
                continue;
            }
            Ok(None) => continue,
            Err(err) => {
                println!("{err:#}");
                continue;
            }
        };

        if commands.send(command).await.is_err() {
            return;
        }
    }
}

/// Stdin is read on a plain thread so a pending read never holds up runtime shutdown.
fn stdin_lines() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            match line {
                Ok(line) => {
                    if tx.blocking_send(line).is_err() {
                        return;
                    }
                }
                Err(err) => {
                    tracing::error!(error = %err, "Failed to read stdin");
                    return;
                }
            }
        }
    });
    rx
}

async fn report_progress(mut updates: watch::Receiver<SessionSnapshot>) {
    let mut last = updates.borrow_and_update().clone();

    while updates.changed().await.is_ok() {
        let current = updates.borrow_and_update().clone();

        if current.state != last.state {
            match &current.state {
                AttemptState::Submitting { trigger } => {
                    println!("Submitting ({})...", trigger.as_str());
                }
                AttemptState::ResultsPending => println!("Submitted; waiting for results..."),
                AttemptState::Error { message, .. } => {
                    println!("Error: {message}. Type `submit` to retry.");
                }
                _ => {}
            }
        }

        if current.state.is_in_progress() {
            for mark in WARN_AT_SECONDS {
                if last.remaining_seconds > mark && current.remaining_seconds <= mark {
                    println!("{} remaining", format_countdown(current.remaining_seconds));
                }
            }
        }

        last = current;
    }
}
