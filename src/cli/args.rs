use anyhow::{anyhow, Context, Result};
use uuid::Uuid;

pub const USAGE: &str = "\
usage: exam-runner <command>

commands:
  login <email> [--remember]   sign in; the password is read from stdin
  login --token <token> [--remember]
                               sign in with an access token issued elsewhere
  logout                       forget stored credentials
  exams                        list exams you can take
  start <exam_id>              start (or continue) an exam attempt
  resume <attempt_id>          resume an open attempt
  unfinished                   list attempts that can be resumed
  completed                    list finished exams with scores
  results <attempt_id>         show auto-graded results of a submitted attempt
  evaluated <attempt_id>       show results including manual evaluations";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginMethod {
    Password { username: String },
    Token(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login { method: LoginMethod, remember: bool },
    Logout,
    Exams,
    Start { exam_id: Uuid },
    Resume { attempt_id: Uuid },
    Unfinished,
    Completed,
    Results { attempt_id: Uuid },
    Evaluated { attempt_id: Uuid },
    Help,
}

pub fn parse_args<I>(args: I) -> Result<Command>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let Some(command) = args.next() else {
        return Ok(Command::Help);
    };

    let parsed = match command.as_str() {
        "login" => {
            let mut method = None;
            let mut remember = false;
            while let Some(arg) = args.next() {
                match arg.as_str() {
                    "--remember" => remember = true,
                    "--token" if method.is_none() => {
                        let token = args.next().ok_or_else(|| anyhow!("--token missing <token>"))?;
                        method = Some(LoginMethod::Token(token));
                    }
                    _ if arg.starts_with("--") => return Err(anyhow!("Unknown argument: {arg}")),
                    _ if method.is_none() => method = Some(LoginMethod::Password { username: arg }),
                    _ => return Err(anyhow!("Unexpected argument: {arg}")),
                }
            }
            let method = method.ok_or_else(|| anyhow!("login missing <email> or --token <token>"))?;
            Command::Login { method, remember }
        }
        "logout" => Command::Logout,
        "exams" => Command::Exams,
        "start" => Command::Start { exam_id: id_arg(&mut args, "exam_id")? },
        "resume" => Command::Resume { attempt_id: id_arg(&mut args, "attempt_id")? },
        "unfinished" => Command::Unfinished,
        "completed" => Command::Completed,
        "results" => Command::Results { attempt_id: id_arg(&mut args, "attempt_id")? },
        "evaluated" => Command::Evaluated { attempt_id: id_arg(&mut args, "attempt_id")? },
        "help" | "--help" | "-h" => Command::Help,
        _ => return Err(anyhow!("Unknown command: {command}")),
    };

    if let Some(extra) = args.next() {
        return Err(anyhow!("Unexpected argument: {extra}"));
    }

    Ok(parsed)
}

fn id_arg(args: &mut impl Iterator<Item = String>, name: &str) -> Result<Uuid> {
    let raw = args.next().ok_or_else(|| anyhow!("missing <{name}>"))?;
    raw.parse().with_context(|| format!("<{name}> must be a UUID, got {raw}"))
}
