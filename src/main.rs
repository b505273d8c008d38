//! Campus Chat - terminal client
//!
//! Line-oriented front end over a [`ChatHandle`]. Plain lines are questions;
//! lines starting with `/` are commands (`/help` lists them).

use campus_chat::attachment::Attachment;
use campus_chat::auth::{AuthClient, AuthError, SignupForm};
use campus_chat::config::ClientConfig;
use campus_chat::db::Database;
use campus_chat::inference::{plain_text, HttpInferenceClient, LoggingClient};
use campus_chat::message::{Feedback, Message};
use campus_chat::persistence::Persistence;
use campus_chat::runtime::{ChatHandle, ChatRuntime, ChatUpdate};
use campus_chat::session::{Scope, Session};
use campus_chat::state_machine::Event;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const HELP: &str = "\
Type a question and press enter. Commands:
  /history            show the conversation
  /retry N            resend question N (drops everything after it)
  /edit N             load question N into the input; the next line replaces it
  /cancel             leave edit mode
  /like, /dislike     rate the latest reply (again to undo)
  /attach PATH        attach a PDF or DOCX to the next question
  /suggest            list suggestions
  /pick N             ask suggestion N
  /scope MAIN|FAI/IS|BICIOT
  /login ID PASSWORD
  /signup             register (prompts for details)
  /verify CODE        confirm the emailed code
  /logout
  /clear              delete the conversation
  /quit";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Ask(String),
    History,
    Retry(usize),
    Edit(usize),
    Cancel,
    Rate(Feedback),
    Attach(String),
    Suggest,
    Pick(usize),
    Scope(Scope),
    Login { identifier: String, password: String },
    Signup,
    Verify(String),
    Logout,
    Clear,
    Help,
    Quit,
}

fn parse_command(line: &str) -> Result<Command, String> {
    let line = line.trim();
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Command::Ask(line.to_string()));
    };

    let (name, arg) = rest.split_once(' ').unwrap_or((rest, ""));
    let arg = arg.trim();
    let number = |arg: &str| {
        arg.parse::<usize>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| format!("/{name} needs a number from the list"))
    };

    match name {
        "history" => Ok(Command::History),
        "retry" => number(arg).map(Command::Retry),
        "edit" => number(arg).map(Command::Edit),
        "cancel" => Ok(Command::Cancel),
        "like" => Ok(Command::Rate(Feedback::Like)),
        "dislike" => Ok(Command::Rate(Feedback::Dislike)),
        "attach" if !arg.is_empty() => Ok(Command::Attach(arg.to_string())),
        "attach" => Err("/attach needs a file path".to_string()),
        "suggest" => Ok(Command::Suggest),
        "pick" => number(arg).map(Command::Pick),
        "scope" => arg.parse().map(Command::Scope).map_err(|e| e.to_string()),
        "login" => match arg.split_once(' ') {
            Some((identifier, password)) => Ok(Command::Login {
                identifier: identifier.to_string(),
                password: password.trim().to_string(),
            }),
            None => Err("/login needs an id and a password".to_string()),
        },
        "signup" => Ok(Command::Signup),
        "verify" if !arg.is_empty() => Ok(Command::Verify(arg.to_string())),
        "verify" => Err("/verify needs the emailed code".to_string()),
        "logout" => Ok(Command::Logout),
        "clear" => Ok(Command::Clear),
        "help" => Ok(Command::Help),
        "quit" | "exit" => Ok(Command::Quit),
        other => Err(format!("Unknown command /{other}, try /help")),
    }
}

/// Reply markup for a terminal: bold becomes ANSI bold
fn render(markup: &str) -> String {
    plain_text(&markup.replace("<b>", "\x1b[1m").replace("</b>", "\x1b[0m"))
}

fn print_message(number: Option<usize>, message: &Message) {
    let prefix = number.map(|n| format!("[{n}] ")).unwrap_or_default();
    if message.is_user {
        let attachment = message
            .attachment
            .as_ref()
            .map(|a| format!(" (+ {})", a.name))
            .unwrap_or_default();
        println!("{prefix}you> {}{attachment}", message.text);
    } else if message.is_error() {
        println!("{prefix}bot> \x1b[31m{}\x1b[0m", render(&message.text));
    } else {
        let rating = match message.feedback {
            Some(Feedback::Like) => " [liked]",
            Some(Feedback::Dislike) => " [disliked]",
            None => "",
        };
        println!("{prefix}bot> {}{rating}", render(&message.text));
    }
}

/// Print updates as they arrive
async fn print_updates(handle: ChatHandle) {
    let mut updates = handle.subscribe();
    loop {
        let update = match updates.recv().await {
            Ok(update) => update,
            Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Terminal fell behind on updates");
                continue;
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        };

        match update {
            ChatUpdate::MessageAppended { message } if !message.is_user => {
                print_message(None, &message);
            }
            ChatUpdate::LoadingChanged { loading: true } => println!("... thinking"),
            ChatUpdate::EditingChanged {
                message_id: Some(_),
            } => {
                let input = handle.snapshot().state.input;
                println!("editing: \"{input}\" (type the new text, or /cancel)");
            }
            ChatUpdate::TranscriptTrimmed { dropped } => {
                println!("({dropped} oldest messages removed to stay under the storage limit)");
            }
            ChatUpdate::TranscriptCleared => println!("(conversation cleared)"),
            ChatUpdate::SessionChanged { session } => match &session.user {
                Some(user) => println!("signed in as {} [{}]", user.name, session.scope),
                None => println!("guest [{}]", session.scope),
            },
            ChatUpdate::Rejected { reason } => println!("! {reason}"),
            _ => {}
        }
    }
}

async fn prompt(lines: &mut Lines<BufReader<Stdin>>, label: &str) -> std::io::Result<String> {
    println!("{label}:");
    Ok(lines.next_line().await?.unwrap_or_default().trim().to_string())
}

async fn read_signup(lines: &mut Lines<BufReader<Stdin>>) -> std::io::Result<SignupForm> {
    Ok(SignupForm {
        student_number: prompt(lines, "Student number").await?,
        password: prompt(lines, "Password").await?,
        first_name: prompt(lines, "First name").await?,
        last_name: prompt(lines, "Last name").await?,
        email: prompt(lines, "Email (blank for your student address)").await?,
        faculty: prompt(lines, "Faculty").await?,
        department: prompt(lines, "Department").await?,
        course: prompt(lines, "Qualification").await?,
        agreed: prompt(lines, "Agree to the terms of use and policies? (y/n)")
            .await?
            .eq_ignore_ascii_case("y"),
    })
}

fn show_auth_error(e: &AuthError) {
    let (title, message) = e.banner();
    println!("! {title}: {message}");
}

/// Renew a stored login; a refused token signs the user out.
async fn refresh_session(handle: &ChatHandle, auth: &AuthClient) {
    let session = handle.snapshot().session;
    let Some(user) = session.user.as_ref() else {
        return;
    };
    if user.access_token.is_none() {
        return;
    }

    match auth.refresh(user).await {
        Ok(user) => {
            let _ = handle
                .send(Event::SessionChanged {
                    session: Session {
                        user: Some(user),
                        scope: session.scope,
                    },
                })
                .await;
        }
        Err(AuthError::Rejected { message, .. }) => {
            tracing::info!(reason = %message, "Stored login expired");
            let _ = handle
                .send(Event::SessionChanged {
                    session: Session::guest(session.scope),
                })
                .await;
        }
        Err(e) => tracing::warn!(error = %e, "Could not refresh login"),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    let json_logs = std::env::var("CAMPUS_CHAT_LOG_FORMAT").is_ok_and(|v| v == "json");
    let (plain_layer, json_layer) = if json_logs {
        (
            None,
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_span_list(false)
                    .with_writer(std::io::stderr),
            ),
        )
    } else {
        (
            Some(tracing_subscriber::fmt::layer().with_writer(std::io::stderr)),
            None,
        )
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "campus_chat=info".into()),
        )
        .with(plain_layer)
        .with(json_layer)
        .init();

    // Configuration
    let config = ClientConfig::from_env()?;

    tracing::info!(path = %config.db_path.display(), "Opening database");
    let db = Database::open(&config.db_path)?;
    let persistence = Persistence::with_history_cap(db, config.history_cap);

    let http = HttpInferenceClient::new(config.base_url.clone(), config.request_timeout)?;
    let client = LoggingClient::new(Arc::new(http));
    let auth = AuthClient::new(config.auth_url.clone())?;

    let (runtime, handle) = ChatRuntime::new(persistence, client);
    let runtime_task = tokio::spawn(runtime.run());
    let printer_task = tokio::spawn(print_updates(handle.clone()));

    refresh_session(&handle, &auth).await;

    let snapshot = handle.snapshot();
    for message in &snapshot.messages {
        print_message(None, message);
    }
    println!("Campus Chat [{}] - /help for commands", snapshot.session.scope);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut attachment: Option<Attachment> = None;
    let mut pending_email: Option<String> = None;

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(e) => {
                println!("! {e}");
                continue;
            }
        };

        let snapshot = handle.snapshot();
        let questions: Vec<&Message> = snapshot.messages.iter().filter(|m| m.is_user).collect();

        match command {
            Command::Ask(text) => handle.ask(text, attachment.take()).await?,
            Command::History => {
                let mut number = 0;
                for message in &snapshot.messages {
                    if message.is_user {
                        number += 1;
                        print_message(Some(number), message);
                    } else {
                        print_message(None, message);
                    }
                }
            }
            Command::Retry(n) | Command::Edit(n) if n > questions.len() => {
                println!("! There is no question {n}");
            }
            Command::Retry(n) => {
                handle
                    .send(Event::Retry {
                        message_id: questions[n - 1].id.clone(),
                    })
                    .await?;
            }
            Command::Edit(n) => {
                handle
                    .send(Event::Edit {
                        message_id: questions[n - 1].id.clone(),
                    })
                    .await?;
            }
            Command::Cancel => handle.send(Event::CancelEdit).await?,
            Command::Rate(feedback) => {
                match snapshot.messages.iter().rev().find(|m| !m.is_user) {
                    Some(reply) => {
                        handle
                            .send(Event::SetFeedback {
                                message_id: reply.id.clone(),
                                feedback,
                            })
                            .await?;
                    }
                    None => println!("! Nothing to rate yet"),
                }
            }
            Command::Attach(path) => match Attachment::load(&path).await {
                Ok(loaded) => {
                    println!("attached {} ({} bytes)", loaded.name(), loaded.size());
                    attachment = Some(loaded);
                }
                Err(e) => println!("! {e}"),
            },
            Command::Suggest => {
                if snapshot.suggestions.is_empty() {
                    println!("(no suggestions left)");
                }
                for (i, suggestion) in snapshot.suggestions.iter().enumerate() {
                    println!("  {}. {}", i + 1, suggestion.label);
                }
            }
            Command::Pick(n) => match snapshot.suggestions.get(n - 1) {
                Some(suggestion) => {
                    handle
                        .send(Event::SuggestionPicked {
                            label: suggestion.label.clone(),
                        })
                        .await?;
                }
                None => println!("! There is no suggestion {n}"),
            },
            Command::Scope(scope) => {
                handle
                    .send(Event::SessionChanged {
                        session: Session {
                            scope,
                            ..snapshot.session
                        },
                    })
                    .await?;
            }
            Command::Login {
                identifier,
                password,
            } => match auth.login(&identifier, &password).await {
                Ok(user) => {
                    handle
                        .send(Event::SessionChanged {
                            session: Session {
                                user: Some(user),
                                scope: snapshot.session.scope,
                            },
                        })
                        .await?;
                }
                Err(e) => show_auth_error(&e),
            },
            Command::Signup => {
                let form = read_signup(&mut lines).await?;
                match auth.signup(&form).await {
                    Ok(_) => {
                        let email = form.email();
                        println!("A verification code was sent to {email}; enter it with /verify CODE");
                        pending_email = Some(email);
                    }
                    Err(e) => show_auth_error(&e),
                }
            }
            Command::Verify(code) => match &pending_email {
                Some(email) => match auth.verify(email, &code).await {
                    Ok(user) => {
                        pending_email = None;
                        handle
                            .send(Event::SessionChanged {
                                session: Session {
                                    user: Some(user),
                                    scope: snapshot.session.scope,
                                },
                            })
                            .await?;
                    }
                    Err(e) => show_auth_error(&e),
                },
                None => println!("! Sign up first with /signup"),
            },
            Command::Logout => {
                handle
                    .send(Event::SessionChanged {
                        session: Session::guest(snapshot.session.scope),
                    })
                    .await?;
            }
            Command::Clear => handle.send(Event::Clear).await?,
            Command::Help => println!("{HELP}"),
            Command::Quit => break,
        }
    }

    handle.shutdown();
    let _ = runtime_task.await;
    printer_task.abort();
    Ok(())
}
