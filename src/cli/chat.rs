use std::io::Write;

use anyhow::{Result, anyhow};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use super::open_tutor;
use super::quiz::take_quiz;
use crate::ai::prompt::{QUIZ_REQUEST, SUGGESTIONS};
use crate::attachment::Attachment;
use crate::chat::{ChatMode, Message, Role, Tutor};
use crate::core::AppConfig;
use crate::markdown::clean_for_speech;
use crate::speech::speak;
use crate::stream::{Outcome, SessionUpdate};

const HELP: &str = r#"Commandes :
  /quiz                    Lancer un quiz
  /attach <fichier> [texte] Poser une question sur un PDF ou une image
  /speak [fichier.wav]     Enregistrer la dernière réponse en audio
  /new                     Nouvelle conversation
  /help                    Afficher cette aide"#;

/// Prints a reply to the terminal as it streams in.
#[derive(Default)]
pub struct ReplyPrinter {
    shown: String,
}

impl ReplyPrinter {
    pub fn update(&mut self, update: &SessionUpdate) {
        match update {
            // Nothing to show while the reply might be a quiz
            SessionUpdate::Loading => {}
            SessionUpdate::Preview { text } => {
                // Previews only ever extend what was shown
                print!("{}", &text[self.shown.len()..]);
                let _ = std::io::stdout().flush();
                self.shown = text.clone();
            }
            SessionUpdate::Done { outcome } => {
                match outcome {
                    Outcome::Prose { text } | Outcome::Failed { text } => {
                        match text.strip_prefix(self.shown.as_str()) {
                            Some(rest) => println!("{}", rest),
                            // The final text replaces the preview
                            None => println!("\n{}", text),
                        }
                    }
                    Outcome::Quiz { questions } => {
                        if !self.shown.is_empty() {
                            println!();
                        }
                        println!("Voici un quiz de {} questions.", questions.len());
                    }
                }
                self.shown.clear();
            }
        }
    }
}

fn print_welcome(session_messages: &[Message]) {
    for msg in session_messages {
        let speaker = match msg.role {
            Role::User => "Vous",
            Role::Model => "ADA",
        };
        println!("{} : {}\n", speaker, clean_for_speech(&msg.text));
    }
    println!("Suggestions : {}", SUGGESTIONS.join(" | "));
    println!("Tapez /help pour la liste des commandes.\n");
}

async fn send(
    tutor: &Tutor,
    rl: &mut DefaultEditor,
    config: &AppConfig,
    session_id: &str,
    text: &str,
    attachment: Option<Attachment>,
) -> Result<Option<Message>> {
    let mut printer = ReplyPrinter::default();
    let reply = tutor
        .send_message(session_id, text, attachment, |update| printer.update(update))
        .await?;

    if let Some(questions) = reply.as_ref().and_then(|r| r.quiz.clone()) {
        take_quiz(rl, questions, config).await?;
    }
    Ok(reply)
}

pub async fn run(config: &AppConfig, session: Option<String>) -> Result<()> {
    let mut rl = DefaultEditor::new()?;
    let tutor = open_tutor(config).await?;

    let mut session = match session {
        Some(id) => tutor
            .load_session(&id)
            .await?
            .ok_or(anyhow!("Chat session {} not found", id))?,
        None => tutor.create_session(ChatMode::Text).await?,
    };
    print_welcome(&session.messages);

    let mut last_reply: Option<Message> = session
        .messages
        .iter()
        .rev()
        .find(|m| m.role == Role::Model)
        .cloned();

    loop {
        let readline = rl.readline(">>> ");
        let line = match readline {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => break,
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let _ = rl.add_history_entry(line);

        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
        let reply = match command {
            "/help" => {
                println!("{}", HELP);
                continue;
            }
            "/new" => {
                session = tutor.create_session(ChatMode::Text).await?;
                print_welcome(&session.messages);
                continue;
            }
            "/quiz" => send(&tutor, &mut rl, config, &session.id, QUIZ_REQUEST, None).await?,
            "/attach" => {
                let (path, text) = rest.trim().split_once(' ').unwrap_or((rest.trim(), ""));
                let attachment = match Attachment::from_path(path).await {
                    Ok(attachment) => attachment,
                    Err(e) => {
                        // Not sent
                        println!("Pièce jointe refusée : {}", e);
                        continue;
                    }
                };
                send(&tutor, &mut rl, config, &session.id, text, Some(attachment)).await?
            }
            "/speak" => {
                let Some(reply) = &last_reply else {
                    println!("Aucune réponse à lire.");
                    continue;
                };
                let out = if rest.trim().is_empty() { "ada.wav" } else { rest.trim() };
                match speak(
                    &reply.text,
                    &config.gemini_api_hostname,
                    &config.gemini_api_key,
                    &config.tts_model,
                    &config.tts_voice,
                )
                .await
                {
                    Ok(wav) => {
                        tokio::fs::write(out, wav).await?;
                        println!("Audio enregistré dans {}", out);
                    }
                    Err(e) => println!("Lecture impossible : {}", e),
                }
                continue;
            }
            _ => send(&tutor, &mut rl, config, &session.id, line, None).await?,
        };

        if reply.is_some() {
            last_reply = reply;
        }
    }

    Ok(())
}
