use std::io::Write;

use anyhow::{Result, anyhow};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use super::chat::ReplyPrinter;
use super::open_tutor;
use crate::chat::ChatMode;
use crate::core::AppConfig;
use crate::quiz::{QuizAttempt, QuizRecord, Score, Verdict, grade_case_study};

pub async fn run(config: &AppConfig) -> Result<()> {
    let mut rl = DefaultEditor::new()?;
    let tutor = open_tutor(config).await?;
    let session = tutor.create_session(ChatMode::Text).await?;

    println!("Préparation du quiz...");
    let mut printer = ReplyPrinter::default();
    let reply = tutor
        .start_quiz(&session.id, |update| printer.update(update))
        .await?
        .ok_or(anyhow!("No reply to the quiz request"))?;

    match reply.quiz {
        Some(questions) => {
            take_quiz(&mut rl, questions, config).await?;
        }
        // The reply was already printed as prose
        None => println!("ADA n'a pas proposé de quiz cette fois-ci."),
    }
    Ok(())
}

// `None` when the student stopped with Ctrl-C or Ctrl-D
fn read_line(rl: &mut DefaultEditor, prompt: &str) -> Result<Option<String>> {
    match rl.readline(prompt) {
        Ok(line) => Ok(Some(line.trim().to_string())),
        Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// Ask each question in turn and print the score at the end.
pub async fn take_quiz(
    rl: &mut DefaultEditor,
    questions: Vec<QuizRecord>,
    config: &AppConfig,
) -> Result<Option<Score>> {
    let mut attempt = QuizAttempt::new(questions);
    let total = attempt.len();

    while let Some(question) = attempt.current().cloned() {
        println!("\nQuestion {}/{}", attempt.position() + 1, total);
        println!("{}", question.prompt());

        match &question {
            QuizRecord::MultipleChoice(q) | QuizRecord::TrueFalse(q) => {
                for (idx, option) in q.options.iter().enumerate() {
                    println!("  {}. {}", idx + 1, option);
                }
                let correct = loop {
                    let Some(line) = read_line(rl, &format!("Votre réponse (1-{}) > ", q.options.len()))?
                    else {
                        return Ok(None);
                    };
                    match line.parse::<usize>() {
                        Ok(n) if n >= 1 && n <= q.options.len() => break attempt.answer_choice(n - 1)?,
                        _ => println!("Répondez par un numéro entre 1 et {}.", q.options.len()),
                    }
                };
                if correct {
                    println!("Correct !");
                } else {
                    println!("Incorrect. La bonne réponse était : {}", q.correct_option());
                }
            }
            QuizRecord::CaseStudy(q) => {
                let Some(answer) = read_line(rl, "Votre réponse > ")? else {
                    return Ok(None);
                };
                print!("Correction en cours...");
                std::io::stdout().flush()?;
                let verdict = grade_case_study(
                    q,
                    &answer,
                    &config.gemini_api_hostname,
                    &config.gemini_api_key,
                    &config.model,
                )
                .await
                .unwrap_or_else(|e| {
                    tracing::error!("Grading failed: {}", e);
                    Verdict {
                        correct: false,
                        feedback: "La correction automatique a échoué.".to_string(),
                    }
                });
                println!();
                println!("{}", if verdict.correct { "Correct !" } else { "Incorrect." });
                if !verdict.feedback.is_empty() {
                    println!("{}", verdict.feedback);
                }
                println!("Réponse attendue : {}", q.reference_answer);
                attempt.record_verdict(&verdict)?;
            }
        }
        println!("Explication : {}", question.explanation());
        attempt.next()?;
    }

    let score = attempt.score();
    println!("\nQuiz terminé ! Votre score : {}", score);
    println!("{}", score.feedback());
    Ok(Some(score))
}
