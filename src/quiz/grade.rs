//! Taking a quiz: answering questions one at a time and scoring the
//! attempt. Choice questions are checked locally, case studies are
//! graded by the model against the reference answer.
use std::fmt;

use anyhow::{Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::fence::strip_fences;
use super::models::{CaseStudyQuestion, QuizRecord};
use crate::ai::prompt::{Prompt, templates};
use crate::gemini::{self, Content, Part, Role};

/// The model's assessment of a case study answer.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Verdict {
    pub correct: bool,
    #[serde(default)]
    pub feedback: String,
}

#[derive(Clone, Copy, Serialize, Debug, PartialEq)]
pub struct Score {
    pub correct: usize,
    pub total: usize,
}

impl Score {
    pub fn feedback(&self) -> &'static str {
        if self.correct == self.total {
            "Excellent ! Maîtrise parfaite."
        } else if self.correct * 2 > self.total {
            "Bon travail !"
        } else {
            "Continuez à réviser le glossaire."
        }
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} / {}", self.correct, self.total)
    }
}

/// One pass through a quiz. Each question is answered once, in order.
#[derive(Debug)]
pub struct QuizAttempt {
    questions: Vec<QuizRecord>,
    current: usize,
    // One entry per answered question
    results: Vec<bool>,
}

impl QuizAttempt {
    pub fn new(questions: Vec<QuizRecord>) -> Self {
        Self {
            questions,
            current: 0,
            results: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Zero based position of the question being asked.
    pub fn position(&self) -> usize {
        self.current
    }

    /// The question being asked or `None` once the attempt is over.
    pub fn current(&self) -> Option<&QuizRecord> {
        self.questions.get(self.current)
    }

    pub fn is_answered(&self) -> bool {
        self.results.len() > self.current
    }

    pub fn is_finished(&self) -> bool {
        self.current >= self.questions.len()
    }

    /// Answer the current multiple choice or true/false question with
    /// the index of an option. Returns whether it was correct.
    pub fn answer_choice(&mut self, index: usize) -> Result<bool> {
        if self.is_answered() {
            bail!("Question {} was already answered", self.current + 1);
        }
        let question = self.current().ok_or(anyhow!("Quiz is finished"))?;
        let Some(correct_index) = question.correct_index() else {
            bail!("Question {} is a case study", self.current + 1);
        };
        if index >= question.options().len() {
            bail!("Option {} does not exist", index + 1);
        }
        let correct = index == correct_index;
        self.results.push(correct);
        Ok(correct)
    }

    /// Record the verdict for the current case study.
    pub fn record_verdict(&mut self, verdict: &Verdict) -> Result<()> {
        if self.is_answered() {
            bail!("Question {} was already answered", self.current + 1);
        }
        match self.current() {
            Some(QuizRecord::CaseStudy(_)) => {
                self.results.push(verdict.correct);
                Ok(())
            }
            Some(_) => bail!("Question {} is not a case study", self.current + 1),
            None => bail!("Quiz is finished"),
        }
    }

    /// Move on to the next question. The current one must have been
    /// answered first.
    pub fn next(&mut self) -> Result<()> {
        if self.is_finished() {
            bail!("Quiz is finished");
        }
        if !self.is_answered() {
            bail!("Question {} has not been answered", self.current + 1);
        }
        self.current += 1;
        Ok(())
    }

    pub fn score(&self) -> Score {
        Score {
            correct: self.results.iter().filter(|r| **r).count(),
            total: self.questions.len(),
        }
    }
}

/// Ask the model whether `answer` reaches the same solution as the
/// reference answer of a case study.
pub async fn grade_case_study(
    question: &CaseStudyQuestion,
    answer: &str,
    api_hostname: &str,
    api_key: &str,
    model: &str,
) -> Result<Verdict> {
    let prompt = templates().render(
        &Prompt::CaseStudyGrading.to_string(),
        &json!({
            "question": question.prompt,
            "reference_answer": question.reference_answer,
            "explanation": question.explanation,
            "answer": answer,
        }),
    )?;
    let contents = vec![Content::new(Role::User, vec![Part::text(&prompt)])];
    let reply = gemini::generate(&contents, None, api_hostname, api_key, model).await?;

    let verdict = serde_json::from_str::<Verdict>(&strip_fences(&reply))
        .inspect_err(|e| tracing::error!("Failed to parse grading reply {}: {}", reply, e))?;
    tracing::debug!("Case study graded, correct: {}", verdict.correct);

    Ok(verdict)
}
