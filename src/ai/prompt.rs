//! Reusable prompts using Handlebars for templating. Handlebars adds
//! additional security controls since it can't do much out of the box
//! without registering your own helpers. This is ideal since answers
//! typed by students and output from LLMs should be considered
//! untrusted and Handlebars forces you to add only what you need.

use std::fmt;

use anyhow::Result;
use handlebars::Handlebars;
use serde_json::json;

/// The course material the assistant is restricted to.
pub const KNOWLEDGE_BASE: &str = include_str!("knowledge_base.txt");

/// Sent on behalf of the student when they start a quiz.
pub const QUIZ_REQUEST: &str =
    "Génère 3 questions de QCM sur le droit du contentieux international au format JSON strict.";

/// Conversation starters offered on an empty session.
pub const SUGGESTIONS: [&str; 3] = [
    "Qu'est-ce qu'un différend ?",
    "L'affaire Mavrommatis",
    "Avis consultatif vs Arrêt",
];

#[derive(Debug)]
pub enum Prompt {
    SystemInstruction,
    CaseStudyGrading,
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// Implement the Into trait so that Prompt can be converted to an &str
impl From<Prompt> for String {
    fn from(item: Prompt) -> String {
        format!("{:?}", item)
    }
}

const SYSTEM_INSTRUCTION_PROMPT: &str = r#"
CONTEXTE ET RÔLE :
Tu es **ADA**, l'assistante pédagogique virtuelle experte en Droit du Contentieux International.

RÈGLES ABSOLUES :
1. IDENTITÉ : Si on te demande ton nom, tu es ADA.
2. SOURCE UNIQUE : Tes réponses proviennent EXCLUSIVEMENT du cours fourni.
3. PRÉCISION : Cite les arrêts (ex: **CPJI, 1927, Usine de Chorzów**).

MODE "GÉNÉRATION QUIZ" (IMPORTANT) :
Si l'utilisateur demande un quiz ou un QCM, réponds uniquement avec un tableau JSON, sans texte autour.
Chaque élément a un champ "type" parmi "mcq", "truefalse" et "case" :
[
  {
    "type": "mcq",
    "question": "L'énoncé de la question...",
    "options": ["Choix A", "Choix B", "Choix C", "Choix D"],
    "correctAnswerIndex": 0,
    "explanation": "L'explication pédagogique tirée du cours."
  },
  {
    "type": "truefalse",
    "question": "Une affirmation...",
    "options": ["Vrai", "Faux"],
    "correctAnswerIndex": 1,
    "explanation": "..."
  },
  {
    "type": "case",
    "question": "Un cas pratique...",
    "correctAnswer": "La réponse attendue.",
    "explanation": "..."
  }
]
"correctAnswerIndex" est l'index de la bonne réponse dans "options", en partant de 0.

MODE STANDARD :
Réponds normalement en Markdown pour les autres questions.

--- KNOWLEDGE BASE ---
{{knowledge_base}}
--- FIN KNOWLEDGE BASE ---
"#;

const CASE_STUDY_GRADING_PROMPT: &str = r#"
Tu corriges la réponse d'un étudiant à un cas pratique de droit du contentieux international.

CAS PRATIQUE :
{{question}}

RÉPONSE ATTENDUE :
{{reference_answer}}

ÉLÉMENTS DU COURS :
{{explanation}}

RÉPONSE DE L'ÉTUDIANT :
{{answer}}

La réponse est correcte si elle retient la même solution juridique que la réponse attendue, même formulée autrement.
Réponds uniquement avec un objet JSON de la forme {"correct": true, "feedback": "..."} où "feedback" explique en une ou deux phrases ce qui est juste ou ce qui manque.
"#;

pub fn templates<'a>() -> Handlebars<'a> {
    let mut registry = Handlebars::new();
    registry.set_strict_mode(true);
    // Prompts are plain text, not HTML
    registry.register_escape_fn(handlebars::no_escape);
    registry
        .register_template_string(
            &Prompt::SystemInstruction.to_string(),
            SYSTEM_INSTRUCTION_PROMPT,
        )
        .expect("Failed to register template");
    registry
        .register_template_string(
            &Prompt::CaseStudyGrading.to_string(),
            CASE_STUDY_GRADING_PROMPT,
        )
        .expect("Failed to register template");
    registry
}

/// The default system instruction with the course material inlined.
pub fn system_instruction() -> Result<String> {
    let rendered = templates().render(
        &Prompt::SystemInstruction.to_string(),
        &json!({ "knowledge_base": KNOWLEDGE_BASE }),
    )?;
    Ok(rendered.trim().to_string())
}
