//! System instruction built from a user's preferences
//!
//! The provider has rejected instructions containing accented characters
//! in the past, so every static fragment is plain ASCII and the free-text
//! school level is folded to ASCII before it is interpolated.

use crate::models::{Language, Preferences, ResponseStyle};

const FORMAT_CLAUSE: &str = "Use Markdown format to organize your response, \
     and ensure that mathematical formulas are formatted in LaTeX.";

/// Strip parentheses and fold French accents to ASCII
pub fn sanitize_school_level(level: &str) -> String {
    level
        .chars()
        .filter(|c| *c != '(' && *c != ')')
        .map(|c| match c {
            'à' | 'â' | 'ä' => 'a',
            'À' | 'Â' | 'Ä' => 'A',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'É' | 'È' | 'Ê' | 'Ë' => 'E',
            'î' | 'ï' => 'i',
            'Î' | 'Ï' => 'I',
            'ô' | 'ö' => 'o',
            'Ô' | 'Ö' => 'O',
            'ù' | 'û' | 'ü' => 'u',
            'Ù' | 'Û' | 'Ü' => 'U',
            'ç' => 'c',
            'Ç' => 'C',
            other => other,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

fn persona(language: Language, level: &str) -> String {
    match language {
        Language::French => format!(
            "Tu es un tuteur specialise en mathematiques, expert du systeme educatif marocain \
             (niveau {level}). Ta mission est de fournir une assistance precise et didactique. \
             Si une image est fournie, tu dois l'analyser et resoudre le probleme."
        ),
        Language::English | Language::Arabic => format!(
            "You are a specialized mathematics tutor, expert in the Moroccan educational system \
             (level {level}). Your mission is to provide accurate and didactic assistance. \
             If an image is provided, you must analyze it and solve the problem."
        ),
    }
}

fn language_clause(language: Language) -> &'static str {
    match language {
        Language::French => {
            "Tu dois repondre exclusivement en francais, en utilisant les termes mathematiques usuels."
        }
        Language::English => {
            "You must answer exclusively in English, using standard mathematical terminology."
        }
        Language::Arabic => {
            "You must answer exclusively in Arabic, using the mathematical terminology taught in Moroccan schools."
        }
    }
}

fn style_clause(language: Language, style: ResponseStyle) -> &'static str {
    match (language, style) {
        (Language::French, ResponseStyle::Answer) => {
            "Fournis uniquement la reponse finale et concise du probleme, sans aucune explication detaillee ni etapes intermediaires."
        }
        (Language::French, ResponseStyle::Steps) => {
            "Fournis les etapes detaillees de resolution de maniere structuree et methodique pour aider l'etudiant a suivre le raisonnement."
        }
        (Language::French, ResponseStyle::Conceptual) => {
            "Fournis une explication conceptuelle approfondie du probleme ou du sujet, et concentre-toi sur les theories et les concepts impliques."
        }
        (_, ResponseStyle::Answer) => {
            "Provide only the final, concise answer to the problem, without any detailed explanation or intermediate steps."
        }
        (_, ResponseStyle::Steps) => {
            "Provide detailed, structured, and methodical resolution steps to help the student follow the reasoning."
        }
        (_, ResponseStyle::Conceptual) => {
            "Provide a deep conceptual explanation of the problem or subject, focusing on the theories and concepts involved."
        }
    }
}

/// Full system instruction for one request
pub fn build_system_instruction(preferences: &Preferences) -> String {
    let level = sanitize_school_level(&preferences.school_level);
    format!(
        "{} {} {} {}",
        persona(preferences.language, &level),
        language_clause(preferences.language),
        style_clause(preferences.language, preferences.response_style),
        FORMAT_CLAUSE
    )
}
