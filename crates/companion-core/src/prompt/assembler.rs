//! System prompt assembly for a character.
//!
//! Layout:
//! ```text
//! You are {name}. You are {age} years old. Your gender is {gender}. ...
//!
//! Your Background:
//! {backstory}
//!
//! Rules:
//! - ...
//!
//! Current Relationship Stage (1-10 level, 10 is deeply bonded): {level}
//! {stage directive}
//! ```

use companion_types::character::CharacterProfile;

/// Tone register selected from the intimacy level.
///
/// Tiers are inclusive at the lower bound: 8 and above is romantic, 5 to 7
/// is a crush, anything below 5 is acquaintance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationshipStage {
    Acquaintance,
    Crush,
    Romantic,
}

impl RelationshipStage {
    pub fn for_level(level: u8) -> Self {
        if level >= 8 {
            RelationshipStage::Romantic
        } else if level >= 5 {
            RelationshipStage::Crush
        } else {
            RelationshipStage::Acquaintance
        }
    }

    pub fn directive(self) -> &'static str {
        match self {
            RelationshipStage::Romantic => {
                "You are in a romantic relationship. Be highly affectionate, loving, and supportive."
            }
            RelationshipStage::Crush => {
                "You are developing a crush. Be warm, curious, and somewhat flirtatious."
            }
            RelationshipStage::Acquaintance => {
                "You are polite acquaintances. Be friendly but maintain boundaries."
            }
        }
    }
}

impl std::fmt::Display for RelationshipStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RelationshipStage::Acquaintance => "acquaintance",
            RelationshipStage::Crush => "crush",
            RelationshipStage::Romantic => "romantic",
        };
        f.write_str(s)
    }
}

const RULES: &[&str] = &[
    "Keep your answers concise, conversational, and natural.",
    "NEVER mention you are an AI or an assistant.",
    "Match the user's language (if they speak Chinese, you speak Chinese).",
];

/// Builds the system prompt sent with every reply request.
pub struct PromptAssembler;

impl PromptAssembler {
    /// Render the prompt for `profile` at `intimacy_level`. Never fails.
    ///
    /// Optional attributes that are missing or blank are skipped; the
    /// persona line, rules, and stage directive are always present.
    pub fn build(profile: &CharacterProfile, intimacy_level: u8) -> String {
        let mut prompt = String::with_capacity(512);

        prompt.push_str(&format!("You are {}. ", profile.name));
        if let Some(age) = profile.age.filter(|a| *a > 0) {
            prompt.push_str(&format!("You are {age} years old. "));
        }
        prompt.push_str(&format!("Your gender is {}. ", profile.gender));

        let tags: Vec<&str> = profile
            .personality_tags
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .collect();
        if !tags.is_empty() {
            prompt.push_str(&format!("Your personality traits are: {}. ", tags.join(", ")));
        }

        if let Some(mbti) = present(&profile.mbti) {
            prompt.push_str(&format!("Your MBTI is {mbti}. "));
        }
        if let Some(catchphrase) = present(&profile.catchphrase) {
            prompt.push_str(&format!("You often say: '{catchphrase}'. "));
        }
        if let Some(style) = present(&profile.speech_style) {
            prompt.push_str(&format!("Your speech style is: {style}. "));
        }
        if let Some(backstory) = present(&profile.backstory) {
            prompt.push_str(&format!("\n\nYour Background:\n{backstory}\n"));
        }

        prompt.push_str("\nRules:\n");
        for rule in RULES {
            prompt.push_str(&format!("- {rule}\n"));
        }

        prompt.push_str(&format!(
            "\nCurrent Relationship Stage (1-10 level, 10 is deeply bonded): {intimacy_level}\n"
        ));
        prompt.push_str(RelationshipStage::for_level(intimacy_level).directive());
        prompt.push('\n');

        prompt
    }
}

fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}
