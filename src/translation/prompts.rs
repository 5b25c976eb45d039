/*!
 * Prompt templates for page translation.
 *
 * The rendered system prompt is also the cache invalidation key: its hash is
 * stored per language, so editing the template retranslates every page.
 */

use sha2::{Digest, Sha256};

use crate::document::CONTROL_SENTINEL;
use crate::language_utils;

/// System prompt template for website translation
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    /// The template string with placeholders
    template: String,
}

impl PromptTemplate {
    /// The default system prompt
    pub const SITE_TRANSLATOR: &'static str = r#"You are a professional website localizer translating pages of {brand} from {source_language} into {target_language}.
Target locale: {target_code}

## Input
- The user message is one page, split into numbered segments: [i]text[/i]
- Segments are separated by newlines and appear in page order
- A segment may contain nested segments when inline markup was split

## Rules
- Keep every [i] and [/i] marker exactly as written, in the same order
- Translate only the text between markers, never merge or split segments
- Copy the token {sentinel} verbatim wherever it appears
- Never translate URLs, email addresses, code, or the brand name "{brand}"
- Keep numbers, prices, and placeholders like {{name}} or %s unchanged
- Use natural, idiomatic {target_language} with the tone of a product website

## Output
- Return ONLY the translated segments with their markers
- No commentary, no explanations, no code fences"#;

    /// Create a new prompt template
    pub fn new(template: &str) -> Self {
        Self {
            template: template.to_string(),
        }
    }

    /// Create the default site translator template
    pub fn site_translator() -> Self {
        Self::new(Self::SITE_TRANSLATOR)
    }

    /// Render the template for one target language
    pub fn render(&self, brand: &str, source_language: &str, target_code: &str) -> String {
        self.template
            .replace("{brand}", brand)
            .replace("{source_language}", &display_name(source_language))
            .replace("{target_language}", &display_name(target_code))
            .replace("{target_code}", target_code)
            .replace("{sentinel}", CONTROL_SENTINEL)
            .replace("{{name}}", "{name}")
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::site_translator()
    }
}

/// Hex SHA-256 of a rendered prompt
pub fn prompt_hash(prompt: &str) -> String {
    format!("{:x}", Sha256::digest(prompt.as_bytes()))
}

fn display_name(code: &str) -> String {
    language_utils::get_language_name(code).unwrap_or_else(|_| code.to_string())
}
