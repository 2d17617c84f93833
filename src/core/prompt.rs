/// Prompt builder — assembles the natural-language brief sent to the text
/// generation model. Pure string construction; cannot fail.
use crate::schema::request::StoryRequest;

/// Which prompt variant to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptMode {
    /// Fresh story from the structured request.
    Generate,
    /// Rework an existing story, preserving plot and characters.
    Rewrite,
}

/// Output-format constraints shared by both prompt variants: a single raw
/// HTML fragment, no code fences.
const FORMAT_RULES: &str = "\
Format the final output as a single block of clean HTML.
1. Start with a creative and relevant title inside an <h1> tag.
2. The main story text should follow, carefully formatted into paragraphs using <p> tags.
3. You may use <h2> tags for chapter or section headings if it enhances the story's structure.
4. VERY IMPORTANT: Do not include any markdown like ```html or ``` at the beginning or end of your response. Only return the raw HTML content.";

/// Build the full prompt for one generation run.
///
/// `prior_text` is the plain-text extraction of the current document and is
/// only consulted in `Rewrite` mode. Optional request fields that are absent
/// are omitted from the brief entirely rather than rendered empty.
pub fn build_prompt(request: &StoryRequest, mode: PromptMode, prior_text: Option<&str>) -> String {
    match mode {
        PromptMode::Generate => generate_prompt(request),
        PromptMode::Rewrite => rewrite_prompt(request, prior_text.unwrap_or_default()),
    }
}

fn generate_prompt(request: &StoryRequest) -> String {
    let mut prompt = format!(
        "You are an expert storyteller, celebrated for your creative and engaging narratives. \
         Write a complete and compelling story in {}.\n",
        request.language.name()
    );
    prompt.push_str(&format!("- Genre: {}\n", request.genre));
    prompt.push_str(&format!("- Theme: {}\n", request.theme));
    prompt.push_str(&format!("- Setting: {}\n", request.setting));
    prompt.push_str(&format!(
        "- Main Characters: {}. Ensure they have distinct personalities and motivations.\n",
        request.characters.joined()
    ));
    prompt.push_str(&format!("- Target Audience: {}\n", request.audience));
    prompt.push_str(&format!(
        "- Desired Writing Style: {}. This is crucial. The tone and prose must reflect this style.\n",
        request.writing_style
    ));
    if let Some(limit) = request.word_limit {
        prompt.push_str(&format!(
            "- The story must be approximately {limit} words long.\n"
        ));
    }
    if let Some(details) = request
        .additional_details
        .as_deref()
        .filter(|d| !d.trim().is_empty())
    {
        prompt.push_str(&format!(
            "- Additional Details to incorporate: {details}\n"
        ));
    }
    prompt.push_str(
        "\nPlease structure the story with a clear beginning, a rising action, a climax, \
         a falling action, and a satisfying resolution.\n\
         Give it emotional depth and use vivid imagery.\n\n",
    );
    prompt.push_str(FORMAT_RULES);
    prompt
}

fn rewrite_prompt(request: &StoryRequest, prior_text: &str) -> String {
    format!(
        "You are a professional editor with a talent for enhancing narratives. \
         Rewrite the following story to improve its style, flow, and emotional impact, \
         while keeping the core plot and characters the same. \
         The rewritten story must be in {}.\n\
         Focus on improving imagery, pacing, and dialogue.\n\n\
         Original Story:\n\"{prior_text}\"\n\n{FORMAT_RULES}",
        request.language.name()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::language::Language;
    use crate::schema::request::CharacterRoster;

    fn request() -> StoryRequest {
        let mut characters = CharacterRoster::new();
        characters.push("Mina").unwrap();
        characters.push("Tariq").unwrap();
        StoryRequest {
            theme: "courage".into(),
            setting: "a drowned city".into(),
            genre: "fantasy".into(),
            language: Language::new("English"),
            audience: "young adults".into(),
            writing_style: "lyrical".into(),
            word_limit: None,
            additional_details: None,
            characters,
        }
    }

    #[test]
    fn optional_clauses_are_omitted_when_absent() {
        let prompt = build_prompt(&request(), PromptMode::Generate, None);
        assert!(!prompt.contains("approximately"));
        assert!(!prompt.contains("Additional Details"));
    }

    #[test]
    fn optional_clauses_appear_when_present() {
        let mut req = request();
        req.word_limit = Some(800);
        req.additional_details = Some("a storm at the climax".into());
        let prompt = build_prompt(&req, PromptMode::Generate, None);
        assert!(prompt.contains("approximately 800 words"));
        assert!(prompt.contains("a storm at the climax"));
    }

    #[test]
    fn rewrite_embeds_prior_text() {
        let prompt = build_prompt(&request(), PromptMode::Rewrite, Some("Once upon a tide."));
        assert!(prompt.contains("Once upon a tide."));
        assert!(prompt.contains("keeping the core plot and characters the same"));
        assert!(prompt.contains("in English"));
    }
}
