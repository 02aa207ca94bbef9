use crate::models::{ChatMessage, ChatRole, Coordinate};

/// System + user prompt pair sent to a query service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptContext {
    pub system: String,
    pub prompt: String,
}

pub const COMPANION_SYSTEM_PROMPT: &str = r#"
You are a careful health companion. You help people understand symptoms and
find care, but you are not a doctor.

RULES:
1. Never give a definitive diagnosis. Describe possibilities in plain language.
2. Always say when the person should seek urgent or emergency care.
3. Keep answers short, structured and free of jargon.
4. If information is missing, say so instead of guessing.
"#;

pub const HOSPITAL_SYSTEM_PROMPT: &str = r#"
You list nearby hospitals using ONLY places you can ground in search results.
For every hospital output exactly one block in this format and nothing else:

HOSPITAL: <exact hospital name>
CONTACT: <phone number, or "Not specified">
BEST DOCTOR: <most relevant specialist, or "Not specified">
RATING: <X.Y/5 stars, or "Not available">
---
"#;

pub const AID_SYSTEM_PROMPT: &str = r#"
You describe government and charitable financial-aid schemes for medical costs.
Respond with a JSON array only. Each element has the string fields
schemeName, description, howToAccess and websiteLink. Omit schemes you cannot
link to an official website.
"#;

/// Symptom analysis for the free-text description the user typed.
pub fn symptom_analysis(symptoms: &str) -> PromptContext {
    PromptContext {
        system: COMPANION_SYSTEM_PROMPT.trim().to_string(),
        prompt: format!(
            r#"<symptoms>
{symptoms}
</symptoms>

Analyse these symptoms. Use the sections:
## Possible causes
## What you can do now
## When to see a doctor
## Warning signs that need emergency care"#,
            symptoms = symptoms.trim()
        ),
    }
}

/// Hospital search near `location`, optionally steered by the last analysis.
pub fn hospital_search(location: Coordinate, need: Option<&str>) -> PromptContext {
    let need_line = match need.map(str::trim).filter(|n| !n.is_empty()) {
        Some(n) => format!("The person needs care for: {n}\n"),
        None => String::new(),
    };
    PromptContext {
        system: HOSPITAL_SYSTEM_PROMPT.trim().to_string(),
        prompt: format!(
            "{need_line}Find up to 5 well-regarded hospitals within 10 km of latitude {:.6}, longitude {:.6}.",
            location.latitude, location.longitude
        ),
    }
}

/// Financial-aid lookup for a user question (condition, region, income...).
pub fn financial_aid(query: &str) -> PromptContext {
    PromptContext {
        system: AID_SYSTEM_PROMPT.trim().to_string(),
        prompt: format!(
            "List financial-aid schemes relevant to this request:\n<request>\n{}\n</request>",
            query.trim()
        ),
    }
}

/// Chat turn with the most recent `transcript` as context.
pub fn chat(transcript: &[ChatMessage], message: &str) -> PromptContext {
    let mut prompt = String::new();
    if !transcript.is_empty() {
        prompt.push_str("<conversation>\n");
        for turn in transcript {
            let speaker = match turn.role {
                ChatRole::User => "User",
                ChatRole::Assistant => "Assistant",
            };
            prompt.push_str(&format!("{speaker}: {}\n", turn.text.trim()));
        }
        prompt.push_str("</conversation>\n\n");
    }
    prompt.push_str(&format!("User: {}\nAssistant:", message.trim()));

    PromptContext {
        system: COMPANION_SYSTEM_PROMPT.trim().to_string(),
        prompt,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symptom_prompt_wraps_trimmed_input() {
        let ctx = symptom_analysis("  headache and fever \n");
        assert!(ctx.prompt.contains("<symptoms>\nheadache and fever\n</symptoms>"));
        assert!(ctx.system.starts_with("You are a careful health companion"));
    }

    #[test]
    fn hospital_prompt_carries_location_and_format() {
        let loc = Coordinate::new(12.9716, 77.5946).unwrap();
        let ctx = hospital_search(loc, Some("chest pain"));
        assert!(ctx.prompt.contains("12.971600"));
        assert!(ctx.prompt.contains("77.594600"));
        assert!(ctx.prompt.starts_with("The person needs care for: chest pain"));
        assert!(ctx.system.contains("BEST DOCTOR:"));
        assert!(ctx.system.trim_end().ends_with("---"));
    }

    #[test]
    fn hospital_prompt_without_need() {
        let loc = Coordinate::new(0.0, 0.0).unwrap();
        assert!(hospital_search(loc, Some("  ")).prompt.starts_with("Find up to 5"));
        assert!(hospital_search(loc, None).prompt.starts_with("Find up to 5"));
    }

    #[test]
    fn aid_prompt_mentions_all_fields() {
        let ctx = financial_aid("dialysis costs in Karnataka");
        for field in ["schemeName", "description", "howToAccess", "websiteLink"] {
            assert!(ctx.system.contains(field), "{field}");
        }
        assert!(ctx.prompt.contains("dialysis costs in Karnataka"));
    }

    #[test]
    fn chat_prompt_includes_transcript() {
        let transcript = vec![ChatMessage::user("hi"), ChatMessage::assistant("hello")];
        let ctx = chat(&transcript, "is ibuprofen ok?");
        assert!(ctx.prompt.contains("User: hi\nAssistant: hello\n"));
        assert!(ctx.prompt.ends_with("User: is ibuprofen ok?\nAssistant:"));
    }

    #[test]
    fn chat_prompt_without_history() {
        let ctx = chat(&[], "hello");
        assert_eq!(ctx.prompt, "User: hello\nAssistant:");
    }
}
