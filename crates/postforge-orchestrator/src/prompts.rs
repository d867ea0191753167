//! Prompt templates for the three agents.

use serde_json::json;

use crate::models::{ContentRequest, ImageRequest, Platform, ResearchRequest};

pub(crate) const RESEARCH_SYSTEM: &str = "You are a helpful research assistant that provides \
accurate, factual information in JSON format.";

pub(crate) const CONTENT_SYSTEM: &str =
    "You are a social media content creator that generates engaging posts.";

pub(crate) fn research_prompt(request: &ResearchRequest) -> String {
    format!(
        r#"You are a research assistant. Provide {max} key facts about "{topic}" in JSON format.
Cover these angles: {queries}.
Each fact should have:
- fact: The fact text
- source: A URL or reference
- relevance_score: A score from 0.0 to 1.0
- category: An optional one-word category

Respond with a JSON object of the form:
{{"facts": [{{"fact": "Example fact text", "source": "https://example.com", "relevance_score": 0.95}}]}}"#,
        max = request.max_facts(),
        topic = request.topic(),
        queries = request.search_queries().join("; "),
    )
}

pub(crate) fn content_prompt(request: &ContentRequest) -> String {
    let platform = request.platform();
    let profile = platform.profile();
    let limit = request.effective_max_length();
    let facts: Vec<_> = request
        .facts()
        .iter()
        .map(|fact| json!({ "fact": fact.text(), "source": fact.source() }))
        .collect();
    let facts = serde_json::to_string_pretty(&facts).unwrap_or_default();

    let mut prompt = match platform {
        Platform::Twitter => format!(
            "Generate a {tone} Twitter post using the following facts:\n\n{facts}\n\n\
             CRITICAL CHARACTER LIMIT:\n\
             1. Your post MUST be LESS THAN {limit} characters.\n\
             2. Be extremely concise while maintaining the key information.\n\
             3. Count the characters carefully before finalizing.\n\
             4. This is a hard limit - longer content will be rejected.",
            tone = request.tone(),
        ),
        Platform::Blog => format!(
            "Generate a {tone} blog post using the following facts:\n\n{facts}\n\n\
             CRITICAL CHARACTER LIMIT:\n\
             1. Your blog post MUST be LESS THAN {limit} characters.\n\
             2. Be concise while maintaining key information and professional tone.\n\
             3. Structure with a brief introduction, key points, and conclusion.\n\
             4. This is a hard limit - longer content will be rejected.",
            tone = request.tone(),
        ),
        _ => format!(
            "Generate a {tone} {platform} post using the following facts:\n\n{facts}\n\n\
             The post should read {voice}.\n\n\
             CRITICAL CHARACTER LIMIT:\n\
             1. Your content MUST be LESS THAN {limit} characters.\n\
             2. This is a hard limit - longer content will be rejected.",
            tone = request.tone(),
            voice = profile.voice,
        ),
    };

    if let Some(call_to_action) = request.call_to_action() {
        prompt.push_str(&format!("\n\nInclude this call to action: {call_to_action}"));
    }

    if request.include_hashtags() && profile.default_hashtags > 0 {
        let count = profile.default_hashtags;
        if platform == Platform::Twitter {
            prompt.push_str(&format!(
                "\n\nInclude {count} short, relevant hashtags. These count toward your {limit} character limit."
            ));
        } else {
            prompt.push_str(&format!("\n\nInclude {count} relevant hashtags at the end."));
        }
    }

    prompt
}

pub(crate) fn image_prompt(request: &ImageRequest) -> String {
    let guidance = match request.platform() {
        Platform::Instagram => {
            "Make sure the image is visually striking and aesthetic with good composition."
        }
        Platform::LinkedIn => "Create a professional-looking image suitable for a business audience.",
        Platform::Twitter => "Create an eye-catching image that stands out in a fast-scrolling feed.",
        Platform::Facebook => "Create an engaging image that encourages social interaction.",
        Platform::Blog => {
            "Create a detailed image relevant to the blog topic that enhances the written content."
        }
    };

    format!(
        "Create a high-quality {style} image for a {platform} post about \"{topic}\". \
         The image should visually represent the following content: {content} {guidance}",
        style = request.style(),
        platform = request.platform(),
        topic = request.topic(),
        content = request.content(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Fact, Tone};

    fn content_request(platform: Platform) -> ContentRequest {
        let facts = vec![Fact::new("Solar capacity grew 24% in 2023", 0.9).unwrap()];
        ContentRequest::new(facts, platform, Tone::Informative).unwrap()
    }

    #[test]
    fn test_research_prompt_mentions_bound_and_topic() {
        let request = ResearchRequest::new("renewable energy", 3).unwrap();
        let prompt = research_prompt(&request);
        assert!(prompt.contains("Provide 3 key facts about \"renewable energy\""));
        assert!(prompt.contains("renewable energy recent news and updates"));
    }

    #[test]
    fn test_content_prompt_per_platform() {
        let twitter = content_prompt(&content_request(Platform::Twitter));
        assert!(twitter.contains("informative Twitter post"));
        assert!(twitter.contains("LESS THAN 280 characters"));
        assert!(twitter.contains("Include 2 short, relevant hashtags"));

        let blog = content_prompt(&content_request(Platform::Blog));
        assert!(blog.contains("Structure with a brief introduction"));
        assert!(!blog.contains("hashtags"));

        let linkedin = content_prompt(
            &content_request(Platform::LinkedIn).with_call_to_action("Read the report"),
        );
        assert!(linkedin.contains("professional and insightful"));
        assert!(linkedin.contains("Include this call to action: Read the report"));
        assert!(linkedin.contains("Include 3 relevant hashtags at the end."));
    }

    #[test]
    fn test_image_prompt() {
        let request = ImageRequest::new("Solar is booming.", Platform::Twitter, "solar").unwrap();
        let prompt = image_prompt(&request);
        assert!(prompt.starts_with(
            "Create a high-quality photorealistic image for a twitter post about \"solar\"."
        ));
        assert!(prompt.contains("fast-scrolling feed"));
    }
}
