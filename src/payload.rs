//! Inbound webhook payload shapes and text normalization.
//!
//! The upstream bot forwards messages in several shapes: a bare `text`
//! field, a Discord-style `content` field, or a rich embed with title,
//! description, and name/value fields.  [`InboundPayload::flatten`]
//! collapses whichever shape arrives into one newline-delimited block that
//! the extractor in [`crate::parse`] can scan line by line.

use serde::Deserialize;

/// Everything we accept on `POST /syn-county`.  Unknown fields are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundPayload {
    pub text: Option<String>,
    pub content: Option<String>,
    pub embeds: Option<Vec<Embed>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Embed {
    pub title: Option<String>,
    pub description: Option<String>,
    pub fields: Option<Vec<EmbedField>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmbedField {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: String,
}

impl InboundPayload {
    /// Produce a single newline-delimited text block from whichever source
    /// the payload carries.  Resolution order is a priority, not a merge:
    /// `text`, then `content`, then the first embed reconstructed as title,
    /// description, and one `"name: value"` line per field.  A field that
    /// is present but empty counts as absent and falls through.  Returns an
    /// empty string when no recognizable text content exists.
    pub fn flatten(&self) -> String {
        if let Some(text) = self.text.as_deref().filter(|t| !t.is_empty()) {
            return text.to_string();
        }
        if let Some(content) = self.content.as_deref().filter(|c| !c.is_empty()) {
            return content.to_string();
        }
        if let Some(embed) = self.embeds.as_deref().and_then(|e| e.first()) {
            let mut combined = String::new();
            if let Some(title) = &embed.title {
                combined.push_str(title.trim());
                combined.push('\n');
            }
            if let Some(description) = &embed.description {
                combined.push_str(description.trim());
                combined.push('\n');
            }
            if let Some(fields) = &embed.fields {
                for f in fields {
                    combined.push_str(&format!("{}: {}\n", f.name.trim(), f.value.trim()));
                }
            }
            return combined.trim().to_string();
        }
        String::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_json(raw: &str) -> InboundPayload {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn flatten_prefers_text_field() {
        let p = from_json(r#"{"text": "hello", "content": "ignored"}"#);
        assert_eq!(p.flatten(), "hello");
    }

    #[test]
    fn flatten_falls_back_to_content() {
        let p = from_json(r#"{"content": "from content"}"#);
        assert_eq!(p.flatten(), "from content");
    }

    #[test]
    fn flatten_reconstructs_first_embed() {
        let p = from_json(
            r#"{"embeds": [{
                "title": "Donation",
                "description": "Donated Ram (body)",
                "fields": [
                    {"name": "Clan Name", "value": "Alpha"},
                    {"name": "Materials added", "value": "1.25"}
                ]
            }]}"#,
        );
        assert_eq!(
            p.flatten(),
            "Donation\nDonated Ram (body)\nClan Name: Alpha\nMaterials added: 1.25"
        );
    }

    #[test]
    fn flatten_skips_empty_text_field() {
        let p = from_json(r#"{"text": "", "content": "Materials added: 1.25"}"#);
        assert_eq!(p.flatten(), "Materials added: 1.25");
    }

    #[test]
    fn flatten_skips_empty_text_and_content() {
        let p = from_json(r#"{"text": "", "content": "", "embeds": [{"title": "Donation"}]}"#);
        assert_eq!(p.flatten(), "Donation");
    }

    #[test]
    fn flatten_uses_only_one_source() {
        // text wins even when an embed is present
        let p = from_json(r#"{"text": "only this", "embeds": [{"title": "not this"}]}"#);
        assert_eq!(p.flatten(), "only this");
    }

    #[test]
    fn flatten_empty_payload() {
        let p = from_json("{}");
        assert_eq!(p.flatten(), "");
        let p = from_json(r#"{"embeds": []}"#);
        assert_eq!(p.flatten(), "");
    }

    #[test]
    fn flatten_ignores_later_embeds() {
        let p = from_json(r#"{"embeds": [{"title": "first"}, {"title": "second"}]}"#);
        assert_eq!(p.flatten(), "first");
    }
}
