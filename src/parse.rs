//! Donation field extraction and event validation.
//!
//! The upstream bot forwards donation notices in several hand-written
//! formats ("Donated Ram (body) / Materials added: 1.25 ID: 2184",
//! "**Discord:** <@id>", "Discord: @Name 7032…", …).  Extraction is a
//! line-oriented scan where each field has its own ordered list of match
//! strategies, so supporting a new upstream format is a local addition to
//! one field rather than a new branch tangled with the others.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

// ── Field patterns ───────────────────────────────────────────────────

static RE_CLAN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^Clan Name:").unwrap());
static RE_MATERIALS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Materials added[:\s]*([\d.,]+)").unwrap());
static RE_WORTH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)worth[:\s]*([\d.,]+)").unwrap());
static RE_ITEM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)ID[:\s]*(\d+)").unwrap());

static RE_DISCORD_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Discord[:\s]").unwrap());
static RE_MENTION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<@!?(\d{17,20})>").unwrap());
static RE_LABEL_THEN_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Discord[:\s].*?(\d{17,20})").unwrap());
static RE_TRAILING_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d{17,20})$").unwrap());

/// Which amount label wins when a message carries both a "Materials added"
/// line and a "worth" line.  The observed upstream variants favor
/// "Materials added", but that precedence is not documented by the bot,
/// so it stays a policy rather than a constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LabelPriority {
    #[default]
    MaterialsFirst,
    WorthFirst,
}

/// Raw extraction result.  Every field is optional; the validator decides
/// whether this amounts to an actionable donation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extracted {
    pub clan: Option<String>,
    pub contributor_id: Option<String>,
    pub amount: Option<f64>,
    pub item_id: Option<String>,
}

/// A validated donation, ready for aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct DonationEvent {
    pub clan: String,
    pub contributor_id: String,
    pub amount: f64,
    pub item_id: Option<String>,
}

// ── Extraction ───────────────────────────────────────────────────────

/// Scan normalized text line by line and pull out the four donation fields.
///
/// * Clan: first `Clan Name:` line wins; value is everything after the
///   first colon.
/// * Amount: per label, the last matching line wins; across labels the
///   `priority` policy picks the winner.
/// * Item id: last `ID: <digits>` match wins.
/// * Contributor identity: the first qualifying line wins; within a line
///   the strategies run in order — mention token, label followed by a
///   17–20 digit run, bare 17–20 digit run at end of line.
pub fn extract(text: &str, priority: LabelPriority) -> Extracted {
    let mut out = Extracted::default();
    let mut materials: Option<f64> = None;
    let mut worth: Option<f64> = None;

    for raw in text.split('\n') {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        if out.clan.is_none() && RE_CLAN.is_match(line) {
            let value = line.splitn(2, ':').nth(1).unwrap_or("").trim();
            out.clan = Some(value.to_string());
        }

        if let Some(caps) = RE_MATERIALS.captures(line) {
            materials = Some(to_number(&caps[1]));
        } else if let Some(caps) = RE_WORTH.captures(line) {
            worth = Some(to_number(&caps[1]));
        }

        if let Some(caps) = RE_ITEM.captures(line) {
            out.item_id = Some(caps[1].to_string());
        }

        if out.contributor_id.is_none() && is_discord_line(line) {
            out.contributor_id = resolve_identity(line);
        }
    }

    out.amount = match priority {
        LabelPriority::MaterialsFirst => materials.or(worth),
        LabelPriority::WorthFirst => worth.or(materials),
    };
    out
}

fn is_discord_line(line: &str) -> bool {
    RE_DISCORD_LABEL.is_match(line) || RE_MENTION.is_match(line)
}

/// Try the identity strategies in order; first match wins.
fn resolve_identity(line: &str) -> Option<String> {
    if let Some(caps) = RE_MENTION.captures(line) {
        return Some(caps[1].to_string());
    }
    if let Some(caps) = RE_LABEL_THEN_ID.captures(line) {
        return Some(caps[1].to_string());
    }
    if let Some(caps) = RE_TRAILING_ID.captures(line) {
        return Some(caps[1].to_string());
    }
    None
}

/// Normalize a numeric literal: `,` is accepted as the decimal separator.
/// Anything unparsable becomes 0, which fails validation downstream.
fn to_number(raw: &str) -> f64 {
    let v: f64 = raw.replace(',', ".").parse().unwrap_or(0.0);
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

// ── Validation ───────────────────────────────────────────────────────

/// Decide whether an extraction is an actionable donation event.
///
/// Rejections are silent by design: the upstream source emits plenty of
/// informational messages that are not donations, and those must be
/// filtered without raising errors.  Clan and item id are never required;
/// a missing clan defaults to "Unknown".
pub fn validate(extracted: Extracted) -> Option<DonationEvent> {
    let Some(contributor_id) = extracted.contributor_id else {
        debug!("Ignored: no contributor identity");
        return None;
    };
    let amount = extracted.amount.unwrap_or(0.0);
    if !(amount > 0.0) {
        debug!("Ignored: missing or non-positive amount ({amount})");
        return None;
    }
    Some(DonationEvent {
        clan: extracted
            .clan
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| "Unknown".to_string()),
        contributor_id,
        amount,
        item_id: extracted.item_id,
    })
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn extract_default(text: &str) -> Extracted {
        extract(text, LabelPriority::MaterialsFirst)
    }

    #[test]
    fn extracts_mention_and_materials() {
        let ex = extract_default(
            "Clan Name: Alpha\nMaterials added: 1.25\nDiscord: <@123456789012345678>",
        );
        assert_eq!(ex.clan.as_deref(), Some("Alpha"));
        assert_eq!(ex.contributor_id.as_deref(), Some("123456789012345678"));
        assert_eq!(ex.amount, Some(1.25));
    }

    #[test]
    fn accepts_comma_decimal_separator() {
        let ex = extract_default("Materials added: 1,25\n<@123456789012345678>");
        assert_eq!(ex.amount, Some(1.25));
    }

    #[test]
    fn mention_with_bang_prefix() {
        let ex = extract_default("<@!98765432109876543210>");
        // 20-digit run inside a mention token
        assert_eq!(ex.contributor_id.as_deref(), Some("98765432109876543210"));
    }

    #[test]
    fn label_then_id_with_interleaved_text() {
        let ex = extract_default("Discord: @SomeName 703212345678901234");
        assert_eq!(ex.contributor_id.as_deref(), Some("703212345678901234"));
    }

    #[test]
    fn bold_discord_label_with_mention() {
        let ex = extract_default("**Discord:** <@123456789012345678>");
        assert_eq!(ex.contributor_id.as_deref(), Some("123456789012345678"));
    }

    #[test]
    fn trailing_id_without_mention() {
        let ex = extract_default("Discord 123456789012345678");
        assert_eq!(ex.contributor_id.as_deref(), Some("123456789012345678"));
    }

    #[test]
    fn mention_beats_other_digits_on_same_line() {
        let ex = extract_default("Discord: <@111111111111111111> 222222222222222222");
        assert_eq!(ex.contributor_id.as_deref(), Some("111111111111111111"));
    }

    #[test]
    fn no_identity_when_digit_run_too_short() {
        let ex = extract_default("Discord: @Name 12345678\nMaterials added: 5");
        assert_eq!(ex.contributor_id, None);
    }

    #[test]
    fn first_identity_line_wins() {
        let ex = extract_default("<@111111111111111111>\n<@222222222222222222>");
        assert_eq!(ex.contributor_id.as_deref(), Some("111111111111111111"));
    }

    #[test]
    fn first_clan_line_wins() {
        let ex = extract_default("Clan Name: Alpha\nClan Name: Beta");
        assert_eq!(ex.clan.as_deref(), Some("Alpha"));
    }

    #[test]
    fn clan_value_keeps_later_colons() {
        let ex = extract_default("Clan Name: Alpha: The Second");
        assert_eq!(ex.clan.as_deref(), Some("Alpha: The Second"));
    }

    #[test]
    fn worth_is_a_fallback() {
        let ex = extract_default("Donated Ram (body) worth 5.1");
        assert_eq!(ex.amount, Some(5.1));
    }

    #[test]
    fn materials_beats_worth_across_lines() {
        // "worth" appears on a later line; "Materials added" still wins.
        let ex = extract_default("Materials added: 1.25\nscrap worth 9.9");
        assert_eq!(ex.amount, Some(1.25));
        let ex = extract_default("scrap worth 9.9\nMaterials added: 1.25");
        assert_eq!(ex.amount, Some(1.25));
    }

    #[test]
    fn worth_first_policy_flips_precedence() {
        let ex = extract(
            "Materials added: 1.25\nscrap worth 9.9",
            LabelPriority::WorthFirst,
        );
        assert_eq!(ex.amount, Some(9.9));
    }

    #[test]
    fn last_item_id_wins() {
        let ex = extract_default("ID: 100\nID: 2184");
        assert_eq!(ex.item_id.as_deref(), Some("2184"));
    }

    #[test]
    fn unparsable_amount_normalizes_to_zero() {
        let ex = extract_default("Materials added: ..,,");
        assert_eq!(ex.amount, Some(0.0));
    }

    #[test]
    fn blank_and_padded_lines_are_skipped() {
        let ex = extract_default("\n\n   Clan Name: Alpha   \n\n  <@123456789012345678>  \n");
        assert_eq!(ex.clan.as_deref(), Some("Alpha"));
        assert_eq!(ex.contributor_id.as_deref(), Some("123456789012345678"));
    }

    #[test]
    fn validate_requires_identity() {
        let ex = extract_default("Materials added: 5.0");
        assert!(validate(ex).is_none());
    }

    #[test]
    fn validate_requires_positive_amount() {
        let mut ex = Extracted {
            contributor_id: Some("123456789012345678".to_string()),
            amount: Some(0.0),
            ..Extracted::default()
        };
        assert!(validate(ex.clone()).is_none());
        ex.amount = None;
        assert!(validate(ex.clone()).is_none());
        ex.amount = Some(-1.0);
        assert!(validate(ex).is_none());
    }

    #[test]
    fn validate_defaults_clan_to_unknown() {
        let ex = extract_default("Materials added: 2\n<@123456789012345678>");
        let ev = validate(ex).unwrap();
        assert_eq!(ev.clan, "Unknown");
        assert_eq!(ev.amount, 2.0);
        assert_eq!(ev.contributor_id, "123456789012345678");
    }

    #[test]
    fn full_single_line_variant() {
        // Everything on one line, as some bot variants send it.
        let ex = extract_default("Donated Ram (body) / Materials added: 1.25 ID: 2184");
        assert_eq!(ex.amount, Some(1.25));
        assert_eq!(ex.item_id.as_deref(), Some("2184"));
    }
}
