//! Skills Boost public profile parsing.
//!
//! Every field is extracted independently: a missing element leaves that one
//! field unknown and never fails the page as a whole.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::debug;

static CREATION_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("p.ql-body-large.l-mbl").expect("valid creation selector"));
static BADGE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.profile-badge").expect("valid badge selector"));
static BADGE_NAME_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("span.ql-title-medium").expect("valid badge name selector"));
static BADGE_DATE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("span.ql-body-medium").expect("valid badge date selector"));
static LEAGUE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.profile-league").expect("valid league selector"));
static LEAGUE_NAME_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("h2.ql-headline-medium").expect("valid league name selector"));
static POINTS_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("strong").expect("valid points selector"));
static IDENTITY_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("h1.ql-display-small").expect("valid identity selector"));

static MEMBER_SINCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Member since (\d{4})").expect("valid member-since pattern"));
static FIRST_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)").expect("valid number pattern"));

/// A badge as shown on the profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Badge {
    pub name: String,
    /// Earned text with the leading "Earned" removed, e.g. "Oct 8, 2025 EDT"
    pub earned_raw: Option<String>,
    pub earned_on: Option<NaiveDate>,
}

impl Badge {
    /// `YYYY-MM-DD` when the date parsed, otherwise the raw text
    pub fn earned_display(&self) -> Option<String> {
        match (&self.earned_on, &self.earned_raw) {
            (Some(date), _) => Some(date.format("%Y-%m-%d").to_string()),
            (None, Some(raw)) => Some(raw.clone()),
            (None, None) => None,
        }
    }
}

/// Everything read from one profile page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedProfile {
    pub creation_text: Option<String>,
    pub creation_year: Option<i32>,
    pub badges: Vec<Badge>,
    pub league: Option<String>,
    pub points: Option<u32>,
    /// Display name shown at the top of the profile
    pub identity: Option<String>,
}

impl ParsedProfile {
    pub fn badge_count(&self) -> u32 {
        self.badges.len() as u32
    }
}

fn element_text(element: &ElementRef) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse a profile page. Never fails; absent signals stay `None`.
pub fn parse_profile(html: &str) -> ParsedProfile {
    let document = Html::parse_document(html);

    let (creation_text, creation_year) = parse_creation(&document);
    let badges: Vec<Badge> = document
        .select(&BADGE_SELECTOR)
        .map(|el| parse_badge(&el))
        .collect();
    let (league, points) = parse_league(&document);
    let identity = document
        .select(&IDENTITY_SELECTOR)
        .next()
        .map(|el| element_text(&el))
        .filter(|s| !s.is_empty());

    debug!(
        creation_year = ?creation_year,
        badges = badges.len(),
        league = ?league,
        points = ?points,
        "Parsed profile page"
    );

    ParsedProfile {
        creation_text,
        creation_year,
        badges,
        league,
        points,
        identity,
    }
}

fn parse_creation(document: &Html) -> (Option<String>, Option<i32>) {
    if let Some(el) = document.select(&CREATION_SELECTOR).next() {
        let text = element_text(&el);
        let year = extract_member_since(&text);
        return (Some(text), year);
    }
    // Layout changed: fall back to scanning the whole page text
    let text = document.root_element().text().collect::<Vec<_>>().join(" ");
    match MEMBER_SINCE.find(&text) {
        Some(m) => (Some(m.as_str().to_string()), extract_member_since(m.as_str())),
        None => (None, None),
    }
}

fn extract_member_since(text: &str) -> Option<i32> {
    MEMBER_SINCE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn parse_badge(element: &ElementRef) -> Badge {
    let name = element
        .select(&BADGE_NAME_SELECTOR)
        .next()
        .map(|el| element_text(&el))
        .unwrap_or_default();
    let earned_raw = element
        .select(&BADGE_DATE_SELECTOR)
        .next()
        .map(|el| strip_earned_prefix(&element_text(&el)))
        .filter(|s| !s.is_empty());
    let earned_on = earned_raw.as_deref().and_then(parse_earned_date);
    Badge {
        name,
        earned_raw,
        earned_on,
    }
}

fn strip_earned_prefix(text: &str) -> String {
    text.trim()
        .strip_prefix("Earned")
        .unwrap_or(text)
        .trim()
        .to_string()
}

/// Parse earned-date text such as `Oct  8, 2025 EDT` or `Earned Jan 15, 2025 PST`.
/// Trailing timezone abbreviations are ignored.
pub fn parse_earned_date(text: &str) -> Option<NaiveDate> {
    let cleaned = strip_earned_prefix(text);
    let mut tokens: Vec<&str> = cleaned.split_whitespace().collect();
    while let Some(last) = tokens.last() {
        let is_zone = last.len() >= 2 && last.chars().all(|c| c.is_ascii_uppercase());
        if is_zone {
            tokens.pop();
        } else {
            break;
        }
    }
    NaiveDate::parse_from_str(&tokens.join(" "), "%b %d, %Y").ok()
}

fn parse_league(document: &Html) -> (Option<String>, Option<u32>) {
    let Some(league_el) = document.select(&LEAGUE_SELECTOR).next() else {
        return (None, None);
    };
    let league = league_el
        .select(&LEAGUE_NAME_SELECTOR)
        .next()
        .map(|el| element_text(&el))
        .filter(|s| !s.is_empty());
    let points = league_el.select(&POINTS_SELECTOR).next().and_then(|el| {
        let text = element_text(&el).replace(',', "");
        FIRST_NUMBER
            .captures(&text)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
    });
    (league, points)
}
