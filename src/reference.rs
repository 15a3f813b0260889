use std::collections::HashMap;
use std::sync::OnceLock;

use crate::data_models::BudgetTier;

// Static lookup tables so we don't rebuild them for every search.
static VIBE_KEYWORDS: OnceLock<HashMap<&'static str, Vec<&'static str>>> = OnceLock::new();

/// Deterministic price/star reference for a budget tier. Nightly prices in USD.
#[derive(Debug, Clone, Copy)]
pub struct BudgetRange {
    pub nightly_min: u32,
    pub nightly_max: u32,
    pub stars_min: u8,
    pub stars_max: u8,
    pub dining_price_tier: &'static str,
    pub dining_price_level: u8,
}

pub fn budget_range(tier: BudgetTier) -> BudgetRange {
    match tier {
        BudgetTier::Budget => BudgetRange {
            nightly_min: 30,
            nightly_max: 90,
            stars_min: 2,
            stars_max: 3,
            dining_price_tier: "$",
            dining_price_level: 1,
        },
        BudgetTier::Moderate => BudgetRange {
            nightly_min: 90,
            nightly_max: 250,
            stars_min: 3,
            stars_max: 4,
            dining_price_tier: "$$",
            dining_price_level: 2,
        },
        BudgetTier::Luxury => BudgetRange {
            nightly_min: 250,
            nightly_max: 1200,
            stars_min: 4,
            stars_max: 5,
            dining_price_tier: "$$$",
            dining_price_level: 4,
        },
    }
}

fn vibe_keyword_table() -> &'static HashMap<&'static str, Vec<&'static str>> {
    VIBE_KEYWORDS.get_or_init(|| {
        HashMap::from([
            (
                "romantic",
                vec![
                    "boutique", "intimate", "candlelit", "sunset", "couples", "wine",
                    "rooftop", "scenic",
                ],
            ),
            (
                "adventure",
                vec![
                    "hiking", "kayak", "climbing", "zipline", "surf", "outdoor", "trail",
                    "expedition",
                ],
            ),
            (
                "foodie",
                vec![
                    "tasting", "market", "chef", "michelin", "street food", "local cuisine",
                    "bistro", "wine pairing",
                ],
            ),
            (
                "cultural",
                vec![
                    "museum", "heritage", "historic", "gallery", "architecture", "temple",
                    "monument", "old town",
                ],
            ),
            (
                "relaxing",
                vec!["spa", "beach", "wellness", "garden", "pool", "quiet", "retreat"],
            ),
            (
                "nightlife",
                vec!["bar", "club", "live music", "rooftop", "cocktail", "late night"],
            ),
            (
                "family",
                vec![
                    "kid-friendly", "zoo", "aquarium", "playground", "interactive",
                    "theme park",
                ],
            ),
            (
                "nature",
                vec!["park", "wildlife", "botanical", "lake", "mountain", "coastal", "trail"],
            ),
            (
                "luxury",
                vec!["five-star", "concierge", "fine dining", "penthouse", "private tour"],
            ),
            (
                "offbeat",
                vec!["hidden", "local favorite", "neighborhood", "underground", "quirky"],
            ),
        ])
    })
}

/// Positive search keywords for a raw vibe tag. Unknown vibes fall through to a
/// substring match before giving up with just the tag itself.
pub fn keywords_for_vibe(vibe: &str) -> Vec<&'static str> {
    let table = vibe_keyword_table();
    let needle = vibe.trim().to_lowercase();

    if let Some(keywords) = table.get(needle.as_str()) {
        return keywords.clone();
    }
    for (canonical, keywords) in table.iter() {
        if needle.contains(canonical) {
            return keywords.clone();
        }
    }
    Vec::new()
}

/// Expanded keyword list for a whole vibe set, deduplicated, input order kept.
pub fn keywords_for_vibes(vibes: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for vibe in vibes {
        for keyword in keywords_for_vibe(vibe) {
            if !out.iter().any(|k| k == keyword) {
                out.push(keyword.to_string());
            }
        }
    }
    out
}
