use crate::reference::keywords_for_vibe;

/// Which provider a result came from; the scorer's base and bonus rules differ
/// per category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreCategory {
    Lodging,
    Activity,
    Dining,
}

// (vibe, category, trigger words, bonus). A trigger hit adds the bonus once.
const BONUS_RULES: &[(&str, ScoreCategory, &[&str], i64)] = &[
    ("romantic", ScoreCategory::Lodging, &["boutique", "intimate"], 20),
    ("foodie", ScoreCategory::Dining, &["tasting", "chef"], 20),
    ("adventure", ScoreCategory::Activity, &["summit", "canyon", "rafting"], 15),
];

pub fn clamp_score(score: i64) -> i64 {
    score.clamp(0, 100)
}

/// Deterministic vibe score for one result, used when re-ranking independently
/// of the generative call. Returns the clamped score and the subset of `vibes`
/// the item text matched.
///
/// Base 50 for lodging/dining, 0 for activities. Per distinct vibe: +15 when
/// the vibe word itself appears in the text, else +10 when any of its expanded
/// keywords does. Category bonuses on top. Result clamped into [0, 100].
pub fn score_item(category: ScoreCategory, text: &str, vibes: &[String]) -> (i64, Vec<String>) {
    let haystack = text.to_lowercase();
    let mut score: i64 = match category {
        ScoreCategory::Lodging | ScoreCategory::Dining => 50,
        ScoreCategory::Activity => 0,
    };
    let mut matched: Vec<String> = Vec::new();

    for vibe in vibes {
        let needle = vibe.trim().to_lowercase();
        if needle.is_empty() {
            continue;
        }

        let direct_hit = haystack.contains(&needle);
        let keyword_hit = keywords_for_vibe(&needle)
            .iter()
            .any(|k| haystack.contains(k));

        if direct_hit {
            score += 15;
        } else if keyword_hit {
            score += 10;
        }

        if direct_hit || keyword_hit {
            if !matched.iter().any(|m| m == vibe) {
                matched.push(vibe.clone());
            }

            for (bonus_vibe, bonus_category, triggers, bonus) in BONUS_RULES {
                if *bonus_category == category
                    && needle == *bonus_vibe
                    && triggers.iter().any(|t| haystack.contains(t))
                {
                    score += bonus;
                }
            }
        }
    }

    (clamp_score(score), matched)
}
