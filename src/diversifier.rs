//! Spreads upstream queries over many distinct search terms.
//!
//! The free tiers of the news providers rate-limit per query string and only ever return a small
//! page of results, so the general feed and the broad categories rotate between more specific
//! search terms picked uniformly at random.

use std::collections::HashMap;
use std::sync::Mutex;

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::config::DiversifierConfig;

pub const DEFAULT_TOPICS: &[&str] = &[
    "world news",
    "breaking news",
    "technology",
    "artificial intelligence",
    "science",
    "space exploration",
    "climate change",
    "environment",
    "health",
    "medicine",
    "business",
    "economy",
    "stock market",
    "startups",
    "cryptocurrency",
    "politics",
    "elections",
    "international relations",
    "sports",
    "football",
    "cricket",
    "tennis",
    "entertainment",
    "movies",
    "music",
    "gaming",
    "education",
    "travel",
    "food",
    "fashion",
    "energy",
    "automotive",
    "cybersecurity",
    "smartphones",
];

pub const DEFAULT_CATEGORIES: &[(&str, &[&str])] = &[
    (
        "sports",
        &[
            "football",
            "soccer",
            "cricket",
            "basketball",
            "tennis",
            "formula 1",
            "olympics",
            "athletics",
            "baseball",
            "golf",
        ],
    ),
    (
        "politics",
        &[
            "government policy",
            "elections",
            "parliament",
            "congress",
            "white house",
            "prime minister",
            "legislation",
            "supreme court",
        ],
    ),
    (
        "geopolitics",
        &[
            "international relations",
            "diplomacy",
            "united nations",
            "nato",
            "foreign policy",
            "sanctions",
            "trade war",
            "middle east conflict",
            "ukraine war",
            "china taiwan",
        ],
    ),
    (
        "entertainment",
        &[
            "movies",
            "box office",
            "celebrity",
            "music",
            "television series",
            "streaming",
            "hollywood",
            "bollywood",
        ],
    ),
    (
        "technology",
        &[
            "artificial intelligence",
            "smartphones",
            "cybersecurity",
            "semiconductors",
            "software",
            "gadgets",
            "startups",
            "big tech",
        ],
    ),
    (
        "business",
        &[
            "economy",
            "stock market",
            "earnings",
            "mergers and acquisitions",
            "inflation",
            "interest rates",
            "startups",
            "banking",
        ],
    ),
    (
        "health",
        &[
            "public health",
            "medicine",
            "mental health",
            "nutrition",
            "vaccines",
            "healthcare",
            "fitness",
            "medical research",
        ],
    ),
    (
        "science",
        &[
            "space exploration",
            "physics",
            "biology",
            "climate research",
            "astronomy",
            "archaeology",
            "genetics",
        ],
    ),
    (
        "world",
        &[
            "europe",
            "asia",
            "africa",
            "latin america",
            "middle east",
            "global economy",
            "humanitarian crisis",
        ],
    ),
];

/// Picks one element of `items` uniformly at random.
pub fn choose<'a, R>(items: &'a [String], rng: &mut R) -> Option<&'a str>
where
    R: Rng + ?Sized,
{
    items.choose(rng).map(String::as_str)
}

pub struct Diversifier {
    topics: Vec<String>,
    categories: HashMap<String, Vec<String>>,
    rng: Mutex<SmallRng>,
}

impl Diversifier {
    /// Empty topic or keyword lists are ignored.
    pub fn new(
        topics: Vec<String>,
        categories: HashMap<String, Vec<String>>,
        rng: SmallRng,
    ) -> Self {
        let categories = categories
            .into_iter()
            .filter(|(_, keywords)| !keywords.is_empty())
            .map(|(name, keywords)| (normalize_category(&name), keywords))
            .collect();

        Self {
            topics,
            categories,
            rng: Mutex::new(rng),
        }
    }

    pub fn from_config(cfg: &DiversifierConfig) -> Self {
        let topics = match &cfg.topics {
            Some(topics) if !topics.is_empty() => topics.clone(),
            _ => to_strings(DEFAULT_TOPICS),
        };

        let mut categories = DEFAULT_CATEGORIES
            .iter()
            .map(|(name, keywords)| (name.to_string(), to_strings(keywords)))
            .collect::<HashMap<_, _>>();
        categories.extend(
            cfg.categories
                .iter()
                .map(|(name, keywords)| (normalize_category(name), keywords.clone())),
        );

        Self::new(topics, categories, SmallRng::from_entropy())
    }

    /// The search term for the unparameterized general feed.
    pub fn pick_main_topic(&self) -> String {
        let mut rng = self.rng.lock().unwrap();

        choose(&self.topics, &mut *rng)
            .unwrap_or(DEFAULT_TOPICS[0])
            .to_owned()
    }

    /// Maps an umbrella category to one of its keywords; other categories pass through as is.
    pub fn resolve_category(&self, category: &str) -> String {
        let category = category.trim();

        let Some(keywords) = self.categories.get(&normalize_category(category)) else {
            return category.to_owned();
        };

        let mut rng = self.rng.lock().unwrap();

        choose(keywords, &mut *rng)
            .unwrap_or(category)
            .to_owned()
    }
}

fn normalize_category(name: &str) -> String {
    name.trim().to_lowercase()
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|&s| s.to_owned()).collect()
}
