//! Board vocabulary and the sentence strip
//!
//! Cards are static: an emoji shown when no pictogram can be found, the label
//! that is spoken, and the term used to look the pictogram up.

use crate::pictogram::PictogramProvider;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Card {
    pub emoji: &'static str,
    pub label: &'static str,
    pub term: &'static str,
}

const fn card(emoji: &'static str, label: &'static str, term: &'static str) -> Card {
    Card { emoji, label, term }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Category {
    pub name: &'static str,
    pub cards: &'static [Card],
}

static CATEGORIES: &[Category] = &[
    Category {
        name: "Food",
        cards: &[
            card("🍎", "Apple", "apple"),
            card("🍌", "Banana", "banana"),
            card("🥛", "Milk", "milk"),
            card("🍞", "Bread", "bread"),
            card("💧", "Water", "water"),
            card("🧃", "Juice", "juice"),
            card("🍪", "Cookie", "cookie"),
            card("🧀", "Cheese", "cheese"),
            card("🍕", "Pizza", "pizza"),
        ],
    },
    Category {
        name: "Activities",
        cards: &[
            card("🎮", "Play", "play"),
            card("📖", "Read", "read"),
            card("🎨", "Draw", "draw"),
            card("🎵", "Music", "music"),
            card("🏃", "Run", "run"),
            card("🧩", "Puzzle", "puzzle"),
            card("📺", "TV", "television"),
            card("🛝", "Playground", "playground"),
            card("🚗", "Car ride", "car"),
        ],
    },
    Category {
        name: "Feelings",
        cards: &[
            card("😊", "Happy", "happy"),
            card("😢", "Sad", "sad"),
            card("😠", "Angry", "angry"),
            card("😰", "Worried", "worried"),
            card("😴", "Tired", "tired"),
            card("🤗", "Hug", "hug"),
            card("😋", "Hungry", "hungry"),
            card("🥵", "Hot", "hot"),
            card("🥶", "Cold", "cold"),
        ],
    },
    Category {
        name: "Actions",
        cards: &[
            card("🚽", "Toilet", "toilet"),
            card("🖐️", "Help", "help"),
            card("✋", "Stop", "stop"),
            card("👋", "Hello", "hello"),
            card("🙏", "Please", "please"),
            card("❤️", "Thank you", "thank you"),
            card("➡️", "More", "more"),
            card("🚫", "No", "no"),
            card("✅", "Yes", "yes"),
        ],
    },
];

/// Bundled categories in display order
pub fn categories() -> &'static [Category] {
    CATEGORIES
}

/// Case-insensitive category lookup
pub fn category(name: &str) -> Option<&'static Category> {
    let name = name.trim();
    CATEGORIES.iter().find(|c| c.name.eq_ignore_ascii_case(name))
}

/// Words picked so far, in order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Sentence {
    words: Vec<String>,
}

impl Sentence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, label: impl Into<String>) {
        let label = label.into();
        if !label.trim().is_empty() {
            self.words.push(label.trim().to_string());
        }
    }

    pub fn pop(&mut self) -> Option<String> {
        self.words.pop()
    }

    pub fn clear(&mut self) {
        self.words.clear();
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn text(&self) -> String {
        self.words.join(" ")
    }
}

/// What a card shows: a cached pictogram or its emoji
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardFace {
    Pictogram(PathBuf),
    Glyph(String),
}

impl CardFace {
    pub async fn resolve(
        card: &Card,
        provider: &PictogramProvider,
        lang: &str,
        resolution: u32,
    ) -> Self {
        match provider.get_pictogram(card.term, lang, resolution).await {
            Some(path) => CardFace::Pictogram(path),
            None => CardFace::Glyph(card.emoji.to_string()),
        }
    }

    pub fn is_pictogram(&self) -> bool {
        matches!(self, CardFace::Pictogram(_))
    }
}
