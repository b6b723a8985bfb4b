use crate::formats::VocabCard;

/// Deck used when a vocab-flip overlay carries no cards of its own.
pub fn default_cards() -> Vec<VocabCard> {
    [
        ("Fraction", "A part of a whole number"),
        ("Numerator", "The top number in a fraction"),
        ("Denominator", "The bottom number in a fraction"),
    ]
    .into_iter()
    .map(|(word, definition)| VocabCard {
        word: word.to_string(),
        definition: definition.to_string(),
    })
    .collect()
}

/// Flashcard deck: one card visible at a time, word side first.
#[derive(Debug, Clone)]
pub struct VocabDeck {
    cards: Vec<VocabCard>,
    current: usize,
    flipped: bool,
}

impl VocabDeck {
    pub fn new(cards: Vec<VocabCard>) -> Self {
        let cards = if cards.is_empty() {
            default_cards()
        } else {
            cards
        };
        Self {
            cards,
            current: 0,
            flipped: false,
        }
    }

    pub fn cards(&self) -> &[VocabCard] {
        &self.cards
    }

    pub fn current(&self) -> &VocabCard {
        &self.cards[self.current]
    }

    pub fn is_flipped(&self) -> bool {
        self.flipped
    }

    /// Text on the visible side of the current card.
    pub fn visible_text(&self) -> &str {
        let card = self.current();
        if self.flipped {
            &card.definition
        } else {
            &card.word
        }
    }

    pub fn flip(&mut self) {
        self.flipped = !self.flipped;
    }

    pub fn next(&mut self) {
        self.current = (self.current + 1) % self.cards.len();
        self.flipped = false;
    }

    pub fn prev(&mut self) {
        self.current = (self.current + self.cards.len() - 1) % self.cards.len();
        self.flipped = false;
    }

    /// "2 / 3"
    pub fn counter(&self) -> String {
        format!("{} / {}", self.current + 1, self.cards.len())
    }
}

impl Default for VocabDeck {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}
