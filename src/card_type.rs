use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Processing category selecting which conversion rules apply to a card.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum CardType {
    Cards,
    Cardbacks,
    Heroes,
}

impl CardType {
    pub const ALL: [CardType; 3] = [CardType::Cards, CardType::Cardbacks, CardType::Heroes];

    /// Name used for config keys and the first output folder level.
    pub const fn as_str(self) -> &'static str {
        match self {
            CardType::Cards => "cards",
            CardType::Cardbacks => "cardbacks",
            CardType::Heroes => "heroes",
        }
    }
}

impl fmt::Display for CardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Collapses repeated selectors keeping first-seen order. An empty
/// selection means every card type.
pub fn normalize_selection(selected: &[CardType]) -> Vec<CardType> {
    if selected.is_empty() {
        return CardType::ALL.to_vec();
    }

    let mut types = Vec::with_capacity(selected.len());
    for card_type in selected {
        if !types.contains(card_type) {
            types.push(*card_type);
        }
    }
    types
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_selection_means_all() {
        assert_eq!(normalize_selection(&[]), CardType::ALL.to_vec());
    }

    #[test]
    fn test_duplicates_collapse_in_order() {
        let selected = [CardType::Heroes, CardType::Cards, CardType::Heroes];
        assert_eq!(
            normalize_selection(&selected),
            vec![CardType::Heroes, CardType::Cards]
        );
    }

    #[test]
    fn test_names_match_cli_values() {
        for card_type in CardType::ALL {
            let parsed = CardType::from_str(card_type.as_str(), false).unwrap();
            assert_eq!(parsed, card_type);
        }
    }
}
