//! Staff card matching for bank debits.
//!
//! Each active staff member lists the card numbers (usually the last four
//! digits) they hold. A transaction belongs to a staff member when one of
//! those numbers appears in its description or card column. Each
//! transaction is classified on its own.

use fp_models::{BankTransaction, StaffMember};

/// Card numbers shorter than this are ignored; one or two digits would
/// match almost every description.
pub const MIN_CARD_DIGITS: usize = 3;

/// Result of matching one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardMatch {
    /// Exactly one staff member's card appears.
    Staff(i64),
    /// Cards of several staff members appear; left for manual allocation.
    Ambiguous(Vec<i64>),
    NoMatch,
}

/// Card numbers of the active staff, ready for matching.
#[derive(Debug, Clone, Default)]
pub struct CardMatcher {
    cards: Vec<(i64, String)>,
}

impl CardMatcher {
    pub fn new(staff: &[StaffMember]) -> Self {
        let cards = staff
            .iter()
            .filter(|s| s.is_active)
            .filter_map(|s| s.id.map(|id| (id, s)))
            .flat_map(|(id, s)| {
                s.cards()
                    .into_iter()
                    .filter(|c| c.len() >= MIN_CARD_DIGITS)
                    .map(move |c| (id, c.to_ascii_uppercase()))
                    .collect::<Vec<_>>()
            })
            .collect();
        Self { cards }
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Match a description and optional card column.
    pub fn match_text(&self, description: &str, card_column: Option<&str>) -> CardMatch {
        let haystack = match card_column {
            Some(card) => format!("{} {}", description, card).to_ascii_uppercase(),
            None => description.to_ascii_uppercase(),
        };

        let mut staff_ids: Vec<i64> = self
            .cards
            .iter()
            .filter(|(_, card)| haystack.contains(card.as_str()))
            .map(|(id, _)| *id)
            .collect();
        staff_ids.sort_unstable();
        staff_ids.dedup();

        match staff_ids.len() {
            0 => CardMatch::NoMatch,
            1 => CardMatch::Staff(staff_ids[0]),
            _ => CardMatch::Ambiguous(staff_ids),
        }
    }

    pub fn match_transaction(&self, tx: &BankTransaction) -> CardMatch {
        self.match_text(&tx.description, tx.card_number.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staff(id: i64, cards: &str) -> StaffMember {
        let mut s = StaffMember::new(format!("Staff {id}"), cards);
        s.id = Some(id);
        s
    }

    #[test]
    fn test_single_match() {
        let matcher = CardMatcher::new(&[staff(1, "1234"), staff(2, "5678, 9012")]);
        assert_eq!(
            matcher.match_text("BUNNINGS 123 CARD xx9012", None),
            CardMatch::Staff(2)
        );
    }

    #[test]
    fn test_card_column_is_searched() {
        let matcher = CardMatcher::new(&[staff(1, "1234")]);
        assert_eq!(matcher.match_text("SHELL FUEL", Some("****1234")), CardMatch::Staff(1));
    }

    #[test]
    fn test_ambiguous_match() {
        let matcher = CardMatcher::new(&[staff(1, "1234"), staff(2, "2345")]);
        assert_eq!(
            matcher.match_text("REF 12345", None),
            CardMatch::Ambiguous(vec![1, 2])
        );
    }

    #[test]
    fn test_two_cards_same_staff_is_not_ambiguous() {
        let matcher = CardMatcher::new(&[staff(1, "1111,2222")]);
        assert_eq!(matcher.match_text("1111 2222", None), CardMatch::Staff(1));
    }

    #[test]
    fn test_inactive_and_short_cards_ignored() {
        let mut gone = staff(3, "4321");
        gone.is_active = false;
        let matcher = CardMatcher::new(&[gone, staff(4, "12")]);
        assert!(matcher.is_empty());
        assert_eq!(matcher.match_text("CARD 4321 12", None), CardMatch::NoMatch);
    }
}
