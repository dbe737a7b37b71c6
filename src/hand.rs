#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Softness {
    Hard,
    Soft,
}

/// Best total of a hand and whether an ace is counted as 11 in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandValue {
    pub total: u8,
    pub softness: Softness,
}

impl HandValue {
    pub fn is_soft(&self) -> bool {
        self.softness == Softness::Soft
    }

    pub fn is_bust(&self) -> bool {
        self.total > 21
    }
}

/// `hard_sum` is the sum of the non-ace cards.
pub fn best_total(hard_sum: u8, ace_count: u8) -> HandValue {
    let low = hard_sum + ace_count;
    if ace_count >= 1 && low < 12 {
        HandValue {
            total: low + 10,
            softness: Softness::Soft,
        }
    } else {
        HandValue {
            total: low,
            softness: Softness::Hard,
        }
    }
}

pub fn evaluate(cards: &[u8]) -> HandValue {
    let (hard_sum, ace_count) = cards.iter().fold((0u8, 0u8), |(sum, aces), &card| {
        if card == 1 {
            (sum, aces + 1)
        } else {
            (sum + card, aces)
        }
    });
    best_total(hard_sum, ace_count)
}

pub fn is_bust(cards: &[u8]) -> bool {
    evaluate(cards).is_bust()
}

pub fn is_natural(cards: &[u8]) -> bool {
    cards.len() == 2 && evaluate(cards).total == 21
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn totals() {
        assert_eq!(
            evaluate(&[1, 6]),
            HandValue {
                total: 17,
                softness: Softness::Soft
            }
        );
        assert_eq!(
            evaluate(&[1, 6, 6]),
            HandValue {
                total: 13,
                softness: Softness::Hard
            }
        );
        assert_eq!(
            evaluate(&[10, 10]),
            HandValue {
                total: 20,
                softness: Softness::Hard
            }
        );
        assert_eq!(
            evaluate(&[1, 1, 9]),
            HandValue {
                total: 21,
                softness: Softness::Soft
            }
        );
        assert_eq!(evaluate(&[1, 1]).total, 12);
        assert!(evaluate(&[1, 1]).is_soft());
    }

    #[test]
    fn bust_and_natural() {
        assert!(is_bust(&[10, 6, 6]));
        assert!(!is_bust(&[1, 10, 10]));
        assert!(is_natural(&[10, 1]));
        assert!(!is_natural(&[5, 6, 10]));
    }
}
