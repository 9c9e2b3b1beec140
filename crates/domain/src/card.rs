//! Payment cards.
//!
//! The raw card number only lives inside [`CardNumber`] long enough to be
//! validated; a persisted [`Card`] keeps the last four digits and nothing more.

use common::{CardId, UserId};
use serde::{Deserialize, Serialize};

use crate::DomainError;

const MIN_DIGITS: usize = 13;
const MAX_DIGITS: usize = 19;

/// A validated card number (digits only).
#[derive(Clone, PartialEq, Eq)]
pub struct CardNumber(String);

impl CardNumber {
    /// Parses a card number, ignoring spaces and hyphens.
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let digits: String = raw
            .chars()
            .filter(|c| !matches!(c, ' ' | '-'))
            .collect();

        if !(MIN_DIGITS..=MAX_DIGITS).contains(&digits.len())
            || !digits.chars().all(|c| c.is_ascii_digit())
        {
            return Err(DomainError::InvalidCardNumber);
        }

        Ok(Self(digits))
    }

    pub fn last4(&self) -> &str {
        &self.0[self.0.len() - 4..]
    }

    pub fn masked(&self) -> String {
        mask(self.last4())
    }
}

// Never print the full number, even in debug output.
impl std::fmt::Debug for CardNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("CardNumber").field(&self.masked()).finish()
    }
}

fn mask(last4: &str) -> String {
    format!("**** **** **** {last4}")
}

/// Card network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CardBrand {
    Visa,
    Mastercard,
}

impl CardBrand {
    pub fn as_str(&self) -> &'static str {
        match self {
            CardBrand::Visa => "Visa",
            CardBrand::Mastercard => "Mastercard",
        }
    }
}

impl std::fmt::Display for CardBrand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for CardBrand {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "visa" => Ok(CardBrand::Visa),
            "mastercard" | "master card" | "mc" => Ok(CardBrand::Mastercard),
            _ => Err(DomainError::UnknownValue {
                field: "card brand",
                value: s.to_string(),
            }),
        }
    }
}

/// Card expiry in `MM/YY` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Expiry {
    month: u8,
    year: u8,
}

impl Expiry {
    /// Parses `MM/YY`. Only the structure is checked, not whether the card
    /// has already expired.
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let invalid = || DomainError::InvalidExpiry(raw.to_string());

        let (mm, yy) = raw.trim().split_once('/').ok_or_else(invalid)?;
        let two_digits = |part: &str| part.len() == 2 && part.bytes().all(|b| b.is_ascii_digit());
        if !two_digits(mm) || !two_digits(yy) {
            return Err(invalid());
        }
        let month: u8 = mm.parse().map_err(|_| invalid())?;
        let year: u8 = yy.parse().map_err(|_| invalid())?;
        if !(1..=12).contains(&month) {
            return Err(invalid());
        }

        Ok(Self { month, year })
    }

    pub fn month(&self) -> u8 {
        self.month
    }

    pub fn year(&self) -> u8 {
        self.year
    }
}

impl std::fmt::Display for Expiry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}/{:02}", self.month, self.year)
    }
}

/// A card registration request that has passed validation.
#[derive(Debug, Clone)]
pub struct NewCard {
    pub user_id: UserId,
    pub number: CardNumber,
    pub holder: String,
    pub expiry: Expiry,
    pub brand: CardBrand,
}

impl NewCard {
    pub fn new(
        user_id: UserId,
        number: &str,
        holder: &str,
        expiry: &str,
        brand: CardBrand,
    ) -> Result<Self, DomainError> {
        let number = CardNumber::parse(number)?;
        let holder = holder.trim();
        if holder.is_empty() {
            return Err(DomainError::InvalidCardHolder);
        }
        let expiry = Expiry::parse(expiry)?;

        Ok(Self {
            user_id,
            number,
            holder: holder.to_string(),
            expiry,
            brand,
        })
    }
}

/// A registered card as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    pub user_id: UserId,
    pub last4: String,
    pub holder: String,
    pub expiry: Expiry,
    pub brand: CardBrand,
    pub active: bool,
}

impl Card {
    pub fn masked_number(&self) -> String {
        mask(&self.last4)
    }
}

impl std::fmt::Display for Card {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} ({}, exp {})",
            self.brand,
            self.masked_number(),
            self.holder,
            self.expiry
        )
    }
}
