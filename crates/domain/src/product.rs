//! Catalog products.

use common::{Money, ProductId};
use serde::{Deserialize, Serialize};

use crate::DomainError;

/// A product offered by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    pub category: String,
    pub stock: u32,
}

impl Product {
    /// Creates a product, rejecting non-positive prices.
    pub fn new(
        id: ProductId,
        name: impl Into<String>,
        price: Money,
        category: impl Into<String>,
        stock: u32,
    ) -> Result<Self, DomainError> {
        if !price.is_positive() {
            return Err(DomainError::InvalidPrice { price });
        }

        Ok(Self {
            id,
            name: name.into(),
            price,
            category: category.into(),
            stock,
        })
    }
}

impl std::fmt::Display for Product {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{} {} ({}) {}", self.id, self.name, self.category, self.price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_positive_price() {
        let err = Product::new(ProductId::new(1), "Rice", Money::ZERO, "Grocery", 10).unwrap_err();
        assert!(matches!(err, DomainError::InvalidPrice { .. }));
    }

    #[test]
    fn test_display() {
        let p = Product::new(ProductId::new(3), "Rice", Money::from_cents(2550), "Grocery", 4)
            .unwrap();
        assert_eq!(p.to_string(), "#3 Rice (Grocery) $25.50");
    }
}
