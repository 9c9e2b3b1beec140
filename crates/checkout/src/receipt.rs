//! Plain-text receipts.

use common::Money;
use domain::LineItem;

use crate::context::CheckoutContext;
use crate::ports::{PaymentChoice, ReceiptRenderer};

const WIDTH: usize = 48;

/// Renders a fixed-width text receipt.
#[derive(Debug, Clone)]
pub struct TextReceipt {
    store_name: String,
}

impl TextReceipt {
    pub fn new(store_name: impl Into<String>) -> Self {
        Self {
            store_name: store_name.into(),
        }
    }
}

fn amount_line(out: &mut String, label: &str, value: &str) {
    out.push_str(&format!("{label:<30}{value:>18}\n"));
}

fn truncate(name: &str, max: usize) -> String {
    if name.chars().count() <= max {
        name.to_string()
    } else {
        let mut short: String = name.chars().take(max - 1).collect();
        short.push('~');
        short
    }
}

impl ReceiptRenderer for TextReceipt {
    fn render(&self, context: &CheckoutContext, lines: &[LineItem]) -> String {
        let rule = "=".repeat(WIDTH);
        let thin = "-".repeat(WIDTH);
        let mut out = String::new();

        out.push_str(&format!("{rule}\n{:^WIDTH$}\n{rule}\n", self.store_name.to_uppercase()));
        out.push_str(&format!(
            "Date:  {}\n",
            context.started_at().format("%d/%m/%Y %H:%M:%S")
        ));
        if let Some(folio) = context.folio() {
            out.push_str(&format!("Folio: {folio}\n"));
        }
        let items: u32 = lines.iter().map(|line| line.quantity).sum();
        out.push_str(&format!("Items: {items}\n{thin}\n"));

        out.push_str(&format!("{:<20}{:>5}{:>11}{:>12}\n", "Product", "Qty", "Unit", "Amount"));
        for line in lines {
            out.push_str(&format!(
                "{:<20}{:>5}{:>11}{:>12}\n",
                truncate(&line.product_name, 19),
                line.quantity,
                line.unit_price.to_string(),
                line.line_total().to_string(),
            ));
        }
        out.push_str(&format!("{thin}\n"));

        let cart = context.cart();
        amount_line(&mut out, "Subtotal:", &cart.subtotal.to_string());
        if cart.discount > Money::ZERO {
            amount_line(&mut out, "Discount:", &format!("-{}", cart.discount));
        }
        let shipping_label = match context.shipping() {
            Some(choice) => format!("Shipping ({}):", choice.mode.as_str()),
            None => "Shipping:".to_string(),
        };
        amount_line(&mut out, &shipping_label, &context.shipping_cost().to_string());
        amount_line(&mut out, "TOTAL:", &context.grand_total().to_string());
        if let Some(address) = context.shipping().and_then(|c| c.address.as_deref()) {
            out.push_str(&format!("Deliver to: {address}\n"));
        }

        let payment = match (context.payment(), context.authorization()) {
            (Some(PaymentChoice::Card(card_id)), Some(auth)) => {
                format!("Card #{card_id} ({auth})")
            }
            (Some(PaymentChoice::Card(card_id)), None) => format!("Card #{card_id}"),
            (Some(PaymentChoice::Cash), _) => "Cash".to_string(),
            (None, _) => "-".to_string(),
        };
        out.push_str(&format!("Payment: {payment}\n{thin}\n"));
        out.push_str(&format!("{:^WIDTH$}\n", "Thank you for your purchase!"));
        out
    }
}

#[cfg(test)]
mod tests {
    use common::{ProductId, UserId};
    use domain::{Folio, Product, SharedCart, ShippingChoice};

    use super::*;
    use crate::ports::ShippingQuote;

    async fn context() -> CheckoutContext {
        let cart = SharedCart::new();
        let a = Product::new(ProductId::new(1), "ProductA", Money::from_units(300), "Test", 9)
            .unwrap();
        let b = Product::new(ProductId::new(2), "ProductB", Money::from_units(50), "Test", 9)
            .unwrap();
        cart.add_item(&a).await;
        cart.add_item(&a).await;
        cart.add_item(&b).await;
        cart.apply_discount(Money::from_units(65)).await;

        let mut ctx = CheckoutContext::new(UserId::new(1), cart.snapshot().await);
        ctx.set_shipping(ShippingQuote {
            choice: ShippingChoice::home("Av. Juarez 120, Col. Centro"),
            cost: Money::ZERO,
        });
        ctx.set_payment(PaymentChoice::Cash);
        ctx.set_folio(Folio::new("ORD-1700000000000"));
        ctx
    }

    #[tokio::test]
    async fn test_receipt_contents() {
        let ctx = context().await;
        let text = TextReceipt::new("Corner Shop").render(&ctx, &ctx.cart().items);

        assert!(text.contains("CORNER SHOP"));
        assert!(text.contains("Folio: ORD-1700000000000"));
        assert!(text.contains("Items: 3"));
        assert!(text.contains("ProductA"));
        assert!(text.contains("-$65.00"));
        assert!(text.contains("Shipping (HOME):"));
        assert!(text.contains("$585.00"));
        assert!(text.contains("Payment: Cash"));
    }

    #[tokio::test]
    async fn test_no_discount_line_without_discount() {
        let mut ctx = context().await;
        let mut cart = ctx.cart().clone();
        cart.discount = Money::ZERO;
        cart.total = cart.subtotal;
        ctx.set_cart(cart);

        let text = TextReceipt::new("Shop").render(&ctx, &ctx.cart().items);
        assert!(!text.contains("Discount:"));
    }

    #[test]
    fn test_truncate_long_names() {
        assert_eq!(truncate("Short", 19), "Short");
        let long = truncate("An extremely long product name", 10);
        assert_eq!(long.chars().count(), 10);
        assert!(long.ends_with('~'));
    }
}
