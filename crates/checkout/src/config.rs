use domain::ShippingPolicy;

/// Checkout tunables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutConfig {
    pub shipping: ShippingPolicy,
    /// Header printed on receipts.
    pub store_name: String,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            shipping: ShippingPolicy::default(),
            store_name: "SIAP Tianguistenco".to_string(),
        }
    }
}
