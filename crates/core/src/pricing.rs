use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Platform fee applied when a quotation carries no explicit rate: 2%.
pub fn default_platform_fee_rate() -> Decimal {
    Decimal::new(2, 2)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotationPricing {
    pub subtotal: Decimal,
    pub platform_fee: Decimal,
    pub total: Decimal,
}

/// Recompute the money columns of a quotation. Used on submission and
/// whenever an UPDATE touches a price-affecting field.
pub fn compute(unit_price: Decimal, quantity: u32, fee_rate: Option<Decimal>) -> QuotationPricing {
    let subtotal = unit_price * Decimal::from(quantity);
    let rate = fee_rate.unwrap_or_else(default_platform_fee_rate);
    let platform_fee = (subtotal * rate).round_dp(2);
    let total = subtotal + platform_fee;
    QuotationPricing { subtotal, platform_fee, total }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{compute, default_platform_fee_rate};

    #[test]
    fn fallback_fee_is_two_percent() {
        assert_eq!(default_platform_fee_rate(), Decimal::new(2, 2));
    }

    #[test]
    fn computes_subtotal_fee_and_total_with_fallback() {
        let pricing = compute(Decimal::new(12_50, 2), 100, None);
        assert_eq!(pricing.subtotal, Decimal::new(1250_00, 2));
        assert_eq!(pricing.platform_fee, Decimal::new(25_00, 2));
        assert_eq!(pricing.total, Decimal::new(1275_00, 2));
    }

    #[test]
    fn explicit_rate_overrides_fallback() {
        let pricing = compute(Decimal::new(100_00, 2), 10, Some(Decimal::new(5, 2)));
        assert_eq!(pricing.subtotal, Decimal::new(1000_00, 2));
        assert_eq!(pricing.platform_fee, Decimal::new(50_00, 2));
        assert_eq!(pricing.total, Decimal::new(1050_00, 2));
    }

    #[test]
    fn fee_rounds_to_cents() {
        let pricing = compute(Decimal::new(3_33, 2), 3, None);
        assert_eq!(pricing.subtotal, Decimal::new(9_99, 2));
        // 2% of 9.99 = 0.1998, rounded to 0.20
        assert_eq!(pricing.platform_fee, Decimal::new(20, 2));
        assert_eq!(pricing.total, Decimal::new(10_19, 2));
    }

    #[test]
    fn zero_quantity_produces_zero_totals() {
        let pricing = compute(Decimal::new(12_50, 2), 0, None);
        assert_eq!(pricing.subtotal, Decimal::ZERO);
        assert_eq!(pricing.platform_fee, Decimal::ZERO);
        assert_eq!(pricing.total, Decimal::ZERO);
    }
}
