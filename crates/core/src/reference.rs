//! Human-readable reference codes derived deterministically from raw record
//! ids: strip non-alphanumerics, uppercase, keep the last 8 characters (or
//! left-pad with `0` to 8), and prefix by record type.

fn clean(raw_id: &str) -> String {
    raw_id.chars().filter(char::is_ascii_alphanumeric).map(|c| c.to_ascii_uppercase()).collect()
}

pub fn format_reference(prefix: &str, raw_id: &str) -> String {
    let cleaned = clean(raw_id);
    let tail = if cleaned.len() > 8 {
        // cleaned is pure ASCII, byte slicing is safe
        cleaned[cleaned.len() - 8..].to_string()
    } else {
        format!("{cleaned:0>8}")
    };
    format!("{prefix}-{tail}")
}

pub fn format_requirement_reference(raw_id: &str) -> String {
    format_reference("REQ", raw_id)
}

pub fn format_quotation_reference(raw_id: &str) -> String {
    format_reference("QUO", raw_id)
}

pub fn format_transaction_reference(raw_id: &str) -> String {
    format_reference("TXN", raw_id)
}

pub fn format_order_reference(raw_id: &str) -> String {
    format_reference("ORD", raw_id)
}

pub fn format_purchase_order_reference(raw_id: &str) -> String {
    format_reference("PO", raw_id)
}

pub fn format_sales_order_reference(raw_id: &str) -> String {
    format_reference("SO", raw_id)
}
