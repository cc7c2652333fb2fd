use rust_decimal::{Decimal, RoundingStrategy};

/// Fold Arabic spelling variants and drop diacritics so that visually
/// equivalent names compare equal.
///
/// - harakat, tanween, superscript alef and tatweel are removed
/// - hamza-carrying alef forms become a bare alef
/// - alef maqsura becomes ya, ta marbuta becomes ha
pub fn normalize_arabic(s: &str) -> String {
    s.chars()
        .filter_map(|c| match c {
            '\u{064B}'..='\u{065F}' | '\u{0670}' | '\u{0640}' => None,
            'أ' | 'إ' | 'آ' | 'ٱ' => Some('ا'),
            'ى' => Some('ي'),
            'ة' => Some('ه'),
            other => Some(other),
        })
        .collect()
}

/// Key used for alphabetical ordering of display names.
pub fn collation_key(s: &str) -> String {
    normalize_arabic(s.trim()).to_lowercase()
}

/// Format a price with two decimal places.
pub fn format_price(price: Decimal) -> String {
    format!(
        "{:.2}",
        price.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    )
}

/// Truncate a string to a maximum number of characters, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}
