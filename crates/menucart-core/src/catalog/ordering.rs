//! Menu ordering rules.

use crate::models::Category;
use crate::utils::{collation_key, normalize_arabic};

/// Display name of the "best sellers" category, which always leads the menu.
pub const BEST_SELLERS: &str = "الأكثر مبيعًا";

/// True for the best-sellers category, with or without diacritics.
pub fn is_best_sellers(name: &str) -> bool {
    normalize_arabic(name.trim()) == normalize_arabic(BEST_SELLERS)
}

/// Best sellers first, everything else alphabetically by display name.
/// Categories with equal names keep their relative order.
pub fn sort_categories(mut categories: Vec<Category>) -> Vec<Category> {
    categories.sort_by_cached_key(|c| (!is_best_sellers(&c.name), collation_key(&c.name)));
    categories
}

/// Categories the admin has not hidden.
pub fn visible_categories(categories: &[Category]) -> impl Iterator<Item = &Category> {
    categories.iter().filter(|c| c.visible)
}
