use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::models::lenient::clamp_price;
use crate::models::{CartLine, ItemId, NewCartItem};
use crate::storage::{read_json, write_json, KeyValueStore};

/// Storage key holding the serialized line list.
pub const CART_STORAGE_KEY: &str = "cart";

/// Name given to items that arrive without one ("product").
pub const DEFAULT_PLACEHOLDER_NAME: &str = "منتج";

pub const DEFAULT_PLACEHOLDER_IMAGE: &str = "/images/placeholder.png";

/// Buffer of the cart event channel. Slow subscribers lag rather than block.
const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Which field decides that two added items are the same line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeKey {
    /// Same display name, same line.
    #[default]
    Name,
    /// Same product id, same line. Items without an id fall back to the name.
    Id,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartConfig {
    pub storage_key: String,
    pub merge_key: MergeKey,
    pub placeholder_name: String,
    pub placeholder_image: String,
}

impl Default for CartConfig {
    fn default() -> Self {
        Self {
            storage_key: CART_STORAGE_KEY.to_string(),
            merge_key: MergeKey::default(),
            placeholder_name: DEFAULT_PLACEHOLDER_NAME.to_string(),
            placeholder_image: DEFAULT_PLACEHOLDER_IMAGE.to_string(),
        }
    }
}

/// Notifications for the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum CartEvent {
    /// Lines changed; carries the new totals.
    Changed {
        total_items: u64,
        total_price: Decimal,
    },
    /// A mutation left the cart non-empty. Drives the badge animation.
    Pulse,
}

/// Lines plus derived totals, ready to hand to a view.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct CartSnapshot {
    pub lines: Vec<CartLine>,
    #[cfg_attr(feature = "ts", ts(type = "string"))]
    pub total_price: Decimal,
    pub total_items: u64,
}

/// The shopping cart. One per session; every mutation is written through to
/// storage before events go out.
pub struct CartStore<S> {
    store: S,
    config: CartConfig,
    lines: Vec<CartLine>,
    events: broadcast::Sender<CartEvent>,
}

impl<S: KeyValueStore> CartStore<S> {
    /// Open the cart, restoring whatever was persisted. A missing or
    /// unreadable value yields an empty cart.
    pub fn open(store: S, config: CartConfig) -> Self {
        let lines = match read_json::<Vec<CartLine>, _>(&store, &config.storage_key) {
            Ok(Some(mut lines)) => {
                for line in &mut lines {
                    line.quantity = line.quantity.max(1);
                }
                debug!(lines = lines.len(), "Restored cart from storage");
                lines
            }
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(error = %e, "Discarding unreadable cart");
                Vec::new()
            }
        };

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            store,
            config,
            lines,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CartEvent> {
        self.events.subscribe()
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn line(&self, id: &ItemId) -> Option<&CartLine> {
        self.lines.iter().find(|l| &l.id == id)
    }

    /// Look a line up by the id as typed by a user, numeric or not.
    pub fn resolve_id(&self, raw: &str) -> Option<ItemId> {
        self.lines
            .iter()
            .find(|l| l.id.to_string() == raw)
            .map(|l| l.id.clone())
    }

    /// Sum of all line totals, saturating at `Decimal::MAX`.
    pub fn total_price(&self) -> Decimal {
        self.lines
            .iter()
            .map(CartLine::line_total)
            .try_fold(Decimal::ZERO, |acc, total| acc.checked_add(total))
            .unwrap_or(Decimal::MAX)
    }

    pub fn total_items(&self) -> u64 {
        self.lines.iter().map(|l| u64::from(l.quantity)).sum()
    }

    pub fn snapshot(&self) -> CartSnapshot {
        CartSnapshot {
            lines: self.lines.clone(),
            total_price: self.total_price(),
            total_items: self.total_items(),
        }
    }

    /// Add one unit of `item`. An existing line with the same merge key gets
    /// its quantity bumped and keeps its own price, image and id; otherwise a
    /// new line is appended. Returns the id of the affected line.
    pub fn add_to_cart(&mut self, item: NewCartItem) -> ItemId {
        let name = item
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| self.config.placeholder_name.clone());

        let position = match (self.config.merge_key, item.id.as_ref()) {
            (MergeKey::Id, Some(id)) => self.lines.iter().position(|l| &l.id == id),
            _ => self.lines.iter().position(|l| l.name == name),
        };

        let id = match position.and_then(|i| self.lines.get_mut(i)) {
            Some(line) => {
                line.quantity = line.quantity.saturating_add(1);
                debug!(id = %line.id, quantity = line.quantity, "Incremented cart line");
                line.id.clone()
            }
            None => {
                let id = item.id.unwrap_or_else(|| self.generate_id());
                let line = CartLine {
                    id: id.clone(),
                    name,
                    price: item.price.map(clamp_price).unwrap_or_default(),
                    quantity: 1,
                    image: item
                        .image
                        .filter(|i| !i.trim().is_empty())
                        .unwrap_or_else(|| self.config.placeholder_image.clone()),
                };
                debug!(id = %line.id, name = %line.name, "Added cart line");
                self.lines.push(line);
                id
            }
        };

        self.commit();
        id
    }

    /// Change a line's quantity by `delta`, never going below one.
    /// Returns false (and does nothing) for an unknown id.
    pub fn update_quantity(&mut self, id: &ItemId, delta: i64) -> bool {
        let Some(line) = self.lines.iter_mut().find(|l| &l.id == id) else {
            return false;
        };

        let quantity = i64::from(line.quantity)
            .saturating_add(delta)
            .clamp(1, i64::from(u32::MAX));
        line.quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
        debug!(id = %id, quantity = line.quantity, "Updated cart line quantity");

        self.commit();
        true
    }

    /// Drop a line. Returns false (and does nothing) for an unknown id.
    pub fn remove_item(&mut self, id: &ItemId) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| &l.id != id);
        if self.lines.len() == before {
            return false;
        }

        debug!(id = %id, "Removed cart line");
        self.commit();
        true
    }

    /// Empty the cart and erase the persisted copy.
    pub fn clear_cart(&mut self) {
        self.lines.clear();
        if let Err(e) = self.store.remove(&self.config.storage_key) {
            warn!(error = %e, "Failed to erase persisted cart");
        }
        debug!("Cleared cart");
        self.notify();
    }

    /// Timestamp id, bumped past any existing line that already uses it.
    fn generate_id(&self) -> ItemId {
        let mut millis = Utc::now().timestamp_millis();
        while self.lines.iter().any(|l| l.id == ItemId::Number(millis)) {
            millis += 1;
        }
        ItemId::Number(millis)
    }

    fn commit(&mut self) {
        if let Err(e) = write_json(&self.store, &self.config.storage_key, &self.lines) {
            warn!(error = %e, "Failed to persist cart");
        }
        self.notify();
    }

    fn notify(&self) {
        // No subscribers is fine
        let _ = self.events.send(CartEvent::Changed {
            total_items: self.total_items(),
            total_price: self.total_price(),
        });
        if !self.lines.is_empty() {
            let _ = self.events.send(CartEvent::Pulse);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn open(store: &MemoryStore) -> CartStore<MemoryStore> {
        CartStore::open(store.clone(), CartConfig::default())
    }

    fn shawarma() -> NewCartItem {
        NewCartItem::named("Shawarma").with_price(Decimal::from(50))
    }

    #[test]
    fn test_shawarma_scenario() {
        let mut cart = open(&MemoryStore::new());

        let id = cart.add_to_cart(shawarma());
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.lines()[0].quantity, 1);
        assert_eq!(cart.total_price(), Decimal::from(50));

        cart.add_to_cart(shawarma());
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.lines()[0].quantity, 2);
        assert_eq!(cart.total_price(), Decimal::from(100));

        assert!(cart.update_quantity(&id, -5));
        assert_eq!(cart.lines()[0].quantity, 1);
        assert_eq!(cart.total_price(), Decimal::from(50));

        assert!(cart.remove_item(&id));
        assert!(cart.is_empty());
        assert_eq!(cart.total_price(), Decimal::ZERO);
        assert_eq!(cart.total_items(), 0);
    }

    #[test]
    fn test_same_name_merges_regardless_of_other_fields() {
        let mut cart = open(&MemoryStore::new());
        let first = cart.add_to_cart(
            NewCartItem::named("Kunafa")
                .with_id("k1")
                .with_price(Decimal::from(30))
                .with_image("/k1.png"),
        );
        for _ in 0..4 {
            let id = cart.add_to_cart(
                NewCartItem::named("Kunafa")
                    .with_id("k2")
                    .with_price(Decimal::from(99))
                    .with_image("/k2.png"),
            );
            assert_eq!(id, first);
        }

        assert_eq!(cart.lines().len(), 1);
        let line = &cart.lines()[0];
        assert_eq!(line.quantity, 5);
        assert_eq!(line.id, ItemId::from("k1"));
        assert_eq!(line.price, Decimal::from(30));
        assert_eq!(line.image, "/k1.png");
    }

    #[test]
    fn test_merge_by_id_keeps_same_named_products_apart() {
        let config = CartConfig {
            merge_key: MergeKey::Id,
            ..CartConfig::default()
        };
        let mut cart = CartStore::open(MemoryStore::new(), config);
        cart.add_to_cart(NewCartItem::named("Juice").with_id("orange"));
        cart.add_to_cart(NewCartItem::named("Juice").with_id("mango"));
        cart.add_to_cart(NewCartItem::named("Juice").with_id("mango"));

        assert_eq!(cart.lines().len(), 2);
        assert_eq!(cart.line(&ItemId::from("mango")).unwrap().quantity, 2);
    }

    #[test]
    fn test_defaults_for_missing_fields() {
        let mut cart = open(&MemoryStore::new());
        let before = Utc::now().timestamp_millis();
        let id = cart.add_to_cart(NewCartItem::default());

        let line = cart.line(&id).unwrap();
        assert_eq!(line.name, DEFAULT_PLACEHOLDER_NAME);
        assert_eq!(line.price, Decimal::ZERO);
        assert_eq!(line.image, DEFAULT_PLACEHOLDER_IMAGE);
        assert!(matches!(line.id, ItemId::Number(ms) if ms >= before));
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let mut cart = open(&MemoryStore::new());
        let a = cart.add_to_cart(NewCartItem::named("A"));
        let b = cart.add_to_cart(NewCartItem::named("B"));
        let c = cart.add_to_cart(NewCartItem::named("C"));
        assert_ne!(a, b);
        assert_ne!(b, c);
        assert_ne!(a, c);
    }

    #[test]
    fn test_negative_price_clamped() {
        let mut cart = open(&MemoryStore::new());
        cart.add_to_cart(NewCartItem::named("Refund?").with_price(Decimal::from(-10)));
        assert_eq!(cart.total_price(), Decimal::ZERO);
    }

    #[test]
    fn test_quantity_never_below_one() {
        let mut cart = open(&MemoryStore::new());
        let id = cart.add_to_cart(shawarma());
        for delta in [-1, -100, i64::MIN, 0] {
            cart.update_quantity(&id, delta);
            assert_eq!(cart.line(&id).unwrap().quantity, 1);
        }
        cart.update_quantity(&id, i64::MAX);
        assert_eq!(cart.line(&id).unwrap().quantity, u32::MAX);
    }

    #[test]
    fn test_unknown_ids_are_noops() {
        let store = MemoryStore::new();
        let mut cart = open(&store);
        let mut events = cart.subscribe();

        assert!(!cart.update_quantity(&ItemId::from("ghost"), 3));
        assert!(!cart.remove_item(&ItemId::from(42)));
        assert!(events.try_recv().is_err());
        assert!(!store.contains_key(CART_STORAGE_KEY));
    }

    #[test]
    fn test_totals_match_lines() {
        let mut cart = open(&MemoryStore::new());
        let a = cart.add_to_cart(NewCartItem::named("A").with_price(Decimal::new(1250, 2)));
        cart.add_to_cart(NewCartItem::named("B").with_price(Decimal::from(7)));
        cart.add_to_cart(NewCartItem::named("B"));
        cart.update_quantity(&a, 2);

        let expected_price: Decimal = cart
            .lines()
            .iter()
            .map(|l| l.price * Decimal::from(l.quantity))
            .sum();
        let expected_items: u64 = cart.lines().iter().map(|l| u64::from(l.quantity)).sum();
        assert_eq!(cart.total_price(), expected_price);
        assert_eq!(cart.total_price(), Decimal::new(5150, 2));
        assert_eq!(cart.total_items(), expected_items);
        assert_eq!(cart.total_items(), 5);

        let snapshot = cart.snapshot();
        assert_eq!(snapshot.total_price, cart.total_price());
        assert_eq!(snapshot.lines, cart.lines());
    }

    #[test]
    fn test_reload_restores_identical_lines() {
        let store = MemoryStore::new();
        let mut cart = open(&store);
        cart.add_to_cart(NewCartItem::named("Hummus").with_price(Decimal::new(1850, 2)));
        let id = cart.add_to_cart(NewCartItem::named("Fattoush").with_id("f-1"));
        cart.add_to_cart(NewCartItem::named("Hummus"));
        cart.update_quantity(&id, 3);
        let before = cart.lines().to_vec();
        drop(cart);

        let reloaded = open(&store);
        assert_eq!(reloaded.lines(), before.as_slice());
    }

    #[test]
    fn test_clear_cart_erases_storage() {
        let store = MemoryStore::new();
        let mut cart = open(&store);
        cart.add_to_cart(shawarma());
        assert!(store.contains_key(CART_STORAGE_KEY));

        cart.clear_cart();
        assert!(cart.is_empty());
        assert!(!store.contains_key(CART_STORAGE_KEY));

        let reloaded = open(&store);
        assert!(reloaded.is_empty());
    }

    #[test]
    fn test_corrupt_storage_yields_empty_cart() {
        let store = MemoryStore::new();
        store.set(CART_STORAGE_KEY, "not json at all").unwrap();
        assert!(open(&store).is_empty());

        store.set(CART_STORAGE_KEY, r#"{"lines": []}"#).unwrap();
        assert!(open(&store).is_empty());
    }

    #[test]
    fn test_restored_zero_quantity_is_clamped() {
        let store = MemoryStore::new();
        store
            .set(CART_STORAGE_KEY, r#"[{"id": 1, "name": "Tea", "price": 5, "quantity": 0, "image": ""}]"#)
            .unwrap();
        let cart = open(&store);
        assert_eq!(cart.lines()[0].quantity, 1);
        assert_eq!(cart.total_price(), Decimal::from(5));
    }

    #[test]
    fn test_huge_quantity_and_price_saturate_totals() {
        let store = MemoryStore::new();
        let mut cart = open(&store);
        let mut events = cart.subscribe();

        let price = Decimal::from_scientific("1e20").unwrap();
        let id = cart.add_to_cart(NewCartItem::named("Platter").with_price(price));
        assert!(cart.update_quantity(&id, i64::from(u32::MAX)));
        assert_eq!(cart.lines()[0].quantity, u32::MAX);
        assert_eq!(cart.total_price(), Decimal::MAX);

        // Changed + Pulse from the add, then the update
        events.try_recv().unwrap();
        events.try_recv().unwrap();
        assert!(matches!(
            events.try_recv().unwrap(),
            CartEvent::Changed { total_price, .. } if total_price == Decimal::MAX
        ));

        let reopened = open(&store);
        assert_eq!(reopened.total_price(), Decimal::MAX);
        assert_eq!(reopened.snapshot().total_price, Decimal::MAX);
    }

    #[test]
    fn test_restored_max_price_does_not_break_cart() {
        let store = MemoryStore::new();
        store
            .set(
                CART_STORAGE_KEY,
                r#"[{"id": 1, "name": "Gold", "price": "79228162514264337593543950335", "quantity": 2, "image": ""},
                    {"id": 2, "name": "Tea", "price": 5, "quantity": 1, "image": ""}]"#,
            )
            .unwrap();
        let mut cart = open(&store);
        assert_eq!(cart.total_price(), Decimal::MAX);
        assert_eq!(cart.total_items(), 3);

        assert!(cart.remove_item(&ItemId::Number(1)));
        assert_eq!(cart.total_price(), Decimal::from(5));
    }

    #[test]
    fn test_resolve_id() {
        let mut cart = open(&MemoryStore::new());
        cart.add_to_cart(NewCartItem::named("Tea").with_id(17));
        cart.add_to_cart(NewCartItem::named("Coffee").with_id("c-2"));
        assert_eq!(cart.resolve_id("17"), Some(ItemId::Number(17)));
        assert_eq!(cart.resolve_id("c-2"), Some(ItemId::from("c-2")));
        assert_eq!(cart.resolve_id("nope"), None);
    }

    #[test]
    fn test_events_emitted_per_mutation() {
        let mut cart = open(&MemoryStore::new());
        let mut events = cart.subscribe();

        let id = cart.add_to_cart(shawarma());
        assert_eq!(
            events.try_recv().unwrap(),
            CartEvent::Changed {
                total_items: 1,
                total_price: Decimal::from(50)
            }
        );
        assert_eq!(events.try_recv().unwrap(), CartEvent::Pulse);

        cart.remove_item(&id);
        assert!(matches!(
            events.try_recv().unwrap(),
            CartEvent::Changed { total_items: 0, .. }
        ));
        // Emptied cart: no pulse
        assert!(events.try_recv().is_err());
    }
}
