//! Core domain entities, rules, and views for ShelfLife.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors returned by core validation and domain rules.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Returned when a validation rule is violated.
    #[error("validation error: {0}")]
    Validation(String),
    /// Returned when store operations fail.
    #[error("storage error: {0}")]
    Storage(String),
    /// Returned when a mutation targets an id that is not in the collection.
    #[error("item not found")]
    NotFound,
}

/// Quantity below this value counts as low stock.
pub const LOW_STOCK_THRESHOLD: u32 = 5;

/// Items expiring within this many days count as expiring soon.
pub const EXPIRY_WINDOW_DAYS: i64 = 7;

/// A tracked inventory record.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct Item {
    /// Unique identifier, assigned at creation.
    pub id: Uuid,
    /// User-supplied barcode; duplicates are allowed.
    pub barcode: String,
    /// Human-readable product name.
    pub product_name: String,
    /// Calendar date the product expires.
    pub expiration_date: NaiveDate,
    /// Free-text or AI-suggested category.
    pub category: String,
    /// Units on hand.
    pub quantity: u32,
    /// Where the product is stored.
    pub location: String,
    /// Timestamp of creation; never changes across edits.
    pub created_at: DateTime<Utc>,
}

impl Item {
    /// Assemble an item from validated fields.
    pub fn new(id: Uuid, fields: ItemFields, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            barcode: fields.barcode,
            product_name: fields.product_name,
            expiration_date: fields.expiration_date,
            category: fields.category,
            quantity: fields.quantity,
            location: fields.location,
            created_at,
        }
    }

    fn apply(&mut self, fields: ItemFields) {
        self.barcode = fields.barcode;
        self.product_name = fields.product_name;
        self.expiration_date = fields.expiration_date;
        self.category = fields.category;
        self.quantity = fields.quantity;
        self.location = fields.location;
    }
}

/// The editable subset of an item, validated on construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ItemFields {
    pub barcode: String,
    pub product_name: String,
    pub expiration_date: NaiveDate,
    pub category: String,
    pub quantity: u32,
    pub location: String,
}

impl ItemFields {
    /// Create validated fields, rejecting empty or whitespace-only strings.
    pub fn new(
        barcode: impl Into<String>,
        product_name: impl Into<String>,
        expiration_date: NaiveDate,
        category: impl Into<String>,
        quantity: u32,
        location: impl Into<String>,
    ) -> CoreResult<Self> {
        let barcode = barcode.into();
        if barcode.trim().is_empty() {
            return Err(CoreError::Validation("barcode cannot be empty".into()));
        }
        let product_name = product_name.into();
        if product_name.trim().is_empty() {
            return Err(CoreError::Validation("product name cannot be empty".into()));
        }
        let category = category.into();
        if category.trim().is_empty() {
            return Err(CoreError::Validation("category cannot be empty".into()));
        }
        let location = location.into();
        if location.trim().is_empty() {
            return Err(CoreError::Validation("location cannot be empty".into()));
        }

        Ok(Self {
            barcode,
            product_name,
            expiration_date,
            category,
            quantity,
            location,
        })
    }
}

/// Persistence seam: a durable store for the whole item collection.
pub trait StockStore {
    /// Load the persisted collection; absent data yields an empty one.
    fn load(&self) -> CoreResult<Vec<Item>>;
    /// Persist the full collection, replacing whatever was stored before.
    fn save(&self, items: &[Item]) -> CoreResult<()>;
}

/// The canonical in-memory item collection for a running session.
///
/// Owns the ordered collection and writes it through to the store on
/// every successful mutation. Collection order is insertion order;
/// editing an item never repositions it.
#[derive(Debug)]
pub struct Inventory<S: StockStore> {
    items: Vec<Item>,
    store: S,
}

impl<S: StockStore> Inventory<S> {
    /// Open the inventory, loading the persisted collection once.
    pub fn open(store: S) -> CoreResult<Self> {
        let items = store.load()?;
        Ok(Self { items, store })
    }

    /// Current snapshot, in insertion order.
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Fetch a single item by id.
    pub fn get(&self, id: Uuid) -> Option<&Item> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Append a new item with a fresh id and `created_at = now`.
    pub fn add(&mut self, fields: ItemFields, now: DateTime<Utc>) -> CoreResult<Item> {
        let item = Item::new(Uuid::new_v4(), fields, now);
        self.items.push(item.clone());
        self.store.save(&self.items)?;
        Ok(item)
    }

    /// Overwrite the editable fields of an existing item in place.
    ///
    /// `id` and `created_at` are preserved.
    pub fn update(&mut self, id: Uuid, fields: ItemFields) -> CoreResult<Item> {
        let item = self
            .items
            .iter_mut()
            .find(|item| item.id == id)
            .ok_or(CoreError::NotFound)?;
        item.apply(fields);
        let updated = item.clone();
        self.store.save(&self.items)?;
        Ok(updated)
    }

    /// Remove an item permanently.
    pub fn remove(&mut self, id: Uuid) -> CoreResult<()> {
        let position = self
            .items
            .iter()
            .position(|item| item.id == id)
            .ok_or(CoreError::NotFound)?;
        self.items.remove(position);
        self.store.save(&self.items)?;
        Ok(())
    }
}

/// Derived counts over the collection; recomputed, never stored.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StockStats {
    pub total: usize,
    pub low_stock: usize,
    pub expiring_soon: usize,
}

/// Per-row expiration indicator for the presentation surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExpiryBadge {
    Expired,
    ExpiringSoon,
    Ok,
}

impl ExpiryBadge {
    pub fn label(self) -> &'static str {
        match self {
            ExpiryBadge::Expired => "expired",
            ExpiryBadge::ExpiringSoon => "expiring-soon",
            ExpiryBadge::Ok => "ok",
        }
    }
}

fn expiration_instant(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// Filter items by a search term, preserving input order.
///
/// The term matches when it is contained case-insensitively in the
/// product name or category, or case-sensitively in the barcode. An
/// empty term matches everything.
pub fn filter_items<'a>(items: &'a [Item], term: &str) -> Vec<&'a Item> {
    let lowered = term.to_lowercase();
    items
        .iter()
        .filter(|item| {
            item.product_name.to_lowercase().contains(&lowered)
                || item.barcode.contains(term)
                || item.category.to_lowercase().contains(&lowered)
        })
        .collect()
}

/// Compute derived stats for the collection at the given instant.
///
/// The expiring-soon count compares expiration midnight (UTC) against
/// `now` with a strict `< 7 days` bound and no lower bound, so items
/// that are already expired stay in the count.
pub fn stock_stats(items: &[Item], now: DateTime<Utc>) -> StockStats {
    let window = Duration::days(EXPIRY_WINDOW_DAYS);
    StockStats {
        total: items.len(),
        low_stock: items
            .iter()
            .filter(|item| item.quantity < LOW_STOCK_THRESHOLD)
            .count(),
        expiring_soon: items
            .iter()
            .filter(|item| expiration_instant(item.expiration_date) - now < window)
            .count(),
    }
}

/// Classify an expiration date relative to `now`.
pub fn expiry_badge(date: NaiveDate, now: DateTime<Utc>) -> ExpiryBadge {
    let instant = expiration_instant(date);
    if instant < now {
        return ExpiryBadge::Expired;
    }
    let diff = instant - now;
    if diff > Duration::zero() && diff < Duration::days(EXPIRY_WINDOW_DAYS) {
        ExpiryBadge::ExpiringSoon
    } else {
        ExpiryBadge::Ok
    }
}

/// Coerce a raw quantity field to a non-negative integer.
///
/// Unparsable or negative input becomes 0 rather than rejecting the
/// submission.
pub fn coerce_quantity(raw: &str) -> u32 {
    raw.trim().parse::<u32>().unwrap_or(0)
}

/// Unsaved form state: the editable fields as the user typed them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Draft {
    pub barcode: String,
    pub product_name: String,
    /// Raw `YYYY-MM-DD` text; parsed at commit.
    pub expiration_date: String,
    pub category: String,
    /// Raw text; coerced at commit.
    pub quantity: String,
    pub location: String,
}

impl Draft {
    /// Blank draft for create mode. Quantity starts at 1.
    pub fn blank() -> Self {
        Self {
            quantity: "1".into(),
            ..Self::default()
        }
    }

    /// Draft seeded from an existing item for edit mode.
    pub fn from_item(item: &Item) -> Self {
        Self {
            barcode: item.barcode.clone(),
            product_name: item.product_name.clone(),
            expiration_date: item.expiration_date.format("%Y-%m-%d").to_string(),
            category: item.category.clone(),
            quantity: item.quantity.to_string(),
            location: item.location.clone(),
        }
    }

    /// Validate and convert the draft into committable fields.
    pub fn commit(&self) -> CoreResult<ItemFields> {
        let expiration_date = NaiveDate::parse_from_str(self.expiration_date.trim(), "%Y-%m-%d")
            .map_err(|_| {
                CoreError::Validation(format!(
                    "expiration date must be YYYY-MM-DD, got {:?}",
                    self.expiration_date
                ))
            })?;
        ItemFields::new(
            self.barcode.clone(),
            self.product_name.clone(),
            expiration_date,
            self.category.clone(),
            coerce_quantity(&self.quantity),
            self.location.clone(),
        )
    }
}

/// Whether a form session creates a new item or edits an existing one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormMode {
    Create,
    Edit(Uuid),
}

/// A create-or-edit session over a single draft.
///
/// Callers hold a session while the form is open and drop it on cancel
/// or successful submit; a failed submit leaves the draft intact.
#[derive(Clone, Debug)]
pub struct FormSession {
    mode: FormMode,
    pub draft: Draft,
}

impl FormSession {
    /// Start a blank create session.
    pub fn create() -> Self {
        Self {
            mode: FormMode::Create,
            draft: Draft::blank(),
        }
    }

    /// Start an edit session seeded from an existing item.
    pub fn edit(item: &Item) -> Self {
        Self {
            mode: FormMode::Edit(item.id),
            draft: Draft::from_item(item),
        }
    }

    pub fn mode(&self) -> FormMode {
        self.mode
    }

    pub fn is_edit(&self) -> bool {
        matches!(self.mode, FormMode::Edit(_))
    }

    /// Commit the draft into the inventory.
    pub fn submit<S: StockStore>(
        &self,
        inventory: &mut Inventory<S>,
        now: DateTime<Utc>,
    ) -> CoreResult<Item> {
        let fields = self.draft.commit()?;
        match self.mode {
            FormMode::Edit(id) => inventory.update(id, fields),
            FormMode::Create => inventory.add(fields, now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashSet;

    #[derive(Default)]
    struct MemStore {
        saves: RefCell<usize>,
        seeded: Vec<Item>,
    }

    impl StockStore for MemStore {
        fn load(&self) -> CoreResult<Vec<Item>> {
            Ok(self.seeded.clone())
        }

        fn save(&self, _items: &[Item]) -> CoreResult<()> {
            *self.saves.borrow_mut() += 1;
            Ok(())
        }
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("date")
    }

    fn instant(s: &str) -> DateTime<Utc> {
        date(s).and_time(NaiveTime::MIN).and_utc()
    }

    fn fields(name: &str, quantity: u32, expires: &str) -> ItemFields {
        ItemFields::new("7891234567", name, date(expires), "Groceries", quantity, "Shelf B12")
            .expect("fields")
    }

    #[test]
    fn fields_reject_empty_strings() {
        let result = ItemFields::new("123", "   ", date("2024-06-01"), "Food", 1, "A1");
        assert!(matches!(result, Err(CoreError::Validation(_))));
        let result = ItemFields::new("123", "Rice", date("2024-06-01"), "", 1, "A1");
        assert!(matches!(result, Err(CoreError::Validation(_))));
    }

    #[test]
    fn add_assigns_fresh_unique_ids() {
        let mut inventory = Inventory::open(MemStore::default()).expect("open");
        let now = instant("2024-01-01");
        let mut ids = HashSet::new();
        for i in 0..5 {
            let item = inventory
                .add(fields(&format!("Item {i}"), 1, "2024-06-01"), now)
                .expect("add");
            assert!(ids.insert(item.id));
        }
        assert_eq!(inventory.items().len(), 5);
    }

    #[test]
    fn update_preserves_id_and_created_at() {
        let mut inventory = Inventory::open(MemStore::default()).expect("open");
        let created = instant("2024-01-01");
        let item = inventory
            .add(fields("Rice", 3, "2024-06-01"), created)
            .expect("add");

        let updated = inventory
            .update(item.id, fields("Brown Rice", 8, "2024-07-01"))
            .expect("update");

        assert_eq!(updated.id, item.id);
        assert_eq!(updated.created_at, created);
        assert_eq!(updated.product_name, "Brown Rice");
        assert_eq!(updated.quantity, 8);
    }

    #[test]
    fn update_keeps_insertion_order() {
        let mut inventory = Inventory::open(MemStore::default()).expect("open");
        let now = instant("2024-01-01");
        let first = inventory.add(fields("Milk", 2, "2024-02-01"), now).expect("add");
        inventory.add(fields("Eggs", 12, "2024-02-10"), now).expect("add");

        inventory
            .update(first.id, fields("Oat Milk", 2, "2024-02-01"))
            .expect("update");

        let names: Vec<_> = inventory
            .items()
            .iter()
            .map(|item| item.product_name.as_str())
            .collect();
        assert_eq!(names, vec!["Oat Milk", "Eggs"]);
    }

    #[test]
    fn mutations_on_unknown_id_signal_not_found() {
        let mut inventory = Inventory::open(MemStore::default()).expect("open");
        let missing = Uuid::new_v4();
        assert!(matches!(
            inventory.update(missing, fields("Rice", 1, "2024-06-01")),
            Err(CoreError::NotFound)
        ));
        assert!(matches!(inventory.remove(missing), Err(CoreError::NotFound)));
    }

    #[test]
    fn every_successful_mutation_saves_once() {
        let mut inventory = Inventory::open(MemStore::default()).expect("open");
        let now = instant("2024-01-01");
        let item = inventory.add(fields("Rice", 1, "2024-06-01"), now).expect("add");
        inventory
            .update(item.id, fields("Rice", 2, "2024-06-01"))
            .expect("update");
        inventory.remove(item.id).expect("remove");
        assert_eq!(*inventory.store.saves.borrow(), 3);
    }

    #[test]
    fn remove_is_permanent() {
        let mut inventory = Inventory::open(MemStore::default()).expect("open");
        let now = instant("2024-01-01");
        let item = inventory.add(fields("Rice", 1, "2024-06-01"), now).expect("add");
        inventory.remove(item.id).expect("remove");
        assert!(inventory.items().is_empty());
        assert!(inventory.get(item.id).is_none());
    }

    #[test]
    fn empty_term_matches_everything_in_order() {
        let now = instant("2024-01-01");
        let items = vec![
            Item::new(Uuid::new_v4(), fields("Milk", 2, "2024-02-01"), now),
            Item::new(Uuid::new_v4(), fields("Eggs", 12, "2024-02-10"), now),
        ];
        let matched = filter_items(&items, "");
        let names: Vec<_> = matched.iter().map(|item| item.product_name.as_str()).collect();
        assert_eq!(names, vec!["Milk", "Eggs"]);
    }

    #[test]
    fn filter_is_case_insensitive_on_name_and_category() {
        let now = instant("2024-01-01");
        let items = vec![Item::new(Uuid::new_v4(), fields("Basmati Rice", 2, "2024-02-01"), now)];
        assert_eq!(filter_items(&items, "basmati").len(), 1);
        assert_eq!(filter_items(&items, "GROCER").len(), 1);
    }

    #[test]
    fn filter_is_case_sensitive_on_barcode() {
        let now = instant("2024-01-01");
        let mut item_fields = fields("Rice", 2, "2024-02-01");
        item_fields.barcode = "AB1234".into();
        let items = vec![Item::new(Uuid::new_v4(), item_fields, now)];
        assert_eq!(filter_items(&items, "AB12").len(), 1);
        assert!(filter_items(&items, "ab12").is_empty());
    }

    #[test]
    fn stats_on_empty_collection_are_zero() {
        assert_eq!(stock_stats(&[], instant("2024-01-01")), StockStats::default());
    }

    #[test]
    fn low_stock_threshold_is_exclusive() {
        let now = instant("2024-01-01");
        let items = vec![
            Item::new(Uuid::new_v4(), fields("Low", 3, "2024-06-01"), now),
            Item::new(Uuid::new_v4(), fields("Enough", 5, "2024-06-01"), now),
        ];
        assert_eq!(stock_stats(&items, now).low_stock, 1);
    }

    #[test]
    fn expiring_soon_window_is_seven_days() {
        let now = instant("2024-01-01");
        let items = vec![
            Item::new(Uuid::new_v4(), fields("Soon", 10, "2024-01-03"), now),
            Item::new(Uuid::new_v4(), fields("Later", 10, "2024-01-10"), now),
        ];
        assert_eq!(stock_stats(&items, now).expiring_soon, 1);
    }

    #[test]
    fn expiring_soon_counts_already_expired_items() {
        let now = instant("2024-01-01");
        let items = vec![Item::new(Uuid::new_v4(), fields("Old", 10, "2023-12-01"), now)];
        assert_eq!(stock_stats(&items, now).expiring_soon, 1);
    }

    #[test]
    fn badge_boundaries() {
        let now = instant("2024-01-05");
        assert_eq!(expiry_badge(date("2024-01-04"), now), ExpiryBadge::Expired);
        assert_eq!(expiry_badge(date("2024-01-07"), now), ExpiryBadge::ExpiringSoon);
        assert_eq!(expiry_badge(date("2024-02-05"), now), ExpiryBadge::Ok);
    }

    #[test]
    fn quantity_coercion_never_rejects() {
        assert_eq!(coerce_quantity("7"), 7);
        assert_eq!(coerce_quantity(" 12 "), 12);
        assert_eq!(coerce_quantity("abc"), 0);
        assert_eq!(coerce_quantity("-3"), 0);
        assert_eq!(coerce_quantity(""), 0);
    }

    #[test]
    fn create_draft_commits_into_new_item() {
        let mut inventory = Inventory::open(MemStore::default()).expect("open");
        let now = instant("2024-01-01");
        let mut session = FormSession::create();
        session.draft.barcode = "7891234567".into();
        session.draft.product_name = "Rice".into();
        session.draft.expiration_date = "2024-06-01".into();
        session.draft.category = "Groceries".into();
        session.draft.quantity = "nope".into();
        session.draft.location = "Shelf B12".into();

        let item = session.submit(&mut inventory, now).expect("submit");
        assert_eq!(item.quantity, 0);
        assert_eq!(item.created_at, now);
        assert_eq!(inventory.items().len(), 1);
    }

    #[test]
    fn edit_draft_overwrites_fields_only() {
        let mut inventory = Inventory::open(MemStore::default()).expect("open");
        let created = instant("2024-01-01");
        let item = inventory.add(fields("Rice", 3, "2024-06-01"), created).expect("add");

        let mut session = FormSession::edit(&item);
        assert!(session.is_edit());
        session.draft.product_name = "Jasmine Rice".into();
        session.draft.quantity = "9".into();

        let updated = session.submit(&mut inventory, instant("2024-03-01")).expect("submit");
        assert_eq!(updated.id, item.id);
        assert_eq!(updated.created_at, created);
        assert_eq!(updated.product_name, "Jasmine Rice");
        assert_eq!(updated.quantity, 9);
        assert_eq!(inventory.items().len(), 1);
    }

    #[test]
    fn failed_submit_leaves_draft_intact() {
        let mut inventory = Inventory::open(MemStore::default()).expect("open");
        let mut session = FormSession::create();
        session.draft.product_name = "Rice".into();
        session.draft.expiration_date = "not-a-date".into();

        let result = session.submit(&mut inventory, instant("2024-01-01"));
        assert!(matches!(result, Err(CoreError::Validation(_))));
        assert_eq!(session.draft.product_name, "Rice");
        assert!(inventory.items().is_empty());
    }
}
