//! Filter selection state and the control panel that writes it.

use serde::Serialize;
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::data::Record;
use crate::error::DashboardError;

/// Sentinel selection value meaning "no restriction".
pub const ALL: &str = "ALL";

/// The three user-selectable filter fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterField {
    Make,
    Body,
    State,
}

impl FilterField {
    pub fn label(&self) -> &'static str {
        match self {
            FilterField::Make => "Make",
            FilterField::Body => "Body Type",
            FilterField::State => "State",
        }
    }
}

impl FromStr for FilterField {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "make" => Ok(FilterField::Make),
            "body" | "bodytype" | "body_type" => Ok(FilterField::Body),
            "state" | "region" => Ok(FilterField::State),
            _ => Err(DashboardError::InvalidSelectionField(s.to_string())),
        }
    }
}

/// Current make / body type / region selection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct FilterSelection {
    pub make: String,
    pub body: String,
    pub state: String,
}

impl Default for FilterSelection {
    fn default() -> Self {
        Self {
            make: ALL.to_string(),
            body: ALL.to_string(),
            state: ALL.to_string(),
        }
    }
}

impl FilterSelection {
    pub fn new(make: &str, body: &str, state: &str) -> Self {
        Self {
            make: normalize(make),
            body: normalize(body),
            state: normalize(state),
        }
    }

    pub fn get(&self, field: FilterField) -> &str {
        match field {
            FilterField::Make => &self.make,
            FilterField::Body => &self.body,
            FilterField::State => &self.state,
        }
    }

    fn slot(&mut self, field: FilterField) -> &mut String {
        match field {
            FilterField::Make => &mut self.make,
            FilterField::Body => &mut self.body,
            FilterField::State => &mut self.state,
        }
    }

    /// Whether a record passes all three fields.
    pub fn matches(&self, record: &Record) -> bool {
        field_matches(&self.make, &record.make)
            && field_matches(&self.body, &record.body)
            && field_matches(&self.state, &record.state)
    }
}

impl fmt::Display for FilterSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "make={} body={} state={}", self.make, self.body, self.state)
    }
}

pub fn is_all(value: &str) -> bool {
    value == ALL
}

fn field_matches(selected: &str, value: &str) -> bool {
    is_all(selected) || selected == value
}

/// Selection values are compared against uppercased record fields.
fn normalize(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        ALL.to_string()
    } else {
        trimmed.to_uppercase()
    }
}

// =============================================================================
// Observable store
// =============================================================================

pub type SubscriptionId = usize;

type Listener = Box<dyn FnMut(&FilterSelection)>;

/// Holds the current selection and notifies subscribers when it changes.
#[derive(Default)]
pub struct FilterStore {
    selection: FilterSelection,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_id: SubscriptionId,
    // set while listeners are detached by `commit`
    notifying: bool,
    unsubscribed: Vec<SubscriptionId>,
}

impl FilterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selection(&self) -> &FilterSelection {
        &self.selection
    }

    /// Replace one field. Returns whether the selection changed; listeners
    /// only hear about actual changes.
    ///
    /// This writes the field as given and skips the make/body cascade, so a
    /// make change can leave a body type no record carries. User choices go
    /// through [`FilterPanel::apply`] instead.
    pub fn set(&mut self, field: FilterField, value: &str) -> bool {
        let value = normalize(value);
        let slot = self.selection.slot(field);
        if *slot == value {
            return false;
        }
        *slot = value;
        self.notify();
        true
    }

    /// Replace the whole selection at once, notifying a single time.
    pub fn replace(&mut self, selection: FilterSelection) -> bool {
        if !self.swap(selection) {
            return false;
        }
        self.notify();
        true
    }

    /// Replace the selection of a shared store, running listeners after the
    /// borrow is released so they may read the store themselves.
    pub fn commit(store: &RefCell<FilterStore>, selection: FilterSelection) -> bool {
        let (selection, mut listeners) = {
            let mut inner = store.borrow_mut();
            if !inner.swap(selection) {
                return false;
            }
            debug!(selection = %inner.selection, listeners = inner.listeners.len(), "filter selection changed");
            inner.notifying = true;
            (inner.selection.clone(), std::mem::take(&mut inner.listeners))
        };

        for (_, listener) in listeners.iter_mut() {
            listener(&selection);
        }

        let mut inner = store.borrow_mut();
        inner.notifying = false;
        let dropped = std::mem::take(&mut inner.unsubscribed);
        listeners.retain(|(id, _)| !dropped.contains(id));
        // listeners subscribed during notification follow the existing ones
        listeners.append(&mut inner.listeners);
        inner.listeners = listeners;
        true
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&FilterSelection) + 'static) -> SubscriptionId {
        let id = self.next_id;
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        if self.listeners.len() != before {
            return true;
        }
        if self.notifying && id < self.next_id && !self.unsubscribed.contains(&id) {
            self.unsubscribed.push(id);
            return true;
        }
        false
    }

    fn swap(&mut self, selection: FilterSelection) -> bool {
        if self.selection == selection {
            return false;
        }
        self.selection = selection;
        true
    }

    fn notify(&mut self) {
        debug!(selection = %self.selection, listeners = self.listeners.len(), "filter selection changed");
        let selection = self.selection.clone();
        for (_, listener) in self.listeners.iter_mut() {
            listener(&selection);
        }
    }
}

impl fmt::Debug for FilterStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterStore")
            .field("selection", &self.selection)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

// =============================================================================
// Control panel
// =============================================================================

/// A labeled dropdown as handed to the UI layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dropdown {
    pub label: &'static str,
    pub options: Vec<String>,
    pub value: String,
}

/// Option lists derived from the loaded records.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterPanel {
    pub makes: Vec<String>,
    pub bodies: Vec<String>,
    pub states: Vec<String>,
    bodies_by_make: Vec<(String, Vec<String>)>,
}

impl FilterPanel {
    pub fn from_records(records: &[Record]) -> Self {
        let makes = with_all(records.iter().map(|r| r.make.as_str()));
        let bodies = with_all(records.iter().map(|r| r.body.as_str()));
        let states = with_all(records.iter().map(|r| r.state.as_str()));

        let bodies_by_make = makes
            .iter()
            .skip(1)
            .map(|make| {
                let bodies = with_all(
                    records
                        .iter()
                        .filter(|r| &r.make == make)
                        .map(|r| r.body.as_str()),
                );
                (make.clone(), bodies)
            })
            .collect();

        Self {
            makes,
            bodies,
            states,
            bodies_by_make,
        }
    }

    /// Body types offered for a make; the full list when make is `ALL`.
    pub fn bodies_for(&self, make: &str) -> &[String] {
        if is_all(make) {
            return &self.bodies;
        }
        self.bodies_by_make
            .binary_search_by(|(m, _)| m.as_str().cmp(make))
            .map(|idx| self.bodies_by_make[idx].1.as_slice())
            .unwrap_or(&self.bodies[..1])
    }

    pub fn options(&self, field: FilterField, selection: &FilterSelection) -> &[String] {
        match field {
            FilterField::Make => &self.makes,
            FilterField::Body => self.bodies_for(&selection.make),
            FilterField::State => &self.states,
        }
    }

    /// Write a user choice into the store, cascading dependent fields.
    /// Listeners are notified once.
    pub fn apply(&self, store: &mut FilterStore, field: FilterField, value: &str) -> bool {
        let next = self.cascade(store.selection(), field, value);
        store.replace(next)
    }

    /// The selection a user choice leads to.
    ///
    /// Choosing a make whose records never carry the selected body type
    /// resets the body type to `ALL`.
    pub fn cascade(&self, current: &FilterSelection, field: FilterField, value: &str) -> FilterSelection {
        let mut next = current.clone();
        *next.slot(field) = normalize(value);

        if field == FilterField::Make && !self.bodies_for(&next.make).contains(&next.body) {
            debug!(make = %next.make, body = %next.body, "body type not offered for make, resetting");
            next.body = ALL.to_string();
        }
        next
    }

    pub fn dropdowns(&self, selection: &FilterSelection) -> [Dropdown; 3] {
        [FilterField::Make, FilterField::Body, FilterField::State].map(|field| Dropdown {
            label: field.label(),
            options: self.options(field, selection).to_vec(),
            value: selection.get(field).to_string(),
        })
    }
}

fn with_all<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let unique: BTreeSet<&str> = values.collect();
    std::iter::once(ALL.to_string())
        .chain(unique.into_iter().map(str::to_string))
        .collect()
}

// =============================================================================
// Session scope
// =============================================================================

pub mod session {
    //! The active filter store for the current thread.
    //!
    //! Mirrors a UI context provider: consumers reach the shared store without
    //! threading it through every call, and reaching for it outside a session
    //! is a programming error.

    use super::FilterStore;
    use crate::error::DashboardError;
    use std::cell::RefCell;
    use std::rc::Rc;

    thread_local! {
        static ACTIVE: RefCell<Option<Rc<RefCell<FilterStore>>>> = const { RefCell::new(None) };
    }

    /// Keeps a store active until dropped, then restores the outer one.
    #[must_use = "the session ends when the guard is dropped"]
    pub struct SessionGuard {
        previous: Option<Rc<RefCell<FilterStore>>>,
    }

    impl Drop for SessionGuard {
        fn drop(&mut self) {
            let previous = self.previous.take();
            ACTIVE.with(|active| *active.borrow_mut() = previous);
        }
    }

    pub fn provide(store: Rc<RefCell<FilterStore>>) -> SessionGuard {
        let previous = ACTIVE.with(|active| active.borrow_mut().replace(store));
        SessionGuard { previous }
    }

    pub fn use_filter_store() -> Result<Rc<RefCell<FilterStore>>, DashboardError> {
        ACTIVE
            .with(|active| active.borrow().clone())
            .ok_or(DashboardError::NoActiveSession)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    fn rec(make: &str, body: &str, state: &str) -> Record {
        Record {
            year: 2014.0,
            make: make.to_string(),
            model: "M".to_string(),
            trim: "t".to_string(),
            body: body.to_string(),
            transmission: "automatic".to_string(),
            vin: "v".to_string(),
            state: state.to_string(),
            condition: 3.0,
            odometer: 1000.0,
            color: "white".to_string(),
            interior: "black".to_string(),
            seller: "s".to_string(),
            mmr: 10000.0,
            selling_price: 10000.0,
            sale_date: "2015-01-01".to_string(),
        }
    }

    fn sample() -> Vec<Record> {
        vec![
            rec("TOYOTA", "SEDAN", "CA"),
            rec("BMW", "SUV", "FL"),
            rec("TOYOTA", "SUV", "CA"),
            rec("BMW", "CONVERTIBLE", "NY"),
        ]
    }

    #[test]
    fn test_option_lists_sorted_with_all() {
        let panel = FilterPanel::from_records(&sample());
        assert_eq!(panel.makes, vec!["ALL", "BMW", "TOYOTA"]);
        assert_eq!(panel.bodies, vec!["ALL", "CONVERTIBLE", "SEDAN", "SUV"]);
        assert_eq!(panel.states, vec!["ALL", "CA", "FL", "NY"]);
        assert_eq!(panel.bodies_for("TOYOTA"), &["ALL", "SEDAN", "SUV"]);
        assert_eq!(panel.bodies_for(ALL), panel.bodies.as_slice());
    }

    #[test]
    fn test_empty_records_offer_only_all() {
        let panel = FilterPanel::from_records(&[]);
        assert_eq!(panel.makes, vec![ALL]);
        assert_eq!(panel.bodies_for("BMW"), &[ALL]);
        assert_eq!(panel.states, vec![ALL]);
    }

    #[test]
    fn test_make_change_resets_unavailable_body() {
        let panel = FilterPanel::from_records(&sample());
        let mut store = FilterStore::new();
        panel.apply(&mut store, FilterField::Body, "convertible");
        assert_eq!(store.selection().body, "CONVERTIBLE");

        panel.apply(&mut store, FilterField::Make, "Toyota");
        assert_eq!(store.selection().make, "TOYOTA");
        assert_eq!(store.selection().body, ALL);
    }

    #[test]
    fn test_make_change_keeps_available_body() {
        let panel = FilterPanel::from_records(&sample());
        let mut store = FilterStore::new();
        panel.apply(&mut store, FilterField::Body, "SUV");
        panel.apply(&mut store, FilterField::Make, "TOYOTA");
        assert_eq!(store.selection().body, "SUV");
    }

    #[test]
    fn test_listeners_notified_once_per_change() {
        let panel = FilterPanel::from_records(&sample());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut store = FilterStore::new();
        let sink = seen.clone();
        let id = store.subscribe(move |sel| sink.borrow_mut().push(sel.clone()));

        panel.apply(&mut store, FilterField::Body, "CONVERTIBLE");
        panel.apply(&mut store, FilterField::Make, "TOYOTA");
        // unchanged value: no notification
        panel.apply(&mut store, FilterField::Make, "TOYOTA");
        assert_eq!(seen.borrow().len(), 2);
        assert_eq!(seen.borrow()[1], FilterSelection::new("TOYOTA", ALL, ALL));

        assert!(store.unsubscribe(id));
        store.set(FilterField::State, "CA");
        assert_eq!(seen.borrow().len(), 2);
    }

    #[test]
    fn test_selection_matches() {
        let sel = FilterSelection::new("bmw", "", "ALL");
        assert!(sel.matches(&rec("BMW", "SUV", "FL")));
        assert!(!sel.matches(&rec("TOYOTA", "SUV", "FL")));
    }

    #[test]
    fn test_dropdowns_follow_selected_make() {
        let panel = FilterPanel::from_records(&sample());
        let dropdowns = panel.dropdowns(&FilterSelection::new("BMW", ALL, ALL));
        assert_eq!(dropdowns[1].label, "Body Type");
        assert_eq!(dropdowns[1].options, vec!["ALL", "CONVERTIBLE", "SUV"]);
        assert_eq!(dropdowns[0].value, "BMW");
    }

    #[test]
    fn test_field_from_str() {
        assert_eq!("Region".parse::<FilterField>().unwrap(), FilterField::State);
        assert!("color".parse::<FilterField>().is_err());
    }

    #[test]
    fn test_session_scope() {
        assert_eq!(session::use_filter_store().unwrap_err(), DashboardError::NoActiveSession);

        let store = Rc::new(RefCell::new(FilterStore::new()));
        {
            let _guard = session::provide(store.clone());
            let active = session::use_filter_store().unwrap();
            active.borrow_mut().set(FilterField::Make, "BMW");
        }
        assert_eq!(store.borrow().selection().make, "BMW");
        assert!(session::use_filter_store().is_err());
    }

    #[test]
    fn test_commit_runs_listeners_outside_borrow() {
        let store = Rc::new(RefCell::new(FilterStore::new()));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let (shared, sink) = (store.clone(), seen.clone());
        let first = store.borrow_mut().subscribe(move |_| {
            let make = shared.borrow().selection().make.clone();
            sink.borrow_mut().push(make);
        });
        let shared = store.clone();
        store.borrow_mut().subscribe(move |_| {
            shared.borrow_mut().unsubscribe(first);
        });

        assert!(FilterStore::commit(&store, FilterSelection::new("BMW", ALL, ALL)));
        assert!(!FilterStore::commit(&store, FilterSelection::new("BMW", ALL, ALL)));
        assert!(FilterStore::commit(&store, FilterSelection::default()));
        // the first listener was dropped during the first notification
        assert_eq!(*seen.borrow(), vec!["BMW".to_string()]);
        assert_eq!(store.borrow().listeners.len(), 1);
    }

    #[test]
    fn test_set_skips_cascade() {
        let panel = FilterPanel::from_records(&sample());
        let mut store = FilterStore::new();
        panel.apply(&mut store, FilterField::Body, "CONVERTIBLE");
        store.set(FilterField::Make, "TOYOTA");
        assert_eq!(store.selection(), &FilterSelection::new("TOYOTA", "CONVERTIBLE", ALL));
        assert_eq!(
            panel.cascade(store.selection(), FilterField::Make, "TOYOTA"),
            FilterSelection::new("TOYOTA", ALL, ALL)
        );
    }
}
