//! Filter compiler: quick/tag shortcuts and the advanced form, compiled into
//! canonical list query parameters.
//!
//! The two regimes are mutually exclusive. While [`FilterMode::Advanced`] is
//! active, no quick-filter or tag-chip parameter is ever emitted.

use dayboard_api_types::{Habit, Project, Reminder, ReminderStatus, SortBy, SortOrder};
use time::{Date, Duration};

use crate::cache::iso_date;

/// Canonical `(name, value)` query pairs in a fixed order.
pub type QueryParams = Vec<(&'static str, String)>;

/// Quick-filter shortcut.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QuickFilter {
    #[default]
    All,
    Today,
    Scheduled,
    Completed,
}

impl QuickFilter {
    pub fn as_str(self) -> &'static str {
        match self {
            QuickFilter::All => "all",
            QuickFilter::Today => "today",
            QuickFilter::Scheduled => "scheduled",
            QuickFilter::Completed => "completed",
        }
    }

    fn expand(self, today: Date, params: &mut Params) {
        match self {
            QuickFilter::All => {}
            QuickFilter::Today => {
                params.status = Some(ReminderStatus::Active);
                params.date_from = Some(today);
                params.date_to = Some(today + Duration::days(1));
            }
            QuickFilter::Scheduled => {
                params.status = Some(ReminderStatus::Active);
                params.date_from = Some(today + Duration::days(1));
            }
            QuickFilter::Completed => {
                params.status = Some(ReminderStatus::Completed);
            }
        }
    }
}

impl std::str::FromStr for QuickFilter {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "all" => Ok(QuickFilter::All),
            "today" => Ok(QuickFilter::Today),
            "scheduled" => Ok(QuickFilter::Scheduled),
            "completed" => Ok(QuickFilter::Completed),
            other => Err(format!("unknown quick filter `{other}`")),
        }
    }
}

/// Fields of the advanced filter form. Every field maps onto one query parameter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdvancedFilter {
    pub status: Option<ReminderStatus>,
    pub tag_id: Option<i64>,
    pub reminder_type: Option<String>,
    pub date_from: Option<Date>,
    pub date_to: Option<Date>,
    pub search: String,
    pub sort_by: Option<SortBy>,
    pub sort_order: Option<SortOrder>,
}

impl AdvancedFilter {
    /// True when no form field differs from its default.
    ///
    /// `search` is fed by the search box, not the form, and does not count.
    pub fn is_default(&self) -> bool {
        self.status.is_none()
            && self.tag_id.is_none()
            && self.reminder_type.as_deref().is_none_or(str::is_empty)
            && self.date_from.is_none()
            && self.date_to.is_none()
            && self.sort_by.is_none()
            && self.sort_order.is_none()
    }
}

/// Which regime currently drives the parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FilterMode {
    #[default]
    Quick,
    Advanced,
}

/// Where free-text search is applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SearchMode {
    /// Sent to the server as `search`.
    #[default]
    Server,
    /// Kept out of the request; apply [`FilterSpec::matches_search`] to fetched items.
    Client,
}

/// Full filter state of one list surface.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSpec {
    quick: QuickFilter,
    tag: Option<i64>,
    advanced: AdvancedFilter,
    mode: FilterMode,
    search_mode: SearchMode,
}

impl FilterSpec {
    pub fn new(search_mode: SearchMode) -> Self {
        Self {
            search_mode,
            ..Self::default()
        }
    }

    pub fn mode(&self) -> FilterMode {
        self.mode
    }

    pub fn quick(&self) -> QuickFilter {
        self.quick
    }

    pub fn tag(&self) -> Option<i64> {
        self.tag
    }

    pub fn advanced(&self) -> &AdvancedFilter {
        &self.advanced
    }

    pub fn search(&self) -> &str {
        &self.advanced.search
    }

    pub fn search_mode(&self) -> SearchMode {
        self.search_mode
    }

    /// Select a quick-filter shortcut. Leaves the advanced regime if active.
    pub fn select_quick(&mut self, quick: QuickFilter) {
        self.leave_advanced();
        self.quick = quick;
    }

    /// Select (or clear) a tag chip. Leaves the advanced regime if active.
    pub fn select_tag(&mut self, tag: Option<i64>) {
        self.leave_advanced();
        self.tag = tag;
    }

    /// Apply the advanced form.
    ///
    /// A form with any non-default field switches to the advanced regime and
    /// resets the quick filter and tag chip; an all-default form resets.
    pub fn apply_advanced(&mut self, form: AdvancedFilter) {
        if form.is_default() {
            let search = form.search;
            self.reset_advanced();
            self.advanced.search = search;
            return;
        }
        self.advanced = form;
        self.mode = FilterMode::Advanced;
        self.quick = QuickFilter::default();
        self.tag = None;
    }

    /// Back to the quick regime with default shortcuts. Search text is kept.
    pub fn reset_advanced(&mut self) {
        let search = std::mem::take(&mut self.advanced.search);
        *self = Self {
            advanced: AdvancedFilter {
                search,
                ..AdvancedFilter::default()
            },
            search_mode: self.search_mode,
            ..Self::default()
        };
    }

    /// Set the debounced search text; the regime is unchanged.
    pub fn set_search(&mut self, text: impl Into<String>) {
        self.advanced.search = text.into();
    }

    /// Compile the state into canonical query parameters.
    pub fn compile(&self, today: Date) -> QueryParams {
        let mut params = Params::default();
        match self.mode {
            FilterMode::Quick => {
                self.quick.expand(today, &mut params);
                params.tag_id = self.tag;
            }
            FilterMode::Advanced => {
                params.status = self.advanced.status;
                params.tag_id = self.advanced.tag_id;
                params.reminder_type = self
                    .advanced
                    .reminder_type
                    .clone()
                    .filter(|value| !value.trim().is_empty());
                params.date_from = self.advanced.date_from;
                params.date_to = self.advanced.date_to;
                params.sort_by = self.advanced.sort_by;
                params.sort_order = self.advanced.sort_order;
            }
        }
        if self.search_mode == SearchMode::Server {
            let search = self.advanced.search.trim();
            params.search = (!search.is_empty()).then(|| search.to_string());
        }
        params.into_pairs()
    }

    /// Client-side search over an already-fetched item.
    ///
    /// Always true in server mode or when no search text is set.
    pub fn matches_search<T: Searchable>(&self, item: &T) -> bool {
        let needle = self.advanced.search.trim();
        if self.search_mode == SearchMode::Server || needle.is_empty() {
            return true;
        }
        let needle = needle.to_lowercase();
        item.search_fields()
            .into_iter()
            .flatten()
            .any(|field| field.to_lowercase().contains(&needle))
    }

    fn leave_advanced(&mut self) {
        if self.mode == FilterMode::Advanced {
            self.reset_advanced();
        }
    }
}

/// Text fields matched by client-side search.
pub trait Searchable {
    fn search_fields(&self) -> [Option<&str>; 2];
}

impl Searchable for Reminder {
    fn search_fields(&self) -> [Option<&str>; 2] {
        [Some(&self.title), self.description.as_deref()]
    }
}

impl Searchable for Habit {
    fn search_fields(&self) -> [Option<&str>; 2] {
        [Some(&self.name), self.description.as_deref()]
    }
}

impl Searchable for Project {
    fn search_fields(&self) -> [Option<&str>; 2] {
        [Some(&self.name), self.description.as_deref()]
    }
}

#[derive(Default)]
struct Params {
    status: Option<ReminderStatus>,
    tag_id: Option<i64>,
    reminder_type: Option<String>,
    date_from: Option<Date>,
    date_to: Option<Date>,
    search: Option<String>,
    sort_by: Option<SortBy>,
    sort_order: Option<SortOrder>,
}

impl Params {
    fn into_pairs(self) -> QueryParams {
        let mut pairs = QueryParams::new();
        if let Some(status) = self.status {
            pairs.push(("status", status.as_str().to_string()));
        }
        if let Some(tag_id) = self.tag_id {
            pairs.push(("tag_id", tag_id.to_string()));
        }
        if let Some(reminder_type) = self.reminder_type {
            pairs.push(("type", reminder_type));
        }
        if let Some(date) = self.date_from {
            pairs.push(("date_from", iso_date(date)));
        }
        if let Some(date) = self.date_to {
            pairs.push(("date_to", iso_date(date)));
        }
        if let Some(search) = self.search {
            pairs.push(("search", search));
        }
        if let Some(sort_by) = self.sort_by {
            pairs.push(("sort_by", sort_by.as_str().to_string()));
        }
        if let Some(sort_order) = self.sort_order {
            pairs.push(("sort_order", sort_order.as_str().to_string()));
        }
        pairs
    }
}
