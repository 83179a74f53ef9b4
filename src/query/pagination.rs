//! Page-number pagination helpers for paged list queries.

use std::collections::HashSet;

use dayboard_api_types::Pagination;
use serde::Serialize;
use serde_json::Value;

use crate::infra::error::TransportError;

/// Cursor of the page after `current_page`, or `None` on the last page.
pub fn next_cursor(current_page: u32, total_pages: u32) -> Option<u32> {
    (current_page < total_pages).then(|| current_page + 1)
}

/// One fetched page of a list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    pub items: Vec<Value>,
    pub page_cursor: u32,
    pub next_page_cursor: Option<u32>,
}

impl Page {
    /// Build a page from the `data` member of a list envelope.
    ///
    /// Items are read from `items_field`, falling back to `items`, or from
    /// `data` itself when the server answered with a bare array. A missing
    /// pagination block means the list has a single page.
    pub fn from_data(
        data: &Value,
        items_field: &str,
        requested: u32,
    ) -> Result<Self, TransportError> {
        let items = match data {
            Value::Array(items) => items.clone(),
            Value::Object(map) => match map.get(items_field).or_else(|| map.get("items")) {
                Some(Value::Array(items)) => items.clone(),
                Some(other) => {
                    return Err(TransportError::decode(format!(
                        "list field `{items_field}` is not an array: {other}"
                    )));
                }
                None => {
                    return Err(TransportError::decode(format!(
                        "list payload has no `{items_field}` or `items` field"
                    )));
                }
            },
            other => {
                return Err(TransportError::decode(format!(
                    "list payload is neither object nor array: {other}"
                )));
            }
        };

        let (page_cursor, next_page_cursor) = match Pagination::from_data(data) {
            Some(pagination) => (
                pagination.current_page,
                next_cursor(pagination.current_page, pagination.total_pages),
            ),
            None => (requested, None),
        };

        Ok(Self {
            items,
            page_cursor,
            next_page_cursor,
        })
    }
}

/// Pages of one list in fetch order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PageCollection {
    pages: Vec<Page>,
}

impl PageCollection {
    pub fn new(first: Page) -> Self {
        Self { pages: vec![first] }
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Cursor of the next page to request, if the server reported one.
    pub fn next_cursor(&self) -> Option<u32> {
        self.pages.last().and_then(|page| page.next_page_cursor)
    }

    /// Append a page, dropping items whose `id` already appeared earlier.
    pub fn append(&mut self, mut page: Page) {
        let seen: HashSet<String> = self.items().filter_map(item_id).collect();
        page.items
            .retain(|item| item_id(item).is_none_or(|id| !seen.contains(&id)));
        self.pages.push(page);
    }

    /// All items across pages, in fetch order.
    pub fn items(&self) -> impl Iterator<Item = &Value> {
        self.pages.iter().flat_map(|page| page.items.iter())
    }
}

fn item_id(item: &Value) -> Option<String> {
    item.get("id").map(Value::to_string)
}
