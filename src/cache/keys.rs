//! Cache key definitions.
//!
//! A [`CacheKey`] is the ordered tuple `(domain, scope, params)`. Keys are
//! hierarchical: a [`KeyPrefix`] leaves trailing components unspecified and
//! matches every key that agrees on the components it does specify.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use time::Date;
use time::macros::format_description;

/// Resource domain a cached query belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Domain {
    Habits,
    Reminders,
    Projects,
    Tags,
}

impl Domain {
    pub fn as_str(self) -> &'static str {
        match self {
            Domain::Habits => "habits",
            Domain::Reminders => "reminders",
            Domain::Projects => "projects",
            Domain::Tags => "tags",
        }
    }
}

/// Shape of the cached query inside a domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scope {
    /// Paged list, params = hash of the canonical query.
    List,
    /// Single entity, params = entity id.
    Detail,
    /// Habits due on a date, params = ISO date.
    ForDate,
    /// Aggregates; params = entity id for per-project stats.
    Stats,
    /// Habits grouped by tag.
    Grouped,
    Upcoming,
    Overdue,
}

impl Scope {
    pub fn as_str(self) -> &'static str {
        match self {
            Scope::List => "list",
            Scope::Detail => "detail",
            Scope::ForDate => "forDate",
            Scope::Stats => "stats",
            Scope::Grouped => "grouped",
            Scope::Upcoming => "upcoming",
            Scope::Overdue => "overdue",
        }
    }
}

/// Identifies one cached query result.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    pub domain: Domain,
    pub scope: Scope,
    pub params: Option<String>,
}

impl CacheKey {
    pub fn new(domain: Domain, scope: Scope) -> Self {
        Self {
            domain,
            scope,
            params: None,
        }
    }

    pub fn with_params(domain: Domain, scope: Scope, params: impl Into<String>) -> Self {
        Self {
            domain,
            scope,
            params: Some(params.into()),
        }
    }

    pub fn list<K: AsRef<str>, V: AsRef<str>>(domain: Domain, query: &[(K, V)]) -> Self {
        Self::with_params(domain, Scope::List, format!("{:016x}", hash_query(query)))
    }

    pub fn detail(domain: Domain, id: i64) -> Self {
        Self::with_params(domain, Scope::Detail, id.to_string())
    }

    pub fn for_date(domain: Domain, date: Date) -> Self {
        Self::with_params(domain, Scope::ForDate, iso_date(date))
    }

    /// Prefix matching exactly this key (and nothing else).
    pub fn as_prefix(&self) -> KeyPrefix {
        KeyPrefix {
            domain: self.domain,
            scope: Some(self.scope),
            params: self.params.clone(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.domain.as_str(), self.scope.as_str())?;
        if let Some(params) = &self.params {
            write!(f, "[{params}]")?;
        }
        Ok(())
    }
}

/// Leading components of a [`CacheKey`], used for invalidation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyPrefix {
    pub domain: Domain,
    pub scope: Option<Scope>,
    pub params: Option<String>,
}

impl KeyPrefix {
    pub fn domain(domain: Domain) -> Self {
        Self {
            domain,
            scope: None,
            params: None,
        }
    }

    pub fn scope(domain: Domain, scope: Scope) -> Self {
        Self {
            domain,
            scope: Some(scope),
            params: None,
        }
    }

    pub fn matches(&self, key: &CacheKey) -> bool {
        if self.domain != key.domain {
            return false;
        }
        match self.scope {
            None => true,
            Some(scope) if scope != key.scope => false,
            Some(_) => match &self.params {
                None => true,
                Some(params) => key.params.as_ref() == Some(params),
            },
        }
    }
}

impl From<CacheKey> for KeyPrefix {
    fn from(key: CacheKey) -> Self {
        Self {
            domain: key.domain,
            scope: Some(key.scope),
            params: key.params,
        }
    }
}

impl fmt::Display for KeyPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.domain.as_str())?;
        if let Some(scope) = self.scope {
            write!(f, ".{}", scope.as_str())?;
            if let Some(params) = &self.params {
                write!(f, "[{params}]")?;
            }
        }
        Ok(())
    }
}

// ============================================================================
// Hash Utilities
// ============================================================================

/// Hash canonical query pairs; pair order is significant.
pub fn hash_query<K: AsRef<str>, V: AsRef<str>>(query: &[(K, V)]) -> u64 {
    let mut hasher = DefaultHasher::new();
    for (name, value) in query {
        name.as_ref().hash(&mut hasher);
        value.as_ref().hash(&mut hasher);
    }
    hasher.finish()
}

/// Render a date as `YYYY-MM-DD`.
pub fn iso_date(date: Date) -> String {
    date.format(format_description!("[year]-[month]-[day]"))
        .unwrap_or_else(|_| date.to_string())
}
