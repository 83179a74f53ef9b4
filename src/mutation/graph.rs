//! Invalidation graph.
//!
//! Maps every mutation kind to the cache keys it makes stale and the entries
//! it writes or removes directly. All dependency knowledge lives in
//! [`descriptor`].

use std::fmt;

use time::Date;

use crate::cache::{CacheKey, Domain, KeyPrefix, Scope};

/// Which habit mark endpoint was called.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HabitMark {
    Done,
    Skip,
    Undo,
}

impl HabitMark {
    pub fn as_str(self) -> &'static str {
        match self {
            HabitMark::Done => "done",
            HabitMark::Skip => "skip",
            HabitMark::Undo => "undo",
        }
    }
}

/// Types of mutations that change server state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationKind {
    // Habits
    HabitCreated,
    HabitUpdated { id: i64 },
    HabitDeleted { id: i64 },
    /// Done, skip or undo for one day.
    HabitMarked { id: i64, date: Date, mark: HabitMark },
    /// Tags attached to or detached from a habit.
    HabitTagsChanged { id: i64 },

    // Reminders
    ReminderCreated,
    ReminderUpdated { id: i64 },
    ReminderSnoozed { id: i64 },
    ReminderCompleted { id: i64 },
    ReminderDeleted { id: i64 },

    // Projects
    ProjectCreated,
    ProjectUpdated { id: i64 },
    ProjectDeleted { id: i64 },
    ProjectImageAdded { project_id: i64 },
    ProjectImageRemoved { project_id: i64 },
    ProjectImagePrimarySet { project_id: i64 },

    // Tags
    TagCreated,
    TagUpdated { id: i64 },
    TagDeleted { id: i64 },
}

impl MutationKind {
    pub fn domain(&self) -> Domain {
        match self {
            MutationKind::HabitCreated
            | MutationKind::HabitUpdated { .. }
            | MutationKind::HabitDeleted { .. }
            | MutationKind::HabitMarked { .. }
            | MutationKind::HabitTagsChanged { .. } => Domain::Habits,
            MutationKind::ReminderCreated
            | MutationKind::ReminderUpdated { .. }
            | MutationKind::ReminderSnoozed { .. }
            | MutationKind::ReminderCompleted { .. }
            | MutationKind::ReminderDeleted { .. } => Domain::Reminders,
            MutationKind::ProjectCreated
            | MutationKind::ProjectUpdated { .. }
            | MutationKind::ProjectDeleted { .. }
            | MutationKind::ProjectImageAdded { .. }
            | MutationKind::ProjectImageRemoved { .. }
            | MutationKind::ProjectImagePrimarySet { .. } => Domain::Projects,
            MutationKind::TagCreated
            | MutationKind::TagUpdated { .. }
            | MutationKind::TagDeleted { .. } => Domain::Tags,
        }
    }

    /// Short label used in logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            MutationKind::HabitCreated => "habit_create",
            MutationKind::HabitUpdated { .. } => "habit_update",
            MutationKind::HabitDeleted { .. } => "habit_delete",
            MutationKind::HabitMarked { .. } => "habit_mark",
            MutationKind::HabitTagsChanged { .. } => "habit_tags",
            MutationKind::ReminderCreated => "reminder_create",
            MutationKind::ReminderUpdated { .. } => "reminder_update",
            MutationKind::ReminderSnoozed { .. } => "reminder_snooze",
            MutationKind::ReminderCompleted { .. } => "reminder_complete",
            MutationKind::ReminderDeleted { .. } => "reminder_delete",
            MutationKind::ProjectCreated => "project_create",
            MutationKind::ProjectUpdated { .. } => "project_update",
            MutationKind::ProjectDeleted { .. } => "project_delete",
            MutationKind::ProjectImageAdded { .. } => "project_image_add",
            MutationKind::ProjectImageRemoved { .. } => "project_image_remove",
            MutationKind::ProjectImagePrimarySet { .. } => "project_image_primary",
            MutationKind::TagCreated => "tag_create",
            MutationKind::TagUpdated { .. } => "tag_update",
            MutationKind::TagDeleted { .. } => "tag_delete",
        }
    }
}

/// Cache change applied from a successful mutation response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectWrite {
    /// Store the response `data` under this key.
    Set(CacheKey),
    /// Store the response `data` under the detail key of the id it carries.
    SetCreated(Domain),
    /// Drop the entry.
    Remove(CacheKey),
}

/// Everything a mutation changes in the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationDescriptor {
    pub kind: MutationKind,
    pub invalidates: Vec<KeyPrefix>,
    pub direct_writes: Vec<DirectWrite>,
}

impl fmt::Display for MutationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MutationDescriptor {{ kind: {}, invalidates: {}, direct_writes: {} }}",
            self.kind.label(),
            self.invalidates.len(),
            self.direct_writes.len(),
        )
    }
}

/// Resolve the cache effects of `kind`.
///
/// `today` is the local calendar date used for the habits-for-today entry.
pub fn descriptor(kind: MutationKind, today: Date) -> MutationDescriptor {
    let (invalidates, direct_writes) = match &kind {
        MutationKind::HabitCreated => (habit_collections(today), vec![]),
        MutationKind::HabitUpdated { id } => (
            habit_collections(today),
            vec![DirectWrite::Set(CacheKey::detail(Domain::Habits, *id))],
        ),
        MutationKind::HabitDeleted { id } => (
            habit_collections(today),
            vec![DirectWrite::Remove(CacheKey::detail(Domain::Habits, *id))],
        ),
        MutationKind::HabitMarked { id, date, .. } => (
            vec![
                CacheKey::for_date(Domain::Habits, *date).as_prefix(),
                CacheKey::detail(Domain::Habits, *id).as_prefix(),
                KeyPrefix::scope(Domain::Habits, Scope::Stats),
            ],
            vec![],
        ),
        MutationKind::HabitTagsChanged { id } => (
            vec![
                CacheKey::detail(Domain::Habits, *id).as_prefix(),
                KeyPrefix::scope(Domain::Habits, Scope::Grouped),
                KeyPrefix::scope(Domain::Habits, Scope::List),
            ],
            vec![],
        ),

        MutationKind::ReminderCreated => (
            vec![
                KeyPrefix::scope(Domain::Reminders, Scope::List),
                KeyPrefix::scope(Domain::Reminders, Scope::Upcoming),
                KeyPrefix::scope(Domain::Reminders, Scope::Stats),
            ],
            vec![DirectWrite::SetCreated(Domain::Reminders)],
        ),
        MutationKind::ReminderUpdated { id }
        | MutationKind::ReminderSnoozed { id }
        | MutationKind::ReminderCompleted { id } => (
            reminder_collections(),
            vec![DirectWrite::Set(CacheKey::detail(Domain::Reminders, *id))],
        ),
        MutationKind::ReminderDeleted { id } => (
            reminder_collections(),
            vec![DirectWrite::Remove(CacheKey::detail(Domain::Reminders, *id))],
        ),

        MutationKind::ProjectCreated => (
            vec![KeyPrefix::scope(Domain::Projects, Scope::List)],
            vec![DirectWrite::SetCreated(Domain::Projects)],
        ),
        MutationKind::ProjectUpdated { id } => (
            vec![KeyPrefix::scope(Domain::Projects, Scope::List)],
            vec![DirectWrite::Set(CacheKey::detail(Domain::Projects, *id))],
        ),
        MutationKind::ProjectDeleted { id } => (
            vec![KeyPrefix::scope(Domain::Projects, Scope::List)],
            vec![
                DirectWrite::Remove(CacheKey::detail(Domain::Projects, *id)),
                DirectWrite::Remove(project_stats_key(*id)),
            ],
        ),
        MutationKind::ProjectImageAdded { project_id }
        | MutationKind::ProjectImageRemoved { project_id } => (
            vec![CacheKey::detail(Domain::Projects, *project_id).as_prefix()],
            vec![],
        ),
        MutationKind::ProjectImagePrimarySet { project_id } => (
            vec![
                CacheKey::detail(Domain::Projects, *project_id).as_prefix(),
                KeyPrefix::scope(Domain::Projects, Scope::List),
            ],
            vec![],
        ),

        MutationKind::TagCreated => (tag_collections(), vec![DirectWrite::SetCreated(Domain::Tags)]),
        MutationKind::TagUpdated { id } => (
            tag_collections(),
            vec![DirectWrite::Set(CacheKey::detail(Domain::Tags, *id))],
        ),
        MutationKind::TagDeleted { id } => (
            tag_collections(),
            vec![DirectWrite::Remove(CacheKey::detail(Domain::Tags, *id))],
        ),
    };

    MutationDescriptor {
        kind,
        invalidates,
        direct_writes,
    }
}

/// Per-project statistics key.
pub fn project_stats_key(project_id: i64) -> CacheKey {
    CacheKey::with_params(Domain::Projects, Scope::Stats, project_id.to_string())
}

fn habit_collections(today: Date) -> Vec<KeyPrefix> {
    vec![
        KeyPrefix::scope(Domain::Habits, Scope::List),
        KeyPrefix::scope(Domain::Habits, Scope::Stats),
        KeyPrefix::scope(Domain::Habits, Scope::Grouped),
        CacheKey::for_date(Domain::Habits, today).as_prefix(),
    ]
}

fn reminder_collections() -> Vec<KeyPrefix> {
    vec![
        KeyPrefix::scope(Domain::Reminders, Scope::List),
        KeyPrefix::scope(Domain::Reminders, Scope::Upcoming),
        KeyPrefix::scope(Domain::Reminders, Scope::Overdue),
        KeyPrefix::scope(Domain::Reminders, Scope::Stats),
    ]
}

// Habit groups embed tag names and colours.
fn tag_collections() -> Vec<KeyPrefix> {
    vec![
        KeyPrefix::scope(Domain::Tags, Scope::List),
        KeyPrefix::scope(Domain::Habits, Scope::Grouped),
    ]
}
