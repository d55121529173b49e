//! Per-resource allowlists of queryable fields.

use strsim::levenshtein;

/// Maximum edit distance for a "did you mean" suggestion.
const MAX_SUGGESTION_DISTANCE: usize = 3;

/// A static set of field paths that callers may filter and sort on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSet {
    name: &'static str,
    fields: &'static [&'static str],
}

/// Queryable group fields.
pub const GROUP_FIELDS: FieldSet = FieldSet::new(
    "group",
    &[
        "id",
        "name",
        "description",
        "tenant",
        "leader_id",
        "members",
        "is_active",
        "created_time",
        "number_of_user",
    ],
);

/// Queryable user fields.
pub const USER_FIELDS: FieldSet = FieldSet::new(
    "user",
    &[
        "id",
        "email",
        "fullname",
        "phone",
        "tenant",
        "department",
        "position",
        "roles",
        "is_active",
        "created_time",
    ],
);

impl FieldSet {
    /// Creates a field set.
    pub const fn new(name: &'static str, fields: &'static [&'static str]) -> Self {
        Self { name, fields }
    }

    /// Returns the resource name this set describes.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the allowed field paths.
    pub fn fields(&self) -> &'static [&'static str] {
        self.fields
    }

    /// Returns true if `field` is queryable.
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains(&field)
    }

    /// Finds the closest allowed field to a rejected one.
    pub fn suggest(&self, field: &str) -> Option<String> {
        let lower = field.to_lowercase();
        let (best, distance) = self
            .fields
            .iter()
            .map(|candidate| (*candidate, levenshtein(&lower, candidate)))
            .min_by_key(|(_, d)| *d)?;

        if distance > 0 && distance <= MAX_SUGGESTION_DISTANCE {
            Some(best.to_string())
        } else {
            None
        }
    }
}
