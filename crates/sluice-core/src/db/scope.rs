use crate::db::{
    model::AssertError,
    query::{Criteria, eq, in_list},
};

///
/// Scope
///
/// Named, reusable restriction that contributes a criteria to a
/// collection. Scopes merge only with scopes of the same type.
///

pub trait Scope {
    fn criteria(&self) -> Criteria;

    #[must_use]
    fn merge_with(&self, other: &Self) -> Self
    where
        Self: Sized;
}

///
/// Status
///
/// Publication-status scope over the `post_status` column. No values
/// selects everything, one value compares with `=`, several with `IN`.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Status {
    selected: Vec<&'static str>,
}

impl Status {
    pub const PUBLISH: &'static str = "publish";
    pub const FUTURE: &'static str = "future";
    pub const DRAFT: &'static str = "draft";
    pub const PENDING: &'static str = "pending";
    pub const PRIVATE: &'static str = "private";
    pub const TRASH: &'static str = "trash";
    pub const AUTO_DRAFT: &'static str = "auto-draft";
    pub const INHERIT: &'static str = "inherit";

    pub const KNOWN_VALUES: [&'static str; 8] = [
        Self::PUBLISH,
        Self::FUTURE,
        Self::DRAFT,
        Self::PENDING,
        Self::PRIVATE,
        Self::TRASH,
        Self::AUTO_DRAFT,
        Self::INHERIT,
    ];

    /// Column the scope filters on, resolved against the primary table.
    pub const FIELD: &'static str = "post_status";

    pub fn new<'a>(values: impl IntoIterator<Item = &'a str>) -> Result<Self, AssertError> {
        Self::default().add(values)
    }

    /// New scope with `values` appended; duplicates keep their first position.
    pub fn add<'a>(&self, values: impl IntoIterator<Item = &'a str>) -> Result<Self, AssertError> {
        let mut scope = self.clone();
        for value in values {
            let known = Self::KNOWN_VALUES
                .into_iter()
                .find(|known| *known == value)
                .ok_or_else(|| AssertError::InvalidField {
                    field: value.to_string(),
                    expected: "post status",
                })?;
            if !scope.selected.contains(&known) {
                scope.selected.push(known);
            }
        }

        Ok(scope)
    }

    #[must_use]
    pub fn selected(&self) -> &[&'static str] {
        &self.selected
    }
}

impl Scope for Status {
    fn criteria(&self) -> Criteria {
        match self.selected.as_slice() {
            [] => Criteria::null(),
            [single] => Criteria::create().set_where(eq(Self::FIELD, *single)),
            many => Criteria::create().set_where(in_list(Self::FIELD, many.iter().copied())),
        }
    }

    fn merge_with(&self, other: &Self) -> Self {
        let mut merged = self.clone();
        for value in &other.selected {
            if !merged.selected.contains(value) {
                merged.selected.push(*value);
            }
        }

        merged
    }
}
