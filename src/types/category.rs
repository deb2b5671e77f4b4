use serde::Serialize;

/// An operation whose path ends in the template postfix defines the member
/// set shared by every operation of its category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryTemplate {
    category: String,
}

impl CategoryTemplate {
    /// Returns the template described by `path`, if it is one.
    #[must_use]
    pub fn from_path(path: &str, postfix: &str) -> Option<Self> {
        if postfix.is_empty() {
            return None;
        }
        path.strip_suffix(postfix).map(|category| Self {
            category: category.to_string(),
        })
    }

    #[must_use]
    pub fn is_template(path: &str, postfix: &str) -> bool {
        Self::from_path(path, postfix).is_some()
    }

    /// Path of the template operation for `category`.
    #[must_use]
    pub fn path_for(category: &str, postfix: &str) -> String {
        format!("{category}{postfix}")
    }

    #[must_use]
    pub fn category(&self) -> &str {
        &self.category
    }
}
