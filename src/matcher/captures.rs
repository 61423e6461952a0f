//! Placeholder bindings collected while matching one candidate node

use std::collections::BTreeMap;

/// Bindings for one match attempt
///
/// The first binding of a name wins; any later binding of the same name must
/// capture exactly the same text or the attempt fails.
#[derive(Debug, Clone, Default)]
pub(crate) struct Captures {
    inner: BTreeMap<String, String>,
}

impl Captures {
    pub(crate) fn bind(&mut self, name: &str, value: &str) -> bool {
        match self.inner.get(name) {
            Some(existing) => existing == value,
            None => {
                self.inner.insert(name.to_owned(), value.to_owned());
                true
            }
        }
    }

    pub(crate) fn into_inner(self) -> BTreeMap<String, String> {
        self.inner
    }
}
