//! View registry.
//!
//! Maps view ids to their providers. Entries are inserted or replaced in
//! place; readers observe either the old or the new provider, never a torn
//! value. The registry does not own view lifetime beyond the map entry.

use std::sync::Arc;

use fxhash::FxHashMap;
use parking_lot::RwLock;

use crate::view::{View, ViewId};

/// Registry of view providers, keyed by [`ViewId`].
pub struct ViewRegistry<D> {
    views: RwLock<FxHashMap<ViewId, Arc<dyn View<D>>>>,
}

impl<D> ViewRegistry<D> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            views: RwLock::new(FxHashMap::default()),
        }
    }

    /// Inserts or replaces providers by their [`View::id`].
    pub fn add_views(&self, views: impl IntoIterator<Item = Arc<dyn View<D>>>) {
        let mut map = self.views.write();
        for view in views {
            map.insert(view.id(), view);
        }
    }

    /// Returns the provider registered under `id`.
    #[must_use]
    pub fn get(&self, id: &ViewId) -> Option<Arc<dyn View<D>>> {
        self.views.read().get(id).cloned()
    }

    /// Returns the number of registered providers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.views.read().len()
    }

    /// Returns `true` if no providers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.views.read().is_empty()
    }

    /// Removes every provider.
    pub(crate) fn clear(&self) {
        self.views.write().clear();
    }
}

impl<D> Default for ViewRegistry<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D> std::fmt::Debug for ViewRegistry<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewRegistry")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoxError;
    use crate::view::{Hint, Namespace, Scalar};

    struct ConstView {
        id: &'static str,
        value: i64,
    }

    impl View<i64> for ConstView {
        fn id(&self) -> ViewId {
            self.id.into()
        }

        fn data(&self, _ns: Option<&Namespace>, _params: &[Scalar]) -> Result<i64, BoxError> {
            Ok(self.value)
        }

        fn relevant(
            &self,
            _ns: Option<&Namespace>,
            _params: &[Scalar],
            _hints: &[Hint],
        ) -> Result<bool, BoxError> {
            Ok(false)
        }
    }

    #[test]
    fn test_registry_add_and_get() {
        let reg: ViewRegistry<i64> = ViewRegistry::new();
        assert!(reg.is_empty());

        reg.add_views(vec![
            Arc::new(ConstView { id: "foo", value: 1 }) as Arc<dyn View<i64>>,
            Arc::new(ConstView { id: "bar", value: 2 }) as Arc<dyn View<i64>>,
        ]);
        assert_eq!(reg.len(), 2);

        let foo = reg.get(&"foo".into()).unwrap();
        assert_eq!(foo.data(None, &[]).unwrap(), 1);
        assert!(reg.get(&"baz".into()).is_none());
    }

    #[test]
    fn test_registry_replace_in_place() {
        let reg: ViewRegistry<i64> = ViewRegistry::new();
        reg.add_views(vec![
            Arc::new(ConstView { id: "foo", value: 1 }) as Arc<dyn View<i64>>
        ]);
        reg.add_views(vec![
            Arc::new(ConstView { id: "foo", value: 9 }) as Arc<dyn View<i64>>
        ]);

        assert_eq!(reg.len(), 1);
        assert_eq!(reg.get(&"foo".into()).unwrap().data(None, &[]).unwrap(), 9);
    }
}
