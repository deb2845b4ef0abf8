//! Core value types and the view provider contract.
//!
//! A *view* is an externally supplied computation: it produces data from a
//! `(namespace, parameters)` pair and decides whether a batch of change
//! hints is relevant to it. The engine never interprets view data or hint
//! payloads; it only hashes data for change suppression and matches hints
//! structurally for deduplication.

use std::fmt;

use crate::error::BoxError;

// ---------------------------------------------------------------------------
// Scalar
// ---------------------------------------------------------------------------

/// Plain value usable in view parameters and hint payloads.
///
/// Restricted to types with structural equality and hashing; floats are
/// deliberately absent since parameters and payloads serve as map keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scalar {
    /// UTF-8 string.
    Str(String),
    /// 64-bit signed integer.
    Int(i64),
    /// Boolean.
    Bool(bool),
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Str(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::Str(s)
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Int(v)
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::Bool(v)
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Str(s) => write!(f, "{s}"),
            Scalar::Int(v) => write!(f, "{v}"),
            Scalar::Bool(v) => write!(f, "{v}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Logical tenancy/partition tag scoping data access.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Namespace(pub String);

impl From<&str> for Namespace {
    fn from(s: &str) -> Self {
        Namespace(s.to_string())
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a registered view provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewId(pub String);

impl From<&str> for ViewId {
    fn from(s: &str) -> Self {
        ViewId(s.to_string())
    }
}

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind tag carried by a [`Hint`] (e.g. which storage layer changed).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HintKind(pub String);

impl From<&str> for HintKind {
    fn from(s: &str) -> Self {
        HintKind(s.to_string())
    }
}

impl fmt::Display for HintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// ViewSignature
// ---------------------------------------------------------------------------

/// Identity of one concrete view instantiation.
///
/// Two signatures are equal iff namespace, view id, and the full parameter
/// sequence are structurally equal. A signature may arrive at the API
/// boundary without a namespace; the engine resolves and stores namespaced
/// signatures internally (see the namespace callback on the config).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ViewSignature {
    /// Namespace, absent until resolved for unnamespaced signatures.
    pub namespace: Option<Namespace>,
    /// Target view.
    pub view_id: ViewId,
    /// Ordered view parameters.
    pub parameters: Vec<Scalar>,
}

impl ViewSignature {
    /// Creates an unnamespaced signature.
    #[must_use]
    pub fn new(view_id: impl Into<ViewId>, parameters: Vec<Scalar>) -> Self {
        Self {
            namespace: None,
            view_id: view_id.into(),
            parameters,
        }
    }

    /// Creates a namespaced signature.
    #[must_use]
    pub fn with_namespace(
        namespace: impl Into<Namespace>,
        view_id: impl Into<ViewId>,
        parameters: Vec<Scalar>,
    ) -> Self {
        Self {
            namespace: Some(namespace.into()),
            view_id: view_id.into(),
            parameters,
        }
    }
}

impl fmt::Display for ViewSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{ns}/{}", self.view_id)?,
            None => write!(f, "{}", self.view_id)?,
        }
        if !self.parameters.is_empty() {
            write!(f, "[")?;
            for (i, p) in self.parameters.iter().enumerate() {
                if i > 0 {
                    write!(f, ",")?;
                }
                write!(f, "{p}")?;
            }
            write!(f, "]")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Hint
// ---------------------------------------------------------------------------

/// Change notification: "something changed in region `payload` of kind
/// `kind` within `namespace`".
///
/// Hints are opaque to the engine; only views interpret them through
/// [`View::relevant`]. They compare structurally and are deduplicated on
/// insertion into the pending set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Hint {
    /// Namespace the change occurred in, if scoped.
    pub namespace: Option<Namespace>,
    /// Opaque region description.
    pub payload: Vec<Scalar>,
    /// Kind tag.
    pub kind: HintKind,
}

impl Hint {
    /// Creates a namespaced hint.
    #[must_use]
    pub fn new(
        namespace: impl Into<Namespace>,
        payload: Vec<Scalar>,
        kind: impl Into<HintKind>,
    ) -> Self {
        Self {
            namespace: Some(namespace.into()),
            payload,
            kind: kind.into(),
        }
    }

    /// Creates a hint without a namespace.
    #[must_use]
    pub fn global(payload: Vec<Scalar>, kind: impl Into<HintKind>) -> Self {
        Self {
            namespace: None,
            payload,
            kind: kind.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// ViewUpdate
// ---------------------------------------------------------------------------

/// Payload delivered to the send callback: the namespace-stripped signature
/// plus freshly computed view data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewUpdate<D> {
    /// Target view.
    pub view_id: ViewId,
    /// Ordered view parameters.
    pub parameters: Vec<Scalar>,
    /// Computed view data.
    pub data: D,
}

// ---------------------------------------------------------------------------
// View
// ---------------------------------------------------------------------------

/// A view provider: an external capability producing data and judging hint
/// relevance.
///
/// Both methods are called concurrently from engine threads and must be
/// thread-safe. `data` runs on refresh workers and on the per-subscribe
/// initial-refresh thread and may block; `relevant` runs on the watcher
/// thread (or the caller thread under the immediate hint policy) and must be
/// pure and cheap with respect to its inputs.
pub trait View<D>: Send + Sync {
    /// Returns the identifier this provider registers under.
    fn id(&self) -> ViewId;

    /// Computes the current data for one view instantiation.
    ///
    /// # Errors
    ///
    /// Provider failures are logged by the engine and never propagate past
    /// the refresh that observed them.
    fn data(&self, namespace: Option<&Namespace>, parameters: &[Scalar]) -> Result<D, BoxError>;

    /// Returns whether any of the given hints invalidates this view
    /// instantiation.
    ///
    /// # Errors
    ///
    /// Failures are logged per signature; the relevance pass continues with
    /// the remaining signatures.
    fn relevant(
        &self,
        namespace: Option<&Namespace>,
        parameters: &[Scalar],
        hints: &[Hint],
    ) -> Result<bool, BoxError>;
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use fxhash::FxHashSet;

    #[test]
    fn test_sig_structural_equality() {
        let a = ViewSignature::with_namespace("a", "foo", vec![Scalar::from(1)]);
        let b = ViewSignature::with_namespace("a", "foo", vec![Scalar::from(1)]);
        let c = ViewSignature::with_namespace("b", "foo", vec![Scalar::from(1)]);
        let d = ViewSignature::with_namespace("a", "foo", vec![Scalar::from(2)]);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn test_sig_namespaced_vs_unnamespaced() {
        let bare = ViewSignature::new("foo", vec![]);
        let ns = ViewSignature::with_namespace("a", "foo", vec![]);
        assert_ne!(bare, ns);
        assert!(bare.namespace.is_none());
    }

    #[test]
    fn test_sig_hashable() {
        let mut set = FxHashSet::default();
        set.insert(ViewSignature::with_namespace("a", "foo", vec![]));
        set.insert(ViewSignature::with_namespace("a", "foo", vec![]));
        set.insert(ViewSignature::with_namespace("a", "bar", vec![]));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_hint_dedup_in_set() {
        let mut set = FxHashSet::default();
        set.insert(Hint::new("a", vec![Scalar::from("foo")], "memory"));
        set.insert(Hint::new("a", vec![Scalar::from("foo")], "memory"));
        set.insert(Hint::new("b", vec![Scalar::from("foo")], "memory"));
        set.insert(Hint::new("a", vec![Scalar::from("foo")], "sql"));
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_scalar_from_impls() {
        assert_eq!(Scalar::from("x"), Scalar::Str("x".to_string()));
        assert_eq!(Scalar::from(7), Scalar::Int(7));
        assert_eq!(Scalar::from(true), Scalar::Bool(true));
    }

    #[test]
    fn test_sig_display() {
        let sig = ViewSignature::with_namespace("a", "foo", vec![Scalar::from(1), "x".into()]);
        assert_eq!(format!("{sig}"), "a/foo[1,x]");
        let bare = ViewSignature::new("bar", vec![]);
        assert_eq!(format!("{bare}"), "bar");
    }
}
