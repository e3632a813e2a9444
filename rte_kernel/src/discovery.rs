//! RTE Kernel: host discovery
//!
//! Bounded, non-recursive search for the surface a host exposes to
//! content. Walks from the content's context outward through parents,
//! then through the opener chain of the topmost context. Every visited
//! context costs one probe; the walk gives up when the budget is spent.

use crate::dialect::Dialect;

/// Default probe budget.
pub const DEFAULT_MAX_DEPTH: usize = 500;

/// Preference used when the caller has none.
pub const DEFAULT_PREFERENCE: [Dialect; 2] = [Dialect::Current, Dialect::Legacy];

/// A browsing context that may expose named surfaces.
///
/// `parent` must return `None` at the top of a chain; a context that
/// reports itself as its own parent is still bounded by the probe budget.
pub trait ExecutionContext: Sized {
    type Surface;

    fn lookup(&self, name: &str) -> Option<Self::Surface>;
    fn parent(&self) -> Option<Self>;

    /// Context that opened this one, if it is a top-level window.
    fn opener(&self) -> Option<Self> {
        None
    }
}

/// A surface found by [`locate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located<S> {
    pub surface: S,
    pub dialect: Dialect,
    /// Hops from the starting context.
    pub depth: usize,
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

/// Find the nearest exposed surface, trying `preference` in order at each
/// context. Returns `None` if nothing is found within `max_depth` probes.
pub fn locate<C: ExecutionContext>(
    start: C,
    max_depth: usize,
    preference: &[Dialect],
) -> Option<Located<C::Surface>> {
    let mut current = Some(start);
    let mut probes = 0usize;

    while let Some(context) = current.take() {
        if probes >= max_depth {
            tracing::debug!(probes, "discovery budget exhausted");
            return None;
        }
        let depth = probes;
        probes += 1;

        for dialect in preference {
            if let Some(surface) = context.lookup(dialect.api_name()) {
                tracing::debug!(depth, ?dialect, "surface located");
                return Some(Located {
                    surface,
                    dialect: *dialect,
                    depth,
                });
            }
        }

        current = context.parent().or_else(|| context.opener());
    }

    None
}

/// [`locate`] with the default budget and preference.
pub fn locate_default<C: ExecutionContext>(start: C) -> Option<Located<C::Surface>> {
    locate(start, DEFAULT_MAX_DEPTH, &DEFAULT_PREFERENCE)
}
