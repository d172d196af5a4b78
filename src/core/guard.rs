//! Guard predicates for controlling choice transitions.
//!
//! Guards are boolean functions evaluated when a choice state picks its
//! outgoing transition. A transition passes when every one of its guards
//! passes; a transition without guards always passes.

/// Predicate that determines if a transition can execute.
///
/// Guards capture whatever application state they need. They run on the
/// thread that owns the statechart, so they may capture `Rc` values.
///
/// # Example
///
/// ```rust
/// use statechart::Guard;
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let credits = Rc::new(Cell::new(0));
/// let source = credits.clone();
/// let has_credits = Guard::new(move || source.get() > 0);
///
/// assert!(!has_credits.check());
/// credits.set(3);
/// assert!(has_credits.check());
/// ```
pub struct Guard {
    predicate: Box<dyn Fn() -> bool>,
}

impl Guard {
    /// Create a guard from a predicate function.
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn() -> bool + 'static,
    {
        Guard {
            predicate: Box::new(predicate),
        }
    }

    /// Evaluate the predicate.
    pub fn check(&self) -> bool {
        (self.predicate)()
    }
}

impl std::fmt::Debug for Guard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Guard")
    }
}
