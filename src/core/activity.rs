//! Fan-in completion tree used by wait states.
//!
//! A [`WaitActivity`] is complete when it has been completed by its owner
//! and every child created with [`WaitActivity::split`] is complete as well.
//! The completion callback of a node fires exactly once, the first time its
//! whole subtree becomes complete.

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ACTIVITY_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier of a [`WaitActivity`] node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActivityId(u64);

impl ActivityId {
    fn next() -> Self {
        Self(NEXT_ACTIVITY_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

type CompletionCallback = Box<dyn FnMut(ActivityId)>;

struct Node {
    id: ActivityId,
    completed: bool,
    reported: bool,
    children: Vec<WaitActivity>,
    parent: Weak<RefCell<Node>>,
    on_complete: Option<CompletionCallback>,
}

/// Handle to a node of a wait-activity tree.
///
/// Handles are cheap to clone and may be kept by application code to
/// complete the activity later, from any callback running on the thread
/// that owns the statechart.
///
/// # Example
///
/// ```rust
/// use statechart::WaitActivity;
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let fired = Rc::new(Cell::new(0));
/// let counter = fired.clone();
/// let root = WaitActivity::new(move |_| counter.set(counter.get() + 1));
///
/// let download = root.split();
/// let decode = root.split();
///
/// assert!(!root.complete()); // children still outstanding
/// download.complete();
/// decode.complete();
///
/// assert!(root.is_completed());
/// assert_eq!(fired.get(), 1);
/// ```
#[derive(Clone)]
pub struct WaitActivity {
    node: Rc<RefCell<Node>>,
}

impl WaitActivity {
    /// Create a root activity whose `on_complete` fires once the whole
    /// tree is complete.
    pub fn new(on_complete: impl FnMut(ActivityId) + 'static) -> Self {
        Self::with_parts(Weak::new(), Some(Box::new(on_complete)))
    }

    fn with_parts(parent: Weak<RefCell<Node>>, on_complete: Option<CompletionCallback>) -> Self {
        Self {
            node: Rc::new(RefCell::new(Node {
                id: ActivityId::next(),
                completed: false,
                reported: false,
                children: Vec::new(),
                parent,
                on_complete,
            })),
        }
    }

    pub fn id(&self) -> ActivityId {
        self.node.borrow().id
    }

    /// True when this node and all of its children are complete.
    pub fn is_completed(&self) -> bool {
        let node = self.node.borrow();
        node.reported || (node.completed && node.children.iter().all(WaitActivity::is_completed))
    }

    /// Mark this node as completed by its owner.
    ///
    /// Returns `true` if the node and all its children are now complete.
    /// Calling this again after the subtree reported is a no-op.
    pub fn complete(&self) -> bool {
        {
            let mut node = self.node.borrow_mut();
            if node.reported {
                return true;
            }
            node.completed = true;
        }

        if !self.children_completed() {
            return false;
        }

        self.report();
        true
    }

    /// Create a child activity that must also complete before this one does.
    ///
    /// Splitting a node that already reported completion returns a detached
    /// activity that has no influence on this tree.
    pub fn split(&self) -> WaitActivity {
        let mut node = self.node.borrow_mut();
        if node.reported {
            return Self::with_parts(Weak::new(), None);
        }

        let child = Self::with_parts(Rc::downgrade(&self.node), None);
        node.children.push(child.clone());
        child
    }

    /// Mark the whole subtree complete without firing any callback.
    pub(crate) fn force_complete(&self) {
        let children = {
            let mut node = self.node.borrow_mut();
            node.completed = true;
            node.reported = true;
            node.on_complete = None;
            std::mem::take(&mut node.children)
        };

        for child in children {
            child.force_complete();
        }
    }

    fn children_completed(&self) -> bool {
        self.node
            .borrow()
            .children
            .iter()
            .all(WaitActivity::is_completed)
    }

    fn report(&self) {
        let (id, callback, parent) = {
            let mut node = self.node.borrow_mut();
            if node.reported {
                return;
            }
            node.reported = true;
            node.children.clear();
            (node.id, node.on_complete.take(), node.parent.upgrade())
        };

        if let Some(mut callback) = callback {
            callback(id);
        }

        if let Some(parent) = parent {
            let parent = WaitActivity { node: parent };
            if parent.is_completed() {
                parent.report();
            }
        }
    }
}

impl fmt::Debug for WaitActivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let node = self.node.borrow();
        f.debug_struct("WaitActivity")
            .field("id", &node.id)
            .field("completed", &node.completed)
            .field("reported", &node.reported)
            .field("children", &node.children.len())
            .finish()
    }
}
