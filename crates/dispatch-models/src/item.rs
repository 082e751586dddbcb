//! The capability set the heap needs from a queued value.

use std::sync::Arc;

/// A value that can be queued in a `PriorityHeap`.
///
/// The heap reads exactly these three accessors and never looks at the
/// payload. All three must stay constant while the item is enqueued;
/// changing them in place breaks both the heap order and the existence
/// index.
pub trait Item {
    /// Globally unique identity of the item.
    fn id(&self) -> &str;

    /// Ordering key. Lower values are served first.
    fn priority(&self) -> i64;

    /// Non-unique tag used for bulk eviction.
    fn group_id(&self) -> &str;
}

impl<T: Item + ?Sized> Item for Box<T> {
    fn id(&self) -> &str {
        (**self).id()
    }

    fn priority(&self) -> i64 {
        (**self).priority()
    }

    fn group_id(&self) -> &str {
        (**self).group_id()
    }
}

impl<T: Item + ?Sized> Item for Arc<T> {
    fn id(&self) -> &str {
        (**self).id()
    }

    fn priority(&self) -> i64 {
        (**self).priority()
    }

    fn group_id(&self) -> &str {
        (**self).group_id()
    }
}
