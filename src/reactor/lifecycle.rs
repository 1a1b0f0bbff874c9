//! State/lifecycle callbacks.
//!
//! Thirteen named hook points, covering every stage from library init
//! through process exit. Each hook has its own lock; firing copies the
//! registered list out from under the lock first, so a callback may freely
//! add/remove entries for *other* hooks without deadlocking. Mutating the
//! list a hook belongs to, from within one of that hook's own callbacks,
//! has no effect on the in-flight firing.

use std::sync::Arc;

use crate::sync::Spinlock;

/// One lifecycle hook point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hook {
    OnInitialize,
    PreStart,
    BeforeFork,
    AfterFork,
    InChild,
    InMaster,
    OnStart,
    OnIdle,
    OnShutdown,
    OnFinish,
    OnParentCrush,
    OnChildCrush,
    AtExit,
}

const HOOK_COUNT: usize = 13;
const ALL_HOOKS: [Hook; HOOK_COUNT] = [
    Hook::OnInitialize,
    Hook::PreStart,
    Hook::BeforeFork,
    Hook::AfterFork,
    Hook::InChild,
    Hook::InMaster,
    Hook::OnStart,
    Hook::OnIdle,
    Hook::OnShutdown,
    Hook::OnFinish,
    Hook::OnParentCrush,
    Hook::OnChildCrush,
    Hook::AtExit,
];

impl Hook {
    fn index(self) -> usize {
        self as usize
    }

    /// Startup-family hooks fire LIFO (most recently registered first);
    /// everything else fires in insertion order.
    fn is_startup_family(self) -> bool {
        matches!(
            self,
            Hook::PreStart | Hook::BeforeFork | Hook::AfterFork | Hook::InChild | Hook::InMaster | Hook::OnStart
        )
    }
}

type Callback = Arc<dyn Fn() + Send + Sync>;

/// The full set of lifecycle callback lists, one per [`Hook`].
pub struct StateCallbacks {
    hooks: Vec<Spinlock<Vec<Callback>>>,
}

impl std::fmt::Debug for StateCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: Vec<usize> = self.hooks.iter().map(|h| h.lock().len()).collect();
        f.debug_struct("StateCallbacks").field("counts", &counts).finish()
    }
}

impl Default for StateCallbacks {
    fn default() -> StateCallbacks {
        StateCallbacks::new()
    }
}

impl StateCallbacks {
    pub fn new() -> StateCallbacks {
        StateCallbacks {
            hooks: ALL_HOOKS.iter().map(|_| Spinlock::new(Vec::new())).collect(),
        }
    }

    /// Registers `callback` to run whenever `hook` fires.
    pub fn add<F>(&self, hook: Hook, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.hooks[hook.index()].lock().push(Arc::new(callback));
    }

    /// Removes every callback registered for `hook`.
    pub fn clear(&self, hook: Hook) {
        self.hooks[hook.index()].lock().clear();
    }

    /// Fires every callback registered for `hook`, in the order dictated by
    /// §4.F.5 (LIFO for the startup family, insertion order otherwise).
    pub fn force(&self, hook: Hook) {
        let mut snapshot: Vec<Callback> = self.hooks[hook.index()].lock().clone();
        if hook.is_startup_family() {
            snapshot.reverse();
        }
        for callback in snapshot {
            callback();
        }
    }
}
