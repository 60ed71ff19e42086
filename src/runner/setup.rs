//! Setup actions that run at most once per invocation.

use std::mem;

/// Pending one-time setup actions. Each `take_*` returns whether the
/// action is still due and marks it done.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetupFlags {
    pub compile: bool,
    /// Sync the remote checkout and reset log4j.
    pub update_repo: bool,
    pub update_jar: bool,
    pub update_conf: bool,
    pub sync_time: bool,
    pub clear_logs: bool,
}

/// Snapshot of the flags forwarded with one remote call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecFlags {
    pub update_repo: bool,
    pub update_log4j: bool,
    pub update_jar: bool,
    pub update_conf: bool,
}

impl SetupFlags {
    /// Everything due except log clearing.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            compile: true,
            update_repo: true,
            update_jar: true,
            update_conf: true,
            sync_time: true,
            clear_logs: false,
        }
    }

    /// Nothing due.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            compile: false,
            update_repo: false,
            update_jar: false,
            update_conf: false,
            sync_time: false,
            clear_logs: false,
        }
    }

    pub fn take_compile(&mut self) -> bool {
        mem::take(&mut self.compile)
    }

    pub fn take_sync_time(&mut self) -> bool {
        mem::take(&mut self.sync_time)
    }

    pub fn take_clear_logs(&mut self) -> bool {
        mem::take(&mut self.clear_logs)
    }

    /// Flags for the next remote call; all of them are spent afterwards,
    /// whether or not the call succeeds.
    pub fn take_exec(&mut self) -> ExecFlags {
        let update_repo = mem::take(&mut self.update_repo);
        ExecFlags {
            update_repo,
            update_log4j: update_repo,
            update_jar: mem::take(&mut self.update_jar),
            update_conf: mem::take(&mut self.update_conf),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_fires_once() {
        let mut flags = SetupFlags::all();
        assert!(flags.take_compile());
        assert!(!flags.take_compile());
        assert!(flags.take_sync_time());
        assert!(!flags.take_sync_time());
        assert!(!flags.take_clear_logs());
    }

    #[test]
    fn test_take_exec_spends_all() {
        let mut flags = SetupFlags::all();
        let first = flags.take_exec();
        assert_eq!(
            first,
            ExecFlags {
                update_repo: true,
                update_log4j: true,
                update_jar: true,
                update_conf: true,
            }
        );
        assert_eq!(flags.take_exec(), ExecFlags::default());
        assert!(flags.compile);
    }
}
