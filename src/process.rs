// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Process queries.
//!
//! Point-in-time check of whether the target application is running. Nothing
//! here holds a lock, so the application can still start right after a check
//! passes.

use sysinfo::{ProcessesToUpdate, System};
use tracing::debug;

/// Layer of indirection for process enumeration.
pub trait ProcessQuery: Send + Sync {
    /// Check if a process with executable name `executable` is running.
    ///
    /// Names are compared case-insensitively.
    fn is_running(&self, executable: &str) -> bool;
}

impl<F> ProcessQuery for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn is_running(&self, executable: &str) -> bool {
        self(executable)
    }
}

/// Process enumeration through the platform process table.
#[derive(Debug, Default)]
pub struct SystemProcesses;

impl SystemProcesses {
    /// Construct new process table query.
    pub fn new() -> Self {
        Self
    }
}

impl ProcessQuery for SystemProcesses {
    fn is_running(&self, executable: &str) -> bool {
        let mut system = System::new();
        system.refresh_processes(ProcessesToUpdate::All, true);
        let running = system.processes().values().any(|process| {
            process
                .name()
                .to_string_lossy()
                .eq_ignore_ascii_case(executable)
        });
        debug!("process {executable:?} running: {running}");

        running
    }
}
