// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Per-operation access sessions.
//!
//! An [`AccessSession`] pairs the resolved target with the access strategy
//! its installation mechanism requires. It is constructed once per operation
//! and handed explicitly to every component, so no operation can observe an
//! access mode chosen by an earlier one.

use crate::{
    access::{AccessKind, Direct, Forced, HelperRunner, TreeAccess, UnlockerProcess},
    config::HelperSettings,
    locate::TargetCandidate,
};

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::{debug, info};

/// Resolved target and the access strategy it requires.
pub struct AccessSession {
    candidate: TargetCandidate,
    access: Box<dyn TreeAccess>,
}

impl AccessSession {
    /// Construct new session from explicit parts.
    pub fn new(candidate: TargetCandidate, access: impl TreeAccess + 'static) -> Self {
        Self {
            candidate,
            access: Box::new(access),
        }
    }

    /// Open session for `candidate`, probing the forced-access helper if the
    /// candidate requires it.
    ///
    /// The `scratch` directory stages trees for the forced-access helper.
    ///
    /// # Errors
    ///
    /// - Return [`Error::AccessToolMissing`] if the candidate requires forced
    ///   access but the helper executable is absent. Nothing is mutated.
    pub fn open(
        candidate: TargetCandidate,
        helper: &HelperSettings,
        scratch: impl Into<PathBuf>,
    ) -> Result<Self> {
        match candidate.access {
            AccessKind::Direct => {
                debug!("direct access for {:?}", candidate.path.display());
                Ok(Self::new(candidate, Direct::new()))
            }
            AccessKind::Forced => {
                let mut runner = UnlockerProcess::new(&helper.program);
                if let Some(secs) = helper.timeout_secs {
                    runner = runner.with_timeout(Duration::from_secs(secs));
                }

                if !runner.is_present() {
                    return Err(Error::AccessToolMissing {
                        program: helper.program.clone(),
                    });
                }

                info!("forced access for {:?}", candidate.path.display());
                Ok(Self::new(
                    candidate,
                    Forced::new(runner, helper.batch_size, scratch),
                ))
            }
        }
    }

    /// Open forced-access session with a specific helper runner.
    ///
    /// # Errors
    ///
    /// - Return [`Error::AccessToolMissing`] if `runner` reports that its
    ///   helper is absent.
    pub fn forced<R>(
        candidate: TargetCandidate,
        runner: R,
        batch_size: usize,
        scratch: impl Into<PathBuf>,
    ) -> Result<Self>
    where
        R: HelperRunner + 'static,
    {
        if !runner.is_present() {
            return Err(Error::AccessToolMissing {
                program: PathBuf::from("forced-access helper"),
            });
        }

        info!("forced access for {:?}", candidate.path.display());
        Ok(Self::new(candidate, Forced::new(runner, batch_size, scratch)))
    }

    /// Target this session operates on.
    pub fn candidate(&self) -> &TargetCandidate {
        &self.candidate
    }

    /// Access strategy this session mutates through.
    pub fn access(&self) -> &dyn TreeAccess {
        self.access.as_ref()
    }

    /// Absolute path to the live asset tree.
    pub fn live_tree(&self) -> PathBuf {
        self.candidate.live_tree()
    }

    /// Root directory of the target installation.
    pub fn root(&self) -> &Path {
        &self.candidate.path
    }
}

impl Debug for AccessSession {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.debug_struct("AccessSession")
            .field("candidate", &self.candidate)
            .field("access", &self.access.kind())
            .finish()
    }
}

/// Access session error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Forced access is required, but its helper is absent.
    #[error("forced access helper {:?} is not installed, it is required to modify this target", program.display())]
    AccessToolMissing { program: PathBuf },
}

/// Friendly result alias :3
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{access::tests::FakeHelper, locate::VersionDescriptor};
    use pretty_assertions::assert_eq;

    fn candidate(access: AccessKind) -> TargetCandidate {
        TargetCandidate {
            path: PathBuf::from("/games/install"),
            asset_dir: PathBuf::from("data/gui"),
            version: VersionDescriptor::Unknown,
            access,
        }
    }

    struct AbsentHelper;

    impl HelperRunner for AbsentHelper {
        fn is_present(&self) -> bool {
            false
        }

        fn invoke(&self, _: &crate::access::HelperCall) -> crate::access::Result<()> {
            unreachable!("absent helper must never be invoked")
        }
    }

    #[test]
    fn direct_candidates_need_no_helper() -> anyhow::Result<()> {
        let helper = HelperSettings {
            program: PathBuf::from("/nonexistent/unlocker"),
            ..Default::default()
        };
        let session = AccessSession::open(candidate(AccessKind::Direct), &helper, "/tmp")?;

        assert_eq!(session.access().kind(), AccessKind::Direct);
        assert_eq!(session.live_tree(), PathBuf::from("/games/install/data/gui"));

        Ok(())
    }

    #[test]
    fn forced_candidates_fail_fast_without_helper() {
        let helper = HelperSettings {
            program: PathBuf::from("/nonexistent/unlocker"),
            ..Default::default()
        };
        let result = AccessSession::open(candidate(AccessKind::Forced), &helper, "/tmp");

        match result {
            Err(Error::AccessToolMissing { program }) => {
                assert_eq!(program, PathBuf::from("/nonexistent/unlocker"));
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn forced_session_with_runner() -> anyhow::Result<()> {
        let session =
            AccessSession::forced(candidate(AccessKind::Forced), FakeHelper::default(), 10, "/tmp")?;
        assert_eq!(session.access().kind(), AccessKind::Forced);

        let result = AccessSession::forced(candidate(AccessKind::Forced), AbsentHelper, 10, "/tmp");
        assert!(matches!(result, Err(Error::AccessToolMissing { .. })));

        Ok(())
    }
}
