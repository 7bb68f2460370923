use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::config::AccelConfig;
use crate::env::ProcessEnv;
use crate::error::{DumpFailure, Error, Result};
use crate::runner::{CommandRunner, CommandSpec, run};

static DUMP_LOCK: Mutex<()> = Mutex::new(());

/// Process-wide dump lock. Every dump in the process holds one while it
/// clears checkpoint-mode variables and runs the binary, whichever
/// `Dispatcher` started it.
pub struct DumpPermit {
    _guard: MutexGuard<'static, ()>,
}

impl DumpPermit {
    pub fn acquire() -> Self {
        Self {
            _guard: DUMP_LOCK.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }
}

/// Drives the checkpoint binary. The checkpoint-mode variables must be set on
/// entry and are absent from the environment once `dump` starts the binary.
#[derive(Debug, Clone)]
pub struct DumpController {
    pub binary: PathBuf,
    pub cleared_vars: Vec<String>,
    pub success: String,
}

impl DumpController {
    pub fn from_config(cfg: &AccelConfig) -> Self {
        Self {
            binary: cfg.paths.checkpoint_bin.clone(),
            cleared_vars: cfg.env.dump_cleared_vars.clone(),
            success: cfg.dispatch.success_sentinel.clone(),
        }
    }

    pub fn command(&self) -> CommandSpec {
        CommandSpec::new([self.binary.display().to_string(), "dump".to_string()])
    }

    fn check_preconditions(&self, env: &dyn ProcessEnv) -> Result<()> {
        for name in &self.cleared_vars {
            if env.get(name).is_none() {
                return Err(Error::Dump(DumpFailure::MissingEnv(name.clone())));
            }
        }
        Ok(())
    }

    // Cleared variables are not restored if the binary fails.
    pub fn dump(
        &self,
        runner: &dyn CommandRunner,
        env: &dyn ProcessEnv,
        _permit: &DumpPermit,
    ) -> Result<String> {
        tracing::info!(binary = %self.binary.display(), "dumping");
        self.check_preconditions(env)?;
        for name in &self.cleared_vars {
            // SAFETY: the permit is held, so no other dump touches the environment.
            unsafe { env.remove(name) };
        }

        match run(runner, &self.command()) {
            Ok(()) => {
                tracing::info!("{}", self.success);
                Ok(self.success.clone())
            }
            Err(Error::Command { code, .. }) => {
                let err = Error::Dump(DumpFailure::Exit(code));
                tracing::error!("{err}");
                Err(err)
            }
            Err(other) => Err(other),
        }
    }
}
