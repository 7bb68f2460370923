use std::path::PathBuf;
use std::sync::Arc;

use crate::archive::archive;
use crate::config::AccelConfig;
use crate::dump::{DumpController, DumpPermit};
use crate::env::{ProcessEnv, SystemEnv};
use crate::error::{Error, Result};
use crate::request::{
    AccelRequest, KEY_ACCESS_KEY_ID, KEY_ACCESS_KEY_SECRET, KEY_ENDPOINT, KEY_FILE, Operation,
};
use crate::runner::{CommandRunner, SystemRunner};
use crate::upload::{ObjectStoreCredentials, Uploader};

/// Entry point in front of a function handler. A `type=dump` request runs
/// dump, then archive and upload when asked; anything else goes to the
/// original handler untouched.
pub struct Dispatcher {
    runner: Arc<dyn CommandRunner>,
    env: Arc<dyn ProcessEnv>,
    dump: DumpController,
    uploader: Uploader,
    work_dir_var: String,
    serialize_dumps: bool,
}

impl Dispatcher {
    pub fn new(
        cfg: &AccelConfig,
        runner: Arc<dyn CommandRunner>,
        env: Arc<dyn ProcessEnv>,
    ) -> Self {
        Self {
            runner,
            env,
            dump: DumpController::from_config(cfg),
            uploader: Uploader::from_config(cfg),
            work_dir_var: cfg.env.work_dir_var.clone(),
            serialize_dumps: cfg.dispatch.serialize_dumps,
        }
    }

    /// Real processes and the real process environment.
    pub fn system(cfg: &AccelConfig) -> Self {
        Self::new(cfg, Arc::new(SystemRunner), Arc::new(SystemEnv))
    }

    /// Handle one request body. Pipeline failures are returned as the response
    /// text, never propagated.
    pub fn handle<F>(&self, body: &str, original: F) -> String
    where
        F: FnOnce() -> String,
    {
        let (req, rejected) = AccelRequest::parse(body);
        tracing::debug!(op = ?req.op, rejected = rejected.len(), "parsed request");

        match &req.op {
            Some(Operation::Dump) => {}
            Some(Operation::Other(t)) => {
                tracing::info!(op = %t, "unrecognised op type, invoking original handler");
                return original();
            }
            None => {
                tracing::info!("invoking original handler");
                return original();
            }
        }

        tracing::info!("op type is dump");
        match self.run_dump_pipeline(&req) {
            Ok(result) => result,
            Err(e) => {
                let msg = e.to_string();
                tracing::error!(error = %msg, "dump request failed");
                msg
            }
        }
    }

    /// Dump, then archive if `file` is non-empty, then upload if `bucket` is present.
    /// The last step that ran decides the result.
    ///
    /// The dump step always runs under the process-wide [`DumpPermit`]. With
    /// `serialize_dumps` the permit is also held through archive and upload.
    pub fn run_dump_pipeline(&self, req: &AccelRequest) -> Result<String> {
        let permit = DumpPermit::acquire();
        let runner = self.runner.as_ref();
        let mut result = self.dump.dump(runner, self.env.as_ref(), &permit)?;
        let _permit = if self.serialize_dumps {
            Some(permit)
        } else {
            drop(permit);
            None
        };

        if let Some(file) = req.archive_target() {
            let work_dir = self
                .env
                .get(&self.work_dir_var)
                .ok_or_else(|| Error::MissingEnv(self.work_dir_var.clone()))?;
            archive(runner, &PathBuf::from(work_dir), file)?;
            result = self.dump.success.clone();
        }

        if let Some(bucket) = req.bucket.as_deref() {
            let creds = ObjectStoreCredentials {
                access_key_id: AccelRequest::require(&req.access_key_id, KEY_ACCESS_KEY_ID)?
                    .to_string(),
                access_key_secret: AccelRequest::require(
                    &req.access_key_secret,
                    KEY_ACCESS_KEY_SECRET,
                )?
                .to_string(),
            };
            let endpoint = AccelRequest::require(&req.endpoint, KEY_ENDPOINT)?;
            // An empty `file` is handed to the object-store CLI as-is.
            let file = AccelRequest::require(&req.file, KEY_FILE)?;
            result = self.uploader.upload(runner, &creds, endpoint, bucket, file)?;
        }

        Ok(result)
    }
}
