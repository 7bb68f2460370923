use std::path::PathBuf;

use crate::config::AccelConfig;
use crate::error::Result;
use crate::runner::{CommandRunner, CommandSpec, run};

#[derive(Clone)]
pub struct ObjectStoreCredentials {
    pub access_key_id: String,
    pub access_key_secret: String,
}

impl std::fmt::Debug for ObjectStoreCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStoreCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("access_key_secret", &"***")
            .finish()
    }
}

/// Bucket URI with a trailing `/` and the scheme prefix, e.g. `oss://mybucket/`.
pub fn normalize_bucket(bucket: &str, scheme: &str) -> String {
    let mut out = bucket.to_string();
    if !out.ends_with('/') {
        out.push('/');
    }
    if !out.starts_with(scheme) {
        out.insert_str(0, scheme);
    }
    out
}

/// Last path segment of `path`, or all of it when there is no `/`.
pub fn file_name(path: &str) -> &str {
    match path.rfind('/') {
        Some(i) => &path[i + 1..],
        None => path,
    }
}

pub fn remote_path(bucket: &str, scheme: &str, file_path: &str) -> String {
    format!("{}{}", normalize_bucket(bucket, scheme), file_name(file_path))
}

#[derive(Debug, Clone)]
pub struct Uploader {
    pub install_path: PathBuf,
    pub scratch_path: PathBuf,
    pub scheme: String,
    pub success: String,
}

impl Uploader {
    pub fn from_config(cfg: &AccelConfig) -> Self {
        Self {
            install_path: cfg.paths.ossutil_install.clone(),
            scratch_path: cfg.paths.ossutil_scratch.clone(),
            scheme: cfg.dispatch.bucket_scheme.clone(),
            success: cfg.dispatch.success_sentinel.clone(),
        }
    }

    fn scratch(&self) -> String {
        self.scratch_path.display().to_string()
    }

    fn store_cmd(
        &self,
        args: &[&str],
        creds: &ObjectStoreCredentials,
        endpoint: &str,
    ) -> CommandSpec {
        let mut argv = vec![self.scratch()];
        argv.extend(args.iter().map(|a| a.to_string()));
        argv.extend([
            "-e".to_string(),
            endpoint.to_string(),
            "-i".to_string(),
            creds.access_key_id.clone(),
            "-k".to_string(),
        ]);
        CommandSpec::new(argv).secret_arg(creds.access_key_secret.clone())
    }

    /// The five commands an upload runs, in order.
    pub fn plan(
        &self,
        creds: &ObjectStoreCredentials,
        endpoint: &str,
        bucket: &str,
        file_path: &str,
    ) -> Vec<CommandSpec> {
        let bucket = normalize_bucket(bucket, &self.scheme);
        let remote = format!("{bucket}{}", file_name(file_path));
        let install = self.install_path.display().to_string();
        let scratch = self.scratch();

        vec![
            CommandSpec::new(["cp", install.as_str(), scratch.as_str()])
                .labels("cp ossutil64 success", "cp ossutil64 error"),
            CommandSpec::new(["chmod", "u+x", scratch.as_str()])
                .labels("chmod u+x ossutil64 success", "chmod u+x ossutil64 error"),
            self.store_cmd(&["mb", bucket.as_str()], creds, endpoint).labels(
                format!("create oss bucket [{bucket}] success"),
                format!("create oss bucket [{bucket}] error"),
            ),
            self.store_cmd(&["cp", file_path, remote.as_str(), "-f"], creds, endpoint)
                .labels(
                    format!("upload file {file_path} to oss [{remote}] success"),
                    format!("upload file {file_path} to oss [{remote}] error"),
                ),
            self.store_cmd(&["stat", remote.as_str()], creds, endpoint).labels(
                format!("stat oss file {remote} success"),
                format!("stat oss file {remote} error"),
            ),
        ]
    }

    /// Stage the CLI, make the bucket, upload with overwrite, then stat. Stops at the
    /// first failing step; the staged binary is left in place either way.
    pub fn upload(
        &self,
        runner: &dyn CommandRunner,
        creds: &ObjectStoreCredentials,
        endpoint: &str,
        bucket: &str,
        file_path: &str,
    ) -> Result<String> {
        for spec in self.plan(creds, endpoint, bucket, file_path) {
            run(runner, &spec)?;
        }
        let remote = remote_path(bucket, &self.scheme, file_path);
        tracing::info!("upload {file_path} to oss file {remote} success");
        Ok(self.success.clone())
    }
}
