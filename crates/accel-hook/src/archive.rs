use std::path::Path;

use crate::error::Result;
use crate::runner::{CommandRunner, CommandSpec, run};

/// Command that packs everything under `source_dir` into a gzip tarball at `dest`.
pub fn archive_command(source_dir: &Path, dest: &str) -> CommandSpec {
    CommandSpec::new(["tar", "-czf", dest, "."])
        .cwd(source_dir)
        .labels(
            format!("create archive file {dest} success"),
            format!("create archive file {dest} error"),
        )
}

// No checks on source_dir or dest: tar's exit code is the only signal.
pub fn archive(runner: &dyn CommandRunner, source_dir: &Path, dest: &str) -> Result<()> {
    tracing::info!(source = %source_dir.display(), dest, "archiving work dir");
    run(runner, &archive_command(source_dir, dest))
}
