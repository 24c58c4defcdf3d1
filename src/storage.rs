// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Versioned storage backends for signing assets.

use {
    crate::error::SigningVaultError,
    log::{info, warn},
    std::path::{Path, PathBuf},
    tempfile::TempDir,
};

/// A remote store holding signing assets.
///
/// Implementations sync the remote into a local working directory and commit
/// an explicit list of files back. Callers place bytes under
/// [StorageBackend::working_directory] themselves; the backend never decides
/// what to persist.
pub trait StorageBackend {
    /// Sync the remote into a local working directory.
    fn download(&mut self) -> Result<(), SigningVaultError>;

    /// Root of the synced working directory.
    ///
    /// Errors if [StorageBackend::download] has not run yet.
    fn working_directory(&self) -> Result<&Path, SigningVaultError>;

    /// Persist exactly `files_to_commit` to the remote.
    ///
    /// Paths must be absolute and live inside the working directory.
    fn save_changes(
        &mut self,
        message: &str,
        files_to_commit: &[PathBuf],
    ) -> Result<(), SigningVaultError>;
}

/// Configuration for git-backed storage.
///
/// All knobs are explicit; nothing is read from process environment.
#[derive(Clone, Debug)]
pub struct GitStorageOptions {
    /// URL of the remote repository. Anything `git clone` accepts.
    pub url: String,

    /// Branch holding the signing assets.
    pub branch: String,

    /// Clone with `--depth 1`.
    pub shallow_clone: bool,

    /// Committer name for generated commits.
    pub git_full_name: Option<String>,

    /// Committer email for generated commits.
    pub git_user_email: Option<String>,
}

impl GitStorageOptions {
    pub fn new(url: impl ToString) -> Self {
        Self {
            url: url.to_string(),
            branch: "master".to_string(),
            shallow_clone: false,
            git_full_name: None,
            git_user_email: None,
        }
    }
}

/// Storage backend persisting assets to a git repository.
///
/// Git is driven as a subprocess. The clone lives in a temporary directory
/// owned by this value and is removed when the value drops.
pub struct GitStorage {
    options: GitStorageOptions,
    checkout: Option<GitCheckout>,
}

struct GitCheckout {
    path: PathBuf,
    _temp_dir: TempDir,
}

impl GitStorage {
    /// Create a backend from explicit options.
    pub fn configure(options: GitStorageOptions) -> Self {
        Self {
            options,
            checkout: None,
        }
    }

    /// `-c` arguments applying the configured committer identity.
    fn identity_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if let Some(name) = &self.options.git_full_name {
            args.push("-c".to_string());
            args.push(format!("user.name={}", name));
        }

        if let Some(email) = &self.options.git_user_email {
            args.push("-c".to_string());
            args.push(format!("user.email={}", email));
        }

        args
    }
}

fn run_git(
    current_dir: Option<&Path>,
    args: Vec<String>,
) -> Result<String, SigningVaultError> {
    info!("running git {}", args.join(" "));

    let command = duct::cmd("git", &args)
        .stderr_to_stdout()
        .stdout_capture()
        .unchecked();

    let command = match current_dir {
        Some(dir) => command.dir(dir),
        None => command,
    };

    let output = command.run()?;
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();

    if output.status.success() {
        Ok(stdout)
    } else {
        warn!("git output> {}", stdout.trim_end());

        Err(SigningVaultError::GitCommand(format!(
            "git {} exited {}: {}",
            args.join(" "),
            output.status,
            stdout.trim_end()
        )))
    }
}

impl StorageBackend for GitStorage {
    fn download(&mut self) -> Result<(), SigningVaultError> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("repo");

        let mut args = vec!["clone".to_string()];

        if self.options.shallow_clone {
            args.push("--depth".to_string());
            args.push("1".to_string());
        }

        args.push("--branch".to_string());
        args.push(self.options.branch.clone());
        args.push(self.options.url.clone());
        args.push(path.display().to_string());

        info!("syncing {} into local working directory", self.options.url);
        run_git(None, args)?;

        self.checkout = Some(GitCheckout {
            path,
            _temp_dir: temp_dir,
        });

        Ok(())
    }

    fn working_directory(&self) -> Result<&Path, SigningVaultError> {
        Ok(&self
            .checkout
            .as_ref()
            .ok_or(SigningVaultError::StorageNotDownloaded)?
            .path)
    }

    fn save_changes(
        &mut self,
        message: &str,
        files_to_commit: &[PathBuf],
    ) -> Result<(), SigningVaultError> {
        let root = self.working_directory()?.to_path_buf();

        let mut add_args = vec!["add".to_string(), "--".to_string()];
        add_args.extend(files_to_commit.iter().map(|p| p.display().to_string()));
        run_git(Some(&root), add_args)?;

        let mut commit_args = self.identity_args();
        commit_args.extend([
            "commit".to_string(),
            "-m".to_string(),
            message.to_string(),
        ]);
        run_git(Some(&root), commit_args)?;

        info!("pushing to {}", self.options.url);
        run_git(
            Some(&root),
            vec![
                "push".to_string(),
                "origin".to_string(),
                self.options.branch.clone(),
            ],
        )?;

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn seed_remote(root: &Path, branch: &str) -> PathBuf {
        let remote = root.join("remote.git");
        run_git(
            None,
            vec![
                "init".to_string(),
                "--bare".to_string(),
                remote.display().to_string(),
            ],
        )
        .unwrap();
        run_git(
            Some(&remote),
            vec![
                "symbolic-ref".to_string(),
                "HEAD".to_string(),
                format!("refs/heads/{}", branch),
            ],
        )
        .unwrap();

        let seed = root.join("seed");
        run_git(
            None,
            vec![
                "clone".to_string(),
                remote.display().to_string(),
                seed.display().to_string(),
            ],
        )
        .unwrap();
        std::fs::write(seed.join("README.md"), "signing assets\n").unwrap();
        run_git(
            Some(&seed),
            vec!["add".to_string(), "README.md".to_string()],
        )
        .unwrap();
        run_git(
            Some(&seed),
            vec![
                "-c".to_string(),
                "user.name=seed".to_string(),
                "-c".to_string(),
                "user.email=seed@example.com".to_string(),
                "commit".to_string(),
                "-m".to_string(),
                "seed".to_string(),
            ],
        )
        .unwrap();
        run_git(
            Some(&seed),
            vec![
                "push".to_string(),
                "origin".to_string(),
                format!("HEAD:refs/heads/{}", branch),
            ],
        )
        .unwrap();

        remote
    }

    #[test]
    fn working_directory_requires_download() {
        let storage = GitStorage::configure(GitStorageOptions::new("ignored"));

        assert!(matches!(
            storage.working_directory(),
            Err(SigningVaultError::StorageNotDownloaded)
        ));
    }

    #[test]
    fn download_commit_push_round_trip() {
        let temp = tempfile::tempdir().unwrap();
        let remote = seed_remote(temp.path(), "master");

        let mut options = GitStorageOptions::new(remote.display().to_string());
        options.git_full_name = Some("Signing Vault".to_string());
        options.git_user_email = Some("vault@example.com".to_string());

        let mut storage = GitStorage::configure(options);
        storage.download().unwrap();

        let dest = storage
            .working_directory()
            .unwrap()
            .join("certs/distribution/123456789.cer");
        std::fs::create_dir_all(dest.parent().unwrap()).unwrap();
        std::fs::write(&dest, b"fake certificate").unwrap();

        storage
            .save_changes("Import distribution certificate 123456789", &[dest])
            .unwrap();

        let listing = run_git(
            Some(&remote),
            vec![
                "ls-tree".to_string(),
                "-r".to_string(),
                "master".to_string(),
                "--name-only".to_string(),
            ],
        )
        .unwrap();

        assert!(listing
            .lines()
            .any(|line| line == "certs/distribution/123456789.cer"));

        let subject = run_git(
            Some(&remote),
            vec![
                "log".to_string(),
                "-1".to_string(),
                "--format=%s".to_string(),
                "master".to_string(),
            ],
        )
        .unwrap();

        assert_eq!(
            subject.trim_end(),
            "Import distribution certificate 123456789"
        );
    }
}
