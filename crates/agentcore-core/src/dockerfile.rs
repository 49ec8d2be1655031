//! Templated insertion into a container build file.
//!
//! A patch is inserted once: if its marker string already appears anywhere
//! in the file, the file is left untouched.

use std::path::{Path, PathBuf};

use tracing::info;

/// A block of build-file text and the marker that proves it is present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DockerfilePatch {
    pub marker: &'static str,
    pub block: &'static str,
}

/// Assistant model configuration for the agent image.
pub const ASSISTANT_PATCH: DockerfilePatch = DockerfilePatch {
    marker: "ANTHROPIC_MODEL",
    block: "
# Assistant configuration
ENV ANTHROPIC_MODEL=claude-sonnet-4-20250514 \\
    ANTHROPIC_MAX_TOKENS=1024 \\
    AGENT_CONNECTION_MAX_AGE_SECS=300
",
};

/// Where a patch was inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// After the `ENV` instruction that sets `AWS_REGION`
    RegionEnv,
    /// After the first `WORKDIR`
    Workdir,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOutcome {
    Applied(Anchor),
    AlreadyPresent,
}

#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Apply `patch` to `content`, returning the new text and what happened.
pub fn apply(content: &str, patch: &DockerfilePatch) -> (String, PatchOutcome) {
    if content.contains(patch.marker) {
        return (content.to_string(), PatchOutcome::AlreadyPresent);
    }

    let mut lines: Vec<&str> = content.split('\n').collect();
    let parsed = instructions(&lines);

    let region_env = parsed
        .iter()
        .find(|i| i.keyword == "ENV" && i.text.contains("AWS_REGION"));
    let workdir = parsed.iter().find(|i| i.keyword == "WORKDIR");

    let (at, anchor) = match (region_env, workdir) {
        (Some(env), _) => (env.end, Anchor::RegionEnv),
        (None, Some(dir)) => (dir.end, Anchor::Workdir),
        (None, None) => {
            let end = if lines.last() == Some(&"") {
                lines.len() - 1
            } else {
                lines.len()
            };
            (end, Anchor::End)
        }
    };

    let block = patch.block.trim_end_matches('\n');
    lines.insert(at, block);
    (lines.join("\n"), PatchOutcome::Applied(anchor))
}

/// Apply `patch` to the file at `path` in place.
pub fn patch_file(path: &Path, patch: &DockerfilePatch) -> Result<PatchOutcome, PatchError> {
    let content = std::fs::read_to_string(path).map_err(|source| PatchError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let (patched, outcome) = apply(&content, patch);
    match outcome {
        PatchOutcome::AlreadyPresent => {
            info!(path = %path.display(), "build file already patched");
        }
        PatchOutcome::Applied(anchor) => {
            std::fs::write(path, patched).map_err(|source| PatchError::Write {
                path: path.to_path_buf(),
                source,
            })?;
            info!(path = %path.display(), anchor = ?anchor, "build file patched");
        }
    }
    Ok(outcome)
}

/// One instruction, possibly spanning `\`-continued lines.
struct Instruction {
    keyword: String,
    text: String,
    /// Index of the first line after the instruction
    end: usize,
}

fn instructions(lines: &[&str]) -> Vec<Instruction> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let first = lines[i].trim_start();
        if first.is_empty() || first.starts_with('#') {
            i += 1;
            continue;
        }
        let mut text = String::from(first);
        let mut end = i + 1;
        let mut current = lines[i];
        while current.trim_end().ends_with('\\') && end < lines.len() {
            current = lines[end];
            text.push('\n');
            text.push_str(current);
            end += 1;
        }
        let keyword = first
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_ascii_uppercase();
        out.push(Instruction { keyword, text, end });
        i = end;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_PATCH: DockerfilePatch = DockerfilePatch {
        marker: "PATCHED_MARKER",
        block: "\n# added\nENV PATCHED_MARKER=1\n",
    };

    #[test]
    fn test_inserts_after_region_env_block() {
        let input = "FROM rust:1\nWORKDIR /app\nENV AWS_REGION=us-west-2 \\\n    AWS_DEFAULT_REGION=us-west-2\nCOPY . .\n";
        let (out, outcome) = apply(input, &TEST_PATCH);
        assert_eq!(outcome, PatchOutcome::Applied(Anchor::RegionEnv));
        assert_eq!(
            out,
            "FROM rust:1\nWORKDIR /app\nENV AWS_REGION=us-west-2 \\\n    AWS_DEFAULT_REGION=us-west-2\n\n# added\nENV PATCHED_MARKER=1\nCOPY . .\n"
        );
    }

    #[test]
    fn test_falls_back_to_workdir() {
        let input = "FROM rust:1\nWORKDIR /app\nCOPY . .\n";
        let (out, outcome) = apply(input, &TEST_PATCH);
        assert_eq!(outcome, PatchOutcome::Applied(Anchor::Workdir));
        assert!(out.starts_with("FROM rust:1\nWORKDIR /app\n\n# added\nENV PATCHED_MARKER=1\nCOPY"));
    }

    #[test]
    fn test_falls_back_to_end() {
        let (out, outcome) = apply("FROM scratch\n", &TEST_PATCH);
        assert_eq!(outcome, PatchOutcome::Applied(Anchor::End));
        assert_eq!(out, "FROM scratch\n\n# added\nENV PATCHED_MARKER=1\n");
    }

    #[test]
    fn test_env_without_region_is_not_an_anchor() {
        let input = "FROM rust:1\nENV FOO=1\nWORKDIR /app\n";
        let (_, outcome) = apply(input, &TEST_PATCH);
        assert_eq!(outcome, PatchOutcome::Applied(Anchor::Workdir));
    }

    #[test]
    fn test_apply_twice_equals_once() {
        let input = "FROM rust:1\nWORKDIR /app\nENV AWS_REGION=us-east-1\n";
        let (once, _) = apply(input, &ASSISTANT_PATCH);
        let (twice, outcome) = apply(&once, &ASSISTANT_PATCH);
        assert_eq!(outcome, PatchOutcome::AlreadyPresent);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_patch_file_missing_is_read_error() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let err = patch_file(&dir.path().join("Dockerfile"), &ASSISTANT_PATCH).unwrap_err();
        assert!(matches!(err, PatchError::Read { .. }));
    }
}
