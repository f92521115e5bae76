use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::panic::Location;
use std::path::{Path, PathBuf};
use std::process::Command;

/// What produced an artifact: the subcommand, its inputs and parameters.
#[derive(Debug, Serialize)]
pub struct Payload {
    pub command: &'static str,
    pub inputs: Vec<String>,
    pub params: Value,
}

#[derive(Serialize)]
struct Sidecar<'a> {
    code_rev: String,
    bhvext_version: &'static str,
    callsite: Callsite,
    #[serde(flatten)]
    payload: &'a Payload,
    outputs: Vec<String>,
}

#[derive(Serialize)]
struct Callsite {
    file: &'static str,
    line: u32,
}

/// Write `<artifact>.provenance.json` next to `artifact`.
#[track_caller]
pub fn write_sidecar<P: AsRef<Path>>(artifact: P, payload: &Payload) -> Result<PathBuf> {
    let artifact = artifact.as_ref();
    let path = sidecar_path(artifact);
    let caller = Location::caller();
    let doc = Sidecar {
        code_rev: current_git_rev(),
        bhvext_version: bhvext::VERSION,
        callsite: Callsite {
            file: caller.file(),
            line: caller.line(),
        },
        payload,
        outputs: vec![artifact.to_string_lossy().into_owned()],
    };
    fs::write(&path, serde_json::to_vec_pretty(&doc)?)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

fn sidecar_path(artifact: &Path) -> PathBuf {
    let mut name = artifact
        .file_stem()
        .map(|s| s.to_os_string())
        .unwrap_or_else(|| "result".into());
    name.push(".provenance.json");
    artifact.with_file_name(name)
}

/// Commit hash from `GIT_COMMIT` (build or run time) or `git rev-parse`.
pub fn current_git_rev() -> String {
    let from_env = option_env!("GIT_COMMIT")
        .map(str::to_string)
        .or_else(|| std::env::var("GIT_COMMIT").ok())
        .filter(|s| !s.is_empty());
    if let Some(rev) = from_env {
        return rev;
    }
    Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
        .ok()
        .filter(|out| out.status.success())
        .and_then(|out| String::from_utf8(out.stdout).ok())
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn sidecar_sits_next_to_the_artifact() {
        let derived = sidecar_path(Path::new("/tmp/runs/pair.json"));
        assert_eq!(derived, Path::new("/tmp/runs/pair.provenance.json"));
    }

    #[test]
    fn sidecar_records_inputs_and_outputs() {
        let dir = tempdir().unwrap();
        let artifact = dir.path().join("result.json");
        fs::write(&artifact, "{}").unwrap();
        let payload = Payload {
            command: "solve",
            inputs: vec!["problem.json".into()],
            params: json!({"restricted": true}),
        };
        let path = write_sidecar(&artifact, &payload).unwrap();
        let parsed: Value = serde_json::from_slice(&fs::read(path).unwrap()).unwrap();
        assert_eq!(parsed["command"], "solve");
        assert_eq!(parsed["inputs"][0], "problem.json");
        assert_eq!(parsed["params"]["restricted"], true);
        assert_eq!(parsed["outputs"][0], artifact.to_string_lossy().as_ref());
        assert_eq!(parsed["bhvext_version"], bhvext::VERSION);
    }
}
