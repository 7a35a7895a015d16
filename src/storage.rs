use crate::error::{Error, Result};
use crate::response::SavedArtifact;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedPaths {
    pub code: PathBuf,
    pub docs: PathBuf,
}

/// Writes `<dir>/<name><ext>` with the code and `<dir>/<name>.md` with the docs.
pub fn save_artifact(dir: &Path, name: &str, artifact: &SavedArtifact) -> Result<SavedPaths> {
    let name = validate_name(name)?;
    std::fs::create_dir_all(dir)?;

    let paths = SavedPaths {
        code: dir.join(format!("{name}{}", artifact.extension)),
        docs: dir.join(format!("{name}.md")),
    };
    std::fs::write(&paths.code, &artifact.code)?;
    std::fs::write(&paths.docs, &artifact.docs)?;

    info!(code = %paths.code.display(), docs = %paths.docs.display(), "artifact saved");
    Ok(paths)
}

fn validate_name(name: &str) -> Result<&str> {
    let name = name.trim().trim_matches('"');
    if name.is_empty() {
        return Err(Error::config("File name cannot be empty."));
    }
    if name.contains(['/', '\\']) || name == "." || name.contains("..") {
        return Err(Error::config(format!(
            "File name '{name}' must not contain path separators or '..'."
        )));
    }
    Ok(name)
}
