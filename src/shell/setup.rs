use super::{Mode, Output, PATH_HINT, Shell, TOKEN_HINT};
use crate::replicate::Connector;
use std::path::PathBuf;
use tracing::info;

pub(super) fn ask_token(out: &mut Vec<Output>) {
    out.push(Output::Question("Enter your replicate token".into()));
    out.push(Output::Hint(TOKEN_HINT.into()));
}

fn ask_path(out: &mut Vec<Output>) {
    out.push(Output::Question("Enter local storage path".into()));
    out.push(Output::Hint(PATH_HINT.into()));
}

/// Accepts an existing directory or creates a missing one.
fn check_storage_path(raw: &str) -> Result<PathBuf, String> {
    let path = raw.trim().trim_matches('"').replace('\\', "/");
    if path.is_empty() {
        return Err("Path cannot be empty.".into());
    }
    let path = PathBuf::from(path);
    if path.is_dir() {
        return Ok(path);
    }
    if path.exists() {
        return Err(format!(
            "Path \"{}\" points to a file, not a directory.",
            path.display()
        ));
    }
    std::fs::create_dir_all(&path)
        .map_err(|e| format!("Could not create path. System error: {e}"))?;
    Ok(path)
}

impl<C: Connector> Shell<C> {
    pub(super) fn handle_setup(&mut self, line: &str, out: &mut Vec<Output>) {
        match self.mode {
            Mode::SetupUsername => {
                let name = line.trim();
                if name.is_empty() {
                    out.push(Output::Text("Username cannot be empty.".into()));
                    out.push(Output::Question("Enter your username".into()));
                    return;
                }
                self.profile.username = name.to_string();
                self.mode = Mode::SetupPath;
                ask_path(out);
            }
            Mode::SetupPath => match check_storage_path(line) {
                Ok(path) => {
                    self.profile.save_path = path;
                    self.mode = Mode::SetupToken;
                    ask_token(out);
                }
                Err(message) => {
                    out.push(Output::Text(message));
                    ask_path(out);
                }
            },
            Mode::SetupToken | Mode::SetupTokenOnly => {
                let token = line.trim();
                if token.is_empty() {
                    out.push(Output::Text("Token cannot be empty. Please try again.".into()));
                    ask_token(out);
                    return;
                }
                self.token = Some(token.to_string());
                self.finalize_setup(out);
            }
            _ => {}
        }
    }

    fn finalize_setup(&mut self, out: &mut Vec<Output>) {
        if let Err(e) = self.save_profile() {
            out.push(Output::Text(format!(
                "An error occurred during setup: {e}\nPlease restart the application."
            )));
            return;
        }
        info!(username = %self.profile.username, "profile setup complete");
        self.mode = Mode::Default;
        self.init_backend(out);
    }
}
