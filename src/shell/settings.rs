use super::{Mode, Output, Shell, split_command, unquote};
use crate::replicate::Connector;
use std::fmt::Write as _;
use std::path::PathBuf;
use tracing::info;

impl<C: Connector> Shell<C> {
    pub(super) fn handle_unsetup(&mut self, line: &str, out: &mut Vec<Output>) {
        let (cmd, arg) = split_command(line);
        match cmd.as_str() {
            "/rename_user" => {
                let Some(name) = arg.map(unquote).filter(|n| !n.is_empty()) else {
                    out.push(Output::Text("Usage: /rename_user \"new_name\"".into()));
                    return;
                };
                let previous = std::mem::replace(&mut self.profile.username, name.to_string());
                match self.save_profile() {
                    Ok(()) => {
                        self.mode = Mode::Default;
                        out.push(Output::Text(format!(
                            "The username has been successfully changed to '{name}'."
                        )));
                    }
                    Err(e) => {
                        self.profile.username = previous;
                        out.push(Output::Text(format!("Failed to save new username: {e}")));
                    }
                }
            }
            "/change_path" => match arg.map(unquote) {
                Some(path) if PathBuf::from(path).is_dir() => {
                    self.profile.save_path = PathBuf::from(path);
                    match self.save_profile() {
                        Ok(()) => out.push(Output::Text(format!("Save path updated to: {path}"))),
                        Err(e) => out.push(Output::Text(format!(
                            "Save path set for this session, but the profile could not be written: {e}"
                        ))),
                    }
                }
                Some(_) => out.push(Output::Text(
                    "Error: The provided path is not a valid directory.".into(),
                )),
                None => out.push(Output::Text(format!(
                    "Current save path: {}\nUsage: /change_path \"new_path\"",
                    self.profile.save_path.display()
                ))),
            },
            "/delete" => self.delete_profile(out),
            "/exit" => self.mode = Mode::Default,
            _ => out.push(Output::Text("Unrecognized subcommand".into())),
        }
    }

    /// Removes the stored profile and restarts first-run setup in place.
    fn delete_profile(&mut self, out: &mut Vec<Output>) {
        match self.store.delete() {
            Ok(()) => {
                info!(path = %self.store.path().display(), "profile deleted");
                out.push(Output::Text("Profile data successfully deleted.".into()));
                self.backend = None;
                self.pending = None;
                self.profile = Default::default();
                self.mode = Mode::SetupUsername;
                out.push(Output::Question("Enter your username".into()));
            }
            Err(e) => out.push(Output::Text(format!("Failed to delete profile data: {e}"))),
        }
    }

    pub(super) fn handle_model_management(&mut self, line: &str, out: &mut Vec<Output>) {
        let (cmd, arg) = split_command(line);
        match cmd.as_str() {
            "/list" => out.push(Output::Text(self.model_listing())),
            "/set" => {
                let Some(name) = arg.map(unquote) else {
                    out.push(Output::Text("Usage: /set <model_name>".into()));
                    return;
                };
                if let Err(e) = self.profile.set_active(name) {
                    out.push(Output::Text(e.to_string()));
                    return;
                }
                if let Err(e) = self.save_profile() {
                    out.push(Output::Text(format!("Failed to save profile: {e}")));
                }
                out.push(Output::Text(format!(
                    "Model changed to '{name}'. Re-initializing API..."
                )));
                self.init_backend(out);
            }
            "/add" => {
                let parts: Vec<&str> = arg.map(|a| a.split_whitespace().collect()).unwrap_or_default();
                let (name, id, input_key) = match parts.as_slice() {
                    [name, id] => (*name, *id, None),
                    [name, id, key] => (*name, *id, Some(*key)),
                    _ => {
                        out.push(Output::Text(
                            "Usage: /add <name> <owner/model[:version]> [input_key]".into(),
                        ));
                        return;
                    }
                };
                if let Err(e) = self.profile.add_model(name, id, input_key) {
                    out.push(Output::Text(format!("Error: {e}")));
                    return;
                }
                if let Err(e) = self.save_profile() {
                    out.push(Output::Text(format!("Failed to save profile: {e}")));
                    return;
                }
                out.push(Output::Text(format!("Model '{name}' added ({id}).")));
                if name == self.profile.active_model {
                    out.push(Output::Text(
                        "Active model updated. Re-initializing API...".into(),
                    ));
                    self.init_backend(out);
                }
            }
            "/remove" => {
                let Some(name) = arg.map(unquote) else {
                    out.push(Output::Text("Usage: /remove <model_name>".into()));
                    return;
                };
                match self.profile.remove_model(name) {
                    Ok(model) => match self.save_profile() {
                        Ok(()) => out.push(Output::Text(format!(
                            "Model '{name}' ({}) removed.",
                            model.id
                        ))),
                        Err(e) => out.push(Output::Text(format!("Failed to save profile: {e}"))),
                    },
                    Err(e) => out.push(Output::Text(e.to_string())),
                }
            }
            "/exit" => self.mode = Mode::Default,
            _ => out.push(Output::Text(
                "Unknown command in model management. Use /list, /set, /add, /remove, or /exit."
                    .into(),
            )),
        }
    }

    fn model_listing(&self) -> String {
        let mut listing = String::from("Available models:");
        for (name, model) in &self.profile.models {
            let marker = if *name == self.profile.active_model {
                " [ACTIVE]"
            } else {
                ""
            };
            let _ = write!(listing, "\n - {name} ({}){marker}", model.id);
        }
        listing
    }
}
