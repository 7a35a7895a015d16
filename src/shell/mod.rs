//! Mode-driven command router.
//!
//! The shell owns the profile, the session token, and the model backend. Every input
//! line goes to the handler for the current [`Mode`], which returns [`Output`] events
//! for the front-end to render. Errors never end the session; they become output.

mod settings;
mod setup;

use crate::profile::{Profile, ProfileStore};
use crate::replicate::{Assistant, Connector};
use crate::response::{self, SavedArtifact};
use crate::storage;
use tracing::{debug, warn};

pub const TOKEN_HINT: &str =
    "Hint: Copy the token from your Replicate account page. It usually starts with 'r8_...'";
pub const PATH_HINT: &str = "Hint: Enter the full path to the folder. Use quotes if there are spaces, e.g., \"D:\\Project Files\"";
const NOT_INITIALIZED: &str = "AI API is not initialized. Please check your token and restart.";

const HELP: &str = "\
/model, used to manage AI models
 |_ /list, list configured models
 |_ /set <name>, switch the active model
 |_ /add <name> <owner/model[:version]> [input_key], add a model
 |_ /remove <name>, remove a model
 |_ /exit, leave model management
/unsetup_profil, used to modify the terminal profile globally
 |_ /rename_user \"new_name\", used to modify the user profile name
 |_ /change_path \"new_path\", used to change the local save path
 |_ /delete, To delete existing profile data
 |_ /exit, Used to exit the settings mode
/activate_ai, Used to activate ai mode
 |_ /file <path>, send a file as context with the next prompt
 |_ /path, show where code is saved
 |_ /exit, return to basic mode
/clear, Used to clean terminals
/quit, leave GraniteShell";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    SetupUsername,
    SetupPath,
    /// First-run token question; finishing writes the whole profile.
    SetupToken,
    /// Returning user without a token in the environment.
    SetupTokenOnly,
    Default,
    Ai,
    SaveConfirmation,
    SaveFilename,
    Unsetup,
    ModelManagement,
}

impl Mode {
    pub fn is_setup(self) -> bool {
        matches!(
            self,
            Self::SetupUsername | Self::SetupPath | Self::SetupToken | Self::SetupTokenOnly
        )
    }
}

/// Display events, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    Text(String),
    /// A setup question, shown without a prompt label.
    Question(String),
    Hint(String),
    /// A raw model answer, still carrying the agent prefix.
    Answer(String),
    Welcome { username: String, model: String },
    Clear,
    Exit,
}

impl Output {
    fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }
}

pub struct Shell<C: Connector> {
    connector: C,
    store: ProfileStore,
    profile: Profile,
    token: Option<String>,
    backend: Option<C::Backend>,
    mode: Mode,
    pending: Option<SavedArtifact>,
}

impl<C: Connector> Shell<C> {
    pub fn new(connector: C, store: ProfileStore, token: Option<String>) -> Self {
        Self {
            connector,
            store,
            profile: Profile::default(),
            token: token.filter(|t| !t.trim().is_empty()),
            backend: None,
            mode: Mode::Default,
            pending: None,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn is_ai_ready(&self) -> bool {
        self.backend.is_some()
    }

    /// Loads the stored profile and decides whether setup is needed.
    pub fn start(&mut self) -> Vec<Output> {
        let mut out = Vec::new();
        match self.store.read() {
            None => {
                debug!(path = %self.store.path().display(), "no profile, starting setup");
                self.profile = Profile::default();
                self.mode = Mode::SetupUsername;
                out.push(Output::Question("Enter your username".into()));
            }
            Some(profile) => {
                self.profile = profile;
                if self.token.is_none() {
                    self.mode = Mode::SetupTokenOnly;
                    setup::ask_token(&mut out);
                } else {
                    self.mode = Mode::Default;
                    self.init_backend(&mut out);
                }
            }
        }
        out
    }

    /// Label printed before the input cursor.
    pub fn prompt(&self) -> String {
        let user = &self.profile.username;
        match self.mode {
            m if m.is_setup() => String::new(),
            Mode::Default => format!("{user}> "),
            Mode::Ai => format!("{user}/mode_ai> "),
            Mode::SaveConfirmation => "Do you want to save the code above? (y/n)> ".into(),
            Mode::SaveFilename => "Enter the name of the file you want to save?> ".into(),
            Mode::Unsetup => format!("{user}/unsetup_profil> "),
            Mode::ModelManagement => format!("{user}/model> "),
            _ => format!("{user}> "),
        }
    }

    /// True when `line` will be sent to the model, so the front-end can show progress.
    pub fn will_query_model(&self, line: &str) -> bool {
        let line = line.trim();
        self.mode == Mode::Ai && self.backend.is_some() && !line.is_empty() && !line.starts_with('/')
    }

    pub async fn handle(&mut self, line: &str) -> Vec<Output> {
        let mut out = Vec::new();
        if self.mode.is_setup() {
            self.handle_setup(line, &mut out);
            return out;
        }
        if line.trim().is_empty() {
            return out;
        }
        match self.mode {
            Mode::Ai => self.handle_ai(line, &mut out).await,
            Mode::SaveConfirmation => self.handle_save_confirmation(line, &mut out),
            Mode::SaveFilename => self.handle_save_filename(line, &mut out),
            Mode::Unsetup => self.handle_unsetup(line, &mut out),
            Mode::ModelManagement => self.handle_model_management(line, &mut out),
            _ => self.handle_default(line, &mut out),
        }
        out
    }

    /// (Re)builds the backend from the active model and the session token.
    fn init_backend(&mut self, out: &mut Vec<Output>) {
        let token = self.token.clone().unwrap_or_default();
        let result = self
            .profile
            .active_model_config()
            .and_then(|model| self.connector.connect(model, &token));
        match result {
            Ok(backend) => {
                debug!(model = backend.model_id(), "backend ready");
                self.backend = Some(backend);
                out.push(Output::Welcome {
                    username: self.profile.username.clone(),
                    model: self.profile.active_model.clone(),
                });
            }
            Err(e) => {
                warn!("backend init failed: {e}");
                self.backend = None;
                out.push(Output::Text(format!(
                    "API Initialization Error: {e}\nPlease check your profile or token."
                )));
            }
        }
    }

    fn save_profile(&self) -> crate::error::Result<()> {
        self.store.write(&self.profile)
    }

    fn handle_default(&mut self, line: &str, out: &mut Vec<Output>) {
        let line = line.trim();
        if !line.starts_with('/') {
            out.push(Output::text(if self.backend.is_some() {
                "AI mode is inactive, use ‘/activate_ai’ to start."
            } else {
                NOT_INITIALIZED
            }));
            return;
        }

        match line.to_lowercase().as_str() {
            "/clear" => out.push(Output::Clear),
            "/help" => out.push(Output::text(HELP)),
            "/quit" | "/exit" => out.push(Output::Exit),
            "/model" => {
                self.mode = Mode::ModelManagement;
                out.push(Output::text(
                    "Entered model management mode. Use /list, /set <name>, /add, /remove, or /exit.",
                ));
            }
            "/unsetup_profil" => {
                self.mode = Mode::Unsetup;
                out.push(Output::Hint(
                    "Profile settings: /rename_user, /change_path, /delete, /exit".into(),
                ));
            }
            "/activate_ai" => {
                if self.backend.is_none() {
                    out.push(Output::text(NOT_INITIALIZED));
                    return;
                }
                self.mode = Mode::Ai;
                out.push(Output::text(
                    "AI mode is enabled, use ‘/exit’ to return to basic mode.",
                ));
            }
            _ => out.push(Output::Text(format!(
                "Existing commands: '{line}' not recognized by the terminal"
            ))),
        }
    }

    async fn handle_ai(&mut self, line: &str, out: &mut Vec<Output>) {
        let Some(backend) = self.backend.as_mut() else {
            out.push(Output::text(NOT_INITIALIZED));
            return;
        };

        let (cmd, arg) = split_command(line);
        match cmd.as_str() {
            "/exit" => {
                self.mode = Mode::Default;
                out.push(Output::text("AI mode has been disabled."));
            }
            "/path" => out.push(Output::Text(format!(
                "Code is saved to: {}",
                self.profile.save_path.display()
            ))),
            "/file" => match arg {
                None => out.push(Output::text("Usage: /file <path>")),
                Some(path) => {
                    let path = unquote(path);
                    match std::fs::read_to_string(path) {
                        Ok(content) => {
                            let bytes = content.len();
                            backend.set_file_context(content);
                            out.push(Output::Text(format!(
                                "Loaded {path} ({bytes} bytes) as context for the next prompt."
                            )));
                        }
                        Err(e) => out.push(Output::Text(format!("Could not read file {path}: {e}"))),
                    }
                }
            },
            c if c.starts_with('/') => out.push(Output::Text(format!(
                "You are already in AI mode and the {c} command is not available in this mode."
            ))),
            _ => match backend.send_prompt(line.trim()).await {
                Ok(answer) => {
                    let artifact = response::extract_artifact(&answer);
                    out.push(Output::Answer(answer));
                    if artifact.has_code() {
                        self.pending = Some(artifact);
                        self.mode = Mode::SaveConfirmation;
                    }
                }
                Err(e) => {
                    warn!("prompt failed: {e}");
                    out.push(Output::Text(format!(
                        "Error communicating with Replicate API. The model may be incompatible or another issue occurred. \nDetails: {e}"
                    )));
                }
            },
        }
    }

    fn handle_save_confirmation(&mut self, line: &str, out: &mut Vec<Output>) {
        match line.trim().to_lowercase().as_str() {
            "y" | "yes" => self.mode = Mode::SaveFilename,
            "n" | "no" => {
                self.pending = None;
                self.mode = Mode::Ai;
            }
            _ => out.push(Output::text("Invalid input. Please enter 'y' or 'n'.")),
        }
    }

    fn handle_save_filename(&mut self, line: &str, out: &mut Vec<Output>) {
        self.mode = Mode::Ai;
        let Some(artifact) = self.pending.take() else {
            out.push(Output::text("There is no code waiting to be saved."));
            return;
        };
        match storage::save_artifact(&self.profile.save_path, line, &artifact) {
            Ok(paths) => out.push(Output::Text(format!(
                "Code saved to: {}\nDocumentation saved to: {}",
                paths.code.display(),
                paths.docs.display()
            ))),
            Err(e) => {
                warn!("save failed: {e}");
                out.push(Output::Text(format!(
                    "An error occurred while saving the files.\nDetails: {e}"
                )));
            }
        }
    }
}

/// Lowercased command word and the trimmed remainder, if any.
fn split_command(line: &str) -> (String, Option<&str>) {
    let line = line.trim();
    match line.split_once(char::is_whitespace) {
        Some((cmd, rest)) => {
            let rest = rest.trim();
            (cmd.to_lowercase(), (!rest.is_empty()).then_some(rest))
        }
        None => (line.to_lowercase(), None),
    }
}

fn unquote(s: &str) -> &str {
    s.trim().trim_matches('"')
}
