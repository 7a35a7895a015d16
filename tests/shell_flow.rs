use granite_shell::error::{Error, Result};
use granite_shell::profile::{ModelConfig, Profile, ProfileStore};
use granite_shell::replicate::{Assistant, Connector, ModelRef};
use granite_shell::shell::{Mode, Output, Shell};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};

type Answers = Arc<Mutex<VecDeque<std::result::Result<String, String>>>>;
type Prompts = Arc<Mutex<Vec<String>>>;

struct FakeBackend {
    model: String,
    answers: Answers,
    prompts: Prompts,
    targets: Prompts,
    context: Option<String>,
}

impl Assistant for FakeBackend {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn set_file_context(&mut self, content: String) {
        self.context = Some(content);
    }

    async fn send_prompt(&mut self, prompt: &str) -> Result<String> {
        let sent = match self.context.take() {
            Some(ctx) => format!("[{ctx}] {prompt}"),
            None => prompt.to_string(),
        };
        self.prompts.lock().unwrap().push(sent);
        self.targets.lock().unwrap().push(self.model.clone());
        match self.answers.lock().unwrap().pop_front() {
            Some(Ok(answer)) => Ok(format!("ai_agent> {answer}")),
            Some(Err(e)) => Err(Error::http(e)),
            None => Ok("ai_agent> ...".into()),
        }
    }
}

#[derive(Default)]
struct FakeConnector {
    answers: Answers,
    prompts: Prompts,
    targets: Prompts,
}

impl Connector for FakeConnector {
    type Backend = FakeBackend;

    fn connect(&self, model: &ModelConfig, token: &str) -> Result<FakeBackend> {
        if token.is_empty() {
            return Err(Error::config(
                "Please set the REPLICATE_API_TOKEN environment variable.",
            ));
        }
        ModelRef::parse(&model.id)?;
        Ok(FakeBackend {
            model: model.id.clone(),
            answers: self.answers.clone(),
            prompts: self.prompts.clone(),
            targets: self.targets.clone(),
            context: None,
        })
    }
}

struct Harness {
    shell: Shell<FakeConnector>,
    prompts: Prompts,
    targets: Prompts,
    store: ProfileStore,
}

fn harness(dir: &Path, answers: &[std::result::Result<&str, &str>], token: Option<&str>) -> Harness {
    let connector = FakeConnector::default();
    connector.answers.lock().unwrap().extend(
        answers
            .iter()
            .map(|a| a.map(str::to_string).map_err(str::to_string)),
    );
    let prompts = connector.prompts.clone();
    let targets = connector.targets.clone();
    let profile_path = dir.join("profile.json");
    let shell = Shell::new(
        connector,
        ProfileStore::new(&profile_path),
        token.map(str::to_string),
    );
    Harness {
        shell,
        prompts,
        targets,
        store: ProfileStore::new(profile_path),
    }
}

fn existing_profile(dir: &Path) -> Profile {
    let save_path = dir.join("out");
    std::fs::create_dir_all(&save_path).unwrap();
    let profile = Profile {
        username: "ada".into(),
        save_path,
        ..Default::default()
    };
    ProfileStore::new(dir.join("profile.json"))
        .write(&profile)
        .unwrap();
    profile
}

fn texts(outputs: &[Output]) -> Vec<String> {
    outputs
        .iter()
        .filter_map(|o| match o {
            Output::Text(t) => Some(t.clone()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn first_run_setup_writes_profile() {
    let dir = tempfile::tempdir().unwrap();
    let mut h = harness(dir.path(), &[], None);

    let out = h.shell.start();
    assert_eq!(h.shell.mode(), Mode::SetupUsername);
    assert_eq!(out, vec![Output::Question("Enter your username".into())]);
    assert_eq!(h.shell.prompt(), "");

    h.shell.handle("  ada  ").await;
    assert_eq!(h.shell.mode(), Mode::SetupPath);

    let storage = dir.path().join("saved code");
    h.shell
        .handle(&format!("\"{}\"", storage.display()))
        .await;
    assert_eq!(h.shell.mode(), Mode::SetupToken);
    assert!(storage.is_dir());

    let out = h.shell.handle("   ").await;
    assert_eq!(h.shell.mode(), Mode::SetupToken);
    assert!(texts(&out).contains(&"Token cannot be empty. Please try again.".to_string()));

    let out = h.shell.handle("r8_token").await;
    assert_eq!(h.shell.mode(), Mode::Default);
    assert!(out.iter().any(|o| matches!(o, Output::Welcome { username, .. } if username == "ada")));
    assert!(h.shell.is_ai_ready());

    let saved = h.store.read().unwrap();
    assert_eq!(saved.username, "ada");
    assert_eq!(saved.save_path, storage);
    assert_eq!(saved.active_model, "ibm-granite");
}

#[tokio::test]
async fn setup_rejects_file_as_storage_path() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("file.txt");
    std::fs::write(&file, "x").unwrap();
    let mut h = harness(dir.path(), &[], None);
    h.shell.start();
    h.shell.handle("ada").await;

    let out = h.shell.handle(&file.display().to_string()).await;
    assert_eq!(h.shell.mode(), Mode::SetupPath);
    assert!(texts(&out)[0].ends_with("points to a file, not a directory."));
    assert!(out.contains(&Output::Question("Enter local storage path".into())));
}

#[tokio::test]
async fn returning_user_without_token_is_asked_for_token_only() {
    let dir = tempfile::tempdir().unwrap();
    existing_profile(dir.path());
    let mut h = harness(dir.path(), &[], None);

    let out = h.shell.start();
    assert_eq!(h.shell.mode(), Mode::SetupTokenOnly);
    assert_eq!(out[0], Output::Question("Enter your replicate token".into()));
    assert!(matches!(&out[1], Output::Hint(hint) if hint.contains("r8_")));

    h.shell.handle("r8_token").await;
    assert_eq!(h.shell.mode(), Mode::Default);
    assert_eq!(h.shell.prompt(), "ada> ");
}

#[tokio::test]
async fn default_mode_commands() {
    let dir = tempfile::tempdir().unwrap();
    existing_profile(dir.path());
    let mut h = harness(dir.path(), &[], Some("r8_token"));
    h.shell.start();

    let out = h.shell.handle("hello?").await;
    assert_eq!(texts(&out), vec!["AI mode is inactive, use ‘/activate_ai’ to start."]);

    let out = h.shell.handle("/bogus").await;
    assert_eq!(
        texts(&out),
        vec!["Existing commands: '/bogus' not recognized by the terminal"]
    );

    assert_eq!(h.shell.handle("/CLEAR").await, vec![Output::Clear]);
    assert!(texts(&h.shell.handle("/help").await)[0].contains("/activate_ai"));
    assert!(h.shell.handle("").await.is_empty());
    assert_eq!(h.shell.handle("/quit").await, vec![Output::Exit]);
}

#[tokio::test]
async fn broken_model_config_blocks_ai_mode() {
    let dir = tempfile::tempdir().unwrap();
    let mut profile = existing_profile(dir.path());
    profile.active_model = "ghost".into();
    ProfileStore::new(dir.path().join("profile.json"))
        .write(&profile)
        .unwrap();
    let mut h = harness(dir.path(), &[], Some("r8_token"));

    let out = h.shell.start();
    assert!(texts(&out)[0].starts_with("API Initialization Error: Configuration for active model 'ghost' not found."));
    assert!(!h.shell.is_ai_ready());

    let out = h.shell.handle("/activate_ai").await;
    assert_eq!(
        texts(&out),
        vec!["AI API is not initialized. Please check your token and restart."]
    );
    assert_eq!(h.shell.mode(), Mode::Default);
}

#[tokio::test]
async fn answer_with_code_can_be_saved() {
    let dir = tempfile::tempdir().unwrap();
    let profile = existing_profile(dir.path());
    let mut h = harness(
        dir.path(),
        &[Ok("Here you go:\n```python\nprint(1)\n```\nRun it.")],
        Some("r8_token"),
    );
    h.shell.start();

    h.shell.handle("/activate_ai").await;
    assert_eq!(h.shell.mode(), Mode::Ai);
    assert_eq!(h.shell.prompt(), "ada/mode_ai> ");
    assert!(h.shell.will_query_model("write a script"));
    assert!(!h.shell.will_query_model("/path"));

    let out = h.shell.handle("write a script").await;
    assert!(matches!(&out[0], Output::Answer(a) if a.starts_with("ai_agent> Here you go")));
    assert_eq!(h.shell.mode(), Mode::SaveConfirmation);
    assert_eq!(h.shell.prompt(), "Do you want to save the code above? (y/n)> ");

    let out = h.shell.handle("maybe").await;
    assert_eq!(texts(&out), vec!["Invalid input. Please enter 'y' or 'n'."]);
    assert_eq!(h.shell.mode(), Mode::SaveConfirmation);

    h.shell.handle("Y").await;
    assert_eq!(h.shell.mode(), Mode::SaveFilename);

    let out = h.shell.handle("hello").await;
    assert_eq!(h.shell.mode(), Mode::Ai);
    assert!(texts(&out)[0].starts_with("Code saved to:"));

    let code = std::fs::read_to_string(profile.save_path.join("hello.py")).unwrap();
    assert_eq!(code, "print(1)");
    let docs = std::fs::read_to_string(profile.save_path.join("hello.md")).unwrap();
    assert!(docs.contains("[See code in .py file]"));
    assert!(docs.contains("Run it."));
    assert_eq!(h.prompts.lock().unwrap().as_slice(), ["write a script"]);
}

#[tokio::test]
async fn declining_save_returns_to_ai_mode() {
    let dir = tempfile::tempdir().unwrap();
    existing_profile(dir.path());
    let mut h = harness(dir.path(), &[Ok("```\nx\n```")], Some("r8_token"));
    h.shell.start();
    h.shell.handle("/activate_ai").await;
    h.shell.handle("q").await;
    assert_eq!(h.shell.mode(), Mode::SaveConfirmation);
    h.shell.handle("n").await;
    assert_eq!(h.shell.mode(), Mode::Ai);
}

#[tokio::test]
async fn prose_answers_and_errors_stay_in_ai_mode() {
    let dir = tempfile::tempdir().unwrap();
    existing_profile(dir.path());
    let mut h = harness(
        dir.path(),
        &[Ok("Just words."), Err("connection reset")],
        Some("r8_token"),
    );
    h.shell.start();
    h.shell.handle("/activate_ai").await;

    let out = h.shell.handle("explain").await;
    assert_eq!(out, vec![Output::Answer("ai_agent> Just words.".into())]);
    assert_eq!(h.shell.mode(), Mode::Ai);

    let out = h.shell.handle("again").await;
    let msg = &texts(&out)[0];
    assert!(msg.starts_with("Error communicating with Replicate API."));
    assert!(msg.contains("connection reset"));
    assert_eq!(h.shell.mode(), Mode::Ai);
}

#[tokio::test]
async fn ai_mode_slash_commands() {
    let dir = tempfile::tempdir().unwrap();
    existing_profile(dir.path());
    let mut h = harness(dir.path(), &[], Some("r8_token"));
    h.shell.start();
    h.shell.handle("/activate_ai").await;

    let out = h.shell.handle("/model").await;
    assert_eq!(
        texts(&out),
        vec!["You are already in AI mode and the /model command is not available in this mode."]
    );
    assert!(texts(&h.shell.handle("/path").await)[0].contains("out"));

    let out = h.shell.handle("/exit").await;
    assert_eq!(texts(&out), vec!["AI mode has been disabled."]);
    assert_eq!(h.shell.mode(), Mode::Default);
}

#[tokio::test]
async fn file_context_is_sent_once() {
    let dir = tempfile::tempdir().unwrap();
    existing_profile(dir.path());
    let source = dir.path().join("main.rs");
    std::fs::write(&source, "fn main() {}").unwrap();
    let mut h = harness(dir.path(), &[Ok("a"), Ok("b")], Some("r8_token"));
    h.shell.start();
    h.shell.handle("/activate_ai").await;

    let out = h.shell.handle(&format!("/file {}", source.display())).await;
    assert!(texts(&out)[0].starts_with("Loaded"));
    let out = h.shell.handle("/file /does/not/exist").await;
    assert!(texts(&out)[0].starts_with("Could not read file"));

    h.shell.handle("review").await;
    h.shell.handle("thanks").await;
    assert_eq!(
        h.prompts.lock().unwrap().as_slice(),
        ["[fn main() {}] review", "thanks"]
    );
}

#[tokio::test]
async fn model_management() {
    let dir = tempfile::tempdir().unwrap();
    existing_profile(dir.path());
    let mut h = harness(dir.path(), &[], Some("r8_token"));
    h.shell.start();

    h.shell.handle("/model").await;
    assert_eq!(h.shell.mode(), Mode::ModelManagement);
    assert_eq!(h.shell.prompt(), "ada/model> ");

    let out = h.shell.handle("/add llama meta/meta-llama-3-8b-instruct").await;
    assert_eq!(
        texts(&out),
        vec!["Model 'llama' added (meta/meta-llama-3-8b-instruct)."]
    );
    let out = h.shell.handle("/add broken not-a-model-id").await;
    assert!(texts(&out)[0].starts_with("Error:"));

    let listing = texts(&h.shell.handle("/list").await).remove(0);
    assert!(listing.starts_with("Available models:"));
    assert!(listing.contains(" - ibm-granite (ibm-granite/granite-3.3-8b-instruct) [ACTIVE]"));
    assert!(listing.contains(" - llama (meta/meta-llama-3-8b-instruct)"));

    let out = h.shell.handle("/set llama").await;
    assert!(out.iter().any(|o| matches!(o, Output::Welcome { model, .. } if model == "llama")));
    assert_eq!(h.store.read().unwrap().active_model, "llama");

    let out = h.shell.handle("/set ghost").await;
    assert_eq!(
        texts(&out),
        vec!["Error: Model 'ghost' not found in configuration."]
    );
    let out = h.shell.handle("/remove llama").await;
    assert!(texts(&out)[0].contains("is the active model"));
    let out = h.shell.handle("/remove ibm-granite").await;
    assert!(texts(&out)[0].contains("removed"));
    assert!(!h.store.read().unwrap().models.contains_key("ibm-granite"));

    let out = h.shell.handle("/frobnicate").await;
    assert!(texts(&out)[0].starts_with("Unknown command in model management."));
    h.shell.handle("/exit").await;
    assert_eq!(h.shell.mode(), Mode::Default);
}

#[tokio::test]
async fn redefining_active_model_reconnects() {
    let dir = tempfile::tempdir().unwrap();
    existing_profile(dir.path());
    let mut h = harness(dir.path(), &[Ok("first"), Ok("second")], Some("r8_token"));
    h.shell.start();

    h.shell.handle("/activate_ai").await;
    h.shell.handle("hello").await;
    h.shell.handle("/exit").await;

    h.shell.handle("/model").await;
    let out = h.shell.handle("/add ibm-granite meta/meta-llama-3-8b-instruct").await;
    assert_eq!(
        texts(&out),
        vec![
            "Model 'ibm-granite' added (meta/meta-llama-3-8b-instruct).",
            "Active model updated. Re-initializing API...",
        ]
    );
    assert!(out.iter().any(|o| matches!(o, Output::Welcome { .. })));
    h.shell.handle("/exit").await;

    h.shell.handle("/activate_ai").await;
    h.shell.handle("hello again").await;
    assert_eq!(
        *h.targets.lock().unwrap(),
        vec![
            "ibm-granite/granite-3.3-8b-instruct".to_string(),
            "meta/meta-llama-3-8b-instruct".to_string(),
        ]
    );
    assert_eq!(
        h.store.read().unwrap().models["ibm-granite"].id,
        "meta/meta-llama-3-8b-instruct"
    );
}

#[tokio::test]
async fn adding_other_model_keeps_backend() {
    let dir = tempfile::tempdir().unwrap();
    existing_profile(dir.path());
    let mut h = harness(dir.path(), &[], Some("r8_token"));
    h.shell.start();

    h.shell.handle("/model").await;
    let out = h.shell.handle("/add llama meta/meta-llama-3-8b-instruct").await;
    assert!(!out.iter().any(|o| matches!(o, Output::Welcome { .. })));
    h.shell.handle("/exit").await;
    h.shell.handle("/activate_ai").await;
    h.shell.handle("hi").await;
    assert_eq!(
        *h.targets.lock().unwrap(),
        vec!["ibm-granite/granite-3.3-8b-instruct".to_string()]
    );
}

#[tokio::test]
async fn profile_editing() {
    let dir = tempfile::tempdir().unwrap();
    existing_profile(dir.path());
    let mut h = harness(dir.path(), &[], Some("r8_token"));
    h.shell.start();

    h.shell.handle("/unsetup_profil").await;
    assert_eq!(h.shell.mode(), Mode::Unsetup);
    assert_eq!(h.shell.prompt(), "ada/unsetup_profil> ");

    let out = h.shell.handle("/rename_user \"Ada L\"").await;
    assert_eq!(
        texts(&out),
        vec!["The username has been successfully changed to 'Ada L'."]
    );
    assert_eq!(h.shell.mode(), Mode::Default);
    assert_eq!(h.shell.prompt(), "Ada L> ");
    assert_eq!(h.shell.profile().username, "Ada L");
    assert_eq!(h.store.read().unwrap().username, "Ada L");

    h.shell.handle("/unsetup_profil").await;
    let out = h.shell.handle("/rename_user").await;
    assert_eq!(texts(&out), vec!["Usage: /rename_user \"new_name\""]);

    let out = h.shell.handle("/change_path /definitely/not/here").await;
    assert_eq!(
        texts(&out),
        vec!["Error: The provided path is not a valid directory."]
    );
    let new_dir = dir.path().join("elsewhere");
    std::fs::create_dir_all(&new_dir).unwrap();
    h.shell
        .handle(&format!("/change_path \"{}\"", new_dir.display()))
        .await;
    assert_eq!(h.store.read().unwrap().save_path, new_dir);
    let out = h.shell.handle("/change_path").await;
    assert!(texts(&out)[0].starts_with("Current save path:"));

    assert_eq!(
        texts(&h.shell.handle("/what").await),
        vec!["Unrecognized subcommand"]
    );

    let out = h.shell.handle("/delete").await;
    assert_eq!(texts(&out), vec!["Profile data successfully deleted."]);
    assert!(h.store.read().is_none());
    assert_eq!(h.shell.mode(), Mode::SetupUsername);
    assert!(!h.shell.is_ai_ready());
}
