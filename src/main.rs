use anyhow::{Context, Result, bail};
use clap::Parser;
use granite_shell::config::Config;
use granite_shell::profile::ProfileStore;
use granite_shell::replicate::{Assistant, ReplicateClient, ReplicateConnector};
use granite_shell::shell::Shell;
use granite_shell::{logging, repl, response, storage};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "granite-shell",
    version,
    about = "Terminal shell for language models hosted on Replicate"
)]
struct Cli {
    /// Path to config file (defaults to ~/.granite-shell/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Path to the profile JSON (overrides the config file)
    #[arg(long, global = true)]
    profile: Option<PathBuf>,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Start the interactive shell (default)
    Shell,

    /// Send a single prompt with the stored profile and print the answer
    Ask {
        /// Prompt text
        prompt: String,

        /// Send this file's content as context
        #[arg(long)]
        file: Option<PathBuf>,

        /// Save the first code block; without a name a timestamped one is used
        #[arg(long)]
        save: Option<Option<String>>,

        /// Model name from the profile to use instead of the active one
        #[arg(long)]
        model: Option<String>,
    },

    /// Inspect or remove the stored profile
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },

    /// List the models configured in the profile
    Models,
}

#[derive(clap::Subcommand)]
enum ProfileAction {
    /// Print the profile as JSON
    Show,
    /// Print the profile file location
    Path,
    /// Delete the profile; the next shell start runs setup again
    Delete,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init_cli_logger(cli.verbose);

    let config_path = cli.config.unwrap_or_else(Config::default_path);
    let config = Config::load_or_default(&config_path)?;
    let store = ProfileStore::new(
        cli.profile
            .unwrap_or_else(|| config.storage.profile_path()),
    );

    match cli.command.unwrap_or(Command::Shell) {
        Command::Shell => {
            let token = config.token_from_env();
            let connector = ReplicateConnector::new(config.replicate.clone());
            let mut shell = Shell::new(connector, store, token);
            repl::run(&mut shell).await?;
            Ok(())
        }
        Command::Ask {
            prompt,
            file,
            save,
            model,
        } => ask(&config, &store, prompt, file, save, model).await,
        Command::Profile { action } => match action {
            ProfileAction::Show => {
                let profile = load_profile(&store)?;
                println!("{}", serde_json::to_string_pretty(&profile)?);
                Ok(())
            }
            ProfileAction::Path => {
                println!("{}", store.path().display());
                Ok(())
            }
            ProfileAction::Delete => {
                store.delete()?;
                println!("Profile data successfully deleted.");
                Ok(())
            }
        },
        Command::Models => {
            let profile = load_profile(&store)?;
            for (name, m) in &profile.models {
                let marker = if *name == profile.active_model {
                    " [ACTIVE]"
                } else {
                    ""
                };
                println!("{name}\t{}\t(input: {}){marker}", m.id, m.input_key);
            }
            Ok(())
        }
    }
}

fn load_profile(store: &ProfileStore) -> Result<granite_shell::profile::Profile> {
    match store.read() {
        Some(profile) => Ok(profile),
        None => bail!(
            "No profile at {}. Run `granite-shell` once to set it up.",
            store.path().display()
        ),
    }
}

async fn ask(
    config: &Config,
    store: &ProfileStore,
    prompt: String,
    file: Option<PathBuf>,
    save: Option<Option<String>>,
    model: Option<String>,
) -> Result<()> {
    let mut profile = load_profile(store)?;
    if let Some(name) = model {
        profile.set_active(&name)?;
    }
    let Some(token) = config.token_from_env() else {
        bail!(
            "{} is not set. Export it or add it to .env",
            config.replicate.api_token_env
        );
    };

    let mut client = ReplicateClient::new(profile.active_model_config()?, &token, &config.replicate)?;
    if let Some(path) = file {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        client.set_file_context(content);
    }

    let answer = client.send_prompt(&prompt).await?;
    print!("{}", repl::render_answer(&answer));

    if let Some(name) = save {
        let artifact = response::extract_artifact(&answer);
        if !artifact.has_code() {
            bail!("The answer has no code block to save");
        }
        let name = name.unwrap_or_else(|| {
            format!("answer-{}", chrono::Local::now().format("%Y%m%dT%H%M%S"))
        });
        let paths = storage::save_artifact(&profile.save_path, &name, &artifact)?;
        println!(
            "Code saved to: {}\nDocumentation saved to: {}",
            paths.code.display(),
            paths.docs.display()
        );
    }
    Ok(())
}
