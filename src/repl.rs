//! Line-oriented terminal front-end for [`Shell`].

use crate::error::Result;
use crate::replicate::Connector;
use crate::response::{self, AGENT_PREFIX, SEPARATOR_WIDTH, Segment};
use crate::shell::{Output, Shell};
use colored::Colorize;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

const CLEAR_SCREEN: &str = "\x1B[2J\x1B[H";

const BANNER: &str = r"
  ____                 _ _       ____  _          _ _
 / ___|_ __ __ _ _ __ (_) |_ ___/ ___|| |__   ___| | |
| |  _| '__/ _` | '_ \| | __/ _ \___ \| '_ \ / _ \ | |
| |_| | | | (_| | | | | | ||  __/___) | | | |  __/ | |
 \____|_|  \__,_|_| |_|_|\__\___|____/|_| |_|\___|_|_|
";

/// Runs the interactive loop until `/quit` or end of input.
pub async fn run<C: Connector>(shell: &mut Shell<C>) -> Result<()> {
    let mut stdout = std::io::stdout();
    for output in shell.start() {
        write!(stdout, "{}", render(&output))?;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        write!(stdout, "{}", shell.prompt().bright_blue())?;
        stdout.flush()?;

        let Some(line) = lines.next_line().await? else {
            writeln!(stdout)?;
            debug!("stdin closed");
            return Ok(());
        };

        if shell.will_query_model(&line) {
            writeln!(stdout, "{}", "thinking...".dimmed())?;
            stdout.flush()?;
        }

        for output in shell.handle(&line).await {
            if output == Output::Exit {
                return Ok(());
            }
            write!(stdout, "{}", render(&output))?;
        }
    }
}

/// Terminal text for one output event, newline-terminated (except `Clear`).
pub fn render(output: &Output) -> String {
    match output {
        Output::Text(text) => format!("{text}\n"),
        Output::Question(text) => format!("{}\n", text.bold()),
        Output::Hint(text) => format!("{}\n", text.dimmed().italic()),
        Output::Answer(answer) => render_answer(answer),
        Output::Welcome { username, model } => format!(
            "{}\nWelcome to GraniteShell, {username}. To find out the command, type `/help`!\n{}\n",
            BANNER.bright_blue(),
            format!("Active AI Model: {model}").green()
        ),
        Output::Clear => CLEAR_SCREEN.to_string(),
        Output::Exit => String::new(),
    }
}

pub fn render_answer(answer: &str) -> String {
    let separator = "-".repeat(SEPARATOR_WIDTH);
    let mut rendered = format!("{}\n{}", separator.dimmed(), AGENT_PREFIX.green());
    for (i, segment) in response::split_blocks(answer).iter().enumerate() {
        if i > 0 {
            rendered.push('\n');
        }
        match segment {
            Segment::Text(text) => {
                rendered.push_str(text);
                rendered.push('\n');
            }
            Segment::Code { language, body } => {
                let header = format!(" {} ", Segment::code_header(language));
                rendered.push_str(&format!("\n{}\n", header.bold().on_bright_black()));
                for line in body.lines() {
                    rendered.push_str(&format!("{}\n", line.bright_white()));
                }
            }
        }
    }
    rendered.push_str(&format!("{}\n", separator.dimmed()));
    rendered
}
