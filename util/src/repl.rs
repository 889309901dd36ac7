use std::path::Path;

use rustyline::{error::ReadlineError, Editor};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error<E> {
    #[error(transparent)]
    Readline(ReadlineError),
    #[error("Cannot save history to {path}: {source}")]
    History { path: String, source: ReadlineError },
    #[error("Eval failed: {0:?}")]
    EvalError(E),
}

pub trait Repl {
    type Error: std::fmt::Debug;
    const PROMPT: &'static str = ">> ";
    const CONTINUATION: &'static str = ".. ";
    fn history(&self) -> Option<&Path> {
        None
    }
    fn evaluate(&mut self, input: String) -> Result<(), Self::Error>;
    /// Checked after every input; ends the loop once true.
    fn finished(&self) -> bool {
        false
    }
}

/// Appends one physical line to the pending input. Returns the complete input
/// unless the line ends with `\`, which continues it on the next line.
fn join_line(pending: &mut Option<String>, mut line: String) -> Option<String> {
    let continued = line.ends_with('\\');
    if continued {
        line.pop();
        line.push('\n');
    }
    let input = match pending.take() {
        Some(mut input) => {
            input.push_str(&line);
            input
        }
        None => line,
    };
    if continued {
        *pending = Some(input);
        None
    } else {
        Some(input)
    }
}

pub fn start_repl<R: Repl>(mut repl: R) -> Result<(), Error<R::Error>> {
    let mut editor = Editor::<()>::new();
    if let Some(history) = repl.history() {
        if let Err(e) = editor.load_history(history) {
            log::debug!("no history loaded from {}: {e}", history.display());
        }
    }
    let mut pending: Option<String> = None;
    loop {
        let prompt = if pending.is_some() {
            R::CONTINUATION
        } else {
            R::PROMPT
        };
        match editor.readline(prompt) {
            Ok(line) => {
                let Some(input) = join_line(&mut pending, line) else {
                    continue;
                };
                editor.add_history_entry(input.as_str());
                repl.evaluate(input).map_err(Error::EvalError)?;
                if let Some(history) = repl.history() {
                    editor
                        .save_history(history)
                        .map_err(|source| Error::History {
                            path: history.display().to_string(),
                            source,
                        })?;
                }
                if repl.finished() {
                    println!("Bye!");
                    break Ok(());
                }
            }
            Err(ReadlineError::Interrupted) if pending.is_some() => {
                pending = None;
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => {
                println!("Bye!");
                break Ok(());
            }
            Err(e) => break Err(Error::Readline(e)),
        }
    }
}
