use std::path::{Path, PathBuf};

use anyhow::Result;
use ariadne::{Color, Fmt, Label, Report, ReportKind, Source};
use byneed::{
    display, normalize, parser, prelude::*, PoolConfig, Stop, Symbols, DEFAULT_MAX_STEPS,
};
use clap::Parser;
use util::repl;

#[derive(Parser, Debug)]
#[command(version, about = "Call-by-need normalizer for the untyped lambda calculus")]
struct Config {
    /// Give up normalizing a term after this many steps
    #[arg(long, default_value_t = DEFAULT_MAX_STEPS)]
    max_steps: usize,
    /// Where to keep the line history
    #[arg(long, default_value = "/tmp/byneed.history")]
    history: PathBuf,
    /// Do not read or write a history file
    #[arg(long)]
    no_history: bool,
    /// Size of the first block of term nodes
    #[arg(long, default_value_t = 16)]
    pool_block: usize,
    /// Refuse to allocate more than this many term nodes
    #[arg(long)]
    max_nodes: Option<usize>,
}

fn build_report(e: &ParseError, offset: usize) -> Report<Span> {
    let label = match e {
        ParseError::Lex { .. } => format!("{}", "Invalid token".fg(Color::Red)),
        ParseError::Empty { .. } => format!("{}", "Nothing here".fg(Color::Red)),
        ParseError::Unexpected { found, .. } => format!("Unexpected {}", found.fg(Color::Red)),
        ParseError::UnknownIdentifier { name, .. } => {
            format!("{} is not defined", name.fg(Color::Yellow))
        }
        ParseError::FreeVariable { index, .. } => {
            format!("Nothing binds {}", index.fg(Color::Yellow))
        }
        ParseError::Internal(_) | ParseError::OutOfMemory(_) => e.to_string(),
    };
    Report::build(ReportKind::Error, (), offset)
        .with_message(e)
        .with_label(
            Label::new(offset..offset + 1)
                .with_message(label)
                .with_color(Color::Red),
        )
        .finish()
}

type CommandResult<'a> = Result<(), (&'a str, ParseError)>;

struct Repl {
    pool: Pool,
    symbols: Symbols,
    max_steps: usize,
    history: Option<PathBuf>,
    finished: bool,
}
impl Repl {
    fn new(config: Config) -> Self {
        Self {
            pool: Pool::with_config(PoolConfig {
                block: config.pool_block,
                max_nodes: config.max_nodes,
            }),
            symbols: Symbols::new(),
            max_steps: config.max_steps,
            history: (!config.no_history).then_some(config.history),
            finished: false,
        }
    }

    fn tokenize(input: &str) -> CommandResult {
        let tokens = parser::tokenize(input)
            .map_err(|e| (input, e))?
            .iter()
            .map(Spanned::value)
            .cloned()
            .collect::<Vec<_>>();
        println!("{tokens:?}");
        Ok(())
    }

    fn parse(input: &str) -> CommandResult {
        let expr = parser::parse(input).map_err(|e| (input, e))?;
        println!("{expr}");
        Ok(())
    }

    fn build<'i>(&mut self, input: &'i str) -> Result<NodeId, (&'i str, ParseError)> {
        byneed::parse(&mut self.pool, input, &self.symbols).map_err(|e| (input, e))
    }

    fn set<'i>(&mut self, input: &'i str) -> CommandResult<'i> {
        let Some((name, term)) = input.trim().split_once(char::is_whitespace) else {
            eprintln!("Usage: :set name term");
            return Ok(());
        };
        let term = self.build(term)?;
        self.symbols.define(&mut self.pool, name, term);
        Ok(())
    }

    fn reduce(&mut self, name: &str) {
        let Some(term) = self.symbols.take(name) else {
            eprintln!("Error: identifier {name} not found.");
            return;
        };
        let result = normalize(&mut self.pool, term, self.max_steps, |_, _, _| {});
        match result.stop {
            Stop::NormalForm => {}
            Stop::StepCap => eprintln!(
                "Warning: {name} did not reach a normal form within {} steps.",
                result.steps
            ),
            Stop::OutOfMemory => eprintln!(
                "Warning: ran out of term nodes reducing {name}; kept it as it was after {} steps.",
                result.steps
            ),
        }
        self.symbols.define(&mut self.pool, name, result.term);
    }

    fn print(&self, name: &str) {
        match self.symbols.get(name) {
            Some(term) => println!("{}", display(&self.pool, term)),
            None => eprintln!("Error: identifier {name} not found."),
        }
    }

    fn trace<'i>(&mut self, input: &'i str) -> CommandResult<'i> {
        let term = self.build(input)?;
        println!("{:>14}: {}", "Formatted", display(&self.pool, term));
        let result = normalize(&mut self.pool, term, self.max_steps, |pool, step, term| {
            println!("{:>14}: {}", step.to_string(), display(pool, term))
        });
        match result.stop {
            Stop::NormalForm => {
                println!("{:>14}: {}", "Normal form", display(&self.pool, result.term))
            }
            Stop::StepCap => println!(
                "{:>14}: no normal form within {} steps",
                "Gave up", result.steps
            ),
            Stop::OutOfMemory => println!(
                "{:>14}: ran out of term nodes after {} steps",
                "Gave up", result.steps
            ),
        }
        self.pool.release(result.term);
        Ok(())
    }

    fn show_stats(&self) {
        println!(
            "{} nodes live, {} free, {} named terms",
            self.pool.live(),
            self.pool.available(),
            self.symbols.len()
        );
        if !self.symbols.is_empty() {
            println!("{}", self.symbols.names().join(" "));
        }
    }

    fn show_help() {
        println!(
            "{}",
            r#"
term                -- same as :trace term
:set        name term
                    -- parse term and store it under name
:reduce     name    -- normalize the term stored under name
:print      name    -- show the term stored under name
:echo       text    -- print text as is
:tokenize   term    -- show tokenized term
:parse      term    -- show parsed term, fully parenthesised
:trace      term    -- show every step of normalizing the term
:stats              -- show how many term nodes are in use
:help               -- show this message
:exit               -- leave

Terms use numeric variables: `lambda lambda 2` is K, and `.` may stand in
for `lambda`. End a line with \ to continue on the next.
        "#
            .trim()
        );
    }

    fn handle_repl_input<'i>(&mut self, input: &'i str) -> CommandResult<'i> {
        let (cmd, input) = if let Some(stripped) = input.strip_prefix(':') {
            let stripped = stripped.trim();
            stripped
                .split_once(char::is_whitespace)
                .unwrap_or((stripped, ""))
        } else {
            ("", input)
        };
        match cmd {
            "s" | "set" => {
                self.set(input)?;
            }
            "r" | "reduce" => {
                self.reduce(input.trim());
            }
            "pr" | "print" => {
                self.print(input.trim());
            }
            "echo" => {
                println!("{input}");
            }
            "to" | "tokenize" => {
                Self::tokenize(input)?;
            }
            "pa" | "parse" => {
                Self::parse(input)?;
            }
            "" | "t" | "trace" => {
                self.trace(input)?;
            }
            "stats" => {
                self.show_stats();
            }
            "h" | "he" | "hel" | "help" => {
                Self::show_help();
            }
            "q" | "quit" | "exit" => {
                self.finished = true;
            }
            _ => {
                eprintln!("Error: unrecognised command {cmd}.");
                Self::show_help();
            }
        }
        Ok(())
    }
}
impl repl::Repl for Repl {
    type Error = anyhow::Error;
    fn history(&self) -> Option<&Path> {
        self.history.as_deref()
    }
    fn evaluate(&mut self, input: String) -> Result<(), Self::Error> {
        if input.trim().is_empty() {
            return Ok(());
        }
        if let Err((input, e)) = self.handle_repl_input(&input) {
            match e.offset() {
                Some(offset) => build_report(&e, offset).eprint(Source::from(input))?,
                None => eprintln!("Error: {e}"),
            }
        }
        Ok(())
    }
    fn finished(&self) -> bool {
        self.finished
    }
}
impl Drop for Repl {
    fn drop(&mut self) {
        self.symbols.clear(&mut self.pool);
        log::debug!("{} nodes still live at exit", self.pool.live());
    }
}

/// Passes over a term recurse as deep as the term is nested.
const STACK_SIZE: usize = 512 * 1024 * 1024;

fn run(config: Config) -> Result<()> {
    println!("Hi, this is a call-by-need lambda calculus REPL. :h to show help");
    println!();
    repl::start_repl(Repl::new(config))?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let config = Config::parse();
    log::debug!("{config:?}");
    let session = std::thread::Builder::new()
        .name("repl".to_string())
        .stack_size(STACK_SIZE)
        .spawn(move || run(config))?;
    session
        .join()
        .map_err(|_| anyhow::anyhow!("the REPL thread panicked"))?
}

#[cfg(test)]
mod test {
    use super::*;

    fn repl() -> Repl {
        Repl::new(Config::parse_from(["byneed", "--no-history"]))
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::parse_from(["byneed"]);
        assert_eq!(config.max_steps, DEFAULT_MAX_STEPS);
        assert_eq!(config.history, PathBuf::from("/tmp/byneed.history"));
        assert_eq!(config.pool_block, 16);
        assert_eq!(config.max_nodes, None);

        let config = Config::parse_from(["byneed", "--max-steps", "10", "--max-nodes", "100"]);
        assert_eq!(config.max_steps, 10);
        assert_eq!(config.max_nodes, Some(100));
    }

    #[test]
    fn test_set_reduce_print() {
        let mut repl = repl();
        repl.handle_repl_input(":set I lambda 1").unwrap();
        repl.handle_repl_input(":set x I I").unwrap();
        assert_eq!(
            display(&repl.pool, repl.symbols.get("x").unwrap()).to_string(),
            "(lambda 1) lambda 1"
        );
        repl.handle_repl_input(":reduce x").unwrap();
        assert_eq!(
            display(&repl.pool, repl.symbols.get("x").unwrap()).to_string(),
            "lambda 1"
        );
        // both names now share one node
        assert_eq!(repl.symbols.get("x"), repl.symbols.get("I"));
    }

    #[test]
    fn test_errors_carry_their_input() {
        let mut repl = repl();
        assert_eq!(
            repl.handle_repl_input(":set bad lambda (1 2)"),
            Err((
                "lambda (1 2)",
                ParseError::FreeVariable {
                    index: 2,
                    offset: 10
                }
            ))
        );
        assert!(repl.symbols.is_empty());
        assert_eq!(repl.pool.live(), 0);
    }

    #[test]
    fn test_trace_releases_its_term() {
        let mut repl = repl();
        repl.handle_repl_input("(lambda lambda 2 1) (lambda 1)").unwrap();
        assert_eq!(repl.pool.live(), 0);
        repl.handle_repl_input(":exit").unwrap();
        assert!(repl.finished);
    }

    #[test]
    fn test_step_cap_keeps_term() {
        let mut repl = Repl::new(Config::parse_from([
            "byneed",
            "--no-history",
            "--max-steps",
            "3",
        ]));
        repl.handle_repl_input(":set w (lambda 1 1) (lambda 1 1)").unwrap();
        repl.handle_repl_input(":reduce w").unwrap();
        assert_eq!(
            display(&repl.pool, repl.symbols.get("w").unwrap()).to_string(),
            "(lambda 1 1) lambda 1 1"
        );
    }

    #[test]
    fn test_commands_split_on_any_whitespace() {
        let mut repl = repl();
        repl.handle_repl_input(":set\tI lambda 1").unwrap();
        repl.handle_repl_input(":print\tI").unwrap();
        repl.handle_repl_input(":exit  ").unwrap();
        assert!(repl.finished);
        assert_eq!(
            display(&repl.pool, repl.symbols.get("I").unwrap()).to_string(),
            "lambda 1"
        );
    }

    #[test]
    fn test_running_out_of_nodes_keeps_the_session() {
        let mut repl = Repl::new(Config::parse_from([
            "byneed",
            "--no-history",
            "--max-nodes",
            "40",
        ]));
        repl.handle_repl_input(":set I lambda 1").unwrap();
        repl.handle_repl_input(":set w (lambda 1 1 1) (lambda 1 1 1)").unwrap();
        repl.handle_repl_input(":reduce w").unwrap();
        let w = repl.symbols.get("w").unwrap();
        assert!(display(&repl.pool, w).to_string().starts_with("(lambda 1 1 1) "));

        repl.handle_repl_input(":set w I").unwrap();
        assert_eq!(repl.pool.live(), 2);
        repl.handle_repl_input("(lambda 1 1 1) (lambda 1 1 1)").unwrap();
        assert_eq!(repl.pool.live(), 2);

        repl.handle_repl_input(":set x I I").unwrap();
        repl.handle_repl_input(":reduce x").unwrap();
        assert_eq!(repl.symbols.get("x"), repl.symbols.get("I"));
    }

    #[test]
    fn test_deep_terms_fit_on_the_session_stack() {
        let depth = 10000;
        let session = std::thread::Builder::new()
            .stack_size(STACK_SIZE)
            .spawn(move || {
                let mut repl = repl();
                let input = format!(":set deep {}(lambda 1) 1", "lambda ".repeat(depth));
                repl.handle_repl_input(&input).unwrap();
                repl.handle_repl_input(":reduce deep").unwrap();
                display(&repl.pool, repl.symbols.get("deep").unwrap()).to_string()
            })
            .unwrap();
        assert_eq!(
            session.join().unwrap(),
            format!("{}1", "lambda ".repeat(depth))
        );
    }
}
