use crate::error::{Result, SafeUpdateError};
use crate::selection::{Choice, ChoiceValue, SelectionItem};
use crate::version::VersionBump;
use colored::Colorize;
use std::collections::BTreeSet;
use std::io::{self, BufRead, BufReader, Stdin, Write};

/// Presents the choice list and returns what the operator picked.
///
/// Implementations signal an aborted prompt with [`SafeUpdateError::UserCancelled`].
pub trait Picker {
    fn pick(&mut self, choices: &[Choice]) -> Result<Vec<SelectionItem>>;
}

/// Line-oriented prompt over any reader/writer pair.
pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl<W: Write> Prompter<BufReader<Stdin>, W> {
    /// Reads answers from stdin and writes prompts to `output`.
    pub fn stdin(output: W) -> Self {
        Self::new(BufReader::new(io::stdin()), output)
    }
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn say(&mut self, line: impl std::fmt::Display) -> Result<()> {
        writeln!(self.output, "{line}")?;
        Ok(())
    }

    /// Prints `question` and reads one trimmed line. End of input counts as cancellation.
    pub fn ask(&mut self, question: &str) -> Result<String> {
        write!(self.output, "{}", question.bold())?;
        self.output.flush()?;

        let mut input = String::new();
        if self.input.read_line(&mut input)? == 0 {
            return Err(SafeUpdateError::UserCancelled);
        }
        Ok(input.trim().to_string())
    }

    /// Yes/no question defaulting to "no"; `q` cancels the run.
    pub fn confirm(&mut self, question: &str) -> Result<bool> {
        loop {
            let answer = self.ask(question)?.to_lowercase();
            match answer.as_str() {
                "y" | "yes" => return Ok(true),
                "" | "n" | "no" => return Ok(false),
                "q" | "quit" => return Err(SafeUpdateError::UserCancelled),
                _ => self.say("Please answer with y(es), n(o), or q(uit).".red())?,
            }
        }
    }
}

/// Parsed answer to the selection prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionInput {
    All,
    Indices(BTreeSet<usize>),
    Cancel,
}

/// Parses `1,3,5-7`, `a`/`all`, empty (nothing) or `q` against `count` numbered lines.
///
/// Returned indices are zero-based.
pub fn parse_selection(input: &str, count: usize) -> std::result::Result<SelectionInput, String> {
    let trimmed = input.trim().to_lowercase();
    match trimmed.as_str() {
        "q" | "quit" => return Ok(SelectionInput::Cancel),
        "a" | "all" => return Ok(SelectionInput::All),
        "" | "n" | "none" => return Ok(SelectionInput::Indices(BTreeSet::new())),
        _ => {}
    }

    let mut picked = BTreeSet::new();
    for part in trimmed.split([',', ' ']).filter(|p| !p.is_empty()) {
        let (start, end) = match part.split_once('-') {
            Some((a, b)) => (parse_index(a, count)?, parse_index(b, count)?),
            None => {
                let index = parse_index(part, count)?;
                (index, index)
            }
        };
        if start > end {
            return Err(format!("Invalid range '{part}'"));
        }
        picked.extend((start..=end).map(|i| i - 1));
    }
    Ok(SelectionInput::Indices(picked))
}

fn parse_index(raw: &str, count: usize) -> std::result::Result<usize, String> {
    match raw.trim().parse::<usize>() {
        Ok(n) if (1..=count).contains(&n) => Ok(n),
        _ => Err(format!("'{}' is not between 1 and {count}", raw.trim())),
    }
}

/// Terminal multi-select picker. Nothing is pre-selected.
pub struct TerminalPicker<R, W> {
    prompter: Prompter<R, W>,
}

impl<R: BufRead, W: Write> TerminalPicker<R, W> {
    pub fn new(prompter: Prompter<R, W>) -> Self {
        Self { prompter }
    }
}

impl<R: BufRead, W: Write> Picker for TerminalPicker<R, W> {
    fn pick(&mut self, choices: &[Choice]) -> Result<Vec<SelectionItem>> {
        let mut numbered = Vec::new();
        for choice in choices {
            match &choice.value {
                ChoiceValue::Header { .. } => {
                    self.prompter.say(format!("\n{}", choice.label.cyan().bold()))?;
                }
                ChoiceValue::Package {
                    item,
                    bump,
                    current_version,
                } => {
                    numbered.push(item);
                    let marker = if choice.checked { "[x]" } else { "[ ]" };
                    let new_version = match bump {
                        VersionBump::Major => item.version.red().bold(),
                        VersionBump::Minor => item.version.yellow().bold(),
                        VersionBump::Patch => item.version.green().bold(),
                    };
                    self.prompter.say(format!(
                        "  {:>2}) {} {}  {} → {}",
                        numbered.len(),
                        marker,
                        item.name,
                        current_version.dimmed(),
                        new_version
                    ))?;
                }
            }
        }

        if numbered.is_empty() {
            return Ok(Vec::new());
        }

        loop {
            let answer = self.prompter.ask(&format!(
                "\nSelect updates [1-{} | e.g. 1,3,5-7 | a=all | enter=none | q=quit]: ",
                numbered.len()
            ))?;

            match parse_selection(&answer, numbered.len()) {
                Ok(SelectionInput::Cancel) => {
                    self.prompter
                        .say("Stopping update process at user request.".yellow())?;
                    return Err(SafeUpdateError::UserCancelled);
                }
                Ok(SelectionInput::All) => {
                    return Ok(numbered.into_iter().cloned().collect());
                }
                Ok(SelectionInput::Indices(indices)) => {
                    return Ok(indices.into_iter().map(|i| numbered[i].clone()).collect());
                }
                Err(message) => self.prompter.say(message.red())?,
            }
        }
    }
}

/// Non-interactive picker that opts in to every offered update.
#[derive(Debug, Default)]
pub struct SelectAllPicker;

impl Picker for SelectAllPicker {
    fn pick(&mut self, choices: &[Choice]) -> Result<Vec<SelectionItem>> {
        Ok(choices.iter().filter_map(Choice::item).cloned().collect())
    }
}
