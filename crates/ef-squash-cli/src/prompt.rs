use colored::*;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal;
use crossterm::tty::IsTty;
use ef_squash_core::{Confirm, Gate};
use std::io::{self, Write};

/// Reads a single key press from the terminal, or a line when stdin is not a
/// terminal. Only `y`/`Y` confirms.
pub struct ConsoleConfirm;

impl Confirm for ConsoleConfirm {
    fn confirm(&self, gate: Gate, prompt: &str) -> io::Result<bool> {
        if gate == Gate::DestroyMigrations {
            println!("{}", prompt.yellow());
        } else {
            println!("{}", prompt);
        }
        prompt_confirm("Press Y to continue or any other key to exit.")
    }
}

fn prompt_confirm(prompt: &str) -> io::Result<bool> {
    print!("{} ", prompt.yellow());
    io::stdout().flush()?;

    let accepted = if io::stdin().is_tty() {
        read_key()?
    } else {
        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        input.trim().eq_ignore_ascii_case("y")
    };
    println!();

    Ok(accepted)
}

fn read_key() -> io::Result<bool> {
    terminal::enable_raw_mode()?;
    let key = loop {
        match event::read() {
            Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => break Ok(key),
            Ok(_) => continue,
            Err(err) => break Err(err),
        }
    };
    terminal::disable_raw_mode()?;

    Ok(matches!(key?.code, KeyCode::Char('y') | KeyCode::Char('Y')))
}
