/// Terminal line editor
///
/// The REPL's input collaborator: raw-mode editing via crossterm when
/// stdin is a terminal, with insert, backspace/delete, cursor movement,
/// Ctrl-A/E/K, and one-line history recall on Up. Only the completed line
/// crosses the boundary into the interpreter.
///
/// When stdin is not a TTY (a pipe or a file of Forth source), the reader
/// falls back to plain buffered lines so the system can be driven
/// serially.
///
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode},
    tty::IsTty,
};
use std::io::{self, BufRead, Write};

pub struct ForthLineEditor {
    buffer: Vec<char>,
    cursor: usize,
    previous_line: Option<String>,
}

impl ForthLineEditor {
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            cursor: 0,
            previous_line: None,
        }
    }

    /// Read one line in raw mode; None means EOF (Esc or Ctrl-D).
    pub fn run(&mut self, prompt: &str) -> Option<String> {
        self.buffer.clear();
        self.cursor = 0;

        enable_raw_mode().ok()?;
        print!("{prompt}");
        io::stdout().flush().ok()?;

        let result = loop {
            let Ok(Event::Key(key)) = event::read() else {
                continue;
            };
            match key.code {
                KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    print!("\r\n");
                    io::stdout().flush().ok()?;
                    break None;
                }
                KeyCode::Char('a') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    while self.cursor > 0 {
                        self.cursor -= 1;
                        print!("\x1b[D");
                    }
                    io::stdout().flush().ok()?;
                }
                KeyCode::Char('e') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    while self.cursor < self.buffer.len() {
                        self.cursor += 1;
                        print!("\x1b[C");
                    }
                    io::stdout().flush().ok()?;
                }
                KeyCode::Char('k') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    print!("\x1b[K");
                    self.buffer.truncate(self.cursor);
                    io::stdout().flush().ok()?;
                }
                KeyCode::Char(c) if key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT => {
                    self.buffer.insert(self.cursor, c);
                    self.cursor += 1;
                    self.redraw(prompt);
                }
                KeyCode::Backspace => {
                    if self.cursor > 0 {
                        self.cursor -= 1;
                        self.buffer.remove(self.cursor);
                        self.redraw(prompt);
                    }
                }
                KeyCode::Delete => {
                    if self.cursor < self.buffer.len() {
                        self.buffer.remove(self.cursor);
                        self.redraw(prompt);
                    }
                }
                KeyCode::Left => {
                    if self.cursor > 0 {
                        self.cursor -= 1;
                        print!("\x1b[D");
                        io::stdout().flush().ok()?;
                    }
                }
                KeyCode::Right => {
                    if self.cursor < self.buffer.len() {
                        self.cursor += 1;
                        print!("\x1b[C");
                        io::stdout().flush().ok()?;
                    }
                }
                KeyCode::Home => {
                    while self.cursor > 0 {
                        self.cursor -= 1;
                        print!("\x1b[D");
                    }
                    io::stdout().flush().ok()?;
                }
                KeyCode::End => {
                    while self.cursor < self.buffer.len() {
                        self.cursor += 1;
                        print!("\x1b[C");
                    }
                    io::stdout().flush().ok()?;
                }
                KeyCode::Up => {
                    if let Some(prev) = self.previous_line.clone() {
                        self.buffer = prev.chars().collect();
                        self.cursor = self.buffer.len();
                        self.redraw(prompt);
                    }
                }
                KeyCode::Enter => {
                    let line: String = self.buffer.iter().collect();
                    self.previous_line = Some(line.clone());
                    print!("\r\n");
                    io::stdout().flush().ok()?;
                    break Some(line);
                }
                KeyCode::Esc => {
                    print!("\r\n");
                    io::stdout().flush().ok()?;
                    break None;
                }
                _ => {}
            }
        };

        disable_raw_mode().ok()?;
        result
    }

    fn redraw(&self, prompt: &str) {
        let line: String = self.buffer.iter().collect();
        print!("\r{prompt}{line}\x1b[K");
        let back = self.buffer.len() - self.cursor;
        for _ in 0..back {
            print!("\x1b[D");
        }
        let _ = io::stdout().flush();
    }
}

/// The REPL-facing reader: interactive editing on a TTY, plain buffered
/// lines otherwise.
pub struct LineReader {
    editor: ForthLineEditor,
    interactive: bool,
}

impl LineReader {
    pub fn new() -> LineReader {
        LineReader {
            editor: ForthLineEditor::new(),
            interactive: io::stdin().is_tty(),
        }
    }

    /// Read one completed line; None at end of input.
    pub fn read_line(&mut self, prompt: &str) -> Option<String> {
        if self.interactive {
            self.editor.run(prompt)
        } else {
            let mut line = String::new();
            match io::stdin().lock().read_line(&mut line) {
                Ok(0) | Err(_) => None,
                Ok(_) => {
                    while line.ends_with(['\n', '\r']) {
                        line.pop();
                    }
                    Some(line)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_editor_starts_empty() {
        let ed = ForthLineEditor::new();
        assert!(ed.buffer.is_empty());
        assert_eq!(ed.cursor, 0);
        assert!(ed.previous_line.is_none());
    }
}
