use std::io::BufRead;
use std::str::FromStr;
use std::sync::mpsc::{self, Receiver};

/// User actions read from the terminal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    /// Select a camera by its option label
    Camera(String),
    Devices,
    Quit,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        match word.to_ascii_lowercase().as_str() {
            "start" => Ok(Command::Start),
            "stop" => Ok(Command::Stop),
            "camera" if !rest.is_empty() => Ok(Command::Camera(rest.to_string())),
            "camera" => Err("usage: camera <label>".to_string()),
            "devices" => Ok(Command::Devices),
            "quit" | "exit" => Ok(Command::Quit),
            _ => Err(format!("unknown command: {}", line)),
        }
    }
}

/// Read commands from stdin on a background thread
///
/// The channel closes when stdin reaches end of input.
pub fn spawn_command_reader() -> Receiver<Command> {
    let (tx, rx) = mpsc::channel();

    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    tracing::warn!("Failed to read command: {}", e);
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }

            match line.parse::<Command>() {
                Ok(command) => {
                    if tx.send(command).is_err() {
                        break;
                    }
                }
                Err(e) => tracing::warn!("{}", e),
            }
        }
    });

    rx
}
