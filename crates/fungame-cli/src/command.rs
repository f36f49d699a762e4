//! Parsing of the line-oriented commands typed at the prompt.

use fungame_client::Action;

pub const HELP: &str = "\
commands:
  join                 join the stored game, or find/create one
  move <x> <y>         move to a tile
  attack <id>          attack a player or monster
  respawn              respawn after dying
  clear                forget the stored player
  state                fetch a fresh snapshot over REST
  roster               print the player list
  help                 show this text
  quit                 leave";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Join,
    Act(Action),
    Clear,
    State,
    Roster,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("unknown command `{0}` (try `help`)")]
    Unknown(String),

    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("`{0}` is not a coordinate")]
    BadCoordinate(String),
}

/// Parse one input line. Blank lines yield `Ok(None)`.
pub fn parse(line: &str) -> Result<Option<Command>, CommandError> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    let command = match (verb.to_ascii_lowercase().as_str(), args.as_slice()) {
        ("join", []) => Command::Join,
        ("move", [x, y]) => Command::Act(Action::Move {
            x: coordinate(x)?,
            y: coordinate(y)?,
        }),
        ("move", _) => return Err(CommandError::Usage("move <x> <y>")),
        ("attack", [target]) => Command::Act(Action::Attack {
            target_id: target.to_string(),
        }),
        ("attack", _) => return Err(CommandError::Usage("attack <id>")),
        ("respawn", []) => Command::Act(Action::Respawn),
        ("clear", []) => Command::Clear,
        ("state", []) => Command::State,
        ("roster", []) => Command::Roster,
        ("help" | "?", _) => Command::Help,
        ("quit" | "exit", []) => Command::Quit,
        ("join" | "respawn" | "clear" | "state" | "roster" | "quit" | "exit", _) => {
            return Err(CommandError::Usage("no arguments expected"));
        }
        (other, _) => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(Some(command))
}

fn coordinate(word: &str) -> Result<i32, CommandError> {
    word.parse()
        .map_err(|_| CommandError::BadCoordinate(word.to_string()))
}
