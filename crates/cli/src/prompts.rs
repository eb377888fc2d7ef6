use std::io::{self, IsTerminal, Write};

use anyhow::{Result, bail};

/// Asks a yes/no question on stderr. `assume_yes` skips the prompt.
pub fn confirm(message: &str, assume_yes: bool) -> Result<bool> {
  if assume_yes {
    return Ok(true);
  }

  if !io::stdin().is_terminal() || !io::stderr().is_terminal() {
    bail!("Refusing to prompt in a non-interactive session. Pass --yes to proceed.");
  }

  write!(io::stderr(), "{} [y/N] ", message)?;
  io::stderr().flush()?;

  let mut answer = String::new();
  io::stdin().read_line(&mut answer)?;

  Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}
