//! Interactive input helpers.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};

/// Read one trimmed line from stdin
pub fn line(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin()
        .lock()
        .read_line(&mut input)
        .context("Failed to read from stdin")?;
    Ok(input.trim().to_string())
}

/// Read a password without echoing it
pub fn password(label: &str) -> Result<String> {
    rpassword::prompt_password(label).context("Failed to read password")
}

/// Ask a yes/no question; anything but y/yes is a no
pub fn confirm(question: &str) -> Result<bool> {
    let answer = line(&format!("{} [y/N] ", question))?;
    Ok(is_yes(&answer))
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
