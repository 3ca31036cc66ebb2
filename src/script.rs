//! Plain-text register scripts
//!
//! One command per line:
//!
//! ```text
//! # comment
//! w 20 c7     write register 0x20 = 0xc7
//! s 1000      generate 1000 samples
//! ```
//!
//! Register and data bytes are hex, sample counts decimal.

use anyhow::{bail, Context, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Write { register: u8, data: u8 },
    Wait(usize),
}

fn parse_hex(token: Option<&str>, what: &str) -> Result<u8> {
    let token = token.with_context(|| format!("missing {}", what))?;
    let token = token.trim_start_matches("0x");
    u8::from_str_radix(token, 16).with_context(|| format!("bad {} '{}'", what, token))
}

pub fn parse_script(text: &str) -> Result<Vec<Command>> {
    let mut commands = vec![];

    for (number, line) in text.lines().enumerate() {
        let line = line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }

        let mut tokens = line.split_whitespace();
        let command = match tokens.next() {
            Some("w") => {
                let register = parse_hex(tokens.next(), "register").with_context(|| format!("line {}", number + 1))?;
                let data = parse_hex(tokens.next(), "data").with_context(|| format!("line {}", number + 1))?;
                Command::Write { register, data }
            }
            Some("s") => {
                let count = tokens.next().with_context(|| format!("line {}: missing sample count", number + 1))?;
                let count = count
                    .parse()
                    .with_context(|| format!("line {}: bad sample count '{}'", number + 1, count))?;
                Command::Wait(count)
            }
            Some(other) => bail!("line {}: unknown command '{}'", number + 1, other),
            None => continue,
        };

        if let Some(extra) = tokens.next() {
            bail!("line {}: unexpected '{}'", number + 1, extra);
        }
        commands.push(command);
    }

    Ok(commands)
}
