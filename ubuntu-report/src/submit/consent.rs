// SPDX-License-Identifier: GPL-3.0-or-later

use std::io::{self, BufRead, Write};

/// The decision of the user about the collected metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consent {
    /// Send the collected metrics.
    Granted,
    /// Send the opt-out message instead of the metrics.
    Declined,
    /// Send nothing and write nothing.
    Quit,
}

/// What an empty answer to the prompt means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyAnswer {
    #[default]
    Quit,
    Decline,
}

impl EmptyAnswer {
    fn prompt(&self) -> &'static str {
        match self {
            EmptyAnswer::Quit => "[y (send metrics)/n (send opt out message)/Q (quit)]",
            EmptyAnswer::Decline => "[y (send metrics)/N (send opt out message)/q (quit)]",
        }
    }
}

/// Ask the user until a valid answer is given.
///
/// Answers are case insensitive: `y`/`yes`, `n`/`no` and `q`/`quit`.
/// The end of the input (or an interrupted read) is a quit.
pub fn ask(
    input: &mut impl BufRead,
    output: &mut impl Write,
    on_empty: EmptyAnswer,
) -> io::Result<Consent> {
    loop {
        write!(output, "Do you agree to report this? {} ", on_empty.prompt())?;
        output.flush()?;

        let Some(line) = read_answer(input)? else {
            log::info!("Program interrupted");
            return Ok(Consent::Quit);
        };

        let consent = match line.trim().to_lowercase().as_str() {
            "y" | "yes" => Consent::Granted,
            "n" | "no" => Consent::Declined,
            "q" | "quit" => Consent::Quit,
            "" => match on_empty {
                EmptyAnswer::Quit => Consent::Quit,
                EmptyAnswer::Decline => Consent::Declined,
            },
            other => {
                log::debug!("Unexpected answer: {other:?}");
                writeln!(output, "We didn't understand your answer.")?;
                continue;
            }
        };
        log::debug!("Answer of the user: {consent:?}");
        return Ok(consent);
    }
}

/// Read one line from the input, `None` when the input ended or the read was interrupted.
///
/// `BufRead::read_line` retries interrupted reads, so the buffer is walked here.
fn read_answer(input: &mut impl BufRead) -> io::Result<Option<String>> {
    let mut line = Vec::new();
    loop {
        let available = match input.fill_buf() {
            Ok(available) => available,
            Err(error) if error.kind() == io::ErrorKind::Interrupted => return Ok(None),
            Err(error) => return Err(error),
        };
        if available.is_empty() {
            break;
        }
        match available.iter().position(|&byte| byte == b'\n') {
            Some(index) => {
                line.extend_from_slice(&available[..=index]);
                input.consume(index + 1);
                break;
            }
            None => {
                let length = available.len();
                line.extend_from_slice(available);
                input.consume(length);
            }
        }
    }
    if line.is_empty() {
        return Ok(None);
    }
    Ok(Some(String::from_utf8_lossy(&line).into_owned()))
}
