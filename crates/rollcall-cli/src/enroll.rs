//! Console prompts for identity details during enrollment.
//!
//! Three sequential free-text prompts; no validation, empty answers are
//! accepted. The capture loop is paused while these block on stdin.

use crate::session::EnrollmentDetails;
use std::io::{self, BufRead, Write};

pub fn prompt_details() -> io::Result<EnrollmentDetails> {
    let stdin = io::stdin();
    let mut input = stdin.lock();

    Ok(EnrollmentDetails {
        name: prompt(&mut input, "Enter name: ")?,
        roll_number: prompt(&mut input, "Enter roll number: ")?,
        section: prompt(&mut input, "Enter section: ")?,
    })
}

fn prompt(input: &mut impl BufRead, label: &str) -> io::Result<String> {
    print!("{label}");
    io::stdout().flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_strips_newline() {
        let mut input = "Alice\n".as_bytes();
        assert_eq!(prompt(&mut input, "name: ").unwrap(), "Alice");
    }

    #[test]
    fn test_prompt_accepts_empty_line() {
        let mut input = "\n".as_bytes();
        assert_eq!(prompt(&mut input, "name: ").unwrap(), "");
    }

    #[test]
    fn test_prompt_strips_crlf() {
        let mut input = "CS-A\r\n".as_bytes();
        assert_eq!(prompt(&mut input, "section: ").unwrap(), "CS-A");
    }
}
