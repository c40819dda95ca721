//! Static approximation of program output, used when no relay is available.
//!
//! This is not an interpreter. Each line that is a single output call has its
//! argument echoed when it is a bare string literal, and replaced by
//! [`EXPRESSION_PLACEHOLDER`] otherwise. Results are always marked simulated.

use once_cell::sync::Lazy;
use regex::Regex;
use runpad_types::ExecutionResult;

#[cfg(test)]
#[path = "offline_test.rs"]
mod tests;

/// Returned when the buffer contains no output calls.
pub const NO_OUTPUT_MESSAGE: &str = "No output statements found in the code.";

/// Stands in for any argument that is not a plain string literal.
pub const EXPRESSION_PLACEHOLDER: &str = "[expression]";

static CALL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*(?:print|println|console\.log|System\.out\.println|System\.out\.print|printf|puts|println!|print!|fmt\.Println|fmt\.Print)\s*\((.*)\)\s*;?\s*$",
    )
    .expect("output call pattern is valid")
});

static COUT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:std::)?cout\s*<<\s*(.*?)\s*(?:<<\s*(?:std::)?endl\s*)?;\s*$")
        .expect("cout pattern is valid")
});

static LITERAL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^(?:"((?:[^"\\]|\\.)*)"|'((?:[^'\\]|\\.)*)')$"#)
        .expect("string literal pattern is valid")
});

/// Render `buffer` without executing it.
pub fn render_offline(buffer: &str) -> ExecutionResult {
    let lines: Vec<String> = buffer.lines().filter_map(extract_output).collect();

    if lines.is_empty() {
        return ExecutionResult::simulated(NO_OUTPUT_MESSAGE);
    }

    ExecutionResult::simulated(lines.join("\n"))
}

fn extract_output(line: &str) -> Option<String> {
    let argument = CALL_RE
        .captures(line)
        .or_else(|| COUT_RE.captures(line))
        .and_then(|captures| captures.get(1))?
        .as_str()
        .trim();

    if argument.is_empty() {
        return Some(String::new());
    }

    Some(literal_value(argument).unwrap_or_else(|| EXPRESSION_PLACEHOLDER.to_string()))
}

fn literal_value(argument: &str) -> Option<String> {
    let captures = LITERAL_RE.captures(argument)?;
    let raw = captures.get(1).or_else(|| captures.get(2))?.as_str();
    let value = unescape(raw);
    Some(value.strip_suffix('\n').unwrap_or(&value).to_string())
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
