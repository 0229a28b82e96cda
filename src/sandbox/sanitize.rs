//! Scrubs host details out of messages that reach tenant-visible errors.

use regex::Regex;
use std::sync::LazyLock;

fn compile(pattern: &str) -> Regex {
    match Regex::new(pattern) {
        Ok(regex) => regex,
        Err(err) => panic!("sanitizer pattern {pattern:?} does not compile: {err}"),
    }
}

static STACK_LINE: LazyLock<Regex> = LazyLock::new(|| compile(r"(?m)^\s+at\s.*$"));

static LOCATION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"file://\S+",
        r"(?:[A-Za-z]:)?(?:[/\\][\w.\-@]+)+[/\\]src[/\\][\w./\\\-]+",
        r"(?:[/\\][\w.\-@]+)+\.rs(?::\d+)*",
        r"\s*\(?<(?:anonymous|input|eval|sandbox)>(?::\d+)*\)?",
        r"\s*\([^()\s]*:\d+:\d+\)",
        r"[\w.\-]+\.m?js(?::\d+)+",
    ]
    .into_iter()
    .map(compile)
    .collect()
});

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| compile(r"[ \t]+"));

pub fn sanitize_message(message: &str) -> String {
    let mut text = STACK_LINE.replace_all(message, "").into_owned();
    for pattern in LOCATION_PATTERNS.iter() {
        text = pattern.replace_all(&text, "").into_owned();
    }
    let text = WHITESPACE.replace_all(&text, " ");
    let cleaned = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    if cleaned.is_empty() {
        "script error".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_pattern_compiles() {
        LazyLock::force(&STACK_LINE);
        LazyLock::force(&WHITESPACE);
        assert_eq!(LOCATION_PATTERNS.len(), 6);
    }

    #[test]
    fn clock_times_in_user_text_survive() {
        assert_eq!(
            sanitize_message("Error: deadline at 12:30:45 passed"),
            "Error: deadline at 12:30:45 passed"
        );
    }

    #[test]
    fn strips_script_file_locations() {
        assert_eq!(
            sanitize_message("ReferenceError: x is not defined at handler.js:4:11"),
            "ReferenceError: x is not defined at"
        );
        assert_eq!(
            sanitize_message("TypeError: bad call (worker:2:5)"),
            "TypeError: bad call"
        );
    }

    #[test]
    fn strips_stack_lines_and_locations() {
        let raw = "TypeError: not a function\n    at execute (<input>:3:9)\n    at <eval> (<input>:5)\n";
        assert_eq!(sanitize_message(raw), "TypeError: not a function");
    }

    #[test]
    fn strips_host_source_paths() {
        let raw = "vector.query: boom at /home/build/sandflow/src/vector/store.rs:120:7";
        let cleaned = sanitize_message(raw);
        assert!(!cleaned.contains("/home"));
        assert!(!cleaned.contains(".rs"));
        assert!(cleaned.starts_with("vector.query: boom"));
    }

    #[test]
    fn keeps_plain_messages() {
        assert_eq!(sanitize_message("boom"), "boom");
        assert_eq!(sanitize_message("   "), "script error");
    }
}
