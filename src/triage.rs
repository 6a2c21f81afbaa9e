use regex::Regex;
use std::sync::OnceLock;

/// One predicate in the log-detection cascade. The cascade is kept as data
/// so each pattern stays testable on its own.
#[derive(Debug)]
pub struct LogPattern {
    pub purpose: &'static str,
    pub regex: Regex,
}

fn compile(purpose: &'static str, pattern: &str) -> LogPattern {
    LogPattern {
        purpose,
        // Patterns are fixed at compile time; a failure here is a programming
        // error caught by the cascade tests.
        regex: Regex::new(pattern).unwrap(),
    }
}

/// Ordered cascade of independent predicates. Classification is the OR over
/// all of them, position-insensitive.
pub fn detection_patterns() -> &'static [LogPattern] {
    static PATTERNS: OnceLock<Vec<LogPattern>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        vec![
            compile("jvm stack frame", r"at\s+[\w.$]+\([\w.]+:\d+\)"),
            compile("indented at line", r"(?m)^\s+at\s+"),
            compile("exception keyword", r"(?i)Exception|Error|Throwable"),
            compile("caused by", r"(?i)Caused by:"),
            compile("exception in thread", r"(?i)Exception in thread"),
            compile(
                "timestamped level",
                r"(?i)\d{4}-\d{2}-\d{2}[\sT]\d{2}:\d{2}:\d{2}.*?(ERROR|WARN|FATAL|Exception)",
            ),
            compile(
                "bracketed timestamped level",
                r"(?i)\[\d{4}-\d{2}-\d{2}.*?\]\s*(ERROR|WARN|FATAL)",
            ),
            compile("level prefix", r"(?m)^(ERROR|WARN|FATAL|SEVERE)[:|\s]"),
            compile("dated level", r"(?m)^\d{4}-\d{2}-\d{2}.*?(ERROR|WARN|FATAL)"),
            compile("python traceback", r"(?i)Traceback \(most recent call last\)"),
            compile("python frame", r#"File ".*?", line \d+"#),
            compile("node error with frame", r"Error:\s+.*?\n\s+at\s+"),
            compile("node frame", r"(?m)^\s+at\s+.*?\(.*?:\d+:\d+\)"),
            compile(
                "dotnet frame",
                r"at\s+[\w.]+\.[\w.]+\(.*?\)\s+in\s+.*?:line\s+\d+",
            ),
            compile("bracketed level", r"\[ERROR\]|\[WARN\]|\[FATAL\]"),
            compile("failure vocabulary", r"(?i)failed|failure|crashed|crash"),
        ]
    })
}

fn line_patterns() -> &'static [LogPattern] {
    static PATTERNS: OnceLock<Vec<LogPattern>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        vec![
            compile("stack frame line", r"^\s+at\s+"),
            compile("level prefix line", r"^(ERROR|WARN|FATAL|INFO|DEBUG)[:|\s]"),
            compile("exception keyword line", r"Exception|Error|Throwable"),
            compile("cause or frame opener", r"Caused by:|at\s+[\w.$]+\("),
            compile("dated level line", r"\d{4}-\d{2}-\d{2}.*?(ERROR|WARN|FATAL)"),
        ]
    })
}

// The count deliberately excludes the dated-level pattern; it exists only to
// stop the splitter's prefix scan.
const COUNTED_LINE_PATTERNS: usize = 4;

/// Whether the text contains diagnostic/log content anywhere. Heuristic:
/// false positives on failure vocabulary in prose are accepted.
pub fn is_likely_log(text: &str) -> bool {
    if text.trim().is_empty() {
        return false;
    }
    detection_patterns().iter().any(|p| p.regex.is_match(text))
}

/// Per-line test used by the splitter to find where logs begin.
pub fn is_log_line(line: &str) -> bool {
    line_patterns().iter().any(|p| p.regex.is_match(line))
}

/// Number of recognizable log lines in the text. Zero when the classifier is
/// negative; the total line count when the classifier is positive but no
/// individual line matches a known format.
pub fn count_log_lines(text: &str) -> usize {
    if !is_likely_log(text) {
        return 0;
    }
    let counted = &line_patterns()[..COUNTED_LINE_PATTERNS];
    let matching = text
        .lines()
        .filter(|line| counted.iter().any(|p| p.regex.is_match(line)))
        .count();
    if matching > 0 {
        matching
    } else {
        text.lines().count()
    }
}

/// Result of separating an operator message into intent and pasted logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitMessage {
    pub requirement: String,
    pub logs: Option<String>,
}

/// Splits free-form operator text into a leading semantic request and a
/// trailing log payload.
///
/// The requirement prefix ends at the first log-looking line; logs are
/// assumed to run from there to the end of the text. When the text starts
/// with log content the requirement falls back to the first non-blank line,
/// or the first 100 characters if every line is blank.
pub fn split_requirement_and_logs(text: &str) -> SplitMessage {
    let mut requirement_lines: Vec<&str> = Vec::new();
    let mut tail_start: Option<usize> = None;
    let mut offset = 0usize;

    for line in text.split('\n') {
        if is_log_line(line) {
            tail_start = Some(offset);
            break;
        }
        if !line.trim().is_empty() {
            requirement_lines.push(line);
        }
        offset += line.len() + 1;
    }

    let mut requirement = requirement_lines.join("\n").trim().to_string();
    if requirement.is_empty() {
        match first_non_blank_span(text) {
            Some((line, end)) => {
                requirement = line.trim().to_string();
                tail_start = Some(end);
            }
            None => {
                requirement = text.chars().take(100).collect();
                tail_start = None;
            }
        }
    }

    let logs = tail_start
        .filter(|_| is_likely_log(text))
        .map(|start| text[start..].trim().to_string())
        .filter(|tail| !tail.is_empty());

    SplitMessage { requirement, logs }
}

fn first_non_blank_span(text: &str) -> Option<(&str, usize)> {
    let mut offset = 0usize;
    for line in text.split('\n') {
        if !line.trim().is_empty() {
            return Some((line, (offset + line.len()).min(text.len())));
        }
        offset += line.len() + 1;
    }
    None
}
