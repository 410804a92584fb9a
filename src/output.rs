//! Terminal rendering for pipeline messages and search hits.
//! Used by `voxim listen` and `voxim search`.

use crate::pipeline::PipelineMessage;
use crate::pipeline::types::{NO_KEYWORDS_STATUS, READY_STATUS, RECONNECTING_STATUS};
use crate::search::SearchHit;
use std::io::{self, Write};
use std::path::PathBuf;

const DIM: &str = "\x1b[2m";
const BOLD: &str = "\x1b[1m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";

/// Clear the current terminal line (replaces an echoed partial transcript).
pub fn clear_line() {
    eprint!("\r\x1b[2K");
}

/// Show a partial transcript in place, overwritten by the next line.
pub fn render_partial(text: &str) {
    eprint!("\r\x1b[2K{DIM}{text}{RESET}");
    io::stderr().flush().ok();
}

/// Pick a color for a status line based on what it reports.
fn status_color(text: &str) -> &'static str {
    if text.starts_with("Voice error:") || text.starts_with("Search failed:") {
        RED
    } else if text == NO_KEYWORDS_STATUS || text == RECONNECTING_STATUS {
        YELLOW
    } else if text == READY_STATUS {
        GREEN
    } else {
        ""
    }
}

/// Format a result grid, one numbered path per line.
pub fn format_results(paths: &[PathBuf]) -> String {
    if paths.is_empty() {
        return "  (no results)".to_string();
    }
    paths
        .iter()
        .enumerate()
        .map(|(rank, path)| format!("  {:>2}. {}", rank + 1, path.display()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format one-shot search hits as `rank score path`.
pub fn format_hits(hits: &[SearchHit]) -> String {
    hits.iter()
        .enumerate()
        .map(|(rank, hit)| format!("{:>2} {:.4} {}", rank + 1, hit.score, hit.path.display()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render a pipeline message.
///
/// Status lines go to stderr; result paths go to stdout so they can be piped.
/// With `quiet`, only results are printed.
pub fn render_message(message: &PipelineMessage, quiet: bool) {
    match message {
        PipelineMessage::Status(text) => {
            if quiet {
                return;
            }
            clear_line();
            let color = status_color(text);
            if color.is_empty() {
                eprintln!("{text}");
            } else {
                eprintln!("{color}{text}{RESET}");
            }
        }
        PipelineMessage::Results(paths) => {
            if !quiet {
                clear_line();
                eprintln!("{BOLD}{} result(s){RESET}", paths.len());
            }
            println!("{}", format_results(paths));
            io::stdout().flush().ok();
        }
    }
}
