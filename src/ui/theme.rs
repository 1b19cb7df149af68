// ANSI escapes for terminal output. Keep roles here instead of sprinkling escapes through rendering.
pub const RESET: &str = "\x1b[0m";

pub const TIMESTAMP: &str = "\x1b[96m"; // bright cyan
pub const BRACKET: &str = "\x1b[93m"; // bright yellow
pub const TITLE: &str = "\x1b[92m"; // bright green
pub const SUBTITLE: &str = "\x1b[97m"; // bright white
pub const WARNING: &str = "\x1b[33m";
pub const ERROR: &str = "\x1b[91m"; // bright red

pub fn paint(text: &str, color: &str, enabled: bool) -> String {
    if enabled {
        format!("{color}{text}{RESET}")
    } else {
        text.to_string()
    }
}
