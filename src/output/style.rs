use std::sync::atomic::{AtomicBool, Ordering};

static COLORS_ENABLED: AtomicBool = AtomicBool::new(true);

/// Decides once per process whether status output carries ANSI colors.
pub fn configure(no_color: bool) {
    let forced = std::env::var("CLICOLOR_FORCE").ok().as_deref() == Some("1");
    let dumb = std::env::var("TERM").is_ok_and(|term| term.eq_ignore_ascii_case("dumb"));
    let disabled = no_color || dumb || std::env::var_os("NO_COLOR").is_some();

    COLORS_ENABLED.store(forced || !disabled, Ordering::Relaxed);
}

#[derive(Debug, Clone, Copy)]
enum Tone {
    Dim,
    Cyan,
    Green,
    Red,
    Yellow,
    BrightCyan,
}

impl Tone {
    fn code(self) -> &'static str {
        match self {
            Tone::Dim => "2",
            Tone::Cyan => "36",
            Tone::Green => "32",
            Tone::Red => "31",
            Tone::Yellow => "33",
            Tone::BrightCyan => "96",
        }
    }
}

fn paint(tone: Tone, text: &str) -> String {
    if text.is_empty() || !COLORS_ENABLED.load(Ordering::Relaxed) {
        return text.to_string();
    }

    format!("\x1b[{}m{text}\x1b[0m", tone.code())
}

pub fn muted(text: &str) -> String {
    paint(Tone::Dim, text)
}

pub fn accent(text: &str) -> String {
    paint(Tone::Cyan, text)
}

pub fn success(text: &str) -> String {
    paint(Tone::Green, text)
}

pub fn failure(text: &str) -> String {
    paint(Tone::Red, text)
}

pub fn warning(text: &str) -> String {
    paint(Tone::Yellow, text)
}

pub fn info(text: &str) -> String {
    paint(Tone::BrightCyan, text)
}

/// Paths and command text.
pub fn command(text: &str) -> String {
    paint(Tone::BrightCyan, text)
}

pub fn number(text: &str) -> String {
    paint(Tone::BrightCyan, text)
}
