use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Steady-ticking spinner for a long step. Hidden when stderr is not a terminal.
pub fn spinner(message: impl Into<String>) -> ProgressBar {
    let bar = if console::Term::stderr().is_term() {
        ProgressBar::new_spinner()
    } else {
        ProgressBar::hidden()
    };
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        bar.set_style(style);
    }
    bar.set_message(message.into());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

pub fn finish_spinner(bar: &ProgressBar, message: impl Into<String>) {
    bar.finish_and_clear();
    let message = message.into();
    if !message.is_empty() {
        eprintln!("{}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spinner_finishes() {
        let bar = spinner("Scanning");
        assert_eq!(bar.message(), "Scanning");
        finish_spinner(&bar, "");
        assert!(bar.is_finished());
    }
}
