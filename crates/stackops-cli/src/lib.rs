//! stackops-cli: terminal front end for the scrollback log viewer.
//!
//! Owns argument parsing, target discovery, key mapping and drawing. All
//! pagination decisions live in `stackops-scrollback`.

pub mod app;
pub mod args;
pub mod discovery;
pub mod keymap;
pub mod terminal;

/// Stable crate label used for bootstrap smoke tests.
pub fn crate_label() -> &'static str {
    "stackops-cli"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_label_is_stable() {
        assert_eq!(crate_label(), "stackops-cli");
    }
}
