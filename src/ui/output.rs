//! Output functions for consistent step formatting

use console::style;

/// Display a section header preceded by a blank line
pub fn section(title: &str) {
    println!();
    println!("{}", style(title).cyan().bold());
}

/// Print a `- key: value` line
pub fn key_value(key: &str, value: &str) {
    println!("- {}: {}", key, value);
}

/// Print a multi-line value on one line, joining lines with `- `
pub fn multiline_value(key: &str, value: &str) {
    key_value(key, &flatten(value));
}

/// Display a success line
pub fn done(message: &str) {
    println!();
    println!("{}", style(message).green());
}

fn flatten(value: &str) -> String {
    value.replace('\n', "- ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flatten_joins_lines() {
        assert_eq!(
            flatten("Apple Swift version 5.10\nTarget: arm64-apple-macosx14.0"),
            "Apple Swift version 5.10- Target: arm64-apple-macosx14.0"
        );
    }

    #[test]
    fn output_does_not_panic() {
        section("Environment:");
        key_value("CarthageVersion", "0.38.0");
        multiline_value("SwiftVersion", "a\nb");
        done("Done");
    }
}
