// ABOUTME: Shell quoting helpers for commands sent to release hosts.
// ABOUTME: Everything interpolated into a remote command line passes through here.

/// Escape a value for use inside single quotes.
/// Replaces `'` with `'\''` (end quote, escaped quote, start quote).
pub fn escape_single_quote_content(value: &str) -> String {
    value.replace('\'', "'\\''")
}

/// Quote a single argument, leaving plain words untouched.
pub fn quote_arg(arg: &str) -> String {
    if arg.is_empty() {
        return "''".to_string();
    }

    const SHELL_META: &[char] = &[
        ' ', '\t', '\n', '\'', '"', '\\', '$', '`', '!', '*', '?', '[', ']', '(', ')', '{', '}',
        '<', '>', '|', '&', ';', '#', '~',
    ];

    if !arg.contains(SHELL_META) {
        return arg.to_string();
    }

    format!("'{}'", escape_single_quote_content(arg))
}

/// Quote and join several paths.
pub fn quote_all<S: AsRef<str>>(args: &[S]) -> String {
    args.iter()
        .map(|a| quote_arg(a.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Wrap a complete command (with operators) for `sh -c`.
pub fn escape_command_for_shell(command: &str) -> String {
    format!("'{}'", escape_single_quote_content(command))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_paths_are_left_alone() {
        assert_eq!(quote_arg("/var/www/app/releases"), "/var/www/app/releases");
    }

    #[test]
    fn paths_with_spaces_are_quoted() {
        assert_eq!(quote_arg("/srv/my app"), "'/srv/my app'");
    }

    #[test]
    fn embedded_single_quotes_are_escaped() {
        assert_eq!(quote_arg("it's"), "'it'\\''s'");
        assert_eq!(escape_command_for_shell("echo 'hi'"), "'echo '\\''hi'\\'''");
    }

    #[test]
    fn empty_argument_becomes_empty_quotes() {
        assert_eq!(quote_arg(""), "''");
    }

    #[test]
    fn quote_all_joins_with_spaces() {
        assert_eq!(quote_all(&["/a", "/b c"]), "/a '/b c'");
    }
}
