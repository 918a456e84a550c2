//! Shell quoting for commands rendered into container definitions.
//!
//! Provisioning steps run directly through `std::process::Command` locally,
//! but the same steps are rendered as `RUN` lines, where every word passes
//! through a POSIX shell.

/// Quote a single word for a POSIX shell.
///
/// Words made only of safe characters are returned as-is; anything else is
/// wrapped in single quotes, with embedded single quotes written as `'\''`.
///
/// # Examples
/// ```
/// use dashboot::shell::escape;
/// assert_eq!(escape("streamlit"), "streamlit");
/// assert_eq!(escape("pandas>=2.0"), "'pandas>=2.0'");
/// assert_eq!(escape(""), "''");
/// ```
pub fn escape(s: &str) -> String {
    if s.is_empty() {
        return "''".to_string();
    }

    // `=` is only special as part of a leading assignment, which callers
    // build themselves.
    let needs_escaping = s.chars().any(|c| {
        !c.is_ascii_alphanumeric() && !matches!(c, '_' | '-' | '.' | '/' | ':' | '=' | '+' | ',' | '@')
    });

    if !needs_escaping {
        return s.to_string();
    }

    let mut result = String::with_capacity(s.len() + 10);
    result.push('\'');
    for c in s.chars() {
        if c == '\'' {
            result.push_str("'\\''");
        } else {
            result.push(c);
        }
    }
    result.push('\'');
    result
}

/// Quote every word and join them with spaces.
pub fn join<S: AsRef<str>>(words: &[S]) -> String {
    words
        .iter()
        .map(|w| escape(w.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_plain_words() {
        assert_eq!(escape("apt-get"), "apt-get");
        assert_eq!(escape("--no-install-recommends"), "--no-install-recommends");
        assert_eq!(escape("/var/lib/apt/lists"), "/var/lib/apt/lists");
        assert_eq!(escape("--server.port=8501"), "--server.port=8501");
        assert_eq!(escape("libpq5=15.6-0+deb12u1"), "libpq5=15.6-0+deb12u1");
    }

    #[test]
    fn test_escape_version_specifiers() {
        assert_eq!(escape("streamlit>=1.30"), "'streamlit>=1.30'");
        assert_eq!(escape("pandas<3,>=2"), "'pandas<3,>=2'");
        assert_eq!(escape("plotly~=5.0"), "'plotly~=5.0'");
    }

    #[test]
    fn test_escape_globs_and_spaces() {
        assert_eq!(escape("rm -rf /var/lib/apt/lists/*"), "'rm -rf /var/lib/apt/lists/*'");
        assert_eq!(escape("Excel file.xlsx"), "'Excel file.xlsx'");
    }

    #[test]
    fn test_escape_with_single_quote() {
        assert_eq!(escape("it's"), "'it'\\''s'");
    }

    #[test]
    fn test_escape_empty() {
        assert_eq!(escape(""), "''");
    }

    #[test]
    fn test_escape_dangerous_input() {
        assert_eq!(escape("; rm -rf /"), "'; rm -rf /'");
        assert_eq!(escape("$(whoami)"), "'$(whoami)'");
        assert_eq!(escape("`id`"), "'`id`'");
        assert_eq!(escape("a && b"), "'a && b'");
    }

    #[test]
    fn test_escape_unicode() {
        assert_eq!(escape("relatório.xlsx"), "'relatório.xlsx'");
    }

    #[test]
    fn test_join() {
        let words = ["pip", "install", "--no-cache-dir", "streamlit>=1.30"];
        assert_eq!(join(&words), "pip install --no-cache-dir 'streamlit>=1.30'");
        assert_eq!(join::<&str>(&[]), "");
    }
}
