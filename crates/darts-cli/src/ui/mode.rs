//! Output mode routing logic.

/// Output mode determines how results are formatted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Machine-readable JSON output only
    Json,
    /// Plain text, stable for logs and scripts
    #[default]
    Plain,
    /// Human-friendly with colors and formatting (TTY only)
    Pretty,
}

impl OutputMode {
    /// Resolve output mode from flags and environment.
    ///
    /// Routing rules:
    /// 1. `--json` overrides everything
    /// 2. `TERM=dumb` forces plain
    /// 3. Pretty only when stdout is a TTY
    pub fn resolve(json_flag: bool, is_tty: bool, term_is_dumb: bool) -> Self {
        if json_flag {
            return Self::Json;
        }
        if term_is_dumb {
            return Self::Plain;
        }
        if is_tty {
            Self::Pretty
        } else {
            Self::Plain
        }
    }

    pub fn is_json(&self) -> bool {
        matches!(self, Self::Json)
    }

    pub fn is_pretty(&self) -> bool {
        matches!(self, Self::Pretty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_exclusive() {
        assert_eq!(OutputMode::resolve(true, true, true), OutputMode::Json);
    }

    #[test]
    fn test_dumb_terminal_is_plain() {
        assert_eq!(OutputMode::resolve(false, true, true), OutputMode::Plain);
    }

    #[test]
    fn test_tty_is_pretty() {
        assert_eq!(OutputMode::resolve(false, true, false), OutputMode::Pretty);
        assert_eq!(OutputMode::resolve(false, false, false), OutputMode::Plain);
    }
}
