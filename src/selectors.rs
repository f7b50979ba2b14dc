//! CSS selectors for the x.com login and trends markup.
//!
//! Kept in one table so a front-end markup change is a one-file fix.

#[derive(Debug, Clone)]
pub struct SelectorTable {
    /// Username field on the first login screen.
    pub username_input: String,
    /// Password field, rendered after the username is submitted.
    pub password_input: String,
    /// Generic clickable, filtered by label text at the call site.
    pub button_role: String,
    /// Extra identity prompt shown on suspicious logins.
    pub verification_input: String,
    /// One row in the trends sidebar.
    pub trend_row: String,
    /// Text spans inside a trend row.
    pub trend_text: String,
}

impl Default for SelectorTable {
    fn default() -> Self {
        Self {
            username_input: r#"input[autocomplete="username"]"#.to_string(),
            password_input: r#"input[name="password"]"#.to_string(),
            button_role: r#"[role="button"]"#.to_string(),
            verification_input:
                r#"input[placeholder*="phone" i], input[placeholder*="email" i], input[name="text"]"#
                    .to_string(),
            trend_row: r#"[data-testid="trend"]"#.to_string(),
            trend_text: r#"[dir="ltr"]"#.to_string(),
        }
    }
}
