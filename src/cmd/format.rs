/*!
format.rs

Styling for the few human-facing lines sabacan prints itself: the final
error report and its hint. Everything on stdout is relayed server output and
never styled.

  - StyleOptions::detect() -> StyleOptions
  - color(role, text, &StyleOptions) -> String
  - emoji(tag, &StyleOptions) -> &'static str
  - error_line(&anyhow::Error, &StyleOptions) -> String
  - hint_line(hint, &StyleOptions) -> String

Color is disabled by NO_COLOR or when stderr is not a terminal; emoji by
NO_EMOJI.
*/

use std::io::IsTerminal;

/* -------------------------------------------------------------------------- */
/* Style Options                                                              */
/* -------------------------------------------------------------------------- */

#[derive(Debug, Clone)]
pub struct StyleOptions {
    pub use_color: bool,
    pub use_emoji: bool,
}

impl Default for StyleOptions {
    fn default() -> Self {
        Self::detect()
    }
}

impl StyleOptions {
    pub fn detect() -> Self {
        let no_color = std::env::var_os("NO_COLOR").is_some();
        let no_emoji = std::env::var_os("NO_EMOJI").is_some();
        StyleOptions {
            use_color: !no_color && std::io::stderr().is_terminal(),
            use_emoji: !no_emoji,
        }
    }

    #[cfg(test)]
    pub fn plain() -> Self {
        StyleOptions {
            use_color: false,
            use_emoji: false,
        }
    }
}

/* -------------------------------------------------------------------------- */
/* Color / Emoji                                                              */
/* -------------------------------------------------------------------------- */

#[derive(Debug, Clone, Copy)]
pub enum Role {
    Error,
    Dim,
}

pub fn color(role: Role, text: impl AsRef<str>, style: &StyleOptions) -> String {
    if !style.use_color {
        return text.as_ref().to_string();
    }
    let code = match role {
        Role::Error => "38;5;196", // red
        Role::Dim => "2",
    };
    format!("\x1b[{code}m{}\x1b[0m", text.as_ref())
}

pub fn emoji(tag: &str, style: &StyleOptions) -> &'static str {
    if !style.use_emoji {
        return "";
    }
    match tag {
        "error" => "✖",
        _ => "",
    }
}

/* -------------------------------------------------------------------------- */
/* Lines                                                                      */
/* -------------------------------------------------------------------------- */

/// `✖ sabacan: <message>` with the causes appended, for stderr.
pub fn error_line(err: &anyhow::Error, style: &StyleOptions) -> String {
    let mut msg = err.to_string();
    for cause in err.chain().skip(1) {
        msg.push_str(": ");
        msg.push_str(&cause.to_string());
    }
    let prefix = match emoji("error", style) {
        "" => String::new(),
        e => format!("{e} "),
    };
    color(Role::Error, format!("{prefix}sabacan: {msg}"), style)
}

/// Hint printed under an error when it has a likely fix.
pub fn hint_line(hint: &str, style: &StyleOptions) -> String {
    color(Role::Dim, format!("  hint: {hint}"), style)
}

/* -------------------------------------------------------------------------- */
/* Tests                                                                       */
/* -------------------------------------------------------------------------- */
