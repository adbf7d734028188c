//! Terminal text sanitization for backend-supplied strings.
//!
//! Every string that reaches the terminal from the backend (cell values,
//! suggestion titles and explanations, generated code, error bodies) is
//! untrusted. Terminal emulators act on escape sequences that can rewrite the
//! screen (CSI), set the clipboard (OSC 52) or forge hyperlinks (OSC 8), so
//! those are stripped before rendering.

use std::borrow::Cow;

const ESC: char = '\x1b';
const BEL: char = '\x07';

/// Strip escape sequences and control characters from `input`.
///
/// Keeps `\n`, `\t` and `\r`. Returns `Cow::Borrowed` when nothing needs removing.
///
/// ```
/// use wrangle_types::sanitize_terminal_text;
///
/// assert_eq!(sanitize_terminal_text("plain"), "plain");
/// assert_eq!(sanitize_terminal_text("EMS\x1b[2J: FALL"), "EMS: FALL");
/// ```
#[must_use]
pub fn sanitize_terminal_text(input: &str) -> Cow<'_, str> {
    if !input.chars().any(needs_removal) {
        return Cow::Borrowed(input);
    }

    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == ESC {
            skip_escape_sequence(&mut chars);
        } else if matches!(c, '\n' | '\t' | '\r') {
            out.push(c);
        } else if c == '\u{009b}' {
            // C1 CSI behaves like ESC [
            skip_csi_params(&mut chars);
        } else if !is_control(c) {
            out.push(c);
        }
    }

    Cow::Owned(out)
}

/// Sanitize text destined for a single-line grid cell.
///
/// Like [`sanitize_terminal_text`], but line breaks and tabs collapse to a single space.
#[must_use]
pub fn sanitize_cell_text(input: &str) -> Cow<'_, str> {
    let clean = sanitize_terminal_text(input);
    if !clean.contains(['\n', '\t', '\r']) {
        return clean;
    }
    let mut out = String::with_capacity(clean.len());
    let mut last_was_space = false;
    for c in clean.chars() {
        if matches!(c, '\n' | '\t' | '\r') {
            if !last_was_space {
                out.push(' ');
            }
            last_was_space = true;
        } else {
            out.push(c);
            last_was_space = c == ' ';
        }
    }
    Cow::Owned(out)
}

fn needs_removal(c: char) -> bool {
    c == ESC || (is_control(c) && !matches!(c, '\n' | '\t' | '\r'))
}

fn is_control(c: char) -> bool {
    c <= '\x1f' || c == '\x7f' || ('\u{0080}'..='\u{009f}').contains(&c)
}

fn skip_escape_sequence<I: Iterator<Item = char>>(chars: &mut std::iter::Peekable<I>) {
    let Some(&next) = chars.peek() else {
        return;
    };

    match next {
        '[' => {
            chars.next();
            skip_csi_params(chars);
        }
        ']' => {
            chars.next();
            skip_until_terminator(chars, true);
        }
        'P' | '^' | '_' => {
            chars.next();
            skip_until_terminator(chars, false);
        }
        '(' | ')' | '*' | '+' | '#' | ' ' => {
            chars.next();
            chars.next();
        }
        '7' | '8' | 'c' | 'D' | 'E' | 'H' | 'M' | 'N' | 'O' | 'Z' | '=' | '>' | '<' => {
            chars.next();
        }
        _ => {}
    }
}

/// CSI: parameter/intermediate bytes (0x20-0x3F) then one final byte (0x40-0x7E).
fn skip_csi_params<I: Iterator<Item = char>>(chars: &mut std::iter::Peekable<I>) {
    while let Some(&c) = chars.peek() {
        if ('\x40'..='\x7e').contains(&c) {
            chars.next();
            return;
        } else if ('\x20'..='\x3f').contains(&c) {
            chars.next();
        } else {
            return;
        }
    }
}

/// Skip to ST (`ESC \`), or BEL as well when `bel_terminates`.
fn skip_until_terminator<I: Iterator<Item = char>>(
    chars: &mut std::iter::Peekable<I>,
    bel_terminates: bool,
) {
    while let Some(c) = chars.next() {
        if bel_terminates && c == BEL {
            return;
        }
        if c == ESC && chars.peek() == Some(&'\\') {
            chars.next();
            return;
        }
    }
}
