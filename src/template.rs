//! Output and command templating.
//!
//! Templates substitute `{placeholder}` tokens with values drawn from an
//! [`Entry`] (and, for watch dispatch, the event kind). Each placeholder
//! has a shell-quoted variant written `{""}`, `{"base"}`, and so on.
//! Unrecognised placeholders are left literal. The formatter makes a
//! single pass over the template and produces one output string.
//!
//! Recognised placeholders:
//!
//! | Token      | Value                               |
//! |------------|-------------------------------------|
//! | `{}`       | full path                           |
//! | `{base}`   | base name                           |
//! | `{dir}`    | containing directory                |
//! | `{size}`   | size in bytes                       |
//! | `{time}`   | modification time, RFC3339          |
//! | `{atime}`  | access time, RFC3339                |
//! | `{ctime}`  | creation time, RFC3339              |
//! | `{mode}`   | permission bits, octal              |
//! | `{owner}`  | owner name (numeric id fallback)    |
//! | `{group}`  | group name (numeric id fallback)    |
//! | `{type}`   | entry kind name                     |
//! | `{ext}`    | extension including the dot         |
//! | `{version}`| version identifier, if tracked      |
//! | `{event}`  | watch event kind (watch mode only)  |

use crate::entry::Entry;
use crate::owner;
use crate::watch::EventKind;
use chrono::{DateTime, Local, SecondsFormat};
use std::time::SystemTime;

/// Substitute all recognised placeholders in `template`.
///
/// Formatting is idempotent on strings that contain no recognised
/// placeholders. `event` is only consulted by `{event}`; without it the
/// token stays literal, so find-mode templates can be reused under watch.
pub fn format(template: &str, entry: &Entry, event: Option<EventKind>) -> String {
    let mut out = String::with_capacity(template.len() + 32);
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after_open = &rest[open..];

        match after_open.find('}') {
            Some(close) => {
                let token = &after_open[1..close];
                match substitute(token, entry, event) {
                    Some(value) => {
                        out.push_str(&value);
                        rest = &after_open[close + 1..];
                    }
                    None => {
                        // Unrecognised: emit the brace and keep scanning
                        // right after it, so overlapping tokens still work.
                        out.push('{');
                        rest = &after_open[1..];
                    }
                }
            }
            None => {
                out.push_str(after_open);
                return out;
            }
        }
    }

    out.push_str(rest);
    out
}

fn substitute(token: &str, entry: &Entry, event: Option<EventKind>) -> Option<String> {
    let (quoted, key) = if token.len() >= 2 && token.starts_with('"') && token.ends_with('"') {
        (true, &token[1..token.len() - 1])
    } else {
        (false, token)
    };

    let value = match key {
        "" => entry.path.display().to_string(),
        "base" => entry.name.clone(),
        "dir" => entry.dir().display().to_string(),
        "size" => entry.size.to_string(),
        "time" => format_time(entry.modified)?,
        "atime" => format_time(entry.accessed)?,
        "ctime" => format_time(entry.created)?,
        "mode" => format!("{:o}", entry.mode),
        "owner" => owner::user_name(entry.uid).unwrap_or_else(|| entry.uid.to_string()),
        "group" => owner::group_name(entry.gid).unwrap_or_else(|| entry.gid.to_string()),
        "type" => entry.kind.as_str().to_string(),
        "ext" => entry.ext(),
        "version" => entry.version.clone().unwrap_or_default(),
        "event" => event?.as_str().to_string(),
        _ => return None,
    };

    Some(if quoted { quote(&value) } else { value })
}

fn format_time(time: Option<SystemTime>) -> Option<String> {
    let time = time?;
    Some(DateTime::<Local>::from(time).to_rfc3339_opts(SecondsFormat::Secs, false))
}

/// Quote a value for safe embedding in a shell-ish command line: wrapped in
/// double quotes with inner quotes and backslashes escaped.
fn quote(value: &str) -> String {
    format!("{:?}", value)
}
