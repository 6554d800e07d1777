// SPDX-FileCopyrightText: 2026 Aienvoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! MarkdownV2 escaping for Telegram Bot API.
//!
//! Outside code spans every reserved character gets a backslash. Inside
//! inline code and fenced blocks only `\` is escaped, so model output that
//! contains code keeps its formatting.

/// Characters reserved by MarkdownV2 outside code.
const RESERVED: &[char] = &[
    '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!', '\\',
];

const FENCE: &str = "```";

fn push_code(out: &mut String, code: &str) {
    for ch in code.chars() {
        if ch == '\\' {
            out.push('\\');
        }
        out.push(ch);
    }
}

/// Escapes `text` for `ParseMode::MarkdownV2`.
///
/// An unterminated code span runs to the end of the text.
pub fn escape_markdown_v2(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 4);
    let mut rest = text;

    while let Some(ch) = rest.chars().next() {
        if let Some(body) = rest.strip_prefix(FENCE) {
            let len = body.find(FENCE).unwrap_or(body.len());
            out.push_str(FENCE);
            push_code(&mut out, &body[..len]);
            if len < body.len() {
                out.push_str(FENCE);
                rest = &body[len + FENCE.len()..];
            } else {
                rest = "";
            }
            continue;
        }

        if let Some(after) = rest.strip_prefix("``") {
            out.push_str("\\`\\`");
            rest = after;
            continue;
        }

        if ch == '`' {
            let body = &rest[1..];
            let len = body.find('`').unwrap_or(body.len());
            out.push('`');
            push_code(&mut out, &body[..len]);
            if len < body.len() {
                out.push('`');
                rest = &body[len + 1..];
            } else {
                rest = "";
            }
            continue;
        }

        if RESERVED.contains(&ch) {
            out.push('\\');
        }
        out.push(ch);
        rest = &rest[ch.len_utf8()..];
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_plain() {
        assert_eq!(escape_markdown_v2(""), "");
        assert_eq!(escape_markdown_v2("Hello world"), "Hello world");
    }

    #[test]
    fn escapes_every_reserved_character() {
        let input = "_*[]()~>#+-=|{}.!";
        let expected = "\\_\\*\\[\\]\\(\\)\\~\\>\\#\\+\\-\\=\\|\\{\\}\\.\\!";
        assert_eq!(escape_markdown_v2(input), expected);
    }

    #[test]
    fn escapes_backslash_outside_code() {
        assert_eq!(escape_markdown_v2(r"a\b"), r"a\\b");
    }

    #[test]
    fn inline_code_is_kept() {
        let result = escape_markdown_v2("Use `println!()` to print.");
        assert_eq!(result, "Use `println!()` to print\\.");
    }

    #[test]
    fn fenced_block_is_kept() {
        let input = "Example:\n```rust\nlet x = a.b(1);\n```\nDone.";
        let result = escape_markdown_v2(input);
        assert_eq!(result, "Example:\n```rust\nlet x = a.b(1);\n```\nDone\\.");
    }

    #[test]
    fn backslash_inside_code_is_escaped() {
        assert_eq!(escape_markdown_v2(r"`C:\dir`"), r"`C:\\dir`");
    }

    #[test]
    fn double_backtick_is_escaped() {
        assert_eq!(escape_markdown_v2("a``b"), "a\\`\\`b");
    }

    #[test]
    fn unclosed_spans_run_to_end() {
        assert_eq!(escape_markdown_v2("run `foo.bar"), "run `foo.bar");
        assert_eq!(escape_markdown_v2("```\nno close."), "```\nno close.");
    }

    #[test]
    fn multibyte_text() {
        assert_eq!(escape_markdown_v2("你好，世界!"), "你好，世界\\!");
    }

    #[test]
    fn link_syntax_is_escaped() {
        let input = "See [docs](https://example.com)";
        let expected = "See \\[docs\\]\\(https://example\\.com\\)";
        assert_eq!(escape_markdown_v2(input), expected);
    }
}
