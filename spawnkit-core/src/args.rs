//! Conversion between argument lists and a single argument line.
//!
//! The line format is the one the Windows C runtime uses to build `argv`:
//! on Windows it is passed to the loader untouched, everywhere else
//! [`split`] turns it back into an argument vector before launch.

/// Joins `tokens` into one argument line that [`split`] parses back into the
/// same tokens.
///
/// Tokens without whitespace get each `"` tripled. Tokens with whitespace
/// get each `"` doubled and are wrapped in quotes.
///
/// A tripled quote leaves the parser inside a quoted region, so a token that
/// has quotes but no whitespace only survives the trip as the last token.
pub fn quote<I, S>(tokens: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tokens
        .into_iter()
        .map(|token| quote_token(token.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}

fn quote_token(token: &str) -> String {
    if token.contains(char::is_whitespace) {
        format!("\"{}\"", token.replace('"', "\"\""))
    } else {
        token.replace('"', "\"\"\"")
    }
}

/// Splits an argument line into arguments.
///
/// Spaces and tabs separate arguments outside quotes. A `"` toggles quoting;
/// `""` inside a quoted region is a literal quote and the region continues.
/// Backslashes are literal unless they precede a quote: `2n` of them yield
/// `n` backslashes and the quote is processed normally, `2n + 1` yield `n`
/// backslashes and a literal quote.
pub fn split(line: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut chars = line.chars().peekable();

    loop {
        while matches!(chars.peek(), Some(' ') | Some('\t')) {
            chars.next();
        }
        if chars.peek().is_none() {
            break;
        }

        let mut arg = String::new();
        let mut quoted = false;

        while let Some(c) = chars.next() {
            match c {
                ' ' | '\t' if !quoted => break,
                '\\' => {
                    let mut backslashes = 1;
                    while chars.peek() == Some(&'\\') {
                        chars.next();
                        backslashes += 1;
                    }
                    if chars.peek() == Some(&'"') {
                        arg.extend(std::iter::repeat('\\').take(backslashes / 2));
                        if backslashes % 2 == 1 {
                            chars.next();
                            arg.push('"');
                        }
                    } else {
                        arg.extend(std::iter::repeat('\\').take(backslashes));
                    }
                }
                '"' => {
                    if quoted && chars.peek() == Some(&'"') {
                        chars.next();
                        arg.push('"');
                    } else {
                        quoted = !quoted;
                    }
                }
                c => arg.push(c),
            }
        }

        args.push(arg);
    }

    args
}
