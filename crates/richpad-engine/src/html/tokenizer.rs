//! A small, forgiving HTML tokenizer: tags, attributes and text, with
//! entity decoding. Comments and doctypes are skipped; script and style
//! elements swallow their raw content. Anything unparseable degrades to
//! text rather than an error.

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Open {
        name: String,
        attrs: Vec<(String, String)>,
        self_closing: bool,
    },
    Close {
        name: String,
    },
    Text(String),
}

pub fn tokenize(input: &str) -> Vec<Token> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;
    let mut text_start = 0;

    while pos < bytes.len() {
        if bytes[pos] != b'<' {
            pos += 1;
            continue;
        }
        if input[pos..].starts_with("<!--") {
            if pos > text_start {
                push_text(&mut tokens, &input[text_start..pos]);
            }
            let end = input[pos..].find("-->").map_or(input.len(), |i| pos + i + 3);
            pos = end;
            text_start = pos;
            continue;
        }
        if input[pos..].starts_with("<!") || input[pos..].starts_with("<?") {
            if pos > text_start {
                push_text(&mut tokens, &input[text_start..pos]);
            }
            let end = input[pos..].find('>').map_or(input.len(), |i| pos + i + 1);
            pos = end;
            text_start = pos;
            continue;
        }
        match parse_tag(input, pos) {
            Some((token, end)) => {
                if pos > text_start {
                    push_text(&mut tokens, &input[text_start..pos]);
                }
                let raw_container = match &token {
                    Token::Open { name, self_closing, .. } if !*self_closing => {
                        matches!(name.as_str(), "script" | "style").then(|| name.clone())
                    }
                    _ => None,
                };
                tokens.push(token);
                pos = end;
                if let Some(name) = raw_container {
                    // Swallow raw text up to the matching close tag.
                    let close = format!("</{name}");
                    if let Some(i) = input[pos..].to_lowercase().find(&close) {
                        let after = pos + i;
                        let end = input[after..]
                            .find('>')
                            .map_or(input.len(), |j| after + j + 1);
                        tokens.push(Token::Close { name });
                        pos = end;
                    } else {
                        pos = input.len();
                    }
                }
                text_start = pos;
            }
            None => {
                // A lone `<`: treat as text.
                pos += 1;
            }
        }
    }
    if input.len() > text_start {
        push_text(&mut tokens, &input[text_start..]);
    }
    tokens
}

fn push_text(tokens: &mut Vec<Token>, raw: &str) {
    let decoded = html_escape::decode_html_entities(raw).to_string();
    if !decoded.is_empty() {
        tokens.push(Token::Text(decoded));
    }
}

/// Parse one tag starting at `<`. Returns the token and the position past
/// the closing `>`.
fn parse_tag(input: &str, start: usize) -> Option<(Token, usize)> {
    let bytes = input.as_bytes();
    let mut pos = start + 1;
    let closing = bytes.get(pos) == Some(&b'/');
    if closing {
        pos += 1;
    }
    let name_start = pos;
    while pos < bytes.len() && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'-') {
        pos += 1;
    }
    if pos == name_start {
        return None;
    }
    let name = input[name_start..pos].to_ascii_lowercase();

    let mut attrs = Vec::new();
    let mut self_closing = false;
    loop {
        while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        match bytes.get(pos) {
            None => return Some((finish_tag(name, attrs, closing, self_closing), pos)),
            Some(b'>') => {
                return Some((finish_tag(name, attrs, closing, self_closing), pos + 1));
            }
            Some(b'/') => {
                self_closing = true;
                pos += 1;
            }
            Some(_) => {
                let (attr, next) = parse_attr(input, pos);
                if let Some(attr) = attr {
                    attrs.push(attr);
                }
                if next == pos {
                    pos += 1;
                } else {
                    pos = next;
                }
            }
        }
    }
}

fn finish_tag(name: String, attrs: Vec<(String, String)>, closing: bool, self_closing: bool) -> Token {
    if closing {
        Token::Close { name }
    } else {
        Token::Open {
            name,
            attrs,
            self_closing,
        }
    }
}

fn parse_attr(input: &str, start: usize) -> (Option<(String, String)>, usize) {
    let bytes = input.as_bytes();
    let mut pos = start;
    let name_start = pos;
    while pos < bytes.len()
        && !bytes[pos].is_ascii_whitespace()
        && !matches!(bytes[pos], b'=' | b'>' | b'/')
    {
        pos += 1;
    }
    if pos == name_start {
        return (None, pos);
    }
    let name = input[name_start..pos].to_ascii_lowercase();
    while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
        pos += 1;
    }
    if bytes.get(pos) != Some(&b'=') {
        return (Some((name, String::new())), pos);
    }
    pos += 1;
    while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
        pos += 1;
    }
    let value = match bytes.get(pos) {
        Some(&quote @ (b'"' | b'\'')) => {
            pos += 1;
            let value_start = pos;
            while pos < bytes.len() && bytes[pos] != quote {
                pos += 1;
            }
            let value = &input[value_start..pos];
            if pos < bytes.len() {
                pos += 1;
            }
            value
        }
        _ => {
            let value_start = pos;
            while pos < bytes.len()
                && !bytes[pos].is_ascii_whitespace()
                && bytes[pos] != b'>'
            {
                pos += 1;
            }
            &input[value_start..pos]
        }
    };
    let value = html_escape::decode_html_entities(value).to_string();
    (Some((name, value)), pos)
}
