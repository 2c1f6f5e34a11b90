//! Raw block layer of the model file: header line, `KEYWORD { KEY = value; }`
//! blocks and string quoting. Values are kept as undecoded text so that
//! migration steps can rewrite them before any field is interpreted.

use super::ModelFileError;

/// First token of every model file.
pub const MODEL_FILE_MAGIC: &str = "!LINKAGE MODEL FILE";

/// One `KEYWORD { ... }` block with its fields in file order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawBlock {
    pub keyword: String,
    /// Line of the keyword, for messages.
    pub line: usize,
    fields: Vec<(String, String)>,
}

impl RawBlock {
    pub fn new(keyword: impl Into<String>, line: usize) -> Self {
        Self {
            keyword: keyword.into(),
            line,
            fields: Vec::new(),
        }
    }

    /// Raw value of `key`. A key given twice reads as its last value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.field(key).map(|(_, v)| v)
    }

    /// Stored key and raw value of `key`.
    pub(crate) fn field(&self, key: &str) -> Option<(&str, &str)> {
        self.fields
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Replace the value of `key`, or append it.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((key.to_owned(), value)),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let last = self.get(key).map(str::to_owned);
        self.fields.retain(|(k, _)| k != key);
        last
    }

    /// Rename `from` to `to`. Returns whether `from` was present.
    pub fn rename(&mut self, from: &str, to: &str) -> bool {
        let mut found = false;
        for (k, _) in self.fields.iter_mut().filter(|(k, _)| k == from) {
            *k = to.to_owned();
            found = true;
        }
        found
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A parsed model file before decoding.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawModel {
    pub version: u32,
    pub blocks: Vec<RawBlock>,
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

struct Cursor<'a> {
    text: &'a str,
    pos: usize,
    line: usize,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    /// Skip whitespace and `!` comment lines.
    fn skip_blank(&mut self) {
        while let Some(c) = self.peek() {
            if c == '!' {
                while self.peek().is_some_and(|c| c != '\n') {
                    self.bump();
                }
            } else if c.is_whitespace() {
                self.bump();
            } else {
                break;
            }
        }
    }

    fn ident(&mut self) -> &'a str {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_alphanumeric() || c == '_') {
            self.bump();
        }
        &self.text[start..self.pos]
    }

    fn expect(&mut self, want: char, what: &str) -> Result<(), ModelFileError> {
        self.skip_blank();
        match self.peek() {
            Some(c) if c == want => {
                self.bump();
                Ok(())
            }
            Some(c) => Err(self.syntax(format!("expected {what}, found `{c}`"))),
            None => Err(self.syntax(format!("expected {what}, found end of file"))),
        }
    }

    /// Everything up to the next `;` outside a quoted string.
    fn value(&mut self) -> Result<&'a str, ModelFileError> {
        let start = self.pos;
        let start_line = self.line;
        let mut quoted = false;
        let mut escaped = false;
        while let Some(c) = self.bump() {
            if quoted {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == '"' {
                    quoted = false;
                }
            } else if c == '"' {
                quoted = true;
            } else if c == ';' {
                return Ok(self.text[start..self.pos - 1].trim());
            }
        }
        Err(ModelFileError::Syntax {
            line: start_line,
            message: "value is not terminated by `;`".into(),
        })
    }

    fn syntax(&self, message: String) -> ModelFileError {
        ModelFileError::Syntax {
            line: self.line,
            message,
        }
    }
}

/// Split a model file into its version and raw blocks.
pub fn parse_model_text(text: &str) -> Result<RawModel, ModelFileError> {
    let (first, rest) = text.split_once('\n').unwrap_or((text, ""));
    let Some(version) = first.trim().strip_prefix(MODEL_FILE_MAGIC) else {
        let shown: String = first.chars().take(40).collect();
        return Err(ModelFileError::Header(format!("missing `{MODEL_FILE_MAGIC}` in `{shown}`")));
    };
    let version: u32 = version
        .trim()
        .parse()
        .map_err(|_| ModelFileError::Header(format!("bad version `{}`", version.trim())))?;

    let mut cur = Cursor {
        text: rest,
        pos: 0,
        line: 2,
    };
    let mut blocks = Vec::new();
    loop {
        cur.skip_blank();
        if cur.peek().is_none() {
            break;
        }
        let line = cur.line;
        let keyword = cur.ident();
        if keyword.is_empty() {
            return Err(cur.syntax("expected a block keyword".into()));
        }
        let mut block = RawBlock::new(keyword, line);
        cur.expect('{', "`{`")?;
        loop {
            cur.skip_blank();
            if cur.peek() == Some('}') {
                cur.bump();
                break;
            }
            let key = cur.ident();
            if key.is_empty() {
                return Err(match cur.peek() {
                    Some(c) => cur.syntax(format!("expected a field name, found `{c}`")),
                    None => cur.syntax(format!("{keyword} block is not closed")),
                });
            }
            cur.expect('=', "`=`")?;
            let value = cur.value()?;
            block.fields.push((key.to_owned(), value.to_owned()));
        }
        blocks.push(block);
    }
    Ok(RawModel { version, blocks })
}

// ---------------------------------------------------------------------------
// Strings
// ---------------------------------------------------------------------------

/// Double-quote `text`, escaping backslashes, quotes and newlines.
pub fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Inverse of [`quote`]. `None` if `raw` is not a quoted string.
pub fn unquote(raw: &str) -> Option<String> {
    let inner = raw.strip_prefix('"')?.strip_suffix('"')?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            'n' => out.push('\n'),
            other => out.push(other),
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_and_fields() {
        let text = "!LINKAGE MODEL FILE 3\n\n! comment\nTRIAD\n{\n  ID = 1;\n  DESCR = \"a; b\";\n}\n\nPART {ID=2;}\n";
        let raw = parse_model_text(text).unwrap();
        assert_eq!(raw.version, 3);
        assert_eq!(raw.blocks.len(), 2);
        assert_eq!(raw.blocks[0].keyword, "TRIAD");
        assert_eq!(raw.blocks[0].line, 4);
        assert_eq!(raw.blocks[0].get("DESCR"), Some("\"a; b\""));
        assert_eq!(raw.blocks[1].get("ID"), Some("2"));
    }

    #[test]
    fn header_is_required() {
        assert!(matches!(parse_model_text(""), Err(ModelFileError::Header(_))));
        assert!(matches!(
            parse_model_text("TRIAD\n{\n}\n"),
            Err(ModelFileError::Header(_))
        ));
        assert!(matches!(
            parse_model_text("!LINKAGE MODEL FILE x\n"),
            Err(ModelFileError::Header(_))
        ));
    }

    #[test]
    fn syntax_errors_carry_line() {
        let err = parse_model_text("!LINKAGE MODEL FILE 3\nTRIAD\n{\n  ID 1;\n}\n").unwrap_err();
        match err {
            ModelFileError::Syntax { line, message } => {
                assert_eq!(line, 4);
                assert!(message.contains("`=`"), "{message}");
            }
            other => panic!("unexpected {other}"),
        }
        let err = parse_model_text("!LINKAGE MODEL FILE 3\nTRIAD\n{\n  ID = 1\n}\n").unwrap_err();
        assert!(matches!(err, ModelFileError::Syntax { line: 4, .. }));
    }

    #[test]
    fn quoting_escapes_specials() {
        let text = "say \"hi\"\nC:\\tmp";
        let q = quote(text);
        assert_eq!(q, "\"say \\\"hi\\\"\\nC:\\\\tmp\"");
        assert_eq!(unquote(&q).as_deref(), Some(text));
        assert_eq!(unquote("bare"), None);
    }

    #[test]
    fn block_edits() {
        let mut b = RawBlock::new("TRIAD", 1);
        b.set("A", "1");
        b.set("A", "2");
        assert_eq!(b.len(), 1);
        assert!(b.rename("A", "B"));
        assert!(!b.rename("A", "C"));
        assert_eq!(b.remove("B").as_deref(), Some("2"));
        assert!(b.is_empty());
    }
}
