//! Internal subset reader.
//!
//! Turns the raw text of a DOCTYPE internal subset into the flat declaration
//! tree consumed by [`extract`](super::extract): a `dtd` root element whose
//! children are one element per declaration, with the declaration's parts
//! as attributes.
//!
//! | declaration                   | node                 | attributes                                    |
//! |-------------------------------|----------------------|-----------------------------------------------|
//! | `<!ELEMENT e model>`          | `elementDecl`        | `ename`, `model`                              |
//! | `<!ELEMENT e (...)>`          | `contentModel` too   | `ename`, `model`                              |
//! | `<!ATTLIST e a type default>` | `attributeDecl`      | `ename`, `aname`, `atype`, `default`, `value`, `enumeration` |
//! | `<!ENTITY n "v">`             | `internalEntityDecl` | `name`, `value`                               |
//! | `<!ENTITY n SYSTEM ...>`      | `externalEntityDecl` | `name`, `pubid`, `sysid`                      |
//! | `<!ENTITY n ... NDATA x>`     | `unparsedEntityDecl` | `name`, `pubid`, `sysid`, `notation`          |
//! | `<!ENTITY % n ...>`           | `parameterEntityDecl`| `name`, `value` or `sysid`                    |
//! | `<!NOTATION n ...>`           | `notationDecl`       | `name`, `pubid`, `sysid`                      |
//!
//! Comments, processing instructions and parameter entity references are
//! skipped.

use tracing::trace;

use crate::error::{ParseError, SourceLocation};
use crate::tree::{Document, NodeId, NodeKind};

/// Parses an internal subset into a flat declaration tree.
///
/// # Errors
///
/// Returns `ParseError` at the first malformed declaration.
///
/// ```
/// use xmlfacade::dtd::parse::parse_internal_subset;
///
/// let tree = parse_internal_subset("<!ELEMENT a (#PCDATA)>").unwrap();
/// let dtd = tree.root_element().unwrap();
/// let decl = tree.first_child(dtd).unwrap();
/// assert_eq!(tree.node_name(decl), Some("elementDecl"));
/// assert_eq!(tree.attribute(decl, "model"), Some("(#PCDATA)"));
/// ```
pub fn parse_internal_subset(input: &str) -> Result<Document, ParseError> {
    let mut parser = SubsetParser::new(input);
    parser.parse()?;
    trace!(declarations = parser.count, "internal subset parsed");
    Ok(parser.tree)
}

struct SubsetParser<'a> {
    input: &'a str,
    pos: usize,
    tree: Document,
    dtd: NodeId,
    count: usize,
}

impl<'a> SubsetParser<'a> {
    fn new(input: &'a str) -> Self {
        let mut tree = Document::new();
        let dtd = tree.create_node(NodeKind::Element {
            name: "dtd".to_string(),
            prefix: None,
            namespace: None,
            attributes: Vec::new(),
        });
        let root = tree.root();
        tree.append_child(root, dtd);
        Self {
            input,
            pos: 0,
            tree,
            dtd,
            count: 0,
        }
    }

    fn parse(&mut self) -> Result<(), ParseError> {
        loop {
            self.skip_whitespace();
            if self.at_end() {
                return Ok(());
            }

            if self.looking_at("<!--") {
                self.skip_past("<!--", "-->")?;
            } else if self.looking_at("<!ELEMENT") {
                self.element_decl()?;
            } else if self.looking_at("<!ATTLIST") {
                self.attlist_decl()?;
            } else if self.looking_at("<!ENTITY") {
                self.entity_decl()?;
            } else if self.looking_at("<!NOTATION") {
                self.notation_decl()?;
            } else if self.looking_at("<?") {
                self.skip_past("<?", "?>")?;
            } else if self.peek() == Some('%') {
                self.advance(1);
                self.name()?;
                self.expect(";")?;
            } else {
                let found = self.peek().unwrap_or('?');
                return Err(self.fatal(format!("unexpected character '{found}' in DTD")));
            }
        }
    }

    /// Appends one declaration node with the given (name, value) attributes.
    fn emit(&mut self, tag: &str, attrs: &[(&str, Option<&str>)]) {
        let node = self.tree.create_node(NodeKind::Element {
            name: tag.to_string(),
            prefix: None,
            namespace: None,
            attributes: Vec::new(),
        });
        self.tree.append_child(self.dtd, node);
        for &(name, value) in attrs {
            if let Some(value) = value {
                self.tree.add_attribute(node, name, None, None, value);
            }
        }
        self.count += 1;
    }

    // --- ELEMENT ---

    fn element_decl(&mut self) -> Result<(), ParseError> {
        self.expect("<!ELEMENT")?;
        self.require_whitespace()?;
        let name = self.name()?;
        self.require_whitespace()?;
        let model = self.content_model()?;
        self.skip_whitespace();
        self.expect(">")?;

        let attrs = [("ename", Some(name.as_str())), ("model", Some(model.as_str()))];
        self.emit("elementDecl", &attrs);
        if model.starts_with('(') {
            self.emit("contentModel", &attrs);
        }
        Ok(())
    }

    /// Reads a content model and returns it with whitespace removed.
    fn content_model(&mut self) -> Result<String, ParseError> {
        if self.looking_at("EMPTY") {
            self.advance(5);
            return Ok("EMPTY".to_string());
        }
        if self.looking_at("ANY") {
            self.advance(3);
            return Ok("ANY".to_string());
        }

        self.expect("(")?;
        self.skip_whitespace();
        if !self.looking_at("#PCDATA") {
            return self.group();
        }

        self.advance("#PCDATA".len());
        let mut model = String::from("(#PCDATA");
        let mut names = 0;
        loop {
            self.skip_whitespace();
            if self.peek() != Some('|') {
                break;
            }
            self.advance(1);
            self.skip_whitespace();
            model.push('|');
            model.push_str(&self.name()?);
            names += 1;
        }
        self.expect(")")?;
        model.push(')');
        if names > 0 {
            self.expect("*")?;
            model.push('*');
        } else if self.peek() == Some('*') {
            self.advance(1);
            model.push('*');
        }
        Ok(model)
    }

    /// Reads a sequence or choice group whose `(` is already consumed.
    fn group(&mut self) -> Result<String, ParseError> {
        let mut model = String::from("(");
        model.push_str(&self.particle()?);
        self.skip_whitespace();

        if let Some(sep) = self.peek().filter(|&c| c == ',' || c == '|') {
            while self.peek() == Some(sep) {
                self.advance(1);
                self.skip_whitespace();
                model.push(sep);
                model.push_str(&self.particle()?);
                self.skip_whitespace();
            }
        }

        self.expect(")")?;
        model.push(')');
        model.push_str(self.occurrence());
        Ok(model)
    }

    fn particle(&mut self) -> Result<String, ParseError> {
        if self.peek() == Some('(') {
            self.advance(1);
            self.skip_whitespace();
            return self.group();
        }
        let mut particle = self.name()?;
        particle.push_str(self.occurrence());
        Ok(particle)
    }

    fn occurrence(&mut self) -> &'static str {
        let occurrence = match self.peek() {
            Some('?') => "?",
            Some('*') => "*",
            Some('+') => "+",
            _ => return "",
        };
        self.advance(1);
        occurrence
    }

    // --- ATTLIST ---

    fn attlist_decl(&mut self) -> Result<(), ParseError> {
        self.expect("<!ATTLIST")?;
        self.require_whitespace()?;
        let element = self.name()?;

        loop {
            self.skip_whitespace();
            if self.peek() == Some('>') {
                self.advance(1);
                return Ok(());
            }

            let attribute = self.name()?;
            self.require_whitespace()?;
            let (atype, enumeration) = self.attribute_type()?;
            self.require_whitespace()?;
            let (default, value) = self.attribute_default()?;

            let enumeration = enumeration.map(|values| values.join(" "));
            self.emit(
                "attributeDecl",
                &[
                    ("ename", Some(element.as_str())),
                    ("aname", Some(attribute.as_str())),
                    ("atype", Some(atype)),
                    ("default", default),
                    ("value", value.as_deref()),
                    ("enumeration", enumeration.as_deref()),
                ],
            );
        }
    }

    fn attribute_type(&mut self) -> Result<(&'static str, Option<Vec<String>>), ParseError> {
        // longest keywords first so IDREFS is not read as ID
        const KEYWORDS: [&str; 8] = [
            "CDATA", "IDREFS", "IDREF", "ID", "ENTITIES", "ENTITY", "NMTOKENS", "NMTOKEN",
        ];
        if let Some(keyword) = KEYWORDS.into_iter().find(|k| self.looking_at(k)) {
            self.advance(keyword.len());
            return Ok((keyword, None));
        }
        if self.looking_at("NOTATION") {
            self.advance("NOTATION".len());
            self.require_whitespace()?;
            let values = self.enumeration()?;
            return Ok(("NOTATION", Some(values)));
        }
        if self.peek() == Some('(') {
            let values = self.enumeration()?;
            return Ok(("ENUMERATION", Some(values)));
        }
        Err(self.fatal("expected attribute type"))
    }

    fn enumeration(&mut self) -> Result<Vec<String>, ParseError> {
        self.expect("(")?;
        let mut values = Vec::new();
        loop {
            self.skip_whitespace();
            values.push(self.nmtoken()?);
            self.skip_whitespace();
            match self.peek() {
                Some('|') => self.advance(1),
                Some(')') => {
                    self.advance(1);
                    return Ok(values);
                }
                _ => return Err(self.fatal("expected '|' or ')' in enumeration")),
            }
        }
    }

    fn attribute_default(&mut self) -> Result<(Option<&'static str>, Option<String>), ParseError> {
        for keyword in ["#REQUIRED", "#IMPLIED"] {
            if self.looking_at(keyword) {
                self.advance(keyword.len());
                return Ok((Some(keyword), None));
            }
        }
        if self.looking_at("#FIXED") {
            self.advance("#FIXED".len());
            self.require_whitespace()?;
            let value = self.quoted()?;
            return Ok((Some("#FIXED"), Some(value)));
        }
        let value = self.quoted()?;
        Ok((None, Some(value)))
    }

    // --- ENTITY ---

    fn entity_decl(&mut self) -> Result<(), ParseError> {
        self.expect("<!ENTITY")?;
        self.require_whitespace()?;
        let parameter = self.peek() == Some('%');
        if parameter {
            self.advance(1);
            self.require_whitespace()?;
        }
        let name = self.name()?;
        if name.contains(':') {
            return Err(self.fatal(format!("entity name '{name}' must not contain a colon")));
        }
        self.require_whitespace()?;

        if matches!(self.peek(), Some('"' | '\'')) {
            let value = self.quoted()?;
            self.skip_whitespace();
            self.expect(">")?;
            let tag = if parameter {
                "parameterEntityDecl"
            } else {
                "internalEntityDecl"
            };
            self.emit(tag, &[("name", Some(name.as_str())), ("value", Some(value.as_str()))]);
            return Ok(());
        }

        let (public_id, system_id) = self.external_id(false)?;
        let had_space = self.skip_whitespace();
        let mut notation = None;
        if self.looking_at("NDATA") {
            if parameter {
                return Err(self.fatal("NDATA annotation is not allowed on parameter entities"));
            }
            if !had_space {
                return Err(self.fatal("whitespace required before NDATA"));
            }
            self.advance("NDATA".len());
            self.require_whitespace()?;
            notation = Some(self.name()?);
            self.skip_whitespace();
        }
        self.expect(">")?;

        let tag = match (parameter, &notation) {
            (true, _) => "parameterEntityDecl",
            (false, Some(_)) => "unparsedEntityDecl",
            (false, None) => "externalEntityDecl",
        };
        self.emit(
            tag,
            &[
                ("name", Some(name.as_str())),
                ("pubid", public_id.as_deref()),
                ("sysid", system_id.as_deref()),
                ("notation", notation.as_deref()),
            ],
        );
        Ok(())
    }

    /// Reads `SYSTEM "sys"` or `PUBLIC "pub" "sys"`. With `notation` set the
    /// system literal after a public id is optional.
    fn external_id(&mut self, notation: bool) -> Result<(Option<String>, Option<String>), ParseError> {
        if self.looking_at("SYSTEM") {
            self.advance("SYSTEM".len());
            self.require_whitespace()?;
            return Ok((None, Some(self.quoted()?)));
        }
        if self.looking_at("PUBLIC") {
            self.advance("PUBLIC".len());
            self.require_whitespace()?;
            let public_id = self.quoted()?;
            let had_space = self.skip_whitespace();
            let system_id = if matches!(self.peek(), Some('"' | '\'')) {
                if !had_space {
                    return Err(self.fatal("whitespace required after public identifier"));
                }
                Some(self.quoted()?)
            } else if notation {
                None
            } else {
                return Err(self.fatal("system literal expected after public identifier"));
            };
            return Ok((Some(public_id), system_id));
        }
        Err(self.fatal("expected SYSTEM or PUBLIC"))
    }

    // --- NOTATION ---

    fn notation_decl(&mut self) -> Result<(), ParseError> {
        self.expect("<!NOTATION")?;
        self.require_whitespace()?;
        let name = self.name()?;
        self.require_whitespace()?;
        let (public_id, system_id) = self.external_id(true)?;
        self.skip_whitespace();
        self.expect(">")?;
        self.emit(
            "notationDecl",
            &[
                ("name", Some(name.as_str())),
                ("pubid", public_id.as_deref()),
                ("sysid", system_id.as_deref()),
            ],
        );
        Ok(())
    }

    // --- Tokens ---

    fn name(&mut self) -> Result<String, ParseError> {
        match self.peek() {
            Some(c) if is_name_start_char(c) => {}
            Some(c) => return Err(self.fatal(format!("invalid name start character: '{c}'"))),
            None => return Err(self.fatal("expected name, found end of input")),
        }
        Ok(self.take_while(is_name_char).to_string())
    }

    fn nmtoken(&mut self) -> Result<String, ParseError> {
        let token = self.take_while(is_name_char);
        if token.is_empty() {
            return Err(self.fatal("expected NMTOKEN"));
        }
        Ok(token.to_string())
    }

    fn quoted(&mut self) -> Result<String, ParseError> {
        let quote = match self.peek() {
            Some(q @ ('"' | '\'')) => q,
            _ => return Err(self.fatal("expected quoted value")),
        };
        self.advance(1);
        let rest = &self.input[self.pos..];
        let Some(len) = rest.find(quote) else {
            return Err(self.fatal("unexpected end of input in quoted value"));
        };
        let value = rest[..len].to_string();
        self.advance(len + 1);
        Ok(value)
    }

    fn skip_past(&mut self, open: &str, close: &str) -> Result<(), ParseError> {
        self.expect(open)?;
        match self.input[self.pos..].find(close) {
            Some(end) => {
                self.advance(end + close.len());
                Ok(())
            }
            None => Err(self.fatal(format!("unexpected end of input, expected '{close}'"))),
        }
    }

    // --- Cursor ---

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn advance(&mut self, bytes: usize) {
        self.pos = (self.pos + bytes).min(self.input.len());
    }

    fn looking_at(&self, s: &str) -> bool {
        self.input[self.pos..].starts_with(s)
    }

    fn expect(&mut self, s: &str) -> Result<(), ParseError> {
        if self.looking_at(s) {
            self.advance(s.len());
            Ok(())
        } else {
            let found = self.peek().map_or_else(|| "end of input".to_string(), |c| format!("'{c}'"));
            Err(self.fatal(format!("expected '{s}', found {found}")))
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let input: &'a str = self.input;
        let rest = &input[self.pos..];
        let len = rest.find(|c: char| !pred(c)).unwrap_or(rest.len());
        self.pos += len;
        &rest[..len]
    }

    fn skip_whitespace(&mut self) -> bool {
        !self
            .take_while(|c| matches!(c, ' ' | '\t' | '\r' | '\n'))
            .is_empty()
    }

    fn require_whitespace(&mut self) -> Result<(), ParseError> {
        if self.skip_whitespace() {
            Ok(())
        } else {
            Err(self.fatal("whitespace required"))
        }
    }

    fn fatal(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(message, SourceLocation::from_offset(self.input, self.pos))
    }
}

fn is_name_start_char(c: char) -> bool {
    matches!(c,
        ':' | 'A'..='Z' | '_' | 'a'..='z' |
        '\u{C0}'..='\u{D6}' | '\u{D8}'..='\u{F6}' | '\u{F8}'..='\u{2FF}' |
        '\u{370}'..='\u{37D}' | '\u{37F}'..='\u{1FFF}' |
        '\u{200C}'..='\u{200D}' | '\u{2070}'..='\u{218F}' |
        '\u{2C00}'..='\u{2FEF}' | '\u{3001}'..='\u{D7FF}' |
        '\u{F900}'..='\u{FDCF}' | '\u{FDF0}'..='\u{FFFD}' |
        '\u{10000}'..='\u{EFFFF}'
    )
}

fn is_name_char(c: char) -> bool {
    is_name_start_char(c)
        || matches!(c,
            '-' | '.' | '0'..='9' | '\u{B7}' |
            '\u{300}'..='\u{36F}' | '\u{203F}'..='\u{2040}'
        )
}
