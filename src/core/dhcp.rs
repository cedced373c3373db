//! ISC-DHCP style configuration parser.
//!
//! The parser is a single pass over a token stream with a stack of open
//! blocks. Every `;`-terminated statement lands in the options of the block on
//! top of the stack; every `{ ... }` block becomes a [`Declaration`] of its
//! parent. Structural damage (unbalanced braces, a dangling statement at end of
//! input) is a [`ParseError`]; a single malformed statement is skipped and
//! recorded as a [`ParseWarning`] on the enclosing block.

use serde::Serialize;
use std::net::{Ipv4Addr, Ipv6Addr};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("line {line}: closing brace without a matching open block")]
    UnmatchedCloseBrace { line: usize },

    #[error("line {line}: '{keyword}' block is never closed")]
    UnclosedBlock { keyword: String, line: usize },

    #[error("line {line}: statement is missing its terminating ';'")]
    UnterminatedStatement { line: usize },

    #[error("line {line}: unterminated quoted string")]
    UnterminatedString { line: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseWarning {
    pub line: usize,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Statement {
    pub key: String,
    pub value: String,
    pub line: usize,
}

/// Statements of one block, in source order. Repeated keys are all kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Options(Vec<Statement>);

impl Options {
    /// Value of the last statement with this key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .find(|s| s.key == key)
            .map(|s| s.value.as_str())
    }

    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.0
            .iter()
            .filter(move |s| s.key == key)
            .map(|s| s.value.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.iter().any(|s| s.key == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Statement> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn push(&mut self, statement: Statement) {
        self.0.push(statement);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DhcpHost {
    pub hostname: String,
    /// Upper-case colon-hex, e.g. `1A:2B:3C:4D:5E:6F`.
    pub mac_address: Option<String>,
    pub fixed_address: Option<String>,
    pub options: Options,
    pub warnings: Vec<ParseWarning>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DhcpSubnet {
    /// CIDR notation, e.g. `10.0.0.0/24`.
    pub network: String,
    pub options: Options,
    pub hosts: Vec<DhcpHost>,
    pub declarations: Vec<Declaration>,
    pub warnings: Vec<ParseWarning>,
}

/// Any block that is neither `host` nor `subnet`: `shared-network`, `group`,
/// `pool`, `class`, `failover peer`, ...
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DhcpBlock {
    pub kind: String,
    pub name: Option<String>,
    pub options: Options,
    pub declarations: Vec<Declaration>,
    pub warnings: Vec<ParseWarning>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Declaration {
    Subnet(DhcpSubnet),
    Host(DhcpHost),
    Block(DhcpBlock),
}

impl Declaration {
    pub fn warnings(&self) -> &[ParseWarning] {
        match self {
            Declaration::Subnet(s) => &s.warnings,
            Declaration::Host(h) => &h.warnings,
            Declaration::Block(b) => &b.warnings,
        }
    }

    fn collect_hosts<'a>(&'a self, out: &mut Vec<&'a DhcpHost>) {
        match self {
            Declaration::Host(host) => out.push(host),
            Declaration::Subnet(subnet) => {
                out.extend(subnet.hosts.iter());
                for d in &subnet.declarations {
                    d.collect_hosts(out);
                }
            }
            Declaration::Block(block) => {
                for d in &block.declarations {
                    d.collect_hosts(out);
                }
            }
        }
    }

    fn collect_warnings<'a>(&'a self, out: &mut Vec<&'a ParseWarning>) {
        out.extend(self.warnings().iter());
        let nested: &[Declaration] = match self {
            Declaration::Subnet(subnet) => {
                for host in &subnet.hosts {
                    out.extend(host.warnings.iter());
                }
                &subnet.declarations
            }
            Declaration::Host(_) => &[],
            Declaration::Block(block) => &block.declarations,
        };
        for d in nested {
            d.collect_warnings(out);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DhcpConfig {
    /// Statements outside of any block.
    pub options: Options,
    pub declarations: Vec<Declaration>,
    pub warnings: Vec<ParseWarning>,
}

impl DhcpConfig {
    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    /// Every host in the file, depth first, in source order.
    pub fn hosts(&self) -> Vec<&DhcpHost> {
        let mut hosts = Vec::new();
        for d in &self.declarations {
            d.collect_hosts(&mut hosts);
        }
        hosts
    }

    /// Every warning in the file, ordered by line.
    pub fn all_warnings(&self) -> Vec<&ParseWarning> {
        let mut warnings: Vec<&ParseWarning> = self.warnings.iter().collect();
        for d in &self.declarations {
            d.collect_warnings(&mut warnings);
        }
        warnings.sort_by_key(|w| w.line);
        warnings
    }
}

/// Parse the text of a DHCP server configuration file.
pub fn parse(text: &str) -> Result<DhcpConfig, ParseError> {
    let tokens = tokenize(text)?;

    let mut root = Frame::root();
    let mut open: Vec<Frame> = Vec::new();
    let mut pending: Vec<Atom> = Vec::new();
    let mut pending_line = 0;

    for token in tokens {
        match token.kind {
            TokenKind::Atom(atom) => {
                if pending.is_empty() {
                    pending_line = token.line;
                }
                pending.push(atom);
            }
            TokenKind::Semi => {
                // 空敘述（多餘的 `;`）直接略過
                if pending.is_empty() {
                    continue;
                }
                let frame = top(&mut root, &mut open);
                match parse_statement(std::mem::take(&mut pending), pending_line) {
                    Ok(statement) => frame.options.push(statement),
                    Err(message) => frame.warn(pending_line, message),
                }
            }
            TokenKind::Open => {
                let line = if pending.is_empty() {
                    token.line
                } else {
                    pending_line
                };
                open.push(Frame::open(std::mem::take(&mut pending), line));
            }
            TokenKind::Close => {
                let Some(mut frame) = open.pop() else {
                    return Err(ParseError::UnmatchedCloseBrace { line: token.line });
                };
                if !pending.is_empty() {
                    let dropped = render(&std::mem::take(&mut pending));
                    frame.warn(
                        pending_line,
                        format!("statement `{}` is missing its terminating ';'", dropped),
                    );
                }
                let line = frame.line;
                let declaration = frame.finish();
                top(&mut root, &mut open).adopt(declaration, line);
            }
        }
    }

    if let Some(frame) = open.last() {
        return Err(ParseError::UnclosedBlock {
            keyword: frame.keyword.clone(),
            line: frame.line,
        });
    }
    if !pending.is_empty() {
        return Err(ParseError::UnterminatedStatement { line: pending_line });
    }

    Ok(DhcpConfig {
        options: root.options,
        declarations: root.declarations,
        warnings: root.warnings,
    })
}

/// Canonical MAC address: six octets, upper-case hex, colon separated.
///
/// Accepts `:` or `-` separators and single-digit octets (`1:2:3:a:b:c`).
pub fn canonical_mac(raw: &str) -> Option<String> {
    let octets: Vec<&str> = raw.split(|c| c == ':' || c == '-').collect();
    if octets.len() != 6 {
        return None;
    }

    let mut canonical = Vec::with_capacity(6);
    for octet in octets {
        if octet.is_empty() || octet.len() > 2 || !octet.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let value = u8::from_str_radix(octet, 16).ok()?;
        canonical.push(format!("{:02X}", value));
    }
    Some(canonical.join(":"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Atom {
    Word(String),
    Quoted(String),
}

impl Atom {
    fn text(&self) -> &str {
        match self {
            Atom::Word(s) | Atom::Quoted(s) => s,
        }
    }

    fn render(&self) -> String {
        match self {
            Atom::Word(s) => s.clone(),
            Atom::Quoted(s) => format!("\"{}\"", s),
        }
    }
}

fn render(atoms: &[Atom]) -> String {
    atoms.iter().map(Atom::render).collect::<Vec<_>>().join(" ")
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TokenKind {
    Atom(Atom),
    Open,
    Close,
    Semi,
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    line: usize,
}

fn tokenize(text: &str) -> Result<Vec<Token>, ParseError> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();
    let mut line = 1;

    while let Some(c) = chars.next() {
        match c {
            '\n' => line += 1,
            c if c.is_whitespace() => {}
            '#' => {
                while chars.next_if(|&next| next != '\n').is_some() {}
            }
            '{' => tokens.push(Token {
                kind: TokenKind::Open,
                line,
            }),
            '}' => tokens.push(Token {
                kind: TokenKind::Close,
                line,
            }),
            ';' => tokens.push(Token {
                kind: TokenKind::Semi,
                line,
            }),
            '"' => {
                let start = line;
                let mut inner = String::new();
                let mut closed = false;
                while let Some(c) = chars.next() {
                    match c {
                        '"' => {
                            closed = true;
                            break;
                        }
                        '\\' => {
                            inner.push(c);
                            if let Some(escaped) = chars.next() {
                                if escaped == '\n' {
                                    line += 1;
                                }
                                inner.push(escaped);
                            }
                        }
                        '\n' => {
                            line += 1;
                            inner.push(c);
                        }
                        _ => inner.push(c),
                    }
                }
                if !closed {
                    return Err(ParseError::UnterminatedString { line: start });
                }
                tokens.push(Token {
                    kind: TokenKind::Atom(Atom::Quoted(inner)),
                    line: start,
                });
            }
            _ => {
                let mut word = String::from(c);
                while let Some(next) = chars.next_if(|&next| {
                    !next.is_whitespace() && !matches!(next, '{' | '}' | ';' | '"' | '#')
                }) {
                    word.push(next);
                }
                tokens.push(Token {
                    kind: TokenKind::Atom(Atom::Word(word)),
                    line,
                });
            }
        }
    }

    Ok(tokens)
}

fn parse_statement(atoms: Vec<Atom>, line: usize) -> Result<Statement, String> {
    let mut atoms = atoms.into_iter();
    let keyword = match atoms.next() {
        Some(Atom::Word(word)) => word,
        Some(Atom::Quoted(text)) => {
            return Err(format!("statement starts with a quoted string \"{}\"", text))
        }
        None => return Err("empty statement".to_string()),
    };
    let rest: Vec<Atom> = atoms.collect();

    let (key, value) = match keyword.as_str() {
        "option" => {
            let Some((name, value)) = rest.split_first() else {
                return Err("`option` statement has no option name".to_string());
            };
            (format!("option {}", name.text()), render(value))
        }
        "hardware" => {
            let [kind, address] = rest.as_slice() else {
                return Err("`hardware` statement needs a hardware type and an address".to_string());
            };
            let value = if kind.text().eq_ignore_ascii_case("ethernet") {
                canonical_mac(address.text())
                    .ok_or_else(|| format!("invalid MAC address `{}`", address.text()))?
            } else {
                address.render()
            };
            (format!("hardware {}", kind.text().to_ascii_lowercase()), value)
        }
        "fixed-address" | "fixed-address6" if rest.is_empty() => {
            return Err(format!("`{}` statement has no address", keyword));
        }
        _ => (keyword, render(&rest)),
    };

    Ok(Statement { key, value, line })
}

struct Frame {
    keyword: String,
    args: Vec<Atom>,
    line: usize,
    options: Options,
    declarations: Vec<Declaration>,
    warnings: Vec<ParseWarning>,
}

fn top<'a>(root: &'a mut Frame, open: &'a mut [Frame]) -> &'a mut Frame {
    match open.last_mut() {
        Some(frame) => frame,
        None => root,
    }
}

impl Frame {
    fn root() -> Self {
        Self {
            keyword: String::new(),
            args: Vec::new(),
            line: 0,
            options: Options::default(),
            declarations: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn open(header: Vec<Atom>, line: usize) -> Self {
        let mut frame = Self {
            line,
            ..Self::root()
        };
        let mut header = header.into_iter();
        match header.next() {
            Some(Atom::Word(keyword)) => frame.keyword = keyword,
            Some(other) => {
                frame.warn(line, format!("block header starts with {}", other.render()));
                frame.args.push(other);
            }
            None => frame.warn(line, "block has no keyword".to_string()),
        }
        frame.args.extend(header);
        frame
    }

    fn warn(&mut self, line: usize, message: String) {
        self.warnings.push(ParseWarning { line, message });
    }

    fn adopt(&mut self, declaration: Declaration, line: usize) {
        if self.keyword == "host" {
            self.warn(line, "nested block inside a host declaration is ignored".to_string());
            return;
        }
        self.declarations.push(declaration);
    }

    fn finish(self) -> Declaration {
        match self.keyword.as_str() {
            "host" => Declaration::Host(self.into_host()),
            "subnet" | "subnet6" => Declaration::Subnet(self.into_subnet()),
            _ => Declaration::Block(self.into_block()),
        }
    }

    fn into_host(mut self) -> DhcpHost {
        let hostname = match self.args.first() {
            Some(name) => name.text().to_string(),
            None => {
                self.warn(self.line, "host declaration has no name".to_string());
                String::new()
            }
        };
        DhcpHost {
            hostname,
            mac_address: self.options.get("hardware ethernet").map(str::to_string),
            fixed_address: self
                .options
                .get("fixed-address")
                .or_else(|| self.options.get("fixed-address6"))
                .map(str::to_string),
            options: self.options,
            warnings: self.warnings,
        }
    }

    fn into_subnet(mut self) -> DhcpSubnet {
        let network = match subnet_network(&self.keyword, &self.args) {
            Ok(network) => network,
            Err(message) => {
                self.warn(self.line, message);
                render(&self.args)
            }
        };

        let mut hosts = Vec::new();
        let mut declarations = Vec::new();
        for declaration in self.declarations {
            match declaration {
                Declaration::Host(host) => hosts.push(host),
                other => declarations.push(other),
            }
        }

        DhcpSubnet {
            network,
            options: self.options,
            hosts,
            declarations,
            warnings: self.warnings,
        }
    }

    fn into_block(self) -> DhcpBlock {
        let name = match self.args.as_slice() {
            [] => None,
            [single] => Some(single.text().to_string()),
            many => Some(render(many)),
        };
        DhcpBlock {
            kind: self.keyword,
            name,
            options: self.options,
            declarations: self.declarations,
            warnings: self.warnings,
        }
    }
}

fn subnet_network(keyword: &str, args: &[Atom]) -> Result<String, String> {
    match (keyword, args) {
        ("subnet", [address, Atom::Word(netmask), mask]) if netmask == "netmask" => {
            let address: Ipv4Addr = address
                .text()
                .parse()
                .map_err(|_| format!("invalid subnet address `{}`", address.text()))?;
            let mask: Ipv4Addr = mask
                .text()
                .parse()
                .map_err(|_| format!("invalid netmask `{}`", mask.text()))?;
            let bits = u32::from(mask);
            let prefix = bits.leading_ones();
            if bits.count_ones() != prefix {
                return Err(format!("netmask `{}` is not contiguous", mask));
            }
            Ok(format!("{}/{}", address, prefix))
        }
        ("subnet6", [prefix]) => {
            let (address, length) = prefix
                .text()
                .split_once('/')
                .ok_or_else(|| format!("subnet6 prefix `{}` has no length", prefix.text()))?;
            let address: Ipv6Addr = address
                .parse()
                .map_err(|_| format!("invalid subnet6 address `{}`", address))?;
            let length: u8 = length
                .parse()
                .ok()
                .filter(|l| *l <= 128)
                .ok_or_else(|| format!("invalid subnet6 prefix length `{}`", length))?;
            Ok(format!("{}/{}", address, length))
        }
        _ => Err(format!("unrecognized {} header `{}`", keyword, render(args))),
    }
}
