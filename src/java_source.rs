//! Lightweight Java source reader.
//!
//! Produces a [`ClassRecord`] per file: package, import table, declared types with
//! their raw supertypes, raw field/parameter/return types, and the set of simple
//! names used in type position anywhere in the file. No symbol resolution happens
//! here; strategies resolve raw identifiers later against the index.
//!
//! Pure-data: `parse_source()` works on a string, so tests need no disk I/O.

use crate::error::ParseError;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;
use std::path::{Path, PathBuf};

pub const SOURCE_EXTENSION: &str = "java";

// ── Public types ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Production,
    Test,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Class,
    Interface,
    Enum,
    Record,
    Annotation,
}

/// A type declared in a file, nested types included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDecl {
    pub name: String,
    /// Name relative to the package (`Outer.Inner` for nested types).
    pub qualified: String,
    pub kind: DeclKind,
    /// Raw `extends`/`implements` identifiers, e.g. `Repo<User>` or `a.b.Base`.
    pub supertypes: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ClassRecord {
    pub fqn: String,
    pub simple_name: String,
    pub package: String,
    pub path: PathBuf,
    pub kind: SourceKind,
    /// simple name → FQN for single-type imports (static imports record the owning class).
    pub imports: BTreeMap<String, String>,
    pub wildcard_imports: BTreeSet<String>,
    pub declarations: Vec<TypeDecl>,
    pub field_types: Vec<String>,
    pub parameter_types: Vec<String>,
    pub return_types: Vec<String>,
    /// Simple names appearing in type position anywhere in the file.
    pub type_refs: BTreeSet<String>,
}

impl ClassRecord {
    pub fn imports_fqn(&self, fqn: &str) -> bool {
        self.imports.values().any(|imported| imported == fqn)
    }

    pub fn references_type(&self, simple: &str) -> bool {
        self.type_refs.contains(simple)
    }

    /// FQN of a declaration in this file.
    pub fn declared_fqn(&self, decl: &TypeDecl) -> String {
        if self.package.is_empty() {
            decl.qualified.clone()
        } else {
            format!("{}.{}", self.package, decl.qualified)
        }
    }
}

// ── Name helpers ──────────────────────────────────────────────────────────────

pub fn simple_name(fqn: &str) -> &str {
    fqn.rsplit('.').next().unwrap_or(fqn)
}

pub fn package_of(fqn: &str) -> &str {
    fqn.rfind('.').map(|dot| &fqn[..dot]).unwrap_or("")
}

/// `Map<K, V>[]` → `Map`, `a.b.Foo...` → `a.b.Foo`.
pub fn strip_generics(raw: &str) -> &str {
    let head = raw.split('<').next().unwrap_or(raw);
    head.trim_end_matches("...")
        .trim_end_matches("[]")
        .trim()
}

/// Simple names nested in a raw type's argument list: `Map<String, List<Foo>>` → `[String, List, Foo]`.
pub fn generic_arguments(raw: &str) -> Vec<String> {
    lazy_static! {
        static ref QUALIFIED_NAME: Regex =
            Regex::new(r"[A-Za-z_$][A-Za-z0-9_$]*(?:\.[A-Za-z_$][A-Za-z0-9_$]*)*")
                .expect("valid qualified name regex");
    }
    let Some(open) = raw.find('<') else {
        return Vec::new();
    };
    QUALIFIED_NAME
        .find_iter(&raw[open..])
        .map(|m| simple_name(m.as_str()))
        .filter(|name| !is_keyword(name))
        .map(str::to_string)
        .collect()
}

/// Derive an FQN from a path relative to its source root: `com/example/Foo.java` → `com.example.Foo`.
pub fn fqn_from_relative(relative: &Path) -> Option<String> {
    if relative.extension().and_then(|e| e.to_str()) != Some(SOURCE_EXTENSION) {
        return None;
    }
    let parts: Vec<String> = relative
        .with_extension("")
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("."))
}

// ── Entry point ───────────────────────────────────────────────────────────────

pub fn parse_source(
    content: &str,
    path: &Path,
    fqn: &str,
    kind: SourceKind,
) -> Result<ClassRecord, ParseError> {
    let fail = |reason: String| ParseError {
        path: path.to_path_buf(),
        reason,
    };

    let tokens = tokenize(content).map_err(fail)?;
    let mut parser = Parser::new(tokens);
    parser.parse_header().map_err(fail)?;
    parser.parse_members(false, "", false).map_err(fail)?;

    let mut type_refs = collect_type_refs(&parser.tokens[parser.body_start..]);
    let declared_raw = parser
        .field_types
        .iter()
        .chain(&parser.parameter_types)
        .chain(&parser.return_types)
        .chain(parser.declarations.iter().flat_map(|d| d.supertypes.iter()));
    for raw in declared_raw {
        // `a.b.Outer.Inner` names both `Outer` and `Inner`.
        let head = simple_name(strip_generics(raw));
        let scopes = strip_generics(raw)
            .split('.')
            .filter(|seg| seg.starts_with(|c: char| c.is_ascii_uppercase()));
        for name in std::iter::once(head).chain(scopes) {
            if !name.is_empty() && !is_keyword(name) {
                type_refs.insert(name.to_string());
            }
        }
        type_refs.extend(generic_arguments(raw));
    }

    Ok(ClassRecord {
        fqn: fqn.to_string(),
        simple_name: simple_name(fqn).to_string(),
        package: parser.package,
        path: path.to_path_buf(),
        kind,
        imports: parser.imports,
        wildcard_imports: parser.wildcard_imports,
        declarations: parser.declarations,
        field_types: parser.field_types,
        parameter_types: parser.parameter_types,
        return_types: parser.return_types,
        type_refs,
    })
}

// ── Lexer ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    Ident(&'a str),
    Punct(char),
    Ellipsis,
    ColonColon,
    Literal,
}

impl Token<'_> {
    fn is(&self, c: char) -> bool {
        *self == Token::Punct(c)
    }

    fn is_word(&self, word: &str) -> bool {
        matches!(self, Token::Ident(s) if *s == word)
    }
}

fn tokenize(src: &str) -> Result<Vec<Token<'_>>, String> {
    let bytes = src.as_bytes();
    let mut tokens = Vec::with_capacity(bytes.len() / 4);
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        let next = bytes.get(i + 1).copied();

        if c.is_ascii_whitespace() {
            i += 1;
        } else if c == b'/' && next == Some(b'/') {
            while i < bytes.len() && bytes[i] != b'\n' {
                i += 1;
            }
        } else if c == b'/' && next == Some(b'*') {
            let end = src[i + 2..]
                .find("*/")
                .ok_or_else(|| "unterminated block comment".to_string())?;
            i += 2 + end + 2;
        } else if src[i..].starts_with("\"\"\"") {
            i = skip_text_block(bytes, i + 3)?;
            tokens.push(Token::Literal);
        } else if c == b'"' || c == b'\'' {
            i = skip_quoted(bytes, i + 1, c)?;
            tokens.push(Token::Literal);
        } else if c.is_ascii_digit() {
            while i < bytes.len() {
                let b = bytes[i];
                let fraction = b == b'.' && bytes.get(i + 1).is_some_and(|n| n.is_ascii_digit());
                if b.is_ascii_alphanumeric() || b == b'_' || fraction {
                    i += 1;
                } else {
                    break;
                }
            }
            tokens.push(Token::Literal);
        } else if c.is_ascii_alphabetic() || c == b'_' || c == b'$' || c >= 0x80 {
            let start = i;
            while i < bytes.len()
                && (bytes[i].is_ascii_alphanumeric()
                    || bytes[i] == b'_'
                    || bytes[i] == b'$'
                    || bytes[i] >= 0x80)
            {
                i += 1;
            }
            tokens.push(Token::Ident(&src[start..i]));
        } else if src[i..].starts_with("...") {
            tokens.push(Token::Ellipsis);
            i += 3;
        } else if c == b':' && next == Some(b':') {
            tokens.push(Token::ColonColon);
            i += 2;
        } else {
            tokens.push(Token::Punct(c as char));
            i += 1;
        }
    }

    Ok(tokens)
}

fn skip_quoted(bytes: &[u8], mut i: usize, quote: u8) -> Result<usize, String> {
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'\n' => break,
            b if b == quote => return Ok(i + 1),
            _ => i += 1,
        }
    }
    Err(if quote == b'"' {
        "unterminated string literal".to_string()
    } else {
        "unterminated char literal".to_string()
    })
}

fn skip_text_block(bytes: &[u8], mut i: usize) -> Result<usize, String> {
    while i < bytes.len() {
        if bytes[i] == b'\\' {
            i += 2;
        } else if bytes[i..].starts_with(b"\"\"\"") {
            return Ok(i + 3);
        } else {
            i += 1;
        }
    }
    Err("unterminated text block".to_string())
}

// ── Keywords ──────────────────────────────────────────────────────────────────

const KEYWORDS: &[&str] = &[
    "abstract", "assert", "boolean", "break", "byte", "case", "catch", "char", "class", "const",
    "continue", "default", "do", "double", "else", "enum", "extends", "final", "finally",
    "float", "for", "goto", "if", "implements", "import", "instanceof", "int", "interface",
    "long", "native", "new", "package", "private", "protected", "public", "return", "short",
    "static", "strictfp", "super", "switch", "synchronized", "this", "throw", "throws",
    "transient", "try", "void", "volatile", "while", "true", "false", "null", "permits",
    "sealed", "yield", "record",
];

const PRIMITIVES: &[&str] = &[
    "boolean", "byte", "char", "double", "float", "int", "long", "short", "void",
];

const MODIFIERS: &[&str] = &[
    "public", "protected", "private", "static", "final", "abstract", "transient", "volatile",
    "synchronized", "native", "strictfp", "default", "sealed",
];

fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains(&word)
}

fn is_primitive(word: &str) -> bool {
    PRIMITIVES.contains(&word)
}

fn join(tokens: &[Token<'_>]) -> String {
    let mut out = String::new();
    for token in tokens {
        match token {
            Token::Ident(s) => out.push_str(s),
            Token::Punct(c) => out.push(*c),
            Token::Ellipsis => out.push_str("..."),
            Token::ColonColon => out.push_str("::"),
            Token::Literal => out.push('_'),
        }
    }
    out
}

/// Split at commas outside `<>`, `()` and `[]`.
fn split_top_level(tokens: &[Token<'_>]) -> Vec<Range<usize>> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (idx, token) in tokens.iter().enumerate() {
        match token {
            Token::Punct('<') | Token::Punct('(') | Token::Punct('[') => depth += 1,
            Token::Punct('>') | Token::Punct(')') | Token::Punct(']') => depth -= 1,
            Token::Punct(',') if depth == 0 => {
                parts.push(start..idx);
                start = idx + 1;
            }
            _ => {}
        }
    }
    if start < tokens.len() {
        parts.push(start..tokens.len());
    }
    parts
}

/// Index of the token closing the bracket opened at `open`, counting only `open_c`/`close_c`.
fn matching(tokens: &[Token<'_>], open: usize, open_c: char, close_c: char) -> Option<usize> {
    let mut depth = 0i32;
    for (idx, token) in tokens.iter().enumerate().skip(open) {
        if token.is(open_c) {
            depth += 1;
        } else if token.is(close_c) {
            depth -= 1;
            if depth == 0 {
                return Some(idx);
            }
        }
    }
    None
}

/// Skip leading annotations and modifiers.
fn strip_modifiers<'t, 'a>(mut tokens: &'t [Token<'a>]) -> &'t [Token<'a>] {
    loop {
        match tokens {
            [Token::Punct('@'), Token::Ident(name), ..] if *name != "interface" => {
                let mut idx = 2;
                while tokens.get(idx).is_some_and(|t| t.is('.'))
                    && matches!(tokens.get(idx + 1), Some(Token::Ident(_)))
                {
                    idx += 2;
                }
                if tokens.get(idx).is_some_and(|t| t.is('(')) {
                    idx = matching(tokens, idx, '(', ')').map_or(tokens.len(), |end| end + 1);
                }
                tokens = &tokens[idx..];
            }
            [Token::Ident("non"), Token::Punct('-'), Token::Ident("sealed"), ..] => {
                tokens = &tokens[3..];
            }
            [Token::Ident(word), ..] if MODIFIERS.contains(word) => tokens = &tokens[1..],
            _ => return tokens,
        }
    }
}

fn decl_kind(tokens: &[Token<'_>]) -> Option<(DeclKind, usize)> {
    match tokens {
        [Token::Ident("class"), Token::Ident(_), ..] => Some((DeclKind::Class, 1)),
        [Token::Ident("interface"), Token::Ident(_), ..] => Some((DeclKind::Interface, 1)),
        [Token::Ident("enum"), Token::Ident(_), ..] => Some((DeclKind::Enum, 1)),
        [Token::Ident("record"), Token::Ident(_), next, ..] if next.is('(') || next.is('<') => {
            Some((DeclKind::Record, 1))
        }
        [Token::Punct('@'), Token::Ident("interface"), Token::Ident(_), ..] => {
            Some((DeclKind::Annotation, 2))
        }
        _ => None,
    }
}

// ── Declaration parser ────────────────────────────────────────────────────────

struct Parser<'a> {
    tokens: Vec<Token<'a>>,
    pos: usize,
    body_start: usize,
    package: String,
    imports: BTreeMap<String, String>,
    wildcard_imports: BTreeSet<String>,
    declarations: Vec<TypeDecl>,
    field_types: Vec<String>,
    parameter_types: Vec<String>,
    return_types: Vec<String>,
}

enum BlockOwner {
    Type(DeclKind, usize),
    Method,
    /// `=` before the brace: an array initializer, lambda or anonymous class.
    Expression,
    Initializer,
}

impl<'a> Parser<'a> {
    fn new(tokens: Vec<Token<'a>>) -> Self {
        Self {
            tokens,
            pos: 0,
            body_start: 0,
            package: String::new(),
            imports: BTreeMap::new(),
            wildcard_imports: BTreeSet::new(),
            declarations: Vec::new(),
            field_types: Vec::new(),
            parameter_types: Vec::new(),
            return_types: Vec::new(),
        }
    }

    fn parse_header(&mut self) -> Result<(), String> {
        loop {
            match self.tokens.get(self.pos) {
                Some(Token::Punct(';')) => self.pos += 1,
                // Annotated package declaration (package-info.java).
                Some(Token::Punct('@')) => {
                    let rest = strip_modifiers(&self.tokens[self.pos..]);
                    if !matches!(rest.first(), Some(Token::Ident("package"))) {
                        break;
                    }
                    self.pos = self.tokens.len() - rest.len();
                }
                Some(Token::Ident("package")) => {
                    self.pos += 1;
                    self.package = self.qualified_until_semicolon("package")?;
                }
                Some(Token::Ident("import")) => {
                    self.pos += 1;
                    let is_static = self.tokens.get(self.pos).is_some_and(|t| t.is_word("static"));
                    if is_static {
                        self.pos += 1;
                    }
                    let name = self.qualified_until_semicolon("import")?;
                    self.record_import(&name, is_static);
                }
                _ => break,
            }
        }
        self.body_start = self.pos;
        Ok(())
    }

    fn qualified_until_semicolon(&mut self, what: &str) -> Result<String, String> {
        let start = self.pos;
        while let Some(token) = self.tokens.get(self.pos) {
            if token.is(';') {
                let name = join(&self.tokens[start..self.pos]);
                self.pos += 1;
                return Ok(name);
            }
            self.pos += 1;
        }
        Err(format!("unterminated {what} statement"))
    }

    fn record_import(&mut self, name: &str, is_static: bool) {
        match (name.strip_suffix(".*"), is_static) {
            (Some(owner), true) => {
                self.wildcard_imports.insert(owner.to_string());
                self.imports
                    .insert(simple_name(owner).to_string(), owner.to_string());
            }
            (Some(package), false) => {
                self.wildcard_imports.insert(package.to_string());
            }
            (None, true) => {
                let owner = package_of(name);
                if !owner.is_empty() {
                    self.imports
                        .insert(simple_name(owner).to_string(), owner.to_string());
                }
            }
            (None, false) => {
                self.imports
                    .insert(simple_name(name).to_string(), name.to_string());
            }
        }
    }

    /// Walk a compilation unit or type body, dispatching each member to a handler.
    fn parse_members(&mut self, in_body: bool, outer: &str, enum_body: bool) -> Result<(), String> {
        let mut in_enum_constants = enum_body;
        let mut seg_start = self.pos;
        let mut nest = 0i32;

        loop {
            let Some(token) = self.tokens.get(self.pos).copied() else {
                if in_body || nest != 0 {
                    return Err("unbalanced braces: unexpected end of file".to_string());
                }
                return Ok(());
            };

            match token {
                Token::Punct('(') | Token::Punct('[') => {
                    nest += 1;
                    self.pos += 1;
                }
                Token::Punct(')') | Token::Punct(']') => {
                    if nest == 0 {
                        return Err(format!("unbalanced '{}'", join(&[token])));
                    }
                    nest -= 1;
                    self.pos += 1;
                }
                Token::Punct('{') if nest > 0 => self.skip_block()?,
                Token::Punct(';') if nest == 0 => {
                    let segment = seg_start..self.pos;
                    self.pos += 1;
                    if in_enum_constants {
                        in_enum_constants = false;
                    } else {
                        self.member_declaration(segment);
                    }
                    seg_start = self.pos;
                }
                Token::Punct('}') if nest == 0 => {
                    if !in_body {
                        return Err("unbalanced braces: unexpected '}'".to_string());
                    }
                    self.pos += 1;
                    return Ok(());
                }
                Token::Punct('{') => {
                    if in_enum_constants {
                        self.skip_block()?;
                        continue;
                    }
                    let segment = seg_start..self.pos;
                    match self.block_owner(segment.clone()) {
                        BlockOwner::Type(kind, name_at) => {
                            self.pos += 1;
                            let decl = self.type_header(segment, kind, name_at, outer);
                            let qualified = decl.qualified.clone();
                            self.declarations.push(decl);
                            self.parse_members(true, &qualified, kind == DeclKind::Enum)?;
                            seg_start = self.pos;
                        }
                        BlockOwner::Method => {
                            self.method_declaration(segment);
                            self.skip_block()?;
                            seg_start = self.pos;
                        }
                        BlockOwner::Expression => self.skip_block()?,
                        BlockOwner::Initializer => {
                            self.skip_block()?;
                            seg_start = self.pos;
                        }
                    }
                }
                _ => self.pos += 1,
            }
        }
    }

    fn skip_block(&mut self) -> Result<(), String> {
        let end = matching(&self.tokens, self.pos, '{', '}')
            .ok_or_else(|| "unbalanced braces: unclosed block".to_string())?;
        self.pos = end + 1;
        Ok(())
    }

    fn block_owner(&self, segment: Range<usize>) -> BlockOwner {
        let full = &self.tokens[segment.clone()];
        let rest = strip_modifiers(full);
        if let Some((kind, name_at)) = decl_kind(rest) {
            return BlockOwner::Type(kind, segment.start + full.len() - rest.len() + name_at);
        }
        match first_top_level(rest) {
            Some('(') => BlockOwner::Method,
            Some('=') => BlockOwner::Expression,
            _ => BlockOwner::Initializer,
        }
    }

    fn type_header(
        &mut self,
        segment: Range<usize>,
        kind: DeclKind,
        name_at: usize,
        outer: &str,
    ) -> TypeDecl {
        let tokens = &self.tokens[name_at..segment.end];
        let name = match tokens.first() {
            Some(Token::Ident(name)) => name.to_string(),
            _ => String::new(),
        };
        let qualified = if outer.is_empty() {
            name.clone()
        } else {
            format!("{outer}.{name}")
        };

        let mut idx = 1;
        if tokens.get(idx).is_some_and(|t| t.is('<')) {
            idx = matching(tokens, idx, '<', '>').map_or(tokens.len(), |end| end + 1);
        }

        let mut record_components = Vec::new();
        if kind == DeclKind::Record && tokens.get(idx).is_some_and(|t| t.is('(')) {
            let close = matching(tokens, idx, '(', ')').unwrap_or(tokens.len());
            let inner = &tokens[idx + 1..close.min(tokens.len())];
            for part in split_top_level(inner) {
                if let Some(raw) = parameter_type(&inner[part]) {
                    record_components.push(raw);
                }
            }
            idx = close + 1;
        }

        let mut supertypes = Vec::new();
        while idx < tokens.len() {
            if tokens[idx].is_word("extends") || tokens[idx].is_word("implements") {
                let start = idx + 1;
                let mut end = start;
                while end < tokens.len()
                    && !tokens[end].is_word("implements")
                    && !tokens[end].is_word("permits")
                    && !tokens[end].is_word("extends")
                {
                    end += 1;
                }
                let list = &tokens[start..end];
                for part in split_top_level(list) {
                    let raw = join(&list[part]);
                    if !raw.is_empty() {
                        supertypes.push(raw);
                    }
                }
                idx = end;
            } else {
                idx += 1;
            }
        }

        for raw in record_components {
            self.field_types.push(raw.clone());
            self.parameter_types.push(raw);
        }

        TypeDecl {
            name,
            qualified,
            kind,
            supertypes,
        }
    }

    /// A member ending in `;`: a field or an abstract/interface method.
    fn member_declaration(&mut self, segment: Range<usize>) {
        let rest = strip_modifiers(&self.tokens[segment]);
        if rest.is_empty() || decl_kind(rest).is_some() {
            return;
        }
        if first_top_level(rest) == Some('(') {
            let (return_type, params) = method_signature(rest);
            self.return_types.extend(return_type);
            self.parameter_types.extend(params);
        } else if let Some(raw) = field_type(rest) {
            self.field_types.push(raw);
        }
    }

    fn method_declaration(&mut self, segment: Range<usize>) {
        let rest = strip_modifiers(&self.tokens[segment]);
        let (return_type, params) = method_signature(rest);
        self.return_types.extend(return_type);
        self.parameter_types.extend(params);
    }
}

/// Whichever of `(` or `=` comes first outside type arguments.
fn first_top_level(tokens: &[Token<'_>]) -> Option<char> {
    let mut depth = 0i32;
    for token in tokens {
        match token {
            Token::Punct('(') if depth == 0 => return Some('('),
            Token::Punct('=') if depth == 0 => return Some('='),
            Token::Punct('<') => depth += 1,
            Token::Punct('>') => depth -= 1,
            _ => {}
        }
    }
    None
}

/// `Map<K, V> cache = ...` → `Map<K,V>`; only the first declarator is read.
fn field_type(tokens: &[Token<'_>]) -> Option<String> {
    let before_init = tokens
        .iter()
        .position(|t| t.is('='))
        .map_or(tokens, |eq| &tokens[..eq]);
    let first = split_top_level(before_init).into_iter().next()?;
    let mut declarator = &before_init[first];
    while let [head @ .., Token::Punct('['), Token::Punct(']')] = declarator {
        declarator = head;
    }
    let [type_tokens @ .., Token::Ident(_)] = declarator else {
        return None;
    };
    match type_tokens.first() {
        None => None,
        Some(Token::Ident(word)) if is_keyword(word) && !is_primitive(word) => None,
        Some(_) => Some(join(type_tokens)),
    }
}

/// Return type (None for constructors and `void`) and raw parameter types.
fn method_signature(tokens: &[Token<'_>]) -> (Option<String>, Vec<String>) {
    let mut rest = tokens;
    if rest.first().is_some_and(|t| t.is('<')) {
        let end = matching(rest, 0, '<', '>').map_or(rest.len(), |end| end + 1);
        rest = &rest[end..];
    }
    let Some(open) = rest.iter().position(|t| t.is('(')) else {
        return (None, Vec::new());
    };
    if open == 0 || !matches!(rest[open - 1], Token::Ident(_)) {
        return (None, Vec::new());
    }
    let return_type = &rest[..open - 1];
    let return_type = match return_type.first() {
        None => None,
        Some(first) if first.is_word("void") => None,
        Some(_) => Some(join(return_type)),
    };

    let close = matching(rest, open, '(', ')').unwrap_or(rest.len());
    let params = &rest[open + 1..close.max(open + 1)];
    let params = split_top_level(params)
        .into_iter()
        .filter_map(|part| parameter_type(&params[part]))
        .collect();
    (return_type, params)
}

/// `@Valid final List<Foo> items` → `List<Foo>`; `String... args` → `String`.
fn parameter_type(tokens: &[Token<'_>]) -> Option<String> {
    let mut tokens = strip_modifiers(tokens);
    while let [head @ .., Token::Punct('['), Token::Punct(']')] = tokens {
        tokens = head;
    }
    let [type_tokens @ .., Token::Ident(_)] = tokens else {
        return None;
    };
    let type_tokens = match type_tokens {
        [head @ .., Token::Ellipsis] => head,
        other => other,
    };
    if type_tokens.is_empty() {
        None
    } else {
        Some(join(type_tokens))
    }
}

// ── Type-position scan ────────────────────────────────────────────────────────

/// End index of a type-argument list opened at `open`, or None if the `<` is a comparison.
fn generic_list_end(tokens: &[Token<'_>], open: usize) -> Option<usize> {
    let mut depth = 0i32;
    for idx in open..tokens.len() {
        match tokens[idx] {
            Token::Punct('<') => depth += 1,
            Token::Punct('>') => {
                depth -= 1;
                if depth == 0 {
                    return Some(idx);
                }
            }
            Token::Ident(word) => {
                if is_keyword(word) && !is_primitive(word) && word != "extends" && word != "super"
                {
                    return None;
                }
            }
            Token::Punct('&') => {
                if tokens.get(idx + 1).is_some_and(|t| t.is('&')) {
                    return None;
                }
            }
            Token::Punct('?') => {
                let next = tokens.get(idx + 1)?;
                if !(next.is('>') || next.is(',') || next.is_word("extends") || next.is_word("super"))
                {
                    return None;
                }
            }
            Token::Punct('.') | Token::Punct(',') | Token::Punct('[') | Token::Punct(']') => {}
            Token::Punct('@') => {}
            _ => return None,
        }
    }
    None
}

fn collect_type_refs(tokens: &[Token<'_>]) -> BTreeSet<String> {
    let mut refs = BTreeSet::new();
    let mut add = |name: &str| {
        if !is_keyword(name) {
            refs.insert(name.to_string());
        }
    };

    for (i, token) in tokens.iter().enumerate() {
        let prev = i.checked_sub(1).map(|p| tokens[p]);
        let next = tokens.get(i + 1).copied();

        match *token {
            Token::Punct('<') => {
                let Some(end) = generic_list_end(tokens, i) else {
                    continue;
                };
                if let Some(Token::Ident(head)) = prev {
                    add(head);
                }
                for inner in &tokens[i + 1..end] {
                    if let Token::Ident(name) = inner {
                        add(name);
                    }
                }
            }
            Token::Ident("new") => {
                if let Some(last) = last_of_chain(tokens, i + 1).0 {
                    add(last);
                }
            }
            Token::Ident(word @ ("extends" | "implements" | "throws" | "instanceof")) => {
                let mut j = i + 1;
                loop {
                    let (last, after) = last_of_chain(tokens, j);
                    let Some(last) = last else {
                        break;
                    };
                    add(last);
                    j = after;
                    if tokens.get(j).is_some_and(|t| t.is('<')) {
                        match generic_list_end(tokens, j) {
                            Some(end) => j = end + 1,
                            None => break,
                        }
                    }
                    let more = tokens.get(j).is_some_and(|t| t.is(',') || t.is('&'));
                    if word == "instanceof" || !more {
                        break;
                    }
                    j += 1;
                }
            }
            Token::Ident(name) if !is_keyword(name) => {
                if prev.is_some_and(|p| p.is('@')) {
                    continue;
                }
                let after = tokens.get(i + 2).copied();
                let in_type_position = match next {
                    // `Foo foo`, `Foo[] foos`, `Foo... foos`, `Foo::new`, `Foo.class`
                    Some(Token::Ident(word)) => !is_keyword(word),
                    Some(Token::Ellipsis) | Some(Token::ColonColon) => true,
                    Some(Token::Punct('[')) => after.is_some_and(|t| t.is(']')),
                    // `Foo.class`, and the scope of a nested type in `Foo.Builder`
                    Some(Token::Punct('.')) => match after {
                        Some(Token::Ident("class")) => true,
                        Some(Token::Ident(member)) => {
                            name.starts_with(|c: char| c.is_ascii_uppercase())
                                && member.starts_with(|c: char| c.is_ascii_uppercase())
                        }
                        _ => false,
                    },
                    // `(Foo) value`
                    Some(Token::Punct(')')) => {
                        prev.is_some_and(|p| p.is('('))
                            && name.starts_with(|c: char| c.is_ascii_uppercase())
                            && match after {
                                Some(Token::Ident(word)) => {
                                    !is_keyword(word) || word == "new" || word == "this"
                                }
                                Some(Token::Literal) => true,
                                Some(t) => t.is('('),
                                None => false,
                            }
                    }
                    // `catch (FooException | BarException e)`
                    Some(Token::Punct('|')) => {
                        prev.is_some_and(|p| p.is('(') || p.is('|'))
                            && name.starts_with(|c: char| c.is_ascii_uppercase())
                    }
                    _ => false,
                };
                if in_type_position {
                    add(name);
                }
            }
            _ => {}
        }
    }
    refs
}

/// Follow `a.b.Foo` starting at `start`; returns the last segment and the index after it.
fn last_of_chain<'a>(tokens: &[Token<'a>], start: usize) -> (Option<&'a str>, usize) {
    let mut j = start;
    let mut last = None;
    while let Some(Token::Ident(name)) = tokens.get(j) {
        if is_keyword(name) && !is_primitive(name) {
            break;
        }
        last = Some(*name);
        j += 1;
        if tokens.get(j).is_some_and(|t| t.is('.'))
            && matches!(tokens.get(j + 1), Some(Token::Ident(_)))
        {
            j += 1;
        } else {
            break;
        }
    }
    (last, j)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
