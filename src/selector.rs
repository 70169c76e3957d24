//! Selector parsing and matching.
//!
//! One module covers the whole query primitive: the selector model, a small
//! tokenizer, the parser, right-to-left matching against the tree, and the
//! document-order query entry points. Complex selectors are stored
//! rightmost-compound first, so matching starts at the candidate element and
//! walks up/sideways through the tree following each combinator.
//!
//! Parsing is deliberately lenient *inside* a selector (unknown
//! pseudo-classes are ignored, like a permissive engine), but wholly
//! unintelligible input and trailing junk are hard errors — the one place
//! this library fails loudly.

use crate::error::SelectorError;
use crate::node::{ElementData, NodeData, NodeId};
use crate::tree::Tree;

// ---------------------------------------------------------------------------
// Selector model
// ---------------------------------------------------------------------------

/// Combinator between compound selectors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Combinator {
    /// Whitespace: ancestor descendant.
    Descendant,
    /// `>`: parent > child.
    Child,
    /// `+`: prev + next.
    NextSibling,
    /// `~`: prev ~ subsequent.
    SubsequentSibling,
}

/// Attribute selector operator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttrOp {
    /// `[attr]`
    Exists,
    /// `[attr=val]`
    Eq,
    /// `[attr~=val]`
    Includes,
    /// `[attr|=val]`
    DashMatch,
    /// `[attr^=val]`
    Prefix,
    /// `[attr$=val]`
    Suffix,
    /// `[attr*=val]`
    Substring,
}

/// Structural pseudo-classes. Dynamic state (`:hover`, `:focus`, form
/// states) has no meaning in this library and is not modeled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Pseudo {
    FirstChild,
    LastChild,
    OnlyChild,
    /// `nth-child(an+b)` with coefficients `(a, b)`.
    NthChild(i32, i32),
    Empty,
    Not(Box<Compound>),
}

/// A single simple selector component.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Simple {
    Type(String),
    Universal,
    Id(String),
    Class(String),
    Attr {
        name: String,
        op: AttrOp,
        value: Option<String>,
    },
    Pseudo(Pseudo),
}

/// Simple selectors with no combinator between them (`div.foo#bar`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Compound {
    pub simples: Vec<Simple>,
}

/// A combinator chain, stored right-to-left: `parts[0]` is the subject
/// compound, each entry carries the combinator linking it to the part on its
/// left (always `None` on the last entry).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Complex {
    pub parts: Vec<(Compound, Option<Combinator>)>,
}

/// A parsed, comma-separated selector list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectorList {
    pub complexes: Vec<Complex>,
}

impl SelectorList {
    /// Parse a selector list.
    ///
    /// Errors when nothing parseable is found, or when unconsumed input
    /// remains after the list.
    pub fn parse(input: &str) -> Result<Self, SelectorError> {
        let tokens = tokenize(input);
        let (complexes, pos) = parse_list(&tokens);

        if complexes.is_empty() {
            return Err(SelectorError::Unintelligible(input.to_string()));
        }
        let rest = skip_ws(&tokens, pos);
        if rest < tokens.len() {
            return Err(SelectorError::Trailing(input.to_string()));
        }
        Ok(Self { complexes })
    }

    /// Does `node` match any selector in the list?
    pub fn matches(&self, tree: &Tree, node: NodeId) -> bool {
        self.complexes.iter().any(|c| matches_complex(tree, node, c))
    }
}

// ---------------------------------------------------------------------------
// Query entry points
// ---------------------------------------------------------------------------

/// All elements under `root` matching `selectors`, in document order.
pub fn query_all(tree: &Tree, root: NodeId, selectors: &SelectorList) -> Vec<NodeId> {
    tree.elements_under(root)
        .into_iter()
        .filter(|&id| selectors.matches(tree, id))
        .collect()
}

/// First element under `root` matching `selectors`, in document order.
pub fn query_first(tree: &Tree, root: NodeId, selectors: &SelectorList) -> Option<NodeId> {
    tree.elements_under(root)
        .into_iter()
        .find(|&id| selectors.matches(tree, id))
}

// ---------------------------------------------------------------------------
// Tokenizer
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Ident(String),
    Hash(String),
    Str(String),
    Number(i32),
    Function(String),
    Delim(char),
    Whitespace,
    Comma,
    LBracket,
    RBracket,
    RParen,
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '-'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

fn tokenize(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                while chars.peek().is_some_and(|c| c.is_whitespace()) {
                    chars.next();
                }
                tokens.push(Token::Whitespace);
            }
            c if is_ident_start(c) => {
                let mut name = String::new();
                while let Some(&c) = chars.peek() {
                    if is_ident_char(c) {
                        name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if chars.peek() == Some(&'(') {
                    chars.next();
                    tokens.push(Token::Function(name));
                } else {
                    tokens.push(Token::Ident(name));
                }
            }
            '#' => {
                chars.next();
                let mut name = String::new();
                while let Some(&c) = chars.peek() {
                    if is_ident_char(c) {
                        name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if name.is_empty() {
                    tokens.push(Token::Delim('#'));
                } else {
                    tokens.push(Token::Hash(name));
                }
            }
            '"' | '\'' => {
                let quote = c;
                chars.next();
                let mut value = String::new();
                for c in chars.by_ref() {
                    if c == quote {
                        break;
                    }
                    value.push(c);
                }
                tokens.push(Token::Str(value));
            }
            c if c.is_ascii_digit() => {
                let mut n = 0i32;
                while let Some(&c) = chars.peek() {
                    if let Some(d) = c.to_digit(10) {
                        n = n.saturating_mul(10).saturating_add(d as i32);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Number(n));
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            '[' => {
                chars.next();
                tokens.push(Token::LBracket);
            }
            ']' => {
                chars.next();
                tokens.push(Token::RBracket);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            c => {
                chars.next();
                tokens.push(Token::Delim(c));
            }
        }
    }
    tokens
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

fn skip_ws(tokens: &[Token], mut pos: usize) -> usize {
    while pos < tokens.len() && tokens[pos] == Token::Whitespace {
        pos += 1;
    }
    pos
}

fn parse_list(tokens: &[Token]) -> (Vec<Complex>, usize) {
    let mut complexes = Vec::new();
    let mut pos = skip_ws(tokens, 0);

    loop {
        if pos >= tokens.len() {
            break;
        }
        let (complex, new_pos) = parse_complex(tokens, pos);
        if complex.parts.is_empty() {
            pos = new_pos;
            break;
        }
        complexes.push(complex);
        pos = skip_ws(tokens, new_pos);

        if pos < tokens.len() && tokens[pos] == Token::Comma {
            pos = skip_ws(tokens, pos + 1);
        } else {
            break;
        }
    }

    (complexes, pos)
}

fn parse_complex(tokens: &[Token], start: usize) -> (Complex, usize) {
    let mut parts_ltr: Vec<(Compound, Option<Combinator>)> = Vec::new();

    let (compound, mut pos) = parse_compound(tokens, start);
    if compound.simples.is_empty() {
        return (Complex { parts: Vec::new() }, pos);
    }
    parts_ltr.push((compound, None));

    loop {
        let had_ws = pos < tokens.len() && tokens[pos] == Token::Whitespace;
        pos = skip_ws(tokens, pos);
        if pos >= tokens.len() {
            break;
        }

        let combinator = match &tokens[pos] {
            Token::Delim('>') => {
                pos = skip_ws(tokens, pos + 1);
                Some(Combinator::Child)
            }
            Token::Delim('+') => {
                pos = skip_ws(tokens, pos + 1);
                Some(Combinator::NextSibling)
            }
            Token::Delim('~') => {
                pos = skip_ws(tokens, pos + 1);
                Some(Combinator::SubsequentSibling)
            }
            _ if had_ws => Some(Combinator::Descendant),
            _ => None,
        };
        let Some(combinator) = combinator else {
            break;
        };

        let (compound, new_pos) = parse_compound(tokens, pos);
        if compound.simples.is_empty() {
            break;
        }
        parts_ltr.push((compound, Some(combinator)));
        pos = new_pos;
    }

    // Reverse so parts[0] is the subject; each combinator then describes the
    // step to take toward the next (leftward) part.
    parts_ltr.reverse();
    (Complex { parts: parts_ltr }, pos)
}

fn parse_compound(tokens: &[Token], start: usize) -> (Compound, usize) {
    let mut simples = Vec::new();
    let mut pos = start;

    while pos < tokens.len() {
        match &tokens[pos] {
            Token::Ident(name) => {
                let has_type = simples
                    .iter()
                    .any(|s| matches!(s, Simple::Type(_) | Simple::Universal));
                if has_type {
                    break;
                }
                simples.push(Simple::Type(name.to_ascii_lowercase()));
                pos += 1;
            }
            Token::Delim('*') => {
                simples.push(Simple::Universal);
                pos += 1;
            }
            Token::Hash(value) => {
                simples.push(Simple::Id(value.clone()));
                pos += 1;
            }
            Token::Delim('.') => {
                pos += 1;
                if let Some(Token::Ident(name)) = tokens.get(pos) {
                    simples.push(Simple::Class(name.clone()));
                    pos += 1;
                }
            }
            Token::LBracket => {
                let (attr, new_pos) = parse_attribute(tokens, pos);
                if let Some(attr) = attr {
                    simples.push(attr);
                }
                pos = new_pos;
            }
            Token::Delim(':') => {
                pos += 1;
                match tokens.get(pos) {
                    Some(Token::Delim(':')) => {
                        // Pseudo-element syntax; nothing here renders, so the
                        // name is consumed and ignored.
                        pos += 1;
                        if let Some(Token::Ident(_)) = tokens.get(pos) {
                            pos += 1;
                        }
                    }
                    Some(Token::Ident(name)) => {
                        let pseudo = match name.to_ascii_lowercase().as_str() {
                            "first-child" => Some(Pseudo::FirstChild),
                            "last-child" => Some(Pseudo::LastChild),
                            "only-child" => Some(Pseudo::OnlyChild),
                            "empty" => Some(Pseudo::Empty),
                            _ => None,
                        };
                        if let Some(p) = pseudo {
                            simples.push(Simple::Pseudo(p));
                        }
                        pos += 1;
                    }
                    Some(Token::Function(name)) => match name.to_ascii_lowercase().as_str() {
                        "nth-child" => {
                            let (a, b, new_pos) = parse_nth(tokens, pos + 1);
                            simples.push(Simple::Pseudo(Pseudo::NthChild(a, b)));
                            pos = new_pos;
                        }
                        "not" => {
                            let (inner, new_pos) = parse_not(tokens, pos + 1);
                            simples.push(Simple::Pseudo(Pseudo::Not(Box::new(inner))));
                            pos = new_pos;
                        }
                        _ => {
                            pos = skip_to_rparen(tokens, pos + 1);
                        }
                    },
                    _ => {}
                }
            }
            _ => break,
        }
    }

    (Compound { simples }, pos)
}

/// Parse `[name op? value?]`.
fn parse_attribute(tokens: &[Token], start: usize) -> (Option<Simple>, usize) {
    let mut pos = skip_ws(tokens, start + 1);

    let name = match tokens.get(pos) {
        Some(Token::Ident(n)) => {
            pos += 1;
            n.clone()
        }
        _ => return (None, skip_to_rbracket(tokens, pos)),
    };
    pos = skip_ws(tokens, pos);

    if tokens.get(pos) == Some(&Token::RBracket) {
        let attr = Simple::Attr {
            name,
            op: AttrOp::Exists,
            value: None,
        };
        return (Some(attr), pos + 1);
    }

    let op = match tokens.get(pos) {
        Some(Token::Delim('=')) => {
            pos += 1;
            AttrOp::Eq
        }
        Some(Token::Delim('~')) if tokens.get(pos + 1) == Some(&Token::Delim('=')) => {
            pos += 2;
            AttrOp::Includes
        }
        Some(Token::Delim('|')) if tokens.get(pos + 1) == Some(&Token::Delim('=')) => {
            pos += 2;
            AttrOp::DashMatch
        }
        Some(Token::Delim('^')) if tokens.get(pos + 1) == Some(&Token::Delim('=')) => {
            pos += 2;
            AttrOp::Prefix
        }
        Some(Token::Delim('$')) if tokens.get(pos + 1) == Some(&Token::Delim('=')) => {
            pos += 2;
            AttrOp::Suffix
        }
        Some(Token::Delim('*')) if tokens.get(pos + 1) == Some(&Token::Delim('=')) => {
            pos += 2;
            AttrOp::Substring
        }
        _ => return (None, skip_to_rbracket(tokens, pos)),
    };
    pos = skip_ws(tokens, pos);

    let value = match tokens.get(pos) {
        Some(Token::Ident(v)) => {
            pos += 1;
            Some(v.clone())
        }
        Some(Token::Str(v)) => {
            pos += 1;
            Some(v.clone())
        }
        _ => None,
    };
    pos = skip_ws(tokens, pos);

    if tokens.get(pos) == Some(&Token::RBracket) {
        pos += 1;
    }
    (Some(Simple::Attr { name, op, value }), pos)
}

fn skip_to_rbracket(tokens: &[Token], mut pos: usize) -> usize {
    while pos < tokens.len() && tokens[pos] != Token::RBracket {
        pos += 1;
    }
    if pos < tokens.len() { pos + 1 } else { pos }
}

fn skip_to_rparen(tokens: &[Token], mut pos: usize) -> usize {
    let mut depth = 1usize;
    while pos < tokens.len() && depth > 0 {
        match &tokens[pos] {
            Token::Function(_) => depth += 1,
            Token::RParen => depth -= 1,
            _ => {}
        }
        pos += 1;
    }
    pos
}

/// `nth-child` arguments: `odd`, `even`, or a plain index.
fn parse_nth(tokens: &[Token], start: usize) -> (i32, i32, usize) {
    let pos = skip_ws(tokens, start);
    match tokens.get(pos) {
        Some(Token::Ident(name)) if name.eq_ignore_ascii_case("odd") => {
            (2, 1, skip_to_rparen(tokens, pos + 1))
        }
        Some(Token::Ident(name)) if name.eq_ignore_ascii_case("even") => {
            (2, 0, skip_to_rparen(tokens, pos + 1))
        }
        Some(&Token::Number(b)) => (0, b, skip_to_rparen(tokens, pos + 1)),
        _ => (0, 0, skip_to_rparen(tokens, pos)),
    }
}

fn parse_not(tokens: &[Token], start: usize) -> (Compound, usize) {
    let pos = skip_ws(tokens, start);
    let (compound, new_pos) = parse_compound(tokens, pos);
    let pos = skip_ws(tokens, new_pos);
    let pos = if tokens.get(pos) == Some(&Token::RParen) {
        pos + 1
    } else {
        pos
    };
    (compound, pos)
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

/// Test `node` against one complex selector, walking right-to-left.
fn matches_complex(tree: &Tree, node: NodeId, complex: &Complex) -> bool {
    if complex.parts.is_empty() {
        return false;
    }

    let (subject, mut combinator) = (&complex.parts[0].0, complex.parts[0].1.clone());
    if !matches_compound(tree, node, subject) {
        return false;
    }

    let mut current = node;
    for (compound, next_combinator) in complex.parts.iter().skip(1) {
        match combinator {
            Some(Combinator::Descendant) => {
                let mut ancestor = parent_element(tree, current);
                let mut found = false;
                while let Some(anc) = ancestor {
                    if matches_compound(tree, anc, compound) {
                        current = anc;
                        found = true;
                        break;
                    }
                    ancestor = parent_element(tree, anc);
                }
                if !found {
                    return false;
                }
            }
            Some(Combinator::Child) => match parent_element(tree, current) {
                Some(parent) if matches_compound(tree, parent, compound) => current = parent,
                _ => return false,
            },
            Some(Combinator::NextSibling) => match prev_sibling_element(tree, current) {
                Some(prev) if matches_compound(tree, prev, compound) => current = prev,
                _ => return false,
            },
            Some(Combinator::SubsequentSibling) => {
                let mut sibling = prev_sibling_element(tree, current);
                let mut found = false;
                while let Some(sib) = sibling {
                    if matches_compound(tree, sib, compound) {
                        current = sib;
                        found = true;
                        break;
                    }
                    sibling = prev_sibling_element(tree, sib);
                }
                if !found {
                    return false;
                }
            }
            None => return false,
        }
        combinator = next_combinator.clone();
    }

    true
}

fn matches_compound(tree: &Tree, node: NodeId, compound: &Compound) -> bool {
    let Some(elem) = tree.element(node) else {
        return false;
    };
    compound
        .simples
        .iter()
        .all(|simple| matches_simple(tree, node, elem, simple))
}

fn matches_simple(tree: &Tree, node: NodeId, elem: &ElementData, simple: &Simple) -> bool {
    match simple {
        Simple::Universal => true,
        Simple::Type(tag) => elem.tag.eq_ignore_ascii_case(tag),
        Simple::Id(id) => elem.id.as_deref() == Some(id.as_str()),
        Simple::Class(class) => elem.classes.iter().any(|c| c == class),
        Simple::Attr { name, op, value } => matches_attr(elem, name, op, value.as_deref()),
        Simple::Pseudo(pseudo) => matches_pseudo(tree, node, pseudo),
    }
}

fn matches_attr(elem: &ElementData, name: &str, op: &AttrOp, value: Option<&str>) -> bool {
    let Some(attr_val) = elem.attr(name) else {
        return false;
    };
    match op {
        AttrOp::Exists => true,
        AttrOp::Eq => value == Some(attr_val),
        AttrOp::Includes => {
            value.is_some_and(|v| attr_val.split_whitespace().any(|word| word == v))
        }
        AttrOp::DashMatch => value.is_some_and(|v| {
            attr_val == v || attr_val.strip_prefix(v).is_some_and(|r| r.starts_with('-'))
        }),
        AttrOp::Prefix => value.is_some_and(|v| !v.is_empty() && attr_val.starts_with(v)),
        AttrOp::Suffix => value.is_some_and(|v| !v.is_empty() && attr_val.ends_with(v)),
        AttrOp::Substring => value.is_some_and(|v| !v.is_empty() && attr_val.contains(v)),
    }
}

fn matches_pseudo(tree: &Tree, node: NodeId, pseudo: &Pseudo) -> bool {
    match pseudo {
        Pseudo::FirstChild => sibling_elements(tree, node).first() == Some(&node),
        Pseudo::LastChild => sibling_elements(tree, node).last() == Some(&node),
        Pseudo::OnlyChild => sibling_elements(tree, node) == vec![node],
        Pseudo::NthChild(a, b) => match element_index(tree, node) {
            Some(index) => nth_matches(*a, *b, index as i32 + 1),
            None => false,
        },
        Pseudo::Empty => tree.children(node).iter().all(|&c| {
            tree.node(c).is_none_or(|n| match &n.data {
                NodeData::Text { text } => text.trim().is_empty(),
                _ => false,
            })
        }),
        Pseudo::Not(inner) => !matches_compound(tree, node, inner),
    }
}

/// `an+b` against a 1-based index.
fn nth_matches(a: i32, b: i32, n: i32) -> bool {
    if a == 0 {
        return n == b;
    }
    let diff = n - b;
    diff % a == 0 && diff / a >= 0
}

// ---------------------------------------------------------------------------
// Traversal helpers
// ---------------------------------------------------------------------------

fn parent_element(tree: &Tree, node: NodeId) -> Option<NodeId> {
    let parent = tree.parent(node)?;
    tree.node(parent)?.is_element().then_some(parent)
}

fn prev_sibling_element(tree: &Tree, node: NodeId) -> Option<NodeId> {
    let mut cursor = tree.prev_sibling(node);
    while let Some(sib) = cursor {
        if tree.node(sib)?.is_element() {
            return Some(sib);
        }
        cursor = tree.prev_sibling(sib);
    }
    None
}

/// Element children of `node`'s parent, in order.
fn sibling_elements(tree: &Tree, node: NodeId) -> Vec<NodeId> {
    let Some(parent) = tree.parent(node) else {
        return Vec::new();
    };
    tree.children(parent)
        .into_iter()
        .filter(|&c| tree.node(c).is_some_and(|n| n.is_element()))
        .collect()
}

/// 0-based position of `node` among its parent's element children.
fn element_index(tree: &Tree, node: NodeId) -> Option<usize> {
    sibling_elements(tree, node).iter().position(|&c| c == node)
}

// ===========================================================================
// Tests
// ===========================================================================
