//! Translation between object-level selectors and the two host-level
//! namespaces.
//!
//! Host names carry a prefix telling which stratum they belong to:
//! `base_` for ordinary object-level operations and `meta_` for reflective
//! ones. Operator characters are spelled `_opXXX_` and every colon becomes an
//! underscore, so `at:put:` is `base_at_put_` and `+` is `base__oppls_`.
//! A colon directly followed by `op` is spelled `_opcln_` instead, so the
//! only `_op` sequences in a host name start an operator code and
//! `at:opmns:` survives as `base_at_opcln_opmns_`.

use crate::{RuntimeError, RuntimeResult, Symbol};

pub const BASE_PREFIX: &str = "base_";
pub const META_PREFIX: &str = "meta_";

const OPERATOR_PREFIX: &str = "_op";
const OPERATOR_CODE_LEN: usize = 3;
/// escaped colon, only emitted in front of `op`
const COLON_CODE: &str = "cln";

#[rustfmt::skip]
const OPERATOR_CODES: &[(char, &str)] = &[
    ('+',  "pls"),
    ('-',  "mns"),
    ('*',  "mul"),
    ('/',  "div"),
    ('\\', "bsl"),
    ('!',  "not"),
    ('>',  "gtx"),
    ('<',  "ltx"),
    ('=',  "eql"),
    ('~',  "til"),
    ('?',  "que"),
    ('%',  "rem"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stratum {
    Base,
    Meta,
}

impl Stratum {
    pub fn prefix(self) -> &'static str {
        match self {
            Stratum::Base => BASE_PREFIX,
            Stratum::Meta => META_PREFIX,
        }
    }
}

pub fn to_base_name(selector: Symbol) -> String {
    to_host_name(Stratum::Base, selector)
}

pub fn to_meta_name(selector: Symbol) -> String {
    to_host_name(Stratum::Meta, selector)
}

pub fn to_host_name(stratum: Stratum, selector: Symbol) -> String {
    let text = selector.as_str();
    let mut out = String::with_capacity(stratum.prefix().len() + text.len());
    out.push_str(stratum.prefix());
    for (index, ch) in text.char_indices() {
        if ch == ':' && text[index + 1..].starts_with("op") {
            push_code(&mut out, COLON_CODE);
        } else if ch == ':' {
            out.push('_');
        } else if let Some(code) = operator_code(ch) {
            push_code(&mut out, code);
        } else {
            out.push(ch);
        }
    }
    out
}

fn push_code(out: &mut String, code: &str) {
    out.push_str(OPERATOR_PREFIX);
    out.push_str(code);
    out.push('_');
}

/// Recover the selector and its stratum from a host name.
pub fn from_host_name(name: &str) -> RuntimeResult<(Stratum, Symbol)> {
    let (stratum, body) = if let Some(body) = name.strip_prefix(BASE_PREFIX) {
        (Stratum::Base, body)
    } else if let Some(body) = name.strip_prefix(META_PREFIX) {
        (Stratum::Meta, body)
    } else {
        return Err(RuntimeError::internal(format!(
            "`{name}` is neither a base-level nor a meta-level host name"
        )));
    };

    if body.is_empty() {
        return Err(RuntimeError::internal(format!(
            "host name `{name}` has an empty selector"
        )));
    }

    Ok((stratum, Symbol::intern(&decode(body))))
}

pub fn selector_from_host_name(name: &str) -> RuntimeResult<Symbol> {
    from_host_name(name).map(|(_, selector)| selector)
}

fn operator_code(ch: char) -> Option<&'static str> {
    OPERATOR_CODES
        .iter()
        .find(|(op, _)| *op == ch)
        .map(|(_, code)| *code)
}

fn operator_char(code: &str) -> Option<char> {
    OPERATOR_CODES
        .iter()
        .find(|(_, c)| *c == code)
        .map(|(op, _)| *op)
}

fn decode(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut rest = body;
    while let Some(ch) = rest.chars().next() {
        if ch == '_' {
            if let Some(op) = decode_operator(rest) {
                out.push(op);
                rest = &rest[OPERATOR_PREFIX.len() + OPERATOR_CODE_LEN + 1..];
                continue;
            }
            out.push(':');
        } else {
            out.push(ch);
        }
        rest = &rest[ch.len_utf8()..];
    }
    out
}

/// `_oppls_...` -> `+`
fn decode_operator(text: &str) -> Option<char> {
    let after = text.strip_prefix(OPERATOR_PREFIX)?;
    let code = after.get(..OPERATOR_CODE_LEN)?;
    if !after[OPERATOR_CODE_LEN..].starts_with('_') {
        return None;
    }
    if code == COLON_CODE {
        return Some(':');
    }
    operator_char(code)
}
