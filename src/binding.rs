//! Parsing and formatting of ZMK binding strings such as `&kp A`,
//! `&mt LCTRL ESC` or `&kp LC(LA(DEL))`.
//!
//! Parameters nest: `LC(LA(DEL))` is one parameter whose own parameter list
//! holds `LA(DEL)`, and so on. Formatting is the inverse of parsing and
//! yields the canonical whitespace-normalized form.

use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, LayoutError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Name(String),
}

impl ParamValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParamValue::Int(i) => Some(*i),
            ParamValue::Name(_) => None,
        }
    }
}

impl std::fmt::Display for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamValue::Int(i) => write!(f, "{i}"),
            ParamValue::Name(s) => f.write_str(s),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        match s.parse::<i64>() {
            Ok(i) => ParamValue::Int(i),
            Err(_) => ParamValue::Name(s.to_owned()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Param {
    pub value: ParamValue,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<Param>,
}

impl Param {
    pub fn name(name: impl Into<String>) -> Self {
        Param {
            value: ParamValue::Name(name.into()),
            params: vec![],
        }
    }

    pub fn int(value: i64) -> Self {
        Param {
            value: ParamValue::Int(value),
            params: vec![],
        }
    }

    pub fn call(name: impl Into<String>, params: Vec<Param>) -> Self {
        Param {
            value: ParamValue::Name(name.into()),
            params,
        }
    }
}

impl std::fmt::Display for Param {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value)?;
        if !self.params.is_empty() {
            write!(f, "(")?;
            for (i, p) in self.params.iter().enumerate() {
                if i > 0 {
                    write!(f, " ")?;
                }
                write!(f, "{p}")?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

/// A behavior invocation: a `&name` head plus zero or more parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Binding {
    pub value: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<Param>,
}

impl Binding {
    pub fn new(value: impl Into<String>, params: Vec<Param>) -> Self {
        Binding {
            value: value.into(),
            params,
        }
    }

    /// The transparent binding used as the filler default.
    pub fn trans() -> Self {
        Binding::new("&trans", vec![])
    }

    /// The behavior name without the leading `&`.
    pub fn behavior(&self) -> &str {
        self.value.strip_prefix('&').unwrap_or(&self.value)
    }

    pub fn parse(s: &str) -> Result<Binding> {
        let mut cur = Cursor::new(s.trim());
        let binding = cur.binding()?;
        cur.skip_ws();
        if !cur.at_end() {
            return Err(cur.err("trailing input after binding"));
        }
        Ok(binding)
    }
}

impl std::str::FromStr for Binding {
    type Err = LayoutError;
    fn from_str(s: &str) -> Result<Binding> {
        Binding::parse(s)
    }
}

impl std::fmt::Display for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.value)?;
        for p in &self.params {
            write!(f, " {p}")?;
        }
        Ok(())
    }
}

struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

fn is_token_end(b: u8) -> bool {
    matches!(b, b'(' | b')') || b.is_ascii_whitespace()
}

impl<'a> Cursor<'a> {
    fn new(src: &'a str) -> Self {
        Cursor { src, pos: 0 }
    }

    fn err(&self, msg: impl Into<String>) -> LayoutError {
        LayoutError::new(
            ErrorKind::InvalidBinding,
            format!("{} at offset {} in {:?}", msg.into(), self.pos, self.src),
        )
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b) if b.is_ascii_whitespace() || b == b',') {
            self.pos += 1;
        }
    }

    fn word(&mut self) -> &'a str {
        let start = self.pos;
        while matches!(self.peek(), Some(b) if !is_token_end(b) && b != b',') {
            self.pos += 1;
        }
        &self.src[start..self.pos]
    }

    fn binding(&mut self) -> Result<Binding> {
        self.skip_ws();
        if self.peek() != Some(b'&') {
            return Err(self.err("binding must start with &"));
        }
        let head = self.word();
        if head.len() == 1 {
            return Err(self.err("binding head is missing a behavior name"));
        }
        let mut params = vec![];
        loop {
            self.skip_ws();
            match self.peek() {
                None => break,
                Some(b')') => break,
                Some(_) => params.push(self.param()?),
            }
        }
        Ok(Binding::new(head, params))
    }

    fn param(&mut self) -> Result<Param> {
        let word = self.word();
        if word.is_empty() {
            return Err(self.err("expected a parameter"));
        }
        let mut param = Param {
            value: ParamValue::from(word),
            params: vec![],
        };
        // A `(` immediately after the token opens its argument list.
        if self.peek() == Some(b'(') {
            self.pos += 1;
            loop {
                self.skip_ws();
                match self.peek() {
                    Some(b')') => {
                        self.pos += 1;
                        break;
                    }
                    Some(_) => param.params.push(self.param()?),
                    None => return Err(self.err("unclosed parameter list")),
                }
            }
        }
        Ok(param)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_keypress() {
        let b = Binding::parse("&kp A").unwrap();
        assert_eq!(b.value, "&kp");
        assert_eq!(b.params, vec![Param::name("A")]);
        assert_eq!(b.behavior(), "kp");
        assert_eq!(b.to_string(), "&kp A");
    }

    #[test]
    fn two_params() {
        let b = Binding::parse("&mt LCTRL ESC").unwrap();
        assert_eq!(b.params.len(), 2);
        assert_eq!(b.to_string(), "&mt LCTRL ESC");
    }

    #[test]
    fn numeric_param() {
        let b = Binding::parse("&mo 1").unwrap();
        assert_eq!(b.params, vec![Param::int(1)]);
        assert_eq!(b.to_string(), "&mo 1");
    }

    #[test]
    fn nested_params() {
        let b = Binding::parse("&kp LC(LA(DEL))").unwrap();
        assert_eq!(
            b,
            Binding::new(
                "&kp",
                vec![Param::call("LC", vec![Param::call("LA", vec![Param::name("DEL")])])]
            )
        );
        assert_eq!(b.to_string(), "&kp LC(LA(DEL))");
    }

    #[test]
    fn whitespace_is_canonicalized() {
        let b = Binding::parse("  &lt   2   TAB ").unwrap();
        assert_eq!(b.to_string(), "&lt 2 TAB");
    }

    #[test]
    fn comma_separated_call_args() {
        let b = Binding::parse("&kp LC(LS(TAB))").unwrap();
        let reparsed = Binding::parse(&b.to_string()).unwrap();
        assert_eq!(b, reparsed);
    }

    #[test]
    fn bare_behavior() {
        let b = Binding::parse("&bootloader").unwrap();
        assert!(b.params.is_empty());
        assert_eq!(b.to_string(), "&bootloader");
    }

    #[test]
    fn rejects_missing_ampersand() {
        let e = Binding::parse("kp A").unwrap_err();
        assert_eq!(e.kind, ErrorKind::InvalidBinding);
    }

    #[test]
    fn rejects_bare_ampersand() {
        assert!(Binding::parse("& A").is_err());
    }

    #[test]
    fn rejects_unclosed_args() {
        assert!(Binding::parse("&kp LC(A").is_err());
    }
}
