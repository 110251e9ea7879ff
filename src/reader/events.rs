//! Token Types
//!
//! Tokens delivered to the stream tracker, one per `read_next` call.

use std::fmt;

/// Shape of a token, without its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// `<name ...>`
    Open,
    /// `<name .../>`
    Bachelor,
    /// `</name>`
    Close,
    /// Character data
    Text,
}

/// A single token of the input document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlToken {
    Open(String),
    /// Self-closing tag
    Bachelor(String),
    Close(String),
    Text(String),
}

impl XmlToken {
    pub fn open(name: impl Into<String>) -> Self {
        XmlToken::Open(name.into())
    }

    pub fn bachelor(name: impl Into<String>) -> Self {
        XmlToken::Bachelor(name.into())
    }

    pub fn close(name: impl Into<String>) -> Self {
        XmlToken::Close(name.into())
    }

    pub fn text(content: impl Into<String>) -> Self {
        XmlToken::Text(content.into())
    }

    #[inline]
    pub fn kind(&self) -> TokenKind {
        match self {
            XmlToken::Open(_) => TokenKind::Open,
            XmlToken::Bachelor(_) => TokenKind::Bachelor,
            XmlToken::Close(_) => TokenKind::Close,
            XmlToken::Text(_) => TokenKind::Text,
        }
    }

    /// Tag name for tag tokens
    pub fn name(&self) -> Option<&str> {
        match self {
            XmlToken::Open(n) | XmlToken::Bachelor(n) | XmlToken::Close(n) => Some(n),
            XmlToken::Text(_) => None,
        }
    }
}

impl fmt::Display for XmlToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XmlToken::Open(n) => write!(f, "<{n}>"),
            XmlToken::Bachelor(n) => write!(f, "<{n}/>"),
            XmlToken::Close(n) => write!(f, "</{n}>"),
            XmlToken::Text(t) => write!(f, "{t:?}"),
        }
    }
}
