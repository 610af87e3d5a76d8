//! The handler-stack decode engine.
//!
//! A [`Handler<M>`] tree is a static description of a message type's JSON
//! shape: a field is either a terminal (`String`/`UInt`/`Float`/`Bool`/
//! `Null`) that writes into the in-progress message `M`, or a nested
//! container (`Object`/`Array`) that dispatches to child handlers. Trees are
//! built once, as `static` values, per message type (see
//! [`crate::messages`]).
//!
//! Decoding drives the tree with an explicit stack that mirrors the nesting
//! depth of the document being parsed, plus a parallel stack of open array
//! handlers used to tell a fresh `array-begin` apart from one re-entering
//! the same array (an array of arrays).

use crate::tokenizer::{tokenize, Event};
use std::borrow::Cow;

pub enum Handler<M> {
    String(fn(&mut M, &str)),
    UInt(fn(&mut M, u64)),
    Float(fn(&mut M, f64)),
    Bool(fn(&mut M, bool)),
    Null(fn(&mut M)),
    Object(&'static [(&'static str, Handler<M>)]),
    Array(&'static Handler<M>),
}

// Handler trees hold only `fn` pointers and `'static` references, so they're
// freely copyable regardless of whether `M` is.
impl<M> Clone for Handler<M> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<M> Copy for Handler<M> {}

#[derive(Debug, Clone, PartialEq)]
pub enum DecodeErrorKind {
    Parse,
    Shape,
    Semantic,
}

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
#[error("{kind:?} error at {location}: {reason}")]
pub struct DecodeError {
    pub kind: DecodeErrorKind,
    pub location: String,
    pub reason: String,
}

impl DecodeError {
    pub fn parse(location: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            kind: DecodeErrorKind::Parse,
            location: location.into(),
            reason: reason.into(),
        }
    }

    pub fn shape(location: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            kind: DecodeErrorKind::Shape,
            location: location.into(),
            reason: reason.into(),
        }
    }

    pub fn semantic(location: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            kind: DecodeErrorKind::Semantic,
            location: location.into(),
            reason: reason.into(),
        }
    }
}

/// Decode `input` against `root`, producing a fully populated `M::default()`.
///
/// Does not run the per-type semantic validator — callers compose that on
/// top (see `crate::messages`) as a separate "decode, then validate" step.
pub fn decode<M: Default>(root: &'static Handler<M>, input: &str) -> Result<M, DecodeError> {
    let events =
        tokenize(input).map_err(|e| DecodeError::parse(format!("{e}"), e.to_string()))?;

    let mut target = M::default();
    let mut stack: Vec<&'static Handler<M>> = vec![root];
    let mut array_stack: Vec<&'static Handler<M>> = Vec::new();

    for (idx, event) in events.iter().enumerate() {
        apply_event(&mut stack, &mut array_stack, &mut target, event, idx)?;
    }

    if !stack.is_empty() {
        return Err(DecodeError::shape(
            format!("event {}", events.len()),
            "unexpected end of document: unclosed container",
        ));
    }

    Ok(target)
}

fn apply_event<M>(
    stack: &mut Vec<&'static Handler<M>>,
    array_stack: &mut Vec<&'static Handler<M>>,
    target: &mut M,
    event: &Event<'_>,
    idx: usize,
) -> Result<(), DecodeError> {
    let loc = || format!("event {idx}");

    match event {
        Event::ObjectBegin => {
            let top: Handler<M> = **stack
                .last()
                .ok_or_else(|| DecodeError::shape(loc(), "unexpected object"))?;
            match top {
                Handler::Object(_) => Ok(()),
                Handler::Array(elem) => match *elem {
                    Handler::Object(_) => {
                        stack.push(elem);
                        Ok(())
                    }
                    _ => Err(DecodeError::shape(loc(), "array element is not an object")),
                },
                _ => Err(DecodeError::shape(loc(), "unexpected object")),
            }
        }
        Event::ObjectEnd => match stack.pop().map(|h| *h) {
            Some(Handler::Object(_)) => Ok(()),
            _ => Err(DecodeError::shape(loc(), "unbalanced object")),
        },
        Event::ArrayBegin => {
            let top_ref: &'static Handler<M> = *stack
                .last()
                .ok_or_else(|| DecodeError::shape(loc(), "unexpected array"))?;
            match *top_ref {
                Handler::Array(elem) => {
                    let same_instance = array_stack
                        .last()
                        .is_some_and(|open| std::ptr::eq(*open, top_ref));
                    if same_instance {
                        match *elem {
                            Handler::Array(_) => {
                                array_stack.push(elem);
                                stack.push(elem);
                                Ok(())
                            }
                            _ => {
                                Err(DecodeError::shape(loc(), "array element is not an array"))
                            }
                        }
                    } else {
                        array_stack.push(top_ref);
                        Ok(())
                    }
                }
                _ => Err(DecodeError::shape(loc(), "unexpected array")),
            }
        }
        Event::ArrayEnd => {
            if array_stack.pop().is_none() {
                return Err(DecodeError::shape(loc(), "unbalanced array"));
            }
            match stack.pop().map(|h| *h) {
                Some(Handler::Array(_)) => Ok(()),
                _ => Err(DecodeError::shape(loc(), "unbalanced array")),
            }
        }
        Event::Key(k) => {
            let top: Handler<M> = **stack
                .last()
                .ok_or_else(|| DecodeError::shape(loc(), "key outside of object"))?;
            match top {
                Handler::Object(fields) => {
                    let handler = fields
                        .iter()
                        .find(|(name, _)| *name == k.as_ref())
                        .map(|(_, h)| h)
                        .ok_or_else(|| {
                            DecodeError::shape(loc(), format!("unknown field '{k}'"))
                        })?;
                    stack.push(handler);
                    Ok(())
                }
                _ => Err(DecodeError::shape(loc(), "key outside of object")),
            }
        }
        terminal => apply_terminal(stack, target, terminal, &loc),
    }
}

fn apply_terminal<M>(
    stack: &mut Vec<&'static Handler<M>>,
    target: &mut M,
    event: &Event<'_>,
    loc: &dyn Fn() -> String,
) -> Result<(), DecodeError> {
    let top: Handler<M> = **stack
        .last()
        .ok_or_else(|| DecodeError::shape(loc(), "value outside of any container"))?;

    let (handler, is_array_element): (Handler<M>, bool) = match top {
        Handler::Array(elem) => (*elem, true),
        other => (other, false),
    };

    match (handler, event) {
        (Handler::String(f), Event::String(s)) => f(target, as_str(s)),
        (Handler::UInt(f), Event::UInt(v)) => f(target, *v),
        (Handler::Float(f), Event::Float(v)) => f(target, *v),
        (Handler::Float(f), Event::UInt(v)) => f(target, *v as f64),
        (Handler::Float(f), Event::Int(v)) => f(target, *v as f64),
        (Handler::Bool(f), Event::Bool(v)) => f(target, *v),
        (Handler::Null(f), Event::Null) => f(target),
        _ => return Err(DecodeError::shape(loc(), "terminal value does not match handler")),
    }

    if !is_array_element {
        stack.pop();
    }
    Ok(())
}

fn as_str<'a>(c: &'a Cow<'_, str>) -> &'a str {
    c.as_ref()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default, Debug, PartialEq)]
    struct Flat {
        a: u64,
        b: String,
    }

    static FLAT_FIELDS: &[(&str, Handler<Flat>)] = &[
        ("a", Handler::UInt(|m, v| m.a = v)),
        ("b", Handler::String(|m, s| m.b = s.to_string())),
    ];
    static FLAT_ROOT: Handler<Flat> = Handler::Object(FLAT_FIELDS);

    #[test]
    fn decodes_flat_object() {
        let got = decode(&FLAT_ROOT, r#"{"a":5,"b":"hi"}"#).unwrap();
        assert_eq!(got, Flat { a: 5, b: "hi".into() });
    }

    #[test]
    fn unknown_field_is_shape_error() {
        let err = decode(&FLAT_ROOT, r#"{"a":5,"c":1}"#).unwrap_err();
        assert_eq!(err.kind, DecodeErrorKind::Shape);
    }

    #[test]
    fn type_mismatch_is_shape_error() {
        let err = decode(&FLAT_ROOT, r#"{"a":"nope"}"#).unwrap_err();
        assert_eq!(err.kind, DecodeErrorKind::Shape);
    }

    #[derive(Default, Debug, PartialEq)]
    struct Nested {
        inner_x: u64,
    }
    static INNER_FIELDS: &[(&str, Handler<Nested>)] =
        &[("x", Handler::UInt(|m, v| m.inner_x = v))];
    static NESTED_FIELDS: &[(&str, Handler<Nested>)] =
        &[("inner", Handler::Object(INNER_FIELDS))];
    static NESTED_ROOT: Handler<Nested> = Handler::Object(NESTED_FIELDS);

    #[test]
    fn decodes_nested_object() {
        let got = decode(&NESTED_ROOT, r#"{"inner":{"x":9}}"#).unwrap();
        assert_eq!(got, Nested { inner_x: 9 });
    }

    #[derive(Default, Debug, PartialEq)]
    struct Arr {
        sum: u64,
    }
    static ARR_ELEM: Handler<Arr> = Handler::UInt(|m, v| m.sum += v);
    static ARR_FIELDS: &[(&str, Handler<Arr>)] = &[("xs", Handler::Array(&ARR_ELEM))];
    static ARR_ROOT: Handler<Arr> = Handler::Object(ARR_FIELDS);

    #[test]
    fn decodes_array_of_scalars() {
        let got = decode(&ARR_ROOT, r#"{"xs":[1,2,3]}"#).unwrap();
        assert_eq!(got, Arr { sum: 6 });
    }

    #[test]
    fn decodes_empty_array() {
        let got = decode(&ARR_ROOT, r#"{"xs":[]}"#).unwrap();
        assert_eq!(got, Arr { sum: 0 });
    }
}
