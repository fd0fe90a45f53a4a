//! Receive-side typecasters.
//!
//! A [`TypeCaster`] turns the text of a column value into a
//! [`serde_json::Value`]. Casters are matched by OID and live in a
//! [`CodecTable`], either the process-wide one owned by
//! [`TypeRegistry`](crate::registry::TypeRegistry) or one owned by a
//! connection.
//!
//! Array casters parse the PostgreSQL text array syntax and hand each element
//! to their element caster:
//!
//! ```text
//! [1:2]={"{\"a\": 1}",NULL,{...}}
//! ──┬── ─────┬────── ─┬── ──┬──
//!   │        │        │     └── Nested dimension
//!   │        │        └── NULL element (JSON null)
//!   │        └── Quoted element, backslash escapes
//!   └── Optional dimension decoration
//! ```

use nom::{
    branch::alt,
    bytes::complete::{take_while, take_while1},
    character::complete::{char, multispace0},
    combinator::{all_consuming, map, opt},
    error::{Error, ErrorKind},
    multi::{many1, separated_list0},
    sequence::{delimited, preceded, terminated},
    IResult,
};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{JsonError, JsonResult};

/// PostgreSQL's limit on array dimensions (`MAXDIM`).
pub const MAX_ARRAY_DIMENSIONS: usize = 6;

/// Function parsing the text of one column value.
pub type LoadsFn = Arc<dyn Fn(&str) -> JsonResult<Value> + Send + Sync>;

/// How a caster converts text.
#[derive(Clone)]
pub enum Cast {
    /// Call the function on the whole text.
    Scalar(LoadsFn),
    /// Parse an array literal, casting each element with the element caster.
    Array(Arc<TypeCaster>),
}

/// A typecaster: the OIDs it matches, a name, and a cast.
#[derive(Clone)]
pub struct TypeCaster {
    oids: Vec<u32>,
    name: String,
    cast: Cast,
}

impl TypeCaster {
    pub fn oids(&self) -> &[u32] {
        &self.oids
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_array(&self) -> bool {
        matches!(self.cast, Cast::Array(_))
    }

    /// The element caster of an array caster.
    pub fn element(&self) -> Option<&Arc<TypeCaster>> {
        match &self.cast {
            Cast::Array(element) => Some(element),
            Cast::Scalar(_) => None,
        }
    }

    /// Cast one column value. `None` is SQL NULL and yields `Value::Null`
    /// without calling the loads function.
    pub fn cast(&self, raw: Option<&str>) -> JsonResult<Value> {
        let Some(text) = raw else {
            return Ok(Value::Null);
        };

        match &self.cast {
            Cast::Scalar(loads) => loads(text),
            Cast::Array(element) => {
                let items = parse_array(text)?;
                elements_to_value(items, element)
            }
        }
    }
}

impl fmt::Debug for TypeCaster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("TypeCaster");
        s.field("oids", &self.oids).field("name", &self.name);
        match &self.cast {
            Cast::Scalar(_) => s.field("cast", &"scalar"),
            Cast::Array(element) => s.field("element", &element.name),
        };
        s.finish()
    }
}

/// Create a scalar typecaster.
pub fn new_type(oids: &[u32], name: impl Into<String>, loads: LoadsFn) -> TypeCaster {
    TypeCaster {
        oids: oids.to_vec(),
        name: name.into(),
        cast: Cast::Scalar(loads),
    }
}

/// Create an array typecaster delegating elements to `element`.
pub fn new_array_type(
    oids: &[u32],
    name: impl Into<String>,
    element: Arc<TypeCaster>,
) -> TypeCaster {
    TypeCaster {
        oids: oids.to_vec(),
        name: name.into(),
        cast: Cast::Array(element),
    }
}

/// Typecasters keyed by OID.
#[derive(Debug, Clone, Default)]
pub struct CodecTable {
    casters: HashMap<u32, Arc<TypeCaster>>,
}

impl CodecTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `caster` under each of its OIDs, replacing earlier entries.
    pub fn insert(&mut self, caster: Arc<TypeCaster>) {
        for oid in caster.oids() {
            self.casters.insert(*oid, Arc::clone(&caster));
        }
    }

    pub fn get(&self, oid: u32) -> Option<&Arc<TypeCaster>> {
        self.casters.get(&oid)
    }

    pub fn remove(&mut self, oid: u32) -> Option<Arc<TypeCaster>> {
        self.casters.remove(&oid)
    }

    pub fn len(&self) -> usize {
        self.casters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.casters.is_empty()
    }
}

// ==================== Array Literals ====================

/// One element of a parsed array literal.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayElement {
    Null,
    Text(String),
    Nested(Vec<ArrayElement>),
}

/// Parse a PostgreSQL text-format array literal.
///
/// Literals nested deeper than [`MAX_ARRAY_DIMENSIONS`] are rejected.
pub fn parse_array(text: &str) -> JsonResult<Vec<ArrayElement>> {
    match array_literal(text) {
        Ok((_, items)) => Ok(items),
        Err(nom::Err::Failure(e)) if e.code == ErrorKind::TooLarge => Err(
            JsonError::array_literal(text.len() - e.input.len(), "too many dimensions"),
        ),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(JsonError::array_literal(
            text.len() - e.input.len(),
            format!("unexpected input ({})", e.code.description()),
        )),
        Err(nom::Err::Incomplete(_)) => Err(JsonError::array_literal(
            text.len(),
            "unexpected end of input",
        )),
    }
}

fn elements_to_value(items: Vec<ArrayElement>, element: &TypeCaster) -> JsonResult<Value> {
    items
        .into_iter()
        .map(|item| match item {
            ArrayElement::Null => Ok(Value::Null),
            ArrayElement::Text(text) => element.cast(Some(&text)),
            ArrayElement::Nested(inner) => elements_to_value(inner, element),
        })
        .collect::<JsonResult<Vec<_>>>()
        .map(Value::Array)
}

/// Full literal, with optional `[lo:hi]...=` decoration.
fn array_literal(input: &str) -> IResult<&str, Vec<ArrayElement>> {
    all_consuming(delimited(
        preceded(multispace0, opt(dimensions)),
        |i| array(i, 1),
        multispace0,
    ))(input)
}

fn dimensions(input: &str) -> IResult<&str, ()> {
    let (input, _) = many1(delimited(
        char('['),
        take_while(|c: char| c.is_ascii_digit() || c == ':' || c == '-'),
        char(']'),
    ))(input)?;
    let (input, _) = char('=')(input)?;
    Ok((input, ()))
}

/// `{...}` at nesting level `depth`, starting from 1.
fn array(input: &str, depth: usize) -> IResult<&str, Vec<ArrayElement>> {
    let (rest, _) = terminated(char('{'), multispace0)(input)?;
    if depth > MAX_ARRAY_DIMENSIONS {
        return Err(nom::Err::Failure(Error::new(input, ErrorKind::TooLarge)));
    }
    terminated(
        separated_list0(delimited(multispace0, char(','), multispace0), |i| {
            element(i, depth)
        }),
        preceded(multispace0, char('}')),
    )(rest)
}

fn element(input: &str, depth: usize) -> IResult<&str, ArrayElement> {
    alt((
        map(|i| array(i, depth + 1), ArrayElement::Nested),
        map(quoted_element, ArrayElement::Text),
        map(unquoted_element, |s| {
            if s.eq_ignore_ascii_case("NULL") {
                ArrayElement::Null
            } else {
                ArrayElement::Text(s.to_string())
            }
        }),
    ))(input)
}

/// Double-quoted element; a backslash escapes the next character.
fn quoted_element(input: &str) -> IResult<&str, String> {
    let (input, _) = char('"')(input)?;
    let mut out = String::new();
    let mut chars = input.char_indices();

    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Ok((&input[i + 1..], out)),
            '\\' => match chars.next() {
                Some((_, escaped)) => out.push(escaped),
                None => break,
            },
            _ => out.push(c),
        }
    }

    // Unterminated
    Err(nom::Err::Failure(Error::new(input, ErrorKind::Char)))
}

fn unquoted_element(input: &str) -> IResult<&str, &str> {
    map(
        take_while1(|c: char| !matches!(c, ',' | '{' | '}' | '"')),
        str::trim,
    )(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn json_loads() -> LoadsFn {
        Arc::new(|s: &str| serde_json::from_str::<Value>(s).map_err(JsonError::Decode))
    }

    #[test]
    fn test_parse_simple_array() {
        assert_eq!(parse_array("{}").unwrap(), Vec::<ArrayElement>::new());
        assert_eq!(parse_array(" { } ").unwrap(), Vec::<ArrayElement>::new());
        assert_eq!(
            parse_array("{1,2,NULL}").unwrap(),
            vec![
                ArrayElement::Text("1".into()),
                ArrayElement::Text("2".into()),
                ArrayElement::Null,
            ]
        );
    }

    #[test]
    fn test_parse_quoted_elements() {
        let items = parse_array(r#"{"{\"a\": 1}","NULL", "x, y"}"#).unwrap();
        assert_eq!(
            items,
            vec![
                ArrayElement::Text(r#"{"a": 1}"#.into()),
                ArrayElement::Text("NULL".into()),
                ArrayElement::Text("x, y".into()),
            ]
        );
    }

    #[test]
    fn test_parse_nested_and_dimensions() {
        let items = parse_array("[1:2][1:1]={{1},{2}}").unwrap();
        assert_eq!(
            items,
            vec![
                ArrayElement::Nested(vec![ArrayElement::Text("1".into())]),
                ArrayElement::Nested(vec![ArrayElement::Text("2".into())]),
            ]
        );
    }

    #[test]
    fn test_parse_dimension_limit() {
        let six = format!("{}1{}", "{".repeat(6), "}".repeat(6));
        assert!(parse_array(&six).is_ok());

        let seven = format!("{}1{}", "{".repeat(7), "}".repeat(7));
        assert!(matches!(
            parse_array(&seven),
            Err(JsonError::ArrayLiteral { position: 6, ref message })
                if message == "too many dimensions"
        ));
    }

    #[test]
    fn test_parse_deep_nesting_is_rejected() {
        let deep = format!("{}{}", "{".repeat(10_000), "}".repeat(10_000));
        assert!(matches!(
            parse_array(&deep),
            Err(JsonError::ArrayLiteral { position: 6, .. })
        ));

        let scalar = Arc::new(new_type(&[114], "JSON", json_loads()));
        let array = new_array_type(&[199], "JSONARRAY", scalar);
        assert!(array.cast(Some(&deep)).is_err());
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            parse_array(r#"{"open"#),
            Err(JsonError::ArrayLiteral { .. })
        ));
        assert!(parse_array("{1,,2}").is_err());
        assert!(parse_array("{1} trailing").is_err());
        assert!(parse_array("not an array").is_err());
    }

    #[test]
    fn test_scalar_cast() {
        let caster = new_type(&[114], "JSON", json_loads());
        assert_eq!(caster.cast(Some(r#"{"a": [1, 2]}"#)).unwrap(), json!({"a": [1, 2]}));
        assert_eq!(caster.cast(None).unwrap(), Value::Null);
        assert!(!caster.is_array());
    }

    #[test]
    fn test_array_cast_delegates_to_element() {
        let scalar = Arc::new(new_type(&[114], "JSON", json_loads()));
        let array = new_array_type(&[199], "JSONARRAY", Arc::clone(&scalar));

        let value = array
            .cast(Some(r#"{"{\"a\": 1}",NULL,"[true]",{"2","3"}}"#))
            .unwrap();
        assert_eq!(value, json!([{"a": 1}, null, [true], [2, 3]]));
        assert_eq!(array.element().map(|e| e.name()), Some("JSON"));
    }

    #[test]
    fn test_array_cast_propagates_element_errors() {
        let scalar = Arc::new(new_type(&[114], "JSON", json_loads()));
        let array = new_array_type(&[199], "JSONARRAY", scalar);
        assert!(matches!(
            array.cast(Some("{nope}")),
            Err(JsonError::Decode(_))
        ));
    }

    #[test]
    fn test_codec_table_insert_and_replace() {
        let mut table = CodecTable::new();
        table.insert(Arc::new(new_type(&[114, 3802], "JSON", json_loads())));
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(3802).map(|c| c.name()), Some("JSON"));

        table.insert(Arc::new(new_type(&[114], "CUSTOM", json_loads())));
        assert_eq!(table.get(114).map(|c| c.name()), Some("CUSTOM"));
        assert_eq!(table.get(3802).map(|c| c.name()), Some("JSON"));

        assert!(table.remove(114).is_some());
        assert!(table.get(114).is_none());
    }
}
