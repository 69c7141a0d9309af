//! Grammar of nested property paths such as `enemy.stats[0].hp`.
//!
//! ```raw
//! path = identifier ( "." identifier | "[" digits "]" )*
//! ```

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{alpha1, alphanumeric1, char, digit1, multispace0},
    combinator::{map, map_res, recognize},
    multi::many0,
    sequence::{delimited, pair, preceded},
    IResult,
};
use serde_json::Value;

use crate::error::PathError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0(alt((alphanumeric1, tag("_"), tag("-")))),
    ))(input)
}

fn key(i: &str) -> IResult<&str, PathSegment> {
    map(identifier, |name| PathSegment::Key(name.to_owned()))(i)
}

fn index(i: &str) -> IResult<&str, PathSegment> {
    map(
        map_res(delimited(char('['), digit1, char(']')), str::parse::<usize>),
        PathSegment::Index,
    )(i)
}

fn segments(i: &str) -> IResult<&str, Vec<PathSegment>> {
    let (i, _) = multispace0(i)?;
    let (i, head) = key(i)?;
    let (i, mut tail) = many0(alt((preceded(char('.'), key), index)))(i)?;
    let (i, _) = multispace0(i)?;
    tail.insert(0, head);
    Ok((i, tail))
}

pub fn parse_path(input: &str) -> Result<Vec<PathSegment>, PathError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(PathError::Empty);
    }
    if trimmed.starts_with('[') {
        return Err(PathError::LeadingIndex(input.to_owned()));
    }
    match segments(input) {
        Ok(("", segments)) => Ok(segments),
        Ok((rest, _)) => Err(PathError::Syntax {
            input: input.to_owned(),
            rest: rest.to_owned(),
        }),
        Err(_) => Err(PathError::Syntax {
            input: input.to_owned(),
            rest: trimmed.to_owned(),
        }),
    }
}

/// Follows `segments` down from `root`.
pub fn resolve<'a>(root: &'a Value, segments: &[PathSegment]) -> Option<&'a Value> {
    segments
        .iter()
        .try_fold(root, |value, segment| match segment {
            PathSegment::Key(key) => value.get(key.as_str()),
            PathSegment::Index(index) => value.get(*index),
        })
}
