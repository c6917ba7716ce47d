//! Nom-based IRC message grammar.
//!
//! Parses `['@' tags SP] [':' prefix SP] verb (SP middle)* [SP ':' trailing]`
//! into borrowed slices of the input line.

use nom::{
    bytes::complete::{take_until, take_while1},
    character::complete::{char, space0},
    combinator::opt,
    error::ErrorKind,
    sequence::preceded,
    IResult,
};
use smallvec::SmallVec;

/// Parse the tags section (after `@`, up to the first space).
fn parse_tags(input: &str) -> IResult<&str, &str> {
    preceded(char('@'), take_until(" "))(input)
}

/// Parse the prefix (after `:`, up to the first space).
fn parse_prefix(input: &str) -> IResult<&str, &str> {
    preceded(char(':'), take_while1(|c| c != ' '))(input)
}

/// Parse the verb: a run of letters, or exactly three digits.
fn parse_verb(input: &str) -> IResult<&str, &str> {
    let (rest, verb) = take_while1(|c: char| c.is_alphanumeric())(input)?;

    let is_all_letters = verb.chars().all(|c| c.is_ascii_alphabetic());
    let is_three_digits = verb.len() == 3 && verb.chars().all(|c| c.is_ascii_digit());

    if is_all_letters || is_three_digits {
        Ok((rest, verb))
    } else {
        Err(nom::Err::Error(nom::error::Error::new(
            input,
            ErrorKind::AlphaNumeric,
        )))
    }
}

/// Parse the argument list after the verb.
///
/// A `middle` is a non-empty token without spaces; the trailing argument
/// begins at ` :` and runs to the end of line (it may be empty and may
/// contain spaces). Runs of spaces collapse into one separator.
fn parse_args(input: &str) -> SmallVec<[&str; 15]> {
    let mut args: SmallVec<[&str; 15]> = SmallVec::new();
    let mut rest = input;

    while rest.as_bytes().first() == Some(&b' ') {
        while rest.as_bytes().first() == Some(&b' ') {
            rest = &rest[1..];
        }

        if rest.is_empty() {
            break;
        }

        if rest.as_bytes()[0] == b':' {
            args.push(&rest[1..]);
            break;
        }

        let end = rest.find(' ').unwrap_or(rest.len());
        args.push(&rest[..end]);
        rest = &rest[end..];
    }

    args
}

/// Parse a complete IRC line (CR/LF already stripped).
pub(crate) fn parse_line(input: &str) -> IResult<&str, RawMessage<'_>> {
    let (input, tags) = opt(parse_tags)(input)?;
    let (input, _) = space0(input)?;

    let (input, prefix) = opt(parse_prefix)(input)?;
    let (input, _) = space0(input)?;

    let (input, verb) = parse_verb(input)?;

    let args = parse_args(input);

    Ok((
        "",
        RawMessage {
            tags,
            prefix,
            verb,
            args,
        },
    ))
}

/// A parsed IRC line with borrowed string slices.
///
/// Intermediate representation; the owned [`Message`](super::Message) is
/// built from it by the `FromStr` impl.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RawMessage<'a> {
    /// Raw tags string (without the leading `@`), if present.
    pub tags: Option<&'a str>,
    /// Raw prefix string (without the leading `:`), if present.
    pub prefix: Option<&'a str>,
    /// The verb.
    pub verb: &'a str,
    /// Arguments, including trailing.
    pub args: SmallVec<[&'a str; 15]>,
}

impl<'a> RawMessage<'a> {
    /// Parse an IRC line into a `RawMessage`, reporting the failure
    /// position on error.
    pub fn parse(input: &'a str) -> Result<Self, usize> {
        match parse_line(input) {
            Ok((_, msg)) => Ok(msg),
            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
                Err(input.len() - e.input.len())
            }
            Err(nom::Err::Incomplete(_)) => Err(input.len()),
        }
    }
}
