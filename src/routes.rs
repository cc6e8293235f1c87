//! Text notation for matrix settings.
//!
//! A list of `IN>OUT [GAIN] [!]` items separated by commas, semicolons or
//! newlines. Channels count from 1. GAIN is linear (`0.5`), decibels (`-6dB`)
//! or `-inf`; without it the route is unity. `!` inverts polarity. `#` starts a
//! comment that runs to the end of the line.
//!
//! ```text
//! 1>1, 2>2       # straight through
//! 1>2 -6dB !     # in 1 to out 2, 6 dB down, inverted
//! ```

use nom::{
    Parser,
    branch::alt,
    bytes::complete::tag_no_case,
    character::complete::{char, digit1, space0, space1},
    combinator::{all_consuming, map_res, opt},
    number::complete::float,
    sequence::{delimited, preceded},
};

use crate::{Cell, MatrixShape, MixerError, MixerResult, db_to_gain};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Route {
    pub cell: Cell,
    /// Signed linear gain; negative when inverted.
    pub gain: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct ParsedRoute {
    from: usize,
    to: usize,
    gain: f32,
    inverted: bool,
}

fn parse_index(input: &str) -> nom::IResult<&str, usize> {
    map_res(digit1, |digits: &str| digits.parse::<usize>()).parse(input)
}

fn parse_db_suffix(input: &str) -> nom::IResult<&str, bool> {
    let (input, suffix) = opt(preceded(space0, tag_no_case("db"))).parse(input)?;
    Ok((input, suffix.is_some()))
}

fn parse_silence(input: &str) -> nom::IResult<&str, f32> {
    let (input, _) = tag_no_case("-inf").parse(input)?;
    let (input, _) = parse_db_suffix(input)?;
    Ok((input, 0.0))
}

fn parse_level(input: &str) -> nom::IResult<&str, f32> {
    let (input, value) = float(input)?;
    let (input, db) = parse_db_suffix(input)?;
    Ok((input, if db { db_to_gain(value) } else { value }))
}

fn parse_gain(input: &str) -> nom::IResult<&str, f32> {
    alt((parse_silence, parse_level)).parse(input)
}

fn parse_route(input: &str) -> nom::IResult<&str, ParsedRoute> {
    let (input, _) = space0.parse(input)?;
    let (input, from) = parse_index(input)?;
    let (input, _) = delimited(space0, char('>'), space0).parse(input)?;
    let (input, to) = parse_index(input)?;
    let (input, gain) = opt(preceded(space1, parse_gain)).parse(input)?;
    let (input, inverted) = opt(preceded(space0, char('!'))).parse(input)?;
    let (input, _) = space0.parse(input)?;
    Ok((
        input,
        ParsedRoute {
            from,
            to,
            gain: gain.unwrap_or(1.0),
            inverted: inverted.is_some(),
        },
    ))
}

fn strip_comments(s: &str) -> String {
    s.lines()
        .map(|line| line.split('#').next().unwrap_or(""))
        .collect::<Vec<_>>()
        .join("\n")
}

impl ParsedRoute {
    fn resolve(self, shape: MatrixShape, text: &str) -> MixerResult<Route> {
        if self.from == 0 || self.to == 0 {
            return Err(MixerError::Route(format!(
                "`{text}`: channels are numbered from 1"
            )));
        }
        let cell = Cell::new(self.from - 1, self.to - 1);
        if !shape.contains(cell) {
            return Err(MixerError::Route(format!(
                "`{text}`: no such cell in a {shape} matrix"
            )));
        }
        if !self.gain.is_finite() {
            return Err(MixerError::Route(format!("`{text}`: gain must be finite")));
        }
        let gain = if self.inverted { -self.gain } else { self.gain };
        Ok(Route { cell, gain })
    }
}

pub fn parse_routes(text: &str, shape: MatrixShape) -> MixerResult<Vec<Route>> {
    let text = strip_comments(text);
    text.split([',', ';', '\n'])
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| match all_consuming(parse_route).parse(item) {
            Ok((_, parsed)) => parsed.resolve(shape, item),
            Err(e) => Err(MixerError::Route(format!("`{item}`: {e:?}"))),
        })
        .collect()
}

/// Full gain table for `routes`: listed cells take their gain, the rest are silent.
/// A later route for the same cell wins.
pub fn routes_to_gains(routes: &[Route], shape: MatrixShape) -> MixerResult<Vec<f32>> {
    let mut gains = vec![0.0; shape.cells()];
    for route in routes {
        gains[shape.index(route.cell)?] = route.gain;
    }
    Ok(gains)
}

/// Writes the open cells of `gains` back out in route notation.
pub fn format_routes(gains: &[f32], shape: MatrixShape) -> String {
    gains
        .iter()
        .enumerate()
        .filter(|&(_, &gain)| gain != 0.0)
        .map(|(index, &gain)| {
            let cell = shape.cell(index);
            let db = 20.0 * gain.abs().log10();
            let mut item = format!("{cell} {db:.2}dB");
            if gain < 0.0 {
                item.push_str(" !");
            }
            item
        })
        .collect::<Vec<_>>()
        .join(", ")
}
