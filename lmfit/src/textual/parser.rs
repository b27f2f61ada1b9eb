use super::{ModelName, RawProblem};
use winnow::{
    Result as WResult,
    ascii::{digit1, line_ending, multispace0, space0, space1},
    combinator::{alt, delimited, eof, opt, repeat, separated, terminated},
    prelude::*,
    token::take_while,
};

impl RawProblem {
    pub fn parse(i: &mut &str) -> WResult<Self> {
        multispace0.parse_next(i)?;
        header("model").parse_next(i)?;
        let model = ModelName::parse(i)?;
        multispace0.parse_next(i)?;
        header("guesses").parse_next(i)?;
        let guesses = parse_guesses(i)?;
        multispace0.parse_next(i)?;
        header("data").parse_next(i)?;
        let rows: Vec<Vec<f64>> = repeat(1.., parse_row).parse_next(i)?;
        multispace0.parse_next(i)?;
        eof.parse_next(i)?;
        Ok(Self {
            model,
            guesses,
            rows,
        })
    }
}

impl ModelName {
    // polynomial(2)
    fn parse(i: &mut &str) -> WResult<Self> {
        ignore_ws(i);
        let name = take_while(1.., |c: char| c.is_ascii_alphanumeric() || c == '_')
            .parse_next(i)?
            .to_owned();
        let degree = opt(delimited(
            ('(', space0),
            digit1.verify_map(|s: &str| s.parse::<usize>().ok()),
            (space0, ')'),
        ))
        .parse_next(i)?;
        (space0, end_of_line).parse_next(i)?;
        Ok(Self { name, degree })
    }
}

// 1.0, 2.5, -3
fn parse_guesses(i: &mut &str) -> WResult<Vec<f64>> {
    ignore_ws(i);
    let guesses = separated(1.., parse_number, (space0, ',', space0)).parse_next(i)?;
    (space0, end_of_line).parse_next(i)?;
    Ok(guesses)
}

// 0.2 10.905 0.1
fn parse_row(i: &mut &str) -> WResult<Vec<f64>> {
    ignore_ws(i);
    terminated(
        separated(1.., parse_number, space1),
        (space0, end_of_line),
    )
    .parse_next(i)
}

fn header<'i>(name: &'static str) -> impl Parser<&'i str, (), winnow::error::ContextError> {
    ('#', space0, name, space0, line_ending).map(|_| ())
}

fn end_of_line(i: &mut &str) -> WResult<()> {
    alt((line_ending.map(|_| ()), eof.map(|_| ()))).parse_next(i)
}

fn ws(i: &mut &str) -> WResult<()> {
    space0.parse_next(i).map(|_| ())
}

fn ignore_ws(i: &mut &str) {
    let _ = ws.parse_next(i);
}

fn parse_number(i: &mut &str) -> WResult<f64> {
    winnow::ascii::float.parse_next(i)
}
