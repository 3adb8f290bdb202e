/// Inline expressions
///
/// `ds_${0..1}.t_order_${0..1}` expands into data nodes, and
/// `t_order_${order_id % 2}` evaluates against one sharding value.

use crate::core::{Result, ShardingError, Value};
use nom::{
    branch::alt,
    bytes::complete::{tag, take_while},
    character::complete::{alpha1, anychar, char, digit1, multispace0, one_of},
    combinator::{all_consuming, map, map_res, not, opt, recognize},
    multi::{many0, many1, separated_list1},
    sequence::{delimited, pair, preceded, separated_pair},
    IResult,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArithOp {
    Mod,
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Placeholder {
    Range(i64, i64),
    List(Vec<String>),
    Column { name: String, op: Option<(ArithOp, i64)> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(Placeholder),
}

/// A parsed inline expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineExpression {
    source: String,
    segments: Vec<Segment>,
}

fn ws<'a, F, O>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

fn identifier(input: &str) -> IResult<&str, String> {
    map(
        recognize(pair(
            alt((alpha1, tag("_"))),
            take_while(|c: char| c.is_alphanumeric() || c == '_'),
        )),
        |s: &str| s.to_string(),
    )(input)
}

fn integer(input: &str) -> IResult<&str, i64> {
    map_res(recognize(pair(opt(char('-')), digit1)), str::parse::<i64>)(input)
}

fn placeholder_open(input: &str) -> IResult<&str, &str> {
    alt((tag("${"), tag("$->{")))(input)
}

fn list_item(input: &str) -> IResult<&str, String> {
    alt((
        map(delimited(char('\''), take_while(|c| c != '\''), char('\'')), str::to_string),
        map(delimited(char('"'), take_while(|c| c != '"'), char('"')), str::to_string),
        map(recognize(integer), str::to_string),
    ))(input)
}

fn arith_op(input: &str) -> IResult<&str, ArithOp> {
    map(one_of("%+-*/"), |c| match c {
        '%' => ArithOp::Mod,
        '+' => ArithOp::Add,
        '-' => ArithOp::Sub,
        '*' => ArithOp::Mul,
        _ => ArithOp::Div,
    })(input)
}

fn placeholder(input: &str) -> IResult<&str, Segment> {
    map(
        delimited(
            placeholder_open,
            ws(alt((
                map(separated_pair(integer, tag(".."), integer), |(a, b)| {
                    Placeholder::Range(a, b)
                }),
                map(
                    delimited(
                        char('['),
                        separated_list1(ws(char(',')), ws(list_item)),
                        char(']'),
                    ),
                    Placeholder::List,
                ),
                map(pair(identifier, opt(pair(ws(arith_op), integer))), |(name, op)| {
                    Placeholder::Column { name, op }
                }),
            ))),
            char('}'),
        ),
        Segment::Placeholder,
    )(input)
}

fn literal(input: &str) -> IResult<&str, Segment> {
    map(recognize(many1(preceded(not(placeholder_open), anychar))), |s: &str| {
        Segment::Literal(s.to_string())
    })(input)
}

impl InlineExpression {
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let (_, segments) = all_consuming(many0(alt((placeholder, literal))))(trimmed)
            .map_err(|e| ShardingError::InvalidExpression(format!("{trimmed}: {e}")))?;
        Ok(Self { source: trimmed.to_string(), segments })
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Column names referenced by the expression.
    #[must_use]
    pub fn columns(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Placeholder(Placeholder::Column { name, .. }) => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Cartesian product of every range and list placeholder.
    pub fn expand(&self) -> Result<Vec<String>> {
        let mut results = vec![String::new()];
        for segment in &self.segments {
            let alternatives: Vec<String> = match segment {
                Segment::Literal(text) => vec![text.clone()],
                Segment::Placeholder(Placeholder::Range(start, end)) => {
                    if start > end {
                        return Err(ShardingError::InvalidExpression(format!(
                            "{}: range {start}..{end} is empty",
                            self.source
                        )));
                    }
                    (*start..=*end).map(|i| i.to_string()).collect()
                }
                Segment::Placeholder(Placeholder::List(items)) => items.clone(),
                Segment::Placeholder(Placeholder::Column { name, .. }) => {
                    return Err(ShardingError::InvalidExpression(format!(
                        "{}: column '{name}' cannot be expanded",
                        self.source
                    )));
                }
            };
            results = results
                .iter()
                .flat_map(|prefix| alternatives.iter().map(move |choice| format!("{prefix}{choice}")))
                .collect();
        }
        Ok(results)
    }

    /// Substitutes `value` for `column`.
    pub fn evaluate(&self, column: &str, value: &Value) -> Result<String> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(Placeholder::Column { name, op }) => {
                    if !name.eq_ignore_ascii_case(column) {
                        return Err(ShardingError::InvalidExpression(format!(
                            "{}: unknown column '{name}', expected '{column}'",
                            self.source
                        )));
                    }
                    match op {
                        None => out.push_str(&value.to_string()),
                        Some((op, operand)) => {
                            let v = value.as_int().ok_or_else(|| {
                                ShardingError::InvalidExpression(format!(
                                    "{}: arithmetic on non-integer value {value}",
                                    self.source
                                ))
                            })?;
                            out.push_str(&apply(*op, v, *operand, &self.source)?.to_string());
                        }
                    }
                }
                Segment::Placeholder(_) => {
                    return Err(ShardingError::InvalidExpression(format!(
                        "{}: only column placeholders can be evaluated",
                        self.source
                    )));
                }
            }
        }
        Ok(out)
    }
}

fn apply(op: ArithOp, value: i64, operand: i64, source: &str) -> Result<i64> {
    let result = match op {
        ArithOp::Mod => value.checked_rem_euclid(operand),
        ArithOp::Add => value.checked_add(operand),
        ArithOp::Sub => value.checked_sub(operand),
        ArithOp::Mul => value.checked_mul(operand),
        ArithOp::Div => value.checked_div(operand),
    };
    result.ok_or_else(|| ShardingError::InvalidExpression(format!("{source}: arithmetic overflow")))
}

/// Splits on commas outside placeholders and expands each part.
pub fn expand_all(input: &str) -> Result<Vec<String>> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in input.char_indices() {
        match c {
            '{' | '[' => depth += 1,
            '}' | ']' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&input[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&input[start..]);

    let mut result = Vec::new();
    for part in parts.into_iter().filter(|p| !p.trim().is_empty()) {
        result.extend(InlineExpression::parse(part)?.expand()?);
    }
    Ok(result)
}
