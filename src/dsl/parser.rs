//! Workflow text parser.
//!
//! Grammar (one statement per line, `;` also separates, `#` starts a line
//! comment):
//!
//! ```text
//! statement   := name "::" type | ["functor"] name "=" expr | expr
//! expr        := broadcast (("∘" | "o") expr)?            right-assoc
//! broadcast   := product ("**" product)*                  desugars
//! product     := atom (("×" | "*") product)?              right-assoc
//! atom        := "(" expr ")" | "duplicate" | name
//! type        := tproduct (("→" | "->") type)?            right-assoc
//! tproduct    := tatom (("×" | "*") tproduct)?
//! tatom       := "()" | "(" type ")" | Name ("[" type ("," type)* "]")?
//! ```
//!
//! `f ** g` desugars to `(f × g) ∘ duplicate`; an n-ary chain
//! left-associates the products and appends a single trailing duplicate.
//! Type names starting with a lowercase letter are type variables.

use nom::{
    IResult,
    branch::alt,
    bytes::complete::{tag, take_while},
    character::complete::{char, multispace0, satisfy},
    combinator::{all_consuming, map, not, opt, recognize},
    multi::many0,
    sequence::{delimited, pair, preceded, separated_pair, tuple},
};
use thiserror::Error;

use super::ast::Ast;
use super::types::Type;

#[derive(Debug, Clone, Error)]
#[error("parse error in statement '{statement}': {message}")]
pub struct ParseError {
    pub statement: String,
    pub message: String,
}

/// Parse a whole program into its statements.
pub fn parse_program(source: &str) -> Result<Vec<Ast>, ParseError> {
    let mut statements = Vec::new();
    for raw in split_statements(source) {
        statements.push(parse_statement(&raw)?);
    }
    Ok(statements)
}

/// Parse a single expression (no definitions or annotations).
pub fn parse_expression(source: &str) -> Result<Ast, ParseError> {
    match all_consuming(ws(expr))(source) {
        Ok((_, ast)) => Ok(ast),
        Err(e) => Err(ParseError {
            statement: source.trim().to_owned(),
            message: e.to_string(),
        }),
    }
}

fn parse_statement(source: &str) -> Result<Ast, ParseError> {
    match all_consuming(ws(statement))(source) {
        Ok((_, ast)) => Ok(ast),
        Err(e) => Err(ParseError {
            statement: source.trim().to_owned(),
            message: e.to_string(),
        }),
    }
}

/// Strip comments and split on newlines and semicolons.
fn split_statements(source: &str) -> Vec<String> {
    source
        .lines()
        .map(|line| match line.find('#') {
            Some(idx) => &line[..idx],
            None => line,
        })
        .flat_map(|line| line.split(';'))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

fn ws<'a, F, O>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        satisfy(|c| c.is_ascii_alphabetic() || c == '_'),
        take_while(is_ident_char),
    ))(input)
}

/// A specific bare word, not a prefix of a longer identifier.
fn keyword<'a>(word: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    move |input| {
        let (rest, matched) = tag(word)(input)?;
        not(satisfy(is_ident_char))(rest)?;
        Ok((rest, matched))
    }
}

// ---- statements ------------------------------------------------------------

fn statement(input: &str) -> IResult<&str, Ast> {
    alt((annotation, definition, expr))(input)
}

fn annotation(input: &str) -> IResult<&str, Ast> {
    map(
        separated_pair(identifier, ws(tag("::")), type_expr),
        |(name, signature)| Ast::annotation(name, signature),
    )(input)
}

fn definition(input: &str) -> IResult<&str, Ast> {
    map(
        tuple((
            opt(ws(keyword("functor"))),
            identifier,
            ws(char('=')),
            expr,
        )),
        |(_, name, _, expression)| Ast::functor(name, expression),
    )(input)
}

// ---- expressions -----------------------------------------------------------

fn expr(input: &str) -> IResult<&str, Ast> {
    let (input, left) = broadcast(input)?;
    let (input, rest) = opt(preceded(ws(compose_op), expr))(input)?;
    Ok((
        input,
        match rest {
            Some(right) => Ast::composition(left, right),
            None => left,
        },
    ))
}

fn compose_op(input: &str) -> IResult<&str, &str> {
    alt((tag("∘"), keyword("o")))(input)
}

fn broadcast(input: &str) -> IResult<&str, Ast> {
    let (input, first) = product(input)?;
    let (input, rest) = many0(preceded(ws(tag("**")), product))(input)?;
    if rest.is_empty() {
        return Ok((input, first));
    }
    let products = rest.into_iter().fold(first, Ast::product);
    Ok((input, Ast::composition(products, Ast::Duplicate)))
}

fn product(input: &str) -> IResult<&str, Ast> {
    let (input, left) = atom(input)?;
    let (input, rest) = opt(preceded(ws(product_op), product))(input)?;
    Ok((
        input,
        match rest {
            Some(right) => Ast::product(left, right),
            None => left,
        },
    ))
}

fn product_op(input: &str) -> IResult<&str, &str> {
    // A single `*`; `**` belongs to the broadcast level.
    alt((tag("×"), |i| {
        let (rest, matched) = tag("*")(i)?;
        not(char('*'))(rest)?;
        Ok((rest, matched))
    }))(input)
}

fn atom(input: &str) -> IResult<&str, Ast> {
    alt((
        delimited(ws(char('(')), expr, ws(char(')'))),
        map(identifier, |name| {
            if name == "duplicate" {
                Ast::Duplicate
            } else {
                Ast::literal(name)
            }
        }),
    ))(input)
}

// ---- types -----------------------------------------------------------------

fn type_expr(input: &str) -> IResult<&str, Type> {
    let (input, left) = type_product(input)?;
    let (input, rest) = opt(preceded(ws(arrow), type_expr))(input)?;
    Ok((
        input,
        match rest {
            Some(output) => Type::function(left, output),
            None => left,
        },
    ))
}

fn arrow(input: &str) -> IResult<&str, &str> {
    alt((tag("→"), tag("->")))(input)
}

fn type_product(input: &str) -> IResult<&str, Type> {
    let (input, left) = type_atom(input)?;
    let (input, rest) = opt(preceded(ws(product_op), type_product))(input)?;
    Ok((
        input,
        match rest {
            Some(right) => Type::product(left, right),
            None => left,
        },
    ))
}

fn type_atom(input: &str) -> IResult<&str, Type> {
    alt((
        map(tag("()"), |_| Type::unit()),
        delimited(ws(char('(')), type_expr, ws(char(')'))),
        named_type,
    ))(input)
}

fn named_type(input: &str) -> IResult<&str, Type> {
    let (input, name) = identifier(input)?;
    let (input, params) = opt(delimited(
        ws(char('[')),
        nom::multi::separated_list1(ws(char(',')), type_expr),
        ws(char(']')),
    ))(input)?;

    let ty = match params {
        Some(params) => Type::mono_with(name, params),
        // Lowercase names are type variables, capitalized names concrete.
        None if name.starts_with(|c: char| c.is_ascii_lowercase()) => Type::var(name),
        None => Type::mono(name),
    };
    Ok((input, ty))
}
