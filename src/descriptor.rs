use std::sync::Arc;

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::take_until,
    character::complete::{char, one_of},
    combinator::{eof, map},
    multi::many0,
    sequence::{delimited, preceded},
};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldDescriptor(pub(crate) FieldType);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub(crate) parameters: Vec<FieldType>,
    pub(crate) return_type: ReturnType,
}

pub type ReturnType = Option<FieldType>;

#[derive(Debug, PartialEq, Eq, Clone, Hash)]
pub enum FieldType {
    Byte,
    Char,
    Double,
    Float,
    Int,
    Long,
    Object(Arc<str>),
    Short,
    Boolean,
    Array(Box<FieldType>),
}

impl FieldType {
    /// Category-2 types occupy two slots in locals and on the operand stack.
    pub fn is_wide(&self) -> bool {
        matches!(self, FieldType::Long | FieldType::Double)
    }

    pub fn is_primitive(&self) -> bool {
        !matches!(self, FieldType::Object(_) | FieldType::Array(_))
    }

    pub fn slot_width(&self) -> usize {
        if self.is_wide() { 2 } else { 1 }
    }

    pub fn to_descriptor(&self) -> String {
        match self {
            FieldType::Byte => "B".to_string(),
            FieldType::Char => "C".to_string(),
            FieldType::Double => "D".to_string(),
            FieldType::Float => "F".to_string(),
            FieldType::Int => "I".to_string(),
            FieldType::Long => "J".to_string(),
            FieldType::Short => "S".to_string(),
            FieldType::Boolean => "Z".to_string(),
            FieldType::Object(name) => format!("L{name};"),
            FieldType::Array(element) => format!("[{}", element.to_descriptor()),
        }
    }
}

impl MethodDescriptor {
    /// Slots taken by the parameters, not counting the receiver.
    pub fn parameter_slots(&self) -> usize {
        self.parameters.iter().map(FieldType::slot_width).sum()
    }

    pub fn to_descriptor(&self) -> String {
        let mut out = String::from("(");
        for p in &self.parameters {
            out.push_str(&p.to_descriptor());
        }
        out.push(')');
        match &self.return_type {
            Some(t) => out.push_str(&t.to_descriptor()),
            None => out.push('V'),
        }
        out
    }
}

pub fn parse_field_descriptor(input: &str) -> IResult<&str, FieldDescriptor> {
    let (input, field_type) = parse_field_type(input)?;
    eof(input)?;
    Ok((input, FieldDescriptor(field_type)))
}

pub fn parse_method_descriptor(input: &str) -> IResult<&str, MethodDescriptor> {
    let (input, parameters) =
        delimited(char('('), many0(parse_field_type), char(')')).parse(input)?;

    let (input, return_type) = parse_return_type_descriptor(input)?;

    eof(input)?;
    Ok((
        input,
        MethodDescriptor {
            parameters,
            return_type,
        },
    ))
}

pub fn parse_return_type_descriptor(input: &str) -> IResult<&str, ReturnType> {
    alt((map(parse_field_type, Some), parse_void_type)).parse(input)
}

fn parse_field_type(input: &str) -> IResult<&str, FieldType> {
    alt((parse_base_type, parse_object_type, parse_array_type)).parse(input)
}

fn parse_base_type(input: &str) -> IResult<&str, FieldType> {
    let (input, ch) = one_of("BCDFIJSZ").parse(input)?;
    let field_type = match ch {
        'B' => FieldType::Byte,
        'C' => FieldType::Char,
        'D' => FieldType::Double,
        'F' => FieldType::Float,
        'I' => FieldType::Int,
        'J' => FieldType::Long,
        'S' => FieldType::Short,
        'Z' => FieldType::Boolean,
        _ => unreachable!("one_of is exhaustive"),
    };
    Ok((input, field_type))
}

fn parse_object_type(input: &str) -> IResult<&str, FieldType> {
    map(delimited(char('L'), take_until(";"), char(';')), |name| {
        FieldType::Object(Arc::from(name))
    })
    .parse(input)
}

fn parse_array_type(input: &str) -> IResult<&str, FieldType> {
    map(preceded(char('['), parse_field_type), |element| {
        FieldType::Array(Box::new(element))
    })
    .parse(input)
}

fn parse_void_type(input: &str) -> IResult<&str, Option<FieldType>> {
    map(char('V'), |_| None).parse(input)
}
