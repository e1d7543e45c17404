use std::sync::Arc;

use nom::{
    Parser,
    bytes::complete::take,
    multi::count,
    number::complete::{be_u16, be_u32},
};

use crate::class::{AttributeInfo, ClassFile, ConstantPoolInfo, parser::ClassError};

/// The `Code` attribute of a non-abstract, non-native method.
#[derive(Debug)]
pub struct CodeAttribute {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code: Arc<[u8]>,
    pub exception_table: Vec<ExceptionTableItem>,
    pub line_numbers: Vec<LineNumberItem>,
}

#[derive(Debug, Copy, Clone)]
pub struct ExceptionTableItem {
    pub start_pc: u16,
    pub end_pc: u16,
    pub handler_pc: u16,
    /// Constant-pool index of the catch type, 0 for catch-all.
    pub catch_type: u16,
}

#[derive(Debug, Copy, Clone)]
pub struct LineNumberItem {
    pub start_pc: u16,
    pub line_number: u16,
}

impl CodeAttribute {
    pub fn line_for_pc(&self, pc: u16) -> Option<u16> {
        self.line_numbers
            .iter()
            .rev()
            .find(|item| item.start_pc <= pc)
            .map(|item| item.line_number)
    }
}

/// A `ConstantValue` attribute, resolved to its constant.
#[derive(Debug, Clone)]
pub enum Const {
    Int(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    String(Arc<str>),
}

pub(crate) fn attribute_name<'a>(
    class_file: &'a ClassFile,
    attribute: &AttributeInfo,
) -> Option<&'a str> {
    class_file
        .utf8(attribute.attribute_name_index)
        .map(|s| s.as_ref())
}

pub(crate) fn parse_code(
    class_file: &ClassFile,
    info: &[u8],
) -> Result<CodeAttribute, ClassError> {
    let input = info;
    let (input, max_stack) = be_u16(input)?;
    let (input, max_locals) = be_u16(input)?;
    let (input, code_length) = be_u32(input)?;
    let (input, code) = take(code_length)(input)?;
    let (input, exception_table_length) = be_u16(input)?;
    let (input, exception_table) =
        count(parse_exception_table_item, exception_table_length as _).parse(input)?;

    let mut line_numbers = Vec::new();
    let (mut input, attributes_count) = be_u16::<_, nom::error::Error<&[u8]>>(input)?;
    for _ in 0..attributes_count {
        let (rest, name_index) = be_u16::<_, nom::error::Error<&[u8]>>(input)?;
        let (rest, length) = be_u32::<_, nom::error::Error<&[u8]>>(rest)?;
        let (rest, body) = take::<_, _, nom::error::Error<&[u8]>>(length)(rest)?;
        if class_file.utf8(name_index).map(|s| s.as_ref()) == Some("LineNumberTable") {
            line_numbers = parse_line_number_table(body)?;
        }
        input = rest;
    }

    Ok(CodeAttribute {
        max_stack,
        max_locals,
        code: Arc::from(code),
        exception_table,
        line_numbers,
    })
}

fn parse_exception_table_item(
    input: &[u8],
) -> nom::IResult<&[u8], ExceptionTableItem> {
    let (input, start_pc) = be_u16(input)?;
    let (input, end_pc) = be_u16(input)?;
    let (input, handler_pc) = be_u16(input)?;
    let (input, catch_type) = be_u16(input)?;
    Ok((
        input,
        ExceptionTableItem {
            start_pc,
            end_pc,
            handler_pc,
            catch_type,
        },
    ))
}

fn parse_line_number_table(input: &[u8]) -> Result<Vec<LineNumberItem>, ClassError> {
    let (input, length) = be_u16::<_, nom::error::Error<&[u8]>>(input)?;
    let (_, items) = count(parse_line_number_item, length as _)
        .parse(input)
        .map_err(ClassError::from)?;
    Ok(items)
}

fn parse_line_number_item(input: &[u8]) -> nom::IResult<&[u8], LineNumberItem> {
    let (input, start_pc) = be_u16(input)?;
    let (input, line_number) = be_u16(input)?;
    Ok((
        input,
        LineNumberItem {
            start_pc,
            line_number,
        },
    ))
}

pub(crate) fn parse_constant_value(
    class_file: &ClassFile,
    info: &[u8],
) -> Result<Const, ClassError> {
    let (_, index) = be_u16::<_, nom::error::Error<&[u8]>>(info)?;
    let entry = class_file.entry(index).ok_or(ClassError::BadReference)?;
    Ok(match entry {
        ConstantPoolInfo::Integer(v) => Const::Int(*v),
        ConstantPoolInfo::Float(v) => Const::Float(*v),
        ConstantPoolInfo::Long(v) => Const::Long(*v),
        ConstantPoolInfo::Double(v) => Const::Double(*v),
        ConstantPoolInfo::String { string_index } => Const::String(
            class_file
                .utf8(*string_index)
                .ok_or(ClassError::BadReference)?
                .clone(),
        ),
        _ => return Err(ClassError::BadReference),
    })
}
