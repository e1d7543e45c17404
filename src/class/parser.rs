use std::fmt;
use std::sync::Arc;

use cesu8_str::java as cesu8_java;
use nom::{
    IResult, Parser,
    bytes::complete::take,
    combinator::eof,
    multi::count,
    number::complete::{be_f32, be_f64, be_i32, be_i64, be_u16, be_u32, u8},
};

use crate::{
    class::{AttributeInfo, ClassFile, ConstantPoolInfo, FieldInfo, MethodInfo},
    consts::{ClassAccessFlag, FieldAccessFlag, MethodAccessFlag},
};

/// Class-file versions up to Java 21.
const MAX_MAJOR_VERSION: u16 = 65;
const MIN_MAJOR_VERSION: u16 = 45;

/// Reasons a class file is rejected. All of them surface to guest code as
/// `java/lang/ClassFormatError`; the variant is kept for diagnostics.
#[derive(Debug, PartialEq, Eq)]
pub enum ClassError {
    Truncated,
    BadMagic,
    UnsupportedVersion(u16),
    UnknownConstantTag(u8),
    BadUtf8,
    TrailingBytes,
    MalformedDescriptor,
    /// A constant-pool or attribute index pointing at the wrong entry kind.
    BadReference,
}

impl fmt::Display for ClassError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassError::Truncated => write!(f, "truncated class file"),
            ClassError::BadMagic => write!(f, "bad magic number"),
            ClassError::UnsupportedVersion(v) => write!(f, "unsupported major version {v}"),
            ClassError::UnknownConstantTag(t) => write!(f, "unknown constant pool tag {t}"),
            ClassError::BadUtf8 => write!(f, "malformed modified UTF-8"),
            ClassError::TrailingBytes => write!(f, "trailing bytes after class file"),
            ClassError::MalformedDescriptor => write!(f, "malformed descriptor"),
            ClassError::BadReference => write!(f, "bad constant pool reference"),
        }
    }
}

impl std::error::Error for ClassError {}

impl<'a> From<nom::Err<nom::error::Error<&'a [u8]>>> for ClassError {
    fn from(_: nom::Err<nom::error::Error<&'a [u8]>>) -> Self {
        // nom only fails here on short input; structural checks are explicit.
        ClassError::Truncated
    }
}

/// Parses raw class-file bytes. Pure; no resolution happens here.
pub fn class_file(input: &[u8]) -> Result<ClassFile, ClassError> {
    let input = parse_magic(input)?;
    let (input, minor) = be_u16(input)?;
    let (input, major) = be_u16(input)?;
    if !(MIN_MAJOR_VERSION..=MAX_MAJOR_VERSION).contains(&major) {
        return Err(ClassError::UnsupportedVersion(major));
    }

    let (input, constant_pool) = parse_constant_pool(input)?;

    let (input, (access_flags, this_class, super_class)) =
        (be_u16, be_u16, be_u16).parse(input)?;
    let (input, interfaces) = length_counted(be_u16, input)?;
    let (input, fields) = length_counted(parse_field, input)?;
    let (input, methods) = length_counted(parse_method, input)?;
    let (input, attributes) = parse_attributes(input)?;

    if eof::<_, nom::error::Error<&[u8]>>(input).is_err() {
        return Err(ClassError::TrailingBytes);
    }

    Ok(ClassFile {
        minor_version: minor,
        major_version: major,
        access_flags: ClassAccessFlag::from_bits_retain(access_flags),
        this_class,
        super_class,
        constant_pool,
        interfaces,
        fields,
        methods,
        attributes,
    })
}

fn parse_magic(input: &[u8]) -> Result<&[u8], ClassError> {
    if input.len() < 4 {
        return Err(ClassError::Truncated);
    }
    if input[..4] != [0xca, 0xfe, 0xba, 0xbe] {
        return Err(ClassError::BadMagic);
    }
    Ok(&input[4..])
}

/// A `u16` count followed by that many items.
fn length_counted<'a, T>(
    item: impl Parser<&'a [u8], Output = T, Error = nom::error::Error<&'a [u8]>>,
    input: &'a [u8],
) -> IResult<&'a [u8], Vec<T>> {
    let (input, n) = be_u16(input)?;
    count(item, n as usize).parse(input)
}

fn parse_constant_pool(input: &[u8]) -> Result<(&[u8], Vec<ConstantPoolInfo>), ClassError> {
    let (mut input, pool_count) = be_u16(input)?;

    // count is one past the last valid index, and 8-byte constants own two
    // slots, so the pool is filled entry by entry rather than with `count`
    let slots = pool_count.saturating_sub(1) as usize;
    let mut pool = Vec::with_capacity(slots);
    while pool.len() < slots {
        let (rest, entry) = parse_constant(input)?;
        input = rest;
        let wide = matches!(
            entry,
            ConstantPoolInfo::Long(_) | ConstantPoolInfo::Double(_)
        );
        pool.push(entry);
        if wide {
            pool.push(ConstantPoolInfo::Empty);
        }
    }

    Ok((input, pool))
}

fn parse_constant(input: &[u8]) -> Result<(&[u8], ConstantPoolInfo), ClassError> {
    let (input, tag) = u8(input)?;
    Ok(match tag {
        1 => {
            let (input, length) = be_u16(input)?;
            let (input, bytes) = take(length)(input)?;
            let java_str = cesu8_java::JavaStr::from_java_cesu8(bytes)
                .map_err(|_| ClassError::BadUtf8)?;
            let text = Arc::from(cesu8_java::from_java_cesu8(java_str).as_ref());
            (input, ConstantPoolInfo::Utf8(text))
        }
        3 => {
            let (input, value) = be_i32(input)?;
            (input, ConstantPoolInfo::Integer(value))
        }
        4 => {
            let (input, value) = be_f32(input)?;
            (input, ConstantPoolInfo::Float(value))
        }
        5 => {
            let (input, value) = be_i64(input)?;
            (input, ConstantPoolInfo::Long(value))
        }
        6 => {
            let (input, value) = be_f64(input)?;
            (input, ConstantPoolInfo::Double(value))
        }
        7 => {
            let (input, name_index) = be_u16(input)?;
            (input, ConstantPoolInfo::Class { name_index })
        }
        8 => {
            let (input, string_index) = be_u16(input)?;
            (input, ConstantPoolInfo::String { string_index })
        }
        9 | 10 | 11 => {
            let (input, (class_index, name_and_type_index)) = (be_u16, be_u16).parse(input)?;
            let entry = match tag {
                9 => ConstantPoolInfo::Fieldref {
                    class_index,
                    name_and_type_index,
                },
                10 => ConstantPoolInfo::Methodref {
                    class_index,
                    name_and_type_index,
                },
                _ => ConstantPoolInfo::InterfaceMethodref {
                    class_index,
                    name_and_type_index,
                },
            };
            (input, entry)
        }
        12 => {
            let (input, (name_index, descriptor_index)) = (be_u16, be_u16).parse(input)?;
            (
                input,
                ConstantPoolInfo::NameAndType {
                    name_index,
                    descriptor_index,
                },
            )
        }
        15 => {
            let (input, (reference_kind, reference_index)) = (u8, be_u16).parse(input)?;
            (
                input,
                ConstantPoolInfo::MethodHandle {
                    reference_kind,
                    reference_index,
                },
            )
        }
        16 => {
            let (input, descriptor_index) = be_u16(input)?;
            (input, ConstantPoolInfo::MethodType { descriptor_index })
        }
        17 | 18 => {
            let (input, (bootstrap_method_attr_index, name_and_type_index)) =
                (be_u16, be_u16).parse(input)?;
            let entry = if tag == 17 {
                ConstantPoolInfo::Dynamic {
                    bootstrap_method_attr_index,
                    name_and_type_index,
                }
            } else {
                ConstantPoolInfo::InvokeDynamic {
                    bootstrap_method_attr_index,
                    name_and_type_index,
                }
            };
            (input, entry)
        }
        19 => {
            let (input, name_index) = be_u16(input)?;
            (input, ConstantPoolInfo::Module { name_index })
        }
        20 => {
            let (input, name_index) = be_u16(input)?;
            (input, ConstantPoolInfo::Package { name_index })
        }
        _ => return Err(ClassError::UnknownConstantTag(tag)),
    })
}

fn parse_field(input: &[u8]) -> IResult<&[u8], FieldInfo> {
    let (input, (access_flags, name_index, descriptor_index)) =
        (be_u16, be_u16, be_u16).parse(input)?;
    let (input, attributes) = parse_attributes(input)?;
    Ok((
        input,
        FieldInfo {
            access_flags: FieldAccessFlag::from_bits_retain(access_flags),
            name_index,
            descriptor_index,
            attributes,
        },
    ))
}

fn parse_method(input: &[u8]) -> IResult<&[u8], MethodInfo> {
    let (input, (access_flags, name_index, descriptor_index)) =
        (be_u16, be_u16, be_u16).parse(input)?;
    let (input, attributes) = parse_attributes(input)?;
    Ok((
        input,
        MethodInfo {
            access_flags: MethodAccessFlag::from_bits_retain(access_flags),
            name_index,
            descriptor_index,
            attributes,
        },
    ))
}

fn parse_attributes(input: &[u8]) -> IResult<&[u8], Vec<AttributeInfo>> {
    length_counted(parse_attribute, input)
}

fn parse_attribute(input: &[u8]) -> IResult<&[u8], AttributeInfo> {
    let (input, (attribute_name_index, attribute_length)) = (be_u16, be_u32).parse(input)?;
    let (input, info) = take(attribute_length)(input)?;

    Ok((
        input,
        AttributeInfo {
            attribute_name_index,
            info: info.to_vec(),
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_magic() {
        assert_eq!(
            class_file(&[0xde, 0xad, 0xbe, 0xef, 0, 0, 0, 52]),
            Err(ClassError::BadMagic)
        );
    }

    #[test]
    fn rejects_truncated_input() {
        assert_eq!(class_file(&[0xca, 0xfe]), Err(ClassError::Truncated));
        assert_eq!(
            class_file(&[0xca, 0xfe, 0xba, 0xbe, 0, 0, 0, 52, 0]),
            Err(ClassError::Truncated)
        );
    }

    #[test]
    fn rejects_unsupported_version() {
        assert_eq!(
            class_file(&[0xca, 0xfe, 0xba, 0xbe, 0, 0, 0, 99, 0, 0]),
            Err(ClassError::UnsupportedVersion(99))
        );
    }

    #[test]
    fn rejects_unknown_constant_tag() {
        // header + count=2 + one bogus tag
        let bytes = [0xca, 0xfe, 0xba, 0xbe, 0, 0, 0, 52, 0, 2, 99];
        assert_eq!(class_file(&bytes), Err(ClassError::UnknownConstantTag(99)));
    }
}
