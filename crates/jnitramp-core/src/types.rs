//! JNI value types and their wire encoding.
//!
//! A [`TypeDescriptor`] knows two spellings of itself: the C type used to
//! declare a trampoline parameter (`jintArray`) and the code the JNI binder
//! matches against (`[I`). Only the latter has to be exact; a wrong local name
//! fails to compile, a wrong wire code silently fails to bind.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{CatalogError, Result};

const STRING_CLASS: &str = "java/lang/String";

/// Primitive JNI value types that have a dedicated array wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    /// 32-bit signed integer
    Int,
    Boolean,
    /// 64-bit signed integer
    Long,
}

impl Primitive {
    pub fn local_name(self) -> &'static str {
        match self {
            Primitive::Int => "jint",
            Primitive::Boolean => "jboolean",
            Primitive::Long => "jlong",
        }
    }

    pub fn wire_code(self) -> char {
        match self {
            Primitive::Int => 'I',
            Primitive::Boolean => 'Z',
            Primitive::Long => 'J',
        }
    }

    /// Name of the primitive-specialized array wrapper
    pub fn array_name(self) -> &'static str {
        match self {
            Primitive::Int => "jintArray",
            Primitive::Boolean => "jbooleanArray",
            Primitive::Long => "jlongArray",
        }
    }

    fn from_code(code: char) -> Option<Self> {
        match code {
            'I' => Some(Primitive::Int),
            'Z' => Some(Primitive::Boolean),
            'J' => Some(Primitive::Long),
            _ => None,
        }
    }
}

/// A native-ABI value type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeDescriptor {
    Primitive(Primitive),
    /// `java.lang.String` reference
    String,
    Void,
    Array(Box<TypeDescriptor>),
}

pub const JINT: TypeDescriptor = TypeDescriptor::Primitive(Primitive::Int);
pub const JBOOLEAN: TypeDescriptor = TypeDescriptor::Primitive(Primitive::Boolean);
pub const JLONG: TypeDescriptor = TypeDescriptor::Primitive(Primitive::Long);
pub const JSTRING: TypeDescriptor = TypeDescriptor::String;
pub const VOID: TypeDescriptor = TypeDescriptor::Void;

/// Shorthand for [`TypeDescriptor::array_of`].
pub fn array_of(element: TypeDescriptor) -> TypeDescriptor {
    TypeDescriptor::array_of(element)
}

impl TypeDescriptor {
    /// Array of `element`. Nesting is unbounded: `array_of(array_of(JINT))` is `[[I`.
    pub fn array_of(element: TypeDescriptor) -> Self {
        TypeDescriptor::Array(Box::new(element))
    }

    /// C type used when declaring a parameter of this type.
    pub fn local_name(&self) -> &'static str {
        match self {
            TypeDescriptor::Primitive(p) => p.local_name(),
            TypeDescriptor::String => "jstring",
            TypeDescriptor::Void => "void",
            TypeDescriptor::Array(element) => match element.as_ref() {
                TypeDescriptor::Primitive(p) => p.array_name(),
                _ => "jobjectArray",
            },
        }
    }

    /// Wire code consumed by the JNI binder.
    pub fn wire_code(&self) -> String {
        let mut out = String::new();
        self.write_wire_code(&mut out);
        out
    }

    pub fn write_wire_code(&self, out: &mut String) {
        match self {
            TypeDescriptor::Primitive(p) => out.push(p.wire_code()),
            TypeDescriptor::String => {
                out.push('L');
                out.push_str(STRING_CLASS);
                out.push(';');
            }
            TypeDescriptor::Void => out.push('V'),
            TypeDescriptor::Array(element) => {
                out.push('[');
                element.write_wire_code(out);
            }
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, TypeDescriptor::Void)
    }

    /// True for `void` itself and for any array whose innermost element is `void`.
    pub fn contains_void(&self) -> bool {
        match self {
            TypeDescriptor::Void => true,
            TypeDescriptor::Array(element) => element.contains_void(),
            _ => false,
        }
    }

    /// Parse exactly one wire code, e.g. `[[I` or `Ljava/lang/String;`.
    pub fn parse(code: &str) -> Result<Self> {
        let (ty, rest) = parse_one(code, code)?;
        if !rest.is_empty() {
            return Err(malformed(code, format!("trailing input `{rest}`")));
        }
        Ok(ty)
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.wire_code())
    }
}

impl Serialize for TypeDescriptor {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.wire_code())
    }
}

impl<'de> Deserialize<'de> for TypeDescriptor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let code = String::deserialize(deserializer)?;
        TypeDescriptor::parse(&code).map_err(serde::de::Error::custom)
    }
}

/// Split a wire signature `(args)ret` into its argument types and return type.
pub fn parse_signature(signature: &str) -> Result<(Vec<TypeDescriptor>, TypeDescriptor)> {
    let body = signature
        .strip_prefix('(')
        .ok_or_else(|| malformed(signature, "missing `(`".to_string()))?;

    let mut args = Vec::new();
    let mut rest = body;
    loop {
        if let Some(after) = rest.strip_prefix(')') {
            rest = after;
            break;
        }
        if rest.is_empty() {
            return Err(malformed(signature, "missing `)`".to_string()));
        }
        let (ty, after) = parse_one(rest, signature)?;
        if ty.is_void() {
            return Err(malformed(signature, "`V` in argument position".to_string()));
        }
        args.push(ty);
        rest = after;
    }

    let ret = TypeDescriptor::parse(rest).map_err(|_| {
        malformed(signature, format!("bad return type `{rest}`"))
    })?;
    Ok((args, ret))
}

/// Deepest array nesting a JVM type descriptor may carry.
pub const MAX_ARRAY_DEPTH: usize = 255;

fn parse_one<'a>(input: &'a str, whole: &str) -> Result<(TypeDescriptor, &'a str)> {
    let element = input.trim_start_matches('[');
    let depth = input.len() - element.len();
    if depth > MAX_ARRAY_DEPTH {
        return Err(malformed(
            whole,
            format!("array nesting deeper than {MAX_ARRAY_DEPTH}"),
        ));
    }

    let mut chars = element.chars();
    let head = chars
        .next()
        .ok_or_else(|| malformed(whole, "unexpected end of input".to_string()))?;
    let rest = chars.as_str();

    let (mut ty, rest) = match head {
        'V' if depth > 0 => return Err(malformed(whole, "array of `V`".to_string())),
        'V' => (TypeDescriptor::Void, rest),
        'L' => {
            let end = rest
                .find(';')
                .ok_or_else(|| malformed(whole, "unterminated class name".to_string()))?;
            let class = &rest[..end];
            if class != STRING_CLASS {
                return Err(malformed(whole, format!("unsupported class `{class}`")));
            }
            (TypeDescriptor::String, &rest[end + 1..])
        }
        other => match Primitive::from_code(other) {
            Some(p) => (TypeDescriptor::Primitive(p), rest),
            None => return Err(malformed(whole, format!("unknown type code `{other}`"))),
        },
    };

    for _ in 0..depth {
        ty = TypeDescriptor::array_of(ty);
    }
    Ok((ty, rest))
}

fn malformed(code: &str, reason: String) -> CatalogError {
    CatalogError::MalformedWireCode {
        code: code.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_codes() {
        assert_eq!(JINT.wire_code(), "I");
        assert_eq!(JBOOLEAN.wire_code(), "Z");
        assert_eq!(JLONG.wire_code(), "J");
        assert_eq!(JSTRING.wire_code(), "Ljava/lang/String;");
        assert_eq!(VOID.wire_code(), "V");
        assert_eq!(JSTRING.local_name(), "jstring");
    }

    #[test]
    fn test_array_of_primitive() {
        let ints = array_of(JINT);
        assert_eq!(ints.wire_code(), "[I");
        assert_eq!(ints.local_name(), "jintArray");
        assert_eq!(array_of(JLONG).local_name(), "jlongArray");
        assert_eq!(array_of(JBOOLEAN).local_name(), "jbooleanArray");
    }

    #[test]
    fn test_nested_array_is_object_array() {
        let rlimits = array_of(array_of(JINT));
        assert_eq!(rlimits.wire_code(), "[[I");
        assert_eq!(rlimits.local_name(), "jobjectArray");

        let deep = array_of(array_of(array_of(JLONG)));
        assert_eq!(deep.wire_code(), "[[[J");
        assert_eq!(deep.local_name(), "jobjectArray");
    }

    #[test]
    fn test_string_array() {
        let names = array_of(JSTRING);
        assert_eq!(names.wire_code(), "[Ljava/lang/String;");
        assert_eq!(names.local_name(), "jobjectArray");
        assert_eq!(
            array_of(names).wire_code(),
            "[[Ljava/lang/String;"
        );
    }

    #[test]
    fn test_parse_single_codes() {
        assert_eq!(TypeDescriptor::parse("[[I").unwrap(), array_of(array_of(JINT)));
        assert_eq!(TypeDescriptor::parse("Ljava/lang/String;").unwrap(), JSTRING);
        assert!(TypeDescriptor::parse("Ljava/lang/Object;").is_err());
        assert!(TypeDescriptor::parse("II").is_err());
        assert!(TypeDescriptor::parse("[V").is_err());
        assert!(TypeDescriptor::parse("").is_err());
        assert!(TypeDescriptor::parse("Q").is_err());
    }

    #[test]
    fn test_parse_signature() {
        let (args, ret) = parse_signature("(I[[ILjava/lang/String;Z)V").unwrap();
        assert_eq!(args, vec![JINT, array_of(array_of(JINT)), JSTRING, JBOOLEAN]);
        assert_eq!(ret, VOID);

        let (args, ret) = parse_signature("()I").unwrap();
        assert!(args.is_empty());
        assert_eq!(ret, JINT);
    }

    #[test]
    fn test_parse_signature_rejects_malformed() {
        assert!(parse_signature("I)I").is_err());
        assert!(parse_signature("(II").is_err());
        assert!(parse_signature("(I)").is_err());
        assert!(parse_signature("(I)II").is_err());
        assert!(parse_signature("(V)I").is_err());
    }

    #[test]
    fn test_array_depth_is_capped() {
        let deepest = format!("{}I", "[".repeat(MAX_ARRAY_DEPTH));
        assert_eq!(TypeDescriptor::parse(&deepest).unwrap().wire_code(), deepest);

        let too_deep = format!("{}I", "[".repeat(MAX_ARRAY_DEPTH + 1));
        assert!(matches!(
            TypeDescriptor::parse(&too_deep),
            Err(CatalogError::MalformedWireCode { .. })
        ));

        let huge = format!("({}I)I", "[".repeat(100_000));
        assert!(parse_signature(&huge).is_err());
    }

    #[test]
    fn test_serde_uses_wire_code() {
        let json = serde_json::to_string(&array_of(JSTRING)).unwrap();
        assert_eq!(json, "\"[Ljava/lang/String;\"");
        let back: TypeDescriptor = serde_json::from_str("\"[J\"").unwrap();
        assert_eq!(back, array_of(JLONG));
    }
}
